//! Torrent-client adapters.
//!
//! Every adapter takes limits in the configured unit and converts to what the
//! client's API expects. All calls block.

mod qbittorrent;
mod transmission;

use crate::config::{ClientConfig, ClientKind};
use crate::error::{ClientError, ConfigError};
use crate::http::HttpClient;
use crate::units::{convert, Unit};

pub use qbittorrent::QbittorrentClient;
pub use transmission::TransmissionClient;

/// A torrent client whose global speed limits can be set.
pub trait TorrentClient: Send {
    fn label(&self) -> &str;

    /// Number of torrents currently downloading or seeding.
    fn active_session_count(&mut self) -> Result<u32, ClientError>;

    /// Set the global upload limit, in configured units.
    fn set_upload_limit(&mut self, value: f64) -> Result<(), ClientError>;

    /// Set the global download limit, in configured units.
    fn set_download_limit(&mut self, value: f64) -> Result<(), ClientError>;
}

/// A configured torrent client.
pub enum ClientAdapter {
    Qbittorrent(QbittorrentClient),
    Transmission(TransmissionClient),
}

impl ClientAdapter {
    /// Build the adapter. Does not contact the client; logins happen on
    /// first use.
    pub fn from_config(cfg: &ClientConfig, units: Unit) -> Result<Self, ConfigError> {
        let label = format!("{}|{}", cfg.kind.as_str(), cfg.url);
        let http = HttpClient::new(&cfg.url, cfg.https_verify).map_err(|e| {
            ConfigError::InvalidUrl {
                url: cfg.url.clone(),
                reason: e.to_string(),
            }
        })?;
        let adapter = match cfg.kind {
            ClientKind::Qbittorrent => ClientAdapter::Qbittorrent(QbittorrentClient::new(
                http,
                &cfg.username,
                &cfg.password,
                units,
                label,
            )),
            ClientKind::Transmission => ClientAdapter::Transmission(
                TransmissionClient::new(http, &cfg.username, &cfg.password, units, label)
                    .map_err(|e| ConfigError::InvalidUrl {
                        url: cfg.url.clone(),
                        reason: e.to_string(),
                    })?,
            ),
        };
        Ok(adapter)
    }
}

impl TorrentClient for ClientAdapter {
    fn label(&self) -> &str {
        match self {
            ClientAdapter::Qbittorrent(c) => c.label(),
            ClientAdapter::Transmission(c) => c.label(),
        }
    }

    fn active_session_count(&mut self) -> Result<u32, ClientError> {
        match self {
            ClientAdapter::Qbittorrent(c) => c.active_session_count(),
            ClientAdapter::Transmission(c) => c.active_session_count(),
        }
    }

    fn set_upload_limit(&mut self, value: f64) -> Result<(), ClientError> {
        match self {
            ClientAdapter::Qbittorrent(c) => c.set_upload_limit(value),
            ClientAdapter::Transmission(c) => c.set_upload_limit(value),
        }
    }

    fn set_download_limit(&mut self, value: f64) -> Result<(), ClientError> {
        match self {
            ClientAdapter::Qbittorrent(c) => c.set_download_limit(value),
            ClientAdapter::Transmission(c) => c.set_download_limit(value),
        }
    }
}

/// Convert a limit to the client's integer unit. Never returns 0: both
/// clients treat 0 as "unlimited".
pub(crate) fn client_limit(value: f64, from: Unit, to: Unit) -> u64 {
    let converted = convert(value, from, to);
    if converted.is_finite() && converted >= 1.0 {
        converted as u64
    } else {
        1
    }
}
