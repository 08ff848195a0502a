//! Media-server bandwidth providers.
//!
//! Each configured server is polled by a [`BandwidthContributor`], which turns
//! the reported stream bandwidth into an upload reduction in the aggregate.

mod contributor;
mod jellyfin;
mod plex;
mod session;
mod tautulli;

use serde::{Deserialize, Deserializer};

use crate::config::{MediaServerConfig, MediaServerKind};
use crate::error::{ConfigError, ProviderError};
use crate::http::HttpClient;

pub use contributor::BandwidthContributor;
pub use jellyfin::JellyfinServer;
pub use plex::PlexServer;
pub use session::{is_local_address, Session, SessionFilter};
pub use tautulli::TautulliServer;

/// Something that reports the bandwidth currently used by media streams.
///
/// Calls block; the contributor runs them on the blocking pool.
pub trait BandwidthProvider: Send {
    fn label(&self) -> &str;

    /// Counted stream bandwidth in bits/s.
    fn get_bandwidth(&mut self) -> Result<u64, ProviderError>;
}

/// A configured media server.
pub enum MediaServer {
    Plex(PlexServer),
    Tautulli(TautulliServer),
    Jellyfin(JellyfinServer),
}

impl MediaServer {
    /// `index` is the entry's position in the config; it keeps two entries
    /// for the same server apart in the aggregate.
    pub fn from_config(index: usize, cfg: &MediaServerConfig) -> Result<Self, ConfigError> {
        let label = format!("media#{}|{}|{}", index, cfg.kind.as_str(), cfg.url);
        let http = HttpClient::new(&cfg.url, cfg.https_verify).map_err(|e| {
            ConfigError::InvalidUrl {
                url: cfg.url.clone(),
                reason: e.to_string(),
            }
        })?;
        let filter = SessionFilter::new(
            label.clone(),
            cfg.ignore_local_streams,
            cfg.ignore_paused_after,
        );
        let missing = |field| ConfigError::MissingField {
            kind: cfg.kind.as_str(),
            url: cfg.url.clone(),
            field,
        };

        Ok(match cfg.kind {
            MediaServerKind::Plex => {
                let token = cfg.token.clone().ok_or_else(|| missing("token"))?;
                MediaServer::Plex(PlexServer::new(http, token, filter, label))
            }
            MediaServerKind::Tautulli => {
                let key = cfg.api_key.clone().ok_or_else(|| missing("api_key"))?;
                MediaServer::Tautulli(TautulliServer::new(http, key, filter, label))
            }
            MediaServerKind::Jellyfin => {
                let key = cfg.api_key.as_deref().ok_or_else(|| missing("api_key"))?;
                MediaServer::Jellyfin(JellyfinServer::new(http, key, filter, label))
            }
        })
    }
}

impl BandwidthProvider for MediaServer {
    fn label(&self) -> &str {
        match self {
            MediaServer::Plex(s) => s.label(),
            MediaServer::Tautulli(s) => s.label(),
            MediaServer::Jellyfin(s) => s.label(),
        }
    }

    fn get_bandwidth(&mut self) -> Result<u64, ProviderError> {
        match self {
            MediaServer::Plex(s) => s.get_bandwidth(),
            MediaServer::Tautulli(s) => s.get_bandwidth(),
            MediaServer::Jellyfin(s) => s.get_bandwidth(),
        }
    }
}

/// Accept a number or a numeric string (`""` is 0, fractions are truncated).
pub(crate) fn lenient_u64<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u64, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Int(u64),
        Float(f64),
        Text(String),
        Null(()),
    }

    let from_float = |f: f64| if f.is_finite() && f > 0.0 { f as u64 } else { 0 };
    match Raw::deserialize(deserializer)? {
        Raw::Int(v) => Ok(v),
        Raw::Float(f) => Ok(from_float(f)),
        Raw::Null(()) => Ok(0),
        Raw::Text(s) => {
            let s = s.trim();
            if s.is_empty() {
                return Ok(0);
            }
            s.parse::<u64>()
                .or_else(|_| s.parse::<f64>().map(from_float))
                .map_err(|_| serde::de::Error::custom(format!("not a number: {:?}", s)))
        }
    }
}
