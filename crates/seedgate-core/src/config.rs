use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::ConfigError;
use crate::schedule::ScheduleWindow;
use crate::units::Unit;

/// Torrent client implementation behind a `[[clients]]` entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClientKind {
    Qbittorrent,
    Transmission,
}

impl ClientKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ClientKind::Qbittorrent => "qbittorrent",
            ClientKind::Transmission => "transmission",
        }
    }
}

/// One torrent client to throttle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    #[serde(rename = "type")]
    pub kind: ClientKind,
    /// Base URL of the Web UI / RPC endpoint (e.g. `http://127.0.0.1:8080`).
    pub url: String,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
    #[serde(default = "default_true")]
    pub https_verify: bool,
}

/// Media server implementation behind a `[[media_servers]]` entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaServerKind {
    Plex,
    Tautulli,
    Jellyfin,
}

impl MediaServerKind {
    pub fn as_str(self) -> &'static str {
        match self {
            MediaServerKind::Plex => "plex",
            MediaServerKind::Tautulli => "tautulli",
            MediaServerKind::Jellyfin => "jellyfin",
        }
    }
}

/// One media server whose stream bandwidth is reserved from the torrent upload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MediaServerConfig {
    #[serde(rename = "type")]
    pub kind: MediaServerKind,
    pub url: String,
    /// Plex token (`X-Plex-Token`).
    #[serde(default)]
    pub token: Option<String>,
    /// Tautulli / Jellyfin API key.
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default = "default_true")]
    pub https_verify: bool,
    /// Factor applied to the reported bandwidth (e.g. 1.2 for overhead).
    #[serde(default = "default_multiplier")]
    pub bandwidth_multiplier: f64,
    /// Seconds between polls.
    #[serde(default = "default_update_interval")]
    pub update_interval: u64,
    /// Do not reserve bandwidth for streams from the local network.
    #[serde(default)]
    pub ignore_local_streams: bool,
    /// Stop counting a paused stream after this many seconds; -1 = never.
    #[serde(default = "default_ignore_paused_after")]
    pub ignore_paused_after: i64,
}

/// A reduction amount: absolute (configured units) or `"<n>%"` of a maximum.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ReductionSpec {
    Absolute(f64),
    Text(String),
}

impl ReductionSpec {
    /// Resolve to an absolute amount; percentages are taken of `max`.
    pub fn resolve(&self, max: f64) -> Result<f64, ConfigError> {
        let value = match self {
            ReductionSpec::Absolute(v) => *v,
            ReductionSpec::Text(s) => {
                let invalid = || ConfigError::InvalidReduction(s.clone());
                let trimmed = s.trim();
                match trimmed.strip_suffix('%') {
                    Some(pct) => {
                        let pct: f64 = pct.trim().parse().map_err(|_| invalid())?;
                        if !(pct >= 0.0) {
                            return Err(invalid());
                        }
                        pct / 100.0 * max
                    }
                    None => trimmed.parse().map_err(|_| invalid())?,
                }
            }
        };
        if !value.is_finite() || value < 0.0 {
            return Err(ConfigError::InvalidReduction(format!("{:?}", self)));
        }
        Ok(value)
    }
}

/// One time window during which torrent speeds are reduced by a fixed amount.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleConfig {
    /// Start time of day, `HH:MM` (local time).
    pub start: String,
    /// End time of day, `HH:MM` (local time).
    pub end: String,
    /// Weekdays (`mon`..`sun`) or `["all"]`.
    pub days: Vec<String>,
    pub upload: ReductionSpec,
    pub download: ReductionSpec,
}

/// Global configuration loaded from `~/.config/seedgate/config.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeedgateConfig {
    /// Unit of every speed in this file.
    pub units: Unit,
    pub min_upload: f64,
    pub max_upload: f64,
    pub min_download: f64,
    pub max_download: f64,
    /// Directory for the log file (default: XDG state dir).
    #[serde(default)]
    pub logs_path: Option<PathBuf>,
    #[serde(default)]
    pub clients: Vec<ClientConfig>,
    #[serde(default)]
    pub media_servers: Vec<MediaServerConfig>,
    #[serde(default)]
    pub schedules: Vec<ScheduleConfig>,
}

fn default_true() -> bool {
    true
}

fn default_multiplier() -> f64 {
    1.0
}

fn default_update_interval() -> u64 {
    5
}

fn default_ignore_paused_after() -> i64 {
    -1
}

impl SeedgateConfig {
    /// Check everything that can be checked without touching the network.
    pub fn validate(&self) -> Result<(), ConfigError> {
        check_bounds("upload", self.min_upload, self.max_upload)?;
        check_bounds("download", self.min_download, self.max_download)?;

        if self.clients.is_empty() {
            return Err(ConfigError::NoClients);
        }
        if self.media_servers.is_empty() && self.schedules.is_empty() {
            return Err(ConfigError::NoContributors);
        }

        for client in &self.clients {
            check_url(&client.url)?;
        }
        for server in &self.media_servers {
            check_media_server(server)?;
        }
        for schedule in &self.schedules {
            ScheduleWindow::from_config(schedule, self.max_upload, self.max_download)?;
        }
        Ok(())
    }

    /// Build every configured schedule window.
    pub fn schedule_windows(&self) -> Result<Vec<ScheduleWindow>, ConfigError> {
        self.schedules
            .iter()
            .map(|s| ScheduleWindow::from_config(s, self.max_upload, self.max_download))
            .collect()
    }
}

fn check_bounds(name: &'static str, min: f64, max: f64) -> Result<(), ConfigError> {
    if !min.is_finite() || !max.is_finite() || min < 0.0 || min > max {
        return Err(ConfigError::Bounds { name, min, max });
    }
    Ok(())
}

fn check_url(raw: &str) -> Result<(), ConfigError> {
    let url = url::Url::parse(raw.trim()).map_err(|e| ConfigError::InvalidUrl {
        url: raw.to_string(),
        reason: e.to_string(),
    })?;
    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(ConfigError::InvalidUrl {
            url: raw.to_string(),
            reason: format!("scheme must be http or https, not {}", url.scheme()),
        });
    }
    Ok(())
}

fn check_media_server(server: &MediaServerConfig) -> Result<(), ConfigError> {
    check_url(&server.url)?;
    let missing = |field| ConfigError::MissingField {
        kind: server.kind.as_str(),
        url: server.url.clone(),
        field,
    };
    match server.kind {
        MediaServerKind::Plex if server.token.is_none() => return Err(missing("token")),
        MediaServerKind::Tautulli | MediaServerKind::Jellyfin if server.api_key.is_none() => {
            return Err(missing("api_key"))
        }
        _ => {}
    }
    if server.update_interval == 0 {
        return Err(ConfigError::MediaServer {
            url: server.url.clone(),
            reason: "update_interval must be at least 1 second".to_string(),
        });
    }
    if !server.bandwidth_multiplier.is_finite() || server.bandwidth_multiplier < 0.0 {
        return Err(ConfigError::MediaServer {
            url: server.url.clone(),
            reason: format!(
                "bandwidth_multiplier must be non-negative, got {}",
                server.bandwidth_multiplier
            ),
        });
    }
    if server.ignore_paused_after < -1 {
        return Err(ConfigError::MediaServer {
            url: server.url.clone(),
            reason: "ignore_paused_after must be -1 or a number of seconds".to_string(),
        });
    }
    Ok(())
}

/// Default config location: `~/.config/seedgate/config.toml`.
pub fn config_path() -> Result<PathBuf> {
    let xdg_dirs = xdg::BaseDirectories::with_prefix("seedgate")?;
    Ok(xdg_dirs.get_config_home().join("config.toml"))
}

/// Load and validate configuration from `path`.
pub fn load_from_path(path: &Path) -> Result<SeedgateConfig> {
    let data = fs::read_to_string(path)
        .with_context(|| format!("read config file {}", path.display()))?;
    let cfg: SeedgateConfig =
        toml::from_str(&data).with_context(|| format!("parse config file {}", path.display()))?;
    cfg.validate()
        .with_context(|| format!("invalid config file {}", path.display()))?;
    Ok(cfg)
}

/// Load from `explicit` if given, otherwise from the default location.
pub fn load(explicit: Option<&Path>) -> Result<SeedgateConfig> {
    let path = match explicit {
        Some(p) => p.to_path_buf(),
        None => config_path()?,
    };
    if !path.exists() {
        anyhow::bail!(
            "no config file at {} (use --config or SEEDGATE_CONFIG)",
            path.display()
        );
    }
    tracing::debug!("loading config from {}", path.display());
    load_from_path(&path)
}
