//! Error taxonomy.
//!
//! - [`ConfigError`]: invalid configuration. Fatal at startup.
//! - [`ProviderError`]: a media server could not be polled. The contributor
//!   logs it and keeps its previous contribution.
//! - [`ClientError`]: a torrent client could not be queried or updated. The
//!   control loop logs it and skips that client for the cycle.

use thiserror::Error;

use crate::http::HttpError;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid time of day {0:?}, expected HH:MM")]
    InvalidTime(String),

    #[error("unknown weekday {0:?}, expected one of mon..sun or \"all\"")]
    UnknownWeekday(String),

    #[error("schedule has an empty weekday set")]
    EmptyWeekdays,

    #[error("schedule start and end are both {0}")]
    EqualStartEnd(String),

    #[error("invalid reduction {0:?}, expected a non-negative number or \"<n>%\"")]
    InvalidReduction(String),

    #[error("{name}: min ({min}) must be non-negative and not greater than max ({max})")]
    Bounds {
        name: &'static str,
        min: f64,
        max: f64,
    },

    #[error("invalid url {url:?}: {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("{kind} server at {url} needs `{field}`")]
    MissingField {
        kind: &'static str,
        url: String,
        field: &'static str,
    },

    #[error("media server at {url}: {reason}")]
    MediaServer { url: String, reason: String },

    #[error("no torrent clients configured")]
    NoClients,

    #[error("no media servers or schedules configured")]
    NoContributors,
}

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error(transparent)]
    Http(#[from] HttpError),

    #[error("server reported an error: {0}")]
    Server(String),

    #[error("unexpected response: {0}")]
    Malformed(String),
}

#[derive(Debug, Error)]
pub enum ClientError {
    #[error(transparent)]
    Http(#[from] HttpError),

    #[error("authentication failed: {0}")]
    Auth(String),

    #[error("rpc error: {0}")]
    Rpc(String),
}
