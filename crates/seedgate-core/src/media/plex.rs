//! Plex: `GET /status/sessions` (bandwidth in kbit/s).

use serde::Deserialize;
use std::time::Instant;

use super::session::{Session, SessionFilter};
use super::{lenient_u64, BandwidthProvider};
use crate::error::ProviderError;
use crate::http::HttpClient;

#[derive(Debug, Deserialize)]
struct SessionsResponse {
    #[serde(rename = "MediaContainer")]
    media_container: Option<MediaContainer>,
}

#[derive(Debug, Deserialize)]
struct MediaContainer {
    #[serde(default)]
    size: u64,
    #[serde(rename = "Metadata", default)]
    metadata: Vec<Metadata>,
}

#[derive(Debug, Deserialize)]
struct Metadata {
    #[serde(default)]
    title: String,
    #[serde(rename = "Session")]
    session: SessionInfo,
    #[serde(rename = "Player")]
    player: Player,
}

#[derive(Debug, Deserialize)]
struct SessionInfo {
    id: String,
    #[serde(deserialize_with = "lenient_u64", default)]
    bandwidth: u64,
    #[serde(default)]
    location: String,
}

#[derive(Debug, Deserialize)]
struct Player {
    #[serde(default)]
    state: String,
}

pub struct PlexServer {
    http: HttpClient,
    token: String,
    filter: SessionFilter,
    label: String,
}

impl PlexServer {
    pub fn new(http: HttpClient, token: String, filter: SessionFilter, label: String) -> Self {
        Self {
            http,
            token,
            filter,
            label,
        }
    }
}

impl BandwidthProvider for PlexServer {
    fn label(&self) -> &str {
        &self.label
    }

    fn get_bandwidth(&mut self) -> Result<u64, ProviderError> {
        tracing::debug!("<{}> getting bandwidth", self.label);
        let resp = self.http.get(
            "status/sessions",
            &[("X-Plex-Token", self.token.as_str()), ("X-Plex-Language", "en")],
            &[("Accept", "application/json")],
        )?;
        tracing::debug!("<{}> got {} response from Plex", self.label, resp.code);
        let resp = resp.error_for_status()?;
        let sessions = parse_sessions(&resp.body)?;
        Ok(self.filter.total(&sessions, Instant::now()))
    }
}

/// Parse a sessions payload into sessions with bandwidth in bits/s.
pub(super) fn parse_sessions(body: &[u8]) -> Result<Vec<Session>, ProviderError> {
    let parsed: SessionsResponse =
        serde_json::from_slice(body).map_err(|e| ProviderError::Malformed(e.to_string()))?;
    let Some(container) = parsed.media_container else {
        return Err(ProviderError::Server(
            String::from_utf8_lossy(body).into_owned(),
        ));
    };
    if container.size == 0 {
        return Ok(Vec::new());
    }
    Ok(container
        .metadata
        .into_iter()
        .map(|m| Session {
            id: m.session.id,
            title: m.title,
            bandwidth: m.session.bandwidth.saturating_mul(1000),
            paused: m.player.state == "paused",
            address: m.session.location,
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_sessions_in_bits() {
        let body = br#"{"MediaContainer": {"size": 2, "Metadata": [
            {"title": "Film", "Session": {"id": "s1", "bandwidth": 8000, "location": "wan"},
             "Player": {"state": "playing"}},
            {"title": "Show", "Session": {"id": "s2", "bandwidth": 2500, "location": "lan"},
             "Player": {"state": "paused"}}
        ]}}"#;
        let sessions = parse_sessions(body).unwrap();
        assert_eq!(sessions.len(), 2);
        assert_eq!(sessions[0].bandwidth, 8_000_000);
        assert!(!sessions[0].paused);
        assert_eq!(sessions[1].address, "lan");
        assert!(sessions[1].paused);
    }

    #[test]
    fn empty_container_has_no_sessions() {
        let body = br#"{"MediaContainer": {"size": 0}}"#;
        assert!(parse_sessions(body).unwrap().is_empty());
    }

    #[test]
    fn missing_container_is_a_server_error() {
        let body = br#"{"errors": [{"code": 401}]}"#;
        assert!(matches!(
            parse_sessions(body),
            Err(ProviderError::Server(_))
        ));
    }

    #[test]
    fn garbage_is_malformed() {
        assert!(matches!(
            parse_sessions(b"<html>"),
            Err(ProviderError::Malformed(_))
        ));
    }
}
