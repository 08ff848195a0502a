//! Tautulli: `GET /api/v2?cmd=get_activity` (bandwidth in kbit/s).

use serde::Deserialize;
use std::time::Instant;

use super::session::{Session, SessionFilter};
use super::{lenient_u64, BandwidthProvider};
use crate::error::ProviderError;
use crate::http::HttpClient;

#[derive(Debug, Deserialize)]
struct ActivityResponse {
    response: Envelope,
}

#[derive(Debug, Deserialize)]
struct Envelope {
    result: String,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    data: Option<ActivityData>,
}

#[derive(Debug, Deserialize)]
struct ActivityData {
    #[serde(default)]
    sessions: Vec<ActivitySession>,
}

#[derive(Debug, Deserialize)]
struct ActivitySession {
    session_id: String,
    #[serde(deserialize_with = "lenient_u64", default)]
    bandwidth: u64,
    #[serde(default)]
    state: String,
    #[serde(default)]
    ip_address: String,
    #[serde(default)]
    full_title: String,
}

pub struct TautulliServer {
    http: HttpClient,
    api_key: String,
    filter: SessionFilter,
    label: String,
}

impl TautulliServer {
    pub fn new(http: HttpClient, api_key: String, filter: SessionFilter, label: String) -> Self {
        Self {
            http,
            api_key,
            filter,
            label,
        }
    }
}

impl BandwidthProvider for TautulliServer {
    fn label(&self) -> &str {
        &self.label
    }

    fn get_bandwidth(&mut self) -> Result<u64, ProviderError> {
        tracing::debug!("<{}> getting bandwidth", self.label);
        let resp = self.http.get(
            "api/v2",
            &[("apikey", self.api_key.as_str()), ("cmd", "get_activity")],
            &[],
        )?;
        tracing::debug!("<{}> got {} response from Tautulli", self.label, resp.code);
        let resp = resp.error_for_status()?;
        let sessions = parse_activity(&resp.body)?;
        Ok(self.filter.total(&sessions, Instant::now()))
    }
}

pub(super) fn parse_activity(body: &[u8]) -> Result<Vec<Session>, ProviderError> {
    let parsed: ActivityResponse =
        serde_json::from_slice(body).map_err(|e| ProviderError::Malformed(e.to_string()))?;
    let envelope = parsed.response;
    if envelope.result != "success" {
        return Err(ProviderError::Server(
            envelope.message.unwrap_or(envelope.result),
        ));
    }
    let data = envelope
        .data
        .ok_or_else(|| ProviderError::Malformed("missing response.data".to_string()))?;
    Ok(data
        .sessions
        .into_iter()
        .map(|s| Session {
            id: s.session_id,
            title: s.full_title,
            bandwidth: s.bandwidth.saturating_mul(1000),
            paused: s.state == "paused",
            address: s.ip_address,
        })
        .collect())
}
