//! Jellyfin: `GET /Sessions` (bitrates in bit/s).
//!
//! Direct-play sessions have no transcoding bitrate, so their bandwidth is
//! estimated from the sum of the media stream bitrates.

use serde::Deserialize;
use std::time::Instant;

use super::session::{Session, SessionFilter};
use super::{lenient_u64, BandwidthProvider};
use crate::error::ProviderError;
use crate::http::HttpClient;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct JellyfinSession {
    id: String,
    #[serde(default)]
    now_playing_item: Option<NowPlayingItem>,
    #[serde(default)]
    play_state: PlayState,
    #[serde(default)]
    transcoding_info: Option<TranscodingInfo>,
    #[serde(default)]
    remote_end_point: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct NowPlayingItem {
    #[serde(default)]
    name: String,
    #[serde(default)]
    media_streams: Vec<MediaStream>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct MediaStream {
    #[serde(deserialize_with = "lenient_u64", default)]
    bit_rate: u64,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct PlayState {
    #[serde(default)]
    play_method: Option<String>,
    #[serde(default)]
    is_paused: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct TranscodingInfo {
    #[serde(deserialize_with = "lenient_u64", default)]
    bitrate: u64,
}

pub struct JellyfinServer {
    http: HttpClient,
    auth_header: String,
    filter: SessionFilter,
    label: String,
}

impl JellyfinServer {
    pub fn new(http: HttpClient, api_key: &str, filter: SessionFilter, label: String) -> Self {
        Self {
            http,
            auth_header: format!("MediaBrowser Token=\"{}\"", api_key),
            filter,
            label,
        }
    }
}

impl BandwidthProvider for JellyfinServer {
    fn label(&self) -> &str {
        &self.label
    }

    fn get_bandwidth(&mut self) -> Result<u64, ProviderError> {
        tracing::debug!("<{}> getting bandwidth", self.label);
        let resp = self.http.get(
            "Sessions",
            &[],
            &[("Authorization", self.auth_header.as_str())],
        )?;
        tracing::debug!("<{}> got {} response from Jellyfin", self.label, resp.code);
        let resp = resp.error_for_status()?;
        let sessions = parse_sessions(&resp.body)?;
        Ok(self.filter.total(&sessions, Instant::now()))
    }
}

/// Sessions that are actually playing something, bandwidth in bits/s.
pub(super) fn parse_sessions(body: &[u8]) -> Result<Vec<Session>, ProviderError> {
    let parsed: Vec<JellyfinSession> =
        serde_json::from_slice(body).map_err(|e| ProviderError::Malformed(e.to_string()))?;
    let mut sessions = Vec::new();
    for s in parsed {
        let Some(item) = s.now_playing_item else {
            continue;
        };
        let direct_play = s.play_state.play_method.as_deref() == Some("DirectPlay");
        let bandwidth = if direct_play {
            item.media_streams
                .iter()
                .fold(0u64, |acc, m| acc.saturating_add(m.bit_rate))
        } else {
            match s.transcoding_info {
                Some(info) => info.bitrate,
                None => {
                    return Err(ProviderError::Malformed(format!(
                        "session {} is transcoding without TranscodingInfo",
                        s.id
                    )))
                }
            }
        };
        sessions.push(Session {
            id: s.id,
            title: item.name,
            bandwidth,
            paused: s.play_state.is_paused,
            address: s.remote_end_point,
        });
    }
    Ok(sessions)
}
