//! Transmission RPC (`/transmission/rpc`).
//!
//! Every request carries the `X-Transmission-Session-Id` from the last 409
//! response; a 409 means the id is missing or stale and the request is
//! retried once with the new one.

use serde::Deserialize;
use serde_json::{json, Value};

use super::{client_limit, TorrentClient};
use crate::error::ClientError;
use crate::http::{HttpClient, HttpError, HttpResponse};
use crate::units::Unit;

const SESSION_HEADER: &str = "X-Transmission-Session-Id";
const RPC_PATH: &str = "transmission/rpc";
const STATUS_DOWNLOAD: i64 = 4;
const STATUS_SEED: i64 = 6;

#[derive(Debug, Deserialize)]
struct RpcResponse {
    result: String,
    #[serde(default)]
    arguments: Value,
}

#[derive(Debug, Deserialize)]
struct TorrentList {
    #[serde(default)]
    torrents: Vec<TorrentStatus>,
}

#[derive(Debug, Deserialize)]
struct TorrentStatus {
    status: i64,
}

pub struct TransmissionClient {
    http: HttpClient,
    session_id: Option<String>,
    units: Unit,
    label: String,
}

impl TransmissionClient {
    pub fn new(
        mut http: HttpClient,
        username: &str,
        password: &str,
        units: Unit,
        label: String,
    ) -> Result<Self, HttpError> {
        if !username.is_empty() || !password.is_empty() {
            http.basic_auth(username, password)?;
        }
        Ok(Self {
            http,
            session_id: None,
            units,
            label,
        })
    }

    fn rpc(&mut self, method: &str, arguments: Value) -> Result<Value, ClientError> {
        let body = json!({ "method": method, "arguments": arguments });
        let mut resp = self.post(&body)?;
        if resp.code == 409 {
            let id = resp
                .header(SESSION_HEADER)
                .ok_or_else(|| ClientError::Rpc(format!("409 without {}", SESSION_HEADER)))?;
            tracing::debug!(client = %self.label, "new rpc session id {}", id);
            self.session_id = Some(id.to_string());
            resp = self.post(&body)?;
        }
        if resp.code == 401 {
            return Err(ClientError::Auth("check credentials".to_string()));
        }
        let resp = resp.error_for_status()?;
        let parsed: RpcResponse = resp.json()?;
        if parsed.result != "success" {
            return Err(ClientError::Rpc(format!("{}: {}", method, parsed.result)));
        }
        Ok(parsed.arguments)
    }

    fn post(&mut self, body: &Value) -> Result<HttpResponse, ClientError> {
        let headers: Vec<(&str, &str)> = self
            .session_id
            .as_deref()
            .map(|id| (SESSION_HEADER, id))
            .into_iter()
            .collect();
        Ok(self.http.post_json(RPC_PATH, body, &headers)?)
    }

    fn set_limit(&mut self, direction: &str, value: f64) -> Result<(), ClientError> {
        let kb = client_limit(value, self.units, Unit::Kilobyte);
        tracing::debug!(client = %self.label, "speed-limit-{} to {} kB/s", direction, kb);
        let mut args = serde_json::Map::new();
        args.insert(format!("speed-limit-{}", direction), json!(kb));
        args.insert(format!("speed-limit-{}-enabled", direction), json!(true));
        self.rpc("session-set", Value::Object(args))?;
        Ok(())
    }
}

impl TorrentClient for TransmissionClient {
    fn label(&self) -> &str {
        &self.label
    }

    fn active_session_count(&mut self) -> Result<u32, ClientError> {
        let args = self.rpc("torrent-get", json!({ "fields": ["status"] }))?;
        let list: TorrentList =
            serde_json::from_value(args).map_err(|e| ClientError::Rpc(e.to_string()))?;
        Ok(count_active(&list.torrents))
    }

    fn set_upload_limit(&mut self, value: f64) -> Result<(), ClientError> {
        self.set_limit("up", value)
    }

    fn set_download_limit(&mut self, value: f64) -> Result<(), ClientError> {
        self.set_limit("down", value)
    }
}

fn count_active(torrents: &[TorrentStatus]) -> u32 {
    torrents
        .iter()
        .filter(|t| t.status == STATUS_DOWNLOAD || t.status == STATUS_SEED)
        .count() as u32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_downloading_and_seeding() {
        let list: TorrentList = serde_json::from_value(json!({
            "torrents": [
                {"status": 0}, {"status": 4}, {"status": 6}, {"status": 6}, {"status": 3}
            ]
        }))
        .unwrap();
        assert_eq!(count_active(&list.torrents), 3);
    }

    #[test]
    fn missing_torrent_list_counts_zero() {
        let list: TorrentList = serde_json::from_value(json!({})).unwrap();
        assert_eq!(count_active(&list.torrents), 0);
    }
}
