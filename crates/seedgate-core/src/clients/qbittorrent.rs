//! qBittorrent Web API v2.
//!
//! Session cookie from `auth/login`; a 403 on any later call means the
//! cookie expired and triggers one re-login.

use serde::Deserialize;

use super::{client_limit, TorrentClient};
use crate::error::ClientError;
use crate::http::{HttpClient, HttpError, HttpResponse};
use crate::units::Unit;

/// Torrent states that count as an active session.
const ACTIVE_STATES: &[&str] = &[
    "downloading",
    "metaDL",
    "forcedMetaDL",
    "forcedDL",
    "stalledDL",
    "checkingDL",
    "queuedDL",
    "uploading",
    "forcedUP",
    "stalledUP",
    "checkingUP",
    "queuedUP",
];

#[derive(Debug, Deserialize)]
struct TorrentInfo {
    #[serde(default)]
    state: String,
}

pub struct QbittorrentClient {
    http: HttpClient,
    username: String,
    password: String,
    units: Unit,
    label: String,
    logged_in: bool,
}

impl QbittorrentClient {
    pub fn new(
        http: HttpClient,
        username: &str,
        password: &str,
        units: Unit,
        label: String,
    ) -> Self {
        Self {
            http,
            username: username.to_string(),
            password: password.to_string(),
            units,
            label,
            logged_in: false,
        }
    }

    fn login(&mut self) -> Result<(), ClientError> {
        tracing::debug!(client = %self.label, "logging in");
        self.http.enable_cookies()?;
        let referer = self.http.base_url().to_string();
        let resp = self.http.post_form(
            "api/v2/auth/login",
            &[
                ("username", self.username.as_str()),
                ("password", self.password.as_str()),
            ],
            &[("Referer", referer.as_str())],
        )?;
        if resp.code == 403 {
            return Err(ClientError::Auth(
                "temporarily banned after too many failed logins, try again later".to_string(),
            ));
        }
        let resp = resp.error_for_status()?;
        if resp.text().trim() != "Ok." {
            return Err(ClientError::Auth("login rejected, check credentials".to_string()));
        }
        self.logged_in = true;
        tracing::debug!(client = %self.label, "logged in");
        Ok(())
    }

    /// Run `request`, logging in first if needed and once more on 403.
    fn call<F>(&mut self, request: F) -> Result<HttpResponse, ClientError>
    where
        F: Fn(&mut HttpClient) -> Result<HttpResponse, HttpError>,
    {
        if !self.logged_in {
            self.login()?;
        }
        let mut resp = request(&mut self.http)?;
        if resp.code == 403 {
            tracing::debug!(client = %self.label, "session expired, logging in again");
            self.logged_in = false;
            self.login()?;
            resp = request(&mut self.http)?;
        }
        Ok(resp.error_for_status()?)
    }

    fn set_limit(&mut self, endpoint: &str, value: f64) -> Result<(), ClientError> {
        let bytes = client_limit(value, self.units, Unit::Byte).to_string();
        tracing::debug!(client = %self.label, "{} to {} B/s", endpoint, bytes);
        let path = format!("api/v2/transfer/{}", endpoint);
        self.call(|http| http.post_form(&path, &[("limit", bytes.as_str())], &[]))?;
        Ok(())
    }
}

impl TorrentClient for QbittorrentClient {
    fn label(&self) -> &str {
        &self.label
    }

    fn active_session_count(&mut self) -> Result<u32, ClientError> {
        let resp = self.call(|http| http.get("api/v2/torrents/info", &[], &[]))?;
        let torrents: Vec<TorrentInfo> = resp.json()?;
        Ok(count_active(&torrents))
    }

    fn set_upload_limit(&mut self, value: f64) -> Result<(), ClientError> {
        self.set_limit("setUploadLimit", value)
    }

    fn set_download_limit(&mut self, value: f64) -> Result<(), ClientError> {
        self.set_limit("setDownloadLimit", value)
    }
}

fn count_active(torrents: &[TorrentInfo]) -> u32 {
    torrents
        .iter()
        .filter(|t| ACTIVE_STATES.contains(&t.state.as_str()))
        .count() as u32
}
