//! Blocking HTTP helper shared by the media-server and torrent-client adapters.
//!
//! Uses the curl crate (libcurl). One [`HttpClient`] owns one curl handle, so
//! connections and cookies are reused across calls. Every call blocks the
//! current thread; async callers go through `spawn_blocking`.

use serde::de::DeserializeOwned;
use std::str;
use std::time::Duration;
use thiserror::Error;
use url::Url;

#[derive(Debug, Error)]
pub enum HttpError {
    #[error("invalid url {url:?}: {source}")]
    Url {
        url: String,
        #[source]
        source: url::ParseError,
    },

    #[error("request to {url} failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: curl::Error,
    },

    #[error("{url} returned HTTP {code}")]
    Status { url: String, code: u32 },

    #[error("invalid JSON from {url}: {source}")]
    Json {
        url: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Response of a completed request: status code, raw header lines and body.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub url: String,
    pub code: u32,
    pub headers: Vec<String>,
    pub body: Vec<u8>,
}

impl HttpResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.code)
    }

    /// Turn a non-2xx response into [`HttpError::Status`].
    pub fn error_for_status(self) -> Result<Self, HttpError> {
        if self.is_success() {
            Ok(self)
        } else {
            Err(HttpError::Status {
                url: self.url,
                code: self.code,
            })
        }
    }

    /// Value of the last header named `name` (case-insensitive).
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.iter().rev().find_map(|line| {
            let (key, value) = line.split_once(':')?;
            key.trim()
                .eq_ignore_ascii_case(name)
                .then(|| value.trim())
        })
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    pub fn json<T: DeserializeOwned>(&self) -> Result<T, HttpError> {
        serde_json::from_slice(&self.body).map_err(|source| HttpError::Json {
            url: self.url.clone(),
            source,
        })
    }
}

/// Blocking HTTP client bound to one base URL.
pub struct HttpClient {
    easy: curl::easy::Easy,
    base: Url,
}

impl HttpClient {
    /// Create a client for `base_url`. Endpoint paths passed to the request
    /// methods are resolved relative to it, so a base with a path prefix
    /// (reverse proxy) keeps that prefix.
    pub fn new(base_url: &str, verify_tls: bool) -> Result<Self, HttpError> {
        let base = parse_base(base_url)?;
        let mut easy = curl::easy::Easy::new();
        let setup = |easy: &mut curl::easy::Easy| -> Result<(), curl::Error> {
            easy.follow_location(true)?;
            easy.connect_timeout(Duration::from_secs(10))?;
            easy.timeout(Duration::from_secs(30))?;
            easy.ssl_verify_peer(verify_tls)?;
            easy.ssl_verify_host(verify_tls)?;
            Ok(())
        };
        setup(&mut easy).map_err(|source| HttpError::Transport {
            url: base.to_string(),
            source,
        })?;
        Ok(Self { easy, base })
    }

    pub fn base_url(&self) -> &Url {
        &self.base
    }

    /// Keep cookies in memory across requests (session logins).
    pub fn enable_cookies(&mut self) -> Result<(), HttpError> {
        let url = self.base.to_string();
        self.easy
            .cookie_file("")
            .map_err(|source| HttpError::Transport { url, source })
    }

    /// Send HTTP basic credentials with every request.
    pub fn basic_auth(&mut self, username: &str, password: &str) -> Result<(), HttpError> {
        let url = self.base.to_string();
        let mut auth = curl::easy::Auth::new();
        auth.basic(true);
        let apply = |easy: &mut curl::easy::Easy| -> Result<(), curl::Error> {
            easy.username(username)?;
            easy.password(password)?;
            easy.http_auth(&auth)
        };
        apply(&mut self.easy).map_err(|source| HttpError::Transport { url, source })
    }

    pub fn get(
        &mut self,
        path: &str,
        query: &[(&str, &str)],
        headers: &[(&str, &str)],
    ) -> Result<HttpResponse, HttpError> {
        let url = self.endpoint(path, query)?;
        self.perform(url, None, headers)
    }

    /// POST an `application/x-www-form-urlencoded` body.
    pub fn post_form(
        &mut self,
        path: &str,
        form: &[(&str, &str)],
        headers: &[(&str, &str)],
    ) -> Result<HttpResponse, HttpError> {
        let url = self.endpoint(path, &[])?;
        let body = url::form_urlencoded::Serializer::new(String::new())
            .extend_pairs(form)
            .finish();
        self.perform(
            url,
            Some((body.as_bytes(), "application/x-www-form-urlencoded")),
            headers,
        )
    }

    pub fn post_json(
        &mut self,
        path: &str,
        body: &serde_json::Value,
        headers: &[(&str, &str)],
    ) -> Result<HttpResponse, HttpError> {
        let url = self.endpoint(path, &[])?;
        let body = body.to_string();
        self.perform(url, Some((body.as_bytes(), "application/json")), headers)
    }

    fn endpoint(&self, path: &str, query: &[(&str, &str)]) -> Result<Url, HttpError> {
        let mut url = self
            .base
            .join(path.trim_start_matches('/'))
            .map_err(|source| HttpError::Url {
                url: format!("{}{}", self.base, path),
                source,
            })?;
        if !query.is_empty() {
            url.query_pairs_mut().extend_pairs(query);
        }
        Ok(url)
    }

    fn perform(
        &mut self,
        url: Url,
        body: Option<(&[u8], &str)>,
        headers: &[(&str, &str)],
    ) -> Result<HttpResponse, HttpError> {
        let url_str = url.to_string();
        let transport = |source| HttpError::Transport {
            url: url_str.clone(),
            source,
        };

        self.easy.url(url.as_str()).map_err(transport)?;

        // Build curl list for headers (e.g. "Name: value").
        let mut list = curl::easy::List::new();
        for (k, v) in headers {
            list.append(&format!("{}: {}", k.trim(), v.trim()))
                .map_err(transport)?;
        }
        match body {
            Some((data, content_type)) => {
                list.append(&format!("Content-Type: {}", content_type))
                    .map_err(transport)?;
                self.easy.post(true).map_err(transport)?;
                self.easy.post_fields_copy(data).map_err(transport)?;
            }
            None => self.easy.get(true).map_err(transport)?,
        }
        self.easy.http_headers(list).map_err(transport)?;

        let mut response_headers: Vec<String> = Vec::new();
        let mut response_body: Vec<u8> = Vec::new();
        {
            let mut transfer = self.easy.transfer();
            transfer
                .header_function(|data| {
                    if let Ok(s) = str::from_utf8(data) {
                        let line = s.trim_end();
                        if !line.is_empty() {
                            response_headers.push(line.to_string());
                        }
                    }
                    true
                })
                .map_err(transport)?;
            transfer
                .write_function(|data| {
                    response_body.extend_from_slice(data);
                    Ok(data.len())
                })
                .map_err(transport)?;
            transfer.perform().map_err(transport)?;
        }

        let code = self.easy.response_code().map_err(transport)?;
        tracing::trace!(url = %url_str, code, bytes = response_body.len(), "http response");

        Ok(HttpResponse {
            url: url_str,
            code,
            headers: response_headers,
            body: response_body,
        })
    }
}

/// Parse a base URL, appending a trailing slash so relative joins keep its path.
fn parse_base(base_url: &str) -> Result<Url, HttpError> {
    let trimmed = base_url.trim();
    let with_slash = if trimmed.ends_with('/') {
        trimmed.to_string()
    } else {
        format!("{}/", trimmed)
    };
    let url = Url::parse(&with_slash).map_err(|source| HttpError::Url {
        url: base_url.to_string(),
        source,
    })?;
    Ok(url)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn response(headers: &[&str]) -> HttpResponse {
        HttpResponse {
            url: "http://127.0.0.1/".to_string(),
            code: 200,
            headers: headers.iter().map(|h| h.to_string()).collect(),
            body: Vec::new(),
        }
    }

    #[test]
    fn header_lookup_is_case_insensitive_and_prefers_last() {
        let r = response(&[
            "HTTP/1.1 409 Conflict",
            "X-Transmission-Session-Id: first",
            "HTTP/1.1 200 OK",
            "x-transmission-session-id: second",
        ]);
        assert_eq!(r.header("X-Transmission-Session-Id"), Some("second"));
        assert!(r.header("Content-Length").is_none());
    }

    #[test]
    fn error_for_status_passes_2xx_only() {
        let ok = response(&[]);
        assert!(ok.error_for_status().is_ok());
        let mut forbidden = response(&[]);
        forbidden.code = 403;
        match forbidden.error_for_status() {
            Err(HttpError::Status { code, .. }) => assert_eq!(code, 403),
            other => panic!("expected status error, got {:?}", other),
        }
    }

    #[test]
    fn endpoints_keep_base_path_prefix() {
        let client = HttpClient::new("http://nas.local:8080/qbit", true).unwrap();
        let url = client.endpoint("/api/v2/torrents/info", &[]).unwrap();
        assert_eq!(url.as_str(), "http://nas.local:8080/qbit/api/v2/torrents/info");
    }

    #[test]
    fn endpoints_encode_query_pairs() {
        let client = HttpClient::new("http://plex:32400/", true).unwrap();
        let url = client
            .endpoint("status/sessions", &[("X-Plex-Token", "a b&c")])
            .unwrap();
        assert_eq!(
            url.as_str(),
            "http://plex:32400/status/sessions?X-Plex-Token=a+b%26c"
        );
    }

    #[test]
    fn invalid_base_url_is_rejected() {
        assert!(matches!(
            HttpClient::new("not a url", true),
            Err(HttpError::Url { .. })
        ));
    }
}
