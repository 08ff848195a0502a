//! Integration tests: torrent-client and media-server adapters against a
//! local scripted HTTP server.

mod common;

use common::mock_http::{MockServer, Request, Response};
use seedgate_core::clients::{ClientAdapter, TorrentClient};
use seedgate_core::config::{ClientConfig, ClientKind, MediaServerConfig, MediaServerKind};
use seedgate_core::error::{ClientError, ProviderError};
use seedgate_core::media::{BandwidthProvider, MediaServer};
use seedgate_core::units::Unit;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

fn client(kind: ClientKind, url: &str, username: &str, password: &str) -> ClientAdapter {
    let cfg = ClientConfig {
        kind,
        url: url.to_string(),
        username: username.to_string(),
        password: password.to_string(),
        https_verify: true,
    };
    ClientAdapter::from_config(&cfg, Unit::Megabit).unwrap()
}

fn media_server(kind: MediaServerKind, url: &str, secret: &str) -> MediaServer {
    let (token, api_key) = match kind {
        MediaServerKind::Plex => (Some(secret.to_string()), None),
        _ => (None, Some(secret.to_string())),
    };
    let cfg = MediaServerConfig {
        kind,
        url: url.to_string(),
        token,
        api_key,
        https_verify: true,
        bandwidth_multiplier: 1.0,
        update_interval: 5,
        ignore_local_streams: false,
        ignore_paused_after: -1,
    };
    MediaServer::from_config(0, &cfg).unwrap()
}

fn has_session_cookie(req: &Request) -> bool {
    req.header("Cookie").map_or(false, |c| c.contains("SID=abc"))
}

fn qbittorrent_server(expire_first_info: bool) -> (MockServer, Arc<AtomicUsize>) {
    let logins = Arc::new(AtomicUsize::new(0));
    let info_calls = AtomicUsize::new(0);
    let counter = Arc::clone(&logins);
    let server = MockServer::start(move |req| match req.path() {
        "/api/v2/auth/login" => {
            counter.fetch_add(1, Ordering::SeqCst);
            if req.body.contains("password=secret") {
                Response::new(200, "Ok.").with_header("Set-Cookie", "SID=abc; HttpOnly; path=/")
            } else {
                Response::new(200, "Fails.")
            }
        }
        "/api/v2/torrents/info" => {
            let n = info_calls.fetch_add(1, Ordering::SeqCst);
            if !has_session_cookie(req) || (expire_first_info && n == 0) {
                return Response::new(403, "Forbidden");
            }
            Response::json(
                r#"[{"state": "uploading"}, {"state": "stalledDL"}, {"state": "pausedUP"}]"#,
            )
        }
        "/api/v2/transfer/setUploadLimit" | "/api/v2/transfer/setDownloadLimit" => {
            if has_session_cookie(req) {
                Response::new(200, "")
            } else {
                Response::new(403, "Forbidden")
            }
        }
        _ => Response::new(404, "not found"),
    });
    (server, logins)
}

#[test]
fn qbittorrent_logs_in_counts_and_sets_limits_in_bytes() {
    let (server, logins) = qbittorrent_server(false);
    let mut qbit = client(ClientKind::Qbittorrent, &server.url, "admin", "secret");

    assert_eq!(qbit.active_session_count().unwrap(), 2);
    qbit.set_upload_limit(8.0).unwrap();
    qbit.set_download_limit(0.0).unwrap();
    assert_eq!(logins.load(Ordering::SeqCst), 1);

    let requests = server.requests();
    let login = &requests[0];
    assert_eq!(login.method, "POST");
    assert!(login.body.contains("username=admin"));
    let upload = requests
        .iter()
        .find(|r| r.path() == "/api/v2/transfer/setUploadLimit")
        .unwrap();
    assert_eq!(upload.body, "limit=1000000");
    let download = requests
        .iter()
        .find(|r| r.path() == "/api/v2/transfer/setDownloadLimit")
        .unwrap();
    // 0 would mean unlimited.
    assert_eq!(download.body, "limit=1");
}

#[test]
fn qbittorrent_logs_in_again_after_403() {
    let (server, logins) = qbittorrent_server(true);
    let mut qbit = client(ClientKind::Qbittorrent, &server.url, "admin", "secret");
    assert_eq!(qbit.active_session_count().unwrap(), 2);
    assert_eq!(logins.load(Ordering::SeqCst), 2);
}

#[test]
fn qbittorrent_rejected_login_is_an_auth_error() {
    let (server, _) = qbittorrent_server(false);
    let mut qbit = client(ClientKind::Qbittorrent, &server.url, "admin", "wrong");
    assert!(matches!(
        qbit.active_session_count(),
        Err(ClientError::Auth(_))
    ));
}

fn transmission_server() -> MockServer {
    MockServer::start(|req| {
        if req.path() != "/transmission/rpc" {
            return Response::new(404, "not found");
        }
        if req.header("Authorization").is_none() {
            return Response::new(401, "Unauthorized");
        }
        if req.header("X-Transmission-Session-Id") != Some("sid-1") {
            return Response::new(409, "").with_header("X-Transmission-Session-Id", "sid-1");
        }
        let body: serde_json::Value = serde_json::from_str(&req.body).unwrap();
        match body["method"].as_str() {
            Some("torrent-get") => Response::json(
                r#"{"result": "success", "arguments": {"torrents": [
                    {"status": 4}, {"status": 6}, {"status": 0}, {"status": 6}
                ]}}"#,
            ),
            Some("session-set") => Response::json(r#"{"result": "success", "arguments": {}}"#),
            _ => Response::json(r#"{"result": "method name not recognized"}"#),
        }
    })
}

#[test]
fn transmission_handles_session_id_and_sets_limits_in_kb() {
    let server = transmission_server();
    let mut trans = client(ClientKind::Transmission, &server.url, "user", "pass");

    assert_eq!(trans.active_session_count().unwrap(), 3);
    trans.set_upload_limit(1.0).unwrap();

    let requests = server.requests();
    // 409 handshake, retried torrent-get, then session-set with the known id.
    assert_eq!(requests.len(), 3);
    assert!(requests[0].header("X-Transmission-Session-Id").is_none());
    assert_eq!(
        requests[0].header("Authorization"),
        Some("Basic dXNlcjpwYXNz")
    );
    let set: serde_json::Value = serde_json::from_str(&requests[2].body).unwrap();
    assert_eq!(set["method"], "session-set");
    assert_eq!(set["arguments"]["speed-limit-up"], 125);
    assert_eq!(set["arguments"]["speed-limit-up-enabled"], true);
}

#[test]
fn transmission_without_credentials_is_an_auth_error() {
    let server = transmission_server();
    let mut trans = client(ClientKind::Transmission, &server.url, "", "");
    assert!(matches!(
        trans.active_session_count(),
        Err(ClientError::Auth(_))
    ));
}

#[test]
fn plex_reports_total_session_bandwidth() {
    let server = MockServer::start(|req| {
        if req.path() != "/status/sessions" || !req.query().contains("X-Plex-Token=tok") {
            return Response::new(401, "Unauthorized");
        }
        Response::json(
            r#"{"MediaContainer": {"size": 2, "Metadata": [
                {"title": "Film", "Session": {"id": "1", "bandwidth": 8000, "location": "wan"},
                 "Player": {"state": "playing"}},
                {"title": "Show", "Session": {"id": "2", "bandwidth": 2000, "location": "lan"},
                 "Player": {"state": "playing"}}
            ]}}"#,
        )
    });
    let mut plex = media_server(MediaServerKind::Plex, &server.url, "tok");
    assert_eq!(plex.get_bandwidth().unwrap(), 10_000_000);
    assert_eq!(
        server.requests()[0].header("Accept"),
        Some("application/json")
    );
}

#[test]
fn plex_http_error_is_a_provider_error() {
    let server = MockServer::start(|_| Response::new(401, "Unauthorized"));
    let mut plex = media_server(MediaServerKind::Plex, &server.url, "bad");
    assert!(matches!(plex.get_bandwidth(), Err(ProviderError::Http(_))));
}

#[test]
fn tautulli_error_result_is_a_server_error() {
    let server = MockServer::start(|_| {
        Response::json(
            r#"{"response": {"result": "error", "message": "Invalid apikey", "data": {}}}"#,
        )
    });
    let mut tautulli = media_server(MediaServerKind::Tautulli, &server.url, "bad");
    assert!(matches!(
        tautulli.get_bandwidth(),
        Err(ProviderError::Server(_))
    ));
}

#[test]
fn jellyfin_sends_token_header() {
    let server = MockServer::start(|req| {
        if req.header("Authorization") != Some("MediaBrowser Token=\"key\"") {
            return Response::new(401, "Unauthorized");
        }
        Response::json(
            r#"[{"Id": "1", "RemoteEndPoint": "203.0.113.2",
                 "PlayState": {"PlayMethod": "Transcode", "IsPaused": false},
                 "NowPlayingItem": {"Name": "Film"},
                 "TranscodingInfo": {"Bitrate": 4000000}}]"#,
        )
    });
    let mut jellyfin = media_server(MediaServerKind::Jellyfin, &server.url, "key");
    assert_eq!(jellyfin.get_bandwidth().unwrap(), 4_000_000);
}
