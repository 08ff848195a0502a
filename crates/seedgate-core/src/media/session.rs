//! Session filtering shared by all media-server adapters.

use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};
use std::time::{Duration, Instant};

/// One playback session as reported by a media server.
#[derive(Debug, Clone, PartialEq)]
pub struct Session {
    pub id: String,
    pub title: String,
    /// Bandwidth in bits/s.
    pub bandwidth: u64,
    pub paused: bool,
    /// Client address, or `lan` / `wan` when the server only reports that.
    pub address: String,
}

/// Decides how much of each session's bandwidth counts.
///
/// Paused sessions stop counting once paused for longer than the configured
/// threshold; streams from the local network are ignored when configured.
#[derive(Debug)]
pub struct SessionFilter {
    ignore_local_streams: bool,
    ignore_paused_after: Option<Duration>,
    paused_since: HashMap<String, Instant>,
    label: String,
}

impl SessionFilter {
    /// `ignore_paused_after` is in seconds; negative disables the rule.
    pub fn new(
        label: impl Into<String>,
        ignore_local_streams: bool,
        ignore_paused_after: i64,
    ) -> Self {
        Self {
            ignore_local_streams,
            ignore_paused_after: u64::try_from(ignore_paused_after)
                .ok()
                .map(Duration::from_secs),
            paused_since: HashMap::new(),
            label: label.into(),
        }
    }

    /// Total counted bandwidth (bits/s) of `sessions` at `now`. Forgets pause
    /// records of sessions that are no longer listed.
    pub fn total(&mut self, sessions: &[Session], now: Instant) -> u64 {
        let total = sessions.iter().fold(0u64, |acc, s| {
            acc.saturating_add(self.counted_bandwidth(s, now))
        });
        self.paused_since
            .retain(|id, _| sessions.iter().any(|s| &s.id == id));
        total
    }

    fn counted_bandwidth(&mut self, session: &Session, now: Instant) -> u64 {
        if let Some(limit) = self.ignore_paused_after {
            if session.paused {
                let since = *self.paused_since.entry(session.id.clone()).or_insert(now);
                if now.duration_since(since) > limit {
                    tracing::debug!(
                        "<{}> not counting {}:{}, paused for too long",
                        self.label,
                        session.title,
                        session.id
                    );
                    return 0;
                }
            } else {
                self.paused_since.remove(&session.id);
            }
        }

        if self.ignore_local_streams && is_local_address(&session.address) {
            tracing::debug!(
                "<{}> ignoring local stream {}:{} ({})",
                self.label,
                session.title,
                session.id,
                session.address
            );
            return 0;
        }

        tracing::debug!(
            "<{}> counting {} bit/s for {}:{}",
            self.label,
            session.bandwidth,
            session.title,
            session.id
        );
        session.bandwidth
    }
}

/// True for `lan`, private, loopback and link-local addresses. Unparseable
/// addresses count as remote.
pub fn is_local_address(address: &str) -> bool {
    let address = address.trim();
    if address.eq_ignore_ascii_case("lan") {
        return true;
    }
    if address.eq_ignore_ascii_case("wan") {
        return false;
    }
    let ip = address
        .parse::<IpAddr>()
        .ok()
        .or_else(|| address.parse::<SocketAddr>().ok().map(|s| s.ip()));
    match ip {
        Some(IpAddr::V4(v4)) => v4.is_private() || v4.is_loopback() || v4.is_link_local(),
        Some(IpAddr::V6(v6)) => {
            if let Some(v4) = v6.to_ipv4_mapped() {
                return v4.is_private() || v4.is_loopback() || v4.is_link_local();
            }
            let first = v6.segments()[0];
            v6.is_loopback() || (first & 0xfe00) == 0xfc00 || (first & 0xffc0) == 0xfe80
        }
        None => false,
    }
}
