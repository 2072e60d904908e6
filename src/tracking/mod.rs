//! Visit tracking
//!
//! Decides which requests count as visits and queues the resulting writes on
//! the background writer. Nothing here waits on storage.

pub mod bot;
pub mod identity;

use axum::http::{header, HeaderMap};
use std::net::SocketAddr;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::config::TrackingConfig;
use crate::db::{TrackingJob, Visit, WriteSender};

/// Request extension set by the tracking middleware on requests recorded as visits
#[derive(Debug, Clone, Copy)]
pub struct QualifiedVisit;

pub struct Tracker {
    salt: String,
    missing_user_agent_is_bot: bool,
    write_tx: WriteSender,
}

impl Tracker {
    pub fn new(config: &TrackingConfig, write_tx: WriteSender) -> Self {
        Self {
            salt: config.salt.clone(),
            missing_user_agent_is_bot: config.missing_user_agent_is_bot,
            write_tx,
        }
    }

    /// A request qualifies when it is neither admin traffic nor a bot
    pub fn qualifies(&self, headers: &HeaderMap) -> bool {
        // Any Authorization header marks the request as administrative
        if headers.contains_key(header::AUTHORIZATION) {
            return false;
        }
        !bot::is_bot(user_agent(headers).as_deref(), self.missing_user_agent_is_bot)
    }

    /// Queue a visit record for a qualifying request
    pub fn record_visit(&self, path: String, headers: &HeaderMap, socket: Option<SocketAddr>) {
        let ip = identity::client_ip(headers, socket);
        let ip_hash = identity::hash_identity(&ip, &self.salt);
        debug!("Visit {} from {}", path, &ip_hash[..12]);

        let visit = Visit::new(path, ip_hash, user_agent(headers));
        self.enqueue(TrackingJob::Visit(visit));
    }

    /// Queue a +1 on the article's view counter
    pub fn count_view(&self, article_id: Uuid) {
        self.enqueue(TrackingJob::ArticleView(article_id));
    }

    fn enqueue(&self, job: TrackingJob) {
        if let Err(e) = self.write_tx.send(job) {
            warn!("Tracking writer unavailable, dropping {:?}", e.0);
        }
    }
}

/// User-Agent as text. Non-ASCII bytes are replaced rather than discarding the header.
fn user_agent(headers: &HeaderMap) -> Option<String> {
    headers
        .get(header::USER_AGENT)
        .map(|v| String::from_utf8_lossy(v.as_bytes()).into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;
    use tokio::sync::mpsc;

    fn tracker(missing_user_agent_is_bot: bool) -> (Tracker, mpsc::UnboundedReceiver<TrackingJob>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let config = TrackingConfig {
            salt: "pepper".to_string(),
            missing_user_agent_is_bot,
        };
        (Tracker::new(&config, tx), rx)
    }

    fn headers(pairs: &[(&'static str, &'static str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (name, value) in pairs {
            map.insert(*name, HeaderValue::from_static(*value));
        }
        map
    }

    #[test]
    fn authorization_header_disqualifies() {
        let (tracker, _rx) = tracker(false);
        assert!(!tracker.qualifies(&headers(&[
            ("user-agent", "Mozilla/5.0"),
            ("authorization", "Bearer whatever"),
        ])));
    }

    #[test]
    fn bots_are_disqualified() {
        let (tracker, _rx) = tracker(false);
        assert!(!tracker.qualifies(&headers(&[("user-agent", "Googlebot/2.1")])));
        assert!(tracker.qualifies(&headers(&[("user-agent", "Mozilla/5.0")])));
    }

    #[test]
    fn non_ascii_bot_user_agent_is_disqualified() {
        let (tracker, _rx) = tracker(false);
        let mut map = HeaderMap::new();
        map.insert(
            header::USER_AGENT,
            HeaderValue::from_bytes("Googlebot/2.1 (café)".as_bytes()).unwrap(),
        );
        assert!(!tracker.qualifies(&map));
    }

    #[test]
    fn non_ascii_user_agent_is_stored_as_text() {
        let (tracker, mut rx) = tracker(false);
        let mut map = HeaderMap::new();
        map.insert(
            header::USER_AGENT,
            HeaderValue::from_bytes("Mozilla/5.0 (Ünïcode)".as_bytes()).unwrap(),
        );
        assert!(tracker.qualifies(&map));
        tracker.record_visit("/".to_string(), &map, None);

        match rx.try_recv().unwrap() {
            TrackingJob::Visit(visit) => {
                assert_eq!(visit.user_agent.as_deref(), Some("Mozilla/5.0 (Ünïcode)"));
            }
            other => panic!("unexpected job {:?}", other),
        }
    }

    #[test]
    fn missing_user_agent_uses_config() {
        let (lenient, _rx) = tracker(false);
        assert!(lenient.qualifies(&HeaderMap::new()));
        let (strict, _rx) = tracker(true);
        assert!(!strict.qualifies(&HeaderMap::new()));
    }

    #[test]
    fn record_visit_hashes_address() {
        let (tracker, mut rx) = tracker(false);
        let socket: SocketAddr = "192.0.2.1:1234".parse().unwrap();
        tracker.record_visit(
            "/api/articles?page=2".to_string(),
            &headers(&[("user-agent", "Mozilla/5.0")]),
            Some(socket),
        );

        match rx.try_recv().unwrap() {
            TrackingJob::Visit(visit) => {
                assert_eq!(visit.path, "/api/articles?page=2");
                assert_eq!(visit.ip_hash, identity::hash_identity("192.0.2.1", "pepper"));
                assert_eq!(visit.user_agent.as_deref(), Some("Mozilla/5.0"));
            }
            other => panic!("unexpected job {:?}", other),
        }
    }

    #[test]
    fn closed_writer_is_swallowed() {
        let (tracker, rx) = tracker(false);
        drop(rx);
        tracker.count_view(Uuid::new_v4());
    }
}
