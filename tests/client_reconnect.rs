//! Client connection manager against a scripted transport
//!
//! All tests run on a paused clock, so every timer fires exactly at its
//! deadline and connect timestamps can be compared directly.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};
use tokio::sync::mpsc;
use tokio::time::Instant;

use model_sync::client::{
    ClientHandle, ClientOptions, ClientSocket, ClientTransport, ConnectionManager,
    ConnectionStatus, PageLocation, SocketEvent,
};
use model_sync::error::ClientError;

/// Test side of one accepted connection
struct Peer {
    events: mpsc::UnboundedSender<SocketEvent>,
    sent: mpsc::UnboundedReceiver<String>,
    closed: Arc<AtomicBool>,
}

struct Attempt {
    url: String,
    at: Instant,
    peer: Option<Peer>,
}

struct MockTransport {
    accept: Arc<AtomicBool>,
    log: Arc<Mutex<Vec<String>>>,
    attempts: mpsc::UnboundedSender<Attempt>,
}

#[async_trait]
impl ClientTransport for MockTransport {
    async fn connect(&self, url: &str) -> Result<Box<dyn ClientSocket>, ClientError> {
        self.log.lock().unwrap().push(format!("connect {}", url));
        let at = Instant::now();

        if !self.accept.load(Ordering::SeqCst) {
            let _ = self.attempts.send(Attempt {
                url: url.to_string(),
                at,
                peer: None,
            });
            return Err(ClientError::Transport("connection refused".to_string()));
        }

        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (sent_tx, sent_rx) = mpsc::unbounded_channel();
        let closed = Arc::new(AtomicBool::new(false));

        let _ = self.attempts.send(Attempt {
            url: url.to_string(),
            at,
            peer: Some(Peer {
                events: events_tx,
                sent: sent_rx,
                closed: closed.clone(),
            }),
        });

        Ok(Box::new(MockSocket {
            events: events_rx,
            sent: sent_tx,
            closed,
            log: self.log.clone(),
        }))
    }
}

struct MockSocket {
    events: mpsc::UnboundedReceiver<SocketEvent>,
    sent: mpsc::UnboundedSender<String>,
    closed: Arc<AtomicBool>,
    log: Arc<Mutex<Vec<String>>>,
}

#[async_trait]
impl ClientSocket for MockSocket {
    async fn send_text(&mut self, text: String) -> Result<(), ClientError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(ClientError::NotConnected);
        }
        self.sent
            .send(text)
            .map_err(|_| ClientError::Transport("peer gone".to_string()))
    }

    async fn next_event(&mut self) -> SocketEvent {
        self.events.recv().await.unwrap_or(SocketEvent::Closed)
    }

    async fn close(&mut self) {
        self.closed.store(true, Ordering::SeqCst);
        self.log.lock().unwrap().push("close".to_string());
    }
}

struct Harness {
    handle: ClientHandle,
    attempts: mpsc::UnboundedReceiver<Attempt>,
    accept: Arc<AtomicBool>,
    log: Arc<Mutex<Vec<String>>>,
    changes: mpsc::UnboundedReceiver<Value>,
}

impl Harness {
    fn start(page_url: &str, accept: bool) -> Self {
        let accept = Arc::new(AtomicBool::new(accept));
        let log = Arc::new(Mutex::new(Vec::new()));
        let (attempts_tx, attempts) = mpsc::unbounded_channel();
        let (changes_tx, changes) = mpsc::unbounded_channel();

        let transport = MockTransport {
            accept: accept.clone(),
            log: log.clone(),
            attempts: attempts_tx,
        };
        let location = PageLocation::parse(page_url).unwrap();
        let handle = ConnectionManager::spawn(
            &location,
            "feed",
            move |change: Value| {
                let _ = changes_tx.send(change);
            },
            transport,
            ClientOptions::default(),
        );

        Self {
            handle,
            attempts,
            accept,
            log,
            changes,
        }
    }

    async fn next_attempt(&mut self) -> Attempt {
        self.attempts.recv().await.expect("manager stopped")
    }

    async fn open(&mut self) -> (Attempt, Peer) {
        let mut attempt = self.next_attempt().await;
        let peer = attempt.peer.take().expect("connection was refused");
        self.handle
            .wait_for_status(ConnectionStatus::Open)
            .await
            .unwrap();
        (attempt, peer)
    }

    fn set_accept(&self, accept: bool) {
        self.accept.store(accept, Ordering::SeqCst);
    }

    fn log(&self) -> Vec<String> {
        self.log.lock().unwrap().clone()
    }
}

fn assert_delay(actual: Duration, expected_secs: u64) {
    let expected = Duration::from_secs(expected_secs);
    let diff = if actual > expected {
        actual - expected
    } else {
        expected - actual
    };
    assert!(
        diff <= Duration::from_millis(5),
        "expected ~{:?}, got {:?}",
        expected,
        actual
    );
}

#[tokio::test(start_paused = true)]
async fn test_url_uses_ws_for_http_page() {
    let mut harness = Harness::start("http://example.com/", true);

    let (attempt, _peer) = harness.open().await;

    assert_eq!(attempt.url, "ws://example.com/feed");
    assert_eq!(harness.handle.url(), "ws://example.com/feed");
}

#[tokio::test(start_paused = true)]
async fn test_url_uses_wss_for_https_page() {
    let mut harness = Harness::start("https://example.com/app/", true);

    let (attempt, _peer) = harness.open().await;

    assert_eq!(attempt.url, "wss://example.com/app/feed");
}

#[tokio::test(start_paused = true)]
async fn test_keepalive_every_interval_on_open_socket() {
    let mut harness = Harness::start("http://example.com/", true);
    let (attempt, mut peer) = harness.open().await;

    let first = peer.sent.recv().await.unwrap();
    assert_eq!(first, r#"{"type":"keepalive"}"#);
    assert_delay(attempt.at.elapsed(), 60);

    let second = peer.sent.recv().await.unwrap();
    assert_eq!(second, r#"{"type":"keepalive"}"#);
    assert_delay(attempt.at.elapsed(), 120);

    assert_eq!(harness.log(), vec!["connect ws://example.com/feed"]);
}

#[tokio::test(start_paused = true)]
async fn test_close_schedules_reconnect_after_base_delay() {
    let mut harness = Harness::start("http://example.com/", true);
    let (_attempt, peer) = harness.open().await;

    peer.events.send(SocketEvent::Closed).unwrap();
    let closed_at = Instant::now();

    let mut second = harness.next_attempt().await;
    assert_delay(second.at - closed_at, 10);
    assert_eq!(second.url, "ws://example.com/feed");
    assert!(second.peer.take().is_some());
}

#[tokio::test(start_paused = true)]
async fn test_error_closes_socket_before_reconnect() {
    let mut harness = Harness::start("http://example.com/", true);
    let (_attempt, peer) = harness.open().await;

    peer.events
        .send(SocketEvent::Error("connection reset".to_string()))
        .unwrap();
    let failed_at = Instant::now();

    let second = harness.next_attempt().await;
    assert!(peer.closed.load(Ordering::SeqCst));
    assert_delay(second.at - failed_at, 10);
    assert_eq!(
        harness.log(),
        vec![
            "connect ws://example.com/feed",
            "close",
            "connect ws://example.com/feed",
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn test_refused_attempts_back_off_exponentially_up_to_cap() {
    let mut harness = Harness::start("http://example.com/", false);

    let mut previous = harness.next_attempt().await;
    for expected in [10, 20, 40, 80, 160, 320, 640, 640, 640] {
        let attempt = harness.next_attempt().await;
        assert!(attempt.peer.is_none());
        assert_delay(attempt.at - previous.at, expected);
        previous = attempt;
    }
}

#[tokio::test(start_paused = true)]
async fn test_open_resets_backoff() {
    let mut harness = Harness::start("http://example.com/", false);

    // Refusals at 0s, 10s, 30s; the next delay would be 40s
    for _ in 0..3 {
        harness.next_attempt().await;
    }
    harness.set_accept(true);

    let (opened, peer) = harness.open().await;
    peer.events.send(SocketEvent::Closed).unwrap();

    let next = harness.next_attempt().await;
    assert_delay(next.at - opened.at, 10);
}

#[tokio::test(start_paused = true)]
async fn test_messages_are_forwarded_to_interpreter() {
    let mut harness = Harness::start("http://example.com/", true);
    let (_attempt, peer) = harness.open().await;

    peer.events
        .send(SocketEvent::Message(r#"{"type":"update","id":7}"#.to_string()))
        .unwrap();

    let change = harness.changes.recv().await.unwrap();
    assert_eq!(change, json!({"type": "update", "id": 7}));
}

#[tokio::test(start_paused = true)]
async fn test_malformed_message_is_dropped() {
    let mut harness = Harness::start("http://example.com/", true);
    let (_attempt, peer) = harness.open().await;

    peer.events
        .send(SocketEvent::Message("not json".to_string()))
        .unwrap();
    peer.events
        .send(SocketEvent::Message(r#"{"type":"update"}"#.to_string()))
        .unwrap();

    let change = harness.changes.recv().await.unwrap();
    assert_eq!(change, json!({"type": "update"}));
    assert_eq!(harness.handle.status(), ConnectionStatus::Open);
}

#[tokio::test(start_paused = true)]
async fn test_closed_socket_gets_no_keepalive() {
    let mut harness = Harness::start("http://example.com/", true);
    let (_first, mut old_peer) = harness.open().await;

    tokio::time::sleep(Duration::from_secs(30)).await;
    old_peer.events.send(SocketEvent::Closed).unwrap();

    let (second, mut new_peer) = harness.open().await;

    // The new socket's timer starts at its own open
    let keepalive = new_peer.sent.recv().await.unwrap();
    assert_eq!(keepalive, r#"{"type":"keepalive"}"#);
    assert_delay(second.at.elapsed(), 60);

    assert!(old_peer.sent.try_recv().is_err());
}

#[tokio::test(start_paused = true)]
async fn test_send_reaches_open_socket() {
    let mut harness = Harness::start("http://example.com/", true);
    let (_attempt, mut peer) = harness.open().await;

    harness
        .handle
        .send(&json!({"type": "command", "data": "x"}))
        .unwrap();

    let sent = peer.sent.recv().await.unwrap();
    let sent: Value = serde_json::from_str(&sent).unwrap();
    assert_eq!(sent, json!({"type": "command", "data": "x"}));
}

#[tokio::test(start_paused = true)]
async fn test_send_without_open_socket_is_rejected() {
    let mut harness = Harness::start("http://example.com/", false);
    harness.next_attempt().await;
    harness
        .handle
        .wait_for_status(ConnectionStatus::Reconnecting)
        .await
        .unwrap();

    let result = harness.handle.send(&json!({"type": "command"}));

    assert!(matches!(result, Err(ClientError::NotConnected)));
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_closes_socket_and_stops() {
    let mut harness = Harness::start("http://example.com/", true);
    let (_attempt, _peer) = harness.open().await;
    let status = harness.handle.watch_status();

    harness.handle.shutdown().await;

    assert_eq!(*status.borrow(), ConnectionStatus::Stopped);
    assert_eq!(
        harness.log.lock().unwrap().clone(),
        vec!["connect ws://example.com/feed", "close"]
    );
    // The transport went away with the manager task
    assert!(harness.attempts.recv().await.is_none());
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_cancels_pending_reconnect() {
    let mut harness = Harness::start("http://example.com/", false);
    harness.next_attempt().await;
    harness
        .handle
        .wait_for_status(ConnectionStatus::Reconnecting)
        .await
        .unwrap();
    let status = harness.handle.watch_status();

    harness.handle.shutdown().await;

    assert_eq!(*status.borrow(), ConnectionStatus::Stopped);
    assert!(harness.attempts.recv().await.is_none());
    assert_eq!(harness.log.lock().unwrap().len(), 1);
}
