//! Realtime subscriber: one STOMP-over-WebSocket connection per topic set.
//!
//! Lifecycle:
//! ```text
//!  Idle ──open──▶ Connecting ──CONNECTED──▶ Connected
//!                    ▲   │                      │ dropped
//!                    │   └── failed ──┐         │
//!                    └──── backoff ── Reconnecting ◀┘
//!  any state ──close()──▶ Closed
//! ```
//! Backoff doubles from one second up to the configured cap, with a little
//! jitter. It resets only after a healthy session: one that delivered a
//! message or stayed up for `STABLE_SESSION`. A broker that accepts CONNECT
//! and then rejects or drops every session keeps backing off.

use anyhow::{bail, Context, Result};
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use rand::Rng;
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::net::TcpStream;
use tokio::sync::{oneshot, watch};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tracing::{debug, error, info, warn};
use url::Url;

use super::stomp::{Command, Frame};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
type WsWrite = SplitSink<WsStream, Message>;
type WsRead = SplitStream<WsStream>;

const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(10);
const TEARDOWN_TIMEOUT: Duration = Duration::from_secs(2);
const INITIAL_BACKOFF: Duration = Duration::from_secs(1);
const STABLE_SESSION: Duration = Duration::from_secs(5);

/// A function invoked with the parsed JSON body of every message on a topic.
pub type MessageHandler = Arc<dyn Fn(Value) + Send + Sync>;

#[derive(Clone)]
pub struct TopicHandler {
    pub topic: String,
    handler: MessageHandler,
}

impl TopicHandler {
    pub fn new(topic: impl Into<String>, handler: impl Fn(Value) + Send + Sync + 'static) -> Self {
        TopicHandler {
            topic: topic.into(),
            handler: Arc::new(handler),
        }
    }

    pub fn handle(&self, value: Value) {
        (self.handler)(value)
    }
}

/// Observable state of the realtime connection.
///
/// `attempt` counts connection attempts since the last healthy session;
/// while reconnecting it is the number of the attempt about to be made.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ConnectionStatus {
    Idle,
    Connecting { attempt: u32 },
    Connected,
    Reconnecting { attempt: u32, retry_in_ms: u64 },
    Closed,
}

/// Where to connect and how patiently to retry.
#[derive(Debug, Clone)]
pub struct SubscriberConfig {
    pub url: Url,
    pub max_backoff: Duration,
    /// Log every STOMP frame at debug level
    pub debug_frames: bool,
}

impl SubscriberConfig {
    pub fn new(endpoint: &str, max_backoff: Duration, debug_frames: bool) -> Result<Self> {
        Ok(SubscriberConfig {
            url: websocket_url(endpoint)?,
            max_backoff,
            debug_frames,
        })
    }
}

/// Map a realtime endpoint to a raw WebSocket URL.
///
/// `ws://` / `wss://` URLs are used as given. `http(s)://` endpoints are
/// SockJS-style and expose their raw WebSocket transport under `/websocket`.
pub fn websocket_url(endpoint: &str) -> Result<Url> {
    let mut url = Url::parse(endpoint).with_context(|| format!("Invalid endpoint '{}'", endpoint))?;
    let scheme = match url.scheme() {
        "ws" | "wss" => return Ok(url),
        "http" => "ws",
        "https" => "wss",
        other => bail!("Unsupported realtime endpoint scheme '{}'", other),
    };
    if url.set_scheme(scheme).is_err() {
        bail!("Cannot convert '{}' to a WebSocket URL", endpoint);
    }
    let path = format!("{}/websocket", url.path().trim_end_matches('/'));
    url.set_path(&path);
    Ok(url)
}

/// Capped exponential backoff with jitter.
#[derive(Debug, Clone)]
pub struct Backoff {
    initial: Duration,
    max: Duration,
    current: Duration,
}

impl Backoff {
    pub fn new(initial: Duration, max: Duration) -> Self {
        let initial = initial.min(max);
        Backoff {
            initial,
            max,
            current: initial,
        }
    }

    pub fn next_delay(&mut self) -> Duration {
        let base = self.current;
        self.current = (self.current * 2).min(self.max);
        let jitter_cap = (base.as_millis() / 10) as u64;
        let jitter = if jitter_cap > 0 {
            rand::thread_rng().gen_range(0..=jitter_cap)
        } else {
            0
        };
        (base + Duration::from_millis(jitter)).min(self.max)
    }

    pub fn reset(&mut self) {
        self.current = self.initial;
    }
}

/// A live subscription to a set of topics on one connection.
///
/// Dropping it stops the background task; `close()` does the same but waits
/// for a clean DISCONNECT first. Closing is idempotent.
pub struct Subscription {
    config: SubscriberConfig,
    shutdown: Option<oneshot::Sender<()>>,
    task: Option<JoinHandle<()>>,
    status_tx: Arc<watch::Sender<ConnectionStatus>>,
    status_rx: watch::Receiver<ConnectionStatus>,
}

impl Subscription {
    /// Start connecting in the background. An empty topic list opens nothing.
    pub fn open(config: SubscriberConfig, topics: Vec<TopicHandler>) -> Self {
        let (status_tx, status_rx) = watch::channel(ConnectionStatus::Idle);
        let mut sub = Subscription {
            config,
            shutdown: None,
            task: None,
            status_tx: Arc::new(status_tx),
            status_rx,
        };
        sub.spawn(topics);
        sub
    }

    fn spawn(&mut self, topics: Vec<TopicHandler>) {
        if topics.is_empty() {
            info!("[Realtime] No topics to follow; not connecting");
            return;
        }
        let (tx, rx) = oneshot::channel();
        let config = self.config.clone();
        let status = Arc::clone(&self.status_tx);
        self.shutdown = Some(tx);
        self.task = Some(tokio::spawn(async move {
            connection_loop(config, topics, status, rx).await;
        }));
    }

    pub fn status(&self) -> ConnectionStatus {
        self.status_rx.borrow().clone()
    }

    pub fn watch_status(&self) -> watch::Receiver<ConnectionStatus> {
        self.status_rx.clone()
    }

    /// Tear down the connection and wait for the background task to finish.
    pub async fn close(&mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                if !e.is_cancelled() {
                    error!("[Realtime] Subscriber task failed: {}", e);
                }
            }
        }
    }

    /// Replace the topic set. The old connection is fully closed before the new one opens.
    pub async fn resubscribe(&mut self, topics: Vec<TopicHandler>) {
        self.close().await;
        self.status_tx.send_replace(ConnectionStatus::Idle);
        self.spawn(topics);
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

enum SessionEnd {
    Shutdown,
    Dropped { healthy: bool },
}

async fn connection_loop(
    config: SubscriberConfig,
    topics: Vec<TopicHandler>,
    status: Arc<watch::Sender<ConnectionStatus>>,
    mut shutdown: oneshot::Receiver<()>,
) {
    let mut backoff = Backoff::new(INITIAL_BACKOFF, config.max_backoff);
    let mut attempt = 0u32;

    loop {
        attempt += 1;
        status.send_replace(ConnectionStatus::Connecting { attempt });
        info!("[Realtime] Connecting to {} (attempt {})", config.url, attempt);

        let connected = tokio::select! {
            _ = &mut shutdown => break,
            res = tokio_tungstenite::connect_async(config.url.as_str()) => res,
        };

        match connected {
            Ok((ws, _response)) => {
                match run_session(&config, &topics, ws, &status, &mut shutdown).await {
                    SessionEnd::Shutdown => break,
                    SessionEnd::Dropped { healthy } => {
                        if healthy {
                            backoff.reset();
                            attempt = 0;
                        }
                    }
                }
            }
            Err(e) => {
                error!("[Realtime] WebSocket connection failed: {}", e);
            }
        }

        let delay = backoff.next_delay();
        warn!("[Realtime] Reconnecting in {:?}...", delay);
        status.send_replace(ConnectionStatus::Reconnecting {
            attempt: attempt + 1,
            retry_in_ms: delay.as_millis() as u64,
        });
        tokio::select! {
            _ = &mut shutdown => break,
            _ = tokio::time::sleep(delay) => {}
        }
    }

    status.send_replace(ConnectionStatus::Closed);
    info!("[Realtime] Subscription closed");
}

async fn send_frame(write: &mut WsWrite, frame: Frame, debug_frames: bool) -> Result<()> {
    if debug_frames {
        debug!("[Realtime] >>> {:?}", frame);
    }
    write
        .send(Message::Text(frame.encode()))
        .await
        .context("WebSocket send failed")
}

/// Read until the broker answers CONNECT.
async fn await_connected(read: &mut WsRead, write: &mut WsWrite, debug_frames: bool) -> Result<()> {
    while let Some(msg) = read.next().await {
        match msg.context("WebSocket error during handshake")? {
            Message::Text(text) => match Frame::parse(&text) {
                Ok(Some(frame)) if frame.command == Command::Connected => {
                    if debug_frames {
                        debug!("[Realtime] <<< {:?}", frame);
                    }
                    return Ok(());
                }
                Ok(Some(frame)) if frame.command == Command::Error => {
                    bail!(
                        "Broker rejected CONNECT: {}",
                        frame.get("message").unwrap_or(&frame.body)
                    );
                }
                Ok(_) => {}
                Err(e) => warn!("[Realtime] Unreadable frame during handshake: {}", e),
            },
            Message::Ping(data) => {
                let _ = write.send(Message::Pong(data)).await;
            }
            Message::Close(_) => bail!("Server closed WebSocket during handshake"),
            _ => {}
        }
    }
    bail!("WebSocket stream ended during handshake")
}

async fn run_session(
    config: &SubscriberConfig,
    topics: &[TopicHandler],
    ws: WsStream,
    status: &watch::Sender<ConnectionStatus>,
    shutdown: &mut oneshot::Receiver<()>,
) -> SessionEnd {
    let debug_frames = config.debug_frames;
    let (mut write, mut read) = ws.split();
    let host = config.url.host_str().unwrap_or("localhost").to_string();

    if let Err(e) = send_frame(&mut write, Frame::connect(&host), debug_frames).await {
        error!("[Realtime] Failed to send CONNECT: {}", e);
        return SessionEnd::Dropped { healthy: false };
    }

    let handshake = tokio::time::timeout(
        HANDSHAKE_TIMEOUT,
        await_connected(&mut read, &mut write, debug_frames),
    );
    let handshake = tokio::select! {
        _ = &mut *shutdown => return SessionEnd::Shutdown,
        res = handshake => res,
    };
    match handshake {
        Ok(Ok(())) => {}
        Ok(Err(e)) => {
            error!("[Realtime] STOMP handshake failed: {}", e);
            return SessionEnd::Dropped { healthy: false };
        }
        Err(_) => {
            error!("[Realtime] STOMP handshake timed out after {:?}", HANDSHAKE_TIMEOUT);
            return SessionEnd::Dropped { healthy: false };
        }
    }

    for (i, topic) in topics.iter().enumerate() {
        let frame = Frame::subscribe(&subscription_id(i), &topic.topic);
        if let Err(e) = send_frame(&mut write, frame, debug_frames).await {
            error!("[Realtime] Failed to subscribe to {}: {}", topic.topic, e);
            return SessionEnd::Dropped { healthy: false };
        }
    }
    status.send_replace(ConnectionStatus::Connected);
    info!("[Realtime] Connected; subscribed to {} topic(s)", topics.len());

    let started = Instant::now();
    let mut delivered = false;
    let healthy = |got_message: bool| got_message || started.elapsed() >= STABLE_SESSION;

    loop {
        tokio::select! {
            _ = &mut *shutdown => {
                let teardown = disconnect(&mut write, topics.len(), debug_frames);
                if tokio::time::timeout(TEARDOWN_TIMEOUT, teardown).await.is_err() {
                    warn!("[Realtime] Teardown timed out; dropping connection");
                }
                return SessionEnd::Shutdown;
            }
            msg = read.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => match dispatch_text(&text, topics, debug_frames) {
                        Dispatch::Delivered => delivered = true,
                        Dispatch::Skipped => {}
                        Dispatch::Fatal => return SessionEnd::Dropped { healthy: false },
                    },
                    Some(Ok(Message::Ping(data))) => {
                        let _ = write.send(Message::Pong(data)).await;
                    }
                    Some(Ok(Message::Close(_))) => {
                        warn!("[Realtime] Server closed WebSocket");
                        return SessionEnd::Dropped { healthy: healthy(delivered) };
                    }
                    Some(Err(e)) => {
                        error!("[Realtime] WebSocket error: {}", e);
                        return SessionEnd::Dropped { healthy: healthy(delivered) };
                    }
                    None => {
                        warn!("[Realtime] WebSocket stream ended");
                        return SessionEnd::Dropped { healthy: healthy(delivered) };
                    }
                    _ => {}
                }
            }
        }
    }
}

async fn disconnect(write: &mut WsWrite, topic_count: usize, debug_frames: bool) {
    for i in 0..topic_count {
        let _ = send_frame(write, Frame::unsubscribe(&subscription_id(i)), debug_frames).await;
    }
    let _ = send_frame(write, Frame::disconnect(), debug_frames).await;
    let _ = write.close().await;
}

fn subscription_id(index: usize) -> String {
    format!("sub-{}", index)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Dispatch {
    /// A handler received the message body
    Delivered,
    Skipped,
    /// The broker sent ERROR; the session is over
    Fatal,
}

/// Route one text message to its topic handler.
fn dispatch_text(text: &str, topics: &[TopicHandler], debug_frames: bool) -> Dispatch {
    let frame = match Frame::parse(text) {
        Ok(Some(frame)) => frame,
        Ok(None) => return Dispatch::Skipped,
        Err(e) => {
            warn!("[Realtime] Dropping unreadable frame: {}", e);
            return Dispatch::Skipped;
        }
    };
    if debug_frames {
        debug!("[Realtime] <<< {:?}", frame);
    }

    match frame.command {
        Command::Message => {}
        Command::Error => {
            error!(
                "[Realtime] Broker error: {}",
                frame.get("message").unwrap_or(&frame.body)
            );
            return Dispatch::Fatal;
        }
        _ => return Dispatch::Skipped,
    }

    let by_subscription = frame
        .get("subscription")
        .and_then(|id| id.strip_prefix("sub-"))
        .and_then(|i| i.parse::<usize>().ok())
        .and_then(|i| topics.get(i));
    let handler = by_subscription.or_else(|| {
        frame
            .get("destination")
            .and_then(|dest| topics.iter().find(|t| t.topic == dest))
    });
    let Some(handler) = handler else {
        debug!("[Realtime] Message for unknown subscription ignored");
        return Dispatch::Skipped;
    };

    match serde_json::from_str::<Value>(&frame.body) {
        Ok(value) => {
            handler.handle(value);
            Dispatch::Delivered
        }
        Err(e) => {
            warn!(
                "[Realtime] Error parsing message from topic {}: {}",
                handler.topic, e
            );
            Dispatch::Skipped
        }
    }
}
