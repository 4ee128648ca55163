use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use thiserror::Error;
use tokio::sync::RwLock;
use tokio::time::{interval, sleep, sleep_until, Instant};
use tokio_tungstenite::{connect_async, tungstenite::protocol::Message};
use tracing::{debug, info, warn};
use url::Url;

use crate::market_queue::SharedQueue;
use crate::shared_types::{unix_now, ConnectionState, MarketEvent};

/// Fixed delay before a dropped connection is re-established. Venues are
/// long-running, so retries are unbounded.
pub const RECONNECT_DELAY: Duration = Duration::from_secs(30);

pub const USER_AGENT: &str = "OdlLive/1.0";

pub type SharedState = Arc<RwLock<ConnectionState>>;

pub fn shared_state() -> SharedState {
    Arc::new(RwLock::new(ConnectionState::default()))
}

#[derive(Debug, Error)]
pub enum VenueError {
    #[error("malformed payload: {0}")]
    Payload(#[from] serde_json::Error),
    #[error("unparseable timestamp: {0}")]
    Timestamp(#[from] chrono::ParseError),
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),
}

#[derive(Debug, Error)]
enum SessionError {
    #[error("bad endpoint: {0}")]
    Endpoint(#[from] url::ParseError),
    #[error("websocket failure: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),
    #[error("connection closed by server")]
    ClosedByServer,
}

/// What one inbound frame normalized to.
#[derive(Debug, Default)]
pub struct Inbound {
    pub events: Vec<MarketEvent>,
    /// The venue asked us to drop the connection and come back.
    pub reconnect_requested: bool,
}

impl Inbound {
    pub fn events(events: Vec<MarketEvent>) -> Self {
        Self {
            events,
            reconnect_requested: false,
        }
    }
}

/// A venue served over a persistent websocket. Implementations supply only
/// wire-format parsing and connection parameters; the run loop, heartbeat,
/// TTL eviction, and reconnect behavior are shared.
pub trait StreamingVenue: Send + Sync + 'static {
    fn name(&self) -> &'static str;
    fn url(&self) -> &str;
    /// JSON frames sent immediately after the socket opens.
    fn subscribe_frames(&self) -> Vec<String>;
    /// Normalize one text frame into zero or more events.
    fn parse(&self, text: &str, received_at: i64) -> Result<Inbound, VenueError>;
    /// How long the venue may stay silent before the connection is
    /// considered dead.
    fn silence_timeout(&self) -> Duration;
    /// Run the TTL pass after this many processed frames.
    fn evict_every(&self) -> u32;
}

/// A venue polled over plain HTTP. Trades and order-book snapshots are
/// fetched on independent intervals; the TTL pass runs on its own timer.
#[async_trait]
pub trait PollingVenue: Send + Sync + 'static {
    fn name(&self) -> &'static str;
    fn trade_interval(&self) -> Duration {
        Duration::from_secs(30)
    }
    fn book_interval(&self) -> Duration {
        Duration::from_secs(35)
    }
    fn ttl_interval(&self) -> Duration;
    async fn fetch_trades(&self, client: &reqwest::Client) -> Result<Vec<MarketEvent>, VenueError>;
    async fn fetch_book(&self, client: &reqwest::Client) -> Result<Vec<MarketEvent>, VenueError>;
}

/// Single-shot silence timer. Any inbound frame rearms it; once the
/// deadline passes the connection is forcibly terminated.
pub struct Heartbeat {
    timeout: Duration,
    deadline: Instant,
}

impl Heartbeat {
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            deadline: Instant::now() + timeout,
        }
    }

    pub fn beat(&mut self) {
        self.deadline = Instant::now() + self.timeout;
    }

    pub fn is_expired(&self) -> bool {
        Instant::now() >= self.deadline
    }

    pub async fn expired(&self) {
        sleep_until(self.deadline).await;
    }
}

async fn set_state(state: &SharedState, next: ConnectionState) {
    let mut current = state.write().await;
    if *current != next {
        *current = next;
    }
}

/// Runs a streaming venue until process termination: connect, subscribe,
/// ingest, and reconnect after a fixed delay whenever the session ends.
pub async fn run_streaming<V: StreamingVenue>(venue: V, queue: SharedQueue, state: SharedState) {
    info!(venue = venue.name(), url = venue.url(), "client connecting");
    loop {
        set_state(&state, ConnectionState::Connecting).await;
        match stream_session(&venue, &queue, &state).await {
            Ok(()) => info!(venue = venue.name(), "session ended, reconnecting"),
            Err(error) => warn!(venue = venue.name(), %error, "websocket failure"),
        }
        set_state(&state, ConnectionState::Closed).await;
        info!(
            venue = venue.name(),
            "connection closed, restarting in {} seconds",
            RECONNECT_DELAY.as_secs()
        );
        sleep(RECONNECT_DELAY).await;
    }
}

async fn stream_session<V: StreamingVenue>(
    venue: &V,
    queue: &SharedQueue,
    state: &SharedState,
) -> Result<(), SessionError> {
    let url = Url::parse(venue.url())?;
    let (ws_stream, _) = connect_async(url).await?;
    let (mut write, mut read) = ws_stream.split();

    for frame in venue.subscribe_frames() {
        write.send(Message::Text(frame)).await?;
    }
    set_state(state, ConnectionState::Open).await;

    let mut heartbeat = Heartbeat::new(venue.silence_timeout());
    let mut frames_since_evict: u32 = 0;

    loop {
        tokio::select! {
            msg = read.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        heartbeat.beat();
                        match venue.parse(&text, unix_now()) {
                            Ok(inbound) => {
                                set_state(state, ConnectionState::Open).await;
                                if !inbound.events.is_empty() {
                                    let mut locked = queue.write().await;
                                    for event in inbound.events {
                                        debug!(
                                            venue = venue.name(),
                                            side = ?event.side,
                                            quantity = %event.quantity,
                                            timestamp = event.timestamp,
                                            depth = locked.len() + 1,
                                            "event"
                                        );
                                        locked.push(event);
                                    }
                                }
                                if inbound.reconnect_requested {
                                    info!(venue = venue.name(), "server requested a reconnect");
                                    return Ok(());
                                }
                            }
                            Err(error) => {
                                warn!(venue = venue.name(), %error, "dropping frame");
                                set_state(state, ConnectionState::Degraded).await;
                            }
                        }
                        frames_since_evict += 1;
                        if frames_since_evict >= venue.evict_every() {
                            let mut locked = queue.write().await;
                            locked.evict_expired(unix_now());
                            debug!(venue = venue.name(), depth = locked.len(), "ttl pass");
                            frames_since_evict = 0;
                        }
                    }
                    Some(Ok(Message::Ping(payload))) => {
                        heartbeat.beat();
                        let _ = write.send(Message::Pong(payload)).await;
                    }
                    Some(Ok(Message::Close(_))) | None => return Err(SessionError::ClosedByServer),
                    Some(Err(error)) => return Err(error.into()),
                    _ => {}
                }
            }
            _ = heartbeat.expired() => {
                warn!(
                    venue = venue.name(),
                    "listener went silent for over {} seconds, restarting listener",
                    venue.silence_timeout().as_secs()
                );
                return Ok(());
            }
        }
    }
}

/// Runs a polling venue forever. A failed fetch marks the loop degraded and
/// the next interval retries; events carrying a venue id are de-duplicated
/// against the retained queue.
pub async fn run_polling<V: PollingVenue>(venue: V, queue: SharedQueue, state: SharedState) {
    info!(venue = venue.name(), "poll loop starting");
    let client = reqwest::Client::new();
    let mut trade_timer = interval(venue.trade_interval());
    let mut book_timer = interval(venue.book_interval());
    let mut ttl_timer = interval(venue.ttl_interval());
    set_state(&state, ConnectionState::Open).await;

    loop {
        tokio::select! {
            _ = trade_timer.tick() => {
                match venue.fetch_trades(&client).await {
                    Ok(events) => {
                        set_state(&state, ConnectionState::Open).await;
                        ingest(venue.name(), &queue, events).await;
                    }
                    Err(error) => {
                        warn!(venue = venue.name(), %error, "trade poll failed, will retry");
                        set_state(&state, ConnectionState::Degraded).await;
                    }
                }
            }
            _ = book_timer.tick() => {
                match venue.fetch_book(&client).await {
                    Ok(events) => {
                        set_state(&state, ConnectionState::Open).await;
                        ingest(venue.name(), &queue, events).await;
                    }
                    Err(error) => {
                        warn!(venue = venue.name(), %error, "order book poll failed, will retry");
                        set_state(&state, ConnectionState::Degraded).await;
                    }
                }
            }
            _ = ttl_timer.tick() => {
                let mut locked = queue.write().await;
                locked.evict_expired(unix_now());
                debug!(venue = venue.name(), depth = locked.len(), "ttl pass");
            }
        }
    }
}

async fn ingest(venue: &str, queue: &SharedQueue, events: Vec<MarketEvent>) {
    let mut locked = queue.write().await;
    for event in events {
        if let Some(id) = event.venue_event_id.as_deref() {
            if locked.contains_id(id) {
                continue;
            }
        }
        debug!(
            venue,
            side = ?event.side,
            quantity = %event.quantity,
            timestamp = event.timestamp,
            depth = locked.len() + 1,
            "event"
        );
        locked.push(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::market_queue::shared_queue;
    use crate::shared_types::Side;
    use rust_decimal_macros::dec;

    #[test]
    fn fresh_heartbeat_is_not_expired() {
        let heartbeat = Heartbeat::new(Duration::from_secs(90));
        assert!(!heartbeat.is_expired());
    }

    #[test]
    fn zero_timeout_expires_immediately() {
        let heartbeat = Heartbeat::new(Duration::ZERO);
        assert!(heartbeat.is_expired());
    }

    #[test]
    fn beat_rearms_the_deadline() {
        let mut heartbeat = Heartbeat::new(Duration::ZERO);
        assert!(heartbeat.is_expired());
        heartbeat.timeout = Duration::from_secs(90);
        heartbeat.beat();
        assert!(!heartbeat.is_expired());
    }

    struct SilentVenue {
        url: String,
    }

    impl StreamingVenue for SilentVenue {
        fn name(&self) -> &'static str {
            "silent"
        }
        fn url(&self) -> &str {
            &self.url
        }
        fn subscribe_frames(&self) -> Vec<String> {
            vec![r#"{"subscribe":true}"#.to_string()]
        }
        fn parse(&self, _text: &str, _received_at: i64) -> Result<Inbound, VenueError> {
            Ok(Inbound::default())
        }
        fn silence_timeout(&self) -> Duration {
            Duration::from_millis(200)
        }
        fn evict_every(&self) -> u32 {
            100
        }
    }

    #[tokio::test]
    async fn silence_timeout_terminates_the_session() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let server = tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let mut ws = tokio_tungstenite::accept_async(stream).await.unwrap();
            // Swallow the subscribe frame, then go silent.
            let subscribe = ws.next().await;
            assert!(subscribe.is_some());
            // Hold the connection open until the client gives up.
            let _ = tokio::time::timeout(Duration::from_secs(5), ws.next()).await;
        });

        let venue = SilentVenue {
            url: format!("ws://{addr}"),
        };
        let queue = shared_queue();
        let state = shared_state();

        let result = tokio::time::timeout(
            Duration::from_secs(5),
            stream_session(&venue, &queue, &state),
        )
        .await
        .expect("session should terminate itself on silence");

        // Forced termination is the clean path that schedules a reconnect.
        assert!(result.is_ok());
        server.abort();
    }

    #[tokio::test]
    async fn ingest_skips_duplicate_venue_ids() {
        let queue = shared_queue();
        let event = MarketEvent {
            side: Side::Buy,
            quantity: dec!(10),
            timestamp: 1000,
            venue_event_id: Some("t-1".to_string()),
        };
        ingest("test", &queue, vec![event.clone()]).await;
        ingest("test", &queue, vec![event]).await;
        assert_eq!(queue.read().await.len(), 1);
    }

    #[tokio::test]
    async fn ingest_keeps_events_without_ids() {
        let queue = shared_queue();
        let event = MarketEvent {
            side: Side::Sell,
            quantity: dec!(5),
            timestamp: 1000,
            venue_event_id: None,
        };
        ingest("test", &queue, vec![event.clone()]).await;
        ingest("test", &queue, vec![event]).await;
        assert_eq!(queue.read().await.len(), 2);
    }
}
