//! Server-sent event stream with auto-reconnect.
//!
//! Connects to the backend's `/backend_nt/events` endpoint and streams
//! parsed [`EventEnvelope`]s through a [`tokio::sync::broadcast`]
//! channel. Reconnection with exponential backoff + jitter is handled
//! here -- it is the transport-level analogue of a browser
//! `EventSource`'s native retry, so consumers never see the gap, and
//! replayed events are safe because every store mutation downstream is
//! a versioned upsert.
//!
//! # Example
//!
//! ```rust,ignore
//! use homedeck_api::events::{EventStreamHandle, ReconnectConfig};
//! use tokio_util::sync::CancellationToken;
//!
//! let cancel = CancellationToken::new();
//! let handle = EventStreamHandle::connect(
//!     client.events_url(),
//!     client.http().clone(),
//!     ReconnectConfig::default(),
//!     cancel.clone(),
//! );
//! let mut rx = handle.subscribe();
//!
//! while let Ok(envelope) = rx.recv().await {
//!     println!("{:?} {}", envelope.event_type, envelope.key);
//! }
//!
//! handle.shutdown();
//! ```

use std::sync::Arc;
use std::time::Duration;

use futures_util::StreamExt;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use url::Url;

use crate::error::Error;

// ── Broadcast channel capacity ───────────────────────────────────────

const EVENT_CHANNEL_CAPACITY: usize = 1024;

// ── Envelope ─────────────────────────────────────────────────────────

/// What happened to the referenced entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventType {
    Insert,
    Update,
    Delete,
    Refresh,
}

/// Which entity table an event belongs to.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, strum::Display,
)]
pub enum ObjectType {
    Server,
    Plugin,
    DisabledPlugins,
    User,
    Status,
    ConditionCheckResult,
    Notification,
}

/// One entity change, as delivered on the push stream.
///
/// `value` is the serialized entity payload (empty for `Delete`);
/// `version` is the backend's version counter for the entity after the
/// change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventEnvelope {
    pub object_type: ObjectType,
    pub event_type: EventType,
    #[serde(default)]
    pub key_name: String,
    pub key: String,
    #[serde(default)]
    pub value: String,
    #[serde(default)]
    pub version: u64,
}

impl EventEnvelope {
    /// Parse the payload into a typed entity. `None` when the payload
    /// is empty (Delete events carry no value).
    pub fn payload<T: serde::de::DeserializeOwned>(&self) -> Result<Option<T>, Error> {
        if self.value.is_empty() {
            return Ok(None);
        }
        serde_json::from_str(&self.value)
            .map(Some)
            .map_err(|e| Error::Deserialization {
                message: e.to_string(),
                body: self.value.clone(),
            })
    }
}

// ── ReconnectConfig ──────────────────────────────────────────────────

/// Exponential backoff configuration for stream reconnection.
#[derive(Debug, Clone)]
pub struct ReconnectConfig {
    /// Delay before the first reconnection attempt. Default: 1s.
    pub initial_delay: Duration,

    /// Upper bound on backoff delay. Default: 30s.
    pub max_delay: Duration,

    /// Maximum reconnection attempts before giving up.
    /// `None` means retry forever.
    pub max_retries: Option<u32>,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            max_retries: None,
        }
    }
}

// ── EventStreamHandle ────────────────────────────────────────────────

/// Handle to a running SSE event stream.
///
/// Drop all receivers and call [`shutdown`](Self::shutdown) to tear
/// down the background task.
pub struct EventStreamHandle {
    event_rx: broadcast::Receiver<Arc<EventEnvelope>>,
    cancel: CancellationToken,
}

impl EventStreamHandle {
    /// Connect to the event endpoint and spawn the reconnection loop.
    ///
    /// Returns immediately once the background task is spawned; the
    /// first connection attempt happens asynchronously.
    pub fn connect(
        events_url: Url,
        http: reqwest::Client,
        reconnect: ReconnectConfig,
        cancel: CancellationToken,
    ) -> Self {
        let (event_tx, event_rx) = broadcast::channel(EVENT_CHANNEL_CAPACITY);

        let task_cancel = cancel.clone();
        tokio::spawn(async move {
            sse_loop(events_url, http, event_tx, reconnect, task_cancel).await;
        });

        Self { event_rx, cancel }
    }

    /// Get a new broadcast receiver for the envelope stream.
    ///
    /// Multiple consumers can subscribe concurrently. If a consumer
    /// falls behind, it receives [`broadcast::error::RecvError::Lagged`].
    pub fn subscribe(&self) -> broadcast::Receiver<Arc<EventEnvelope>> {
        self.event_rx.resubscribe()
    }

    /// Signal the background task to shut down gracefully.
    pub fn shutdown(&self) {
        self.cancel.cancel();
    }
}

// ── Background reconnection loop ─────────────────────────────────────

/// Main loop: connect → read → on error, backoff → reconnect.
async fn sse_loop(
    events_url: Url,
    http: reqwest::Client,
    event_tx: broadcast::Sender<Arc<EventEnvelope>>,
    reconnect: ReconnectConfig,
    cancel: CancellationToken,
) {
    let mut attempt: u32 = 0;

    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            result = connect_and_read(&events_url, &http, &event_tx, &cancel) => {
                match result {
                    // Clean disconnect (server closed the response).
                    // Reset the attempt counter and reconnect immediately.
                    Ok(()) => {
                        tracing::info!("event stream closed cleanly, reconnecting");
                        attempt = 0;
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, attempt, "event stream error");

                        if let Some(max) = reconnect.max_retries {
                            if attempt >= max {
                                tracing::error!(
                                    max_retries = max,
                                    "event stream reconnection limit reached, giving up"
                                );
                                break;
                            }
                        }

                        let delay = calculate_backoff(attempt, &reconnect);
                        tokio::select! {
                            biased;
                            () = cancel.cancelled() => break,
                            () = tokio::time::sleep(delay) => {}
                        }

                        attempt += 1;
                    }
                }
            }
        }
    }

    tracing::debug!("event stream loop exiting");
}

// ── Single connection lifecycle ──────────────────────────────────────

/// Establish one SSE connection and read frames until it drops.
async fn connect_and_read(
    url: &Url,
    http: &reqwest::Client,
    event_tx: &broadcast::Sender<Arc<EventEnvelope>>,
    cancel: &CancellationToken,
) -> Result<(), Error> {
    tracing::info!(url = %url, "connecting to event stream");

    let resp = http
        .get(url.clone())
        .header(reqwest::header::ACCEPT, "text/event-stream")
        .send()
        .await
        .map_err(|e| Error::Stream(e.to_string()))?;

    let status = resp.status();
    if !status.is_success() {
        return Err(Error::Stream(format!("unexpected status {status}")));
    }

    tracing::info!("event stream connected");

    let mut body = resp.bytes_stream();
    let mut decoder = SseDecoder::default();

    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => return Ok(()),
            chunk = body.next() => {
                match chunk {
                    Some(Ok(bytes)) => {
                        for data in decoder.push(&bytes) {
                            parse_and_broadcast(&data, event_tx);
                        }
                    }
                    Some(Err(e)) => return Err(Error::Stream(e.to_string())),
                    None => {
                        // Response body ended without an error.
                        tracing::info!("event stream ended");
                        return Ok(());
                    }
                }
            }
        }
    }
}

// ── SSE frame decoding ───────────────────────────────────────────────

/// Incremental decoder for the `text/event-stream` wire format.
///
/// Collects `data:` lines until a blank line terminates the frame;
/// `event:`, `id:`, `retry:` fields and comments are ignored because
/// the backend encodes everything in the JSON payload.
#[derive(Default)]
struct SseDecoder {
    buffer: String,
    data_lines: Vec<String>,
}

impl SseDecoder {
    /// Feed raw bytes; returns the data payloads of every frame that
    /// completed with this chunk.
    fn push(&mut self, bytes: &[u8]) -> Vec<String> {
        self.buffer.push_str(&String::from_utf8_lossy(bytes));

        let mut completed = Vec::new();
        while let Some(newline) = self.buffer.find('\n') {
            let line: String = self.buffer.drain(..=newline).collect();
            let line = line.trim_end_matches(['\n', '\r']);

            if line.is_empty() {
                if !self.data_lines.is_empty() {
                    completed.push(self.data_lines.join("\n"));
                    self.data_lines.clear();
                }
            } else if let Some(rest) = line.strip_prefix("data:") {
                self.data_lines.push(rest.strip_prefix(' ').unwrap_or(rest).to_owned());
            }
            // Other fields and ":" comments are dropped.
        }
        completed
    }
}

/// Parse one frame payload and broadcast the envelope.
///
/// Malformed payloads are dropped silently -- a bad message must never
/// take the stream down.
fn parse_and_broadcast(data: &str, event_tx: &broadcast::Sender<Arc<EventEnvelope>>) {
    let envelope: EventEnvelope = match serde_json::from_str(data) {
        Ok(e) => e,
        Err(e) => {
            tracing::debug!(error = %e, "failed to parse event envelope, dropping");
            return;
        }
    };

    // Ignore send errors -- just means no active subscribers right now.
    let _ = event_tx.send(Arc::new(envelope));
}

// ── Backoff calculation ──────────────────────────────────────────────

/// Exponential backoff with jitter.
///
/// `delay = min(initial * 2^attempt, max) + jitter`
///
/// Jitter is +-25% to spread out reconnection storms from multiple clients.
fn calculate_backoff(attempt: u32, config: &ReconnectConfig) -> Duration {
    #[allow(clippy::as_conversions)]
    let base = config.initial_delay.as_secs_f64() * 2.0_f64.powi(attempt.min(16) as i32);
    let capped = base.min(config.max_delay.as_secs_f64());

    // Deterministic "jitter" seeded from the attempt number.
    // Not cryptographically random, but good enough for backoff spread.
    let jitter_factor = 1.0 + 0.25 * (f64::from(attempt) * 7.3).sin();
    let with_jitter = (capped * jitter_factor).max(0.0);

    Duration::from_secs_f64(with_jitter)
}

// ── Tests ────────────────────────────────────────────────────────────

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn default_reconnect_config() {
        let config = ReconnectConfig::default();
        assert_eq!(config.initial_delay, Duration::from_secs(1));
        assert_eq!(config.max_delay, Duration::from_secs(30));
        assert!(config.max_retries.is_none());
    }

    #[test]
    fn backoff_increases_exponentially() {
        let config = ReconnectConfig::default();

        let d0 = calculate_backoff(0, &config);
        let d1 = calculate_backoff(1, &config);
        let d2 = calculate_backoff(2, &config);

        assert!(d1 > d0, "d1 ({d1:?}) should be greater than d0 ({d0:?})");
        assert!(d2 > d1, "d2 ({d2:?}) should be greater than d1 ({d1:?})");
    }

    #[test]
    fn backoff_caps_at_max_delay() {
        let config = ReconnectConfig {
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(10),
            max_retries: None,
        };

        let d10 = calculate_backoff(10, &config);
        // With jitter factor up to 1.25, max effective is 12.5s
        assert!(
            d10 <= Duration::from_secs(13),
            "delay at attempt 10 ({d10:?}) should be capped near max_delay"
        );
    }

    #[test]
    fn decoder_yields_complete_frames() {
        let mut decoder = SseDecoder::default();
        let frames = decoder.push(b"data: {\"a\":1}\n\n");
        assert_eq!(frames, vec!["{\"a\":1}".to_owned()]);
    }

    #[test]
    fn decoder_handles_split_chunks() {
        let mut decoder = SseDecoder::default();
        assert!(decoder.push(b"data: {\"a\"").is_empty());
        assert!(decoder.push(b":1}\n").is_empty());
        let frames = decoder.push(b"\n");
        assert_eq!(frames, vec!["{\"a\":1}".to_owned()]);
    }

    #[test]
    fn decoder_joins_multiline_data() {
        let mut decoder = SseDecoder::default();
        let frames = decoder.push(b"data: line1\ndata: line2\n\n");
        assert_eq!(frames, vec!["line1\nline2".to_owned()]);
    }

    #[test]
    fn decoder_ignores_comments_and_other_fields() {
        let mut decoder = SseDecoder::default();
        let frames = decoder.push(b": keepalive\nid: 7\nevent: change\ndata: x\n\n");
        assert_eq!(frames, vec!["x".to_owned()]);
    }

    #[test]
    fn decoder_handles_crlf() {
        let mut decoder = SseDecoder::default();
        let frames = decoder.push(b"data: x\r\n\r\n");
        assert_eq!(frames, vec!["x".to_owned()]);
    }

    #[test]
    fn parse_and_broadcast_envelope() {
        let (tx, mut rx) = broadcast::channel(16);

        let raw = serde_json::json!({
            "object_type": "Status",
            "event_type": "Update",
            "key_name": "ipaddress",
            "key": "10.0.0.5",
            "value": "{\"ipaddress\":\"10.0.0.5\",\"is_running\":false}",
            "version": 3
        });

        parse_and_broadcast(&raw.to_string(), &tx);

        let envelope = rx.try_recv().unwrap();
        assert_eq!(envelope.object_type, ObjectType::Status);
        assert_eq!(envelope.event_type, EventType::Update);
        assert_eq!(envelope.key, "10.0.0.5");
        assert_eq!(envelope.version, 3);
    }

    #[test]
    fn parse_and_broadcast_drops_malformed_json() {
        let (tx, mut rx) = broadcast::channel::<Arc<EventEnvelope>>(16);

        parse_and_broadcast("not json at all", &tx);
        parse_and_broadcast("{\"event_type\":\"Update\"}", &tx);

        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn delete_envelope_has_no_payload() {
        let envelope = EventEnvelope {
            object_type: ObjectType::Server,
            event_type: EventType::Delete,
            key_name: "ipaddress".into(),
            key: "10.0.0.5".into(),
            value: String::new(),
            version: 0,
        };
        let payload: Option<serde_json::Value> = envelope.payload().unwrap();
        assert!(payload.is_none());
    }
}
