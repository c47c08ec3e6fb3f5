//! WebSocket client for the OKX public order book feed.
//!
//! Features:
//! - Automatic reconnection with exponential backoff
//! - Text `ping` heartbeat as required by OKX
//! - Clean shutdown: Close frame, then the update channel is dropped

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_tungstenite::{connect_async, tungstenite::Message, MaybeTlsStream, WebSocketStream};
use tracing::{debug, error, info, warn};

use super::messages::{decode_message, FeedEvent, SubscribeRequest};
use crate::config::Config;
use crate::error::WsError;
use crate::metrics;
use crate::orderbook::BookUpdate;

/// Reconnection configuration for WebSocket.
#[derive(Debug, Clone)]
pub struct ReconnectConfig {
    /// Initial backoff delay in milliseconds.
    pub initial_delay_ms: u64,
    /// Maximum backoff delay in seconds.
    pub max_delay_s: u64,
    /// Backoff multiplier (e.g., 2.0 for exponential).
    pub backoff_multiplier: f64,
    /// Heartbeat interval in seconds.
    pub heartbeat_interval_s: u64,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            initial_delay_ms: 1000,
            max_delay_s: 30,
            backoff_multiplier: 2.0,
            heartbeat_interval_s: 25,
        }
    }
}

impl ReconnectConfig {
    /// Create from config values.
    pub fn from_config(max_delay_s: u64, heartbeat_interval_s: u64) -> Self {
        Self {
            max_delay_s,
            heartbeat_interval_s,
            ..Default::default()
        }
    }

    /// Calculate next delay with exponential backoff.
    pub fn next_delay(&self, attempt: u32) -> Duration {
        let delay_ms = self.initial_delay_ms as f64 * self.backoff_multiplier.powi(attempt as i32);
        let max_delay_ms = self.max_delay_s * 1000;
        let clamped_ms = delay_ms.min(max_delay_ms as f64) as u64;
        Duration::from_millis(clamped_ms)
    }

    fn heartbeat(&self) -> Duration {
        Duration::from_secs(self.heartbeat_interval_s.max(1))
    }
}

/// Client side of an OKX connection.
pub type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Why a connected session ended without an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEnd {
    /// Shutdown was requested.
    Shutdown,
    /// The book writer dropped its receiver.
    ChannelClosed,
    /// The server closed the stream.
    StreamEnded,
}

/// Order book feed for one OKX instrument.
pub struct OkxBookFeed {
    /// WebSocket endpoint.
    ws_url: String,
    /// Instrument id.
    inst_id: String,
    /// Book channel.
    channel: String,
    /// Reconnection configuration.
    reconnect_config: ReconnectConfig,
    /// Connection state (atomic for thread safety).
    connected: Arc<AtomicBool>,
    /// Reconnection attempt counter.
    reconnect_attempts: Arc<AtomicU64>,
    /// Book messages forwarded since start.
    messages_forwarded: Arc<AtomicU64>,
}

impl OkxBookFeed {
    /// Create a new feed client.
    pub fn new(
        ws_url: impl Into<String>,
        inst_id: impl Into<String>,
        channel: impl Into<String>,
    ) -> Self {
        Self::with_reconnect_config(ws_url, inst_id, channel, ReconnectConfig::default())
    }

    /// Create with custom reconnection config.
    pub fn with_reconnect_config(
        ws_url: impl Into<String>,
        inst_id: impl Into<String>,
        channel: impl Into<String>,
        reconnect_config: ReconnectConfig,
    ) -> Self {
        Self {
            ws_url: ws_url.into(),
            inst_id: inst_id.into(),
            channel: channel.into(),
            reconnect_config,
            connected: Arc::new(AtomicBool::new(false)),
            reconnect_attempts: Arc::new(AtomicU64::new(0)),
            messages_forwarded: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Build from application configuration.
    pub fn from_config(config: &Config) -> Self {
        Self::with_reconnect_config(
            config.okx_ws_url.clone(),
            config.inst_id.clone(),
            config.book_channel.clone(),
            ReconnectConfig::from_config(
                config.ws_reconnect_max_delay_s,
                config.ws_heartbeat_interval_s,
            ),
        )
    }

    /// Check if currently connected.
    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    /// Get reconnection attempt count.
    pub fn reconnect_attempts(&self) -> u64 {
        self.reconnect_attempts.load(Ordering::SeqCst)
    }

    /// Book messages forwarded to the writer so far.
    pub fn messages_forwarded(&self) -> u64 {
        self.messages_forwarded.load(Ordering::SeqCst)
    }

    /// Open the connection and send the subscription.
    pub async fn connect(&self) -> Result<WsStream, WsError> {
        info!(url = %self.ws_url, inst_id = %self.inst_id, channel = %self.channel, "Connecting to WebSocket");

        let (mut ws_stream, _) = connect_async(self.ws_url.as_str())
            .await
            .map_err(|e| WsError::ConnectionFailed(e.to_string()))?;

        let subscribe = SubscribeRequest::subscribe(&self.channel, &self.inst_id).to_json()?;
        ws_stream
            .send(Message::Text(subscribe))
            .await
            .map_err(|e| WsError::SendFailed(e.to_string()))?;

        info!(inst_id = %self.inst_id, "Subscription sent");
        Ok(ws_stream)
    }

    /// Forward book updates from a subscribed connection until the session ends.
    pub async fn run_session(
        &self,
        ws_stream: WsStream,
        updates: &mpsc::Sender<BookUpdate>,
        shutdown: &mut watch::Receiver<bool>,
    ) -> Result<SessionEnd, WsError> {
        let (mut write, mut read) = ws_stream.split();
        self.connected.store(true, Ordering::SeqCst);

        let period = self.reconnect_config.heartbeat();
        let mut heartbeat = tokio::time::interval_at(tokio::time::Instant::now() + period, period);

        let end = loop {
            tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        info!("Shutdown requested, closing WebSocket");
                        let unsubscribe = SubscribeRequest::unsubscribe(&self.channel, &self.inst_id);
                        if let Ok(json) = unsubscribe.to_json() {
                            let _ = write.send(Message::Text(json)).await;
                        }
                        let _ = write.send(Message::Close(None)).await;
                        break Ok(SessionEnd::Shutdown);
                    }
                }
                _ = heartbeat.tick() => {
                    debug!("Sending ping");
                    if let Err(e) = write.send(Message::Text("ping".to_string())).await {
                        break Err(WsError::SendFailed(e.to_string()));
                    }
                }
                msg = read.next() => {
                    // Any inbound traffic counts as liveness.
                    heartbeat.reset();

                    match msg {
                        Some(Ok(Message::Text(text))) => {
                            let start = Instant::now();
                            metrics::inc_ws_messages_received();
                            let outcome = self.handle_text(&text, updates).await;
                            metrics::record_ws_message_latency(start);
                            match outcome {
                                Ok(None) => {}
                                Ok(Some(end)) => break Ok(end),
                                Err(e) => break Err(e),
                            }
                        }
                        Some(Ok(Message::Ping(_))) => {
                            // tungstenite queues the pong automatically
                            debug!("Received ping");
                        }
                        Some(Ok(Message::Close(frame))) => {
                            warn!(frame = ?frame, "WebSocket closed by server");
                            break match frame {
                                Some(frame) => Err(WsError::ConnectionClosed {
                                    code: Some(u16::from(frame.code)),
                                    reason: frame.reason.to_string(),
                                }),
                                None => Ok(SessionEnd::StreamEnded),
                            };
                        }
                        Some(Ok(_)) => {}
                        Some(Err(e)) => {
                            error!(error = %e, "WebSocket error");
                            break Err(WsError::Tungstenite(e));
                        }
                        None => break Ok(SessionEnd::StreamEnded),
                    }
                }
            }
        };

        self.connected.store(false, Ordering::SeqCst);
        end
    }

    async fn handle_text(
        &self,
        text: &str,
        updates: &mpsc::Sender<BookUpdate>,
    ) -> Result<Option<SessionEnd>, WsError> {
        match decode_message(text) {
            Ok(FeedEvent::Book(batch)) => {
                for update in batch {
                    if updates.send(update).await.is_err() {
                        info!("Channel closed, stopping WebSocket");
                        return Ok(Some(SessionEnd::ChannelClosed));
                    }
                    self.messages_forwarded.fetch_add(1, Ordering::SeqCst);
                }
                Ok(None)
            }
            Ok(FeedEvent::Subscribed(arg)) => {
                info!(channel = %arg.channel, inst_id = %arg.inst_id, "Subscribed");
                Ok(None)
            }
            Ok(FeedEvent::Error { code, msg }) => {
                error!(%code, %msg, "Venue rejected request");
                Err(WsError::Subscription { code, msg })
            }
            Ok(FeedEvent::Pong) => {
                debug!("Received pong");
                Ok(None)
            }
            Ok(FeedEvent::Other) => Ok(None),
            Err(e) => {
                warn!(error = %e, "Ignoring undecodable frame");
                Ok(None)
            }
        }
    }

    /// Run with automatic reconnection until shutdown.
    ///
    /// Returns the receiving end of the update channel and the feed task.
    /// The channel closes once the task exits.
    pub fn spawn(
        self: Arc<Self>,
        capacity: usize,
        mut shutdown: watch::Receiver<bool>,
    ) -> (mpsc::Receiver<BookUpdate>, JoinHandle<()>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let feed = self;

        let handle = tokio::spawn(async move {
            let mut attempt = 0u32;

            loop {
                if *shutdown.borrow() {
                    break;
                }

                info!(attempt = attempt, "Attempting WebSocket connection");

                match feed.connect().await {
                    Ok(ws_stream) => {
                        attempt = 0; // Reset on successful connection

                        match feed.run_session(ws_stream, &tx, &mut shutdown).await {
                            Ok(SessionEnd::Shutdown) | Ok(SessionEnd::ChannelClosed) => break,
                            Ok(SessionEnd::StreamEnded) => {
                                warn!("WebSocket stream ended, will reconnect");
                            }
                            Err(e) => {
                                error!(error = %e, "WebSocket session failed");
                            }
                        }
                    }
                    Err(e) => {
                        error!(error = %e, attempt = attempt, "WebSocket connection failed");
                    }
                }

                // Calculate backoff delay
                let delay = feed.reconnect_config.next_delay(attempt);
                feed.reconnect_attempts.fetch_add(1, Ordering::SeqCst);
                metrics::inc_ws_reconnects();

                info!(delay_ms = delay.as_millis() as u64, "Reconnecting after delay");
                tokio::select! {
                    _ = tokio::time::sleep(delay) => {}
                    changed = shutdown.changed() => {
                        if changed.is_err() || *shutdown.borrow() {
                            break;
                        }
                    }
                }

                attempt = attempt.saturating_add(1);
            }

            info!("Feed stopped");
        });

        (rx, handle)
    }
}
