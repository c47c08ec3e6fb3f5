//! OKX v5 public WebSocket messages for order book channels.
//!
//! Push payloads carry each level as `[price, size, ...]` strings; the extra
//! fields (deprecated liquidation count, order count) are ignored, as are the
//! `checksum` and `seqId` fields.
//!
//! Each entry of a push's `data` array becomes its own [`BookUpdate`], and the
//! book applies each one under its own write lock. Readers therefore see whole
//! payloads, not whole frames. `books5` sends one payload per push.

use std::str::FromStr;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::WsError;
use crate::metrics;
use crate::orderbook::{BookUpdate, LevelBatch, LevelUpdate, Side, UpdateKind};

/// Channel + instrument pair used in subscribe requests and push envelopes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChannelArg {
    /// Channel name (books5, books, bbo-tbt).
    pub channel: String,
    /// Instrument id (BTC-USDT).
    pub inst_id: String,
}

/// Subscription request.
#[derive(Debug, Serialize)]
pub struct SubscribeRequest {
    /// Always "subscribe" or "unsubscribe".
    op: &'static str,
    /// Channels to (un)subscribe.
    args: Vec<ChannelArg>,
}

impl SubscribeRequest {
    /// Subscribe to one channel.
    pub fn subscribe(channel: impl Into<String>, inst_id: impl Into<String>) -> Self {
        Self {
            op: "subscribe",
            args: vec![ChannelArg {
                channel: channel.into(),
                inst_id: inst_id.into(),
            }],
        }
    }

    /// Unsubscribe from one channel.
    pub fn unsubscribe(channel: impl Into<String>, inst_id: impl Into<String>) -> Self {
        Self {
            op: "unsubscribe",
            args: vec![ChannelArg {
                channel: channel.into(),
                inst_id: inst_id.into(),
            }],
        }
    }

    /// Serialize to the JSON text frame.
    pub fn to_json(&self) -> Result<String, WsError> {
        serde_json::to_string(self).map_err(|e| WsError::SendFailed(e.to_string()))
    }
}

/// Raw envelope: either an event reply or a data push.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OkxMessage {
    /// Event type for replies: subscribe, unsubscribe, error.
    pub event: Option<String>,
    /// Error code for error events.
    pub code: Option<String>,
    /// Error message for error events.
    pub msg: Option<String>,
    /// Channel the message belongs to.
    pub arg: Option<ChannelArg>,
    /// "snapshot" or "update" on incremental channels; absent on books5.
    pub action: Option<String>,
    /// Book payloads.
    pub data: Option<Vec<BookData>>,
}

/// One book payload.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookData {
    /// Ask levels.
    #[serde(default)]
    pub asks: Vec<Vec<String>>,
    /// Bid levels.
    #[serde(default)]
    pub bids: Vec<Vec<String>>,
    /// Venue timestamp in milliseconds, as a string.
    pub ts: Option<String>,
}

/// Decoded meaning of one text frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FeedEvent {
    /// Book updates, one per payload.
    Book(Vec<BookUpdate>),
    /// Subscription acknowledged.
    Subscribed(ChannelArg),
    /// Venue reported an error.
    Error {
        /// Error code.
        code: String,
        /// Error message.
        msg: String,
    },
    /// Reply to our `ping`.
    Pong,
    /// Anything else (unsubscribe acks, notices).
    Other,
}

/// Decode a text frame.
pub fn decode_message(text: &str) -> Result<FeedEvent, WsError> {
    if text == "pong" {
        return Ok(FeedEvent::Pong);
    }

    let message: OkxMessage =
        serde_json::from_str(text).map_err(|e| WsError::ParseError(e.to_string()))?;

    match message.event.as_deref() {
        Some("subscribe") => {
            let arg = message
                .arg
                .ok_or_else(|| WsError::ParseError("subscribe event without arg".to_string()))?;
            return Ok(FeedEvent::Subscribed(arg));
        }
        Some("error") => {
            return Ok(FeedEvent::Error {
                code: message.code.unwrap_or_default(),
                msg: message.msg.unwrap_or_default(),
            });
        }
        Some(_) => return Ok(FeedEvent::Other),
        None => {}
    }

    let Some(data) = message.data else {
        return Ok(FeedEvent::Other);
    };

    let kind = match message.action.as_deref() {
        Some("update") => UpdateKind::Delta,
        // books5 and bbo-tbt push full images without an action.
        _ => UpdateKind::Snapshot,
    };

    Ok(FeedEvent::Book(
        data.iter().map(|payload| to_book_update(kind, payload)).collect(),
    ))
}

/// Convert one payload, dropping malformed levels.
pub fn to_book_update(kind: UpdateKind, payload: &BookData) -> BookUpdate {
    let mut levels = LevelBatch::new();
    levels.extend(payload.bids.iter().filter_map(|raw| parse_level(Side::Bid, raw)));
    levels.extend(payload.asks.iter().filter_map(|raw| parse_level(Side::Ask, raw)));

    BookUpdate {
        kind,
        ts_ms: payload.ts.as_deref().and_then(|ts| ts.parse().ok()),
        levels,
    }
}

/// Parse `[price, size, ...]` into a level update.
///
/// Returns `None` for short rows, unparseable numbers, a non-positive price
/// or a negative size.
pub fn parse_level(side: Side, raw: &[String]) -> Option<LevelUpdate> {
    let (Some(price), Some(size)) = (raw.first(), raw.get(1)) else {
        warn!(%side, ?raw, "Dropping short level row");
        metrics::inc_levels_rejected();
        return None;
    };

    let parsed = Decimal::from_str(price)
        .ok()
        .zip(Decimal::from_str(size).ok());

    match parsed {
        Some((price, size)) if price > Decimal::ZERO && size >= Decimal::ZERO => {
            Some(LevelUpdate { side, price, size })
        }
        _ => {
            warn!(%side, ?raw, "Dropping malformed level");
            metrics::inc_levels_rejected();
            None
        }
    }
}
