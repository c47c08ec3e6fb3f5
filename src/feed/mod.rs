//! Market data feed module.
//!
//! This module handles:
//! - OKX public channel message types and decoding
//! - WebSocket connection, subscription, heartbeat and reconnection

pub mod messages;
pub mod websocket;

pub use messages::{decode_message, ChannelArg, FeedEvent, SubscribeRequest};
pub use websocket::{OkxBookFeed, ReconnectConfig, SessionEnd, WsStream};
