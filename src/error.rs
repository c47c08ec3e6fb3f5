//! Unified error types for the trade simulator.

use rust_decimal::Decimal;
use thiserror::Error;

/// Unified error type for the trade simulator.
#[derive(Error, Debug)]
pub enum SimError {
    /// Configuration loading error.
    #[error("configuration error: {0}")]
    Config(#[from] envy::Error),

    /// Configuration loaded but failed validation.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Execution simulation error.
    #[error("simulation error: {0}")]
    Simulation(#[from] SimulationError),

    /// WebSocket error.
    #[error("websocket error: {0}")]
    WebSocket(#[from] WsError),
}

/// Execution simulation errors.
///
/// Thin liquidity and an empty book are reported through the fill report,
/// never through this type.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SimulationError {
    /// Requested quantity was zero or negative.
    #[error("invalid quantity: {0} (must be positive)")]
    InvalidQuantity(Decimal),
}

/// WebSocket connection and message errors.
#[derive(Error, Debug)]
pub enum WsError {
    /// Connection failed.
    #[error("websocket connection failed: {0}")]
    ConnectionFailed(String),

    /// Connection closed unexpectedly.
    #[error("websocket connection closed: code={code:?}, reason={reason}")]
    ConnectionClosed {
        /// Close code.
        code: Option<u16>,
        /// Close reason.
        reason: String,
    },

    /// Message parsing failed.
    #[error("failed to parse websocket message: {0}")]
    ParseError(String),

    /// Send failed.
    #[error("failed to send websocket message: {0}")]
    SendFailed(String),

    /// The venue rejected the subscription request.
    #[error("subscription rejected: code={code}, msg={msg}")]
    Subscription {
        /// Venue error code.
        code: String,
        /// Venue error message.
        msg: String,
    },

    /// Tungstenite error.
    #[error("tungstenite error: {0}")]
    Tungstenite(#[from] tokio_tungstenite::tungstenite::Error),
}

/// Convenient Result type alias.
pub type Result<T> = std::result::Result<T, SimError>;

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn simulation_error_converts_into_sim_error() {
        let err: SimError = SimulationError::InvalidQuantity(dec!(-1)).into();
        assert!(matches!(
            err,
            SimError::Simulation(SimulationError::InvalidQuantity(_))
        ));
        assert_eq!(
            err.to_string(),
            "simulation error: invalid quantity: -1 (must be positive)"
        );
    }

    #[test]
    fn subscription_error_message_includes_code() {
        let err = WsError::Subscription {
            code: "60018".to_string(),
            msg: "doesn't exist".to_string(),
        };
        assert!(err.to_string().contains("60018"));
    }
}
