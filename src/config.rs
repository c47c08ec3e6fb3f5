//! Application configuration loaded from environment variables.

use rust_decimal::Decimal;
use serde::Deserialize;
use url::Url;

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    // === Market Data Feed ===
    /// OKX public WebSocket endpoint.
    #[serde(default = "default_ws_url")]
    pub okx_ws_url: String,

    /// Instrument to mirror (e.g., BTC-USDT).
    #[serde(default = "default_inst_id")]
    pub inst_id: String,

    /// Order book channel (books5, books, bbo-tbt).
    #[serde(default = "default_book_channel")]
    pub book_channel: String,

    // === Simulation Parameters ===
    /// Taker fee as a fraction of notional (0.0006 = 0.06%).
    #[serde(default = "default_taker_fee_rate")]
    pub taker_fee_rate: Decimal,

    /// Quantity simulated on each round, in base units.
    #[serde(default = "default_sim_quantity")]
    pub sim_quantity: Decimal,

    /// Seconds between simulation rounds.
    #[serde(default = "default_sim_interval")]
    pub sim_interval_seconds: u64,

    // === WebSocket Configuration ===
    /// Maximum reconnect backoff in seconds.
    #[serde(default = "default_reconnect_max_delay")]
    pub ws_reconnect_max_delay_s: u64,

    /// Seconds between client `ping` frames. OKX drops idle links after 30s.
    #[serde(default = "default_heartbeat_interval")]
    pub ws_heartbeat_interval_s: u64,

    /// Bounded capacity of the feed -> book channel.
    #[serde(default = "default_channel_capacity")]
    pub feed_channel_capacity: usize,

    // === Server Configuration ===
    /// HTTP server port for health/metrics endpoints.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Serve the HTTP API.
    #[serde(default = "default_true")]
    pub enable_api: bool,

    /// Log level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub rust_log: String,

    /// Enable verbose logging.
    #[serde(default)]
    pub verbose: bool,
}

fn default_ws_url() -> String {
    "wss://ws.okx.com:8443/ws/v5/public".to_string()
}

fn default_inst_id() -> String {
    "BTC-USDT".to_string()
}

fn default_book_channel() -> String {
    "books5".to_string()
}

fn default_taker_fee_rate() -> Decimal {
    Decimal::new(6, 4) // 0.0006
}

fn default_sim_quantity() -> Decimal {
    Decimal::new(1, 1) // 0.1
}

fn default_sim_interval() -> u64 {
    5
}

fn default_reconnect_max_delay() -> u64 {
    30
}

fn default_heartbeat_interval() -> u64 {
    25
}

fn default_channel_capacity() -> usize {
    1024
}

fn default_port() -> u16 {
    8080
}

fn default_true() -> bool {
    true
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            okx_ws_url: default_ws_url(),
            inst_id: default_inst_id(),
            book_channel: default_book_channel(),
            taker_fee_rate: default_taker_fee_rate(),
            sim_quantity: default_sim_quantity(),
            sim_interval_seconds: default_sim_interval(),
            ws_reconnect_max_delay_s: default_reconnect_max_delay(),
            ws_heartbeat_interval_s: default_heartbeat_interval(),
            feed_channel_capacity: default_channel_capacity(),
            port: default_port(),
            enable_api: default_true(),
            rust_log: default_log_level(),
            verbose: false,
        }
    }
}

impl Config {
    /// Load configuration from environment, reading .env file first.
    pub fn load() -> Result<Self, envy::Error> {
        dotenvy::dotenv().ok();
        envy::from_env()
    }

    /// Check if the configuration is valid.
    pub fn validate(&self) -> Result<(), String> {
        let url = Url::parse(&self.okx_ws_url)
            .map_err(|e| format!("OKX_WS_URL is not a valid URL: {}", e))?;
        if !matches!(url.scheme(), "ws" | "wss") {
            return Err("OKX_WS_URL must use ws:// or wss://".to_string());
        }

        if self.inst_id.trim().is_empty() {
            return Err("INST_ID is required".to_string());
        }

        if self.book_channel.trim().is_empty() {
            return Err("BOOK_CHANNEL is required".to_string());
        }

        if self.taker_fee_rate < Decimal::ZERO || self.taker_fee_rate >= Decimal::ONE {
            return Err("TAKER_FEE_RATE must be in [0, 1)".to_string());
        }

        if self.sim_quantity <= Decimal::ZERO {
            return Err("SIM_QUANTITY must be positive".to_string());
        }

        if self.sim_interval_seconds == 0 {
            return Err("SIM_INTERVAL_SECONDS must be at least 1".to_string());
        }

        if self.ws_heartbeat_interval_s == 0 {
            return Err("WS_HEARTBEAT_INTERVAL_S must be at least 1".to_string());
        }

        if self.feed_channel_capacity == 0 {
            return Err("FEED_CHANNEL_CAPACITY must be at least 1".to_string());
        }

        Ok(())
    }

    /// Tracing filter directive: crate-level debug when verbose, else `RUST_LOG`.
    pub fn log_directive(&self, verbose_flag: bool) -> String {
        if verbose_flag || self.verbose {
            "okx_trade_sim=debug,info".to_string()
        } else {
            self.rust_log.clone()
        }
    }

    /// Base currency of the instrument (BTC for BTC-USDT).
    pub fn base_currency(&self) -> &str {
        self.inst_id.split('-').next().unwrap_or(&self.inst_id)
    }
}
