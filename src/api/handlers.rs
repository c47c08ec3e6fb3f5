//! HTTP API handlers.

use std::str::FromStr;

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use metrics_exporter_prometheus::PrometheusHandle;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::orderbook::{PriceLevel, SharedOrderBook, Side};
use crate::simulator::{Direction, ExecutionSimulator, FillReport, LatestRound};

/// Default number of levels per side returned by the book endpoint.
pub const DEFAULT_BOOK_DEPTH: usize = 5;
/// Upper bound on the book endpoint depth.
pub const MAX_BOOK_DEPTH: usize = 50;

/// Application state shared with handlers.
#[derive(Clone)]
pub struct AppState {
    /// Instrument being mirrored.
    pub inst_id: String,
    /// Live book.
    pub book: SharedOrderBook,
    /// Simulator over the live book.
    pub simulator: ExecutionSimulator<SharedOrderBook>,
    /// Latest scheduled round.
    pub latest: LatestRound,
    /// Prometheus renderer, when the recorder is installed.
    pub prometheus: Option<PrometheusHandle>,
}

impl AppState {
    /// Create new app state.
    pub fn new(
        inst_id: impl Into<String>,
        simulator: ExecutionSimulator<SharedOrderBook>,
        latest: LatestRound,
    ) -> Self {
        Self {
            inst_id: inst_id.into(),
            book: simulator.book().clone(),
            simulator,
            latest,
            prometheus: None,
        }
    }

    /// Attach a Prometheus handle for `/metrics`.
    pub fn with_prometheus(mut self, handle: PrometheusHandle) -> Self {
        self.prometheus = Some(handle);
        self
    }

    /// Ready once both sides of the book have liquidity.
    pub fn is_ready(&self) -> bool {
        self.book.is_ready()
    }
}

/// JSON error body.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    /// Human-readable reason.
    pub error: String,
}

/// Handler error mapped to a status code.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }

    fn not_found(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            message: message.into(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (
            self.status,
            Json(ErrorResponse {
                error: self.message,
            }),
        )
            .into_response()
    }
}

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// Status: "ok".
    pub status: &'static str,
}

/// Readiness check response.
#[derive(Debug, Serialize)]
pub struct ReadyResponse {
    /// Whether service is ready.
    pub ready: bool,
    /// Instrument being mirrored.
    pub inst_id: String,
}

/// Book depth response.
#[derive(Debug, Serialize)]
pub struct BookResponse {
    /// Instrument being mirrored.
    pub inst_id: String,
    /// Best bids, highest first.
    pub bids: Vec<PriceLevel>,
    /// Best asks, lowest first.
    pub asks: Vec<PriceLevel>,
    /// Best ask minus best bid.
    pub spread: Option<Decimal>,
    /// Midpoint of best bid and ask.
    pub mid_price: Option<Decimal>,
    /// Best ask at or below best bid.
    pub crossed: bool,
    /// Resting bid levels, whole book.
    pub bid_levels: usize,
    /// Resting ask levels, whole book.
    pub ask_levels: usize,
    /// Total resting bid size.
    pub bid_depth: Decimal,
    /// Total resting ask size.
    pub ask_depth: Decimal,
    /// Venue timestamp of the last update (ms).
    pub last_update_ms: Option<i64>,
}

/// Query for the book endpoint.
#[derive(Debug, Deserialize)]
pub struct BookQuery {
    /// Levels per side.
    pub depth: Option<usize>,
}

/// Query for the simulate endpoint.
#[derive(Debug, Deserialize)]
pub struct SimulateQuery {
    /// "buy" or "sell".
    pub direction: Option<String>,
    /// Quantity in base units.
    pub quantity: Option<String>,
}

/// Health check handler - always returns 200.
pub async fn health() -> impl IntoResponse {
    Json(HealthResponse { status: "ok" })
}

/// Readiness check handler - returns 200 if ready, 503 otherwise.
pub async fn ready(State(state): State<AppState>) -> impl IntoResponse {
    let is_ready = state.is_ready();

    let response = ReadyResponse {
        ready: is_ready,
        inst_id: state.inst_id.clone(),
    };

    if is_ready {
        (StatusCode::OK, Json(response))
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, Json(response))
    }
}

/// Book handler - returns the top levels of both sides.
pub async fn book(
    State(state): State<AppState>,
    Query(query): Query<BookQuery>,
) -> Json<BookResponse> {
    let depth = query
        .depth
        .unwrap_or(DEFAULT_BOOK_DEPTH)
        .clamp(1, MAX_BOOK_DEPTH);

    let response = state.book.with_book(|book| BookResponse {
        inst_id: state.inst_id.clone(),
        bids: book.top_bids(depth),
        asks: book.top_asks(depth),
        spread: book.spread(),
        mid_price: book.mid_price(),
        crossed: book.is_crossed(),
        bid_levels: book.level_count(Side::Bid),
        ask_levels: book.level_count(Side::Ask),
        bid_depth: book.bid_depth(),
        ask_depth: book.ask_depth(),
        last_update_ms: book.last_update_ms(),
    });

    Json(response)
}

/// Simulate handler - prices one market order against the live book.
pub async fn simulate(
    State(state): State<AppState>,
    Query(query): Query<SimulateQuery>,
) -> Result<Json<FillReport>, ApiError> {
    let direction = query
        .direction
        .as_deref()
        .ok_or_else(|| ApiError::bad_request("direction is required"))
        .and_then(|d| {
            Direction::from_str(d)
                .map_err(|_| ApiError::bad_request(format!("unknown direction: {}", d)))
        })?;

    let quantity = query
        .quantity
        .as_deref()
        .ok_or_else(|| ApiError::bad_request("quantity is required"))
        .and_then(|q| {
            Decimal::from_str(q)
                .map_err(|_| ApiError::bad_request(format!("quantity is not a number: {}", q)))
        })?;

    state
        .simulator
        .simulate(direction, quantity)
        .map(Json)
        .map_err(|e| ApiError::bad_request(e.to_string()))
}

/// Latest round handler - 404 until the scheduler has run once.
pub async fn latest_round(State(state): State<AppState>) -> Response {
    match state.latest.read().await.clone() {
        Some(round) => Json(round).into_response(),
        None => ApiError::not_found("no simulation round yet").into_response(),
    }
}

/// Prometheus exposition handler.
pub async fn metrics(State(state): State<AppState>) -> Response {
    match &state.prometheus {
        Some(handle) => handle.render().into_response(),
        None => ApiError::not_found("metrics recorder not installed").into_response(),
    }
}
