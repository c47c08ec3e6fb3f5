//! OKX order book mirror and execution simulator entry point.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use rust_decimal::Decimal;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use okx_trade_sim::api::{create_router, AppState};
use okx_trade_sim::config::Config;
use okx_trade_sim::feed::OkxBookFeed;
use okx_trade_sim::metrics;
use okx_trade_sim::orderbook::SharedOrderBook;
use okx_trade_sim::simulator::{
    run_simulation_loop, Direction, ExecutionSimulator, LatestRound, ScheduleConfig,
};
use okx_trade_sim::utils::{shutdown_signal, wait_for_shutdown};
use okx_trade_sim::SimError;

/// How long to wait for background tasks after shutdown is signalled.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

/// Live OKX order book mirror with market-order simulation.
#[derive(Parser, Debug)]
#[command(name = "okx-trade-sim")]
#[command(about = "Mirror an OKX order book and simulate market orders against it")]
#[command(version)]
struct Args {
    /// Enable verbose logging.
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Mirror the book and simulate on a fixed cadence (default).
    Run,

    /// Connect, wait for a two-sided book, simulate one order and exit.
    Simulate {
        /// Order direction: buy or sell.
        #[arg(long)]
        direction: Direction,

        /// Quantity in base units.
        #[arg(long)]
        quantity: Decimal,

        /// Seconds to wait for the first book.
        #[arg(long, default_value = "10")]
        wait_secs: u64,
    },

    /// Check configuration validity.
    CheckConfig,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Parse CLI arguments
    let args = Args::parse();

    // Initialize logging; a broken config is reported by the subcommand itself.
    let log_config = Config::load().unwrap_or_default();
    let filter = EnvFilter::try_new(log_config.log_directive(args.verbose))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(filter)
        .init();

    match args.command {
        Some(Command::CheckConfig) => cmd_check_config(),
        Some(Command::Simulate {
            direction,
            quantity,
            wait_secs,
        }) => cmd_simulate(direction, quantity, Duration::from_secs(wait_secs)).await,
        Some(Command::Run) | None => cmd_run().await,
    }
}

/// Load and validate configuration, logging failures.
fn load_config() -> anyhow::Result<Config> {
    let config = Config::load().map_err(|e| {
        error!("Failed to load configuration: {}", e);
        e
    })?;

    if let Err(e) = config.validate() {
        error!("Invalid configuration: {}", e);
        return Err(SimError::InvalidConfig(e).into());
    }

    Ok(config)
}

/// Check configuration validity.
fn cmd_check_config() -> anyhow::Result<()> {
    println!("======================================================================");
    println!("OKX TRADE SIM - CONFIGURATION CHECK");
    println!("======================================================================");

    print!("Loading configuration... ");
    let config = match Config::load() {
        Ok(c) => {
            println!("OK");
            c
        }
        Err(e) => {
            println!("FAILED");
            println!("  Error: {}", e);
            return Err(anyhow::anyhow!("Configuration load failed"));
        }
    };

    print!("Validating configuration... ");
    match config.validate() {
        Ok(()) => println!("OK"),
        Err(e) => {
            println!("FAILED");
            println!("  Error: {}", e);
            return Err(anyhow::anyhow!("Configuration validation failed"));
        }
    }

    println!("----------------------------------------------------------------------");
    println!("Configuration Summary:");
    println!("  WebSocket URL: {}", config.okx_ws_url);
    println!("  Instrument: {} ({})", config.inst_id, config.book_channel);
    println!("  Taker Fee Rate: {}", config.taker_fee_rate);
    println!(
        "  Simulation: {} {} every {}s",
        config.sim_quantity,
        config.base_currency(),
        config.sim_interval_seconds
    );
    println!(
        "  Reconnect Max Delay: {}s, Heartbeat: {}s",
        config.ws_reconnect_max_delay_s, config.ws_heartbeat_interval_s
    );
    println!(
        "  HTTP API: {}",
        if config.enable_api {
            format!("Enabled on port {}", config.port)
        } else {
            "Disabled".to_string()
        }
    );
    println!("======================================================================");
    println!("CONFIGURATION CHECK PASSED");
    println!("======================================================================");

    Ok(())
}

/// Start the feed and the single book writer.
fn start_feed(
    config: &Config,
    book: &SharedOrderBook,
    shutdown: watch::Receiver<bool>,
) -> (Arc<OkxBookFeed>, JoinHandle<()>, JoinHandle<u64>) {
    let feed = Arc::new(OkxBookFeed::from_config(config));
    let (updates, feed_handle) = Arc::clone(&feed).spawn(config.feed_channel_capacity, shutdown);
    let writer_handle = tokio::spawn(book.clone().consume(updates));
    (feed, feed_handle, writer_handle)
}

/// Wait for a task, aborting it once the grace period runs out.
async fn join_with_grace<T>(name: &str, mut handle: JoinHandle<T>) {
    match tokio::time::timeout(SHUTDOWN_GRACE, &mut handle).await {
        Ok(Ok(_)) => info!(task = name, "Task stopped"),
        Ok(Err(e)) => warn!(task = name, error = %e, "Task ended abnormally"),
        Err(_) => {
            warn!(task = name, "Task did not stop in time, aborting");
            handle.abort();
        }
    }
}

/// Mirror the book and simulate on a fixed cadence until shutdown.
async fn cmd_run() -> anyhow::Result<()> {
    info!("Loading configuration...");
    let config = load_config()?;

    metrics::init_metrics();
    let prometheus = match metrics::install_prometheus() {
        Ok(handle) => Some(handle),
        Err(e) => {
            warn!(error = %e, "Prometheus recorder not installed, /metrics disabled");
            None
        }
    };

    info!("Configuration loaded successfully");
    info!("Instrument: {} ({})", config.inst_id, config.book_channel);
    info!("Taker fee rate: {}", config.taker_fee_rate);
    info!(
        "Simulating {} {} every {}s",
        config.sim_quantity,
        config.base_currency(),
        config.sim_interval_seconds
    );

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let book = SharedOrderBook::new();
    let simulator =
        ExecutionSimulator::new(book.clone()).with_fee_rate(config.taker_fee_rate);
    let latest = LatestRound::default();

    // Feed -> channel -> single writer
    let (feed, feed_handle, writer_handle) = start_feed(&config, &book, shutdown_rx.clone());

    // Periodic simulation
    let schedule = ScheduleConfig {
        quantity: config.sim_quantity,
        interval: Duration::from_secs(config.sim_interval_seconds),
        base_currency: config.base_currency().to_string(),
    };
    let scheduler_handle = tokio::spawn(run_simulation_loop(
        simulator.clone(),
        schedule,
        Arc::clone(&latest),
        shutdown_rx.clone(),
    ));

    // HTTP server
    let server_handle = if config.enable_api {
        let mut app_state = AppState::new(config.inst_id.clone(), simulator, latest);
        if let Some(handle) = prometheus {
            app_state = app_state.with_prometheus(handle);
        }

        let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
        let listener = TcpListener::bind(addr).await?;
        info!("HTTP server listening on {}", addr);

        let router = create_router(app_state);
        let server_shutdown = shutdown_rx.clone();
        Some(tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, router)
                .with_graceful_shutdown(wait_for_shutdown(server_shutdown))
                .await
            {
                error!(error = %e, "HTTP server failed");
            }
        }))
    } else {
        info!("HTTP API disabled");
        None
    };

    shutdown_signal().await;
    info!("Shutting down...");
    let _ = shutdown_tx.send(true);

    join_with_grace("feed", feed_handle).await;
    join_with_grace("book-writer", writer_handle).await;
    join_with_grace("scheduler", scheduler_handle).await;
    if let Some(handle) = server_handle {
        join_with_grace("http", handle).await;
    }

    info!(
        reconnects = feed.reconnect_attempts(),
        messages = feed.messages_forwarded(),
        updates_applied = book.with_book(|b| b.updates_applied()),
        "Shutdown complete"
    );

    Ok(())
}

/// Connect, wait for a two-sided book, simulate once and print the report.
async fn cmd_simulate(
    direction: Direction,
    quantity: Decimal,
    wait: Duration,
) -> anyhow::Result<()> {
    let config = load_config()?;

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let book = SharedOrderBook::new();
    let (_feed, feed_handle, writer_handle) = start_feed(&config, &book, shutdown_rx);

    info!(inst_id = %config.inst_id, wait_s = wait.as_secs(), "Waiting for order book");
    let ready = tokio::time::timeout(wait, async {
        while !book.is_ready() {
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
    })
    .await
    .is_ok();

    let outcome = if ready {
        let simulator =
            ExecutionSimulator::new(book.clone()).with_fee_rate(config.taker_fee_rate);
        simulator
            .simulate(direction, quantity)
            .map_err(anyhow::Error::from)
            .and_then(|report| {
                println!("{}", serde_json::to_string_pretty(&report)?);
                Ok(())
            })
    } else {
        Err(anyhow::anyhow!(
            "no two-sided book for {} within {}s",
            config.inst_id,
            wait.as_secs()
        ))
    };

    let _ = shutdown_tx.send(true);
    join_with_grace("feed", feed_handle).await;
    join_with_grace("book-writer", writer_handle).await;

    outcome
}
