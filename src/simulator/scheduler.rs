//! Periodic buy/sell simulation rounds.

use std::sync::Arc;
use std::time::Duration;

use rust_decimal::Decimal;
use tokio::sync::{watch, RwLock};
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{error, info, warn};

use super::engine::{ExecutionSimulator, LiquiditySource};
use super::report::{FillReport, SimulationRound};
use crate::error::SimulationError;
use crate::utils::now_unix_ms;

/// Latest completed round, shared with the HTTP API.
pub type LatestRound = Arc<RwLock<Option<SimulationRound>>>;

/// Scheduler settings.
#[derive(Debug, Clone)]
pub struct ScheduleConfig {
    /// Quantity simulated in each direction.
    pub quantity: Decimal,
    /// Time between rounds.
    pub interval: Duration,
    /// Label for the base asset in log lines.
    pub base_currency: String,
}

/// Run one buy and one sell simulation.
pub fn run_round<S: LiquiditySource>(
    simulator: &ExecutionSimulator<S>,
    quantity: Decimal,
) -> Result<SimulationRound, SimulationError> {
    let buy = simulator.simulate_buy(quantity)?;
    let sell = simulator.simulate_sell(quantity)?;

    Ok(SimulationRound {
        at_ms: now_unix_ms(),
        quantity,
        buy,
        sell,
    })
}

fn log_report(label: &str, base: &str, report: &FillReport) {
    info!(
        "Simulated {} {} {}: Avg Price = {:.2}, Slippage = {:.5} ({:.2} bps), Fee = {:.5}",
        label,
        report.requested_quantity,
        base,
        report.average_price,
        report.slippage,
        report.slippage_bps(),
        report.fee
    );

    if report.is_empty() {
        warn!(direction = %report.direction, "No liquidity on the opposite side");
    } else if report.is_partial() {
        warn!(
            direction = %report.direction,
            executed = %report.executed_quantity,
            remaining = %report.remaining_quantity,
            "Partial fill: book depth exhausted"
        );
    }
}

/// Simulate on a fixed cadence until shutdown is signalled.
///
/// The first round runs one interval after start. Returns the number of
/// rounds completed.
pub async fn run_simulation_loop<S: LiquiditySource>(
    simulator: ExecutionSimulator<S>,
    config: ScheduleConfig,
    latest: LatestRound,
    mut shutdown: watch::Receiver<bool>,
) -> u64 {
    let mut ticker = interval_at(Instant::now() + config.interval, config.interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut rounds = 0u64;

    info!(
        quantity = %config.quantity,
        interval_s = config.interval.as_secs_f64(),
        fee_rate = %simulator.taker_fee_rate(),
        "Simulation scheduler started"
    );

    loop {
        if *shutdown.borrow() {
            break;
        }

        tokio::select! {
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    break;
                }
            }
            _ = ticker.tick() => {
                match run_round(&simulator, config.quantity) {
                    Ok(round) => {
                        log_report("Buy", &config.base_currency, &round.buy);
                        log_report("Sell", &config.base_currency, &round.sell);
                        info!("{}", "-".repeat(60));
                        *latest.write().await = Some(round);
                        rounds += 1;
                    }
                    Err(e) => {
                        error!(error = %e, "Simulation round rejected");
                    }
                }
            }
        }
    }

    info!(rounds, "Simulation scheduler stopped");
    rounds
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::orderbook::{OrderBook, SharedOrderBook, Side};
    use rust_decimal_macros::dec;

    fn two_sided_book() -> SharedOrderBook {
        let mut book = OrderBook::new();
        book.apply_level_update(Side::Bid, dec!(99), dec!(1));
        book.apply_level_update(Side::Ask, dec!(101), dec!(1));
        SharedOrderBook::from_book(book)
    }

    #[test]
    fn run_round_simulates_both_directions() {
        let sim = ExecutionSimulator::new(two_sided_book());
        let round = run_round(&sim, dec!(0.5)).unwrap();

        assert_eq!(round.quantity, dec!(0.5));
        assert_eq!(round.buy.average_price, dec!(101));
        assert_eq!(round.sell.average_price, dec!(99));
        assert!(round.at_ms > 0);
    }

    #[test]
    fn run_round_rejects_zero_quantity() {
        let sim = ExecutionSimulator::new(two_sided_book());
        assert!(run_round(&sim, Decimal::ZERO).is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn loop_publishes_rounds_and_stops_on_shutdown() {
        let sim = ExecutionSimulator::new(two_sided_book());
        let latest: LatestRound = Arc::default();
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let task = tokio::spawn(run_simulation_loop(
            sim,
            ScheduleConfig {
                quantity: dec!(0.25),
                interval: Duration::from_secs(5),
                base_currency: "BTC".to_string(),
            },
            latest.clone(),
            shutdown_rx,
        ));

        tokio::time::sleep(Duration::from_secs(11)).await;
        shutdown_tx.send(true).unwrap();
        let rounds = task.await.unwrap();

        assert_eq!(rounds, 2);
        let round = latest.read().await.clone().expect("round published");
        assert_eq!(round.buy.executed_quantity, dec!(0.25));
    }
}
