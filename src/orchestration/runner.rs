//! Background trading loop: sweep every registered engine on a fixed
//! interval, backing off on repeated cycle faults.

use super::registry::EngineRegistry;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{info, warn};

/// Consecutive-failure backoff cap: interval * 2^3.
const MAX_BACKOFF_SHIFT: u32 = 3;

/// Run trading cycles until a shutdown signal arrives.
///
/// Each sweep runs every engine once, sequentially; a shutdown request is
/// honored between models, never mid-cycle, and trades already committed
/// stay committed.
pub async fn run_trading_loop(
    registry: Arc<EngineRegistry>,
    interval: Duration,
    mut shutdown: watch::Receiver<bool>,
) {
    info!(interval_secs = interval.as_secs(), "trading loop started");
    let mut consecutive_failures: u32 = 0;

    loop {
        let engines = registry.engines().await;
        if engines.is_empty() {
            tracing::debug!("no engines registered, idling");
        }

        let mut sweep_faulted = false;
        for engine in engines {
            if *shutdown.borrow() {
                info!("shutdown requested, abandoning remaining models");
                return;
            }

            let report = engine.execute_cycle().await;
            match (&report.error, report.skipped) {
                (Some(reason), true) => {
                    info!(model_id = report.model_id, %reason, "cycle skipped")
                }
                (Some(reason), false) => {
                    warn!(model_id = report.model_id, %reason, "cycle failed");
                    sweep_faulted = true;
                }
                (None, _) => {
                    let traded = report
                        .outcomes
                        .iter()
                        .filter(|o| o.action != crate::decision::Action::Hold)
                        .count();
                    info!(model_id = report.model_id, traded, "cycle completed");
                }
            }
        }

        consecutive_failures = if sweep_faulted {
            consecutive_failures.saturating_add(1)
        } else {
            0
        };
        let shift = consecutive_failures.min(MAX_BACKOFF_SHIFT);
        let delay = interval * (1u32 << shift);
        if shift > 0 {
            warn!(
                consecutive_failures,
                delay_secs = delay.as_secs(),
                "backing off after failed sweep"
            );
        }

        tokio::select! {
            _ = tokio::time::sleep(delay) => {}
            result = shutdown.changed() => {
                if result.is_err() || *shutdown.borrow() {
                    info!("trading loop stopped");
                    return;
                }
            }
        }
    }
}
