//! Periodic trigger for scan passes.
//!
//! The first pass runs as soon as the loop starts, the rest on a fixed
//! period. Passes do blocking filesystem work, so each one runs on the
//! blocking pool while the loop itself only waits.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::{interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::archive::PassReport;
use crate::util::format_period;

/// Why the scheduling loop stopped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Shutdown {
    Cancelled,
    Fatal(String),
}

pub struct Scheduler {
    period: Duration,
}

impl Scheduler {
    pub fn new(period: Duration) -> Self {
        Scheduler { period }
    }

    /// Runs `pass` immediately and then once per period until `cancel` fires
    /// or a pass dies. The token is handed to every pass so a running pass
    /// can stop at its next directory boundary.
    pub async fn run<F>(&self, cancel: CancellationToken, pass: F) -> Shutdown
    where
        F: Fn(CancellationToken) -> PassReport + Send + Sync + 'static,
    {
        let pass = Arc::new(pass);
        let mut ticker = interval(self.period);
        // a long pass pushes the schedule back instead of firing a burst
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!(period = %format_period(self.period), "scheduler started");

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    info!("scheduler stopping, cancellation requested");
                    return Shutdown::Cancelled;
                }
                _ = ticker.tick() => {}
            }

            let job = Arc::clone(&pass);
            let token = cancel.clone();
            match tokio::task::spawn_blocking(move || job(token)).await {
                Ok(report) => {
                    info!(
                        added = report.files_added(),
                        failures = report.failures(),
                        next_in = %format_period(self.period),
                        "pass complete"
                    );
                }
                Err(e) => {
                    error!(error = %e, "scan pass crashed, stopping scheduler");
                    return Shutdown::Fatal(e.to_string());
                }
            }
        }
    }
}
