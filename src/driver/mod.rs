//! Run driver
//!
//! Fires once per check interval and starts a run only when none is in
//! flight. A run normally lives forever (it polls until it books or hits a
//! fatal condition), so the guard's job is to refuse overlapping runs, not
//! to cancel stuck ones. The first tick fires immediately on start.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::debug;

use crate::engine::{BookingConfirmation, Engine};
use crate::error::Result;

/// Interval trigger with a single in-flight run guard
pub struct RunDriver {
    engine: Arc<Engine>,
    in_flight: Arc<AtomicBool>,
    check_interval: Duration,
}

impl RunDriver {
    pub fn new(engine: Arc<Engine>, check_interval: Duration) -> Self {
        Self {
            engine,
            in_flight: Arc::new(AtomicBool::new(false)),
            check_interval,
        }
    }

    /// Claim the run slot. Returns whether a new run may start; callers that
    /// get `true` own the slot until [`finish_run`](Self::finish_run).
    pub fn try_start_run(&self) -> bool {
        self.in_flight
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
    }

    /// Release the run slot
    pub fn finish_run(&self) {
        self.in_flight.store(false, Ordering::SeqCst);
    }

    /// Whether a run currently holds the slot
    pub fn run_in_flight(&self) -> bool {
        self.in_flight.load(Ordering::SeqCst)
    }

    /// Tick forever, starting runs as the guard allows, until a run reaches
    /// a terminal result. That result is returned to the caller, which
    /// performs the actual process exit.
    pub async fn run(&self) -> Result<BookingConfirmation> {
        let (result_tx, mut result_rx) = mpsc::channel::<Result<BookingConfirmation>>(1);
        let mut ticker = tokio::time::interval(self.check_interval);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if self.try_start_run() {
                        let engine = self.engine.clone();
                        let guard = self.in_flight.clone();
                        let tx = result_tx.clone();

                        tokio::spawn(async move {
                            let result = engine.run().await;
                            guard.store(false, Ordering::SeqCst);
                            let _ = tx.send(result).await;
                        });
                    } else {
                        debug!("run already in flight, skipping tick");
                    }
                }

                Some(result) = result_rx.recv() => {
                    return result;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::captcha::StaticTokenProvider;
    use crate::config::Config;
    use crate::locations::TerminalPrompt;

    fn driver() -> RunDriver {
        let engine = Engine::new(
            Config::default(),
            Arc::new(StaticTokenProvider::new("tok")),
            Arc::new(TerminalPrompt),
        )
        .unwrap();
        RunDriver::new(Arc::new(engine), Duration::from_secs(60))
    }

    #[tokio::test]
    async fn test_guard_refuses_overlapping_runs() {
        let driver = driver();

        assert!(driver.try_start_run());
        assert!(driver.run_in_flight());
        assert!(!driver.try_start_run());

        driver.finish_run();
        assert!(!driver.run_in_flight());
        assert!(driver.try_start_run());
    }
}
