//! Periodic refresh driver

use super::Coordinator;
use crate::config::SyncConfig;
use crate::logging::{StructuredLogger, get_logger};
use std::time::Duration;
use tokio::sync::watch;

pub struct Scheduler {
    coordinator: Coordinator,
    update_interval: Duration,
    retry_interval: Duration,
    logger: StructuredLogger,
}

impl Scheduler {
    pub fn new(coordinator: Coordinator, config: &SyncConfig) -> Self {
        Self {
            coordinator,
            update_interval: config.update_interval(),
            retry_interval: config.retry_interval(),
            logger: get_logger("scheduler"),
        }
    }

    /// Delay before the next cycle given how the last one ended
    pub const fn next_delay(&self, succeeded: bool) -> Duration {
        if succeeded {
            self.update_interval
        } else {
            self.retry_interval
        }
    }

    /// Refresh until `shutdown` turns true or its sender is dropped
    ///
    /// The coordinator is shut down on exit, abandoning any in-flight cycle.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        self.logger.info(&format!(
            "Scheduler started (update every {}s, retry after {}s)",
            self.update_interval.as_secs(),
            self.retry_interval.as_secs()
        ));

        loop {
            if *shutdown.borrow_and_update() {
                break;
            }

            let succeeded = tokio::select! {
                outcome = self.coordinator.refresh() => match outcome {
                    Ok(view) => {
                        self.logger.debug(&format!("Refreshed {} contract(s)", view.len()));
                        true
                    }
                    Err(e) => {
                        self.logger.warn(&format!("Refresh failed: {}", e));
                        false
                    }
                },
                _ = shutdown.changed() => break,
            };

            let delay = self.next_delay(succeeded);
            tokio::select! {
                () = tokio::time::sleep(delay) => {}
                _ = shutdown.changed() => break,
            }
        }

        self.coordinator.shutdown();
        self.logger.info("Scheduler stopped");
    }
}
