//! Periodic refresh sweep.

use std::time::Duration;

use galley_orders::OrderManager;
use galley_store::InMemoryStore;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{error, info};

/// Calls the refresh sweep on a fixed interval.
///
/// Each tick is one short write transaction; nothing is held between ticks.
pub struct RefreshScheduler {
    orders: OrderManager<InMemoryStore>,
    every: Duration,
}

impl RefreshScheduler {
    pub fn new(orders: OrderManager<InMemoryStore>, every: Duration) -> Self {
        Self { orders, every }
    }

    /// Run one sweep. Failures are logged, not propagated.
    pub async fn tick(&self) -> usize {
        match self.orders.refresh_order_statuses(None).await {
            Ok(report) => report.count(),
            Err(e) => {
                error!(error = %e, retryable = e.is_retryable(), "Refresh sweep failed");
                0
            }
        }
    }

    /// Run the scheduler's main loop.
    pub async fn run(self) {
        info!(every_secs = self.every.as_secs(), "Refresh scheduler started");

        let mut ticker = interval(self.every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        loop {
            ticker.tick().await;
            self.tick().await;
        }
    }

    /// Start the loop on the runtime.
    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }
}
