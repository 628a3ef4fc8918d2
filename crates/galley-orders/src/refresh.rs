//! Time-driven status advancement.
//!
//! The sweep is a plain function of the tables and a clock reading. It is
//! triggered from outside (see the node scheduler) and never runs on its own.

use std::time::Duration;

use chrono::{DateTime, Utc};
use galley_core::{GalleyError, OrderId, OrderItem, OrderStatus, Result, TransitionCause};
use galley_store::Tables;
use serde::{Deserialize, Serialize};

/// How long an item stays in a state before the sweep moves it on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefreshPolicy {
    pub pending_to_preparing: Duration,
    pub preparing_to_served: Duration,
    /// `None` leaves payment to explicit settlement.
    pub served_to_paid: Option<Duration>,
}

impl Default for RefreshPolicy {
    fn default() -> Self {
        Self {
            pending_to_preparing: Duration::from_secs(60),
            preparing_to_served: Duration::from_secs(60),
            served_to_paid: None,
        }
    }
}

impl RefreshPolicy {
    /// Build a policy from thresholds in seconds. Zero is rejected.
    pub fn from_secs(
        pending_to_preparing: u64,
        preparing_to_served: u64,
        served_to_paid: Option<u64>,
    ) -> Result<Self> {
        let threshold = |name: &str, secs: u64| {
            if secs == 0 {
                return Err(GalleyError::validation(format!(
                    "refresh threshold {} must be positive",
                    name
                )));
            }
            Ok(Duration::from_secs(secs))
        };

        Ok(Self {
            pending_to_preparing: threshold("pending_to_preparing", pending_to_preparing)?,
            preparing_to_served: threshold("preparing_to_served", preparing_to_served)?,
            served_to_paid: served_to_paid
                .map(|secs| threshold("served_to_paid", secs))
                .transpose()?,
        })
    }

    /// Time an item must spend in `status` before the sweep advances it.
    pub fn threshold(&self, status: OrderStatus) -> Option<Duration> {
        match status {
            OrderStatus::Pending => Some(self.pending_to_preparing),
            OrderStatus::Preparing => Some(self.preparing_to_served),
            OrderStatus::Served => self.served_to_paid,
            OrderStatus::Paid | OrderStatus::Cancelled => None,
        }
    }

    /// Returns true if `item` has spent long enough in its state at `now`.
    pub fn is_due(&self, item: &OrderItem, now: DateTime<Utc>) -> bool {
        let Some(threshold) = self.threshold(item.status) else {
            return false;
        };
        match (now - item.updated_at).to_std() {
            Ok(elapsed) => elapsed >= threshold,
            // updated_at is in the future relative to `now`
            Err(_) => false,
        }
    }
}

/// Outcome of one sweep.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefreshReport {
    /// Items moved, each by exactly one edge, with their previous status.
    pub advanced: Vec<(OrderItem, OrderStatus)>,
    pub at: Option<DateTime<Utc>>,
}

impl RefreshReport {
    pub fn count(&self) -> usize {
        self.advanced.len()
    }
}

/// Advance every due item in scope by one edge.
pub(crate) fn sweep(
    tables: &mut Tables,
    policy: &RefreshPolicy,
    now: DateTime<Utc>,
    scope: Option<OrderId>,
) -> Result<RefreshReport> {
    let due: Vec<_> = tables
        .order_items
        .values()
        .filter(|item| scope.map_or(true, |order_id| item.order_id == order_id))
        .filter(|item| policy.is_due(item, now))
        .map(|item| (item.id, item.status))
        .collect();

    let mut report = RefreshReport {
        advanced: Vec::with_capacity(due.len()),
        at: Some(now),
    };
    for (id, status) in due {
        let Some(next) = status.next() else { continue };
        let item = tables.compare_and_set_status(id, status, next, now, TransitionCause::Sweep)?;
        report.advanced.push((item, status));
    }
    Ok(report)
}
