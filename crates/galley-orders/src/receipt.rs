//! Receipts, settlement and archival.

use chrono::Utc;
use galley_core::{normalize_name, OrderId, OrderItem, OrderItemId, OrderStatus, Result, TransitionCause};
use galley_store::{Store, Tables};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::events::{OrderEvent, OrderEventKind};
use crate::lifecycle::OrderManager;

/// What a receipt shows.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReceiptOptions {
    /// Only items of offerings with these names.
    #[serde(default)]
    pub offerings: Vec<String>,
    /// Show already paid items too.
    #[serde(default)]
    pub include_paid: bool,
    /// Show each line's status.
    #[serde(default)]
    pub include_status: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReceiptLine {
    pub order_item_id: OrderItemId,
    pub offering: String,
    /// The offering's current price.
    pub unit_price: Decimal,
    pub quantity: u32,
    pub line_total: Decimal,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<OrderStatus>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Receipt {
    pub order_id: OrderId,
    pub lines: Vec<ReceiptLine>,
    pub total: Decimal,
}

/// Outcome of settling an order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settlement {
    /// Items moved from `served` to `paid`.
    pub paid: Vec<OrderItemId>,
    /// Items that were already paid.
    pub already_paid: Vec<OrderItemId>,
    /// Items not yet served; they stay where they are.
    pub not_ready: Vec<OrderItemId>,
}

/// Items of an order that a receipt or a settlement considers.
fn order_lines<'a>(
    tables: &'a Tables,
    order_id: OrderId,
    offerings: &'a [String],
) -> impl Iterator<Item = &'a OrderItem> + 'a {
    let names: Vec<String> = offerings.iter().map(|n| normalize_name(n)).collect();
    tables.order_items.values().filter(move |item| {
        item.order_id == order_id
            && !item.archived
            && item.status != OrderStatus::Cancelled
            && (names.is_empty()
                || tables
                    .offerings
                    .get(&item.offering_id)
                    .map_or(false, |o| names.contains(&normalize_name(&o.name))))
    })
}

fn build_receipt(tables: &Tables, order_id: OrderId, options: &ReceiptOptions) -> Result<Receipt> {
    let mut lines = Vec::new();
    for item in order_lines(tables, order_id, &options.offerings) {
        if item.status == OrderStatus::Paid && !options.include_paid {
            continue;
        }
        let offering = tables.offering(item.offering_id)?;
        lines.push(ReceiptLine {
            order_item_id: item.id,
            offering: offering.name.clone(),
            unit_price: offering.price,
            quantity: item.quantity,
            line_total: offering.price * Decimal::from(item.quantity),
            status: options.include_status.then_some(item.status),
        });
    }
    let total = lines.iter().map(|line| line.line_total).sum();
    Ok(Receipt {
        order_id,
        lines,
        total,
    })
}

impl<S: Store> OrderManager<S> {
    /// Itemized bill of an order. Cancelled and archived items never appear.
    pub async fn receipt(&self, order_id: OrderId, options: ReceiptOptions) -> Result<Receipt> {
        debug!(order_id = %order_id, ?options, "Building receipt");
        self.store
            .read(move |tables| build_receipt(tables, order_id, &options))
            .await
    }

    /// Mark every served item of an order as paid.
    ///
    /// `offerings` narrows settlement to items of those offering names.
    /// Items not yet served are reported and left alone.
    pub async fn settle_order(&self, order_id: OrderId, offerings: Vec<String>) -> Result<Settlement> {
        let (settlement, paid_items) = self
            .store
            .write(move |tables| {
                let now = Utc::now();
                let mut settlement = Settlement::default();
                let candidates: Vec<(OrderItemId, OrderStatus)> = order_lines(tables, order_id, &offerings)
                    .map(|item| (item.id, item.status))
                    .collect();

                let mut paid_items = Vec::new();
                for (id, status) in candidates {
                    match status {
                        OrderStatus::Served => {
                            let item = tables.compare_and_set_status(
                                id,
                                OrderStatus::Served,
                                OrderStatus::Paid,
                                now,
                                TransitionCause::Settlement,
                            )?;
                            settlement.paid.push(id);
                            paid_items.push(item);
                        }
                        OrderStatus::Paid => settlement.already_paid.push(id),
                        _ => settlement.not_ready.push(id),
                    }
                }
                Ok((settlement, paid_items))
            })
            .await?;

        info!(
            order_id = %order_id,
            paid = settlement.paid.len(),
            already_paid = settlement.already_paid.len(),
            not_ready = settlement.not_ready.len(),
            "Settled order"
        );
        for item in &paid_items {
            self.events.publish(OrderEvent::status_changed(item, OrderStatus::Served));
        }
        Ok(settlement)
    }

    /// Move every paid or cancelled item into history. Archived items keep
    /// answering reads but leave receipts and the live tables. Returns how many.
    pub async fn archive_settled(&self) -> Result<usize> {
        let archived = self
            .store
            .write(|tables| {
                let now = Utc::now();
                let settled: Vec<OrderItemId> = tables
                    .order_items
                    .values()
                    .filter(|item| !item.is_live())
                    .map(|item| item.id)
                    .collect();
                settled
                    .into_iter()
                    .map(|id| tables.archive_order_item(id, now))
                    .collect::<Result<Vec<_>>>()
            })
            .await?;

        info!(archived = archived.len(), "Archived settled order items");
        for item in &archived {
            self.events.publish(OrderEvent {
                order_id: item.order_id,
                order_item_id: item.id,
                kind: OrderEventKind::Archived,
                at: item.updated_at,
            });
        }
        Ok(archived.len())
    }
}
