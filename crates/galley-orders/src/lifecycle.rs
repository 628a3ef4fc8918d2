//! Order lifecycle manager.
//!
//! Owns order items, their removals and their status. Placement and
//! cancellation touch the offering's available quantity in the same
//! transaction as the item itself.

use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use galley_core::{
    GalleyError, Ingredient, IngredientId, ModificationId, OfferingId, OrderId, OrderItem,
    OrderItemId, OrderItemModification, OrderStatus, Result, StatusTransition, TransitionCause,
};
use galley_menu::composer::composition_of;
use galley_store::{Store, Tables};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::events::{OrderEvent, OrderEvents};
use crate::instructions::infer_removals;
use crate::refresh::{sweep, RefreshPolicy, RefreshReport};

/// A request to place one order item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaceOrderItem {
    pub order_id: OrderId,
    pub offering_id: OfferingId,
    pub quantity: u32,
    #[serde(default)]
    pub special_instructions: Option<String>,
    /// Ingredients to omit. Each must be a removable part of the offering.
    #[serde(default)]
    pub removed_ingredients: BTreeSet<IngredientId>,
}

impl PlaceOrderItem {
    pub fn new(order_id: OrderId, offering_id: OfferingId, quantity: u32) -> Self {
        Self {
            order_id,
            offering_id,
            quantity,
            special_instructions: None,
            removed_ingredients: BTreeSet::new(),
        }
    }

    /// Set the special instructions.
    pub fn instructions(mut self, instructions: impl Into<String>) -> Self {
        self.special_instructions = Some(instructions.into());
        self
    }

    /// Ask for an ingredient to be left out.
    pub fn without(mut self, ingredient_id: IngredientId) -> Self {
        self.removed_ingredients.insert(ingredient_id);
        self
    }

    fn validate(&self) -> Result<()> {
        if self.quantity == 0 {
            return Err(GalleyError::validation("quantity must be at least 1"));
        }
        Ok(())
    }
}

/// An order item with its offering name and removed ingredients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderItemDetail {
    #[serde(flatten)]
    pub item: OrderItem,
    pub offering: String,
    pub removed: Vec<Ingredient>,
}

/// Result of [`OrderManager::update_quantity`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", content = "item", rename_all = "snake_case")]
pub enum QuantityUpdate {
    /// Quantity zero cancelled the item.
    Cancelled(OrderItem),
    /// The pending item now has the new quantity.
    Adjusted(OrderItem),
    /// The item was past `pending`; a fresh item was placed instead.
    Placed(OrderItem),
}

impl QuantityUpdate {
    pub fn item(&self) -> &OrderItem {
        match self {
            QuantityUpdate::Cancelled(item)
            | QuantityUpdate::Adjusted(item)
            | QuantityUpdate::Placed(item) => item,
        }
    }
}

/// The order lifecycle manager.
pub struct OrderManager<S> {
    pub(crate) store: Arc<S>,
    policy: RefreshPolicy,
    pub(crate) events: OrderEvents,
}

impl<S> Clone for OrderManager<S> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            policy: self.policy,
            events: self.events.clone(),
        }
    }
}

impl<S: Store> OrderManager<S> {
    /// Create a manager with the default refresh policy.
    pub fn new(store: Arc<S>) -> Self {
        Self::with_policy(store, RefreshPolicy::default())
    }

    pub fn with_policy(store: Arc<S>, policy: RefreshPolicy) -> Self {
        Self {
            store,
            policy,
            events: OrderEvents::default(),
        }
    }

    pub fn policy(&self) -> &RefreshPolicy {
        &self.policy
    }

    /// The event channel fed by this manager.
    pub fn events(&self) -> &OrderEvents {
        &self.events
    }

    // ---------------------------------------------------------------------
    // Placement
    // ---------------------------------------------------------------------

    /// Place an order item in state `pending`.
    ///
    /// The new row, its removals and the decrement of the offering's
    /// available quantity commit together or not at all.
    pub async fn place_order_item(&self, request: PlaceOrderItem) -> Result<OrderItem> {
        request.validate()?;
        let offering_id = request.offering_id;
        let requested = request.quantity;

        let result = self
            .store
            .write(move |tables| place(tables, request, Utc::now()))
            .await;

        match result {
            Ok(item) => {
                info!(
                    order_item_id = %item.id,
                    order_id = %item.order_id,
                    offering_id = %item.offering_id,
                    quantity = item.quantity,
                    "Placed order item"
                );
                self.events.publish(OrderEvent::placed(&item));
                Ok(item)
            }
            Err(e) => {
                warn!(offering_id = %offering_id, requested, error = %e, "Rejected order item");
                Err(e)
            }
        }
    }

    /// Removable ingredients that free-text instructions ask to leave out.
    pub async fn removals_from_instructions(
        &self,
        offering_id: OfferingId,
        instructions: &str,
    ) -> Result<BTreeSet<IngredientId>> {
        let instructions = instructions.to_string();
        self.store
            .read(move |tables| {
                let composition = composition_of(tables, offering_id)?;
                Ok(infer_removals(&composition, &instructions).into_iter().collect())
            })
            .await
    }

    // ---------------------------------------------------------------------
    // Reads
    // ---------------------------------------------------------------------

    pub async fn get_order_item(&self, id: OrderItemId) -> Result<OrderItem> {
        self.store
            .read(move |tables| tables.order_item(id).cloned())
            .await
    }

    /// Current status of an item.
    pub async fn status(&self, id: OrderItemId) -> Result<OrderStatus> {
        self.store
            .read(move |tables| Ok(tables.order_item(id)?.status))
            .await
    }

    /// An item with its offering name and removed ingredients.
    pub async fn describe(&self, id: OrderItemId) -> Result<OrderItemDetail> {
        self.store
            .read(move |tables| {
                let item = tables.order_item(id)?.clone();
                let offering = tables.offering(item.offering_id)?.name.clone();
                let removed = tables
                    .modifications_of(id)
                    .map(|m| tables.ingredient(m.ingredient_id).cloned())
                    .collect::<Result<Vec<_>>>()?;
                Ok(OrderItemDetail {
                    item,
                    offering,
                    removed,
                })
            })
            .await
    }

    /// Every item of an order, in placement order.
    pub async fn list_order_items(&self, order_id: OrderId) -> Result<Vec<OrderItem>> {
        debug!(order_id = %order_id, "Listing order items");
        self.store
            .read(move |tables| {
                let mut items: Vec<OrderItem> = tables
                    .all_order_items()
                    .filter(|item| item.order_id == order_id)
                    .cloned()
                    .collect();
                items.sort_by_key(|item| item.id);
                Ok(items)
            })
            .await
    }

    /// Ingredients removed from an item.
    pub async fn removed_ingredients(&self, id: OrderItemId) -> Result<Vec<IngredientId>> {
        self.store
            .read(move |tables| {
                tables.order_item(id)?;
                Ok(tables.modifications_of(id).map(|m| m.ingredient_id).collect())
            })
            .await
    }

    /// Status history of an item, oldest first.
    pub async fn transitions(&self, id: OrderItemId) -> Result<Vec<StatusTransition>> {
        self.store
            .read(move |tables| {
                tables.order_item(id)?;
                Ok(tables
                    .transitions()
                    .filter(|t| t.order_item_id == id)
                    .cloned()
                    .collect())
            })
            .await
    }

    // ---------------------------------------------------------------------
    // Transitions
    // ---------------------------------------------------------------------

    /// Cancel a `pending` or `preparing` item and return its quantity to
    /// the offering.
    pub async fn cancel_order_item(&self, id: OrderItemId) -> Result<OrderItem> {
        let (item, from) = self
            .store
            .write(move |tables| cancel(tables, id, Utc::now()))
            .await
            .map_err(|e| {
                warn!(order_item_id = %id, error = %e, "Rejected cancellation");
                e
            })?;

        info!(order_item_id = %id, restored = item.quantity, "Cancelled order item");
        self.events.publish(OrderEvent::status_changed(&item, from));
        Ok(item)
    }

    /// Move an item exactly one step along `pending -> preparing -> served -> paid`.
    pub async fn advance_status(&self, id: OrderItemId) -> Result<OrderItem> {
        let (item, from) = self
            .store
            .write(move |tables| {
                let from = tables.order_item(id)?.status;
                let next = from.next().ok_or_else(|| GalleyError::InvalidTransition {
                    order_item_id: id,
                    from,
                    action: "advance".to_string(),
                })?;
                let item =
                    tables.compare_and_set_status(id, from, next, Utc::now(), TransitionCause::Advance)?;
                Ok((item, from))
            })
            .await?;

        info!(order_item_id = %id, from = %from, to = %item.status, "Advanced order item");
        self.events.publish(OrderEvent::status_changed(&item, from));
        Ok(item)
    }

    /// Sweep every order, or one, with the current time.
    pub async fn refresh_order_statuses(&self, scope: Option<OrderId>) -> Result<RefreshReport> {
        self.refresh_order_statuses_at(Utc::now(), scope).await
    }

    /// Sweep as of `now`.
    ///
    /// Idempotent for a given `now`: an item moved by one call has
    /// `updated_at = now` and is not due again until its next threshold.
    pub async fn refresh_order_statuses_at(
        &self,
        now: DateTime<Utc>,
        scope: Option<OrderId>,
    ) -> Result<RefreshReport> {
        let policy = self.policy;
        let report = self
            .store
            .write(move |tables| sweep(tables, &policy, now, scope))
            .await?;

        if report.count() > 0 {
            info!(advanced = report.count(), "Refreshed order statuses");
        } else {
            debug!("Refresh found nothing due");
        }
        for (item, from) in &report.advanced {
            self.events.publish(OrderEvent::status_changed(item, *from));
        }
        Ok(report)
    }

    // ---------------------------------------------------------------------
    // Quantity
    // ---------------------------------------------------------------------

    /// Change the quantity of an item.
    ///
    /// Zero cancels it. A `pending` item is adjusted in place, reserving or
    /// releasing the difference. An item further along gets a fresh
    /// companion item with the same offering, instructions and removals.
    pub async fn update_quantity(&self, id: OrderItemId, quantity: u32) -> Result<QuantityUpdate> {
        if quantity == 0 {
            return self.cancel_order_item(id).await.map(QuantityUpdate::Cancelled);
        }

        let (update, previous) = self
            .store
            .write(move |tables| {
                let now = Utc::now();
                let item = tables.order_item(id)?.clone();
                if !item.is_live() {
                    return Err(GalleyError::InvalidTransition {
                        order_item_id: id,
                        from: item.status,
                        action: "change the quantity of".to_string(),
                    });
                }
                match item.status {
                    OrderStatus::Pending => {
                        let adjusted = adjust(tables, &item, quantity, now)?;
                        Ok((QuantityUpdate::Adjusted(adjusted), item.quantity))
                    }
                    _ => {
                        let request = PlaceOrderItem {
                            order_id: item.order_id,
                            offering_id: item.offering_id,
                            quantity,
                            special_instructions: item.special_instructions.clone(),
                            removed_ingredients: tables
                                .modifications_of(id)
                                .map(|m| m.ingredient_id)
                                .collect(),
                        };
                        let placed = place(tables, request, now)?;
                        Ok((QuantityUpdate::Placed(placed), item.quantity))
                    }
                }
            })
            .await?;

        match &update {
            QuantityUpdate::Adjusted(item) => {
                info!(order_item_id = %id, from = previous, to = item.quantity, "Adjusted quantity");
                self.events.publish(OrderEvent::quantity_changed(item, previous));
            }
            QuantityUpdate::Placed(item) => {
                info!(
                    order_item_id = %id,
                    new_order_item_id = %item.id,
                    quantity = item.quantity,
                    "Placed companion item"
                );
                self.events.publish(OrderEvent::placed(item));
            }
            QuantityUpdate::Cancelled(_) => {}
        }
        Ok(update)
    }
}

fn place(tables: &mut Tables, request: PlaceOrderItem, now: DateTime<Utc>) -> Result<OrderItem> {
    let offering_id = request.offering_id;
    let available = tables.offering(offering_id)?.quantity;

    let composition = tables.composition(offering_id);
    for &ingredient_id in &request.removed_ingredients {
        let row = composition.iter().find(|row| row.ingredient_id == ingredient_id);
        let reason = match row {
            None => "it is not part of the offering",
            Some(row) if !row.is_removable => "it is a mandatory ingredient",
            Some(_) => continue,
        };
        return Err(GalleyError::InvalidModification {
            offering_id,
            ingredient_id,
            reason: reason.to_string(),
        });
    }

    if request.quantity > available {
        return Err(GalleyError::OutOfStock {
            offering_id,
            requested: request.quantity,
            available,
        });
    }

    let item = OrderItem {
        id: OrderItemId(tables.next_key()),
        order_id: request.order_id,
        offering_id,
        quantity: request.quantity,
        special_instructions: request.special_instructions,
        status: OrderStatus::Pending,
        archived: false,
        created_at: now,
        updated_at: now,
    };
    tables.order_items.insert(item.id, item.clone());

    for ingredient_id in request.removed_ingredients {
        let id = ModificationId(tables.next_key());
        tables.modifications.insert(
            id,
            OrderItemModification {
                id,
                order_item_id: item.id,
                ingredient_id,
            },
        );
    }

    tables.offering_mut(offering_id)?.quantity = available - request.quantity;
    tables.log_placement(item.id, now);
    Ok(item)
}

fn cancel(tables: &mut Tables, id: OrderItemId, now: DateTime<Utc>) -> Result<(OrderItem, OrderStatus)> {
    let from = tables.order_item(id)?.status;
    let item = tables.compare_and_set_status(
        id,
        from,
        OrderStatus::Cancelled,
        now,
        TransitionCause::Cancellation,
    )?;
    let offering = tables.offering_mut(item.offering_id)?;
    offering.quantity = offering.quantity.saturating_add(item.quantity);
    Ok((item, from))
}

fn adjust(tables: &mut Tables, item: &OrderItem, quantity: u32, now: DateTime<Utc>) -> Result<OrderItem> {
    let offering = tables.offering_mut(item.offering_id)?;
    if quantity > item.quantity {
        let extra = quantity - item.quantity;
        if extra > offering.quantity {
            return Err(GalleyError::OutOfStock {
                offering_id: offering.id,
                requested: extra,
                available: offering.quantity,
            });
        }
        offering.quantity -= extra;
    } else {
        offering.quantity = offering.quantity.saturating_add(item.quantity - quantity);
    }

    let stored = tables.order_item_mut(item.id)?;
    stored.quantity = quantity;
    stored.updated_at = now;
    Ok(stored.clone())
}
