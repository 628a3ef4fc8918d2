//! Order endpoints.

use std::collections::BTreeSet;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::{DateTime, Utc};
use galley_core::{IngredientId, OfferingId, OrderId, OrderItem, OrderItemId, OrderStatus};
use galley_orders::{
    OrderItemDetail, PlaceOrderItem, QuantityUpdate, Receipt, ReceiptOptions, Settlement,
};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::error::ApiResult;
use crate::state::AppState;

/// Request to place an order item.
#[derive(Debug, Deserialize)]
pub struct PlaceItemRequest {
    pub offering_id: OfferingId,
    pub quantity: u32,
    #[serde(default)]
    pub special_instructions: Option<String>,
    /// Explicit removals. When absent, removals are read from the instructions.
    #[serde(default)]
    pub removed_ingredients: Option<BTreeSet<IngredientId>>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PlaceItemResponse {
    pub item: OrderItemDetail,
    /// True when removals came from the special instructions.
    pub inferred_removals: bool,
}

/// Place an order item.
pub async fn place_item(
    State(state): State<AppState>,
    Path(order_id): Path<OrderId>,
    Json(req): Json<PlaceItemRequest>,
) -> ApiResult<(StatusCode, Json<PlaceItemResponse>)> {
    let (removed_ingredients, inferred_removals) = match req.removed_ingredients {
        Some(explicit) => (explicit, false),
        None => match &req.special_instructions {
            Some(text) => {
                let inferred = state
                    .orders
                    .removals_from_instructions(req.offering_id, text)
                    .await?;
                debug!(offering_id = %req.offering_id, inferred = inferred.len(), "Inferred removals");
                let any = !inferred.is_empty();
                (inferred, any)
            }
            None => (BTreeSet::new(), false),
        },
    };

    let item = state
        .orders
        .place_order_item(PlaceOrderItem {
            order_id,
            offering_id: req.offering_id,
            quantity: req.quantity,
            special_instructions: req.special_instructions,
            removed_ingredients,
        })
        .await?;
    let item = state.orders.describe(item.id).await?;

    Ok((
        StatusCode::CREATED,
        Json(PlaceItemResponse {
            item,
            inferred_removals,
        }),
    ))
}

/// List the items of an order.
pub async fn list_items(
    State(state): State<AppState>,
    Path(order_id): Path<OrderId>,
) -> ApiResult<Json<Vec<OrderItem>>> {
    Ok(Json(state.orders.list_order_items(order_id).await?))
}

#[derive(Debug, Default, Deserialize)]
pub struct ReceiptParams {
    /// Comma separated offering names.
    pub offerings: Option<String>,
    #[serde(default)]
    pub include_paid: bool,
    #[serde(default)]
    pub include_status: bool,
}

/// Itemized receipt of an order.
pub async fn get_receipt(
    State(state): State<AppState>,
    Path(order_id): Path<OrderId>,
    Query(params): Query<ReceiptParams>,
) -> ApiResult<Json<Receipt>> {
    let options = ReceiptOptions {
        offerings: params
            .offerings
            .as_deref()
            .map(|names| {
                names
                    .split(',')
                    .map(str::trim)
                    .filter(|n| !n.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default(),
        include_paid: params.include_paid,
        include_status: params.include_status,
    };
    Ok(Json(state.orders.receipt(order_id, options).await?))
}

#[derive(Debug, Default, Deserialize)]
pub struct SettleRequest {
    #[serde(default)]
    pub offerings: Vec<String>,
}

/// Pay every served item of an order.
pub async fn settle(
    State(state): State<AppState>,
    Path(order_id): Path<OrderId>,
    Json(req): Json<SettleRequest>,
) -> ApiResult<Json<Settlement>> {
    Ok(Json(state.orders.settle_order(order_id, req.offerings).await?))
}

/// One order item with its removals.
pub async fn get_item(
    State(state): State<AppState>,
    Path(id): Path<OrderItemId>,
) -> ApiResult<Json<OrderItemDetail>> {
    Ok(Json(state.orders.describe(id).await?))
}

#[derive(Debug, Serialize, Deserialize)]
pub struct StatusResponse {
    pub order_item_id: OrderItemId,
    pub status: OrderStatus,
    pub updated_at: DateTime<Utc>,
}

/// Current status of an order item.
pub async fn get_status(
    State(state): State<AppState>,
    Path(id): Path<OrderItemId>,
) -> ApiResult<Json<StatusResponse>> {
    let item = state.orders.get_order_item(id).await?;
    Ok(Json(StatusResponse {
        order_item_id: item.id,
        status: item.status,
        updated_at: item.updated_at,
    }))
}

/// Cancel an order item.
pub async fn cancel_item(
    State(state): State<AppState>,
    Path(id): Path<OrderItemId>,
) -> ApiResult<Json<OrderItem>> {
    Ok(Json(state.orders.cancel_order_item(id).await?))
}

/// Advance an order item by one step.
pub async fn advance_item(
    State(state): State<AppState>,
    Path(id): Path<OrderItemId>,
) -> ApiResult<Json<OrderItem>> {
    Ok(Json(state.orders.advance_status(id).await?))
}

#[derive(Debug, Deserialize)]
pub struct QuantityRequest {
    pub quantity: u32,
}

/// Change the quantity of an order item.
pub async fn update_quantity(
    State(state): State<AppState>,
    Path(id): Path<OrderItemId>,
    Json(req): Json<QuantityRequest>,
) -> ApiResult<Json<QuantityUpdate>> {
    Ok(Json(state.orders.update_quantity(id, req.quantity).await?))
}

#[derive(Debug, Default, Deserialize)]
pub struct RefreshParams {
    pub order_id: Option<OrderId>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RefreshResponse {
    pub advanced: Vec<OrderItem>,
}

/// Run the refresh sweep now.
pub async fn refresh(
    State(state): State<AppState>,
    Query(params): Query<RefreshParams>,
) -> ApiResult<Json<RefreshResponse>> {
    let report = state.orders.refresh_order_statuses(params.order_id).await?;
    Ok(Json(RefreshResponse {
        advanced: report.advanced.into_iter().map(|(item, _)| item).collect(),
    }))
}
