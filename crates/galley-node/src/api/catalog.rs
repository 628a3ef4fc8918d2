//! Catalog and menu endpoints.

use std::collections::BTreeSet;

use axum::{
    extract::{Path, Query, State},
    Json,
};
use galley_core::{normalize_name, Category, OfferingId};
use galley_menu::{
    AttributeReport, CompositionEntry, DietaryProfile, DietaryQuery, Feasibility, MenuEntry,
    MenuQuery,
};
use rust_decimal::Decimal;
use serde::Deserialize;

use super::error::ApiResult;
use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct CategoryParams {
    pub is_food: Option<bool>,
}

/// List categories.
pub async fn list_categories(
    State(state): State<AppState>,
    Query(params): Query<CategoryParams>,
) -> ApiResult<Json<Vec<Category>>> {
    Ok(Json(state.catalog.list_categories(params.is_food).await?))
}

/// Menu filters as query parameters. List values are comma separated.
#[derive(Debug, Default, Deserialize)]
pub struct MenuParams {
    pub is_food: Option<bool>,
    pub category: Option<String>,
    pub recommended: Option<bool>,
    pub min_price: Option<Decimal>,
    pub max_price: Option<Decimal>,
    pub include: Option<String>,
    pub exclude: Option<String>,
    /// Attributes to avoid, e.g. `pork,nuts`.
    pub avoid: Option<String>,
    /// Attributes every remaining ingredient must carry, e.g. `vegan`.
    pub require: Option<String>,
}

fn split(list: Option<&str>) -> Vec<String> {
    list.map(|value| {
        value
            .split(',')
            .map(str::trim)
            .filter(|item| !item.is_empty())
            .map(str::to_string)
            .collect()
    })
    .unwrap_or_default()
}

fn attribute_set(list: Option<&str>) -> BTreeSet<String> {
    split(list).iter().map(|a| normalize_name(a)).collect()
}

impl From<MenuParams> for MenuQuery {
    fn from(params: MenuParams) -> Self {
        MenuQuery {
            is_food: params.is_food,
            categories: split(params.category.as_deref()),
            recommended: params.recommended,
            min_price: params.min_price,
            max_price: params.max_price,
            must_include: split(params.include.as_deref()),
            must_exclude: split(params.exclude.as_deref()),
            dietary: DietaryQuery {
                excluded: attribute_set(params.avoid.as_deref()),
                required: attribute_set(params.require.as_deref()),
            },
        }
    }
}

/// Filtered menu.
pub async fn get_menu(
    State(state): State<AppState>,
    Query(params): Query<MenuParams>,
) -> ApiResult<Json<Vec<MenuEntry>>> {
    let query = MenuQuery::from(params);
    Ok(Json(state.menu.list(&query).await?))
}

/// Composition of an offering.
pub async fn get_composition(
    State(state): State<AppState>,
    Path(id): Path<OfferingId>,
) -> ApiResult<Json<Vec<CompositionEntry>>> {
    Ok(Json(state.composer.get_composition(id).await?))
}

/// Derived dietary profile of an offering.
pub async fn get_profile(
    State(state): State<AppState>,
    Path(id): Path<OfferingId>,
) -> ApiResult<Json<DietaryProfile>> {
    Ok(Json(state.composer.dietary_profile(id).await?))
}

/// Three-way feasibility under a dietary query.
pub async fn check_feasibility(
    State(state): State<AppState>,
    Path(id): Path<OfferingId>,
    Json(query): Json<DietaryQuery>,
) -> ApiResult<Json<Feasibility>> {
    Ok(Json(state.dietary.assess(id, &query).await?))
}

#[derive(Debug, Default, Deserialize)]
pub struct AttributeReportRequest {
    #[serde(default)]
    pub check: Option<Vec<String>>,
}

/// Attributes of an offering, optionally checked against a list.
pub async fn attribute_report(
    State(state): State<AppState>,
    Path(id): Path<OfferingId>,
    Json(req): Json<AttributeReportRequest>,
) -> ApiResult<Json<AttributeReport>> {
    Ok(Json(state.dietary.attribute_report(id, req.check).await?))
}
