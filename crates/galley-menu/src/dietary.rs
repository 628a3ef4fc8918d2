//! Dietary filter engine.
//!
//! Answers whether an offering can be served under a dietary query, and if
//! so which removable ingredients must be left out. Results are computed from
//! the composition and ingredient attributes current at call time.

use std::collections::BTreeSet;
use std::sync::Arc;

use galley_core::{normalize_name, IngredientId, OfferingId, Result};
use galley_store::{Store, Tables};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::composer::attribute_names;

/// Attributes a guest wants to avoid and attributes the dish must have.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DietaryQuery {
    /// e.g. `pork`, `nuts`.
    #[serde(default)]
    pub excluded: BTreeSet<String>,
    /// e.g. `vegan`. Every ingredient that stays in the dish must carry these.
    #[serde(default)]
    pub required: BTreeSet<String>,
}

impl DietaryQuery {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an attribute to avoid.
    pub fn excluding(mut self, attribute: &str) -> Self {
        self.excluded.insert(normalize_name(attribute));
        self
    }

    /// Add an attribute every remaining ingredient must carry.
    pub fn requiring(mut self, attribute: &str) -> Self {
        self.required.insert(normalize_name(attribute));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.excluded.is_empty() && self.required.is_empty()
    }

    fn normalized(&self) -> DietaryQuery {
        DietaryQuery {
            excluded: self.excluded.iter().map(|a| normalize_name(a)).collect(),
            required: self.required.iter().map(|a| normalize_name(a)).collect(),
        }
    }

    /// Attributes of one ingredient that violate the query.
    fn violations(&self, names: &BTreeSet<String>) -> BTreeSet<String> {
        let mut violations: BTreeSet<String> = self.excluded.intersection(names).cloned().collect();
        violations.extend(self.required.difference(names).cloned());
        violations
    }
}

/// Three-way verdict of the filter engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "verdict", rename_all = "snake_case")]
pub enum Feasibility {
    /// Servable as composed.
    Feasible,
    /// Servable once exactly these removable ingredients are omitted.
    FeasibleWithModification { remove: Vec<IngredientId> },
    /// No allowed modification satisfies the query.
    Infeasible { blocking: Vec<String> },
}

impl Feasibility {
    /// Returns true unless the verdict is `Infeasible`.
    pub fn is_servable(&self) -> bool {
        !matches!(self, Feasibility::Infeasible { .. })
    }

    /// Ingredients to omit; empty unless the verdict requires a modification.
    pub fn removals(&self) -> &[IngredientId] {
        match self {
            Feasibility::FeasibleWithModification { remove } => remove,
            _ => &[],
        }
    }
}

/// Assess an offering under a query.
///
/// A mandatory ingredient that violates the query blocks the offering. A
/// removable one must be omitted. An offering whose every ingredient would
/// have to be omitted is infeasible as well.
pub fn assess(tables: &Tables, offering_id: OfferingId, query: &DietaryQuery) -> Result<Feasibility> {
    tables.offering(offering_id)?;
    if query.is_empty() {
        return Ok(Feasibility::Feasible);
    }
    let query = query.normalized();

    let rows = tables.composition(offering_id);
    let mut blocking = BTreeSet::new();
    let mut removable_violations = BTreeSet::new();
    let mut remove = Vec::new();

    for row in rows {
        let violations = query.violations(&attribute_names(tables, row.ingredient_id));
        if violations.is_empty() {
            continue;
        }
        if row.is_removable {
            remove.push(row.ingredient_id);
            removable_violations.extend(violations);
        } else {
            blocking.extend(violations);
        }
    }

    if !blocking.is_empty() {
        return Ok(Feasibility::Infeasible {
            blocking: blocking.into_iter().collect(),
        });
    }
    if remove.is_empty() {
        return Ok(Feasibility::Feasible);
    }
    if remove.len() == rows.len() {
        return Ok(Feasibility::Infeasible {
            blocking: removable_violations.into_iter().collect(),
        });
    }
    Ok(Feasibility::FeasibleWithModification { remove })
}

/// Contains / does-not-contain verdict for one attribute.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttributeCheck {
    pub attribute: String,
    pub present: bool,
}

/// Every attribute carried by any ingredient of an offering.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttributeReport {
    pub offering_id: OfferingId,
    pub offering: String,
    pub attributes: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub checks: Vec<AttributeCheck>,
}

/// Union of attribute names over every ingredient, removable or not.
pub fn attribute_union(tables: &Tables, offering_id: OfferingId) -> BTreeSet<String> {
    tables
        .composition(offering_id)
        .iter()
        .flat_map(|row| attribute_names(tables, row.ingredient_id))
        .collect()
}

/// Handle for dietary queries.
pub struct DietaryFilter<S> {
    store: Arc<S>,
}

impl<S> Clone for DietaryFilter<S> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
        }
    }
}

impl<S: Store> DietaryFilter<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Feasibility of an offering for a guest avoiding `excluded`.
    pub async fn is_feasible_under(
        &self,
        offering_id: OfferingId,
        excluded: &BTreeSet<String>,
    ) -> Result<Feasibility> {
        let query = DietaryQuery {
            excluded: excluded.clone(),
            required: BTreeSet::new(),
        };
        self.assess(offering_id, &query).await
    }

    /// Feasibility of an offering under a full query.
    pub async fn assess(&self, offering_id: OfferingId, query: &DietaryQuery) -> Result<Feasibility> {
        let query = query.clone();
        let verdict = self
            .store
            .read(move |tables| assess(tables, offering_id, &query))
            .await?;
        debug!(offering_id = %offering_id, ?verdict, "Assessed offering");
        Ok(verdict)
    }

    /// Attributes of every ingredient of an offering, optionally checked
    /// against a list of attribute names.
    pub async fn attribute_report(
        &self,
        offering_id: OfferingId,
        check: Option<Vec<String>>,
    ) -> Result<AttributeReport> {
        self.store
            .read(move |tables| {
                let offering = tables.offering(offering_id)?;
                let attributes = attribute_union(tables, offering_id);
                let checks = check
                    .unwrap_or_default()
                    .iter()
                    .map(|name| {
                        let attribute = normalize_name(name);
                        AttributeCheck {
                            present: attributes.contains(&attribute),
                            attribute,
                        }
                    })
                    .collect();
                Ok(AttributeReport {
                    offering_id,
                    offering: offering.name.clone(),
                    attributes: attributes.into_iter().collect(),
                    checks,
                })
            })
            .await
    }
}
