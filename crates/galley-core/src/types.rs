//! Common types used across the Galley engine.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::GalleyError;

macro_rules! surrogate_key {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(pub u64);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<u64> for $name {
            fn from(value: u64) -> Self {
                Self(value)
            }
        }
    };
}

surrogate_key!(
    /// Key of a menu category.
    CategoryId
);
surrogate_key!(
    /// Key of an ingredient.
    IngredientId
);
surrogate_key!(
    /// Key of a dietary attribute.
    AttributeId
);
surrogate_key!(
    /// Key of a menu offering.
    OfferingId
);
surrogate_key!(
    /// Key of one order line.
    OrderItemId
);
surrogate_key!(
    /// Key of a recorded ingredient removal.
    ModificationId
);
surrogate_key!(
    /// Grouping key for the items of one order (typically a table's tab).
    OrderId
);

/// Status of an order item.
///
/// The live chain is `pending -> preparing -> served -> paid`; `cancelled`
/// is reachable from `pending` or `preparing` only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    /// Placed, not yet picked up by the kitchen.
    Pending,
    /// Being prepared.
    Preparing,
    /// Delivered to the table.
    Served,
    /// Settled. Terminal.
    Paid,
    /// Withdrawn before serving. Terminal.
    Cancelled,
}

impl OrderStatus {
    /// Every status, in chain order with `cancelled` last.
    pub const ALL: [OrderStatus; 5] = [
        OrderStatus::Pending,
        OrderStatus::Preparing,
        OrderStatus::Served,
        OrderStatus::Paid,
        OrderStatus::Cancelled,
    ];

    /// The single forward step from this status, if any.
    pub fn next(&self) -> Option<OrderStatus> {
        match self {
            OrderStatus::Pending => Some(OrderStatus::Preparing),
            OrderStatus::Preparing => Some(OrderStatus::Served),
            OrderStatus::Served => Some(OrderStatus::Paid),
            OrderStatus::Paid | OrderStatus::Cancelled => None,
        }
    }

    /// Returns true if this is a terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(self, OrderStatus::Paid | OrderStatus::Cancelled)
    }

    /// Returns true if an item in this state may still be cancelled.
    pub fn is_cancellable(&self) -> bool {
        matches!(self, OrderStatus::Pending | OrderStatus::Preparing)
    }

    /// Returns true if `to` is a legal single edge from this status.
    pub fn can_transition_to(&self, to: OrderStatus) -> bool {
        self.next() == Some(to) || (to == OrderStatus::Cancelled && self.is_cancellable())
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Preparing => "preparing",
            OrderStatus::Served => "served",
            OrderStatus::Paid => "paid",
            OrderStatus::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OrderStatus {
    type Err = GalleyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        OrderStatus::ALL
            .into_iter()
            .find(|status| status.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| GalleyError::validation(format!("unknown order status '{}'", s)))
    }
}

/// How an attribute takes part in dietary derivation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttributeClass {
    /// A diet an offering can satisfy (vegetarian, vegan).
    Positive,
    /// An allergen or ingredient family a guest may exclude.
    Exclusionary,
    /// Any other tag. Carried through reports but not derived into profiles.
    Other,
}

/// Attributes an offering can satisfy as a whole.
pub const POSITIVE_ATTRIBUTES: [&str; 2] = ["vegetarian", "vegan"];

/// Allergens and ingredient families used for exclusion.
pub const EXCLUSIONARY_ATTRIBUTES: [&str; 9] = [
    "gluten", "dairy", "nuts", "alcohol", "pork", "beef", "poultry", "fish", "seafood",
];

impl AttributeClass {
    /// Classify an attribute by name. Matching is case- and whitespace-insensitive.
    ///
    /// Vegan does not imply vegetarian here: each tag stands alone.
    pub fn of(name: &str) -> AttributeClass {
        let name = normalize_name(name);
        if POSITIVE_ATTRIBUTES.contains(&name.as_str()) {
            AttributeClass::Positive
        } else if EXCLUSIONARY_ATTRIBUTES.contains(&name.as_str()) {
            AttributeClass::Exclusionary
        } else {
            AttributeClass::Other
        }
    }
}

/// Case- and whitespace-normalized form of a catalog name.
///
/// Unique names and name lookups compare in this form, so `"Olive  Oil"`
/// and `"olive oil"` are the same ingredient.
pub fn normalize_name(value: &str) -> String {
    value
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}
