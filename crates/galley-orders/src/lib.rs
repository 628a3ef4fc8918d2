//! # Galley Orders
//!
//! The order item lifecycle: placement with ingredient removals, the status
//! state machine, the time-driven refresh sweep, receipts and settlement.
//!
//! Every mutation runs as one store transaction and writes statuses through
//! [`Tables::compare_and_set_status`](galley_store::Tables::compare_and_set_status),
//! so racing callers can never advance an item twice.

pub mod events;
pub mod instructions;
pub mod lifecycle;
pub mod receipt;
pub mod refresh;

pub use events::{EventFilter, OrderEvent, OrderEventKind, OrderEvents};
pub use instructions::infer_removals;
pub use lifecycle::{OrderItemDetail, OrderManager, PlaceOrderItem, QuantityUpdate};
pub use receipt::{Receipt, ReceiptLine, ReceiptOptions, Settlement};
pub use refresh::{RefreshPolicy, RefreshReport};
