//! Business tools the model can call during a turn.
//!
//! Each module contributes one [`ToolGroup`]. The backends are stubs that
//! return fixed, well-formed payloads; swapping one for a real service
//! only touches its `execute` body.

pub mod customers;
pub mod inventory;
pub mod orders;
pub mod prices;

use std::time::Duration;

use ragent_core::error::ToolError;
use ragent_core::tool::{ToolGroup, ToolRegistry};

pub use customers::CustomerTools;
pub use inventory::InventoryTools;
pub use orders::OrderTools;
pub use prices::PriceTools;

/// Every built-in group, in registration order.
pub fn groups() -> Vec<Box<dyn ToolGroup>> {
    vec![
        Box::new(OrderTools),
        Box::new(PriceTools),
        Box::new(InventoryTools),
        Box::new(CustomerTools),
    ]
}

/// Registry with all built-in tools, each call bounded by `timeout`.
pub fn default_registry(timeout: Duration) -> Result<ToolRegistry, ToolError> {
    groups()
        .iter()
        .fold(ToolRegistry::builder().with_timeout(timeout), |builder, group| {
            builder.register_group(group.as_ref())
        })
        .build()
}
