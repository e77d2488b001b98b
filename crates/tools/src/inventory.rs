//! Inventory tools: stock checks, adjustments and reservations.

use async_trait::async_trait;
use ragent_core::error::ToolError;
use ragent_core::tool::{Tool, ToolGroup, parse_args};
use serde::Deserialize;
use tracing::info;

const DEFAULT_WAREHOUSE: &str = "default";
const AVAILABLE: i64 = 100;
const RESERVED: i64 = 10;

pub struct InventoryTools;

impl ToolGroup for InventoryTools {
    fn name(&self) -> &str {
        "inventory"
    }

    fn tools(&self) -> Vec<Box<dyn Tool>> {
        vec![
            Box::new(CheckInventoryTool),
            Box::new(UpdateInventoryTool),
            Box::new(ReserveInventoryTool),
        ]
    }
}

#[derive(Debug, Deserialize)]
struct CheckInventoryArgs {
    product_id: String,
    #[serde(default)]
    warehouse_id: Option<String>,
}

pub struct CheckInventoryTool;

#[async_trait]
impl Tool for CheckInventoryTool {
    fn name(&self) -> &str {
        "check_inventory"
    }

    fn description(&self) -> &str {
        "Check the stock level of a product, optionally in one warehouse."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "product_id": {
                    "type": "string",
                    "description": "Product ID"
                },
                "warehouse_id": {
                    "type": "string",
                    "description": "Warehouse ID (optional)"
                }
            },
            "required": ["product_id"]
        })
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<serde_json::Value, ToolError> {
        let args: CheckInventoryArgs = parse_args(self.name(), arguments)?;
        let warehouse = args
            .warehouse_id
            .filter(|w| !w.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_WAREHOUSE.to_string());

        Ok(serde_json::json!({
            "product_id": args.product_id,
            "warehouse_id": warehouse,
            "available_quantity": AVAILABLE,
            "reserved_quantity": RESERVED,
            "total_quantity": AVAILABLE + RESERVED
        }))
    }
}

#[derive(Debug, Deserialize)]
struct UpdateInventoryArgs {
    product_id: String,
    quantity: i64,
    warehouse_id: String,
}

pub struct UpdateInventoryTool;

#[async_trait]
impl Tool for UpdateInventoryTool {
    fn name(&self) -> &str {
        "update_inventory"
    }

    fn description(&self) -> &str {
        "Adjust the stock of a product. Positive quantities add stock, negative ones remove it."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "product_id": {
                    "type": "string",
                    "description": "Product ID"
                },
                "quantity": {
                    "type": "integer",
                    "description": "Quantity change (positive adds, negative removes)"
                },
                "warehouse_id": {
                    "type": "string",
                    "description": "Warehouse ID"
                }
            },
            "required": ["product_id", "quantity", "warehouse_id"]
        })
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<serde_json::Value, ToolError> {
        let args: UpdateInventoryArgs = parse_args(self.name(), arguments)?;
        let new_quantity = AVAILABLE + args.quantity;
        if new_quantity < 0 {
            return Err(ToolError::ExecutionFailed {
                tool_name: self.name().into(),
                reason: format!(
                    "insufficient stock for {}: {} available, change of {}",
                    args.product_id, AVAILABLE, args.quantity
                ),
            });
        }

        info!(
            product_id = %args.product_id,
            warehouse_id = %args.warehouse_id,
            change = args.quantity,
            "Updating inventory"
        );
        Ok(serde_json::json!({
            "product_id": args.product_id,
            "warehouse_id": args.warehouse_id,
            "quantity_change": args.quantity,
            "new_quantity": new_quantity,
            "message": "Inventory updated successfully"
        }))
    }
}

#[derive(Debug, Deserialize)]
struct ReserveInventoryArgs {
    product_id: String,
    quantity: u32,
    order_id: String,
}

pub struct ReserveInventoryTool;

#[async_trait]
impl Tool for ReserveInventoryTool {
    fn name(&self) -> &str {
        "reserve_inventory"
    }

    fn description(&self) -> &str {
        "Reserve stock of a product for an order."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "product_id": {
                    "type": "string",
                    "description": "Product ID"
                },
                "quantity": {
                    "type": "integer",
                    "description": "Quantity to reserve"
                },
                "order_id": {
                    "type": "string",
                    "description": "Order ID the reservation belongs to"
                }
            },
            "required": ["product_id", "quantity", "order_id"]
        })
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<serde_json::Value, ToolError> {
        let args: ReserveInventoryArgs = parse_args(self.name(), arguments)?;
        if args.quantity == 0 {
            return Err(ToolError::InvalidArguments("reserve_inventory: quantity must be positive".into()));
        }
        if i64::from(args.quantity) > AVAILABLE {
            return Err(ToolError::ExecutionFailed {
                tool_name: self.name().into(),
                reason: format!(
                    "cannot reserve {} of {}: only {} available",
                    args.quantity, args.product_id, AVAILABLE
                ),
            });
        }

        info!(product_id = %args.product_id, order_id = %args.order_id, quantity = args.quantity, "Reserving inventory");
        Ok(serde_json::json!({
            "product_id": args.product_id,
            "order_id": args.order_id,
            "reserved_quantity": args.quantity,
            "message": "Inventory reserved successfully"
        }))
    }
}
