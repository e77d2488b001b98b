//! Order tools: create, update and look up orders.
//!
//! Stubs: no order service is called. Payloads have the shape a real backend
//! would return so the model can reason over them.

use async_trait::async_trait;
use ragent_core::error::ToolError;
use ragent_core::tool::{Tool, ToolGroup, parse_args};
use serde::{Deserialize, Serialize};
use tracing::info;

pub struct OrderTools;

impl ToolGroup for OrderTools {
    fn name(&self) -> &str {
        "orders"
    }

    fn tools(&self) -> Vec<Box<dyn Tool>> {
        vec![
            Box::new(CreateOrderTool),
            Box::new(UpdateOrderTool),
            Box::new(GetOrderTool),
        ]
    }
}

/// Lifecycle states accepted by `update_order`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    Pending,
    Processing,
    Shipped,
    Completed,
    Cancelled,
}

#[derive(Debug, Deserialize)]
struct OrderItem {
    product_id: String,
    quantity: u32,
    #[serde(default)]
    price: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct CreateOrderArgs {
    customer_id: String,
    items: Vec<OrderItem>,
}

pub struct CreateOrderTool;

#[async_trait]
impl Tool for CreateOrderTool {
    fn name(&self) -> &str {
        "create_order"
    }

    fn description(&self) -> &str {
        "Create a new order for a customer."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "customer_id": {
                    "type": "string",
                    "description": "Customer ID"
                },
                "items": {
                    "type": "array",
                    "description": "Order line items",
                    "items": {
                        "type": "object",
                        "properties": {
                            "product_id": { "type": "string" },
                            "quantity": { "type": "integer" },
                            "price": { "type": "number" }
                        }
                    }
                }
            },
            "required": ["customer_id", "items"]
        })
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<serde_json::Value, ToolError> {
        let args: CreateOrderArgs = parse_args(self.name(), arguments)?;

        if args.items.is_empty() {
            return Err(ToolError::InvalidArguments("create_order: items must not be empty".into()));
        }
        if let Some(item) = args.items.iter().find(|i| i.quantity == 0) {
            return Err(ToolError::InvalidArguments(format!(
                "create_order: quantity for {} must be positive",
                item.product_id
            )));
        }

        let total: f64 = args
            .items
            .iter()
            .map(|i| i.price.unwrap_or(0.0) * i.quantity as f64)
            .sum();

        info!(customer_id = %args.customer_id, items = args.items.len(), "Creating order");
        Ok(serde_json::json!({
            "order_id": "ORD-12345",
            "customer_id": args.customer_id,
            "status": "created",
            "item_count": args.items.len(),
            "total_amount": total,
            "message": "Order created successfully"
        }))
    }
}

#[derive(Debug, Deserialize)]
struct UpdateOrderArgs {
    order_id: String,
    status: OrderStatus,
}

pub struct UpdateOrderTool;

#[async_trait]
impl Tool for UpdateOrderTool {
    fn name(&self) -> &str {
        "update_order"
    }

    fn description(&self) -> &str {
        "Update the status of an existing order."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "order_id": {
                    "type": "string",
                    "description": "Order ID"
                },
                "status": {
                    "type": "string",
                    "description": "New order status",
                    "enum": ["pending", "processing", "shipped", "completed", "cancelled"]
                }
            },
            "required": ["order_id", "status"]
        })
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<serde_json::Value, ToolError> {
        let args: UpdateOrderArgs = parse_args(self.name(), arguments)?;
        info!(order_id = %args.order_id, status = ?args.status, "Updating order");
        Ok(serde_json::json!({
            "order_id": args.order_id,
            "status": args.status,
            "message": "Order updated successfully"
        }))
    }
}

#[derive(Debug, Deserialize)]
struct GetOrderArgs {
    order_id: String,
}

pub struct GetOrderTool;

#[async_trait]
impl Tool for GetOrderTool {
    fn name(&self) -> &str {
        "get_order"
    }

    fn description(&self) -> &str {
        "Look up the details of an order."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "order_id": {
                    "type": "string",
                    "description": "Order ID"
                }
            },
            "required": ["order_id"]
        })
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<serde_json::Value, ToolError> {
        let args: GetOrderArgs = parse_args(self.name(), arguments)?;
        Ok(serde_json::json!({
            "order_id": args.order_id,
            "status": OrderStatus::Processing,
            "items": []
        }))
    }
}
