//! Customer tools.

use async_trait::async_trait;
use ragent_core::error::ToolError;
use ragent_core::tool::{Tool, ToolGroup, parse_args};
use serde::{Deserialize, Serialize};
use tracing::info;

pub struct CustomerTools;

impl ToolGroup for CustomerTools {
    fn name(&self) -> &str {
        "customers"
    }

    fn tools(&self) -> Vec<Box<dyn Tool>> {
        vec![
            Box::new(GetCustomerInfoTool),
            Box::new(UpdateCustomerInfoTool),
            Box::new(GetCustomerOrdersTool),
        ]
    }
}

/// Profile fields `update_customer_info` may change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CustomerField {
    Name,
    Email,
    Phone,
    Address,
}

#[derive(Debug, Deserialize)]
struct CustomerIdArgs {
    customer_id: String,
}

pub struct GetCustomerInfoTool;

#[async_trait]
impl Tool for GetCustomerInfoTool {
    fn name(&self) -> &str {
        "get_customer_info"
    }

    fn description(&self) -> &str {
        "Look up a customer's profile."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "customer_id": {
                    "type": "string",
                    "description": "Customer ID"
                }
            },
            "required": ["customer_id"]
        })
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<serde_json::Value, ToolError> {
        let args: CustomerIdArgs = parse_args(self.name(), arguments)?;
        Ok(serde_json::json!({
            "customer_id": args.customer_id,
            "name": "Test Customer",
            "email": "customer@example.com",
            "phone": "13800138000",
            "address": "Pudong New Area, Shanghai",
            "vip_level": "gold"
        }))
    }
}

#[derive(Debug, Deserialize)]
struct UpdateCustomerInfoArgs {
    customer_id: String,
    field: CustomerField,
    value: String,
}

pub struct UpdateCustomerInfoTool;

#[async_trait]
impl Tool for UpdateCustomerInfoTool {
    fn name(&self) -> &str {
        "update_customer_info"
    }

    fn description(&self) -> &str {
        "Update one field of a customer's profile."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "customer_id": {
                    "type": "string",
                    "description": "Customer ID"
                },
                "field": {
                    "type": "string",
                    "description": "Field to update",
                    "enum": ["name", "email", "phone", "address"]
                },
                "value": {
                    "type": "string",
                    "description": "New value"
                }
            },
            "required": ["customer_id", "field", "value"]
        })
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<serde_json::Value, ToolError> {
        let args: UpdateCustomerInfoArgs = parse_args(self.name(), arguments)?;
        if args.field == CustomerField::Email && !args.value.contains('@') {
            return Err(ToolError::InvalidArguments(format!(
                "update_customer_info: '{}' is not an email address",
                args.value
            )));
        }

        info!(customer_id = %args.customer_id, field = ?args.field, "Updating customer info");
        Ok(serde_json::json!({
            "customer_id": args.customer_id,
            "field": args.field,
            "old_value": "previous value",
            "new_value": args.value,
            "message": "Customer info updated successfully"
        }))
    }
}

fn default_limit() -> usize {
    10
}

#[derive(Debug, Deserialize)]
struct GetCustomerOrdersArgs {
    customer_id: String,
    #[serde(default = "default_limit")]
    limit: usize,
}

pub struct GetCustomerOrdersTool;

#[async_trait]
impl Tool for GetCustomerOrdersTool {
    fn name(&self) -> &str {
        "get_customer_orders"
    }

    fn description(&self) -> &str {
        "List a customer's recent orders."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "customer_id": {
                    "type": "string",
                    "description": "Customer ID"
                },
                "limit": {
                    "type": "integer",
                    "description": "Maximum number of orders to return",
                    "default": 10
                }
            },
            "required": ["customer_id"]
        })
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<serde_json::Value, ToolError> {
        let args: GetCustomerOrdersArgs = parse_args(self.name(), arguments)?;
        let orders: Vec<serde_json::Value> = [
            ("ORD-001", "completed", 100.0),
            ("ORD-002", "processing", 200.0),
        ]
        .into_iter()
        .take(args.limit)
        .map(|(id, status, amount)| {
            serde_json::json!({"order_id": id, "status": status, "amount": amount})
        })
        .collect();

        Ok(serde_json::json!({
            "customer_id": args.customer_id,
            "total": orders.len(),
            "orders": orders
        }))
    }
}
