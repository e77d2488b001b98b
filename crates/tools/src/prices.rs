//! Price tools: stubbed price lookup and update.

use async_trait::async_trait;
use ragent_core::error::ToolError;
use ragent_core::tool::{Tool, ToolGroup, parse_args};
use serde::Deserialize;
use tracing::info;

/// List price every stub product starts from.
const BASE_PRICE: f64 = 100.0;

pub struct PriceTools;

impl ToolGroup for PriceTools {
    fn name(&self) -> &str {
        "prices"
    }

    fn tools(&self) -> Vec<Box<dyn Tool>> {
        vec![Box::new(UpdatePriceTool), Box::new(GetPriceTool)]
    }
}

#[derive(Debug, Deserialize)]
struct UpdatePriceArgs {
    product_id: String,
    new_price: f64,
}

pub struct UpdatePriceTool;

#[async_trait]
impl Tool for UpdatePriceTool {
    fn name(&self) -> &str {
        "update_price"
    }

    fn description(&self) -> &str {
        "Update the price of a product."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "product_id": {
                    "type": "string",
                    "description": "Product ID"
                },
                "new_price": {
                    "type": "number",
                    "description": "New price"
                }
            },
            "required": ["product_id", "new_price"]
        })
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<serde_json::Value, ToolError> {
        let args: UpdatePriceArgs = parse_args(self.name(), arguments)?;
        if !args.new_price.is_finite() || args.new_price < 0.0 {
            return Err(ToolError::InvalidArguments(format!(
                "update_price: new_price must be a non-negative number, got {}",
                args.new_price
            )));
        }

        info!(product_id = %args.product_id, new_price = args.new_price, "Updating price");
        Ok(serde_json::json!({
            "product_id": args.product_id,
            "old_price": BASE_PRICE,
            "new_price": args.new_price,
            "message": "Price updated successfully"
        }))
    }
}

#[derive(Debug, Deserialize)]
struct GetPriceArgs {
    product_id: String,
}

pub struct GetPriceTool;

#[async_trait]
impl Tool for GetPriceTool {
    fn name(&self) -> &str {
        "get_price"
    }

    fn description(&self) -> &str {
        "Look up the current price of a product."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "product_id": {
                    "type": "string",
                    "description": "Product ID"
                }
            },
            "required": ["product_id"]
        })
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<serde_json::Value, ToolError> {
        let args: GetPriceArgs = parse_args(self.name(), arguments)?;
        Ok(serde_json::json!({
            "product_id": args.product_id,
            "price": BASE_PRICE,
            "currency": "CNY"
        }))
    }
}
