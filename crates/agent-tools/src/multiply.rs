//! Multiply Tool

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use agent_core::{
    parse_arguments, AgentError, ParameterSchema, Result as CoreResult, Tool, ToolArguments,
    ToolSchema,
};

#[derive(Debug, Deserialize)]
struct MultiplyRequest {
    a: i64,
    b: i64,
}

#[derive(Debug, Serialize)]
struct MultiplyResponse {
    product: i64,
}

/// Multiplies two integers
pub struct MultiplyTool;

#[async_trait]
impl Tool for MultiplyTool {
    fn schema(&self) -> ToolSchema {
        ToolSchema {
            name: "multiply".into(),
            description: "Multiplies two integers and returns their product.".into(),
            parameters: vec![
                ParameterSchema::required("a", "integer", "The first integer to multiply."),
                ParameterSchema::required("b", "integer", "The second integer to multiply."),
            ],
            category: Some("math".into()),
            has_side_effects: false,
        }
    }

    async fn execute(&self, arguments: ToolArguments) -> CoreResult<serde_json::Value> {
        let request: MultiplyRequest = parse_arguments(arguments)?;
        tracing::info!(a = request.a, b = request.b, "Multiplying");

        let product = request.a.checked_mul(request.b).ok_or_else(|| {
            AgentError::ToolExecution(format!(
                "{} * {} overflows a 64-bit integer",
                request.a, request.b
            ))
        })?;

        Ok(serde_json::to_value(MultiplyResponse { product })?)
    }
}
