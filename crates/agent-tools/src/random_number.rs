//! Random Number Tool

use async_trait::async_trait;
use rand::Rng;
use serde::{Deserialize, Serialize};

use agent_core::{parse_arguments, ParameterSchema, Result as CoreResult, Tool, ToolArguments, ToolSchema};

#[derive(Debug, Deserialize)]
struct RandomNumberRequest {
    min_val: i64,
    max_val: i64,
}

#[derive(Debug, Serialize)]
struct RandomNumberResponse {
    random_number: i64,
}

/// Generates a random integer in an inclusive range.
///
/// Reversed bounds are swapped rather than rejected.
pub struct RandomNumberTool;

#[async_trait]
impl Tool for RandomNumberTool {
    fn schema(&self) -> ToolSchema {
        ToolSchema {
            name: "generate_random_number".into(),
            description:
                "Generates a random integer between a specified minimum and maximum (inclusive)."
                    .into(),
            parameters: vec![
                ParameterSchema::required(
                    "min_val",
                    "integer",
                    "The minimum value for the random number (inclusive).",
                ),
                ParameterSchema::required(
                    "max_val",
                    "integer",
                    "The maximum value for the random number (inclusive).",
                ),
            ],
            category: Some("math".into()),
            has_side_effects: false,
        }
    }

    async fn execute(&self, arguments: ToolArguments) -> CoreResult<serde_json::Value> {
        let RandomNumberRequest {
            mut min_val,
            mut max_val,
        } = parse_arguments(arguments)?;

        if min_val > max_val {
            tracing::warn!(min_val, max_val, "min_val is greater than max_val, swapping them");
            std::mem::swap(&mut min_val, &mut max_val);
        }

        tracing::info!(min_val, max_val, "Generating random number");
        let random_number = rand::thread_rng().gen_range(min_val..=max_val);

        Ok(serde_json::to_value(RandomNumberResponse { random_number })?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    async fn draw(min_val: i64, max_val: i64) -> i64 {
        let args = json!({"min_val": min_val, "max_val": max_val})
            .as_object()
            .cloned()
            .unwrap();
        let result = RandomNumberTool.execute(args).await.unwrap();
        result["random_number"].as_i64().unwrap()
    }

    #[tokio::test]
    async fn stays_within_bounds() {
        for _ in 0..50 {
            let n = draw(1, 6).await;
            assert!((1..=6).contains(&n));
        }
    }

    #[tokio::test]
    async fn reversed_bounds_are_swapped() {
        for _ in 0..20 {
            let n = draw(10, 5).await;
            assert!((5..=10).contains(&n));
        }
    }

    #[tokio::test]
    async fn single_value_range() {
        assert_eq!(draw(7, 7).await, 7);
    }
}
