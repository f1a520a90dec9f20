//! Date/time tool, implemented as a synchronous [`FunctionTool`].

use agent_core::{
    AgentError, FunctionTool, ParameterSchema, Result as CoreResult, Tool, ToolArguments,
    ToolSchema,
};
use chrono::{DateTime, Utc};
use serde_json::json;

fn schema() -> ToolSchema {
    let mut format = ParameterSchema::optional(
        "format",
        "string",
        "Output format: 'iso' (RFC 3339), 'unix' (seconds) or 'human'",
    );
    format.default = Some(json!("iso"));
    format.enum_values = Some(vec![json!("iso"), json!("unix"), json!("human")]);

    ToolSchema {
        name: "datetime".into(),
        description: "Returns the current UTC date and time.".into(),
        parameters: vec![format],
        category: Some("utility".into()),
        has_side_effects: false,
    }
}

fn render(now: DateTime<Utc>, format: &str) -> CoreResult<serde_json::Value> {
    let rendered = match format {
        "iso" => json!(now.to_rfc3339()),
        "unix" => json!(now.timestamp()),
        "human" => json!(now.format("%A, %B %-d %Y, %H:%M:%S UTC").to_string()),
        other => {
            return Err(AgentError::ToolValidation(format!(
                "Unknown format '{other}', expected iso, unix or human"
            )));
        }
    };
    Ok(json!({ "datetime": rendered }))
}

fn current_datetime(arguments: ToolArguments) -> CoreResult<serde_json::Value> {
    let format = arguments
        .get("format")
        .and_then(serde_json::Value::as_str)
        .unwrap_or("iso");
    render(Utc::now(), format)
}

/// The `datetime` tool
pub fn datetime_tool() -> impl Tool {
    FunctionTool::new(schema(), current_datetime)
}
