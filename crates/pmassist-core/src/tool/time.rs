//! `current_time` tool.

use chrono::{Local, SecondsFormat};
use schemars::JsonSchema;
use serde::Deserialize;

use pmassist_types::llm::ToolDefinition;

use super::{Tool, ToolContext, ToolError, input_schema, parse_input};

#[derive(Debug, Deserialize, JsonSchema)]
struct CurrentTimeInput {}

/// Returns the current local time in ISO-8601 format.
pub struct CurrentTimeTool;

impl Tool for CurrentTimeTool {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: "current_time".to_string(),
            description: "Returns the current local time in ISO 8601 format.".to_string(),
            parameters: input_schema::<CurrentTimeInput>(),
        }
    }

    async fn call(
        &self,
        _ctx: &ToolContext,
        input: serde_json::Value,
    ) -> Result<serde_json::Value, ToolError> {
        let CurrentTimeInput {} = parse_input(input)?;
        Ok(serde_json::Value::String(
            Local::now().to_rfc3339_opts(SecondsFormat::Secs, false),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_current_time_is_rfc3339() {
        let ctx = ToolContext::new("t", "u", Vec::new());
        let out = CurrentTimeTool.call(&ctx, serde_json::json!({})).await.unwrap();
        let text = out.as_str().unwrap();
        assert!(chrono::DateTime::parse_from_rfc3339(text).is_ok(), "{text}");
    }
}
