//! Built-in tools.
//!
//! A tiny set used by tests and scaffolded deployments; production tool
//! surfaces are registered by the host.

use async_trait::async_trait;
use schemars::JsonSchema;
use serde::Deserialize;
use serde_json::Value;

use super::{Tool, ToolContext, ToolResult};

/// Echoes its input back. Useful for wiring tests and smoke checks.
#[derive(Debug, Clone, Copy, Default)]
pub struct EchoTool;

#[derive(Debug, Deserialize, JsonSchema)]
struct EchoArgs {
    /// The message to echo.
    message: String,
}

#[async_trait]
impl Tool for EchoTool {
    fn name(&self) -> &str {
        "echo"
    }

    fn description(&self) -> &str {
        "Echo the provided message back unchanged."
    }

    fn parameters_schema(&self) -> Value {
        serde_json::to_value(schemars::schema_for!(EchoArgs)).unwrap_or_default()
    }

    async fn execute(&self, args: Value, _context: &ToolContext) -> ToolResult {
        match serde_json::from_value::<EchoArgs>(args) {
            Ok(args) => ToolResult::ok(args.message),
            Err(e) => ToolResult::err(format!("invalid arguments: {e}")),
        }
    }
}

/// Reads a file within the caller's path allowlist.
#[derive(Debug, Clone, Copy, Default)]
pub struct ReadFileTool;

#[derive(Debug, Deserialize, JsonSchema)]
struct ReadFileArgs {
    /// Absolute path of the file to read.
    path: String,
}

#[async_trait]
impl Tool for ReadFileTool {
    fn name(&self) -> &str {
        "file_read"
    }

    fn description(&self) -> &str {
        "Read a UTF-8 text file from an allowlisted path."
    }

    fn parameters_schema(&self) -> Value {
        serde_json::to_value(schemars::schema_for!(ReadFileArgs)).unwrap_or_default()
    }

    async fn execute(&self, args: Value, context: &ToolContext) -> ToolResult {
        let args: ReadFileArgs = match serde_json::from_value(args) {
            Ok(a) => a,
            Err(e) => return ToolResult::err(format!("invalid arguments: {e}")),
        };
        if !context.path_allowlist.is_empty()
            && !context
                .path_allowlist
                .iter()
                .any(|p| args.path.starts_with(p))
        {
            return ToolResult::err(format!("path '{}' not in allowlist", args.path));
        }
        match tokio::fs::read_to_string(&args.path).await {
            Ok(content) => ToolResult::ok(content),
            Err(e) => ToolResult::err(format!("read failed: {e}")),
        }
    }
}
