//! MCP tool implementations.
//!
//! One tool per foreground operation: interception, the control channel,
//! the sync queue, push delivery and client bookkeeping.

use harbor_core::Error;
use rmcp::{
    ErrorData as McpError,
    model::{CallToolResult, Content},
};
use serde::Serialize;

pub mod cache;
pub mod fetch;
pub mod notify;
pub mod sync;

#[cfg(test)]
pub(crate) mod testing;

/// Serialize a tool output as pretty JSON text content.
pub(crate) fn json_result<T: Serialize>(output: &T) -> Result<CallToolResult, McpError> {
    let json = serde_json::to_string_pretty(output)
        .map_err(|e| Error::InvalidInput(format!("Failed to serialize tool output: {e}")))?;
    Ok(CallToolResult::success(vec![Content::text(json)]))
}
