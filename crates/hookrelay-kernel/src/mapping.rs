//! Per-event payload adjustments.

use serde_json::{Map, Value};

pub const MAX_PROMPT_CHARS: usize = 2000;
pub const TRUNCATION_SUFFIX: &str = "...[truncated]";

pub const MCP_PREFIXES: [&str; 2] = ["mcp__", "mcp_"];

pub const COMPACT_INSTRUCTIONS: &str = "When compacting, preserve:
1. The current plan file path and active task number
2. Any failing tests and their error messages
3. Completed task IDs and any explicit user constraints";

/// `Some` with the shortened prompt when it exceeds [`MAX_PROMPT_CHARS`].
pub fn truncate_prompt(prompt: &str) -> Option<String> {
    if prompt.chars().count() <= MAX_PROMPT_CHARS {
        return None;
    }
    let mut truncated: String = prompt.chars().take(MAX_PROMPT_CHARS).collect();
    truncated.push_str(TRUNCATION_SUFFIX);
    Some(truncated)
}

pub fn is_mcp_tool(tool_name: &str) -> bool {
    MCP_PREFIXES
        .iter()
        .any(|prefix| tool_name.starts_with(prefix))
}

/// `mcp__github__create_issue` → `github`; `"unknown"` without a `__` segment.
pub fn mcp_server(tool_name: &str) -> String {
    tool_name
        .split("__")
        .nth(1)
        .unwrap_or("unknown")
        .to_owned()
}

/// Adds `is_mcp_tool`, and `mcp_server` for MCP tools.
pub fn tag_mcp_tool(payload: &mut Map<String, Value>, tool_name: &str) {
    let is_mcp = is_mcp_tool(tool_name);
    payload.insert("is_mcp_tool".to_owned(), Value::Bool(is_mcp));
    if is_mcp {
        payload.insert("mcp_server".to_owned(), Value::String(mcp_server(tool_name)));
    }
}
