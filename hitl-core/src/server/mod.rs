//! Tool facade: an MCP server exposing the bridge to agents over stdio

pub mod guidance;
pub mod mcp;
pub mod protocol;
pub mod tools;

pub use mcp::{McpServer, ToolHandler};
pub use tools::{ToolContent, ToolDefinition, ToolResult};
