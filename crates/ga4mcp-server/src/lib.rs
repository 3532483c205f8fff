//! GA4 tool handlers and the state they share.
//!
//! The handlers are served over MCP stdio by [`mcp`], and the `ga4mcp`
//! binary also maps its subcommands onto them directly.

pub mod cli;
pub mod context;
pub mod mcp;
pub mod tools;

pub use context::{ContextOptions, DEFAULT_TIMEOUT, Ga4Context};
pub use mcp::{Ga4McpServer, ServeError, serve_stdio};
