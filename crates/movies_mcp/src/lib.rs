//! MCP tool/resource registry, stdio transport, and request dispatch for the
//! movies catalog server (`spec.md` §4.A/§4.B/§4.D).
//!
//! `movies_protocol` defines the wire shapes; `movies_core` defines the
//! domain services; this crate is the only place that glues a decoded
//! JSON-RPC request to a dispatched operation and an encoded response.

pub mod error_map;
pub mod resources;
pub mod server;
pub mod state;
pub mod tools;
pub mod transport;

pub use resources::ResourceRegistry;
pub use server::{McpServer, McpServerConfig};
pub use state::AppState;
pub use tools::{McpTool, ToolRegistry};
pub use transport::{ChannelTransport, StdioTransport, Transport};
