//! Model Context Protocol subsystem: JSON-RPC 2.0 dispatch over sessions
//! bound to an authenticated principal (spec §4.10, §4.11).

pub mod auth;
pub mod capabilities;
pub mod content;
pub mod dispatcher;
pub mod session;

pub use auth::McpAuthConfig;
pub use capabilities::McpClientCapabilities;
pub use content::{ContentBlock, EmbeddedResource};
pub use dispatcher::{JsonRpcRequest, JsonRpcResponse, McpDispatchOutcome, McpDispatcher, PROTOCOL_VERSION};
pub use session::{Session, SessionManager};
