//! MCP (Model Context Protocol) over HTTP with Server-Sent Events.
//!
//! Each client holds two channels:
//!
//! - `GET <mcp_path>` opens the push stream. The first event announces the
//!   URL the client posts to, including its session id.
//! - `POST <messages_path>?sessionId=<id>` carries JSON-RPC requests. Every
//!   response travels back over the push stream of the same session.
//!
//! A session lives exactly as long as its push stream.

pub mod heartbeat;
pub mod protocol;
pub mod server;
pub mod session;

pub use protocol::{Incoming, McpNotification, McpRequest};
pub use server::McpServer;
pub use session::{PushChannel, PushFrame, SessionHandle, SessionRegistry, SessionState};
