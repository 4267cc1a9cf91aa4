//! Shared data model for tether.
//!
//! Every other crate in the workspace speaks in these types: the registry
//! yields [`ToolSource`]s, runtime hosts report [`ToolSpec`]s and produce
//! [`ToolCallResult`]s, and the orchestrator drives a transcript of
//! [`ChatMessage`]s.

pub mod chat;
pub mod source;
pub mod tool;

pub use chat::{ChatMessage, Role, ToolCallRequest};
pub use source::ToolSource;
pub use tool::{ContentBlock, ToolCallResult, ToolSpec};
