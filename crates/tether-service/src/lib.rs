//! Orchestration service for tether.
//!
//! Startup pulls [`ToolSource`](tether_core::ToolSource)s from the registry,
//! and the [`SessionManager`] opens one runtime host per source and builds the
//! [`ToolCatalog`]. Each chat request is then driven by an [`Orchestrator`]
//! against the configured [`LlmClient`].

pub mod catalog;
pub mod config;
pub mod error;
pub mod http;
pub mod llm;
pub mod manager;
pub mod orchestrator;
pub mod registry;
pub mod session;

#[cfg(test)]
pub(crate) mod test_support;

pub use catalog::{CatalogEntry, ToolCatalog};
pub use config::TetherConfig;
pub use error::ServiceError;
pub use llm::{ChatRequest, LlmClient};
pub use manager::SessionManager;
pub use orchestrator::{Orchestrator, RunOutcome};
pub use session::{ChildProcessConnector, HostCommand, SessionConnector, ToolSession};
