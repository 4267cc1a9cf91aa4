//! Host-side tool handlers.
//!
//! Every tool a runtime host can serve is backed by a [`ToolHandler`] in the
//! [`HandlerRegistry`]. Handlers are resolved by tool name at call time and do
//! not depend on whether the module that advertises the tool was instantiated
//! natively or fell back to simulation.

pub mod activity;
pub mod weather;

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use tether_core::{ContentBlock, ToolSpec};
use thiserror::Error;

pub use activity::ActivityAdvisor;
pub use weather::{WeatherEndpoints, WeatherLookup};

/// Which tools each known module provides.
///
/// Modules are recognised by name (the artifact's file stem); a module not in
/// this table loads fine but contributes no tools.
const MODULE_CAPABILITIES: &[(&str, &[&str])] = &[
    ("weather-tool", &[weather::TOOL_NAME]),
    ("activity-advisor", &[activity::TOOL_NAME]),
];

/// Tool names statically associated with a module name.
pub fn module_capabilities(module_name: &str) -> &'static [&'static str] {
    MODULE_CAPABILITIES
        .iter()
        .find(|(name, _)| *name == module_name)
        .map(|(_, tools)| *tools)
        .unwrap_or(&[])
}

/// Failure inside a tool's own logic.
///
/// These never escape as call failures: the engine renders them as a text
/// block so the model can read them.
#[derive(Debug, Error)]
pub enum HandlerError {
    #[error("Missing required parameter: {0}")]
    MissingArgument(&'static str),

    #[error("Invalid parameter '{name}': {reason}")]
    InvalidArgument { name: &'static str, reason: String },

    #[error("{0}")]
    NotFound(String),

    #[error("upstream request failed: {0}")]
    Upstream(String),
}

impl From<reqwest::Error> for HandlerError {
    fn from(e: reqwest::Error) -> Self {
        HandlerError::Upstream(e.to_string())
    }
}

pub type HandlerFuture<'a> =
    Pin<Box<dyn Future<Output = Result<Vec<ContentBlock>, HandlerError>> + Send + 'a>>;

/// A single named tool implemented on the host.
pub trait ToolHandler: Send + Sync {
    fn spec(&self) -> ToolSpec;

    fn call<'a>(&'a self, arguments: &'a serde_json::Value) -> HandlerFuture<'a>;
}

/// Tool name → handler.
#[derive(Default)]
pub struct HandlerRegistry {
    handlers: HashMap<String, Arc<dyn ToolHandler>>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// The handlers for every module in the capability table.
    pub fn builtin(http: reqwest::Client, weather: WeatherEndpoints) -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(WeatherLookup::new(http, weather)));
        registry.register(Arc::new(ActivityAdvisor));
        registry
    }

    /// Register a handler under its spec's name, replacing any previous one.
    pub fn register(&mut self, handler: Arc<dyn ToolHandler>) {
        let name = handler.spec().name;
        self.handlers.insert(name, handler);
    }

    pub fn get(&self, tool_name: &str) -> Option<&Arc<dyn ToolHandler>> {
        self.handlers.get(tool_name)
    }

    pub fn contains(&self, tool_name: &str) -> bool {
        self.handlers.contains_key(tool_name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn capability_table_maps_known_modules() {
        assert_eq!(module_capabilities("weather-tool"), &["get_weather"]);
        assert_eq!(
            module_capabilities("activity-advisor"),
            &["get_activity_recommendation"]
        );
        assert!(module_capabilities("unknown-module").is_empty());
    }

    #[test]
    fn builtin_registry_covers_capability_table() {
        let registry = HandlerRegistry::builtin(reqwest::Client::new(), WeatherEndpoints::default());
        for (_, tools) in MODULE_CAPABILITIES {
            for tool in *tools {
                assert!(registry.contains(tool), "no handler for {tool}");
            }
        }
    }
}
