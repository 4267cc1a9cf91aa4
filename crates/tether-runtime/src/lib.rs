// tether-runtime: artifact cache and module execution engine
//
// The wasmtime context and WASI state are ported from microsoft/wassette
// (MIT License). Copyright (c) Microsoft Corporation.

//! Artifact cache and module execution engine for tether.
//!
//! [`ArtifactCache`] fetches binary modules by URL into a local directory,
//! [`ModuleEngine`] loads them into an isolated wasmtime context and serves
//! the tools each module is known to provide.
//!
//! # Quick start
//!
//! ```rust,no_run
//! use tether_runtime::{ArtifactCache, EngineConfig, ModuleEngine};
//!
//! # async fn run() -> anyhow::Result<()> {
//! let cache = ArtifactCache::new(ArtifactCache::default_path());
//! cache.init()?;
//! let engine = ModuleEngine::new(EngineConfig::default())?;
//!
//! let artifact = cache
//!     .fetch("http://localhost:8001/binaries/activity-advisor.wasm")
//!     .await?;
//! let module = engine.load(&artifact.local_path).await?;
//! println!("{} loaded in {:?} mode", module.name, module.mode);
//!
//! let result = engine
//!     .invoke(
//!         "get_activity_recommendation",
//!         &serde_json::json!({ "condition": "Sunny", "temp": 25 }),
//!     )
//!     .await?;
//! println!("{}", result.text_content());
//! # Ok(())
//! # }
//! ```

pub mod artifact;
pub mod engine;
pub mod error;
pub mod handlers;
pub mod runtime_context;
pub mod wasistate;

pub use artifact::{ArtifactCache, BlobStoreClient, CachedArtifact, UploadReceipt};
pub use engine::{EngineConfig, ExecutionMode, LoadedModule, ModuleEngine};
pub use error::RuntimeError;
pub use handlers::{HandlerError, HandlerRegistry, ToolHandler};
pub use runtime_context::SandboxPolicy;
