// Ported from microsoft/wassette (MIT License, with tether-specific modifications)
// Copyright (c) Microsoft Corporation.

use wasmtime::component::Linker;
use wasmtime::{Config, Engine, Store};

use crate::error::RuntimeError;
use crate::wasistate::WasiState;

/// Host capabilities granted to every module instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SandboxPolicy {
    /// Give modules the host's network (sockets and name lookup).
    pub allow_network: bool,
}

impl Default for SandboxPolicy {
    fn default() -> Self {
        Self {
            allow_network: true,
        }
    }
}

/// Shared wasmtime engine and linker plus the policy used to build stores.
///
/// Built once per runtime host. The linker carries WASI p2 and WASI HTTP;
/// any other import a module declares (e.g. MCP server-io bindings) is left
/// unresolved, which is what drives the simulated fallback in the engine.
pub struct ExecutionContext {
    pub engine: Engine,
    pub linker: Linker<WasiState>,
    policy: SandboxPolicy,
}

impl ExecutionContext {
    pub fn new(policy: SandboxPolicy) -> Result<Self, RuntimeError> {
        let mut config = Config::new();
        config.wasm_component_model(true);
        config.async_support(true);

        let engine = Engine::new(&config)?;
        let mut linker: Linker<WasiState> = Linker::new(&engine);

        wasmtime_wasi::p2::add_to_linker_async(&mut linker)?;
        wasmtime_wasi_http::add_only_http_to_linker_async(&mut linker)?;

        tracing::debug!(
            allow_network = policy.allow_network,
            "Execution context initialized (component-model + async + WASI p2 + HTTP)"
        );

        Ok(Self {
            engine,
            linker,
            policy,
        })
    }

    /// A fresh, isolated store for one module instance.
    pub fn new_store(&self) -> Store<WasiState> {
        Store::new(&self.engine, WasiState::new(&self.policy))
    }
}
