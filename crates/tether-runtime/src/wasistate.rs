// Ported from microsoft/wassette (MIT License, with tether-specific modifications)
// Copyright (c) Microsoft Corporation.

use wasmtime::component::ResourceTable;
use wasmtime_wasi::{WasiCtx, WasiCtxBuilder, WasiCtxView, WasiView};
use wasmtime_wasi_http::{WasiHttpCtx, WasiHttpView};

use crate::runtime_context::SandboxPolicy;

/// WASI state owned by one module's store.
///
/// - stderr and the process environment are inherited
/// - stdout is NOT inherited: the runtime host's stdout is its transport
/// - network access follows [`SandboxPolicy::allow_network`]
/// - no filesystem preopens
pub struct WasiState {
    ctx: WasiCtx,
    table: ResourceTable,
    http: WasiHttpCtx,
}

impl WasiView for WasiState {
    fn ctx(&mut self) -> WasiCtxView<'_> {
        WasiCtxView {
            ctx: &mut self.ctx,
            table: &mut self.table,
        }
    }
}

impl WasiHttpView for WasiState {
    fn ctx(&mut self) -> &mut WasiHttpCtx {
        &mut self.http
    }
    fn table(&mut self) -> &mut ResourceTable {
        &mut self.table
    }
}

impl WasiState {
    pub fn new(policy: &SandboxPolicy) -> Self {
        let mut builder = WasiCtxBuilder::new();
        builder.inherit_stderr().inherit_env();
        if policy.allow_network {
            builder.inherit_network().allow_ip_name_lookup(true);
        }

        Self {
            ctx: builder.build(),
            table: ResourceTable::new(),
            http: WasiHttpCtx::new(),
        }
    }
}
