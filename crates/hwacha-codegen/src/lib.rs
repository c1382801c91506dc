// SPDX-License-Identifier: (MIT OR Apache-2.0)

//! Hwacha device code generator: kernel statement trees → Cranelift IR →
//! riscv64 assembly or object code.
//!
//! Loops over lane variables (`.__block_id_x`, `.__thread_id_x`) are mapped
//! onto lane-index intrinsics; block loops are outlined into their own
//! entry points. Everything else goes through the generic lowering engine.

mod types;
mod scope;
pub mod lane;
mod module;
pub mod target;
mod dispatch;
mod generic;
mod device;
mod emitter;
mod outline;
pub mod backend;
mod tests;

pub use backend::BackendInvoker;
pub use emitter::DeviceKernelEmitter;
pub use lane::{IntrinsicId, LaneDim, LaneKind, LaneVar};
pub use module::{
    ArgSlot, DataLayout, FuncIndex, KernelFunction, KernelModule, KernelRole, ParamAttrs, Symbol,
    SymbolKind,
};
pub use scope::{ScopeGuard, SymbolScope};
pub use target::{BackendOptions, OptLevel, OutputKind, RelocModel, TargetDescriptor};

use std::sync::Once;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CodegenError {
    /// Module not initialized, backend support missing, or a symbol name clash.
    #[error("configuration error: {0}")]
    Configuration(String),
    /// An IR construct this accelerator configuration does not lower.
    #[error("unsupported construct: {0}")]
    UnsupportedConstruct(String),
    #[error("invariant violation: {0}")]
    InvariantViolation(String),
    /// Message from Cranelift, passed through unchanged.
    #[error("backend error: {0}")]
    Backend(String),
}

pub type CodegenResult<T> = Result<T, CodegenError>;

static TRACING_INIT: Once = Once::new();

/// Initialize tracing for debug output.
///
/// Safe to call multiple times. `RUST_LOG` wins when set; otherwise
/// `default_directive` (e.g. `"hwacha_codegen=debug"`) enables output.
pub fn init_tracing(default_directive: Option<&str>) {
    TRACING_INIT.call_once(|| {
        use tracing_subscriber::{fmt, prelude::*, EnvFilter};

        let filter = match (std::env::var("RUST_LOG"), default_directive) {
            (Ok(_), _) => EnvFilter::from_default_env(),
            (Err(_), Some(directive)) => EnvFilter::new(directive),
            (Err(_), None) => return,
        };
        tracing_subscriber::registry()
            .with(fmt::layer().with_target(true).with_level(true).with_writer(std::io::stderr))
            .with(filter)
            .init();
    });
}
