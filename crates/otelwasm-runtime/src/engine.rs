//! The capability set the plugin host depends on.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use crate::environment::GuestEnvironment;
use crate::error::RuntimeResult;
use crate::host::HostModule;
use crate::value::{FuncSignature, Value};

/// Selects which back-end executes a plugin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EngineKind {
    /// The portable `wasmi` interpreter. Default.
    #[default]
    Interpreter,
    /// The Cranelift-backed `wasmtime` engine.
    Compiled,
}

impl FromStr for EngineKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "interpreter" => Ok(EngineKind::Interpreter),
            "compiled" => Ok(EngineKind::Compiled),
            other => Err(format!(
                "unknown engine {other:?}, expected \"interpreter\" or \"compiled\""
            )),
        }
    }
}

impl fmt::Display for EngineKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EngineKind::Interpreter => f.write_str("interpreter"),
            EngineKind::Compiled => f.write_str("compiled"),
        }
    }
}

/// A Wasm engine: compiles module bytes.
pub trait WasmEngine: Send + Sync {
    /// Which back-end this is.
    fn kind(&self) -> EngineKind;

    /// Compile and validate module bytes.
    ///
    /// Verifies the module exports a linear memory named `memory`;
    /// modules without one are rejected before instantiation.
    ///
    /// # Errors
    ///
    /// [`RuntimeError::CompileFailed`] on parse/validation failure,
    /// [`RuntimeError::MemoryExportMissing`] when the memory export is
    /// absent.
    ///
    /// [`RuntimeError::CompileFailed`]: crate::RuntimeError::CompileFailed
    /// [`RuntimeError::MemoryExportMissing`]: crate::RuntimeError::MemoryExportMissing
    fn compile(&self, bytes: &[u8]) -> RuntimeResult<Box<dyn CompiledModule>>;
}

/// A compiled module: instantiates with host imports.
pub trait CompiledModule: Send {
    /// Instantiate the module, registering every function of
    /// `host_module` as an import, wiring the system-interface subset
    /// from `env`, and running the module's `_initialize` start function
    /// when exported.
    ///
    /// # Errors
    ///
    /// [`RuntimeError::InstantiateFailed`] when imports cannot be
    /// resolved or the start/`_initialize` call traps.
    ///
    /// [`RuntimeError::InstantiateFailed`]: crate::RuntimeError::InstantiateFailed
    fn instantiate(
        &self,
        host_module: &HostModule,
        env: &GuestEnvironment,
    ) -> RuntimeResult<Box<dyn InstanceHandle>>;
}

/// Interrupts a running guest from another thread.
///
/// Obtained from [`InstanceHandle::interrupter`] before a call starts;
/// used by receiver shutdown when the grace period expires.
pub trait Interrupter: Send + Sync {
    /// Request the guest trap at its next interruption point.
    fn interrupt(&self);
}

/// A live module instance owning a store and its linear memory.
///
/// Calls take `&mut self`: a Wasm instance is single-threaded and the
/// adapter makes that explicit. Serialization across host threads is the
/// caller's concern (the plugin host holds each handle behind a mutex).
pub trait InstanceHandle: Send {
    /// Signature of the named export, when present and expressible in
    /// the adapter's scalar types.
    fn export(&mut self, name: &str) -> Option<FuncSignature>;

    /// Call the named export.
    ///
    /// # Errors
    ///
    /// [`RuntimeError::ExportNotFound`] for unknown names,
    /// [`RuntimeError::Trap`] when the guest or one of its host imports
    /// faults, [`RuntimeError::Closed`] after [`close`](Self::close).
    ///
    /// [`RuntimeError::ExportNotFound`]: crate::RuntimeError::ExportNotFound
    /// [`RuntimeError::Trap`]: crate::RuntimeError::Trap
    /// [`RuntimeError::Closed`]: crate::RuntimeError::Closed
    fn call(&mut self, name: &str, args: &[Value]) -> RuntimeResult<Vec<Value>>;

    /// Read `len` bytes of guest memory at `offset`. `None` when out of
    /// bounds or closed.
    fn memory_read(&mut self, offset: u32, len: u32) -> Option<Vec<u8>>;

    /// Write into guest memory at `offset`. `false` when out of bounds
    /// or closed.
    fn memory_write(&mut self, offset: u32, bytes: &[u8]) -> bool;

    /// A handle that can interrupt a call on this instance from another
    /// thread, when the back-end supports it. The interpreter returns
    /// `None`; the compiled back-end traps the guest at its next epoch
    /// check.
    fn interrupter(&self) -> Option<Arc<dyn Interrupter>>;

    /// Release the store and instance. Idempotent; later calls fail
    /// with `Closed`, later memory accesses report out of bounds.
    fn close(&mut self);
}
