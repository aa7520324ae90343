//! Error types for the runtime adapter.

use thiserror::Error;

/// Runtime adapter result type.
pub type RuntimeResult<T> = Result<T, RuntimeError>;

/// Errors raised by the runtime adapter and its back-ends.
#[derive(Error, Debug)]
pub enum RuntimeError {
    /// The module bytes failed to parse or validate.
    #[error("module compilation failed: {reason}")]
    CompileFailed {
        /// Engine-reported reason.
        reason: String,
    },

    /// The module does not export a linear memory named `memory`.
    #[error("module does not export a memory named \"memory\"")]
    MemoryExportMissing,

    /// Instantiation failed (unresolved imports, start trap, resource
    /// exhaustion).
    #[error("module instantiation failed: {reason}")]
    InstantiateFailed {
        /// Engine-reported reason.
        reason: String,
    },

    /// A guest function trapped during execution. Host-import faults
    /// (bad pointers, undecodable payloads) surface here as well.
    #[error("guest trapped in {export}: {reason}")]
    Trap {
        /// Export that was executing.
        export: String,
        /// Engine-reported trap reason.
        reason: String,
    },

    /// A function was called that the instance does not export.
    #[error("instance has no export named {export}")]
    ExportNotFound {
        /// The missing export.
        export: String,
    },

    /// A signature uses a value type the adapter does not carry.
    #[error("unsupported wasm value type: {value_type}")]
    UnsupportedValueType {
        /// The offending type, engine-rendered.
        value_type: String,
    },

    /// Two host functions were registered under the same name.
    #[error("duplicate host function: {name}")]
    DuplicateHostFunction {
        /// The duplicated name.
        name: String,
    },

    /// The instance has been closed; no further calls are possible.
    #[error("instance is closed")]
    Closed,
}
