//! Error taxonomy of the plugin host.
//!
//! Load-time errors abort the load; per-call errors leave the original
//! batch with the caller; guest status codes propagate verbatim with
//! their reason string. Messages name the export or host function
//! involved wherever one is identifiable.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use otelwasm_pdata::CodecError;
use otelwasm_plugin_abi::{Signal, Status};
use otelwasm_runtime::RuntimeError;

use crate::lifecycle::PluginState;

/// Plugin host result type.
pub type HostResult<T> = Result<T, HostError>;

/// Errors raised by the plugin host.
#[derive(Error, Debug)]
pub enum HostError {
    /// The plugin configuration is unusable (missing `path`, unknown
    /// engine, unserializable `plugin_config`).
    #[error("invalid plugin configuration: {reason}")]
    InvalidConfig {
        /// What was wrong.
        reason: String,
    },

    /// The module file could not be read.
    #[error("failed to read wasm module {path}: {source}")]
    ReadModule {
        /// The configured module path.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// The module bytes failed to compile or validate.
    #[error("module compilation failed: {reason}")]
    Compile {
        /// Engine-reported reason.
        reason: String,
    },

    /// The module does not export a memory named `memory`.
    #[error("module does not export a memory named \"memory\"")]
    MemoryExportMissing,

    /// Instantiation with the host module failed.
    #[error("module instantiation failed: {reason}")]
    Instantiate {
        /// Engine-reported reason.
        reason: String,
    },

    /// A push-model export was required of a module that does not carry
    /// the ABI v1 marker.
    #[error(
        "plugin does not export the ABI version marker otelwasm_abi_version_0_1_0 required for {export}"
    )]
    AbiVersionMarkerNotExported {
        /// The push-model export that triggered the requirement.
        export: String,
    },

    /// A required export is missing.
    #[error("plugin does not export required function {export}")]
    RequiredFunctionNotExported {
        /// The missing export.
        export: String,
    },

    /// The plugin's capability bitmap does not advertise the signal.
    #[error("plugin does not support {signal} telemetry")]
    SignalNotSupported {
        /// The rejected signal.
        signal: Signal,
    },

    /// `otelwasm_memory_allocate` returned a null pointer.
    #[error("otelwasm_memory_allocate({size}) returned null")]
    AllocFailed {
        /// Requested allocation size in bytes.
        size: usize,
    },

    /// The guest allocator returned a pointer outside its own memory.
    #[error("failed to write payload into guest memory for {export}")]
    MemoryWriteFailed {
        /// The consume export the payload was destined for.
        export: String,
    },

    /// The guest returned a non-OK status.
    #[error("plugin returned status {status}")]
    GuestStatus {
        /// Code and optional guest-supplied reason.
        status: Status,
    },

    /// The guest (or a host import it called) trapped.
    #[error("plugin trapped in {export}: {reason}")]
    GuestTrap {
        /// Export that was executing.
        export: String,
        /// Trap reason.
        reason: String,
    },

    /// Bytes the guest handed back could not be unmarshalled.
    #[error("failed to unmarshal {what} returned by plugin: {source}")]
    Unmarshal {
        /// What was being decoded.
        what: String,
        /// Underlying codec failure.
        source: CodecError,
    },

    /// The receiver worker could not be spawned.
    #[error("failed to start {signal} receiver: {reason}")]
    ReceiverStart {
        /// The receiver's signal.
        signal: Signal,
        /// OS-level reason.
        reason: String,
    },

    /// A receiver did not observe the shutdown latch within the grace
    /// period.
    #[error("receiver did not shut down within {grace:?}")]
    ShutdownTimeout {
        /// The configured grace period.
        grace: Duration,
    },

    /// An operation was attempted in a state that does not allow it.
    #[error("{operation} is not valid in plugin state {state}")]
    InvalidState {
        /// Current state.
        state: PluginState,
        /// The rejected operation.
        operation: String,
    },

    /// Batch marshalling failed on the host side.
    #[error(transparent)]
    Codec(#[from] CodecError),

    /// An adapter-level failure outside the kinds above.
    #[error(transparent)]
    Runtime(RuntimeError),
}

impl HostError {
    /// Map an adapter error onto the host taxonomy.
    pub(crate) fn from_runtime(err: RuntimeError) -> Self {
        match err {
            RuntimeError::CompileFailed { reason } => HostError::Compile { reason },
            RuntimeError::MemoryExportMissing => HostError::MemoryExportMissing,
            RuntimeError::InstantiateFailed { reason } => HostError::Instantiate { reason },
            RuntimeError::Trap { export, reason } => HostError::GuestTrap { export, reason },
            RuntimeError::ExportNotFound { export } => {
                HostError::RequiredFunctionNotExported { export }
            }
            other => HostError::Runtime(other),
        }
    }
}
