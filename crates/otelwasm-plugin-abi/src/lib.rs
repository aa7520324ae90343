//! ABI contract between the otelwasm host and Wasm telemetry plugins.
//!
//! This crate is the single source of truth for the names and wire values
//! both sides of the host↔guest boundary agree on:
//!
//! - [`constants`]: export names a plugin must (or may) provide, the host
//!   import module name and function names, and the deprecated camel-case
//!   aliases kept for existing guests.
//! - [`StatusCode`] / [`Status`]: the typed result of a guest entrypoint.
//! - [`Signal`] / [`Capabilities`]: the telemetry-type capability bitmap
//!   returned by `get_supported_telemetry`.
//! - [`AbiVersion`]: the push-model ABI revision detected from the marker
//!   export.
//!
//! # ABI Stability Guarantee
//!
//! The marker export `otelwasm_abi_version_0_1_0` identifies ABI v1. A new
//! marker name is introduced for any breaking revision of the push-model
//! contract; hosts keep recognizing old markers for as long as the
//! corresponding protocol is supported.

#![warn(missing_docs, rust_2018_idioms)]

pub mod constants;
pub mod prelude;
mod signal;
mod status;

pub use constants::{HOST_MODULE, PUSH_MODEL_EXPORTS, host_function, wasm_export};
pub use signal::{Capabilities, Signal};
pub use status::{Status, StatusCode};

/// Push-model ABI revision implemented by a loaded plugin.
///
/// Detected at load time from the presence of the marker export
/// ([`wasm_export::ABI_VERSION_0_1_0`]). Plugins without a recognized
/// marker can still be opened for introspection, but none of the
/// push-model entrypoints may be required of them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AbiVersion {
    /// No recognized ABI marker export.
    Unknown,
    /// The v1 push-model contract.
    V1,
}

impl AbiVersion {
    /// Whether this version supports the push-model entrypoints
    /// (`otelwasm_consume_*`, receiver start exports, `start`, `shutdown`).
    #[must_use]
    pub fn supports_push_model(self) -> bool {
        matches!(self, AbiVersion::V1)
    }
}

impl std::fmt::Display for AbiVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AbiVersion::Unknown => f.write_str("unknown"),
            AbiVersion::V1 => f.write_str("v1"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn abi_version_push_model_gate() {
        assert!(AbiVersion::V1.supports_push_model());
        assert!(!AbiVersion::Unknown.supports_push_model());
    }

    #[test]
    fn abi_version_display() {
        assert_eq!(AbiVersion::V1.to_string(), "v1");
        assert_eq!(AbiVersion::Unknown.to_string(), "unknown");
    }
}
