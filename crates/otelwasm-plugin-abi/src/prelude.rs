//! Convenience re-exports for host and tooling code.

pub use crate::constants::{HOST_MODULE, PUSH_MODEL_EXPORTS, host_function, wasm_export};
pub use crate::{AbiVersion, Capabilities, Signal, Status, StatusCode};
