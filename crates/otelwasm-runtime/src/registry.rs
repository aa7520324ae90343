//! Engine selection.
//!
//! The set of available back-ends is fixed at build time by cargo
//! features; this module is the immutable table mapping an
//! [`EngineKind`] request onto a constructed engine. There is no
//! mutable registration surface.

use crate::engine::{EngineKind, WasmEngine};
use crate::error::RuntimeResult;
use crate::interpreter::InterpreterEngine;

/// Build the engine for the requested kind.
///
/// A request for [`EngineKind::Compiled`] is advisory: when this build
/// carries no compiled back-end the interpreter is returned instead,
/// with a warning. Callers that must know which engine they got check
/// [`WasmEngine::kind`] on the result.
///
/// # Errors
///
/// Fails when the selected back-end cannot initialize on this platform.
pub fn build_engine(kind: EngineKind) -> RuntimeResult<Box<dyn WasmEngine>> {
    match kind {
        EngineKind::Interpreter => Ok(Box::new(InterpreterEngine::new())),
        #[cfg(feature = "compiled")]
        EngineKind::Compiled => Ok(Box::new(crate::compiled::CompiledEngine::new()?)),
        #[cfg(not(feature = "compiled"))]
        EngineKind::Compiled => {
            tracing::warn!(
                "compiled engine requested but this build has no compiled back-end, \
                 falling back to the interpreter"
            );
            Ok(Box::new(InterpreterEngine::new()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interpreter_is_always_available() -> RuntimeResult<()> {
        let engine = build_engine(EngineKind::Interpreter)?;
        assert_eq!(engine.kind(), EngineKind::Interpreter);
        Ok(())
    }

    #[test]
    fn compiled_request_yields_an_engine() -> RuntimeResult<()> {
        // With the `compiled` feature on this is wasmtime; without it,
        // the interpreter fallback. Either way the request succeeds.
        let engine = build_engine(EngineKind::Compiled)?;
        #[cfg(feature = "compiled")]
        assert_eq!(engine.kind(), EngineKind::Compiled);
        #[cfg(not(feature = "compiled"))]
        assert_eq!(engine.kind(), EngineKind::Interpreter);
        Ok(())
    }
}
