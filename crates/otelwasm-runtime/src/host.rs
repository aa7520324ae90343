//! The host-import module record.
//!
//! A [`HostModule`] is engine-neutral data: a module name plus named
//! functions with fixed signatures and callbacks. Each back-end walks the
//! record and registers every function in its own linker, adapting its
//! caller type to the [`GuestContext`] view the callbacks are written
//! against.

use std::fmt;
use std::sync::Arc;

use crate::error::{RuntimeError, RuntimeResult};
use crate::value::{FuncSignature, Value};

/// A fatal fault raised inside a host import.
///
/// Faults become engine traps: the guest call that triggered the import
/// is aborted and the trap reason carries this message. Raised for
/// out-of-bounds guest pointers and undecodable payloads rather than
/// letting either corrupt host state.
#[derive(Debug, Clone)]
pub struct HostFault(String);

impl HostFault {
    /// A fault with the given reason.
    #[must_use]
    pub fn new(reason: impl Into<String>) -> Self {
        Self(reason.into())
    }

    /// The fault reason.
    #[must_use]
    pub fn reason(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for HostFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::error::Error for HostFault {}

/// View of the calling guest's exported linear memory, handed to host
/// callbacks for the duration of one import call.
pub trait GuestContext {
    /// Read `len` bytes at `offset`. `None` when the range is out of
    /// bounds or the guest exports no memory.
    fn memory_read(&mut self, offset: u32, len: u32) -> Option<Vec<u8>>;

    /// Write `bytes` at `offset`. `false` when the range is out of
    /// bounds or the guest exports no memory.
    fn memory_write(&mut self, offset: u32, bytes: &[u8]) -> bool;
}

/// Callback type of a host function.
pub type HostCallback =
    Arc<dyn Fn(&mut dyn GuestContext, &[Value]) -> Result<Vec<Value>, HostFault> + Send + Sync>;

/// One named host function with its wire signature.
#[derive(Clone)]
pub struct HostFunction {
    /// Import name the guest links against.
    pub name: String,
    /// Fixed signature; back-ends refuse to register mismatching arities.
    pub signature: FuncSignature,
    /// The implementation.
    pub callback: HostCallback,
}

impl HostFunction {
    /// Build a host function.
    pub fn new(
        name: impl Into<String>,
        signature: FuncSignature,
        callback: impl Fn(&mut dyn GuestContext, &[Value]) -> Result<Vec<Value>, HostFault>
        + Send
        + Sync
        + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            signature,
            callback: Arc::new(callback),
        }
    }

    /// The same implementation registered under another (deprecated)
    /// name.
    #[must_use]
    pub fn aliased(&self, alias: impl Into<String>) -> Self {
        Self {
            name: alias.into(),
            signature: self.signature.clone(),
            callback: Arc::clone(&self.callback),
        }
    }
}

impl fmt::Debug for HostFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HostFunction")
            .field("name", &self.name)
            .field("signature", &self.signature.to_string())
            .finish_non_exhaustive()
    }
}

/// The record of host functions registered under one import module name.
#[derive(Debug, Clone, Default)]
pub struct HostModule {
    name: String,
    functions: Vec<HostFunction>,
}

impl HostModule {
    /// An empty module with the given import-module name.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            functions: Vec::new(),
        }
    }

    /// The import-module name guests link against.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Add a function.
    ///
    /// # Errors
    ///
    /// Fails when a function of the same name is already registered.
    pub fn push(&mut self, function: HostFunction) -> RuntimeResult<()> {
        if self.functions.iter().any(|f| f.name == function.name) {
            return Err(RuntimeError::DuplicateHostFunction {
                name: function.name,
            });
        }
        self.functions.push(function);
        Ok(())
    }

    /// The registered functions, in registration order.
    #[must_use]
    pub fn functions(&self) -> &[HostFunction] {
        &self.functions
    }

    /// Look a function up by name.
    #[must_use]
    pub fn function(&self, name: &str) -> Option<&HostFunction> {
        self.functions.iter().find(|f| f.name == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::ValueKind;

    fn noop(name: &str) -> HostFunction {
        HostFunction::new(
            name,
            FuncSignature::new(&[ValueKind::I32], &[]),
            |_, _| Ok(Vec::new()),
        )
    }

    #[test]
    fn duplicate_names_are_rejected() {
        let mut module = HostModule::new("opentelemetry.io/wasm");
        assert!(module.push(noop("set_status_reason")).is_ok());
        let err = module.push(noop("set_status_reason"));
        assert!(matches!(
            err,
            Err(RuntimeError::DuplicateHostFunction { .. })
        ));
    }

    #[test]
    fn alias_shares_the_callback() {
        let canonical = noop("get_plugin_config");
        let alias = canonical.aliased("getPluginConfig");
        assert_eq!(alias.signature, canonical.signature);
        assert!(Arc::ptr_eq(&alias.callback, &canonical.callback));
    }

    #[test]
    fn lookup_by_name() {
        let mut module = HostModule::new("m");
        assert!(module.push(noop("a")).is_ok());
        assert!(module.function("a").is_some());
        assert!(module.function("b").is_none());
    }
}
