//! Shutdown-latch polling.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use otelwasm_plugin_abi::constants::host_function;
use otelwasm_runtime::{FuncSignature, HostFunction, Value, ValueKind};

/// `get_shutdown_requested() -> flag`.
///
/// Returns 1 once the host has asked the plugin to stop, 0 before.
/// Receiver loops poll this between batches; the latch is monotonic, so
/// every call after the request observes 1 until the plugin closes.
pub(crate) fn get_shutdown_requested(latch: Arc<AtomicBool>) -> HostFunction {
    HostFunction::new(
        host_function::GET_SHUTDOWN_REQUESTED,
        FuncSignature::new(&[], &[ValueKind::I32]),
        move |_ctx, _args| {
            let flag = i32::from(latch.load(Ordering::SeqCst));
            Ok(vec![Value::I32(flag)])
        },
    )
}
