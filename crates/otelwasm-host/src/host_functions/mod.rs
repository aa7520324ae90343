//! Host functions exported to plugins under `opentelemetry.io/wasm`.
//!
//! Each submodule builds one concern's [`HostFunction`]s over the
//! engine-agnostic [`GuestContext`] memory view; this module assembles
//! the full import record, registering every canonical name and its
//! deprecated camel-case alias against the same implementation.
//!
//! Error policy: a guest passing pointers outside its own memory is
//! trapped; the current call aborts with a fatal error instead of
//! corrupting state. Undecodable `set_result_*` payloads are fatal to
//! the call as well: receiver calls trap immediately (the batch cannot
//! be forwarded), consume calls fail when the host unmarshals the
//! override after the guest returns.

pub mod config;
pub mod results;
pub mod shutdown;
pub mod status;

use std::sync::Arc;
use std::sync::atomic::AtomicBool;

use otelwasm_pdata::Codec;
use otelwasm_plugin_abi::constants::{HOST_MODULE, host_function};
use otelwasm_plugin_abi::Signal;
use otelwasm_runtime::{GuestContext, HostFault, HostModule, RuntimeResult, Value};

/// Build the complete host-import module for one plugin.
///
/// `config_json` and `shutdown` are plugin-level: the serialized
/// `plugin_config` tree and the shutdown latch, both immutable/monotonic
/// for the plugin's lifetime. Per-call state is found through the
/// thread-local call context instead.
///
/// # Errors
///
/// Fails only on duplicate registration, which would be a bug in this
/// table.
pub fn build_host_module(
    config_json: Arc<[u8]>,
    shutdown: Arc<AtomicBool>,
    codec: Codec,
) -> RuntimeResult<HostModule> {
    let mut module = HostModule::new(HOST_MODULE);

    let get_config = config::get_plugin_config(config_json);
    module.push(get_config.aliased(host_function::GET_PLUGIN_CONFIG_ALIAS))?;
    module.push(get_config)?;

    for signal in Signal::ALL {
        let set_result = results::set_result(signal, codec);
        module.push(set_result.aliased(results::alias_for(signal)))?;
        module.push(set_result)?;
    }

    let set_reason = status::set_status_reason();
    module.push(set_reason.aliased(host_function::SET_STATUS_REASON_ALIAS))?;
    module.push(set_reason)?;

    let get_shutdown = shutdown::get_shutdown_requested(shutdown);
    module.push(get_shutdown.aliased(host_function::GET_SHUTDOWN_REQUESTED_ALIAS))?;
    module.push(get_shutdown)?;

    Ok(module)
}

/// Fetch argument `index` as an i32, faulting with the import name on
/// mismatch. Signatures are fixed at registration, so a miss here means
/// an engine bug rather than a guest bug; trapping is still the safe
/// response.
pub(crate) fn arg_i32(name: &str, args: &[Value], index: usize) -> Result<i32, HostFault> {
    args.get(index)
        .and_then(|v| v.as_i32())
        .ok_or_else(|| HostFault::new(format!("{name}: argument {index} is not an i32")))
}

/// Read `len` bytes at `ptr` from the calling guest's memory, trapping
/// on out-of-bounds access.
pub(crate) fn read_guest_bytes(
    name: &str,
    ctx: &mut dyn GuestContext,
    ptr: i32,
    len: i32,
) -> Result<Vec<u8>, HostFault> {
    let len = u32::try_from(len)
        .map_err(|_| HostFault::new(format!("{name}: negative length {len}")))?;
    ctx.memory_read(ptr as u32, len).ok_or_else(|| {
        HostFault::new(format!(
            "{name}: range [{ptr}, {ptr}+{len}) is outside guest memory"
        ))
    })
}
