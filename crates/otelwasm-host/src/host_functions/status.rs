//! Status-reason delivery from the guest.

use otelwasm_plugin_abi::constants::host_function;
use otelwasm_runtime::{FuncSignature, HostFault, HostFunction, ValueKind};

use super::{arg_i32, read_guest_bytes};
use crate::call_context::CallContext;

/// `set_status_reason(buf, len)`.
///
/// Reads a UTF-8 string from guest memory and attaches it to the
/// current call's status; the guest then returns its status code and
/// the host surfaces both together. Invalid UTF-8 and out-of-bounds
/// reads are fatal to the call. Calling with no call in flight is a
/// guest protocol bug and traps as well.
pub(crate) fn set_status_reason() -> HostFunction {
    let name = host_function::SET_STATUS_REASON;
    HostFunction::new(
        name,
        FuncSignature::new(&[ValueKind::I32, ValueKind::I32], &[]),
        move |ctx, args| {
            let buf = arg_i32(name, args, 0)?;
            let len = arg_i32(name, args, 1)?;
            let bytes = read_guest_bytes(name, ctx, buf, len)?;

            let reason = String::from_utf8(bytes)
                .map_err(|_| HostFault::new(format!("{name}: reason is not valid UTF-8")))?;

            CallContext::with_current(|call| call.set_status_reason(reason))
                .ok_or_else(|| HostFault::new(format!("{name}: no telemetry call in flight")))?;
            Ok(Vec::new())
        },
    )
}
