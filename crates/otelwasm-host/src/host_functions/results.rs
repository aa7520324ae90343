//! Override-result delivery from the guest.

use otelwasm_pdata::Codec;
use otelwasm_plugin_abi::Signal;
use otelwasm_plugin_abi::constants::host_function;
use otelwasm_runtime::{FuncSignature, HostFault, HostFunction, ValueKind};

use super::{arg_i32, read_guest_bytes};
use crate::call_context::{CallContext, ResultPayload};

/// The deprecated camel-case alias for one signal's `set_result_*`.
pub(crate) fn alias_for(signal: Signal) -> &'static str {
    match signal {
        Signal::Traces => host_function::SET_RESULT_TRACES_ALIAS,
        Signal::Metrics => host_function::SET_RESULT_METRICS_ALIAS,
        Signal::Logs => host_function::SET_RESULT_LOGS_ALIAS,
    }
}

/// `set_result_<signal>(buf, len)`.
///
/// Reads `len` bytes at `buf` and hands them to the current call.
/// Consume calls keep the raw bytes as the override result; the host
/// unmarshals them once the guest returns, so bad bytes fail the call
/// as an unmarshal error. Receiver calls must forward downstream before
/// the guest resumes, so the batch is decoded here and an undecodable
/// payload traps the guest. Out-of-bounds reads always trap, as does
/// calling with no telemetry call in flight.
pub(crate) fn set_result(signal: Signal, codec: Codec) -> HostFunction {
    let name = signal.set_result_import();
    HostFunction::new(
        name,
        FuncSignature::new(&[ValueKind::I32, ValueKind::I32], &[]),
        move |ctx, args| {
            let buf = arg_i32(name, args, 0)?;
            let len = arg_i32(name, args, 1)?;
            let bytes = read_guest_bytes(name, ctx, buf, len)?;

            CallContext::with_current(|call| {
                if let Some(forward) = call.forwarder_for(signal) {
                    let payload = decode(signal, codec, &bytes)
                        .map_err(|e| HostFault::new(format!("{name}: {e}")))?;
                    forward(payload);
                } else {
                    call.store_raw_result(signal, bytes);
                }
                Ok(())
            })
            .ok_or_else(|| HostFault::new(format!("{name}: no telemetry call in flight")))??;
            Ok(Vec::new())
        },
    )
}

fn decode(signal: Signal, codec: Codec, bytes: &[u8]) -> otelwasm_pdata::CodecResult<ResultPayload> {
    Ok(match signal {
        Signal::Traces => ResultPayload::Traces(codec.decode_traces(bytes)?),
        Signal::Metrics => ResultPayload::Metrics(codec.decode_metrics(bytes)?),
        Signal::Logs => ResultPayload::Logs(codec.decode_logs(bytes)?),
    })
}
