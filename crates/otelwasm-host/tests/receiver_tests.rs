//! Receiver entrypoints: batch forwarding, cooperative shutdown, and
//! the grace-period trap.

mod common;

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use common::{capabilities, open, v1_guest, wat_bytes};
use otelwasm_host::abi::constants::wasm_export;
use otelwasm_host::pdata::LogsData;
use otelwasm_host::{HostError, HostResult, PluginState};
use prost::Message;

const RECEIVER_IMPORTS: &str = r#"
    (import "opentelemetry.io/wasm" "get_shutdown_requested" (func $poll (result i32)))
    (import "opentelemetry.io/wasm" "set_result_logs" (func $emit (param i32 i32)))
"#;

/// A logs receiver that emits `first, second, first` and then
/// spin-polls the shutdown latch.
fn ordered_logs_receiver(first: &LogsData, second: &LogsData) -> HostResult<Vec<u8>> {
    let first_bytes = first.encode_to_vec();
    let second_bytes = second.encode_to_vec();
    let second_offset = 256;

    v1_guest(
        RECEIVER_IMPORTS,
        &format!(
            r#"
            (data (i32.const 0) "{first_data}")
            (data (i32.const {second_offset}) "{second_data}")
            {caps}
            (func (export "otelwasm_start_logs_receiver")
                (local $emitted i32)
                (block $done
                    (loop $go
                        (br_if $done (call $poll))
                        (if (i32.eqz (local.get $emitted))
                            (then
                                (call $emit (i32.const 0) (i32.const {first_len}))
                                (call $emit (i32.const {second_offset}) (i32.const {second_len}))
                                (call $emit (i32.const 0) (i32.const {first_len}))
                                (local.set $emitted (i32.const 1))))
                        (br $go))))
            "#,
            first_data = wat_bytes(&first_bytes),
            second_data = wat_bytes(&second_bytes),
            first_len = first_bytes.len(),
            second_len = second_bytes.len(),
            caps = capabilities(0b010),
        ),
    )
}

fn wait_for<F: Fn() -> bool>(deadline: Duration, condition: F) -> bool {
    let start = Instant::now();
    while start.elapsed() < deadline {
        if condition() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(10));
    }
    condition()
}

fn record_bodies(batch: &LogsData) -> Vec<String> {
    batch
        .resource_logs
        .iter()
        .flat_map(|rl| rl.scope_logs.iter())
        .flat_map(|sl| sl.log_records.iter())
        .map(|r| r.body.clone())
        .collect()
}

#[test]
fn receiver_forwards_batches_in_production_order() -> HostResult<()> {
    let first = LogsData::single_record("one");
    let second = LogsData::single_record("two");
    let guest = ordered_logs_receiver(&first, &second)?;

    let plugin = Arc::new(open(&guest, &[wasm_export::START_LOGS_RECEIVER])?);
    plugin.start()?;

    let collected: Arc<Mutex<Vec<String>>> = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&collected);
    let handle = plugin.start_logs_receiver(move |batch| {
        if let Ok(mut seen) = sink.lock() {
            seen.extend(record_bodies(&batch));
        }
    })?;
    assert_eq!(plugin.state(), PluginState::Running);

    let produced = wait_for(Duration::from_secs(5), || {
        collected.lock().map(|seen| seen.len() >= 3).unwrap_or(false)
    });
    assert!(produced, "receiver produced no batches");

    handle.shutdown()?;

    let seen = collected.lock().map(|s| s.clone()).unwrap_or_default();
    assert_eq!(seen, vec!["one", "two", "one"]);

    plugin.shutdown()?;
    assert_eq!(plugin.state(), PluginState::Closed);
    Ok(())
}

#[test]
fn receiver_requires_the_capability_bit() -> HostResult<()> {
    // A logs-capability guest exporting a traces receiver entrypoint:
    // the bitmap wins.
    let guest = v1_guest(
        RECEIVER_IMPORTS,
        &format!(
            r#"
            {caps}
            (func (export "otelwasm_start_traces_receiver")
                (block $done (loop $go (br_if $done (call $poll)) (br $go))))
            "#,
            caps = capabilities(0b010),
        ),
    )?;

    let plugin = Arc::new(open(&guest, &[wasm_export::START_TRACES_RECEIVER])?);
    plugin.start()?;

    let err = plugin.start_traces_receiver(|_batch| {});
    assert!(matches!(err, Err(HostError::SignalNotSupported { .. })));
    Ok(())
}

#[test]
fn receiver_start_needs_started_state() -> HostResult<()> {
    let first = LogsData::single_record("one");
    let guest = ordered_logs_receiver(&first, &first)?;
    let plugin = Arc::new(open(&guest, &[wasm_export::START_LOGS_RECEIVER])?);

    // Still LOADED.
    let err = plugin.start_logs_receiver(|_batch| {});
    assert!(matches!(err, Err(HostError::InvalidState { .. })));
    Ok(())
}

#[cfg(feature = "compiled")]
#[test]
fn unresponsive_receiver_is_trapped_after_the_grace_period() -> HostResult<()> {
    use otelwasm_host::{Plugin, PluginConfig};

    // Never polls the latch; only the epoch interrupt can stop it.
    let guest = v1_guest(
        "",
        &format!(
            r#"
            {caps}
            (func (export "otelwasm_start_metrics_receiver")
                (loop $spin (br $spin)))
            "#,
            caps = capabilities(0b001),
        ),
    )?;

    let mut config = PluginConfig::for_module("inline.wasm");
    config.runtime_config.engine = "compiled".to_owned();
    config.runtime_config.remaining.insert(
        "shutdown_grace_ms".to_owned(),
        serde_json::json!(200),
    );

    let plugin = Arc::new(Plugin::open_from_bytes(
        &config,
        &guest,
        &[wasm_export::START_METRICS_RECEIVER],
    )?);
    plugin.start()?;

    let handle = plugin.start_metrics_receiver(|_batch| {})?;
    let started = Instant::now();
    let err = handle.shutdown();
    assert!(matches!(err, Err(HostError::ShutdownTimeout { .. })));
    assert!(
        started.elapsed() >= Duration::from_millis(200),
        "grace period was not honored"
    );

    // The interrupt trapped the guest, so the instance mutex is free
    // and teardown completes.
    plugin.shutdown()?;
    assert_eq!(plugin.state(), PluginState::Closed);
    Ok(())
}
