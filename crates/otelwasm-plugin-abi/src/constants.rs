//! Export and import names of the host↔guest contract.
//!
//! Canonical names are snake_case. A fixed set of deprecated camel-case
//! aliases is kept so guests built against the older, duplicated naming
//! keep working; hosts register both spellings against the same
//! implementation and new guests use canonical names only.

/// Module name under which the host registers its import functions.
pub const HOST_MODULE: &str = "opentelemetry.io/wasm";

/// Names of exports the host looks up on a plugin module.
pub mod wasm_export {
    /// Linear memory export used for all payload transfer.
    pub const MEMORY: &str = "memory";
    /// Reactor-style start function, run once on instantiation.
    pub const INITIALIZE: &str = "_initialize";
    /// ABI v1 marker: `() -> ()`. Presence, not behavior, is what counts.
    pub const ABI_VERSION_0_1_0: &str = "otelwasm_abi_version_0_1_0";
    /// Guest allocator: `(size: i32) -> ptr: i32`, 0 on failure. The guest
    /// pins the returned buffer until the consume call it feeds returns.
    pub const MEMORY_ALLOCATE: &str = "otelwasm_memory_allocate";
    /// Capability bitmap query: `() -> i32`.
    pub const GET_SUPPORTED_TELEMETRY: &str = "get_supported_telemetry";
    /// Deprecated alias of [`GET_SUPPORTED_TELEMETRY`].
    pub const GET_SUPPORTED_TELEMETRY_ALIAS: &str = "getSupportedTelemetry";

    /// Trace batch consumer: `(ptr: i32, size: i32) -> status: i32`.
    pub const CONSUME_TRACES: &str = "otelwasm_consume_traces";
    /// Metric batch consumer: `(ptr: i32, size: i32) -> status: i32`.
    pub const CONSUME_METRICS: &str = "otelwasm_consume_metrics";
    /// Log batch consumer: `(ptr: i32, size: i32) -> status: i32`.
    pub const CONSUME_LOGS: &str = "otelwasm_consume_logs";

    /// Long-running trace receiver entrypoint: `() -> ()`.
    pub const START_TRACES_RECEIVER: &str = "otelwasm_start_traces_receiver";
    /// Long-running metric receiver entrypoint: `() -> ()`.
    pub const START_METRICS_RECEIVER: &str = "otelwasm_start_metrics_receiver";
    /// Long-running log receiver entrypoint: `() -> ()`.
    pub const START_LOGS_RECEIVER: &str = "otelwasm_start_logs_receiver";

    /// Optional lifecycle start hook: `() -> status: i32`.
    pub const START: &str = "start";
    /// Optional lifecycle shutdown hook: `() -> status: i32`.
    pub const SHUTDOWN: &str = "shutdown";
}

/// Exports that belong to the push-model contract and therefore require
/// the ABI v1 marker when listed as required at load time.
pub const PUSH_MODEL_EXPORTS: &[&str] = &[
    wasm_export::CONSUME_TRACES,
    wasm_export::CONSUME_METRICS,
    wasm_export::CONSUME_LOGS,
    wasm_export::START_TRACES_RECEIVER,
    wasm_export::START_METRICS_RECEIVER,
    wasm_export::START_LOGS_RECEIVER,
    wasm_export::START,
    wasm_export::SHUTDOWN,
];

/// Names of host functions provided to plugins under [`HOST_MODULE`].
pub mod host_function {
    /// Copy the plugin-config JSON into guest memory:
    /// `get_plugin_config(buf: i32, buf_limit: i32) -> len: i32` (0 when it
    /// does not fit).
    pub const GET_PLUGIN_CONFIG: &str = "get_plugin_config";
    /// Deprecated alias of [`GET_PLUGIN_CONFIG`].
    pub const GET_PLUGIN_CONFIG_ALIAS: &str = "getPluginConfig";

    /// Hand an override trace batch to the current call:
    /// `set_result_traces(buf: i32, len: i32)`.
    pub const SET_RESULT_TRACES: &str = "set_result_traces";
    /// Deprecated alias of [`SET_RESULT_TRACES`].
    pub const SET_RESULT_TRACES_ALIAS: &str = "setResultTraces";
    /// Hand an override metric batch to the current call:
    /// `set_result_metrics(buf: i32, len: i32)`.
    pub const SET_RESULT_METRICS: &str = "set_result_metrics";
    /// Deprecated alias of [`SET_RESULT_METRICS`].
    pub const SET_RESULT_METRICS_ALIAS: &str = "setResultMetrics";
    /// Hand an override log batch to the current call:
    /// `set_result_logs(buf: i32, len: i32)`.
    pub const SET_RESULT_LOGS: &str = "set_result_logs";
    /// Deprecated alias of [`SET_RESULT_LOGS`].
    pub const SET_RESULT_LOGS_ALIAS: &str = "setResultLogs";

    /// Attach a UTF-8 reason to the current call's status:
    /// `set_status_reason(buf: i32, len: i32)`.
    pub const SET_STATUS_REASON: &str = "set_status_reason";
    /// Deprecated alias of [`SET_STATUS_REASON`]. The upstream surface
    /// shipped this spelling, not `setStatusReason`.
    pub const SET_STATUS_REASON_ALIAS: &str = "setResultStatusReason";

    /// Shutdown-latch poll: `get_shutdown_requested() -> i32` (1 once the
    /// host has asked the plugin to stop).
    pub const GET_SHUTDOWN_REQUESTED: &str = "get_shutdown_requested";
    /// Deprecated alias of [`GET_SHUTDOWN_REQUESTED`].
    pub const GET_SHUTDOWN_REQUESTED_ALIAS: &str = "getShutdownRequested";
}
