//! Plugin loading, validation, and push-model invocation.
//!
//! A [`Plugin`] owns one instantiated Wasm module. All guest entry
//! (`consume_*`, `start`, `shutdown`, receiver starts) is serialized by
//! a per-plugin mutex held for the entire host↔guest call: a module
//! instance is single-threaded and its linear memory belongs to whoever
//! is inside it. Distinct plugins are independent and may run in
//! parallel.

use std::path::{Path, PathBuf};
use std::rc::Rc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};
use std::time::{Duration, Instant};

use parking_lot::Mutex;

use otelwasm_pdata::{Codec, LogsData, MetricsData, TracesData};
use otelwasm_plugin_abi::constants::{PUSH_MODEL_EXPORTS, wasm_export};
use otelwasm_plugin_abi::{AbiVersion, Capabilities, Signal, Status, StatusCode};
use otelwasm_runtime::{
    EngineKind, GuestEnvironment, InstanceHandle, Interrupter, RuntimeError, Value, registry,
};

use crate::call_context::{CallContext, CallScope};
use crate::config::PluginConfig;
use crate::error::{HostError, HostResult};
use crate::host_functions;
use crate::lifecycle::PluginState;

/// Per-plugin call counters.
#[derive(Debug, Clone, Copy, Default)]
pub struct PluginStats {
    /// Successful `consume_*` calls.
    pub consume_calls: u64,
    /// Cumulative guest time of successful consume calls, microseconds.
    pub total_guest_time_us: u64,
}

impl PluginStats {
    fn record(&mut self, elapsed: Duration) {
        self.consume_calls = self.consume_calls.saturating_add(1);
        self.total_guest_time_us = self
            .total_guest_time_us
            .saturating_add(elapsed.as_micros() as u64);
    }

    /// Average guest time per successful consume call, microseconds.
    #[must_use]
    pub fn average_guest_time_us(&self) -> f64 {
        if self.consume_calls == 0 {
            0.0
        } else {
            self.total_guest_time_us as f64 / self.consume_calls as f64
        }
    }
}

/// A loaded Wasm telemetry plugin.
pub struct Plugin {
    path: PathBuf,
    engine_kind: EngineKind,
    abi_version: AbiVersion,
    pub(crate) instance: Mutex<Box<dyn InstanceHandle>>,
    pub(crate) state: Mutex<PluginState>,
    pub(crate) shutdown_requested: Arc<AtomicBool>,
    capabilities: OnceLock<Capabilities>,
    /// Which export answers the capability query: the canonical name or
    /// its deprecated alias, resolved once at load.
    supported_query: &'static str,
    codec: Codec,
    pub(crate) grace: Duration,
    pub(crate) interrupter: Option<Arc<dyn Interrupter>>,
    stats: Mutex<PluginStats>,
}

impl std::fmt::Debug for Plugin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Plugin")
            .field("path", &self.path)
            .field("engine_kind", &self.engine_kind)
            .field("abi_version", &self.abi_version)
            .field("supported_query", &self.supported_query)
            .field("codec", &self.codec)
            .field("grace", &self.grace)
            .finish_non_exhaustive()
    }
}

impl Plugin {
    /// Open a plugin: read the module file, build the configured
    /// engine, compile, instantiate with the host-import module, and
    /// validate the ABI against `required_exports`.
    ///
    /// `required_exports` is the role-derived export list (for example
    /// `["otelwasm_consume_traces"]` for a trace processor). Any entry
    /// belonging to the push-model set additionally requires the ABI v1
    /// marker export.
    ///
    /// # Errors
    ///
    /// All load errors release partially acquired resources before
    /// returning; see [`HostError`] for the taxonomy.
    pub fn open(config: &PluginConfig, required_exports: &[&str]) -> HostResult<Self> {
        config.validate()?;
        let bytes = std::fs::read(&config.path).map_err(|source| HostError::ReadModule {
            path: config.path.clone(),
            source,
        })?;
        Self::open_from_bytes(config, &bytes, required_exports)
    }

    /// Open a plugin from in-memory module bytes. `config.path` is used
    /// only for diagnostics.
    ///
    /// # Errors
    ///
    /// Same as [`Plugin::open`], minus file I/O.
    pub fn open_from_bytes(
        config: &PluginConfig,
        bytes: &[u8],
        required_exports: &[&str],
    ) -> HostResult<Self> {
        let requested = config.runtime_config.engine_kind()?;
        let engine = registry::build_engine(requested).map_err(HostError::from_runtime)?;
        let engine_kind = engine.kind();

        let compiled = engine.compile(bytes).map_err(HostError::from_runtime)?;

        let config_json: Arc<[u8]> = serde_json::to_vec(&config.plugin_config)
            .map_err(|e| HostError::InvalidConfig {
                reason: format!("plugin_config is not JSON-serializable: {e}"),
            })?
            .into();
        let shutdown_requested = Arc::new(AtomicBool::new(false));
        let codec = Codec::new();

        let host_module = host_functions::build_host_module(
            Arc::clone(&config_json),
            Arc::clone(&shutdown_requested),
            codec,
        )
        .map_err(HostError::from_runtime)?;

        let mut instance = compiled
            .instantiate(&host_module, &GuestEnvironment::new())
            .map_err(HostError::from_runtime)?;

        let validated = Self::validate_instance(&mut instance, required_exports);
        let (abi_version, supported_query) = match validated {
            Ok(v) => v,
            Err(e) => {
                instance.close();
                return Err(e);
            }
        };

        let interrupter = instance.interrupter();

        tracing::info!(
            path = %config.path.display(),
            engine = %engine_kind,
            abi = %abi_version,
            "loaded wasm plugin"
        );

        Ok(Self {
            path: config.path.clone(),
            engine_kind,
            abi_version,
            instance: Mutex::new(instance),
            state: Mutex::new(PluginState::Loaded),
            shutdown_requested,
            capabilities: OnceLock::new(),
            supported_query,
            codec,
            grace: config.runtime_config.shutdown_grace(),
            interrupter,
            stats: Mutex::new(PluginStats::default()),
        })
    }

    /// ABI validation: marker detection, push-model gating, required
    /// exports, capability-query resolution.
    fn validate_instance(
        instance: &mut Box<dyn InstanceHandle>,
        required_exports: &[&str],
    ) -> HostResult<(AbiVersion, &'static str)> {
        let abi_version = if instance.export(wasm_export::ABI_VERSION_0_1_0).is_some() {
            AbiVersion::V1
        } else {
            AbiVersion::Unknown
        };

        for export in required_exports {
            if PUSH_MODEL_EXPORTS.contains(export) && !abi_version.supports_push_model() {
                return Err(HostError::AbiVersionMarkerNotExported {
                    export: (*export).to_owned(),
                });
            }
        }

        for export in required_exports {
            if instance.export(export).is_none() {
                return Err(HostError::RequiredFunctionNotExported {
                    export: (*export).to_owned(),
                });
            }
        }

        let supported_query = if instance.export(wasm_export::GET_SUPPORTED_TELEMETRY).is_some() {
            wasm_export::GET_SUPPORTED_TELEMETRY
        } else if instance
            .export(wasm_export::GET_SUPPORTED_TELEMETRY_ALIAS)
            .is_some()
        {
            tracing::warn!(
                export = wasm_export::GET_SUPPORTED_TELEMETRY_ALIAS,
                "plugin answers the capability query under its deprecated name"
            );
            wasm_export::GET_SUPPORTED_TELEMETRY_ALIAS
        } else {
            return Err(HostError::RequiredFunctionNotExported {
                export: wasm_export::GET_SUPPORTED_TELEMETRY.to_owned(),
            });
        };

        Ok((abi_version, supported_query))
    }

    /// The module path this plugin was loaded from.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The engine actually executing this plugin (after any fallback).
    #[must_use]
    pub fn engine_kind(&self) -> EngineKind {
        self.engine_kind
    }

    /// The ABI version detected at load.
    #[must_use]
    pub fn abi_version(&self) -> AbiVersion {
        self.abi_version
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> PluginState {
        *self.state.lock()
    }

    /// Call counters.
    #[must_use]
    pub fn stats(&self) -> PluginStats {
        *self.stats.lock()
    }

    /// The configured receiver shutdown grace period.
    #[must_use]
    pub fn shutdown_grace(&self) -> Duration {
        self.grace
    }

    /// Run the optional `start` export and enter `STARTED`.
    ///
    /// Absent `start`, the transition is immediate. A non-zero status
    /// aborts: the plugin stays `LOADED` and the status is returned.
    ///
    /// # Errors
    ///
    /// `InvalidState` outside `LOADED`; `GuestStatus`/`GuestTrap` from
    /// the guest.
    pub fn start(&self) -> HostResult<()> {
        {
            let state = self.state.lock();
            if *state != PluginState::Loaded {
                return Err(HostError::InvalidState {
                    state: *state,
                    operation: wasm_export::START.to_owned(),
                });
            }
        }

        let mut instance = self.instance.lock();
        if instance.export(wasm_export::START).is_some() {
            self.require_push_model(wasm_export::START)?;
            let status = self.call_status_export(&mut instance, wasm_export::START)?;
            if !status.is_ok() {
                tracing::warn!(%status, "plugin start reported failure, aborting load");
                return Err(HostError::GuestStatus { status });
            }
        }
        drop(instance);

        *self.state.lock() = PluginState::Started;
        tracing::debug!(path = %self.path.display(), "plugin started");
        Ok(())
    }

    /// Whether the plugin advertises trace support.
    ///
    /// # Errors
    ///
    /// Fails when the capability query itself fails.
    pub fn is_traces_supported(&self) -> HostResult<bool> {
        Ok(self.supported_telemetry()?.supports(Signal::Traces))
    }

    /// Whether the plugin advertises metric support.
    ///
    /// # Errors
    ///
    /// Fails when the capability query itself fails.
    pub fn is_metrics_supported(&self) -> HostResult<bool> {
        Ok(self.supported_telemetry()?.supports(Signal::Metrics))
    }

    /// Whether the plugin advertises log support.
    ///
    /// # Errors
    ///
    /// Fails when the capability query itself fails.
    pub fn is_logs_supported(&self) -> HostResult<bool> {
        Ok(self.supported_telemetry()?.supports(Signal::Logs))
    }

    /// The capability bitmap, queried from the guest once and cached
    /// for the plugin's lifetime.
    ///
    /// # Errors
    ///
    /// `GuestTrap` when the query traps or returns nothing.
    pub fn supported_telemetry(&self) -> HostResult<Capabilities> {
        if let Some(caps) = self.capabilities.get() {
            return Ok(*caps);
        }
        let mut instance = self.instance.lock();
        self.supported_telemetry_locked(&mut instance)
    }

    pub(crate) fn supported_telemetry_locked(
        &self,
        instance: &mut Box<dyn InstanceHandle>,
    ) -> HostResult<Capabilities> {
        if let Some(caps) = self.capabilities.get() {
            return Ok(*caps);
        }

        let values = instance
            .call(self.supported_query, &[])
            .map_err(|e| self.map_call_error(e))?;
        let bits = values.first().and_then(|v| v.as_i32()).ok_or_else(|| {
            HostError::GuestTrap {
                export: self.supported_query.to_owned(),
                reason: "no capability bitmap returned".to_owned(),
            }
        })?;

        let caps = Capabilities::from_bits(bits as u32);
        let _ = self.capabilities.set(caps);
        tracing::debug!(capabilities = %caps, "plugin capability handshake complete");
        Ok(caps)
    }

    /// Push a trace batch through `otelwasm_consume_traces`.
    ///
    /// `Ok(None)` means the guest processed the batch in place and the
    /// caller keeps the original. `Ok(Some(batch))` is a substitution
    /// the guest handed back through `set_result_traces`.
    ///
    /// # Errors
    ///
    /// Per-call failures leave the caller's batch untouched; guest
    /// status codes surface as `GuestStatus` with any reason attached.
    pub fn consume_traces(&self, batch: &TracesData) -> HostResult<Option<TracesData>> {
        let payload = self.codec.encode_traces(batch)?;
        match self.take_override(Signal::Traces, self.consume_raw(Signal::Traces, payload)?) {
            Some(bytes) => {
                let decoded = self.codec.decode_traces(&bytes).map_err(|source| {
                    HostError::Unmarshal {
                        what: "traces batch".to_owned(),
                        source,
                    }
                })?;
                Ok(Some(decoded))
            }
            None => Ok(None),
        }
    }

    /// Push a metric batch through `otelwasm_consume_metrics`.
    ///
    /// # Errors
    ///
    /// See [`Plugin::consume_traces`].
    pub fn consume_metrics(&self, batch: &MetricsData) -> HostResult<Option<MetricsData>> {
        let payload = self.codec.encode_metrics(batch)?;
        match self.take_override(Signal::Metrics, self.consume_raw(Signal::Metrics, payload)?) {
            Some(bytes) => {
                let decoded = self.codec.decode_metrics(&bytes).map_err(|source| {
                    HostError::Unmarshal {
                        what: "metrics batch".to_owned(),
                        source,
                    }
                })?;
                Ok(Some(decoded))
            }
            None => Ok(None),
        }
    }

    /// Push a log batch through `otelwasm_consume_logs`.
    ///
    /// # Errors
    ///
    /// See [`Plugin::consume_traces`].
    pub fn consume_logs(&self, batch: &LogsData) -> HostResult<Option<LogsData>> {
        let payload = self.codec.encode_logs(batch)?;
        match self.take_override(Signal::Logs, self.consume_raw(Signal::Logs, payload)?) {
            Some(bytes) => {
                let decoded = self.codec.decode_logs(&bytes).map_err(|source| {
                    HostError::Unmarshal {
                        what: "logs batch".to_owned(),
                        source,
                    }
                })?;
                Ok(Some(decoded))
            }
            None => Ok(None),
        }
    }

    /// Keep an override only when the guest stored it for the signal
    /// being consumed; a stray `set_result_*` of another signal is
    /// dropped.
    fn take_override(&self, signal: Signal, raw: Option<(Signal, Vec<u8>)>) -> Option<Vec<u8>> {
        match raw {
            Some((stored, bytes)) if stored == signal => Some(bytes),
            Some((stored, _)) => {
                tracing::debug!(
                    consumed = %signal,
                    stored = %stored,
                    "dropping override result for a different signal"
                );
                None
            }
            None => None,
        }
    }

    /// The push-model ownership protocol, under the per-plugin mutex:
    /// allocate in the guest, write the payload, install per-call
    /// state, call the consumer, interpret the status.
    fn consume_raw(
        &self,
        signal: Signal,
        payload: Vec<u8>,
    ) -> HostResult<Option<(Signal, Vec<u8>)>> {
        let export = signal.consume_export();
        self.require_push_model(export)?;

        {
            let state = self.state.lock();
            if !state.can_consume() {
                return Err(HostError::InvalidState {
                    state: *state,
                    operation: export.to_owned(),
                });
            }
        }

        let started = Instant::now();
        let mut instance = self.instance.lock();

        let caps = self.supported_telemetry_locked(&mut instance)?;
        if !caps.supports(signal) {
            return Err(HostError::SignalNotSupported { signal });
        }

        if instance.export(export).is_none() {
            return Err(HostError::RequiredFunctionNotExported {
                export: export.to_owned(),
            });
        }

        // Empty batches skip the allocation round-trip and signal
        // emptiness with a null pointer.
        let (ptr, size) = if payload.is_empty() {
            (0, 0)
        } else {
            if instance.export(wasm_export::MEMORY_ALLOCATE).is_none() {
                return Err(HostError::RequiredFunctionNotExported {
                    export: wasm_export::MEMORY_ALLOCATE.to_owned(),
                });
            }
            let size = i32::try_from(payload.len())
                .map_err(|_| HostError::AllocFailed { size: payload.len() })?;

            let values = instance
                .call(wasm_export::MEMORY_ALLOCATE, &[Value::I32(size)])
                .map_err(|e| self.map_call_error(e))?;
            let ptr = values.first().and_then(|v| v.as_i32()).ok_or_else(|| {
                HostError::GuestTrap {
                    export: wasm_export::MEMORY_ALLOCATE.to_owned(),
                    reason: "no pointer returned".to_owned(),
                }
            })?;
            if ptr == 0 {
                return Err(HostError::AllocFailed { size: payload.len() });
            }

            // The guest owns the buffer from here on; it pins it until
            // the consume call returns and releases it internally.
            if !instance.memory_write(ptr as u32, &payload) {
                return Err(HostError::MemoryWriteFailed {
                    export: export.to_owned(),
                });
            }
            (ptr, size)
        };

        let ctx = Rc::new(CallContext::for_consume());
        let scope = CallScope::enter(Rc::clone(&ctx));
        let call_result = instance.call(export, &[Value::I32(ptr), Value::I32(size)]);
        drop(scope);

        let values = call_result.map_err(|e| self.map_call_error(e))?;
        let code = values.first().and_then(|v| v.as_i32()).ok_or_else(|| {
            HostError::GuestTrap {
                export: export.to_owned(),
                reason: "no status code returned".to_owned(),
            }
        })?;

        let status = Status {
            code: StatusCode::from_i32(code),
            reason: ctx.take_status_reason(),
        };
        if !status.is_ok() {
            tracing::debug!(%signal, %status, "plugin rejected batch");
            return Err(HostError::GuestStatus { status });
        }

        drop(instance);

        {
            let mut state = self.state.lock();
            if *state == PluginState::Started {
                *state = PluginState::Running;
            }
        }
        self.stats.lock().record(started.elapsed());

        Ok(ctx.take_raw_result())
    }

    /// Run an optional status-returning lifecycle export under an empty
    /// per-call state.
    fn call_status_export(
        &self,
        instance: &mut Box<dyn InstanceHandle>,
        export: &str,
    ) -> HostResult<Status> {
        let ctx = Rc::new(CallContext::for_consume());
        let scope = CallScope::enter(Rc::clone(&ctx));
        let call_result = instance.call(export, &[]);
        drop(scope);

        let values = call_result.map_err(|e| self.map_call_error(e))?;
        let code = values.first().and_then(|v| v.as_i32()).ok_or_else(|| {
            HostError::GuestTrap {
                export: export.to_owned(),
                reason: "no status code returned".to_owned(),
            }
        })?;
        Ok(Status {
            code: StatusCode::from_i32(code),
            reason: ctx.take_status_reason(),
        })
    }

    /// Reject push-model entrypoints on plugins without the ABI v1
    /// marker.
    pub(crate) fn require_push_model(&self, export: &str) -> HostResult<()> {
        if self.abi_version.supports_push_model() {
            Ok(())
        } else {
            Err(HostError::AbiVersionMarkerNotExported {
                export: export.to_owned(),
            })
        }
    }

    /// Map an adapter call error, moving the plugin to `STOPPING` on
    /// traps.
    pub(crate) fn map_call_error(&self, err: RuntimeError) -> HostError {
        if matches!(err, RuntimeError::Trap { .. }) {
            self.mark_stopping();
        }
        HostError::from_runtime(err)
    }

    pub(crate) fn mark_stopping(&self) {
        let mut state = self.state.lock();
        if state.is_open() {
            *state = PluginState::Stopping;
        }
    }

    /// Set the shutdown latch without waiting for anything. Receiver
    /// guests observe it at their next `get_shutdown_requested` poll.
    pub fn request_shutdown(&self) {
        self.shutdown_requested.store(true, Ordering::SeqCst);
        self.mark_stopping();
    }

    /// Whether shutdown has been requested.
    #[must_use]
    pub fn is_shutdown_requested(&self) -> bool {
        self.shutdown_requested.load(Ordering::SeqCst)
    }

    /// Tear the plugin down: set the latch, run the optional `shutdown`
    /// export, and close the instance. Idempotent. Receivers must be
    /// shut down through their handles first; this call waits for the
    /// instance mutex.
    ///
    /// The result merges the guest's reported shutdown status with
    /// teardown: closing is always attempted, and a non-OK guest status
    /// surfaces after it.
    ///
    /// # Errors
    ///
    /// `GuestStatus` when the guest reported a failure or trapped while
    /// shutting down.
    pub fn shutdown(&self) -> HostResult<()> {
        {
            let state = self.state.lock();
            if *state == PluginState::Closed {
                return Ok(());
            }
        }

        self.shutdown_requested.store(true, Ordering::SeqCst);
        self.mark_stopping();

        let mut guest_status: Option<Status> = None;
        {
            let mut instance = self.instance.lock();
            // The shutdown hook is part of the push-model contract;
            // unknown-ABI plugins are torn down without entering the
            // guest.
            if self.abi_version.supports_push_model()
                && instance.export(wasm_export::SHUTDOWN).is_some()
            {
                match self.call_status_export(&mut instance, wasm_export::SHUTDOWN) {
                    Ok(status) if !status.is_ok() => {
                        tracing::warn!(%status, "plugin shutdown reported failure");
                        guest_status = Some(status);
                    }
                    Ok(_) => {}
                    Err(e) => {
                        tracing::warn!(error = %e, "plugin shutdown trapped");
                        guest_status = Some(Status::with_reason(StatusCode::Error, e.to_string()));
                    }
                }
            }
            instance.close();
        }

        *self.state.lock() = PluginState::Closed;
        tracing::info!(path = %self.path.display(), "closed wasm plugin");

        match guest_status {
            Some(status) => Err(HostError::GuestStatus { status }),
            None => Ok(()),
        }
    }

    /// [`shutdown`](Self::shutdown), with any guest-reported status
    /// demoted to a log line. Teardown itself cannot fail.
    pub fn close(&self) {
        if let Err(e) = self.shutdown() {
            tracing::debug!(error = %e, "plugin reported an error while closing");
        }
    }
}
