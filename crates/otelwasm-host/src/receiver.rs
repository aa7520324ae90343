//! Receiver entrypoints and cooperative shutdown.
//!
//! A receiver guest owns a long-running control loop reached through
//! `otelwasm_start_<signal>_receiver`. The Wasm execution model is
//! single-threaded and non-preemptive, so the host runs the start
//! export on a dedicated worker thread and the guest cooperates:
//! batches flow out through `set_result_<signal>` (forwarded to the
//! downstream consumer synchronously, before the guest resumes) and the
//! guest polls `get_shutdown_requested` between batches, ideally about
//! once a second.
//!
//! Shutdown sets the latch and waits out the configured grace period.
//! A guest that never observes the latch is interrupted (the compiled
//! back-end traps it at the next epoch check; the interpreter cannot
//! interrupt, so the worker is left to finish on its own) and the
//! caller gets `ShutdownTimeout`.

use std::rc::Rc;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::JoinHandle;
use std::time::Duration;

use crossbeam::channel::{Receiver, Sender, bounded};

use otelwasm_pdata::{LogsData, MetricsData, TracesData};
use otelwasm_plugin_abi::Signal;
use otelwasm_runtime::Interrupter;

use crate::call_context::{BatchForwarder, CallContext, CallScope, ResultPayload};
use crate::error::{HostError, HostResult};
use crate::lifecycle::PluginState;
use crate::plugin::Plugin;

/// How long after an interrupt the worker gets to wind down before the
/// handle gives up waiting for it.
const INTERRUPT_SETTLE: Duration = Duration::from_secs(1);

/// A running receiver worker.
///
/// Dropping the handle without calling [`shutdown`](Self::shutdown)
/// detaches the worker; the receiver keeps producing until the plugin's
/// latch is set some other way.
pub struct ReceiverHandle {
    signal: Signal,
    worker: Option<JoinHandle<HostResult<()>>>,
    done_rx: Receiver<()>,
    latch: Arc<AtomicBool>,
    interrupter: Option<Arc<dyn Interrupter>>,
    grace: Duration,
}

impl ReceiverHandle {
    /// The signal this receiver produces.
    #[must_use]
    pub fn signal(&self) -> Signal {
        self.signal
    }

    /// Whether the start call has already returned.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.worker.as_ref().is_none_or(JoinHandle::is_finished)
    }

    /// Set the shutdown latch and wait for the start call to return.
    ///
    /// # Errors
    ///
    /// `ShutdownTimeout` when the guest does not return within the
    /// grace period (it is interrupted where the engine supports it);
    /// receiver-side traps surface as `GuestTrap`.
    pub fn shutdown(mut self) -> HostResult<()> {
        self.latch.store(true, Ordering::SeqCst);

        if self.done_rx.recv_timeout(self.grace).is_ok() {
            return self.join();
        }

        tracing::warn!(
            signal = %self.signal,
            grace = ?self.grace,
            "receiver missed the shutdown grace period, interrupting guest"
        );
        if let Some(interrupter) = &self.interrupter {
            interrupter.interrupt();
            if self.done_rx.recv_timeout(INTERRUPT_SETTLE).is_ok() {
                // The trap unblocked the worker; the caller still sees
                // the timeout since the guest never cooperated.
                let _ = self.join();
            }
        }
        Err(HostError::ShutdownTimeout { grace: self.grace })
    }

    fn join(&mut self) -> HostResult<()> {
        match self.worker.take() {
            Some(worker) => match worker.join() {
                Ok(result) => result,
                Err(_) => Err(HostError::GuestTrap {
                    export: self.signal.receiver_export().to_owned(),
                    reason: "receiver worker panicked".to_owned(),
                }),
            },
            None => Ok(()),
        }
    }
}

impl Plugin {
    /// Start the trace receiver. Every batch the guest hands back
    /// through `set_result_traces` is delivered to `consumer` before
    /// the guest resumes, in production order.
    ///
    /// # Errors
    ///
    /// `InvalidState` outside `STARTED`/`RUNNING`, `SignalNotSupported`
    /// when the capability bit is unset, `RequiredFunctionNotExported`
    /// when the start export is absent.
    pub fn start_traces_receiver(
        self: &Arc<Self>,
        consumer: impl Fn(TracesData) + Send + Sync + 'static,
    ) -> HostResult<ReceiverHandle> {
        self.start_receiver(
            Signal::Traces,
            Arc::new(move |payload| {
                if let ResultPayload::Traces(batch) = payload {
                    consumer(batch);
                }
            }),
        )
    }

    /// Start the metric receiver.
    ///
    /// # Errors
    ///
    /// See [`Plugin::start_traces_receiver`].
    pub fn start_metrics_receiver(
        self: &Arc<Self>,
        consumer: impl Fn(MetricsData) + Send + Sync + 'static,
    ) -> HostResult<ReceiverHandle> {
        self.start_receiver(
            Signal::Metrics,
            Arc::new(move |payload| {
                if let ResultPayload::Metrics(batch) = payload {
                    consumer(batch);
                }
            }),
        )
    }

    /// Start the log receiver.
    ///
    /// # Errors
    ///
    /// See [`Plugin::start_traces_receiver`].
    pub fn start_logs_receiver(
        self: &Arc<Self>,
        consumer: impl Fn(LogsData) + Send + Sync + 'static,
    ) -> HostResult<ReceiverHandle> {
        self.start_receiver(
            Signal::Logs,
            Arc::new(move |payload| {
                if let ResultPayload::Logs(batch) = payload {
                    consumer(batch);
                }
            }),
        )
    }

    fn start_receiver(
        self: &Arc<Self>,
        signal: Signal,
        forward: BatchForwarder,
    ) -> HostResult<ReceiverHandle> {
        let export = signal.receiver_export();
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

        {
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
        }

        let (done_tx, done_rx) = bounded::<()>(1);
        let plugin = Arc::clone(self);
        let worker = std::thread::Builder::new()
            .name(format!("otelwasm-receiver-{signal}"))
            .spawn(move || plugin.run_receiver(signal, forward, done_tx))
            .map_err(|e| HostError::ReceiverStart {
                signal,
                reason: e.to_string(),
            })?;

        *self.state.lock() = PluginState::Running;
        tracing::info!(%signal, path = %self.path().display(), "receiver started");

        Ok(ReceiverHandle {
            signal,
            worker: Some(worker),
            done_rx,
            latch: Arc::clone(&self.shutdown_requested),
            interrupter: self.interrupter.clone(),
            grace: self.grace,
        })
    }

    /// Worker body: owns the instance mutex for the entire start call.
    fn run_receiver(
        &self,
        signal: Signal,
        forward: BatchForwarder,
        done_tx: Sender<()>,
    ) -> HostResult<()> {
        let export = signal.receiver_export();
        let mut instance = self.instance.lock();

        let ctx = Rc::new(CallContext::for_receiver(signal, forward));
        let scope = CallScope::enter(Rc::clone(&ctx));
        let call_result = instance.call(export, &[]);
        drop(scope);
        drop(instance);

        let outcome = match call_result {
            Ok(_) => {
                tracing::debug!(%signal, "receiver start call returned");
                Ok(())
            }
            Err(e) => {
                let err = self.map_call_error(e);
                tracing::warn!(%signal, error = %err, "receiver terminated abnormally");
                Err(err)
            }
        };

        let _ = done_tx.send(());
        outcome
    }
}
