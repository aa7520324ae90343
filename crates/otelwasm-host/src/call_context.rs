//! Per-call state shared between a guest call and the host imports it
//! triggers.
//!
//! The state lives exactly as long as one guest call's stack frame. It
//! is installed into a thread-local slot by [`CallScope`] immediately
//! before the host enters the guest and removed when the scope drops;
//! host imports find it through [`CallContext::with_current`]. Binding
//! the state to the invoking thread rather than a global map keyed by
//! plugin keeps its lifetime equal to the call and needs no
//! synchronization: host imports execute on the thread that is inside
//! the guest.

use std::cell::RefCell;
use std::rc::Rc;
use std::sync::Arc;

use otelwasm_pdata::{LogsData, MetricsData, TracesData};
use otelwasm_plugin_abi::Signal;

/// A decoded override batch handed back by the guest.
#[derive(Debug, Clone, PartialEq)]
pub enum ResultPayload {
    /// Trace batch.
    Traces(TracesData),
    /// Metric batch.
    Metrics(MetricsData),
    /// Log batch.
    Logs(LogsData),
}

impl ResultPayload {
    /// The signal this payload belongs to.
    #[must_use]
    pub fn signal(&self) -> Signal {
        match self {
            ResultPayload::Traces(_) => Signal::Traces,
            ResultPayload::Metrics(_) => Signal::Metrics,
            ResultPayload::Logs(_) => Signal::Logs,
        }
    }
}

/// Synchronous downstream consumer used by receiver calls.
pub type BatchForwarder = Arc<dyn Fn(ResultPayload) + Send + Sync>;

/// State of one in-flight guest call.
pub struct CallContext {
    /// Raw override bytes stored by `set_result_*` during consume
    /// calls, tagged with their signal. Decoded by the host after the
    /// guest returns, so undecodable bytes surface as an unmarshal
    /// failure of the call rather than a trap.
    raw_result: RefCell<Option<(Signal, Vec<u8>)>>,
    /// Reason stored by `set_status_reason`.
    status_reason: RefCell<Option<String>>,
    /// For receiver calls: the signal whose batches are forwarded
    /// downstream instead of stored.
    receiver_signal: Option<Signal>,
    /// The downstream consumer of receiver batches.
    forward: Option<BatchForwarder>,
}

impl CallContext {
    /// State for a consume / lifecycle call: results are stored for the
    /// host to pick up after the guest returns.
    #[must_use]
    pub fn for_consume() -> Self {
        Self {
            raw_result: RefCell::new(None),
            status_reason: RefCell::new(None),
            receiver_signal: None,
            forward: None,
        }
    }

    /// State for a receiver start call: batches of `signal` are handed
    /// to `forward` synchronously, before the guest resumes.
    #[must_use]
    pub fn for_receiver(signal: Signal, forward: BatchForwarder) -> Self {
        Self {
            raw_result: RefCell::new(None),
            status_reason: RefCell::new(None),
            receiver_signal: Some(signal),
            forward: Some(forward),
        }
    }

    /// The forwarder for batches of `signal`, when this is a receiver
    /// call producing that signal.
    #[must_use]
    pub fn forwarder_for(&self, signal: Signal) -> Option<&BatchForwarder> {
        match (self.receiver_signal, self.forward.as_ref()) {
            (Some(s), Some(forward)) if s == signal => Some(forward),
            _ => None,
        }
    }

    /// Store raw override bytes from `set_result_*`, last write
    /// winning.
    pub fn store_raw_result(&self, signal: Signal, bytes: Vec<u8>) {
        *self.raw_result.borrow_mut() = Some((signal, bytes));
    }

    /// Record the status reason for this call.
    pub fn set_status_reason(&self, reason: String) {
        *self.status_reason.borrow_mut() = Some(reason);
    }

    /// Take the raw override bytes, leaving the slot empty.
    #[must_use]
    pub fn take_raw_result(&self) -> Option<(Signal, Vec<u8>)> {
        self.raw_result.borrow_mut().take()
    }

    /// Take the status reason, leaving the slot empty.
    #[must_use]
    pub fn take_status_reason(&self) -> Option<String> {
        self.status_reason.borrow_mut().take()
    }

    /// Run `f` against the call context of the current thread, when one
    /// is installed.
    pub fn with_current<R>(f: impl FnOnce(&CallContext) -> R) -> Option<R> {
        CURRENT_CALL.with(|slot| slot.borrow().as_ref().map(|ctx| f(ctx)))
    }
}

thread_local! {
    static CURRENT_CALL: RefCell<Option<Rc<CallContext>>> = const { RefCell::new(None) };
}

/// RAII guard installing a [`CallContext`] as the current call of this
/// thread.
pub struct CallScope {
    previous: Option<Rc<CallContext>>,
}

impl CallScope {
    /// Install `ctx` for the duration of the returned scope.
    pub fn enter(ctx: Rc<CallContext>) -> Self {
        let previous = CURRENT_CALL.with(|slot| slot.borrow_mut().replace(ctx));
        Self { previous }
    }
}

impl Drop for CallScope {
    fn drop(&mut self) {
        CURRENT_CALL.with(|slot| {
            *slot.borrow_mut() = self.previous.take();
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[test]
    fn no_context_outside_a_scope() {
        assert!(CallContext::with_current(|_| ()).is_none());
    }

    #[test]
    fn scope_installs_and_restores() {
        let ctx = Rc::new(CallContext::for_consume());
        {
            let _scope = CallScope::enter(Rc::clone(&ctx));
            let seen =
                CallContext::with_current(|c| c.take_status_reason().is_none()).unwrap_or(false);
            assert!(seen);
        }
        assert!(CallContext::with_current(|_| ()).is_none());
    }

    #[test]
    fn consume_call_stores_last_raw_result() {
        let ctx = CallContext::for_consume();
        ctx.store_raw_result(Signal::Traces, vec![1]);
        ctx.store_raw_result(Signal::Traces, vec![2, 3]);
        assert_eq!(ctx.take_raw_result(), Some((Signal::Traces, vec![2, 3])));
        assert!(ctx.take_raw_result().is_none());
    }

    #[test]
    fn consume_call_has_no_forwarder() {
        let ctx = CallContext::for_consume();
        assert!(ctx.forwarder_for(Signal::Logs).is_none());
    }

    #[test]
    fn receiver_call_forwards_only_its_signal() {
        let forwarded: Arc<Mutex<Vec<Signal>>> = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&forwarded);
        let ctx = CallContext::for_receiver(
            Signal::Logs,
            Arc::new(move |payload| {
                if let Ok(mut seen) = sink.lock() {
                    seen.push(payload.signal());
                }
            }),
        );

        assert!(ctx.forwarder_for(Signal::Traces).is_none());
        let forward = ctx.forwarder_for(Signal::Logs).cloned();
        assert!(forward.is_some(), "logs forwarder missing");
        if let Some(forward) = forward {
            forward(ResultPayload::Logs(LogsData::single_record("one")));
        }

        let seen = forwarded.lock().map(|v| v.clone()).unwrap_or_default();
        assert_eq!(seen, vec![Signal::Logs]);
    }
}
