//! Telemetry signals and the capability bitmap.

use std::fmt;

use crate::constants::{host_function, wasm_export};

/// One of the three telemetry signals a plugin can handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Signal {
    /// Metric data points.
    Metrics,
    /// Log records.
    Logs,
    /// Trace spans.
    Traces,
}

impl Signal {
    /// All signals, in bitmap-bit order.
    pub const ALL: [Signal; 3] = [Signal::Metrics, Signal::Logs, Signal::Traces];

    /// Bit index of this signal in the capability bitmap returned by
    /// `get_supported_telemetry`.
    #[must_use]
    pub fn bit(self) -> u32 {
        match self {
            Signal::Metrics => 0,
            Signal::Logs => 1,
            Signal::Traces => 2,
        }
    }

    /// Name of the guest consume export for this signal.
    #[must_use]
    pub fn consume_export(self) -> &'static str {
        match self {
            Signal::Metrics => wasm_export::CONSUME_METRICS,
            Signal::Logs => wasm_export::CONSUME_LOGS,
            Signal::Traces => wasm_export::CONSUME_TRACES,
        }
    }

    /// Name of the guest receiver-start export for this signal.
    #[must_use]
    pub fn receiver_export(self) -> &'static str {
        match self {
            Signal::Metrics => wasm_export::START_METRICS_RECEIVER,
            Signal::Logs => wasm_export::START_LOGS_RECEIVER,
            Signal::Traces => wasm_export::START_TRACES_RECEIVER,
        }
    }

    /// Name of the host import a guest uses to hand back an override
    /// batch for this signal.
    #[must_use]
    pub fn set_result_import(self) -> &'static str {
        match self {
            Signal::Metrics => host_function::SET_RESULT_METRICS,
            Signal::Logs => host_function::SET_RESULT_LOGS,
            Signal::Traces => host_function::SET_RESULT_TRACES,
        }
    }
}

impl fmt::Display for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Signal::Metrics => f.write_str("metrics"),
            Signal::Logs => f.write_str("logs"),
            Signal::Traces => f.write_str("traces"),
        }
    }
}

/// Capability bitmap returned by `get_supported_telemetry`.
///
/// Bit 0 is metrics, bit 1 logs, bit 2 traces. Guests set exactly the
/// bits whose entrypoints they actually export; the host gates routing on
/// this value and never calls an unadvertised signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Capabilities(u32);

impl Capabilities {
    /// Wrap a raw bitmap value. Bits above the known signals are kept (a
    /// newer guest may advertise capabilities this host ignores).
    #[must_use]
    pub fn from_bits(bits: u32) -> Self {
        Self(bits)
    }

    /// The raw bitmap value.
    #[must_use]
    pub fn bits(self) -> u32 {
        self.0
    }

    /// Whether the bitmap advertises the given signal.
    #[must_use]
    pub fn supports(self, signal: Signal) -> bool {
        self.0 & (1 << signal.bit()) != 0
    }

    /// Iterator over the advertised signals, in bit order.
    pub fn iter(self) -> impl Iterator<Item = Signal> {
        Signal::ALL.into_iter().filter(move |s| self.supports(*s))
    }

    /// A bitmap advertising exactly the given signals.
    #[must_use]
    pub fn from_signals(signals: &[Signal]) -> Self {
        Self(signals.iter().fold(0, |bits, s| bits | (1 << s.bit())))
    }
}

impl fmt::Display for Capabilities {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for signal in self.iter() {
            if !first {
                f.write_str("|")?;
            }
            write!(f, "{signal}")?;
            first = false;
        }
        if first {
            f.write_str("none")?;
        }
        Ok(())
    }
}
