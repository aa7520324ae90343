//! Wasm plugin host runtime for OpenTelemetry-style collector
//! components.
//!
//! Collector receivers, processors, and exporters are packaged as Wasm
//! modules and loaded at runtime. This crate is the host side of that
//! contract: it opens a module, validates the ABI against the exports
//! the component role requires, performs the telemetry-type capability
//! handshake, and drives the push-model entrypoints for every batch.
//!
//! # Layers
//!
//! - [`config`]: the `path` / `plugin_config` / `runtime_config` tree a
//!   plugin is loaded from.
//! - [`host_functions`]: the import surface guests link against under
//!   `opentelemetry.io/wasm`.
//! - [`Plugin`]: lifecycle (`open` → `start` → `consume_*` →
//!   `shutdown`), ABI validation, the per-call ownership protocol.
//! - [`ReceiverHandle`]: long-running receiver entrypoints with
//!   cooperative shutdown.
//!
//! # Example
//!
//! ```no_run
//! use otelwasm_host::{Plugin, PluginConfig};
//! use otelwasm_host::pdata::TracesData;
//! use otelwasm_plugin_abi::constants::wasm_export;
//!
//! # fn main() -> otelwasm_host::HostResult<()> {
//! let config = PluginConfig::for_module("redact_processor.wasm");
//! let plugin = Plugin::open(&config, &[wasm_export::CONSUME_TRACES])?;
//! plugin.start()?;
//!
//! let batch = TracesData::single_span("GET /");
//! match plugin.consume_traces(&batch)? {
//!     Some(replacement) => println!("guest substituted {} groups", replacement.resource_spans.len()),
//!     None => println!("processed in place"),
//! }
//!
//! plugin.shutdown()?;
//! # Ok(())
//! # }
//! ```
//!
//! # Concurrency
//!
//! Guest entry on one plugin is strictly serialized by a per-plugin
//! mutex; batches submitted to `consume_*` are processed in submission
//! order. Distinct plugins are independent. Cancellation is cooperative
//! through the shutdown latch; only receiver shutdown carries a bounded
//! grace period.

#![warn(missing_docs, rust_2018_idioms)]

pub mod call_context;
pub mod config;
mod error;
pub mod host_functions;
mod lifecycle;
mod plugin;
pub mod prelude;
mod receiver;

pub use call_context::ResultPayload;
pub use config::{DEFAULT_SHUTDOWN_GRACE, PluginConfig, RuntimeConfig};
pub use error::{HostError, HostResult};
pub use lifecycle::PluginState;
pub use plugin::{Plugin, PluginStats};
pub use receiver::ReceiverHandle;

/// Re-export of the ABI contract crate.
pub use otelwasm_plugin_abi as abi;
/// Re-export of the telemetry payload crate.
pub use otelwasm_pdata as pdata;
