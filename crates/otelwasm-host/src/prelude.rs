//! Convenience re-exports for embedding the host.

pub use crate::config::{PluginConfig, RuntimeConfig};
pub use crate::error::{HostError, HostResult};
pub use crate::lifecycle::PluginState;
pub use crate::plugin::{Plugin, PluginStats};
pub use crate::receiver::ReceiverHandle;

pub use otelwasm_pdata::{Codec, LogsData, MetricsData, TracesData};
pub use otelwasm_plugin_abi::prelude::*;
pub use otelwasm_runtime::EngineKind;
