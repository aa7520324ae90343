//! Plugin configuration.
//!
//! The collector's configuration layer hands the host one tree per
//! plugin: where the module lives (`path`), an opaque tree delivered to
//! the guest verbatim as JSON (`plugin_config`), and engine selection
//! (`runtime_config`). Parsing the collector's own file format is the
//! caller's concern; this module validates what arrives.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

use otelwasm_runtime::EngineKind;

use crate::error::{HostError, HostResult};

/// Key in `runtime_config` holding the receiver shutdown grace period in
/// milliseconds.
const SHUTDOWN_GRACE_MS_KEY: &str = "shutdown_grace_ms";

/// Default receiver shutdown grace period.
pub const DEFAULT_SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

/// Configuration of one plugin instance.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PluginConfig {
    /// Filesystem location of the Wasm module. Required.
    #[serde(default)]
    pub path: PathBuf,

    /// Opaque tree passed verbatim to the guest as JSON.
    #[serde(default)]
    pub plugin_config: serde_json::Value,

    /// Engine selection and mode.
    #[serde(default)]
    pub runtime_config: RuntimeConfig,
}

impl PluginConfig {
    /// A configuration pointing at a module with everything else
    /// defaulted.
    #[must_use]
    pub fn for_module(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            plugin_config: serde_json::Value::Null,
            runtime_config: RuntimeConfig::default(),
        }
    }

    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// [`HostError::InvalidConfig`] when `path` is missing or the engine
    /// name is unknown.
    pub fn validate(&self) -> HostResult<()> {
        if self.path.as_os_str().is_empty() {
            return Err(HostError::InvalidConfig {
                reason: "missing required key \"path\"".to_owned(),
            });
        }
        self.runtime_config.engine_kind()?;
        Ok(())
    }
}

/// Engine selection and engine-specific knobs.
#[derive(Debug, Clone, Deserialize)]
pub struct RuntimeConfig {
    /// Engine name: `"interpreter"` (default) or `"compiled"`.
    #[serde(default = "default_engine")]
    pub engine: String,

    /// Remaining engine/mode keys, passed through untyped.
    #[serde(flatten)]
    pub remaining: BTreeMap<String, serde_json::Value>,
}

fn default_engine() -> String {
    EngineKind::Interpreter.to_string()
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            engine: default_engine(),
            remaining: BTreeMap::new(),
        }
    }
}

impl RuntimeConfig {
    /// The parsed engine kind.
    ///
    /// # Errors
    ///
    /// [`HostError::InvalidConfig`] for engine names this host does not
    /// know.
    pub fn engine_kind(&self) -> HostResult<EngineKind> {
        self.engine
            .parse::<EngineKind>()
            .map_err(|reason| HostError::InvalidConfig { reason })
    }

    /// The receiver shutdown grace period, from `shutdown_grace_ms`
    /// when present and a positive integer, otherwise
    /// [`DEFAULT_SHUTDOWN_GRACE`].
    #[must_use]
    pub fn shutdown_grace(&self) -> Duration {
        self.remaining
            .get(SHUTDOWN_GRACE_MS_KEY)
            .and_then(serde_json::Value::as_u64)
            .filter(|ms| *ms > 0)
            .map_or(DEFAULT_SHUTDOWN_GRACE, Duration::from_millis)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_path_is_rejected() {
        let config = PluginConfig::default();
        let err = config.validate();
        assert!(matches!(err, Err(HostError::InvalidConfig { .. })));
    }

    #[test]
    fn unknown_engine_is_rejected() {
        let mut config = PluginConfig::for_module("plugin.wasm");
        config.runtime_config.engine = "jit".to_owned();
        let err = config.validate();
        match err {
            Err(HostError::InvalidConfig { reason }) => {
                assert!(reason.contains("jit"));
            }
            other => assert!(other.is_err(), "expected InvalidConfig, got {other:?}"),
        }
    }

    #[test]
    fn defaults_parse_to_interpreter() -> HostResult<()> {
        let config = PluginConfig::for_module("plugin.wasm");
        config.validate()?;
        assert_eq!(config.runtime_config.engine_kind()?, EngineKind::Interpreter);
        assert_eq!(config.runtime_config.shutdown_grace(), DEFAULT_SHUTDOWN_GRACE);
        Ok(())
    }

    #[test]
    fn config_deserializes_from_json() -> HostResult<()> {
        let json = serde_json::json!({
            "path": "processor.wasm",
            "plugin_config": {"mode": "redact"},
            "runtime_config": {"engine": "compiled", "shutdown_grace_ms": 250}
        });
        let config: PluginConfig = serde_json::from_value(json).map_err(|e| {
            HostError::InvalidConfig {
                reason: e.to_string(),
            }
        })?;
        config.validate()?;
        assert_eq!(config.runtime_config.engine_kind()?, EngineKind::Compiled);
        assert_eq!(
            config.runtime_config.shutdown_grace(),
            Duration::from_millis(250)
        );
        Ok(())
    }

    #[test]
    fn zero_grace_falls_back_to_default() {
        let mut config = RuntimeConfig::default();
        config
            .remaining
            .insert("shutdown_grace_ms".to_owned(), serde_json::json!(0));
        assert_eq!(config.shutdown_grace(), DEFAULT_SHUTDOWN_GRACE);
    }
}
