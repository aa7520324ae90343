//! The lightweight system-interface environment handed to guests.

/// Environment the back-ends wire into the guest's system-interface
/// imports: environment variables, arguments, and standard streams.
///
/// This is the portable subset telemetry plugins actually use. File
/// system preopens and socket operations are deliberately absent.
#[derive(Debug, Clone, Default)]
pub struct GuestEnvironment {
    /// Environment variables visible to the guest.
    pub env_vars: Vec<(String, String)>,
    /// Argument vector; element 0 is conventionally the module name.
    pub args: Vec<String>,
    /// Whether guest stdout/stderr are surfaced through the host's
    /// standard streams (compiled back-end) or the host log
    /// (interpreter back-end). When false, guest output is discarded.
    pub inherit_stdio: bool,
}

impl GuestEnvironment {
    /// An environment with inherited stdio and nothing else.
    #[must_use]
    pub fn new() -> Self {
        Self {
            env_vars: Vec::new(),
            args: Vec::new(),
            inherit_stdio: true,
        }
    }

    /// Add an environment variable.
    #[must_use]
    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env_vars.push((key.into(), value.into()));
        self
    }

    /// Add an argument.
    #[must_use]
    pub fn with_arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_accumulates() {
        let env = GuestEnvironment::new()
            .with_env("OTEL_LOG_LEVEL", "debug")
            .with_arg("plugin.wasm");
        assert!(env.inherit_stdio);
        assert_eq!(env.env_vars.len(), 1);
        assert_eq!(env.args.len(), 1);
    }
}
