//! Typed status codes returned by guest entrypoints.

use std::fmt;

/// Wire status code returned by `otelwasm_consume_*`, `start`, and
/// `shutdown`.
///
/// The wire values are fixed: `0 = OK`, `1 = ERROR`,
/// `2 = INVALID_ARGUMENT`. Any other value is carried through verbatim as
/// [`StatusCode::Unknown`] rather than rejected, so a newer guest can
/// surface codes this host does not know yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StatusCode {
    /// The call succeeded.
    Ok,
    /// The call failed.
    Error,
    /// The guest considered the payload or arguments invalid.
    InvalidArgument,
    /// An unrecognized non-zero code.
    Unknown(i32),
}

impl StatusCode {
    /// Map a raw i32 return value onto a status code. Total: every value
    /// maps to exactly one variant.
    #[must_use]
    pub fn from_i32(value: i32) -> Self {
        match value {
            0 => StatusCode::Ok,
            1 => StatusCode::Error,
            2 => StatusCode::InvalidArgument,
            other => StatusCode::Unknown(other),
        }
    }

    /// The wire value of this code.
    #[must_use]
    pub fn as_i32(self) -> i32 {
        match self {
            StatusCode::Ok => 0,
            StatusCode::Error => 1,
            StatusCode::InvalidArgument => 2,
            StatusCode::Unknown(other) => other,
        }
    }

    /// Whether this code reports success.
    #[must_use]
    pub fn is_ok(self) -> bool {
        self == StatusCode::Ok
    }
}

impl fmt::Display for StatusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StatusCode::Ok => f.write_str("OK"),
            StatusCode::Error => f.write_str("ERROR"),
            StatusCode::InvalidArgument => f.write_str("INVALID_ARGUMENT"),
            StatusCode::Unknown(code) => write!(f, "UNKNOWN({code})"),
        }
    }
}

/// A guest status with its optional reason string.
///
/// The reason is supplied out of band through the `set_status_reason` host
/// import before the guest entrypoint returns; it travels with the code so
/// the pipeline can render both.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Status {
    /// The typed wire code.
    pub code: StatusCode,
    /// Optional human-readable reason set by the guest.
    pub reason: Option<String>,
}

impl Status {
    /// A status with no reason attached.
    #[must_use]
    pub fn new(code: StatusCode) -> Self {
        Self { code, reason: None }
    }

    /// A status carrying a guest-supplied reason.
    #[must_use]
    pub fn with_reason(code: StatusCode, reason: impl Into<String>) -> Self {
        Self {
            code,
            reason: Some(reason.into()),
        }
    }

    /// Whether the status reports success.
    #[must_use]
    pub fn is_ok(&self) -> bool {
        self.code.is_ok()
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.reason {
            Some(reason) if !reason.is_empty() => write!(f, "{}: {}", self.code, reason),
            _ => write!(f, "{}", self.code),
        }
    }
}
