//! OTLP-shaped message definitions.
//!
//! Hand-written `prost` derives rather than generated code: the host only
//! needs the top-level batch containers and enough structure below them
//! for realistic payloads, not the full OTLP schema surface.

use prost::Message;

/// A string key with a string value. OTLP's `AnyValue` is collapsed to
/// its string arm; non-string attributes pass through untouched inside
/// the batches the host never inspects.
#[derive(Clone, PartialEq, Message)]
pub struct KeyValue {
    /// Attribute key.
    #[prost(string, tag = "1")]
    pub key: String,
    /// Attribute value.
    #[prost(string, tag = "2")]
    pub value: String,
}

/// The entity producing telemetry, as a flat attribute list.
#[derive(Clone, PartialEq, Message)]
pub struct Resource {
    /// Resource attributes, e.g. `service.name`.
    #[prost(message, repeated, tag = "1")]
    pub attributes: Vec<KeyValue>,
}

/// A single span.
#[derive(Clone, PartialEq, Message)]
pub struct Span {
    /// 16-byte trace identifier.
    #[prost(bytes = "vec", tag = "1")]
    pub trace_id: Vec<u8>,
    /// 8-byte span identifier.
    #[prost(bytes = "vec", tag = "2")]
    pub span_id: Vec<u8>,
    /// Operation name.
    #[prost(string, tag = "5")]
    pub name: String,
    /// Start timestamp, Unix nanoseconds.
    #[prost(fixed64, tag = "7")]
    pub start_time_unix_nano: u64,
    /// End timestamp, Unix nanoseconds.
    #[prost(fixed64, tag = "8")]
    pub end_time_unix_nano: u64,
    /// Span attributes.
    #[prost(message, repeated, tag = "9")]
    pub attributes: Vec<KeyValue>,
}

/// Spans produced by one instrumentation scope.
#[derive(Clone, PartialEq, Message)]
pub struct ScopeSpans {
    /// The spans.
    #[prost(message, repeated, tag = "2")]
    pub spans: Vec<Span>,
}

/// Spans from one resource.
#[derive(Clone, PartialEq, Message)]
pub struct ResourceSpans {
    /// The producing resource.
    #[prost(message, optional, tag = "1")]
    pub resource: Option<Resource>,
    /// Spans grouped by scope.
    #[prost(message, repeated, tag = "2")]
    pub scope_spans: Vec<ScopeSpans>,
}

/// One trace batch: the unit transferred across the host↔guest boundary.
#[derive(Clone, PartialEq, Message)]
pub struct TracesData {
    /// Spans grouped by resource.
    #[prost(message, repeated, tag = "1")]
    pub resource_spans: Vec<ResourceSpans>,
}

/// A single metric. The data-point oneof is carried as opaque presence
/// of a gauge; the host does not aggregate.
#[derive(Clone, PartialEq, Message)]
pub struct Metric {
    /// Metric name.
    #[prost(string, tag = "1")]
    pub name: String,
    /// Human-readable description.
    #[prost(string, tag = "2")]
    pub description: String,
    /// Unit, UCUM.
    #[prost(string, tag = "3")]
    pub unit: String,
}

/// Metrics produced by one instrumentation scope.
#[derive(Clone, PartialEq, Message)]
pub struct ScopeMetrics {
    /// The metrics.
    #[prost(message, repeated, tag = "2")]
    pub metrics: Vec<Metric>,
}

/// Metrics from one resource.
#[derive(Clone, PartialEq, Message)]
pub struct ResourceMetrics {
    /// The producing resource.
    #[prost(message, optional, tag = "1")]
    pub resource: Option<Resource>,
    /// Metrics grouped by scope.
    #[prost(message, repeated, tag = "2")]
    pub scope_metrics: Vec<ScopeMetrics>,
}

/// One metric batch.
#[derive(Clone, PartialEq, Message)]
pub struct MetricsData {
    /// Metrics grouped by resource.
    #[prost(message, repeated, tag = "1")]
    pub resource_metrics: Vec<ResourceMetrics>,
}

/// A single log record.
#[derive(Clone, PartialEq, Message)]
pub struct LogRecord {
    /// Timestamp, Unix nanoseconds.
    #[prost(fixed64, tag = "1")]
    pub time_unix_nano: u64,
    /// Severity as text, e.g. `INFO`.
    #[prost(string, tag = "3")]
    pub severity_text: String,
    /// Log body, collapsed to its string arm.
    #[prost(string, tag = "5")]
    pub body: String,
    /// Record attributes.
    #[prost(message, repeated, tag = "6")]
    pub attributes: Vec<KeyValue>,
}

/// Log records produced by one instrumentation scope.
#[derive(Clone, PartialEq, Message)]
pub struct ScopeLogs {
    /// The records.
    #[prost(message, repeated, tag = "2")]
    pub log_records: Vec<LogRecord>,
}

/// Log records from one resource.
#[derive(Clone, PartialEq, Message)]
pub struct ResourceLogs {
    /// The producing resource.
    #[prost(message, optional, tag = "1")]
    pub resource: Option<Resource>,
    /// Records grouped by scope.
    #[prost(message, repeated, tag = "2")]
    pub scope_logs: Vec<ScopeLogs>,
}

/// One log batch.
#[derive(Clone, PartialEq, Message)]
pub struct LogsData {
    /// Records grouped by resource.
    #[prost(message, repeated, tag = "1")]
    pub resource_logs: Vec<ResourceLogs>,
}

impl TracesData {
    /// Whether the batch carries no spans at all.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.resource_spans
            .iter()
            .all(|rs| rs.scope_spans.iter().all(|ss| ss.spans.is_empty()))
    }

    /// A batch with a single named span, for tests and examples.
    #[must_use]
    pub fn single_span(name: impl Into<String>) -> Self {
        Self {
            resource_spans: vec![ResourceSpans {
                resource: None,
                scope_spans: vec![ScopeSpans {
                    spans: vec![Span {
                        trace_id: vec![0xAB; 16],
                        span_id: vec![0xCD; 8],
                        name: name.into(),
                        start_time_unix_nano: 1,
                        end_time_unix_nano: 2,
                        attributes: Vec::new(),
                    }],
                }],
            }],
        }
    }
}

impl MetricsData {
    /// Whether the batch carries no metrics at all.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.resource_metrics
            .iter()
            .all(|rm| rm.scope_metrics.iter().all(|sm| sm.metrics.is_empty()))
    }

    /// A batch with a single named metric, for tests and examples.
    #[must_use]
    pub fn single_metric(name: impl Into<String>) -> Self {
        Self {
            resource_metrics: vec![ResourceMetrics {
                resource: None,
                scope_metrics: vec![ScopeMetrics {
                    metrics: vec![Metric {
                        name: name.into(),
                        description: String::new(),
                        unit: "1".to_owned(),
                    }],
                }],
            }],
        }
    }
}

impl LogsData {
    /// Whether the batch carries no records at all.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.resource_logs
            .iter()
            .all(|rl| rl.scope_logs.iter().all(|sl| sl.log_records.is_empty()))
    }

    /// A batch with a single log record, for tests and examples.
    #[must_use]
    pub fn single_record(body: impl Into<String>) -> Self {
        Self {
            resource_logs: vec![ResourceLogs {
                resource: None,
                scope_logs: vec![ScopeLogs {
                    log_records: vec![LogRecord {
                        time_unix_nano: 1,
                        severity_text: "INFO".to_owned(),
                        body: body.into(),
                        attributes: Vec::new(),
                    }],
                }],
            }],
        }
    }
}
