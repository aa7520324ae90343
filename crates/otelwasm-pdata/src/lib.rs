//! Protobuf telemetry batch types and codec for the otelwasm host.
//!
//! The host treats telemetry payloads as opaque: it marshals a batch to
//! protobuf bytes, transfers them into guest linear memory, and
//! unmarshals whatever the guest hands back. This crate supplies the
//! message types for the three signals and a size-guarded [`Codec`] so
//! that marshalling failures surface as typed errors instead of
//! corrupted buffers.
//!
//! Top-level field numbering follows the OTLP wire layout; nested
//! structure is the subset telemetry plugins exchange in practice. The
//! host itself never reads past the top-level message boundary.

#![warn(missing_docs, rust_2018_idioms)]

mod codec;
pub mod proto;

pub use codec::{Codec, CodecError, CodecResult};
pub use proto::{LogsData, MetricsData, TracesData};
