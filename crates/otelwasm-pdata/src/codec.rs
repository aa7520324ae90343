//! Encoding and decoding of telemetry batches at the guest boundary.

use prost::Message;
use thiserror::Error;

use otelwasm_plugin_abi::Signal;

use crate::proto::{LogsData, MetricsData, TracesData};

/// Codec result type.
pub type CodecResult<T> = Result<T, CodecError>;

/// Errors raised while marshalling batches across the boundary.
#[derive(Error, Debug)]
pub enum CodecError {
    /// The encoded batch exceeds the configured maximum.
    #[error("{signal} batch of {size} bytes exceeds maximum {max} bytes")]
    TooLarge {
        /// Signal being encoded.
        signal: Signal,
        /// Encoded size in bytes.
        size: usize,
        /// Configured maximum.
        max: usize,
    },

    /// Protobuf encoding failed.
    #[error("failed to encode {signal} batch: {source}")]
    EncodeFailed {
        /// Signal being encoded.
        signal: Signal,
        /// Underlying prost error.
        source: prost::EncodeError,
    },

    /// Protobuf decoding failed.
    #[error("failed to decode {signal} batch: {source}")]
    DecodeFailed {
        /// Signal being decoded.
        signal: Signal,
        /// Underlying prost error.
        source: prost::DecodeError,
    },
}

impl CodecError {
    /// The signal the failing payload belonged to.
    #[must_use]
    pub fn signal(&self) -> Signal {
        match self {
            CodecError::TooLarge { signal, .. }
            | CodecError::EncodeFailed { signal, .. }
            | CodecError::DecodeFailed { signal, .. } => *signal,
        }
    }
}

/// Size-guarded batch codec.
///
/// A single instance is shared by a plugin for all three signals. The
/// size guard bounds what a guest can hand back through `set_result_*`
/// as much as what the host pushes in.
#[derive(Debug, Clone, Copy)]
pub struct Codec {
    max_message_size: usize,
}

/// Default maximum batch size: 16 MiB, matching typical collector
/// receiver limits.
pub const DEFAULT_MAX_MESSAGE_SIZE: usize = 16 * 1024 * 1024;

impl Codec {
    /// Codec with the default size cap.
    #[must_use]
    pub fn new() -> Self {
        Self {
            max_message_size: DEFAULT_MAX_MESSAGE_SIZE,
        }
    }

    /// Codec with a custom size cap.
    #[must_use]
    pub fn with_max_size(max_message_size: usize) -> Self {
        Self { max_message_size }
    }

    /// The configured size cap in bytes.
    #[must_use]
    pub fn max_message_size(&self) -> usize {
        self.max_message_size
    }

    fn encode<M: Message>(&self, signal: Signal, message: &M) -> CodecResult<Vec<u8>> {
        let encoded_len = message.encoded_len();
        if encoded_len > self.max_message_size {
            return Err(CodecError::TooLarge {
                signal,
                size: encoded_len,
                max: self.max_message_size,
            });
        }

        let mut buffer = Vec::with_capacity(encoded_len);
        message
            .encode(&mut buffer)
            .map_err(|source| CodecError::EncodeFailed { signal, source })?;
        Ok(buffer)
    }

    fn decode<M: Message + Default>(&self, signal: Signal, bytes: &[u8]) -> CodecResult<M> {
        if bytes.len() > self.max_message_size {
            return Err(CodecError::TooLarge {
                signal,
                size: bytes.len(),
                max: self.max_message_size,
            });
        }
        M::decode(bytes).map_err(|source| CodecError::DecodeFailed { signal, source })
    }

    /// Encode a trace batch.
    ///
    /// # Errors
    ///
    /// Fails when the batch exceeds the size cap or cannot be encoded.
    pub fn encode_traces(&self, batch: &TracesData) -> CodecResult<Vec<u8>> {
        self.encode(Signal::Traces, batch)
    }

    /// Encode a metric batch.
    ///
    /// # Errors
    ///
    /// Fails when the batch exceeds the size cap or cannot be encoded.
    pub fn encode_metrics(&self, batch: &MetricsData) -> CodecResult<Vec<u8>> {
        self.encode(Signal::Metrics, batch)
    }

    /// Encode a log batch.
    ///
    /// # Errors
    ///
    /// Fails when the batch exceeds the size cap or cannot be encoded.
    pub fn encode_logs(&self, batch: &LogsData) -> CodecResult<Vec<u8>> {
        self.encode(Signal::Logs, batch)
    }

    /// Decode a trace batch handed back by a guest.
    ///
    /// # Errors
    ///
    /// Fails when the bytes exceed the size cap or are not a valid batch.
    pub fn decode_traces(&self, bytes: &[u8]) -> CodecResult<TracesData> {
        self.decode(Signal::Traces, bytes)
    }

    /// Decode a metric batch handed back by a guest.
    ///
    /// # Errors
    ///
    /// Fails when the bytes exceed the size cap or are not a valid batch.
    pub fn decode_metrics(&self, bytes: &[u8]) -> CodecResult<MetricsData> {
        self.decode(Signal::Metrics, bytes)
    }

    /// Decode a log batch handed back by a guest.
    ///
    /// # Errors
    ///
    /// Fails when the bytes exceed the size cap or are not a valid batch.
    pub fn decode_logs(&self, bytes: &[u8]) -> CodecResult<LogsData> {
        self.decode(Signal::Logs, bytes)
    }
}

impl Default for Codec {
    fn default() -> Self {
        Self::new()
    }
}
