//! Error types for the bridge layer

use thiserror::Error;

/// Errors surfaced by bridge operations
#[derive(Debug, Error)]
pub enum BridgeError {
    #[error("unknown data type - {0}")]
    UnknownDataType(String),

    #[error("bucket not recognised {0}")]
    UnrecognizedBucket(String),

    #[error("{0} is not writable")]
    NotWritable(String),

    #[error("{0} is not deletable")]
    NotDeletable(String),

    #[error("data type {0} not supported in aggregated queries")]
    UnsupportedAggregation(String),

    #[error("cannot recognise nutrition item {0}")]
    UnknownNutrient(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Opaque failure reported by the native health store.
///
/// The boundary is a black box; its failures carry a message and nothing else
/// and are propagated unchanged. No retries happen in this layer.
#[derive(Debug, Error)]
#[error("health store error: {message}")]
pub struct StoreError {
    message: String,
}

impl StoreError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}
