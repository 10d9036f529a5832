//! HealthKit Bridge - Normalization and aggregation layer over a native health store
//!
//! The bridge translates between a generic health data model (plain type
//! names, uniform sample records) and the vendor vocabulary of the native
//! store behind an async boundary: type resolution → query dispatch →
//! normalization → aggregation.
//!
//! ## Modules
//!
//! - **Registry / Resolver**: static type tables and authorization scope expansion
//! - **Query / Aggregate**: dispatch to boundary calls, normalization, bucketization
//! - **Writer**: store and delete mapped onto the native save primitives

pub mod error;
pub mod normalizer;
pub mod registry;
pub mod resolver;
pub mod store;
pub mod types;

mod aggregate;
mod bridge;
mod query;
mod writer;

#[cfg(test)]
pub(crate) mod testing;

pub use bridge::HealthBridge;
pub use error::{BridgeError, StoreError};
pub use resolver::{ResolvedTypes, TypeResolver};
pub use store::{AuthorizationStatus, HealthStore};
pub use types::{
    AccessScope, AggregateResult, AggregateValue, AggregationBucket, Bucket, DataTypeEntry,
    DeleteRecord, NormalizedSample, QueryOptions, SampleValue, StoreRecord, StoreValue,
};

/// Crate version reported to callers
pub const BRIDGE_VERSION: &str = env!("CARGO_PKG_VERSION");
