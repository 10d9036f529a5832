//! Native health-store boundary
//!
//! The underlying health store is an opaque request/response boundary: one
//! async call per primitive, no modeling of its internals. [`HealthStore`] is
//! the contract this layer needs from a binding; everything above it works
//! purely with the raw record shapes defined here.
//!
//! Every call either resolves or fails with an opaque [`StoreError`] that is
//! propagated unchanged. Dependent calls are always chained sequentially by
//! the callers; the trait itself carries no ordering requirements.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::error::StoreError;
use crate::types::Bucket;

pub type StoreResult<T> = Result<T, StoreError>;

/// Authorization state of one native type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum AuthorizationStatus {
    Authorized,
    Denied,
    NotDetermined,
}

impl AuthorizationStatus {
    pub fn is_authorized(&self) -> bool {
        matches!(self, AuthorizationStatus::Authorized)
    }
}

/// Raw-sample query against one native sample type
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SampleQuery {
    pub sample_type: String,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
}

/// Correlation query with the unit list the native store needs to resolve
/// heterogeneous sub-samples
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CorrelationQuery {
    pub correlation_type: String,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub units: Vec<String>,
}

/// Natively bucketed sum query
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AggregatedQuery {
    pub sample_type: String,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
    pub aggregation: Bucket,
}

/// Source and device attribution fields as the native store reports them.
///
/// All fields are optional on the wire; normalization fills the gaps with
/// empty strings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawAttribution {
    pub source_name: Option<String>,
    pub source_version: Option<String>,
    pub source_bundle_id: Option<String>,
    pub source_product_type: Option<String>,
    pub source_os_version_major: Option<u32>,
    pub source_os_version_minor: Option<u32>,
    pub source_os_version_patch: Option<u32>,
    pub device_name: Option<String>,
    pub device_model: Option<String>,
    pub device_manufacturer: Option<String>,
    pub device_local_identifier: Option<String>,
    pub device_hardware_version: Option<String>,
    pub device_software_version: Option<String>,
    pub device_firmware_version: Option<String>,
    #[serde(rename = "UDI")]
    pub udi: Option<String>,
}

/// Scalar or string value on a raw sample
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawValue {
    Number(f64),
    Text(String),
}

/// One raw sample as returned by a sample-type query
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawSample {
    #[serde(rename = "UUID")]
    pub uuid: Option<String>,
    #[serde(default = "epoch")]
    pub start_date: DateTime<Utc>,
    #[serde(default = "epoch")]
    pub end_date: DateTime<Utc>,
    pub quantity: Option<f64>,
    pub value: Option<RawValue>,
    pub unit: Option<String>,
    #[serde(rename = "categoryType.identifier")]
    pub category_type: Option<String>,
    pub quantity_type: Option<String>,
    pub correlation_type: Option<String>,
    #[serde(default)]
    pub metadata: HashMap<String, serde_json::Value>,
    #[serde(flatten)]
    pub attribution: RawAttribution,
}

fn epoch() -> DateTime<Utc> {
    DateTime::UNIX_EPOCH
}

/// One raw workout session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawWorkout {
    #[serde(rename = "UUID")]
    pub uuid: Option<String>,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    /// Generic activity name
    pub activity_type: Option<String>,
    /// Native workout activity identifier
    #[serde(rename = "HKactivityType")]
    pub native_activity_type: Option<String>,
    pub energy: Option<f64>,
    pub energy_unit: Option<String>,
    pub distance: Option<f64>,
    pub distance_unit: Option<String>,
    pub swim_stroke_value: Option<f64>,
    pub swim_stroke_unit: Option<String>,
    pub flights_climbed_value: Option<f64>,
    pub flights_climbed_unit: Option<String>,
    pub duration: Option<f64>,
    pub duration_unit: Option<String>,
    #[serde(default)]
    pub workout_events: Vec<serde_json::Value>,
    #[serde(default)]
    pub metadata: HashMap<String, serde_json::Value>,
    #[serde(flatten)]
    pub attribution: RawAttribution,
}

/// One sub-sample inside a raw correlation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawCorrelationSample {
    pub sample_type: String,
    pub value: f64,
    pub unit: Option<String>,
}

/// One raw correlation record (blood pressure pair, food entry)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawCorrelation {
    #[serde(rename = "UUID")]
    pub uuid: Option<String>,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub correlation_type: Option<String>,
    #[serde(default)]
    pub samples: Vec<RawCorrelationSample>,
    #[serde(default)]
    pub metadata: HashMap<String, serde_json::Value>,
    #[serde(flatten)]
    pub attribution: RawAttribution,
}

/// One window of a natively bucketed sum
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawAggregateBucket {
    #[serde(rename = "UUID")]
    pub uuid: Option<String>,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub quantity: f64,
}

/// One day of the native activity-ring summary
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawActivitySummary {
    #[serde(default = "epoch")]
    pub start_date: DateTime<Utc>,
    pub active_energy: Option<f64>,
    pub active_energy_goal: Option<f64>,
    pub apple_move_time: Option<f64>,
    pub apple_move_time_goal: Option<f64>,
    pub apple_stand_hours: Option<f64>,
    pub apple_stand_hours_goal: Option<f64>,
    pub apple_exercise_time: Option<f64>,
    pub apple_exercise_time_goal: Option<f64>,
}

/// One raw electrocardiogram recording
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawEcgSample {
    pub id: Option<String>,
    #[serde(default = "epoch")]
    pub start_date: DateTime<Utc>,
    #[serde(default = "epoch")]
    pub end_date: DateTime<Utc>,
    pub algorithm_version: Option<String>,
    pub average_heart_rate: Option<f64>,
    pub classification: Option<String>,
    pub sampling_frequency: Option<f64>,
    #[serde(flatten)]
    pub attribution: RawAttribution,
}

/// Save request for one plain sample
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveSampleRequest {
    pub sample_type: String,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    /// Quantity amount, for quantity types
    #[serde(skip_serializing_if = "Option::is_none")]
    pub amount: Option<f64>,
    /// Category value, for category types
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub metadata: HashMap<String, serde_json::Value>,
}

/// Save request for one workout session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveWorkoutRequest {
    pub activity_type: String,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub energy: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub energy_unit: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub distance: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub distance_unit: Option<String>,
    /// Do not implicitly request read permission alongside the write
    pub request_read_permission: bool,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub metadata: HashMap<String, serde_json::Value>,
}

/// One sub-sample of a correlation save
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CorrelationSampleSpec {
    pub sample_type: String,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub unit: String,
    pub amount: f64,
}

/// Save request for one correlation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveCorrelationRequest {
    pub correlation_type: String,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub samples: Vec<CorrelationSampleSpec>,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub metadata: HashMap<String, serde_json::Value>,
}

/// Delete request for samples of one native type in a range
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteSamplesRequest {
    pub sample_type: String,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
}

/// Contract this layer needs from the native health-store binding
#[async_trait]
pub trait HealthStore: Send + Sync {
    async fn is_available(&self) -> StoreResult<bool>;

    async fn read_gender(&self) -> StoreResult<String>;

    async fn read_date_of_birth(&self) -> StoreResult<NaiveDate>;

    /// Returns all workouts; the store does not filter by date, callers must
    async fn find_workouts(
        &self,
        start_date: DateTime<Utc>,
        end_date: DateTime<Utc>,
    ) -> StoreResult<Vec<RawWorkout>>;

    async fn query_sample_type(&self, query: &SampleQuery) -> StoreResult<Vec<RawSample>>;

    async fn query_correlation_type(
        &self,
        query: &CorrelationQuery,
    ) -> StoreResult<Vec<RawCorrelation>>;

    async fn query_aggregated(
        &self,
        query: &AggregatedQuery,
    ) -> StoreResult<Vec<RawAggregateBucket>>;

    async fn sum_quantity_type(&self, query: &SampleQuery) -> StoreResult<f64>;

    async fn query_activity_summary(
        &self,
        start_date: DateTime<Utc>,
        end_date: DateTime<Utc>,
    ) -> StoreResult<Vec<RawActivitySummary>>;

    async fn query_electrocardiogram(
        &self,
        start_date: DateTime<Utc>,
        end_date: DateTime<Utc>,
    ) -> StoreResult<Vec<RawEcgSample>>;

    async fn save_sample(&self, request: &SaveSampleRequest) -> StoreResult<()>;

    async fn save_workout(&self, request: &SaveWorkoutRequest) -> StoreResult<()>;

    async fn save_correlation(&self, request: &SaveCorrelationRequest) -> StoreResult<()>;

    async fn delete_samples(&self, request: &DeleteSamplesRequest) -> StoreResult<()>;

    async fn authorization_status(&self, native_type: &str) -> StoreResult<AuthorizationStatus>;

    async fn request_authorization(
        &self,
        read_types: &[String],
        write_types: &[String],
    ) -> StoreResult<()>;
}
