//! Core types for the bridge pipeline
//!
//! This module defines the value objects that flow between the stages:
//! query options, normalized samples with their closed set of value shapes,
//! aggregation buckets, and the records accepted by store/delete.
//!
//! Every entity here is created per request and owned by the caller that
//! receives it; nothing is shared or mutated after return.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::str::FromStr;

use crate::error::BridgeError;

/// Calendar granularity for aggregated queries.
///
/// Parsing an unknown width fails with [`BridgeError::UnrecognizedBucket`];
/// past that point an invalid bucket cannot be represented.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Bucket {
    Hour,
    Day,
    Week,
    Month,
    Year,
}

impl Bucket {
    pub fn as_str(&self) -> &'static str {
        match self {
            Bucket::Hour => "hour",
            Bucket::Day => "day",
            Bucket::Week => "week",
            Bucket::Month => "month",
            Bucket::Year => "year",
        }
    }
}

impl FromStr for Bucket {
    type Err = BridgeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "hour" => Ok(Bucket::Hour),
            "day" => Ok(Bucket::Day),
            "week" => Ok(Bucket::Week),
            "month" => Ok(Bucket::Month),
            "year" => Ok(Bucket::Year),
            other => Err(BridgeError::UnrecognizedBucket(other.to_string())),
        }
    }
}

/// Options for `query` and `queryAggregated`.
///
/// Invariant: `start_date <= end_date`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryOptions {
    /// Generic data type name (e.g. `steps`, `nutrition`, `blood_pressure`)
    pub data_type: String,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    /// Unit override; defaults to the registry unit for the type
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
    /// Bucket width; absent means a single summary window
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bucket: Option<Bucket>,
}

impl QueryOptions {
    pub fn new(
        data_type: impl Into<String>,
        start_date: DateTime<Utc>,
        end_date: DateTime<Utc>,
    ) -> Self {
        Self {
            data_type: data_type.into(),
            start_date,
            end_date,
            unit: None,
            bucket: None,
        }
    }

    pub fn with_bucket(mut self, bucket: Bucket) -> Self {
        self.bucket = Some(bucket);
        self
    }

    pub fn with_unit(mut self, unit: impl Into<String>) -> Self {
        self.unit = Some(unit.into());
        self
    }
}

/// One entry of a read/write type request.
///
/// The request is either a bare name (authorized for both read and write) or
/// independent read/write name lists.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AccessScope {
    Name(String),
    ReadWrite {
        #[serde(default)]
        read: Vec<String>,
        #[serde(default)]
        write: Vec<String>,
    },
}

impl From<&str> for AccessScope {
    fn from(name: &str) -> Self {
        AccessScope::Name(name.to_string())
    }
}

/// Catalog entry returned by `getAvailableDataTypes`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataTypeEntry {
    pub data_type: String,
    pub native_equivalent: String,
    pub unit: String,
}

/// Blood glucose reading with optional meal/sleep context
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BloodGlucoseValue {
    pub glucose: f64,
    /// Meal-time classification (e.g. `before_meal`, `after_meal`)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meal: Option<String>,
    /// Sleep-time classification
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sleep: Option<String>,
    /// Measurement source (e.g. capillary blood)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
}

/// Insulin delivery with optional delivery-reason classification
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InsulinValue {
    pub insulin: f64,
    /// Delivery reason (`basal` or `bolus`)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// Date of birth split into calendar parts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateOfBirthValue {
    pub day: u32,
    pub month: u32,
    pub year: i32,
}

/// Workout sample fields carried through normalization
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkoutValue {
    /// Generic activity name (e.g. `running`)
    pub activity: String,
    /// Native workout activity identifier
    #[serde(skip_serializing_if = "Option::is_none")]
    pub native_activity: Option<String>,
    /// Human-readable activity label derived from the native identifier
    #[serde(skip_serializing_if = "Option::is_none")]
    pub activity_label: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_unit: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub energy: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub energy_unit: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub distance: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub distance_unit: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub swim_strokes: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub swim_stroke_unit: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub flights_climbed: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub flights_climbed_unit: Option<String>,
    /// Pause/resume and segment events reported by the store
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub workout_events: Vec<serde_json::Value>,
}

/// Nutrition correlation expanded into per-nutrient amounts
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct NutritionValue {
    /// Food item name
    #[serde(skip_serializing_if = "Option::is_none")]
    pub item: Option<String>,
    /// Meal type (breakfast, lunch, ...)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meal_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub brand_name: Option<String>,
    /// Amounts keyed by generic nutrient name, in the nutrient's registry unit
    #[serde(default)]
    pub nutrients: HashMap<String, f64>,
}

/// Blood pressure correlation pair
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct BloodPressureValue {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub systolic: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub diastolic: Option<f64>,
}

/// Daily activity-ring summary with goal/achieved pairs.
///
/// Units are fixed by the native store: kcal, min, count and sec respectively.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivitySummaryValue {
    pub active_energy: Option<f64>,
    pub active_energy_goal: Option<f64>,
    pub active_energy_unit: String,
    pub apple_move_time: Option<f64>,
    pub apple_move_time_goal: Option<f64>,
    pub apple_move_time_unit: String,
    pub apple_stand_hours: Option<f64>,
    pub apple_stand_hours_goal: Option<f64>,
    pub apple_stand_hours_unit: String,
    pub apple_exercise_time: Option<f64>,
    pub apple_exercise_time_goal: Option<f64>,
    pub apple_exercise_time_unit: String,
}

/// Electrocardiogram sample fields
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EcgValue {
    pub classification: String,
    pub algorithm_version: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub average_heart_rate: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sampling_frequency: Option<f64>,
}

/// Closed set of value shapes a normalized sample can carry.
///
/// Untagged on the wire: scalars and strings serialize bare, structured
/// values as objects.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SampleValue {
    Scalar(f64),
    Text(String),
    Date(DateOfBirthValue),
    BloodGlucose(BloodGlucoseValue),
    Insulin(InsulinValue),
    Workout(WorkoutValue),
    Nutrition(NutritionValue),
    BloodPressure(BloodPressureValue),
    ActivitySummary(ActivitySummaryValue),
    Electrocardiogram(EcgValue),
}

/// Source application attribution, defaulted to empty strings when absent
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceInfo {
    pub source_name: String,
    pub source_version: String,
    pub source_bundle_id: String,
    pub source_product_type: String,
    /// Reassembled `major.minor.patch`; empty when no part was reported
    pub source_os_version: String,
}

/// Recording device attribution, defaulted to empty strings when absent
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceInfo {
    pub device_name: String,
    pub device_model: String,
    pub device_manufacturer: String,
    pub device_local_identifier: String,
    pub device_hardware_version: String,
    pub device_software_version: String,
    pub device_firmware_version: String,
    #[serde(rename = "deviceFDA_UDI")]
    pub device_fda_udi: String,
}

/// Uniform output record produced for every query, regardless of the native
/// shape the sample came from
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NormalizedSample {
    pub id: String,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    /// Native identifier the record was read as
    pub native_measure_name: String,
    /// Human-readable name derived from the native identifier
    pub measure_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<SampleValue>,
    /// Result label for category types with an enumerated code table
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
    #[serde(flatten)]
    pub source: SourceInfo,
    #[serde(flatten)]
    pub device: DeviceInfo,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub metadata: HashMap<String, serde_json::Value>,
}

/// Per-activity totals accumulated by the activity merge rule.
///
/// Duration is in seconds; distance and calories in the sample units.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ActivityTotals {
    pub duration: f64,
    pub distance: f64,
    pub calories: f64,
}

/// Aggregated value keyed by sub-category, or a single scalar sum
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AggregateValue {
    Scalar(f64),
    Activity(HashMap<String, ActivityTotals>),
    Nutrition(HashMap<String, f64>),
}

/// A time window `[start, end)` with its aggregated value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AggregationBucket {
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub value: AggregateValue,
    pub unit: String,
}

/// Result of `queryAggregated`: one summary window, or a bucket sequence
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AggregateResult {
    Summary(AggregationBucket),
    Buckets(Vec<AggregationBucket>),
}

/// Value shapes accepted by `store`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StoreValue {
    Scalar(f64),
    Text(String),
    BloodGlucose(BloodGlucoseValue),
    Insulin(InsulinValue),
    Nutrition(NutritionValue),
    BloodPressure(BloodPressureValue),
}

/// Record accepted by `store`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreRecord {
    pub data_type: String,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub value: StoreValue,
    /// Workout energy, kcal
    #[serde(skip_serializing_if = "Option::is_none")]
    pub calories: Option<f64>,
    /// Workout distance, meters
    #[serde(skip_serializing_if = "Option::is_none")]
    pub distance: Option<f64>,
    /// Route `distance` writes to the cycling identifier
    #[serde(default)]
    pub cycling: bool,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub metadata: HashMap<String, serde_json::Value>,
}

impl StoreRecord {
    pub fn new(
        data_type: impl Into<String>,
        start_date: DateTime<Utc>,
        end_date: DateTime<Utc>,
        value: StoreValue,
    ) -> Self {
        Self {
            data_type: data_type.into(),
            start_date,
            end_date,
            value,
            calories: None,
            distance: None,
            cycling: false,
            metadata: HashMap::new(),
        }
    }
}

/// Record accepted by `delete`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteRecord {
    pub data_type: String,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    /// Sample value, used to route `activity` deletes carrying `sleep*` values
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    #[serde(default)]
    pub cycling: bool,
}
