//! Store and delete
//!
//! Maps generic write records onto the save primitive their type family
//! needs: plain samples, workout sessions, sleep category samples and
//! correlation groups. Characteristics are rejected up front; everything else
//! is one boundary call per record.

use std::collections::HashMap;

use tracing::debug;

use crate::bridge::HealthBridge;
use crate::error::BridgeError;
use crate::registry::{idents, metadata_keys, sleep_values, DataTypeDescriptor, TypeFamily};
use crate::store::{
    CorrelationSampleSpec, DeleteSamplesRequest, HealthStore, SaveCorrelationRequest,
    SaveSampleRequest, SaveWorkoutRequest,
};
use crate::types::{DeleteRecord, NutritionValue, StoreRecord, StoreValue};

/// Native sleep-analysis value for a generic sleep label.
///
/// Only the enumerated labels count as sleep; sleep stages all store as
/// plain asleep because the native type has no finer category values.
/// Anything else is an ordinary activity name.
fn sleep_value(label: &str) -> Option<&'static str> {
    match label {
        "sleep" | "sleep.light" | "sleep.deep" | "sleep.rem" => Some(sleep_values::ASLEEP),
        "sleep.inBed" => Some(sleep_values::IN_BED),
        "sleep.awake" => Some(sleep_values::AWAKE),
        _ => None,
    }
}

impl<S: HealthStore> HealthBridge<S> {
    /// Persist one record into the native store.
    ///
    /// Characteristics fail with [`BridgeError::NotWritable`]; value shapes
    /// that do not fit the data type fail the same way.
    pub async fn store(&self, record: &StoreRecord) -> Result<(), BridgeError> {
        let descriptor = self
            .registry
            .descriptor(&record.data_type)
            .ok_or_else(|| BridgeError::UnknownDataType(record.data_type.clone()))?;
        if descriptor.family == TypeFamily::Characteristic {
            return Err(BridgeError::NotWritable(record.data_type.clone()));
        }
        debug!(data_type = %record.data_type, "storing record");

        match (descriptor.family, record.data_type.as_str()) {
            (TypeFamily::Workout, _) => self.store_activity(record).await,
            (_, "nutrition") => self.store_nutrition(record).await,
            (_, "blood_pressure") => self.store_blood_pressure(record).await,
            (_, "blood_glucose") => self.store_blood_glucose(record, descriptor).await,
            (_, "insulin") => self.store_insulin(record, descriptor).await,
            _ => self.store_plain(record, descriptor).await,
        }
    }

    /// Workout-family records carry the activity as a text value. Sleep
    /// labels route to a sleep-analysis category sample, anything else to a
    /// workout session.
    async fn store_activity(&self, record: &StoreRecord) -> Result<(), BridgeError> {
        let StoreValue::Text(label) = &record.value else {
            return Err(BridgeError::NotWritable(record.data_type.clone()));
        };

        if let Some(value) = sleep_value(label) {
            self.store
                .save_sample(&SaveSampleRequest {
                    sample_type: idents::SLEEP_ANALYSIS.to_string(),
                    start_date: record.start_date,
                    end_date: record.end_date,
                    amount: None,
                    value: Some(value.to_string()),
                    unit: None,
                    metadata: record.metadata.clone(),
                })
                .await?;
            return Ok(());
        }

        self.store
            .save_workout(&SaveWorkoutRequest {
                activity_type: label.clone(),
                start_date: record.start_date,
                end_date: record.end_date,
                energy: record.calories,
                energy_unit: record.calories.map(|_| "kcal".to_string()),
                distance: record.distance,
                distance_unit: record.distance.map(|_| "m".to_string()),
                request_read_permission: false,
                metadata: record.metadata.clone(),
            })
            .await?;
        Ok(())
    }

    async fn store_nutrition(&self, record: &StoreRecord) -> Result<(), BridgeError> {
        let StoreValue::Nutrition(value) = &record.value else {
            return Err(BridgeError::NotWritable(record.data_type.clone()));
        };

        let mut samples = Vec::with_capacity(value.nutrients.len());
        for (name, amount) in &value.nutrients {
            let nutrient = self
                .registry
                .descriptor(name)
                .filter(|d| d.name.starts_with("nutrition."))
                .ok_or_else(|| BridgeError::UnknownNutrient(name.clone()))?;
            samples.push(CorrelationSampleSpec {
                sample_type: nutrient.primary_native().to_string(),
                start_date: record.start_date,
                end_date: record.end_date,
                unit: nutrient.unit().unwrap_or("g").to_string(),
                amount: *amount,
            });
        }

        self.store
            .save_correlation(&SaveCorrelationRequest {
                correlation_type: idents::FOOD_CORRELATION.to_string(),
                start_date: record.start_date,
                end_date: record.end_date,
                samples,
                metadata: food_metadata(value, &record.metadata),
            })
            .await?;
        Ok(())
    }

    /// Either half of the pair may be absent; only present halves are saved
    async fn store_blood_pressure(&self, record: &StoreRecord) -> Result<(), BridgeError> {
        let StoreValue::BloodPressure(value) = &record.value else {
            return Err(BridgeError::NotWritable(record.data_type.clone()));
        };

        let mut samples = Vec::new();
        for (sample_type, amount) in [
            (idents::BP_SYSTOLIC, value.systolic),
            (idents::BP_DIASTOLIC, value.diastolic),
        ] {
            if let Some(amount) = amount {
                samples.push(CorrelationSampleSpec {
                    sample_type: sample_type.to_string(),
                    start_date: record.start_date,
                    end_date: record.end_date,
                    unit: "mmHg".to_string(),
                    amount,
                });
            }
        }

        self.store
            .save_correlation(&SaveCorrelationRequest {
                correlation_type: idents::BP_CORRELATION.to_string(),
                start_date: record.start_date,
                end_date: record.end_date,
                samples,
                metadata: record.metadata.clone(),
            })
            .await?;
        Ok(())
    }

    /// Classifications are written under both the specific string key and the
    /// legacy numeric code so older readers keep working
    async fn store_blood_glucose(
        &self,
        record: &StoreRecord,
        descriptor: &DataTypeDescriptor,
    ) -> Result<(), BridgeError> {
        let StoreValue::BloodGlucose(value) = &record.value else {
            return Err(BridgeError::NotWritable(record.data_type.clone()));
        };

        let mut metadata = record.metadata.clone();
        if let Some(meal) = &value.meal {
            metadata.insert(
                metadata_keys::GLUCOSE_MEAL_TIME.to_string(),
                serde_json::json!(meal),
            );
            // The legacy numeric code exists only for the recognized
            // classifications; anything else is written under the specific
            // key alone.
            let legacy = if meal.starts_with("before_") {
                Some(1)
            } else if meal.starts_with("after_") {
                Some(2)
            } else {
                None
            };
            if let Some(legacy) = legacy {
                metadata.insert(
                    metadata_keys::GLUCOSE_MEAL_TIME_LEGACY.to_string(),
                    serde_json::json!(legacy),
                );
            }
        }
        if let Some(sleep) = &value.sleep {
            metadata.insert(
                metadata_keys::GLUCOSE_SLEEP_TIME.to_string(),
                serde_json::json!(sleep),
            );
        }
        if let Some(source) = &value.source {
            metadata.insert(
                metadata_keys::GLUCOSE_SOURCE.to_string(),
                serde_json::json!(source),
            );
        }

        self.store
            .save_sample(&SaveSampleRequest {
                sample_type: descriptor.primary_native().to_string(),
                start_date: record.start_date,
                end_date: record.end_date,
                amount: Some(value.glucose),
                value: None,
                unit: descriptor.unit().map(String::from),
                metadata,
            })
            .await?;
        Ok(())
    }

    async fn store_insulin(
        &self,
        record: &StoreRecord,
        descriptor: &DataTypeDescriptor,
    ) -> Result<(), BridgeError> {
        let StoreValue::Insulin(value) = &record.value else {
            return Err(BridgeError::NotWritable(record.data_type.clone()));
        };

        let mut metadata = record.metadata.clone();
        if let Some(reason) = &value.reason {
            metadata.insert(
                metadata_keys::INSULIN_REASON.to_string(),
                serde_json::json!(reason),
            );
            let legacy = if reason.eq_ignore_ascii_case("basal") {
                Some(1)
            } else if reason.eq_ignore_ascii_case("bolus") {
                Some(2)
            } else {
                None
            };
            if let Some(legacy) = legacy {
                metadata.insert(
                    metadata_keys::INSULIN_REASON_LEGACY.to_string(),
                    serde_json::json!(legacy),
                );
            }
        }

        self.store
            .save_sample(&SaveSampleRequest {
                sample_type: descriptor.primary_native().to_string(),
                start_date: record.start_date,
                end_date: record.end_date,
                amount: Some(value.insulin),
                value: None,
                unit: descriptor.unit().map(String::from),
                metadata,
            })
            .await?;
        Ok(())
    }

    async fn store_plain(
        &self,
        record: &StoreRecord,
        descriptor: &DataTypeDescriptor,
    ) -> Result<(), BridgeError> {
        let sample_type = if record.data_type == "distance" && record.cycling {
            idents::DISTANCE_CYCLING
        } else {
            descriptor.primary_native()
        };

        let (amount, value) = match &record.value {
            StoreValue::Scalar(n) => (Some(*n), None),
            StoreValue::Text(t) => (None, Some(t.clone())),
            _ => return Err(BridgeError::NotWritable(record.data_type.clone())),
        };

        self.store
            .save_sample(&SaveSampleRequest {
                sample_type: sample_type.to_string(),
                start_date: record.start_date,
                end_date: record.end_date,
                amount,
                value,
                unit: descriptor.unit().map(String::from),
                metadata: record.metadata.clone(),
            })
            .await?;
        Ok(())
    }

    /// Delete all samples of one generic type in a date range.
    ///
    /// Routing follows the record, not just the type: an `activity` delete
    /// carrying a `sleep*` value targets the sleep-analysis type, and a
    /// cycling `distance` delete targets the cycling identifier.
    pub async fn delete(&self, record: &DeleteRecord) -> Result<(), BridgeError> {
        let descriptor = self
            .registry
            .descriptor(&record.data_type)
            .ok_or_else(|| BridgeError::UnknownDataType(record.data_type.clone()))?;
        if descriptor.family == TypeFamily::Characteristic {
            return Err(BridgeError::NotDeletable(record.data_type.clone()));
        }
        debug!(data_type = %record.data_type, "deleting samples");

        let sleeping = record
            .value
            .as_deref()
            .is_some_and(|v| v.starts_with("sleep"));
        let sample_type = if descriptor.family == TypeFamily::Workout && sleeping {
            idents::SLEEP_ANALYSIS
        } else if record.data_type == "distance" && record.cycling {
            idents::DISTANCE_CYCLING
        } else {
            descriptor.primary_native()
        };

        self.store
            .delete_samples(&DeleteSamplesRequest {
                sample_type: sample_type.to_string(),
                start_date: record.start_date,
                end_date: record.end_date,
            })
            .await?;
        Ok(())
    }
}

/// Food item metadata merged over the caller's metadata
fn food_metadata(
    value: &NutritionValue,
    base: &HashMap<String, serde_json::Value>,
) -> HashMap<String, serde_json::Value> {
    let mut metadata = base.clone();
    if let Some(item) = &value.item {
        metadata.insert(metadata_keys::FOOD_TYPE.to_string(), serde_json::json!(item));
    }
    if let Some(meal_type) = &value.meal_type {
        metadata.insert(metadata_keys::FOOD_MEAL.to_string(), serde_json::json!(meal_type));
    }
    if let Some(brand) = &value.brand_name {
        metadata.insert(
            metadata_keys::FOOD_BRAND_NAME.to_string(),
            serde_json::json!(brand),
        );
    }
    metadata
}
