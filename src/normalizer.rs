//! Result normalization
//!
//! Maps every raw native record onto the uniform [`NormalizedSample`] schema:
//! stable identifier, date coercion, human-readable measure name derived from
//! the native identifier, value extraction per data-type family, and
//! source/device attribution with empty-string defaults.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::registry::{idents, metadata_keys, TypeRegistry};
use crate::store::{
    RawActivitySummary, RawAttribution, RawCorrelation, RawEcgSample, RawSample, RawValue,
    RawWorkout,
};
use crate::types::{
    ActivitySummaryValue, BloodGlucoseValue, BloodPressureValue, DeviceInfo, EcgValue,
    InsulinValue, NormalizedSample, NutritionValue, SampleValue, SourceInfo, WorkoutValue,
};

/// Native identifier prefixes stripped when deriving a measure name
const NATIVE_PREFIXES: [&str; 6] = [
    "HKCategoryTypeIdentifier",
    "HKQuantityTypeIdentifier",
    "HKCharacteristicTypeIdentifier",
    "HKCorrelationTypeIdentifier",
    "HKWorkoutTypeIdentifier",
    "HKWorkoutActivityType",
];

/// Derives a human-readable name from a native identifier by stripping a
/// known prefix and splitting on capitalization boundaries
/// (`HKQuantityTypeIdentifierStepCount` → `Step Count`).
///
/// Returns `None` when no known prefix matches.
pub fn formatted_name(native: &str) -> Option<String> {
    let trimmed = NATIVE_PREFIXES
        .iter()
        .find(|prefix| native.starts_with(*prefix))
        .map(|prefix| &native[prefix.len()..])?;

    // Words are uppercase-letter-plus-lowercase-run sequences; anything else
    // (digits, acronym tails) is skipped.
    let mut words: Vec<String> = Vec::new();
    let chars: Vec<char> = trimmed.chars().collect();
    let mut i = 0;
    while i < chars.len() {
        if chars[i].is_ascii_uppercase()
            && chars.get(i + 1).is_some_and(|c| c.is_ascii_lowercase())
        {
            let mut word = String::new();
            word.push(chars[i]);
            i += 1;
            while i < chars.len() && chars[i].is_ascii_lowercase() {
                word.push(chars[i]);
                i += 1;
            }
            words.push(word);
        } else {
            i += 1;
        }
    }
    Some(words.join(" "))
}

/// Reassembles `major.minor.patch` from the parts the store reported,
/// keeping only parts that are present
fn os_version(attribution: &RawAttribution) -> String {
    [
        attribution.source_os_version_major,
        attribution.source_os_version_minor,
        attribution.source_os_version_patch,
    ]
    .iter()
    .flatten()
    .map(u32::to_string)
    .collect::<Vec<_>>()
    .join(".")
}

fn opt(value: &Option<String>) -> String {
    value.clone().unwrap_or_default()
}

fn attribution(raw: &RawAttribution) -> (SourceInfo, DeviceInfo) {
    let source = SourceInfo {
        source_name: opt(&raw.source_name),
        source_version: opt(&raw.source_version),
        source_bundle_id: opt(&raw.source_bundle_id),
        source_product_type: opt(&raw.source_product_type),
        source_os_version: os_version(raw),
    };
    let device = DeviceInfo {
        device_name: opt(&raw.device_name),
        device_model: opt(&raw.device_model),
        device_manufacturer: opt(&raw.device_manufacturer),
        device_local_identifier: opt(&raw.device_local_identifier),
        device_hardware_version: opt(&raw.device_hardware_version),
        device_software_version: opt(&raw.device_software_version),
        device_firmware_version: opt(&raw.device_firmware_version),
        device_fda_udi: opt(&raw.udi),
    };
    (source, device)
}

fn fresh_id(uuid: &Option<String>) -> String {
    uuid.clone().unwrap_or_else(|| Uuid::new_v4().to_string())
}

fn metadata_str(
    metadata: &std::collections::HashMap<String, serde_json::Value>,
    key: &str,
) -> Option<String> {
    metadata.get(key).and_then(|v| v.as_str()).map(String::from)
}

fn metadata_num(
    metadata: &std::collections::HashMap<String, serde_json::Value>,
    key: &str,
) -> Option<i64> {
    metadata.get(key).and_then(serde_json::Value::as_i64)
}

/// Per-record transform from raw native shapes to [`NormalizedSample`]
pub struct Normalizer<'a> {
    registry: &'a TypeRegistry,
}

impl<'a> Normalizer<'a> {
    pub fn new(registry: &'a TypeRegistry) -> Self {
        Self { registry }
    }

    /// Normalize one raw sample of the given generic type.
    ///
    /// `fallback_unit` is used when the record itself carries no unit.
    pub fn sample(
        &self,
        raw: &RawSample,
        data_type: &str,
        fallback_unit: Option<&str>,
    ) -> NormalizedSample {
        let native_name = raw
            .category_type
            .clone()
            .or_else(|| raw.quantity_type.clone())
            .or_else(|| raw.correlation_type.clone())
            .unwrap_or_default();

        let (value, result) = self.extract_value(raw, data_type);
        let (source, device) = attribution(&raw.attribution);

        NormalizedSample {
            id: fresh_id(&raw.uuid),
            start_date: raw.start_date,
            end_date: raw.end_date,
            measure_name: formatted_name(&native_name).unwrap_or_default(),
            native_measure_name: native_name,
            value,
            result,
            unit: raw.unit.clone().or_else(|| fallback_unit.map(String::from)),
            source,
            device,
            metadata: raw.metadata.clone(),
        }
    }

    fn extract_value(
        &self,
        raw: &RawSample,
        data_type: &str,
    ) -> (Option<SampleValue>, Option<String>) {
        match data_type {
            "blood_glucose" => {
                // The specific string key overrides the legacy numeric code
                // when both are present.
                let mut meal = metadata_num(&raw.metadata, metadata_keys::GLUCOSE_MEAL_TIME_LEGACY)
                    .map(|code| {
                        if code == 1 {
                            "before_meal".to_string()
                        } else {
                            "after_meal".to_string()
                        }
                    });
                if let Some(specific) = metadata_str(&raw.metadata, metadata_keys::GLUCOSE_MEAL_TIME)
                {
                    meal = Some(specific);
                }
                let value = BloodGlucoseValue {
                    glucose: raw.quantity.unwrap_or_default(),
                    meal,
                    sleep: metadata_str(&raw.metadata, metadata_keys::GLUCOSE_SLEEP_TIME),
                    source: metadata_str(&raw.metadata, metadata_keys::GLUCOSE_SOURCE),
                };
                (Some(SampleValue::BloodGlucose(value)), None)
            }
            "insulin" => {
                let mut reason = metadata_num(&raw.metadata, metadata_keys::INSULIN_REASON_LEGACY)
                    .map(|code| {
                        if code == 1 {
                            "basal".to_string()
                        } else {
                            "bolus".to_string()
                        }
                    });
                if let Some(specific) = metadata_str(&raw.metadata, metadata_keys::INSULIN_REASON) {
                    reason = Some(specific);
                }
                let value = InsulinValue {
                    insulin: raw.quantity.unwrap_or_default(),
                    reason,
                };
                (Some(SampleValue::Insulin(value)), None)
            }
            _ => {
                if let Some(codes) = self.registry.category_codes(data_type) {
                    if let Some(RawValue::Number(n)) = &raw.value {
                        if let Some(code) = codes.iter().find(|c| c.code == *n as i64) {
                            return (
                                Some(SampleValue::Text(code.category_key.to_string())),
                                Some(code.label.to_string()),
                            );
                        }
                    }
                }
                let mut value = raw.quantity.map(SampleValue::Scalar);
                match &raw.value {
                    Some(RawValue::Number(n)) => value = Some(SampleValue::Scalar(*n)),
                    Some(RawValue::Text(t)) => value = Some(SampleValue::Text(t.clone())),
                    None => {}
                }
                (value, None)
            }
        }
    }

    /// Normalize one sleep-analysis sample appended to an `activity` query.
    ///
    /// The native 0/1/other code becomes `sleep.inBed` / `sleep` /
    /// `sleep.awake`.
    pub fn sleep_sample(&self, raw: &RawSample) -> NormalizedSample {
        let label = match &raw.value {
            Some(RawValue::Number(n)) if *n == 0.0 => "sleep.inBed",
            Some(RawValue::Number(n)) if *n == 1.0 => "sleep",
            _ => "sleep.awake",
        };
        let (source, device) = attribution(&raw.attribution);

        NormalizedSample {
            id: fresh_id(&raw.uuid),
            start_date: raw.start_date,
            end_date: raw.end_date,
            native_measure_name: idents::SLEEP_ANALYSIS.to_string(),
            measure_name: formatted_name(idents::SLEEP_ANALYSIS).unwrap_or_default(),
            value: Some(SampleValue::Text(label.to_string())),
            result: None,
            unit: Some("activityType".to_string()),
            source,
            device,
            metadata: raw.metadata.clone(),
        }
    }

    /// Normalize one workout session
    pub fn workout(&self, raw: &RawWorkout) -> NormalizedSample {
        let (source, device) = attribution(&raw.attribution);
        let activity = raw.activity_type.clone().unwrap_or_default();
        let value = WorkoutValue {
            activity: activity.clone(),
            activity_label: raw
                .native_activity_type
                .as_deref()
                .and_then(formatted_name),
            native_activity: raw.native_activity_type.clone(),
            duration: raw.duration,
            duration_unit: raw.duration_unit.clone(),
            energy: raw.energy,
            energy_unit: raw.energy_unit.clone(),
            distance: raw.distance,
            distance_unit: raw.distance_unit.clone(),
            swim_strokes: raw.swim_stroke_value,
            swim_stroke_unit: raw.swim_stroke_unit.clone(),
            flights_climbed: raw.flights_climbed_value,
            flights_climbed_unit: raw.flights_climbed_unit.clone(),
            workout_events: raw.workout_events.clone(),
        };

        NormalizedSample {
            id: fresh_id(&raw.uuid),
            start_date: raw.start_date,
            end_date: raw.end_date,
            native_measure_name: idents::WORKOUT_TYPE.to_string(),
            measure_name: activity,
            value: Some(SampleValue::Workout(value)),
            result: None,
            unit: Some("activityType".to_string()),
            source,
            device,
            metadata: raw.metadata.clone(),
        }
    }

    /// Normalize one correlation record, expanding its sub-samples.
    ///
    /// Nutrition correlations yield a per-nutrient map keyed by generic
    /// nutrient names with gram-based unit conversion applied; blood pressure
    /// yields the systolic/diastolic pair.
    pub fn correlation(&self, raw: &RawCorrelation, data_type: &str) -> NormalizedSample {
        let (source, device) = attribution(&raw.attribution);
        let native_name = raw
            .correlation_type
            .clone()
            .unwrap_or_else(|| self.registry.primary_native(data_type).unwrap_or("").to_string());

        let (value, unit) = if data_type == "nutrition" {
            let mut nutrition = NutritionValue {
                item: metadata_str(&raw.metadata, metadata_keys::FOOD_TYPE),
                meal_type: metadata_str(&raw.metadata, metadata_keys::FOOD_MEAL),
                brand_name: metadata_str(&raw.metadata, metadata_keys::FOOD_BRAND_NAME),
                nutrients: std::collections::HashMap::new(),
            };
            for sub in &raw.samples {
                if let Some(nutrient) = self.registry.nutrient_for_native(&sub.sample_type) {
                    let unit = nutrient.unit().unwrap_or("g");
                    nutrition
                        .nutrients
                        .insert(nutrient.name.to_string(), crate::registry::convert_from_grams(unit, sub.value));
                }
            }
            (SampleValue::Nutrition(nutrition), "nutrition")
        } else {
            let mut pressure = BloodPressureValue::default();
            for sub in &raw.samples {
                if sub.sample_type == idents::BP_SYSTOLIC {
                    pressure.systolic = Some(sub.value);
                }
                if sub.sample_type == idents::BP_DIASTOLIC {
                    pressure.diastolic = Some(sub.value);
                }
            }
            (SampleValue::BloodPressure(pressure), "mmHg")
        };

        NormalizedSample {
            id: fresh_id(&raw.uuid),
            start_date: raw.start_date,
            end_date: raw.end_date,
            measure_name: formatted_name(&native_name).unwrap_or_default(),
            native_measure_name: native_name,
            value: Some(value),
            result: None,
            unit: Some(unit.to_string()),
            source,
            device,
            metadata: raw.metadata.clone(),
        }
    }

    /// Normalize one activity-ring summary day.
    ///
    /// Metric units are fixed by the native store.
    pub fn activity_summary(&self, raw: &RawActivitySummary) -> NormalizedSample {
        let value = ActivitySummaryValue {
            active_energy: raw.active_energy,
            active_energy_goal: raw.active_energy_goal,
            active_energy_unit: "kcal".to_string(),
            apple_move_time: raw.apple_move_time,
            apple_move_time_goal: raw.apple_move_time_goal,
            apple_move_time_unit: "min".to_string(),
            apple_stand_hours: raw.apple_stand_hours,
            apple_stand_hours_goal: raw.apple_stand_hours_goal,
            apple_stand_hours_unit: "count".to_string(),
            apple_exercise_time: raw.apple_exercise_time,
            apple_exercise_time_goal: raw.apple_exercise_time_goal,
            apple_exercise_time_unit: "sec".to_string(),
        };

        NormalizedSample {
            id: Uuid::new_v4().to_string(),
            start_date: raw.start_date,
            end_date: raw.start_date,
            native_measure_name: "HKActivitySummaryType".to_string(),
            measure_name: "Activity Summary".to_string(),
            value: Some(SampleValue::ActivitySummary(value)),
            result: None,
            unit: None,
            source: SourceInfo::default(),
            device: DeviceInfo::default(),
            metadata: std::collections::HashMap::new(),
        }
    }

    /// Normalize one electrocardiogram recording
    pub fn electrocardiogram(&self, raw: &RawEcgSample) -> NormalizedSample {
        let (source, device) = attribution(&raw.attribution);
        let value = EcgValue {
            classification: raw.classification.clone().unwrap_or_default(),
            algorithm_version: raw.algorithm_version.clone().unwrap_or_default(),
            average_heart_rate: raw.average_heart_rate,
            sampling_frequency: raw.sampling_frequency,
        };

        NormalizedSample {
            id: raw.id.clone().unwrap_or_default(),
            start_date: raw.start_date,
            end_date: raw.end_date,
            native_measure_name: "HKDataTypeIdentifierElectrocardiogram".to_string(),
            measure_name: "Electrocardiogram".to_string(),
            value: Some(SampleValue::Electrocardiogram(value)),
            result: None,
            unit: None,
            source,
            device,
            metadata: std::collections::HashMap::new(),
        }
    }

    /// Wrap a characteristic read (gender, date of birth) into a one-element
    /// result stamped with the requested range and the fixed source identity
    /// of the native health app
    pub fn characteristic(
        &self,
        value: SampleValue,
        native_name: &str,
        start_date: DateTime<Utc>,
        end_date: DateTime<Utc>,
    ) -> NormalizedSample {
        NormalizedSample {
            id: Uuid::new_v4().to_string(),
            start_date,
            end_date,
            measure_name: formatted_name(native_name).unwrap_or_default(),
            native_measure_name: native_name.to_string(),
            value: Some(value),
            result: None,
            unit: None,
            source: SourceInfo {
                source_name: "Health".to_string(),
                source_bundle_id: "com.apple.Health".to_string(),
                ..SourceInfo::default()
            },
            device: DeviceInfo::default(),
            metadata: std::collections::HashMap::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::RawCorrelationSample;
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;

    fn registry() -> TypeRegistry {
        TypeRegistry::new()
    }

    fn make_raw_sample() -> RawSample {
        RawSample {
            uuid: Some("sample-1".to_string()),
            start_date: Utc.with_ymd_and_hms(2024, 1, 1, 8, 0, 0).unwrap(),
            end_date: Utc.with_ymd_and_hms(2024, 1, 1, 9, 0, 0).unwrap(),
            quantity: Some(412.0),
            quantity_type: Some("HKQuantityTypeIdentifierStepCount".to_string()),
            ..RawSample::default()
        }
    }

    #[test]
    fn formats_native_identifiers() {
        assert_eq!(
            formatted_name("HKQuantityTypeIdentifierStepCount").as_deref(),
            Some("Step Count")
        );
        assert_eq!(
            formatted_name("HKCharacteristicTypeIdentifierBiologicalSex").as_deref(),
            Some("Biological Sex")
        );
        assert_eq!(
            formatted_name("HKWorkoutActivityTypeRunning").as_deref(),
            Some("Running")
        );
        assert_eq!(formatted_name("NotANativeIdentifier"), None);
    }

    #[test]
    fn os_version_uses_only_present_parts() {
        let mut attribution = RawAttribution::default();
        assert_eq!(os_version(&attribution), "");

        attribution.source_os_version_major = Some(17);
        attribution.source_os_version_minor = Some(2);
        attribution.source_os_version_patch = Some(1);
        assert_eq!(os_version(&attribution), "17.2.1");

        attribution.source_os_version_patch = None;
        assert_eq!(os_version(&attribution), "17.2");
    }

    #[test]
    fn quantity_sample_becomes_scalar_with_fallback_unit() {
        let registry = registry();
        let normalizer = Normalizer::new(&registry);
        let sample = normalizer.sample(&make_raw_sample(), "steps", Some("count"));

        assert_eq!(sample.id, "sample-1");
        assert_eq!(sample.measure_name, "Step Count");
        assert_eq!(sample.value, Some(SampleValue::Scalar(412.0)));
        assert_eq!(sample.unit.as_deref(), Some("count"));
        assert_eq!(sample.source.source_name, "");
    }

    #[test]
    fn record_unit_wins_over_fallback() {
        let registry = registry();
        let normalizer = Normalizer::new(&registry);
        let mut raw = make_raw_sample();
        raw.unit = Some("count".to_string());
        let sample = normalizer.sample(&raw, "steps", Some("other"));
        assert_eq!(sample.unit.as_deref(), Some("count"));
    }

    #[test]
    fn glucose_specific_key_overrides_legacy_code() {
        let registry = registry();
        let normalizer = Normalizer::new(&registry);
        let mut raw = make_raw_sample();
        raw.quantity = Some(5.5);
        raw.metadata.insert(
            metadata_keys::GLUCOSE_MEAL_TIME_LEGACY.to_string(),
            serde_json::json!(2),
        );
        raw.metadata.insert(
            metadata_keys::GLUCOSE_MEAL_TIME.to_string(),
            serde_json::json!("before_breakfast"),
        );

        let sample = normalizer.sample(&raw, "blood_glucose", None);
        match sample.value {
            Some(SampleValue::BloodGlucose(v)) => {
                assert_eq!(v.glucose, 5.5);
                assert_eq!(v.meal.as_deref(), Some("before_breakfast"));
            }
            other => panic!("expected blood glucose value, got {other:?}"),
        }
    }

    #[test]
    fn glucose_legacy_code_alone_is_translated() {
        let registry = registry();
        let normalizer = Normalizer::new(&registry);
        let mut raw = make_raw_sample();
        raw.metadata.insert(
            metadata_keys::GLUCOSE_MEAL_TIME_LEGACY.to_string(),
            serde_json::json!(1),
        );
        let sample = normalizer.sample(&raw, "blood_glucose", None);
        match sample.value {
            Some(SampleValue::BloodGlucose(v)) => {
                assert_eq!(v.meal.as_deref(), Some("before_meal"));
            }
            other => panic!("expected blood glucose value, got {other:?}"),
        }
    }

    #[test]
    fn category_code_yields_label_and_result() {
        let registry = registry();
        let normalizer = Normalizer::new(&registry);
        let mut raw = make_raw_sample();
        raw.quantity = None;
        raw.value = Some(RawValue::Number(3.0));
        raw.category_type = Some("HKCategoryTypeIdentifierMenstrualFlow".to_string());
        raw.quantity_type = None;

        let sample = normalizer.sample(&raw, "menstrual_flow", None);
        assert_eq!(
            sample.value,
            Some(SampleValue::Text("HKCategoryValueMenstrualFlowMedium".to_string()))
        );
        assert_eq!(sample.result.as_deref(), Some("medium"));
    }

    #[test]
    fn sleep_codes_translate_to_labels() {
        let registry = registry();
        let normalizer = Normalizer::new(&registry);
        let mut raw = make_raw_sample();

        raw.value = Some(RawValue::Number(0.0));
        assert_eq!(
            normalizer.sleep_sample(&raw).value,
            Some(SampleValue::Text("sleep.inBed".to_string()))
        );
        raw.value = Some(RawValue::Number(1.0));
        assert_eq!(
            normalizer.sleep_sample(&raw).value,
            Some(SampleValue::Text("sleep".to_string()))
        );
        raw.value = Some(RawValue::Number(5.0));
        assert_eq!(
            normalizer.sleep_sample(&raw).value,
            Some(SampleValue::Text("sleep.awake".to_string()))
        );
    }

    #[test]
    fn nutrition_correlation_expands_with_unit_conversion() {
        let registry = registry();
        let normalizer = Normalizer::new(&registry);
        let raw = RawCorrelation {
            uuid: Some("corr-1".to_string()),
            start_date: Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap(),
            end_date: Utc.with_ymd_and_hms(2024, 1, 1, 12, 30, 0).unwrap(),
            correlation_type: Some(idents::FOOD_CORRELATION.to_string()),
            samples: vec![
                RawCorrelationSample {
                    sample_type: "HKQuantityTypeIdentifierDietaryProtein".to_string(),
                    value: 30.0,
                    unit: None,
                },
                RawCorrelationSample {
                    // Sodium registry unit is mg; the native value is grams
                    sample_type: "HKQuantityTypeIdentifierDietarySodium".to_string(),
                    value: 0.5,
                    unit: None,
                },
            ],
            metadata: [(
                metadata_keys::FOOD_TYPE.to_string(),
                serde_json::json!("porridge"),
            )]
            .into_iter()
            .collect(),
            attribution: RawAttribution::default(),
        };

        let sample = normalizer.correlation(&raw, "nutrition");
        assert_eq!(sample.unit.as_deref(), Some("nutrition"));
        match sample.value {
            Some(SampleValue::Nutrition(n)) => {
                assert_eq!(n.item.as_deref(), Some("porridge"));
                assert_eq!(n.nutrients["nutrition.protein"], 30.0);
                assert_eq!(n.nutrients["nutrition.sodium"], 500.0);
            }
            other => panic!("expected nutrition value, got {other:?}"),
        }
    }

    #[test]
    fn blood_pressure_correlation_extracts_pair() {
        let registry = registry();
        let normalizer = Normalizer::new(&registry);
        let raw = RawCorrelation {
            uuid: None,
            start_date: Utc.with_ymd_and_hms(2024, 1, 1, 7, 0, 0).unwrap(),
            end_date: Utc.with_ymd_and_hms(2024, 1, 1, 7, 1, 0).unwrap(),
            correlation_type: Some(idents::BP_CORRELATION.to_string()),
            samples: vec![
                RawCorrelationSample {
                    sample_type: idents::BP_SYSTOLIC.to_string(),
                    value: 120.0,
                    unit: None,
                },
                RawCorrelationSample {
                    sample_type: idents::BP_DIASTOLIC.to_string(),
                    value: 80.0,
                    unit: None,
                },
            ],
            metadata: std::collections::HashMap::new(),
            attribution: RawAttribution::default(),
        };

        let sample = normalizer.correlation(&raw, "blood_pressure");
        assert_eq!(sample.unit.as_deref(), Some("mmHg"));
        assert_eq!(
            sample.value,
            Some(SampleValue::BloodPressure(BloodPressureValue {
                systolic: Some(120.0),
                diastolic: Some(80.0),
            }))
        );
    }

    #[test]
    fn characteristic_carries_fixed_source_identity() {
        let registry = registry();
        let normalizer = Normalizer::new(&registry);
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let end = Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap();
        let sample = normalizer.characteristic(
            SampleValue::Text("female".to_string()),
            "HKCharacteristicTypeIdentifierBiologicalSex",
            start,
            end,
        );

        assert_eq!(sample.start_date, start);
        assert_eq!(sample.end_date, end);
        assert_eq!(sample.source.source_name, "Health");
        assert_eq!(sample.source.source_bundle_id, "com.apple.Health");
        assert_eq!(sample.measure_name, "Biological Sex");
    }
}
