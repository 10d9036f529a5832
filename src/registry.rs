//! Type registry
//!
//! Static mapping tables between generic data-type names and the native
//! HealthKit vocabulary: type identifiers, units, family tags, derived
//! counterparts and category code tables. Built once at startup and passed by
//! reference into every component; nothing here is mutable at runtime.
//!
//! Dispatch everywhere else is driven by the [`TypeFamily`] tag carried in the
//! descriptor, so adding a data type is a table entry, not new branch logic.
//! Composite families are discoverable by key prefix (`nutrition.`), so new
//! members need no resolver changes either.

use std::collections::HashMap;

use crate::types::DataTypeEntry;

/// Native identifiers referenced outside their registry rows
pub mod idents {
    pub const WORKOUT_TYPE: &str = "HKWorkoutTypeIdentifier";
    pub const SLEEP_ANALYSIS: &str = "HKCategoryTypeIdentifierSleepAnalysis";
    pub const DISTANCE_CYCLING: &str = "HKQuantityTypeIdentifierDistanceCycling";
    pub const BASAL_ENERGY: &str = "HKQuantityTypeIdentifierBasalEnergyBurned";
    pub const BP_SYSTOLIC: &str = "HKQuantityTypeIdentifierBloodPressureSystolic";
    pub const BP_DIASTOLIC: &str = "HKQuantityTypeIdentifierBloodPressureDiastolic";
    pub const FOOD_CORRELATION: &str = "HKCorrelationTypeIdentifierFood";
    pub const BP_CORRELATION: &str = "HKCorrelationTypeIdentifierBloodPressure";
}

/// Metadata keys read and written on native samples
pub mod metadata_keys {
    pub const FOOD_TYPE: &str = "HKFoodType";
    pub const FOOD_MEAL: &str = "HKFoodMeal";
    pub const FOOD_BRAND_NAME: &str = "HKFoodBrandName";
    /// Legacy numeric meal-time code (1 = before meal, 2 = after meal)
    pub const GLUCOSE_MEAL_TIME_LEGACY: &str = "HKBloodGlucoseMealTime";
    pub const GLUCOSE_MEAL_TIME: &str = "HKMetadataKeyBloodGlucoseMealTime";
    pub const GLUCOSE_SLEEP_TIME: &str = "HKMetadataKeyBloodGlucoseSleepTime";
    pub const GLUCOSE_SOURCE: &str = "HKMetadataKeyBloodGlucoseSource";
    /// Legacy numeric delivery-reason code (1 = basal, 2 = bolus)
    pub const INSULIN_REASON_LEGACY: &str = "HKInsulinDeliveryReason";
    pub const INSULIN_REASON: &str = "HKMetadataKeyInsulinDeliveryReason";
}

/// Native sleep-analysis category values used on write
pub mod sleep_values {
    pub const ASLEEP: &str = "HKCategoryValueSleepAnalysisAsleep";
    pub const IN_BED: &str = "HKCategoryValueSleepAnalysisInBed";
    pub const AWAKE: &str = "HKCategoryValueSleepAnalysisAwake";
}

/// Classification of a generic data type, driving dispatch in the resolver,
/// dispatcher, normalizer and writer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeFamily {
    /// Read-only one-shot reads (gender, date of birth); never authorizable
    /// for write
    Characteristic,
    /// Plain quantity samples
    Quantity,
    /// Category samples, optionally with an enumerated code table
    Category,
    /// Grouped sub-samples saved and queried as one unit
    Correlation,
    /// Workout/activity sessions
    Workout,
    /// Daily activity-ring summaries
    ActivitySummary,
    /// ECG recordings
    Electrocardiogram,
}

/// Immutable description of one generic data type
#[derive(Debug, Clone, Copy)]
pub struct DataTypeDescriptor {
    pub name: &'static str,
    /// Native identifier(s); the first one is the primary
    pub native: &'static [&'static str],
    /// Unit, or alternative units for correlation queries; empty = unitless
    pub units: &'static [&'static str],
    pub family: TypeFamily,
    /// Second native identifier read alongside the primary (distance adds
    /// cycling, calories adds basal, activity adds sleep analysis)
    pub derived_counterpart: Option<&'static str>,
}

impl DataTypeDescriptor {
    pub fn primary_native(&self) -> &'static str {
        self.native.first().copied().unwrap_or("")
    }

    pub fn unit(&self) -> Option<&'static str> {
        self.units.first().copied()
    }
}

/// One row of a category code table
#[derive(Debug, Clone, Copy)]
pub struct CategoryCode {
    pub code: i64,
    /// Native category value identifier
    pub category_key: &'static str,
    /// Generic result label
    pub label: &'static str,
}

use TypeFamily::{
    ActivitySummary, Category, Characteristic, Correlation, Electrocardiogram, Quantity, Workout,
};

macro_rules! descriptor {
    ($name:expr, [$($native:expr),*], [$($unit:expr),*], $family:expr) => {
        descriptor!($name, [$($native),*], [$($unit),*], $family, None)
    };
    ($name:expr, [$($native:expr),*], [$($unit:expr),*], $family:expr, $counterpart:expr) => {
        DataTypeDescriptor {
            name: $name,
            native: &[$($native),*],
            units: &[$($unit),*],
            family: $family,
            derived_counterpart: $counterpart,
        }
    };
}

static DESCRIPTORS: &[DataTypeDescriptor] = &[
    descriptor!("steps", ["HKQuantityTypeIdentifierStepCount"], ["count"], Quantity),
    descriptor!("stairs", ["HKQuantityTypeIdentifierFlightsClimbed"], ["count"], Quantity),
    descriptor!(
        "distance",
        ["HKQuantityTypeIdentifierDistanceWalkingRunning"],
        ["m"],
        Quantity,
        Some(idents::DISTANCE_CYCLING)
    ),
    descriptor!(
        "appleExerciseTime",
        ["HKQuantityTypeIdentifierAppleExerciseTime"],
        ["min"],
        Quantity
    ),
    descriptor!(
        "calories",
        ["HKQuantityTypeIdentifierActiveEnergyBurned"],
        ["kcal"],
        Quantity,
        Some(idents::BASAL_ENERGY)
    ),
    descriptor!(
        "calories.active",
        ["HKQuantityTypeIdentifierActiveEnergyBurned"],
        ["kcal"],
        Quantity
    ),
    descriptor!("calories.basal", [idents::BASAL_ENERGY], ["kcal"], Quantity),
    descriptor!(
        "activity",
        [idents::WORKOUT_TYPE],
        ["activityType"],
        Workout,
        Some(idents::SLEEP_ANALYSIS)
    ),
    descriptor!("workouts", [idents::WORKOUT_TYPE], ["activityType"], Workout),
    descriptor!("height", ["HKQuantityTypeIdentifierHeight"], ["m"], Quantity),
    descriptor!("weight", ["HKQuantityTypeIdentifierBodyMass"], ["kg"], Quantity),
    descriptor!("bmi", ["HKQuantityTypeIdentifierBodyMassIndex"], ["count"], Quantity),
    descriptor!(
        "fat_percentage",
        ["HKQuantityTypeIdentifierBodyFatPercentage"],
        ["%"],
        Quantity
    ),
    descriptor!(
        "waist_circumference",
        ["HKQuantityTypeIdentifierWaistCircumference"],
        ["m"],
        Quantity
    ),
    descriptor!("heart_rate", ["HKQuantityTypeIdentifierHeartRate"], ["count/min"], Quantity),
    descriptor!(
        "heart_rate.resting",
        ["HKQuantityTypeIdentifierRestingHeartRate"],
        ["count/min"],
        Quantity
    ),
    descriptor!(
        "heart_rate.variability",
        ["HKQuantityTypeIdentifierHeartRateVariabilitySDNN"],
        ["ms"],
        Quantity
    ),
    descriptor!("resp_rate", ["HKQuantityTypeIdentifierRespiratoryRate"], ["count/min"], Quantity),
    descriptor!(
        "oxygen_saturation",
        ["HKQuantityTypeIdentifierOxygenSaturation"],
        ["%"],
        Quantity
    ),
    descriptor!("vo2max", ["HKQuantityTypeIdentifierVO2Max"], ["ml/(kg*min)"], Quantity),
    descriptor!("temperature", ["HKQuantityTypeIdentifierBodyTemperature"], ["degC"], Quantity),
    descriptor!("blood_glucose", ["HKQuantityTypeIdentifierBloodGlucose"], ["mmol/L"], Quantity),
    descriptor!("insulin", ["HKQuantityTypeIdentifierInsulinDelivery"], ["IU"], Quantity),
    descriptor!(
        "blood_pressure",
        [idents::BP_CORRELATION],
        ["mmHg"],
        Correlation
    ),
    descriptor!("blood_pressure_systolic", [idents::BP_SYSTOLIC], ["mmHg"], Quantity),
    descriptor!("blood_pressure_diastolic", [idents::BP_DIASTOLIC], ["mmHg"], Quantity),
    descriptor!("gender", ["HKCharacteristicTypeIdentifierBiologicalSex"], [], Characteristic),
    descriptor!(
        "date_of_birth",
        ["HKCharacteristicTypeIdentifierDateOfBirth"],
        [],
        Characteristic
    ),
    descriptor!("mindfulness", ["HKCategoryTypeIdentifierMindfulSession"], ["min"], Category),
    descriptor!(
        "cervical_mucus_quality",
        ["HKCategoryTypeIdentifierCervicalMucusQuality"],
        [],
        Category
    ),
    descriptor!(
        "ovulation_test_result",
        ["HKCategoryTypeIdentifierOvulationTestResult"],
        [],
        Category
    ),
    descriptor!("menstrual_flow", ["HKCategoryTypeIdentifierMenstrualFlow"], [], Category),
    descriptor!("UVexposure", ["HKQuantityTypeIdentifierUVExposure"], ["count"], Quantity),
    descriptor!(
        "nutrition",
        [idents::FOOD_CORRELATION],
        ["kcal", "g", "mg", "ml"],
        Correlation
    ),
    descriptor!(
        "nutrition.calories",
        ["HKQuantityTypeIdentifierDietaryEnergyConsumed"],
        ["kcal"],
        Quantity
    ),
    descriptor!("nutrition.fat.total", ["HKQuantityTypeIdentifierDietaryFatTotal"], ["g"], Quantity),
    descriptor!(
        "nutrition.fat.saturated",
        ["HKQuantityTypeIdentifierDietaryFatSaturated"],
        ["g"],
        Quantity
    ),
    descriptor!(
        "nutrition.fat.polyunsaturated",
        ["HKQuantityTypeIdentifierDietaryFatPolyunsaturated"],
        ["g"],
        Quantity
    ),
    descriptor!(
        "nutrition.fat.monounsaturated",
        ["HKQuantityTypeIdentifierDietaryFatMonounsaturated"],
        ["g"],
        Quantity
    ),
    descriptor!(
        "nutrition.cholesterol",
        ["HKQuantityTypeIdentifierDietaryCholesterol"],
        ["mg"],
        Quantity
    ),
    descriptor!("nutrition.sodium", ["HKQuantityTypeIdentifierDietarySodium"], ["mg"], Quantity),
    descriptor!(
        "nutrition.potassium",
        ["HKQuantityTypeIdentifierDietaryPotassium"],
        ["mg"],
        Quantity
    ),
    descriptor!(
        "nutrition.carbs.total",
        ["HKQuantityTypeIdentifierDietaryCarbohydrates"],
        ["g"],
        Quantity
    ),
    descriptor!(
        "nutrition.dietary_fiber",
        ["HKQuantityTypeIdentifierDietaryFiber"],
        ["g"],
        Quantity
    ),
    descriptor!("nutrition.sugar", ["HKQuantityTypeIdentifierDietarySugar"], ["g"], Quantity),
    descriptor!("nutrition.protein", ["HKQuantityTypeIdentifierDietaryProtein"], ["g"], Quantity),
    descriptor!(
        "nutrition.vitamin_a",
        ["HKQuantityTypeIdentifierDietaryVitaminA"],
        ["mcg"],
        Quantity
    ),
    descriptor!(
        "nutrition.vitamin_c",
        ["HKQuantityTypeIdentifierDietaryVitaminC"],
        ["mg"],
        Quantity
    ),
    descriptor!("nutrition.calcium", ["HKQuantityTypeIdentifierDietaryCalcium"], ["mg"], Quantity),
    descriptor!("nutrition.iron", ["HKQuantityTypeIdentifierDietaryIron"], ["mg"], Quantity),
    descriptor!("nutrition.water", ["HKQuantityTypeIdentifierDietaryWater"], ["ml"], Quantity),
    descriptor!("nutrition.caffeine", ["HKQuantityTypeIdentifierDietaryCaffeine"], ["mg"], Quantity),
    descriptor!("activitySummary", ["HKActivitySummaryType"], [], ActivitySummary),
    descriptor!(
        "electrocardiogram",
        ["HKDataTypeIdentifierElectrocardiogram"],
        [],
        Electrocardiogram
    ),
];

static CERVICAL_MUCUS_CODES: &[CategoryCode] = &[
    CategoryCode { code: 1, category_key: "HKCategoryValueCervicalMucusQualityDry", label: "dry" },
    CategoryCode { code: 2, category_key: "HKCategoryValueCervicalMucusQualitySticky", label: "sticky" },
    CategoryCode { code: 3, category_key: "HKCategoryValueCervicalMucusQualityCreamy", label: "creamy" },
    CategoryCode { code: 4, category_key: "HKCategoryValueCervicalMucusQualityWatery", label: "watery" },
    CategoryCode { code: 5, category_key: "HKCategoryValueCervicalMucusQualityEggWhite", label: "egg_white" },
];

static OVULATION_TEST_CODES: &[CategoryCode] = &[
    CategoryCode { code: 1, category_key: "HKCategoryValueOvulationTestResultNegative", label: "negative" },
    CategoryCode {
        code: 2,
        category_key: "HKCategoryValueOvulationTestResultLuteinizingHormoneSurge",
        label: "positive",
    },
    CategoryCode { code: 3, category_key: "HKCategoryValueOvulationTestResultIndeterminate", label: "indeterminate" },
    CategoryCode { code: 4, category_key: "HKCategoryValueOvulationTestResultEstrogenSurge", label: "estrogen_surge" },
];

static MENSTRUAL_FLOW_CODES: &[CategoryCode] = &[
    CategoryCode { code: 1, category_key: "HKCategoryValueMenstrualFlowUnspecified", label: "unspecified" },
    CategoryCode { code: 2, category_key: "HKCategoryValueMenstrualFlowLight", label: "light" },
    CategoryCode { code: 3, category_key: "HKCategoryValueMenstrualFlowMedium", label: "medium" },
    CategoryCode { code: 4, category_key: "HKCategoryValueMenstrualFlowHeavy", label: "heavy" },
    CategoryCode { code: 5, category_key: "HKCategoryValueMenstrualFlowNone", label: "none" },
];

/// Immutable lookup tables for generic data types.
///
/// Lookup is case-exact and O(1).
#[derive(Debug)]
pub struct TypeRegistry {
    by_name: HashMap<&'static str, &'static DataTypeDescriptor>,
    category_codes: HashMap<&'static str, &'static [CategoryCode]>,
}

impl Default for TypeRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl TypeRegistry {
    pub fn new() -> Self {
        let by_name = DESCRIPTORS.iter().map(|d| (d.name, d)).collect();
        let category_codes: HashMap<_, _> = [
            ("cervical_mucus_quality", CERVICAL_MUCUS_CODES),
            ("ovulation_test_result", OVULATION_TEST_CODES),
            ("menstrual_flow", MENSTRUAL_FLOW_CODES),
        ]
        .into_iter()
        .collect();
        Self {
            by_name,
            category_codes,
        }
    }

    pub fn descriptor(&self, name: &str) -> Option<&'static DataTypeDescriptor> {
        self.by_name.get(name).copied()
    }

    pub fn primary_native(&self, name: &str) -> Option<&'static str> {
        self.descriptor(name).map(DataTypeDescriptor::primary_native)
    }

    pub fn unit(&self, name: &str) -> Option<&'static str> {
        self.descriptor(name).and_then(DataTypeDescriptor::unit)
    }

    pub fn units(&self, name: &str) -> &'static [&'static str] {
        self.descriptor(name).map_or(&[], |d| d.units)
    }

    /// All descriptors whose key starts with the given prefix, in table order
    pub fn family_members(&self, prefix: &str) -> impl Iterator<Item = &'static DataTypeDescriptor> + '_ {
        let prefix = prefix.to_string();
        DESCRIPTORS.iter().filter(move |d| d.name.starts_with(&prefix))
    }

    /// Code table for category types with enumerated values
    pub fn category_codes(&self, name: &str) -> Option<&'static [CategoryCode]> {
        self.category_codes.get(name).copied()
    }

    pub fn category_code(&self, name: &str, code: i64) -> Option<&'static CategoryCode> {
        self.category_codes(name)
            .and_then(|codes| codes.iter().find(|c| c.code == code))
    }

    /// Reverse lookup from a native nutrient identifier to its generic name
    pub fn nutrient_for_native(&self, native: &str) -> Option<&'static DataTypeDescriptor> {
        self.family_members("nutrition.")
            .find(|d| d.primary_native() == native)
    }

    /// Catalog of every registered type, alphabetical by generic name
    pub fn entries(&self) -> Vec<DataTypeEntry> {
        let mut entries: Vec<DataTypeEntry> = DESCRIPTORS
            .iter()
            .map(|d| DataTypeEntry {
                data_type: d.name.to_string(),
                native_equivalent: d.primary_native().to_string(),
                unit: d.unit().unwrap_or("N/A").to_string(),
            })
            .collect();
        entries.sort_by(|a, b| a.data_type.cmp(&b.data_type));
        entries
    }
}

/// Converts a gram quantity into another weight unit.
///
/// Unknown or non-weight units return the quantity unchanged.
pub fn convert_from_grams(to_unit: &str, quantity: f64) -> f64 {
    match to_unit {
        "mcg" => quantity * 1_000_000.0,
        "mg" => quantity * 1000.0,
        "kg" => quantity / 1000.0,
        _ => quantity,
    }
}

/// Converts a quantity in the given weight unit into grams
pub fn convert_to_grams(from_unit: &str, quantity: f64) -> f64 {
    match from_unit {
        "mcg" => quantity / 1_000_000.0,
        "mg" => quantity / 1000.0,
        "kg" => quantity * 1000.0,
        _ => quantity,
    }
}
