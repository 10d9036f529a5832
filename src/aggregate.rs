//! Aggregation and bucketization
//!
//! Sums query results over one summary window or a sequence of
//! calendar-aligned buckets. Scalar types delegate summation to the boundary;
//! activity and nutrition aggregate locally from normalized samples because
//! their merge rules (per-activity totals, per-nutrient sums) have no native
//! counterpart.
//!
//! Bucket timestamps are aligned on UTC calendar boundaries. Sample
//! containment is inclusive on both ends, matching the established behavior:
//! a sample that coincides with a bucket boundary lands in both adjacent
//! buckets, while a sample straddling the boundary lands in neither.

use chrono::{DateTime, Datelike, Duration, NaiveDate, TimeZone, Timelike, Utc};
use tracing::debug;

use crate::bridge::HealthBridge;
use crate::error::BridgeError;
use crate::store::{AggregatedQuery, HealthStore, RawAggregateBucket, SampleQuery};
use crate::types::{
    AggregateResult, AggregateValue, AggregationBucket, Bucket, NormalizedSample, QueryOptions,
    SampleValue,
};

/// Types accepted by `queryAggregated`.
///
/// Every nutrient and distance variant is covered by its prefix.
fn supports_aggregation(data_type: &str) -> bool {
    matches!(
        data_type,
        "steps" | "calories" | "calories.active" | "calories.basal" | "activity" | "workouts"
            | "appleExerciseTime"
    ) || data_type.starts_with("nutrition")
        || data_type.starts_with("distance")
}

/// Aligns a timestamp down to the calendar boundary of the bucket width.
/// Weeks start on Monday.
fn align_start(date: DateTime<Utc>, bucket: Bucket) -> DateTime<Utc> {
    let midnight = date
        .date_naive()
        .and_hms_opt(0, 0, 0)
        .map(|naive| Utc.from_utc_datetime(&naive))
        .unwrap_or(date);

    match bucket {
        Bucket::Hour => midnight + Duration::hours(i64::from(date.hour())),
        Bucket::Day => midnight,
        Bucket::Week => midnight - Duration::days(i64::from(date.weekday().num_days_from_monday())),
        Bucket::Month => NaiveDate::from_ymd_opt(date.year(), date.month(), 1)
            .and_then(|d| d.and_hms_opt(0, 0, 0))
            .map(|naive| Utc.from_utc_datetime(&naive))
            .unwrap_or(midnight),
        Bucket::Year => NaiveDate::from_ymd_opt(date.year(), 1, 1)
            .and_then(|d| d.and_hms_opt(0, 0, 0))
            .map(|naive| Utc.from_utc_datetime(&naive))
            .unwrap_or(midnight),
    }
}

/// End of the bucket starting at an aligned timestamp
fn bucket_end(start: DateTime<Utc>, bucket: Bucket) -> DateTime<Utc> {
    match bucket {
        Bucket::Hour => start + Duration::hours(1),
        Bucket::Day => start + Duration::days(1),
        Bucket::Week => start + Duration::days(7),
        Bucket::Month => {
            let (year, month) = if start.month() == 12 {
                (start.year() + 1, 1)
            } else {
                (start.year(), start.month() + 1)
            };
            NaiveDate::from_ymd_opt(year, month, 1)
                .and_then(|d| d.and_hms_opt(0, 0, 0))
                .map(|naive| Utc.from_utc_datetime(&naive))
                .unwrap_or(start)
        }
        Bucket::Year => NaiveDate::from_ymd_opt(start.year() + 1, 1, 1)
            .and_then(|d| d.and_hms_opt(0, 0, 0))
            .map(|naive| Utc.from_utc_datetime(&naive))
            .unwrap_or(start),
    }
}

/// Distributes samples over calendar buckets covering the requested range.
///
/// A sample is merged into every bucket that fully contains it, bounds
/// inclusive on both ends.
fn bucketize<F>(
    samples: &[NormalizedSample],
    bucket: Bucket,
    start_date: DateTime<Utc>,
    end_date: DateTime<Utc>,
    unit: &str,
    empty: &AggregateValue,
    merge: F,
) -> Vec<AggregationBucket>
where
    F: Fn(&NormalizedSample, &mut AggregateValue),
{
    let mut buckets = Vec::new();
    let mut cursor = align_start(start_date, bucket);

    while cursor <= end_date {
        let end = bucket_end(cursor, bucket);
        let mut value = empty.clone();
        for sample in samples {
            if sample.start_date >= cursor && sample.end_date <= end {
                merge(sample, &mut value);
            }
        }
        buckets.push(AggregationBucket {
            start_date: cursor,
            end_date: end,
            value,
            unit: unit.to_string(),
        });
        cursor = end;
    }

    buckets
}

/// Accumulates one activity sample into per-activity totals.
///
/// Duration is always the sample span in seconds, regardless of any
/// store-reported duration field; absent distance and calories contribute
/// zero.
fn merge_activity_sample(sample: &NormalizedSample, value: &mut AggregateValue) {
    let AggregateValue::Activity(totals) = value else {
        return;
    };
    let span = (sample.end_date - sample.start_date).num_milliseconds() as f64 / 1000.0;
    let (key, duration, distance, calories) = match &sample.value {
        Some(SampleValue::Workout(w)) => (
            w.activity.clone(),
            span,
            w.distance.unwrap_or(0.0),
            w.energy.unwrap_or(0.0),
        ),
        Some(SampleValue::Text(label)) => (label.clone(), span, 0.0, 0.0),
        _ => return,
    };
    let entry = totals.entry(key).or_default();
    entry.duration += duration;
    entry.distance += distance;
    entry.calories += calories;
}

/// Accumulates one nutrition sample into per-nutrient sums
fn merge_nutrition_sample(sample: &NormalizedSample, value: &mut AggregateValue) {
    let AggregateValue::Nutrition(nutrients) = value else {
        return;
    };
    if let Some(SampleValue::Nutrition(n)) = &sample.value {
        for (name, amount) in &n.nutrients {
            *nutrients.entry(name.clone()).or_insert(0.0) += amount;
        }
    }
}

impl<S: HealthStore> HealthBridge<S> {
    /// Run an aggregated query.
    ///
    /// With a bucket set, returns one entry per calendar bucket covering the
    /// range; without one, a single summary over the whole window. The
    /// supported-type check happens before any boundary call.
    pub async fn query_aggregated(
        &self,
        opts: &QueryOptions,
    ) -> Result<AggregateResult, BridgeError> {
        if !supports_aggregation(&opts.data_type) {
            return Err(BridgeError::UnsupportedAggregation(opts.data_type.clone()));
        }
        debug!(data_type = %opts.data_type, bucket = ?opts.bucket, "dispatching aggregated query");

        match opts.bucket {
            Some(bucket) => self.aggregate_bucketed(opts, bucket).await,
            None => self.aggregate_summary(opts).await,
        }
    }

    async fn aggregate_bucketed(
        &self,
        opts: &QueryOptions,
        bucket: Bucket,
    ) -> Result<AggregateResult, BridgeError> {
        match opts.data_type.as_str() {
            "activity" | "workouts" => {
                let samples = self.query(opts).await?;
                Ok(AggregateResult::Buckets(bucketize(
                    &samples,
                    bucket,
                    opts.start_date,
                    opts.end_date,
                    "activitySummary",
                    &AggregateValue::Activity(Default::default()),
                    merge_activity_sample,
                )))
            }
            "nutrition" => {
                let samples = self.query(opts).await?;
                Ok(AggregateResult::Buckets(bucketize(
                    &samples,
                    bucket,
                    opts.start_date,
                    opts.end_date,
                    "nutrition",
                    &AggregateValue::Nutrition(Default::default()),
                    merge_nutrition_sample,
                )))
            }
            name => {
                let descriptor = self
                    .registry
                    .descriptor(name)
                    .ok_or_else(|| BridgeError::UnknownDataType(name.to_string()))?;
                let unit = opts
                    .unit
                    .clone()
                    .or_else(|| descriptor.unit().map(String::from));

                let mut raw = self
                    .store
                    .query_aggregated(&AggregatedQuery {
                        sample_type: descriptor.primary_native().to_string(),
                        start_date: opts.start_date,
                        end_date: opts.end_date,
                        unit: unit.clone(),
                        aggregation: bucket,
                    })
                    .await?;

                // Counterpart buckets are merged into the primary set by
                // equal start timestamps, chained after the primary call.
                if let Some(counterpart) = descriptor.derived_counterpart {
                    let extra = self
                        .store
                        .query_aggregated(&AggregatedQuery {
                            sample_type: counterpart.to_string(),
                            start_date: opts.start_date,
                            end_date: opts.end_date,
                            unit: unit.clone(),
                            aggregation: bucket,
                        })
                        .await?;
                    merge_bucket_quantities(&mut raw, &extra);
                }

                let unit = unit.unwrap_or_default();
                Ok(AggregateResult::Buckets(
                    raw.into_iter()
                        .map(|b| AggregationBucket {
                            start_date: b.start_date,
                            end_date: b.end_date,
                            value: AggregateValue::Scalar(b.quantity),
                            unit: unit.clone(),
                        })
                        .collect(),
                ))
            }
        }
    }

    async fn aggregate_summary(&self, opts: &QueryOptions) -> Result<AggregateResult, BridgeError> {
        match opts.data_type.as_str() {
            "activity" | "workouts" => {
                let samples = self.query(opts).await?;
                let mut value = AggregateValue::Activity(Default::default());
                for sample in &samples {
                    merge_activity_sample(sample, &mut value);
                }
                Ok(AggregateResult::Summary(envelope(
                    &samples,
                    opts,
                    value,
                    "activitySummary",
                )))
            }
            "nutrition" => {
                let samples = self.query(opts).await?;
                let mut value = AggregateValue::Nutrition(Default::default());
                for sample in &samples {
                    merge_nutrition_sample(sample, &mut value);
                }
                Ok(AggregateResult::Summary(envelope(&samples, opts, value, "nutrition")))
            }
            name => {
                let descriptor = self
                    .registry
                    .descriptor(name)
                    .ok_or_else(|| BridgeError::UnknownDataType(name.to_string()))?;
                let unit = opts
                    .unit
                    .clone()
                    .or_else(|| descriptor.unit().map(String::from));

                let mut sum = self
                    .store
                    .sum_quantity_type(&SampleQuery {
                        sample_type: descriptor.primary_native().to_string(),
                        start_date: opts.start_date,
                        end_date: opts.end_date,
                        unit: unit.clone(),
                    })
                    .await?;
                if let Some(counterpart) = descriptor.derived_counterpart {
                    sum += self
                        .store
                        .sum_quantity_type(&SampleQuery {
                            sample_type: counterpart.to_string(),
                            start_date: opts.start_date,
                            end_date: opts.end_date,
                            unit: unit.clone(),
                        })
                        .await?;
                }

                Ok(AggregateResult::Summary(AggregationBucket {
                    start_date: opts.start_date,
                    end_date: opts.end_date,
                    value: AggregateValue::Scalar(sum),
                    unit: unit.unwrap_or_default(),
                }))
            }
        }
    }
}

/// Adds counterpart bucket quantities into primary buckets with the same
/// start timestamp
fn merge_bucket_quantities(primary: &mut [RawAggregateBucket], extra: &[RawAggregateBucket]) {
    for bucket in primary {
        if let Some(other) = extra.iter().find(|e| e.start_date == bucket.start_date) {
            bucket.quantity += other.quantity;
        }
    }
}

/// Summary window spanning the samples, falling back to the requested range
/// when the result set is empty
fn envelope(
    samples: &[NormalizedSample],
    opts: &QueryOptions,
    value: AggregateValue,
    unit: &str,
) -> AggregationBucket {
    let start_date = samples
        .iter()
        .map(|s| s.start_date)
        .min()
        .unwrap_or(opts.start_date);
    let end_date = samples
        .iter()
        .map(|s| s.end_date)
        .max()
        .unwrap_or(opts.end_date);
    AggregationBucket {
        start_date,
        end_date,
        value,
        unit: unit.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockHealthStore;
    use crate::types::{ActivityTotals, SourceInfo, DeviceInfo};
    use pretty_assertions::assert_eq;

    fn at(day: u32, hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, day, hour, 0, 0).unwrap()
    }

    fn make_scalar_sample(start: DateTime<Utc>, end: DateTime<Utc>) -> NormalizedSample {
        NormalizedSample {
            id: "s".to_string(),
            start_date: start,
            end_date: end,
            native_measure_name: String::new(),
            measure_name: String::new(),
            value: Some(SampleValue::Scalar(1.0)),
            result: None,
            unit: None,
            source: SourceInfo::default(),
            device: DeviceInfo::default(),
            metadata: Default::default(),
        }
    }

    #[test]
    fn hour_and_day_alignment() {
        let date = Utc.with_ymd_and_hms(2024, 3, 15, 14, 42, 7).unwrap();
        assert_eq!(align_start(date, Bucket::Hour), Utc.with_ymd_and_hms(2024, 3, 15, 14, 0, 0).unwrap());
        assert_eq!(align_start(date, Bucket::Day), Utc.with_ymd_and_hms(2024, 3, 15, 0, 0, 0).unwrap());
    }

    #[test]
    fn week_aligns_to_monday() {
        // 2024-03-15 is a Friday
        let date = Utc.with_ymd_and_hms(2024, 3, 15, 14, 0, 0).unwrap();
        assert_eq!(align_start(date, Bucket::Week), Utc.with_ymd_and_hms(2024, 3, 11, 0, 0, 0).unwrap());
        // A Sunday belongs to the week that started six days earlier
        let sunday = Utc.with_ymd_and_hms(2024, 3, 17, 8, 0, 0).unwrap();
        assert_eq!(align_start(sunday, Bucket::Week), Utc.with_ymd_and_hms(2024, 3, 11, 0, 0, 0).unwrap());
    }

    #[test]
    fn month_and_year_ends_handle_rollover() {
        let december = Utc.with_ymd_and_hms(2024, 12, 1, 0, 0, 0).unwrap();
        assert_eq!(bucket_end(december, Bucket::Month), Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap());
        assert_eq!(bucket_end(december, Bucket::Year), Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap());
    }

    #[test]
    fn bucketize_covers_the_range_with_day_buckets() {
        let buckets = bucketize(
            &[],
            Bucket::Day,
            at(1, 0),
            at(7, 12),
            "count",
            &AggregateValue::Scalar(0.0),
            |_, _| {},
        );
        assert_eq!(buckets.len(), 7);
        assert_eq!(buckets[0].start_date, at(1, 0));
        assert_eq!(buckets[6].end_date, at(8, 0));
    }

    #[test]
    fn boundary_exact_sample_lands_in_both_adjacent_buckets() {
        let boundary = at(2, 0);
        let samples = vec![make_scalar_sample(boundary, boundary)];
        let buckets = bucketize(
            &samples,
            Bucket::Day,
            at(1, 0),
            at(2, 12),
            "count",
            &AggregateValue::Scalar(0.0),
            |_, value| {
                if let AggregateValue::Scalar(n) = value {
                    *n += 1.0;
                }
            },
        );
        assert_eq!(buckets[0].value, AggregateValue::Scalar(1.0));
        assert_eq!(buckets[1].value, AggregateValue::Scalar(1.0));
    }

    #[test]
    fn straddling_sample_lands_in_no_bucket() {
        let samples = vec![make_scalar_sample(at(1, 20), at(2, 4))];
        let buckets = bucketize(
            &samples,
            Bucket::Day,
            at(1, 0),
            at(2, 12),
            "count",
            &AggregateValue::Scalar(0.0),
            |_, value| {
                if let AggregateValue::Scalar(n) = value {
                    *n += 1.0;
                }
            },
        );
        assert!(buckets.iter().all(|b| b.value == AggregateValue::Scalar(0.0)));
    }

    #[test]
    fn activity_merge_uses_the_sample_span_not_the_reported_duration() {
        let mut sample = make_scalar_sample(at(1, 10), at(1, 11));
        sample.value = Some(SampleValue::Workout(crate::types::WorkoutValue {
            activity: "running".to_string(),
            native_activity: None,
            activity_label: None,
            // The store reports 30 min for this paused workout
            duration: Some(1800.0),
            duration_unit: Some("s".to_string()),
            energy: None,
            energy_unit: None,
            distance: None,
            distance_unit: None,
            swim_strokes: None,
            swim_stroke_unit: None,
            flights_climbed: None,
            flights_climbed_unit: None,
            workout_events: Vec::new(),
        }));

        let mut value = AggregateValue::Activity(Default::default());
        merge_activity_sample(&sample, &mut value);
        match value {
            AggregateValue::Activity(totals) => {
                assert_eq!(totals["running"].duration, 3600.0);
            }
            other => panic!("expected activity totals, got {other:?}"),
        }
    }

    fn make_nutrition_sample(nutrients: &[(&str, f64)]) -> NormalizedSample {
        let mut sample = make_scalar_sample(at(1, 12), at(1, 12));
        sample.value = Some(SampleValue::Nutrition(crate::types::NutritionValue {
            item: None,
            meal_type: None,
            brand_name: None,
            nutrients: nutrients
                .iter()
                .map(|(name, amount)| (name.to_string(), *amount))
                .collect(),
        }));
        sample
    }

    #[test]
    fn nutrition_merge_is_order_independent() {
        let first = make_nutrition_sample(&[("nutrition.protein", 30.0), ("nutrition.sodium", 500.0)]);
        let second = make_nutrition_sample(&[("nutrition.protein", 12.0)]);

        let mut forward = AggregateValue::Nutrition(Default::default());
        merge_nutrition_sample(&first, &mut forward);
        merge_nutrition_sample(&second, &mut forward);

        let mut backward = AggregateValue::Nutrition(Default::default());
        merge_nutrition_sample(&second, &mut backward);
        merge_nutrition_sample(&first, &mut backward);

        assert_eq!(forward, backward);
        match forward {
            AggregateValue::Nutrition(nutrients) => {
                assert_eq!(nutrients["nutrition.protein"], 42.0);
                assert_eq!(nutrients["nutrition.sodium"], 500.0);
            }
            other => panic!("expected nutrient sums, got {other:?}"),
        }
    }

    #[test]
    fn empty_nutrition_input_yields_empty_nutrient_maps() {
        let buckets = bucketize(
            &[],
            Bucket::Day,
            at(1, 0),
            at(1, 12),
            "nutrition",
            &AggregateValue::Nutrition(Default::default()),
            merge_nutrition_sample,
        );
        assert_eq!(buckets.len(), 1);
        assert_eq!(buckets[0].value, AggregateValue::Nutrition(Default::default()));
    }

    #[tokio::test]
    async fn unsupported_type_fails_before_any_boundary_call() {
        let bridge = HealthBridge::new(MockHealthStore::default());
        let opts = QueryOptions::new("heart_rate", at(1, 0), at(7, 0));
        let err = bridge.query_aggregated(&opts).await.unwrap_err();
        assert!(matches!(err, BridgeError::UnsupportedAggregation(ref t) if t == "heart_rate"));
        assert!(bridge.store.calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn calories_summary_adds_basal_sum() {
        let mut store = MockHealthStore::default();
        store
            .sums
            .insert("HKQuantityTypeIdentifierActiveEnergyBurned".to_string(), 500.0);
        store
            .sums
            .insert("HKQuantityTypeIdentifierBasalEnergyBurned".to_string(), 1400.0);
        let bridge = HealthBridge::new(store);

        let opts = QueryOptions::new("calories", at(1, 0), at(2, 0));
        let result = bridge.query_aggregated(&opts).await.unwrap();
        match result {
            AggregateResult::Summary(bucket) => {
                assert_eq!(bucket.value, AggregateValue::Scalar(1900.0));
                assert_eq!(bucket.unit, "kcal");
                assert_eq!(bucket.start_date, at(1, 0));
            }
            AggregateResult::Buckets(_) => panic!("expected a summary"),
        }
    }

    #[tokio::test]
    async fn bucketed_steps_use_native_aggregation() {
        let mut store = MockHealthStore::default();
        store.aggregates.insert(
            "HKQuantityTypeIdentifierStepCount".to_string(),
            vec![crate::store::RawAggregateBucket {
                uuid: None,
                start_date: at(1, 0),
                end_date: at(2, 0),
                quantity: 9000.0,
            }],
        );
        let bridge = HealthBridge::new(store);

        let opts = QueryOptions::new("steps", at(1, 0), at(2, 0)).with_bucket(Bucket::Day);
        let result = bridge.query_aggregated(&opts).await.unwrap();
        match result {
            AggregateResult::Buckets(buckets) => {
                assert_eq!(buckets.len(), 1);
                assert_eq!(buckets[0].value, AggregateValue::Scalar(9000.0));
                assert_eq!(buckets[0].unit, "count");
            }
            AggregateResult::Summary(_) => panic!("expected buckets"),
        }
    }

    #[tokio::test]
    async fn bucketed_distance_merges_cycling_by_start_timestamp() {
        let mut store = MockHealthStore::default();
        store.aggregates.insert(
            "HKQuantityTypeIdentifierDistanceWalkingRunning".to_string(),
            vec![crate::store::RawAggregateBucket {
                uuid: None,
                start_date: at(1, 0),
                end_date: at(2, 0),
                quantity: 3000.0,
            }],
        );
        store.aggregates.insert(
            "HKQuantityTypeIdentifierDistanceCycling".to_string(),
            vec![crate::store::RawAggregateBucket {
                uuid: None,
                start_date: at(1, 0),
                end_date: at(2, 0),
                quantity: 12000.0,
            }],
        );
        let bridge = HealthBridge::new(store);

        let opts = QueryOptions::new("distance", at(1, 0), at(2, 0)).with_bucket(Bucket::Day);
        let result = bridge.query_aggregated(&opts).await.unwrap();
        match result {
            AggregateResult::Buckets(buckets) => {
                assert_eq!(buckets[0].value, AggregateValue::Scalar(15000.0));
            }
            AggregateResult::Summary(_) => panic!("expected buckets"),
        }
    }

    #[tokio::test]
    async fn workout_summary_accumulates_per_activity_totals() {
        let mut store = MockHealthStore::default();
        store.workouts = vec![
            crate::store::RawWorkout {
                uuid: None,
                start_date: at(1, 10),
                end_date: at(1, 11),
                activity_type: Some("running".to_string()),
                native_activity_type: None,
                energy: Some(300.0),
                energy_unit: None,
                distance: Some(5000.0),
                distance_unit: None,
                swim_stroke_value: None,
                swim_stroke_unit: None,
                flights_climbed_value: None,
                flights_climbed_unit: None,
                duration: Some(3600.0),
                duration_unit: None,
                workout_events: Vec::new(),
                metadata: Default::default(),
                attribution: Default::default(),
            },
            crate::store::RawWorkout {
                uuid: None,
                start_date: at(2, 10),
                end_date: at(2, 11),
                activity_type: Some("running".to_string()),
                native_activity_type: None,
                energy: None,
                energy_unit: None,
                distance: None,
                distance_unit: None,
                swim_stroke_value: None,
                swim_stroke_unit: None,
                flights_climbed_value: None,
                flights_climbed_unit: None,
                duration: None,
                duration_unit: None,
                workout_events: Vec::new(),
                metadata: Default::default(),
                attribution: Default::default(),
            },
        ];
        let bridge = HealthBridge::new(store);

        let opts = QueryOptions::new("workouts", at(1, 0), at(3, 0));
        let result = bridge.query_aggregated(&opts).await.unwrap();
        match result {
            AggregateResult::Summary(bucket) => {
                assert_eq!(bucket.start_date, at(1, 10));
                assert_eq!(bucket.end_date, at(2, 11));
                match bucket.value {
                    AggregateValue::Activity(totals) => {
                        assert_eq!(
                            totals["running"],
                            ActivityTotals { duration: 7200.0, distance: 5000.0, calories: 300.0 }
                        );
                    }
                    other => panic!("expected activity totals, got {other:?}"),
                }
            }
            AggregateResult::Buckets(_) => panic!("expected a summary"),
        }
    }
}
