//! Query dispatch
//!
//! Routes a generic query to the boundary call its type family needs,
//! chains the follow-up calls for derived types sequentially, and hands the
//! raw results to the normalizer. One generic query maps to at most two
//! boundary calls.

use chrono::Datelike;
use tracing::{debug, warn};

use crate::bridge::HealthBridge;
use crate::error::BridgeError;
use crate::normalizer::Normalizer;
use crate::registry::{DataTypeDescriptor, TypeFamily};
use crate::store::{HealthStore, SampleQuery};
use crate::types::{DateOfBirthValue, NormalizedSample, QueryOptions, SampleValue};

impl<S: HealthStore> HealthBridge<S> {
    /// Run a generic query and return the normalized result set.
    ///
    /// Characteristics resolve to a one-element result; derived types issue a
    /// second boundary call for their counterpart and append its records.
    pub async fn query(&self, opts: &QueryOptions) -> Result<Vec<NormalizedSample>, BridgeError> {
        let descriptor = self
            .registry
            .descriptor(&opts.data_type)
            .ok_or_else(|| BridgeError::UnknownDataType(opts.data_type.clone()))?;
        debug!(data_type = %opts.data_type, family = ?descriptor.family, "dispatching query");

        let normalizer = Normalizer::new(&self.registry);
        match descriptor.family {
            TypeFamily::Characteristic => self.query_characteristic(opts, descriptor, &normalizer).await,
            TypeFamily::Workout => self.query_workouts(opts, descriptor, &normalizer).await,
            TypeFamily::Correlation => self.query_correlation(opts, descriptor, &normalizer).await,
            TypeFamily::ActivitySummary => {
                let raw = self
                    .store
                    .query_activity_summary(opts.start_date, opts.end_date)
                    .await?;
                Ok(raw.iter().map(|r| normalizer.activity_summary(r)).collect())
            }
            TypeFamily::Electrocardiogram => {
                let raw = self
                    .store
                    .query_electrocardiogram(opts.start_date, opts.end_date)
                    .await?;
                Ok(raw.iter().map(|r| normalizer.electrocardiogram(r)).collect())
            }
            TypeFamily::Quantity | TypeFamily::Category => {
                self.query_samples(opts, descriptor, &normalizer).await
            }
        }
    }

    async fn query_characteristic(
        &self,
        opts: &QueryOptions,
        descriptor: &DataTypeDescriptor,
        normalizer: &Normalizer<'_>,
    ) -> Result<Vec<NormalizedSample>, BridgeError> {
        let value = match opts.data_type.as_str() {
            "gender" => SampleValue::Text(self.store.read_gender().await?),
            _ => {
                let date = self.store.read_date_of_birth().await?;
                SampleValue::Date(DateOfBirthValue {
                    day: date.day(),
                    month: date.month(),
                    year: date.year(),
                })
            }
        };
        Ok(vec![normalizer.characteristic(
            value,
            descriptor.primary_native(),
            opts.start_date,
            opts.end_date,
        )])
    }

    /// The boundary returns every workout regardless of the requested range,
    /// so range filtering happens here. `activity` appends sleep-analysis
    /// samples after the workouts.
    async fn query_workouts(
        &self,
        opts: &QueryOptions,
        descriptor: &DataTypeDescriptor,
        normalizer: &Normalizer<'_>,
    ) -> Result<Vec<NormalizedSample>, BridgeError> {
        let workouts = self.store.find_workouts(opts.start_date, opts.end_date).await?;

        let mut samples = Vec::new();
        for workout in &workouts {
            if workout.start_date < opts.start_date || workout.end_date > opts.end_date {
                warn!(
                    start = %workout.start_date,
                    end = %workout.end_date,
                    "dropping workout outside the requested range"
                );
                continue;
            }
            samples.push(normalizer.workout(workout));
        }

        if let Some(counterpart) = descriptor.derived_counterpart {
            let sleep = self
                .store
                .query_sample_type(&SampleQuery {
                    sample_type: counterpart.to_string(),
                    start_date: opts.start_date,
                    end_date: opts.end_date,
                    unit: None,
                })
                .await?;
            samples.extend(sleep.iter().map(|raw| normalizer.sleep_sample(raw)));
        }

        Ok(samples)
    }

    async fn query_correlation(
        &self,
        opts: &QueryOptions,
        descriptor: &DataTypeDescriptor,
        normalizer: &Normalizer<'_>,
    ) -> Result<Vec<NormalizedSample>, BridgeError> {
        let raw = self
            .store
            .query_correlation_type(&crate::store::CorrelationQuery {
                correlation_type: descriptor.primary_native().to_string(),
                start_date: opts.start_date,
                end_date: opts.end_date,
                units: descriptor.units.iter().map(|u| u.to_string()).collect(),
            })
            .await?;
        Ok(raw
            .iter()
            .map(|r| normalizer.correlation(r, &opts.data_type))
            .collect())
    }

    async fn query_samples(
        &self,
        opts: &QueryOptions,
        descriptor: &DataTypeDescriptor,
        normalizer: &Normalizer<'_>,
    ) -> Result<Vec<NormalizedSample>, BridgeError> {
        let unit = opts
            .unit
            .clone()
            .or_else(|| descriptor.unit().map(String::from));

        let raw = self
            .store
            .query_sample_type(&SampleQuery {
                sample_type: descriptor.primary_native().to_string(),
                start_date: opts.start_date,
                end_date: opts.end_date,
                unit: unit.clone(),
            })
            .await?;
        let mut samples: Vec<NormalizedSample> = raw
            .iter()
            .map(|r| normalizer.sample(r, &opts.data_type, unit.as_deref()))
            .collect();

        // The counterpart query is chained after the primary one resolves,
        // never issued in parallel.
        if let Some(counterpart) = descriptor.derived_counterpart {
            let extra = self
                .store
                .query_sample_type(&SampleQuery {
                    sample_type: counterpart.to_string(),
                    start_date: opts.start_date,
                    end_date: opts.end_date,
                    unit: unit.clone(),
                })
                .await?;
            samples.extend(
                extra
                    .iter()
                    .map(|r| normalizer.sample(r, &opts.data_type, unit.as_deref())),
            );
        }

        Ok(samples)
    }
}
