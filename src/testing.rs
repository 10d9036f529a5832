//! Scripted in-memory boundary used by the facade tests.
//!
//! Responses are configured up front through public fields; every boundary
//! call is recorded so tests can assert on call order and payloads.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};

use crate::error::StoreError;
use crate::store::{
    AggregatedQuery, AuthorizationStatus, CorrelationQuery, DeleteSamplesRequest, HealthStore,
    RawActivitySummary, RawAggregateBucket, RawCorrelation, RawEcgSample, RawSample, RawWorkout,
    SampleQuery, SaveCorrelationRequest, SaveSampleRequest, SaveWorkoutRequest, StoreResult,
};

#[derive(Default)]
pub(crate) struct MockHealthStore {
    pub available: bool,
    pub gender: String,
    pub date_of_birth: Option<NaiveDate>,
    /// Raw samples keyed by native sample type
    pub samples: HashMap<String, Vec<RawSample>>,
    pub correlations: Vec<RawCorrelation>,
    pub workouts: Vec<RawWorkout>,
    /// Native aggregation buckets keyed by sample type
    pub aggregates: HashMap<String, Vec<RawAggregateBucket>>,
    /// Native sums keyed by sample type; missing types sum to zero
    pub sums: HashMap<String, f64>,
    pub activity_summaries: Vec<RawActivitySummary>,
    pub ecg_samples: Vec<RawEcgSample>,
    /// Native types reported as denied; everything else is authorized
    pub denied: Vec<String>,
    pub calls: Mutex<Vec<String>>,
    pub sample_queries: Mutex<Vec<SampleQuery>>,
    pub saved_samples: Mutex<Vec<SaveSampleRequest>>,
    pub saved_workouts: Mutex<Vec<SaveWorkoutRequest>>,
    pub saved_correlations: Mutex<Vec<SaveCorrelationRequest>>,
    pub deletes: Mutex<Vec<DeleteSamplesRequest>>,
    pub auth_requests: Mutex<Vec<(Vec<String>, Vec<String>)>>,
}

impl MockHealthStore {
    fn record(&self, call: impl Into<String>) {
        self.calls.lock().unwrap().push(call.into());
    }
}

#[async_trait]
impl HealthStore for MockHealthStore {
    async fn is_available(&self) -> StoreResult<bool> {
        self.record("is_available");
        Ok(self.available)
    }

    async fn read_gender(&self) -> StoreResult<String> {
        self.record("read_gender");
        Ok(self.gender.clone())
    }

    async fn read_date_of_birth(&self) -> StoreResult<NaiveDate> {
        self.record("read_date_of_birth");
        self.date_of_birth
            .ok_or_else(|| StoreError::new("no date of birth on record"))
    }

    async fn find_workouts(
        &self,
        _start_date: DateTime<Utc>,
        _end_date: DateTime<Utc>,
    ) -> StoreResult<Vec<RawWorkout>> {
        self.record("find_workouts");
        Ok(self.workouts.clone())
    }

    async fn query_sample_type(&self, query: &SampleQuery) -> StoreResult<Vec<RawSample>> {
        self.record(format!("query_sample_type:{}", query.sample_type));
        self.sample_queries.lock().unwrap().push(query.clone());
        Ok(self.samples.get(&query.sample_type).cloned().unwrap_or_default())
    }

    async fn query_correlation_type(
        &self,
        query: &CorrelationQuery,
    ) -> StoreResult<Vec<RawCorrelation>> {
        self.record(format!("query_correlation_type:{}", query.correlation_type));
        Ok(self.correlations.clone())
    }

    async fn query_aggregated(
        &self,
        query: &AggregatedQuery,
    ) -> StoreResult<Vec<RawAggregateBucket>> {
        self.record(format!("query_aggregated:{}", query.sample_type));
        Ok(self.aggregates.get(&query.sample_type).cloned().unwrap_or_default())
    }

    async fn sum_quantity_type(&self, query: &SampleQuery) -> StoreResult<f64> {
        self.record(format!("sum_quantity_type:{}", query.sample_type));
        Ok(self.sums.get(&query.sample_type).copied().unwrap_or_default())
    }

    async fn query_activity_summary(
        &self,
        _start_date: DateTime<Utc>,
        _end_date: DateTime<Utc>,
    ) -> StoreResult<Vec<RawActivitySummary>> {
        self.record("query_activity_summary");
        Ok(self.activity_summaries.clone())
    }

    async fn query_electrocardiogram(
        &self,
        _start_date: DateTime<Utc>,
        _end_date: DateTime<Utc>,
    ) -> StoreResult<Vec<RawEcgSample>> {
        self.record("query_electrocardiogram");
        Ok(self.ecg_samples.clone())
    }

    async fn save_sample(&self, request: &SaveSampleRequest) -> StoreResult<()> {
        self.record(format!("save_sample:{}", request.sample_type));
        self.saved_samples.lock().unwrap().push(request.clone());
        Ok(())
    }

    async fn save_workout(&self, request: &SaveWorkoutRequest) -> StoreResult<()> {
        self.record("save_workout");
        self.saved_workouts.lock().unwrap().push(request.clone());
        Ok(())
    }

    async fn save_correlation(&self, request: &SaveCorrelationRequest) -> StoreResult<()> {
        self.record(format!("save_correlation:{}", request.correlation_type));
        self.saved_correlations.lock().unwrap().push(request.clone());
        Ok(())
    }

    async fn delete_samples(&self, request: &DeleteSamplesRequest) -> StoreResult<()> {
        self.record(format!("delete_samples:{}", request.sample_type));
        self.deletes.lock().unwrap().push(request.clone());
        Ok(())
    }

    async fn authorization_status(&self, native_type: &str) -> StoreResult<AuthorizationStatus> {
        self.record(format!("authorization_status:{native_type}"));
        if self.denied.iter().any(|d| d == native_type) {
            Ok(AuthorizationStatus::Denied)
        } else {
            Ok(AuthorizationStatus::Authorized)
        }
    }

    async fn request_authorization(
        &self,
        read_types: &[String],
        write_types: &[String],
    ) -> StoreResult<()> {
        self.record("request_authorization");
        self.auth_requests
            .lock()
            .unwrap()
            .push((read_types.to_vec(), write_types.to_vec()));
        Ok(())
    }
}
