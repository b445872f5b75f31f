//! Monitoring backend access
//!
//! This module defines the query boundary the engine depends on and a
//! Prometheus HTTP API implementation of it. Only instant queries are needed:
//! every range computation is expressed as a PromQL subquery.

mod client;

pub use client::{PrometheusClient, PrometheusConfig};

use crate::error::{RecommendError, Result};
use crate::observability::RecommenderMetrics;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tracing::debug;

/// One element of an instant vector
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Sample {
    pub metric: HashMap<String, String>,
    pub value: f64,
    pub timestamp: f64,
}

impl Sample {
    /// Label value, or an empty string when the series lacks the label
    pub fn label(&self, name: &str) -> &str {
        self.metric.get(name).map(String::as_str).unwrap_or("")
    }
}

/// One series of a range vector
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Series {
    pub metric: HashMap<String, String>,
    pub values: Vec<(f64, f64)>,
}

/// Decoded query result
#[derive(Debug, Clone, PartialEq)]
pub enum QueryValue {
    Vector(Vec<Sample>),
    Matrix(Vec<Series>),
    Scalar(f64),
    String(String),
}

impl QueryValue {
    pub fn type_name(&self) -> &'static str {
        match self {
            QueryValue::Vector(_) => "vector",
            QueryValue::Matrix(_) => "matrix",
            QueryValue::Scalar(_) => "scalar",
            QueryValue::String(_) => "string",
        }
    }

    /// Unwrap an instant vector. An empty vector is not an error.
    pub fn into_vector(self) -> Result<Vec<Sample>> {
        match self {
            QueryValue::Vector(samples) => Ok(samples),
            other => Err(RecommendError::MalformedResult(format!(
                "not vector type, {}",
                other.type_name()
            ))),
        }
    }
}

/// Trait for monitoring backends that evaluate PromQL
#[async_trait]
pub trait MetricQueryClient: Send + Sync {
    /// Evaluate `query` at `time`
    async fn query(&self, query: &str, time: DateTime<Utc>) -> Result<QueryValue>;
}

/// Run an instant query expecting a vector result.
///
/// A query still pending after `timeout` fails as `BackendUnavailable`.
pub async fn query_vector(
    client: &dyn MetricQueryClient,
    query: &str,
    time: DateTime<Utc>,
    timeout: Duration,
) -> Result<Vec<Sample>> {
    let start = Instant::now();
    let result = match tokio::time::timeout(timeout, client.query(query, time)).await {
        Ok(result) => result,
        Err(_) => Err(RecommendError::BackendUnavailable(format!(
            "query timed out after {}ms",
            timeout.as_millis()
        ))),
    };
    let elapsed = start.elapsed();

    let metrics = RecommenderMetrics::new();
    metrics.observe_query_latency(elapsed.as_secs_f64());
    if result.is_err() {
        metrics.inc_query_errors();
    }

    debug!(
        query = %query,
        elapsed_ms = elapsed.as_millis(),
        ok = result.is_ok(),
        "Query evaluated"
    );
    result?.into_vector()
}

/// Largest finite value across samples, `NoData` when there is none
pub fn max_finite_value(samples: &[Sample], query: &str) -> Result<f64> {
    samples
        .iter()
        .map(|s| s.value)
        .filter(|v| v.is_finite())
        .fold(None, |acc: Option<f64>, v| Some(acc.map_or(v, |a| a.max(v))))
        .ok_or_else(|| RecommendError::NoData(query.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{sample as labelled, Reply, ScriptedClient};

    fn sample(value: f64) -> Sample {
        Sample {
            value,
            ..Default::default()
        }
    }

    #[test]
    fn test_missing_label_is_empty() {
        let mut s = sample(1.0);
        s.metric.insert("pod".to_string(), "app-1".to_string());
        assert_eq!(s.label("pod"), "app-1");
        assert_eq!(s.label("container"), "");
    }

    #[test]
    fn test_into_vector_rejects_other_types() {
        assert!(QueryValue::Vector(vec![]).into_vector().unwrap().is_empty());
        assert!(matches!(
            QueryValue::Scalar(1.0).into_vector(),
            Err(RecommendError::MalformedResult(_))
        ));
        assert!(matches!(
            QueryValue::Matrix(vec![]).into_vector(),
            Err(RecommendError::MalformedResult(_))
        ));
    }

    #[test]
    fn test_max_finite_value() {
        let samples = vec![sample(0.2), sample(f64::NAN), sample(0.5), sample(f64::INFINITY)];
        assert_eq!(max_finite_value(&samples, "q").unwrap(), 0.5);

        assert!(matches!(
            max_finite_value(&[], "q"),
            Err(RecommendError::NoData(_))
        ));
        assert!(matches!(
            max_finite_value(&[sample(f64::NAN)], "q"),
            Err(RecommendError::NoData(_))
        ));
    }

    #[tokio::test]
    async fn test_query_vector_times_out() {
        let client = ScriptedClient::new()
            .on(&["up"], Reply::Vector(vec![labelled(&[("job", "node")], 1.0)]))
            .with_delay(Duration::from_secs(30));

        let err = query_vector(&client, "up", Utc::now(), Duration::from_millis(20))
            .await
            .unwrap_err();
        assert!(matches!(err, RecommendError::BackendUnavailable(_)));
        assert!(err.is_backend_failure());
    }

    #[tokio::test]
    async fn test_query_vector_within_timeout() {
        let client = ScriptedClient::new()
            .on(&["up"], Reply::Vector(vec![labelled(&[("job", "node")], 1.0)]))
            .with_delay(Duration::from_millis(5));

        let samples = query_vector(&client, "up", Utc::now(), Duration::from_secs(5))
            .await
            .unwrap();
        assert_eq!(samples.len(), 1);
        assert_eq!(samples[0].label("job"), "node");
    }
}
