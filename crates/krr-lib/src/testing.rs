//! Scripted query client for engine tests

use crate::error::{RecommendError, Result};
use crate::prom::{MetricQueryClient, QueryValue, Sample};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Mutex;
use std::time::Duration;

pub fn sample(labels: &[(&str, &str)], value: f64) -> Sample {
    Sample {
        metric: labels
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect(),
        value,
        timestamp: 0.0,
    }
}

#[derive(Debug, Clone)]
pub enum Reply {
    Vector(Vec<Sample>),
    Scalar(f64),
    Unavailable,
}

struct Rule {
    fragments: Vec<String>,
    reply: Reply,
}

/// Answers each query with the first rule whose fragments all occur in it.
/// Unmatched queries get an empty vector.
#[derive(Default)]
pub struct ScriptedClient {
    rules: Vec<Rule>,
    delay: Option<Duration>,
    calls: Mutex<Vec<String>>,
}

impl ScriptedClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on(mut self, fragments: &[&str], reply: Reply) -> Self {
        self.rules.push(Rule {
            fragments: fragments.iter().map(|f| f.to_string()).collect(),
            reply,
        });
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl MetricQueryClient for ScriptedClient {
    async fn query(&self, query: &str, _time: DateTime<Utc>) -> Result<QueryValue> {
        self.calls.lock().unwrap().push(query.to_string());
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        let rule = self
            .rules
            .iter()
            .find(|r| r.fragments.iter().all(|f| query.contains(f.as_str())));

        match rule.map(|r| r.reply.clone()) {
            Some(Reply::Vector(samples)) => Ok(QueryValue::Vector(samples)),
            Some(Reply::Scalar(v)) => Ok(QueryValue::Scalar(v)),
            Some(Reply::Unavailable) => Err(RecommendError::BackendUnavailable(
                "connection refused".to_string(),
            )),
            None => Ok(QueryValue::Vector(Vec::new())),
        }
    }
}
