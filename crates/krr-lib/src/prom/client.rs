//! Prometheus HTTP API client

use super::{MetricQueryClient, QueryValue, Sample, Series};
use crate::config::DEFAULT_QUERY_TIMEOUT;
use crate::error::{RecommendError, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;
use url::Url;

/// Connection settings for a Prometheus-compatible endpoint
#[derive(Debug, Clone)]
pub struct PrometheusConfig {
    /// Base URL, e.g. "http://prometheus:9090/"
    pub endpoint: String,
    /// Optional HTTP basic auth
    pub username: Option<String>,
    pub password: Option<String>,
    /// Per-query timeout, also passed to the server
    pub timeout: Duration,
}

impl Default for PrometheusConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://localhost:9090".to_string(),
            username: None,
            password: None,
            timeout: DEFAULT_QUERY_TIMEOUT,
        }
    }
}

/// Instant-query client for the Prometheus HTTP API
pub struct PrometheusClient {
    client: Client,
    query_url: Url,
    username: Option<String>,
    password: Option<String>,
    timeout: Duration,
}

impl PrometheusClient {
    pub fn new(config: PrometheusConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| RecommendError::InvalidConfig(format!("http client: {}", e)))?;

        let mut base = config.endpoint.clone();
        if !base.ends_with('/') {
            base.push('/');
        }
        let query_url = Url::parse(&base)
            .and_then(|u| u.join("api/v1/query"))
            .map_err(|e| {
                RecommendError::InvalidConfig(format!(
                    "invalid prometheus endpoint '{}': {}",
                    config.endpoint, e
                ))
            })?;

        Ok(Self {
            client,
            query_url,
            username: config.username,
            password: config.password,
            timeout: config.timeout,
        })
    }

    pub fn query_url(&self) -> &Url {
        &self.query_url
    }
}

#[async_trait]
impl MetricQueryClient for PrometheusClient {
    async fn query(&self, query: &str, time: DateTime<Utc>) -> Result<QueryValue> {
        let time_param = format!("{:.3}", time.timestamp_millis() as f64 / 1000.0);
        let timeout_param = format!("{}ms", self.timeout.as_millis());

        // Form body: pod alternations outgrow proxy request-line limits
        let mut request = self.client.post(self.query_url.clone()).form(&[
            ("query", query),
            ("time", time_param.as_str()),
            ("timeout", timeout_param.as_str()),
        ]);
        if let Some(username) = &self.username {
            request = request.basic_auth(username, self.password.as_ref());
        }

        let response = request.send().await?;
        let status = response.status();
        let body = response.text().await?;

        match serde_json::from_str::<ApiResponse>(&body) {
            Ok(api) if api.status == "success" => match api.data {
                Some(data) => data.into_value(),
                None => Err(RecommendError::MalformedResult(
                    "success response without data".to_string(),
                )),
            },
            Ok(api) => Err(RecommendError::BackendUnavailable(format!(
                "{} ({}): {}",
                api.error_type.unwrap_or_else(|| "error".to_string()),
                status,
                api.error.unwrap_or_default()
            ))),
            Err(_) if !status.is_success() => Err(RecommendError::BackendUnavailable(format!(
                "HTTP {}: {}",
                status, body
            ))),
            Err(e) => Err(RecommendError::MalformedResult(format!(
                "undecodable response: {}",
                e
            ))),
        }
    }
}

// Wire types of the /api/v1/query envelope

#[derive(Debug, Deserialize)]
struct ApiResponse {
    status: String,
    data: Option<ApiData>,
    #[serde(rename = "errorType")]
    error_type: Option<String>,
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "resultType", content = "result", rename_all = "lowercase")]
enum ApiData {
    Vector(Vec<RawSample>),
    Matrix(Vec<RawSeries>),
    Scalar(RawPoint),
    String(RawPoint),
}

type RawPoint = (f64, String);

#[derive(Debug, Deserialize)]
struct RawSample {
    #[serde(default)]
    metric: HashMap<String, String>,
    value: RawPoint,
}

#[derive(Debug, Deserialize)]
struct RawSeries {
    #[serde(default)]
    metric: HashMap<String, String>,
    values: Vec<RawPoint>,
}

impl ApiData {
    fn into_value(self) -> Result<QueryValue> {
        Ok(match self {
            ApiData::Vector(samples) => QueryValue::Vector(
                samples
                    .into_iter()
                    .map(|s| {
                        Ok(Sample {
                            metric: s.metric,
                            value: parse_value(&s.value.1)?,
                            timestamp: s.value.0,
                        })
                    })
                    .collect::<Result<_>>()?,
            ),
            ApiData::Matrix(series) => QueryValue::Matrix(
                series
                    .into_iter()
                    .map(|s| {
                        let values = s
                            .values
                            .iter()
                            .map(|(ts, v)| parse_value(v).map(|v| (*ts, v)))
                            .collect::<Result<_>>()?;
                        Ok(Series {
                            metric: s.metric,
                            values,
                        })
                    })
                    .collect::<Result<_>>()?,
            ),
            ApiData::Scalar((_, v)) => QueryValue::Scalar(parse_value(&v)?),
            ApiData::String((_, v)) => QueryValue::String(v),
        })
    }
}

/// Sample values travel as strings, including the special float spellings
fn parse_value(raw: &str) -> Result<f64> {
    match raw {
        "NaN" => Ok(f64::NAN),
        "+Inf" | "Inf" => Ok(f64::INFINITY),
        "-Inf" => Ok(f64::NEG_INFINITY),
        _ => raw.parse().map_err(|_| {
            RecommendError::MalformedResult(format!("invalid sample value '{}'", raw))
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;

    fn client_for(server: &mockito::Server) -> PrometheusClient {
        PrometheusClient::new(PrometheusConfig {
            endpoint: server.url(),
            ..Default::default()
        })
        .unwrap()
    }

    #[test]
    fn test_query_url_keeps_path_prefix() {
        let client = PrometheusClient::new(PrometheusConfig {
            endpoint: "http://monitoring:9090/prometheus".to_string(),
            ..Default::default()
        })
        .unwrap();
        assert_eq!(
            client.query_url().as_str(),
            "http://monitoring:9090/prometheus/api/v1/query"
        );
    }

    #[test]
    fn test_invalid_endpoint_rejected() {
        let result = PrometheusClient::new(PrometheusConfig {
            endpoint: "not a url".to_string(),
            ..Default::default()
        });
        assert!(matches!(result, Err(RecommendError::InvalidConfig(_))));
    }

    #[test]
    fn test_parse_special_values() {
        assert!(parse_value("NaN").unwrap().is_nan());
        assert_eq!(parse_value("+Inf").unwrap(), f64::INFINITY);
        assert_eq!(parse_value("0.12").unwrap(), 0.12);
        assert!(parse_value("abc").is_err());
    }

    #[tokio::test]
    async fn test_query_decodes_vector() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/api/v1/query")
            .match_body(Matcher::UrlEncoded("query".into(), "up".into()))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                r#"{"status":"success","data":{"resultType":"vector","result":[
                    {"metric":{"pod":"app-1","namespace":"ns"},"value":[1700000000.5,"0.12"]}
                ]}}"#,
            )
            .create_async()
            .await;

        let value = client_for(&server).query("up", Utc::now()).await.unwrap();
        mock.assert_async().await;

        let samples = value.into_vector().unwrap();
        assert_eq!(samples.len(), 1);
        assert_eq!(samples[0].label("pod"), "app-1");
        assert_eq!(samples[0].value, 0.12);
        assert_eq!(samples[0].timestamp, 1700000000.5);
    }

    #[tokio::test]
    async fn test_long_query_sent_as_form_body() {
        let pods: Vec<String> = (0..2000).map(|i| format!("web-5f6d8c-{:05}", i)).collect();
        let query = format!("count(kube_pod_container_info{{pod=~\"{}\"}})", pods.join("|"));
        assert!(query.len() > 16 * 1024);

        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/api/v1/query")
            .match_header("content-type", "application/x-www-form-urlencoded")
            .match_body(Matcher::AllOf(vec![
                Matcher::UrlEncoded("query".into(), query.clone()),
                Matcher::UrlEncoded("timeout".into(), "5000ms".into()),
            ]))
            .with_status(200)
            .with_body(r#"{"status":"success","data":{"resultType":"vector","result":[]}}"#)
            .create_async()
            .await;

        let value = client_for(&server).query(&query, Utc::now()).await.unwrap();
        mock.assert_async().await;
        assert_eq!(value, QueryValue::Vector(vec![]));
    }

    #[tokio::test]
    async fn test_query_scalar_is_not_vector() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/api/v1/query")
            .match_body(Matcher::Any)
            .with_status(200)
            .with_body(
                r#"{"status":"success","data":{"resultType":"scalar","result":[1700000000,"3"]}}"#,
            )
            .create_async()
            .await;

        let value = client_for(&server).query("1+2", Utc::now()).await.unwrap();
        assert_eq!(value, QueryValue::Scalar(3.0));
        assert!(matches!(
            value.into_vector(),
            Err(RecommendError::MalformedResult(_))
        ));
    }

    #[tokio::test]
    async fn test_error_response_is_backend_unavailable() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/api/v1/query")
            .match_body(Matcher::Any)
            .with_status(503)
            .with_body(
                r#"{"status":"error","errorType":"unavailable","error":"storage not ready"}"#,
            )
            .create_async()
            .await;

        let err = client_for(&server)
            .query("up", Utc::now())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            RecommendError::BackendUnavailable(ref m) if m.contains("storage not ready")
        ));
    }

    #[tokio::test]
    async fn test_non_json_body_is_malformed() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/api/v1/query")
            .match_body(Matcher::Any)
            .with_status(200)
            .with_body("<html>proxy</html>")
            .create_async()
            .await;

        let err = client_for(&server)
            .query("up", Utc::now())
            .await
            .unwrap_err();
        assert!(matches!(err, RecommendError::MalformedResult(_)));
    }

    #[tokio::test]
    async fn test_basic_auth_header_sent() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/api/v1/query")
            .match_body(Matcher::Any)
            .match_header("authorization", "Basic dXNlcjpwYXNz")
            .with_status(200)
            .with_body(r#"{"status":"success","data":{"resultType":"vector","result":[]}}"#)
            .create_async()
            .await;

        let client = PrometheusClient::new(PrometheusConfig {
            endpoint: server.url(),
            username: Some("user".to_string()),
            password: Some("pass".to_string()),
            ..Default::default()
        })
        .unwrap();

        let value = client.query("up", Utc::now()).await.unwrap();
        mock.assert_async().await;
        assert_eq!(value, QueryValue::Vector(vec![]));
    }

    #[tokio::test]
    async fn test_unreachable_backend() {
        let client = PrometheusClient::new(PrometheusConfig {
            endpoint: "http://127.0.0.1:1".to_string(),
            timeout: Duration::from_millis(500),
            ..Default::default()
        })
        .unwrap();

        let err = client.query("up", Utc::now()).await.unwrap_err();
        assert!(matches!(err, RecommendError::BackendUnavailable(_)));
    }
}
