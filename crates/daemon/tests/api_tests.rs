//! Integration tests for the daemon API endpoints

use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use chrono::Utc;
use krr_daemon::api::{create_router, AppState};
use krr_lib::{
    health::{components, HealthRegistry},
    kinds, Container, CpuResource, MemoryResource, RecommendationReport, RecommenderMetrics,
    Resource, WorkloadInfo, WorkloadKey,
};
use std::sync::Arc;
use tower::ServiceExt;

async fn setup_test_app() -> (Router, Arc<AppState>) {
    let health_registry = HealthRegistry::new();
    health_registry.register(components::PROMETHEUS).await;
    health_registry.register(components::RECOMMENDER).await;

    let metrics = RecommenderMetrics::new();
    let state = Arc::new(AppState::new(health_registry, metrics));
    let router = create_router(state.clone());

    (router, state)
}

async fn get(app: Router, uri: &str) -> (StatusCode, Vec<u8>) {
    let response = app
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();

    let status = response.status();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, body.to_vec())
}

fn report() -> RecommendationReport {
    let mut api = WorkloadInfo::new(
        WorkloadKey::new("payments", kinds::DEPLOYMENT, "api"),
        vec!["api-7d9-xk2".to_string()],
    );
    let mut container = Container::new("api");
    container.request = Resource {
        cpu: CpuResource(0.12),
        mem: MemoryResource(104_857_600.0),
    };
    api.containers = vec![container];

    let db = WorkloadInfo::new(
        WorkloadKey::new("storage", kinds::STATEFUL_SET, "db"),
        vec!["db-0".to_string()],
    );

    RecommendationReport {
        generated_at: Utc::now(),
        namespace: String::new(),
        workloads: vec![api, db],
    }
}

#[tokio::test]
async fn test_healthz_returns_ok_when_healthy() {
    let (app, _state) = setup_test_app().await;

    let (status, body) = get(app, "/healthz").await;
    assert_eq!(status, StatusCode::OK);

    let health: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(health["status"], "healthy");
}

#[tokio::test]
async fn test_healthz_returns_ok_when_degraded() {
    let (app, state) = setup_test_app().await;

    state
        .health_registry
        .set_degraded(components::PROMETHEUS, "connection refused")
        .await;

    // Degraded still returns 200 (operational)
    let (status, body) = get(app, "/healthz").await;
    assert_eq!(status, StatusCode::OK);

    let health: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(health["status"], "degraded");
    assert_eq!(
        health["components"]["prometheus"]["message"],
        "connection refused"
    );
}

#[tokio::test]
async fn test_healthz_returns_503_when_unhealthy() {
    let (app, state) = setup_test_app().await;

    state
        .health_registry
        .set_unhealthy(components::RECOMMENDER, "Failed")
        .await;

    let (status, _) = get(app, "/healthz").await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn test_readyz_returns_503_before_first_pass() {
    let (app, _state) = setup_test_app().await;

    let (status, body) = get(app, "/readyz").await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);

    let readiness: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(readiness["ready"], false);
}

#[tokio::test]
async fn test_readyz_returns_ok_after_first_pass() {
    let (app, state) = setup_test_app().await;

    state
        .health_registry
        .record_success(Utc::now().timestamp())
        .await;

    let (status, body) = get(app, "/readyz").await;
    assert_eq!(status, StatusCode::OK);

    let readiness: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(readiness["ready"], true);
}

#[tokio::test]
async fn test_metrics_endpoint_returns_prometheus_format() {
    let (app, _state) = setup_test_app().await;

    let (status, body) = get(app, "/metrics").await;
    assert_eq!(status, StatusCode::OK);

    let text = String::from_utf8(body).unwrap();
    assert!(text.contains("krr_passes_completed_total"));
    assert!(text.contains("krr_query_latency_seconds"));
}

#[tokio::test]
async fn test_recommendations_unavailable_until_published() {
    let (app, _state) = setup_test_app().await;

    let (status, body) = get(app, "/api/v1/recommendations").await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);

    let error: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert!(error["error"].is_string());
}

#[tokio::test]
async fn test_recommendations_returns_latest_report() {
    let (app, state) = setup_test_app().await;
    state.publish(report()).await;

    let (status, body) = get(app, "/api/v1/recommendations").await;
    assert_eq!(status, StatusCode::OK);

    let report: RecommendationReport = serde_json::from_slice(&body).unwrap();
    assert_eq!(report.workloads.len(), 2);
    assert_eq!(report.workloads[0].key.name, "api");
    assert_eq!(
        report.workloads[0].containers[0].request.cpu,
        CpuResource(0.12)
    );
}

#[tokio::test]
async fn test_recommendations_filter_by_namespace() {
    let (app, state) = setup_test_app().await;
    state.publish(report()).await;

    let (status, body) = get(app, "/api/v1/recommendations?namespace=storage").await;
    assert_eq!(status, StatusCode::OK);

    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["namespace"], "storage");
    assert_eq!(json["workloads"].as_array().unwrap().len(), 1);
    assert_eq!(json["workloads"][0]["kind"], "StatefulSet");
}
