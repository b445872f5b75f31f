//! Resource recommendation engine for Kubernetes workloads
//!
//! This crate provides the core functionality for:
//! - Querying historical utilization from Prometheus
//! - Resolving pod ownership into logical workloads
//! - Percentile CPU and peak memory recommendations
//! - Periodic recommendation passes
//! - Health checks and observability

pub mod aggregate;
pub mod config;
pub mod containers;
pub mod engine;
pub mod error;
pub mod health;
pub mod models;
pub mod observability;
pub mod ownership;
pub mod prom;
pub mod query;
pub mod schedule;
pub mod spec_reader;
pub mod usage;

#[cfg(test)]
mod testing;

pub use config::{MemoryMetric, RecommenderConfig};
pub use engine::ResourceRecommender;
pub use error::{RecommendError, Result};
pub use health::{
    ComponentHealth, ComponentStatus, HealthRegistry, HealthResponse, ReadinessResponse,
};
pub use models::*;
pub use observability::{RecommenderMetrics, StructuredLogger};
pub use prom::{MetricQueryClient, PrometheusClient, PrometheusConfig, QueryValue, Sample};
pub use schedule::{RecommendLoop, ScheduleConfig};
