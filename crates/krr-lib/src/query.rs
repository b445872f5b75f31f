//! PromQL builders for every query the engine issues
//!
//! Label values are escaped for PromQL string literals, and pod names are
//! regex-escaped before being joined into the `pod=~` alternation.

use std::time::Duration;

/// Series reporting each ReplicaSet's controller
pub const REPLICASET_OWNER_SERIES: &str = "kube_replicaset_owner";
/// Series reporting each pod's direct owner
pub const POD_OWNER_SERIES: &str = "kube_pod_owner";
/// Presence series, one per pod container
pub const CONTAINER_INFO_SERIES: &str = "kube_pod_container_info";
pub const CPU_USAGE_SERIES: &str = "container_cpu_usage_seconds_total";
pub const SPEC_REQUESTS_SERIES: &str = "kube_pod_container_resource_requests";
pub const SPEC_LIMITS_SERIES: &str = "kube_pod_container_resource_limits";

/// Escape a value for use inside a double-quoted PromQL string
pub fn escape_label_value(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '\\' => escaped.push_str("\\\\"),
            '"' => escaped.push_str("\\\""),
            '\n' => escaped.push_str("\\n"),
            _ => escaped.push(c),
        }
    }
    escaped
}

/// Fully anchored alternation matching exactly the given pod names
///
/// The result is already escaped for embedding in a string literal.
pub fn pod_selector<S: AsRef<str>>(pods: &[S]) -> String {
    let pattern = pods
        .iter()
        .map(|p| regex::escape(p.as_ref()))
        .collect::<Vec<_>>()
        .join("|");
    escape_label_value(&pattern)
}

/// Render a duration the way PromQL range selectors expect, e.g. `30m`
pub fn format_duration(d: Duration) -> String {
    let mut secs = d.as_secs();
    if secs == 0 {
        return "0s".to_string();
    }

    let mut out = String::new();
    for (unit, size) in [("d", 86_400), ("h", 3_600), ("m", 60), ("s", 1)] {
        if secs >= size {
            out.push_str(&format!("{}{}", secs / size, unit));
            secs %= size;
        }
    }
    out
}

fn namespace_matcher(namespace: &str) -> String {
    if namespace.is_empty() {
        String::new()
    } else {
        format!("namespace=\"{}\"", escape_label_value(namespace))
    }
}

/// Last value of every ReplicaSet ownership series seen in the window
pub fn replicaset_owner(namespace: &str, days: u32) -> String {
    format!(
        "last_over_time({}{{{}}}[{}d])",
        REPLICASET_OWNER_SERIES,
        namespace_matcher(namespace),
        days
    )
}

/// Last value of every pod ownership series seen in the window
pub fn pod_owner(namespace: &str, days: u32) -> String {
    format!(
        "last_over_time({}{{{}}}[{}d])",
        POD_OWNER_SERIES,
        namespace_matcher(namespace),
        days
    )
}

/// Distinct container names that reported presence in the window
pub fn container_info(namespace: &str, pod_selector: &str, days: u32) -> String {
    format!(
        "count(last_over_time({}{{namespace=\"{}\",pod=~\"{}\"}}[{}d])) by (container)",
        CONTAINER_INFO_SERIES,
        escape_label_value(namespace),
        pod_selector,
        days
    )
}

/// Quantile over the window of the per-pod CPU rate
pub fn cpu_quantile(
    quantile: f64,
    namespace: &str,
    pod_selector: &str,
    container: &str,
    step: Duration,
    days: u32,
) -> String {
    let step = format_duration(step);
    format!(
        "quantile_over_time({},max(rate({}{{namespace=\"{}\",pod=~\"{}\",container=\"{}\"}}[{}])) by (container, pod, job)[{}d:{}])",
        quantile,
        CPU_USAGE_SERIES,
        escape_label_value(namespace),
        pod_selector,
        escape_label_value(container),
        step,
        days,
        step
    )
}

/// Peak over the window of a memory gauge
pub fn memory_peak(
    series: &str,
    namespace: &str,
    pod_selector: &str,
    container: &str,
    step: Duration,
    days: u32,
) -> String {
    format!(
        "max_over_time(max({}{{namespace=\"{}\",pod=~\"{}\",container=\"{}\"}}) by (container, pod, job)[{}d:{}])",
        series,
        escape_label_value(namespace),
        pod_selector,
        escape_label_value(container),
        days,
        format_duration(step)
    )
}

/// Currently configured requests or limits for cpu and memory
pub fn spec_resource(series: &str, namespace: &str, pod_selector: &str, container: &str) -> String {
    format!(
        "{}{{namespace=\"{}\",pod=~\"{}\",container=\"{}\",resource=~\"cpu|memory\"}}",
        series,
        escape_label_value(namespace),
        pod_selector,
        escape_label_value(container)
    )
}
