//! Output formatting utilities

use anyhow::Result;
use clap::ValueEnum;
use colored::Colorize;
use krr_lib::{CpuResource, MemoryResource, RecommendationReport, WorkloadInfo};
use serde::Serialize;
use tabled::{settings::Style, Table, Tabled};

/// Output format for CLI commands
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Table format (default)
    #[default]
    Table,
    /// JSON format
    Json,
}

impl OutputFormat {
    /// Parse a persisted default, falling back to table
    pub fn from_config(value: Option<&str>) -> Self {
        value
            .and_then(|v| OutputFormat::from_str(v, true).ok())
            .unwrap_or_default()
    }
}

const UNSET: &str = "unset";

/// Row for the recommendations table
#[derive(Debug, Tabled)]
pub struct RecommendationRow {
    #[tabled(rename = "Namespace")]
    pub namespace: String,
    #[tabled(rename = "Name")]
    pub name: String,
    #[tabled(rename = "Kind")]
    pub kind: String,
    #[tabled(rename = "Container")]
    pub container: String,
    #[tabled(rename = "CPU Req")]
    pub cpu_request: String,
    #[tabled(rename = "CPU Lim")]
    pub cpu_limit: String,
    #[tabled(rename = "Mem Req")]
    pub memory_request: String,
    #[tabled(rename = "Mem Lim")]
    pub memory_limit: String,
}

/// Row for the workloads table
#[derive(Debug, Tabled)]
pub struct WorkloadRow {
    #[tabled(rename = "Namespace")]
    pub namespace: String,
    #[tabled(rename = "Name")]
    pub name: String,
    #[tabled(rename = "Kind")]
    pub kind: String,
    #[tabled(rename = "Pods")]
    pub pods: usize,
    #[tabled(rename = "Pod Names")]
    pub pod_names: String,
}

/// Print a value as pretty JSON
pub fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

pub fn print_table<T: Tabled>(rows: Vec<T>) {
    let table = Table::new(rows).with(Style::rounded()).to_string();
    println!("{}", table);
}

/// Print a success message
pub fn print_success(message: &str) {
    println!("{} {}", "✓".green().bold(), message);
}

/// Print an error message
pub fn print_error(message: &str) {
    eprintln!("{} {}", "✗".red().bold(), message);
}

/// Print a warning message
pub fn print_warning(message: &str) {
    println!("{} {}", "⚠".yellow().bold(), message);
}

/// Print an info message
pub fn print_info(message: &str) {
    println!("{} {}", "ℹ".blue().bold(), message);
}

/// Shorten `name` to at most `max` characters, 0 disables truncation
pub fn truncate_name(name: &str, max: usize) -> String {
    if max == 0 || name.chars().count() <= max {
        return name.to_string();
    }
    let mut short: String = name.chars().take(max.saturating_sub(1)).collect();
    short.push('…');
    short
}

pub fn format_cpu(cpu: CpuResource) -> String {
    if cpu.is_zero() {
        UNSET.to_string()
    } else {
        cpu.to_string()
    }
}

pub fn format_memory(mem: MemoryResource) -> String {
    if mem.is_zero() {
        UNSET.to_string()
    } else {
        mem.to_string()
    }
}

/// `spec -> recommended` when spec values are shown, otherwise the recommendation
pub fn diff_cell(spec: String, recommended: String, show_spec: bool) -> String {
    if show_spec {
        format!("{} -> {}", spec, recommended)
    } else {
        recommended
    }
}

/// One row per container; only the first row of a workload carries its identity
pub fn recommendation_rows(
    workloads: &[WorkloadInfo],
    name_max_width: usize,
    show_spec: bool,
) -> Vec<RecommendationRow> {
    let mut rows = Vec::new();
    for workload in workloads {
        for (i, c) in workload.containers.iter().enumerate() {
            let (namespace, name, kind) = if i == 0 {
                (
                    workload.key.namespace.clone(),
                    truncate_name(&workload.key.name, name_max_width),
                    workload.key.kind.clone(),
                )
            } else {
                Default::default()
            };

            rows.push(RecommendationRow {
                namespace,
                name,
                kind,
                container: c.name.clone(),
                cpu_request: diff_cell(
                    format_cpu(c.spec_request.cpu),
                    format_cpu(c.request.cpu),
                    show_spec,
                ),
                cpu_limit: diff_cell(
                    format_cpu(c.spec_limit.cpu),
                    format_cpu(c.limit.cpu),
                    show_spec,
                ),
                memory_request: diff_cell(
                    format_memory(c.spec_request.mem),
                    format_memory(c.request.mem),
                    show_spec,
                ),
                memory_limit: diff_cell(
                    format_memory(c.spec_limit.mem),
                    format_memory(c.limit.mem),
                    show_spec,
                ),
            });
        }
    }
    rows
}

pub fn workload_rows(workloads: &[WorkloadInfo], name_max_width: usize) -> Vec<WorkloadRow> {
    workloads
        .iter()
        .map(|w| WorkloadRow {
            namespace: w.key.namespace.clone(),
            name: truncate_name(&w.key.name, name_max_width),
            kind: w.key.kind.clone(),
            pods: w.pods.len(),
            pod_names: w.pods.join(", "),
        })
        .collect()
}

/// Render a report in the requested format
pub fn print_report(
    report: &RecommendationReport,
    format: OutputFormat,
    name_max_width: usize,
    show_spec: bool,
) -> Result<()> {
    match format {
        OutputFormat::Json => print_json(report)?,
        OutputFormat::Table => {
            let rows = recommendation_rows(&report.workloads, name_max_width, show_spec);
            if rows.is_empty() {
                print_warning("No workloads with container data found");
                return Ok(());
            }
            print_table(rows);

            let summary = report.summary();
            println!(
                "\nTotal: {} workloads, {} containers (generated {})",
                summary.workloads,
                summary.containers,
                report.generated_at.format("%Y-%m-%d %H:%M:%S UTC")
            );
            if summary.containers_with_unset > 0 {
                print_warning(&format!(
                    "{} containers have metrics without data, shown as {}",
                    summary.containers_with_unset, UNSET
                ));
            }
        }
    }
    Ok(())
}
