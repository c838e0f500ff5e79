//! Tracing setup and the opt-in JSONL generation trace log.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

use crate::charts::{ChartType, RenderMethod};
use crate::error::AppError;
use crate::pipeline::{AttemptOutcome, ChartArtifact, ChartOutcome, ChartRequest};
use crate::python::FailureReason;

const TRACE_VERSION: u32 = 1;
const TRACE_FILE: &str = "generation_traces_v1.jsonl";

/// Install a compact stderr subscriber. `RUST_LOG` overrides `default_filter`.
///
/// Returns `false` when a global subscriber is already set.
pub fn init_tracing(default_filter: &str) -> bool {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_filter))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .compact()
        .try_init()
        .is_ok()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationTrace {
    pub version: u32,
    pub timestamp_ms: i64,
    pub request_id: Uuid,
    pub request_hash: String,
    pub chart_type: ChartType,
    pub point_count: usize,
    pub final_method: Option<RenderMethod>,
    pub rendered: bool,
    pub attempts: usize,
    pub failure_reason: Option<FailureReason>,
    pub duration_ms: u64,
}

impl GenerationTrace {
    pub fn from_outcome(request: &ChartRequest, outcome: &ChartOutcome) -> Result<Self, AppError> {
        let report = &outcome.report;
        let failure_reason = match &outcome.artifact {
            ChartArtifact::SourceOnly { failure, .. } => Some(failure.reason),
            _ => report.attempts.iter().rev().find_map(|a| match &a.outcome {
                AttemptOutcome::Failed { failure } => Some(failure.reason),
                _ => None,
            }),
        };

        Ok(Self {
            version: TRACE_VERSION,
            timestamp_ms: chrono::Utc::now().timestamp_millis(),
            request_id: report.request_id,
            request_hash: hash_request(&serde_json::to_string(request)?),
            chart_type: request.chart_type,
            point_count: request.points.len(),
            final_method: report.final_method(),
            rendered: outcome.is_rendered(),
            attempts: report.attempts.len(),
            failure_reason,
            duration_ms: report.total_duration_ms,
        })
    }
}

/// First 16 hex digits of the SHA-256 of `text`.
pub fn hash_request(text: &str) -> String {
    Sha256::digest(text.as_bytes())
        .iter()
        .take(8)
        .map(|b| format!("{:02x}", b))
        .collect()
}

pub fn telemetry_dir() -> Result<PathBuf, AppError> {
    let base = dirs::config_dir()
        .ok_or_else(|| AppError::ConfigError("Cannot resolve config directory".to_string()))?;
    Ok(base.join("chartgen-studio").join("telemetry"))
}

pub fn write_trace(trace: &GenerationTrace) -> Result<(), AppError> {
    write_trace_to(&telemetry_dir()?, trace)
}

/// Append one JSON line to the trace log in `dir`.
pub fn write_trace_to(dir: &Path, trace: &GenerationTrace) -> Result<(), AppError> {
    fs::create_dir_all(dir)?;
    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(dir.join(TRACE_FILE))?;

    let line = serde_json::to_string(trace)?;
    writeln!(file, "{}", line)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::ChartPipeline;
    use crate::python::SandboxExecutor;
    use std::time::Duration;

    fn offline_outcome(request: &ChartRequest) -> ChartOutcome {
        ChartPipeline::new(SandboxExecutor::new("/nonexistent/python3"), Duration::from_secs(5))
            .generate(request)
            .unwrap()
    }

    #[test]
    fn test_hash_request_stable_and_short() {
        let a = hash_request("monthly revenue");
        assert_eq!(a, hash_request("monthly revenue"));
        assert_ne!(a, hash_request("monthly costs"));
        assert_eq!(a.len(), 16);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_trace_from_diagram_outcome() {
        let request = ChartRequest::synthetic(ChartType::Pie, 4);
        let trace = GenerationTrace::from_outcome(&request, &offline_outcome(&request)).unwrap();
        assert!(trace.rendered);
        assert_eq!(trace.final_method, Some(RenderMethod::DeclarativeDiagram));
        assert_eq!(trace.point_count, request.points.len());
        assert!(trace.failure_reason.is_none());
    }

    #[test]
    fn test_trace_records_failure_reason() {
        let request = ChartRequest::synthetic(ChartType::Histogram, 4);
        let trace = GenerationTrace::from_outcome(&request, &offline_outcome(&request)).unwrap();
        assert!(!trace.rendered);
        assert_eq!(trace.failure_reason, Some(FailureReason::LaunchError));
    }

    #[test]
    fn test_write_trace_appends_lines() {
        let dir = tempfile::tempdir().unwrap();
        let request = ChartRequest::synthetic(ChartType::Line, 1);
        let trace = GenerationTrace::from_outcome(&request, &offline_outcome(&request)).unwrap();

        write_trace_to(dir.path(), &trace).unwrap();
        write_trace_to(dir.path(), &trace).unwrap();

        let contents = fs::read_to_string(dir.path().join(TRACE_FILE)).unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 2);
        let parsed: GenerationTrace = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(parsed, trace);
    }
}
