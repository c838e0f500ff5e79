use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use crate::agent::diagnose::{recommend, FailureAction};
use crate::charts::data::{synthesize, validate_points};
use crate::charts::{method_chain, ChartType, DataPoint, RenderMethod};
use crate::codegen::{self, TemplateOptions};
use crate::config::{clamp_timeout_secs, AppConfig};
use crate::error::AppError;
use crate::python::{CancelToken, ExecutionFailure, ExecutionRequest, ExecutionResult, SandboxExecutor};
use crate::theme::{derive_palette, style_for_with, StyleHints, StyleRecord, ThemeSeed};

/// Everything needed to draw one chart.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChartRequest {
    pub chart_type: ChartType,
    pub points: Vec<DataPoint>,
    #[serde(default)]
    pub seed: ThemeSeed,
    #[serde(default)]
    pub options: TemplateOptions,
    #[serde(default)]
    pub preferred_method: Option<RenderMethod>,
}

impl ChartRequest {
    pub fn new(chart_type: ChartType, points: Vec<DataPoint>) -> Self {
        Self {
            chart_type,
            points,
            seed: ThemeSeed::default(),
            options: TemplateOptions::default(),
            preferred_method: None,
        }
    }

    /// A request filled with deterministic synthetic data for `chart_type`.
    pub fn synthetic(chart_type: ChartType, rng_seed: u64) -> Self {
        let mut request = Self::new(chart_type, synthesize(chart_type, rng_seed));
        request.options.title = Some(chart_type.display_name().to_string());
        request
    }
}

/// What a successful or exhausted generation produced.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ChartArtifact {
    Diagram {
        markup: String,
    },
    Image {
        png_base64: String,
        source: String,
    },
    /// Every method failed; the last program and why it failed.
    SourceOnly {
        source: String,
        failure: ExecutionFailure,
        action: FailureAction,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum AttemptOutcome {
    Rendered,
    Unsupported { reason: String },
    Failed { failure: ExecutionFailure },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Attempt {
    pub method: RenderMethod,
    #[serde(flatten)]
    pub outcome: AttemptOutcome,
    pub duration_ms: u64,
}

/// Per-call metrics. Returned to the caller, never accumulated here.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GenerationReport {
    pub request_id: Uuid,
    pub chart_type: ChartType,
    pub attempts: Vec<Attempt>,
    pub total_duration_ms: u64,
}

impl GenerationReport {
    pub fn final_method(&self) -> Option<RenderMethod> {
        self.attempts.last().map(|a| a.method)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChartOutcome {
    pub artifact: ChartArtifact,
    pub style: StyleRecord,
    pub report: GenerationReport,
}

impl ChartOutcome {
    pub fn is_rendered(&self) -> bool {
        !matches!(self.artifact, ChartArtifact::SourceOnly { .. })
    }
}

fn elapsed_ms(started: Instant) -> u64 {
    started.elapsed().as_millis() as u64
}

/// Validates, styles, generates and executes charts, walking the render
/// method chain until one succeeds.
#[derive(Debug, Clone)]
pub struct ChartPipeline {
    executor: SandboxExecutor,
    timeout_secs: f64,
}

impl ChartPipeline {
    pub fn new(executor: SandboxExecutor, timeout: Duration) -> Self {
        Self {
            executor,
            timeout_secs: clamp_timeout_secs(timeout.as_secs_f64()),
        }
    }

    pub fn from_config(config: &AppConfig) -> Result<Self, AppError> {
        Ok(Self {
            executor: SandboxExecutor::from_config(config)?,
            timeout_secs: config.timeout_secs(),
        })
    }

    pub fn executor(&self) -> &SandboxExecutor {
        &self.executor
    }

    pub fn generate(&self, request: &ChartRequest) -> Result<ChartOutcome, AppError> {
        self.generate_with_cancel(request, &CancelToken::new())
    }

    pub fn generate_with_cancel(
        &self,
        request: &ChartRequest,
        cancel: &CancelToken,
    ) -> Result<ChartOutcome, AppError> {
        let started = Instant::now();
        let request_id = Uuid::new_v4();
        let chart_type = request.chart_type;

        validate_points(chart_type, &request.points)?;
        let palette = derive_palette(&request.seed);
        let hints = StyleHints::from_points(chart_type, &request.points);
        let style = style_for_with(chart_type, &request.seed, &palette, &hints);

        let chain = method_chain(chart_type, request.preferred_method);
        let mut attempts = Vec::with_capacity(chain.len());
        let mut last_failure: Option<(String, ExecutionFailure)> = None;
        let mut artifact = None;

        for method in chain {
            let attempt_started = Instant::now();
            let generated =
                match codegen::generate(chart_type, method, &request.points, &style, &request.options) {
                    Ok(generated) => generated,
                    Err(AppError::Unsupported(reason)) => {
                        warn!(%request_id, %chart_type, %method, %reason, "method cannot express chart, falling back");
                        attempts.push(Attempt {
                            method,
                            outcome: AttemptOutcome::Unsupported { reason },
                            duration_ms: elapsed_ms(attempt_started),
                        });
                        continue;
                    }
                    Err(e) => return Err(e),
                };

            match method {
                RenderMethod::DeclarativeDiagram => {
                    attempts.push(Attempt {
                        method,
                        outcome: AttemptOutcome::Rendered,
                        duration_ms: elapsed_ms(attempt_started),
                    });
                    artifact = Some(ChartArtifact::Diagram {
                        markup: generated.text,
                    });
                    break;
                }
                RenderMethod::ProgrammaticPlot => {
                    let execution = ExecutionRequest::new(generated.text.clone())
                        .with_timeout_secs(self.timeout_secs)?;
                    match self.executor.execute_with_cancel(&execution, cancel) {
                        ExecutionResult::Image { png_base64 } => {
                            attempts.push(Attempt {
                                method,
                                outcome: AttemptOutcome::Rendered,
                                duration_ms: elapsed_ms(attempt_started),
                            });
                            artifact = Some(ChartArtifact::Image {
                                png_base64,
                                source: generated.text,
                            });
                            break;
                        }
                        ExecutionResult::Failure(failure) => {
                            warn!(%request_id, %chart_type, reason = %failure.reason, exit_code = failure.exit_code, "plot execution failed");
                            attempts.push(Attempt {
                                method,
                                outcome: AttemptOutcome::Failed {
                                    failure: failure.clone(),
                                },
                                duration_ms: elapsed_ms(attempt_started),
                            });
                            let cancelled = cancel.is_cancelled();
                            last_failure = Some((generated.text, failure));
                            if cancelled {
                                break;
                            }
                        }
                    }
                }
            }
        }

        let artifact = match (artifact, last_failure) {
            (Some(artifact), _) => artifact,
            (None, Some((source, failure))) => {
                let action = recommend(&failure, false);
                ChartArtifact::SourceOnly {
                    source,
                    failure,
                    action,
                }
            }
            (None, None) => {
                return Err(AppError::Unsupported(format!(
                    "no render method can draw {}",
                    chart_type
                )))
            }
        };

        let report = GenerationReport {
            request_id,
            chart_type,
            attempts,
            total_duration_ms: elapsed_ms(started),
        };
        info!(
            %request_id,
            %chart_type,
            attempts = report.attempts.len(),
            rendered = !matches!(artifact, ChartArtifact::SourceOnly { .. }),
            duration_ms = report.total_duration_ms,
            "chart generation finished"
        );

        Ok(ChartOutcome {
            artifact,
            style,
            report,
        })
    }

    /// `generate` on the blocking pool.
    pub async fn generate_async(&self, request: ChartRequest) -> Result<ChartOutcome, AppError> {
        let pipeline = self.clone();
        tokio::task::spawn_blocking(move || pipeline.generate(&request))
            .await
            .map_err(|e| AppError::Execution(format!("render task failed: {}", e)))?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::python::{detector, installer, FailureReason};

    fn offline_pipeline() -> ChartPipeline {
        ChartPipeline::new(
            SandboxExecutor::new("/nonexistent/chartgen/python3"),
            Duration::from_secs(5),
        )
    }

    #[test]
    fn test_invalid_points_rejected_before_any_attempt() {
        let request = ChartRequest::new(ChartType::Pie, vec![DataPoint::new("only", 1.0)]);
        let result = offline_pipeline().generate(&request);
        assert!(matches!(result, Err(AppError::InvalidRequest(_))));
    }

    #[test]
    fn test_declarative_primary_needs_no_interpreter() {
        let outcome = offline_pipeline()
            .generate(&ChartRequest::synthetic(ChartType::Pie, 1))
            .unwrap();
        match &outcome.artifact {
            ChartArtifact::Diagram { markup } => assert!(markup.contains("pie showData")),
            other => panic!("expected diagram, got {:?}", other),
        }
        assert_eq!(outcome.report.attempts.len(), 1);
        assert_eq!(outcome.report.final_method(), Some(RenderMethod::DeclarativeDiagram));
        assert!(outcome.is_rendered());
    }

    #[test]
    fn test_unsupported_diagram_falls_back_to_plot() {
        let points = vec![
            DataPoint::new("Q1", 4.0).with_series("2023"),
            DataPoint::new("Q2", 6.0).with_series("2023"),
            DataPoint::new("Q1", 5.0).with_series("2024"),
            DataPoint::new("Q2", 7.0).with_series("2024"),
        ];
        let outcome = offline_pipeline()
            .generate(&ChartRequest::new(ChartType::BarVertical, points))
            .unwrap();

        let attempts = &outcome.report.attempts;
        assert_eq!(attempts.len(), 2);
        assert!(matches!(attempts[0].outcome, AttemptOutcome::Unsupported { .. }));
        assert_eq!(attempts[1].method, RenderMethod::ProgrammaticPlot);
        match &outcome.artifact {
            ChartArtifact::SourceOnly { source, failure, action } => {
                assert!(source.contains("ax.bar("));
                assert_eq!(failure.reason, FailureReason::LaunchError);
                assert_eq!(*action, FailureAction::SetupEnvironment);
            }
            other => panic!("expected source only, got {:?}", other),
        }
        assert!(!outcome.is_rendered());
    }

    #[test]
    fn test_preferred_programmatic_then_diagram() {
        let mut request = ChartRequest::synthetic(ChartType::Line, 2);
        request.preferred_method = Some(RenderMethod::ProgrammaticPlot);
        let outcome = offline_pipeline().generate(&request).unwrap();
        let methods: Vec<_> = outcome.report.attempts.iter().map(|a| a.method).collect();
        assert_eq!(
            methods,
            vec![RenderMethod::ProgrammaticPlot, RenderMethod::DeclarativeDiagram]
        );
        assert!(matches!(outcome.artifact, ChartArtifact::Diagram { .. }));
    }

    #[test]
    fn test_request_ids_are_unique() {
        let pipeline = offline_pipeline();
        let request = ChartRequest::synthetic(ChartType::Gantt, 3);
        let a = pipeline.generate(&request).unwrap();
        let b = pipeline.generate(&request).unwrap();
        assert_ne!(a.report.request_id, b.report.request_id);
    }

    #[test]
    fn test_request_deserializes_with_defaults() {
        let json = r#"{"chart_type": "bar-vertical", "points": [{"label": "a", "value": 1}, {"label": "b", "value": 2}]}"#;
        let request: ChartRequest = serde_json::from_str(json).unwrap();
        assert_eq!(request.chart_type, ChartType::BarVertical);
        assert_eq!(request.seed, ThemeSeed::default());
        assert!(request.preferred_method.is_none());
    }

    #[test]
    fn test_artifact_serializes_with_kind_tag() {
        let artifact = ChartArtifact::Diagram { markup: "pie".into() };
        let value = serde_json::to_value(&artifact).unwrap();
        assert_eq!(value["kind"], "diagram");
    }

    #[tokio::test]
    async fn test_histogram_renders_image_when_matplotlib_available() {
        let Ok(info) = detector::detect_python() else {
            eprintln!("skipping: no python interpreter found");
            return;
        };
        if !installer::is_package_installed(&info.path, "matplotlib") {
            eprintln!("skipping: matplotlib not installed");
            return;
        }
        let pipeline = ChartPipeline::new(SandboxExecutor::new(info.path), Duration::from_secs(60));
        let outcome = pipeline
            .generate_async(ChartRequest::synthetic(ChartType::Histogram, 8))
            .await
            .unwrap();
        assert!(matches!(outcome.artifact, ChartArtifact::Image { .. }));
    }
}
