pub mod agent;
pub mod ai;
pub mod charts;
pub mod codegen;
pub mod config;
pub mod error;
pub mod pipeline;
pub mod python;
pub mod telemetry;
pub mod theme;

pub use charts::{ChartType, DataPoint, RenderMethod};
pub use config::AppConfig;
pub use error::AppError;
pub use pipeline::{ChartArtifact, ChartOutcome, ChartPipeline, ChartRequest, GenerationReport};
pub use python::{ExecutionResult, SandboxExecutor};
pub use theme::{derive_palette, style_for, ThemeSeed};
