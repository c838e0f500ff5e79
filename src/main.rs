use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing::{error, info, warn};

use chartgen_studio::agent::planner::{ChartPlanner, KeywordPlanner};
use chartgen_studio::charts::data::synthesize;
use chartgen_studio::charts::strategy::all_strategies;
use chartgen_studio::python::{detector, harness, installer, venv};
use chartgen_studio::telemetry::{self, GenerationTrace};
use chartgen_studio::theme::style_for;
use chartgen_studio::{
    derive_palette, AppConfig, AppError, ChartArtifact, ChartPipeline, ChartRequest, ChartType,
    ExecutionResult, RenderMethod, SandboxExecutor, ThemeSeed,
};

#[derive(Parser, Debug)]
#[command(name = "chartgen", version, about = "Themed analytics charts via Mermaid or sandboxed matplotlib")]
struct Cli {
    /// Config file to use instead of the per-user one.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the palette and style derived from a theme seed.
    Palette {
        /// YAML theme seed; defaults to the configured theme.
        #[arg(long)]
        seed: Option<PathBuf>,
        /// Also print the style record for this chart type.
        #[arg(long = "type")]
        chart_type: Option<ChartType>,
    },
    /// Print the chart strategy table.
    Strategies,
    /// Run a plotting script in the sandbox.
    Exec {
        file: PathBuf,
        #[arg(long)]
        timeout: Option<f64>,
        /// Where to write the PNG.
        #[arg(long, short)]
        out: Option<PathBuf>,
    },
    /// Generate a chart from a request file, synthetic data or a prompt.
    Render {
        /// Chart type; inferred from --prompt when omitted.
        #[arg(long = "type")]
        chart_type: Option<ChartType>,
        /// Free-text description used to pick the chart type.
        #[arg(long)]
        prompt: Option<String>,
        /// JSON `ChartRequest` or a JSON array of data points.
        #[arg(long)]
        data: Option<PathBuf>,
        /// Synthetic data seed, used when --data is absent.
        #[arg(long, default_value_t = 42)]
        synthetic: u64,
        /// YAML theme seed.
        #[arg(long)]
        seed: Option<PathBuf>,
        #[arg(long)]
        method: Option<RenderMethod>,
        #[arg(long)]
        title: Option<String>,
        #[arg(long, short)]
        out: Option<PathBuf>,
    },
    /// Manage the Python environment.
    Python {
        #[command(subcommand)]
        action: PythonAction,
    },
}

#[derive(Subcommand, Debug)]
enum PythonAction {
    /// Report interpreter, venv and matplotlib status.
    Check,
    /// Create the managed venv and install matplotlib into it.
    Setup,
}

#[derive(Debug, Serialize)]
struct PythonStatus {
    python_found: bool,
    python_version: Option<String>,
    python_path: Option<String>,
    venv_ready: bool,
    matplotlib_version: Option<String>,
    matplotlib_compatible: bool,
}

fn print_json(value: &impl Serialize) -> Result<(), AppError> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn load_seed(path: Option<&Path>, config: &AppConfig) -> Result<ThemeSeed, AppError> {
    match path {
        Some(path) => ThemeSeed::from_yaml_file(path),
        None => Ok(config.theme.clone()),
    }
}

fn cmd_palette(config: &AppConfig, seed: Option<&Path>, chart_type: Option<ChartType>) -> Result<(), AppError> {
    let seed = load_seed(seed, config)?;
    let palette = derive_palette(&seed);
    match chart_type {
        Some(chart_type) => print_json(&serde_json::json!({
            "palette": palette,
            "style": style_for(chart_type, &seed, &palette),
        })),
        None => print_json(&serde_json::json!({ "palette": palette })),
    }
}

fn cmd_exec(config: &AppConfig, file: &Path, timeout: Option<f64>, out: Option<&Path>) -> Result<(), AppError> {
    let source = fs::read_to_string(file)?;
    let timeout = timeout.unwrap_or_else(|| config.timeout_secs());
    let request = chartgen_studio::python::ExecutionRequest::new(source).with_timeout_secs(timeout)?;
    let result = SandboxExecutor::from_config(config)?.execute(&request);

    match &result {
        ExecutionResult::Image { png_base64 } => {
            let path = out
                .map(Path::to_path_buf)
                .unwrap_or_else(|| file.with_extension("png"));
            let bytes = harness::decode_png(png_base64)
                .ok_or_else(|| AppError::Execution("image payload is not a PNG".into()))?;
            fs::write(&path, bytes)?;
            info!(path = %path.display(), "wrote chart image");
            print_json(&serde_json::json!({ "status": "image", "path": path }))
        }
        ExecutionResult::Failure(failure) => {
            let diagnosis = chartgen_studio::agent::diagnose::parse_traceback(&failure.stderr_text);
            print_json(&serde_json::json!({
                "status": "failure",
                "failure": failure,
                "diagnosis": diagnosis,
                "action": chartgen_studio::agent::diagnose::recommend(failure, false),
            }))
        }
    }
}

fn read_request(path: &Path, chart_type: ChartType) -> Result<ChartRequest, AppError> {
    let text = fs::read_to_string(path)?;
    let value: serde_json::Value = serde_json::from_str(&text)?;
    if value.is_array() {
        Ok(ChartRequest::new(chart_type, serde_json::from_value(value)?))
    } else {
        Ok(serde_json::from_value(value)?)
    }
}

fn artifact_path(out: Option<&Path>, config: &AppConfig, request: &ChartRequest, artifact: &ChartArtifact) -> PathBuf {
    if let Some(out) = out {
        return out.to_path_buf();
    }
    let extension = match artifact {
        ChartArtifact::Diagram { .. } => "mmd",
        ChartArtifact::Image { .. } => "png",
        ChartArtifact::SourceOnly { .. } => "py",
    };
    let dir = config.output_dir.clone().unwrap_or_else(|| PathBuf::from("."));
    dir.join(format!("{}.{}", request.chart_type.slug(), extension))
}

fn write_artifact(path: &Path, artifact: &ChartArtifact) -> Result<(), AppError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    match artifact {
        ChartArtifact::Diagram { markup } => fs::write(path, markup)?,
        ChartArtifact::Image { png_base64, .. } => {
            let bytes = harness::decode_png(png_base64)
                .ok_or_else(|| AppError::Execution("image payload is not a PNG".into()))?;
            fs::write(path, bytes)?;
        }
        ChartArtifact::SourceOnly { source, .. } => fs::write(path, source)?,
    }
    Ok(())
}

#[allow(clippy::too_many_arguments)]
async fn cmd_render(
    config: &AppConfig,
    chart_type: Option<ChartType>,
    prompt: Option<String>,
    data: Option<&Path>,
    synthetic: u64,
    seed: Option<&Path>,
    method: Option<RenderMethod>,
    title: Option<String>,
    out: Option<&Path>,
) -> Result<(), AppError> {
    let plan = match &prompt {
        Some(prompt) => Some(KeywordPlanner.plan(prompt).await?),
        None => None,
    };
    let chart_type = chart_type
        .or_else(|| plan.as_ref().map(|p| p.chart_type))
        .ok_or_else(|| AppError::InvalidRequest("pass --type or --prompt".into()))?;

    let mut request = match data {
        Some(path) => read_request(path, chart_type)?,
        None => ChartRequest::new(chart_type, synthesize(chart_type, synthetic)),
    };
    if data.is_none() || seed.is_some() {
        request.seed = load_seed(seed, config)?;
    }
    if let Some(method) = method {
        request.preferred_method = Some(method);
    }
    let existing = request.options.title.take();
    request.options.title = title
        .or(existing)
        .or_else(|| plan.map(|p| p.title))
        .or_else(|| Some(chart_type.display_name().to_string()));

    let pipeline = ChartPipeline::from_config(config)?;
    let outcome = pipeline.generate_async(request.clone()).await?;

    let path = artifact_path(out, config, &request, &outcome.artifact);
    write_artifact(&path, &outcome.artifact)?;

    if config.telemetry_enabled {
        let written = GenerationTrace::from_outcome(&request, &outcome).and_then(|t| telemetry::write_trace(&t));
        if let Err(e) = written {
            warn!(error = %e, "failed to write generation trace");
        }
    }

    print_json(&serde_json::json!({
        "path": path,
        "rendered": outcome.is_rendered(),
        "report": outcome.report,
    }))
}

fn cmd_python_check(config: &AppConfig) -> Result<(), AppError> {
    let info = detector::detect_python().ok();
    let venv_dir = venv::get_venv_dir()?;
    let venv_ready = venv::venv_exists(&venv_dir);

    let matplotlib_version = detector::resolve_interpreter(config)
        .ok()
        .and_then(|python| installer::detect_package_version(&python, "matplotlib"));
    let matplotlib_compatible = matplotlib_version
        .as_deref()
        .is_some_and(|v| installer::version_gte(v, installer::MIN_MATPLOTLIB_VERSION));

    print_json(&PythonStatus {
        python_found: info.is_some(),
        python_version: info.as_ref().map(|i| i.version.clone()),
        python_path: info.as_ref().map(|i| i.path.to_string_lossy().to_string()),
        venv_ready,
        matplotlib_version,
        matplotlib_compatible,
    })
}

fn cmd_python_setup() -> Result<(), AppError> {
    let info = detector::detect_python()?;
    let venv_dir = venv::get_venv_dir()?;
    if !venv::venv_exists(&venv_dir) {
        venv::create_venv(&info.path, &venv_dir)?;
    }

    let python = venv::get_venv_python(&venv_dir);
    if !installer::is_package_installed(&python, "matplotlib") {
        installer::install_plotting_stack(&venv_dir)?;
    }

    let version = installer::detect_package_version(&python, "matplotlib").unwrap_or_else(|| "unknown".to_string());
    println!("Python {} environment ready with matplotlib {}", info.version, version);
    Ok(())
}

async fn run(cli: Cli, config: AppConfig) -> Result<(), AppError> {
    match cli.cmd {
        Command::Palette { seed, chart_type } => cmd_palette(&config, seed.as_deref(), chart_type),
        Command::Strategies => print_json(&all_strategies()),
        Command::Exec { file, timeout, out } => cmd_exec(&config, &file, timeout, out.as_deref()),
        Command::Render {
            chart_type,
            prompt,
            data,
            synthetic,
            seed,
            method,
            title,
            out,
        } => {
            cmd_render(
                &config,
                chart_type,
                prompt,
                data.as_deref(),
                synthetic,
                seed.as_deref(),
                method,
                title,
                out.as_deref(),
            )
            .await
        }
        Command::Python { action } => match action {
            PythonAction::Check => cmd_python_check(&config),
            PythonAction::Setup => cmd_python_setup(),
        },
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => AppConfig::load_from(path),
        None => AppConfig::load(),
    };
    let config = match config {
        Ok(config) => config,
        Err(e) => {
            eprintln!("error: {}", e);
            return ExitCode::FAILURE;
        }
    };
    telemetry::init_tracing(&config.log_filter);

    match run(cli, config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "command failed");
            eprintln!("error: {}", e);
            ExitCode::FAILURE
        }
    }
}
