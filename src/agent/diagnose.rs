use regex::Regex;
use serde::Serialize;

use crate::python::{ExecutionFailure, FailureReason};

/// Coarse class of a Python failure, used to pick the next move.
#[derive(Debug, Serialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    Syntax,
    MissingModule,
    DataShape,
    Plotting,
    Runtime,
    Unknown,
}

/// A Python error parsed out of a traceback.
#[derive(Debug, Serialize, Clone, PartialEq)]
pub struct StructuredError {
    pub error_type: String,
    pub message: String,
    /// Line in the chart source, when the traceback points into it.
    pub line_number: Option<u32>,
    pub category: ErrorCategory,
    pub suggestion: Option<String>,
}

/// What a caller could do after a failed execution. Advisory only.
#[derive(Debug, Serialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum FailureAction {
    RetryWithDifferentCode,
    FallbackMethod,
    SetupEnvironment,
    GiveUp,
}

const SHAPE_HINTS: &[&str] = &[
    "shape mismatch",
    "same length",
    "same size",
    "same first dimension",
    "could not broadcast",
    "must be the same",
    "dimension",
];

/// Parse stderr from a failed run into a `StructuredError`.
///
/// Python tracebacks end with `ErrorType: message`; the last such line wins.
pub fn parse_traceback(stderr: &str) -> StructuredError {
    let line_number = chart_line_number(stderr);

    let mut last_match: Option<(String, String)> = None;
    for line in stderr.lines() {
        let trimmed = line.trim();
        let Some((left, right)) = trimmed.split_once(':') else {
            continue;
        };
        let error_type = left.trim();
        let message = right.trim();
        let is_exception_like = !error_type.contains(' ')
            && (error_type.ends_with("Error")
                || error_type.ends_with("Exception")
                || error_type.ends_with("Warning"));
        if is_exception_like {
            last_match = Some((error_type.to_string(), message.to_string()));
        }
    }

    let Some((error_type, message)) = last_match else {
        let last_line = stderr
            .lines()
            .rev()
            .find(|l| !l.trim().is_empty())
            .unwrap_or("Unknown error")
            .trim()
            .to_string();
        return StructuredError {
            error_type: "UnknownError".to_string(),
            message: last_line,
            line_number,
            category: ErrorCategory::Unknown,
            suggestion: Some("Check the full error output for details.".to_string()),
        };
    };

    let category = classify(&error_type, &message, stderr);
    let suggestion = suggest(category, &message);
    StructuredError {
        error_type,
        message,
        line_number,
        category,
        suggestion,
    }
}

/// Last `File "<chart>", line N` frame; falls back to any `line N`.
fn chart_line_number(stderr: &str) -> Option<u32> {
    let chart_re = Regex::new(r#"File "<chart>", line (\d+)"#).ok()?;
    let any_re = Regex::new(r"line (\d+)").ok()?;

    let last = |re: &Regex| {
        re.captures_iter(stderr)
            .filter_map(|cap| cap[1].parse::<u32>().ok())
            .last()
    };
    last(&chart_re).or_else(|| last(&any_re))
}

fn classify(error_type: &str, message: &str, stderr: &str) -> ErrorCategory {
    let lower = message.to_lowercase();
    match error_type {
        "SyntaxError" | "IndentationError" | "TabError" => ErrorCategory::Syntax,
        "ModuleNotFoundError" | "ImportError" => ErrorCategory::MissingModule,
        "IndexError" | "KeyError" => ErrorCategory::DataShape,
        "ValueError" | "TypeError" if SHAPE_HINTS.iter().any(|h| lower.contains(h)) => {
            ErrorCategory::DataShape
        }
        _ if stderr.contains("matplotlib") => ErrorCategory::Plotting,
        _ => ErrorCategory::Runtime,
    }
}

fn suggest(category: ErrorCategory, message: &str) -> Option<String> {
    let text = match category {
        ErrorCategory::Syntax => "Fix the Python syntax at the reported line.".to_string(),
        ErrorCategory::MissingModule => match missing_module(message) {
            Some(module) => format!("Install '{}' into the chart interpreter.", module),
            None => "Install the missing package into the chart interpreter.".to_string(),
        },
        ErrorCategory::DataShape => {
            "Make every data array the same length as its labels.".to_string()
        }
        ErrorCategory::Plotting => {
            "Simplify the matplotlib calls or switch to a different chart method.".to_string()
        }
        ErrorCategory::Runtime | ErrorCategory::Unknown => return None,
    };
    Some(text)
}

/// `No module named 'numpy'` → `numpy`.
pub fn missing_module(message: &str) -> Option<String> {
    let re = Regex::new(r#"No module named ['"]?([\w.]+)['"]?"#).ok()?;
    re.captures(message).map(|cap| cap[1].to_string())
}

/// Recommend the next step after `failure`. Nothing here acts on it.
pub fn recommend(failure: &ExecutionFailure, has_fallback: bool) -> FailureAction {
    let or_retry = if has_fallback {
        FailureAction::FallbackMethod
    } else {
        FailureAction::RetryWithDifferentCode
    };

    match failure.reason {
        FailureReason::LaunchError => FailureAction::SetupEnvironment,
        FailureReason::Cancelled => FailureAction::GiveUp,
        FailureReason::Timeout => or_retry,
        FailureReason::NoFigureProduced => FailureAction::RetryWithDifferentCode,
        FailureReason::NonZeroExit => match parse_traceback(&failure.stderr_text).category {
            ErrorCategory::MissingModule => FailureAction::SetupEnvironment,
            ErrorCategory::Syntax | ErrorCategory::DataShape | ErrorCategory::Runtime => {
                FailureAction::RetryWithDifferentCode
            }
            ErrorCategory::Plotting => or_retry,
            ErrorCategory::Unknown if has_fallback => FailureAction::FallbackMethod,
            ErrorCategory::Unknown => FailureAction::GiveUp,
        },
    }
}
