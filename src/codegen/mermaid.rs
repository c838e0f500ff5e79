//! Mermaid markup for the chart types with a diagram form.

use std::fmt::Write as _;

use chrono::NaiveDate;
use serde_json::{json, Map, Value};

use super::TemplateOptions;
use crate::charts::data::distinct_series;
use crate::charts::{ChartType, DataPoint};
use crate::error::AppError;
use crate::theme::StyleRecord;

/// Mermaid pie slices are themed through `pie1`..`pie12`.
const PIE_THEME_SLOTS: usize = 12;
const DEFAULT_SECTION: &str = "Tasks";

fn unsupported(chart_type: ChartType, reason: impl std::fmt::Display) -> AppError {
    AppError::Unsupported(format!("{} as a diagram: {}", chart_type, reason))
}

/// Strip characters that terminate or break Mermaid statements.
fn sanitize(text: &str) -> String {
    text.chars()
        .map(|c| match c {
            '"' => '\'',
            ':' | ';' | '#' => ' ',
            '\n' | '\r' | '\t' => ' ',
            other => other,
        })
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

fn quoted(text: &str) -> String {
    format!("\"{}\"", sanitize(text))
}

fn init_directive(chart_type: ChartType, style: &StyleRecord) -> Result<String, AppError> {
    let chrome = &style.chrome;
    let colors: Vec<String> = style.series_colors.iter().map(|c| c.to_hex()).collect();
    let first = colors.first().cloned().unwrap_or_else(|| chrome.text.to_hex());

    let mut vars = Map::new();
    vars.insert("background".into(), json!(chrome.background.to_hex()));
    vars.insert("primaryColor".into(), json!(first));
    vars.insert("primaryTextColor".into(), json!(chrome.text.to_hex()));
    vars.insert("lineColor".into(), json!(chrome.grid.to_hex()));
    vars.insert("textColor".into(), json!(chrome.text.to_hex()));
    vars.insert("fontFamily".into(), json!(chrome.font_family));

    match chart_type {
        ChartType::Pie => {
            for (i, color) in colors.iter().take(PIE_THEME_SLOTS).enumerate() {
                vars.insert(format!("pie{}", i + 1), json!(color));
            }
            vars.insert("pieStrokeColor".into(), json!(style.edge_color.to_hex()));
            vars.insert("pieOpacity".into(), json!(style.fill_alpha.to_string()));
            vars.insert("pieTitleTextColor".into(), json!(chrome.text.to_hex()));
        }
        ChartType::Gantt => {
            vars.insert("taskBkgColor".into(), json!(first));
            vars.insert("taskBorderColor".into(), json!(style.edge_color.to_hex()));
            vars.insert("sectionBkgColor".into(), json!(chrome.background.to_hex()));
            vars.insert("altSectionBkgColor".into(), json!(chrome.grid.to_hex()));
            vars.insert("gridColor".into(), json!(chrome.grid.to_hex()));
            vars.insert("taskTextColor".into(), json!(chrome.background.to_hex()));
        }
        _ => {
            vars.insert(
                "xyChart".into(),
                json!({
                    "backgroundColor": chrome.background.to_hex(),
                    "titleColor": chrome.text.to_hex(),
                    "plotColorPalette": colors.join(", "),
                }),
            );
        }
    }

    let init = json!({ "theme": "base", "themeVariables": Value::Object(vars) });
    Ok(format!("%%{{init: {}}}%%", serde_json::to_string(&init)?))
}

fn pie(points: &[DataPoint], options: &TemplateOptions) -> Result<String, AppError> {
    if let Some(p) = points.iter().find(|p| p.value < 0.0) {
        return Err(unsupported(
            ChartType::Pie,
            format!("negative slice '{}' ({})", p.label, p.value),
        ));
    }
    if points.iter().map(|p| p.value).sum::<f64>() <= 0.0 {
        return Err(unsupported(ChartType::Pie, "slices sum to zero"));
    }

    let mut out = String::from("pie showData\n");
    if let Some(title) = options.title.as_deref() {
        let _ = writeln!(out, "    title {}", sanitize(title));
    }
    for p in points {
        let _ = writeln!(out, "    {} : {}", quoted(&p.label), p.value);
    }
    Ok(out)
}

fn xychart(
    chart_type: ChartType,
    points: &[DataPoint],
    options: &TemplateOptions,
) -> Result<String, AppError> {
    let series = distinct_series(points);
    if series.len() > 1 {
        return Err(unsupported(
            chart_type,
            format!("{} series, only one is expressible", series.len()),
        ));
    }

    let mut out = String::from("xychart-beta");
    if chart_type == ChartType::BarHorizontal {
        out.push_str(" horizontal");
    }
    out.push('\n');
    if let Some(title) = options.title.as_deref() {
        let _ = writeln!(out, "    title {}", quoted(title));
    }

    let labels: Vec<String> = points.iter().map(|p| quoted(&p.label)).collect();
    let _ = write!(out, "    x-axis");
    if let Some(x_label) = options.x_label.as_deref() {
        let _ = write!(out, " {}", quoted(x_label));
    }
    let _ = writeln!(out, " [{}]", labels.join(", "));
    if let Some(y_label) = options.y_label.as_deref() {
        let _ = writeln!(out, "    y-axis {}", quoted(y_label));
    }

    let values: Vec<String> = points.iter().map(|p| p.value.to_string()).collect();
    let mark = if chart_type == ChartType::Line { "line" } else { "bar" };
    let _ = writeln!(out, "    {} [{}]", mark, values.join(", "));
    Ok(out)
}

fn gantt(points: &[DataPoint], options: &TemplateOptions) -> Result<String, AppError> {
    let mut out = String::from("gantt\n    dateFormat YYYY-MM-DD\n    axisFormat %b %d\n");
    if let Some(title) = options.title.as_deref() {
        let _ = writeln!(out, "    title {}", sanitize(title));
    }

    let mut section: Option<&str> = None;
    for (i, p) in points.iter().enumerate() {
        let start = p
            .aux_str("start")
            .map(str::trim)
            .filter(|s| NaiveDate::parse_from_str(s, "%Y-%m-%d").is_ok())
            .ok_or_else(|| unsupported(ChartType::Gantt, format!("task '{}' has no ISO start date", p.label)))?;
        let duration = p
            .aux_f64("duration")
            .filter(|d| d.is_finite() && *d > 0.0)
            .ok_or_else(|| unsupported(ChartType::Gantt, format!("task '{}' has no positive duration", p.label)))?;

        let name = p.category.as_deref().unwrap_or(DEFAULT_SECTION);
        if section != Some(name) {
            let _ = writeln!(out, "    section {}", sanitize(name));
            section = Some(name);
        }
        let _ = writeln!(
            out,
            "    {} :t{}, {}, {}d",
            sanitize(&p.label),
            i + 1,
            start,
            duration.ceil() as u64
        );
    }
    Ok(out)
}

/// Themed Mermaid markup, or `Unsupported` when the diagram language cannot
/// express this chart type or data.
pub fn render_markup(
    chart_type: ChartType,
    points: &[DataPoint],
    style: &StyleRecord,
    options: &TemplateOptions,
) -> Result<String, AppError> {
    let body = match chart_type {
        ChartType::Pie => pie(points, options)?,
        ChartType::Line | ChartType::BarVertical | ChartType::BarHorizontal => {
            xychart(chart_type, points, options)?
        }
        ChartType::Gantt => gantt(points, options)?,
        other => return Err(unsupported(other, "no diagram form")),
    };
    Ok(format!("{}\n{}", init_directive(chart_type, style)?, body))
}
