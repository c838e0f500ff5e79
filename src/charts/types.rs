use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::AppError;

/// Every chart the generator knows how to produce.
///
/// The discriminant doubles as the index into the strategy table, so the
/// declaration order here must match `strategy::STRATEGIES`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ChartType {
    Line,
    BarVertical,
    BarHorizontal,
    Histogram,
    BoxPlot,
    ViolinPlot,
    Scatter,
    Bubble,
    Hexbin,
    Pie,
    Waterfall,
    Funnel,
    Radar,
    Heatmap,
    ErrorBar,
    ControlChart,
    Pareto,
    Gantt,
    StackedArea,
    GroupedBar,
    StackedBar,
    Step,
    Area,
    Treemap,
}

impl ChartType {
    pub const ALL: [ChartType; 24] = [
        ChartType::Line,
        ChartType::BarVertical,
        ChartType::BarHorizontal,
        ChartType::Histogram,
        ChartType::BoxPlot,
        ChartType::ViolinPlot,
        ChartType::Scatter,
        ChartType::Bubble,
        ChartType::Hexbin,
        ChartType::Pie,
        ChartType::Waterfall,
        ChartType::Funnel,
        ChartType::Radar,
        ChartType::Heatmap,
        ChartType::ErrorBar,
        ChartType::ControlChart,
        ChartType::Pareto,
        ChartType::Gantt,
        ChartType::StackedArea,
        ChartType::GroupedBar,
        ChartType::StackedBar,
        ChartType::Step,
        ChartType::Area,
        ChartType::Treemap,
    ];

    pub fn slug(self) -> &'static str {
        match self {
            ChartType::Line => "line",
            ChartType::BarVertical => "bar-vertical",
            ChartType::BarHorizontal => "bar-horizontal",
            ChartType::Histogram => "histogram",
            ChartType::BoxPlot => "box-plot",
            ChartType::ViolinPlot => "violin-plot",
            ChartType::Scatter => "scatter",
            ChartType::Bubble => "bubble",
            ChartType::Hexbin => "hexbin",
            ChartType::Pie => "pie",
            ChartType::Waterfall => "waterfall",
            ChartType::Funnel => "funnel",
            ChartType::Radar => "radar",
            ChartType::Heatmap => "heatmap",
            ChartType::ErrorBar => "error-bar",
            ChartType::ControlChart => "control-chart",
            ChartType::Pareto => "pareto",
            ChartType::Gantt => "gantt",
            ChartType::StackedArea => "stacked-area",
            ChartType::GroupedBar => "grouped-bar",
            ChartType::StackedBar => "stacked-bar",
            ChartType::Step => "step",
            ChartType::Area => "area",
            ChartType::Treemap => "treemap",
        }
    }

    /// Human-readable name used for default chart titles.
    pub fn display_name(self) -> &'static str {
        match self {
            ChartType::Line => "Line Chart",
            ChartType::BarVertical => "Bar Chart",
            ChartType::BarHorizontal => "Horizontal Bar Chart",
            ChartType::Histogram => "Histogram",
            ChartType::BoxPlot => "Box Plot",
            ChartType::ViolinPlot => "Violin Plot",
            ChartType::Scatter => "Scatter Plot",
            ChartType::Bubble => "Bubble Chart",
            ChartType::Hexbin => "Hexbin Density",
            ChartType::Pie => "Pie Chart",
            ChartType::Waterfall => "Waterfall Chart",
            ChartType::Funnel => "Funnel Chart",
            ChartType::Radar => "Radar Chart",
            ChartType::Heatmap => "Heatmap",
            ChartType::ErrorBar => "Error Bar Chart",
            ChartType::ControlChart => "Control Chart",
            ChartType::Pareto => "Pareto Chart",
            ChartType::Gantt => "Gantt Chart",
            ChartType::StackedArea => "Stacked Area Chart",
            ChartType::GroupedBar => "Grouped Bar Chart",
            ChartType::StackedBar => "Stacked Bar Chart",
            ChartType::Step => "Step Chart",
            ChartType::Area => "Area Chart",
            ChartType::Treemap => "Treemap",
        }
    }

    /// Charts whose values are shares of a whole and must not be negative.
    pub fn is_part_of_whole(self) -> bool {
        matches!(self, ChartType::Pie | ChartType::Funnel | ChartType::Treemap)
    }
}

impl fmt::Display for ChartType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.slug())
    }
}

impl FromStr for ChartType {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_lowercase().replace(['_', ' '], "-");
        let normalized = normalized
            .strip_suffix("-chart")
            .unwrap_or(&normalized)
            .to_string();

        if let Some(found) = ChartType::ALL.iter().find(|t| t.slug() == normalized) {
            return Ok(*found);
        }

        let alias = match normalized.as_str() {
            "bar" | "column" | "vertical-bar" => Some(ChartType::BarVertical),
            "horizontal-bar" | "barh" => Some(ChartType::BarHorizontal),
            "box" | "boxplot" => Some(ChartType::BoxPlot),
            "violin" => Some(ChartType::ViolinPlot),
            "donut" | "doughnut" => Some(ChartType::Pie),
            "spider" => Some(ChartType::Radar),
            "errorbar" => Some(ChartType::ErrorBar),
            "control" | "spc" => Some(ChartType::ControlChart),
            "timeline" => Some(ChartType::Gantt),
            _ => None,
        };

        alias.ok_or_else(|| AppError::InvalidRequest(format!("unknown chart type '{}'", s)))
    }
}

/// How a chart type gets rendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RenderMethod {
    /// Text markup in a diagram language (Mermaid), rendered by a viewer.
    DeclarativeDiagram,
    /// A Python/matplotlib program executed in the sandbox.
    ProgrammaticPlot,
}

impl fmt::Display for RenderMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RenderMethod::DeclarativeDiagram => f.write_str("declarative_diagram"),
            RenderMethod::ProgrammaticPlot => f.write_str("programmatic_plot"),
        }
    }
}

impl FromStr for RenderMethod {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace('-', "_").as_str() {
            "declarative_diagram" | "declarative" | "diagram" | "mermaid" => {
                Ok(RenderMethod::DeclarativeDiagram)
            }
            "programmatic_plot" | "programmatic" | "plot" | "matplotlib" => {
                Ok(RenderMethod::ProgrammaticPlot)
            }
            _ => Err(AppError::InvalidRequest(format!("unknown render method '{}'", s))),
        }
    }
}

/// One observation fed to a chart template.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataPoint {
    pub label: String,
    pub value: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub series: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub auxiliary: BTreeMap<String, serde_json::Value>,
}

impl DataPoint {
    pub fn new(label: impl Into<String>, value: f64) -> Self {
        Self {
            label: label.into(),
            value,
            category: None,
            series: None,
            auxiliary: BTreeMap::new(),
        }
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    pub fn with_series(mut self, series: impl Into<String>) -> Self {
        self.series = Some(series.into());
        self
    }

    pub fn with_aux(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.auxiliary.insert(key.into(), value.into());
        self
    }

    pub fn aux_f64(&self, key: &str) -> Option<f64> {
        self.auxiliary.get(key).and_then(|v| v.as_f64())
    }

    pub fn aux_str(&self, key: &str) -> Option<&str> {
        self.auxiliary.get(key).and_then(|v| v.as_str())
    }
}
