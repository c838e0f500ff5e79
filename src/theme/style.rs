use serde::Serialize;

use super::color::{darken, Rgb};
use super::palette::{gradient_three, gradient_two, DerivedPalette};
use super::seed::{Chrome, ThemeSeed};
use crate::charts::data::{distinct_categories, distinct_series, has_signed_values};
use crate::charts::strategy::strategy_for;
use crate::charts::types::{ChartType, DataPoint};
use crate::error::AppError;

const SINGLE_SERIES_EDGE_DARKEN: f64 = 0.15;
const MULTI_SERIES_EDGE_DARKEN: f64 = 0.25;
const DEFAULT_EDGE_WIDTH: f64 = 1.0;
const SEGMENT_EDGE_WIDTH: f64 = 2.0;
const TWO_COLOR_GRADIENT_STEPS: usize = 5;
const THREE_COLOR_GRADIENT_STEPS: usize = 7;
/// Below this saturation the primary reads as gray and gets a gray ramp.
const GRAY_SATURATION: f64 = 0.15;

/// Which styling rule a chart type follows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StyleFamily {
    SingleSeries,
    MultiSeries,
    Composite,
    Diverging,
    Density,
    PartOfWhole,
}

impl StyleFamily {
    pub fn of(chart_type: ChartType) -> Self {
        match chart_type {
            ChartType::Line
            | ChartType::Step
            | ChartType::Area
            | ChartType::Histogram
            | ChartType::ErrorBar
            | ChartType::BarVertical
            | ChartType::BarHorizontal
            | ChartType::Scatter => StyleFamily::SingleSeries,
            ChartType::GroupedBar
            | ChartType::StackedBar
            | ChartType::StackedArea
            | ChartType::BoxPlot
            | ChartType::ViolinPlot
            | ChartType::Radar
            | ChartType::Gantt => StyleFamily::MultiSeries,
            ChartType::ControlChart | ChartType::Pareto => StyleFamily::Composite,
            ChartType::Waterfall => StyleFamily::Diverging,
            ChartType::Heatmap | ChartType::Hexbin | ChartType::Bubble => StyleFamily::Density,
            ChartType::Pie | ChartType::Funnel | ChartType::Treemap => StyleFamily::PartOfWhole,
        }
    }
}

/// Matplotlib colormaps the engine can select.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ColormapName {
    Blues,
    Greens,
    Oranges,
    Reds,
    Purples,
    Greys,
    RdYlBu,
}

impl ColormapName {
    pub fn as_str(self) -> &'static str {
        match self {
            ColormapName::Blues => "Blues",
            ColormapName::Greens => "Greens",
            ColormapName::Oranges => "Oranges",
            ColormapName::Reds => "Reds",
            ColormapName::Purples => "Purples",
            ColormapName::Greys => "Greys",
            ColormapName::RdYlBu => "RdYlBu",
        }
    }

    /// Single-hue sequential ramp closest to `anchor`.
    pub fn sequential_for(anchor: Rgb) -> Self {
        let hsl = anchor.to_hsl();
        if hsl.s < GRAY_SATURATION {
            return ColormapName::Greys;
        }
        match hsl.h {
            h if !(15.0..345.0).contains(&h) => ColormapName::Reds,
            h if h < 70.0 => ColormapName::Oranges,
            h if h < 170.0 => ColormapName::Greens,
            h if h < 260.0 => ColormapName::Blues,
            _ => ColormapName::Purples,
        }
    }

    pub fn is_diverging(self) -> bool {
        self == ColormapName::RdYlBu
    }
}

/// Fixed color roles for gain/loss/total charts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DivergingRoles {
    pub positive: Rgb,
    pub negative: Rgb,
    pub total: Rgb,
}

/// Data-dependent inputs to `style_for_with`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StyleHints {
    /// Number of series/groups/stacks to color.
    pub series_count: Option<usize>,
    /// Data contains negative values (e.g. a correlation matrix).
    pub signed: bool,
}

impl StyleHints {
    pub fn from_points(chart_type: ChartType, points: &[DataPoint]) -> Self {
        let series_count = match chart_type {
            ChartType::BoxPlot | ChartType::ViolinPlot | ChartType::Gantt => {
                let categories = distinct_categories(points).len();
                if categories > 0 {
                    categories
                } else {
                    distinct_series(points).len()
                }
            }
            ChartType::Pie | ChartType::Funnel | ChartType::Treemap => points.len(),
            _ => distinct_series(points).len(),
        };
        Self {
            series_count: Some(series_count.max(1)),
            signed: has_signed_values(points),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StyleRecord {
    pub family: StyleFamily,
    pub series_colors: Vec<Rgb>,
    pub edge_color: Rgb,
    pub edge_width: f64,
    pub fill_alpha: f64,
    pub colormap: Option<ColormapName>,
    pub gradient_steps: Option<Vec<Rgb>>,
    pub roles: Option<DivergingRoles>,
    pub chrome: Chrome,
}

impl StyleRecord {
    /// JSON handed to code templates.
    pub fn to_template_json(&self) -> Result<serde_json::Value, AppError> {
        Ok(serde_json::to_value(self)?)
    }
}

/// Style with hints taken from the strategy table's defaults.
pub fn style_for(chart_type: ChartType, seed: &ThemeSeed, palette: &DerivedPalette) -> StyleRecord {
    let defaults = strategy_for(chart_type).synthetic;
    let hints = StyleHints {
        series_count: Some(defaults.series.max(1)),
        signed: defaults.is_signed(),
    };
    style_for_with(chart_type, seed, palette, &hints)
}

pub fn style_for_with(
    chart_type: ChartType,
    seed: &ThemeSeed,
    palette: &DerivedPalette,
    hints: &StyleHints,
) -> StyleRecord {
    let family = StyleFamily::of(chart_type);
    let primary = seed.primary();
    let series_count = hints.series_count.unwrap_or(1).max(1);

    let mut record = StyleRecord {
        family,
        series_colors: vec![primary],
        edge_color: darken(primary, SINGLE_SERIES_EDGE_DARKEN),
        edge_width: DEFAULT_EDGE_WIDTH,
        fill_alpha: seed.transparency(),
        colormap: None,
        gradient_steps: None,
        roles: None,
        chrome: seed.chrome(),
    };

    match family {
        StyleFamily::SingleSeries => {}
        StyleFamily::MultiSeries => {
            record.series_colors = palette.take(series_count);
            record.edge_color = darken(primary, MULTI_SERIES_EDGE_DARKEN);
        }
        StyleFamily::Composite => {
            record.series_colors = vec![primary, seed.secondary(), seed.tertiary()];
        }
        StyleFamily::Diverging => {
            let roles = DivergingRoles {
                positive: seed.secondary(),
                negative: seed.tertiary(),
                total: primary,
            };
            record.series_colors = vec![roles.positive, roles.negative, roles.total];
            record.roles = Some(roles);
        }
        StyleFamily::Density => {
            record.colormap = Some(if hints.signed {
                ColormapName::RdYlBu
            } else {
                ColormapName::sequential_for(primary)
            });
        }
        StyleFamily::PartOfWhole => {
            let count = series_count.max(palette.len());
            record.series_colors = palette.take(count);
            record.edge_color = Rgb::WHITE;
            record.edge_width = SEGMENT_EDGE_WIDTH;
        }
    }

    if seed.use_gradient() {
        record.gradient_steps = Some(match family {
            StyleFamily::Density | StyleFamily::MultiSeries => gradient_three(seed, THREE_COLOR_GRADIENT_STEPS),
            _ => gradient_two(seed, TWO_COLOR_GRADIENT_STEPS),
        });
    }

    record
}
