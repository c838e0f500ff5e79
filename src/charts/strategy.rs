use serde::Serialize;

use super::types::{ChartType, RenderMethod};

/// Semantic kind of a data role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DataKind {
    Categorical,
    Numeric,
    Time,
}

/// Where on a `DataPoint` a role's value lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "field", content = "key")]
pub enum RoleSource {
    Label,
    Value,
    Category,
    Series,
    Aux(&'static str),
}

/// Bounds on the number of distinct values (categorical/time) or points
/// (numeric) a role must carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Cardinality {
    pub min: usize,
    pub max: Option<usize>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DataRole {
    pub name: &'static str,
    pub kind: DataKind,
    pub source: RoleSource,
    pub cardinality: Option<Cardinality>,
}

/// Default parameters for synthetic data generation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SyntheticDefaults {
    pub points: usize,
    pub series: usize,
    pub value_min: f64,
    pub value_max: f64,
}

impl SyntheticDefaults {
    /// Signed ranges describe diverging data (gains and losses, correlations).
    pub fn is_signed(&self) -> bool {
        self.value_min < 0.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct StrategyEntry {
    pub chart_type: ChartType,
    pub primary: RenderMethod,
    pub fallback: Option<RenderMethod>,
    pub roles: &'static [DataRole],
    pub synthetic: SyntheticDefaults,
}

impl StrategyEntry {
    pub fn supports(&self, method: RenderMethod) -> bool {
        self.primary == method || self.fallback == Some(method)
    }
}

const fn role(
    name: &'static str,
    kind: DataKind,
    source: RoleSource,
    min: usize,
    max: Option<usize>,
) -> DataRole {
    DataRole {
        name,
        kind,
        source,
        cardinality: Some(Cardinality { min, max }),
    }
}

const fn unbounded(name: &'static str, kind: DataKind, source: RoleSource) -> DataRole {
    DataRole {
        name,
        kind,
        source,
        cardinality: None,
    }
}

const fn synthetic(points: usize, series: usize, value_min: f64, value_max: f64) -> SyntheticDefaults {
    SyntheticDefaults {
        points,
        series,
        value_min,
        value_max,
    }
}

const DECLARATIVE: RenderMethod = RenderMethod::DeclarativeDiagram;
const PROGRAMMATIC: RenderMethod = RenderMethod::ProgrammaticPlot;

use DataKind::{Categorical, Numeric, Time};
use RoleSource::{Aux, Category, Label, Series, Value};

const SEQUENCE_ROLES: &[DataRole] = &[
    role("x", Categorical, Label, 2, None),
    unbounded("y", Numeric, Value),
];

const CATEGORY_VALUE_ROLES: &[DataRole] = &[
    role("category", Categorical, Label, 1, Some(50)),
    unbounded("value", Numeric, Value),
];

const DISTRIBUTION_ROLES: &[DataRole] = &[
    role("group", Categorical, Category, 1, Some(20)),
    role("value", Numeric, Value, 5, None),
];

const XY_ROLES: &[DataRole] = &[
    role("x", Numeric, Aux("x"), 2, None),
    role("y", Numeric, Aux("y"), 2, None),
];

const SERIES_ROLES: &[DataRole] = &[
    role("x", Categorical, Label, 2, None),
    role("series", Categorical, Series, 2, Some(10)),
    unbounded("value", Numeric, Value),
];

/// Indexed by `ChartType as usize`.
static STRATEGIES: [StrategyEntry; 24] = [
    StrategyEntry {
        chart_type: ChartType::Line,
        primary: DECLARATIVE,
        fallback: Some(PROGRAMMATIC),
        roles: SEQUENCE_ROLES,
        synthetic: synthetic(12, 1, 20.0, 120.0),
    },
    StrategyEntry {
        chart_type: ChartType::BarVertical,
        primary: DECLARATIVE,
        fallback: Some(PROGRAMMATIC),
        roles: CATEGORY_VALUE_ROLES,
        synthetic: synthetic(6, 1, 10.0, 100.0),
    },
    StrategyEntry {
        chart_type: ChartType::BarHorizontal,
        primary: DECLARATIVE,
        fallback: Some(PROGRAMMATIC),
        roles: CATEGORY_VALUE_ROLES,
        synthetic: synthetic(6, 1, 10.0, 100.0),
    },
    StrategyEntry {
        chart_type: ChartType::Histogram,
        primary: PROGRAMMATIC,
        fallback: None,
        roles: &[role("value", Numeric, Value, 5, None)],
        synthetic: synthetic(200, 1, 0.0, 100.0),
    },
    StrategyEntry {
        chart_type: ChartType::BoxPlot,
        primary: PROGRAMMATIC,
        fallback: None,
        roles: DISTRIBUTION_ROLES,
        synthetic: synthetic(30, 4, 0.0, 100.0),
    },
    StrategyEntry {
        chart_type: ChartType::ViolinPlot,
        primary: PROGRAMMATIC,
        fallback: None,
        roles: DISTRIBUTION_ROLES,
        synthetic: synthetic(40, 3, 0.0, 100.0),
    },
    StrategyEntry {
        chart_type: ChartType::Scatter,
        primary: PROGRAMMATIC,
        fallback: None,
        roles: XY_ROLES,
        synthetic: synthetic(50, 1, 0.0, 100.0),
    },
    StrategyEntry {
        chart_type: ChartType::Bubble,
        primary: PROGRAMMATIC,
        fallback: None,
        roles: &[
            role("x", Numeric, Aux("x"), 2, None),
            role("y", Numeric, Aux("y"), 2, None),
            unbounded("size", Numeric, Value),
        ],
        synthetic: synthetic(20, 1, 5.0, 60.0),
    },
    StrategyEntry {
        chart_type: ChartType::Hexbin,
        primary: PROGRAMMATIC,
        fallback: None,
        roles: &[
            role("x", Numeric, Aux("x"), 10, None),
            role("y", Numeric, Aux("y"), 10, None),
        ],
        synthetic: synthetic(400, 1, 0.0, 100.0),
    },
    StrategyEntry {
        chart_type: ChartType::Pie,
        primary: DECLARATIVE,
        fallback: Some(PROGRAMMATIC),
        roles: &[
            role("slice", Categorical, Label, 2, Some(12)),
            unbounded("share", Numeric, Value),
        ],
        synthetic: synthetic(5, 1, 5.0, 40.0),
    },
    StrategyEntry {
        chart_type: ChartType::Waterfall,
        primary: PROGRAMMATIC,
        fallback: None,
        roles: &[
            role("step", Categorical, Label, 2, None),
            unbounded("delta", Numeric, Value),
        ],
        synthetic: synthetic(7, 1, -40.0, 60.0),
    },
    StrategyEntry {
        chart_type: ChartType::Funnel,
        primary: PROGRAMMATIC,
        fallback: None,
        roles: &[
            role("stage", Categorical, Label, 2, Some(10)),
            unbounded("count", Numeric, Value),
        ],
        synthetic: synthetic(5, 1, 100.0, 1000.0),
    },
    StrategyEntry {
        chart_type: ChartType::Radar,
        primary: PROGRAMMATIC,
        fallback: None,
        roles: &[
            role("axis", Categorical, Label, 3, Some(12)),
            unbounded("value", Numeric, Value),
        ],
        synthetic: synthetic(6, 2, 20.0, 100.0),
    },
    StrategyEntry {
        chart_type: ChartType::Heatmap,
        primary: PROGRAMMATIC,
        fallback: None,
        roles: &[
            role("row", Categorical, Category, 1, Some(40)),
            role("column", Categorical, Series, 1, Some(40)),
            unbounded("value", Numeric, Value),
        ],
        synthetic: synthetic(5, 5, -1.0, 1.0),
    },
    StrategyEntry {
        chart_type: ChartType::ErrorBar,
        primary: PROGRAMMATIC,
        fallback: None,
        roles: &[
            role("x", Categorical, Label, 2, None),
            unbounded("value", Numeric, Value),
            unbounded("error", Numeric, Aux("error")),
        ],
        synthetic: synthetic(6, 1, 20.0, 80.0),
    },
    StrategyEntry {
        chart_type: ChartType::ControlChart,
        primary: PROGRAMMATIC,
        fallback: None,
        roles: &[
            role("sample", Time, Label, 5, None),
            unbounded("measurement", Numeric, Value),
        ],
        synthetic: synthetic(25, 1, 45.0, 55.0),
    },
    StrategyEntry {
        chart_type: ChartType::Pareto,
        primary: PROGRAMMATIC,
        fallback: None,
        roles: &[
            role("cause", Categorical, Label, 2, None),
            unbounded("frequency", Numeric, Value),
        ],
        synthetic: synthetic(7, 1, 5.0, 120.0),
    },
    StrategyEntry {
        chart_type: ChartType::Gantt,
        primary: DECLARATIVE,
        fallback: Some(PROGRAMMATIC),
        roles: &[
            role("task", Categorical, Label, 1, None),
            unbounded("start", Time, Aux("start")),
            unbounded("duration", Numeric, Aux("duration")),
        ],
        synthetic: synthetic(6, 2, 1.0, 10.0),
    },
    StrategyEntry {
        chart_type: ChartType::StackedArea,
        primary: PROGRAMMATIC,
        fallback: None,
        roles: SERIES_ROLES,
        synthetic: synthetic(8, 3, 5.0, 40.0),
    },
    StrategyEntry {
        chart_type: ChartType::GroupedBar,
        primary: PROGRAMMATIC,
        fallback: None,
        roles: SERIES_ROLES,
        synthetic: synthetic(4, 3, 10.0, 90.0),
    },
    StrategyEntry {
        chart_type: ChartType::StackedBar,
        primary: PROGRAMMATIC,
        fallback: None,
        roles: SERIES_ROLES,
        synthetic: synthetic(4, 3, 10.0, 60.0),
    },
    StrategyEntry {
        chart_type: ChartType::Step,
        primary: PROGRAMMATIC,
        fallback: None,
        roles: SEQUENCE_ROLES,
        synthetic: synthetic(10, 1, 0.0, 50.0),
    },
    StrategyEntry {
        chart_type: ChartType::Area,
        primary: PROGRAMMATIC,
        fallback: None,
        roles: SEQUENCE_ROLES,
        synthetic: synthetic(12, 1, 10.0, 80.0),
    },
    StrategyEntry {
        chart_type: ChartType::Treemap,
        primary: PROGRAMMATIC,
        fallback: None,
        roles: &[
            role("node", Categorical, Label, 2, Some(30)),
            unbounded("size", Numeric, Value),
        ],
        synthetic: synthetic(8, 1, 5.0, 100.0),
    },
];

pub fn strategy_for(chart_type: ChartType) -> &'static StrategyEntry {
    &STRATEGIES[chart_type as usize]
}

pub fn all_strategies() -> &'static [StrategyEntry] {
    &STRATEGIES
}

/// Order in which render methods should be attempted.
///
/// A preferred method moves to the front only when the entry supports it.
pub fn method_chain(chart_type: ChartType, preferred: Option<RenderMethod>) -> Vec<RenderMethod> {
    let entry = strategy_for(chart_type);
    let mut chain = vec![entry.primary];
    if let Some(fallback) = entry.fallback {
        chain.push(fallback);
    }
    if let Some(method) = preferred.filter(|m| entry.supports(*m)) {
        chain.retain(|m| *m != method);
        chain.insert(0, method);
    }
    chain
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_order_matches_chart_types() {
        assert_eq!(all_strategies().len(), ChartType::ALL.len());
        for chart_type in ChartType::ALL {
            assert_eq!(strategy_for(chart_type).chart_type, chart_type);
        }
    }

    #[test]
    fn test_fallback_never_equals_primary() {
        for entry in all_strategies() {
            assert_ne!(entry.fallback, Some(entry.primary), "{}", entry.chart_type);
        }
    }

    #[test]
    fn test_declarative_primary_has_programmatic_fallback() {
        for entry in all_strategies() {
            if entry.primary == RenderMethod::DeclarativeDiagram {
                assert_eq!(
                    entry.fallback,
                    Some(RenderMethod::ProgrammaticPlot),
                    "{} cannot punt",
                    entry.chart_type
                );
            }
        }
    }

    #[test]
    fn test_programmatic_only_types_have_no_fallback() {
        for entry in all_strategies() {
            if entry.primary == RenderMethod::ProgrammaticPlot {
                assert!(entry.fallback.is_none(), "{}", entry.chart_type);
            }
        }
    }

    #[test]
    fn test_statistical_types_are_programmatic() {
        for chart_type in [
            ChartType::Histogram,
            ChartType::BoxPlot,
            ChartType::ViolinPlot,
            ChartType::Heatmap,
            ChartType::Hexbin,
        ] {
            assert_eq!(strategy_for(chart_type).primary, RenderMethod::ProgrammaticPlot);
        }
    }

    #[test]
    fn test_every_entry_declares_roles() {
        for entry in all_strategies() {
            assert!(!entry.roles.is_empty(), "{}", entry.chart_type);
            assert!(entry.synthetic.points > 0);
            assert!(entry.synthetic.value_min < entry.synthetic.value_max);
        }
    }

    #[test]
    fn test_method_chain_default_order() {
        assert_eq!(
            method_chain(ChartType::Pie, None),
            vec![RenderMethod::DeclarativeDiagram, RenderMethod::ProgrammaticPlot]
        );
        assert_eq!(
            method_chain(ChartType::Heatmap, None),
            vec![RenderMethod::ProgrammaticPlot]
        );
    }

    #[test]
    fn test_method_chain_honours_supported_preference() {
        assert_eq!(
            method_chain(ChartType::Line, Some(RenderMethod::ProgrammaticPlot)),
            vec![RenderMethod::ProgrammaticPlot, RenderMethod::DeclarativeDiagram]
        );
    }

    #[test]
    fn test_method_chain_ignores_unsupported_preference() {
        assert_eq!(
            method_chain(ChartType::Hexbin, Some(RenderMethod::DeclarativeDiagram)),
            vec![RenderMethod::ProgrammaticPlot]
        );
    }

    #[test]
    fn test_signed_defaults_only_for_diverging_data() {
        assert!(strategy_for(ChartType::Waterfall).synthetic.is_signed());
        assert!(strategy_for(ChartType::Heatmap).synthetic.is_signed());
        assert!(!strategy_for(ChartType::Pie).synthetic.is_signed());
    }
}
