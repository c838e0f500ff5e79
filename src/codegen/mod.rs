pub mod matplotlib;
pub mod mermaid;

use serde::{Deserialize, Serialize};

use crate::charts::{ChartType, DataPoint, RenderMethod};
use crate::error::AppError;
use crate::theme::StyleRecord;

/// Caller-supplied text for a chart. Unset fields fall back to per-template defaults.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TemplateOptions {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub x_label: Option<String>,
    #[serde(default)]
    pub y_label: Option<String>,
}

/// Source text produced for one render method.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GeneratedSource {
    pub method: RenderMethod,
    pub text: String,
}

/// Build the source for `chart_type` in the given method.
///
/// `points` are expected to have passed `validate_points`. Declarative
/// generation returns `AppError::Unsupported` when Mermaid cannot express the
/// chart or its data.
pub fn generate(
    chart_type: ChartType,
    method: RenderMethod,
    points: &[DataPoint],
    style: &StyleRecord,
    options: &TemplateOptions,
) -> Result<GeneratedSource, AppError> {
    let text = match method {
        RenderMethod::DeclarativeDiagram => mermaid::render_markup(chart_type, points, style, options)?,
        RenderMethod::ProgrammaticPlot => matplotlib::render_source(chart_type, points, style, options)?,
    };
    Ok(GeneratedSource { method, text })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::charts::data::synthesize;
    use crate::theme::{derive_palette, style_for, ThemeSeed};

    fn style(chart_type: ChartType) -> StyleRecord {
        let seed = ThemeSeed::default();
        style_for(chart_type, &seed, &derive_palette(&seed))
    }

    #[test]
    fn test_generate_dispatches_by_method() {
        let points = synthesize(ChartType::Pie, 5);
        let options = TemplateOptions::default();

        let diagram = generate(ChartType::Pie, RenderMethod::DeclarativeDiagram, &points, &style(ChartType::Pie), &options)
            .unwrap();
        assert_eq!(diagram.method, RenderMethod::DeclarativeDiagram);
        assert!(diagram.text.contains("pie showData"));

        let plot = generate(ChartType::Pie, RenderMethod::ProgrammaticPlot, &points, &style(ChartType::Pie), &options)
            .unwrap();
        assert_eq!(plot.method, RenderMethod::ProgrammaticPlot);
        assert!(plot.text.contains("ax.pie("));
    }

    #[test]
    fn test_declarative_unsupported_for_programmatic_types() {
        let points = synthesize(ChartType::BoxPlot, 5);
        let result = generate(
            ChartType::BoxPlot,
            RenderMethod::DeclarativeDiagram,
            &points,
            &style(ChartType::BoxPlot),
            &TemplateOptions::default(),
        );
        assert!(matches!(result, Err(AppError::Unsupported(_))));
    }

    #[test]
    fn test_options_deserialize_partial() {
        let options: TemplateOptions = serde_json::from_str(r#"{"title": "Revenue"}"#).unwrap();
        assert_eq!(options.title.as_deref(), Some("Revenue"));
        assert!(options.x_label.is_none());
    }
}
