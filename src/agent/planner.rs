//! Turning a natural-language request into a chart plan.
//!
//! `KeywordPlanner` is a fixed lookup table and needs nothing external.
//! `LlmPlanner` asks an `AiProvider` for a JSON plan and can fall back to the
//! keyword table when the model's answer is unusable.

use std::sync::LazyLock;

use async_trait::async_trait;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::extract;
use crate::ai::message::ChatMessage;
use crate::ai::provider::AiProvider;
use crate::ai::retry::{retry_with_backoff, RetryPolicy};
use crate::charts::{ChartType, DataPoint};
use crate::error::AppError;

const MAX_TITLE_CHARS: usize = 60;
const PLAN_MAX_TOKENS: u32 = 1024;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChartPlan {
    pub chart_type: ChartType,
    pub title: String,
    pub series_count: usize,
    /// Data the model extracted from the request, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub points: Option<Vec<DataPoint>>,
}

#[async_trait]
pub trait ChartPlanner: Send + Sync {
    async fn plan(&self, prompt: &str) -> Result<ChartPlan, AppError>;
}

/// Ordered most specific first; the first hit wins.
const KEYWORDS: &[(ChartType, &[&str])] = &[
    (ChartType::Gantt, &["gantt", "timeline", "schedule", "roadmap", "milestone", "milestones"]),
    (ChartType::Waterfall, &["waterfall", "bridge chart"]),
    (ChartType::Funnel, &["funnel", "conversion"]),
    (ChartType::Pareto, &["pareto", "80/20"]),
    (ChartType::ControlChart, &["control chart", "spc", "control limits"]),
    (ChartType::Radar, &["radar", "spider"]),
    (ChartType::Heatmap, &["heatmap", "heat map", "correlation matrix", "correlation"]),
    (ChartType::Hexbin, &["hexbin", "hexagonal", "density"]),
    (ChartType::Bubble, &["bubble"]),
    (ChartType::Scatter, &["scatter", "relationship", "versus", "vs"]),
    (ChartType::ViolinPlot, &["violin"]),
    (ChartType::BoxPlot, &["box plot", "boxplot", "quartile", "quartiles", "outliers"]),
    (ChartType::Histogram, &["histogram", "distribution", "frequency"]),
    (ChartType::ErrorBar, &["error bar", "error bars", "confidence interval", "uncertainty"]),
    (ChartType::Treemap, &["treemap", "hierarchy"]),
    (ChartType::Pie, &["pie", "donut", "share", "proportion", "breakdown", "percentage"]),
    (ChartType::StackedArea, &["stacked area"]),
    (ChartType::StackedBar, &["stacked bar", "stacked column"]),
    (ChartType::GroupedBar, &["grouped bar", "side by side", "clustered"]),
    (ChartType::Step, &["step chart", "staircase"]),
    (ChartType::Area, &["area"]),
    (ChartType::BarHorizontal, &["horizontal bar", "ranking", "top 10", "leaderboard"]),
    (ChartType::Line, &["line", "trend", "over time", "time series", "growth"]),
    (ChartType::BarVertical, &["bar", "column", "compare", "comparison"]),
];

/// Deterministic keyword lookup. Unmatched prompts get a vertical bar chart.
#[derive(Debug, Clone, Copy, Default)]
pub struct KeywordPlanner;

impl KeywordPlanner {
    pub fn classify(prompt: &str) -> ChartType {
        let lower = prompt.to_lowercase();
        KEYWORD_MATCHERS
            .iter()
            .find(|(_, matchers)| matchers.iter().any(|re| re.is_match(&lower)))
            .map(|(chart_type, _)| *chart_type)
            .unwrap_or(ChartType::BarVertical)
    }

    pub fn plan_for(prompt: &str) -> ChartPlan {
        let chart_type = Self::classify(prompt);
        ChartPlan {
            chart_type,
            title: title_from_prompt(prompt),
            series_count: default_series_count(chart_type),
            points: None,
        }
    }
}

#[async_trait]
impl ChartPlanner for KeywordPlanner {
    async fn plan(&self, prompt: &str) -> Result<ChartPlan, AppError> {
        Ok(Self::plan_for(prompt))
    }
}

/// `KEYWORDS` compiled once into whole-phrase matchers.
static KEYWORD_MATCHERS: LazyLock<Vec<(ChartType, Vec<Regex>)>> = LazyLock::new(|| {
    KEYWORDS
        .iter()
        .map(|(chart_type, words)| (*chart_type, words.iter().filter_map(|w| phrase_regex(w)).collect()))
        .collect()
});

fn phrase_regex(phrase: &str) -> Option<Regex> {
    Regex::new(&format!(r"(^|\W){}($|\W)", regex::escape(phrase))).ok()
}

fn default_series_count(chart_type: ChartType) -> usize {
    match chart_type {
        ChartType::GroupedBar | ChartType::StackedBar | ChartType::StackedArea => 3,
        ChartType::Radar => 2,
        _ => 1,
    }
}

fn title_from_prompt(prompt: &str) -> String {
    let trimmed = prompt.trim().trim_end_matches(&['.', '!', '?'][..]);
    let mut title: String = trimmed.chars().take(MAX_TITLE_CHARS).collect();
    if trimmed.chars().count() > MAX_TITLE_CHARS {
        title = title.trim_end().to_string();
        title.push_str("...");
    }
    let mut chars = title.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => "Chart".to_string(),
    }
}

/// JSON shape the model is asked to produce.
#[derive(Debug, Deserialize)]
struct RawPlan {
    chart_type: String,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    series_count: Option<usize>,
    #[serde(default)]
    points: Option<Vec<DataPoint>>,
}

fn system_prompt() -> String {
    let names: Vec<&str> = ChartType::ALL.iter().map(|t| t.slug()).collect();
    format!(
        "You choose chart types for analytics requests. Reply with a single JSON object \
         {{\"chart_type\": <one of: {}>, \"title\": <short title>, \"series_count\": <integer>, \
         \"points\": <optional array of {{\"label\", \"value\", \"category\"?, \"series\"?}}>}} \
         and nothing else.",
        names.join(", ")
    )
}

/// Planner backed by a text-generation provider.
pub struct LlmPlanner<P: AiProvider> {
    provider: P,
    policy: RetryPolicy,
    keyword_fallback: bool,
}

impl<P: AiProvider> LlmPlanner<P> {
    pub fn new(provider: P) -> Self {
        Self {
            provider,
            policy: RetryPolicy::default(),
            keyword_fallback: true,
        }
    }

    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_keyword_fallback(mut self, enabled: bool) -> Self {
        self.keyword_fallback = enabled;
        self
    }

    fn parse_response(response: &str, prompt: &str) -> Result<ChartPlan, AppError> {
        let json = extract::extract_json_object(response).ok_or_else(|| {
            AppError::AiProviderError("response contained no JSON object".to_string())
        })?;
        let raw: RawPlan = serde_json::from_str(&json)
            .map_err(|e| AppError::AiProviderError(format!("malformed plan: {}", e)))?;
        let chart_type: ChartType = raw
            .chart_type
            .parse()
            .map_err(|e: AppError| AppError::AiProviderError(e.to_string()))?;

        Ok(ChartPlan {
            chart_type,
            title: raw
                .title
                .filter(|t| !t.trim().is_empty())
                .unwrap_or_else(|| title_from_prompt(prompt)),
            series_count: raw
                .series_count
                .filter(|n| *n > 0)
                .unwrap_or_else(|| default_series_count(chart_type)),
            points: raw.points.filter(|p| !p.is_empty()),
        })
    }
}

#[async_trait]
impl<P: AiProvider> ChartPlanner for LlmPlanner<P> {
    async fn plan(&self, prompt: &str) -> Result<ChartPlan, AppError> {
        let messages = [ChatMessage::system(system_prompt()), ChatMessage::user(prompt)];
        let (response, usage) = retry_with_backoff(self.policy, self.provider.name(), || {
            self.provider.complete(&messages, Some(PLAN_MAX_TOKENS))
        })
        .await?;

        if let Some(usage) = usage {
            debug!(
                provider = self.provider.name(),
                tokens = usage.total(),
                "plan response received"
            );
        }

        match Self::parse_response(&response, prompt) {
            Ok(plan) => Ok(plan),
            Err(e) if self.keyword_fallback => {
                warn!(provider = self.provider.name(), error = %e, "unusable plan, using keyword planner");
                Ok(KeywordPlanner::plan_for(prompt))
            }
            Err(e) => Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::provider::TokenUsage;
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use std::time::Duration;

    struct ScriptedProvider {
        responses: Mutex<VecDeque<Result<String, AppError>>>,
        calls: Mutex<u32>,
    }

    impl ScriptedProvider {
        fn new(responses: Vec<Result<String, AppError>>) -> Self {
            Self {
                responses: Mutex::new(responses.into()),
                calls: Mutex::new(0),
            }
        }

        fn calls(&self) -> u32 {
            *self.calls.lock().unwrap()
        }
    }

    #[async_trait]
    impl<'a> AiProvider for &'a ScriptedProvider {
        fn name(&self) -> &str {
            "scripted"
        }

        async fn complete(
            &self,
            _messages: &[ChatMessage],
            _max_tokens: Option<u32>,
        ) -> Result<(String, Option<TokenUsage>), AppError> {
            *self.calls.lock().unwrap() += 1;
            let next = self
                .responses
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(AppError::AiProviderError("script exhausted".into())));
            next.map(|text| (text, Some(TokenUsage { input_tokens: 10, output_tokens: 5 })))
        }
    }

    fn fast() -> RetryPolicy {
        RetryPolicy::new(2, Duration::from_millis(1))
    }

    #[test]
    fn test_keyword_classification() {
        assert_eq!(KeywordPlanner::classify("Project roadmap for Q3"), ChartType::Gantt);
        assert_eq!(KeywordPlanner::classify("market share by vendor"), ChartType::Pie);
        assert_eq!(KeywordPlanner::classify("revenue trend over time"), ChartType::Line);
        assert_eq!(KeywordPlanner::classify("height vs weight"), ChartType::Scatter);
        assert_eq!(KeywordPlanner::classify("stacked bar of costs"), ChartType::StackedBar);
        assert_eq!(KeywordPlanner::classify("latency distribution"), ChartType::Histogram);
        assert_eq!(KeywordPlanner::classify("something unrelated"), ChartType::BarVertical);
    }

    #[test]
    fn test_keywords_match_whole_words() {
        // "vs" must not fire inside other words
        assert_eq!(KeywordPlanner::classify("canvass results"), ChartType::BarVertical);
        assert_eq!(KeywordPlanner::classify("pipeline stages"), ChartType::BarVertical);
    }

    #[test]
    fn test_keyword_matchers_compiled_for_every_phrase() {
        assert_eq!(KEYWORD_MATCHERS.len(), KEYWORDS.len());
        for ((chart_type, words), (matched_type, matchers)) in KEYWORDS.iter().zip(KEYWORD_MATCHERS.iter()) {
            assert_eq!(chart_type, matched_type);
            assert_eq!(words.len(), matchers.len(), "{}", chart_type);
        }
        assert_eq!(KeywordPlanner::classify("80/20 of defects"), ChartType::Pareto);
        assert_eq!(KeywordPlanner::classify("TOP 10 customers"), ChartType::BarHorizontal);
    }

    #[test]
    fn test_title_from_prompt() {
        assert_eq!(title_from_prompt("sales by region."), "Sales by region");
        assert_eq!(title_from_prompt("   "), "Chart");
        let long = "a".repeat(100);
        assert!(title_from_prompt(&long).ends_with("..."));
    }

    #[tokio::test]
    async fn test_keyword_planner_trait() {
        let plan = KeywordPlanner.plan("grouped bar of sales per quarter").await.unwrap();
        assert_eq!(plan.chart_type, ChartType::GroupedBar);
        assert_eq!(plan.series_count, 3);
        assert!(plan.points.is_none());
    }

    #[tokio::test]
    async fn test_llm_plan_parsed_from_fenced_json() {
        let provider = ScriptedProvider::new(vec![Ok(
            "Here you go:\n```json\n{\"chart_type\": \"donut\", \"title\": \"Budget\", \"points\": [{\"label\": \"Ops\", \"value\": 4.0}]}\n```".into(),
        )]);
        let planner = LlmPlanner::new(&provider).with_retry_policy(fast());
        let plan = planner.plan("budget split").await.unwrap();
        assert_eq!(plan.chart_type, ChartType::Pie);
        assert_eq!(plan.title, "Budget");
        assert_eq!(plan.series_count, 1);
        assert_eq!(plan.points.unwrap()[0].label, "Ops");
    }

    #[tokio::test]
    async fn test_llm_retries_rate_limits() {
        let provider = ScriptedProvider::new(vec![
            Err(AppError::RateLimited("429".into())),
            Ok("{\"chart_type\": \"line\"}".into()),
        ]);
        let planner = LlmPlanner::new(&provider).with_retry_policy(fast());
        let plan = planner.plan("monthly users").await.unwrap();
        assert_eq!(plan.chart_type, ChartType::Line);
        assert_eq!(plan.title, "Monthly users");
        assert_eq!(provider.calls(), 2);
    }

    #[tokio::test]
    async fn test_unparseable_response_falls_back_to_keywords() {
        let provider = ScriptedProvider::new(vec![Ok("I think a pie chart works.".into())]);
        let planner = LlmPlanner::new(&provider).with_retry_policy(fast());
        let plan = planner.plan("share of revenue").await.unwrap();
        assert_eq!(plan.chart_type, ChartType::Pie);
    }

    #[tokio::test]
    async fn test_unknown_chart_type_without_fallback_errors() {
        let provider = ScriptedProvider::new(vec![Ok("{\"chart_type\": \"sankey\"}".into())]);
        let planner = LlmPlanner::new(&provider)
            .with_retry_policy(fast())
            .with_keyword_fallback(false);
        assert!(matches!(
            planner.plan("flows").await,
            Err(AppError::AiProviderError(_))
        ));
    }

    #[tokio::test]
    async fn test_provider_error_is_not_masked_by_fallback() {
        let provider = ScriptedProvider::new(vec![Err(AppError::AiProviderError("401".into()))]);
        let planner = LlmPlanner::new(&provider).with_retry_policy(fast());
        assert!(planner.plan("sales").await.is_err());
        assert_eq!(provider.calls(), 1);
    }
}
