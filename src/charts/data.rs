use std::collections::{BTreeMap, BTreeSet};

use chrono::{Duration as ChronoDuration, NaiveDate};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::strategy::{strategy_for, DataKind, DataRole, RoleSource, StrategyEntry};
use super::types::{ChartType, DataPoint};
use crate::error::AppError;

const MONTHS: [&str; 12] = [
    "Jan", "Feb", "Mar", "Apr", "May", "Jun", "Jul", "Aug", "Sep", "Oct", "Nov", "Dec",
];

#[derive(Debug, Clone, Copy)]
enum RoleValue<'a> {
    Text(&'a str),
    Number(f64),
}

impl RoleValue<'_> {
    fn key(&self) -> String {
        match self {
            RoleValue::Text(s) => s.to_string(),
            RoleValue::Number(n) => format!("{}", n),
        }
    }
}

fn role_value<'a>(point: &'a DataPoint, source: RoleSource) -> Option<RoleValue<'a>> {
    match source {
        RoleSource::Label => {
            let label = point.label.trim();
            (!label.is_empty()).then_some(RoleValue::Text(label))
        }
        RoleSource::Value => Some(RoleValue::Number(point.value)),
        RoleSource::Category => point.category.as_deref().map(RoleValue::Text),
        RoleSource::Series => point.series.as_deref().map(RoleValue::Text),
        RoleSource::Aux(key) => match point.auxiliary.get(key)? {
            serde_json::Value::String(s) => Some(RoleValue::Text(s)),
            serde_json::Value::Number(n) => n.as_f64().map(RoleValue::Number),
            _ => None,
        },
    }
}

/// Accepts a numeric offset or an ISO `YYYY-MM-DD` date.
pub fn parse_time(text: &str) -> Option<f64> {
    let trimmed = text.trim();
    if let Ok(n) = trimmed.parse::<f64>() {
        return n.is_finite().then_some(n);
    }
    let epoch = NaiveDate::from_ymd_opt(1970, 1, 1)?;
    NaiveDate::parse_from_str(trimmed, "%Y-%m-%d")
        .ok()
        .map(|d| (d - epoch).num_days() as f64)
}

fn kind_matches(value: RoleValue<'_>, kind: DataKind) -> bool {
    match (kind, value) {
        (DataKind::Categorical, _) => true,
        (DataKind::Numeric, RoleValue::Number(n)) => n.is_finite(),
        (DataKind::Numeric, RoleValue::Text(s)) => s.trim().parse::<f64>().is_ok_and(f64::is_finite),
        (DataKind::Time, RoleValue::Number(n)) => n.is_finite(),
        (DataKind::Time, RoleValue::Text(s)) => parse_time(s).is_some(),
    }
}

fn check_role(role: &DataRole, points: &[DataPoint]) -> Result<(), AppError> {
    let mut distinct = BTreeSet::new();
    for (i, point) in points.iter().enumerate() {
        let value = role_value(point, role.source).ok_or_else(|| {
            AppError::InvalidRequest(format!(
                "data point {} ('{}') is missing the '{}' role",
                i, point.label, role.name
            ))
        })?;
        if !kind_matches(value, role.kind) {
            return Err(AppError::InvalidRequest(format!(
                "data point {} ('{}') has a non-{:?} '{}' value",
                i,
                point.label,
                role.kind,
                role.name
            )));
        }
        distinct.insert(value.key());
    }

    if let Some(cardinality) = role.cardinality {
        let count = match role.kind {
            DataKind::Numeric => points.len(),
            DataKind::Categorical | DataKind::Time => distinct.len(),
        };
        if count < cardinality.min {
            return Err(AppError::InvalidRequest(format!(
                "'{}' needs at least {} values, got {}",
                role.name, cardinality.min, count
            )));
        }
        if let Some(max) = cardinality.max {
            if count > max {
                return Err(AppError::InvalidRequest(format!(
                    "'{}' allows at most {} values, got {}",
                    role.name, max, count
                )));
            }
        }
    }
    Ok(())
}

/// Check that `points` carry everything the chart type's roles require.
pub fn validate_points(chart_type: ChartType, points: &[DataPoint]) -> Result<(), AppError> {
    if points.is_empty() {
        return Err(AppError::InvalidRequest(format!(
            "{} requires at least one data point",
            chart_type
        )));
    }
    if let Some(bad) = points.iter().find(|p| !p.value.is_finite()) {
        return Err(AppError::InvalidRequest(format!(
            "data point '{}' has a non-finite value",
            bad.label
        )));
    }

    let must_be_non_negative = chart_type.is_part_of_whole() || chart_type == ChartType::Bubble;
    if must_be_non_negative {
        if let Some(bad) = points.iter().find(|p| p.value < 0.0) {
            return Err(AppError::InvalidRequest(format!(
                "{} cannot show negative value {} for '{}'",
                chart_type, bad.value, bad.label
            )));
        }
    }

    for role in strategy_for(chart_type).roles {
        check_role(role, points)?;
    }
    if chart_type == ChartType::ViolinPlot {
        check_group_spread(points)?;
    }
    Ok(())
}

/// Each violin group needs two distinct values for a density estimate.
fn check_group_spread(points: &[DataPoint]) -> Result<(), AppError> {
    let mut groups: BTreeMap<&str, BTreeSet<u64>> = BTreeMap::new();
    for point in points {
        let group = point.category.as_deref().unwrap_or_default();
        // + 0.0 folds -0.0 into 0.0
        groups.entry(group).or_default().insert((point.value + 0.0).to_bits());
    }
    match groups.iter().find(|(_, values)| values.len() < 2) {
        Some((group, _)) => Err(AppError::InvalidRequest(format!(
            "violin group '{}' needs at least 2 distinct values",
            group
        ))),
        None => Ok(()),
    }
}

/// Distinct series names in first-seen order. Points without a series count as one group.
pub fn distinct_series(points: &[DataPoint]) -> Vec<String> {
    let mut seen = Vec::new();
    for point in points {
        let name = point.series.clone().unwrap_or_default();
        if !seen.contains(&name) {
            seen.push(name);
        }
    }
    seen
}

pub fn distinct_categories(points: &[DataPoint]) -> Vec<String> {
    let mut seen = Vec::new();
    for point in points {
        if let Some(category) = &point.category {
            if !seen.contains(category) {
                seen.push(category.clone());
            }
        }
    }
    seen
}

pub fn has_signed_values(points: &[DataPoint]) -> bool {
    points.iter().any(|p| p.value < 0.0)
}

fn letter_label(prefix: &str, i: usize) -> String {
    let letter = (b'A' + (i % 26) as u8) as char;
    if i < 26 {
        format!("{} {}", prefix, letter)
    } else {
        format!("{} {}{}", prefix, letter, i / 26)
    }
}

fn sequence_label(i: usize) -> String {
    if i < MONTHS.len() {
        MONTHS[i].to_string()
    } else {
        format!("{} Y{}", MONTHS[i % MONTHS.len()], i / MONTHS.len() + 1)
    }
}

fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

/// Approximately normal sample (Irwin–Hall with 6 uniforms), centred on the range midpoint.
fn bell(rng: &mut StdRng, min: f64, max: f64) -> f64 {
    let sum: f64 = (0..6).map(|_| rng.gen::<f64>()).sum();
    min + (max - min) * (sum / 6.0)
}

fn base_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 1, 1).unwrap_or(NaiveDate::MIN)
}

/// Deterministic synthetic data shaped by the strategy table.
pub fn synthesize(chart_type: ChartType, seed: u64) -> Vec<DataPoint> {
    let entry: &StrategyEntry = strategy_for(chart_type);
    let defaults = entry.synthetic;
    let (min, max) = (defaults.value_min, defaults.value_max);
    let mut rng = StdRng::seed_from_u64(seed);

    match chart_type {
        ChartType::Line | ChartType::Area | ChartType::Step => {
            let mut level = (min + max) / 2.0;
            let drift = (max - min) / 10.0;
            (0..defaults.points)
                .map(|i| {
                    level = (level + rng.gen_range(-drift..drift)).clamp(min, max);
                    DataPoint::new(sequence_label(i), round2(level))
                })
                .collect()
        }
        ChartType::Histogram => (0..defaults.points)
            .map(|i| DataPoint::new(format!("obs-{}", i + 1), round2(bell(&mut rng, min, max))))
            .collect(),
        ChartType::BoxPlot | ChartType::ViolinPlot => {
            let mut points = Vec::with_capacity(defaults.points * defaults.series);
            for g in 0..defaults.series {
                let group = letter_label("Group", g);
                let shift = (max - min) * 0.1 * g as f64;
                for i in 0..defaults.points {
                    let value = bell(&mut rng, min + shift * 0.5, max - shift * 0.2);
                    points.push(
                        DataPoint::new(format!("{}-{}", group, i + 1), round2(value))
                            .with_category(group.clone()),
                    );
                }
            }
            points
        }
        ChartType::Scatter | ChartType::Hexbin | ChartType::Bubble => (0..defaults.points)
            .map(|i| {
                let x = rng.gen_range(0.0..100.0);
                let y = (0.6 * x + bell(&mut rng, -20.0, 20.0) + 10.0).max(0.0);
                let value = if chart_type == ChartType::Bubble {
                    rng.gen_range(min..max)
                } else {
                    y
                };
                DataPoint::new(format!("p{}", i + 1), round2(value))
                    .with_aux("x", round2(x))
                    .with_aux("y", round2(y))
            })
            .collect(),
        ChartType::Heatmap => {
            let mut points = Vec::with_capacity(defaults.points * defaults.series);
            for r in 0..defaults.points {
                for c in 0..defaults.series {
                    let value = if r == c { 1.0 } else { round2(rng.gen_range(min..max)) };
                    points.push(
                        DataPoint::new(format!("R{}-C{}", r + 1, c + 1), value)
                            .with_category(format!("Metric {}", r + 1))
                            .with_series(format!("Metric {}", c + 1)),
                    );
                }
            }
            points
        }
        ChartType::Waterfall => {
            let mut points = vec![DataPoint::new("Start", round2(max))];
            for i in 1..defaults.points {
                points.push(DataPoint::new(
                    format!("Step {}", i),
                    round2(rng.gen_range(min..max) / 2.0),
                ));
            }
            points
        }
        ChartType::Funnel => {
            let mut current = max;
            (0..defaults.points)
                .map(|i| {
                    let point = DataPoint::new(format!("Stage {}", i + 1), current.round());
                    current *= rng.gen_range(0.45..0.85);
                    point
                })
                .collect()
        }
        ChartType::ErrorBar => (0..defaults.points)
            .map(|i| {
                let value = rng.gen_range(min..max);
                let error = value * rng.gen_range(0.05..0.15);
                DataPoint::new(letter_label("Trial", i), round2(value)).with_aux("error", round2(error))
            })
            .collect(),
        ChartType::ControlChart => {
            let start = base_date();
            (0..defaults.points)
                .map(|i| {
                    let date = start + ChronoDuration::days(i as i64);
                    DataPoint::new(date.format("%Y-%m-%d").to_string(), round2(bell(&mut rng, min, max)))
                })
                .collect()
        }
        ChartType::Pareto => {
            let mut values: Vec<f64> = (0..defaults.points).map(|_| rng.gen_range(min..max)).collect();
            values.sort_by(|a, b| b.total_cmp(a));
            values
                .into_iter()
                .enumerate()
                .map(|(i, v)| DataPoint::new(letter_label("Cause", i), v.round()))
                .collect()
        }
        ChartType::Gantt => {
            let mut offset = 0_i64;
            (0..defaults.points)
                .map(|i| {
                    let duration = rng.gen_range(min..max).round().max(1.0);
                    let start = base_date() + ChronoDuration::days(offset);
                    offset += rng.gen_range(1..=(duration as i64));
                    let phase = format!("Phase {}", i * defaults.series / defaults.points + 1);
                    DataPoint::new(format!("Task {}", i + 1), duration)
                        .with_category(phase)
                        .with_aux("start", start.format("%Y-%m-%d").to_string())
                        .with_aux("duration", duration)
                })
                .collect()
        }
        ChartType::Radar | ChartType::StackedArea | ChartType::GroupedBar | ChartType::StackedBar => {
            let mut points = Vec::with_capacity(defaults.points * defaults.series);
            for s in 0..defaults.series {
                let series = format!("Series {}", s + 1);
                for i in 0..defaults.points {
                    let label = if chart_type == ChartType::Radar {
                        letter_label("Axis", i)
                    } else {
                        sequence_label(i)
                    };
                    points.push(
                        DataPoint::new(label, round2(rng.gen_range(min..max))).with_series(series.clone()),
                    );
                }
            }
            points
        }
        ChartType::BarVertical | ChartType::BarHorizontal | ChartType::Pie | ChartType::Treemap => {
            (0..defaults.points)
                .map(|i| DataPoint::new(letter_label("Category", i), round2(rng.gen_range(min..max))))
                .collect()
        }
    }
}
