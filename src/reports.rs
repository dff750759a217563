use crate::filter::{FilterOutcome, Preset};
use crate::types::{CountyValueRow, StateAggregate, StateRankingRow, SummaryStats, ValuedCounty};
use crate::util::{describe, format_number, format_optional, mean};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};

/// How a state's coverage and value combine into the ranking score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum ScoringPolicy {
    /// coverage ratio × mean expected value
    CoverageTimesValue,
    /// filtered area + 0.1 × mean expected value
    AreaPlusTenthValue,
}

impl ScoringPolicy {
    pub fn for_preset(preset: Preset) -> Self {
        match preset {
            Preset::Agricultural => ScoringPolicy::CoverageTimesValue,
            Preset::SmallFarm => ScoringPolicy::AreaPlusTenthValue,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            ScoringPolicy::CoverageTimesValue => "coverage-times-value",
            ScoringPolicy::AreaPlusTenthValue => "area-plus-tenth-value",
        }
    }

    /// Missing whenever the state has no mean value to weigh.
    pub fn score(
        self,
        coverage_ratio: f64,
        filtered_area: f64,
        mean_value: Option<f64>,
    ) -> Option<f64> {
        let value = mean_value?;
        Some(match self {
            ScoringPolicy::CoverageTimesValue => coverage_ratio * value,
            ScoringPolicy::AreaPlusTenthValue => filtered_area + 0.1 * value,
        })
    }
}

/// Group counties by state. Total area comes from `all`; filtered area,
/// survivor count and mean value come from `filtered`. States keep the
/// order in which they first appear in `all`.
pub fn aggregate_states(
    all: &[ValuedCounty],
    filtered: &[ValuedCounty],
    policy: ScoringPolicy,
) -> Vec<StateAggregate> {
    #[derive(Default)]
    struct Acc {
        total_area: f64,
        filtered_area: f64,
        values: Vec<f64>,
    }

    let mut order: Vec<String> = Vec::new();
    let mut map: HashMap<String, Acc> = HashMap::new();
    for c in all {
        let state = &c.hazard.state;
        if !map.contains_key(state) {
            order.push(state.clone());
        }
        map.entry(state.clone()).or_default().total_area += c.hazard.area;
    }
    for c in filtered {
        let state = &c.hazard.state;
        if !map.contains_key(state) {
            order.push(state.clone());
        }
        let e = map.entry(state.clone()).or_default();
        e.filtered_area += c.hazard.area;
        e.values.push(c.expected_value);
    }

    order
        .into_iter()
        .map(|state| {
            let acc = map.remove(&state).unwrap_or_default();
            let coverage_ratio = if acc.total_area > 0.0 {
                acc.filtered_area / acc.total_area
            } else {
                0.0
            };
            let mean_expected_value = mean(&acc.values);
            StateAggregate {
                weighted_score: policy.score(
                    coverage_ratio,
                    acc.filtered_area,
                    mean_expected_value,
                ),
                state,
                total_area: acc.total_area,
                filtered_area: acc.filtered_area,
                surviving_counties: acc.values.len(),
                mean_expected_value,
                coverage_ratio,
            }
        })
        .collect()
}

/// Descending by score; missing scores last. The sort is stable, so ties
/// keep first-appearance order.
pub fn rank_states(mut aggregates: Vec<StateAggregate>) -> Vec<StateAggregate> {
    aggregates.sort_by(|a, b| match (a.weighted_score, b.weighted_score) {
        (Some(x), Some(y)) => y.partial_cmp(&x).unwrap_or(Ordering::Equal),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    });
    aggregates
}

pub fn ranking_rows(ranked: &[StateAggregate]) -> Vec<StateRankingRow> {
    ranked
        .iter()
        .enumerate()
        .map(|(idx, a)| StateRankingRow {
            rank: idx + 1,
            state: a.state.clone(),
            total_area: format_number(a.total_area, 2),
            filtered_area: format_number(a.filtered_area, 2),
            surviving_counties: a.surviving_counties,
            coverage_ratio: format_number(a.coverage_ratio, 4),
            mean_expected_value: format_optional(a.mean_expected_value, 2),
            weighted_score: format_optional(a.weighted_score, 2),
        })
        .collect()
}

/// Every county in input order, flagged with whether it is in `survivors`.
pub fn county_rows(all: &[ValuedCounty], survivors: &[ValuedCounty]) -> Vec<CountyValueRow> {
    let passed: HashSet<&str> = survivors.iter().map(|c| c.hazard.identifier.as_str()).collect();
    all.iter()
        .map(|c| {
            let h = &c.hazard;
            let dominant = h.dominant_hazard();
            CountyValueRow {
                identifier: h.identifier.clone(),
                nri_id: h.nri_id.clone(),
                state: h.state.clone(),
                state_abbrev: h.state_abbrev.clone(),
                county: h.county.clone(),
                county_type: h.county_type.clone(),
                area: h.area,
                agri_value: h.agri_value,
                risk_score: h.risk_score,
                risk_rating: h.risk_rating.map(|r| r.label().to_string()).unwrap_or_default(),
                dominant_hazard: dominant.map(|(hz, _)| hz.name().to_string()).unwrap_or_default(),
                dominant_hazard_score: dominant.map_or(0.0, |(_, m)| m.risk_score),
                dominant_hazard_frequency: dominant.map_or(0.0, |(_, m)| m.annual_frequency),
                yield_impact: c.yield_impact,
                value_per_sq_mile: c.value_per_sq_mile,
                yield_decline_probability: c.yield_decline_probability,
                expected_value: c.expected_value,
                survives: passed.contains(h.identifier.as_str()),
            }
        })
        .collect()
}

pub fn generate_summary(
    preset: Preset,
    policy: ScoringPolicy,
    base_year: u16,
    all: &[ValuedCounty],
    outcome: &FilterOutcome,
    ranked: &[StateAggregate],
    top_n: usize,
) -> SummaryStats {
    let expected_values: Vec<f64> = all.iter().map(|c| c.expected_value).collect();
    SummaryStats {
        preset: preset.name().to_string(),
        scoring: policy.name().to_string(),
        base_year,
        joined_counties: all.len(),
        hazard_survivors: outcome.hazard_survivors,
        value_survivors: outcome.survivors.len(),
        value_threshold: outcome.threshold,
        threshold_rule: outcome.rule.name(),
        expected_value_stats: describe(&expected_values),
        total_area: all.iter().map(|c| c.hazard.area).sum(),
        filtered_area: outcome.survivors.iter().map(|c| c.hazard.area).sum(),
        top_states: ranked
            .iter()
            .filter(|a| a.weighted_score.is_some())
            .take(top_n)
            .map(|a| a.state.clone())
            .collect(),
    }
}
