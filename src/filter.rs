// County risk filter: ten per-hazard rating ceilings, then a floor on
// expected value.
use crate::error::PipelineError;
use crate::types::{Hazard, HazardRecord, RiskRating, ValuedCounty};
use crate::util::mean;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use tracing::info;

/// The two source analyses. They agree on every ceiling except heat wave
/// and rank states with different scoring formulas.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum Preset {
    #[default]
    Agricultural,
    SmallFarm,
}

impl Preset {
    pub fn name(self) -> &'static str {
        match self {
            Preset::Agricultural => "agricultural",
            Preset::SmallFarm => "small-farm",
        }
    }
}

/// Highest rating tolerated per hazard. A rating passes when it is at or
/// below the ceiling; a missing rating never passes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RiskTolerance {
    ceilings: [RiskRating; 10],
}

impl RiskTolerance {
    pub fn for_preset(preset: Preset) -> Self {
        use RiskRating::{
            RelativelyHigh as High, RelativelyLow as Low, RelativelyModerate as Moderate,
        };
        let heat_wave = match preset {
            Preset::Agricultural => Low,
            Preset::SmallFarm => Moderate,
        };
        let mut ceilings = [Moderate; 10];
        for h in Hazard::ALL {
            ceilings[h.index()] = match h {
                Hazard::CoastalFlood => Low,
                Hazard::ColdWave | Hazard::Drought | Hazard::Hurricane | Hazard::IceStorm => {
                    Moderate
                }
                Hazard::HeatWave => heat_wave,
                Hazard::RiverineFlood
                | Hazard::Tornado
                | Hazard::Wildfire
                | Hazard::WinterWeather => High,
            };
        }
        RiskTolerance { ceilings }
    }

    /// Same ceiling for every hazard.
    #[cfg(test)]
    pub fn uniform(ceiling: RiskRating) -> Self {
        RiskTolerance { ceilings: [ceiling; 10] }
    }

    pub fn with_ceiling(mut self, hazard: Hazard, ceiling: RiskRating) -> Self {
        self.ceilings[hazard.index()] = ceiling;
        self
    }

    pub fn ceiling(&self, hazard: Hazard) -> RiskRating {
        self.ceilings[hazard.index()]
    }

    pub fn accepts(&self, hazard: Hazard, rating: Option<RiskRating>) -> bool {
        rating.map_or(false, |r| r <= self.ceiling(hazard))
    }

    /// All ten predicates must hold.
    pub fn allows(&self, record: &HazardRecord) -> bool {
        Hazard::ALL
            .into_iter()
            .all(|h| self.accepts(h, record.rating(h)))
    }
}

impl Default for RiskTolerance {
    fn default() -> Self {
        RiskTolerance::for_preset(Preset::default())
    }
}

/// Floor on expected value applied after the hazard predicates.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum ValueThreshold {
    /// Mean expected value of the unfiltered county set.
    #[default]
    Mean,
    Fixed(f64),
}

impl ValueThreshold {
    pub fn resolve(&self, counties: &[ValuedCounty]) -> f64 {
        match self {
            ValueThreshold::Fixed(v) => *v,
            ValueThreshold::Mean => {
                let values: Vec<f64> = counties.iter().map(|c| c.expected_value).collect();
                mean(&values).unwrap_or(0.0)
            }
        }
    }

    pub fn name(&self) -> String {
        match self {
            ValueThreshold::Mean => "mean".to_string(),
            ValueThreshold::Fixed(v) => v.to_string(),
        }
    }
}

impl FromStr for ValueThreshold {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.eq_ignore_ascii_case("mean") {
            return Ok(ValueThreshold::Mean);
        }
        match s.replace(',', "").parse::<f64>() {
            Ok(v) if v.is_finite() => Ok(ValueThreshold::Fixed(v)),
            _ => Err(PipelineError::Config(format!(
                "value threshold must be \"mean\" or a number, got {s:?}"
            ))),
        }
    }
}

#[derive(Debug, Clone)]
pub struct FilterOutcome {
    pub hazard_survivors: usize,
    pub threshold: f64,
    pub rule: ValueThreshold,
    pub survivors: Vec<ValuedCounty>,
}

pub fn apply_hazard_filter(
    counties: &[ValuedCounty],
    tolerance: &RiskTolerance,
) -> Vec<ValuedCounty> {
    counties
        .iter()
        .filter(|c| tolerance.allows(&c.hazard))
        .cloned()
        .collect()
}

pub fn apply_value_threshold(counties: &[ValuedCounty], threshold: f64) -> Vec<ValuedCounty> {
    counties
        .iter()
        .filter(|c| c.expected_value >= threshold)
        .cloned()
        .collect()
}

/// Hazard predicates first, then the value floor. The threshold is resolved
/// against the full input, not the hazard survivors.
pub fn filter_counties(
    counties: &[ValuedCounty],
    tolerance: &RiskTolerance,
    threshold: ValueThreshold,
) -> FilterOutcome {
    let rule = threshold;
    let threshold = rule.resolve(counties);
    let safe = apply_hazard_filter(counties, tolerance);
    let survivors = apply_value_threshold(&safe, threshold);
    info!(
        counties = counties.len(),
        hazard_survivors = safe.len(),
        survivors = survivors.len(),
        threshold,
        "filtered counties"
    );
    FilterOutcome { hazard_survivors: safe.len(), threshold, rule, survivors }
}
