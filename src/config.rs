// Run configuration: an optional TOML file overlaid by command-line flags.
//
// Example file:
//
//   data_dir = "RI-tables"
//   preset = "small-farm"
//   value_threshold = 86785
//   top_n = 5
//
//   [ceilings]
//   HWAV = "Relatively Low"
use crate::error::{PipelineError, Result};
use crate::filter::{Preset, RiskTolerance, ValueThreshold};
use crate::reports::ScoringPolicy;
use crate::types::{Hazard, RiskRating};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

pub const DEFAULT_DATA_DIR: &str = "data";
pub const DEFAULT_OUTPUT_DIR: &str = ".";
/// Publication year of the projection table; the hazard snapshot it is
/// compared against.
pub const DEFAULT_BASE_YEAR: u16 = 2020;
pub const DEFAULT_TOP_N: usize = 5;

/// One source of settings. Unset fields fall through to the layer below.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ConfigLayer {
    pub data_dir: Option<PathBuf>,
    pub output_dir: Option<PathBuf>,
    pub base_year: Option<u16>,
    pub preset: Option<Preset>,
    pub scoring: Option<ScoringPolicy>,
    pub value_threshold: Option<toml::Value>,
    pub top_n: Option<usize>,
    /// Hazard code (`CFLD`, `HWAV`, ...) to rating label.
    pub ceilings: BTreeMap<String, String>,
}

impl ConfigLayer {
    /// `other` wins wherever it sets a value; ceiling tables merge.
    pub fn overlay(mut self, other: ConfigLayer) -> ConfigLayer {
        self.data_dir = other.data_dir.or(self.data_dir);
        self.output_dir = other.output_dir.or(self.output_dir);
        self.base_year = other.base_year.or(self.base_year);
        self.preset = other.preset.or(self.preset);
        self.scoring = other.scoring.or(self.scoring);
        self.value_threshold = other.value_threshold.or(self.value_threshold);
        self.top_n = other.top_n.or(self.top_n);
        self.ceilings.extend(other.ceilings);
        self
    }
}

pub fn load_config_file(path: &Path) -> Result<ConfigLayer> {
    let text = std::fs::read_to_string(path)
        .map_err(|e| PipelineError::Config(format!("{}: {}", path.display(), e)))?;
    toml::from_str(&text).map_err(|e| PipelineError::Config(format!("{}: {}", path.display(), e)))
}

/// Fully resolved settings for one run.
#[derive(Debug, Clone, PartialEq)]
pub struct AnalysisConfig {
    pub data_dir: PathBuf,
    pub output_dir: PathBuf,
    pub base_year: u16,
    pub preset: Preset,
    pub scoring: ScoringPolicy,
    pub tolerance: RiskTolerance,
    pub value_threshold: ValueThreshold,
    pub top_n: usize,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        let preset = Preset::default();
        AnalysisConfig {
            data_dir: PathBuf::from(DEFAULT_DATA_DIR),
            output_dir: PathBuf::from(DEFAULT_OUTPUT_DIR),
            base_year: DEFAULT_BASE_YEAR,
            preset,
            scoring: ScoringPolicy::for_preset(preset),
            tolerance: RiskTolerance::for_preset(preset),
            value_threshold: ValueThreshold::Mean,
            top_n: DEFAULT_TOP_N,
        }
    }
}

fn parse_threshold(value: &toml::Value) -> Result<ValueThreshold> {
    match value {
        toml::Value::String(s) => s.parse(),
        toml::Value::Integer(i) => Ok(ValueThreshold::Fixed(*i as f64)),
        toml::Value::Float(f) if f.is_finite() => Ok(ValueThreshold::Fixed(*f)),
        other => Err(PipelineError::Config(format!(
            "value_threshold must be \"mean\" or a number, got {other}"
        ))),
    }
}

impl AnalysisConfig {
    /// Preset first, then explicit scoring and per-hazard ceilings on top.
    pub fn from_layer(layer: ConfigLayer) -> Result<AnalysisConfig> {
        let preset = layer.preset.unwrap_or_default();
        let mut tolerance = RiskTolerance::for_preset(preset);
        for (code, label) in &layer.ceilings {
            let hazard = Hazard::from_code(code)
                .ok_or_else(|| PipelineError::Config(format!("unknown hazard code {code:?}")))?;
            let rating = RiskRating::parse(label).ok_or_else(|| {
                PipelineError::Config(format!("unknown risk rating {label:?} for {code}"))
            })?;
            tolerance = tolerance.with_ceiling(hazard, rating);
        }
        let value_threshold = match &layer.value_threshold {
            Some(v) => parse_threshold(v)?,
            None => ValueThreshold::Mean,
        };
        let top_n = layer.top_n.unwrap_or(DEFAULT_TOP_N);
        if top_n == 0 {
            return Err(PipelineError::Config("top_n must be at least 1".to_string()));
        }
        Ok(AnalysisConfig {
            data_dir: layer.data_dir.unwrap_or_else(|| PathBuf::from(DEFAULT_DATA_DIR)),
            output_dir: layer.output_dir.unwrap_or_else(|| PathBuf::from(DEFAULT_OUTPUT_DIR)),
            base_year: layer.base_year.unwrap_or(DEFAULT_BASE_YEAR),
            preset,
            scoring: layer.scoring.unwrap_or(ScoringPolicy::for_preset(preset)),
            tolerance,
            value_threshold,
            top_n,
        })
    }
}
