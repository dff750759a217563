use csv::StringRecord;
use serde::Serialize;
use std::fmt;
use tabled::Tabled;

/// The ten hazards whose ratings drive the county filter, in the column
/// order of the hazard tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum Hazard {
    CoastalFlood,
    ColdWave,
    Drought,
    HeatWave,
    Hurricane,
    IceStorm,
    RiverineFlood,
    Tornado,
    Wildfire,
    WinterWeather,
}

impl Hazard {
    pub const ALL: [Hazard; 10] = [
        Hazard::CoastalFlood,
        Hazard::ColdWave,
        Hazard::Drought,
        Hazard::HeatWave,
        Hazard::Hurricane,
        Hazard::IceStorm,
        Hazard::RiverineFlood,
        Hazard::Tornado,
        Hazard::Wildfire,
        Hazard::WinterWeather,
    ];

    /// Column prefix used by the hazard tables (`CFLD_AFREQ`, `CFLD_RISKS`, ...).
    pub fn code(self) -> &'static str {
        match self {
            Hazard::CoastalFlood => "CFLD",
            Hazard::ColdWave => "CWAV",
            Hazard::Drought => "DRGT",
            Hazard::HeatWave => "HWAV",
            Hazard::Hurricane => "HRCN",
            Hazard::IceStorm => "ISTM",
            Hazard::RiverineFlood => "RFLD",
            Hazard::Tornado => "TRND",
            Hazard::Wildfire => "WFIR",
            Hazard::WinterWeather => "WNTW",
        }
    }

    pub fn from_code(code: &str) -> Option<Hazard> {
        let code = code.trim().to_ascii_uppercase();
        Hazard::ALL.into_iter().find(|h| h.code() == code)
    }

    pub fn name(self) -> &'static str {
        match self {
            Hazard::CoastalFlood => "Coastal flood",
            Hazard::ColdWave => "Cold wave",
            Hazard::Drought => "Drought",
            Hazard::HeatWave => "Heat wave",
            Hazard::Hurricane => "Hurricane",
            Hazard::IceStorm => "Ice storm",
            Hazard::RiverineFlood => "Riverine flood",
            Hazard::Tornado => "Tornado",
            Hazard::Wildfire => "Wildfire",
            Hazard::WinterWeather => "Winter weather",
        }
    }

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn frequency_column(self) -> String {
        format!("{}_AFREQ", self.code())
    }

    pub fn score_column(self) -> String {
        format!("{}_RISKS", self.code())
    }

    pub fn rating_column(self) -> String {
        format!("{}_RISKR", self.code())
    }
}

/// Six-level ordinal risk rating. Declaration order is the risk order, so
/// `Ord` compares severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum RiskRating {
    NoRating,
    VeryLow,
    RelativelyLow,
    RelativelyModerate,
    RelativelyHigh,
    VeryHigh,
}

impl RiskRating {
    pub const ALL: [RiskRating; 6] = [
        RiskRating::NoRating,
        RiskRating::VeryLow,
        RiskRating::RelativelyLow,
        RiskRating::RelativelyModerate,
        RiskRating::RelativelyHigh,
        RiskRating::VeryHigh,
    ];

    pub fn label(self) -> &'static str {
        match self {
            RiskRating::NoRating => "No Rating",
            RiskRating::VeryLow => "Very Low",
            RiskRating::RelativelyLow => "Relatively Low",
            RiskRating::RelativelyModerate => "Relatively Moderate",
            RiskRating::RelativelyHigh => "Relatively High",
            RiskRating::VeryHigh => "Very High",
        }
    }

    /// Exact match against the six labels. Anything else ("Insufficient
    /// Data", "Not Applicable", blanks) is not a rating.
    pub fn parse(s: &str) -> Option<RiskRating> {
        let s = s.trim();
        RiskRating::ALL.into_iter().find(|r| r.label() == s)
    }
}

impl fmt::Display for RiskRating {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Which family a loaded file belongs to, derived from its file name.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum DatasetKey {
    HazardYear(u16),
    Predictive(u16),
    Other(String),
}

impl fmt::Display for DatasetKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DatasetKey::HazardYear(y) => write!(f, "NRI_{y}"),
            DatasetKey::Predictive(y) => write!(f, "Expected_{y}"),
            DatasetKey::Other(name) => f.write_str(name),
        }
    }
}

/// One file loaded verbatim. Cells stay as text until a normalizer reads them.
#[derive(Debug, Clone)]
pub struct RawDataset {
    pub key: DatasetKey,
    pub headers: Vec<String>,
    pub rows: Vec<StringRecord>,
}

impl RawDataset {
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == name)
    }

    pub fn shape(&self) -> (usize, usize) {
        (self.rows.len(), self.headers.len())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct HazardMeasure {
    pub annual_frequency: f64,
    pub risk_score: f64,
    pub risk_rating: Option<RiskRating>,
}

/// One county row of a normalized hazard table.
#[derive(Debug, Clone, PartialEq)]
pub struct HazardRecord {
    pub identifier: String,
    pub nri_id: String,
    pub state: String,
    pub state_abbrev: String,
    pub county: String,
    pub county_type: String,
    pub agri_value: f64,
    pub area: f64,
    pub risk_score: f64,
    pub risk_rating: Option<RiskRating>,
    pub hazards: [HazardMeasure; 10],
    pub year: u16,
}

impl HazardRecord {
    pub fn measure(&self, hazard: Hazard) -> &HazardMeasure {
        &self.hazards[hazard.index()]
    }

    pub fn rating(&self, hazard: Hazard) -> Option<RiskRating> {
        self.measure(hazard).risk_rating
    }

    /// Hazard with the highest risk score; `None` when every score is zero.
    /// Ties go to the earlier hazard in column order.
    pub fn dominant_hazard(&self) -> Option<(Hazard, &HazardMeasure)> {
        let mut best: Option<(Hazard, &HazardMeasure)> = None;
        for h in Hazard::ALL {
            let m = self.measure(h);
            if m.risk_score > best.map_or(0.0, |(_, b)| b.risk_score) {
                best = Some((h, m));
            }
        }
        best
    }
}

/// One row of the 2050 projection table after corrections.
#[derive(Debug, Clone, PartialEq)]
pub struct PredictiveRecord {
    pub state: String,
    pub county: String,
    pub yield_impact: Option<i32>,
}

/// A hazard county with whatever projection matched it.
#[derive(Debug, Clone, PartialEq)]
pub struct JoinedRecord {
    pub hazard: HazardRecord,
    pub yield_impact: Option<i32>,
}

/// A joined county with its derived per-area values.
#[derive(Debug, Clone, PartialEq)]
pub struct ValuedCounty {
    pub hazard: HazardRecord,
    pub yield_impact: i32,
    pub value_per_sq_mile: f64,
    pub yield_decline_probability: f64,
    pub expected_value: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StateAggregate {
    pub state: String,
    pub total_area: f64,
    pub filtered_area: f64,
    pub surviving_counties: usize,
    /// Missing when no county of the state survived the filter.
    pub mean_expected_value: Option<f64>,
    pub coverage_ratio: f64,
    pub weighted_score: Option<f64>,
}

#[derive(Debug, Serialize, Tabled, Clone)]
pub struct StateRankingRow {
    #[serde(rename = "Rank")]
    #[tabled(rename = "Rank")]
    pub rank: usize,
    #[serde(rename = "State")]
    #[tabled(rename = "State")]
    pub state: String,
    #[serde(rename = "TotalArea")]
    #[tabled(rename = "TotalArea")]
    pub total_area: String,
    #[serde(rename = "FilteredArea")]
    #[tabled(rename = "FilteredArea")]
    pub filtered_area: String,
    #[serde(rename = "Counties")]
    #[tabled(rename = "Counties")]
    pub surviving_counties: usize,
    #[serde(rename = "CoverageRatio")]
    #[tabled(rename = "CoverageRatio")]
    pub coverage_ratio: String,
    #[serde(rename = "MeanExpectedValue")]
    #[tabled(rename = "MeanExpectedValue")]
    pub mean_expected_value: String,
    #[serde(rename = "WeightedScore")]
    #[tabled(rename = "WeightedScore")]
    pub weighted_score: String,
}

/// Per-county export: every joined county with its derived values and
/// whether it survived the filter.
#[derive(Debug, Serialize, Clone)]
pub struct CountyValueRow {
    #[serde(rename = "Identifier")]
    pub identifier: String,
    #[serde(rename = "NriId")]
    pub nri_id: String,
    #[serde(rename = "State")]
    pub state: String,
    #[serde(rename = "StateAbbrev")]
    pub state_abbrev: String,
    #[serde(rename = "County")]
    pub county: String,
    #[serde(rename = "CountyType")]
    pub county_type: String,
    #[serde(rename = "Area")]
    pub area: f64,
    #[serde(rename = "AgriValue")]
    pub agri_value: f64,
    #[serde(rename = "RiskScore")]
    pub risk_score: f64,
    #[serde(rename = "RiskRating")]
    pub risk_rating: String,
    #[serde(rename = "DominantHazard")]
    pub dominant_hazard: String,
    #[serde(rename = "DominantHazardScore")]
    pub dominant_hazard_score: f64,
    #[serde(rename = "DominantHazardFrequency")]
    pub dominant_hazard_frequency: f64,
    #[serde(rename = "YieldImpact")]
    pub yield_impact: i32,
    #[serde(rename = "ValuePerSqMile")]
    pub value_per_sq_mile: f64,
    #[serde(rename = "YieldDeclineProbability")]
    pub yield_decline_probability: f64,
    #[serde(rename = "ExpectedValue")]
    pub expected_value: f64,
    #[serde(rename = "Survives")]
    pub survives: bool,
}

#[derive(Debug, Serialize, Tabled, Clone)]
pub struct DatasetDiagnosticRow {
    #[tabled(rename = "Dataset")]
    pub dataset: String,
    #[tabled(rename = "Rows")]
    pub rows: usize,
    #[tabled(rename = "Columns")]
    pub columns: usize,
    #[tabled(rename = "RowsKept")]
    pub rows_kept: String,
    #[tabled(rename = "CellsFilled")]
    pub cells_filled: String,
}

/// Distribution of one column: count, mean, sample standard deviation,
/// extremes and linearly interpolated quartiles.
#[derive(Debug, Serialize, Clone, Copy, PartialEq)]
pub struct ValueStats {
    pub count: usize,
    pub mean: f64,
    /// Missing for fewer than two values.
    pub std: Option<f64>,
    pub min: f64,
    pub p25: f64,
    pub p50: f64,
    pub p75: f64,
    pub max: f64,
}

#[derive(Debug, Serialize, Clone, PartialEq)]
pub struct SummaryStats {
    pub preset: String,
    pub scoring: String,
    pub base_year: u16,
    pub joined_counties: usize,
    pub hazard_survivors: usize,
    pub value_survivors: usize,
    pub value_threshold: f64,
    pub threshold_rule: String,
    /// Expected value over the joined counties; missing when none joined.
    pub expected_value_stats: Option<ValueStats>,
    pub total_area: f64,
    pub filtered_area: f64,
    pub top_states: Vec<String>,
}
