// Reading the 2050 projection table and fixing its known data-entry defects.
//
// The defects are specific to the published file, so they live in an
// explicit table rather than in general-purpose cleaning heuristics. New
// defects get a new row in `PREDICTIVE_CORRECTIONS`.
use crate::error::{PipelineError, Result};
use crate::types::{PredictiveRecord, RawDataset};
use crate::util::{is_blank, parse_i32_safe};
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::{debug, info};

pub const STATE_COLUMN: &str = "State";
pub const COUNTY_COLUMN: &str = "County";
pub const YIELD_COLUMN: &str = "Farm crop Yields";

static COUNTY_SUFFIX_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r", \w+").expect("county suffix pattern"));

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Correction {
    /// Remove every `", <word>"` run from county names.
    StripCountySuffix,
    /// A misspelled state name.
    RenameState {
        bad: &'static str,
        good: &'static str,
    },
    /// The named county was filed under the wrong state.
    Reassign {
        county: &'static str,
        state: &'static str,
    },
}

impl Correction {
    pub fn describe(&self) -> String {
        match self {
            Correction::StripCountySuffix => "strip county name suffixes".to_string(),
            Correction::RenameState { bad, good } => format!("state {bad:?} -> {good:?}"),
            Correction::Reassign { county, state } => {
                format!("county {county:?} -> state {state:?}")
            }
        }
    }

    /// Apply to one record, returning whether anything changed.
    fn apply(&self, rec: &mut PredictiveRecord) -> bool {
        match *self {
            Correction::StripCountySuffix => {
                let stripped = COUNTY_SUFFIX_RE.replace_all(&rec.county, "").into_owned();
                if stripped != rec.county {
                    rec.county = stripped;
                    true
                } else {
                    false
                }
            }
            Correction::RenameState { bad, good } => {
                if rec.state == bad {
                    rec.state = good.to_string();
                    true
                } else {
                    false
                }
            }
            Correction::Reassign { county, state } => {
                if rec.county == county && rec.state != state {
                    rec.state = state.to_string();
                    true
                } else {
                    false
                }
            }
        }
    }
}

/// Known defects of the `Expected_2050` table, applied in order. Suffix
/// stripping runs first so later rows can match on bare county names.
pub const PREDICTIVE_CORRECTIONS: [Correction; 3] = [
    Correction::StripCountySuffix,
    Correction::RenameState {
        bad: "Deleware",
        good: "Delaware",
    },
    Correction::Reassign {
        county: "Kalamazoo County",
        state: "Michigan",
    },
];

/// Read state, county and yield-impact score out of the projection table.
pub fn parse_predictive(raw: &RawDataset) -> Result<Vec<PredictiveRecord>> {
    let column = |name: &str| {
        raw.column_index(name).ok_or_else(|| {
            PipelineError::schema(raw.key.to_string(), format!("missing required column {name:?}"))
        })
    };
    let state_idx = column(STATE_COLUMN)?;
    let county_idx = column(COUNTY_COLUMN)?;
    let yield_idx = column(YIELD_COLUMN)?;

    let mut records = Vec::with_capacity(raw.rows.len());
    for (line, row) in raw.rows.iter().enumerate() {
        let state = row.get(state_idx).unwrap_or("").trim().to_string();
        let county = row.get(county_idx).unwrap_or("").trim().to_string();
        let cell = row.get(yield_idx);
        let yield_impact = if is_blank(cell) {
            None
        } else {
            Some(parse_i32_safe(cell).ok_or_else(|| {
                PipelineError::data_quality(
                    raw.key.to_string(),
                    format!(
                        "row {} ({state}, {county}): yield score {:?} is not an integer",
                        line + 1,
                        cell.unwrap_or("")
                    ),
                )
            })?)
        };
        records.push(PredictiveRecord { state, county, yield_impact });
    }
    Ok(records)
}

/// Apply a correction table, producing a new record set.
pub fn apply_corrections(
    records: &[PredictiveRecord],
    table: &[Correction],
) -> Vec<PredictiveRecord> {
    let mut out = records.to_vec();
    for correction in table {
        let changed = out.iter_mut().map(|r| correction.apply(r)).filter(|c| *c).count();
        debug!(correction = %correction.describe(), changed, "applied correction");
    }
    info!("Corrected {} predictive rows", out.len());
    out
}
