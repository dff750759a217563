// Hazard-table normalization: column projection, null fill, identifiers
// and the contiguous-state filter.
//
// Each yearly snapshot carries a different column set (the 2023 revision
// added territories and columns), so every whitelisted measurement column
// is optional and falls back to the fill policy below. Only the identity
// columns are required.
use crate::error::{list_offenders, PipelineError, Result};
use crate::loader::DatasetRegistry;
use crate::types::{DatasetKey, Hazard, HazardMeasure, HazardRecord, RawDataset, RiskRating};
use crate::util::{is_blank, parse_f64_safe};
use csv::StringRecord;
use once_cell::sync::Lazy;
use std::collections::{BTreeMap, HashSet};
use tracing::{debug, info};

/// Identity and measurement columns kept from every hazard table; the
/// per-hazard triples follow in `Hazard::ALL` order.
pub const BASE_COLUMNS: [&str; 9] = [
    "NRI_ID",
    "STATE",
    "STATEABBRV",
    "COUNTY",
    "COUNTYTYPE",
    "AGRIVALUE",
    "AREA",
    "RISK_SCORE",
    "RISK_RATNG",
];

const REQUIRED_COLUMNS: [&str; 3] = ["NRI_ID", "STATE", "COUNTY"];

/// Full hazard-table whitelist.
pub static HAZARD_COLUMNS: Lazy<Vec<String>> = Lazy::new(|| {
    let mut cols: Vec<String> = BASE_COLUMNS.iter().map(|c| c.to_string()).collect();
    for h in Hazard::ALL {
        cols.push(h.frequency_column());
        cols.push(h.score_column());
        cols.push(h.rating_column());
    }
    cols
});

/// The 48 contiguous states. Alaska, Hawaii, DC and the territories are
/// deliberately absent.
pub const CONTIGUOUS_STATES: [&str; 48] = [
    "Alabama",
    "Arizona",
    "Arkansas",
    "California",
    "Colorado",
    "Connecticut",
    "Delaware",
    "Florida",
    "Georgia",
    "Idaho",
    "Illinois",
    "Indiana",
    "Iowa",
    "Kansas",
    "Kentucky",
    "Louisiana",
    "Maine",
    "Maryland",
    "Massachusetts",
    "Michigan",
    "Minnesota",
    "Mississippi",
    "Missouri",
    "Montana",
    "Nebraska",
    "Nevada",
    "New Hampshire",
    "New Jersey",
    "New Mexico",
    "New York",
    "North Carolina",
    "North Dakota",
    "Ohio",
    "Oklahoma",
    "Oregon",
    "Pennsylvania",
    "Rhode Island",
    "South Carolina",
    "South Dakota",
    "Tennessee",
    "Texas",
    "Utah",
    "Vermont",
    "Virginia",
    "Washington",
    "West Virginia",
    "Wisconsin",
    "Wyoming",
];

static CONTIGUOUS_SET: Lazy<HashSet<&'static str>> =
    Lazy::new(|| CONTIGUOUS_STATES.iter().copied().collect());

/// Normalized hazard records per snapshot year.
pub type HazardCorpus = BTreeMap<u16, Vec<HazardRecord>>;

/// `region-id + "_" + year`, year zero-padded to two digits.
pub fn build_identifier(region_id: &str, year: u16) -> String {
    format!("{}_{:02}", region_id.trim(), year)
}

pub fn is_contiguous_state(state: &str) -> bool {
    CONTIGUOUS_SET.contains(state)
}

/// Column positions of the whitelist in one source file.
struct Projection<'a> {
    raw: &'a RawDataset,
    index: BTreeMap<&'static str, usize>,
}

impl<'a> Projection<'a> {
    fn new(raw: &'a RawDataset) -> Self {
        let mut index = BTreeMap::new();
        for col in HAZARD_COLUMNS.iter() {
            if let Some(i) = raw.column_index(col) {
                index.insert(col.as_str(), i);
            }
        }
        Projection { raw, index }
    }

    fn missing_required(&self) -> Vec<&'static str> {
        REQUIRED_COLUMNS
            .iter()
            .copied()
            .filter(|c| !self.index.contains_key(c))
            .collect()
    }

    fn cell<'r>(&self, row: &'r StringRecord, col: &str) -> Option<&'r str> {
        self.index.get(col).and_then(|&i| row.get(i))
    }

    fn text(&self, row: &StringRecord, col: &str) -> String {
        self.cell(row, col).unwrap_or("").trim().to_string()
    }

    /// Blank or absent cells fill to 0. Anything present must be a
    /// non-negative number.
    fn number(&self, row: &StringRecord, col: &str, identifier: &str) -> Result<f64> {
        let cell = self.cell(row, col);
        if is_blank(cell) {
            return Ok(0.0);
        }
        match parse_f64_safe(cell) {
            Some(v) if v >= 0.0 => Ok(v),
            Some(v) => Err(PipelineError::data_quality(
                self.raw.key.to_string(),
                format!("{identifier}: negative value {v} in {col}"),
            )),
            None => Err(PipelineError::data_quality(
                self.raw.key.to_string(),
                format!("{identifier}: non-numeric value {:?} in {col}", cell.unwrap_or("")),
            )),
        }
    }

    fn rating(&self, row: &StringRecord, col: &str) -> Option<RiskRating> {
        self.cell(row, col).and_then(RiskRating::parse)
    }
}

/// Project one hazard snapshot onto the whitelist and fill missing
/// measurements.
pub fn normalize_hazard_table(raw: &RawDataset) -> Result<Vec<HazardRecord>> {
    let year = match raw.key {
        DatasetKey::HazardYear(y) => y,
        _ => {
            return Err(PipelineError::schema(
                raw.key.to_string(),
                "not a hazard table",
            ))
        }
    };
    let proj = Projection::new(raw);
    let missing = proj.missing_required();
    if !missing.is_empty() {
        return Err(PipelineError::schema(
            raw.key.to_string(),
            format!("missing required column(s) {}", missing.join(", ")),
        ));
    }
    let absent = HAZARD_COLUMNS.len() - proj.index.len();
    if absent > 0 {
        debug!(dataset = %raw.key, absent, "whitelisted columns absent, filling defaults");
    }

    let mut records = Vec::with_capacity(raw.rows.len());
    for row in &raw.rows {
        let nri_id = proj.text(row, "NRI_ID");
        let identifier = build_identifier(&nri_id, year);
        let mut hazards = [HazardMeasure::default(); 10];
        for h in Hazard::ALL {
            hazards[h.index()] = HazardMeasure {
                annual_frequency: proj.number(row, &h.frequency_column(), &identifier)?,
                risk_score: proj.number(row, &h.score_column(), &identifier)?,
                risk_rating: proj.rating(row, &h.rating_column()),
            };
        }
        records.push(HazardRecord {
            nri_id,
            state: proj.text(row, "STATE"),
            state_abbrev: proj.text(row, "STATEABBRV"),
            county: proj.text(row, "COUNTY"),
            county_type: proj.text(row, "COUNTYTYPE"),
            agri_value: proj.number(row, "AGRIVALUE", &identifier)?,
            area: proj.number(row, "AREA", &identifier)?,
            risk_score: proj.number(row, "RISK_SCORE", &identifier)?,
            risk_rating: proj.rating(row, "RISK_RATNG"),
            hazards,
            year,
            identifier,
        });
    }
    Ok(records)
}

/// Keep only rows whose state is one of the 48 contiguous states.
pub fn filter_contiguous(records: Vec<HazardRecord>) -> Vec<HazardRecord> {
    records
        .into_iter()
        .filter(|r| is_contiguous_state(&r.state))
        .collect()
}

/// Composite identifiers must be unique across every loaded year.
pub fn check_unique_identifiers(corpus: &HazardCorpus) -> Result<()> {
    let mut seen: HashSet<&str> = HashSet::new();
    let mut duplicates: Vec<String> = Vec::new();
    for records in corpus.values() {
        for r in records {
            if !seen.insert(r.identifier.as_str()) {
                duplicates.push(r.identifier.clone());
            }
        }
    }
    if duplicates.is_empty() {
        Ok(())
    } else {
        Err(PipelineError::data_quality(
            "hazard corpus",
            format!("duplicate identifiers {}", list_offenders(&duplicates)),
        ))
    }
}

/// Blank or absent whitelisted cells in a hazard table, i.e. the cells the
/// fill policy supplies a value for.
pub fn count_filled_cells(raw: &RawDataset) -> usize {
    let proj = Projection::new(raw);
    raw.rows
        .iter()
        .map(|row| {
            HAZARD_COLUMNS
                .iter()
                .filter(|col| is_blank(proj.cell(row, col)))
                .count()
        })
        .sum()
}

/// Normalize every hazard snapshot in the registry, verify identifier
/// uniqueness over every loaded row, then restrict to the contiguous states.
pub fn normalize_hazard_corpus(registry: &DatasetRegistry) -> Result<HazardCorpus> {
    let mut loaded = HazardCorpus::new();
    for (year, raw) in registry.hazard_tables() {
        let records = normalize_hazard_table(raw)?;
        info!(
            dataset = %raw.key,
            rows = records.len(),
            filled = count_filled_cells(raw),
            "normalized hazard table"
        );
        loaded.insert(year, records);
    }
    if loaded.is_empty() {
        return Err(PipelineError::schema(
            "hazard corpus",
            "no hazard tables (NRI_<year>) found",
        ));
    }
    check_unique_identifiers(&loaded)?;

    let corpus = loaded
        .into_iter()
        .map(|(year, records)| {
            let total = records.len();
            let kept = filter_contiguous(records);
            debug!(year, rows = total, kept = kept.len(), "region filter");
            (year, kept)
        })
        .collect();
    Ok(corpus)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::raw_table;
    use pretty_assertions::assert_eq;

    fn registry_of(tables: Vec<RawDataset>) -> DatasetRegistry {
        let mut registry = DatasetRegistry::default();
        for t in tables {
            registry.insert(t).unwrap();
        }
        registry
    }

    #[test]
    fn whitelist_has_every_hazard_triple() {
        assert_eq!(HAZARD_COLUMNS.len(), 9 + 30);
        assert!(HAZARD_COLUMNS.contains(&"WNTW_RISKR".to_string()));
        assert!(HAZARD_COLUMNS.contains(&"CFLD_AFREQ".to_string()));
    }

    #[test]
    fn allow_list_has_48_states() {
        let set: HashSet<&str> = CONTIGUOUS_STATES.iter().copied().collect();
        assert_eq!(set.len(), 48);
        assert!(!is_contiguous_state("Alaska"));
        assert!(!is_contiguous_state("Hawaii"));
        assert!(!is_contiguous_state("District of Columbia"));
        assert!(!is_contiguous_state("iowa"));
        assert!(is_contiguous_state("Iowa"));
    }

    #[test]
    fn identifiers_are_zero_padded() {
        assert_eq!(build_identifier("C19153", 2020), "C19153_2020");
        assert_eq!(build_identifier("C19153", 7), "C19153_07");
    }

    #[test]
    fn missing_hazard_columns_fill_with_zero() {
        let raw = raw_table(
            DatasetKey::HazardYear(2020),
            "NRI_ID,STATE,COUNTY,COUNTYTYPE,AREA,AGRIVALUE,DRGT_AFREQ,DRGT_RISKR,EXTRA",
            &["C1,Iowa,Polk,County,600,1000,,Very Low,x"],
        );
        let records = normalize_hazard_table(&raw).unwrap();
        assert_eq!(records.len(), 1);
        let r = &records[0];
        assert_eq!(r.identifier, "C1_2020");
        assert_eq!(r.year, 2020);
        assert_eq!(r.area, 600.0);
        assert_eq!(r.measure(Hazard::Drought).annual_frequency, 0.0);
        assert_eq!(r.rating(Hazard::Drought), Some(RiskRating::VeryLow));
        assert_eq!(r.rating(Hazard::Tornado), None);
        assert_eq!(r.measure(Hazard::Tornado).risk_score, 0.0);
        assert_eq!(r.state_abbrev, "");
    }

    #[test]
    fn every_numeric_field_is_non_negative() {
        let raw = raw_table(
            DatasetKey::HazardYear(2021),
            "NRI_ID,STATE,COUNTY,AREA,HWAV_AFREQ,HWAV_RISKS,HWAV_RISKR",
            &[
                "C1,Iowa,Polk,10,0.5,12.5,Relatively Low",
                "C2,Iowa,Story,20,,,",
                "C3,Ohio,Knox,30,1.2e-03,0,Insufficient Data",
            ],
        );
        let records = normalize_hazard_table(&raw).unwrap();
        for r in &records {
            assert!(r.agri_value >= 0.0 && r.area >= 0.0 && r.risk_score >= 0.0);
            for m in &r.hazards {
                assert!(m.annual_frequency >= 0.0);
                assert!(m.risk_score >= 0.0);
            }
        }
        assert_eq!(records[2].rating(Hazard::HeatWave), None);
    }

    #[test]
    fn negative_measurement_is_a_data_quality_error() {
        let raw = raw_table(
            DatasetKey::HazardYear(2020),
            "NRI_ID,STATE,COUNTY,CWAV_AFREQ",
            &["C9,Iowa,Polk,-1"],
        );
        let err = normalize_hazard_table(&raw).unwrap_err();
        match err {
            PipelineError::DataQuality { key, message } => {
                assert_eq!(key, "NRI_2020");
                assert!(message.contains("C9_2020"));
                assert!(message.contains("CWAV_AFREQ"));
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn missing_identity_column_is_a_schema_error() {
        let raw = raw_table(DatasetKey::HazardYear(2020), "NRI_ID,COUNTY", &["C1,Polk"]);
        let err = normalize_hazard_table(&raw).unwrap_err();
        assert!(matches!(
            err,
            PipelineError::Schema { ref message, .. } if message.contains("STATE")
        ));
    }

    #[test]
    fn region_filter_is_a_subset_of_the_allow_list() {
        let raw = raw_table(
            DatasetKey::HazardYear(2020),
            "NRI_ID,STATE,COUNTY",
            &["C1,Iowa,Polk", "C2,Alaska,Nome", "C3,Puerto Rico,Ponce", "C4,Texas,Travis"],
        );
        let kept = filter_contiguous(normalize_hazard_table(&raw).unwrap());
        let states: Vec<&str> = kept.iter().map(|r| r.state.as_str()).collect();
        assert_eq!(states, vec!["Iowa", "Texas"]);
        assert!(kept.iter().all(|r| is_contiguous_state(&r.state)));
    }

    #[test]
    fn duplicate_identifiers_are_flagged() {
        let raw = raw_table(
            DatasetKey::HazardYear(2020),
            "NRI_ID,STATE,COUNTY",
            &["C1,Iowa,Polk", "C1,Iowa,Polk"],
        );
        let mut corpus = HazardCorpus::new();
        corpus.insert(2020, normalize_hazard_table(&raw).unwrap());
        let err = check_unique_identifiers(&corpus).unwrap_err();
        assert!(matches!(
            err,
            PipelineError::DataQuality { ref message, .. } if message.contains("C1_2020")
        ));
    }

    #[test]
    fn same_region_in_different_years_is_unique() {
        let mut corpus = HazardCorpus::new();
        for year in [2020u16, 2021] {
            let raw =
                raw_table(DatasetKey::HazardYear(year), "NRI_ID,STATE,COUNTY", &["C1,Iowa,Polk"]);
            corpus.insert(year, normalize_hazard_table(&raw).unwrap());
        }
        assert!(check_unique_identifiers(&corpus).is_ok());
    }

    #[test]
    fn duplicates_outside_the_allow_list_are_still_flagged() {
        let registry = registry_of(vec![raw_table(
            DatasetKey::HazardYear(2020),
            "NRI_ID,STATE,COUNTY",
            &["C1,Iowa,Polk", "A1,Alaska,Nome", "A1,Alaska,Nome"],
        )]);
        let err = normalize_hazard_corpus(&registry).unwrap_err();
        assert!(matches!(
            err,
            PipelineError::DataQuality { ref message, .. } if message.contains("A1_2020")
        ));
    }

    #[test]
    fn corpus_keeps_only_contiguous_rows() {
        let registry = registry_of(vec![
            raw_table(
                DatasetKey::HazardYear(2020),
                "NRI_ID,STATE,COUNTY",
                &["C1,Iowa,Polk", "A1,Alaska,Nome"],
            ),
            raw_table(DatasetKey::HazardYear(2021), "NRI_ID,STATE,COUNTY", &["C1,Iowa,Polk"]),
        ]);
        let corpus = normalize_hazard_corpus(&registry).unwrap();
        assert_eq!(corpus[&2020].len(), 1);
        assert_eq!(corpus[&2021][0].identifier, "C1_2021");
    }

    #[test]
    fn counts_blank_and_absent_cells() {
        let raw = raw_table(
            DatasetKey::HazardYear(2020),
            "NRI_ID,STATE,COUNTY,AREA,DRGT_RISKR",
            &["C1,Iowa,Polk,10,Very Low", "C2,Iowa,Story,,"],
        );
        let absent_per_row = HAZARD_COLUMNS.len() - 5;
        assert_eq!(count_filled_cells(&raw), 2 * absent_per_row + 2);
    }
}
