// Fixture builders shared by the unit tests.
use crate::types::{
    DatasetKey, HazardMeasure, HazardRecord, RawDataset, RiskRating, ValuedCounty,
};

/// Build a raw dataset from a header line and data lines.
pub fn raw_table(key: DatasetKey, header: &str, lines: &[&str]) -> RawDataset {
    let mut csv = String::from(header);
    csv.push('\n');
    for l in lines {
        csv.push_str(l);
        csv.push('\n');
    }
    let mut rdr = csv::ReaderBuilder::new()
        .flexible(true)
        .from_reader(csv.as_bytes());
    let headers = rdr.headers().unwrap().iter().map(|s| s.to_string()).collect();
    let rows = rdr.records().map(|r| r.unwrap()).collect();
    RawDataset { key, headers, rows }
}

pub fn county(id: &str, state: &str, county: &str, county_type: &str) -> HazardRecord {
    HazardRecord {
        identifier: format!("{id}_2020"),
        nri_id: id.to_string(),
        state: state.to_string(),
        state_abbrev: String::new(),
        county: county.to_string(),
        county_type: county_type.to_string(),
        agri_value: 0.0,
        area: 1.0,
        risk_score: 0.0,
        risk_rating: None,
        hazards: [HazardMeasure::default(); 10],
        year: 2020,
    }
}

/// A county with every hazard rated `rating` and the given area and
/// expected value.
pub fn valued(
    id: &str,
    state: &str,
    area: f64,
    expected_value: f64,
    rating: RiskRating,
) -> ValuedCounty {
    let mut hazard = county(id, state, id, "County");
    hazard.area = area;
    hazard.agri_value = expected_value * area;
    for m in hazard.hazards.iter_mut() {
        m.risk_rating = Some(rating);
    }
    ValuedCounty {
        hazard,
        yield_impact: 0,
        value_per_sq_mile: expected_value,
        yield_decline_probability: 0.0,
        expected_value,
    }
}
