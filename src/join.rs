use crate::error::{list_offenders, PipelineError, Result};
use crate::types::{HazardRecord, JoinedRecord, PredictiveRecord};
use std::collections::{HashMap, HashSet};
use tracing::{info, warn};

/// `"state, county countytype"`, lowercased. The county type keeps
/// "St. Louis City" and "St. Louis County" apart.
pub fn hazard_join_key(r: &HazardRecord) -> String {
    let mut key = format!("{}, {}", r.state, r.county);
    if !r.county_type.is_empty() {
        key.push(' ');
        key.push_str(&r.county_type);
    }
    key.to_lowercase()
}

/// `"state, county"`, lowercased; the projection table already carries the
/// county type inside the county name.
pub fn predictive_join_key(r: &PredictiveRecord) -> String {
    format!("{}, {}", r.state, r.county).to_lowercase()
}

fn duplicate_keys(keys: impl Iterator<Item = String>) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut dups = Vec::new();
    for k in keys {
        if !seen.insert(k.clone()) {
            dups.push(k);
        }
    }
    dups
}

/// Attach projection scores to base-year hazard rows. Every hazard row is
/// kept, in input order; projection rows without a hazard match are dropped.
pub fn join_predictive(
    hazards: &[HazardRecord],
    predictive: &[PredictiveRecord],
) -> Result<Vec<JoinedRecord>> {
    let hazard_dups = duplicate_keys(hazards.iter().map(hazard_join_key));
    if !hazard_dups.is_empty() {
        return Err(PipelineError::JoinIntegrity(format!(
            "hazard keys collide: {}",
            list_offenders(&hazard_dups)
        )));
    }
    let predictive_dups = duplicate_keys(predictive.iter().map(predictive_join_key));
    if !predictive_dups.is_empty() {
        return Err(PipelineError::JoinIntegrity(format!(
            "predictive keys collide: {}",
            list_offenders(&predictive_dups)
        )));
    }

    let by_key: HashMap<String, &PredictiveRecord> = predictive
        .iter()
        .map(|p| (predictive_join_key(p), p))
        .collect();

    let joined: Vec<JoinedRecord> = hazards
        .iter()
        .map(|h| JoinedRecord {
            hazard: h.clone(),
            yield_impact: by_key.get(&hazard_join_key(h)).and_then(|p| p.yield_impact),
        })
        .collect();

    let matched = hazards
        .iter()
        .filter(|h| by_key.contains_key(&hazard_join_key(h)))
        .count();
    let unmatched_hazard = hazards.len() - matched;
    let dropped = predictive.len() - matched;
    info!(rows = joined.len(), matched, dropped, "joined projection onto hazard table");
    if unmatched_hazard > 0 {
        warn!("{} hazard counties have no projection row", unmatched_hazard);
    }
    Ok(joined)
}
