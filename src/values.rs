use crate::error::{list_offenders, PipelineError, Result};
use crate::types::{DatasetKey, JoinedRecord, ValuedCounty};
use tracing::info;

/// Each point of projected yield impact is read as a 10% decline.
pub const YIELD_IMPACT_SCALE: f64 = 10.0;

/// Derive value per square mile, yield-decline probability and expected
/// 2050 value for every joined county.
///
/// Rows with a non-positive area or no projection score would otherwise turn
/// into NaN/inf and silently poison the state means, so they are collected
/// and reported together.
pub fn compute_values(joined: &[JoinedRecord]) -> Result<Vec<ValuedCounty>> {
    let mut bad_area = Vec::new();
    let mut no_score = Vec::new();
    let mut out = Vec::with_capacity(joined.len());

    for j in joined {
        let h = &j.hazard;
        if !(h.area.is_finite() && h.area > 0.0) {
            bad_area.push(h.identifier.clone());
            continue;
        }
        let Some(yield_impact) = j.yield_impact else {
            no_score.push(h.identifier.clone());
            continue;
        };
        let value_per_sq_mile = h.agri_value / h.area;
        let yield_decline_probability = yield_impact as f64 / YIELD_IMPACT_SCALE;
        let expected_value = value_per_sq_mile * (1.0 - yield_decline_probability);
        out.push(ValuedCounty {
            hazard: h.clone(),
            yield_impact,
            value_per_sq_mile,
            yield_decline_probability,
            expected_value,
        });
    }

    if !bad_area.is_empty() || !no_score.is_empty() {
        let key = joined
            .first()
            .map(|j| DatasetKey::HazardYear(j.hazard.year).to_string())
            .unwrap_or_default();
        let mut problems = Vec::new();
        if !bad_area.is_empty() {
            problems.push(format!("zero or missing AREA for {}", list_offenders(&bad_area)));
        }
        if !no_score.is_empty() {
            problems.push(format!("no yield projection for {}", list_offenders(&no_score)));
        }
        return Err(PipelineError::data_quality(key, problems.join("; ")));
    }

    info!("Computed expected values for {} counties", out.len());
    Ok(out)
}
