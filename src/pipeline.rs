// End-to-end run: every stage takes an immutable input and returns a new
// collection, so each one can be tested on its own.
use crate::config::AnalysisConfig;
use crate::corrections::{apply_corrections, parse_predictive, PREDICTIVE_CORRECTIONS};
use crate::error::{PipelineError, Result};
use crate::filter::{filter_counties, FilterOutcome};
use crate::join::join_predictive;
use crate::loader::{load_directory, DatasetRegistry};
use crate::normalize::{count_filled_cells, normalize_hazard_corpus, HazardCorpus};
use crate::output;
use crate::reports::{aggregate_states, county_rows, generate_summary, rank_states, ranking_rows};
use crate::types::{
    DatasetDiagnosticRow, DatasetKey, Hazard, StateAggregate, StateRankingRow, SummaryStats,
    ValuedCounty,
};
use crate::values::compute_values;
use crate::util::format_int;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

pub const RANKING_FILE: &str = "state_ranking.csv";
pub const SUMMARY_FILE: &str = "summary.json";
pub const COUNTY_FILE: &str = "county_values.csv";

#[derive(Debug, Clone)]
pub struct AnalysisResult {
    pub counties: Vec<ValuedCounty>,
    pub outcome: FilterOutcome,
    pub ranked: Vec<StateAggregate>,
    pub rows: Vec<StateRankingRow>,
    pub summary: SummaryStats,
}

/// Run every stage after loading.
pub fn run_analysis(registry: &DatasetRegistry, cfg: &AnalysisConfig) -> Result<AnalysisResult> {
    let corpus = normalize_hazard_corpus(registry)?;
    let base_key = DatasetKey::HazardYear(cfg.base_year).to_string();
    let base = corpus.get(&cfg.base_year).ok_or_else(|| {
        PipelineError::schema(base_key.clone(), "no hazard table for the base year")
    })?;
    let raw_predictive = registry
        .predictive()
        .ok_or_else(|| PipelineError::schema("Expected_<year>", "no projection table found"))?;

    for h in Hazard::ALL {
        debug!(hazard = h.name(), ceiling = %cfg.tolerance.ceiling(h), "risk tolerance");
    }

    let predictive = apply_corrections(&parse_predictive(raw_predictive)?, &PREDICTIVE_CORRECTIONS);
    let joined = join_predictive(base, &predictive)?;
    let counties = compute_values(&joined)?;
    let outcome = filter_counties(&counties, &cfg.tolerance, cfg.value_threshold);
    let ranked = rank_states(aggregate_states(&counties, &outcome.survivors, cfg.scoring));
    let rows = ranking_rows(&ranked);
    let summary = generate_summary(
        cfg.preset,
        cfg.scoring,
        cfg.base_year,
        &counties,
        &outcome,
        &ranked,
        cfg.top_n,
    );
    info!(
        states = ranked.len(),
        top = ?summary.top_states,
        "ranked states"
    );
    Ok(AnalysisResult { counties, outcome, ranked, rows, summary })
}

pub fn run(cfg: &AnalysisConfig) -> Result<AnalysisResult> {
    let registry = load_directory(&cfg.data_dir)?;
    run_analysis(&registry, cfg)
}

/// Per-file shape report: rows and columns as loaded, and for hazard tables
/// the rows kept after the region filter and the cells the fill policy
/// supplied.
pub fn dataset_diagnostics(
    registry: &DatasetRegistry,
    corpus: &HazardCorpus,
) -> Vec<DatasetDiagnosticRow> {
    registry
        .datasets
        .values()
        .map(|raw| {
            let (rows, columns) = raw.shape();
            let (rows_kept, cells_filled) = match raw.key {
                DatasetKey::HazardYear(y) => (
                    corpus.get(&y).map(|r| format_int(r.len())).unwrap_or_default(),
                    format_int(count_filled_cells(raw)),
                ),
                _ => (String::new(), String::new()),
            };
            DatasetDiagnosticRow {
                dataset: raw.key.to_string(),
                rows,
                columns,
                rows_kept,
                cells_filled,
            }
        })
        .collect()
}

/// Load and normalize only, for the `load` command.
pub fn inspect(data_dir: &Path) -> Result<Vec<DatasetDiagnosticRow>> {
    let registry = load_directory(data_dir)?;
    let corpus = normalize_hazard_corpus(&registry)?;
    Ok(dataset_diagnostics(&registry, &corpus))
}

#[derive(Debug, Clone)]
pub struct OutputPaths {
    pub ranking: PathBuf,
    pub summary: PathBuf,
    pub counties: PathBuf,
}

/// Write the state ranking, the per-county values and the summary.
pub fn write_outputs(result: &AnalysisResult, output_dir: &Path) -> Result<OutputPaths> {
    std::fs::create_dir_all(output_dir)?;
    let paths = OutputPaths {
        ranking: output_dir.join(RANKING_FILE),
        summary: output_dir.join(SUMMARY_FILE),
        counties: output_dir.join(COUNTY_FILE),
    };
    output::write_csv(&paths.ranking, &result.rows)?;
    output::write_csv(&paths.counties, &county_rows(&result.counties, &result.outcome.survivors))?;
    output::write_json(&paths.summary, &result.summary)?;
    info!("Wrote outputs to {}", output_dir.display());
    Ok(paths)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::ValueThreshold;
    use crate::reports::ScoringPolicy;
    use pretty_assertions::assert_eq;
    use std::fs;

    /// Hazard CSV with every rating column; `overrides` sets single
    /// hazards, everything else is "Very Low".
    fn hazard_csv(rows: &[(&str, &str, &str, f64, f64, &[(Hazard, &str)])]) -> String {
        let mut header = vec![
            "NRI_ID".to_string(),
            "STATE".to_string(),
            "COUNTY".to_string(),
            "COUNTYTYPE".to_string(),
            "AGRIVALUE".to_string(),
            "AREA".to_string(),
        ];
        header.extend(Hazard::ALL.iter().map(|h| h.rating_column()));
        let mut out = header.join(",");
        out.push('\n');
        for (id, state, county, agri, area, overrides) in rows {
            let mut cells = vec![
                id.to_string(),
                state.to_string(),
                county.to_string(),
                "County".to_string(),
                agri.to_string(),
                area.to_string(),
            ];
            for h in Hazard::ALL {
                let rating = overrides
                    .iter()
                    .find(|(oh, _)| *oh == h)
                    .map(|(_, r)| *r)
                    .unwrap_or("Very Low");
                cells.push(rating.to_string());
            }
            out.push_str(&cells.join(","));
            out.push('\n');
        }
        out
    }

    const CALM: &[(Hazard, &str)] = &[];
    const TORNADO: &[(Hazard, &str)] = &[(Hazard::Tornado, "Very High")];

    fn write_fixture(dir: &Path) {
        fs::write(
            dir.join("NRI_Table_Counties_2020.csv"),
            hazard_csv(&[
                ("C1", "Iowa", "Polk", 5_000.0, 100.0, CALM),
                ("C2", "Iowa", "Story", 30_000.0, 200.0, CALM),
                ("C3", "Iowa", "Linn", 75_000.0, 300.0, CALM),
                ("C4", "Ohio", "Knox", 40_000.0, 400.0, TORNADO),
                ("C5", "Alaska", "Nome", 1.0, 0.0, CALM),
            ]),
        )
        .unwrap();
        fs::write(
            dir.join("NRI_Table_Counties_2021.csv"),
            hazard_csv(&[("C1", "Iowa", "Polk", 5_000.0, 100.0, CALM)]),
        )
        .unwrap();
        fs::write(
            dir.join("Expected_2050.csv"),
            "State,County,Farm crop Yields\n\
             Iowa,Polk County,0\n\
             Iowa,\"Story County, IA\",0\n\
             Iowa,Linn County,0\n\
             Ohio,Knox County,0\n\
             District of Columbia,Washington,1\n",
        )
        .unwrap();
    }

    #[test]
    fn end_to_end_ranking() {
        let dir = tempfile::tempdir().unwrap();
        write_fixture(dir.path());
        let cfg = AnalysisConfig { data_dir: dir.path().to_path_buf(), ..Default::default() };
        let result = run(&cfg).unwrap();

        // Alaska is dropped by the region filter; the join keeps every base row.
        assert_eq!(result.counties.len(), 4);
        assert_eq!(result.outcome.threshold, 137.5);
        assert_eq!(result.outcome.hazard_survivors, 3);
        let ids: Vec<&str> =
            result.outcome.survivors.iter().map(|c| c.hazard.nri_id.as_str()).collect();
        assert_eq!(ids, vec!["C2", "C3"]);

        let states: Vec<&str> = result.ranked.iter().map(|a| a.state.as_str()).collect();
        assert_eq!(states, vec!["Iowa", "Ohio"]);
        let iowa = &result.ranked[0];
        assert_eq!(iowa.filtered_area, 500.0);
        assert_eq!(iowa.mean_expected_value, Some(200.0));
        let ohio = &result.ranked[1];
        assert_eq!(ohio.coverage_ratio, 0.0);
        assert_eq!(ohio.mean_expected_value, None);
        assert_eq!(result.summary.top_states, vec!["Iowa".to_string()]);
    }

    #[test]
    fn small_farm_preset_changes_scoring() {
        let dir = tempfile::tempdir().unwrap();
        write_fixture(dir.path());
        let cfg = AnalysisConfig {
            data_dir: dir.path().to_path_buf(),
            scoring: ScoringPolicy::AreaPlusTenthValue,
            value_threshold: ValueThreshold::Fixed(0.0),
            ..Default::default()
        };
        let result = run(&cfg).unwrap();
        let iowa = result.ranked.iter().find(|a| a.state == "Iowa").unwrap();
        assert_eq!(iowa.filtered_area, 600.0);
        assert_eq!(iowa.weighted_score, Some(600.0 + 0.1 * 150.0));
    }

    #[test]
    fn missing_base_year_is_a_schema_error() {
        let dir = tempfile::tempdir().unwrap();
        write_fixture(dir.path());
        let cfg = AnalysisConfig {
            data_dir: dir.path().to_path_buf(),
            base_year: 2019,
            ..Default::default()
        };
        let err = run(&cfg).unwrap_err();
        assert!(matches!(err, PipelineError::Schema { ref key, .. } if key == "NRI_2019"));
    }

    #[test]
    fn repeated_runs_write_identical_bytes() {
        let dir = tempfile::tempdir().unwrap();
        write_fixture(dir.path());
        let cfg = AnalysisConfig { data_dir: dir.path().to_path_buf(), ..Default::default() };

        let out_a = tempfile::tempdir().unwrap();
        let out_b = tempfile::tempdir().unwrap();
        let a = write_outputs(&run(&cfg).unwrap(), out_a.path()).unwrap();
        let b = write_outputs(&run(&cfg).unwrap(), out_b.path()).unwrap();
        assert_eq!(fs::read(&a.ranking).unwrap(), fs::read(&b.ranking).unwrap());
        assert_eq!(fs::read(&a.counties).unwrap(), fs::read(&b.counties).unwrap());
        assert_eq!(fs::read(&a.summary).unwrap(), fs::read(&b.summary).unwrap());

        let counties = fs::read_to_string(&a.counties).unwrap();
        assert_eq!(counties.lines().count(), 1 + 4);

        let csv = fs::read_to_string(&a.ranking).unwrap();
        let header = "Rank,State,TotalArea,FilteredArea,Counties,CoverageRatio,\
                      MeanExpectedValue,WeightedScore\n";
        assert!(csv.starts_with(header));
        assert!(csv.contains("1,Iowa,600.00,500.00,2,0.8333,200.00,166.67\n"));
    }

    #[test]
    fn diagnostics_report_every_dataset() {
        let dir = tempfile::tempdir().unwrap();
        write_fixture(dir.path());
        let rows = inspect(dir.path()).unwrap();
        let names: Vec<&str> = rows.iter().map(|r| r.dataset.as_str()).collect();
        assert_eq!(names, vec!["NRI_2020", "NRI_2021", "Expected_2050"]);
        assert_eq!(rows[0].rows, 5);
        assert_eq!(rows[0].rows_kept, "4");
        // 16 of the 39 whitelisted columns are present, on all five rows.
        assert_eq!(rows[0].cells_filled, "115");
        assert_eq!(rows[1].cells_filled, "23");
        assert_eq!(rows[2].rows_kept, "");
        assert_eq!(rows[2].cells_filled, "");
    }
}
