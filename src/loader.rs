use crate::error::{PipelineError, Result};
use crate::types::{DatasetKey, RawDataset};
use csv::ReaderBuilder;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// File-name decorations dropped before the key is interpreted.
const NAME_DECORATIONS: [&str; 2] = ["_Table_Counties", "_Chng"];

static HAZARD_KEY_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^NRI_(\d{4})$").expect("hazard key pattern"));
static PREDICTIVE_KEY_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^Expected_(\d{4})$").expect("predictive key pattern"));

/// Every dataset found in the input directory, keyed by family.
#[derive(Debug, Default)]
pub struct DatasetRegistry {
    pub datasets: BTreeMap<DatasetKey, RawDataset>,
}

impl DatasetRegistry {
    pub fn insert(&mut self, dataset: RawDataset) -> Result<()> {
        if self.datasets.contains_key(&dataset.key) {
            return Err(PipelineError::load(
                dataset.key.to_string(),
                "two files derive the same dataset key",
            ));
        }
        self.datasets.insert(dataset.key.clone(), dataset);
        Ok(())
    }

    /// Hazard tables in ascending year order.
    pub fn hazard_tables(&self) -> impl Iterator<Item = (u16, &RawDataset)> {
        self.datasets.iter().filter_map(|(k, d)| match k {
            DatasetKey::HazardYear(y) => Some((*y, d)),
            _ => None,
        })
    }

    /// The projection table; the earliest horizon wins if several are present.
    pub fn predictive(&self) -> Option<&RawDataset> {
        self.datasets
            .iter()
            .find(|(k, _)| matches!(k, DatasetKey::Predictive(_)))
            .map(|(_, d)| d)
    }

    pub fn len(&self) -> usize {
        self.datasets.len()
    }
}

/// Derive the dataset key from a file path: strip the directory, the
/// extension and the known decorations, then classify what remains.
pub fn derive_key(path: &Path) -> DatasetKey {
    let mut stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    for decoration in NAME_DECORATIONS {
        stem = stem.replace(decoration, "");
    }
    if let Some(caps) = HAZARD_KEY_RE.captures(&stem) {
        if let Ok(year) = caps[1].parse() {
            return DatasetKey::HazardYear(year);
        }
    }
    if let Some(caps) = PREDICTIVE_KEY_RE.captures(&stem) {
        if let Ok(year) = caps[1].parse() {
            return DatasetKey::Predictive(year);
        }
    }
    DatasetKey::Other(stem)
}

/// CSV files directly inside `dir`, sorted so load order is stable.
pub fn discover_csv_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let dir_err = |e: std::io::Error| PipelineError::load(dir.display().to_string(), e.to_string());
    let mut files = Vec::new();
    for entry in fs::read_dir(dir).map_err(dir_err)? {
        let path = entry.map_err(dir_err)?.path();
        let is_csv = path
            .extension()
            .map_or(false, |ext| ext.eq_ignore_ascii_case("csv"));
        if path.is_file() && is_csv {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

pub fn load_raw(path: &Path, key: DatasetKey) -> Result<RawDataset> {
    let load_err =
        |e: csv::Error| PipelineError::load(key.to_string(), format!("{}: {}", path.display(), e));
    let mut rdr = ReaderBuilder::new()
        .flexible(true)
        .from_path(path)
        .map_err(load_err)?;
    let headers: Vec<String> = rdr
        .headers()
        .map_err(load_err)?
        .iter()
        .map(|h| h.trim().to_string())
        .collect();
    if headers.iter().all(|h| h.is_empty()) {
        return Err(PipelineError::load(
            key.to_string(),
            format!("{}: no header row", path.display()),
        ));
    }
    let mut rows = Vec::new();
    for result in rdr.records() {
        rows.push(result.map_err(load_err)?);
    }
    debug!(dataset = %key, rows = rows.len(), columns = headers.len(), "parsed file");
    Ok(RawDataset { key, headers, rows })
}

pub fn load_directory(dir: &Path) -> Result<DatasetRegistry> {
    info!("Loading datasets from {}", dir.display());
    let mut registry = DatasetRegistry::default();
    for path in discover_csv_files(dir)? {
        let key = derive_key(&path);
        registry.insert(load_raw(&path, key)?)?;
    }
    info!("Loaded {} datasets", registry.len());
    Ok(registry)
}
