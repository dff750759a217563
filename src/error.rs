// Error taxonomy for the pipeline.
//
// Every variant is fatal: the binary prints the message and exits. Messages
// name the dataset key and row identifier wherever one is known.
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("load error in {key}: {message}")]
    Load { key: String, message: String },

    #[error("schema error in {key}: {message}")]
    Schema { key: String, message: String },

    #[error("data quality error in {key}: {message}")]
    DataQuality { key: String, message: String },

    #[error("join integrity error: {0}")]
    JoinIntegrity(String),

    #[error("config error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl PipelineError {
    pub fn load(key: impl Into<String>, message: impl Into<String>) -> Self {
        PipelineError::Load { key: key.into(), message: message.into() }
    }

    pub fn schema(key: impl Into<String>, message: impl Into<String>) -> Self {
        PipelineError::Schema { key: key.into(), message: message.into() }
    }

    pub fn data_quality(key: impl Into<String>, message: impl Into<String>) -> Self {
        PipelineError::DataQuality { key: key.into(), message: message.into() }
    }
}

pub type Result<T> = std::result::Result<T, PipelineError>;

/// Join a list of offending identifiers for an error message, keeping it
/// readable when thousands of rows are affected.
pub fn list_offenders(ids: &[String]) -> String {
    const SHOWN: usize = 10;
    if ids.len() <= SHOWN {
        ids.join(", ")
    } else {
        format!("{} (and {} more)", ids[..SHOWN].join(", "), ids.len() - SHOWN)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_name_the_dataset() {
        let err = PipelineError::schema("NRI_2020", "missing column STATE");
        assert_eq!(err.to_string(), "schema error in NRI_2020: missing column STATE");
    }

    #[test]
    fn long_offender_lists_are_truncated() {
        let ids: Vec<String> = (0..12).map(|i| format!("C{i}")).collect();
        let s = list_offenders(&ids);
        assert!(s.starts_with("C0, C1"));
        assert!(s.ends_with("(and 2 more)"));
        assert_eq!(list_offenders(&ids[..2]), "C0, C1");
    }
}
