use thiserror::Error;

#[derive(Error, Debug)]
pub enum DashboardError {
    /// A source dataset could not be read; the session cannot continue.
    #[error("Load error ({dataset}): {reason}")]
    Load { dataset: String, reason: String },

    #[error("Export error: {0}")]
    Export(String),

    #[error("Config error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl DashboardError {
    pub fn load(dataset: &str, reason: impl std::fmt::Display) -> Self {
        DashboardError::Load {
            dataset: dataset.to_string(),
            reason: reason.to_string(),
        }
    }

    pub fn export(reason: impl std::fmt::Display) -> Self {
        DashboardError::Export(reason.to_string())
    }
}

pub type Result<T> = std::result::Result<T, DashboardError>;
