use crate::config::Config;
use crate::error::Result;
use crate::loader::{load_dataset, LoadReport};
use crate::types::{Dataset, DatasetKind, Stage};

/// Both source datasets, loaded once and only read afterwards.
///
/// Every computation takes the context by shared reference, so each request
/// works on its own filtered view of the same data.
#[derive(Debug, Clone, Default)]
pub struct AppContext {
    spaece: Dataset,
    alfa: Dataset,
}

impl AppContext {
    pub fn new(spaece: Dataset, alfa: Dataset) -> Self {
        Self { spaece, alfa }
    }

    /// Load both datasets; either failing aborts the whole load.
    pub fn load(config: &Config) -> Result<(Self, Vec<(String, LoadReport)>)> {
        let (spaece, spaece_report) = load_dataset(&config.spaece_path, "result_spaece")?;
        let (alfa, alfa_report) = load_dataset(&config.alfa_path, "result_alfa")?;
        let reports = vec![
            (spaece.name.clone(), spaece_report),
            (alfa.name.clone(), alfa_report),
        ];
        Ok((Self::new(spaece, alfa), reports))
    }

    pub fn dataset(&self, kind: DatasetKind) -> &Dataset {
        match kind {
            DatasetKind::Spaece => &self.spaece,
            DatasetKind::Alfa => &self.alfa,
        }
    }

    /// The dataset that holds `stage`'s results.
    pub fn dataset_for(&self, stage: Stage) -> &Dataset {
        self.dataset(stage.dataset())
    }
}
