use crate::error::{DashboardError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    /// 5th and 9th grade results.
    pub spaece_path: PathBuf,
    /// 2nd grade (literacy) results.
    pub alfa_path: PathBuf,
    /// PNG placed at the top of every PDF report; skipped when absent.
    pub logo_path: Option<PathBuf>,
    pub output_directory: PathBuf,
    pub report_title: String,
    pub source_note: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            spaece_path: PathBuf::from("data/result_spaece.csv"),
            alfa_path: PathBuf::from("data/result_alfa.csv"),
            logo_path: Some(PathBuf::from("img/logo_2021.png")),
            output_directory: PathBuf::from("output"),
            report_title: "SETOR DE MONITORAMENTO E PROCESSAMENTO DE RESULTADOS".to_string(),
            source_note: "Fonte: SEDUC. Resultados SPAECE.".to_string(),
        }
    }
}

impl Config {
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content).map_err(|e| DashboardError::Config(format!("{}: {}", path.display(), e)))
    }

    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self).map_err(|e| DashboardError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Read `path`, or write the defaults there on first run.
    pub fn load_or_create(path: &Path) -> Result<Self> {
        if path.exists() {
            Self::load_from_file(path)
        } else {
            let config = Self::default();
            config.save_to_file(path)?;
            Ok(config)
        }
    }
}
