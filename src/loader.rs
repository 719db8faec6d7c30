use crate::error::{DashboardError, Result};
use crate::types::{
    Cell, ColumnKind, Component, Dataset, Record, Stage, COL_COMPONENT, COL_EDITION,
    COL_MUNICIPALITY, COL_MUNICIPALITY_ID, COL_SCHOOL, COL_SCHOOL_ID, COL_SCORE, COL_STAGE,
};
use crate::util::{parse_f64_safe, round2, strip_separators};
use csv::{ReaderBuilder, StringRecord};
use std::collections::BTreeMap;
use std::fs::File;
use std::io::Read;
use std::path::Path;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct LoadReport {
    pub total_rows: usize,
    pub loaded_rows: usize,
    pub skipped_rows: usize,
    pub missing_scores: usize,
    pub dropped_columns: Vec<String>,
}

/// Positions of the fixed columns plus the declared kind of every header.
struct ColumnLayout {
    kinds: Vec<ColumnKind>,
    headers: Vec<String>,
    municipality_id: Option<usize>,
    municipality: usize,
    school_id: Option<usize>,
    school: usize,
    stage: usize,
    component: usize,
    edition: usize,
}

impl ColumnLayout {
    fn resolve(headers: &StringRecord, dataset: &str) -> Result<Self> {
        let headers: Vec<String> = headers.iter().map(|h| h.trim().to_string()).collect();
        let find = |name: &str| headers.iter().position(|h| h == name);
        let require = |name: &str| {
            find(name).ok_or_else(|| DashboardError::load(dataset, format!("missing column {}", name)))
        };
        if find(COL_SCORE).is_none() {
            return Err(DashboardError::load(dataset, format!("missing column {}", COL_SCORE)));
        }
        Ok(Self {
            kinds: headers.iter().map(|h| ColumnKind::of(h)).collect(),
            municipality_id: find(COL_MUNICIPALITY_ID),
            municipality: require(COL_MUNICIPALITY)?,
            school_id: find(COL_SCHOOL_ID),
            school: require(COL_SCHOOL)?,
            stage: require(COL_STAGE)?,
            component: require(COL_COMPONENT)?,
            edition: require(COL_EDITION)?,
            headers,
        })
    }

    fn dropped_columns(&self) -> Vec<String> {
        self.headers
            .iter()
            .zip(&self.kinds)
            .filter(|(_, k)| **k == ColumnKind::IndexArtifact)
            .map(|(h, _)| h.clone())
            .collect()
    }

    fn kept_headers(&self) -> Vec<String> {
        self.headers
            .iter()
            .zip(&self.kinds)
            .filter(|(_, k)| **k != ColumnKind::IndexArtifact)
            .map(|(h, _)| h.clone())
            .collect()
    }

    /// Build a typed record from one raw row. `Err` carries the reason the
    /// row was skipped.
    fn record(&self, row: &StringRecord) -> std::result::Result<Record, String> {
        let cell = |idx: usize| row.get(idx).unwrap_or("").trim();
        let text = |idx: Option<usize>| idx.map(|i| cell(i).to_string()).unwrap_or_default();
        let ident = |idx: Option<usize>| idx.map(|i| strip_separators(cell(i))).unwrap_or_default();

        let stage: Stage = cell(self.stage).parse()?;
        let component: Component = cell(self.component).parse()?;

        let mut score = None;
        let mut levels = BTreeMap::new();
        let mut extra = BTreeMap::new();
        for (idx, kind) in self.kinds.iter().enumerate() {
            let raw = cell(idx);
            match kind {
                ColumnKind::Score => score = parse_f64_safe(Some(raw)).map(round2),
                ColumnKind::Count => {
                    if let Some(v) = parse_f64_safe(Some(raw)) {
                        levels.insert(self.headers[idx].clone(), round2(v));
                    }
                }
                ColumnKind::Auto => {
                    let value = match parse_f64_safe(Some(raw)) {
                        Some(v) => Cell::Number(round2(v)),
                        None => Cell::Text(raw.to_string()),
                    };
                    extra.insert(self.headers[idx].clone(), value);
                }
                ColumnKind::IndexArtifact | ColumnKind::Identifier | ColumnKind::Text => {}
            }
        }

        Ok(Record {
            municipality_id: ident(self.municipality_id),
            municipality: text(Some(self.municipality)),
            school_id: ident(self.school_id),
            school: text(Some(self.school)),
            stage,
            component,
            edition: ident(Some(self.edition)),
            score,
            levels,
            extra,
        })
    }
}

/// Open and normalize one dataset file.
pub fn load_dataset(path: &Path, name: &str) -> Result<(Dataset, LoadReport)> {
    let file = File::open(path)
        .map_err(|e| DashboardError::load(name, format!("{}: {}", path.display(), e)))?;
    read_dataset(file, name)
}

/// Normalize a CSV stream into a [`Dataset`].
///
/// Structural problems (ragged rows, invalid UTF-8, missing required
/// columns) reject the whole dataset. Rows whose stage or component is not
/// recognised are skipped and counted; non-numeric scores become missing.
pub fn read_dataset<R: Read>(reader: R, name: &str) -> Result<(Dataset, LoadReport)> {
    let mut rdr = ReaderBuilder::new().from_reader(reader);
    let headers = rdr.headers().map_err(|e| DashboardError::load(name, e))?.clone();
    let layout = ColumnLayout::resolve(&headers, name)?;

    let mut report = LoadReport {
        dropped_columns: layout.dropped_columns(),
        ..LoadReport::default()
    };
    if !report.dropped_columns.is_empty() {
        debug!(dataset = name, columns = ?report.dropped_columns, "dropping index columns");
    }

    let mut records = Vec::new();
    for result in rdr.records() {
        report.total_rows += 1;
        let row = result.map_err(|e| DashboardError::load(name, e))?;
        match layout.record(&row) {
            Ok(record) => {
                if record.score.is_none() {
                    report.missing_scores += 1;
                }
                records.push(record);
            }
            Err(reason) => {
                report.skipped_rows += 1;
                warn!(dataset = name, row = report.total_rows, %reason, "skipping row");
            }
        }
    }
    report.loaded_rows = records.len();
    info!(
        dataset = name,
        rows = report.loaded_rows,
        skipped = report.skipped_rows,
        "dataset loaded"
    );

    Ok((Dataset::new(name, layout.kept_headers(), records), report))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const SAMPLE: &str = "\
Unnamed: 0,INEP_MUN,MUNICIPIO,INEP_ESC,ESCOLA,ETAPA,COMPONENTE_CURRICULAR,EDICAO,PROFICIENCIA_MEDIA,MUITO_CRITICO,CRITICO,INTERMEDIARIO,ADEQUADO,PARTICIPACAO,REDE
0,2.304.400,FORTALEZA,23.001.234,EEF ALFA,5º Ano,MATEMÁTICA,2019,231.456,1,2,3,4,95.556,MUNICIPAL
1,2304400,FORTALEZA,23001235,EEF BETA,9º Ano,LÍNGUA PORTUGUESA,\"2,023\",-,0,0,0,0,80,MUNICIPAL
";

    #[test]
    fn normalizes_identifiers_and_numbers() {
        let (ds, report) = read_dataset(SAMPLE.as_bytes(), "spaece").unwrap();
        assert_eq!(report.total_rows, 2);
        assert_eq!(report.loaded_rows, 2);
        assert_eq!(report.missing_scores, 1);
        assert_eq!(report.dropped_columns, vec!["Unnamed: 0".to_string()]);
        assert!(!ds.headers.contains(&"Unnamed: 0".to_string()));

        let first = &ds.records[0];
        assert_eq!(first.municipality_id, "2304400");
        assert_eq!(first.school_id, "23001234");
        assert_eq!(first.stage, Stage::Fifth);
        assert_eq!(first.component, Component::Mathematics);
        assert_eq!(first.score, Some(231.46));
        assert_eq!(first.level("ADEQUADO"), 4.0);
        assert_eq!(first.extra.get("PARTICIPACAO"), Some(&Cell::Number(95.56)));
        assert_eq!(first.extra.get("REDE"), Some(&Cell::Text("MUNICIPAL".into())));

        let second = &ds.records[1];
        assert_eq!(second.edition, "2023");
        assert_eq!(second.score, None);
    }

    #[test]
    fn unknown_stage_rows_are_skipped() {
        let csv = "MUNICIPIO,ESCOLA,ETAPA,COMPONENTE_CURRICULAR,EDICAO,PROFICIENCIA_MEDIA\n\
                   A,E1,3º Ano,MATEMÁTICA,2019,200\n\
                   A,E2,5º Ano,MATEMÁTICA,2019,210\n";
        let (ds, report) = read_dataset(csv.as_bytes(), "spaece").unwrap();
        assert_eq!(ds.len(), 1);
        assert_eq!(report.skipped_rows, 1);
    }

    #[test]
    fn ragged_rows_reject_the_dataset() {
        let csv = "MUNICIPIO,ESCOLA,ETAPA,COMPONENTE_CURRICULAR,EDICAO,PROFICIENCIA_MEDIA\n\
                   A,E1,5º Ano,MATEMÁTICA,2019\n";
        let err = read_dataset(csv.as_bytes(), "spaece").unwrap_err();
        assert!(matches!(err, DashboardError::Load { .. }));
    }

    #[test]
    fn missing_required_column_is_a_load_error() {
        let csv = "MUNICIPIO,ESCOLA,ETAPA,EDICAO,PROFICIENCIA_MEDIA\nA,E1,5º Ano,2019,200\n";
        let err = read_dataset(csv.as_bytes(), "spaece").unwrap_err();
        assert!(err.to_string().contains("COMPONENTE_CURRICULAR"));
    }

    #[test]
    fn loads_from_disk_and_reports_missing_files() {
        let mut tmp = NamedTempFile::new().unwrap();
        tmp.write_all(SAMPLE.as_bytes()).unwrap();
        let (ds, _) = load_dataset(tmp.path(), "spaece").unwrap();
        assert_eq!(ds.name, "spaece");
        assert_eq!(ds.len(), 2);

        let err = load_dataset(Path::new("/nonexistent/result_alfa.csv"), "alfa").unwrap_err();
        assert!(matches!(err, DashboardError::Load { .. }));
    }
}
