use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use tabled::Tabled;

pub const COL_MUNICIPALITY_ID: &str = "INEP_MUN";
pub const COL_MUNICIPALITY: &str = "MUNICIPIO";
pub const COL_SCHOOL_ID: &str = "INEP_ESC";
pub const COL_SCHOOL: &str = "ESCOLA";
pub const COL_STAGE: &str = "ETAPA";
pub const COL_COMPONENT: &str = "COMPONENTE_CURRICULAR";
pub const COL_EDITION: &str = "EDICAO";
pub const COL_SCORE: &str = "PROFICIENCIA_MEDIA";

/// Proficiency levels reported for the literacy stage, worst to best.
pub const ALFA_LEVELS: [&str; 5] = [
    "NAO_ALFABETIZADOS",
    "ALFABETIZACAO_INCOMPLETA",
    "INTERMEDIARIO",
    "SUFICIENTE",
    "DESEJAVEL",
];

/// Proficiency levels reported for the 5th and 9th grade stages, worst to best.
pub const SPAECE_LEVELS: [&str; 4] = ["MUITO_CRITICO", "CRITICO", "INTERMEDIARIO", "ADEQUADO"];

/// Declared type of a source column, resolved from its header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnKind {
    /// Positional index persisted by a spreadsheet export (`Unnamed: 0`).
    IndexArtifact,
    /// Opaque code; separators are stripped, never parsed as a number.
    Identifier,
    Text,
    Score,
    Count,
    /// Unknown column: numeric cells are rounded, anything else is kept as text.
    Auto,
}

impl ColumnKind {
    pub fn of(header: &str) -> Self {
        let h = header.trim();
        if h.is_empty() || h.starts_with("Unnamed") {
            return ColumnKind::IndexArtifact;
        }
        match h {
            COL_MUNICIPALITY_ID | COL_SCHOOL_ID | COL_EDITION => ColumnKind::Identifier,
            COL_MUNICIPALITY | COL_SCHOOL | COL_STAGE | COL_COMPONENT => ColumnKind::Text,
            COL_SCORE => ColumnKind::Score,
            _ if ALFA_LEVELS.contains(&h) || SPAECE_LEVELS.contains(&h) => ColumnKind::Count,
            _ => ColumnKind::Auto,
        }
    }
}

/// Which of the two source spreadsheets holds a stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DatasetKind {
    Alfa,
    Spaece,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Stage {
    #[serde(rename = "2º Ano")]
    Second,
    #[serde(rename = "5º Ano")]
    Fifth,
    #[serde(rename = "9º Ano")]
    Ninth,
}

impl Stage {
    pub const ALL: [Stage; 3] = [Stage::Second, Stage::Fifth, Stage::Ninth];

    pub fn label(self) -> &'static str {
        match self {
            Stage::Second => "2º Ano",
            Stage::Fifth => "5º Ano",
            Stage::Ninth => "9º Ano",
        }
    }

    pub fn dataset(self) -> DatasetKind {
        match self {
            Stage::Second => DatasetKind::Alfa,
            Stage::Fifth | Stage::Ninth => DatasetKind::Spaece,
        }
    }

    /// Level columns summed by the distribution charts, in display order.
    pub fn level_columns(self) -> &'static [&'static str] {
        match self {
            Stage::Second => &ALFA_LEVELS,
            Stage::Fifth | Stage::Ninth => &SPAECE_LEVELS,
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Stage {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let key: String = s
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .collect::<String>()
            .to_ascii_lowercase();
        match key.as_str() {
            "2" | "2ano" => Ok(Stage::Second),
            "5" | "5ano" => Ok(Stage::Fifth),
            "9" | "9ano" => Ok(Stage::Ninth),
            _ => Err(format!("unknown stage '{}'", s)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Component {
    #[serde(rename = "LÍNGUA PORTUGUESA")]
    Portuguese,
    #[serde(rename = "MATEMÁTICA")]
    Mathematics,
}

impl Component {
    pub const ALL: [Component; 2] = [Component::Portuguese, Component::Mathematics];

    pub fn label(self) -> &'static str {
        match self {
            Component::Portuguese => "LÍNGUA PORTUGUESA",
            Component::Mathematics => "MATEMÁTICA",
        }
    }
}

impl fmt::Display for Component {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Component {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        // Fold the two accented letters the labels use so CLI input can skip them.
        let key: String = s
            .trim()
            .to_lowercase()
            .chars()
            .map(|c| match c {
                'í' => 'i',
                'á' => 'a',
                c => c,
            })
            .filter(|c| c.is_ascii_alphanumeric())
            .collect();
        match key.as_str() {
            "linguaportuguesa" | "portugues" | "lp" => Ok(Component::Portuguese),
            "matematica" | "mt" => Ok(Component::Mathematics),
            _ => Err(format!("unknown component '{}'", s)),
        }
    }
}

/// A cell outside the fixed schema, typed at load time.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Cell {
    Number(f64),
    Text(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    pub municipality_id: String,
    pub municipality: String,
    pub school_id: String,
    pub school: String,
    pub stage: Stage,
    pub component: Component,
    pub edition: String,
    pub score: Option<f64>,
    pub levels: BTreeMap<String, f64>,
    pub extra: BTreeMap<String, Cell>,
}

impl Record {
    pub fn level(&self, column: &str) -> f64 {
        self.levels.get(column).copied().unwrap_or(0.0)
    }
}

/// One of the two normalized source tables. Never mutated after load.
#[derive(Debug, Clone, Default)]
pub struct Dataset {
    pub name: String,
    pub headers: Vec<String>,
    pub records: Vec<Record>,
}

impl Dataset {
    pub fn new(name: impl Into<String>, headers: Vec<String>, records: Vec<Record>) -> Self {
        Self {
            name: name.into(),
            headers,
            records,
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[derive(Debug, Serialize, Deserialize, Tabled, Clone, PartialEq)]
pub struct ClassificationRow {
    #[serde(rename = "ORD")]
    #[tabled(rename = "ORD")]
    pub ord: String,
    #[serde(rename = "ESCOLA")]
    #[tabled(rename = "ESCOLA")]
    pub school: String,
    #[serde(rename = "ETAPA")]
    #[tabled(rename = "ETAPA")]
    pub stage: String,
    #[serde(rename = "PROFICIENCIA_MEDIA")]
    #[tabled(rename = "PROFICIENCIA_MEDIA")]
    pub score: f64,
    #[serde(rename = "COMPONENTE_CURRICULAR")]
    #[tabled(rename = "COMPONENTE_CURRICULAR")]
    pub component: String,
    #[serde(rename = "EDICAO")]
    #[tabled(rename = "EDICAO")]
    pub edition: String,
}

#[derive(Debug, Serialize, Deserialize, Tabled, Clone, PartialEq)]
pub struct SchoolPositionRow {
    #[serde(rename = "EDICAO")]
    #[tabled(rename = "EDICAO")]
    pub edition: String,
    #[serde(rename = "ESCOLA")]
    #[tabled(rename = "ESCOLA")]
    pub school: String,
    #[serde(rename = "ETAPA")]
    #[tabled(rename = "ETAPA")]
    pub stage: String,
    #[serde(rename = "COMPONENTE_CURRICULAR")]
    #[tabled(rename = "COMPONENTE_CURRICULAR")]
    pub component: String,
    #[serde(rename = "PROFICIENCIA_MEDIA")]
    #[tabled(rename = "PROFICIENCIA_MEDIA")]
    pub score: f64,
    #[serde(rename = "POSICAO")]
    #[tabled(rename = "POSICAO")]
    pub position: String,
}

#[derive(Debug, Serialize, Deserialize, Tabled, Clone, PartialEq)]
pub struct VariationRow {
    #[serde(rename = "ESCOLA")]
    #[tabled(rename = "ESCOLA")]
    pub school: String,
    #[serde(rename = "EDICAO")]
    #[tabled(rename = "EDICAO")]
    pub edition: String,
    #[serde(rename = "PERÍODO")]
    #[tabled(rename = "PERÍODO")]
    pub period: String,
    #[serde(rename = "PROFICIENCIA_MEDIA")]
    #[tabled(rename = "PROFICIENCIA_MEDIA")]
    pub score: i64,
    #[serde(rename = "Diferença de Proficiência")]
    #[tabled(rename = "Diferença de Proficiência")]
    pub difference: String,
    #[serde(rename = "Variação Percentual")]
    #[tabled(rename = "Variação Percentual")]
    pub percent: String,
}

#[derive(Debug, Serialize, Deserialize, Tabled, Clone, PartialEq)]
pub struct QuartileRow {
    #[serde(rename = "ESCOLA")]
    #[tabled(rename = "ESCOLA")]
    pub school: String,
    #[serde(rename = "ETAPA")]
    #[tabled(rename = "ETAPA")]
    pub stage: String,
    #[serde(rename = "COMPONENTE_CURRICULAR")]
    #[tabled(rename = "COMPONENTE_CURRICULAR")]
    pub component: String,
    #[serde(rename = "EDICAO")]
    #[tabled(rename = "EDICAO")]
    pub edition: String,
    #[serde(rename = "PROFICIENCIA_MEDIA")]
    #[tabled(rename = "PROFICIENCIA_MEDIA")]
    pub score: f64,
    #[serde(rename = "QUARTIL")]
    #[tabled(rename = "QUARTIL")]
    pub band: String,
}

#[derive(Debug, Serialize, Deserialize, Tabled, Clone, PartialEq)]
pub struct QuartileReferenceRow {
    #[serde(rename = "Quartil")]
    #[tabled(rename = "Quartil")]
    pub band: String,
    #[serde(rename = "Intervalo")]
    #[tabled(rename = "Intervalo")]
    pub interval: String,
    #[serde(rename = "Nº de Escolas")]
    #[tabled(rename = "Nº de Escolas")]
    pub schools: usize,
}

#[derive(Debug, Serialize, Deserialize, Tabled, Clone, PartialEq)]
pub struct SchoolQuartileRow {
    #[serde(rename = "ESCOLA")]
    #[tabled(rename = "ESCOLA")]
    pub school: String,
    #[serde(rename = "EDIÇÃO")]
    #[tabled(rename = "EDIÇÃO")]
    pub edition: String,
    #[serde(rename = "PROFICIÊNCIA")]
    #[tabled(rename = "PROFICIÊNCIA")]
    pub score: String,
    #[serde(rename = "QUARTIL")]
    #[tabled(rename = "QUARTIL")]
    pub band: String,
    #[serde(rename = "Q1")]
    #[tabled(rename = "Q1")]
    pub q1: String,
    #[serde(rename = "MEDIANA (Q2)")]
    #[tabled(rename = "MEDIANA (Q2)")]
    pub median: String,
    #[serde(rename = "Q3")]
    #[tabled(rename = "Q3")]
    pub q3: String,
}

/// Percent of students per proficiency level for one edition.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct EditionDistribution {
    pub edition: String,
    pub total: f64,
    /// `(level column, percent)`; `None` when the edition has no students.
    pub shares: Vec<(String, Option<f64>)>,
}

/// Five-number-ish summary of one quartile band, for box-plot rendering.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct BandSummary {
    pub band: String,
    pub count: usize,
    pub min: Option<f64>,
    pub median: Option<f64>,
    pub max: Option<f64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn column_kinds_follow_declared_schema() {
        assert_eq!(ColumnKind::of("Unnamed: 0"), ColumnKind::IndexArtifact);
        assert_eq!(ColumnKind::of(""), ColumnKind::IndexArtifact);
        assert_eq!(ColumnKind::of("EDICAO"), ColumnKind::Identifier);
        assert_eq!(ColumnKind::of("ESCOLA"), ColumnKind::Text);
        assert_eq!(ColumnKind::of("PROFICIENCIA_MEDIA"), ColumnKind::Score);
        assert_eq!(ColumnKind::of("DESEJAVEL"), ColumnKind::Count);
        assert_eq!(ColumnKind::of("PARTICIPACAO"), ColumnKind::Auto);
    }

    #[test]
    fn stage_parses_labels_and_short_forms() {
        assert_eq!("2º Ano".parse::<Stage>(), Ok(Stage::Second));
        assert_eq!("5".parse::<Stage>(), Ok(Stage::Fifth));
        assert_eq!("9ano".parse::<Stage>(), Ok(Stage::Ninth));
        assert!("3º Ano".parse::<Stage>().is_err());
        assert_eq!(Stage::Second.dataset(), DatasetKind::Alfa);
        assert_eq!(Stage::Ninth.level_columns().len(), 4);
        assert_eq!(Stage::Second.level_columns().len(), 5);
    }

    #[test]
    fn component_parses_with_or_without_accents() {
        assert_eq!("MATEMÁTICA".parse::<Component>(), Ok(Component::Mathematics));
        assert_eq!("matematica".parse::<Component>(), Ok(Component::Mathematics));
        assert_eq!("LÍNGUA PORTUGUESA".parse::<Component>(), Ok(Component::Portuguese));
        assert_eq!("lp".parse::<Component>(), Ok(Component::Portuguese));
        assert!("HISTÓRIA".parse::<Component>().is_err());
    }
}
