use crate::types::{Dataset, Record, Stage};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// Columns a selection can constrain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Column {
    MunicipalityId,
    Municipality,
    SchoolId,
    School,
    Stage,
    Component,
    Edition,
}

impl Column {
    fn value<'a>(&self, record: &'a Record) -> &'a str {
        match self {
            Column::MunicipalityId => &record.municipality_id,
            Column::Municipality => &record.municipality,
            Column::SchoolId => &record.school_id,
            Column::School => &record.school,
            Column::Stage => record.stage.label(),
            Column::Component => record.component.label(),
            Column::Edition => &record.edition,
        }
    }
}

/// Exact-match constraints, all of which a record must satisfy.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Predicates(BTreeMap<Column, String>);

impl Predicates {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, column: Column, value: impl Into<String>) -> Self {
        self.0.insert(column, value.into());
        self
    }

    pub fn matches(&self, record: &Record) -> bool {
        self.0.iter().all(|(col, want)| col.value(record) == want.as_str())
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for Predicates {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.0.iter().map(|(c, v)| format!("{:?}={}", c, v)).collect();
        f.write_str(&parts.join(", "))
    }
}

/// Rows of `dataset` satisfying every predicate, in source order.
///
/// An empty result is a normal "no data" outcome, not an error.
pub fn filter<'a>(dataset: &'a Dataset, predicates: &Predicates) -> Vec<&'a Record> {
    dataset.records.iter().filter(|r| predicates.matches(r)).collect()
}

fn unique<'a, I>(values: I) -> Vec<String>
where
    I: Iterator<Item = &'a str>,
{
    values
        .filter(|v| !v.is_empty())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .map(str::to_string)
        .collect()
}

pub fn municipalities(dataset: &Dataset) -> Vec<String> {
    unique(dataset.records.iter().map(|r| r.municipality.as_str()))
}

pub fn schools_in(dataset: &Dataset, municipality: &str) -> Vec<String> {
    unique(
        dataset
            .records
            .iter()
            .filter(|r| r.municipality == municipality)
            .map(|r| r.school.as_str()),
    )
}

pub fn schools_for(dataset: &Dataset, stage: Stage) -> Vec<String> {
    unique(
        dataset
            .records
            .iter()
            .filter(|r| r.stage == stage)
            .map(|r| r.school.as_str()),
    )
}

/// Editions offered for `stage`, ascending.
pub fn editions(dataset: &Dataset, stage: Stage) -> Vec<String> {
    unique(
        dataset
            .records
            .iter()
            .filter(|r| r.stage == stage)
            .map(|r| r.edition.as_str()),
    )
}
