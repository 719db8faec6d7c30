use crate::types::{Component, Record, Stage};
use std::collections::BTreeMap;

pub fn record(
    municipality: &str,
    school: &str,
    stage: Stage,
    component: Component,
    edition: &str,
    score: Option<f64>,
) -> Record {
    Record {
        municipality_id: String::new(),
        municipality: municipality.to_string(),
        school_id: String::new(),
        school: school.to_string(),
        stage,
        component,
        edition: edition.to_string(),
        score,
        levels: BTreeMap::new(),
        extra: BTreeMap::new(),
    }
}

pub fn with_levels(mut record: Record, levels: &[(&str, f64)]) -> Record {
    for (name, count) in levels {
        record.levels.insert(name.to_string(), *count);
    }
    record
}
