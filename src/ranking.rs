use crate::context::AppContext;
use crate::filter::{filter, Column, Predicates};
use crate::types::{ClassificationRow, Component, Record, SchoolPositionRow, Stage, VariationRow};
use crate::util::{cmp_f64, format_signed, format_signed_opt, ordinal, NOT_APPLICABLE};
use std::collections::BTreeMap;
use tracing::{debug, warn};

/// Competition ranking, highest score first.
///
/// Equal scores share the best rank and the next distinct score skips the
/// tied count (`[500, 450, 450, 400]` → `1, 2, 2, 4`). Missing scores get no
/// rank and do not count against anyone.
pub fn rank_min_desc(scores: &[Option<f64>]) -> Vec<Option<usize>> {
    let mut present: Vec<f64> = scores.iter().flatten().copied().collect();
    present.sort_by(|a, b| cmp_f64(b, a));
    scores
        .iter()
        .map(|s| {
            s.map(|v| {
                // `present` is descending: the rank is one past the number of
                // strictly higher scores.
                present.partition_point(|p| *p > v) + 1
            })
        })
        .collect()
}

fn cohort<'a>(ctx: &'a AppContext, stage: Stage, component: Component, edition: Option<&str>) -> Vec<&'a Record> {
    let mut predicates = Predicates::new()
        .with(Column::Stage, stage.label())
        .with(Column::Component, component.label());
    if let Some(edition) = edition {
        predicates = predicates.with(Column::Edition, edition);
    }
    filter(ctx.dataset_for(stage), &predicates)
}

/// Every school of one stage/component/edition, best first, with its ordinal
/// position.
pub fn classification(
    ctx: &AppContext,
    stage: Stage,
    component: Component,
    edition: &str,
) -> Vec<ClassificationRow> {
    let rows: Vec<&Record> = cohort(ctx, stage, component, Some(edition))
        .into_iter()
        .filter(|r| r.score.is_some())
        .collect();
    let ranks = rank_min_desc(&rows.iter().map(|r| r.score).collect::<Vec<_>>());

    let mut ranked: Vec<(usize, ClassificationRow)> = rows
        .iter()
        .zip(ranks)
        .filter_map(|(r, rank)| {
            let (rank, score) = (rank?, r.score?);
            Some((
                rank,
                ClassificationRow {
                    ord: ordinal(rank),
                    school: r.school.clone(),
                    stage: r.stage.label().to_string(),
                    score,
                    component: r.component.label().to_string(),
                    edition: r.edition.clone(),
                },
            ))
        })
        .collect();
    // Stable sort keeps source order among ties.
    ranked.sort_by(|a, b| a.0.cmp(&b.0));
    debug!(stage = %stage, component = %component, edition, rows = ranked.len(), "classification");
    ranked.into_iter().map(|(_, row)| row).collect()
}

/// Position of one school within its cohort, for every edition it took part in.
pub fn school_positions(
    ctx: &AppContext,
    school: &str,
    stage: Stage,
    component: Component,
) -> Vec<SchoolPositionRow> {
    let mut by_edition: BTreeMap<&str, Vec<&Record>> = BTreeMap::new();
    for r in cohort(ctx, stage, component, None) {
        if r.score.is_some() {
            by_edition.entry(r.edition.as_str()).or_default().push(r);
        }
    }

    let mut rows = Vec::new();
    for (edition, members) in by_edition {
        let ranks = rank_min_desc(&members.iter().map(|r| r.score).collect::<Vec<_>>());
        let found = members
            .iter()
            .zip(ranks)
            .find(|(r, _)| r.school == school);
        if let Some((r, Some(rank))) = found {
            rows.push(SchoolPositionRow {
                edition: edition.to_string(),
                school: r.school.clone(),
                stage: r.stage.label().to_string(),
                component: r.component.label().to_string(),
                score: r.score.unwrap_or_default(),
                position: ordinal(rank),
            });
        }
    }
    rows
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Variation {
    pub difference: f64,
    /// Undefined when the previous score is zero.
    pub percent: Option<f64>,
}

/// Change of each entry against the one before it. The first entry has no
/// predecessor and yields `None`, never a zero change.
pub fn period_variation(series: &[f64]) -> Vec<Option<Variation>> {
    let mut out = Vec::with_capacity(series.len());
    for (i, value) in series.iter().enumerate() {
        if i == 0 {
            out.push(None);
            continue;
        }
        let prev = series[i - 1];
        let difference = value - prev;
        let percent = if prev == 0.0 {
            None
        } else {
            Some(difference * 100.0 / prev)
        };
        out.push(Some(Variation { difference, percent }));
    }
    out
}

/// Edition-over-edition table for one school's series in one component.
///
/// Scores are truncated to whole points before differencing, matching the
/// approximate values the dashboard displays. Duplicate editions keep the
/// first row.
pub fn variation_table(records: &[&Record]) -> Vec<VariationRow> {
    let mut series: BTreeMap<&str, &Record> = BTreeMap::new();
    for r in records.iter().copied().filter(|r| r.score.is_some()) {
        if series.contains_key(r.edition.as_str()) {
            warn!(school = %r.school, edition = %r.edition, "duplicate edition; keeping first row");
            continue;
        }
        series.insert(r.edition.as_str(), r);
    }

    let entries: Vec<(&str, &Record, i64)> = series
        .into_iter()
        .map(|(edition, r)| (edition, r, r.score.unwrap_or_default().trunc() as i64))
        .collect();
    let scores: Vec<f64> = entries.iter().map(|(_, _, s)| *s as f64).collect();
    let variations = period_variation(&scores);

    entries
        .iter()
        .zip(variations)
        .enumerate()
        .map(|(i, ((edition, r, score), variation))| {
            let period = if i == 0 {
                NOT_APPLICABLE.to_string()
            } else {
                format!("{}-{}", edition, entries[i - 1].0)
            };
            VariationRow {
                school: r.school.clone(),
                edition: edition.to_string(),
                period,
                score: *score,
                difference: variation
                    .map(|v| format_signed(v.difference, ""))
                    .unwrap_or_else(|| NOT_APPLICABLE.to_string()),
                percent: format_signed_opt(variation.and_then(|v| v.percent), "%"),
            }
        })
        .collect()
}
