use crate::context::AppContext;
use crate::filter::{filter, Column, Predicates};
use crate::types::{
    BandSummary, Component, QuartileReferenceRow, QuartileRow, Record, SchoolQuartileRow, Stage,
};
use crate::util::{cmp_f64, median, quantile, round2};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use tracing::debug;

/// Quartile band of a score within its cohort, lowest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum Band {
    Q1,
    Q2,
    Q3,
    Q4,
}

impl Band {
    pub const ALL: [Band; 4] = [Band::Q1, Band::Q2, Band::Q3, Band::Q4];

    pub fn label(self) -> &'static str {
        match self {
            Band::Q1 => "Q1 (25% piores)",
            Band::Q2 => "Q2 (25% básicas)",
            Band::Q3 => "Q3 (25% intermediárias)",
            Band::Q4 => "Q4 (25% melhores)",
        }
    }

    /// `"Q1"`..`"Q4"`, used where the column is too narrow for the label.
    pub fn short(self) -> &'static str {
        match self {
            Band::Q1 => "Q1",
            Band::Q2 => "Q2",
            Band::Q3 => "Q3",
            Band::Q4 => "Q4",
        }
    }

    pub fn from_label(label: &str) -> Option<Band> {
        Band::ALL.into_iter().find(|b| label.starts_with(b.short()))
    }
}

impl fmt::Display for Band {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Quartiles {
    pub q1: f64,
    pub q2: f64,
    pub q3: f64,
}

impl Quartiles {
    /// 25th/50th/75th percentiles of the finite scores, `None` when there
    /// are none.
    pub fn from_scores(scores: &[f64]) -> Option<Self> {
        let mut sorted: Vec<f64> = scores.iter().copied().filter(|v| v.is_finite()).collect();
        sorted.sort_by(cmp_f64);
        Some(Self {
            q1: quantile(&sorted, 0.25)?,
            q2: quantile(&sorted, 0.5)?,
            q3: quantile(&sorted, 0.75)?,
        })
    }

    /// Upper bounds are inclusive: a score equal to Q1 is in the lowest band.
    pub fn classify(&self, score: f64) -> Band {
        if score <= self.q1 {
            Band::Q1
        } else if score <= self.q2 {
            Band::Q2
        } else if score <= self.q3 {
            Band::Q3
        } else {
            Band::Q4
        }
    }

    pub fn interval(&self, band: Band) -> String {
        match band {
            Band::Q1 => format!("≤ {:.1}", self.q1),
            Band::Q2 => format!("{:.1} - {:.1}", self.q1, self.q2),
            Band::Q3 => format!("{:.1} - {:.1}", self.q2, self.q3),
            Band::Q4 => format!("> {:.1}", self.q3),
        }
    }
}

/// Quartile view of a whole cohort (one stage/component/edition).
#[derive(Debug, Clone, Serialize)]
pub struct CohortQuartiles {
    pub quartiles: Quartiles,
    /// Best first.
    pub rows: Vec<QuartileRow>,
    pub reference: Vec<QuartileReferenceRow>,
    pub boxes: Vec<BandSummary>,
}

fn cohort_scores<'a>(
    ctx: &'a AppContext,
    stage: Stage,
    component: Component,
    edition: &str,
) -> Vec<(&'a Record, f64)> {
    let predicates = Predicates::new()
        .with(Column::Stage, stage.label())
        .with(Column::Component, component.label())
        .with(Column::Edition, edition);
    filter(ctx.dataset_for(stage), &predicates)
        .into_iter()
        .filter_map(|r| r.score.map(|s| (r, s)))
        .collect()
}

/// Classify every school of a cohort into quartile bands.
///
/// Returns `None` when the cohort has no numeric score.
pub fn cohort_quartiles(
    ctx: &AppContext,
    stage: Stage,
    component: Component,
    edition: &str,
) -> Option<CohortQuartiles> {
    let mut members = cohort_scores(ctx, stage, component, edition);
    let scores: Vec<f64> = members.iter().map(|(_, s)| *s).collect();
    let quartiles = Quartiles::from_scores(&scores)?;
    debug!(stage = %stage, component = %component, edition, ?quartiles, "cohort quartiles");

    members.sort_by(|a, b| cmp_f64(&b.1, &a.1));
    let classified: Vec<(Band, f64, &Record)> = members
        .iter()
        .map(|(r, s)| (quartiles.classify(*s), *s, *r))
        .collect();

    let rows = classified
        .iter()
        .map(|(band, score, r)| QuartileRow {
            school: r.school.clone(),
            stage: r.stage.label().to_string(),
            component: r.component.label().to_string(),
            edition: r.edition.clone(),
            score: *score,
            band: band.label().to_string(),
        })
        .collect();

    let reference = Band::ALL
        .iter()
        .map(|band| QuartileReferenceRow {
            band: band.label().to_string(),
            interval: quartiles.interval(*band),
            schools: classified.iter().filter(|(b, _, _)| b == band).count(),
        })
        .collect();

    let boxes = band_summaries(classified.iter().map(|(b, s, _)| (*b, *s)));

    Some(CohortQuartiles {
        quartiles,
        rows,
        reference,
        boxes,
    })
}

/// Per-band count, min, median and max, for box-plot rendering.
pub fn band_summaries(scores: impl Iterator<Item = (Band, f64)>) -> Vec<BandSummary> {
    let mut by_band: BTreeMap<Band, Vec<f64>> = Band::ALL.iter().map(|b| (*b, Vec::new())).collect();
    for (band, score) in scores {
        by_band.entry(band).or_default().push(score);
    }
    by_band
        .into_iter()
        .map(|(band, values)| BandSummary {
            band: band.label().to_string(),
            count: values.len(),
            min: values.iter().copied().min_by(cmp_f64),
            max: values.iter().copied().max_by(cmp_f64),
            median: median(values),
        })
        .collect()
}

/// One school's band in each edition's cohort, ascending by edition.
pub fn school_quartiles(
    ctx: &AppContext,
    school: &str,
    stage: Stage,
    component: Component,
) -> Vec<SchoolQuartileRow> {
    let predicates = Predicates::new()
        .with(Column::School, school)
        .with(Column::Stage, stage.label())
        .with(Column::Component, component.label());
    let own = filter(ctx.dataset_for(stage), &predicates);

    // First row per edition, as the source holds at most one.
    let mut editions: BTreeMap<&str, f64> = BTreeMap::new();
    for r in &own {
        if let Some(score) = r.score {
            editions.entry(r.edition.as_str()).or_insert(score);
        }
    }

    let mut rows = Vec::new();
    for (edition, score) in editions {
        let scores: Vec<f64> = cohort_scores(ctx, stage, component, edition)
            .into_iter()
            .map(|(_, s)| s)
            .collect();
        let Some(q) = Quartiles::from_scores(&scores) else {
            continue;
        };
        rows.push(SchoolQuartileRow {
            school: school.to_string(),
            edition: edition.to_string(),
            score: format!("{:.1}", score),
            band: q.classify(score).label().to_string(),
            q1: format!("{:.1}", round2(q.q1)),
            median: format!("{:.1}", round2(q.q2)),
            q3: format!("{:.1}", round2(q.q3)),
        });
    }
    rows
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::record;
    use crate::types::Dataset;

    fn ctx() -> AppContext {
        let m = Component::Mathematics;
        let spaece = Dataset::new(
            "spaece",
            vec![],
            vec![
                record("X", "EEF A", Stage::Ninth, m, "2019", Some(450.0)),
                record("X", "EEF B", Stage::Ninth, m, "2019", Some(450.0)),
                record("X", "EEF C", Stage::Ninth, m, "2019", Some(500.0)),
                record("X", "EEF D", Stage::Ninth, m, "2019", Some(600.0)),
                record("X", "EEF E", Stage::Ninth, m, "2019", None),
                record("X", "EEF A", Stage::Ninth, m, "2017", Some(310.0)),
                record("X", "EEF B", Stage::Ninth, m, "2017", Some(300.0)),
            ],
        );
        AppContext::new(spaece, Dataset::default())
    }

    #[test]
    fn boundaries_are_inclusive() {
        let q = Quartiles::from_scores(&[10.0, 20.0, 30.0, 40.0, 50.0]).unwrap();
        assert_eq!((q.q1, q.q2, q.q3), (20.0, 30.0, 40.0));
        assert_eq!(q.classify(20.0), Band::Q1);
        assert_eq!(q.classify(20.5), Band::Q2);
        assert_eq!(q.classify(30.0), Band::Q2);
        assert_eq!(q.classify(40.0), Band::Q3);
        assert_eq!(q.classify(40.1), Band::Q4);
    }

    #[test]
    fn four_school_cohort() {
        let q = Quartiles::from_scores(&[450.0, 450.0, 500.0, 600.0]).unwrap();
        assert_eq!(q.q1, 450.0);
        assert_eq!(q.q2, 475.0);
        assert_eq!(q.q3, 525.0);
        assert_eq!(q.classify(450.0), Band::Q1);
        assert_eq!(q.classify(500.0), Band::Q3);
        assert_eq!(q.classify(600.0), Band::Q4);
    }

    #[test]
    fn empty_cohort_has_no_quartiles() {
        assert!(Quartiles::from_scores(&[]).is_none());
        assert!(Quartiles::from_scores(&[f64::NAN]).is_none());
        assert!(cohort_quartiles(&ctx(), Stage::Ninth, Component::Portuguese, "2019").is_none());
    }

    #[test]
    fn cohort_view_drops_missing_scores() {
        let view = cohort_quartiles(&ctx(), Stage::Ninth, Component::Mathematics, "2019").unwrap();
        assert_eq!(view.rows.len(), 4);
        assert_eq!(view.rows[0].school, "EEF D");
        assert_eq!(view.rows[0].band, Band::Q4.label());

        let counts: Vec<usize> = view.reference.iter().map(|r| r.schools).collect();
        assert_eq!(counts, vec![2, 0, 1, 1]);
        assert_eq!(view.reference[0].interval, "≤ 450.0");
        assert_eq!(view.reference[3].interval, "> 525.0");

        assert_eq!(view.boxes[0].median, Some(450.0));
        assert_eq!(view.boxes[1].count, 0);
        assert_eq!(view.boxes[1].median, None);
    }

    #[test]
    fn school_view_follows_each_edition() {
        let rows = school_quartiles(&ctx(), "EEF A", Stage::Ninth, Component::Mathematics);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].edition, "2017");
        assert_eq!(rows[0].band, Band::Q4.label());
        assert_eq!(rows[1].edition, "2019");
        assert_eq!(rows[1].band, Band::Q1.label());
        assert_eq!(rows[1].q3, "525.0");
    }

    #[test]
    fn band_labels_round_trip() {
        for band in Band::ALL {
            assert_eq!(Band::from_label(band.label()), Some(band));
        }
        assert_eq!(Band::from_label("X"), None);
    }
}
