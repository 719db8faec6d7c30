use crate::types::{EditionDistribution, Record, Stage};
use std::collections::BTreeMap;
use tracing::warn;

/// Share of students at each proficiency level, per edition.
///
/// Level columns come from `stage`, in display order. Each edition's counts
/// are summed across `records` and divided by that edition's total; an
/// edition whose total is zero reports every share as `None`.
pub fn level_distribution(records: &[&Record], stage: Stage) -> Vec<EditionDistribution> {
    let levels = stage.level_columns();
    let mut sums: BTreeMap<&str, Vec<f64>> = BTreeMap::new();
    for r in records {
        let acc = sums
            .entry(r.edition.as_str())
            .or_insert_with(|| vec![0.0; levels.len()]);
        for (slot, level) in acc.iter_mut().zip(levels) {
            *slot += r.level(level);
        }
    }

    sums.into_iter()
        .map(|(edition, counts)| {
            let total: f64 = counts.iter().sum();
            let shares = levels
                .iter()
                .zip(&counts)
                .map(|(level, count)| {
                    let share = if total > 0.0 {
                        Some(count / total * 100.0)
                    } else {
                        None
                    };
                    (level.to_string(), share)
                })
                .collect();
            if total <= 0.0 {
                warn!(edition, stage = %stage, "no students counted; distribution undefined");
            }
            EditionDistribution {
                edition: edition.to_string(),
                total,
                shares,
            }
        })
        .collect()
}

/// `(edition, score)` pairs in edition order, for the per-edition bar chart.
pub fn score_series(records: &[&Record]) -> Vec<(String, f64)> {
    let mut series: BTreeMap<&str, f64> = BTreeMap::new();
    for r in records {
        if let Some(score) = r.score {
            series.entry(r.edition.as_str()).or_insert(score);
        }
    }
    series.into_iter().map(|(e, s)| (e.to_string(), s)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{record, with_levels};
    use crate::types::{Component, ALFA_LEVELS};

    fn row(edition: &str, counts: [f64; 4]) -> Record {
        let levels: Vec<(&str, f64)> = crate::types::SPAECE_LEVELS.iter().copied().zip(counts).collect();
        with_levels(
            record("X", "EEF A", Stage::Fifth, Component::Portuguese, edition, Some(250.0)),
            &levels,
        )
    }

    #[test]
    fn shares_sum_to_one_hundred() {
        let a = row("2019", [3.0, 7.0, 11.0, 2.0]);
        let b = row("2019", [1.0, 0.0, 4.0, 5.0]);
        let c = row("2017", [1.0, 1.0, 1.0, 0.0]);
        let dist = level_distribution(&[&a, &b, &c], Stage::Fifth);

        assert_eq!(dist.len(), 2);
        assert_eq!(dist[0].edition, "2017");
        assert_eq!(dist[1].total, 34.0);
        for d in &dist {
            let sum: f64 = d.shares.iter().filter_map(|(_, s)| *s).sum();
            assert!((sum - 100.0).abs() < 0.01, "{} sums to {}", d.edition, sum);
        }
        assert_eq!(dist[1].shares[0].0, "MUITO_CRITICO");
        assert!((dist[1].shares[0].1.unwrap() - 4.0 / 34.0 * 100.0).abs() < 1e-9);
    }

    #[test]
    fn zero_total_is_undefined_not_a_panic() {
        let a = row("2021", [0.0; 4]);
        let dist = level_distribution(&[&a], Stage::Fifth);
        assert_eq!(dist[0].total, 0.0);
        assert!(dist[0].shares.iter().all(|(_, s)| s.is_none()));
    }

    #[test]
    fn literacy_stage_uses_five_levels() {
        let r = with_levels(
            record("X", "EEF A", Stage::Second, Component::Portuguese, "2019", None),
            &[("DESEJAVEL", 10.0), ("SUFICIENTE", 10.0)],
        );
        let dist = level_distribution(&[&r], Stage::Second);
        let names: Vec<&str> = dist[0].shares.iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(names, ALFA_LEVELS.to_vec());
        assert_eq!(dist[0].shares[4].1, Some(50.0));
    }

    #[test]
    fn series_is_sorted_by_edition() {
        let a = record("X", "EEF A", Stage::Fifth, Component::Mathematics, "2019", Some(260.0));
        let b = record("X", "EEF A", Stage::Fifth, Component::Mathematics, "2015", Some(240.0));
        let c = record("X", "EEF A", Stage::Fifth, Component::Mathematics, "2017", None);
        assert_eq!(
            score_series(&[&a, &b, &c]),
            vec![("2015".to_string(), 240.0), ("2019".to_string(), 260.0)]
        );
    }
}
