use crate::context::AppContext;
use crate::distribution::{level_distribution, score_series};
use crate::filter::{filter, Column, Predicates};
use crate::ranking::variation_table;
use crate::style::{label_text_color, level_colors, ColorToken};
use crate::types::{Component, EditionDistribution, Record, Stage, VariationRow};
use serde::Serialize;

/// Everything the school view shows for one component.
#[derive(Debug, Clone, Serialize)]
pub struct ComponentSection {
    pub component: Component,
    /// Bar chart: average score per edition.
    pub series: Vec<(String, f64)>,
    /// Stacked bars: level shares per edition.
    pub distribution: Vec<EditionDistribution>,
    pub level_colors: Vec<ColorToken>,
    /// Percentage label colour over each segment.
    pub label_colors: Vec<ColorToken>,
    pub variation: Vec<VariationRow>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SchoolDashboard {
    pub municipality: String,
    pub school: String,
    pub stage: Stage,
    pub rows: usize,
    /// Components with at least one row, Portuguese first.
    pub sections: Vec<ComponentSection>,
}

/// One pass of the school view: filter by municipality/school/stage, then
/// build the charts and variation table for each component.
///
/// `None` when the selection matches no rows.
pub fn school_dashboard(
    ctx: &AppContext,
    municipality: &str,
    school: &str,
    stage: Stage,
) -> Option<SchoolDashboard> {
    let predicates = Predicates::new()
        .with(Column::Municipality, municipality)
        .with(Column::School, school)
        .with(Column::Stage, stage.label());
    let selected = filter(ctx.dataset_for(stage), &predicates);
    if selected.is_empty() {
        return None;
    }

    let sections = Component::ALL
        .iter()
        .filter_map(|component| {
            let rows: Vec<&Record> = selected
                .iter()
                .copied()
                .filter(|r| r.component == *component)
                .collect();
            if rows.is_empty() {
                return None;
            }
            Some(ComponentSection {
                component: *component,
                series: score_series(&rows),
                distribution: level_distribution(&rows, stage),
                level_colors: level_colors(stage).to_vec(),
                label_colors: level_colors(stage).iter().map(|c| label_text_color(*c)).collect(),
                variation: variation_table(&rows),
            })
        })
        .collect();

    Some(SchoolDashboard {
        municipality: municipality.to_string(),
        school: school.to_string(),
        stage,
        rows: selected.len(),
        sections,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{record, with_levels};
    use crate::types::Dataset;

    fn ctx() -> AppContext {
        let alfa = Dataset::new(
            "alfa",
            vec![],
            vec![
                with_levels(
                    record("CRATO", "EEF A", Stage::Second, Component::Portuguese, "2019", Some(180.0)),
                    &[("DESEJAVEL", 3.0), ("SUFICIENTE", 1.0)],
                ),
                record("CRATO", "EEF A", Stage::Second, Component::Portuguese, "2018", Some(170.0)),
                record("CRATO", "EEF B", Stage::Second, Component::Portuguese, "2019", Some(150.0)),
            ],
        );
        AppContext::new(Dataset::default(), alfa)
    }

    #[test]
    fn builds_sections_for_present_components_only() {
        let view = school_dashboard(&ctx(), "CRATO", "EEF A", Stage::Second).unwrap();
        assert_eq!(view.rows, 2);
        assert_eq!(view.sections.len(), 1);
        let lp = &view.sections[0];
        assert_eq!(lp.component, Component::Portuguese);
        assert_eq!(lp.series.len(), 2);
        assert_eq!(lp.variation[1].difference, "+10.0");
        assert_eq!(lp.distribution[1].shares[4].1, Some(75.0));
        assert_eq!(lp.level_colors.len(), 5);
        assert_eq!(lp.label_colors[0], ColorToken::White);
        assert_eq!(lp.label_colors[2], ColorToken::Black);
    }

    #[test]
    fn empty_selection_is_none() {
        assert!(school_dashboard(&ctx(), "CRATO", "EEF A", Stage::Fifth).is_none());
        assert!(school_dashboard(&ctx(), "SOBRAL", "EEF A", Stage::Second).is_none());
    }
}
