// Command-line front end.
//
// Each subcommand is one interaction of the dashboard: it filters the
// datasets loaded at startup, prints markdown previews of the resulting
// tables and writes the requested CSV/PDF/JSON exports. A dataset that
// fails to load stops the program; an empty selection or a failed export
// is reported and the run continues.
use anyhow::Result;
use chrono::Local;
use clap::{Args, Parser, Subcommand};
use spaece_report::config::Config;
use spaece_report::context::AppContext;
use spaece_report::dashboard::school_dashboard;
use spaece_report::filter;
use spaece_report::output::{self, export_name, output_path};
use spaece_report::quartile::{cohort_quartiles, school_quartiles, Band};
use spaece_report::ranking::{classification, school_positions};
use spaece_report::report::{quartile_report, ranking_report, to_csv_bytes, PdfReport, ReportMeta};
use spaece_report::style::{band_text_color, variation_color};
use spaece_report::types::{Component, Stage};
use spaece_report::util::format_int;
use std::path::PathBuf;
use tracing::{debug, error, warn};
use tracing_subscriber::{fmt, EnvFilter};

const NO_DATA: &str = "Nenhum dado encontrado para os filtros selecionados.";

#[derive(Parser)]
#[command(name = "spaece-report")]
#[command(about = "Proficiency rankings, quartiles and distributions from SPAECE results")]
struct Cli {
    /// Configuration file; created with defaults when missing
    #[arg(short, long, default_value = "config.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Args, Clone)]
struct Selection {
    /// 2º Ano, 5º Ano or 9º Ano (2, 5, 9 also accepted)
    #[arg(short, long)]
    stage: Stage,
    /// LÍNGUA PORTUGUESA or MATEMÁTICA (lp, mt also accepted)
    #[arg(short = 'k', long)]
    component: Component,
}

#[derive(Subcommand)]
enum Command {
    /// List municipalities, schools and editions available for selection
    Options {
        #[arg(short, long)]
        stage: Option<Stage>,
        #[arg(short, long)]
        municipality: Option<String>,
    },
    /// Score series, level distribution and variation for one school
    Dashboard {
        #[arg(short, long)]
        municipality: String,
        #[arg(long)]
        school: String,
        #[arg(short, long)]
        stage: Stage,
    },
    /// Rank every school of one edition
    Classification {
        #[command(flatten)]
        selection: Selection,
        #[arg(short, long)]
        edition: String,
        /// Also write the PDF ranking
        #[arg(long)]
        pdf: bool,
    },
    /// Position of one school in every edition
    SchoolRanking {
        #[command(flatten)]
        selection: Selection,
        #[arg(long)]
        school: String,
    },
    /// Quartile bands for a whole edition, or for one school across editions
    Quartiles {
        #[command(flatten)]
        selection: Selection,
        #[arg(short, long, conflicts_with = "school", required_unless_present = "school")]
        edition: Option<String>,
        #[arg(long)]
        school: Option<String>,
        /// Also write the PDF classification (edition mode only)
        #[arg(long)]
        pdf: bool,
    },
}

/// Shared, read-only state for one run.
struct Session {
    ctx: AppContext,
    config: Config,
}

impl Session {
    fn meta(&self) -> ReportMeta {
        ReportMeta {
            institution: self.config.report_title.clone(),
            source_note: self.config.source_note.clone(),
            generated: Local::now().date_naive(),
        }
    }

    fn export(&self, name: &str, bytes: spaece_report::error::Result<Vec<u8>>) {
        let path = output_path(&self.config.output_directory, name);
        match bytes.and_then(|b| output::write_bytes(&path, &b)) {
            Ok(()) => println!("(exported to {})", path.display()),
            Err(e) => error!(file = name, "export failed: {}", e),
        }
    }

    fn render_pdf(&self, report: &PdfReport) -> spaece_report::error::Result<Vec<u8>> {
        let logo = match &self.config.logo_path {
            Some(path) => match std::fs::read(path) {
                Ok(bytes) => Some(bytes),
                Err(e) => {
                    warn!(path = %path.display(), "logo not available: {}", e);
                    None
                }
            },
            None => None,
        };
        report.render(logo.as_deref())
    }
}

fn handle_options(s: &Session, stage: Option<Stage>, municipality: Option<&str>) {
    let stages: Vec<Stage> = stage.map(|st| vec![st]).unwrap_or_else(|| Stage::ALL.to_vec());
    for stage in stages {
        let ds = s.ctx.dataset_for(stage);
        println!("{} ({})", stage, ds.name);
        println!("  Edições: {}", filter::editions(ds, stage).join(", "));
        match municipality {
            Some(m) => println!("  Escolas em {}: {}", m, filter::schools_in(ds, m).join("; ")),
            None => {
                println!("  Municípios: {}", filter::municipalities(ds).join(", "));
                println!("  Escolas: {}", format_int(filter::schools_for(ds, stage).len()));
            }
        }
    }
    println!("Componentes: {}", Component::ALL.map(|c| c.label()).join(", "));
}

fn handle_dashboard(s: &Session, municipality: &str, school: &str, stage: Stage) {
    let Some(view) = school_dashboard(&s.ctx, municipality, school, stage) else {
        println!("{}\n", NO_DATA);
        return;
    };
    println!("{} - {} ({}): {} rows\n", view.school, view.municipality, view.stage, view.rows);

    for section in &view.sections {
        println!("## {}", section.component);
        for (edition, score) in &section.series {
            println!("  {}  {:>7.0}", edition, score);
        }
        println!();
        for d in &section.distribution {
            let shares: Vec<String> = d
                .shares
                .iter()
                .map(|(level, share)| match share {
                    Some(p) => format!("{} {:.1}%", level, p),
                    None => format!("{} -", level),
                })
                .collect();
            println!("  {}: {}", d.edition, shares.join(" | "));
        }
        output::preview_table(
            "Tabela de Variação por Edição",
            Some("a PROFICIENCIA MEDIA está em valores aproximados"),
            &section.variation,
            section.variation.len(),
        );
        for row in &section.variation {
            debug!(
                edition = %row.edition,
                difference = %variation_color(&row.difference).rgb().hex(),
                percent = %variation_color(&row.percent).rgb().hex(),
                "variation colours"
            );
        }
        let name = export_name(
            "variacao",
            &[school, stage.label(), section.component.label()],
            "csv",
        );
        s.export(&name, to_csv_bytes(&section.variation));
    }

    let name = export_name("dashboard", &[school, stage.label()], "json");
    let path = output_path(&s.config.output_directory, &name);
    if let Err(e) = output::write_json(&path, &view) {
        error!(file = %name, "export failed: {}", e);
    }
}

fn handle_classification(s: &Session, sel: &Selection, edition: &str, pdf: bool) {
    let rows = classification(&s.ctx, sel.stage, sel.component, edition);
    if rows.is_empty() {
        println!("{}\n", NO_DATA);
        return;
    }
    output::preview_table("Classificação por Proficiência Média", None, &rows, 10);

    let parts = [sel.stage.label(), sel.component.label(), edition];
    s.export(&export_name("classificacao", &parts, "csv"), to_csv_bytes(&rows));
    if pdf {
        let report = ranking_report(&rows, edition, &s.meta());
        s.export(&export_name("classificacao", &parts, "pdf"), s.render_pdf(&report));
    }
}

fn handle_school_ranking(s: &Session, sel: &Selection, school: &str) {
    let rows = school_positions(&s.ctx, school, sel.stage, sel.component);
    if rows.is_empty() {
        println!("{}\n", NO_DATA);
        return;
    }
    let title = format!("Classificação da Escola {} em Todas as Edições", school);
    output::preview_table(&title, None, &rows, rows.len());
    let name = export_name(
        "classificacao_escola",
        &[school, sel.stage.label(), sel.component.label()],
        "csv",
    );
    s.export(&name, to_csv_bytes(&rows));
}

fn handle_quartiles(
    s: &Session,
    sel: &Selection,
    edition: Option<&str>,
    school: Option<&str>,
    pdf: bool,
) {
    if let Some(school) = school {
        let rows = school_quartiles(&s.ctx, school, sel.stage, sel.component);
        if rows.is_empty() {
            println!(
                "Nenhum dado encontrado para a escola {} na etapa {}\n",
                school, sel.stage
            );
            return;
        }
        output::preview_table("Evolução por Quartis", None, &rows, rows.len());
        for row in &rows {
            if let Some(band) = Band::from_label(&row.band) {
                debug!(
                    edition = %row.edition,
                    color = %band_text_color(band).rgb().hex(),
                    "band colour"
                );
            }
        }
        s.export(&export_name("quartis_escola", &[school], "csv"), to_csv_bytes(&rows));
        return;
    }

    let Some(edition) = edition else { return };
    let Some(view) = cohort_quartiles(&s.ctx, sel.stage, sel.component, edition) else {
        println!(
            "Nenhum dado encontrado para {} na edição {}\n",
            sel.stage, edition
        );
        return;
    };
    output::preview_table("Classificação por Quartis", None, &view.rows, 10);
    output::preview_table("Valores de Referência dos Quartis", None, &view.reference, 4);
    for b in &view.boxes {
        if let Some(m) = b.median {
            println!("  {}: mediana {:.1} ({} escolas)", b.band, m, b.count);
        }
    }

    let parts = [sel.component.label(), sel.stage.label(), edition];
    s.export(&export_name("quartis", &parts, "csv"), to_csv_bytes(&view.rows));
    let json = output_path(&s.config.output_directory, &export_name("boxplot_quartis", &parts, "json"));
    if let Err(e) = output::write_json(&json, &view.boxes) {
        error!("export failed: {}", e);
    }
    if pdf {
        let report = quartile_report(
            &view.rows,
            sel.component.label(),
            sel.stage.label(),
            edition,
            &s.meta(),
        );
        s.export(&export_name("classificacao_quartis", &parts, "pdf"), s.render_pdf(&report));
    }
}

fn main() -> Result<()> {
    let env = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt::Subscriber::builder().with_env_filter(env).with_target(false).init();

    let cli = Cli::parse();
    let config = Config::load_or_create(&cli.config)?;
    std::fs::create_dir_all(&config.output_directory)?;

    let (ctx, reports) = match AppContext::load(&config) {
        Ok(loaded) => loaded,
        Err(e) => {
            error!("{}", e);
            return Err(e.into());
        }
    };
    for (name, report) in &reports {
        println!(
            "{}: {} rows loaded, {} skipped, {} without score",
            name,
            format_int(report.loaded_rows),
            format_int(report.skipped_rows),
            format_int(report.missing_scores)
        );
    }
    println!();

    let session = Session { ctx, config };
    match &cli.command {
        Command::Options { stage, municipality } => {
            handle_options(&session, *stage, municipality.as_deref())
        }
        Command::Dashboard {
            municipality,
            school,
            stage,
        } => handle_dashboard(&session, municipality, school, *stage),
        Command::Classification {
            selection,
            edition,
            pdf,
        } => handle_classification(&session, selection, edition, *pdf),
        Command::SchoolRanking { selection, school } => {
            handle_school_ranking(&session, selection, school)
        }
        Command::Quartiles {
            selection,
            edition,
            school,
            pdf,
        } => handle_quartiles(
            &session,
            selection,
            edition.as_deref(),
            school.as_deref(),
            *pdf,
        ),
    }
    Ok(())
}
