//! End-to-end stages: generate artifacts, assemble the static document, export it.
//!
//! Every stage reads and writes below [`RunConfig::run_dir`] only.

use std::fmt;
use std::path::{Path, PathBuf};

use log::info;

use crate::assemble;
use crate::ascii;
use crate::config::RunConfig;
use crate::error::{self, ReportError, Result};
use crate::export::{build_strategies, Capabilities, ExportChain, ExportReport};
use crate::graphics::{self, Figure, FigureLabels, LabelFont};
use crate::report::{self, ReportContext, TableArtifacts, TextArtifacts};
use crate::synth;
use crate::table;

pub const TIME_SERIES_TEXT: &str = "time_series.txt";
pub const ERROR_MAP_TEXT: &str = "error_map.txt";
pub const STATISTICS_TEXT: &str = "statistics_table.txt";
pub const STATISTICS_LATEX: &str = "statistics_table.tex";
pub const STATISTICS_CSV: &str = "statistics.csv";
pub const TIME_SERIES_PNG: &str = "time_series.png";
pub const ERROR_MAP_PNG: &str = "error_map.png";

/// Which set of artifacts `generate` produces.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum RenderMode {
    /// ASCII plots and a pipe table, inlined into the narrative report.
    #[default]
    Text,
    /// PNG figures plus CSV and LaTeX tables, linked from the report.
    Graphical,
}

impl fmt::Display for RenderMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text => write!(f, "text"),
            Self::Graphical => write!(f, "graphical"),
        }
    }
}

/// Files written by one `generate` call.
#[derive(Clone, Debug)]
pub struct Generated {
    pub mode: RenderMode,
    pub files: Vec<PathBuf>,
}

/// Outcome of [`run_all`].
#[derive(Clone, Debug)]
pub struct RunSummary {
    pub generated: Vec<Generated>,
    pub static_document: PathBuf,
    pub export: ExportReport,
}

fn write_artifact(files: &mut Vec<PathBuf>, path: PathBuf, contents: &str) -> Result<()> {
    error::write(&path, contents)?;
    files.push(path);
    Ok(())
}

fn report_context(config: &RunConfig) -> ReportContext {
    ReportContext::new(config.author.clone(), config.report_date())
}

/// Synthesizes data for `mode`, renders it into `figures/` and writes `report.md`.
///
/// Also writes the default `report.html` template when the run directory has none.
pub fn generate(config: &RunConfig, mode: RenderMode) -> Result<Generated> {
    config.validate()?;
    error::ensure_dir(&config.figures_dir())?;
    info!("Generating {mode} artifacts in {}", config.figures_dir().display());

    let files = match mode {
        RenderMode::Text => generate_text(config)?,
        RenderMode::Graphical => generate_graphical(config)?,
    };
    assemble::ensure_template(config)?;

    info!("Generated {} files", files.len());
    Ok(Generated { mode, files })
}

fn generate_text(config: &RunConfig) -> Result<Vec<PathBuf>> {
    let synth = &config.synth;
    let data = synth::text_datasets(synth, config.seed)?;
    let artifacts = TextArtifacts {
        time_series: ascii::render_time_series(&data.series, synth.plot_height, &synth.unit),
        error_map: ascii::render_error_map(&data.field),
        statistics_table: ascii::render_statistics_table(&data.statistics),
    };

    let mut files = Vec::new();
    write_artifact(&mut files, config.figure_path(TIME_SERIES_TEXT), &artifacts.time_series)?;
    write_artifact(&mut files, config.figure_path(ERROR_MAP_TEXT), &artifacts.error_map)?;
    write_artifact(&mut files, config.figure_path(STATISTICS_TEXT), &artifacts.statistics_table)?;
    write_artifact(
        &mut files,
        config.figure_path(STATISTICS_LATEX),
        &ascii::render_statistics_latex(&data.statistics),
    )?;

    let markdown = report::narrative_markdown(&report_context(config), &artifacts);
    write_artifact(&mut files, config.markdown_report_path(), &markdown)?;
    Ok(files)
}

fn relative_link(run_dir: &Path, path: &Path) -> String {
    let relative = path.strip_prefix(run_dir).unwrap_or(path);
    relative.to_string_lossy().replace('\\', "/")
}

fn generate_graphical(config: &RunConfig) -> Result<Vec<PathBuf>> {
    let synth = &config.synth;
    let data = synth::graphical_datasets(synth, config.seed)?;
    let mut files = Vec::new();
    let font = LabelFont::load(config.fonts_dir.as_deref());

    let time_series = graphics::render_time_series_chart(
        &data.series,
        FigureLabels::new(
            ascii::TIME_SERIES_TITLE,
            "Date",
            &format!("Temperature ({})", synth.unit),
        ),
        font.as_ref(),
        &config.figure_path(TIME_SERIES_PNG),
    )?;
    files.push(time_series.path.clone());

    let error_map = graphics::render_error_heatmap(
        &data.field,
        FigureLabels::new(ascii::ERROR_MAP_TITLE, "Longitude", "Latitude"),
        font.as_ref(),
        &config.figure_path(ERROR_MAP_PNG),
    )?;
    files.push(error_map.path.clone());

    let csv_path = config.figure_path(STATISTICS_CSV);
    table::write_csv(&data.statistics, &csv_path)?;
    files.push(csv_path.clone());

    let latex_path = config.figure_path(STATISTICS_LATEX);
    write_artifact(
        &mut files,
        latex_path.clone(),
        &table::render_latex(&data.statistics, ascii::STATISTICS_TITLE),
    )?;

    let tables = TableArtifacts {
        csv: relative_link(&config.run_dir, &csv_path),
        latex: relative_link(&config.run_dir, &latex_path),
    };
    let run_dir = config.run_dir.clone();
    let markdown = report::graphical_markdown(
        &report_context(config),
        &time_series,
        &error_map,
        &data.statistics,
        &tables,
        |figure: &Figure| relative_link(&run_dir, &figure.path),
    );
    write_artifact(&mut files, config.markdown_report_path(), &markdown)?;
    Ok(files)
}

/// Substitutes the text artifacts into the template, producing `report_static.html`.
pub fn assemble(config: &RunConfig) -> Result<PathBuf> {
    assemble::assemble(config)
}

/// Runs the configured export chain on `report_static.html`.
///
/// Fails only when the static document does not exist. Every converter failure is folded into
/// the returned report instead.
pub fn export(config: &RunConfig) -> Result<ExportReport> {
    let source = config.static_document_path();
    if !source.is_file() {
        return Err(ReportError::InvalidInput(format!(
            "{} does not exist; run the assemble stage first",
            source.display()
        )));
    }

    let capabilities = Capabilities::detect(config);
    let chain = ExportChain::new(build_strategies(config, &capabilities));
    info!("Exporting with strategies: {}", chain.names().join(", "));
    Ok(chain.run(&source, &config.pdf_path()))
}

/// Generates, assembles and exports in one go.
///
/// The assembler consumes the text artifacts, so they are generated in graphical mode too. The
/// graphical pass runs last and its `report.md` is the one kept.
pub fn run_all(config: &RunConfig, mode: RenderMode) -> Result<RunSummary> {
    let mut generated = vec![generate(config, RenderMode::Text)?];
    if mode == RenderMode::Graphical {
        generated.push(generate(config, RenderMode::Graphical)?);
    }
    let static_document = assemble(config)?;
    let export = export(config)?;
    Ok(RunSummary {
        generated,
        static_document,
        export,
    })
}
