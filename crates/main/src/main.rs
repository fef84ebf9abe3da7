use std::error::Error;
use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};
use log::info;
use tech_report::export::ExportReport;
use tech_report::pipeline::{self, RenderMode};
use tech_report::{ReportError, RunConfig};

/// Generates figures and tables, assembles the HTML report and exports it to PDF.
///
/// Every file is read from and written to the run directory. A `report.toml` found there is
/// loaded first and the flags below override it.
#[derive(Parser)]
#[command(author, version, about = "Technical report generator")]
struct Cli {
    #[command(flatten)]
    options: RunOptions,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct RunOptions {
    /// Directory holding the template, artifacts and outputs. Defaults to the current directory.
    #[arg(long, global = true)]
    run_dir: Option<PathBuf>,

    /// Configuration file. Defaults to `report.toml` in the run directory.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Seed for the synthetic data.
    #[arg(long, global = true)]
    seed: Option<u64>,

    /// Rendering mode for generated figures.
    #[arg(long, global = true, value_enum, default_value_t = ModeArg::Text)]
    mode: ModeArg,

    /// Timeout in seconds for each external converter.
    #[arg(long, global = true)]
    timeout_secs: Option<u64>,
}

#[derive(Clone, Copy, ValueEnum)]
enum ModeArg {
    /// ASCII plots and pipe tables.
    Text,
    /// PNG figures with CSV and LaTeX tables.
    Graphical,
}

impl From<ModeArg> for RenderMode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::Text => RenderMode::Text,
            ModeArg::Graphical => RenderMode::Graphical,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Synthesize data and render the figures, tables and `report.md`.
    Generate,

    /// Substitute the text artifacts into `report.html`, writing `report_static.html`.
    Assemble,

    /// Convert `report_static.html` to `technical_report.pdf`.
    Export,

    /// Generate, assemble and export.
    #[command(aliases = ["run-all", "all"])]
    Run,
}

impl RunOptions {
    fn load(&self) -> Result<RunConfig, ReportError> {
        let mut config = match &self.config {
            Some(path) => {
                if !path.is_file() {
                    return Err(ReportError::Config(format!(
                        "configuration file {} not found",
                        path.display()
                    )));
                }
                let mut config = RunConfig::load_from(path)?;
                if let Some(run_dir) = &self.run_dir {
                    config.run_dir = run_dir.clone();
                }
                config
            }
            None => RunConfig::discover(self.run_dir.clone().unwrap_or_else(|| PathBuf::from(".")))?,
        };

        if let Some(seed) = self.seed {
            config.seed = Some(seed);
        }
        if let Some(timeout) = self.timeout_secs {
            config.export.timeout_secs = timeout;
        }
        config.validate()?;
        Ok(config)
    }
}

fn print_export(report: &ExportReport) {
    println!("{report}");
}

fn run(cli: Cli) -> Result<(), ReportError> {
    let config = cli.options.load()?;
    let mode = RenderMode::from(cli.options.mode);

    match cli.command {
        Commands::Generate => {
            let generated = pipeline::generate(&config, mode)?;
            for file in &generated.files {
                println!("Wrote {}", file.display());
            }
        }
        Commands::Assemble => {
            let path = pipeline::assemble(&config)?;
            println!("Created static HTML file: {}", path.display());
        }
        Commands::Export => print_export(&pipeline::export(&config)?),
        Commands::Run => {
            let summary = pipeline::run_all(&config, mode)?;
            let written: usize = summary.generated.iter().map(|g| g.files.len()).sum();
            info!("Run finished after writing {written} artifacts");
            println!("Created static HTML file: {}", summary.static_document.display());
            print_export(&summary.export);
        }
    }
    Ok(())
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    if let Err(err) = run(cli) {
        eprintln!("Error: {}", err);
        print_error_sources(&err);
        std::process::exit(1);
    }
}

fn print_error_sources(mut error: &(dyn Error + 'static)) {
    while let Some(source) = error.source() {
        eprintln!("  caused by: {}", source);
        error = source;
    }
}
