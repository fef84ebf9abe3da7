//! Run configuration threaded through every pipeline stage.
//!
//! All filesystem locations are derived from [`RunConfig::run_dir`], so the pipeline never depends
//! on the process working directory. Values can be loaded from a TOML file and are then overridden
//! by command line flags.

use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::{self, ReportError, Result};

/// Name of the optional configuration file looked up inside the run directory.
pub const DEFAULT_CONFIG_FILE: &str = "report.toml";

/// Top-level run configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    /// Directory every relative path below is resolved against.
    pub run_dir: PathBuf,
    /// Seed for the random source. `None` draws a fresh seed from the OS.
    pub seed: Option<u64>,
    /// Directory containing the `genpdf` font family. Searched before the bundled locations.
    pub fonts_dir: Option<PathBuf>,
    /// Author printed in the report header.
    pub author: String,
    /// Date printed in the report header. Defaults to today.
    pub report_date: Option<NaiveDate>,
    /// Dataset sizes and names.
    pub synth: SynthConfig,
    /// PDF export settings.
    pub export: ExportConfig,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            run_dir: PathBuf::from("."),
            seed: None,
            fonts_dir: None,
            author: "Eduard Ruzga".to_string(),
            report_date: None,
            synth: SynthConfig::default(),
            export: ExportConfig::default(),
        }
    }
}

/// Sizes of the synthesized datasets.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct SynthConfig {
    /// Number of daily samples in the text-mode time series.
    pub days: usize,
    /// Number of daily samples in the graphical time series.
    pub graphical_days: usize,
    /// Date of the first sample.
    pub start_date: NaiveDate,
    /// Cells per side of the square error grid.
    pub grid_size: usize,
    /// Half-width of the coordinate domain for the graphical error field.
    pub extent: f64,
    /// Number of rows in the ASCII time series plot.
    pub plot_height: usize,
    /// Unit suffix printed on the Y axis.
    pub unit: String,
    /// Region names, one table row each.
    pub regions: Vec<String>,
    /// Metric names and their sampling ranges, one table column each.
    pub metrics: Vec<MetricSpec>,
}

impl Default for SynthConfig {
    fn default() -> Self {
        Self {
            days: 30,
            graphical_days: 365,
            start_date: NaiveDate::from_ymd_opt(2025, 4, 1).unwrap_or_default(),
            grid_size: 20,
            extent: 5.0,
            plot_height: 20,
            unit: "°C".to_string(),
            regions: ["North", "South", "East", "West", "Central"]
                .into_iter()
                .map(String::from)
                .collect(),
            metrics: MetricSpec::defaults(),
        }
    }
}

/// A named metric sampled uniformly from `[low, high]`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MetricSpec {
    pub name: String,
    pub low: f64,
    pub high: f64,
}

impl MetricSpec {
    pub fn new(name: impl Into<String>, low: f64, high: f64) -> Self {
        Self {
            name: name.into(),
            low,
            high,
        }
    }

    /// RMSE, Correlation, Bias and Std Dev with their conventional ranges.
    pub fn defaults() -> Vec<Self> {
        vec![
            Self::new("RMSE", 1.0, 5.0),
            Self::new("Correlation", 0.5, 0.95),
            Self::new("Bias", -2.0, 2.0),
            Self::new("Std Dev", 0.5, 3.0),
        ]
    }
}

/// Identifies one PDF conversion strategy in the export chain.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StrategyKind {
    Genpdf,
    Plaintext,
    Wkhtmltopdf,
    Chrome,
}

/// Settings for the PDF export chain.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportConfig {
    /// Strategies in the order they are attempted.
    pub strategies: Vec<StrategyKind>,
    /// Upper bound for each external converter run, in seconds.
    pub timeout_secs: u64,
    /// Explicit `wkhtmltopdf` executable. When unset the `PATH` is searched.
    pub wkhtmltopdf: Option<PathBuf>,
    /// Browser executables probed in order for headless printing.
    pub browser_paths: Vec<PathBuf>,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            strategies: vec![
                StrategyKind::Genpdf,
                StrategyKind::Plaintext,
                StrategyKind::Wkhtmltopdf,
                StrategyKind::Chrome,
            ],
            timeout_secs: 120,
            wkhtmltopdf: None,
            browser_paths: default_browser_paths(),
        }
    }
}

impl ExportConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

fn default_browser_paths() -> Vec<PathBuf> {
    [
        "/Applications/Google Chrome.app/Contents/MacOS/Google Chrome",
        "/Applications/Chromium.app/Contents/MacOS/Chromium",
        "/usr/bin/google-chrome",
        "/usr/bin/google-chrome-stable",
        "/usr/bin/chromium-browser",
        "/usr/bin/chromium",
        r"C:\Program Files\Google\Chrome\Application\chrome.exe",
        r"C:\Program Files (x86)\Google\Chrome\Application\chrome.exe",
    ]
    .into_iter()
    .map(PathBuf::from)
    .collect()
}

impl RunConfig {
    /// Creates the default configuration rooted at `run_dir`.
    pub fn new(run_dir: impl Into<PathBuf>) -> Self {
        Self {
            run_dir: run_dir.into(),
            ..Self::default()
        }
    }

    /// Loads a configuration from `path`. A missing file yields the defaults.
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = error::read_to_string(path)?;
        let config: RunConfig = toml::from_str(&content)?;
        Ok(config)
    }

    /// Loads `report.toml` from `run_dir` if present and pins the run directory.
    pub fn discover(run_dir: impl Into<PathBuf>) -> Result<Self> {
        let run_dir = run_dir.into();
        let mut config = Self::load_from(&run_dir.join(DEFAULT_CONFIG_FILE))?;
        config.run_dir = run_dir;
        Ok(config)
    }

    /// Checks the invariants the synthesizers and renderers rely on.
    pub fn validate(&self) -> Result<()> {
        let synth = &self.synth;
        if synth.days == 0 || synth.graphical_days == 0 {
            return Err(ReportError::Config(
                "time series must contain at least one sample".into(),
            ));
        }
        if synth.grid_size < 2 {
            return Err(ReportError::Config("grid_size must be at least 2".into()));
        }
        if synth.plot_height < 3 {
            return Err(ReportError::Config("plot_height must be at least 3".into()));
        }
        if synth.regions.is_empty() || synth.metrics.is_empty() {
            return Err(ReportError::Config(
                "statistics table needs at least one region and one metric".into(),
            ));
        }

        let names = synth
            .regions
            .iter()
            .map(String::as_str)
            .chain(synth.metrics.iter().map(|metric| metric.name.as_str()));
        for name in names {
            if name.trim().is_empty() || name != name.trim() || name.contains('|') {
                return Err(ReportError::Config(format!(
                    "table label {name:?} must be non-empty, without surrounding whitespace or '|'"
                )));
            }
        }

        let sampleable = |metric: &&MetricSpec| {
            metric.low.is_finite() && metric.high.is_finite() && metric.low <= metric.high
        };
        if let Some(metric) = synth.metrics.iter().find(|metric| !sampleable(metric)) {
            return Err(ReportError::Config(format!(
                "metric {} needs a finite, non-empty range, got [{}, {}]",
                metric.name, metric.low, metric.high
            )));
        }

        if self.export.timeout_secs == 0 {
            return Err(ReportError::Config(
                "export.timeout_secs must be at least 1".into(),
            ));
        }

        Ok(())
    }

    /// Date shown in report headers.
    pub fn report_date(&self) -> NaiveDate {
        self.report_date
            .unwrap_or_else(|| chrono::Local::now().date_naive())
    }

    pub fn figures_dir(&self) -> PathBuf {
        self.run_dir.join("figures")
    }

    pub fn figure_path(&self, file_name: &str) -> PathBuf {
        self.figures_dir().join(file_name)
    }

    pub fn markdown_report_path(&self) -> PathBuf {
        self.run_dir.join("report.md")
    }

    pub fn template_path(&self) -> PathBuf {
        self.run_dir.join("report.html")
    }

    pub fn static_document_path(&self) -> PathBuf {
        self.run_dir.join("report_static.html")
    }

    pub fn pdf_path(&self) -> PathBuf {
        self.run_dir.join("technical_report.pdf")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_validate() {
        RunConfig::default().validate().expect("defaults are valid");
    }

    #[test]
    fn paths_resolve_against_run_dir() {
        let config = RunConfig::new("/tmp/run");
        assert_eq!(
            config.figure_path("time_series.txt"),
            PathBuf::from("/tmp/run/figures/time_series.txt")
        );
        assert_eq!(
            config.static_document_path(),
            PathBuf::from("/tmp/run/report_static.html")
        );
    }

    #[test]
    fn rejects_pipe_in_region_name() {
        let mut config = RunConfig::default();
        config.synth.regions.push("North|East".into());
        assert!(matches!(config.validate(), Err(ReportError::Config(_))));
    }

    #[test]
    fn rejects_padded_labels() {
        let mut config = RunConfig::default();
        config.synth.regions[0] = " North".into();
        assert!(matches!(config.validate(), Err(ReportError::Config(_))));

        let mut config = RunConfig::default();
        config.synth.metrics[0].name = "RMSE ".into();
        assert!(matches!(config.validate(), Err(ReportError::Config(_))));
    }

    #[test]
    fn rejects_unsampleable_metric_ranges() {
        let config: RunConfig = toml::from_str(
            r#"
            [synth]
            metrics = [{ name = "Bias", low = nan, high = nan }]
            "#,
        )
        .expect("parse config");
        assert!(matches!(config.validate(), Err(ReportError::Config(_))));

        for (low, high) in [(0.0, f64::INFINITY), (f64::NEG_INFINITY, 1.0), (2.0, 1.0)] {
            let mut config = RunConfig::default();
            config.synth.metrics = vec![MetricSpec::new("Bias", low, high)];
            assert!(config.validate().is_err(), "[{low}, {high}] accepted");
        }

        let mut config = RunConfig::default();
        config.synth.metrics = vec![MetricSpec::new("Bias", 1.0, 1.0)];
        config.validate().expect("a single-point range is sampleable");
    }

    #[test]
    fn rejects_zero_timeout() {
        let mut config = RunConfig::default();
        config.export.timeout_secs = 0;
        assert!(matches!(config.validate(), Err(ReportError::Config(_))));
    }

    #[test]
    fn partial_toml_keeps_defaults() {
        let config: RunConfig = toml::from_str(
            r#"
            seed = 42

            [synth]
            days = 10

            [export]
            strategies = ["chrome", "wkhtmltopdf"]
            timeout_secs = 5
            "#,
        )
        .expect("parse config");

        assert_eq!(config.seed, Some(42));
        assert_eq!(config.synth.days, 10);
        assert_eq!(config.synth.grid_size, 20);
        assert_eq!(
            config.export.strategies,
            vec![StrategyKind::Chrome, StrategyKind::Wkhtmltopdf]
        );
        assert_eq!(config.export.timeout(), Duration::from_secs(5));
    }

    #[test]
    fn missing_file_yields_defaults() {
        let config = RunConfig::load_from(Path::new("/definitely/not/here.toml")).expect("load");
        assert_eq!(config.synth.days, 30);
    }
}
