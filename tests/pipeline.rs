use std::fs;
use std::path::Path;

use tech_report::config::StrategyKind;
use tech_report::export::{AttemptOutcome, ChainState};
use tech_report::pipeline::{self, RenderMode};
use tech_report::RunConfig;

fn config_in(dir: &Path) -> RunConfig {
    let mut config = RunConfig::new(dir);
    config.seed = Some(42);
    config.report_date = chrono::NaiveDate::from_ymd_opt(2025, 4, 30);
    config
}

#[test]
fn text_run_without_converters_ends_with_instructions() {
    let dir = tempfile::tempdir().expect("tempdir");
    let mut config = config_in(dir.path());
    config.export.strategies.clear();

    let summary = pipeline::run_all(&config, RenderMode::Text).expect("run");

    for name in [
        "time_series.txt",
        "error_map.txt",
        "statistics_table.txt",
        "statistics_table.tex",
    ] {
        assert!(config.figure_path(name).is_file(), "{name} missing");
    }
    assert!(config.markdown_report_path().is_file());
    assert!(config.template_path().is_file());

    let document = fs::read_to_string(&summary.static_document).expect("static document");
    assert!(document.contains("Legend: o = Observations, x = Model"));
    assert!(document.contains("<tr><td>North</td>"));
    assert!(!document.contains("<script>"));

    assert_eq!(summary.export.state, ChainState::Exhausted);
    assert!(summary.export.instructions.is_some());
    assert!(!config.pdf_path().exists());
}

#[test]
fn graphical_run_also_writes_text_artifacts() {
    let dir = tempfile::tempdir().expect("tempdir");
    let mut config = config_in(dir.path());
    config.synth.graphical_days = 60;
    config.export.strategies.clear();

    let summary = pipeline::run_all(&config, RenderMode::Graphical).expect("run");
    let modes: Vec<RenderMode> = summary.generated.iter().map(|g| g.mode).collect();
    assert_eq!(modes, vec![RenderMode::Text, RenderMode::Graphical]);

    for name in ["time_series.png", "error_map.png", "statistics.csv", "time_series.txt"] {
        assert!(config.figure_path(name).is_file(), "{name} missing");
    }
    let png = image::open(config.figure_path("error_map.png")).expect("decode png");
    assert!(png.to_rgb8().width() > 0);

    let markdown = fs::read_to_string(config.markdown_report_path()).expect("report.md");
    assert!(markdown.contains("(figures/time_series.png)"));
    assert!(markdown.contains("[figures/statistics.csv](figures/statistics.csv)"));
}

#[test]
fn seed_reproduces_statistics() {
    let first = tempfile::tempdir().expect("tempdir");
    let second = tempfile::tempdir().expect("tempdir");
    let read = |dir: &Path| {
        let config = config_in(dir);
        pipeline::generate(&config, RenderMode::Text).expect("generate");
        fs::read_to_string(config.figure_path("statistics_table.txt")).expect("table")
    };
    assert_eq!(read(first.path()), read(second.path()));
}

#[test]
fn generate_rejects_invalid_configuration() {
    let dir = tempfile::tempdir().expect("tempdir");
    let mut config = config_in(dir.path());
    config.synth.grid_size = 1;
    assert!(pipeline::generate(&config, RenderMode::Text).is_err());
    assert!(!config.figures_dir().exists());
}

#[cfg(unix)]
#[test]
fn external_converter_outcomes() {
    use std::os::unix::fs::PermissionsExt;

    let dir = tempfile::tempdir().expect("tempdir");
    let run_dir = dir.path().join("run");
    let mut config = config_in(&run_dir);
    pipeline::generate(&config, RenderMode::Text).expect("generate");
    pipeline::assemble(&config).expect("assemble");

    let write_script = |name: &str, body: &str| {
        let path = dir.path().join(name);
        fs::write(&path, format!("#!/bin/sh\n{body}\n")).expect("script");
        fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).expect("chmod");
        path
    };
    let converter = write_script("fake-wkhtmltopdf", r#"printf '%%PDF-1.4\n' > "$2""#);
    let silent = write_script("silent-wkhtmltopdf", "exit 0");
    let slow = write_script("slow-wkhtmltopdf", "sleep 10");

    config.export.strategies = vec![StrategyKind::Wkhtmltopdf];
    config.export.timeout_secs = 1;

    config.export.wkhtmltopdf = Some(converter);
    let report = pipeline::export(&config).expect("export");
    assert_eq!(report.state, ChainState::Succeeded("wkhtmltopdf".into()));
    assert!(fs::read(config.pdf_path()).expect("pdf").starts_with(b"%PDF"));

    config.export.wkhtmltopdf = Some(silent);
    let report = pipeline::export(&config).expect("export");
    assert_eq!(report.state, ChainState::Exhausted);
    assert!(matches!(&report.attempts[0].outcome, AttemptOutcome::Failed(reason) if reason.contains("no output")));

    config.export.wkhtmltopdf = Some(slow);
    let report = pipeline::export(&config).expect("export");
    assert!(matches!(&report.attempts[0].outcome, AttemptOutcome::Failed(reason) if reason.contains("timed out")));
}

#[cfg(feature = "plaintext-pdf")]
#[test]
fn plaintext_backend_writes_a_pdf() {
    let dir = tempfile::tempdir().expect("tempdir");
    let mut config = config_in(dir.path());
    config.export.strategies = vec![StrategyKind::Plaintext];

    let summary = pipeline::run_all(&config, RenderMode::Text).expect("run");
    assert_eq!(summary.export.strategy(), Some("plaintext"));

    let document = lopdf::Document::load(config.pdf_path()).expect("load pdf");
    assert!(!document.get_pages().is_empty());
}
