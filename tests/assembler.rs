use std::fs;

use tech_report::assemble::{self, ERROR_MAP_ANCHOR, STATISTICS_ANCHOR, TIME_SERIES_ANCHOR};
use tech_report::report::TextArtifacts;
use tech_report::RunConfig;

fn artifacts() -> TextArtifacts {
    TextArtifacts {
        time_series: "Temperature\n====\n\n 25.0°C | o x\n".into(),
        error_map: "Errors\n====\n\n+o.  #Xx\n".into(),
        statistics_table: "Stats\n=====\n\n| Region | RMSE | Bias  |\n|--------|------|-------|\n| North  | 2.5  | -0.31 |\n".into(),
    }
}

fn run_dir() -> (tempfile::TempDir, RunConfig) {
    let dir = tempfile::tempdir().expect("tempdir");
    let config = RunConfig::new(dir.path());
    fs::create_dir_all(config.figures_dir()).expect("figures dir");
    (dir, config)
}

#[test]
fn assembling_twice_gives_identical_documents() {
    let once = assemble::assemble_str(assemble::DEFAULT_TEMPLATE, &artifacts());
    let twice = assemble::assemble_str(assemble::DEFAULT_TEMPLATE, &artifacts());
    assert_eq!(once, twice);

    assert!(once.contains(r#"<pre id="time-series">Temperature"#));
    assert!(once.contains("<tr><td>North</td><td>2.5</td><td>-0.31</td></tr>"));
    assert!(!once.contains("<script>"));
    assert!(!once.contains("fetch("));
    for anchor in [TIME_SERIES_ANCHOR, ERROR_MAP_ANCHOR, STATISTICS_ANCHOR] {
        assert!(!once.contains(anchor), "{anchor} left in document");
    }
}

#[test]
fn only_the_first_anchor_occurrence_is_filled() {
    let template = format!("<body>{TIME_SERIES_ANCHOR}<hr>{TIME_SERIES_ANCHOR}</body>");
    let out = assemble::assemble_str(&template, &artifacts());
    assert_eq!(out.matches(TIME_SERIES_ANCHOR).count(), 1);
    assert!(out.ends_with(&format!("<hr>{TIME_SERIES_ANCHOR}</body>")));
}

#[test]
fn assemble_reads_run_directory() {
    let (_dir, config) = run_dir();
    assert!(assemble::ensure_template(&config).expect("template"));
    let a = artifacts();
    fs::write(config.figure_path("time_series.txt"), &a.time_series).expect("write");
    fs::write(config.figure_path("error_map.txt"), &a.error_map).expect("write");
    fs::write(config.figure_path("statistics_table.txt"), &a.statistics_table).expect("write");

    let output = assemble::assemble(&config).expect("assemble");
    assert_eq!(output, config.static_document_path());
    let document = fs::read_to_string(&output).expect("read output");
    assert_eq!(document, assemble::assemble_str(assemble::DEFAULT_TEMPLATE, &a));
}

#[test]
fn missing_inputs_degrade_to_empty_content() {
    let (_dir, config) = run_dir();
    fs::write(config.template_path(), format!("<h1>T</h1>{ERROR_MAP_ANCHOR}<script>x</script>"))
        .expect("template");

    let output = assemble::assemble(&config).expect("assemble");
    let document = fs::read_to_string(output).expect("read output");
    assert_eq!(document, format!("<h1>T</h1>{ERROR_MAP_ANCHOR}"));
}

#[test]
fn existing_template_is_not_overwritten() {
    let (_dir, config) = run_dir();
    fs::write(config.template_path(), "custom").expect("template");
    assert!(!assemble::ensure_template(&config).expect("template"));
    assert_eq!(fs::read_to_string(config.template_path()).expect("read"), "custom");
}
