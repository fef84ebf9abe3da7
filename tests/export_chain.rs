use std::cell::Cell;
use std::path::Path;
use std::rc::Rc;

use tech_report::export::{
    AttemptOutcome, ChainState, ExportChain, ExportStrategy, GenpdfStrategy, Probe,
};
use tech_report::fonts;
use tech_report::html;
use tech_report::model::Block;
use tech_report::pipeline::{self, RenderMode};
use tech_report::RunConfig;

/// Scripted strategy that counts how often it was attempted.
struct Scripted {
    name: &'static str,
    probe: Probe,
    result: Result<(), String>,
    writes_output: bool,
    calls: Rc<Cell<usize>>,
}

impl Scripted {
    fn new(name: &'static str, probe: Probe, result: Result<(), String>) -> (Self, Rc<Cell<usize>>) {
        let calls = Rc::new(Cell::new(0));
        let strategy = Self {
            name,
            probe,
            result,
            writes_output: false,
            calls: Rc::clone(&calls),
        };
        (strategy, calls)
    }
}

impl ExportStrategy for Scripted {
    fn name(&self) -> &str {
        self.name
    }

    fn probe(&self) -> Probe {
        self.probe.clone()
    }

    fn attempt(&self, _source: &Path, target: &Path) -> Result<(), String> {
        self.calls.set(self.calls.get() + 1);
        if self.writes_output {
            std::fs::write(target, b"%PDF-1.5").map_err(|err| err.to_string())?;
        }
        self.result.clone()
    }
}

#[test]
fn stops_at_first_success() {
    let dir = tempfile::tempdir().expect("tempdir");
    let source = dir.path().join("report_static.html");
    let target = dir.path().join("technical_report.pdf");

    let (a, a_calls) = Scripted::new("a", Probe::Unavailable("no backend".into()), Ok(()));
    let (b, b_calls) = Scripted::new("b", Probe::Available, Err("converter crashed".into()));
    let (mut c, c_calls) = Scripted::new("c", Probe::Available, Ok(()));
    c.writes_output = true;
    let (d, d_calls) = Scripted::new("d", Probe::Available, Ok(()));

    let chain = ExportChain::new(vec![Box::new(a), Box::new(b), Box::new(c), Box::new(d)]);
    assert_eq!(chain.names(), vec!["a", "b", "c", "d"]);
    let report = chain.run(&source, &target);

    let outcomes: Vec<(&str, &AttemptOutcome)> = report
        .attempts
        .iter()
        .map(|attempt| (attempt.strategy.as_str(), &attempt.outcome))
        .collect();
    assert_eq!(
        outcomes,
        vec![
            ("a", &AttemptOutcome::NotApplicable("no backend".into())),
            ("b", &AttemptOutcome::Failed("converter crashed".into())),
            ("c", &AttemptOutcome::Succeeded),
        ]
    );
    assert_eq!(report.state, ChainState::Succeeded("c".into()));
    assert!(report.instructions.is_none());

    assert_eq!(a_calls.get(), 0, "unavailable strategies are never attempted");
    assert_eq!(b_calls.get(), 1);
    assert_eq!(c_calls.get(), 1);
    assert_eq!(d_calls.get(), 0);
    assert!(target.is_file());
}

#[test]
fn exhausted_chain_gives_manual_instructions() {
    let dir = tempfile::tempdir().expect("tempdir");
    let source = dir.path().join("report_static.html");
    let target = dir.path().join("technical_report.pdf");

    let (a, _) = Scripted::new("genpdf", Probe::Unavailable("fonts missing".into()), Ok(()));
    let (b, b_calls) = Scripted::new("wkhtmltopdf", Probe::Available, Err("exit code 1".into()));
    let (c, c_calls) = Scripted::new("chrome", Probe::Available, Err("timed out".into()));

    let report = ExportChain::new(vec![Box::new(a), Box::new(b), Box::new(c)]).run(&source, &target);

    assert_eq!(report.state, ChainState::Exhausted);
    assert_eq!(report.attempts.len(), 3);
    assert!(report
        .attempts
        .iter()
        .all(|attempt| attempt.outcome != AttemptOutcome::Succeeded));
    assert_eq!(b_calls.get(), 1);
    assert_eq!(c_calls.get(), 1);

    let instructions = report.instructions.as_deref().expect("instructions");
    assert!(instructions.contains("report_static.html"));
    assert!(instructions.contains("Ctrl+P or Cmd+P"));
    assert!(instructions.contains("Save as PDF"));

    let printed = report.to_string();
    assert!(printed.contains("Could not create the PDF automatically."));
    assert!(printed.contains("wkhtmltopdf"));
}

#[test]
fn stale_output_is_removed_before_an_attempt() {
    let dir = tempfile::tempdir().expect("tempdir");
    let source = dir.path().join("report_static.html");
    let target = dir.path().join("technical_report.pdf");
    std::fs::write(&target, b"old pdf").expect("write");

    let (failing, _) = Scripted::new("broken", Probe::Available, Err("no output".into()));
    let report = ExportChain::new(vec![Box::new(failing)]).run(&source, &target);

    assert_eq!(report.state, ChainState::Exhausted);
    assert!(!target.exists());
}

const FIGURE_PAGE: &str = r#"<html><body>
<h1>Technical Analysis Report</h1>
<h2>Spatial Error Analysis</h2>
<p>The map below shows the model error over the domain.</p>
<img src="figures/error_map.png">
<p class="caption">Figure 2: Spatial distribution of model errors</p>
</body></html>"#;

#[test]
fn genpdf_embeds_generated_figures() {
    if !fonts::default_fonts_available(None) {
        eprintln!("Skipping genpdf_embeds_generated_figures: no font family found");
        return;
    }

    let dir = tempfile::tempdir().expect("tempdir");
    let mut config = RunConfig::new(dir.path());
    config.seed = Some(42);
    config.synth.grid_size = 8;
    config.synth.graphical_days = 30;
    pipeline::generate(&config, RenderMode::Graphical).expect("generate");
    assert!(config.figure_path("error_map.png").is_file());

    let source = config.static_document_path();
    std::fs::write(&source, FIGURE_PAGE).expect("write page");

    let document = html::extract_document(FIGURE_PAGE, dir.path());
    let images: Vec<_> = document
        .sections
        .iter()
        .flat_map(|section| section.blocks())
        .filter_map(|block| match block {
            Block::Image(image) => Some(image),
            _ => None,
        })
        .collect();
    assert_eq!(images.len(), 1);
    assert_eq!(images[0].path(), &config.figure_path("error_map.png"));
    assert!(images[0].caption().is_some());

    let strategy = GenpdfStrategy::new(None, true);
    let report = ExportChain::new(vec![Box::new(strategy)]).run(&source, &config.pdf_path());
    assert_eq!(report.state, ChainState::Succeeded("genpdf".into()));
    let with_figure = std::fs::read(config.pdf_path()).expect("pdf");
    assert!(with_figure.starts_with(b"%PDF"));

    std::fs::remove_file(config.figure_path("error_map.png")).expect("remove figure");
    let placeholder_target = dir.path().join("placeholder.pdf");
    let report = ExportChain::new(vec![Box::new(GenpdfStrategy::new(None, true))]).run(&source, &placeholder_target);
    assert_eq!(report.state, ChainState::Succeeded("genpdf".into()));
    let placeholder = std::fs::read(&placeholder_target).expect("pdf");
    assert!(
        with_figure.len() > placeholder.len() + 2_000,
        "embedded figure should carry image data ({} vs {} bytes)",
        with_figure.len(),
        placeholder.len()
    );
}
