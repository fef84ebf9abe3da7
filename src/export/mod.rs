//! PDF export through an ordered chain of converters.
//!
//! Each [`ExportStrategy`] is probed and, if its backend is present, asked to convert the static
//! HTML document. The first success ends the chain. A strategy that is missing its backend or
//! fails is recorded and the next one is tried, so the chain itself never errors: when nothing
//! works the [`ExportReport`] is `Exhausted` and carries instructions for a manual conversion.

mod capabilities;
mod process;
mod strategies;

use std::fmt;
use std::path::{Path, PathBuf};

use log::{info, warn};

pub use capabilities::{find_on_path, Capabilities};
pub use process::{run_with_timeout, verify_output};
pub use strategies::{
    build_strategies, BrowserStrategy, GenpdfStrategy, PlainTextStrategy, WkhtmltopdfStrategy,
};

/// Whether a strategy's backend can be used on this host.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Probe {
    Available,
    /// The backend is missing. Carries a human-readable reason.
    Unavailable(String),
}

/// A single way of turning the static document into a PDF.
pub trait ExportStrategy {
    /// Short identifier used in logs and reports.
    fn name(&self) -> &str;

    /// Checks for the backend without touching the document.
    fn probe(&self) -> Probe;

    /// Converts `source` into `target`. The error is a human-readable reason.
    fn attempt(&self, source: &Path, target: &Path) -> Result<(), String>;
}

/// Result of one strategy in one chain run.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AttemptOutcome {
    Succeeded,
    Failed(String),
    NotApplicable(String),
}

impl fmt::Display for AttemptOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Succeeded => write!(f, "succeeded"),
            Self::Failed(reason) => write!(f, "failed: {reason}"),
            Self::NotApplicable(reason) => write!(f, "not applicable: {reason}"),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Attempt {
    pub strategy: String,
    pub outcome: AttemptOutcome,
}

/// Progress of a chain run. `Pending` only exists while strategies remain.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ChainState {
    Pending,
    Succeeded(String),
    Exhausted,
}

/// Everything a chain run did, in order.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExportReport {
    pub attempts: Vec<Attempt>,
    pub state: ChainState,
    pub target: PathBuf,
    /// Set only when the chain is exhausted.
    pub instructions: Option<String>,
}

impl ExportReport {
    pub fn succeeded(&self) -> bool {
        matches!(self.state, ChainState::Succeeded(_))
    }

    /// Name of the strategy that produced the PDF.
    pub fn strategy(&self) -> Option<&str> {
        match &self.state {
            ChainState::Succeeded(name) => Some(name),
            _ => None,
        }
    }
}

impl fmt::Display for ExportReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for attempt in &self.attempts {
            writeln!(f, "  {:<12} {}", attempt.strategy, attempt.outcome)?;
        }
        match &self.state {
            ChainState::Succeeded(name) => {
                write!(f, "PDF created using {name}: {}", self.target.display())
            }
            ChainState::Pending => write!(f, "Export did not run"),
            ChainState::Exhausted => {
                writeln!(f, "Could not create the PDF automatically.")?;
                write!(f, "{}", self.instructions.as_deref().unwrap_or_default())
            }
        }
    }
}

/// Steps for converting the document by hand.
pub fn manual_instructions(source: &Path, target: &Path) -> String {
    format!(
        "You can convert the HTML file to PDF manually:\n\
         1. Open {} in a browser\n\
         2. Use the browser's print function (Ctrl+P or Cmd+P)\n\
         3. Select 'Save as PDF' as the destination and save it as {}",
        source.display(),
        target.display()
    )
}

/// Ordered list of strategies tried until one succeeds.
pub struct ExportChain {
    strategies: Vec<Box<dyn ExportStrategy>>,
}

impl ExportChain {
    pub fn new(strategies: Vec<Box<dyn ExportStrategy>>) -> Self {
        Self { strategies }
    }

    /// Strategy names in the order they will be tried.
    pub fn names(&self) -> Vec<&str> {
        self.strategies.iter().map(|strategy| strategy.name()).collect()
    }

    /// Tries each strategy at most once, stopping at the first success.
    pub fn run(&self, source: &Path, target: &Path) -> ExportReport {
        let mut attempts = Vec::with_capacity(self.strategies.len());
        let mut state = ChainState::Pending;

        for strategy in &self.strategies {
            let name = strategy.name().to_string();
            let outcome = match strategy.probe() {
                Probe::Unavailable(reason) => {
                    info!("Skipping {name}: {reason}");
                    AttemptOutcome::NotApplicable(reason)
                }
                Probe::Available => {
                    remove_stale(target);
                    match strategy.attempt(source, target) {
                        Ok(()) => {
                            info!("PDF created using {name}: {}", target.display());
                            AttemptOutcome::Succeeded
                        }
                        Err(reason) => {
                            warn!("Error creating PDF with {name}: {reason}");
                            AttemptOutcome::Failed(reason)
                        }
                    }
                }
            };

            let done = outcome == AttemptOutcome::Succeeded;
            attempts.push(Attempt {
                strategy: name.clone(),
                outcome,
            });
            if done {
                state = ChainState::Succeeded(name);
                break;
            }
        }

        let instructions = if state == ChainState::Pending {
            state = ChainState::Exhausted;
            warn!("Could not create PDF automatically; every export strategy was exhausted");
            Some(manual_instructions(source, target))
        } else {
            None
        };

        ExportReport {
            attempts,
            state,
            target: target.to_path_buf(),
            instructions,
        }
    }
}

/// A previous run's PDF must not be mistaken for this attempt's output.
fn remove_stale(target: &Path) {
    if target.is_file() {
        if let Err(err) = std::fs::remove_file(target) {
            warn!("Could not remove stale {}: {err}", target.display());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Fixed(&'static str, Probe, Result<(), String>);

    impl ExportStrategy for Fixed {
        fn name(&self) -> &str {
            self.0
        }

        fn probe(&self) -> Probe {
            self.1.clone()
        }

        fn attempt(&self, _source: &Path, _target: &Path) -> Result<(), String> {
            self.2.clone()
        }
    }

    #[test]
    fn empty_chain_is_exhausted() {
        let report = ExportChain::new(Vec::new()).run(Path::new("in.html"), Path::new("out.pdf"));
        assert!(report.attempts.is_empty());
        assert_eq!(report.state, ChainState::Exhausted);
        assert!(report.instructions.is_some());
    }

    #[test]
    fn success_is_reported_by_name() {
        let chain = ExportChain::new(vec![Box::new(Fixed("only", Probe::Available, Ok(())))]);
        let report = chain.run(Path::new("in.html"), Path::new("/nonexistent/out.pdf"));
        assert!(report.succeeded());
        assert_eq!(report.strategy(), Some("only"));
        assert!(report.instructions.is_none());
        assert!(report.to_string().contains("PDF created using only"));
    }

    #[test]
    fn instructions_name_both_files() {
        let text = manual_instructions(Path::new("run/report_static.html"), Path::new("run/technical_report.pdf"));
        assert!(text.contains("run/report_static.html"));
        assert!(text.contains("Ctrl+P or Cmd+P"));
        assert!(text.contains("Save as PDF"));
        assert!(text.contains("run/technical_report.pdf"));
    }
}
