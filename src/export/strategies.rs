//! The concrete converters tried by the export chain.

use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::Duration;

use genpdf::elements::Paragraph;
use genpdf::style::Style;
use genpdf::{Alignment, Element as _, Margins};

use super::capabilities::Capabilities;
use super::process::{run_with_timeout, verify_output};
use super::{ExportStrategy, Probe};
use crate::builder::PdfBuilder;
use crate::config::{RunConfig, StrategyKind};
use crate::html;
use crate::model::ReportDocument;

const FOOTER_HEIGHT_MM: f64 = 10.0;
const HEADER_FONT_SIZE: u8 = 8;

fn read_document(source: &Path) -> Result<ReportDocument, String> {
    let markup = std::fs::read_to_string(source)
        .map_err(|err| format!("cannot read {}: {err}", source.display()))?;
    let base_dir = source.parent().unwrap_or_else(|| Path::new("."));
    let document = html::extract_document(&markup, base_dir);
    if document.is_empty() {
        return Err(format!("{} contains no renderable content", source.display()));
    }
    Ok(document)
}

fn write_pdf(target: &Path, bytes: &[u8]) -> Result<(), String> {
    std::fs::write(target, bytes).map_err(|err| format!("cannot write {}: {err}", target.display()))
}

/// Typesets the static document natively with `genpdf`.
pub struct GenpdfStrategy {
    fonts_dir: Option<PathBuf>,
    fonts_available: bool,
}

impl GenpdfStrategy {
    pub fn new(fonts_dir: Option<PathBuf>, fonts_available: bool) -> Self {
        Self {
            fonts_dir,
            fonts_available,
        }
    }
}

impl ExportStrategy for GenpdfStrategy {
    fn name(&self) -> &str {
        "genpdf"
    }

    fn probe(&self) -> Probe {
        if self.fonts_available {
            Probe::Available
        } else {
            Probe::Unavailable("no usable font family found (set fonts_dir or install DejaVu Sans)".into())
        }
    }

    fn attempt(&self, source: &Path, target: &Path) -> Result<(), String> {
        let document = read_document(source)?;
        let title = document
            .cover
            .as_ref()
            .map(|cover| cover.title().to_string())
            .unwrap_or_else(|| "Technical Report".to_string());

        let rendered = PdfBuilder::new()
            .with_title(title.clone())
            .with_fonts_dir(self.fonts_dir.clone())
            .with_margins(Margins::trbl(12.0, 15.0, 10.0, 15.0))
            .with_header(move |page| {
                let text = if page > 1 { title.clone() } else { String::new() };
                let mut line = Paragraph::new(text);
                line.set_alignment(Alignment::Right);
                line.styled(Style::new().italic().with_font_size(HEADER_FONT_SIZE))
                    .padded(Margins::trbl(0.0, 0.0, 2.0, 0.0))
            })
            .with_footer(FOOTER_HEIGHT_MM, |page| {
                let mut line = Paragraph::new(format!("Page {page}"));
                line.set_alignment(Alignment::Center);
                line.styled(Style::new().with_font_size(HEADER_FONT_SIZE))
            })
            .with_document(document)
            .render()
            .map_err(|err| format!("genpdf rendering failed: {err}"))?;

        write_pdf(target, &rendered.bytes)
    }
}

/// Writes the document as monospace Courier text with `lopdf`.
pub struct PlainTextStrategy {
    compiled_in: bool,
}

impl PlainTextStrategy {
    pub fn new(compiled_in: bool) -> Self {
        Self { compiled_in }
    }
}

impl ExportStrategy for PlainTextStrategy {
    fn name(&self) -> &str {
        "plaintext"
    }

    fn probe(&self) -> Probe {
        if self.compiled_in {
            Probe::Available
        } else {
            Probe::Unavailable("built without the plaintext-pdf feature".into())
        }
    }

    fn attempt(&self, source: &Path, target: &Path) -> Result<(), String> {
        let document = read_document(source)?;
        plaintext::write_text_pdf(&document.plain_text(), target)
    }
}

#[cfg(feature = "plaintext-pdf")]
mod plaintext {
    use std::path::Path;

    use lopdf::content::{Content, Operation};
    use lopdf::{dictionary, Document, Object, ObjectId, Stream, StringFormat};

    const PAGE_WIDTH_PT: i64 = 595;
    const PAGE_HEIGHT_PT: i64 = 842;
    const MARGIN_PT: i64 = 40;
    const FONT_SIZE_PT: i64 = 9;
    const LEADING_PT: i64 = 11;
    const LINES_PER_PAGE: usize = ((PAGE_HEIGHT_PT - 2 * MARGIN_PT) / LEADING_PT) as usize;

    /// WinAnsi covers Latin-1. Anything outside it is replaced.
    fn encode_line(line: &str) -> Vec<u8> {
        line.chars()
            .map(|c| match u32::from(c) {
                code @ 0x20..=0xFF => code as u8,
                _ => b'?',
            })
            .collect()
    }

    fn page_content(lines: &[&str]) -> Result<Vec<u8>, String> {
        let mut operations = vec![
            Operation::new("BT", vec![]),
            Operation::new("Tf", vec!["F1".into(), Object::Integer(FONT_SIZE_PT)]),
            Operation::new("TL", vec![Object::Integer(LEADING_PT)]),
            Operation::new(
                "Td",
                vec![
                    Object::Integer(MARGIN_PT),
                    Object::Integer(PAGE_HEIGHT_PT - MARGIN_PT - FONT_SIZE_PT),
                ],
            ),
        ];
        for (index, line) in lines.iter().enumerate() {
            if index > 0 {
                operations.push(Operation::new("T*", vec![]));
            }
            operations.push(Operation::new(
                "Tj",
                vec![Object::String(encode_line(line), StringFormat::Literal)],
            ));
        }
        operations.push(Operation::new("ET", vec![]));

        Content { operations }
            .encode()
            .map_err(|err| format!("cannot encode page content: {err}"))
    }

    pub(super) fn write_text_pdf(text: &str, target: &Path) -> Result<(), String> {
        let lines: Vec<&str> = text.lines().collect();
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let font_id = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Courier",
            "Encoding" => "WinAnsiEncoding",
        });
        let resources_id = doc.add_object(dictionary! {
            "Font" => dictionary! {
                "F1" => font_id,
            },
        });

        let mut kids: Vec<Object> = Vec::new();
        let chunks: Vec<&[&str]> = if lines.is_empty() {
            vec![&[]]
        } else {
            lines.chunks(LINES_PER_PAGE).collect()
        };
        for chunk in chunks {
            let content_id = doc.add_object(Stream::new(dictionary! {}, page_content(chunk)?));
            let page_id: ObjectId = doc.add_object(dictionary! {
                "Type" => "Page",
                "Parent" => pages_id,
                "Contents" => content_id,
            });
            kids.push(page_id.into());
        }

        let page_count = kids.len() as i64;
        let pages = dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => page_count,
            "Resources" => resources_id,
            "MediaBox" => vec![
                Object::Integer(0),
                Object::Integer(0),
                Object::Integer(PAGE_WIDTH_PT),
                Object::Integer(PAGE_HEIGHT_PT),
            ],
        };
        doc.objects.insert(pages_id, Object::Dictionary(pages));

        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);
        doc.compress();

        doc.save(target)
            .map(|_| ())
            .map_err(|err| format!("cannot write {}: {err}", target.display()))
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        #[test]
        fn non_latin_characters_are_replaced() {
            assert_eq!(encode_line("5°C"), vec![b'5', 0xB0, b'C']);
            assert_eq!(encode_line("• ok"), b"? ok".to_vec());
        }

        #[test]
        fn long_text_spans_pages() {
            let dir = tempfile::tempdir().expect("tempdir");
            let target = dir.path().join("plain.pdf");
            let text = (0..LINES_PER_PAGE * 2 + 1)
                .map(|i| format!("line {i}"))
                .collect::<Vec<_>>()
                .join("\n");
            write_text_pdf(&text, &target).expect("write pdf");

            let doc = Document::load(&target).expect("reload");
            assert_eq!(doc.get_pages().len(), 3);
        }
    }
}

#[cfg(not(feature = "plaintext-pdf"))]
mod plaintext {
    use std::path::Path;

    pub(super) fn write_text_pdf(_text: &str, _target: &Path) -> Result<(), String> {
        Err("built without the plaintext-pdf feature".into())
    }
}

/// Runs `wkhtmltopdf <source> <target>`.
pub struct WkhtmltopdfStrategy {
    executable: Option<PathBuf>,
    timeout: Duration,
}

impl WkhtmltopdfStrategy {
    pub fn new(executable: Option<PathBuf>, timeout: Duration) -> Self {
        Self { executable, timeout }
    }
}

impl ExportStrategy for WkhtmltopdfStrategy {
    fn name(&self) -> &str {
        "wkhtmltopdf"
    }

    fn probe(&self) -> Probe {
        match &self.executable {
            Some(_) => Probe::Available,
            None => Probe::Unavailable("wkhtmltopdf was not found on PATH".into()),
        }
    }

    fn attempt(&self, source: &Path, target: &Path) -> Result<(), String> {
        let executable = self
            .executable
            .as_ref()
            .ok_or_else(|| "wkhtmltopdf was not found on PATH".to_string())?;
        let mut command = Command::new(executable);
        command.arg(source).arg(target);
        run_with_timeout(command, self.timeout)?;
        verify_output(target)
    }
}

/// Prints the document with a headless Chromium-family browser.
pub struct BrowserStrategy {
    executable: Option<PathBuf>,
    timeout: Duration,
}

impl BrowserStrategy {
    pub fn new(executable: Option<PathBuf>, timeout: Duration) -> Self {
        Self { executable, timeout }
    }

    /// Arguments passed to the browser. Both paths are made absolute.
    pub fn arguments(source: &Path, target: &Path) -> Result<Vec<String>, String> {
        let source = absolute(source)?;
        let target = absolute(target)?;
        Ok(vec![
            "--headless".to_string(),
            "--disable-gpu".to_string(),
            format!("--print-to-pdf={}", target.display()),
            format!("file://{}", source.display()),
        ])
    }
}

fn absolute(path: &Path) -> Result<PathBuf, String> {
    if path.is_absolute() {
        return Ok(path.to_path_buf());
    }
    std::env::current_dir()
        .map(|cwd| cwd.join(path))
        .map_err(|err| format!("cannot resolve {}: {err}", path.display()))
}

impl ExportStrategy for BrowserStrategy {
    fn name(&self) -> &str {
        "chrome"
    }

    fn probe(&self) -> Probe {
        match &self.executable {
            Some(_) => Probe::Available,
            None => Probe::Unavailable("no headless-capable browser found at the configured paths".into()),
        }
    }

    fn attempt(&self, source: &Path, target: &Path) -> Result<(), String> {
        let executable = self
            .executable
            .as_ref()
            .ok_or_else(|| "no browser executable configured".to_string())?;
        let mut command = Command::new(executable);
        command.args(Self::arguments(source, target)?);
        run_with_timeout(command, self.timeout)?;
        verify_output(target)
    }
}

/// Instantiates the strategies named in `config.export.strategies`, in that order.
pub fn build_strategies(config: &RunConfig, capabilities: &Capabilities) -> Vec<Box<dyn ExportStrategy>> {
    let timeout = config.export.timeout();
    config
        .export
        .strategies
        .iter()
        .map(|kind| -> Box<dyn ExportStrategy> {
            match kind {
                StrategyKind::Genpdf => Box::new(GenpdfStrategy::new(
                    config.fonts_dir.clone(),
                    capabilities.genpdf_fonts,
                )),
                StrategyKind::Plaintext => Box::new(PlainTextStrategy::new(capabilities.plaintext_pdf)),
                StrategyKind::Wkhtmltopdf => Box::new(WkhtmltopdfStrategy::new(
                    capabilities.wkhtmltopdf.clone(),
                    timeout,
                )),
                StrategyKind::Chrome => Box::new(BrowserStrategy::new(capabilities.browser.clone(), timeout)),
            }
        })
        .collect()
}
