//! Data structures describing the logical content of an exported report.
//!
//! The types in this module are produced by the HTML extractor in [`crate::html`] and consumed by
//! the PDF backends. They avoid referencing the rendering crates directly, so the same document can
//! be typeset with `genpdf` or flattened to monospace text.

use std::fmt::Write as _;
use std::path::PathBuf;

use crate::richtext::Span;
use crate::table::PipeTable;

/// Column at which paragraphs are wrapped when a document is flattened to text.
pub const PLAIN_TEXT_WIDTH: usize = 90;

/// Horizontal placement of a paragraph or image.
///
/// The variants map directly to [`genpdf::Alignment`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum HorizontalAlignment {
    /// Left aligned content.
    #[default]
    Left,
    /// Center aligned content.
    Center,
    /// Right aligned content.
    Right,
}

/// Rich text paragraph carrying inline styling information and alignment metadata.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RichParagraph {
    spans: Vec<Span>,
    alignment: HorizontalAlignment,
}

impl RichParagraph {
    /// Creates a paragraph from the provided spans using left alignment.
    pub fn new(spans: impl Into<Vec<Span>>) -> Self {
        Self {
            spans: spans.into(),
            ..Self::default()
        }
    }

    /// Returns the spans that make up the paragraph.
    pub fn spans(&self) -> &[Span] {
        &self.spans
    }

    /// Returns the configured alignment.
    pub fn alignment(&self) -> HorizontalAlignment {
        self.alignment
    }

    /// Sets the alignment and returns the updated paragraph.
    pub fn with_alignment(mut self, alignment: HorizontalAlignment) -> Self {
        self.alignment = alignment;
        self
    }

    /// Concatenated text of every span, without styling.
    pub fn plain_text(&self) -> String {
        self.spans.iter().map(Span::text).collect()
    }

    /// Whether the paragraph contains no visible text.
    pub fn is_blank(&self) -> bool {
        self.spans.iter().all(|span| span.text().trim().is_empty())
    }
}

/// An image file placed in the document, optionally captioned.
///
/// The width is stored in millimetres to map onto the `genpdf` image scaling API.
#[derive(Clone, Debug, PartialEq)]
pub struct ImageBlock {
    path: PathBuf,
    caption: Option<RichParagraph>,
    alignment: HorizontalAlignment,
    width_mm: Option<f64>,
}

impl ImageBlock {
    /// Creates a new image block for the file at `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            caption: None,
            alignment: HorizontalAlignment::Center,
            width_mm: None,
        }
    }

    pub fn path(&self) -> &PathBuf {
        &self.path
    }

    pub fn caption(&self) -> Option<&RichParagraph> {
        self.caption.as_ref()
    }

    pub fn alignment(&self) -> HorizontalAlignment {
        self.alignment
    }

    /// Returns the requested rendered width in millimetres, if any.
    pub fn width_mm(&self) -> Option<f64> {
        self.width_mm
    }

    /// Sets the caption and returns the updated image block.
    pub fn with_caption(mut self, caption: impl Into<Option<RichParagraph>>) -> Self {
        self.caption = caption.into();
        self
    }

    pub fn set_caption(&mut self, caption: RichParagraph) {
        self.caption = Some(caption);
    }

    /// Constrains the rendered width (in millimetres) and returns the updated block.
    pub fn with_width_mm(mut self, width_mm: impl Into<Option<f64>>) -> Self {
        self.width_mm = width_mm.into();
        self
    }
}

/// Individual content blocks that make up sections and the cover.
#[derive(Clone, Debug, PartialEq)]
pub enum Block {
    /// A heading below section level.
    Heading(String),
    /// Styled paragraph content.
    Paragraph(RichParagraph),
    /// Fixed-width text whose lines and spacing must be kept verbatim.
    Preformatted(String),
    /// Tabular content with a header row.
    Table(PipeTable),
    /// Captioned image content.
    Image(ImageBlock),
}

impl Block {
    /// Convenience helper for building a paragraph block.
    pub fn paragraph(spans: impl Into<Vec<Span>>) -> Self {
        Self::Paragraph(RichParagraph::new(spans))
    }

    fn write_plain(&self, out: &mut String) {
        match self {
            Self::Heading(text) => {
                let _ = writeln!(out, "{text}\n{}\n", "-".repeat(text.chars().count()));
            }
            Self::Paragraph(paragraph) => {
                for line in wrap_words(&paragraph.plain_text(), PLAIN_TEXT_WIDTH) {
                    let _ = writeln!(out, "{line}");
                }
                out.push('\n');
            }
            Self::Preformatted(text) => {
                out.push_str(text);
                if !text.ends_with('\n') {
                    out.push('\n');
                }
                out.push('\n');
            }
            Self::Table(table) => {
                out.push_str(&table.render());
                out.push('\n');
            }
            Self::Image(image) => {
                let _ = writeln!(out, "[image: {}]", image.path().display());
                if let Some(caption) = image.caption() {
                    let _ = writeln!(out, "{}", caption.plain_text());
                }
                out.push('\n');
            }
        }
    }
}

/// Title block shown at the top of the first page.
#[derive(Clone, Debug, PartialEq)]
pub struct Cover {
    title: String,
    blocks: Vec<Block>,
}

impl Cover {
    /// Creates a new cover with the given title.
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            blocks: Vec::new(),
        }
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    /// Returns the content blocks rendered under the title.
    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    /// Appends a block to the cover and returns the updated instance.
    pub fn with_block(mut self, block: Block) -> Self {
        self.blocks.push(block);
        self
    }

    pub(crate) fn push_block(&mut self, block: Block) {
        self.blocks.push(block);
    }

    pub(crate) fn last_block_mut(&mut self) -> Option<&mut Block> {
        self.blocks.last_mut()
    }
}

/// Logical representation of a document section.
#[derive(Clone, Debug, PartialEq)]
pub struct Section {
    title: String,
    blocks: Vec<Block>,
}

impl Section {
    /// Creates a new section with the provided title.
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            blocks: Vec::new(),
        }
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    /// Appends a block and returns the updated section.
    pub fn with_block(mut self, block: Block) -> Self {
        self.blocks.push(block);
        self
    }

    pub(crate) fn push_block(&mut self, block: Block) {
        self.blocks.push(block);
    }

    pub(crate) fn last_block_mut(&mut self) -> Option<&mut Block> {
        self.blocks.last_mut()
    }
}

/// A cover followed by sections, in reading order.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ReportDocument {
    pub cover: Option<Cover>,
    pub sections: Vec<Section>,
}

impl ReportDocument {
    /// Whether the document has neither a cover nor any section.
    pub fn is_empty(&self) -> bool {
        self.cover.is_none() && self.sections.is_empty()
    }

    /// Flattens the document to fixed-width text.
    ///
    /// Paragraphs are wrapped at [`PLAIN_TEXT_WIDTH`]; preformatted blocks and tables keep their
    /// own layout.
    pub fn plain_text(&self) -> String {
        let mut out = String::new();
        if let Some(cover) = &self.cover {
            let _ = writeln!(out, "{}\n{}\n", cover.title(), "=".repeat(cover.title().chars().count()));
            for block in cover.blocks() {
                block.write_plain(&mut out);
            }
        }
        for section in &self.sections {
            let _ = writeln!(out, "{}\n{}\n", section.title(), "=".repeat(section.title().chars().count()));
            for block in section.blocks() {
                block.write_plain(&mut out);
            }
        }
        out
    }
}

/// Greedy word wrap. Words longer than `width` are placed on a line of their own.
pub fn wrap_words(text: &str, width: usize) -> Vec<String> {
    let mut lines = Vec::new();
    let mut current = String::new();
    for word in text.split_whitespace() {
        let needed = if current.is_empty() {
            word.chars().count()
        } else {
            current.chars().count() + 1 + word.chars().count()
        };
        if needed > width && !current.is_empty() {
            lines.push(std::mem::take(&mut current));
        }
        if !current.is_empty() {
            current.push(' ');
        }
        current.push_str(word);
    }
    if !current.is_empty() {
        lines.push(current);
    }
    lines
}
