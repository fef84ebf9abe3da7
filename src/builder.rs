//! Typesetting of a [`ReportDocument`] with `genpdf`.

use std::path::PathBuf;

use genpdf::elements::{Break, FrameCellDecorator, LinearLayout, Paragraph, TableLayout, Text};
use genpdf::error::{Error, ErrorKind};
use genpdf::fonts::{Font, FontFamily};
use genpdf::style::{Style, StyledString};
use genpdf::{self, Alignment, Element, Margins, Mm, PageDecorator, Position};
use log::warn;

use crate::elements::CaptionedImage;
use crate::fonts;
use crate::model::{Block, Cover, HorizontalAlignment, ImageBlock, ReportDocument, RichParagraph, Section};
use crate::table::PipeTable;

const BODY_FONT_SIZE: u8 = 10;
const TITLE_FONT_SIZE: u8 = 20;
const SECTION_FONT_SIZE: u8 = 15;
const HEADING_FONT_SIZE: u8 = 12;
const PREFORMATTED_FONT_SIZE: u8 = 7;

type HeaderFactory = dyn Fn(usize) -> Box<dyn Element>;

/// Output of [`PdfBuilder::render`].
#[derive(Clone, Debug)]
pub struct RenderedPdf {
    pub bytes: Vec<u8>,
}

/// Builder that lays out a report document on pages and renders it to PDF bytes.
#[derive(Default)]
pub struct PdfBuilder {
    margins: Option<Margins>,
    header: Option<Box<HeaderFactory>>,
    footer: Option<FooterSpec>,
    title: Option<String>,
    fonts_dir: Option<PathBuf>,
    content: ReportDocument,
}

impl PdfBuilder {
    /// Creates a new builder instance with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the margins applied through the page decorator.
    pub fn with_margins(mut self, margins: impl Into<Margins>) -> Self {
        self.margins = Some(margins.into());
        self
    }

    /// Configures a header callback that is invoked for every page.
    pub fn with_header<F, E>(mut self, header: F) -> Self
    where
        F: Fn(usize) -> E + 'static,
        E: Element + 'static,
    {
        self.header = Some(Box::new(move |page| {
            Box::new(header(page)) as Box<dyn Element>
        }));
        self
    }

    /// Configures a footer callback with a fixed height that is invoked for every page.
    pub fn with_footer<F, E>(mut self, height: impl Into<Mm>, footer: F) -> Self
    where
        F: Fn(usize) -> E + 'static,
        E: Element + 'static,
    {
        self.footer = Some(FooterSpec::new(height, footer));
        self
    }

    /// Sets the PDF document title metadata.
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    /// Directory searched first for font files. See [`crate::fonts`].
    pub fn with_fonts_dir(mut self, fonts_dir: Option<PathBuf>) -> Self {
        self.fonts_dir = fonts_dir;
        self
    }

    /// Replaces the content with `document`.
    pub fn with_document(mut self, document: ReportDocument) -> Self {
        self.content = document;
        self
    }

    /// Sets the cover shown at the top of the first page.
    pub fn with_cover(mut self, cover: Cover) -> Self {
        self.content.cover = Some(cover);
        self
    }

    /// Appends a section after the existing content.
    pub fn add_section(mut self, section: Section) -> Self {
        self.content.sections.push(section);
        self
    }

    /// Loads fonts, lays out the content and renders the PDF into memory.
    pub fn render(self) -> Result<RenderedPdf, Error> {
        let fonts_dir = self.fonts_dir.as_deref();
        let font_family = fonts::default_font_family(fonts_dir)?;
        let mut document = genpdf::Document::new(font_family);
        let monospace = fonts::monospace_font_family(fonts_dir).map(|family| document.add_font_family(family));

        if let Some(title) = &self.title {
            document.set_title(title.clone());
        }
        document.set_font_size(BODY_FONT_SIZE);
        document.set_page_decorator(ConfiguredPageDecorator::new(self.margins, self.header, self.footer));

        let typesetter = Typesetter { monospace };
        if let Some(cover) = &self.content.cover {
            typesetter.push_cover(&mut document, cover)?;
        }
        for section in &self.content.sections {
            typesetter.push_section(&mut document, section)?;
        }

        let mut bytes = Vec::new();
        document.render(&mut bytes)?;
        Ok(RenderedPdf { bytes })
    }
}

fn alignment(alignment: HorizontalAlignment) -> Alignment {
    match alignment {
        HorizontalAlignment::Left => Alignment::Left,
        HorizontalAlignment::Center => Alignment::Center,
        HorizontalAlignment::Right => Alignment::Right,
    }
}

/// Converts a rich paragraph into a `genpdf` paragraph.
pub fn paragraph_element(paragraph: &RichParagraph) -> Paragraph {
    let mut element = Paragraph::default();
    for span in paragraph.spans() {
        element.push(StyledString::from(span));
    }
    element.set_alignment(alignment(paragraph.alignment()));
    element
}

/// Maps content blocks to `genpdf` elements.
struct Typesetter {
    monospace: Option<FontFamily<Font>>,
}

impl Typesetter {
    fn push_cover(&self, document: &mut genpdf::Document, cover: &Cover) -> Result<(), Error> {
        if !cover.title().is_empty() {
            let mut title = Paragraph::new(cover.title());
            title.set_alignment(Alignment::Center);
            document.push(title.styled(Style::new().bold().with_font_size(TITLE_FONT_SIZE)));
            document.push(Break::new(1));
        }
        for block in cover.blocks() {
            self.push_block(document, block)?;
        }
        Ok(())
    }

    fn push_section(&self, document: &mut genpdf::Document, section: &Section) -> Result<(), Error> {
        document.push(Break::new(1));
        document.push(
            Paragraph::new(section.title()).styled(Style::new().bold().with_font_size(SECTION_FONT_SIZE)),
        );
        document.push(Break::new(0.5));
        for block in section.blocks() {
            self.push_block(document, block)?;
        }
        Ok(())
    }

    fn push_block(&self, document: &mut genpdf::Document, block: &Block) -> Result<(), Error> {
        match block {
            Block::Heading(text) => {
                document.push(
                    Paragraph::new(text.as_str()).styled(Style::new().bold().with_font_size(HEADING_FONT_SIZE)),
                );
            }
            Block::Paragraph(paragraph) => document.push(paragraph_element(paragraph)),
            Block::Preformatted(text) => document.push(self.preformatted(text)),
            Block::Table(table) => document.push(table_element(table)?),
            Block::Image(image) => match image_element(image) {
                Ok(element) => document.push(element),
                Err(err) => {
                    warn!("Skipping figure {}: {err}", image.path().display());
                    document.push(Paragraph::new(format!("[missing figure: {}]", image.path().display())));
                }
            },
        }
        document.push(Break::new(0.5));
        Ok(())
    }

    /// One unwrapped line per source line, in the monospace family when one was found.
    fn preformatted(&self, text: &str) -> LinearLayout {
        let mut style = Style::new().with_font_size(PREFORMATTED_FONT_SIZE);
        if let Some(family) = self.monospace {
            style = style.with_font_family(family);
        }

        let mut layout = LinearLayout::vertical();
        for line in text.lines() {
            let line = if line.is_empty() { " " } else { line };
            layout.push(Text::new(StyledString::new(line.to_string(), style)));
        }
        layout
    }
}

/// Builds a framed table. Rows are padded or truncated to the header width.
fn table_element(table: &PipeTable) -> Result<TableLayout, Error> {
    let columns = table.header.len().max(1);
    let mut layout = TableLayout::new(vec![1; columns]);
    layout.set_cell_decorator(FrameCellDecorator::new(true, true, false));

    let rows = std::iter::once((&table.header, true)).chain(table.rows.iter().map(|row| (row, false)));
    for (cells, header) in rows {
        let mut row = layout.row();
        for column in 0..columns {
            let text = cells.get(column).map(String::as_str).unwrap_or("");
            let mut cell = Paragraph::new(text);
            if column > 0 {
                cell.set_alignment(Alignment::Right);
            }
            let style = if header { Style::new().bold() } else { Style::new() };
            row.push_element(cell.styled(style).padded(1));
        }
        row.push()?;
    }
    Ok(layout)
}

fn image_element(image: &ImageBlock) -> Result<CaptionedImage, Error> {
    let caption = image
        .caption()
        .map(paragraph_element)
        .unwrap_or_default();
    let element = CaptionedImage::from_path(image.path(), caption)?
        .with_alignment(alignment(image.alignment()))
        .with_width(image.width_mm().map(crate::elements::mm_from_f64));
    Ok(element)
}

/// Definition of a footer rendered through the page decorator.
pub struct FooterSpec {
    height: Mm,
    factory: Box<HeaderFactory>,
}

impl FooterSpec {
    /// Creates a new footer specification.
    pub fn new<F, E>(height: impl Into<Mm>, factory: F) -> Self
    where
        F: Fn(usize) -> E + 'static,
        E: Element + 'static,
    {
        Self {
            height: height.into(),
            factory: Box::new(move |page| Box::new(factory(page)) as Box<dyn Element>),
        }
    }
}

struct ConfiguredPageDecorator {
    page: usize,
    margins: Option<Margins>,
    header: Option<Box<HeaderFactory>>,
    footer: Option<FooterSpec>,
}

impl ConfiguredPageDecorator {
    fn new(
        margins: Option<Margins>,
        header: Option<Box<HeaderFactory>>,
        footer: Option<FooterSpec>,
    ) -> Self {
        Self {
            page: 0,
            margins,
            header,
            footer,
        }
    }
}

impl PageDecorator for ConfiguredPageDecorator {
    fn decorate_page<'a>(
        &mut self,
        context: &genpdf::Context,
        mut area: genpdf::render::Area<'a>,
        style: Style,
    ) -> Result<genpdf::render::Area<'a>, Error> {
        self.page += 1;

        if let Some(margins) = self.margins {
            area.add_margins(margins);
        }

        if let Some(header_cb) = &self.header {
            let mut element = header_cb(self.page);
            let result = element.render(context, area.clone(), style)?;
            area.add_offset(Position::new(0, result.size.height));
        }

        if let Some(footer) = &self.footer {
            let available = area.size().height;
            if footer.height > available {
                return Err(Error::new(
                    "Footer height exceeds available space",
                    ErrorKind::InvalidData,
                ));
            }

            let mut footer_area = area.clone();
            footer_area.add_offset(Position::new(0, available - footer.height));
            let mut element = (footer.factory)(self.page);
            let result = element.render(context, footer_area, style)?;
            if result.has_more {
                return Err(Error::new(
                    "Footer element does not fit into the reserved space",
                    ErrorKind::PageSizeExceeded,
                ));
            }

            area.set_height(available - footer.height);
        }

        Ok(area)
    }
}
