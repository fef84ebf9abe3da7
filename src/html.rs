//! Extraction of a typesettable document from the static HTML report.
//!
//! This is not a general HTML parser. It understands the flat structure the assembler produces:
//! headings, paragraphs, preformatted blocks, tables, lists and images, each possibly wrapped in
//! layout containers. Unknown elements are transparent, so their text still reaches the output.
//!
//! A `<` only starts a tag when it is followed by a letter, `/`, `!` or `?`. Artifacts substituted
//! verbatim into `<pre>` blocks may contain comparisons such as `a < b`, which therefore stay text.

use std::borrow::Cow;
use std::path::Path;

use log::debug;

use crate::model::{Block, Cover, HorizontalAlignment, ImageBlock, ReportDocument, RichParagraph, Section};
use crate::richtext::{self, Span};
use crate::table::PipeTable;

/// Width given to every extracted image.
pub const FIGURE_WIDTH_MM: f64 = 160.0;

/// Elements whose content is raw text up to the matching close tag.
const RAW_TEXT_ELEMENTS: &[&str] = &["script", "style"];

/// Elements dropped together with their content.
const SKIPPED_ELEMENTS: &[&str] = &["script", "style", "noscript", "template"];

/// Elements that end an open paragraph or heading.
const BLOCK_ELEMENTS: &[&str] = &[
    "address", "article", "aside", "blockquote", "body", "caption", "dd", "div", "dl", "dt",
    "figcaption", "figure", "footer", "h1", "h2", "h3", "h4", "h5", "h6", "header", "hr", "html",
    "li", "main", "nav", "ol", "p", "pre", "section", "table", "tbody", "td", "tfoot", "th",
    "thead", "tr", "ul",
];

const INLINE_ELEMENTS: &[&str] = &[
    "a", "abbr", "b", "br", "cite", "code", "em", "i", "kbd", "mark", "s", "samp", "small", "span",
    "strong", "sub", "sup", "time", "u", "var",
];

/// A lexical unit of HTML.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Token<'a> {
    /// An opening or void tag. `attributes` is the raw text between the name and `>`.
    Open { name: String, attributes: &'a str },
    Close { name: String },
    /// Text between tags, with character references still encoded.
    Text(&'a str),
}

/// Splits `input` into tags and text.
///
/// Tag names are lowercased. Comments, doctypes and processing instructions are dropped. The
/// content of `<script>` and `<style>` is returned as a single text token.
pub fn tokenize(input: &str) -> Vec<Token<'_>> {
    let bytes = input.as_bytes();
    let mut tokens = Vec::new();
    let mut index = 0;
    let mut text_start = 0;

    while index < bytes.len() {
        if bytes[index] != b'<' {
            index += 1;
            continue;
        }
        let Some((token, end)) = read_markup(input, index) else {
            index += 1;
            continue;
        };

        if text_start < index {
            tokens.push(Token::Text(&input[text_start..index]));
        }
        index = end;
        text_start = end;

        let Some(token) = token else {
            continue;
        };
        let raw_element = match &token {
            Token::Open { name, .. } if RAW_TEXT_ELEMENTS.contains(&name.as_str()) => Some(name.clone()),
            _ => None,
        };
        tokens.push(token);

        if let Some(name) = raw_element {
            let close = format!("</{name}");
            let body_end = input[index..]
                .to_ascii_lowercase()
                .find(&close)
                .map_or(input.len(), |offset| index + offset);
            if body_end > index {
                tokens.push(Token::Text(&input[index..body_end]));
            }
            index = body_end;
            text_start = body_end;
        }
    }

    if text_start < input.len() {
        tokens.push(Token::Text(&input[text_start..]));
    }
    tokens
}

/// Reads the markup starting at the `<` at `start`.
///
/// Returns `None` when the `<` does not start markup, otherwise the token (if any) and the index
/// just past the markup.
fn read_markup(input: &str, start: usize) -> Option<(Option<Token<'_>>, usize)> {
    let rest = &input[start..];
    if rest.starts_with("<!--") {
        let end = rest.find("-->").map_or(input.len(), |offset| start + offset + 3);
        return Some((None, end));
    }
    if rest.starts_with("<!") || rest.starts_with("<?") {
        let end = rest.find('>').map_or(input.len(), |offset| start + offset + 1);
        return Some((None, end));
    }

    let (closing, name_start) = if rest.starts_with("</") { (true, 2) } else { (false, 1) };
    if !rest[name_start..].starts_with(|c: char| c.is_ascii_alphabetic()) {
        return None;
    }
    let name_len = rest[name_start..]
        .find(|c: char| !c.is_ascii_alphanumeric())
        .unwrap_or(rest.len() - name_start);
    let attributes_start = name_start + name_len;
    let tag_end = attributes_start + find_tag_end(&rest[attributes_start..])?;

    let name = rest[name_start..attributes_start].to_ascii_lowercase();
    let token = if closing {
        Token::Close { name }
    } else {
        let attributes = rest[attributes_start..tag_end].trim().trim_end_matches('/').trim_end();
        Token::Open { name, attributes }
    };
    Some((Some(token), start + tag_end + 1))
}

/// Index of the `>` closing a tag, skipping quoted attribute values.
fn find_tag_end(text: &str) -> Option<usize> {
    let mut quote = None;
    for (index, c) in text.char_indices() {
        match quote {
            Some(open) if c == open => quote = None,
            Some(_) => {}
            None if c == '"' || c == '\'' => quote = Some(c),
            None if c == '>' => return Some(index),
            None => {}
        }
    }
    None
}

/// Looks up an attribute by name in the raw attribute text of an opening tag.
///
/// Attributes without a value yield an empty string.
pub fn attribute(attributes: &str, wanted: &str) -> Option<String> {
    let mut rest = attributes.trim_start();
    while !rest.is_empty() {
        let name_end = rest
            .find(|c: char| c.is_whitespace() || c == '=')
            .unwrap_or(rest.len());
        let name = &rest[..name_end];
        rest = rest[name_end..].trim_start();

        let mut value = "";
        if let Some(after_eq) = rest.strip_prefix('=') {
            let after_eq = after_eq.trim_start();
            match after_eq.chars().next() {
                Some(quote @ ('"' | '\'')) => {
                    let body = &after_eq[1..];
                    let close = body.find(quote).unwrap_or(body.len());
                    value = &body[..close];
                    rest = body.get(close + 1..).unwrap_or("");
                }
                _ => {
                    let end = after_eq.find(char::is_whitespace).unwrap_or(after_eq.len());
                    value = &after_eq[..end];
                    rest = &after_eq[end..];
                }
            }
        }

        if !name.is_empty() && name.eq_ignore_ascii_case(wanted) {
            return Some(decode_entities(value).into_owned());
        }
        rest = rest.trim_start();
    }
    None
}

/// Decodes named and numeric character references. Unknown references are kept literally.
pub fn decode_entities(text: &str) -> Cow<'_, str> {
    if !text.contains('&') {
        return Cow::Borrowed(text);
    }

    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(amp) = rest.find('&') {
        out.push_str(&rest[..amp]);
        let candidate = &rest[amp..];
        let decoded = candidate
            .find(';')
            .filter(|&semi| semi <= 10)
            .and_then(|semi| decode_reference(&candidate[1..semi]).map(|c| (c, semi)));
        match decoded {
            Some((c, semi)) => {
                out.push(c);
                rest = &candidate[semi + 1..];
            }
            None => {
                out.push('&');
                rest = &candidate[1..];
            }
        }
    }
    out.push_str(rest);
    Cow::Owned(out)
}

fn decode_reference(name: &str) -> Option<char> {
    if let Some(numeric) = name.strip_prefix('#') {
        let code = match numeric.strip_prefix(|c: char| c == 'x' || c == 'X') {
            Some(hex) => u32::from_str_radix(hex, 16).ok()?,
            None => numeric.parse().ok()?,
        };
        return char::from_u32(code);
    }
    let c = match name {
        "amp" => '&',
        "lt" => '<',
        "gt" => '>',
        "quot" => '"',
        "apos" => '\'',
        "nbsp" => '\u{a0}',
        "deg" => '°',
        "micro" => 'µ',
        "middot" => '·',
        "plusmn" => '±',
        "times" => '×',
        "ndash" => '\u{2013}',
        "mdash" => '\u{2014}',
        "hellip" => '\u{2026}',
        "copy" => '©',
        _ => return None,
    };
    Some(c)
}

fn is_inline_token(token: &Token<'_>) -> bool {
    match token {
        Token::Text(_) => true,
        Token::Open { name, .. } | Token::Close { name } => INLINE_ELEMENTS.contains(&name.as_str()),
    }
}

fn is_block(name: &str) -> bool {
    BLOCK_ELEMENTS.contains(&name)
}

/// Returns the tokens inside the element opened at `index` and the index to resume at.
///
/// Nested elements of the same name are balanced. With `stop_at_block`, the element also ends
/// (without consuming the token) at the first block-level tag, mirroring implicit `</p>`.
fn element_body<'t, 'a>(
    tokens: &'t [Token<'a>],
    index: usize,
    stop_at_block: bool,
) -> (&'t [Token<'a>], usize) {
    let Token::Open { name: outer, .. } = &tokens[index] else {
        return (&[], index + 1);
    };
    let start = index + 1;
    let mut depth = 0usize;

    for (offset, token) in tokens[start..].iter().enumerate() {
        let position = start + offset;
        match token {
            Token::Open { name, .. } if stop_at_block && is_block(name) => {
                return (&tokens[start..position], position);
            }
            Token::Open { name, .. } if name == outer => depth += 1,
            Token::Close { name } if name == outer => {
                if depth == 0 {
                    return (&tokens[start..position], position + 1);
                }
                depth -= 1;
            }
            Token::Close { name } if stop_at_block && is_block(name) => {
                return (&tokens[start..position], position);
            }
            _ => {}
        }
    }
    (&tokens[start..], tokens.len())
}

/// Text content with whitespace collapsed and references decoded.
fn collapsed_text(tokens: &[Token<'_>]) -> String {
    RichParagraph::new(richtext::spans_from_tokens(tokens)).plain_text()
}

/// Text content of a `<pre>` element with its layout intact.
///
/// Tags inside are dropped and `<br>` becomes a newline. A single newline directly after the
/// opening tag is ignored, as browsers do, and trailing newlines are trimmed.
fn preformatted_text(tokens: &[Token<'_>]) -> String {
    let mut raw = String::new();
    for token in tokens {
        match token {
            Token::Text(text) => raw.push_str(text),
            Token::Open { name, .. } if name == "br" => raw.push('\n'),
            _ => {}
        }
    }
    let raw = raw.replace("\r\n", "\n");
    let body = raw.strip_prefix('\n').unwrap_or(&raw);
    decode_entities(body.trim_end_matches('\n')).into_owned()
}

/// Builds a table from the tokens inside `<table>`.
///
/// The first row made only of `<th>` cells is the header; without one, the first row is used.
fn table_from_tokens(tokens: &[Token<'_>]) -> Option<PipeTable> {
    let mut table = PipeTable::default();
    let mut index = 0;

    while index < tokens.len() {
        if !matches!(&tokens[index], Token::Open { name, .. } if name == "tr") {
            index += 1;
            continue;
        }
        let (row_tokens, next) = element_body(tokens, index, false);
        index = next;

        let mut cells = Vec::new();
        let mut header_row = true;
        let mut cursor = 0;
        while cursor < row_tokens.len() {
            match &row_tokens[cursor] {
                Token::Open { name, .. } if name == "td" || name == "th" => {
                    header_row &= name == "th";
                    let (cell, next) = element_body(row_tokens, cursor, false);
                    cells.push(collapsed_text(cell));
                    cursor = next;
                }
                _ => cursor += 1,
            }
        }

        if cells.is_empty() {
            continue;
        }
        if header_row && table.header.is_empty() && table.rows.is_empty() {
            table.header = cells;
        } else {
            table.rows.push(cells);
        }
    }

    if table.header.is_empty() {
        if table.rows.is_empty() {
            return None;
        }
        table.header = table.rows.remove(0);
    }
    Some(table)
}

struct Extractor<'p> {
    base_dir: &'p Path,
    fallback_title: Option<String>,
    document: ReportDocument,
}

impl Extractor<'_> {
    fn last_block_mut(&mut self) -> Option<&mut Block> {
        match self.document.sections.last_mut() {
            Some(section) => section.last_block_mut(),
            None => self.document.cover.as_mut().and_then(Cover::last_block_mut),
        }
    }

    fn push(&mut self, block: Block) {
        if let Some(section) = self.document.sections.last_mut() {
            section.push_block(block);
            return;
        }
        let title = self.fallback_title.clone().unwrap_or_default();
        self.document
            .cover
            .get_or_insert_with(|| Cover::new(title))
            .push_block(block);
    }

    fn heading(&mut self, level: u8, text: String) {
        match level {
            1 if self.document.is_empty() => self.document.cover = Some(Cover::new(text)),
            1 | 2 => self.document.sections.push(Section::new(text)),
            _ => self.push(Block::Heading(text)),
        }
    }

    fn paragraph(&mut self, name: &str, attributes: &str, inner: &[Token<'_>]) {
        let mut spans = richtext::spans_from_tokens(inner);
        if name == "li" && !spans.is_empty() {
            spans.insert(0, Span::new("\u{2022} "));
        }
        let paragraph = RichParagraph::new(spans);
        if paragraph.is_blank() {
            return;
        }

        let caption = matches!(name, "figcaption" | "caption")
            || attribute(attributes, "class")
                .map_or(false, |class| class.split_whitespace().any(|c| c == "caption"));
        if !caption {
            self.push(Block::Paragraph(paragraph));
            return;
        }

        let paragraph = paragraph.with_alignment(HorizontalAlignment::Center);
        if let Some(Block::Image(image)) = self.last_block_mut() {
            if image.caption().is_none() {
                image.set_caption(paragraph);
                return;
            }
        }
        self.push(Block::Paragraph(paragraph));
    }

    fn image(&mut self, attributes: &str) {
        let Some(src) = attribute(attributes, "src") else {
            return;
        };
        if (src.contains("://") && !src.starts_with("file://")) || src.starts_with("data:") {
            debug!("Skipping non-local image {src}");
            return;
        }
        let path = self.base_dir.join(src.trim_start_matches("file://"));
        self.push(Block::Image(ImageBlock::new(path).with_width_mm(FIGURE_WIDTH_MM)));
    }

    fn loose_text(&mut self, tokens: &[Token<'_>], index: usize) -> usize {
        let end = tokens[index..]
            .iter()
            .position(|token| !is_inline_token(token))
            .map_or(tokens.len(), |offset| index + offset)
            .max(index + 1);
        let paragraph = RichParagraph::new(richtext::spans_from_tokens(&tokens[index..end]));
        if !paragraph.is_blank() {
            self.push(Block::Paragraph(paragraph));
        }
        end
    }

    /// Consumes the construct starting at `index` and returns the index of the next one.
    fn step(&mut self, tokens: &[Token<'_>], index: usize) -> usize {
        let (name, attributes) = match &tokens[index] {
            Token::Open { name, attributes } => (name.as_str(), *attributes),
            Token::Text(_) => return self.loose_text(tokens, index),
            Token::Close { .. } => return index + 1,
        };

        match name {
            "title" => {
                let (inner, next) = element_body(tokens, index, false);
                self.fallback_title = Some(collapsed_text(inner));
                next
            }
            _ if SKIPPED_ELEMENTS.contains(&name) => element_body(tokens, index, false).1,
            "h1" | "h2" | "h3" | "h4" | "h5" | "h6" => {
                let (inner, next) = element_body(tokens, index, true);
                let text = collapsed_text(inner);
                if !text.is_empty() {
                    self.heading(name.as_bytes()[1] - b'0', text);
                }
                next
            }
            "p" | "li" | "figcaption" | "caption" | "blockquote" | "dt" | "dd" => {
                let (inner, next) = element_body(tokens, index, true);
                self.paragraph(name, attributes, inner);
                next
            }
            "pre" => {
                let (inner, next) = element_body(tokens, index, false);
                let text = preformatted_text(inner);
                if !text.is_empty() {
                    self.push(Block::Preformatted(text));
                }
                next
            }
            "table" => {
                let (inner, next) = element_body(tokens, index, false);
                if let Some(table) = table_from_tokens(inner) {
                    self.push(Block::Table(table));
                }
                next
            }
            "img" => {
                self.image(attributes);
                index + 1
            }
            _ if INLINE_ELEMENTS.contains(&name) => self.loose_text(tokens, index),
            _ => index + 1,
        }
    }
}

/// Extracts the cover and sections of an HTML document.
///
/// The first `<h1>` becomes the cover title and every later `<h1>` or `<h2>` starts a section.
/// Relative image sources are resolved against `base_dir`.
pub fn extract_document(html: &str, base_dir: &Path) -> ReportDocument {
    let tokens = tokenize(html);
    let mut extractor = Extractor {
        base_dir,
        fallback_title: None,
        document: ReportDocument::default(),
    };

    let mut index = 0;
    while index < tokens.len() {
        index = extractor.step(&tokens, index);
    }
    extractor.document
}
