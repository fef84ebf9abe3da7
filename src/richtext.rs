//! Utilities for working with styled text fragments.
//!
//! The types in this module provide a light-weight representation of text "spans" that carry the
//! subset of styling information the exported report uses. They sit between the inline markup of
//! the static HTML document and the [`genpdf::elements`] primitives used to render the final PDF.

use genpdf::style::{Color, Style, StyledString};

use crate::html::{self, Token};

/// Color used for the text of hyperlinks.
pub const LINK_COLOR: Color = Color::Rgb(36, 92, 160);

/// A slice of text together with inline style attributes.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Span {
    text: String,
    bold: bool,
    italic: bool,
    color: Option<Color>,
}

impl Span {
    /// Creates a new span with the provided text and no styles applied.
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Self::default()
        }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn is_bold(&self) -> bool {
        self.bold
    }

    pub fn is_italic(&self) -> bool {
        self.italic
    }

    pub fn color(&self) -> Option<Color> {
        self.color
    }

    /// Convenience shorthand that marks the span as bold.
    pub fn bold(mut self) -> Self {
        self.bold = true;
        self
    }

    /// Convenience shorthand that marks the span as italic.
    pub fn italic(mut self) -> Self {
        self.italic = true;
        self
    }

    /// Convenience shorthand that assigns a color to the span.
    pub fn colored(mut self, color: Color) -> Self {
        self.color = Some(color);
        self
    }

    fn to_style(&self) -> Style {
        let mut style = Style::new();
        if let Some(color) = self.color {
            style.set_color(color);
        }
        if self.bold {
            style.set_bold();
        }
        if self.italic {
            style.set_italic();
        }
        style
    }

    /// Converts the span to a [`StyledString`] for `genpdf` paragraphs.
    pub fn to_styled_string(&self) -> StyledString {
        StyledString::new(self.text.clone(), self.to_style())
    }
}

impl From<&Span> for StyledString {
    fn from(span: &Span) -> Self {
        span.to_styled_string()
    }
}

/// Nesting depth of each inline style while walking the markup.
#[derive(Clone, Copy, Debug, Default)]
struct StyleState {
    bold: usize,
    italic: usize,
    link: usize,
}

impl StyleState {
    fn to_span(self, text: impl Into<String>) -> Span {
        Span {
            text: text.into(),
            bold: self.bold > 0,
            italic: self.italic > 0,
            color: (self.link > 0).then_some(LINK_COLOR),
        }
    }

    fn apply(&mut self, name: &str, opening: bool) {
        let counter = match name {
            "strong" | "b" => &mut self.bold,
            "em" | "i" | "cite" => &mut self.italic,
            "a" => &mut self.link,
            _ => return,
        };
        if opening {
            *counter += 1;
        } else {
            *counter = counter.saturating_sub(1);
        }
    }
}

/// Builds spans from inline markup tokens.
///
/// `<strong>`/`<b>` produce bold spans, `<em>`/`<i>` italic ones and `<a>` link-colored ones. Other
/// tags are dropped while their text is kept. Runs of whitespace collapse to one space that is
/// attached to the start of the following word, leading and trailing whitespace is removed, and
/// `<br>` acts as a space. Character references are decoded after collapsing, so `&nbsp;` survives
/// as a non-breaking space.
pub fn spans_from_tokens(tokens: &[Token<'_>]) -> Vec<Span> {
    let mut spans = Vec::new();
    let mut buffer = String::new();
    let mut state = StyleState::default();
    let mut pending_space = false;

    for token in tokens {
        match token {
            Token::Text(raw) => {
                for (index, piece) in raw.split(char::is_whitespace).enumerate() {
                    if index > 0 {
                        pending_space = true;
                    }
                    if piece.is_empty() {
                        continue;
                    }
                    if pending_space && (!buffer.is_empty() || !spans.is_empty()) {
                        buffer.push(' ');
                    }
                    pending_space = false;
                    buffer.push_str(&html::decode_entities(piece));
                }
            }
            Token::Open { name, .. } if name == "br" => pending_space = true,
            Token::Open { name, .. } => {
                flush_buffer(&mut buffer, &mut spans, state);
                state.apply(name, true);
            }
            Token::Close { name } => {
                flush_buffer(&mut buffer, &mut spans, state);
                state.apply(name, false);
            }
        }
    }
    flush_buffer(&mut buffer, &mut spans, state);
    spans
}

fn flush_buffer(buffer: &mut String, spans: &mut Vec<Span>, state: StyleState) {
    if buffer.is_empty() {
        return;
    }
    spans.push(state.to_span(std::mem::take(buffer)));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::html::tokenize;

    fn spans(markup: &str) -> Vec<Span> {
        spans_from_tokens(&tokenize(markup))
    }

    #[test]
    fn span_to_style_reflects_flags() {
        let span = Span::new("Hello").bold().italic().colored(Color::Rgb(10, 20, 30));
        let styled = span.to_styled_string();
        assert_eq!(styled.s, "Hello");
        assert!(styled.style.is_bold());
        assert!(styled.style.is_italic());
        assert_eq!(styled.style.color(), Some(Color::Rgb(10, 20, 30)));
    }

    #[test]
    fn plain_text_collapses_whitespace() {
        let parsed = spans("\n   Hello \n\t world  ");
        assert_eq!(parsed, vec![Span::new("Hello world")]);
    }

    #[test]
    fn nested_styles() {
        let parsed = spans("This is <strong>very <em>cool</em></strong>!");
        assert_eq!(parsed.len(), 4);
        assert_eq!(parsed[0], Span::new("This is"));
        assert_eq!(parsed[1], Span::new(" very").bold());
        assert_eq!(parsed[2], Span::new(" cool").bold().italic());
        assert_eq!(parsed[3], Span::new("!"));
    }

    #[test]
    fn links_are_colored_and_entities_decoded() {
        let parsed = spans(r#"See <a href="x.csv">data &amp; notes</a>"#);
        assert_eq!(parsed[1], Span::new(" data & notes").colored(LINK_COLOR));
    }

    #[test]
    fn space_between_spans_is_kept_once() {
        let parsed = spans("<strong>Author:</strong> Eduard Ruzga");
        assert_eq!(parsed, vec![Span::new("Author:").bold(), Span::new(" Eduard Ruzga")]);
    }

    #[test]
    fn unbalanced_close_tags_are_ignored() {
        let parsed = spans("a</em> b");
        assert_eq!(parsed, vec![Span::new("a"), Span::new(" b")]);
    }
}
