//! Turns the HTML template into a static document.
//!
//! Each placeholder is an empty element with a unique id. Substitution replaces the first literal
//! occurrence of that element only; a template that repeats an anchor keeps the later copies
//! untouched. After substitution the first `<script>` block, which only exists to fill the
//! placeholders in a browser, is removed.

use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use log::{info, warn};

use crate::config::RunConfig;
use crate::error::{self, Result};
use crate::report::TextArtifacts;
use crate::table::PipeTable;

pub const TIME_SERIES_ANCHOR: &str = r#"<pre id="time-series"></pre>"#;
pub const ERROR_MAP_ANCHOR: &str = r#"<pre id="error-map"></pre>"#;
pub const STATISTICS_ANCHOR: &str = r#"<tbody id="statistics-table"></tbody>"#;

pub const SCRIPT_OPEN: &str = "<script>";
pub const SCRIPT_CLOSE: &str = "</script>";

/// Template written to the run directory when none exists.
pub const DEFAULT_TEMPLATE: &str = include_str!("../templates/report.html");

/// Replaces the first occurrence of `anchor` in `document`.
///
/// Returns the document unchanged when the anchor does not occur.
pub fn substitute_first(document: &str, anchor: &str, replacement: &str) -> String {
    document.replacen(anchor, replacement, 1)
}

/// Builds `<tr>` rows from a pipe table, skipping its header row.
pub fn table_rows_markup(table_text: &str) -> String {
    let table = PipeTable::parse(table_text);
    let mut markup = String::new();
    for row in &table.rows {
        markup.push_str("<tr>");
        for cell in row {
            let _ = write!(markup, "<td>{cell}</td>");
        }
        markup.push_str("</tr>\n");
    }
    markup
}

/// Removes the first `<script>` … `</script>` span, both tags included.
///
/// The document is returned unchanged if either tag is missing or the closing tag precedes the
/// opening one.
pub fn strip_script_region(document: &str) -> String {
    let Some(start) = document.find(SCRIPT_OPEN) else {
        return document.to_string();
    };
    let Some(close) = document[start..].find(SCRIPT_CLOSE) else {
        return document.to_string();
    };
    let end = start + close + SCRIPT_CLOSE.len();

    let mut stripped = String::with_capacity(document.len() - (end - start));
    stripped.push_str(&document[..start]);
    stripped.push_str(&document[end..]);
    stripped
}

/// Fills the placeholders of a template and strips its script region.
///
/// Empty artifacts leave their placeholder in place.
pub fn assemble_str(template: &str, artifacts: &TextArtifacts) -> String {
    let mut document = template.to_string();

    if !artifacts.time_series.is_empty() {
        document = substitute_first(
            &document,
            TIME_SERIES_ANCHOR,
            &format!(r#"<pre id="time-series">{}</pre>"#, artifacts.time_series),
        );
    }

    if !artifacts.error_map.is_empty() {
        document = substitute_first(
            &document,
            ERROR_MAP_ANCHOR,
            &format!(r#"<pre id="error-map">{}</pre>"#, artifacts.error_map),
        );
    }

    let rows = table_rows_markup(&artifacts.statistics_table);
    if !rows.is_empty() {
        document = substitute_first(
            &document,
            STATISTICS_ANCHOR,
            &format!("<tbody id=\"statistics-table\">\n{rows}</tbody>"),
        );
    }

    strip_script_region(&document)
}

/// Reads a text file, logging and returning an empty string on failure.
pub fn read_or_empty(path: &Path) -> String {
    match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(err) => {
            warn!("Error reading {}: {err}", path.display());
            String::new()
        }
    }
}

/// Loads the text-mode artifacts from the figures directory.
pub fn load_text_artifacts(config: &RunConfig) -> TextArtifacts {
    TextArtifacts {
        time_series: read_or_empty(&config.figure_path("time_series.txt")),
        error_map: read_or_empty(&config.figure_path("error_map.txt")),
        statistics_table: read_or_empty(&config.figure_path("statistics_table.txt")),
    }
}

/// Writes the bundled template unless the run directory already has one.
///
/// Returns `true` when a template was written.
pub fn ensure_template(config: &RunConfig) -> Result<bool> {
    let path = config.template_path();
    if path.exists() {
        return Ok(false);
    }
    error::ensure_dir(&config.run_dir)?;
    error::write(&path, DEFAULT_TEMPLATE)?;
    info!("Wrote default template to {}", path.display());
    Ok(true)
}

/// Assembles `report_static.html` from the run directory's template and text artifacts.
pub fn assemble(config: &RunConfig) -> Result<PathBuf> {
    let template = read_or_empty(&config.template_path());
    let artifacts = load_text_artifacts(config);
    let document = assemble_str(&template, &artifacts);

    let output = config.static_document_path();
    error::write(&output, document)?;
    info!("Created static HTML file: {}", output.display());
    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn substitutes_only_first_occurrence() {
        let doc = format!("a {TIME_SERIES_ANCHOR} b {TIME_SERIES_ANCHOR} c");
        let out = substitute_first(&doc, TIME_SERIES_ANCHOR, "X");
        assert_eq!(out, format!("a X b {TIME_SERIES_ANCHOR} c"));
    }

    #[test]
    fn missing_anchor_is_a_no_op() {
        assert_eq!(substitute_first("plain", TIME_SERIES_ANCHOR, "X"), "plain");
    }

    #[test]
    fn strips_first_script_region() {
        let doc = "<p>a</p><script>var x = 1;</script><p>b</p><script>y</script>";
        assert_eq!(strip_script_region(doc), "<p>a</p><p>b</p><script>y</script>");
    }

    #[test]
    fn script_at_document_start_is_stripped() {
        assert_eq!(strip_script_region("<script>x</script>rest"), "rest");
    }

    #[test]
    fn malformed_script_region_is_left_alone() {
        for doc in [
            "<p>no script</p>",
            "<script>never closed",
            "closed first</script> then <script>open",
        ] {
            assert_eq!(strip_script_region(doc), doc);
        }
    }

    #[test]
    fn table_rows_skip_header() {
        let text = "Title\n=====\n\n| Region  | RMSE |\n|---------|------|\n| North   | 2.5  |\n| South   | 1    |\n";
        assert_eq!(
            table_rows_markup(text),
            "<tr><td>North</td><td>2.5</td></tr>\n<tr><td>South</td><td>1</td></tr>\n"
        );
    }

    #[test]
    fn empty_artifacts_keep_placeholders() {
        let template = format!("{TIME_SERIES_ANCHOR}{ERROR_MAP_ANCHOR}{STATISTICS_ANCHOR}");
        assert_eq!(assemble_str(&template, &TextArtifacts::default()), template);
    }

    #[test]
    fn default_template_has_every_anchor() {
        for anchor in [TIME_SERIES_ANCHOR, ERROR_MAP_ANCHOR, STATISTICS_ANCHOR, SCRIPT_OPEN, SCRIPT_CLOSE] {
            assert_eq!(DEFAULT_TEMPLATE.matches(anchor).count(), 1, "{anchor}");
        }
    }
}
