//! Pipe-delimited table format plus CSV and LaTeX renderings of the statistics table.
//!
//! The text format is:
//!
//! ```text
//! | Region  | RMSE       | Correlation |
//! |---------|------------|-------------|
//! | North   | 2.5        | 0.91        |
//! ```
//!
//! Every line that belongs to the table starts with `|`. Lines starting with `|---` separate the
//! header from the data rows. Parsing splits each line on `|`, trims every cell and drops cells that
//! are empty after trimming, so the leading and trailing delimiters never produce cells.

use std::fmt::Write as _;
use std::path::Path;

use crate::error::{ReportError, Result};
use crate::synth::StatisticsTable;

/// Prefix that identifies a header separator line.
pub const SEPARATOR_PREFIX: &str = "|---";

/// Label of the first column in the statistics table.
pub const REGION_HEADER: &str = "Region";

const MIN_REGION_WIDTH: usize = 7;
const MIN_VALUE_WIDTH: usize = 10;

/// A header row and data rows of string cells.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PipeTable {
    pub header: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

/// Splits one table line into trimmed, non-empty cells.
pub fn split_row(line: &str) -> Vec<String> {
    line.split('|')
        .map(str::trim)
        .filter(|cell| !cell.is_empty())
        .map(String::from)
        .collect()
}

impl PipeTable {
    fn column_widths(&self) -> Vec<usize> {
        let columns = self.header.len();
        (0..columns)
            .map(|col| {
                let minimum = if col == 0 {
                    MIN_REGION_WIDTH
                } else {
                    MIN_VALUE_WIDTH
                };
                std::iter::once(&self.header)
                    .chain(&self.rows)
                    .filter_map(|row| row.get(col))
                    .map(|cell| cell.chars().count())
                    .fold(minimum, usize::max)
            })
            .collect()
    }

    fn write_row(out: &mut String, cells: &[String], widths: &[usize]) {
        out.push('|');
        for (cell, width) in cells.iter().zip(widths) {
            let _ = write!(out, " {cell:<width$} |");
        }
        out.push('\n');
    }

    /// Renders the table with padded columns and a separator under the header.
    pub fn render(&self) -> String {
        let widths = self.column_widths();
        let mut out = String::new();
        Self::write_row(&mut out, &self.header, &widths);

        out.push('|');
        for width in &widths {
            out.push_str(&"-".repeat(width + 2));
            out.push('|');
        }
        out.push('\n');

        for row in &self.rows {
            Self::write_row(&mut out, row, &widths);
        }
        out
    }

    /// Parses every `|`-prefixed line of `text`; the first non-separator line is the header.
    ///
    /// Lines that do not start with `|` (titles, rules, blank lines) are ignored, as are rows that
    /// contain no cells.
    pub fn parse(text: &str) -> Self {
        let mut lines = text
            .lines()
            .filter(|line| line.starts_with('|') && !line.starts_with(SEPARATOR_PREFIX))
            .map(split_row);

        let header = lines.next().unwrap_or_default();
        let rows = lines.filter(|cells| !cells.is_empty()).collect();
        Self { header, rows }
    }
}

impl StatisticsTable {
    /// Converts the table to string cells using round-trip `f64` formatting.
    pub fn to_pipe_table(&self) -> PipeTable {
        let header = std::iter::once(REGION_HEADER.to_string())
            .chain(self.metrics.iter().cloned())
            .collect();
        let rows = self
            .rows()
            .map(|(region, values)| {
                std::iter::once(region.to_string())
                    .chain(values.iter().map(|value| value.to_string()))
                    .collect()
            })
            .collect();
        PipeTable { header, rows }
    }

    /// Rebuilds the region-to-metric mapping from parsed text.
    pub fn from_pipe_table(table: &PipeTable) -> Result<Self> {
        let Some((_, metrics)) = table.header.split_first() else {
            return Err(ReportError::InvalidInput("table has no header row".into()));
        };

        let mut regions = Vec::with_capacity(table.rows.len());
        let mut values = Vec::with_capacity(table.rows.len());
        for (index, row) in table.rows.iter().enumerate() {
            if row.len() != table.header.len() {
                return Err(ReportError::InvalidInput(format!(
                    "row {} has {} cells, expected {}",
                    index + 1,
                    row.len(),
                    table.header.len()
                )));
            }
            regions.push(row[0].clone());
            let parsed = row[1..]
                .iter()
                .map(|cell| {
                    cell.parse::<f64>().map_err(|err| {
                        ReportError::InvalidInput(format!("cell {cell:?} is not a number: {err}"))
                    })
                })
                .collect::<Result<Vec<_>>>()?;
            values.push(parsed);
        }

        Ok(Self {
            regions,
            metrics: metrics.to_vec(),
            values,
        })
    }
}

/// Renders a booktabs LaTeX table with one left-aligned label column and right-aligned values.
pub fn render_latex(table: &StatisticsTable, caption: &str) -> String {
    let mut out = String::new();
    out.push_str("\\begin{table}[htbp]\n");
    out.push_str("\\centering\n");
    let _ = writeln!(out, "\\caption{{{caption}}}");
    out.push_str("\\label{tab:statistics}\n");
    let _ = writeln!(out, "\\begin{{tabular}}{{l{}}}", "r".repeat(table.metrics.len()));
    out.push_str("\\toprule\n");
    let _ = writeln!(out, "{REGION_HEADER} & {} \\\\", table.metrics.join(" & "));
    out.push_str("\\midrule\n");
    for (region, values) in table.rows() {
        let cells: Vec<String> = values.iter().map(|value| format!("{value:.2}")).collect();
        let _ = writeln!(out, "{region} & {} \\\\", cells.join(" & "));
    }
    out.push_str("\\bottomrule\n");
    out.push_str("\\end{tabular}\n");
    out.push_str("\\end{table}\n");
    out
}

/// Writes the table as CSV with a `Region` header column.
pub fn write_csv(table: &StatisticsTable, path: &Path) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)?;
    writer.write_record(std::iter::once(REGION_HEADER).chain(table.metrics.iter().map(String::as_str)))?;
    for (region, values) in table.rows() {
        let cells = std::iter::once(region.to_string()).chain(values.iter().map(|v| v.to_string()));
        writer.write_record(cells)?;
    }
    writer
        .flush()
        .map_err(|err| ReportError::io(path, err))?;
    Ok(())
}
