//! Markdown report documents that reference or inline the rendered artifacts.

use std::fmt::Write as _;

use chrono::NaiveDate;

use crate::ascii;
use crate::graphics::Figure;
use crate::synth::StatisticsTable;

/// Header metadata shared by both report flavours.
#[derive(Clone, Debug)]
pub struct ReportContext {
    pub title: String,
    pub author: String,
    pub date: NaiveDate,
}

impl ReportContext {
    pub fn new(author: impl Into<String>, date: NaiveDate) -> Self {
        Self {
            title: "Technical Analysis Report".to_string(),
            author: author.into(),
            date,
        }
    }

    fn write_front_matter(&self, out: &mut String) {
        let _ = writeln!(out, "# {}\n", self.title);
        let _ = writeln!(
            out,
            "**Author:** {}  \n**Date:** {}\n",
            self.author,
            self.date.format("%Y-%m-%d")
        );
        out.push_str("## Abstract\n\n");
        out.push_str(ABSTRACT);
        out.push_str("\n\n## Introduction\n\n");
        out.push_str(INTRODUCTION);
        out.push_str("\n\n");
    }
}

/// Text artifacts inlined into the narrative report.
#[derive(Clone, Debug, Default)]
pub struct TextArtifacts {
    pub time_series: String,
    pub error_map: String,
    pub statistics_table: String,
}

const ABSTRACT: &str = "This document demonstrates a workflow for generating reports that combine \
technical writing with programmatically generated figures and tables. The template is designed \
for scientific or technical reports that require data visualization and analysis.";

const INTRODUCTION: &str = "The report is produced by an automated workflow that synthesizes \
sample data, renders figures and tables from it and embeds them in a document.\n\n\
The workflow consists of:\n\
- a generator that synthesizes data and renders figures\n\
- a document template that includes the generated figures\n\
- an exporter that converts the document to PDF";

const TIME_SERIES_TEXT: &str = "Figure 1 compares observed temperature data with model \
predictions. The model follows the seasonal pattern, with discrepancies concentrated around \
extreme temperature events.";

const ERROR_MAP_TEXT: &str = "Figure 2 shows the spatial distribution of errors between \
observations and model predictions. Positive values mark areas where the model underestimates \
observations; negative values mark overestimation.";

const STATISTICS_TEXT: &str = "Table 1 summarizes model performance across regions: Root Mean \
Square Error (RMSE), correlation coefficient, bias and standard deviation.";

const CONCLUSION: &str = "## Conclusion\n\n\
This document demonstrated a workflow for generating technical reports with embedded figures \
and tables. The approach allows for:\n\n\
- Reproducible research and analysis\n\
- Consistent formatting and styling\n\
- Automated document generation\n\
- Version control of both code and document\n\n\
Combining programmatic data analysis with document preparation produces professional-quality \
reports efficiently.\n";

fn write_fenced(out: &mut String, body: &str) {
    out.push_str("```\n");
    out.push_str(body);
    if !body.ends_with('\n') {
        out.push('\n');
    }
    out.push_str("```\n\n");
}

/// Builds the text-mode report with every artifact embedded verbatim.
///
/// The statistics table is inlined without its title block, since the section heading already
/// names it.
pub fn narrative_markdown(context: &ReportContext, artifacts: &TextArtifacts) -> String {
    let mut out = String::new();
    context.write_front_matter(&mut out);

    out.push_str("## Time Series Analysis\n\n");
    let _ = writeln!(out, "{TIME_SERIES_TEXT}\n");
    write_fenced(&mut out, &artifacts.time_series);

    out.push_str("## Spatial Error Analysis\n\n");
    let _ = writeln!(out, "{ERROR_MAP_TEXT}\n");
    write_fenced(&mut out, &artifacts.error_map);

    out.push_str("## Regional Performance Statistics\n\n");
    let _ = writeln!(out, "{STATISTICS_TEXT}\n");
    out.push_str(&ascii::strip_header(&artifacts.statistics_table));

    out.push('\n');
    out.push_str(CONCLUSION);
    out
}

/// Relative paths of the graphical table artifacts.
#[derive(Clone, Debug)]
pub struct TableArtifacts {
    pub csv: String,
    pub latex: String,
}

/// Builds the graphical-mode report, linking figures by relative path.
pub fn graphical_markdown(
    context: &ReportContext,
    time_series: &Figure,
    error_map: &Figure,
    statistics: &StatisticsTable,
    tables: &TableArtifacts,
    figure_link: impl Fn(&Figure) -> String,
) -> String {
    let mut out = String::new();
    context.write_front_matter(&mut out);

    for (heading, text, number, figure) in [
        ("Time Series Analysis", TIME_SERIES_TEXT, 1, time_series),
        ("Spatial Error Analysis", ERROR_MAP_TEXT, 2, error_map),
    ] {
        let _ = writeln!(out, "## {heading}\n");
        let _ = writeln!(out, "{text}\n");
        let labels = &figure.labels;
        let _ = writeln!(out, "![Figure {number}: {}]({})\n", labels.title, figure_link(figure));
        let _ = writeln!(
            out,
            "*Figure {number}: {} ({} vs. {}).*\n",
            labels.title, labels.y_label, labels.x_label
        );
    }

    out.push_str("## Regional Performance Statistics\n\n");
    let _ = writeln!(out, "{STATISTICS_TEXT}\n");
    out.push_str(&statistics.to_pipe_table().render());
    let _ = writeln!(
        out,
        "\nSource data: [{}]({}), LaTeX: [{}]({})",
        tables.csv, tables.csv, tables.latex, tables.latex
    );

    out.push('\n');
    out.push_str(CONCLUSION);
    out
}
