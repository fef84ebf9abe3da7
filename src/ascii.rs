//! Fixed-width text renderings of the three datasets.

use std::fmt::Write as _;

use crate::synth::{ErrorField, StatisticsTable, TimeSeries};
use crate::table;

/// Width of the `=` rule printed under every artifact title.
pub const RULE_WIDTH: usize = 60;

/// Number of header lines (title, rule, blank) preceding each artifact body.
pub const HEADER_LINES: usize = 3;

pub const TIME_SERIES_TITLE: &str = "Temperature Time Series: Model vs Observations";
pub const ERROR_MAP_TITLE: &str = "Spatial Error Distribution";
pub const STATISTICS_TITLE: &str = "Statistical Comparison by Region";

pub const OBSERVED_GLYPH: char = 'o';
pub const MODEL_GLYPH: char = 'x';

/// Samples between two date labels on the X axis.
const DATE_LABEL_EVERY: usize = 5;

fn write_header(out: &mut String, title: &str) {
    let _ = writeln!(out, "{title}");
    let _ = writeln!(out, "{}", "=".repeat(RULE_WIDTH));
    out.push('\n');
}

/// Plots both series as rows of glyphs, one column per sample.
///
/// Row `h` represents the level `max - h * span / height`; a sample lands on the row when it lies
/// strictly within half a row of that level. Observations are checked first, so a sample where
/// both series land on the same row shows the observation glyph.
pub fn render_time_series(series: &TimeSeries, height: usize, unit: &str) -> String {
    let mut out = String::new();
    write_header(&mut out, TIME_SERIES_TITLE);

    let (min, max) = series.value_range();
    let (min, max) = if series.is_empty() { (0.0, 0.0) } else { (min, max) };
    let span = if max - min > f64::EPSILON { max - min } else { 1.0 };
    let step = span / height as f64;
    let tolerance = step / 2.0;
    let mid = (max + min) / 2.0;

    let labels = [
        format!("{max:.1}{unit}"),
        format!("{mid:.1}{unit}"),
        format!("{min:.1}{unit}"),
    ];
    let label_width = labels.iter().map(|label| label.chars().count()).max().unwrap_or(0);

    for row in 0..height {
        let level = max - row as f64 * step;
        let label = if row == 0 {
            labels[0].as_str()
        } else if row == height - 1 {
            labels[2].as_str()
        } else if row == height / 2 {
            labels[1].as_str()
        } else {
            ""
        };
        let _ = write!(out, "{label:>label_width$} |");

        for (observed, model) in series.observed.iter().zip(&series.model) {
            let glyph = if (observed - level).abs() < tolerance {
                OBSERVED_GLYPH
            } else if (model - level).abs() < tolerance {
                MODEL_GLYPH
            } else {
                ' '
            };
            out.push(glyph);
        }
        out.push('\n');
    }

    let indent = " ".repeat(label_width + 1);
    let _ = writeln!(out, "{indent}+{}", "-".repeat(series.len()));

    let mut date_line = format!("{indent} ");
    for index in (0..series.len()).step_by(DATE_LABEL_EVERY) {
        let label = series.dates[index].format("%d/%m").to_string();
        date_line.push_str(&label);
        if index + DATE_LABEL_EVERY < series.len() {
            let pad = DATE_LABEL_EVERY.saturating_sub(label.chars().count());
            date_line.push_str(&" ".repeat(pad));
        }
    }
    let _ = writeln!(out, "{date_line}");
    out.push('\n');
    let _ = writeln!(
        out,
        "Legend: {OBSERVED_GLYPH} = Observations, {MODEL_GLYPH} = Model"
    );
    out
}

/// Seven-way classification of an error value relative to the grid's extremes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorBand {
    HighNegative,
    MediumNegative,
    LowNegative,
    NearZero,
    LowPositive,
    MediumPositive,
    HighPositive,
}

impl ErrorBand {
    pub fn glyph(self) -> char {
        match self {
            Self::HighPositive => '+',
            Self::MediumPositive => 'o',
            Self::LowPositive => '.',
            Self::HighNegative => '#',
            Self::MediumNegative => 'X',
            Self::LowNegative => 'x',
            Self::NearZero => ' ',
        }
    }
}

/// Classifies `value` against fractions of the grid's `min` and `max` error.
///
/// Positive bands are checked before negative ones; the low-negative cut is `-0.05 * max`.
pub fn classify_error(value: f64, min: f64, max: f64) -> ErrorBand {
    if value > 0.66 * max {
        ErrorBand::HighPositive
    } else if value > 0.33 * max {
        ErrorBand::MediumPositive
    } else if value > 0.05 * max {
        ErrorBand::LowPositive
    } else if value < 0.66 * min {
        ErrorBand::HighNegative
    } else if value < 0.33 * min {
        ErrorBand::MediumNegative
    } else if value < -0.05 * max {
        ErrorBand::LowNegative
    } else {
        ErrorBand::NearZero
    }
}

/// Draws one glyph per grid cell followed by a legend and the numeric range.
pub fn render_error_map(field: &ErrorField) -> String {
    let mut out = String::new();
    write_header(&mut out, ERROR_MAP_TITLE);

    let (min, max) = field.error_range();
    for row in &field.error {
        let line: String = row
            .iter()
            .map(|&value| classify_error(value, min, max).glyph())
            .collect();
        let _ = writeln!(out, "{line}");
    }

    out.push_str("\nLegend:\n");
    out.push_str("  + o . : Positive errors (observations > model)\n");
    out.push_str("  # X x : Negative errors (observations < model)\n");
    let _ = writeln!(out, "  Range: {min:.2} to {max:.2}");
    out
}

/// Renders the statistics as a titled pipe table.
pub fn render_statistics_table(statistics: &StatisticsTable) -> String {
    let mut out = String::new();
    write_header(&mut out, STATISTICS_TITLE);
    out.push_str(&statistics.to_pipe_table().render());
    out
}

/// LaTeX companion of [`render_statistics_table`].
pub fn render_statistics_latex(statistics: &StatisticsTable) -> String {
    table::render_latex(statistics, STATISTICS_TITLE)
}

/// Drops the title, rule and blank line that precede an artifact body.
pub fn strip_header(artifact: &str) -> String {
    artifact
        .split_inclusive('\n')
        .skip(HEADER_LINES)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::synth::{synthesize_error_field, FieldPattern};
    use chrono::{Duration, NaiveDate};

    fn series(observed: Vec<f64>, model: Vec<f64>) -> TimeSeries {
        let start = NaiveDate::from_ymd_opt(2025, 4, 1).expect("date");
        TimeSeries {
            dates: (0..observed.len())
                .map(|i| start + Duration::days(i as i64))
                .collect(),
            observed,
            model,
            observed_noise: 2.0,
            model_noise: 1.0,
        }
    }

    fn plot_rows(text: &str) -> Vec<String> {
        text.lines()
            .skip(HEADER_LINES)
            .take_while(|line| line.contains('|'))
            .map(|line| line.split_once('|').map(|(_, body)| body.to_string()).unwrap_or_default())
            .collect()
    }

    #[test]
    fn observation_wins_shared_row() {
        let plot = render_time_series(&series(vec![10.0, 0.0], vec![10.0, 0.0]), 4, "C");
        let rows = plot_rows(&plot);
        assert_eq!(rows.len(), 4);
        assert_eq!(rows[0], "o ");
        assert!(rows.iter().all(|row| !row.contains(MODEL_GLYPH)));
    }

    #[test]
    fn model_glyph_appears_when_only_model_lands() {
        let plot = render_time_series(&series(vec![10.0, 0.0], vec![0.0, 10.0]), 4, "C");
        let rows = plot_rows(&plot);
        assert_eq!(rows[0], "ox");
    }

    #[test]
    fn axis_labels_align_with_non_ascii_unit() {
        let plot = render_time_series(&series(vec![25.0, 5.0, 15.0], vec![24.0, 6.0, 15.0]), 6, "°C");
        let lines: Vec<&str> = plot.lines().skip(HEADER_LINES).collect();
        assert!(lines[0].starts_with("25.0°C |"));
        assert!(lines[3].starts_with("15.0°C |"));
        assert!(lines[5].starts_with(" 5.0°C |"));
        assert!(lines[1].starts_with("       |"));
        let bar_columns: Vec<usize> = lines[..6]
            .iter()
            .map(|line| line.chars().position(|c| c == '|').expect("axis"))
            .collect();
        assert!(bar_columns.windows(2).all(|pair| pair[0] == pair[1]));
        assert!(lines[6].ends_with("+---"));
    }

    #[test]
    fn date_labels_start_at_their_sample_column() {
        let values: Vec<f64> = (0..12).map(f64::from).collect();
        let plot = render_time_series(&series(values.clone(), values), 5, "C");
        let axis = plot.lines().find(|line| line.contains('+')).expect("axis line");
        let date_line = plot
            .lines()
            .find(|line| line.contains("01/04"))
            .expect("date line");

        let first_sample = axis.find('+').expect("origin") + 1;
        assert_eq!(date_line.find("01/04"), Some(first_sample));
        assert_eq!(date_line.find("06/04"), Some(first_sample + 5));
        assert_eq!(date_line.find("11/04"), Some(first_sample + 10));
    }

    #[test]
    fn flat_series_lands_on_top_row() {
        let plot = render_time_series(&series(vec![3.0; 4], vec![3.0; 4]), 5, "C");
        assert_eq!(plot_rows(&plot)[0], "oooo");
    }

    #[test]
    fn classification_bands() {
        assert_eq!(classify_error(0.9, -1.0, 1.0), ErrorBand::HighPositive);
        assert_eq!(classify_error(0.5, -1.0, 1.0), ErrorBand::MediumPositive);
        assert_eq!(classify_error(0.1, -1.0, 1.0), ErrorBand::LowPositive);
        assert_eq!(classify_error(0.0, -1.0, 1.0), ErrorBand::NearZero);
        assert_eq!(classify_error(-0.1, -1.0, 1.0), ErrorBand::LowNegative);
        assert_eq!(classify_error(-0.5, -1.0, 1.0), ErrorBand::MediumNegative);
        assert_eq!(classify_error(-0.9, -1.0, 1.0), ErrorBand::HighNegative);
    }

    #[test]
    fn classification_is_monotonic() {
        for (min, max) in [(-1.0, 1.0), (-0.2, 3.0), (-5.0, 0.4), (-1e-3, 1e-3)] {
            let mut previous = ErrorBand::HighNegative;
            let steps = 2000;
            for step in 0..=steps {
                let value = min + (max - min) * step as f64 / steps as f64;
                let band = classify_error(value, min, max);
                assert!(band >= previous, "{value} in [{min}, {max}] regressed to {band:?}");
                previous = band;
            }
        }
    }

    #[test]
    fn error_map_has_one_line_per_row() {
        let field = synthesize_error_field(20, 5.0, FieldPattern::Ripple);
        let map = render_error_map(&field);
        let grid: Vec<&str> = map.lines().skip(HEADER_LINES).take(20).collect();
        assert!(grid.iter().all(|line| line.chars().count() == 20));
        let (min, max) = field.error_range();
        assert!(map.contains(&format!("Range: {min:.2} to {max:.2}")));
    }

    #[test]
    fn strip_header_keeps_table_body() {
        let statistics = StatisticsTable {
            regions: vec!["North".into()],
            metrics: vec!["Bias".into()],
            values: vec![vec![0.5]],
        };
        let body = strip_header(&render_statistics_table(&statistics));
        assert!(body.starts_with("| Region"));
    }
}
