//! Synthetic datasets: paired time series, a 2-D error field and a regional statistics table.
//!
//! Nothing here touches the filesystem. Randomness comes from a caller-supplied [`StdRng`] so a
//! fixed seed reproduces every dataset exactly.

use std::f64::consts::PI;

use chrono::{Duration, NaiveDate};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, Normal};

use crate::config::{MetricSpec, SynthConfig};
use crate::error::{ReportError, Result};

/// Mean temperature around which both signals oscillate.
const BASE_OFFSET: f64 = 15.0;
/// Amplitude of the shared periodic component.
const BASE_AMPLITUDE: f64 = 10.0;

/// Builds the random source for a run.
pub fn rng_for(seed: Option<u64>) -> StdRng {
    match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    }
}

/// Noise model applied independently to the observed and model signals.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum NoiseModel {
    /// Uniform noise in `[-amplitude, amplitude]`; the phase advances by `1/5` per sample.
    Uniform { observed: f64, model: f64 },
    /// Gaussian noise with the given standard deviations; one full period over the series.
    Gaussian { observed: f64, model: f64 },
}

impl NoiseModel {
    /// Noise used for the text-mode plot.
    pub const TEXT: Self = Self::Uniform {
        observed: 2.0,
        model: 1.0,
    };

    /// Noise used for the graphical chart.
    pub const GRAPHICAL: Self = Self::Gaussian {
        observed: 2.0,
        model: 1.0,
    };

    /// Observed and model noise amplitudes, in that order.
    pub fn amplitudes(&self) -> (f64, f64) {
        match *self {
            Self::Uniform { observed, model } | Self::Gaussian { observed, model } => {
                (observed, model)
            }
        }
    }

    fn phase(&self, index: usize, len: usize) -> f64 {
        match self {
            Self::Uniform { .. } => index as f64 / 5.0,
            Self::Gaussian { .. } if len > 1 => 2.0 * PI * index as f64 / (len - 1) as f64,
            Self::Gaussian { .. } => 0.0,
        }
    }

    fn sample<R: Rng + ?Sized>(&self, rng: &mut R, amplitude: f64) -> Result<f64> {
        if amplitude == 0.0 {
            return Ok(0.0);
        }
        match self {
            Self::Uniform { .. } => Ok(rng.gen_range(-amplitude..=amplitude)),
            Self::Gaussian { .. } => {
                let normal = Normal::new(0.0, amplitude)
                    .map_err(|err| ReportError::InvalidInput(format!("noise: {err}")))?;
                Ok(normal.sample(rng))
            }
        }
    }
}

/// Daily observed and modelled values over a shared date axis.
#[derive(Clone, Debug, PartialEq)]
pub struct TimeSeries {
    pub dates: Vec<NaiveDate>,
    pub observed: Vec<f64>,
    pub model: Vec<f64>,
    pub observed_noise: f64,
    pub model_noise: f64,
}

impl TimeSeries {
    pub fn len(&self) -> usize {
        self.dates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dates.is_empty()
    }

    /// Minimum and maximum over both series.
    pub fn value_range(&self) -> (f64, f64) {
        self.observed
            .iter()
            .chain(&self.model)
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &value| {
                (lo.min(value), hi.max(value))
            })
    }
}

/// Generates `days` samples of a shared sinusoid with independent noise on each series.
///
/// Fails when the model noise exceeds the observed noise, since the model is meant to be the
/// smoother of the two signals.
pub fn synthesize_time_series<R: Rng + ?Sized>(
    days: usize,
    start_date: NaiveDate,
    noise: NoiseModel,
    rng: &mut R,
) -> Result<TimeSeries> {
    let (observed_noise, model_noise) = noise.amplitudes();
    if !(0.0..=observed_noise).contains(&model_noise) {
        return Err(ReportError::InvalidInput(format!(
            "model noise {model_noise} must lie in [0, {observed_noise}]"
        )));
    }

    let dates: Vec<NaiveDate> = (0..days)
        .map(|offset| start_date + Duration::days(offset as i64))
        .collect();

    let base: Vec<f64> = (0..days)
        .map(|index| BASE_OFFSET + BASE_AMPLITUDE * noise.phase(index, days).sin())
        .collect();

    let mut observed = Vec::with_capacity(days);
    for value in &base {
        observed.push(value + noise.sample(rng, observed_noise)?);
    }
    let mut model = Vec::with_capacity(days);
    for value in &base {
        model.push(value + noise.sample(rng, model_noise)?);
    }

    Ok(TimeSeries {
        dates,
        observed,
        model,
        observed_noise,
        model_noise,
    })
}

/// Shape of the synthetic truth/model discrepancy.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FieldPattern {
    /// Gaussian bump; truth adds `0.1 sin(xy)`, the model adds `0.05 cos(xy)`.
    Gaussian,
    /// Damped radial ripple `2 sin(d/2) e^(-d/10)` around the grid centre.
    Ripple,
}

/// A truth field, a model field and their difference over a square grid.
///
/// Rows follow `ys`, columns follow `xs`; all three grids share the same coordinates.
#[derive(Clone, Debug, PartialEq)]
pub struct ErrorField {
    pub xs: Vec<f64>,
    pub ys: Vec<f64>,
    pub truth: Vec<Vec<f64>>,
    pub model: Vec<Vec<f64>>,
    pub error: Vec<Vec<f64>>,
}

impl ErrorField {
    pub fn size(&self) -> usize {
        self.xs.len()
    }

    /// Minimum and maximum error over all cells.
    pub fn error_range(&self) -> (f64, f64) {
        self.error
            .iter()
            .flatten()
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &value| {
                (lo.min(value), hi.max(value))
            })
    }
}

fn linspace(start: f64, end: f64, count: usize) -> Vec<f64> {
    match count {
        0 => return Vec::new(),
        1 => return vec![start],
        _ => {}
    }
    let step = (end - start) / (count - 1) as f64;
    (0..count).map(|index| start + step * index as f64).collect()
}

/// Builds the truth, model and error grids for `pattern`.
pub fn synthesize_error_field(grid_size: usize, extent: f64, pattern: FieldPattern) -> ErrorField {
    let xs = linspace(-extent, extent, grid_size);
    let ys = xs.clone();
    let centre = grid_size as f64 / 2.0;

    let mut truth = Vec::with_capacity(grid_size);
    let mut model = Vec::with_capacity(grid_size);
    for (row, &y) in ys.iter().enumerate() {
        let mut truth_row = Vec::with_capacity(grid_size);
        let mut model_row = Vec::with_capacity(grid_size);
        for (col, &x) in xs.iter().enumerate() {
            let base = (-(x * x + y * y) / 5.0).exp();
            let (t, m) = match pattern {
                FieldPattern::Gaussian => {
                    (base + 0.1 * (x * y).sin(), base + 0.05 * (x * y).cos())
                }
                FieldPattern::Ripple => {
                    let dr = row as f64 - centre;
                    let dc = col as f64 - centre;
                    let dist = (dr * dr + dc * dc).sqrt();
                    (base + 2.0 * (dist / 2.0).sin() * (-dist / 10.0).exp(), base)
                }
            };
            truth_row.push(t);
            model_row.push(m);
        }
        truth.push(truth_row);
        model.push(model_row);
    }

    let error = truth
        .iter()
        .zip(&model)
        .map(|(t_row, m_row)| t_row.iter().zip(m_row).map(|(t, m)| t - m).collect())
        .collect();

    ErrorField {
        xs,
        ys,
        truth,
        model,
        error,
    }
}

/// Region × metric table of model skill scores.
#[derive(Clone, Debug, PartialEq)]
pub struct StatisticsTable {
    pub regions: Vec<String>,
    pub metrics: Vec<String>,
    /// `values[region][metric]`.
    pub values: Vec<Vec<f64>>,
}

impl StatisticsTable {
    /// Iterates over `(region, row values)` pairs.
    pub fn rows(&self) -> impl Iterator<Item = (&str, &[f64])> {
        self.regions
            .iter()
            .map(String::as_str)
            .zip(self.values.iter().map(Vec::as_slice))
    }
}

/// Rounds to two decimal places.
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Draws one value per region and metric, row by row, rounded to two decimals.
pub fn synthesize_statistics<R: Rng + ?Sized>(
    regions: &[String],
    metrics: &[MetricSpec],
    rng: &mut R,
) -> StatisticsTable {
    let values = regions
        .iter()
        .map(|_| {
            metrics
                .iter()
                .map(|metric| round2(rng.gen_range(metric.low..=metric.high)))
                .collect()
        })
        .collect();

    StatisticsTable {
        regions: regions.to_vec(),
        metrics: metrics.iter().map(|metric| metric.name.clone()).collect(),
        values,
    }
}

/// The three datasets produced for one rendering mode.
#[derive(Clone, Debug)]
pub struct Datasets {
    pub series: TimeSeries,
    pub field: ErrorField,
    pub statistics: StatisticsTable,
}

/// Synthesizes the text-mode datasets.
///
/// The statistics table draws from its own RNG seeded with `seed` so that its values do not depend
/// on how many samples the time series consumed.
pub fn text_datasets(config: &SynthConfig, seed: Option<u64>) -> Result<Datasets> {
    let mut rng = rng_for(seed);
    let series = synthesize_time_series(config.days, config.start_date, NoiseModel::TEXT, &mut rng)?;
    let field = synthesize_error_field(config.grid_size, config.extent, FieldPattern::Ripple);
    let statistics =
        synthesize_statistics(&config.regions, &config.metrics, &mut rng_for(seed));
    Ok(Datasets {
        series,
        field,
        statistics,
    })
}

/// Synthesizes the graphical-mode datasets.
pub fn graphical_datasets(config: &SynthConfig, seed: Option<u64>) -> Result<Datasets> {
    let mut rng = rng_for(seed);
    let series = synthesize_time_series(
        config.graphical_days,
        config.start_date,
        NoiseModel::GRAPHICAL,
        &mut rng,
    )?;
    let field = synthesize_error_field(config.grid_size, config.extent, FieldPattern::Gaussian);
    let statistics =
        synthesize_statistics(&config.regions, &config.metrics, &mut rng_for(seed));
    Ok(Datasets {
        series,
        field,
        statistics,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn start() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 4, 1).expect("valid date")
    }

    #[test]
    fn series_share_index_domain() {
        for noise in [NoiseModel::TEXT, NoiseModel::GRAPHICAL] {
            let series =
                synthesize_time_series(45, start(), noise, &mut rng_for(Some(7))).expect("series");
            assert_eq!(series.observed.len(), 45);
            assert_eq!(series.model.len(), 45);
            assert_eq!(series.dates.len(), 45);
            assert!(series.model_noise <= series.observed_noise);
        }
    }

    #[test]
    fn uniform_noise_stays_within_amplitude() {
        let series = synthesize_time_series(200, start(), NoiseModel::TEXT, &mut rng_for(Some(1)))
            .expect("series");
        for (index, (obs, model)) in series.observed.iter().zip(&series.model).enumerate() {
            let base = BASE_OFFSET + BASE_AMPLITUDE * (index as f64 / 5.0).sin();
            assert!((obs - base).abs() <= 2.0 + 1e-9);
            assert!((model - base).abs() <= 1.0 + 1e-9);
        }
    }

    #[test]
    fn rejects_model_noisier_than_observations() {
        let noise = NoiseModel::Uniform {
            observed: 1.0,
            model: 2.0,
        };
        let result = synthesize_time_series(10, start(), noise, &mut rng_for(Some(1)));
        assert!(matches!(result, Err(ReportError::InvalidInput(_))));
    }

    #[test]
    fn dates_are_consecutive_days() {
        let series = synthesize_time_series(3, start(), NoiseModel::TEXT, &mut rng_for(None))
            .expect("series");
        assert_eq!(series.dates[2], NaiveDate::from_ymd_opt(2025, 4, 3).expect("date"));
    }

    #[test]
    fn error_is_truth_minus_model() {
        for pattern in [FieldPattern::Gaussian, FieldPattern::Ripple] {
            let field = synthesize_error_field(12, 5.0, pattern);
            assert_eq!(field.size(), 12);
            for row in 0..12 {
                for col in 0..12 {
                    let expected = field.truth[row][col] - field.model[row][col];
                    assert!((field.error[row][col] - expected).abs() < 1e-12);
                }
            }
        }
    }

    #[test]
    fn ripple_matches_radial_formula() {
        let field = synthesize_error_field(20, 5.0, FieldPattern::Ripple);
        let dist = (4.0f64 * 4.0 + 3.0 * 3.0).sqrt();
        let expected = 2.0 * (dist / 2.0).sin() * (-dist / 10.0).exp();
        assert!((field.error[6][7] - expected).abs() < 1e-12);
    }

    #[test]
    fn statistics_stay_in_metric_ranges() {
        let regions: Vec<String> = vec!["A".into(), "B".into(), "C".into()];
        let metrics = MetricSpec::defaults();
        let table = synthesize_statistics(&regions, &metrics, &mut rng_for(Some(3)));
        for (_, row) in table.rows() {
            for (value, metric) in row.iter().zip(&metrics) {
                assert!(*value >= round2(metric.low) && *value <= round2(metric.high));
                assert_eq!(*value, round2(*value));
            }
        }
    }

    #[test]
    fn seed_42_reproduces_table() {
        let config = SynthConfig::default();
        let first = synthesize_statistics(&config.regions, &config.metrics, &mut rng_for(Some(42)));
        let second =
            synthesize_statistics(&config.regions, &config.metrics, &mut rng_for(Some(42)));
        assert_eq!(first, second);
        assert_eq!(first.regions.len(), 5);
        assert_eq!(first.metrics.len(), 4);
    }
}
