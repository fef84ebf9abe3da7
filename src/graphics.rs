//! Raster figures for the graphical rendering mode.
//!
//! Charts are drawn directly into RGB buffers with the [`image`] crate and saved as PNG. Titles,
//! axis labels, legend entries and colour-bar ticks are rasterized with `rusttype` from the same
//! regular face the PDF backend resolves. Without a font the figures are drawn without text; the
//! labels still travel alongside the image as [`FigureLabels`].

use std::path::{Path, PathBuf};

use image::{Rgb, RgbImage};
use log::warn;
use rusttype::{point, Font, Scale};

use crate::error::Result;
use crate::fonts;
use crate::synth::{ErrorField, TimeSeries};

const CHART_WIDTH: u32 = 1000;
const CHART_HEIGHT: u32 = 600;
const CHART_MARGIN: u32 = 60;

const CELL_PX: u32 = 24;
const MAP_MARGIN: u32 = 40;
const COLORBAR_WIDTH: u32 = 24;
const COLORBAR_GAP: u32 = 30;
const COLORBAR_TICK_SPACE: u32 = 70;

const TITLE_PX: f32 = 22.0;
const LABEL_PX: f32 = 16.0;
const TICK_PX: f32 = 13.0;

/// Number of filled contour levels in the heatmap.
pub const CONTOUR_LEVELS: usize = 20;

const WHITE: Rgb<u8> = Rgb([255, 255, 255]);
const AXIS: Rgb<u8> = Rgb([40, 40, 40]);
const GRID: Rgb<u8> = Rgb([200, 200, 200]);
const OBSERVED: Rgb<u8> = Rgb([31, 119, 180]);
const MODEL: Rgb<u8> = Rgb([214, 39, 40]);

pub const LEGEND_OBSERVED: &str = "Observations";
pub const LEGEND_MODEL: &str = "Model";

/// Human-readable text that accompanies a rendered figure.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FigureLabels {
    pub title: String,
    pub x_label: String,
    pub y_label: String,
}

impl FigureLabels {
    /// Builds labels, repairing any mis-decoded text.
    pub fn new(title: &str, x_label: &str, y_label: &str) -> Self {
        Self {
            title: normalize_label(title),
            x_label: normalize_label(x_label),
            y_label: normalize_label(y_label),
        }
    }
}

/// A figure written to disk together with its labels.
#[derive(Clone, Debug)]
pub struct Figure {
    pub path: PathBuf,
    pub labels: FigureLabels,
}

/// Repairs UTF-8 text that was decoded as Latin-1 (for example `Â°C` becomes `°C`) and drops
/// control characters.
///
/// Text that is not recognizably mis-decoded is returned unchanged apart from control characters.
pub fn normalize_label(text: &str) -> String {
    let looks_misdecoded = text.chars().all(|c| (c as u32) <= 0xFF)
        && text.chars().any(|c| (0x80..=0xFF).contains(&(c as u32)));

    let repaired = if looks_misdecoded {
        let bytes: Vec<u8> = text.chars().map(|c| c as u32 as u8).collect();
        String::from_utf8(bytes).unwrap_or_else(|_| text.to_string())
    } else {
        text.to_string()
    };

    repaired.chars().filter(|c| !c.is_control()).collect()
}

/// Coverage mask of one rasterized string, row-major.
struct TextMask {
    width: u32,
    height: u32,
    coverage: Vec<f32>,
}

impl TextMask {
    fn at(&self, x: u32, y: u32) -> f32 {
        self.coverage[(y * self.width + x) as usize]
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Orientation {
    Horizontal,
    /// Rotated a quarter turn counter-clockwise, reading bottom to top.
    Upward,
}

/// TrueType face used for the text inside figures.
pub struct LabelFont {
    font: Font<'static>,
}

impl LabelFont {
    /// Loads the regular face of the report font family, logging a warning when none is found.
    pub fn load(configured: Option<&Path>) -> Option<Self> {
        let Some(path) = fonts::regular_font_file(configured) else {
            warn!("No font found for figure labels; figures are drawn without text");
            return None;
        };
        let loaded = std::fs::read(&path)
            .map_err(|err| err.to_string())
            .and_then(|bytes| Self::from_bytes(bytes).map_err(|err| err.to_string()));
        match loaded {
            Ok(font) => Some(font),
            Err(err) => {
                warn!("Failed to load label font {}: {err}", path.display());
                None
            }
        }
    }

    pub fn from_bytes(bytes: Vec<u8>) -> std::result::Result<Self, rusttype::Error> {
        Ok(Self {
            font: Font::from_bytes(bytes)?,
        })
    }

    fn rasterize(&self, text: &str, px: f32) -> TextMask {
        let scale = Scale::uniform(px);
        let metrics = self.font.v_metrics(scale);
        let glyphs: Vec<_> = self.font.layout(text, scale, point(0.0, metrics.ascent)).collect();

        let width = glyphs
            .last()
            .map(|glyph| glyph.position().x + glyph.unpositioned().h_metrics().advance_width)
            .unwrap_or(0.0)
            .ceil()
            .max(0.0) as u32;
        let height = (metrics.ascent - metrics.descent).ceil().max(1.0) as u32;
        let mut coverage = vec![0.0f32; (width * height) as usize];

        for glyph in &glyphs {
            let Some(bounds) = glyph.pixel_bounding_box() else {
                continue;
            };
            glyph.draw(|gx, gy, value| {
                let x = bounds.min.x + gx as i32;
                let y = bounds.min.y + gy as i32;
                if x >= 0 && y >= 0 && (x as u32) < width && (y as u32) < height {
                    let cell = &mut coverage[(y as u32 * width + x as u32) as usize];
                    *cell = cell.max(value);
                }
            });
        }

        TextMask {
            width,
            height,
            coverage,
        }
    }
}

/// Footprint of a mask once placed with `orientation`.
fn footprint(mask: &TextMask, orientation: Orientation) -> (u32, u32) {
    match orientation {
        Orientation::Horizontal => (mask.width, mask.height),
        Orientation::Upward => (mask.height, mask.width),
    }
}

/// Blends `mask` into the image with its footprint's top-left corner at `(x, y)`.
fn stamp(image: &mut RgbImage, mask: &TextMask, x: i64, y: i64, orientation: Orientation, color: Rgb<u8>) {
    for my in 0..mask.height {
        for mx in 0..mask.width {
            let alpha = mask.at(mx, my);
            let (px, py) = match orientation {
                Orientation::Horizontal => (x + mx as i64, y + my as i64),
                Orientation::Upward => (x + my as i64, y + (mask.width - 1 - mx) as i64),
            };
            blend(image, px, py, color, alpha);
        }
    }
}

/// Draws `text` centred on `center` along the main axis, with its cross-axis start at `start`.
fn centered_text(
    image: &mut RgbImage,
    font: Option<&LabelFont>,
    text: &str,
    px: f32,
    center: i64,
    start: i64,
    orientation: Orientation,
) {
    let Some(font) = font else {
        return;
    };
    let mask = font.rasterize(text, px);
    let (width, height) = footprint(&mask, orientation);
    match orientation {
        Orientation::Horizontal => stamp(image, &mask, center - width as i64 / 2, start, orientation, AXIS),
        Orientation::Upward => stamp(image, &mask, start, center - height as i64 / 2, orientation, AXIS),
    }
}

/// Draws `text` left-aligned at `x`, vertically centred on `middle`.
fn text_at(image: &mut RgbImage, font: Option<&LabelFont>, text: &str, px: f32, x: i64, middle: i64) {
    if let Some(font) = font {
        let mask = font.rasterize(text, px);
        stamp(image, &mask, x, middle - mask.height as i64 / 2, Orientation::Horizontal, AXIS);
    }
}

fn text_width(font: Option<&LabelFont>, text: &str, px: f32) -> u32 {
    font.map_or(0, |font| font.rasterize(text, px).width)
}

fn blend(image: &mut RgbImage, x: i64, y: i64, color: Rgb<u8>, alpha: f32) {
    if alpha <= 0.0 || x < 0 || y < 0 || (x as u32) >= image.width() || (y as u32) >= image.height() {
        return;
    }
    let pixel = image.get_pixel_mut(x as u32, y as u32);
    for (channel, target) in pixel.0.iter_mut().zip(color.0) {
        *channel = lerp(*channel, target, alpha.min(1.0) as f64);
    }
}

fn put(image: &mut RgbImage, x: i64, y: i64, color: Rgb<u8>) {
    if x >= 0 && y >= 0 && (x as u32) < image.width() && (y as u32) < image.height() {
        image.put_pixel(x as u32, y as u32, color);
    }
}

fn draw_line(image: &mut RgbImage, from: (i64, i64), to: (i64, i64), color: Rgb<u8>) {
    let (mut x0, mut y0) = from;
    let (x1, y1) = to;
    let dx = (x1 - x0).abs();
    let dy = -(y1 - y0).abs();
    let sx = if x0 < x1 { 1 } else { -1 };
    let sy = if y0 < y1 { 1 } else { -1 };
    let mut err = dx + dy;
    loop {
        put(image, x0, y0, color);
        put(image, x0, y0 + 1, color);
        if x0 == x1 && y0 == y1 {
            break;
        }
        let e2 = 2 * err;
        if e2 >= dy {
            err += dy;
            x0 += sx;
        }
        if e2 <= dx {
            err += dx;
            y0 += sy;
        }
    }
}

fn fill_rect(image: &mut RgbImage, x: u32, y: u32, width: u32, height: u32, color: Rgb<u8>) {
    for py in y..y + height {
        for px in x..x + width {
            put(image, px as i64, py as i64, color);
        }
    }
}

/// Draws two series as a line chart with a dashed grid and a legend.
///
/// Text is drawn only when `font` is given.
pub fn render_time_series_chart(
    series: &TimeSeries,
    labels: FigureLabels,
    font: Option<&LabelFont>,
    path: &Path,
) -> Result<Figure> {
    let mut image = RgbImage::from_pixel(CHART_WIDTH, CHART_HEIGHT, WHITE);
    let left = CHART_MARGIN as i64;
    let right = (CHART_WIDTH - CHART_MARGIN) as i64;
    let top = CHART_MARGIN as i64;
    let bottom = (CHART_HEIGHT - CHART_MARGIN) as i64;

    for step in 1..10 {
        let y = top + (bottom - top) * step / 10;
        let x = left + (right - left) * step / 10;
        for offset in (0..(right - left)).step_by(8) {
            for dash in 0..4 {
                put(&mut image, left + offset + dash, y, GRID);
            }
        }
        for offset in (0..(bottom - top)).step_by(8) {
            for dash in 0..4 {
                put(&mut image, x, top + offset + dash, GRID);
            }
        }
    }

    draw_line(&mut image, (left, top), (left, bottom), AXIS);
    draw_line(&mut image, (left, bottom), (right, bottom), AXIS);

    let (min, max) = series.value_range();
    let span = if max - min > f64::EPSILON { max - min } else { 1.0 };
    let samples = series.len().max(2) - 1;
    let project = |index: usize, value: f64| {
        let x = left + ((right - left) as f64 * index as f64 / samples as f64).round() as i64;
        let y = bottom - ((bottom - top) as f64 * (value - min) / span).round() as i64;
        (x, y)
    };

    for (values, color) in [(&series.observed, OBSERVED), (&series.model, MODEL)] {
        for (index, pair) in values.windows(2).enumerate() {
            draw_line(
                &mut image,
                project(index, pair[0]),
                project(index + 1, pair[1]),
                color,
            );
        }
    }

    let entries = [(LEGEND_OBSERVED, OBSERVED), (LEGEND_MODEL, MODEL)];
    let text = entries
        .iter()
        .map(|(name, _)| text_width(font, name, LABEL_PX))
        .max()
        .unwrap_or(0);
    let box_x = left + 12;
    let box_y = top + 10;
    let box_w = 64 + text as i64;
    let box_h = 48;
    fill_rect(&mut image, box_x as u32, box_y as u32, box_w as u32, box_h as u32, WHITE);
    draw_line(&mut image, (box_x, box_y), (box_x + box_w, box_y), GRID);
    draw_line(&mut image, (box_x, box_y + box_h), (box_x + box_w, box_y + box_h), GRID);
    draw_line(&mut image, (box_x, box_y), (box_x, box_y + box_h), GRID);
    draw_line(&mut image, (box_x + box_w, box_y), (box_x + box_w, box_y + box_h), GRID);
    for (row, (name, color)) in entries.iter().enumerate() {
        let middle = box_y + 14 + row as i64 * 20;
        fill_rect(&mut image, box_x as u32 + 8, middle as u32 - 3, 40, 6, *color);
        text_at(&mut image, font, name, LABEL_PX, box_x + 56, middle);
    }

    let center_x = (left + right) / 2;
    centered_text(&mut image, font, &labels.title, TITLE_PX, center_x, 14, Orientation::Horizontal);
    centered_text(&mut image, font, &labels.x_label, LABEL_PX, center_x, bottom + 24, Orientation::Horizontal);
    centered_text(&mut image, font, &labels.y_label, LABEL_PX, (top + bottom) / 2, 16, Orientation::Upward);

    image.save(path)?;
    Ok(Figure {
        path: path.to_path_buf(),
        labels,
    })
}

fn lerp(a: u8, b: u8, t: f64) -> u8 {
    (a as f64 + (b as f64 - a as f64) * t).round().clamp(0.0, 255.0) as u8
}

/// Diverging blue-white-red colour map over `t` in `[0, 1]`.
pub fn cool_warm(t: f64) -> Rgb<u8> {
    const COLD: [u8; 3] = [59, 76, 192];
    const NEUTRAL: [u8; 3] = [221, 221, 221];
    const WARM: [u8; 3] = [180, 4, 38];

    let t = t.clamp(0.0, 1.0);
    let (from, to, local) = if t < 0.5 {
        (COLD, NEUTRAL, t * 2.0)
    } else {
        (NEUTRAL, WARM, (t - 0.5) * 2.0)
    };
    Rgb([
        lerp(from[0], to[0], local),
        lerp(from[1], to[1], local),
        lerp(from[2], to[2], local),
    ])
}

/// Index of the filled contour level that `value` falls into.
pub fn contour_level(value: f64, min: f64, max: f64) -> usize {
    if max - min <= f64::EPSILON {
        return CONTOUR_LEVELS / 2;
    }
    let scaled = (value - min) / (max - min) * CONTOUR_LEVELS as f64;
    (scaled.floor().max(0.0) as usize).min(CONTOUR_LEVELS - 1)
}

fn level_color(level: usize) -> Rgb<u8> {
    cool_warm((level as f64 + 0.5) / CONTOUR_LEVELS as f64)
}

/// Draws the error grid as a quantized heatmap with a vertical colour bar ticked at the error
/// range's ends.
///
/// Row 0 of the grid (the most negative latitude) is drawn at the bottom of the image.
pub fn render_error_heatmap(
    field: &ErrorField,
    labels: FigureLabels,
    font: Option<&LabelFont>,
    path: &Path,
) -> Result<Figure> {
    let cells = field.size() as u32;
    let map_size = cells * CELL_PX;
    let width = MAP_MARGIN * 2 + map_size + COLORBAR_GAP + COLORBAR_WIDTH + COLORBAR_TICK_SPACE;
    let height = MAP_MARGIN * 2 + map_size;
    let mut image = RgbImage::from_pixel(width, height, WHITE);

    let (min, max) = field.error_range();
    for (row, values) in field.error.iter().enumerate() {
        let y = MAP_MARGIN + (cells - 1 - row as u32) * CELL_PX;
        for (col, &value) in values.iter().enumerate() {
            let x = MAP_MARGIN + col as u32 * CELL_PX;
            let color = level_color(contour_level(value, min, max));
            fill_rect(&mut image, x, y, CELL_PX, CELL_PX, color);
        }
    }

    let bar_x = MAP_MARGIN + map_size + COLORBAR_GAP;
    for py in 0..map_size {
        let t = 1.0 - py as f64 / map_size.max(1) as f64;
        let level = ((t * CONTOUR_LEVELS as f64) as usize).min(CONTOUR_LEVELS - 1);
        fill_rect(&mut image, bar_x, MAP_MARGIN + py, COLORBAR_WIDTH, 1, level_color(level));
    }
    let bar_left = bar_x as i64;
    let bar_right = (bar_x + COLORBAR_WIDTH) as i64;
    let bar_top = MAP_MARGIN as i64;
    let bar_bottom = (MAP_MARGIN + map_size) as i64;
    draw_line(&mut image, (bar_left, bar_top), (bar_right, bar_top), AXIS);
    draw_line(&mut image, (bar_left, bar_bottom), (bar_right, bar_bottom), AXIS);
    draw_line(&mut image, (bar_left, bar_top), (bar_left, bar_bottom), AXIS);
    draw_line(&mut image, (bar_right, bar_top), (bar_right, bar_bottom), AXIS);

    for (value, y) in [(max, bar_top), (min, bar_bottom)] {
        draw_line(&mut image, (bar_right, y), (bar_right + 5, y), AXIS);
        text_at(&mut image, font, &format!("{value:.2}"), TICK_PX, bar_right + 9, y);
    }

    let map_center = (MAP_MARGIN + map_size / 2) as i64;
    centered_text(&mut image, font, &labels.title, LABEL_PX, map_center, 10, Orientation::Horizontal);
    centered_text(&mut image, font, &labels.x_label, LABEL_PX, map_center, bar_bottom + 10, Orientation::Horizontal);
    centered_text(&mut image, font, &labels.y_label, LABEL_PX, map_center, 10, Orientation::Upward);

    image.save(path)?;
    Ok(Figure {
        path: path.to_path_buf(),
        labels,
    })
}
