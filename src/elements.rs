//! Extended element implementations built on top of `genpdf` primitives.
//!
//! Figures are embedded as [`CaptionedImage`]: the PNG is decoded with the [`image`] crate for
//! friendly error messages, sized from its pixel dimensions at a fixed DPI and optionally scaled to a
//! requested width.

use std::path::Path;

use image::GenericImageView;

use genpdf::elements::{Image, Paragraph};
use genpdf::error::{Context as _, Error};
use genpdf::style::Style;
use genpdf::{render, Alignment, Element, Mm, Position, RenderResult, Scale, Size};

const DEFAULT_IMAGE_DPI: f64 = 300.0;
const MM_PER_INCH: f64 = 25.4;
const DEFAULT_CAPTION_SPACING_MM: f64 = 2.0;

pub(crate) fn mm_from_f64(value: f64) -> Mm {
    Mm::from(printpdf::Mm(value))
}

fn mm_to_f64(value: Mm) -> f64 {
    let mm: printpdf::Mm = value.into();
    mm.0
}

fn estimated_image_size(image: &image::DynamicImage, dpi: f64) -> Size {
    let (px_width, px_height) = image.dimensions();
    let width_mm = MM_PER_INCH * (px_width as f64) / dpi;
    let height_mm = MM_PER_INCH * (px_height as f64) / dpi;
    Size::new(mm_from_f64(width_mm), mm_from_f64(height_mm))
}

/// Loads an image from the given path using the [`image`] crate with descriptive errors.
pub fn decode_image_from_path(path: impl AsRef<Path>) -> Result<image::DynamicImage, Error> {
    let path = path.as_ref();
    let reader = image::io::Reader::open(path)
        .with_context(|| format!("Failed to open image file {}", path.display()))?;
    reader
        .with_guessed_format()
        .context("Unable to determine image format")?
        .decode()
        .with_context(|| format!("Failed to decode image file {}", path.display()))
}

/// An image with a caption stacked underneath.
///
/// The image and the caption share the same alignment and the image can be rescaled to a specific
/// width while keeping the aspect ratio.
pub struct CaptionedImage {
    image: Image,
    caption: Paragraph,
    alignment: Alignment,
    natural_size: Size,
    requested_width: Option<Mm>,
    spacing: Mm,
}

impl CaptionedImage {
    /// Creates a captioned image from the file located at `path`.
    pub fn from_path(path: impl AsRef<Path>, caption: Paragraph) -> Result<Self, Error> {
        let dynamic = decode_image_from_path(path)?;
        let natural_size = estimated_image_size(&dynamic, DEFAULT_IMAGE_DPI);
        let image = Image::from_dynamic_image(dynamic)?;

        let mut element = Self {
            image,
            caption,
            alignment: Alignment::Left,
            natural_size,
            requested_width: None,
            spacing: mm_from_f64(DEFAULT_CAPTION_SPACING_MM),
        };
        element.apply_alignment();
        Ok(element)
    }

    /// Sets the horizontal alignment used by both the image and the caption.
    pub fn with_alignment(mut self, alignment: Alignment) -> Self {
        self.alignment = alignment;
        self.apply_alignment();
        self
    }

    /// Constrains the rendered width while preserving the aspect ratio.
    pub fn with_width(mut self, width: impl Into<Option<Mm>>) -> Self {
        self.requested_width = width.into();
        self.apply_width();
        self
    }

    fn apply_alignment(&mut self) {
        self.image.set_alignment(self.alignment);
        self.caption.set_alignment(self.alignment);
    }

    fn apply_width(&mut self) {
        let scale = match self.requested_width {
            Some(width) => {
                let natural = mm_to_f64(self.natural_size.width);
                if natural > f64::EPSILON {
                    mm_to_f64(width) / natural
                } else {
                    1.0
                }
            }
            None => 1.0,
        };
        self.image.set_scale(Scale::new(scale, scale));
    }
}

impl Element for CaptionedImage {
    fn render(
        &mut self,
        context: &genpdf::Context,
        mut area: render::Area<'_>,
        style: Style,
    ) -> Result<RenderResult, Error> {
        let mut result = RenderResult::default();
        let image_result = self.image.render(context, area.clone(), style)?;
        result.size = result.size.stack_vertical(image_result.size);
        result.has_more |= image_result.has_more;

        let spacing = self.spacing;
        area.add_offset(Position::new(0, image_result.size.height + spacing));
        if mm_to_f64(spacing) > 0.0 {
            result.size = result.size.stack_vertical(Size::new(0, spacing));
        }

        let caption_result = self.caption.render(context, area, style)?;
        result.size = result.size.stack_vertical(caption_result.size);
        result.has_more |= caption_result.has_more;

        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn image_size_follows_dpi() {
        let image = image::DynamicImage::new_rgb8(300, 150);
        let size = estimated_image_size(&image, DEFAULT_IMAGE_DPI);
        assert!((mm_to_f64(size.width) - 25.4).abs() < 1e-6);
        assert!((mm_to_f64(size.height) - 12.7).abs() < 1e-6);
    }

    #[test]
    fn missing_file_is_reported_with_path() {
        let err = CaptionedImage::from_path("/nonexistent/figure.png", Paragraph::default())
            .err()
            .expect("missing image");
        assert!(err.to_string().contains("/nonexistent/figure.png"));
    }
}
