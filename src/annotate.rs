//! Highlight rendering for grounded search hits.
//!
//! Scales normalized boxes to the page image and draws outlined rectangles
//! with the plotters bitmap backend, cycling through a fixed palette.

use std::io::Cursor;

use image::{DynamicImage, ImageFormat, RgbImage};
use plotters::prelude::*;
use thiserror::Error;

use crate::search::NormalizedBox;

#[derive(Debug, Error)]
pub enum AnnotateError {
    #[error("Invalid bounding box: {0}")]
    InvalidBox(String),

    #[error("Failed to decode page image: {0}")]
    Decode(#[source] image::ImageError),

    #[error("Failed to encode annotated image: {0}")]
    Encode(#[source] image::ImageError),

    #[error("Failed to draw highlights: {0}")]
    Render(String),
}

pub const DEFAULT_PALETTE: [RGBColor; 5] = [
    RGBColor(0xFF, 0x41, 0x36),
    RGBColor(0x00, 0x74, 0xD9),
    RGBColor(0x2E, 0xCC, 0x40),
    RGBColor(0xFF, 0xDC, 0x00),
    RGBColor(0xB1, 0x0D, 0xC9),
];

#[derive(Debug, Clone)]
pub struct AnnotationStyle {
    /// Outline thickness in pixels
    pub line_width: u32,
    /// Gap between the text region and the outline
    pub padding: u32,
    pub palette: Vec<RGBColor>,
}

impl Default for AnnotationStyle {
    fn default() -> Self {
        Self {
            line_width: 4,
            padding: 6,
            palette: DEFAULT_PALETTE.to_vec(),
        }
    }
}

/// Pixel rectangle, inclusive on all sides
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PixelRect {
    pub left: i32,
    pub top: i32,
    pub right: i32,
    pub bottom: i32,
}

/// Scale a normalized box to an image and grow it by `inset` pixels, clamped to the image.
pub fn pixel_rect(bbox: &NormalizedBox, width: u32, height: u32, inset: u32) -> PixelRect {
    let (w, h) = (width as f64, height as f64);
    let inset = inset as i64;
    let max_x = width.saturating_sub(1) as i64;
    let max_y = height.saturating_sub(1) as i64;

    let left = (bbox.l * w).floor() as i64 - inset;
    let top = (bbox.t * h).floor() as i64 - inset;
    let right = (bbox.r * w).ceil() as i64 + inset;
    let bottom = (bbox.b * h).ceil() as i64 + inset;

    PixelRect {
        left: left.clamp(0, max_x) as i32,
        top: top.clamp(0, max_y) as i32,
        right: right.clamp(0, max_x) as i32,
        bottom: bottom.clamp(0, max_y) as i32,
    }
}

/// Draw `boxes` on an encoded page image and return it re-encoded as PNG.
pub fn annotate(
    page_image: &[u8],
    boxes: &[NormalizedBox],
    style: &AnnotationStyle,
) -> Result<Vec<u8>, AnnotateError> {
    if let Some((idx, bad)) = boxes.iter().enumerate().find(|(_, b)| !b.is_valid()) {
        return Err(AnnotateError::InvalidBox(format!(
            "box #{} ({}, {}, {}, {}) must lie within [0, 1] with l <= r and t <= b",
            idx, bad.l, bad.t, bad.r, bad.b
        )));
    }

    let image = image::load_from_memory(page_image)
        .map_err(AnnotateError::Decode)?
        .to_rgb8();
    let (width, height) = image.dimensions();
    let mut buffer = image.into_raw();

    if !boxes.is_empty() && width > 0 && height > 0 {
        draw_boxes(&mut buffer, width, height, boxes, style)?;
    }

    let annotated = RgbImage::from_raw(width, height, buffer)
        .ok_or_else(|| AnnotateError::Render("pixel buffer size changed while drawing".to_string()))?;
    let mut out = Cursor::new(Vec::new());
    DynamicImage::ImageRgb8(annotated)
        .write_to(&mut out, ImageFormat::Png)
        .map_err(AnnotateError::Encode)?;
    Ok(out.into_inner())
}

fn draw_boxes(
    buffer: &mut [u8],
    width: u32,
    height: u32,
    boxes: &[NormalizedBox],
    style: &AnnotationStyle,
) -> Result<(), AnnotateError> {
    let palette: &[RGBColor] = if style.palette.is_empty() {
        &DEFAULT_PALETTE
    } else {
        &style.palette
    };
    let line_width = style.line_width.max(1) as i32;
    let inset = style.padding + style.line_width;

    let root = BitMapBackend::with_buffer(buffer, (width, height)).into_drawing_area();
    for (bbox, color) in boxes.iter().zip(palette.iter().cycle()) {
        let rect = pixel_rect(bbox, width, height, inset);
        // Thick outlines are nested 1px rectangles growing inward.
        for i in 0..line_width {
            let (l, t, r, b) = (rect.left + i, rect.top + i, rect.right - i, rect.bottom - i);
            if l > r || t > b {
                break;
            }
            root.draw(&Rectangle::new([(l, t), (r, b)], color.stroke_width(1)))
                .map_err(|e| AnnotateError::Render(e.to_string()))?;
        }
    }
    root.present()
        .map_err(|e| AnnotateError::Render(e.to_string()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    const WHITE: Rgb<u8> = Rgb([255, 255, 255]);
    const RED: Rgb<u8> = Rgb([0xFF, 0x41, 0x36]);

    fn blank_png(width: u32, height: u32) -> Vec<u8> {
        let img = RgbImage::from_pixel(width, height, WHITE);
        let mut out = Cursor::new(Vec::new());
        DynamicImage::ImageRgb8(img)
            .write_to(&mut out, ImageFormat::Png)
            .unwrap();
        out.into_inner()
    }

    fn thin_style() -> AnnotationStyle {
        AnnotationStyle {
            line_width: 1,
            padding: 0,
            palette: DEFAULT_PALETTE.to_vec(),
        }
    }

    #[test]
    fn test_rectangle_matches_scaled_box() {
        let png = blank_png(200, 100);
        let bbox = NormalizedBox { l: 0.1, t: 0.1, r: 0.5, b: 0.5 };

        assert_eq!(
            pixel_rect(&bbox, 200, 100, 0),
            PixelRect { left: 20, top: 10, right: 100, bottom: 50 }
        );

        let out = annotate(&png, &[bbox], &thin_style()).unwrap();
        let img = image::load_from_memory(&out).unwrap().to_rgb8();
        assert_eq!(img.dimensions(), (200, 100));

        // Edges sit at box x dimensions.
        assert_eq!(*img.get_pixel(20, 30), RED);
        assert_eq!(*img.get_pixel(100, 30), RED);
        assert_eq!(*img.get_pixel(60, 10), RED);
        assert_eq!(*img.get_pixel(60, 50), RED);

        // Inside and outside stay untouched.
        assert_eq!(*img.get_pixel(60, 30), WHITE);
        assert_eq!(*img.get_pixel(19, 30), WHITE);
        assert_eq!(*img.get_pixel(101, 30), WHITE);
        assert_eq!(*img.get_pixel(60, 51), WHITE);
    }

    #[test]
    fn test_default_style_pads_outward_and_thickens() {
        let png = blank_png(200, 100);
        let bbox = NormalizedBox { l: 0.25, t: 0.3, r: 0.75, b: 0.7 };

        let out = annotate(&png, &[bbox], &AnnotationStyle::default()).unwrap();
        let img = image::load_from_memory(&out).unwrap().to_rgb8();

        // left = 50 - (6 + 4) = 40, outline covers x in 40..=43
        assert_eq!(*img.get_pixel(40, 50), RED);
        assert_eq!(*img.get_pixel(43, 50), RED);
        assert_eq!(*img.get_pixel(44, 50), WHITE);
        assert_eq!(*img.get_pixel(39, 50), WHITE);
    }

    #[test]
    fn test_palette_cycles_per_box() {
        let png = blank_png(100, 100);
        let boxes = [
            NormalizedBox { l: 0.1, t: 0.1, r: 0.2, b: 0.2 },
            NormalizedBox { l: 0.5, t: 0.5, r: 0.6, b: 0.6 },
        ];

        let out = annotate(&png, &boxes, &thin_style()).unwrap();
        let img = image::load_from_memory(&out).unwrap().to_rgb8();

        assert_eq!(*img.get_pixel(10, 15), RED);
        assert_eq!(*img.get_pixel(50, 55), Rgb([0x00, 0x74, 0xD9]));
    }

    #[test]
    fn test_boxes_are_clamped_to_image() {
        let bbox = NormalizedBox { l: 0.0, t: 0.0, r: 1.0, b: 1.0 };
        assert_eq!(
            pixel_rect(&bbox, 50, 40, 10),
            PixelRect { left: 0, top: 0, right: 49, bottom: 39 }
        );
    }

    #[test]
    fn test_invalid_box_is_rejected() {
        let png = blank_png(10, 10);
        let bad = NormalizedBox { l: 0.8, t: 0.1, r: 0.2, b: 0.5 };
        assert!(matches!(
            annotate(&png, &[bad], &thin_style()),
            Err(AnnotateError::InvalidBox(_))
        ));
    }

    #[test]
    fn test_garbage_image_fails_to_decode() {
        let bbox = NormalizedBox { l: 0.1, t: 0.1, r: 0.2, b: 0.2 };
        assert!(matches!(
            annotate(b"not an image", &[bbox], &thin_style()),
            Err(AnnotateError::Decode(_))
        ));
    }

    #[test]
    fn test_no_boxes_returns_plain_png() {
        let png = blank_png(8, 8);
        let out = annotate(&png, &[], &thin_style()).unwrap();
        let img = image::load_from_memory(&out).unwrap().to_rgb8();
        assert!(img.pixels().all(|p| *p == WHITE));
    }
}
