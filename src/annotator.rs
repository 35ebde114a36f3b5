use crate::{config::AnnotationConfig, prediction::Prediction};
use ab_glyph::{FontVec, PxScale};
use bytes::Bytes;
use font8x8::{UnicodeFonts, BASIC_FONTS};
use image::{ImageFormat, Rgb, RgbImage};
use imageproc::{
    drawing::{draw_hollow_rect_mut, draw_text_mut},
    rect::Rect,
};
use std::io::Cursor;
use thiserror::Error;

const BOX_COLOR: Rgb<u8> = Rgb([255, 0, 0]);
const BOX_THICKNESS: i32 = 3;
const LABEL_OFFSET: i32 = 25;
const BITMAP_SCALE: u32 = 2;

#[derive(Error, Debug)]
pub enum AnnotateError {
    #[error("Failed to decode image: {0}")]
    Decode(image::ImageError),
    #[error("Failed to encode image: {0}")]
    Encode(image::ImageError),
}

pub enum LabelFont {
    Scalable { font: FontVec, scale: PxScale },
    Bitmap { scale: u32 },
}

impl LabelFont {
    /// Loads the configured TrueType font, or falls back to the built-in bitmap font.
    pub fn load(config: &AnnotationConfig) -> Self {
        let loaded = std::fs::read(&config.font_path)
            .map_err(|e| e.to_string())
            .and_then(|data| FontVec::try_from_vec(data).map_err(|e| e.to_string()));

        match loaded {
            Ok(font) => {
                tracing::info!("Using label font {}", config.font_path.display());
                LabelFont::Scalable {
                    font,
                    scale: PxScale::from(config.font_size),
                }
            }
            Err(e) => {
                tracing::warn!(
                    "Could not load font {} ({}), using built-in bitmap font",
                    config.font_path.display(),
                    e
                );
                LabelFont::Bitmap {
                    scale: BITMAP_SCALE,
                }
            }
        }
    }

    fn draw(&self, image: &mut RgbImage, x: i32, y: i32, text: &str) {
        match self {
            LabelFont::Scalable { font, scale } => {
                draw_text_mut(image, BOX_COLOR, x, y, *scale, font, text)
            }
            LabelFont::Bitmap { scale } => draw_bitmap_text(image, x, y, *scale, text),
        }
    }
}

pub struct Annotator {
    font: LabelFont,
}

impl Annotator {
    pub fn new(config: &AnnotationConfig) -> Self {
        Self {
            font: LabelFont::load(config),
        }
    }

    pub fn with_font(font: LabelFont) -> Self {
        Self { font }
    }

    /// Draws every prediction and re-encodes as JPEG.
    pub fn annotate(
        &self,
        image_bytes: &[u8],
        predictions: &[Prediction],
    ) -> Result<Vec<u8>, AnnotateError> {
        let mut image = image::load_from_memory(image_bytes)
            .map_err(AnnotateError::Decode)?
            .to_rgb8();

        self.draw_predictions(&mut image, predictions);

        let mut buffer = Cursor::new(Vec::new());
        image
            .write_to(&mut buffer, ImageFormat::Jpeg)
            .map_err(AnnotateError::Encode)?;
        Ok(buffer.into_inner())
    }

    /// Like [`Annotator::annotate`], but hands back the original bytes on failure.
    pub fn annotate_or_original(&self, image_bytes: Bytes, predictions: &[Prediction]) -> Bytes {
        if predictions.is_empty() {
            return image_bytes;
        }
        match self.annotate(&image_bytes, predictions) {
            Ok(annotated) => Bytes::from(annotated),
            Err(e) => {
                tracing::warn!("Failed to draw bounding boxes: {}", e);
                image_bytes
            }
        }
    }

    pub fn draw_predictions(&self, image: &mut RgbImage, predictions: &[Prediction]) {
        let (width, height) = (image.width() as f64, image.height() as f64);

        for prediction in predictions {
            let coordinates = [prediction.x_min, prediction.y_min, prediction.x_max, prediction.y_max];
            if coordinates.iter().any(|v| v.is_nan()) {
                tracing::debug!("Skipping box with missing coordinates: {:?}", prediction);
                continue;
            }
            let (x_min, x_max) = ordered(prediction.x_min, prediction.x_max);
            let (y_min, y_max) = ordered(prediction.y_min, prediction.y_max);
            if !(x_max >= 0.0 && y_max >= 0.0 && x_min < width && y_min < height) {
                tracing::debug!("Skipping box outside the image: {:?}", prediction);
                continue;
            }

            let x_min = clamp_to_canvas(x_min, width);
            let y_min = clamp_to_canvas(y_min, height);
            let x_max = clamp_to_canvas(x_max, width);
            let y_max = clamp_to_canvas(y_max, height);

            draw_box(image, x_min, y_min, x_max, y_max);
            self.font
                .draw(image, x_min, y_min - LABEL_OFFSET, &prediction.caption());
        }
    }
}

fn ordered(a: f64, b: f64) -> (f64, f64) {
    (a.min(b), a.max(b))
}

/// Keeps an edge at most one outline width beyond the canvas.
fn clamp_to_canvas(value: f64, extent: f64) -> i32 {
    let margin = BOX_THICKNESS as f64;
    value.clamp(-margin, extent + margin).round() as i32
}

fn draw_box(image: &mut RgbImage, x_min: i32, y_min: i32, x_max: i32, y_max: i32) {
    for inset in 0..BOX_THICKNESS {
        let width = (x_max as i64 - x_min as i64) + 1 - 2 * inset as i64;
        let height = (y_max as i64 - y_min as i64) + 1 - 2 * inset as i64;
        if width <= 0 || height <= 0 {
            break;
        }
        let rect = Rect::at(x_min + inset, y_min + inset).of_size(width as u32, height as u32);
        draw_hollow_rect_mut(image, rect, BOX_COLOR);
    }
}

fn draw_bitmap_text(image: &mut RgbImage, x: i32, y: i32, scale: u32, text: &str) {
    let scale = scale.max(1) as i32;
    let (width, height) = (image.width() as i32, image.height() as i32);

    for (index, c) in text.chars().enumerate() {
        let glyph = BASIC_FONTS
            .get(c)
            .or_else(|| BASIC_FONTS.get('?'))
            .unwrap_or([0; 8]);
        let origin_x = x + index as i32 * 8 * scale;

        for (row, bits) in glyph.iter().enumerate() {
            for col in 0..8 {
                if bits & (1 << col) == 0 {
                    continue;
                }
                for dy in 0..scale {
                    for dx in 0..scale {
                        let px = origin_x + col * scale + dx;
                        let py = y + row as i32 * scale + dy;
                        if px >= 0 && py >= 0 && px < width && py < height {
                            image.put_pixel(px as u32, py as u32, BOX_COLOR);
                        }
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::{
        path::PathBuf,
        time::{Duration, Instant},
    };

    const GRAY: Rgb<u8> = Rgb([128, 128, 128]);

    fn bitmap_annotator() -> Annotator {
        Annotator::with_font(LabelFont::Bitmap { scale: 2 })
    }

    fn jpeg(width: u32, height: u32) -> Vec<u8> {
        let image = RgbImage::from_pixel(width, height, GRAY);
        let mut buffer = Cursor::new(Vec::new());
        image.write_to(&mut buffer, ImageFormat::Jpeg).unwrap();
        buffer.into_inner()
    }

    #[test]
    fn test_missing_font_falls_back_to_bitmap() {
        let config = AnnotationConfig {
            font_path: PathBuf::from("/nonexistent/font.ttf"),
            font_size: 20.0,
        };

        assert_eq!(LabelFont::load(&config).draw_kind(), "bitmap");
    }

    #[test]
    fn test_zero_predictions_return_input_bytes() {
        let input = Bytes::from(jpeg(64, 64));

        let output = bitmap_annotator().annotate_or_original(input.clone(), &[]);

        assert_eq!(output, input);
    }

    #[test]
    fn test_draws_rectangle_at_prediction_box() {
        let mut image = RgbImage::from_pixel(100, 100, GRAY);
        let prediction = Prediction::new(10.0, 40.0, 50.0, 80.0, "car", 0.87);

        bitmap_annotator().draw_predictions(&mut image, &[prediction]);

        // All three rings of the outline.
        for inset in 0..3 {
            assert_eq!(*image.get_pixel(10 + inset, 60), BOX_COLOR);
            assert_eq!(*image.get_pixel(50 - inset, 60), BOX_COLOR);
            assert_eq!(*image.get_pixel(30, 40 + inset), BOX_COLOR);
            assert_eq!(*image.get_pixel(30, 80 - inset), BOX_COLOR);
        }
        assert_eq!(*image.get_pixel(30, 60), GRAY);
        assert_eq!(*image.get_pixel(9, 60), GRAY);
    }

    #[test]
    fn test_draws_label_above_box() {
        let mut image = RgbImage::from_pixel(200, 100, GRAY);
        let prediction = Prediction::new(10.0, 40.0, 50.0, 80.0, "car", 0.87);
        assert_eq!(prediction.caption(), "car (0.87)");

        bitmap_annotator().draw_predictions(&mut image, &[prediction]);

        // The label band sits 25px above the top edge and is 16px tall.
        let label_pixels = (15..31)
            .flat_map(|y| (10..170).map(move |x| (x, y)))
            .filter(|&(x, y)| *image.get_pixel(x, y) == BOX_COLOR)
            .count();
        assert!(label_pixels > 50);
        assert_eq!(*image.get_pixel(100, 10), GRAY);
    }

    #[test]
    fn test_label_near_top_edge_is_clipped() {
        let mut image = RgbImage::from_pixel(100, 100, GRAY);
        let prediction = Prediction::new(0.0, 0.0, 20.0, 20.0, "person", 0.5);

        bitmap_annotator().draw_predictions(&mut image, &[prediction]);

        assert_eq!(*image.get_pixel(0, 0), BOX_COLOR);
    }

    #[test]
    fn test_oversized_box_is_clamped_to_image() {
        let mut image = RgbImage::from_pixel(100, 100, GRAY);
        let started = Instant::now();

        bitmap_annotator().draw_predictions(
            &mut image,
            &[
                Prediction::new(0.0, 0.0, 2e9, 2e9, "car", 0.9),
                Prediction::new(-3e9, 0.0, 3e9, 10.0, "truck", 0.8),
            ],
        );

        assert!(started.elapsed() < Duration::from_secs(5));
        assert_eq!(*image.get_pixel(0, 50), BOX_COLOR);
        assert_eq!(*image.get_pixel(50, 10), BOX_COLOR);
        assert_eq!(*image.get_pixel(50, 50), GRAY);
    }

    #[test]
    fn test_box_outside_image_is_skipped() {
        let mut image = RgbImage::from_pixel(100, 100, GRAY);
        let untouched = image.clone();

        bitmap_annotator().draw_predictions(
            &mut image,
            &[
                Prediction::new(200.0, 200.0, 300.0, 300.0, "car", 0.9),
                Prediction::new(-50.0, -50.0, -10.0, -10.0, "car", 0.9),
                Prediction::new(f64::NAN, 0.0, 10.0, 10.0, "car", 0.9),
            ],
        );

        assert_eq!(image, untouched);
    }

    #[test]
    fn test_truetype_font_draws_label() {
        let config = AnnotationConfig::default();
        let font = LabelFont::load(&config);
        if font.draw_kind() != "scalable" {
            // No system font installed here.
            return;
        }
        let mut image = RgbImage::from_pixel(200, 100, GRAY);

        Annotator::with_font(font).draw_predictions(
            &mut image,
            &[Prediction::new(10.0, 40.0, 50.0, 80.0, "car", 0.87)],
        );

        let label_pixels = (15..40)
            .flat_map(|y| (10..190).map(move |x| (x, y)))
            .filter(|&(x, y)| *image.get_pixel(x, y) != GRAY)
            .count();
        assert!(label_pixels > 20);
    }

    #[test]
    fn test_annotate_reencodes_jpeg() {
        let input = jpeg(120, 90);
        let prediction = Prediction::new(10.0, 10.0, 50.0, 50.0, "car", 0.87);

        let output = bitmap_annotator().annotate(&input, &[prediction]).unwrap();

        assert_eq!(image::guess_format(&output).unwrap(), ImageFormat::Jpeg);
        let decoded = image::load_from_memory(&output).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (120, 90));
        assert_ne!(output, input);
    }

    #[test]
    fn test_corrupt_image_returns_original_bytes() {
        let input = Bytes::from_static(b"definitely not an image");
        let prediction = Prediction::new(10.0, 10.0, 50.0, 50.0, "car", 0.87);

        let annotator = bitmap_annotator();
        assert!(matches!(
            annotator.annotate(&input, &[prediction.clone()]),
            Err(AnnotateError::Decode(_))
        ));
        assert_eq!(annotator.annotate_or_original(input.clone(), &[prediction]), input);
    }

    impl LabelFont {
        fn draw_kind(&self) -> &'static str {
            match self {
                LabelFont::Scalable { .. } => "scalable",
                LabelFont::Bitmap { .. } => "bitmap",
            }
        }
    }
}
