//! Text extraction over a cropped region
//!
//! The built-in recognizer segments a binarised crop into glyph columns and
//! matches each against catalog glyph images. With the `ocr-models` feature an
//! ocrs engine can be used instead.

use super::error::{VisionError, VisionResult};
use image::{GrayImage, Luma, imageops::FilterType};
use imageproc::contrast::otsu_level;
use imageproc::template_matching::{MatchTemplateMethod, match_template};

#[derive(Debug, Clone, PartialEq)]
pub struct TextReading {
    pub text: String,
    /// 0.0 (unreadable) to 1.0
    pub legibility: f32,
}

pub trait TextRecognizer {
    fn read(&self, crop: &GrayImage) -> VisionResult<TextReading>;
}

/// A reference character, stored binarised with text as white.
#[derive(Debug, Clone)]
pub struct Glyph {
    pub ch: char,
    pub image: GrayImage,
}

impl Glyph {
    pub fn new(ch: char, image: &GrayImage) -> Self {
        let binary = binarize(image);
        let runs = column_runs(&binary);
        let image = match (runs.first(), runs.last()) {
            (Some(&(left, _)), Some(&(_, right))) => match ink_bounds(&binary, left, right) {
                Some((top, bottom)) => {
                    image::imageops::crop_imm(&binary, left, top, right - left, bottom - top)
                        .to_image()
                }
                None => binary,
            },
            _ => binary,
        };
        Self { ch, image }
    }
}

/// Otsu threshold, flipped so the minority (ink) class is white.
pub fn binarize(image: &GrayImage) -> GrayImage {
    let level = otsu_level(image);
    let mut out = GrayImage::new(image.width(), image.height());
    let mut white = 0usize;
    for (x, y, p) in image.enumerate_pixels() {
        let v = if p[0] > level { 255 } else { 0 };
        if v == 255 {
            white += 1;
        }
        out.put_pixel(x, y, Luma([v]));
    }
    if white * 2 > (image.width() * image.height()) as usize {
        image::imageops::invert(&mut out);
    }
    out
}

/// Contiguous column runs containing ink: `(start, end)` exclusive.
fn column_runs(binary: &GrayImage) -> Vec<(u32, u32)> {
    let mut runs = Vec::new();
    let mut start = None;
    for x in 0..binary.width() {
        let inked = (0..binary.height()).any(|y| binary.get_pixel(x, y)[0] > 0);
        match (inked, start) {
            (true, None) => start = Some(x),
            (false, Some(s)) => {
                runs.push((s, x));
                start = None;
            }
            _ => {}
        }
    }
    if let Some(s) = start {
        runs.push((s, binary.width()));
    }
    runs
}

/// First and one-past-last inked row within columns `x0..x1`.
fn ink_bounds(binary: &GrayImage, x0: u32, x1: u32) -> Option<(u32, u32)> {
    let inked_row = |y: u32| (x0..x1).any(|x| binary.get_pixel(x, y)[0] > 0);
    let top = (0..binary.height()).find(|&y| inked_row(y))?;
    let bottom = (0..binary.height()).rev().find(|&y| inked_row(y))? + 1;
    Some((top, bottom))
}

fn similarity(a: &GrayImage, b: &GrayImage) -> f32 {
    let resized = image::imageops::resize(a, b.width(), b.height(), FilterType::Triangle);
    let score = match_template(&resized, b, MatchTemplateMethod::CrossCorrelationNormalized)
        .get_pixel(0, 0)[0];
    if score.is_finite() { score } else { 0.0 }
}

/// Glyph-template text reader.
#[derive(Debug, Clone)]
pub struct GlyphRecognizer {
    glyphs: Vec<Glyph>,
    /// Glyph matches below this are dropped from the text
    min_glyph_score: f32,
}

impl GlyphRecognizer {
    pub fn new(glyphs: Vec<Glyph>) -> Self {
        Self {
            glyphs,
            min_glyph_score: 0.5,
        }
    }

    fn classify(&self, cell: &GrayImage) -> Option<(char, f32)> {
        self.glyphs
            .iter()
            .map(|g| (g.ch, similarity(cell, &g.image)))
            .fold(None, |best: Option<(char, f32)>, (ch, score)| match best {
                Some((_, s)) if s >= score => best,
                _ => Some((ch, score)),
            })
    }
}

impl TextRecognizer for GlyphRecognizer {
    fn read(&self, crop: &GrayImage) -> VisionResult<TextReading> {
        if self.glyphs.is_empty() {
            return Err(VisionError::Ocr("no glyphs in catalog".into()));
        }
        let binary = binarize(crop);
        let runs = column_runs(&binary);

        let mut text = String::new();
        let mut total = 0.0f32;
        let mut count = 0usize;
        let mut prev_end: Option<u32> = None;
        for (x0, x1) in runs {
            let Some((top, bottom)) = ink_bounds(&binary, x0, x1) else {
                continue;
            };
            let height = bottom - top;
            if let Some(end) = prev_end
                && x0 - end > height / 2
            {
                text.push(' ');
            }
            prev_end = Some(x1);

            let cell = image::imageops::crop_imm(&binary, x0, top, x1 - x0, height).to_image();
            if let Some((ch, score)) = self.classify(&cell) {
                total += score;
                count += 1;
                if score >= self.min_glyph_score {
                    text.push(ch);
                }
            }
        }

        let legibility = if count == 0 { 0.0 } else { total / count as f32 };
        Ok(TextReading {
            text: text.trim().to_string(),
            legibility,
        })
    }
}

/// Neural text reader backed by ocrs model files.
#[cfg(feature = "ocr-models")]
pub struct OcrsRecognizer {
    engine: ocrs::OcrEngine,
}

#[cfg(feature = "ocr-models")]
impl OcrsRecognizer {
    pub fn load(detection: &std::path::Path, recognition: &std::path::Path) -> VisionResult<Self> {
        let load = |p: &std::path::Path| {
            rten::Model::load_file(p)
                .map_err(|e| VisionError::Ocr(format!("{}: {e}", p.display())))
        };
        let engine = ocrs::OcrEngine::new(ocrs::OcrEngineParams {
            detection_model: Some(load(detection)?),
            recognition_model: Some(load(recognition)?),
            ..Default::default()
        })
        .map_err(|e| VisionError::Ocr(e.to_string()))?;
        Ok(Self { engine })
    }
}

#[cfg(feature = "ocr-models")]
impl TextRecognizer for OcrsRecognizer {
    fn read(&self, crop: &GrayImage) -> VisionResult<TextReading> {
        let rgb = image::DynamicImage::ImageLuma8(crop.clone()).into_rgb8();
        let source = ocrs::ImageSource::from_bytes(rgb.as_raw(), rgb.dimensions())
            .map_err(|e| VisionError::Ocr(e.to_string()))?;
        let input = self
            .engine
            .prepare_input(source)
            .map_err(|e| VisionError::Ocr(e.to_string()))?;
        let text = self
            .engine
            .get_text(&input)
            .map_err(|e| VisionError::Ocr(e.to_string()))?;
        let text = text.trim().to_string();
        // ocrs exposes no per-line confidence; anything decoded counts as legible
        let legibility = if text.is_empty() { 0.0 } else { 1.0 };
        Ok(TextReading { text, legibility })
    }
}

/// The configured text reader.
pub enum TextEngine {
    Glyphs(GlyphRecognizer),
    #[cfg(feature = "ocr-models")]
    Ocrs(Box<OcrsRecognizer>),
}

impl TextRecognizer for TextEngine {
    fn read(&self, crop: &GrayImage) -> VisionResult<TextReading> {
        match self {
            TextEngine::Glyphs(g) => g.read(crop),
            #[cfg(feature = "ocr-models")]
            TextEngine::Ocrs(o) => o.read(crop),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vision::tests::{digit_glyphs, render_digits};

    #[test]
    fn binarize_makes_ink_white() {
        // dark text on a light background
        let mut img = GrayImage::from_pixel(10, 10, Luma([220]));
        img.put_pixel(5, 5, Luma([10]));
        let b = binarize(&img);
        assert_eq!(b.get_pixel(5, 5)[0], 255);
        assert_eq!(b.get_pixel(0, 0)[0], 0);
    }

    #[test]
    fn reads_rendered_digits() {
        let recognizer = GlyphRecognizer::new(digit_glyphs());
        let crop = render_digits("1027", 4);
        let reading = recognizer.read(&crop).unwrap();
        assert_eq!(reading.text, "1027");
        assert!(reading.legibility > 0.9, "legibility {}", reading.legibility);
    }

    #[test]
    fn blank_crop_has_zero_legibility() {
        let recognizer = GlyphRecognizer::new(digit_glyphs());
        let reading = recognizer.read(&GrayImage::from_pixel(40, 12, Luma([30]))).unwrap();
        assert_eq!(reading.text, "");
        assert_eq!(reading.legibility, 0.0);
    }
}
