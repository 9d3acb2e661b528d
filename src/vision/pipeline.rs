//! Frame -> Observation

use super::catalog::{Catalog, RegionKind, RegionSpec, TextSpec};
use super::error::{VisionError, VisionResult};
use super::observation::{Observation, Reading, RegionReading};
use super::ocr::{GlyphRecognizer, TextEngine, TextReading, TextRecognizer};
use super::template::best_match;
use crate::device::Frame;
use image::{GrayImage, imageops::FilterType};
use std::sync::Arc;

pub struct VisionPipeline {
    catalog: Arc<Catalog>,
    text: TextEngine,
}

/// Keep the digits only. "45/120" becomes "45120".
pub fn strip_non_numeric(text: &str) -> String {
    text.chars().filter(char::is_ascii_digit).collect()
}

impl VisionPipeline {
    pub fn new(catalog: Arc<Catalog>, text: TextEngine) -> Self {
        Self { catalog, text }
    }

    /// Pipeline reading text with the catalog's own glyphs
    pub fn with_glyphs(catalog: Arc<Catalog>) -> Self {
        let glyphs = GlyphRecognizer::new(catalog.glyphs().to_vec());
        Self::new(catalog, TextEngine::Glyphs(glyphs))
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    /// Observe the named regions. Unknown names are an error; regions
    /// without a match are not.
    pub fn observe(&self, frame: &Frame, regions: &[&str]) -> VisionResult<Observation> {
        let specs = regions
            .iter()
            .map(|name| {
                self.catalog
                    .region(name)
                    .ok_or_else(|| VisionError::UnknownRegion(name.to_string()))
            })
            .collect::<VisionResult<Vec<_>>>()?;
        Ok(self.observe_specs(frame, &specs))
    }

    /// Observe every catalog region.
    pub fn observe_all(&self, frame: &Frame) -> Observation {
        let specs: Vec<&RegionSpec> = self.catalog.regions().iter().collect();
        self.observe_specs(frame, &specs)
    }

    /// Read one text region, surfacing low confidence as an error.
    pub fn read_text(&self, frame: &Frame, region: &str) -> VisionResult<TextReading> {
        let spec = self
            .catalog
            .region(region)
            .ok_or_else(|| VisionError::UnknownRegion(region.to_string()))?;
        let RegionKind::Text(text_spec) = &spec.kind else {
            return Err(VisionError::UnknownRegion(format!("{region} (not a text region)")));
        };
        let gray = self.normalize(frame);
        self.read_text_region(&gray, spec, text_spec)
    }

    fn observe_specs(&self, frame: &Frame, specs: &[&RegionSpec]) -> Observation {
        let start = std::time::Instant::now();
        let gray = self.normalize(frame);
        let entries = specs
            .iter()
            .map(|spec| match &spec.kind {
                RegionKind::Templates(candidates) => self.match_region(&gray, spec, candidates),
                RegionKind::Text(text_spec) => self.text_entry(&gray, spec, text_spec),
            })
            .collect();
        let observation = Observation::new(frame.timestamp(), entries);
        log::debug!(
            "Observed {} regions in {}ms: {}",
            specs.len(),
            start.elapsed().as_millis(),
            observation.summary()
        );
        observation
    }

    /// Grayscale at catalog reference size
    fn normalize(&self, frame: &Frame) -> GrayImage {
        let gray = frame.image().to_luma8();
        let (rw, rh) = self.catalog.reference_size;
        if gray.dimensions() == (rw, rh) {
            gray
        } else {
            image::imageops::resize(&gray, rw, rh, FilterType::Triangle)
        }
    }

    /// Highest score above its own threshold wins; the earlier candidate keeps a tie.
    fn match_region(&self, gray: &GrayImage, spec: &RegionSpec, candidates: &[usize]) -> RegionReading {
        let mut best: Option<(usize, f32, super::Rect)> = None;
        let mut best_seen = 0.0f32;
        for &idx in candidates {
            let template = &self.catalog.templates()[idx];
            let Some(hit) = best_match(gray, spec.rect, &template.image) else {
                continue;
            };
            best_seen = best_seen.max(hit.score);
            if hit.score <= template.threshold {
                continue;
            }
            if best.is_none_or(|(_, score, _)| hit.score > score) {
                best = Some((idx, hit.score, hit.bbox));
            }
        }

        match best {
            Some((idx, score, bbox)) => RegionReading {
                region: spec.name.clone(),
                reading: Reading::Template {
                    template: Some(self.catalog.templates()[idx].name.clone()),
                },
                bbox: Some(bbox),
                confidence: score,
            },
            None => RegionReading {
                region: spec.name.clone(),
                reading: Reading::Template { template: None },
                bbox: None,
                confidence: best_seen,
            },
        }
    }

    fn read_text_region(
        &self,
        gray: &GrayImage,
        spec: &RegionSpec,
        text_spec: &TextSpec,
    ) -> VisionResult<TextReading> {
        let r = spec.rect.clip_to_screen(gray.width(), gray.height());
        let crop = image::imageops::crop_imm(gray, r.x, r.y, r.width, r.height).to_image();
        let mut reading = self.text.read(&crop)?;
        if text_spec.numeric {
            reading.text = strip_non_numeric(&reading.text);
        }
        if reading.text.is_empty() || reading.legibility < text_spec.min_legibility {
            return Err(VisionError::RecognitionLowConfidence {
                region: spec.name.clone(),
                legibility: reading.legibility,
                minimum: text_spec.min_legibility,
            });
        }
        Ok(reading)
    }

    fn text_entry(&self, gray: &GrayImage, spec: &RegionSpec, text_spec: &TextSpec) -> RegionReading {
        match self.read_text_region(gray, spec, text_spec) {
            Ok(reading) => {
                let value = if text_spec.numeric {
                    reading.text.parse::<i64>().ok()
                } else {
                    None
                };
                RegionReading {
                    region: spec.name.clone(),
                    reading: Reading::Text {
                        text: Some(reading.text),
                        value,
                    },
                    bbox: Some(spec.rect),
                    confidence: reading.legibility,
                }
            }
            Err(e) => {
                log::debug!("{e}");
                let confidence = match e {
                    VisionError::RecognitionLowConfidence { legibility, .. } => legibility,
                    _ => 0.0,
                };
                RegionReading {
                    region: spec.name.clone(),
                    reading: Reading::Text {
                        text: None,
                        value: None,
                    },
                    bbox: None,
                    confidence,
                }
            }
        }
    }
}
