//! Reference images and the normalized cross-correlation matcher

use super::error::CatalogError;
use super::region::Rect;
use image::GrayImage;
use imageproc::template_matching::{MatchTemplateMethod, find_extremes, match_template};
use std::path::Path;

#[derive(Debug, Clone)]
pub struct Template {
    pub name: String,
    pub image: GrayImage,
    /// A match is accepted only when its score exceeds this
    pub threshold: f32,
}

impl Template {
    pub fn new(name: impl Into<String>, image: GrayImage, threshold: f32) -> Self {
        Self {
            name: name.into(),
            image,
            threshold,
        }
    }

    /// Load from disk. The crop comes from `crop`, else from a `[x,y,w,h]` in the file name.
    pub fn load(
        name: &str,
        path: &Path,
        crop: Option<Rect>,
        threshold: f32,
    ) -> Result<Self, CatalogError> {
        let image = image::open(path)
            .map_err(|source| CatalogError::TemplateLoad {
                name: name.to_string(),
                path: path.to_path_buf(),
                source,
            })?
            .to_luma8();

        let crop = crop.or_else(|| {
            path.file_name()
                .and_then(|f| f.to_str())
                .and_then(Rect::parse_from_filename)
        });

        let image = match crop {
            Some(c) => {
                if !c.is_valid() || !c.fits_within(image.width(), image.height()) {
                    return Err(CatalogError::CropOutOfBounds {
                        name: name.to_string(),
                        crop: c,
                        width: image.width(),
                        height: image.height(),
                    });
                }
                image::imageops::crop_imm(&image, c.x, c.y, c.width, c.height).to_image()
            }
            None => image,
        };

        Ok(Self::new(name, image, threshold))
    }

    pub fn dimensions(&self) -> (u32, u32) {
        self.image.dimensions()
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MatchHit {
    pub score: f32,
    /// Location of the best match in frame coordinates
    pub bbox: Rect,
}

/// Best normalized cross-correlation of `template` inside `area` of `haystack`.
/// None when the template does not fit inside the area.
pub fn best_match(haystack: &GrayImage, area: Rect, template: &GrayImage) -> Option<MatchHit> {
    let area = area.clip_to_screen(haystack.width(), haystack.height());
    let (tw, th) = template.dimensions();
    if !area.is_valid() || tw == 0 || th == 0 || tw > area.width || th > area.height {
        return None;
    }

    let patch = image::imageops::crop_imm(haystack, area.x, area.y, area.width, area.height).to_image();
    let scores = match_template(&patch, template, MatchTemplateMethod::CrossCorrelationNormalized);
    let extremes = find_extremes(&scores);
    // Flat black patches divide by zero
    let score = if extremes.max_value.is_finite() {
        extremes.max_value
    } else {
        0.0
    };
    let (mx, my) = extremes.max_value_location;
    Some(MatchHit {
        score,
        bbox: Rect::new(area.x + mx, area.y + my, tw, th),
    })
}
