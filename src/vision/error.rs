use std::path::PathBuf;
use thiserror::Error;

use super::region::Rect;

pub type VisionResult<T> = Result<T, VisionError>;

/// Problems with the reference asset catalog, all detected at load time.
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("catalog manifest is malformed: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("catalog version {found} is not supported (expected {supported})")]
    UnsupportedVersion { found: u32, supported: u32 },

    #[error("template '{name}' could not be loaded from {path}: {source}")]
    TemplateLoad {
        name: String,
        path: PathBuf,
        source: image::ImageError,
    },

    #[error("crop {crop:?} of '{name}' exceeds the image bounds ({width}x{height})")]
    CropOutOfBounds {
        name: String,
        crop: Rect,
        width: u32,
        height: u32,
    },

    #[error("{kind} '{name}' is declared twice")]
    Duplicate { kind: &'static str, name: String },

    #[error("{referenced_by} refers to unknown {kind} '{name}'")]
    UnknownReference {
        kind: &'static str,
        name: String,
        referenced_by: String,
    },

    #[error("region '{0}' must declare either template candidates or a text spec")]
    AmbiguousRegionKind(String),
}

#[derive(Debug, Error)]
pub enum VisionError {
    #[error(transparent)]
    Catalog(#[from] CatalogError),

    #[error("region '{0}' is not in the catalog")]
    UnknownRegion(String),

    #[error("text in region '{region}' is not legible (score {legibility:.2} < {minimum:.2})")]
    RecognitionLowConfidence {
        region: String,
        legibility: f32,
        minimum: f32,
    },

    #[error("text recognition failed: {0}")]
    Ocr(String),
}
