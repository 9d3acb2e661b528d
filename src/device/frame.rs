use chrono::{DateTime, Utc};
use image::DynamicImage;
use std::sync::Arc;

/// One captured screen image. Cheap to clone; the pixels are never mutated.
#[derive(Debug, Clone)]
pub struct Frame {
    image: Arc<DynamicImage>,
    captured_at: DateTime<Utc>,
}

impl Frame {
    pub fn new(image: DynamicImage) -> Self {
        Self::captured_at(image, Utc::now())
    }

    pub fn captured_at(image: DynamicImage, captured_at: DateTime<Utc>) -> Self {
        Self {
            image: Arc::new(image),
            captured_at,
        }
    }

    pub fn from_png(bytes: &[u8]) -> Result<Self, image::ImageError> {
        Ok(Self::new(image::load_from_memory(bytes)?))
    }

    pub fn image(&self) -> &DynamicImage {
        &self.image
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.captured_at
    }

    pub fn size(&self) -> (u32, u32) {
        (self.image.width(), self.image.height())
    }
}
