//! Vision Pipeline: template matching and text recognition over catalog regions
//!
//! Frames are normalised to the catalog's reference resolution, then every
//! requested region yields exactly one entry, matched or empty.

pub mod catalog;
pub mod error;
pub mod observation;
pub mod ocr;
pub mod pipeline;
pub mod region;
pub mod template;


pub use catalog::{Catalog, CatalogBuilder, RegionKind, RegionSpec, TextSpec};
pub use error::{CatalogError, VisionError, VisionResult};
pub use observation::{Observation, Reading, RegionReading};
pub use ocr::{GlyphRecognizer, TextEngine, TextReading, TextRecognizer};
pub use pipeline::{VisionPipeline, strip_non_numeric};
pub use region::Rect;
pub use template::{MatchHit, Template, best_match};
