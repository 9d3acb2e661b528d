//! Structured per-region output of one observed frame

use super::region::Rect;
use chrono::{DateTime, Utc};
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Reading {
    /// Winning template, or None when nothing cleared its threshold
    Template { template: Option<String> },
    /// Recognized text, or None when it was illegible
    Text {
        text: Option<String>,
        value: Option<i64>,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RegionReading {
    pub region: String,
    pub reading: Reading,
    /// Where the template matched, or the region itself for text
    pub bbox: Option<Rect>,
    /// Match score or text legibility
    pub confidence: f32,
}

impl RegionReading {
    /// Nothing matched or nothing legible
    pub fn is_empty(&self) -> bool {
        match &self.reading {
            Reading::Template { template } => template.is_none(),
            Reading::Text { text, .. } => text.is_none(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Observation {
    pub captured_at: DateTime<Utc>,
    pub entries: Vec<RegionReading>,
}

impl Observation {
    pub fn new(captured_at: DateTime<Utc>, entries: Vec<RegionReading>) -> Self {
        Self {
            captured_at,
            entries,
        }
    }

    pub fn entry(&self, region: &str) -> Option<&RegionReading> {
        self.entries.iter().find(|e| e.region == region)
    }

    /// Name of the template that won `region`
    pub fn template_in(&self, region: &str) -> Option<&str> {
        match &self.entry(region)?.reading {
            Reading::Template { template } => template.as_deref(),
            Reading::Text { .. } => None,
        }
    }

    pub fn text_in(&self, region: &str) -> Option<&str> {
        match &self.entry(region)?.reading {
            Reading::Text { text, .. } => text.as_deref(),
            Reading::Template { .. } => None,
        }
    }

    pub fn value_in(&self, region: &str) -> Option<i64> {
        match &self.entry(region)?.reading {
            Reading::Text { value, .. } => *value,
            Reading::Template { .. } => None,
        }
    }

    /// Bounding box of a non-empty entry
    pub fn bbox_of(&self, region: &str) -> Option<Rect> {
        self.entry(region).filter(|e| !e.is_empty())?.bbox
    }

    /// One line per entry, for logs and the CLI
    pub fn summary(&self) -> String {
        self.entries
            .iter()
            .map(|e| {
                let what = match &e.reading {
                    Reading::Template { template: Some(t) } => t.clone(),
                    Reading::Text { text: Some(t), .. } => format!("\"{t}\""),
                    _ => "-".to_string(),
                };
                format!("{}={} ({:.2})", e.region, what, e.confidence)
            })
            .collect::<Vec<_>>()
            .join(", ")
    }
}
