//! Versioned reference asset catalog: templates, regions, buttons and screen rules
//!
//! Adding a screen means adding entries to `catalog.json`, never engine code.

use super::error::CatalogError;
use super::ocr::Glyph;
use super::region::Rect;
use super::template::Template;
use crate::recognizer::{Predicate, StateRule};
use serde::Deserialize;
use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};

pub const CATALOG_VERSION: u32 = 1;
pub const CATALOG_FILE: &str = "catalog.json";
pub const DEFAULT_REFERENCE_SIZE: (u32, u32) = (720, 1280);

#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct TextSpec {
    /// Strip everything but digits and parse the remainder as an integer
    #[serde(default)]
    pub numeric: bool,
    #[serde(default = "default_min_legibility")]
    pub min_legibility: f32,
}

fn default_min_legibility() -> f32 {
    0.7
}

impl Default for TextSpec {
    fn default() -> Self {
        Self {
            numeric: false,
            min_legibility: default_min_legibility(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum RegionKind {
    /// Indices into the catalog's templates, in declaration order
    Templates(Vec<usize>),
    Text(TextSpec),
}

#[derive(Debug, Clone, PartialEq)]
pub struct RegionSpec {
    pub name: String,
    pub rect: Rect,
    pub kind: RegionKind,
}

#[derive(Debug)]
pub struct Catalog {
    pub version: u32,
    pub reference_size: (u32, u32),
    templates: Vec<Template>,
    glyphs: Vec<Glyph>,
    regions: Vec<RegionSpec>,
    buttons: BTreeMap<String, Rect>,
    rules: Vec<StateRule>,
}

// On-disk manifest layout
#[derive(Debug, Deserialize)]
struct Manifest {
    version: u32,
    #[serde(default = "default_reference_size")]
    reference_size: [u32; 2],
    #[serde(default)]
    templates: Vec<TemplateEntry>,
    #[serde(default)]
    glyphs: Vec<GlyphEntry>,
    #[serde(default)]
    regions: Vec<RegionEntry>,
    #[serde(default)]
    buttons: BTreeMap<String, Rect>,
    #[serde(default)]
    screens: Vec<StateRule>,
}

fn default_reference_size() -> [u32; 2] {
    [DEFAULT_REFERENCE_SIZE.0, DEFAULT_REFERENCE_SIZE.1]
}

#[derive(Debug, Deserialize)]
struct TemplateEntry {
    name: String,
    file: PathBuf,
    threshold: Option<f32>,
    crop: Option<Rect>,
}

#[derive(Debug, Deserialize)]
struct GlyphEntry {
    #[serde(rename = "char")]
    ch: char,
    file: PathBuf,
}

#[derive(Debug, Deserialize)]
struct RegionEntry {
    name: String,
    rect: Rect,
    #[serde(default)]
    templates: Vec<String>,
    text: Option<TextSpec>,
}

impl Catalog {
    pub fn builder(reference_size: (u32, u32)) -> CatalogBuilder {
        CatalogBuilder {
            reference_size,
            templates: Vec::new(),
            glyphs: Vec::new(),
            regions: Vec::new(),
            buttons: BTreeMap::new(),
            rules: Vec::new(),
        }
    }

    /// Load `<dir>/catalog.json` and every image it names (paths relative to `dir`).
    pub fn load(dir: &Path, default_threshold: f32) -> Result<Self, CatalogError> {
        let path = dir.join(CATALOG_FILE);
        let text = std::fs::read_to_string(&path).map_err(|source| CatalogError::Io {
            path: path.clone(),
            source,
        })?;
        let catalog = Self::from_manifest(&text, dir, default_threshold)?;
        log::info!(
            "Loaded catalog v{} from {}: {} templates, {} regions, {} buttons, {} screen rules",
            catalog.version,
            path.display(),
            catalog.templates.len(),
            catalog.regions.len(),
            catalog.buttons.len(),
            catalog.rules.len()
        );
        Ok(catalog)
    }

    pub fn from_manifest(
        json: &str,
        dir: &Path,
        default_threshold: f32,
    ) -> Result<Self, CatalogError> {
        let manifest: Manifest = serde_json::from_str(json)?;
        if manifest.version != CATALOG_VERSION {
            return Err(CatalogError::UnsupportedVersion {
                found: manifest.version,
                supported: CATALOG_VERSION,
            });
        }

        let [w, h] = manifest.reference_size;
        let mut builder = Catalog::builder((w, h));
        for t in manifest.templates {
            let threshold = t.threshold.unwrap_or(default_threshold);
            builder = builder.template(Template::load(&t.name, &dir.join(&t.file), t.crop, threshold)?);
        }
        for g in manifest.glyphs {
            let path = dir.join(&g.file);
            let image = image::open(&path)
                .map_err(|source| CatalogError::TemplateLoad {
                    name: g.ch.to_string(),
                    path,
                    source,
                })?
                .to_luma8();
            builder = builder.glyph(g.ch, &image);
        }
        for r in manifest.regions {
            builder = match (r.text, r.templates.is_empty()) {
                (Some(spec), true) => builder.text_region(&r.name, r.rect, spec),
                (None, false) => {
                    let names: Vec<&str> = r.templates.iter().map(String::as_str).collect();
                    builder.template_region(&r.name, r.rect, &names)
                }
                _ => return Err(CatalogError::AmbiguousRegionKind(r.name)),
            };
        }
        for (name, rect) in manifest.buttons {
            builder = builder.button(&name, rect);
        }
        for rule in manifest.screens {
            builder = builder.rule(rule);
        }
        builder.build()
    }

    pub fn templates(&self) -> &[Template] {
        &self.templates
    }

    pub fn template(&self, name: &str) -> Option<&Template> {
        self.templates.iter().find(|t| t.name == name)
    }

    pub fn glyphs(&self) -> &[Glyph] {
        &self.glyphs
    }

    pub fn regions(&self) -> &[RegionSpec] {
        &self.regions
    }

    pub fn region(&self, name: &str) -> Option<&RegionSpec> {
        self.regions.iter().find(|r| r.name == name)
    }

    pub fn button(&self, name: &str) -> Option<Rect> {
        self.buttons.get(name).copied()
    }

    pub fn buttons(&self) -> &BTreeMap<String, Rect> {
        &self.buttons
    }

    /// Screen rules in priority order
    pub fn rules(&self) -> &[StateRule] {
        &self.rules
    }
}

enum RegionDecl {
    Templates(Vec<String>),
    Text(TextSpec),
}

pub struct CatalogBuilder {
    reference_size: (u32, u32),
    templates: Vec<Template>,
    glyphs: Vec<Glyph>,
    regions: Vec<(String, Rect, RegionDecl)>,
    buttons: BTreeMap<String, Rect>,
    rules: Vec<StateRule>,
}

impl CatalogBuilder {
    pub fn template(mut self, template: Template) -> Self {
        self.templates.push(template);
        self
    }

    pub fn glyph(mut self, ch: char, image: &image::GrayImage) -> Self {
        self.glyphs.push(Glyph::new(ch, image));
        self
    }

    /// Region matched against `candidates`; earlier candidates win ties.
    pub fn template_region(mut self, name: &str, rect: Rect, candidates: &[&str]) -> Self {
        let names = candidates.iter().map(|c| c.to_string()).collect();
        self.regions
            .push((name.to_string(), rect, RegionDecl::Templates(names)));
        self
    }

    pub fn text_region(mut self, name: &str, rect: Rect, spec: TextSpec) -> Self {
        self.regions
            .push((name.to_string(), rect, RegionDecl::Text(spec)));
        self
    }

    pub fn button(mut self, name: &str, rect: Rect) -> Self {
        self.buttons.insert(name.to_string(), rect);
        self
    }

    pub fn rule(mut self, rule: StateRule) -> Self {
        self.rules.push(rule);
        self
    }

    /// Resolve names and reject dangling references.
    pub fn build(self) -> Result<Catalog, CatalogError> {
        let mut seen = HashSet::new();
        for t in &self.templates {
            if !seen.insert(t.name.as_str()) {
                return Err(CatalogError::Duplicate {
                    kind: "template",
                    name: t.name.clone(),
                });
            }
        }

        let mut regions = Vec::with_capacity(self.regions.len());
        for (name, rect, decl) in self.regions {
            if regions.iter().any(|r: &RegionSpec| r.name == name) {
                return Err(CatalogError::Duplicate {
                    kind: "region",
                    name,
                });
            }
            let kind = match decl {
                RegionDecl::Text(spec) => RegionKind::Text(spec),
                RegionDecl::Templates(names) => {
                    let mut indices = Vec::with_capacity(names.len());
                    for candidate in names {
                        let idx = self
                            .templates
                            .iter()
                            .position(|t| t.name == candidate)
                            .ok_or_else(|| CatalogError::UnknownReference {
                                kind: "template",
                                name: candidate.clone(),
                                referenced_by: format!("region '{name}'"),
                            })?;
                        indices.push(idx);
                    }
                    RegionKind::Templates(indices)
                }
            };
            regions.push(RegionSpec { name, rect, kind });
        }

        for rule in &self.rules {
            for predicate in &rule.all {
                let region_name = predicate.region();
                let region = regions
                    .iter()
                    .find(|r| r.name == region_name)
                    .ok_or_else(|| CatalogError::UnknownReference {
                        kind: "region",
                        name: region_name.to_string(),
                        referenced_by: format!("screen rule '{}'", rule.screen),
                    })?;
                if let Predicate::TemplatePresent {
                    template: Some(template),
                    ..
                } = predicate
                {
                    let is_candidate = match &region.kind {
                        RegionKind::Templates(indices) => indices
                            .iter()
                            .any(|&i| self.templates[i].name == *template),
                        RegionKind::Text(_) => false,
                    };
                    if !is_candidate {
                        return Err(CatalogError::UnknownReference {
                            kind: "template",
                            name: template.clone(),
                            referenced_by: format!(
                                "screen rule '{}' (region '{}')",
                                rule.screen, region.name
                            ),
                        });
                    }
                }
            }
        }

        Ok(Catalog {
            version: CATALOG_VERSION,
            reference_size: self.reference_size,
            templates: self.templates,
            glyphs: self.glyphs,
            regions,
            buttons: self.buttons,
            rules: self.rules,
        })
    }
}
