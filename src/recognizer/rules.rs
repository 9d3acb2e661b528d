//! Ordered screen rules: a screen id tagged with a conjunction of predicates

use crate::vision::Observation;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CompareOp {
    #[serde(rename = ">")]
    Gt,
    #[serde(rename = ">=")]
    Ge,
    #[serde(rename = "<")]
    Lt,
    #[serde(rename = "==")]
    Eq,
}

impl CompareOp {
    pub fn holds(self, lhs: i64, rhs: i64) -> bool {
        match self {
            CompareOp::Gt => lhs > rhs,
            CompareOp::Ge => lhs >= rhs,
            CompareOp::Lt => lhs < rhs,
            CompareOp::Eq => lhs == rhs,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Predicate {
    /// Some template (or the named one) won the region, optionally with a minimum score
    TemplatePresent {
        region: String,
        #[serde(default)]
        template: Option<String>,
        #[serde(default)]
        min_score: Option<f32>,
    },
    /// Nothing matched or nothing legible
    RegionEmpty { region: String },
    /// Numeric text compared against a constant
    Numeric {
        region: String,
        op: CompareOp,
        value: i64,
    },
    /// Case-insensitive substring of recognized text
    TextContains { region: String, text: String },
}

impl Predicate {
    pub fn present(region: &str) -> Self {
        Predicate::TemplatePresent {
            region: region.to_string(),
            template: None,
            min_score: None,
        }
    }

    pub fn template(region: &str, template: &str) -> Self {
        Predicate::TemplatePresent {
            region: region.to_string(),
            template: Some(template.to_string()),
            min_score: None,
        }
    }

    pub fn region_empty(region: &str) -> Self {
        Predicate::RegionEmpty {
            region: region.to_string(),
        }
    }

    pub fn numeric(region: &str, op: CompareOp, value: i64) -> Self {
        Predicate::Numeric {
            region: region.to_string(),
            op,
            value,
        }
    }

    pub fn text_contains(region: &str, text: &str) -> Self {
        Predicate::TextContains {
            region: region.to_string(),
            text: text.to_string(),
        }
    }

    pub fn region(&self) -> &str {
        match self {
            Predicate::TemplatePresent { region, .. }
            | Predicate::RegionEmpty { region }
            | Predicate::Numeric { region, .. }
            | Predicate::TextContains { region, .. } => region,
        }
    }

    /// A region missing from the observation satisfies nothing, not even `RegionEmpty`.
    pub fn holds(&self, observation: &Observation) -> bool {
        let Some(entry) = observation.entry(self.region()) else {
            return false;
        };
        match self {
            Predicate::TemplatePresent {
                template,
                min_score,
                ..
            } => {
                let Some(found) = observation.template_in(self.region()) else {
                    return false;
                };
                template.as_deref().is_none_or(|t| t == found)
                    && min_score.is_none_or(|m| entry.confidence >= m)
            }
            Predicate::RegionEmpty { .. } => entry.is_empty(),
            Predicate::Numeric { op, value, .. } => observation
                .value_in(self.region())
                .is_some_and(|v| op.holds(v, *value)),
            Predicate::TextContains { text, .. } => observation
                .text_in(self.region())
                .is_some_and(|t| t.to_lowercase().contains(&text.to_lowercase())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateRule {
    pub screen: String,
    /// All must hold; an empty list always matches
    #[serde(default)]
    pub all: Vec<Predicate>,
}

impl StateRule {
    pub fn new(screen: &str, all: Vec<Predicate>) -> Self {
        Self {
            screen: screen.to_string(),
            all,
        }
    }

    pub fn matches(&self, observation: &Observation) -> bool {
        self.all.iter().all(|p| p.holds(observation))
    }
}
