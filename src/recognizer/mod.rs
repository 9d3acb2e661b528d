// State Recognizer: ordered rules over an Observation, first full match wins
pub mod rules;

pub use rules::{CompareOp, Predicate, StateRule};

use crate::vision::Observation;

/// A classified screen. `screen == None` is the Unknown state, a valid
/// outcome that carries its Observation for diagnostics.
#[derive(Debug, Clone, PartialEq)]
pub struct RecognizedState {
    pub screen: Option<String>,
    /// More than one rule matched; the earliest was taken
    pub ambiguous: bool,
    pub observation: Observation,
}

impl RecognizedState {
    pub fn unknown(observation: Observation) -> Self {
        Self {
            screen: None,
            ambiguous: false,
            observation,
        }
    }

    pub fn is(&self, screen: &str) -> bool {
        self.screen.as_deref() == Some(screen)
    }

    pub fn is_unknown(&self) -> bool {
        self.screen.is_none()
    }

    pub fn name(&self) -> &str {
        self.screen.as_deref().unwrap_or("unknown")
    }
}

#[derive(Debug, Clone, Default)]
pub struct Recognizer {
    rules: Vec<StateRule>,
}

impl Recognizer {
    pub fn new(rules: Vec<StateRule>) -> Self {
        Self { rules }
    }

    pub fn rules(&self) -> &[StateRule] {
        &self.rules
    }

    /// Pure: the result depends on the Observation alone.
    pub fn recognize(&self, observation: Observation) -> RecognizedState {
        let mut matching = self
            .rules
            .iter()
            .filter(|rule| rule.matches(&observation));
        let Some(first) = matching.next() else {
            log::debug!("No screen rule matched: {}", observation.summary());
            return RecognizedState::unknown(observation);
        };
        let ambiguous = matching.next().is_some();
        if ambiguous {
            log::debug!("Several screen rules matched, taking '{}'", first.screen);
        }
        RecognizedState {
            screen: Some(first.screen.clone()),
            ambiguous,
            observation,
        }
    }
}
