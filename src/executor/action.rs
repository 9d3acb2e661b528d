// Action value objects: one device operation plus the state that confirms it
use crate::device::Point;
use crate::recognizer::RecognizedState;
use std::fmt;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq)]
pub enum ActionKind {
    Tap(Point),
    Swipe { path: Vec<Point>, duration: Duration },
    TypeText(String),
    Back,
    /// No input; only the verification runs
    Wait(Duration),
    RestartApp(String),
}

/// Post-condition checked against each verification observation.
#[derive(Debug, Clone, PartialEq)]
pub enum Expectation {
    Screen(String),
    AnyOf(Vec<String>),
    /// Some recognized screen other than this one. Unknown does not count.
    NotScreen(String),
    Anything,
}

impl Expectation {
    pub fn accepts(&self, state: &RecognizedState) -> bool {
        match self {
            Expectation::Screen(id) => state.is(id),
            Expectation::AnyOf(ids) => ids.iter().any(|id| state.is(id)),
            Expectation::NotScreen(id) => !state.is_unknown() && !state.is(id),
            Expectation::Anything => true,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Action {
    pub kind: ActionKind,
    pub expect: Expectation,
}

impl Action {
    pub fn new(kind: ActionKind, expect: Expectation) -> Self {
        Self { kind, expect }
    }

    pub fn tap(at: Point) -> Self {
        Self::new(ActionKind::Tap(at), Expectation::Anything)
    }

    pub fn back() -> Self {
        Self::new(ActionKind::Back, Expectation::Anything)
    }

    pub fn wait(duration: Duration) -> Self {
        Self::new(ActionKind::Wait(duration), Expectation::Anything)
    }

    pub fn restart(app_id: &str) -> Self {
        Self::new(ActionKind::RestartApp(app_id.to_string()), Expectation::Anything)
    }

    pub fn expect_screen(mut self, screen: &str) -> Self {
        self.expect = Expectation::Screen(screen.to_string());
        self
    }

    pub fn expect_not(mut self, screen: &str) -> Self {
        self.expect = Expectation::NotScreen(screen.to_string());
        self
    }

    pub fn expect_any(mut self, screens: &[&str]) -> Self {
        self.expect = Expectation::AnyOf(screens.iter().map(|s| s.to_string()).collect());
        self
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            ActionKind::Tap(p) => write!(f, "tap ({}, {})", p.x, p.y)?,
            ActionKind::Swipe { path, duration } => {
                write!(f, "swipe {} points over {:?}", path.len(), duration)?
            }
            ActionKind::TypeText(text) => write!(f, "type {:?}", text)?,
            ActionKind::Back => write!(f, "back")?,
            ActionKind::Wait(d) => write!(f, "wait {:?}", d)?,
            ActionKind::RestartApp(app) => write!(f, "restart {app}")?,
        }
        match &self.expect {
            Expectation::Screen(s) => write!(f, " -> {s}"),
            Expectation::AnyOf(ids) => write!(f, " -> one of {}", ids.join("|")),
            Expectation::NotScreen(s) => write!(f, " -> not {s}"),
            Expectation::Anything => Ok(()),
        }
    }
}
