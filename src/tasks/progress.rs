// Persisted per-task progress, stored as JSON in the task record
use super::TaskKind;
use serde::{Deserialize, Serialize};

/// Something an in-flight action achieves once its verification succeeds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Milestone {
    Settled,
    ExplorationClaimed,
    SurvivorsWelcomed,
    DailyClaimed,
    WeeklyClaimed,
    OrderEnacted,
    BazaarClaim,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DailyTriumph {
    #[default]
    Unchecked,
    Claimed,
    NotReady,
}

/// One variant per task kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Stage {
    Initialize {
        settled: bool,
        backs: u32,
        restarted: bool,
    },
    Exploration {
        opened: bool,
        claimed: bool,
    },
    NewSurvivors {
        opened: bool,
        welcomed: bool,
    },
    AllianceTriumph {
        opened: bool,
        daily: DailyTriumph,
        weekly_checked: bool,
        weekly_claimed: bool,
    },
    ChiefOrder {
        opened: bool,
        enacted: bool,
        /// Seconds until the order can be enacted, read from its timer
        #[serde(default)]
        resume_in: Option<i64>,
    },
    MyriadBazaar {
        opened: bool,
        misses: u32,
        claims: u32,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskProgress {
    #[serde(default)]
    pub pending: Option<Milestone>,
    pub stage: Stage,
}

impl TaskProgress {
    pub fn fresh(kind: TaskKind) -> Self {
        let stage = match kind {
            TaskKind::Initialize => Stage::Initialize {
                settled: false,
                backs: 0,
                restarted: false,
            },
            TaskKind::Exploration => Stage::Exploration {
                opened: false,
                claimed: false,
            },
            TaskKind::NewSurvivors => Stage::NewSurvivors {
                opened: false,
                welcomed: false,
            },
            TaskKind::AllianceTriumph => Stage::AllianceTriumph {
                opened: false,
                daily: DailyTriumph::Unchecked,
                weekly_checked: false,
                weekly_claimed: false,
            },
            TaskKind::ChiefOrder => Stage::ChiefOrder {
                opened: false,
                enacted: false,
                resume_in: None,
            },
            TaskKind::MyriadBazaar => Stage::MyriadBazaar {
                opened: false,
                misses: 0,
                claims: 0,
            },
        };
        Self {
            pending: None,
            stage,
        }
    }

    pub fn kind(&self) -> TaskKind {
        match self.stage {
            Stage::Initialize { .. } => TaskKind::Initialize,
            Stage::Exploration { .. } => TaskKind::Exploration,
            Stage::NewSurvivors { .. } => TaskKind::NewSurvivors,
            Stage::AllianceTriumph { .. } => TaskKind::AllianceTriumph,
            Stage::ChiefOrder { .. } => TaskKind::ChiefOrder,
            Stage::MyriadBazaar { .. } => TaskKind::MyriadBazaar,
        }
    }

    pub fn to_blob(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    /// Parse a stored blob, falling back to fresh progress when it is empty,
    /// unreadable, or belongs to another kind.
    pub fn from_blob(kind: TaskKind, blob: &str) -> Self {
        if blob.trim().is_empty() {
            return Self::fresh(kind);
        }
        match serde_json::from_str::<TaskProgress>(blob) {
            Ok(progress) if progress.kind() == kind => progress,
            Ok(progress) => {
                log::warn!(
                    "Stored progress for '{kind}' belongs to '{}', starting fresh",
                    progress.kind()
                );
                Self::fresh(kind)
            }
            Err(e) => {
                log::warn!("Stored progress for '{kind}' is unreadable ({e}), starting fresh");
                Self::fresh(kind)
            }
        }
    }

    /// Fold a verified milestone into the stage. Milestones of another kind are ignored.
    pub fn commit(&mut self, milestone: Milestone) {
        match (milestone, &mut self.stage) {
            (Milestone::Settled, Stage::Initialize { settled, .. }) => *settled = true,
            (Milestone::ExplorationClaimed, Stage::Exploration { claimed, .. }) => *claimed = true,
            (Milestone::SurvivorsWelcomed, Stage::NewSurvivors { welcomed, .. }) => *welcomed = true,
            (Milestone::DailyClaimed, Stage::AllianceTriumph { daily, .. }) => {
                *daily = DailyTriumph::Claimed
            }
            (Milestone::WeeklyClaimed, Stage::AllianceTriumph { weekly_claimed, .. }) => {
                *weekly_claimed = true
            }
            (Milestone::OrderEnacted, Stage::ChiefOrder { enacted, .. }) => *enacted = true,
            (Milestone::BazaarClaim, Stage::MyriadBazaar { claims, .. }) => *claims += 1,
            (m, stage) => log::debug!("Ignoring milestone {m:?} for {stage:?}"),
        }
    }
}
