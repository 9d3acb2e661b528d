//! Task catalog: a closed set of automation routines sharing one step function
//!
//! Each step looks at the current `RecognizedState` and returns a `Decision`.
//! Progress lives in `TaskProgress` so a run can resume after a restart.

pub mod progress;
mod routines;

pub use progress::{DailyTriumph, Milestone, Stage, TaskProgress};

use crate::config::{EngineConfig, TaskSection};
use crate::executor::{Action, ExecutionResult};
use crate::recognizer::RecognizedState;
use crate::vision::Rect;
use chrono::{DateTime, Days, NaiveTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// Screen ids the routines rely on; the catalog's rules must produce them.
pub mod screens {
    pub const HOME: &str = "home";
    pub const WORLD: &str = "world";
    pub const POPUP: &str = "popup";
    pub const RECONNECT: &str = "reconnect";
    pub const EXPLORATION: &str = "exploration";
    pub const NEW_SURVIVORS: &str = "new_survivors";
    pub const ALLIANCE: &str = "alliance";
    pub const ALLIANCE_TRIUMPH: &str = "alliance_triumph";
    pub const CHIEF_ORDER: &str = "chief_order";
    pub const CHIEF_ORDER_CONFIRM: &str = "chief_order_confirm";
    /// Order detail while the order is active or cooling down
    pub const CHIEF_ORDER_STATUS: &str = "chief_order_status";
    pub const BAZAAR: &str = "bazaar";
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskKind {
    Initialize,
    Exploration,
    NewSurvivors,
    AllianceTriumph,
    ChiefOrder,
    MyriadBazaar,
}

impl TaskKind {
    /// Catalog declaration order
    pub const ALL: [TaskKind; 6] = [
        TaskKind::Initialize,
        TaskKind::Exploration,
        TaskKind::NewSurvivors,
        TaskKind::AllianceTriumph,
        TaskKind::ChiefOrder,
        TaskKind::MyriadBazaar,
    ];

    pub fn id(self) -> &'static str {
        match self {
            TaskKind::Initialize => "initialize",
            TaskKind::Exploration => "exploration",
            TaskKind::NewSurvivors => "new_survivors",
            TaskKind::AllianceTriumph => "alliance_triumph",
            TaskKind::ChiefOrder => "chief_order",
            TaskKind::MyriadBazaar => "myriad_bazaar",
        }
    }

    /// Lower runs first
    pub fn default_priority(self) -> u32 {
        match self {
            TaskKind::Initialize => 1,
            TaskKind::NewSurvivors => 5,
            TaskKind::Exploration => 10,
            TaskKind::ChiefOrder => 15,
            TaskKind::AllianceTriumph => 20,
            TaskKind::MyriadBazaar => 30,
        }
    }

    pub fn default_interval(self) -> TimeDelta {
        match self {
            TaskKind::Initialize => TimeDelta::hours(6),
            TaskKind::Exploration => TimeDelta::minutes(60),
            TaskKind::NewSurvivors => TimeDelta::minutes(30),
            TaskKind::AllianceTriumph => TimeDelta::hours(2),
            TaskKind::ChiefOrder => TimeDelta::hours(1),
            TaskKind::MyriadBazaar => TimeDelta::hours(4),
        }
    }

    /// Choose the next move. May update `progress` in place; a milestone the
    /// action would reach is left in `progress.pending` until `absorb`.
    pub fn decide(
        self,
        progress: &mut TaskProgress,
        state: &RecognizedState,
        ctx: &TaskContext<'_>,
    ) -> Decision {
        progress.pending = None;
        routines::decide(self, progress, state, ctx)
    }

    /// Fold an execution result into progress.
    pub fn absorb(self, progress: &mut TaskProgress, result: &ExecutionResult) {
        if let Some(milestone) = progress.pending.take()
            && result.is_success()
        {
            log::debug!("{self}: reached {milestone:?}");
            progress.commit(milestone);
        }
    }
}

impl fmt::Display for TaskKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

impl FromStr for TaskKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        TaskKind::ALL
            .into_iter()
            .find(|k| k.id() == s)
            .ok_or_else(|| format!("unknown task '{s}'"))
    }
}

/// Chief order to enact; each has its own in-game cooldown.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChiefOrderKind {
    #[default]
    RushJob,
    UrgentMobilization,
    ProductivityDay,
}

impl ChiefOrderKind {
    /// Catalog region holding this order's button
    pub fn region(self) -> &'static str {
        match self {
            ChiefOrderKind::RushJob => "rush_job",
            ChiefOrderKind::UrgentMobilization => "urgent_mobilization",
            ChiefOrderKind::ProductivityDay => "productivity_day",
        }
    }

    /// Text region showing this order's timer on the order menu
    pub fn timer_region(self) -> &'static str {
        match self {
            ChiefOrderKind::RushJob => "rush_job_timer",
            ChiefOrderKind::UrgentMobilization => "urgent_mobilization_timer",
            ChiefOrderKind::ProductivityDay => "productivity_day_timer",
        }
    }

    pub fn cooldown(self) -> TimeDelta {
        match self {
            ChiefOrderKind::RushJob => TimeDelta::hours(24),
            ChiefOrderKind::UrgentMobilization => TimeDelta::hours(8),
            ChiefOrderKind::ProductivityDay => TimeDelta::hours(12),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Decision {
    Act(Action),
    /// Objective met. `cooldown` overrides the task's interval.
    Complete { cooldown: Option<TimeDelta> },
    /// Give the device back and retry after `Duration`, keeping progress
    Defer(Duration),
    Fail(String),
}

/// What a step may consult besides the recognized state.
#[derive(Debug, Clone)]
pub struct TaskContext<'a> {
    pub now: DateTime<Utc>,
    pub app_id: &'a str,
    /// Fixed tap areas from the asset catalog
    pub buttons: &'a BTreeMap<String, Rect>,
    pub chief_order: ChiefOrderKind,
    /// Pause used when a routine has to wait and look again
    pub wait: Duration,
}

/// Static scheduling attributes of one task, resolved from config.
#[derive(Debug, Clone, PartialEq)]
pub struct TaskSpec {
    pub kind: TaskKind,
    pub enabled: bool,
    pub priority: u32,
    pub interval: TimeDelta,
    pub chief_order: ChiefOrderKind,
}

impl TaskSpec {
    pub fn from_config(kind: TaskKind, section: &TaskSection) -> Self {
        Self {
            kind,
            enabled: section.enabled,
            priority: section.priority.unwrap_or(kind.default_priority()),
            interval: section
                .interval_minutes
                .and_then(|m| i64::try_from(m).ok())
                .map(TimeDelta::minutes)
                .unwrap_or(kind.default_interval()),
            chief_order: section.order.unwrap_or_default(),
        }
    }

    pub fn id(&self) -> &'static str {
        self.kind.id()
    }
}

/// Every task in declaration order, configured.
pub fn task_catalog(cfg: &EngineConfig) -> Vec<TaskSpec> {
    TaskKind::ALL
        .into_iter()
        .map(|kind| TaskSpec::from_config(kind, &cfg.task(kind.id())))
        .collect()
}

/// Daily game reset, midnight UTC
pub fn next_game_reset(now: DateTime<Utc>) -> DateTime<Utc> {
    let midnight = now.date_naive().and_time(NaiveTime::default()).and_utc();
    midnight.checked_add_days(Days::new(1)).unwrap_or(midnight)
}

/// Read an in-game countdown: `07:59:12`, `12:05`, `1d 03:00:00` or `2d`.
pub fn parse_countdown(text: &str) -> Option<TimeDelta> {
    let text = text.trim();
    let (days, clock) = match text.split_once('d') {
        Some((days, rest)) => (days.trim().parse::<u32>().ok()?, rest.trim()),
        None => (0, text),
    };
    let total = if clock.is_empty() {
        TimeDelta::days(days.into())
    } else {
        let parts = clock
            .split(':')
            .map(|p| p.trim().parse::<u32>().ok())
            .collect::<Option<Vec<u32>>>()?;
        let (h, m, s) = match parts.as_slice() {
            [h, m, s] => (*h, *m, *s),
            [m, s] => (0, *m, *s),
            _ => return None,
        };
        if m >= 60 || s >= 60 {
            return None;
        }
        TimeDelta::days(days.into())
            + TimeDelta::hours(h.into())
            + TimeDelta::minutes(m.into())
            + TimeDelta::seconds(s.into())
    };
    (total > TimeDelta::zero()).then_some(total)
}

#[cfg(test)]
mod tests;
