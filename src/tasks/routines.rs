// Per-kind step logic. Every routine starts and ends on the home screen.
use super::progress::{DailyTriumph, Milestone, Stage, TaskProgress};
use super::screens::*;
use super::{Decision, TaskContext, TaskKind, next_game_reset, parse_countdown};
use crate::device::Point;
use crate::executor::Action;
use crate::recognizer::RecognizedState;
use chrono::TimeDelta;
use std::time::Duration;

/// Back presses tried before the game is restarted
const MAX_BACKS: u32 = 10;
const BAZAAR_MAX_MISSES: u32 = 3;
const RECONNECT_DEFER: Duration = Duration::from_secs(5 * 60);
/// Next chief order attempt when its timer cannot be read
const ORDER_RETRY_SECS: i64 = 10 * 60;

/// Centre of a detected element
fn found(state: &RecognizedState, name: &str) -> Option<Point> {
    state.observation.bbox_of(name).map(|r| r.center())
}

/// Detected element first, fixed catalog button otherwise
fn target(state: &RecognizedState, ctx: &TaskContext<'_>, name: &str) -> Option<Point> {
    found(state, name).or_else(|| ctx.buttons.get(name).map(|r| r.center()))
}

fn until_reset(ctx: &TaskContext<'_>) -> TimeDelta {
    next_game_reset(ctx.now) - ctx.now
}

/// Walk back towards the home screen from wherever we are.
fn head_home(state: &RecognizedState, ctx: &TaskContext<'_>) -> Decision {
    let action = match state.screen.as_deref() {
        None => Action::wait(ctx.wait),
        Some(WORLD) => match target(state, ctx, "city_button") {
            Some(p) => Action::tap(p).expect_screen(HOME),
            None => Action::back().expect_not(WORLD),
        },
        Some(screen) => Action::back().expect_not(screen),
    };
    Decision::Act(action)
}

fn dismiss_popup(state: &RecognizedState, ctx: &TaskContext<'_>) -> Decision {
    let action = match target(state, ctx, "popup_close") {
        Some(p) => Action::tap(p),
        None => Action::back(),
    };
    Decision::Act(action.expect_not(POPUP))
}

pub(super) fn decide(
    kind: TaskKind,
    progress: &mut TaskProgress,
    state: &RecognizedState,
    ctx: &TaskContext<'_>,
) -> Decision {
    if state.is(POPUP) {
        return dismiss_popup(state, ctx);
    }
    if state.is(RECONNECT) {
        return match kind {
            TaskKind::Initialize => Decision::Fail("reconnect dialog: game session lost".into()),
            _ => Decision::Defer(RECONNECT_DEFER),
        };
    }

    let pending = &mut progress.pending;
    match &mut progress.stage {
        Stage::Initialize {
            settled,
            backs,
            restarted,
        } => initialize(settled, backs, restarted, pending, state, ctx),
        Stage::Exploration { opened, claimed } => {
            exploration(opened, *claimed, pending, state, ctx)
        }
        Stage::NewSurvivors { opened, welcomed } => {
            new_survivors(opened, *welcomed, pending, state, ctx)
        }
        Stage::AllianceTriumph {
            opened,
            daily,
            weekly_checked,
            weekly_claimed,
        } => alliance_triumph(
            opened,
            daily,
            weekly_checked,
            *weekly_claimed,
            pending,
            state,
            ctx,
        ),
        Stage::ChiefOrder {
            opened,
            enacted,
            resume_in,
        } => chief_order(opened, *enacted, resume_in, pending, state, ctx),
        Stage::MyriadBazaar {
            opened,
            misses,
            claims,
        } => myriad_bazaar(opened, misses, *claims, pending, state, ctx),
    }
}

/// Reach home or world, wait once for it to settle, confirm it again.
fn initialize(
    settled: &mut bool,
    backs: &mut u32,
    restarted: &mut bool,
    pending: &mut Option<Milestone>,
    state: &RecognizedState,
    ctx: &TaskContext<'_>,
) -> Decision {
    if state.is(HOME) || state.is(WORLD) {
        if *settled {
            log::info!("Game is on '{}'", state.name());
            return Decision::Complete { cooldown: None };
        }
        *pending = Some(Milestone::Settled);
        return Decision::Act(Action::wait(ctx.wait));
    }
    if *backs < MAX_BACKS {
        *backs += 1;
        return Decision::Act(Action::back());
    }
    if !*restarted {
        *restarted = true;
        *backs = 0;
        log::warn!("Still on '{}' after {MAX_BACKS} backs", state.name());
        return Decision::Act(Action::restart(ctx.app_id));
    }
    Decision::Fail(format!(
        "home screen not reached after a restart (last seen '{}')",
        state.name()
    ))
}

fn exploration(
    opened: &mut bool,
    claimed: bool,
    pending: &mut Option<Milestone>,
    state: &RecognizedState,
    ctx: &TaskContext<'_>,
) -> Decision {
    match state.screen.as_deref() {
        Some(HOME) if *opened => Decision::Complete { cooldown: None },
        Some(HOME) => match target(state, ctx, "exploration_button") {
            Some(p) => Decision::Act(Action::tap(p).expect_screen(EXPLORATION)),
            None => Decision::Fail("catalog has no 'exploration_button'".into()),
        },
        Some(EXPLORATION) => {
            *opened = true;
            match found(state, "exploration_claim") {
                Some(p) if !claimed => {
                    log::info!("Claiming exploration rewards");
                    *pending = Some(Milestone::ExplorationClaimed);
                    Decision::Act(Action::tap(p))
                }
                _ => Decision::Act(Action::back().expect_not(EXPLORATION)),
            }
        }
        _ => head_home(state, ctx),
    }
}

fn new_survivors(
    opened: &mut bool,
    welcomed: bool,
    pending: &mut Option<Milestone>,
    state: &RecognizedState,
    ctx: &TaskContext<'_>,
) -> Decision {
    match state.screen.as_deref() {
        Some(HOME) if *opened => Decision::Complete { cooldown: None },
        Some(HOME) => match found(state, "new_survivors_notice") {
            Some(p) => Decision::Act(Action::tap(p).expect_screen(NEW_SURVIVORS)),
            None => {
                log::info!("No new survivors waiting");
                Decision::Complete { cooldown: None }
            }
        },
        Some(NEW_SURVIVORS) => {
            *opened = true;
            match found(state, "welcome_in") {
                Some(p) if !welcomed => {
                    *pending = Some(Milestone::SurvivorsWelcomed);
                    Decision::Act(Action::tap(p))
                }
                _ => Decision::Act(Action::back().expect_not(NEW_SURVIVORS)),
            }
        }
        _ => head_home(state, ctx),
    }
}

fn alliance_triumph(
    opened: &mut bool,
    daily: &mut DailyTriumph,
    weekly_checked: &mut bool,
    weekly_claimed: bool,
    pending: &mut Option<Milestone>,
    state: &RecognizedState,
    ctx: &TaskContext<'_>,
) -> Decision {
    match state.screen.as_deref() {
        Some(HOME) if *opened => {
            log::info!(
                "Alliance Triumph done: daily {daily:?}, weekly {}",
                if weekly_claimed { "claimed" } else { "not claimed" }
            );
            let cooldown = match daily {
                DailyTriumph::Claimed => Some(until_reset(ctx)),
                _ => None,
            };
            Decision::Complete { cooldown }
        }
        Some(HOME) => match target(state, ctx, "alliance_button") {
            Some(p) => Decision::Act(Action::tap(p).expect_screen(ALLIANCE)),
            None => Decision::Fail("catalog has no 'alliance_button'".into()),
        },
        Some(ALLIANCE) => {
            if !*opened {
                if let Some(p) = found(state, "triumph_button") {
                    return Decision::Act(Action::tap(p).expect_screen(ALLIANCE_TRIUMPH));
                }
                log::warn!("Alliance Triumph button not found");
                *opened = true;
            }
            Decision::Act(Action::back().expect_not(ALLIANCE))
        }
        Some(ALLIANCE_TRIUMPH) => {
            *opened = true;
            if *daily == DailyTriumph::Unchecked {
                if found(state, "triumph_daily_claimed").is_some() {
                    log::info!("Daily Triumph already claimed");
                    *daily = DailyTriumph::Claimed;
                } else if let Some(p) = found(state, "triumph_daily") {
                    *pending = Some(Milestone::DailyClaimed);
                    return Decision::Act(Action::tap(p));
                } else {
                    *daily = DailyTriumph::NotReady;
                }
            }
            if !*weekly_checked {
                *weekly_checked = true;
                if let Some(p) = found(state, "triumph_weekly") {
                    *pending = Some(Milestone::WeeklyClaimed);
                    return Decision::Act(Action::tap(p));
                }
            }
            Decision::Act(Action::back().expect_not(ALLIANCE_TRIUMPH))
        }
        _ => head_home(state, ctx),
    }
}

/// Seconds until the next attempt, from the countdown shown in `region`.
fn order_timer(state: &RecognizedState, region: &str) -> i64 {
    match state.observation.text_in(region).and_then(parse_countdown) {
        Some(left) => {
            log::info!("Chief order timer reads {}s", left.num_seconds());
            left.num_seconds()
        }
        None => {
            log::warn!("Chief order timer in '{region}' unreadable, retrying in {ORDER_RETRY_SECS}s");
            ORDER_RETRY_SECS
        }
    }
}

/// Enact the configured order, or schedule by the timer it shows while active
/// or cooling down.
fn chief_order(
    opened: &mut bool,
    enacted: bool,
    resume_in: &mut Option<i64>,
    pending: &mut Option<Milestone>,
    state: &RecognizedState,
    ctx: &TaskContext<'_>,
) -> Decision {
    let order = ctx.chief_order;
    let waiting = enacted || resume_in.is_some();
    match state.screen.as_deref() {
        Some(HOME) if *opened => {
            let cooldown = if enacted {
                Some(order.cooldown())
            } else {
                resume_in.map(TimeDelta::seconds)
            };
            Decision::Complete { cooldown }
        }
        Some(HOME) => match found(state, "chief_order_button") {
            Some(p) => Decision::Act(Action::tap(p).expect_screen(CHIEF_ORDER)),
            None => {
                log::info!("Chief order menu not available");
                Decision::Complete { cooldown: None }
            }
        },
        Some(CHIEF_ORDER) => {
            *opened = true;
            if !waiting {
                if let Some(p) = found(state, order.region()) {
                    let detail = [CHIEF_ORDER_CONFIRM, CHIEF_ORDER_STATUS];
                    return Decision::Act(Action::tap(p).expect_any(&detail));
                }
                log::info!("{order:?} not offered, reading its timer");
                *resume_in = Some(order_timer(state, order.timer_region()));
            }
            Decision::Act(Action::back().expect_not(CHIEF_ORDER))
        }
        Some(CHIEF_ORDER_CONFIRM) => {
            *opened = true;
            match found(state, "enact_button") {
                Some(p) if !waiting => {
                    log::info!("Enacting {order:?}");
                    *pending = Some(Milestone::OrderEnacted);
                    let after = [CHIEF_ORDER_STATUS, CHIEF_ORDER, HOME];
                    Decision::Act(Action::tap(p).expect_any(&after))
                }
                _ => Decision::Act(Action::back().expect_not(CHIEF_ORDER_CONFIRM)),
            }
        }
        Some(CHIEF_ORDER_STATUS) => {
            *opened = true;
            if !waiting {
                let status = state.observation.template_in("order_status").unwrap_or("status");
                log::info!("{order:?} shows '{status}'");
                *resume_in = Some(order_timer(state, "order_timer"));
            }
            Decision::Act(Action::back().expect_not(CHIEF_ORDER_STATUS))
        }
        _ => head_home(state, ctx),
    }
}

/// Claim free rewards until several looks in a row show none.
fn myriad_bazaar(
    opened: &mut bool,
    misses: &mut u32,
    claims: u32,
    pending: &mut Option<Milestone>,
    state: &RecognizedState,
    ctx: &TaskContext<'_>,
) -> Decision {
    match state.screen.as_deref() {
        Some(HOME) if *opened => {
            log::info!("Myriad Bazaar done, {claims} free rewards claimed");
            Decision::Complete {
                cooldown: Some(until_reset(ctx)),
            }
        }
        Some(HOME) => match found(state, "bazaar_icon") {
            Some(p) => Decision::Act(Action::tap(p).expect_screen(BAZAAR)),
            None => {
                log::info!("Myriad Bazaar not active");
                Decision::Complete {
                    cooldown: Some(until_reset(ctx)),
                }
            }
        },
        Some(BAZAAR) => {
            *opened = true;
            if *misses < BAZAAR_MAX_MISSES {
                if let Some(p) = found(state, "bazaar_free_claim") {
                    *misses = 0;
                    *pending = Some(Milestone::BazaarClaim);
                    return Decision::Act(Action::tap(p));
                }
                *misses += 1;
                if *misses < BAZAAR_MAX_MISSES {
                    return Decision::Act(Action::wait(ctx.wait));
                }
                log::info!("No free rewards after {BAZAAR_MAX_MISSES} looks");
            }
            Decision::Act(Action::back().expect_not(BAZAAR))
        }
        _ => head_home(state, ctx),
    }
}
