use super::*;
use crate::device::Point;
use crate::executor::{ActionKind, Expectation};
use crate::vision::{Observation, Reading, RegionReading};
use chrono::TimeZone;

fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 5, 1, 18, 30, 0).unwrap()
}

/// A recognized screen with the named elements detected at the given rects
fn on(screen: &str, detected: &[(&str, Rect)]) -> RecognizedState {
    let entries = detected
        .iter()
        .map(|(name, rect)| RegionReading {
            region: name.to_string(),
            reading: Reading::Template {
                template: Some(name.to_string()),
            },
            bbox: Some(*rect),
            confidence: 0.95,
        })
        .collect();
    RecognizedState {
        screen: Some(screen.to_string()),
        ambiguous: false,
        observation: Observation::new(now(), entries),
    }
}

fn unknown() -> RecognizedState {
    RecognizedState::unknown(Observation::new(now(), vec![]))
}

fn buttons() -> BTreeMap<String, Rect> {
    BTreeMap::from([
        ("popup_close".to_string(), Rect::new(600, 100, 40, 40)),
        ("exploration_button".to_string(), Rect::new(40, 1190, 60, 60)),
        ("alliance_button".to_string(), Rect::new(493, 1187, 68, 53)),
        ("city_button".to_string(), Rect::new(600, 1180, 80, 80)),
    ])
}

fn ctx(buttons: &BTreeMap<String, Rect>) -> TaskContext<'_> {
    TaskContext {
        now: now(),
        app_id: "com.gof.global",
        buttons,
        chief_order: ChiefOrderKind::UrgentMobilization,
        wait: Duration::from_millis(5),
    }
}

fn act(decision: Decision) -> Action {
    match decision {
        Decision::Act(action) => action,
        other => panic!("expected an action, got {other:?}"),
    }
}

const ICON: Rect = Rect::new(100, 200, 40, 40);

// ============================================================
// SHARED BEHAVIOUR
// ============================================================

#[test]
fn popup_is_closed_before_any_routine() {
    let b = buttons();
    for kind in TaskKind::ALL {
        let mut progress = TaskProgress::fresh(kind);
        let action = act(kind.decide(&mut progress, &on(screens::POPUP, &[]), &ctx(&b)));
        assert_eq!(action.kind, ActionKind::Tap(Point::new(620, 120)), "{kind}");
        assert_eq!(action.expect, Expectation::NotScreen("popup".into()));
    }
}

#[test]
fn reconnect_fails_initialize_and_defers_others() {
    let b = buttons();
    let reconnect = on(screens::RECONNECT, &[]);
    let mut progress = TaskProgress::fresh(TaskKind::Initialize);
    assert!(matches!(
        TaskKind::Initialize.decide(&mut progress, &reconnect, &ctx(&b)),
        Decision::Fail(_)
    ));
    let mut progress = TaskProgress::fresh(TaskKind::Exploration);
    assert!(matches!(
        TaskKind::Exploration.decide(&mut progress, &reconnect, &ctx(&b)),
        Decision::Defer(_)
    ));
}

#[test]
fn world_screen_heads_home() {
    let b = buttons();
    let mut progress = TaskProgress::fresh(TaskKind::Exploration);
    let action = act(TaskKind::Exploration.decide(&mut progress, &on(screens::WORLD, &[]), &ctx(&b)));
    assert_eq!(action.kind, ActionKind::Tap(Point::new(640, 1220)));
    assert_eq!(action.expect, Expectation::Screen("home".into()));
}

#[test]
fn unknown_screen_waits_and_looks_again() {
    let b = buttons();
    let mut progress = TaskProgress::fresh(TaskKind::NewSurvivors);
    let action = act(TaskKind::NewSurvivors.decide(&mut progress, &unknown(), &ctx(&b)));
    assert_eq!(action.kind, ActionKind::Wait(Duration::from_millis(5)));
}

#[test]
fn milestone_commits_only_on_success() {
    let b = buttons();
    let kind = TaskKind::MyriadBazaar;
    let bazaar = on(screens::BAZAAR, &[("bazaar_free_claim", ICON)]);

    let mut progress = TaskProgress::fresh(kind);
    kind.decide(&mut progress, &bazaar, &ctx(&b));
    assert_eq!(progress.pending, Some(Milestone::BazaarClaim));
    kind.absorb(
        &mut progress,
        &ExecutionResult::VerificationFailed { last: bazaar.clone() },
    );
    assert_eq!(progress.pending, None);
    assert!(matches!(progress.stage, Stage::MyriadBazaar { claims: 0, .. }));

    kind.decide(&mut progress, &bazaar, &ctx(&b));
    kind.absorb(&mut progress, &ExecutionResult::Success(bazaar.clone()));
    assert!(matches!(progress.stage, Stage::MyriadBazaar { claims: 1, .. }));
}

// ============================================================
// ROUTINES
// ============================================================

#[test]
fn initialize_waits_once_then_completes() {
    let b = buttons();
    let kind = TaskKind::Initialize;
    let home = on(screens::HOME, &[]);
    let mut progress = TaskProgress::fresh(kind);

    let action = act(kind.decide(&mut progress, &home, &ctx(&b)));
    assert!(matches!(action.kind, ActionKind::Wait(_)));
    kind.absorb(&mut progress, &ExecutionResult::Success(home.clone()));

    assert_eq!(
        kind.decide(&mut progress, &home, &ctx(&b)),
        Decision::Complete { cooldown: None }
    );
}

#[test]
fn initialize_backs_out_then_restarts_then_fails() {
    let b = buttons();
    let kind = TaskKind::Initialize;
    let elsewhere = on(screens::BAZAAR, &[]);
    let mut progress = TaskProgress::fresh(kind);

    for _ in 0..10 {
        let action = act(kind.decide(&mut progress, &elsewhere, &ctx(&b)));
        assert_eq!(action.kind, ActionKind::Back);
    }
    let action = act(kind.decide(&mut progress, &elsewhere, &ctx(&b)));
    assert_eq!(action.kind, ActionKind::RestartApp("com.gof.global".into()));
    for _ in 0..10 {
        act(kind.decide(&mut progress, &elsewhere, &ctx(&b)));
    }
    assert!(matches!(
        kind.decide(&mut progress, &elsewhere, &ctx(&b)),
        Decision::Fail(_)
    ));
}

#[test]
fn exploration_opens_claims_and_leaves() {
    let b = buttons();
    let kind = TaskKind::Exploration;
    let mut progress = TaskProgress::fresh(kind);

    let open = act(kind.decide(&mut progress, &on(screens::HOME, &[]), &ctx(&b)));
    assert_eq!(open.kind, ActionKind::Tap(Point::new(70, 1220)));
    assert_eq!(open.expect, Expectation::Screen("exploration".into()));

    let chest = on(screens::EXPLORATION, &[("exploration_claim", ICON)]);
    let claim = act(kind.decide(&mut progress, &chest, &ctx(&b)));
    assert_eq!(claim.kind, ActionKind::Tap(Point::new(120, 220)));
    kind.absorb(&mut progress, &ExecutionResult::Success(chest.clone()));

    let leave = act(kind.decide(&mut progress, &chest, &ctx(&b)));
    assert_eq!(leave.kind, ActionKind::Back);
    assert_eq!(
        kind.decide(&mut progress, &on(screens::HOME, &[]), &ctx(&b)),
        Decision::Complete { cooldown: None }
    );
}

#[test]
fn new_survivors_without_notice_completes() {
    let b = buttons();
    let mut progress = TaskProgress::fresh(TaskKind::NewSurvivors);
    assert_eq!(
        TaskKind::NewSurvivors.decide(&mut progress, &on(screens::HOME, &[]), &ctx(&b)),
        Decision::Complete { cooldown: None }
    );
}

#[test]
fn claimed_triumph_waits_for_game_reset() {
    let b = buttons();
    let kind = TaskKind::AllianceTriumph;
    let mut progress = TaskProgress::fresh(kind);

    let triumph = on(screens::ALLIANCE_TRIUMPH, &[("triumph_daily", ICON)]);
    act(kind.decide(&mut progress, &triumph, &ctx(&b)));
    assert_eq!(progress.pending, Some(Milestone::DailyClaimed));
    kind.absorb(&mut progress, &ExecutionResult::Success(triumph));

    // weekly not shown: leave
    let after = on(screens::ALLIANCE_TRIUMPH, &[]);
    assert_eq!(act(kind.decide(&mut progress, &after, &ctx(&b))).kind, ActionKind::Back);

    match kind.decide(&mut progress, &on(screens::HOME, &[]), &ctx(&b)) {
        Decision::Complete { cooldown: Some(c) } => assert_eq!(c, TimeDelta::minutes(5 * 60 + 30)),
        other => panic!("unexpected {other:?}"),
    }
}

#[test]
fn chief_order_cooldown_follows_order_kind() {
    let b = buttons();
    let kind = TaskKind::ChiefOrder;
    let mut progress = TaskProgress::fresh(kind);

    let menu = on(screens::CHIEF_ORDER, &[("urgent_mobilization", ICON)]);
    let pick = act(kind.decide(&mut progress, &menu, &ctx(&b)));
    assert_eq!(
        pick.expect,
        Expectation::AnyOf(vec!["chief_order_confirm".into(), "chief_order_status".into()])
    );

    let confirm = on(screens::CHIEF_ORDER_CONFIRM, &[("enact_button", ICON)]);
    let enact = act(kind.decide(&mut progress, &confirm, &ctx(&b)));
    assert_eq!(
        enact.expect,
        Expectation::AnyOf(vec![
            "chief_order_status".into(),
            "chief_order".into(),
            "home".into()
        ])
    );
    kind.absorb(&mut progress, &ExecutionResult::Success(menu.clone()));

    assert_eq!(act(kind.decide(&mut progress, &menu, &ctx(&b))).kind, ActionKind::Back);
    assert_eq!(
        kind.decide(&mut progress, &on(screens::HOME, &[]), &ctx(&b)),
        Decision::Complete {
            cooldown: Some(TimeDelta::hours(8))
        }
    );
}

/// `state` with a text region reading `text`
fn reading(mut state: RecognizedState, region: &str, text: &str) -> RecognizedState {
    state.observation.entries.push(RegionReading {
        region: region.to_string(),
        reading: Reading::Text {
            text: Some(text.to_string()),
            value: None,
        },
        bbox: Some(ICON),
        confidence: 0.9,
    });
    state
}

#[test]
fn chief_order_on_cooldown_waits_for_its_timer() {
    let b = buttons();
    let kind = TaskKind::ChiefOrder;
    let mut progress = TaskProgress::fresh(kind);
    let menu = on(screens::CHIEF_ORDER, &[("urgent_mobilization", ICON)]);
    act(kind.decide(&mut progress, &menu, &ctx(&b)));

    // detail screen without Enact: status template plus its countdown
    let mut detail = on(screens::CHIEF_ORDER_STATUS, &[]);
    detail.observation.entries.push(RegionReading {
        region: "order_status".into(),
        reading: Reading::Template {
            template: Some("chief_order_cooldown".into()),
        },
        bbox: Some(ICON),
        confidence: 0.92,
    });
    let detail = reading(detail, "order_timer", "03:15:00");
    assert_eq!(act(kind.decide(&mut progress, &detail, &ctx(&b))).kind, ActionKind::Back);
    assert!(matches!(
        progress.stage,
        Stage::ChiefOrder {
            enacted: false,
            resume_in: Some(11_700),
            ..
        }
    ));

    // the order button is not tapped again on the way out
    assert_eq!(act(kind.decide(&mut progress, &menu, &ctx(&b))).kind, ActionKind::Back);
    assert_eq!(
        kind.decide(&mut progress, &on(screens::HOME, &[]), &ctx(&b)),
        Decision::Complete {
            cooldown: Some(TimeDelta::minutes(195))
        }
    );
}

#[test]
fn chief_order_missing_from_menu_reads_the_menu_timer() {
    let b = buttons();
    let kind = TaskKind::ChiefOrder;
    let mut progress = TaskProgress::fresh(kind);
    let menu = reading(on(screens::CHIEF_ORDER, &[]), "urgent_mobilization_timer", "1d 02:00:00");

    assert_eq!(act(kind.decide(&mut progress, &menu, &ctx(&b))).kind, ActionKind::Back);
    assert_eq!(
        kind.decide(&mut progress, &on(screens::HOME, &[]), &ctx(&b)),
        Decision::Complete {
            cooldown: Some(TimeDelta::hours(26))
        }
    );
}

#[test]
fn unreadable_chief_order_timer_retries_in_ten_minutes() {
    let b = buttons();
    let kind = TaskKind::ChiefOrder;
    let mut progress = TaskProgress::fresh(kind);
    let menu = reading(on(screens::CHIEF_ORDER, &[]), "urgent_mobilization_timer", "0?:1");

    act(kind.decide(&mut progress, &menu, &ctx(&b)));
    assert_eq!(
        kind.decide(&mut progress, &on(screens::HOME, &[]), &ctx(&b)),
        Decision::Complete {
            cooldown: Some(TimeDelta::minutes(10))
        }
    );
}

#[test]
fn countdowns_parse_in_game_formats() {
    assert_eq!(parse_countdown("07:59:12"), Some(TimeDelta::seconds(7 * 3600 + 59 * 60 + 12)));
    assert_eq!(parse_countdown("12:05"), Some(TimeDelta::seconds(725)));
    assert_eq!(parse_countdown("1d 03:00:00"), Some(TimeDelta::hours(27)));
    assert_eq!(parse_countdown("2d"), Some(TimeDelta::days(2)));
    // glyph reading may split groups with spaces
    assert_eq!(parse_countdown("01: 30: 00"), Some(TimeDelta::minutes(90)));
    assert_eq!(parse_countdown("00:00:00"), None);
    assert_eq!(parse_countdown("12:75"), None);
    assert_eq!(parse_countdown("5"), None);
    assert_eq!(parse_countdown(""), None);
}

#[test]
fn bazaar_stops_after_three_empty_looks() {
    let b = buttons();
    let kind = TaskKind::MyriadBazaar;
    let mut progress = TaskProgress::fresh(kind);
    let empty = on(screens::BAZAAR, &[]);

    assert!(matches!(act(kind.decide(&mut progress, &empty, &ctx(&b))).kind, ActionKind::Wait(_)));
    assert!(matches!(act(kind.decide(&mut progress, &empty, &ctx(&b))).kind, ActionKind::Wait(_)));
    assert_eq!(act(kind.decide(&mut progress, &empty, &ctx(&b))).kind, ActionKind::Back);
}

// ============================================================
// RESUMPTION
// ============================================================

#[test]
fn reloaded_progress_makes_the_same_decision() {
    let b = buttons();
    let kind = TaskKind::AllianceTriumph;
    let mut live = TaskProgress::fresh(kind);
    let triumph = on(
        screens::ALLIANCE_TRIUMPH,
        &[("triumph_daily_claimed", ICON), ("triumph_weekly", Rect::new(300, 900, 60, 40))],
    );
    // mid-objective: opened, daily seen as claimed, weekly not yet checked
    live.stage = Stage::AllianceTriumph {
        opened: true,
        daily: DailyTriumph::Claimed,
        weekly_checked: false,
        weekly_claimed: false,
    };

    let blob = live.to_blob().unwrap();
    let mut reloaded = TaskProgress::from_blob(kind, &blob);
    assert_eq!(reloaded, live);

    let expected = kind.decide(&mut live, &triumph, &ctx(&b));
    let actual = kind.decide(&mut reloaded, &triumph, &ctx(&b));
    assert_eq!(actual, expected);
    assert_eq!(reloaded, live);
    assert_eq!(act(actual).kind, ActionKind::Tap(Point::new(330, 920)));
}

#[test]
fn unreadable_or_foreign_blob_starts_fresh() {
    let foreign = TaskProgress::fresh(TaskKind::Exploration).to_blob().unwrap();
    assert_eq!(
        TaskProgress::from_blob(TaskKind::ChiefOrder, &foreign),
        TaskProgress::fresh(TaskKind::ChiefOrder)
    );
    assert_eq!(
        TaskProgress::from_blob(TaskKind::ChiefOrder, "{not json"),
        TaskProgress::fresh(TaskKind::ChiefOrder)
    );
    assert_eq!(
        TaskProgress::from_blob(TaskKind::Initialize, ""),
        TaskProgress::fresh(TaskKind::Initialize)
    );
}

// ============================================================
// CATALOG
// ============================================================

#[test]
fn ids_round_trip_and_config_overrides() {
    for kind in TaskKind::ALL {
        assert_eq!(kind.id().parse::<TaskKind>().unwrap(), kind);
    }
    assert!("nope".parse::<TaskKind>().is_err());

    let section = TaskSection {
        enabled: false,
        priority: Some(2),
        interval_minutes: Some(15),
        order: Some(ChiefOrderKind::ProductivityDay),
    };
    let spec = TaskSpec::from_config(TaskKind::ChiefOrder, &section);
    assert!(!spec.enabled);
    assert_eq!(spec.priority, 2);
    assert_eq!(spec.interval, TimeDelta::minutes(15));
    assert_eq!(spec.chief_order.cooldown(), TimeDelta::hours(12));

    let defaults = task_catalog(&EngineConfig::default());
    assert_eq!(defaults.len(), TaskKind::ALL.len());
    assert_eq!(defaults[0].kind, TaskKind::Initialize);
    assert_eq!(defaults[0].priority, 1);
}

#[test]
fn game_reset_is_next_utc_midnight() {
    assert_eq!(
        next_game_reset(now()),
        Utc.with_ymd_and_hms(2024, 5, 2, 0, 0, 0).unwrap()
    );
}
