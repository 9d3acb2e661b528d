// Shared fixture: a two-screen catalog (map, dialog) and frames that render it
use crate::device::Frame;
use crate::executor::StateObserver;
use crate::recognizer::{Predicate, StateRule};
use crate::vision::tests::{blank, checker, frame_of, paste, stripes};
use crate::vision::{Catalog, Rect, Template, VisionPipeline};
use std::sync::Arc;

pub const REF: (u32, u32) = (160, 120);
pub const CLOSE_AT: (u32, u32) = (120, 20);
pub const NAV_AT: (u32, u32) = (20, 80);

/// Dialog rule first so it is never masked by the map rule.
pub fn screen_catalog() -> Catalog {
    Catalog::builder(REF)
        .template(Template::new("close_x", checker(16, 4), 0.9))
        .template(Template::new("world_button", stripes(16, 4), 0.9))
        .template_region("dialog", Rect::new(100, 0, 60, 60), &["close_x"])
        .template_region("nav", Rect::new(0, 60, 60, 60), &["world_button"])
        .button("popup_close", Rect::new(CLOSE_AT.0, CLOSE_AT.1, 16, 16))
        .rule(StateRule::new(
            "popup",
            vec![Predicate::template("dialog", "close_x")],
        ))
        .rule(StateRule::new(
            "home",
            vec![
                Predicate::template("nav", "world_button"),
                Predicate::region_empty("dialog"),
            ],
        ))
        .build()
        .unwrap()
}

pub fn observer() -> StateObserver {
    StateObserver::new(VisionPipeline::with_glyphs(Arc::new(screen_catalog())))
}

pub fn map_frame() -> Frame {
    let mut gray = blank(REF.0, REF.1);
    paste(&mut gray, &stripes(16, 4), NAV_AT.0, NAV_AT.1);
    frame_of(gray)
}

pub fn dialog_frame() -> Frame {
    let mut gray = blank(REF.0, REF.1);
    paste(&mut gray, &stripes(16, 4), NAV_AT.0, NAV_AT.1);
    paste(&mut gray, &checker(16, 4), CLOSE_AT.0, CLOSE_AT.1);
    frame_of(gray)
}

pub fn unknown_frame() -> Frame {
    frame_of(blank(REF.0, REF.1))
}
