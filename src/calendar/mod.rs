//! Holiday calendar layout
//!
//! Turns per-owner holiday days of one month into drawable lanes:
//! days are grouped into spans, every owner gets one lane for the whole
//! month, and an optional preview request is laid on top without moving
//! anyone. Everything here is recomputed from scratch for each month,
//! holiday snapshot or preview change.

pub mod layout;
pub mod month;
pub mod preview;
pub mod slots;
pub mod span;
pub mod transition;

pub use layout::{
    CalendarLayout, OwnerHolidays, PALETTE, PREVIEW_COLOR, SlottedSpan, build_layout,
};
pub use month::{Day, YearMonth, days_in, parse_iso_date};
pub use preview::{PREVIEW_OWNER_PREFIX, PreviewRequest, overlay_preview};
pub use slots::{SLOT_CAP, SlotAssigner, SlotAssignment, assign_slots};
pub use span::{Span, extract_spans};
pub use transition::{FADE_DURATION, PreviewPhase, PreviewTransition};
