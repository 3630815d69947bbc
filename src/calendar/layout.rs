use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::month::{Day, YearMonth};
use super::preview::{PreviewRequest, overlay_preview};
use super::slots::{SlotAssigner, SlotAssignment};
use super::span::{Span, extract_spans};

/// Color used for the preview lane
pub const PREVIEW_COLOR: &str = "#9e9e9e";

/// Fallback colors for owners without a chosen one, picked by roster position
pub const PALETTE: [&str; 10] = [
    "#4e79a7", "#f28e2b", "#e15759", "#76b7b2", "#59a14f", "#edc948", "#b07aa1", "#ff9da7",
    "#9c755f", "#bab0ac",
];

/// One owner's holiday days for the displayed month
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OwnerHolidays {
    pub owner_id: String,
    pub display_name: String,
    pub color: Option<String>,
    pub days: Vec<Day>,
    /// Comment attached to individual days, e.g. the notes of the request
    #[serde(default)]
    pub comments: BTreeMap<Day, String>,
}

/// A span ready to be drawn
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlottedSpan {
    pub start: Day,
    pub end: Day,
    pub days: Vec<Day>,
    pub slot: u8,
    pub owner_id: String,
    pub display_name: String,
    pub display_color: String,
    pub has_comment: bool,
    pub comment_text: Option<String>,
    pub is_preview: bool,
}

/// Everything the month grid needs
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CalendarLayout {
    pub year_month: YearMonth,
    pub days_in_month: u8,
    /// Number of lanes the grid must reserve
    pub slot_count: u8,
    pub spans: Vec<SlottedSpan>,
}

impl CalendarLayout {
    pub fn spans_of<'a>(&'a self, owner_id: &'a str) -> impl Iterator<Item = &'a SlottedSpan> + 'a {
        self.spans.iter().filter(move |s| s.owner_id == owner_id)
    }

    pub fn preview_spans(&self) -> impl Iterator<Item = &SlottedSpan> {
        self.spans.iter().filter(|s| s.is_preview)
    }
}

fn span_comment(span: &Span, comments: &BTreeMap<Day, String>) -> Option<String> {
    let mut texts: Vec<&str> = Vec::new();
    for day in &span.days {
        if let Some(text) = comments.get(day) {
            let text = text.trim();
            if !text.is_empty() && !texts.contains(&text) {
                texts.push(text);
            }
        }
    }
    (!texts.is_empty()).then(|| texts.join("\n"))
}

struct OwnerStyle<'a> {
    display_name: &'a str,
    color: String,
    comments: BTreeMap<Day, String>,
    is_preview: bool,
}

fn slotted(assignment: &SlotAssignment, style: &OwnerStyle<'_>) -> Vec<SlottedSpan> {
    assignment
        .spans
        .iter()
        .map(|span| {
            let comment_text = span_comment(span, &style.comments);
            SlottedSpan {
                start: span.start,
                end: span.end,
                days: span.days.clone(),
                slot: assignment.slot,
                owner_id: assignment.owner_id.clone(),
                display_name: style.display_name.to_string(),
                display_color: style.color.clone(),
                has_comment: comment_text.is_some(),
                comment_text,
                is_preview: style.is_preview,
            }
        })
        .collect()
}

/// Builds the calendar layout of one month from scratch
///
/// `owners` must be in roster order; it decides who gets the lower lanes.
/// The optional preview is placed last, on top of the finished assignment.
pub fn build_layout(
    year_month: YearMonth,
    owners: &[OwnerHolidays],
    preview: Option<&PreviewRequest>,
) -> CalendarLayout {
    let days_in_month = year_month.days_in_month();
    let mut assigner = SlotAssigner::new(days_in_month);
    let mut styles: Vec<OwnerStyle<'_>> = Vec::new();

    for (index, owner) in owners.iter().enumerate() {
        let spans = extract_spans(owner.days.iter().copied());
        if assigner.assign(&owner.owner_id, spans).is_none() {
            continue;
        }
        styles.push(OwnerStyle {
            display_name: &owner.display_name,
            color: owner
                .color
                .clone()
                .unwrap_or_else(|| PALETTE[index % PALETTE.len()].to_string()),
            comments: owner.comments.clone(),
            is_preview: false,
        });
    }

    if let Some(preview) = preview {
        if let Some(placed) = overlay_preview(&mut assigner, year_month, preview) {
            let notes = preview.notes.clone().unwrap_or_default();
            let comments = placed
                .spans
                .iter()
                .flat_map(|s| s.days.iter().map(|d| (*d, notes.clone())))
                .collect();
            styles.push(OwnerStyle {
                display_name: &preview.owner_display_name,
                color: PREVIEW_COLOR.to_string(),
                comments,
                is_preview: true,
            });
        }
    }

    let slot_count = assigner.lanes_used();
    let spans = assigner
        .assignments()
        .iter()
        .zip(styles.iter())
        .flat_map(|(assignment, style)| slotted(assignment, style))
        .collect();

    CalendarLayout {
        year_month,
        days_in_month,
        slot_count,
        spans,
    }
}
