use serde::{Deserialize, Serialize};

use super::month::{YearMonth, days_in};
use super::slots::{SlotAssigner, SlotAssignment};
use super::span::extract_spans;

/// Prefix of the synthetic owner id a preview is laid out under
pub const PREVIEW_OWNER_PREFIX: &str = "preview-";

/// A holiday request shown to an administrator before it is decided
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PreviewRequest {
    pub request_id: String,
    /// ISO `YYYY-MM-DD` dates, possibly spanning several months
    pub dates: Vec<String>,
    pub owner_display_name: String,
    pub notes: Option<String>,
}

impl PreviewRequest {
    pub fn owner_id(&self) -> String {
        format!("{}{}", PREVIEW_OWNER_PREFIX, self.request_id)
    }
}

/// Lays a preview over an already computed assignment
///
/// Only dates inside `month` count. The preview takes the lowest lane that
/// is still free on all of its days, using the same first-fit rule as real
/// owners; lanes of owners placed before are left as they are. Returns the
/// preview's assignment, or `None` when the request has no day in the month.
pub fn overlay_preview<'a>(
    assigner: &'a mut SlotAssigner,
    month: YearMonth,
    preview: &PreviewRequest,
) -> Option<&'a SlotAssignment> {
    let days = days_in(month, preview.dates.iter().map(String::as_str));
    let spans = extract_spans(days);
    assigner.assign(&preview.owner_id(), spans)?;
    assigner.assignments().last()
}
