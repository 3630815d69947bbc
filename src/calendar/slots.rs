use serde::{Deserialize, Serialize};

use super::month::Day;
use super::span::Span;

/// Number of lanes searched before giving up and falling back to lane 0
pub const SLOT_CAP: u8 = 10;

/// Upper bound for a custom cap; one bit per lane in the per-day table
const MAX_CAP: u8 = 32;

/// The slot given to one owner for the whole month
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlotAssignment {
    pub owner_id: String,
    pub slot: u8,
    /// True when every lane below the cap was taken and slot 0 was used anyway
    pub overflowed: bool,
    pub spans: Vec<Span>,
}

/// Greedy first-fit lane allocator for one month
///
/// Owners are placed in the order they are handed in. Each owner gets the
/// lowest lane that is free on every day of every one of their spans, and
/// keeps that lane for all their spans. Already placed owners are never
/// moved, which is what lets a preview be laid over a finished assignment.
#[derive(Debug, Clone)]
pub struct SlotAssigner {
    /// taken[day] has bit `n` set when lane `n` is used on that day; index 0 unused
    taken: Vec<u32>,
    cap: u8,
    assignments: Vec<SlotAssignment>,
}

impl SlotAssigner {
    pub fn new(days_in_month: u8) -> Self {
        Self::with_cap(days_in_month, SLOT_CAP)
    }

    pub fn with_cap(days_in_month: u8, cap: u8) -> Self {
        SlotAssigner {
            taken: vec![0; days_in_month as usize + 1],
            cap: cap.clamp(1, MAX_CAP),
            assignments: Vec::new(),
        }
    }

    pub fn days_in_month(&self) -> u8 {
        (self.taken.len() - 1) as u8
    }

    fn covered_days(&self, spans: &[Span]) -> Vec<usize> {
        let last = self.days_in_month();
        spans
            .iter()
            .flat_map(|span| span.start..=span.end)
            .filter(|day| (1..=last).contains(day))
            .map(|day| day as usize)
            .collect()
    }

    /// Whether `slot` is free on every day covered by `spans`
    pub fn is_free(&self, spans: &[Span], slot: u8) -> bool {
        let bit = 1u32 << slot;
        self.covered_days(spans)
            .into_iter()
            .all(|day| self.taken[day] & bit == 0)
    }

    /// Whether `slot` is already used on `day`
    pub fn is_taken(&self, day: Day, slot: u8) -> bool {
        slot < MAX_CAP
            && self
                .taken
                .get(day as usize)
                .is_some_and(|lanes| lanes & (1u32 << slot) != 0)
    }

    fn mark(&mut self, spans: &[Span], slot: u8) {
        let bit = 1u32 << slot;
        for day in self.covered_days(spans) {
            self.taken[day] |= bit;
        }
    }

    /// Places one owner and returns the lane it got
    ///
    /// Returns `None` for an owner without spans, who takes no lane and is
    /// not recorded. When no lane below the cap is free the owner is put on
    /// lane 0 regardless of the collision.
    pub fn assign(&mut self, owner_id: &str, spans: Vec<Span>) -> Option<u8> {
        if spans.is_empty() {
            return None;
        }

        let found = (0..self.cap).find(|&slot| self.is_free(&spans, slot));
        let slot = found.unwrap_or(0);
        if found.is_none() {
            log::debug!(
                "no free lane below {} for owner {}, falling back to lane 0",
                self.cap,
                owner_id
            );
        }

        self.mark(&spans, slot);
        self.assignments.push(SlotAssignment {
            owner_id: owner_id.to_string(),
            slot,
            overflowed: found.is_none(),
            spans,
        });
        Some(slot)
    }

    pub fn assignments(&self) -> &[SlotAssignment] {
        &self.assignments
    }

    pub fn into_assignments(self) -> Vec<SlotAssignment> {
        self.assignments
    }

    /// Lane of an already placed owner
    pub fn slot_of(&self, owner_id: &str) -> Option<u8> {
        self.assignments
            .iter()
            .find(|a| a.owner_id == owner_id)
            .map(|a| a.slot)
    }

    /// Highest lane in use plus one
    pub fn lanes_used(&self) -> u8 {
        self.assignments
            .iter()
            .map(|a| a.slot + 1)
            .max()
            .unwrap_or(0)
    }
}

/// Runs the first-fit assignment over owners in the given order
pub fn assign_slots<I>(days_in_month: u8, owners: I) -> SlotAssigner
where
    I: IntoIterator<Item = (String, Vec<Span>)>,
{
    let mut assigner = SlotAssigner::new(days_in_month);
    for (owner_id, spans) in owners {
        assigner.assign(&owner_id, spans);
    }
    assigner
}
