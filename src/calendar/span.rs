use serde::{Deserialize, Serialize};

use super::month::Day;

/// A maximal run of consecutive days held by one owner
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Span {
    pub start: Day,
    pub end: Day,
    /// Every day of the run, ascending and contiguous
    pub days: Vec<Day>,
}

impl Span {
    fn starting_at(day: Day) -> Self {
        Span {
            start: day,
            end: day,
            days: vec![day],
        }
    }

    fn push(&mut self, day: Day) {
        self.end = day;
        self.days.push(day);
    }

    pub fn len(&self) -> usize {
        self.days.len()
    }

    pub fn is_empty(&self) -> bool {
        self.days.is_empty()
    }

    pub fn covers(&self, day: Day) -> bool {
        self.start <= day && day <= self.end
    }

    pub fn overlaps(&self, other: &Span) -> bool {
        self.start <= other.end && other.start <= self.end
    }
}

/// Groups a set of day numbers into maximal contiguous spans
///
/// The input may be unordered and may repeat days. The spans come back
/// sorted by start day; an empty input yields no spans.
///
/// # Examples
/// ```
/// use gleemanager::calendar::extract_spans;
///
/// let spans = extract_spans([10, 3, 5, 4]);
/// assert_eq!(spans.len(), 2);
/// assert_eq!((spans[0].start, spans[0].end), (3, 5));
/// assert_eq!((spans[1].start, spans[1].end), (10, 10));
/// ```
pub fn extract_spans<I>(days: I) -> Vec<Span>
where
    I: IntoIterator<Item = Day>,
{
    let mut sorted: Vec<Day> = days.into_iter().collect();
    sorted.sort_unstable();
    sorted.dedup();

    let mut spans = Vec::new();
    let mut current: Option<Span> = None;

    for day in sorted {
        match current.as_mut() {
            Some(span) if span.end.checked_add(1) == Some(day) => span.push(day),
            _ => {
                if let Some(done) = current.take() {
                    spans.push(done);
                }
                current = Some(Span::starting_at(day));
            }
        }
    }

    if let Some(done) = current {
        spans.push(done);
    }

    spans
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    fn bounds(spans: &[Span]) -> Vec<(Day, Day)> {
        spans.iter().map(|s| (s.start, s.end)).collect()
    }

    #[test]
    fn empty_input_gives_no_spans() {
        assert!(extract_spans(Vec::<Day>::new()).is_empty());
    }

    #[test]
    fn singleton_gives_one_span() {
        let spans = extract_spans([17]);
        assert_eq!(spans, vec![Span { start: 17, end: 17, days: vec![17] }]);
    }

    #[test]
    fn splits_on_gaps() {
        let spans = extract_spans([3, 4, 5, 10]);
        assert_eq!(bounds(&spans), vec![(3, 5), (10, 10)]);
        assert_eq!(spans[0].days, vec![3, 4, 5]);
    }

    #[test]
    fn unordered_and_repeated_days() {
        let spans = extract_spans([31, 1, 2, 2, 30, 15]);
        assert_eq!(bounds(&spans), vec![(1, 2), (15, 15), (30, 31)]);
    }

    // Every subset of 1..=12: spans are sorted, disjoint, maximal and
    // cover exactly the input.
    #[test]
    fn spans_partition_every_small_subset() {
        for mask in 0u32..(1 << 12) {
            let input: BTreeSet<Day> = (1..=12).filter(|d| mask & (1 << (d - 1)) != 0).collect();
            let spans = extract_spans(input.iter().copied());

            let covered: BTreeSet<Day> =
                spans.iter().flat_map(|s| s.days.iter().copied()).collect();
            assert_eq!(covered, input, "mask {mask:#b}");

            for pair in spans.windows(2) {
                assert!(pair[0].end + 1 < pair[1].start, "mask {mask:#b}");
                assert!(!pair[0].overlaps(&pair[1]));
            }
            for span in &spans {
                assert_eq!(span.days.first(), Some(&span.start));
                assert_eq!(span.days.last(), Some(&span.end));
                assert_eq!(span.len(), (span.end - span.start + 1) as usize);
            }
        }
    }
}
