use serde::Serialize;
use std::time::{Duration, Instant};

/// Time each fade edge takes
pub const FADE_DURATION: Duration = Duration::from_millis(300);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum PreviewPhase {
    Hidden,
    FadingIn,
    Visible,
    FadingOut,
}

/// Sequences which preview request is on screen
///
/// At most one request is shown at a time. Switching to another request
/// first fades the current one out; the next one only starts fading in
/// once that has finished. Time is passed in by the caller so the machine
/// can be driven from a timer or a test alike.
#[derive(Debug, Clone)]
pub struct PreviewTransition {
    phase: PreviewPhase,
    current: Option<String>,
    queued: Option<String>,
    since: Instant,
    fade: Duration,
}

impl PreviewTransition {
    pub fn new(now: Instant) -> Self {
        Self::with_fade(now, FADE_DURATION)
    }

    pub fn with_fade(now: Instant, fade: Duration) -> Self {
        PreviewTransition {
            phase: PreviewPhase::Hidden,
            current: None,
            queued: None,
            since: now,
            fade,
        }
    }

    pub fn phase(&self) -> PreviewPhase {
        self.phase
    }

    /// Request currently occupying the preview, if it is not hidden
    pub fn current(&self) -> Option<&str> {
        match self.phase {
            PreviewPhase::Hidden => None,
            _ => self.current.as_deref(),
        }
    }

    /// Request waiting for the current one to fade out
    pub fn queued(&self) -> Option<&str> {
        self.queued.as_deref()
    }

    fn enter(&mut self, phase: PreviewPhase, now: Instant) {
        self.phase = phase;
        self.since = now;
    }

    /// Toggles the preview of `request_id`
    ///
    /// Toggling the request already shown hides it; toggling another one
    /// replaces it after a fade-out.
    pub fn toggle(&mut self, request_id: &str, now: Instant) {
        self.advance(now);
        match self.phase {
            PreviewPhase::Hidden => {
                self.current = Some(request_id.to_string());
                self.queued = None;
                self.enter(PreviewPhase::FadingIn, now);
            }
            PreviewPhase::FadingIn | PreviewPhase::Visible => {
                if self.current.as_deref() != Some(request_id) {
                    self.queued = Some(request_id.to_string());
                }
                self.enter(PreviewPhase::FadingOut, now);
            }
            PreviewPhase::FadingOut => {
                // toggling the one on its way out cancels any queued switch
                if self.current.as_deref() == Some(request_id) {
                    self.queued = None;
                } else {
                    self.queued = Some(request_id.to_string());
                }
            }
        }
    }

    /// Hides whatever is shown and drops a queued switch
    pub fn clear(&mut self, now: Instant) {
        self.advance(now);
        self.queued = None;
        if matches!(self.phase, PreviewPhase::FadingIn | PreviewPhase::Visible) {
            self.enter(PreviewPhase::FadingOut, now);
        }
    }

    /// Completes every fade whose timer has run out by `now`
    pub fn advance(&mut self, now: Instant) {
        loop {
            let due = self.since + self.fade;
            if now < due {
                return;
            }
            match self.phase {
                PreviewPhase::FadingIn => self.enter(PreviewPhase::Visible, due),
                PreviewPhase::FadingOut => match self.queued.take() {
                    Some(next) => {
                        self.current = Some(next);
                        self.enter(PreviewPhase::FadingIn, due);
                    }
                    None => {
                        self.current = None;
                        self.enter(PreviewPhase::Hidden, due);
                    }
                },
                PreviewPhase::Hidden | PreviewPhase::Visible => return,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    #[test]
    fn fades_in_then_becomes_visible() {
        let t0 = Instant::now();
        let mut preview = PreviewTransition::new(t0);
        assert_eq!(preview.phase(), PreviewPhase::Hidden);

        preview.toggle("r1", t0);
        assert_eq!(preview.phase(), PreviewPhase::FadingIn);
        assert_eq!(preview.current(), Some("r1"));

        preview.advance(t0 + ms(299));
        assert_eq!(preview.phase(), PreviewPhase::FadingIn);
        preview.advance(t0 + ms(300));
        assert_eq!(preview.phase(), PreviewPhase::Visible);
    }

    #[test]
    fn toggling_same_request_hides_it() {
        let t0 = Instant::now();
        let mut preview = PreviewTransition::new(t0);
        preview.toggle("r1", t0);
        preview.toggle("r1", t0 + ms(400));
        assert_eq!(preview.phase(), PreviewPhase::FadingOut);

        preview.advance(t0 + ms(700));
        assert_eq!(preview.phase(), PreviewPhase::Hidden);
        assert_eq!(preview.current(), None);
    }

    #[test]
    fn switching_fades_out_before_next_fades_in() {
        let t0 = Instant::now();
        let mut preview = PreviewTransition::new(t0);
        preview.toggle("r1", t0);
        preview.advance(t0 + ms(300));

        preview.toggle("r2", t0 + ms(500));
        assert_eq!(preview.phase(), PreviewPhase::FadingOut);
        assert_eq!(preview.current(), Some("r1"));
        assert_eq!(preview.queued(), Some("r2"));

        preview.advance(t0 + ms(800));
        assert_eq!(preview.phase(), PreviewPhase::FadingIn);
        assert_eq!(preview.current(), Some("r2"));
        assert_eq!(preview.queued(), None);

        preview.advance(t0 + ms(1100));
        assert_eq!(preview.phase(), PreviewPhase::Visible);
    }

    #[test]
    fn late_tick_runs_through_all_due_edges() {
        let t0 = Instant::now();
        let mut preview = PreviewTransition::new(t0);
        preview.toggle("r1", t0);
        preview.toggle("r2", t0 + ms(100));

        // fade-out ends at 400, r2 fade-in ends at 700
        preview.advance(t0 + ms(2000));
        assert_eq!(preview.phase(), PreviewPhase::Visible);
        assert_eq!(preview.current(), Some("r2"));
    }

    #[test]
    fn retoggling_outgoing_request_cancels_queued_switch() {
        let t0 = Instant::now();
        let mut preview = PreviewTransition::new(t0);
        preview.toggle("r1", t0);
        preview.toggle("r2", t0 + ms(350));
        preview.toggle("r1", t0 + ms(400));
        assert_eq!(preview.queued(), None);

        preview.advance(t0 + ms(650));
        assert_eq!(preview.phase(), PreviewPhase::Hidden);
    }

    #[test]
    fn clear_hides_and_drops_queue() {
        let t0 = Instant::now();
        let mut preview = PreviewTransition::new(t0);
        preview.toggle("r1", t0);
        preview.toggle("r2", t0 + ms(350));
        preview.clear(t0 + ms(360));
        preview.advance(t0 + ms(1000));
        assert_eq!(preview.phase(), PreviewPhase::Hidden);
        assert_eq!(preview.queued(), None);
    }
}
