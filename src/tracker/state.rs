use std::time::Duration;
use tokio::time::Instant;

use crate::models::{PageVisit, SessionId};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Visibility {
    Visible,
    Hidden,
}

impl Default for Visibility {
    fn default() -> Self {
        Visibility::Visible
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackerStatus {
    Active,
    Destroyed,
}

/// Visible dwell time of a single page.
///
/// `accumulated` holds time from earlier visible windows; `running_anchor` is
/// set only while the page is visible. Every accumulation consumes the anchor,
/// so pausing or finalizing twice in a row never counts the same window twice.
#[derive(Debug, Clone, Default)]
pub struct DwellTimer {
    accumulated: Duration,
    running_anchor: Option<Instant>,
}

impl DwellTimer {
    pub fn start(now: Instant, visibility: Visibility) -> Self {
        Self {
            accumulated: Duration::ZERO,
            running_anchor: (visibility == Visibility::Visible).then_some(now),
        }
    }

    /// Fold the running window into the total. Returns whether anything was added.
    pub fn pause(&mut self, now: Instant) -> bool {
        let Some(anchor) = self.running_anchor.take() else {
            return false;
        };
        let elapsed = now.saturating_duration_since(anchor);
        if elapsed.is_zero() {
            return false;
        }
        self.accumulated = self.accumulated.saturating_add(elapsed);
        true
    }

    /// Start a new visible window unless one is already open.
    pub fn resume(&mut self, now: Instant) {
        if self.running_anchor.is_none() {
            self.running_anchor = Some(now);
        }
    }

    pub fn accumulated(&self) -> Duration {
        self.accumulated
    }

    pub fn current(&self, now: Instant) -> Duration {
        match self.running_anchor {
            Some(anchor) => self
                .accumulated
                .saturating_add(now.saturating_duration_since(anchor)),
            None => self.accumulated,
        }
    }
}

/// The record for the page currently on screen, plus its timer.
#[derive(Debug, Clone)]
pub struct PendingVisit {
    pub record: PageVisit,
    pub timer: DwellTimer,
}

impl PendingVisit {
    pub fn new(record: PageVisit, now: Instant, visibility: Visibility) -> Self {
        Self {
            record,
            timer: DwellTimer::start(now, visibility),
        }
    }

    pub fn pause(&mut self, now: Instant) {
        if self.timer.pause(now) {
            self.record.time_spent_seconds = Some(self.timer.accumulated().as_secs());
        }
    }

    pub fn resume(&mut self, now: Instant) {
        self.timer.resume(now);
    }

    pub fn finalize(mut self, now: Instant) -> PageVisit {
        self.pause(now);
        self.record
    }
}

#[derive(Debug, Clone)]
pub struct TrackerState {
    pub status: TrackerStatus,
    pub session_id: SessionId,
    pub visibility: Visibility,
    pub current: Option<PendingVisit>,
}

impl TrackerState {
    pub fn new(session_id: SessionId, visibility: Visibility) -> Self {
        Self {
            status: TrackerStatus::Active,
            session_id,
            visibility,
            current: None,
        }
    }

    pub fn is_active(&self) -> bool {
        self.status == TrackerStatus::Active
    }

    /// Replace the current page, handing back the finalized previous record.
    pub fn begin_page(&mut self, record: PageVisit, now: Instant) -> Option<PageVisit> {
        let previous = self.finish_page(now);
        self.current = Some(PendingVisit::new(record, now, self.visibility));
        previous
    }

    pub fn finish_page(&mut self, now: Instant) -> Option<PageVisit> {
        self.current.take().map(|pending| pending.finalize(now))
    }

    /// Apply a visibility change. Returns false when the state did not change.
    pub fn set_visibility(&mut self, visibility: Visibility, now: Instant) -> bool {
        if self.visibility == visibility {
            return false;
        }
        self.visibility = visibility;
        if let Some(pending) = self.current.as_mut() {
            match visibility {
                Visibility::Hidden => pending.pause(now),
                Visibility::Visible => pending.resume(now),
            }
        }
        true
    }

    pub fn destroy(&mut self, now: Instant) -> Option<PageVisit> {
        let last = self.finish_page(now);
        self.status = TrackerStatus::Destroyed;
        last
    }
}
