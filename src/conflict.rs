//! Detect overlaps between a candidate lesson and a teacher's existing day.
//!
//! Intervals are half-open `[start, end)` in minutes since midnight, so a
//! lesson starting exactly when another ends is not a conflict.

use serde::Serialize;

use crate::{
    config::ScheduleConfig,
    error::{SchedulerError, SchedulerResult},
    models::Event,
    schedule::OperatingWindow,
    time,
    timeline::TimelineEntry,
};

pub const DEFAULT_SLOT_STEP_MINUTES: u32 = 15;
pub const DEFAULT_MAX_SUGGESTIONS: usize = 3;

/// A `[start, end)` interval in minutes since midnight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TimeSlot {
    pub start: u32,
    pub end: u32,
}

impl TimeSlot {
    pub fn new(start: u32, duration_minutes: u32) -> Self {
        Self {
            start,
            end: start.saturating_add(duration_minutes),
        }
    }

    pub fn duration_minutes(&self) -> u32 {
        self.end - self.start
    }

    pub fn overlaps(&self, other: &TimeSlot) -> bool {
        self.start < other.end && other.start < self.end
    }

    pub fn start_time(&self) -> String {
        time::minutes_to_time(i64::from(self.start))
    }

    pub fn end_time(&self) -> String {
        time::minutes_to_time(i64::from(self.end))
    }
}

/// Anything that may occupy a teacher's time.
///
/// Returns `None` when the item does not block: cancelled, or missing a
/// location, duration or start time.
pub trait BusySource {
    fn busy_slot(&self) -> Option<TimeSlot>;
}

impl BusySource for TimeSlot {
    fn busy_slot(&self) -> Option<TimeSlot> {
        Some(*self)
    }
}

impl BusySource for TimelineEntry {
    fn busy_slot(&self) -> Option<TimeSlot> {
        if !self.status.blocks_schedule() || self.location.is_none() || self.duration_minutes == 0 {
            return None;
        }
        Some(TimeSlot::new(
            time::minutes_of_day(&self.scheduled_start),
            self.duration_minutes,
        ))
    }
}

impl BusySource for Event {
    fn busy_slot(&self) -> Option<TimeSlot> {
        if !self.status.blocks_schedule() {
            return None;
        }
        self.location?;
        let start = self.starts_at?;
        let duration = self.duration_minutes.filter(|d| *d > 0)?;
        Some(TimeSlot::new(time::minutes_of_day(&start), duration))
    }
}

/// How alternative slots are searched for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlotSearch {
    pub step_minutes: u32,
    pub max_suggestions: usize,
}

impl SlotSearch {
    pub fn from_config(config: &ScheduleConfig) -> Self {
        Self {
            step_minutes: config.slot_step_minutes,
            max_suggestions: config.max_suggestions,
        }
    }
}

impl Default for SlotSearch {
    fn default() -> Self {
        Self {
            step_minutes: DEFAULT_SLOT_STEP_MINUTES,
            max_suggestions: DEFAULT_MAX_SUGGESTIONS,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConflictReport<'a, T> {
    pub candidate: TimeSlot,
    pub has_conflict: bool,
    /// Entries overlapping the candidate, in the caller's order
    pub conflicting_entries: Vec<&'a T>,
    /// Earliest free slots after the conflicts, earliest first.
    /// Empty when there is no conflict or nothing fits before closing.
    pub suggested_alternatives: Vec<TimeSlot>,
    /// Whether the candidate itself lies inside operating hours
    pub within_window: bool,
}

impl<T> ConflictReport<'_, T> {
    pub fn first_alternative(&self) -> Option<&TimeSlot> {
        self.suggested_alternatives.first()
    }
}

/// Check a candidate lesson against existing entries using the default
/// slot search.
///
/// `candidate_duration` must be positive; zero is rejected.
pub fn check_conflict<'a, T: BusySource>(
    candidate_start: &str,
    candidate_duration: u32,
    existing: &'a [T],
    window: &OperatingWindow,
) -> SchedulerResult<ConflictReport<'a, T>> {
    check_conflict_with(
        candidate_start,
        candidate_duration,
        existing,
        window,
        SlotSearch::default(),
    )
}

pub fn check_conflict_with<'a, T: BusySource>(
    candidate_start: &str,
    candidate_duration: u32,
    existing: &'a [T],
    window: &OperatingWindow,
    search: SlotSearch,
) -> SchedulerResult<ConflictReport<'a, T>> {
    if candidate_duration == 0 || i64::from(candidate_duration) > time::MINUTES_PER_DAY {
        return Err(SchedulerError::InvalidDuration(candidate_duration));
    }
    let candidate = TimeSlot::new(time::time_to_minutes(candidate_start)?, candidate_duration);

    let busy: Vec<TimeSlot> = existing.iter().filter_map(BusySource::busy_slot).collect();

    let conflicting: Vec<(&'a T, TimeSlot)> = existing
        .iter()
        .filter_map(|item| item.busy_slot().map(|slot| (item, slot)))
        .filter(|(_, slot)| slot.overlaps(&candidate))
        .collect();

    let suggested_alternatives = match conflicting.iter().map(|(_, slot)| slot.end).max() {
        Some(latest_end) => suggest_alternatives(latest_end, candidate_duration, &busy, window, search),
        None => Vec::new(),
    };

    if !conflicting.is_empty() {
        tracing::debug!(
            "Candidate {}-{} conflicts with {} entries, {} alternatives found",
            candidate.start_time(),
            candidate.end_time(),
            conflicting.len(),
            suggested_alternatives.len()
        );
    }

    Ok(ConflictReport {
        candidate,
        has_conflict: !conflicting.is_empty(),
        conflicting_entries: conflicting.into_iter().map(|(item, _)| item).collect(),
        suggested_alternatives,
        within_window: window.fits(&candidate),
    })
}

/// First free `duration_minutes` slot starting at or after `from`, scanning in
/// `step_minutes` increments and staying inside the operating window.
pub fn find_next_free_slot(
    from: u32,
    duration_minutes: u32,
    busy: &[TimeSlot],
    window: &OperatingWindow,
    step_minutes: u32,
) -> Option<TimeSlot> {
    let step = step_minutes.max(1);
    let mut start = from.max(window.open_minutes());

    while start.checked_add(duration_minutes)? <= window.close_minutes() {
        let slot = TimeSlot::new(start, duration_minutes);
        if !busy.iter().any(|b| b.overlaps(&slot)) {
            return Some(slot);
        }
        start = start.checked_add(step)?;
    }
    None
}

fn suggest_alternatives(
    from: u32,
    duration_minutes: u32,
    busy: &[TimeSlot],
    window: &OperatingWindow,
    search: SlotSearch,
) -> Vec<TimeSlot> {
    let mut suggestions = Vec::new();
    let mut cursor = from;

    while suggestions.len() < search.max_suggestions.max(1) {
        let Some(slot) =
            find_next_free_slot(cursor, duration_minutes, busy, window, search.step_minutes)
        else {
            break;
        };
        suggestions.push(slot);
        cursor = slot.end;
    }
    suggestions
}
