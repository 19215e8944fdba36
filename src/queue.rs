//! A teacher's ordered lessons for one day.
//!
//! Entries are kept in position order. After every mutation the start times
//! are recomputed head to tail:
//! - the head starts at its recorded time plus its manual offset
//! - every other entry starts where its predecessor ends, plus the slack it
//!   was recorded with, plus its own offset
//!
//! Negative offsets may make an entry overlap its predecessor; preventing
//! that is the conflict detector's job at insertion time.

use chrono::{NaiveDate, NaiveDateTime};
use serde::Serialize;

use crate::{
    conflict::{self, ConflictReport},
    error::SchedulerResult,
    schedule::OperatingWindow,
    time,
    timeline::TimelineEntry,
};

/// Shortest a lesson may be.
pub const MIN_DURATION_MINUTES: u32 = 15;

/// Step the duration and offset controls move by.
pub const DEFAULT_STEP_MINUTES: i32 = 15;

/// Outcome of [`TeacherDayQueue::adjust_duration`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DurationChange {
    Applied { from: u32, to: u32 },
    /// The request went below the minimum and was clamped to it
    ClampedToMinimum { from: u32, to: u32 },
    /// Nothing to do (zero delta, or already at the minimum)
    Unchanged,
    /// The increase would exceed what the package has left
    RejectedByPackage { requested: u32, ceiling: u32 },
    NotFound,
}

impl DurationChange {
    pub fn is_applied(&self) -> bool {
        matches!(
            self,
            DurationChange::Applied { .. } | DurationChange::ClampedToMinimum { .. }
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TeacherDayQueue {
    teacher_id: i64,
    date: NaiveDate,
    entries: Vec<TimelineEntry>,
}

impl TeacherDayQueue {
    pub fn new(teacher_id: i64, date: NaiveDate) -> Self {
        Self {
            teacher_id,
            date,
            entries: Vec::new(),
        }
    }

    pub fn teacher_id(&self) -> i64 {
        self.teacher_id
    }

    pub fn date(&self) -> NaiveDate {
        self.date
    }

    pub fn entries(&self) -> &[TimelineEntry] {
        &self.entries
    }

    pub fn entry(&self, id: i64) -> Option<&TimelineEntry> {
        self.entries.iter().find(|e| e.matches(id))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn total_duration(&self) -> u32 {
        self.entries.iter().map(|e| e.duration_minutes).sum()
    }

    /// End of the last entry, where an appended lesson would start.
    pub fn next_available_start(&self) -> Option<NaiveDateTime> {
        self.entries.last().map(TimelineEntry::scheduled_end)
    }

    fn position(&self, id: i64) -> Option<usize> {
        self.entries.iter().position(|e| e.matches(id))
    }

    // ==================== Mutations ====================

    /// Append an entry to the end of the day.
    pub fn add_entry(&mut self, entry: TimelineEntry) {
        self.entries.push(entry);
        self.recompute();
    }

    /// Remove the entry with `id`. Returns `false` if there was none.
    pub fn remove_entry(&mut self, id: i64) -> bool {
        let Some(index) = self.position(id) else {
            return false;
        };
        self.entries.remove(index);
        self.recompute();
        true
    }

    pub fn can_move_up(&self, id: i64) -> bool {
        self.position(id).is_some_and(|index| index > 0)
    }

    pub fn can_move_down(&self, id: i64) -> bool {
        self.position(id)
            .is_some_and(|index| index + 1 < self.entries.len())
    }

    /// Swap the entry with its predecessor. No-op for the head.
    pub fn move_up(&mut self, id: i64) -> bool {
        match self.position(id) {
            Some(index) if index > 0 => {
                self.entries.swap(index - 1, index);
                self.recompute();
                true
            }
            _ => false,
        }
    }

    /// Swap the entry with its successor. No-op for the tail.
    pub fn move_down(&mut self, id: i64) -> bool {
        match self.position(id) {
            Some(index) if index + 1 < self.entries.len() => {
                self.entries.swap(index, index + 1);
                self.recompute();
                true
            }
            _ => false,
        }
    }

    /// Change a lesson's length by `delta_minutes`.
    ///
    /// The result never drops below [`MIN_DURATION_MINUTES`]. An increase past
    /// the package allowance is rejected and the duration left as it was.
    pub fn adjust_duration(&mut self, id: i64, delta_minutes: i32) -> DurationChange {
        let Some(index) = self.position(id) else {
            return DurationChange::NotFound;
        };
        let from = self.entries[index].duration_minutes;
        let requested = i64::from(from) + i64::from(delta_minutes);
        let to = u32::try_from(requested.max(i64::from(MIN_DURATION_MINUTES)))
            .unwrap_or(u32::MAX);

        if to == from {
            return DurationChange::Unchanged;
        }
        if to > from {
            if let Some(ceiling) = self.duration_ceiling_at(index) {
                if to > ceiling {
                    tracing::debug!(
                        "Rejected duration {} for event {}: package allows {}",
                        to,
                        id,
                        ceiling
                    );
                    return DurationChange::RejectedByPackage {
                        requested: to,
                        ceiling,
                    };
                }
            }
        }

        self.entries[index].duration_minutes = to;
        self.recompute();

        if requested < i64::from(MIN_DURATION_MINUTES) {
            DurationChange::ClampedToMinimum { from, to }
        } else {
            DurationChange::Applied { from, to }
        }
    }

    /// Nudge an entry's start by `delta_minutes` on top of its natural start.
    pub fn adjust_manual_offset(&mut self, id: i64, delta_minutes: i32) -> bool {
        let Some(index) = self.position(id) else {
            return false;
        };
        let entry = &mut self.entries[index];
        entry.manual_offset_minutes = entry.manual_offset_minutes.saturating_add(delta_minutes);
        self.recompute();
        true
    }

    /// Longest the entry may become before its booking's package runs out.
    ///
    /// `None` when the entry carries no package.
    pub fn duration_ceiling(&self, id: i64) -> Option<u32> {
        self.position(id).and_then(|index| self.duration_ceiling_at(index))
    }

    /// Package minutes minus what the booking uses outside this queue and
    /// the current length of its other blocking entries here.
    fn duration_ceiling_at(&self, index: usize) -> Option<u32> {
        let entry = &self.entries[index];
        let package = entry.origin.package_minutes?;
        let siblings: u32 = match entry.origin.booking_id {
            Some(booking_id) => self
                .entries
                .iter()
                .enumerate()
                .filter(|(i, other)| {
                    *i != index
                        && other.origin.booking_id == Some(booking_id)
                        && other.status.blocks_schedule()
                })
                .map(|(_, other)| other.duration_minutes)
                .fold(0, u32::saturating_add),
            None => 0,
        };
        Some(
            package
                .saturating_sub(entry.origin.minutes_used_elsewhere)
                .saturating_sub(siblings),
        )
    }

    /// Entries not yet persisted, in position order.
    pub(crate) fn unsaved_entries_mut(&mut self) -> impl Iterator<Item = &mut TimelineEntry> {
        self.entries.iter_mut().filter(|e| e.id.is_none())
    }

    /// Check a candidate lesson against this day's entries.
    pub fn check_conflict(
        &self,
        start: &str,
        duration_minutes: u32,
        window: &OperatingWindow,
    ) -> SchedulerResult<ConflictReport<'_, TimelineEntry>> {
        conflict::check_conflict(start, duration_minutes, &self.entries, window)
    }

    /// Re-derive every start time and gap flag from head to tail.
    fn recompute(&mut self) {
        let mut previous_end: Option<NaiveDateTime> = None;

        for entry in &mut self.entries {
            let effective = match previous_end {
                None => time::add_minutes(
                    entry.recorded_start,
                    i64::from(entry.manual_offset_minutes),
                ),
                Some(end) => time::add_minutes(
                    end,
                    i64::from(entry.recorded_gap_minutes) + i64::from(entry.manual_offset_minutes),
                ),
            };

            entry.scheduled_start = effective;
            entry.has_gap = previous_end.is_some_and(|end| effective > end);
            previous_end = Some(entry.scheduled_end());
        }
    }
}
