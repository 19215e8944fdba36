use chrono::NaiveDateTime;
use serde::Serialize;

use crate::{
    models::{EventStatus, Location},
    time,
};

/// Read-only link back to the booking and lesson an entry was created for.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct EntryOrigin {
    pub booking_id: Option<i64>,
    pub lesson_id: Option<i64>,
    pub student_names: Vec<String>,
    /// Total minutes of the booking's package
    pub package_minutes: Option<u32>,
    /// Package minutes taken by the booking's events outside the owning queue
    pub minutes_used_elsewhere: u32,
    pub commission_per_hour: f64,
}

/// One scheduled lesson event inside a teacher's day.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TimelineEntry {
    pub id: Option<i64>,
    pub duration_minutes: u32,
    /// Time the entry was originally recorded or requested at
    pub recorded_start: NaiveDateTime,
    /// Derived by the owning queue on every change
    pub scheduled_start: NaiveDateTime,
    pub location: Option<Location>,
    pub status: EventStatus,
    /// Slack between the recorded start and the previous recorded end;
    /// ignored while the entry is the head
    pub recorded_gap_minutes: i32,
    /// User nudge on top of the natural start
    pub manual_offset_minutes: i32,
    pub has_gap: bool,
    /// Gap hint computed from recorded times before any adjustment
    pub initial_gap: bool,
    pub origin: EntryOrigin,
}

impl TimelineEntry {
    /// A new, not yet persisted entry.
    pub fn new(start: NaiveDateTime, duration_minutes: u32, location: Option<Location>) -> Self {
        Self {
            id: None,
            duration_minutes,
            recorded_start: start,
            scheduled_start: start,
            location,
            status: EventStatus::Planned,
            recorded_gap_minutes: 0,
            manual_offset_minutes: 0,
            has_gap: false,
            initial_gap: false,
            origin: EntryOrigin::default(),
        }
    }

    pub fn with_id(mut self, id: i64) -> Self {
        self.id = Some(id);
        self
    }

    pub fn with_status(mut self, status: EventStatus) -> Self {
        self.status = status;
        self
    }

    pub fn with_origin(mut self, origin: EntryOrigin) -> Self {
        self.origin = origin;
        self
    }

    pub fn with_recorded_gap(mut self, minutes: i32) -> Self {
        self.recorded_gap_minutes = minutes;
        self.initial_gap = minutes > 0;
        self
    }

    pub fn with_manual_offset(mut self, minutes: i32) -> Self {
        self.manual_offset_minutes = minutes;
        self
    }

    pub fn scheduled_end(&self) -> NaiveDateTime {
        time::add_minutes(self.scheduled_start, i64::from(self.duration_minutes))
    }

    /// `"HH:MM"` start for display.
    pub fn start_time(&self) -> String {
        time::extract_time(&self.scheduled_start)
    }

    pub fn end_time(&self) -> String {
        time::extract_time(&self.scheduled_end())
    }

    pub fn matches(&self, id: i64) -> bool {
        self.id == Some(id)
    }
}
