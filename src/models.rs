//! Booking, lesson and event records as delivered by the booking source.

use std::{fmt, str::FromStr};

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

// ==================== Event Status ====================

/// Lifecycle status of a lesson event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventStatus {
    #[default]
    Planned,
    Completed,
    /// To be confirmed
    Tbc,
    Cancelled,
}

impl EventStatus {
    pub const ALL: [EventStatus; 4] = [
        EventStatus::Planned,
        EventStatus::Completed,
        EventStatus::Tbc,
        EventStatus::Cancelled,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EventStatus::Planned => "planned",
            EventStatus::Completed => "completed",
            EventStatus::Tbc => "tbc",
            EventStatus::Cancelled => "cancelled",
        }
    }

    /// Cancelled events never occupy a teacher's time.
    pub fn blocks_schedule(&self) -> bool {
        !matches!(self, EventStatus::Cancelled)
    }
}

impl fmt::Display for EventStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EventStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "planned" => Ok(EventStatus::Planned),
            "completed" => Ok(EventStatus::Completed),
            "tbc" => Ok(EventStatus::Tbc),
            "cancelled" => Ok(EventStatus::Cancelled),
            other => Err(format!("Unknown event status: {}", other)),
        }
    }
}

// ==================== Location ====================

/// Teaching spots operated by the school.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Location {
    #[serde(rename = "Los Lances")]
    LosLances,
    #[serde(rename = "Valdevaqueros")]
    Valdevaqueros,
    #[serde(rename = "Palmones")]
    Palmones,
    #[serde(rename = "Getares")]
    Getares,
}

impl Location {
    pub const ALL: [Location; 4] = [
        Location::LosLances,
        Location::Valdevaqueros,
        Location::Palmones,
        Location::Getares,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Location::LosLances => "Los Lances",
            Location::Valdevaqueros => "Valdevaqueros",
            Location::Palmones => "Palmones",
            Location::Getares => "Getares",
        }
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Location {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        Location::ALL
            .into_iter()
            .find(|loc| loc.name().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| format!("Unknown location: {}", wanted))
    }
}

// ==================== Records ====================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Teacher {
    pub id: i64,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Student {
    pub id: i64,
    pub name: String,
}

/// Hourly commission paid to the teacher of a lesson.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Commission {
    pub price_per_hour: f64,
}

/// The package a booking was sold with.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Package {
    /// Total teaching time included in the package
    pub duration_minutes: u32,
    pub price_per_student: f64,
    pub capacity_students: u32,
}

impl Package {
    /// Revenue earned by teaching `minutes` of this package.
    pub fn revenue_for(&self, minutes: u32) -> f64 {
        if self.duration_minutes == 0 {
            return 0.0;
        }
        self.price_per_student * f64::from(self.capacity_students) * f64::from(minutes)
            / f64::from(self.duration_minutes)
    }
}

/// A stored lesson event.
///
/// Start, duration and location are optional because records can be
/// half-entered; such events are not concrete enough to schedule against.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub id: i64,
    pub starts_at: Option<NaiveDateTime>,
    pub duration_minutes: Option<u32>,
    pub location: Option<Location>,
    #[serde(default)]
    pub status: EventStatus,
}

impl Event {
    /// Calendar date of the event, ignoring time of day.
    pub fn date(&self) -> Option<NaiveDate> {
        self.starts_at.map(|dt| dt.date())
    }

    pub fn end(&self) -> Option<NaiveDateTime> {
        let start = self.starts_at?;
        let duration = self.duration_minutes?;
        Some(crate::time::add_minutes(start, i64::from(duration)))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Lesson {
    pub id: i64,
    pub teacher: Teacher,
    #[serde(default)]
    pub commission: Commission,
    #[serde(default)]
    pub events: Vec<Event>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Booking {
    pub id: i64,
    #[serde(default)]
    pub students: Vec<Student>,
    pub package: Package,
    #[serde(default)]
    pub lessons: Vec<Lesson>,
}

impl Booking {
    /// Minutes of the package already consumed by non-cancelled events.
    pub fn used_minutes(&self) -> u32 {
        self.lessons
            .iter()
            .flat_map(|lesson| lesson.events.iter())
            .filter(|event| event.status.blocks_schedule())
            .filter_map(|event| event.duration_minutes)
            .sum()
    }

    pub fn student_names(&self) -> Vec<String> {
        self.students.iter().map(|s| s.name.clone()).collect()
    }
}

/// Partial update of a stored event; `None` leaves a field unchanged.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EventPatch {
    pub starts_at: Option<NaiveDateTime>,
    pub duration_minutes: Option<u32>,
    pub location: Option<Location>,
    pub status: Option<EventStatus>,
}

impl EventPatch {
    pub fn is_empty(&self) -> bool {
        self.starts_at.is_none()
            && self.duration_minutes.is_none()
            && self.location.is_none()
            && self.status.is_none()
    }
}
