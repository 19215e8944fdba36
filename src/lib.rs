//! Kite Scheduler Library
//!
//! Builds each teacher's day of lessons from the school's bookings, keeps the
//! day's start times consistent while lessons are reordered, resized or
//! nudged, and checks new lessons for conflicts.

pub mod api;
pub mod billboard;
pub mod config;
pub mod conflict;
pub mod db;
pub mod error;
pub mod models;
pub mod queue;
pub mod schedule;
pub mod session;
pub mod time;
pub mod timeline;
pub mod traits;

// Re-export commonly used types
pub use api::BookingApiClient;
pub use billboard::{Billboard, BillboardStats, TeacherStats, build_billboard};
pub use config::AppConfig;
pub use conflict::{
    BusySource, ConflictReport, SlotSearch, TimeSlot, check_conflict, check_conflict_with,
    find_next_free_slot,
};
pub use db::Database;
pub use error::{SchedulerError, SchedulerResult};
pub use models::{
    Booking, Commission, Event, EventPatch, EventStatus, Lesson, Location, Package, Student,
    Teacher,
};
pub use queue::{DurationChange, TeacherDayQueue};
pub use schedule::OperatingWindow;
pub use session::{PendingChange, QueueSession, SubmitSummary};
pub use timeline::{EntryOrigin, TimelineEntry};
pub use traits::{
    BookingSource, Clock, EventStore, MockBookingSource, MockClock, MockEventStore, StoreCall,
    SystemClock,
};
