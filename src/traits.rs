//! Abstractions for time and external services to enable testing.
//!
//! This module provides traits for:
//! - `Clock`: Abstracting time access for deterministic testing
//! - `BookingSource`: Loading the bookings of a day
//! - `EventStore`: Persisting lesson events at submit time

use std::{
    future::Future,
    sync::{Arc, Mutex},
};

use anyhow::{Result, bail};
use chrono::{DateTime, Local, NaiveDate, Utc};

use crate::{
    models::{Booking, Event, EventPatch, EventStatus, Location},
    time,
};

// ==================== Clock Trait ====================

/// Trait for abstracting time access.
///
/// This allows injecting mock clocks during testing to create
/// deterministic, reproducible tests for time-dependent logic.
pub trait Clock: Send + Sync {
    /// Get the current time in UTC.
    fn now_utc(&self) -> DateTime<Utc>;

    /// Get the current time in the local timezone.
    fn now_local(&self) -> DateTime<Local>;

    /// Today's date in the local timezone.
    fn today(&self) -> NaiveDate {
        self.now_local().date_naive()
    }
}

/// System clock implementation using real time.
#[derive(Debug, Clone, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_utc(&self) -> DateTime<Utc> {
        Utc::now()
    }

    fn now_local(&self) -> DateTime<Local> {
        Local::now()
    }
}

/// Mock clock for testing with controllable time.
#[derive(Debug, Clone)]
pub struct MockClock {
    utc_time: Arc<Mutex<DateTime<Utc>>>,
}

impl MockClock {
    /// Create a new mock clock set to the given UTC time.
    pub fn new(time: DateTime<Utc>) -> Self {
        Self {
            utc_time: Arc::new(Mutex::new(time)),
        }
    }

    /// Set the mock clock to a new time.
    pub fn set_time(&self, time: DateTime<Utc>) {
        *self.utc_time.lock().unwrap() = time;
    }

    /// Advance the clock by a duration.
    pub fn advance(&self, duration: chrono::Duration) {
        let mut time = self.utc_time.lock().unwrap();
        *time = *time + duration;
    }
}

impl Clock for MockClock {
    fn now_utc(&self) -> DateTime<Utc> {
        *self.utc_time.lock().unwrap()
    }

    fn now_local(&self) -> DateTime<Local> {
        self.now_utc().with_timezone(&Local)
    }

    fn today(&self) -> NaiveDate {
        self.now_utc().date_naive()
    }
}

// ==================== Booking Source ====================

/// Where the bookings of a day come from.
pub trait BookingSource: Send + Sync {
    fn fetch_bookings_for_date(
        &self,
        date: NaiveDate,
    ) -> impl Future<Output = Result<Vec<Booking>>> + Send;
}

/// In-memory booking source for tests.
#[derive(Debug, Clone, Default)]
pub struct MockBookingSource {
    bookings: Arc<Mutex<Vec<Booking>>>,
    failure: Arc<Mutex<Option<String>>>,
}

impl MockBookingSource {
    pub fn new(bookings: Vec<Booking>) -> Self {
        Self {
            bookings: Arc::new(Mutex::new(bookings)),
            failure: Arc::default(),
        }
    }

    /// Make every following fetch fail with `message`.
    pub fn fail_with(&self, message: &str) {
        *self.failure.lock().unwrap() = Some(message.to_string());
    }
}

impl BookingSource for MockBookingSource {
    async fn fetch_bookings_for_date(&self, _date: NaiveDate) -> Result<Vec<Booking>> {
        if let Some(message) = self.failure.lock().unwrap().clone() {
            bail!(message);
        }
        Ok(self.bookings.lock().unwrap().clone())
    }
}

// ==================== Event Store ====================

/// Persistence for lesson events.
///
/// Only called at explicit submit boundaries, never during in-memory edits.
pub trait EventStore: Send + Sync {
    fn create_event(
        &self,
        lesson_id: i64,
        date: NaiveDate,
        start_time: &str,
        duration_minutes: u32,
        location: Location,
    ) -> impl Future<Output = Result<Event>> + Send;

    fn update_event(&self, event_id: i64, patch: &EventPatch)
    -> impl Future<Output = Result<()>> + Send;

    fn delete_event(&self, event_id: i64) -> impl Future<Output = Result<()>> + Send;
}

/// A call recorded by [`MockEventStore`].
#[derive(Debug, Clone, PartialEq)]
pub enum StoreCall {
    Create {
        lesson_id: i64,
        date: NaiveDate,
        start_time: String,
        duration_minutes: u32,
        location: Location,
    },
    Update {
        event_id: i64,
        patch: EventPatch,
    },
    Delete {
        event_id: i64,
    },
}

/// Mock event store that records every call and can be told to fail.
#[derive(Debug, Clone)]
pub struct MockEventStore {
    calls: Arc<Mutex<Vec<StoreCall>>>,
    next_id: Arc<Mutex<i64>>,
    failure: Arc<Mutex<Option<String>>>,
}

impl Default for MockEventStore {
    fn default() -> Self {
        Self {
            calls: Arc::default(),
            next_id: Arc::new(Mutex::new(1000)),
            failure: Arc::default(),
        }
    }
}

impl MockEventStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get all calls that have been made.
    pub fn calls(&self) -> Vec<StoreCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    /// Make every following call fail with `message`.
    pub fn fail_with(&self, message: &str) {
        *self.failure.lock().unwrap() = Some(message.to_string());
    }

    pub fn clear(&self) {
        self.calls.lock().unwrap().clear();
        *self.failure.lock().unwrap() = None;
    }

    fn record(&self, call: StoreCall) -> Result<()> {
        if let Some(message) = self.failure.lock().unwrap().clone() {
            bail!(message);
        }
        self.calls.lock().unwrap().push(call);
        Ok(())
    }
}

impl EventStore for MockEventStore {
    async fn create_event(
        &self,
        lesson_id: i64,
        date: NaiveDate,
        start_time: &str,
        duration_minutes: u32,
        location: Location,
    ) -> Result<Event> {
        let starts_at = time::combine_date_and_time(date, start_time)?;
        self.record(StoreCall::Create {
            lesson_id,
            date,
            start_time: start_time.to_string(),
            duration_minutes,
            location,
        })?;

        let mut next_id = self.next_id.lock().unwrap();
        let id = *next_id;
        *next_id += 1;

        Ok(Event {
            id,
            starts_at: Some(starts_at),
            duration_minutes: Some(duration_minutes),
            location: Some(location),
            status: EventStatus::Planned,
        })
    }

    async fn update_event(&self, event_id: i64, patch: &EventPatch) -> Result<()> {
        self.record(StoreCall::Update {
            event_id,
            patch: patch.clone(),
        })
    }

    async fn delete_event(&self, event_id: i64) -> Result<()> {
        self.record(StoreCall::Delete { event_id })
    }
}
