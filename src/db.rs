use anyhow::{Context, Result, bail};
use chrono::{NaiveDate, NaiveDateTime};
use sqlx::{FromRow, PgPool};

use crate::{
    models::{Event, EventPatch, EventStatus, Location},
    time,
    traits::EventStore,
};

/// An `events` row as stored.
#[derive(Debug, Clone, FromRow)]
pub struct EventRow {
    pub id: i64,
    pub lesson_id: i64,
    pub starts_at: Option<NaiveDateTime>,
    pub duration_minutes: Option<i32>,
    pub location: Option<String>,
    pub status: String,
}

impl EventRow {
    pub fn into_event(self) -> Result<Event> {
        let location = self
            .location
            .as_deref()
            .map(str::parse::<Location>)
            .transpose()
            .map_err(anyhow::Error::msg)
            .with_context(|| format!("Invalid location on event {}", self.id))?;
        let status = self
            .status
            .parse::<EventStatus>()
            .map_err(anyhow::Error::msg)
            .with_context(|| format!("Invalid status on event {}", self.id))?;
        let duration_minutes = self
            .duration_minutes
            .map(u32::try_from)
            .transpose()
            .with_context(|| format!("Negative duration on event {}", self.id))?;

        Ok(Event {
            id: self.id,
            starts_at: self.starts_at,
            duration_minutes,
            location,
            status,
        })
    }
}

#[derive(Clone, Debug)]
pub struct Database {
    pool: PgPool,
}

impl Database {
    pub async fn new(database_url: &str) -> Result<Self> {
        let pool = PgPool::connect(database_url)
            .await
            .context("Failed to connect to PostgreSQL database")?;

        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .context("Failed to run database migrations")?;

        Ok(Self { pool })
    }

    pub async fn get_event(&self, event_id: i64) -> Result<Option<Event>> {
        let row = sqlx::query_as::<_, EventRow>(
            r#"
            SELECT id, lesson_id, starts_at, duration_minutes, location, status
            FROM events
            WHERE id = $1
            "#,
        )
        .bind(event_id)
        .fetch_optional(&self.pool)
        .await
        .context("Failed to fetch event")?;

        row.map(EventRow::into_event).transpose()
    }

    /// Events of one lesson, earliest first; unscheduled ones last.
    pub async fn get_events_for_lesson(&self, lesson_id: i64) -> Result<Vec<Event>> {
        let rows = sqlx::query_as::<_, EventRow>(
            r#"
            SELECT id, lesson_id, starts_at, duration_minutes, location, status
            FROM events
            WHERE lesson_id = $1
            ORDER BY starts_at ASC NULLS LAST, id ASC
            "#,
        )
        .bind(lesson_id)
        .fetch_all(&self.pool)
        .await
        .context("Failed to fetch events for lesson")?;

        rows.into_iter().map(EventRow::into_event).collect()
    }

    /// Every event starting on `date`, paired with its lesson id.
    pub async fn get_events_for_date(&self, date: NaiveDate) -> Result<Vec<(i64, Event)>> {
        let day_start = date.and_time(chrono::NaiveTime::MIN);
        let day_end = time::add_minutes(day_start, time::MINUTES_PER_DAY);

        let rows = sqlx::query_as::<_, EventRow>(
            r#"
            SELECT id, lesson_id, starts_at, duration_minutes, location, status
            FROM events
            WHERE starts_at >= $1 AND starts_at < $2
            ORDER BY starts_at ASC, id ASC
            "#,
        )
        .bind(day_start)
        .bind(day_end)
        .fetch_all(&self.pool)
        .await
        .context("Failed to fetch events for date")?;

        rows.into_iter()
            .map(|row| {
                let lesson_id = row.lesson_id;
                row.into_event().map(|event| (lesson_id, event))
            })
            .collect()
    }
}

impl EventStore for Database {
    async fn create_event(
        &self,
        lesson_id: i64,
        date: NaiveDate,
        start_time: &str,
        duration_minutes: u32,
        location: Location,
    ) -> Result<Event> {
        let starts_at = time::combine_date_and_time(date, start_time)?;
        let duration = i32::try_from(duration_minutes).context("Duration out of range")?;

        let id: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO events (lesson_id, starts_at, duration_minutes, location, status)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id
            "#,
        )
        .bind(lesson_id)
        .bind(starts_at)
        .bind(duration)
        .bind(location.name())
        .bind(EventStatus::Planned.as_str())
        .fetch_one(&self.pool)
        .await
        .context("Failed to insert event")?;

        tracing::debug!("Created event {} for lesson {} at {}", id, lesson_id, starts_at);

        Ok(Event {
            id,
            starts_at: Some(starts_at),
            duration_minutes: Some(duration_minutes),
            location: Some(location),
            status: EventStatus::Planned,
        })
    }

    async fn update_event(&self, event_id: i64, patch: &EventPatch) -> Result<()> {
        if patch.is_empty() {
            return Ok(());
        }
        let duration = patch
            .duration_minutes
            .map(i32::try_from)
            .transpose()
            .context("Duration out of range")?;

        let result = sqlx::query(
            r#"
            UPDATE events
            SET starts_at = COALESCE($2, starts_at),
                duration_minutes = COALESCE($3, duration_minutes),
                location = COALESCE($4, location),
                status = COALESCE($5, status),
                updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(event_id)
        .bind(patch.starts_at)
        .bind(duration)
        .bind(patch.location.map(|l| l.name()))
        .bind(patch.status.map(|s| s.as_str()))
        .execute(&self.pool)
        .await
        .context("Failed to update event")?;

        if result.rows_affected() == 0 {
            bail!("Event {} not found", event_id);
        }
        Ok(())
    }

    async fn delete_event(&self, event_id: i64) -> Result<()> {
        let result = sqlx::query("DELETE FROM events WHERE id = $1")
            .bind(event_id)
            .execute(&self.pool)
            .await
            .context("Failed to delete event")?;

        if result.rows_affected() == 0 {
            bail!("Event {} not found", event_id);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row() -> EventRow {
        EventRow {
            id: 1,
            lesson_id: 10,
            starts_at: NaiveDate::from_ymd_opt(2024, 7, 10)
                .unwrap()
                .and_hms_opt(10, 0, 0),
            duration_minutes: Some(90),
            location: Some("Valdevaqueros".to_string()),
            status: "tbc".to_string(),
        }
    }

    #[test]
    fn test_row_into_event() {
        let event = row().into_event().unwrap();
        assert_eq!(event.id, 1);
        assert_eq!(event.duration_minutes, Some(90));
        assert_eq!(event.location, Some(Location::Valdevaqueros));
        assert_eq!(event.status, EventStatus::Tbc);
    }

    #[test]
    fn test_row_with_missing_fields() {
        let event = EventRow {
            starts_at: None,
            duration_minutes: None,
            location: None,
            ..row()
        }
        .into_event()
        .unwrap();
        assert_eq!(event.starts_at, None);
        assert_eq!(event.location, None);
    }

    #[test]
    fn test_row_with_unknown_status_fails() {
        let err = EventRow {
            status: "postponed".to_string(),
            ..row()
        }
        .into_event()
        .unwrap_err();
        assert!(err.to_string().contains("Invalid status on event 1"));
    }

    #[test]
    fn test_row_with_negative_duration_fails() {
        let result = EventRow {
            duration_minutes: Some(-30),
            ..row()
        }
        .into_event();
        assert!(result.is_err());
    }
}
