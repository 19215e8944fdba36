//! Editing session over one teacher's day.
//!
//! Edits happen in memory on a working copy of the queue. Nothing reaches the
//! store until [`QueueSession::submit`]; [`QueueSession::cancel`] throws the
//! edits away. Two sessions on the same day do not see each other: whichever
//! submits last wins.

use crate::{
    error::{SchedulerError, SchedulerResult},
    models::EventPatch,
    queue::TeacherDayQueue,
    timeline::TimelineEntry,
    traits::EventStore,
};

/// One store operation needed to persist the working queue.
#[derive(Debug, Clone, PartialEq)]
pub enum PendingChange {
    /// Index into the working queue's entries
    Create { position: usize },
    Update { event_id: i64, patch: EventPatch },
    Delete { event_id: i64 },
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SubmitSummary {
    pub created: usize,
    pub updated: usize,
    pub deleted: usize,
}

impl SubmitSummary {
    pub fn is_empty(&self) -> bool {
        self.created == 0 && self.updated == 0 && self.deleted == 0
    }
}

#[derive(Debug, Clone)]
pub struct QueueSession {
    saved: TeacherDayQueue,
    working: TeacherDayQueue,
}

impl QueueSession {
    pub fn new(queue: TeacherDayQueue) -> Self {
        Self {
            saved: queue.clone(),
            working: queue,
        }
    }

    pub fn queue(&self) -> &TeacherDayQueue {
        &self.working
    }

    pub fn queue_mut(&mut self) -> &mut TeacherDayQueue {
        &mut self.working
    }

    /// The queue as last persisted.
    pub fn saved(&self) -> &TeacherDayQueue {
        &self.saved
    }

    pub fn is_dirty(&self) -> bool {
        self.working != self.saved
    }

    /// Discard all edits since the last submit.
    pub fn cancel(&mut self) {
        self.working = self.saved.clone();
    }

    /// Store operations that would bring the saved state up to the working
    /// queue, ordered deletes first, then updates, then creates.
    pub fn pending_changes(&self) -> Vec<PendingChange> {
        let mut changes: Vec<PendingChange> = self
            .saved
            .entries()
            .iter()
            .filter_map(|e| e.id)
            .filter(|id| self.working.entry(*id).is_none())
            .map(|event_id| PendingChange::Delete { event_id })
            .collect();

        for entry in self.working.entries() {
            let Some(event_id) = entry.id else {
                continue;
            };
            let Some(before) = self.saved.entry(event_id) else {
                continue;
            };
            let patch = diff(before, entry);
            if !patch.is_empty() {
                changes.push(PendingChange::Update { event_id, patch });
            }
        }

        changes.extend(
            self.working
                .entries()
                .iter()
                .enumerate()
                .filter(|(_, e)| e.id.is_none())
                .map(|(position, _)| PendingChange::Create { position }),
        );

        changes
    }

    /// Persist the working queue through `store`.
    ///
    /// Stops at the first failing operation. The working queue is left as it
    /// was, so the caller can retry or cancel.
    pub async fn submit<S: EventStore>(&mut self, store: &S) -> SchedulerResult<SubmitSummary> {
        let changes = self.pending_changes();
        if changes.is_empty() {
            return Ok(SubmitSummary::default());
        }

        // Refuse before touching the store if a new entry cannot be created
        for change in &changes {
            if let PendingChange::Create { position } = change {
                create_args(&self.working.entries()[*position])?;
            }
        }

        let date = self.working.date();
        let mut summary = SubmitSummary::default();
        let mut created_ids = Vec::new();

        for change in &changes {
            match change {
                PendingChange::Delete { event_id } => {
                    store
                        .delete_event(*event_id)
                        .await
                        .map_err(|e| persistence_error("delete", *event_id, &e))?;
                    summary.deleted += 1;
                }
                PendingChange::Update { event_id, patch } => {
                    store
                        .update_event(*event_id, patch)
                        .await
                        .map_err(|e| persistence_error("update", *event_id, &e))?;
                    summary.updated += 1;
                }
                PendingChange::Create { position } => {
                    let entry = &self.working.entries()[*position];
                    let (lesson_id, location) = create_args(entry)?;
                    let event = store
                        .create_event(
                            lesson_id,
                            entry.scheduled_start.date(),
                            &entry.start_time(),
                            entry.duration_minutes,
                            location,
                        )
                        .await
                        .map_err(|e| {
                            SchedulerError::Persistence(format!(
                                "create for lesson {}: {:#}",
                                lesson_id, e
                            ))
                        })?;
                    created_ids.push(event.id);
                    summary.created += 1;
                }
            }
        }

        for (entry, id) in self.working.unsaved_entries_mut().zip(created_ids) {
            entry.id = Some(id);
        }
        self.saved = self.working.clone();

        tracing::info!(
            "Saved teacher {} on {}: {} created, {} updated, {} deleted",
            self.working.teacher_id(),
            date,
            summary.created,
            summary.updated,
            summary.deleted
        );

        Ok(summary)
    }
}

fn diff(before: &TimelineEntry, after: &TimelineEntry) -> EventPatch {
    EventPatch {
        starts_at: (before.scheduled_start != after.scheduled_start)
            .then_some(after.scheduled_start),
        duration_minutes: (before.duration_minutes != after.duration_minutes)
            .then_some(after.duration_minutes),
        location: after.location.filter(|_| before.location != after.location),
        status: (before.status != after.status).then_some(after.status),
    }
}

fn create_args(entry: &TimelineEntry) -> SchedulerResult<(i64, crate::models::Location)> {
    let lesson_id = entry.origin.lesson_id.ok_or_else(|| {
        SchedulerError::IncompleteEntry(format!("entry at {} has no lesson", entry.start_time()))
    })?;
    let location = entry.location.ok_or_else(|| {
        SchedulerError::IncompleteEntry(format!(
            "entry at {} has no location",
            entry.start_time()
        ))
    })?;
    Ok((lesson_id, location))
}

fn persistence_error(action: &str, event_id: i64, err: &anyhow::Error) -> SchedulerError {
    tracing::warn!("Failed to {} event {}: {:#}", action, event_id, err);
    SchedulerError::Persistence(format!("{} event {}: {:#}", action, event_id, err))
}
