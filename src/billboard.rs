//! Reduce a day's bookings into one queue per teacher, plus statistics.

use std::collections::BTreeMap;

use chrono::{NaiveDate, NaiveDateTime};
use serde::Serialize;

use crate::{
    error::{SchedulerError, SchedulerResult},
    models::{Booking, Event, EventStatus, Lesson, Teacher},
    queue::TeacherDayQueue,
    time,
    timeline::{EntryOrigin, TimelineEntry},
    traits::BookingSource,
};

// ==================== Statistics ====================

/// Totals for one teacher, or for the whole school.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TeacherStats {
    pub event_count: usize,
    pub minutes_by_status: BTreeMap<EventStatus, u32>,
    pub revenue: f64,
    pub commission: f64,
}

impl TeacherStats {
    fn record(&mut self, status: EventStatus, minutes: u32, revenue: f64, commission: f64) {
        self.event_count += 1;
        *self.minutes_by_status.entry(status).or_insert(0) += minutes;
        self.revenue += revenue;
        self.commission += commission;
    }

    pub fn minutes(&self, status: EventStatus) -> u32 {
        self.minutes_by_status.get(&status).copied().unwrap_or(0)
    }

    /// Minutes that actually occupy the teacher (everything but cancelled).
    pub fn scheduled_minutes(&self) -> u32 {
        self.minutes_by_status
            .iter()
            .filter(|(status, _)| status.blocks_schedule())
            .map(|(_, minutes)| minutes)
            .sum()
    }

    /// What the school keeps after paying commission.
    pub fn school_share(&self) -> f64 {
        self.revenue - self.commission
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BillboardStats {
    pub per_teacher: BTreeMap<i64, TeacherStats>,
    pub totals: TeacherStats,
}

// ==================== Billboard ====================

/// Every teacher's queue for one selected date.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Billboard {
    pub date: NaiveDate,
    pub teachers: BTreeMap<i64, Teacher>,
    pub queues: BTreeMap<i64, TeacherDayQueue>,
    pub stats: BillboardStats,
}

impl Billboard {
    pub fn queue(&self, teacher_id: i64) -> Option<&TeacherDayQueue> {
        self.queues.get(&teacher_id)
    }

    pub fn queue_mut(&mut self, teacher_id: i64) -> Option<&mut TeacherDayQueue> {
        self.queues.get_mut(&teacher_id)
    }

    pub fn teacher(&self, teacher_id: i64) -> Option<&Teacher> {
        self.teachers.get(&teacher_id)
    }

    /// Find a teacher by name, ignoring case.
    pub fn find_teacher(&self, name: &str) -> Option<&Teacher> {
        self.teachers
            .values()
            .find(|t| t.name.eq_ignore_ascii_case(name.trim()))
    }

    pub fn event_count(&self) -> usize {
        self.queues.values().map(TeacherDayQueue::len).sum()
    }
}

/// Fetch the bookings of `date` from `source` and build its billboard.
pub async fn load_billboard<S: BookingSource>(
    source: &S,
    date: NaiveDate,
    roster: &[Teacher],
) -> SchedulerResult<Billboard> {
    let bookings = source
        .fetch_bookings_for_date(date)
        .await
        .map_err(|e| SchedulerError::Fetch(format!("{:#}", e)))?;
    Ok(build_billboard(&bookings, date, roster))
}

/// An event of the selected date, with its booking and lesson.
struct DayEvent<'a> {
    booking: &'a Booking,
    lesson: &'a Lesson,
    event: &'a Event,
    start: NaiveDateTime,
    duration: u32,
}

/// Build the billboard for `date`.
///
/// Teachers in `roster` without events still get an empty queue.
pub fn build_billboard(bookings: &[Booking], date: NaiveDate, roster: &[Teacher]) -> Billboard {
    let mut teachers: BTreeMap<i64, Teacher> =
        roster.iter().map(|t| (t.id, t.clone())).collect();
    let mut groups: BTreeMap<i64, Vec<DayEvent<'_>>> =
        roster.iter().map(|t| (t.id, Vec::new())).collect();
    let mut stats = BillboardStats::default();

    for booking in bookings {
        for lesson in &booking.lessons {
            for event in &lesson.events {
                if event.date() != Some(date) {
                    continue;
                }
                let (Some(start), Some(duration)) =
                    (event.starts_at, event.duration_minutes.filter(|d| *d > 0))
                else {
                    tracing::debug!("Skipping event {} without start or duration", event.id);
                    continue;
                };

                record_stats(&mut stats, booking, lesson, event.status, duration);

                teachers
                    .entry(lesson.teacher.id)
                    .or_insert_with(|| lesson.teacher.clone());
                groups.entry(lesson.teacher.id).or_default().push(DayEvent {
                    booking,
                    lesson,
                    event,
                    start,
                    duration,
                });
            }
        }
    }

    let queues: BTreeMap<i64, TeacherDayQueue> = groups
        .into_iter()
        .map(|(teacher_id, mut events)| {
            // Stable: ties keep booking order
            events.sort_by_key(|e| e.start);
            (teacher_id, seed_queue(teacher_id, date, &events))
        })
        .collect();

    let billboard = Billboard {
        date,
        teachers,
        queues,
        stats,
    };

    tracing::debug!(
        "Built billboard for {}: {} teachers, {} events",
        date,
        billboard.queues.len(),
        billboard.event_count()
    );

    billboard
}

/// Seed a queue so recomputation reproduces the recorded start times: each
/// follower keeps its distance from the end of the previous one as its
/// recorded gap.
fn seed_queue(teacher_id: i64, date: NaiveDate, events: &[DayEvent<'_>]) -> TeacherDayQueue {
    let mut in_queue: BTreeMap<i64, u32> = BTreeMap::new();
    for day_event in events.iter().filter(|e| e.event.status.blocks_schedule()) {
        let minutes = in_queue.entry(day_event.booking.id).or_default();
        *minutes = minutes.saturating_add(day_event.duration);
    }

    let mut queue = TeacherDayQueue::new(teacher_id, date);
    let mut previous_end: Option<NaiveDateTime> = None;

    for day_event in events {
        let gap = previous_end.map_or(0, |end| {
            let minutes = time::minutes_between(&end, &day_event.start);
            i32::try_from(minutes).unwrap_or(if minutes < 0 { i32::MIN } else { i32::MAX })
        });
        let queued = in_queue.get(&day_event.booking.id).copied().unwrap_or(0);

        let entry = TimelineEntry::new(day_event.start, day_event.duration, day_event.event.location)
            .with_id(day_event.event.id)
            .with_status(day_event.event.status)
            .with_recorded_gap(gap)
            .with_origin(origin_of(day_event, queued));

        queue.add_entry(entry);
        previous_end = Some(time::add_minutes(
            day_event.start,
            i64::from(day_event.duration),
        ));
    }
    queue
}

/// `queued` is what the booking's blocking events in this queue take.
fn origin_of(day_event: &DayEvent<'_>, queued: u32) -> EntryOrigin {
    let booking = day_event.booking;

    EntryOrigin {
        booking_id: Some(booking.id),
        lesson_id: Some(day_event.lesson.id),
        student_names: booking.student_names(),
        package_minutes: Some(booking.package.duration_minutes),
        minutes_used_elsewhere: booking.used_minutes().saturating_sub(queued),
        commission_per_hour: day_event.lesson.commission.price_per_hour,
    }
}

fn record_stats(
    stats: &mut BillboardStats,
    booking: &Booking,
    lesson: &Lesson,
    status: EventStatus,
    minutes: u32,
) {
    let (revenue, commission) = if status.blocks_schedule() {
        (
            booking.package.revenue_for(minutes),
            lesson.commission.price_per_hour * f64::from(minutes) / 60.0,
        )
    } else {
        (0.0, 0.0)
    };

    stats
        .per_teacher
        .entry(lesson.teacher.id)
        .or_default()
        .record(status, minutes, revenue, commission);
    stats.totals.record(status, minutes, revenue, commission);
}

#[cfg(test)]
mod tests {
    use crate::{
        models::{Commission, Location, Package, Student},
        queue::DurationChange,
    };

    use super::*;

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 7, 10).unwrap()
    }

    fn at(date: NaiveDate, hhmm: &str) -> Option<NaiveDateTime> {
        Some(time::combine_date_and_time(date, hhmm).unwrap())
    }

    fn event(id: i64, start: Option<NaiveDateTime>, duration: u32, status: EventStatus) -> Event {
        Event {
            id,
            starts_at: start,
            duration_minutes: Some(duration),
            location: Some(Location::LosLances),
            status,
        }
    }

    fn teacher(id: i64, name: &str) -> Teacher {
        Teacher {
            id,
            name: name.to_string(),
        }
    }

    fn booking(id: i64, teacher: Teacher, events: Vec<Event>) -> Booking {
        Booking {
            id,
            students: vec![Student {
                id: id * 10,
                name: format!("Student {}", id),
            }],
            package: Package {
                duration_minutes: 600,
                price_per_student: 300.0,
                capacity_students: 1,
            },
            lessons: vec![Lesson {
                id: id * 100,
                teacher,
                commission: Commission {
                    price_per_hour: 20.0,
                },
                events,
            }],
        }
    }

    fn ana_bookings() -> Vec<Booking> {
        vec![
            booking(
                2,
                teacher(1, "Ana"),
                vec![event(21, at(day(), "14:00"), 90, EventStatus::Planned)],
            ),
            booking(
                1,
                teacher(1, "Ana"),
                vec![
                    event(11, at(day(), "10:00"), 120, EventStatus::Completed),
                    event(
                        12,
                        at(day().succ_opt().unwrap(), "10:00"),
                        120,
                        EventStatus::Planned,
                    ),
                ],
            ),
        ]
    }

    // ==================== Grouping Tests ====================

    #[test]
    fn test_filters_to_selected_date_and_sorts() {
        let billboard = build_billboard(&ana_bookings(), day(), &[]);
        let queue = billboard.queue(1).unwrap();
        let ids: Vec<_> = queue.entries().iter().map(|e| e.id).collect();
        assert_eq!(ids, vec![Some(11), Some(21)]);
        assert_eq!(billboard.teacher(1).unwrap().name, "Ana");
    }

    #[test]
    fn test_seeded_queue_keeps_recorded_times() {
        let billboard = build_billboard(&ana_bookings(), day(), &[]);
        let queue = billboard.queue(1).unwrap();
        let starts: Vec<_> = queue.entries().iter().map(|e| e.start_time()).collect();
        assert_eq!(starts, vec!["10:00", "14:00"]);

        let second = &queue.entries()[1];
        assert!(second.initial_gap);
        assert!(second.has_gap);
        assert_eq!(second.recorded_gap_minutes, 120);
        assert_eq!(second.manual_offset_minutes, 0);
        assert!(!queue.entries()[0].initial_gap);
    }

    #[test]
    fn test_moving_gapped_entry_to_head_keeps_its_recorded_start() {
        let billboard = build_billboard(&ana_bookings(), day(), &[]);
        let mut queue = billboard.queue(1).unwrap().clone();

        assert!(queue.move_up(21));
        let starts: Vec<_> = queue.entries().iter().map(|e| e.start_time()).collect();
        assert_eq!(starts, vec!["14:00", "15:30"]);
    }

    #[test]
    fn test_back_to_back_has_no_initial_gap() {
        let bookings = vec![booking(
            1,
            teacher(1, "Ana"),
            vec![
                event(1, at(day(), "10:00"), 60, EventStatus::Planned),
                event(2, at(day(), "11:00"), 60, EventStatus::Planned),
            ],
        )];
        let billboard = build_billboard(&bookings, day(), &[]);
        let entries = billboard.queue(1).unwrap().entries();
        assert!(!entries[1].initial_gap);
        assert_eq!(entries[1].recorded_gap_minutes, 0);
        assert_eq!(entries[1].manual_offset_minutes, 0);
    }

    #[test]
    fn test_overlapping_records_seed_negative_gap() {
        let bookings = vec![booking(
            1,
            teacher(1, "Ana"),
            vec![
                event(1, at(day(), "10:00"), 120, EventStatus::Planned),
                event(2, at(day(), "11:00"), 60, EventStatus::Planned),
            ],
        )];
        let billboard = build_billboard(&bookings, day(), &[]);
        let entries = billboard.queue(1).unwrap().entries();
        assert_eq!(entries[1].recorded_gap_minutes, -60);
        assert_eq!(entries[1].manual_offset_minutes, 0);
        assert_eq!(entries[1].start_time(), "11:00");
        assert!(!entries[1].has_gap);
    }

    #[test]
    fn test_equal_start_times_keep_input_order() {
        let bookings = vec![
            booking(
                1,
                teacher(1, "Ana"),
                vec![event(5, at(day(), "10:00"), 60, EventStatus::Planned)],
            ),
            booking(
                2,
                teacher(1, "Ana"),
                vec![event(3, at(day(), "10:00"), 60, EventStatus::Planned)],
            ),
        ];
        let billboard = build_billboard(&bookings, day(), &[]);
        let ids: Vec<_> = billboard
            .queue(1)
            .unwrap()
            .entries()
            .iter()
            .map(|e| e.id)
            .collect();
        assert_eq!(ids, vec![Some(5), Some(3)]);
    }

    #[test]
    fn test_groups_by_teacher() {
        let mut bookings = ana_bookings();
        bookings.push(booking(
            3,
            teacher(2, "Bruno"),
            vec![event(31, at(day(), "09:00"), 60, EventStatus::Tbc)],
        ));
        let billboard = build_billboard(&bookings, day(), &[]);
        assert_eq!(billboard.queues.len(), 2);
        assert_eq!(billboard.queue(2).unwrap().len(), 1);
        assert_eq!(billboard.find_teacher("bruno").unwrap().id, 2);
        assert_eq!(billboard.event_count(), 3);
    }

    #[test]
    fn test_roster_teacher_without_events_gets_empty_queue() {
        let roster = vec![teacher(1, "Ana"), teacher(9, "Carla")];
        let billboard = build_billboard(&ana_bookings(), day(), &roster);
        let empty = billboard.queue(9).expect("roster teacher should have a queue");
        assert!(empty.is_empty());
        assert_eq!(billboard.teacher(9).unwrap().name, "Carla");
    }

    #[test]
    fn test_events_without_duration_or_start_are_skipped() {
        let mut incomplete = event(1, at(day(), "10:00"), 60, EventStatus::Planned);
        incomplete.duration_minutes = None;
        let unscheduled = event(2, None, 60, EventStatus::Planned);
        let bookings = vec![booking(1, teacher(1, "Ana"), vec![incomplete, unscheduled])];

        let billboard = build_billboard(&bookings, day(), &[]);
        assert!(billboard.queue(1).is_none());
        assert_eq!(billboard.stats.totals.event_count, 0);
    }

    // ==================== Origin Tests ====================

    #[test]
    fn test_origin_carries_package_allowance() {
        let billboard = build_billboard(&ana_bookings(), day(), &[]);
        let first = billboard.queue(1).unwrap().entry(11).unwrap();
        // Package 600, the next day's event of booking 1 uses 120
        assert_eq!(first.origin.package_minutes, Some(600));
        assert_eq!(first.origin.minutes_used_elsewhere, 120);
        assert_eq!(billboard.queue(1).unwrap().duration_ceiling(11), Some(480));
        assert_eq!(first.origin.booking_id, Some(1));
        assert_eq!(first.origin.lesson_id, Some(100));
        assert_eq!(first.origin.student_names, vec!["Student 1".to_string()]);
    }

    #[test]
    fn test_package_allowance_shared_by_same_day_events() {
        let mut bookings = vec![booking(
            1,
            teacher(1, "Ana"),
            vec![
                event(1, at(day(), "10:00"), 60, EventStatus::Planned),
                event(2, at(day(), "12:00"), 60, EventStatus::Planned),
            ],
        )];
        bookings[0].package.duration_minutes = 240;

        let billboard = build_billboard(&bookings, day(), &[]);
        let mut queue = billboard.queue(1).unwrap().clone();
        assert_eq!(queue.entry(1).unwrap().origin.minutes_used_elsewhere, 0);

        assert!(queue.adjust_duration(1, 120).is_applied());
        assert_eq!(
            queue.adjust_duration(2, 15),
            DurationChange::RejectedByPackage {
                requested: 75,
                ceiling: 60
            }
        );
    }

    // ==================== Statistics Tests ====================

    #[test]
    fn test_stats_by_status_revenue_and_commission() {
        let mut bookings = ana_bookings();
        bookings[0]
            .lessons[0]
            .events
            .push(event(22, at(day(), "17:00"), 60, EventStatus::Cancelled));

        let billboard = build_billboard(&bookings, day(), &[]);
        let ana = &billboard.stats.per_teacher[&1];

        assert_eq!(ana.event_count, 3);
        assert_eq!(ana.minutes(EventStatus::Completed), 120);
        assert_eq!(ana.minutes(EventStatus::Planned), 90);
        assert_eq!(ana.minutes(EventStatus::Cancelled), 60);
        assert_eq!(ana.scheduled_minutes(), 210);

        // 300 per 600 minutes => 0.5 per minute, cancelled excluded
        assert!((ana.revenue - 105.0).abs() < 1e-9);
        // 20 per hour over 210 minutes
        assert!((ana.commission - 70.0).abs() < 1e-9);
        assert!((ana.school_share() - 35.0).abs() < 1e-9);

        assert_eq!(billboard.stats.totals, *ana);
    }

    // ==================== Loading Tests ====================

    #[tokio::test]
    async fn test_load_billboard_from_source() {
        let source = crate::traits::MockBookingSource::new(ana_bookings());
        let billboard = load_billboard(&source, day(), &[]).await.unwrap();
        assert_eq!(billboard.queue(1).unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_load_billboard_reports_fetch_failure() {
        let source = crate::traits::MockBookingSource::new(vec![]);
        source.fail_with("timed out");
        let err = load_billboard(&source, day(), &[]).await.unwrap_err();
        assert_eq!(err, SchedulerError::Fetch("timed out".to_string()));
    }
}
