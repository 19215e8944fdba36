use anyhow::{Context, Result, bail};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use kite_scheduler::{
    Billboard, BookingApiClient, Clock, Database, DurationChange, OperatingWindow, QueueSession,
    SlotSearch, SystemClock, TeacherDayQueue, billboard, config::AppConfig,
    conflict::check_conflict_with, time,
};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

#[derive(Parser, Debug)]
#[command(name = "kite-scheduler")]
#[command(about = "Teacher day planner for the kite school")]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print every teacher's day with statistics
    Billboard {
        /// Day to show, YYYY-MM-DD (defaults to today)
        #[arg(long)]
        date: Option<String>,
    },
    /// Check whether a new lesson fits into a teacher's day
    Check {
        /// Teacher name or id
        #[arg(long)]
        teacher: String,
        /// Start time, HH:MM
        #[arg(long)]
        start: String,
        /// Length in minutes
        #[arg(long)]
        duration: u32,
        #[arg(long)]
        date: Option<String>,
    },
    /// Shift a lesson (and everything after it) and save the new times
    Nudge {
        #[arg(long)]
        teacher: String,
        #[arg(long)]
        event: i64,
        /// Minutes to shift by; negative moves earlier (defaults to one step)
        #[arg(long, allow_hyphen_values = true)]
        minutes: Option<i32>,
        #[arg(long)]
        date: Option<String>,
    },
    /// Lengthen or shorten a lesson and save the new times
    Resize {
        #[arg(long)]
        teacher: String,
        #[arg(long)]
        event: i64,
        /// Minutes to add; negative shortens (defaults to one step)
        #[arg(long, allow_hyphen_values = true)]
        minutes: Option<i32>,
        #[arg(long)]
        date: Option<String>,
    },
}

fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    let filter = EnvFilter::builder()
        .with_default_directive(tracing::level_filters::LevelFilter::INFO.into())
        .parse_lossy("kite_scheduler=debug");

    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(filter)
        .init();

    let config = AppConfig::load().context("Failed to load configuration")?;

    let rt = tokio::runtime::Runtime::new().context("Failed to create tokio runtime")?;
    rt.block_on(run(args.command, &config))
}

async fn run(command: Command, config: &AppConfig) -> Result<()> {
    let window = OperatingWindow::from_config(&config.schedule)?;
    let client = BookingApiClient::new(config.api.base_url.clone(), &config.network)?;

    match command {
        Command::Billboard { date } => {
            let board = fetch_billboard(&client, date.as_deref()).await?;
            warn_unknown_locations(&board, config);
            print_billboard(&board);
        }
        Command::Check {
            teacher,
            start,
            duration,
            date,
        } => {
            let board = fetch_billboard(&client, date.as_deref()).await?;
            let queue = find_queue(&board, &teacher)?;
            let report = check_conflict_with(
                &start,
                duration,
                queue.entries(),
                &window,
                SlotSearch::from_config(&config.schedule),
            )?;

            println!(
                "Candidate {}-{}",
                report.candidate.start_time(),
                report.candidate.end_time()
            );
            if !report.within_window {
                println!(
                    "  outside operating hours {}-{}",
                    window.open_time(),
                    window.close_time()
                );
            }
            if !report.has_conflict {
                println!("  no conflict");
                return Ok(());
            }
            for entry in &report.conflicting_entries {
                println!(
                    "  conflicts with {}-{} {}",
                    entry.start_time(),
                    entry.end_time(),
                    entry.origin.student_names.join(", ")
                );
            }
            if report.suggested_alternatives.is_empty() {
                println!("  nothing free before closing");
            }
            for slot in &report.suggested_alternatives {
                println!("  free: {}-{}", slot.start_time(), slot.end_time());
            }
        }
        Command::Nudge {
            teacher,
            event,
            minutes,
            date,
        } => {
            let board = fetch_billboard(&client, date.as_deref()).await?;
            let mut session = QueueSession::new(find_queue(&board, &teacher)?.clone());
            let minutes = minutes.unwrap_or(config.queue.offset_step_minutes);

            if !session.queue_mut().adjust_manual_offset(event, minutes) {
                bail!("Event {} is not in this teacher's day", event);
            }
            save(&mut session, config).await?;
        }
        Command::Resize {
            teacher,
            event,
            minutes,
            date,
        } => {
            let board = fetch_billboard(&client, date.as_deref()).await?;
            let mut session = QueueSession::new(find_queue(&board, &teacher)?.clone());
            let minutes = minutes.unwrap_or(config.queue.duration_step_minutes);

            match session.queue_mut().adjust_duration(event, minutes) {
                DurationChange::NotFound => {
                    bail!("Event {} is not in this teacher's day", event)
                }
                DurationChange::RejectedByPackage { requested, ceiling } => {
                    bail!(
                        "{} minutes exceeds the {} minutes left on the package",
                        requested,
                        ceiling
                    )
                }
                DurationChange::Unchanged => {
                    println!("Nothing to change");
                    return Ok(());
                }
                DurationChange::ClampedToMinimum { to, .. } => {
                    tracing::warn!("Duration clamped to {} minutes", to);
                }
                DurationChange::Applied { .. } => {}
            }
            save(&mut session, config).await?;
        }
    }

    Ok(())
}

fn resolve_date(date: Option<&str>) -> Result<NaiveDate> {
    match date {
        Some(value) => Ok(time::parse_date(value)?),
        None => Ok(SystemClock.today()),
    }
}

async fn fetch_billboard(client: &BookingApiClient, date: Option<&str>) -> Result<Billboard> {
    let date = resolve_date(date)?;
    tracing::info!("Loading bookings for {}", date);
    Ok(billboard::load_billboard(client, date, &[]).await?)
}

fn find_queue<'a>(board: &'a Billboard, teacher: &str) -> Result<&'a TeacherDayQueue> {
    let found = board
        .find_teacher(teacher)
        .map(|t| t.id)
        .or_else(|| teacher.parse::<i64>().ok());

    match found.and_then(|id| board.queue(id)) {
        Some(queue) => Ok(queue),
        None => bail!("No lessons for teacher {:?} on {}", teacher, board.date),
    }
}

async fn save(session: &mut QueueSession, config: &AppConfig) -> Result<()> {
    let url = config
        .database
        .url
        .as_deref()
        .context("No database configured (set DATABASE_URL or KITE__DATABASE__URL)")?;
    let database = Database::new(url).await?;

    for change in session.pending_changes() {
        tracing::debug!("Pending: {:?}", change);
    }

    match session.submit(&database).await {
        Ok(summary) => {
            println!(
                "Saved: {} created, {} updated, {} deleted",
                summary.created, summary.updated, summary.deleted
            );
            print_queue(session.queue());
            Ok(())
        }
        Err(e) => {
            tracing::error!("Failed to save changes: {}", e);
            Err(e.into())
        }
    }
}

fn warn_unknown_locations(board: &Billboard, config: &AppConfig) {
    for queue in board.queues.values() {
        for entry in queue.entries() {
            let Some(location) = entry.location else {
                continue;
            };
            if !config.locations.contains(&location) {
                tracing::warn!(
                    "Event {:?} is at {}, which is not a configured location",
                    entry.id,
                    location
                );
            }
        }
    }
}

fn print_billboard(board: &Billboard) {
    println!("Billboard for {}", board.date);
    for (teacher_id, queue) in &board.queues {
        let name = board
            .teacher(*teacher_id)
            .map(|t| t.name.as_str())
            .unwrap_or("?");
        println!();
        println!("{} ({} min)", name, queue.total_duration());
        print_queue(queue);

        if let Some(stats) = board.stats.per_teacher.get(teacher_id) {
            println!(
                "  revenue {:.2}, commission {:.2}, school {:.2}",
                stats.revenue,
                stats.commission,
                stats.school_share()
            );
        }
    }

    let totals = &board.stats.totals;
    println!();
    println!(
        "Total: {} events, {} min, revenue {:.2}, commission {:.2}",
        totals.event_count,
        totals.scheduled_minutes(),
        totals.revenue,
        totals.commission
    );
}

fn print_queue(queue: &TeacherDayQueue) {
    for entry in queue.entries() {
        let gap = if entry.has_gap { " +gap" } else { "" };
        let location = entry
            .location
            .map(|l| l.name().to_string())
            .unwrap_or_else(|| "-".to_string());
        println!(
            "  {}-{} [{}] {} {}{}",
            entry.start_time(),
            entry.end_time(),
            entry.status,
            location,
            entry.origin.student_names.join(", "),
            gap
        );
    }
}
