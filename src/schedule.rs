use crate::{
    config::ScheduleConfig,
    conflict::TimeSlot,
    error::{SchedulerError, SchedulerResult},
    time,
};

/// Daily operating hours lessons must fit into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OperatingWindow {
    open_minutes: u32,
    close_minutes: u32,
}

impl OperatingWindow {
    pub fn new(open: &str, close: &str) -> SchedulerResult<Self> {
        let open_minutes = time::time_to_minutes(open)?;
        let close_minutes = time::time_to_minutes(close)?;
        if open_minutes >= close_minutes {
            return Err(SchedulerError::InvalidWindow(format!(
                "opening {} is not before closing {}",
                open, close
            )));
        }
        Ok(Self {
            open_minutes,
            close_minutes,
        })
    }

    pub fn from_config(config: &ScheduleConfig) -> SchedulerResult<Self> {
        Self::new(&config.open_time, &config.close_time)
    }

    pub fn open_minutes(&self) -> u32 {
        self.open_minutes
    }

    pub fn close_minutes(&self) -> u32 {
        self.close_minutes
    }

    pub fn open_time(&self) -> String {
        time::minutes_to_time(i64::from(self.open_minutes))
    }

    pub fn close_time(&self) -> String {
        time::minutes_to_time(i64::from(self.close_minutes))
    }

    /// Whether the whole slot lies within operating hours.
    pub fn fits(&self, slot: &TimeSlot) -> bool {
        slot.start >= self.open_minutes && slot.end <= self.close_minutes
    }
}

impl Default for OperatingWindow {
    fn default() -> Self {
        Self {
            open_minutes: 9 * 60,
            close_minutes: 21 * 60,
        }
    }
}
