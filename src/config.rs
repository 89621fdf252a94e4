use std::path::PathBuf;

use crate::model::{DAY, Ms, hour_of_day};

/// Booking grid: which UTC hours are bookable and how far ahead availability looks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchedulePolicy {
    /// First bookable hour of the day, inclusive.
    pub open_hour: u8,
    /// Last bookable hour of the day, inclusive.
    pub close_hour: u8,
    pub horizon_days: u32,
}

impl Default for SchedulePolicy {
    fn default() -> Self {
        Self {
            open_hour: 9,
            close_hour: 19,
            horizon_days: 7,
        }
    }
}

impl SchedulePolicy {
    pub fn validate(&self) -> Result<(), String> {
        if self.close_hour > 23 {
            return Err(format!("close hour {} is not a valid hour", self.close_hour));
        }
        if self.open_hour > self.close_hour {
            return Err(format!(
                "open hour {} is after close hour {}",
                self.open_hour, self.close_hour
            ));
        }
        if self.horizon_days == 0 {
            return Err("availability horizon must be at least one day".into());
        }
        Ok(())
    }

    pub fn horizon_ms(&self) -> Ms {
        self.horizon_days as Ms * DAY
    }

    /// True if `t` falls in an hour that may start a booking.
    pub fn within_business_hours(&self, t: Ms) -> bool {
        let hour = hour_of_day(t);
        hour >= self.open_hour as i64 && hour <= self.close_hour as i64
    }

    pub fn business_hours_reason(&self) -> String {
        format!(
            "Picked hour must be between {} and {}",
            self.open_hour, self.close_hour
        )
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub data_dir: PathBuf,
    pub policy: SchedulePolicy,
}

impl Config {
    pub const WAL_FILE: &'static str = "slotbook.wal";

    /// Read `SLOTBOOK_*` variables; unset or unparseable values fall back to defaults.
    pub fn from_env() -> Result<Self, String> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, String> {
        let defaults = SchedulePolicy::default();
        let data_dir = lookup("SLOTBOOK_DATA_DIR").unwrap_or_else(|| "./data".into());
        let policy = SchedulePolicy {
            open_hour: lookup("SLOTBOOK_OPEN_HOUR")
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.open_hour),
            close_hour: lookup("SLOTBOOK_CLOSE_HOUR")
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.close_hour),
            horizon_days: lookup("SLOTBOOK_HORIZON_DAYS")
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.horizon_days),
        };
        policy.validate()?;
        Ok(Self {
            data_dir: PathBuf::from(data_dir),
            policy,
        })
    }

    pub fn wal_path(&self) -> PathBuf {
        self.data_dir.join(Self::WAL_FILE)
    }
}
