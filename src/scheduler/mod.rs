//! Weekly schedule for registry imports.
//!
//! The registry is republished weekly, so the import runs once per week at a
//! fixed day and UTC time of day. The default (Monday 03:00 UTC) matches the
//! cron expression `0 3 * * MON`.
//!
//! # Example
//!
//! ```rust
//! use rnc_importer::scheduler::{ImportSchedule, Weekday};
//! use chrono::{NaiveTime, TimeZone, Utc};
//!
//! let schedule = ImportSchedule::weekly(Weekday::Monday, NaiveTime::from_hms_opt(3, 0, 0).unwrap());
//!
//! // Sunday noon -> next Monday 03:00
//! let now = Utc.with_ymd_and_hms(2024, 3, 10, 12, 0, 0).unwrap();
//! let next = schedule.next_run_after(now);
//! assert_eq!(next, Utc.with_ymd_and_hms(2024, 3, 11, 3, 0, 0).unwrap());
//! ```

use chrono::{DateTime, Datelike, Days, NaiveTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

/// Days of the week for the import schedule
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum Weekday {
    /// Monday
    Monday,
    /// Tuesday
    Tuesday,
    /// Wednesday
    Wednesday,
    /// Thursday
    Thursday,
    /// Friday
    Friday,
    /// Saturday
    Saturday,
    /// Sunday
    Sunday,
}

impl Weekday {
    /// Convert from chrono::Weekday to our Weekday
    pub fn from_chrono(wd: chrono::Weekday) -> Self {
        use chrono::Weekday as ChronoWd;
        match wd {
            ChronoWd::Mon => Weekday::Monday,
            ChronoWd::Tue => Weekday::Tuesday,
            ChronoWd::Wed => Weekday::Wednesday,
            ChronoWd::Thu => Weekday::Thursday,
            ChronoWd::Fri => Weekday::Friday,
            ChronoWd::Sat => Weekday::Saturday,
            ChronoWd::Sun => Weekday::Sunday,
        }
    }

    /// Convert to chrono::Weekday
    pub fn to_chrono(self) -> chrono::Weekday {
        use chrono::Weekday as ChronoWd;
        match self {
            Weekday::Monday => ChronoWd::Mon,
            Weekday::Tuesday => ChronoWd::Tue,
            Weekday::Wednesday => ChronoWd::Wed,
            Weekday::Thursday => ChronoWd::Thu,
            Weekday::Friday => ChronoWd::Fri,
            Weekday::Saturday => ChronoWd::Sat,
            Weekday::Sunday => ChronoWd::Sun,
        }
    }
}

/// A weekly trigger point (day of week + UTC time of day)
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportSchedule {
    /// Day the import runs
    pub day: Weekday,

    /// UTC time of day the import runs (HH:MM:SS)
    #[serde(with = "time_format")]
    pub time: NaiveTime,
}

impl ImportSchedule {
    /// Create a weekly schedule
    pub fn weekly(day: Weekday, time: NaiveTime) -> Self {
        Self { day, time }
    }

    /// The first trigger point strictly after `now`
    ///
    /// A trigger that falls exactly on `now` is considered already fired, so the
    /// scheduler never runs the same slot twice.
    pub fn next_run_after(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        let target = self.day.to_chrono().num_days_from_monday();
        let today = now.weekday().num_days_from_monday();
        let days_ahead = (target + 7 - today) % 7;

        let date = now.date_naive() + Days::new(u64::from(days_ahead));
        let candidate = Utc.from_utc_datetime(&date.and_time(self.time));

        if candidate <= now {
            candidate + chrono::Duration::days(7)
        } else {
            candidate
        }
    }
}

impl Default for ImportSchedule {
    /// Monday 03:00 UTC
    fn default() -> Self {
        Self {
            day: Weekday::Monday,
            time: NaiveTime::from_hms_opt(3, 0, 0).unwrap_or(NaiveTime::MIN),
        }
    }
}

/// Serde module for serializing/deserializing NaiveTime as HH:MM:SS strings
pub(crate) mod time_format {
    use chrono::NaiveTime;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(time: &NaiveTime, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let s = time.format("%H:%M:%S").to_string();
        serializer.serialize_str(&s)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<NaiveTime, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        NaiveTime::parse_from_str(&s, "%H:%M:%S").map_err(serde::de::Error::custom)
    }
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests;
