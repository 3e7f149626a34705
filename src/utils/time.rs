use std::{fmt::Display, str::FromStr};

use anyhow::anyhow;
use chrono::{DateTime, Days, Local, NaiveDate};
use serde::{Deserialize, Serialize};

/// Identifies one calendar day in the user's local timezone. Always rendered as `YYYY-MM-DD`.
///
/// A [DayKey] is derived from local calendar fields only, so a task tracked at 23:59 lands on
/// the same day the user sees on their wall clock.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct DayKey(NaiveDate);

impl DayKey {
    pub fn from_local(moment: &DateTime<Local>) -> Self {
        Self(moment.date_naive())
    }

    pub fn date(&self) -> NaiveDate {
        self.0
    }

    /// Moves the key by a number of days. Returns [None] when the result leaves chrono's range.
    pub fn offset(&self, days: i64) -> Option<Self> {
        let shifted = if days >= 0 {
            self.0.checked_add_days(Days::new(days.unsigned_abs()))
        } else {
            self.0.checked_sub_days(Days::new(days.unsigned_abs()))
        };
        shifted.map(Self)
    }

    pub fn succ(&self) -> Option<Self> {
        self.0.succ_opt().map(Self)
    }
}

impl Display for DayKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&format_ymd(self.0))
    }
}

impl FromStr for DayKey {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_ymd(s)
            .map(Self)
            .ok_or_else(|| anyhow!("Can't parse {s} into a YYYY-MM-DD day"))
    }
}

impl TryFrom<String> for DayKey {
    type Error = anyhow::Error;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<DayKey> for String {
    fn from(value: DayKey) -> Self {
        value.to_string()
    }
}

/// This is the standard way of converting a date to a string in tasktally.
pub fn format_ymd(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

/// Strict inverse of [format_ymd]. Only zero padded `YYYY-MM-DD` input naming a real date is
/// accepted.
pub fn parse_ymd(s: &str) -> Option<NaiveDate> {
    let bytes = s.as_bytes();
    if bytes.len() != 10 || bytes[4] != b'-' || bytes[7] != b'-' {
        return None;
    }
    let digits = |range: std::ops::Range<usize>| {
        let part = &s[range];
        part.bytes()
            .all(|b| b.is_ascii_digit())
            .then(|| part.parse::<u32>().ok())
            .flatten()
    };
    let year = digits(0..4)?;
    let month = digits(5..7)?;
    let day = digits(8..10)?;
    NaiveDate::from_ymd_opt(i32::try_from(year).ok()?, month, day)
}

/// Renders milliseconds as `HH:MM:SS`. Sub-second remainders are dropped and hours are not
/// wrapped at 24.
pub fn format_ms(milliseconds: u64) -> String {
    let seconds = milliseconds / 1000;
    let hours = seconds / 3600;
    let minutes = (seconds % 3600) / 60;
    let seconds = seconds % 60;
    format!("{hours:02}:{minutes:02}:{seconds:02}")
}

/// Parses `HH:MM:SS` into milliseconds. Every part must consist of digits only, minutes and
/// seconds must stay within 0..=59. Hours are unbounded.
pub fn parse_hms(s: &str) -> Option<u64> {
    let mut parts = s.trim().split(':');
    let mut next = || {
        parts
            .next()
            .filter(|part| !part.is_empty() && part.bytes().all(|b| b.is_ascii_digit()))
            .and_then(|part| part.parse::<u64>().ok())
    };
    let hours = next()?;
    let minutes = next()?;
    let seconds = next()?;
    if parts.next().is_some() || minutes > 59 || seconds > 59 {
        return None;
    }
    hours
        .checked_mul(3600)?
        .checked_add(minutes * 60 + seconds)?
        .checked_mul(1000)
}
