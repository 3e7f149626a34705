use std::fmt::Display;

use anyhow::Result;
use chrono::{DateTime, Local};
use chrono_english::parse_date_string;
use clap::{CommandFactory, ValueEnum};

use crate::{storage::kv_storage::KeyValueStorage, tracker::Tracker, utils::time::DayKey};

use super::Args;

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum DateStyle {
    Uk,
    Us,
}

impl From<DateStyle> for chrono_english::Dialect {
    fn from(value: DateStyle) -> Self {
        match value {
            DateStyle::Uk => Self::Uk,
            DateStyle::Us => Self::Us,
        }
    }
}

impl Display for DateStyle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DateStyle::Uk => write!(f, "uk"),
            DateStyle::Us => write!(f, "us"),
        }
    }
}

#[derive(Debug, clap::Args)]
pub struct DayArgs {
    #[arg(
        long,
        global = true,
        help = "Day to work with, like \"2025-03-15\", \"yesterday\" or \"last friday\""
    )]
    day: Option<String>,
    #[arg(
        long,
        global = true,
        allow_negative_numbers = true,
        help = "Moves the selected day. -1 is the day before, 1 the day after"
    )]
    offset: Option<i64>,
    #[arg(
        long,
        global = true,
        default_value_t = DateStyle::Uk,
        help = "Order of dates like 03/11/2025. Uk is day/month/year, Us is month/day/year"
    )]
    date_style: DateStyle,
}

impl DayArgs {
    /// Points the tracker at the day these arguments describe.
    pub fn select<S: KeyValueStorage>(
        &self,
        tracker: &mut Tracker<S>,
        now: DateTime<Local>,
    ) -> Result<()> {
        if let Some(day) = &self.day {
            tracker.select_day(self.parse(day, now)?);
        }
        if let Some(offset) = self.offset {
            tracker.shift_day(offset);
        }
        Ok(())
    }

    pub fn parse(&self, input: &str, now: DateTime<Local>) -> Result<DayKey> {
        parse_day(input, now, self.date_style)
    }
}

/// Accepts canonical `YYYY-MM-DD` keys first and falls back to natural language dates.
pub fn parse_day(input: &str, now: DateTime<Local>, date_style: DateStyle) -> Result<DayKey> {
    if let Ok(day) = input.trim().parse::<DayKey>() {
        return Ok(day);
    }
    match parse_date_string(input, now, date_style.into()) {
        Ok(moment) => Ok(DayKey::from_local(&moment)),
        Err(e) => Err(Args::command()
            .error(
                clap::error::ErrorKind::ValueValidation,
                format!("Failed to validate day {input:?}: {e}"),
            )
            .into()),
    }
}
