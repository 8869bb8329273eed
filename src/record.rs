// 📅 Records and calendar units

use crate::errors::LedgerError;
use anyhow::{Context, Result};
use chrono::{Datelike, Days, Months, NaiveDate};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// One classified ledger line (or one aggregated bucket)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub date: NaiveDate,
    pub merchant: String,
    pub amount: f64,
    pub category: String,
}

impl Record {
    pub fn new(date: NaiveDate, merchant: &str, amount: f64, category: &str) -> Self {
        Record {
            date,
            merchant: merchant.to_string(),
            amount,
            category: category.to_string(),
        }
    }

    /// Build a record from text fields
    pub fn parse(date: &str, date_format: &str, merchant: &str, amount: &str, category: &str) -> Result<Self> {
        let date = parse_date(date, date_format)?;
        let amount = amount
            .trim()
            .parse::<f64>()
            .with_context(|| format!("Failed to parse amount {:?}", amount))?;

        Ok(Record::new(date, merchant, amount, category))
    }

    /// Zero-amount placeholder for an empty bucket
    pub fn empty_bucket(date: NaiveDate, category: &str) -> Self {
        Record::new(date, "", 0.0, category)
    }
}

/// Parse a calendar date argument
pub fn parse_date(input: &str, date_format: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(input.trim(), date_format).map_err(|_| {
        LedgerError::InvalidDate {
            input: input.to_string(),
            format: date_format.to_string(),
        }
        .into()
    })
}

// ============================================================================
// TIME UNIT
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TimeUnit {
    Day,
    /// ISO week, starting Monday
    Week,
    Month,
}

impl TimeUnit {
    /// Rewind `date` to the first day of its period
    pub fn align(&self, date: NaiveDate) -> NaiveDate {
        match self {
            TimeUnit::Day => date,
            TimeUnit::Week => {
                date - Days::new(u64::from(date.weekday().num_days_from_monday()))
            }
            TimeUnit::Month => date.with_day(1).unwrap_or(date),
        }
    }

    /// Move an anchor forward by one period
    pub fn step(&self, anchor: NaiveDate) -> Option<NaiveDate> {
        match self {
            TimeUnit::Day => anchor.checked_add_days(Days::new(1)),
            TimeUnit::Week => anchor.checked_add_days(Days::new(7)),
            TimeUnit::Month => anchor.checked_add_months(Months::new(1)),
        }
    }

    /// Whether two dates fall into the same period
    pub fn same_period(&self, a: NaiveDate, b: NaiveDate) -> bool {
        match self {
            TimeUnit::Day => a == b,
            TimeUnit::Week => a.iso_week() == b.iso_week(),
            TimeUnit::Month => a.year() == b.year() && a.month() == b.month(),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            TimeUnit::Day => "day",
            TimeUnit::Week => "week",
            TimeUnit::Month => "month",
        }
    }
}

impl fmt::Display for TimeUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for TimeUnit {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "d" | "day" | "daily" => Ok(TimeUnit::Day),
            "w" | "week" | "weekly" => Ok(TimeUnit::Week),
            "m" | "month" | "monthly" => Ok(TimeUnit::Month),
            other => Err(anyhow::anyhow!("Unknown time unit: {}", other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::input::DEFAULT_DATE_FORMAT;

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_parse_date() {
        assert_eq!(parse_date("01/05/2023", DEFAULT_DATE_FORMAT).unwrap(), ymd(2023, 1, 5));

        let err = parse_date("2023-01-05", DEFAULT_DATE_FORMAT).unwrap_err();
        match err.downcast_ref::<LedgerError>() {
            Some(LedgerError::InvalidDate { input, .. }) => assert_eq!(input, "2023-01-05"),
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_parse_record() {
        let record = Record::parse("03/15/2023", DEFAULT_DATE_FORMAT, "safeway", "42.10", "grocery").unwrap();

        assert_eq!(record.date, ymd(2023, 3, 15));
        assert_eq!(record.amount, 42.10);
        assert!(Record::parse("03/15/2023", DEFAULT_DATE_FORMAT, "x", "abc", "y").is_err());
    }

    #[test]
    fn test_align() {
        // 2023-01-05 is a Thursday
        assert_eq!(TimeUnit::Day.align(ymd(2023, 1, 5)), ymd(2023, 1, 5));
        assert_eq!(TimeUnit::Week.align(ymd(2023, 1, 5)), ymd(2023, 1, 2));
        assert_eq!(TimeUnit::Week.align(ymd(2023, 1, 2)), ymd(2023, 1, 2));
        assert_eq!(TimeUnit::Month.align(ymd(2023, 1, 20)), ymd(2023, 1, 1));
    }

    #[test]
    fn test_step() {
        assert_eq!(TimeUnit::Day.step(ymd(2023, 1, 31)), Some(ymd(2023, 2, 1)));
        assert_eq!(TimeUnit::Week.step(ymd(2022, 12, 26)), Some(ymd(2023, 1, 2)));
        assert_eq!(TimeUnit::Month.step(ymd(2023, 12, 1)), Some(ymd(2024, 1, 1)));
    }

    #[test]
    fn test_same_period_uses_iso_weeks() {
        // Sunday 2023-01-01 belongs to ISO week 52 of 2022
        assert!(!TimeUnit::Week.same_period(ymd(2023, 1, 1), ymd(2023, 1, 2)));
        assert!(TimeUnit::Week.same_period(ymd(2023, 1, 2), ymd(2023, 1, 8)));
        assert!(TimeUnit::Month.same_period(ymd(2023, 1, 5), ymd(2023, 1, 20)));
        assert!(!TimeUnit::Month.same_period(ymd(2023, 1, 5), ymd(2024, 1, 5)));
    }

    #[test]
    fn test_time_unit_from_str() {
        assert_eq!("week".parse::<TimeUnit>().unwrap(), TimeUnit::Week);
        assert_eq!("M".parse::<TimeUnit>().unwrap(), TimeUnit::Month);
        assert!("year".parse::<TimeUnit>().is_err());
    }
}
