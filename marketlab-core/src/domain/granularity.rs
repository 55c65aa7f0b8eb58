//! Sampling granularity — the aggregation period of a timeframe.
//!
//! Grammar: `m<N>`, `H<N>`, `D<N>`, `W<N>`, `M<N>` with `0 < N < 100`
//! (minutes, hours, days, weeks, months). Lowercase `m` is minutes,
//! uppercase `M` is months. Granularities are totally ordered by span.

use chrono::{DateTime, Datelike, Duration, TimeZone, Utc};
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum GranularityError {
    #[error("invalid granularity '{0}': expected m/H/D/W/M followed by 1..=99")]
    InvalidFormat(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum GranularityUnit {
    Minute,
    Hour,
    Day,
    Week,
    Month,
}

impl GranularityUnit {
    fn letter(&self) -> char {
        match self {
            GranularityUnit::Minute => 'm',
            GranularityUnit::Hour => 'H',
            GranularityUnit::Day => 'D',
            GranularityUnit::Week => 'W',
            GranularityUnit::Month => 'M',
        }
    }

    /// Span of one unit, in minutes. Months count as 30 days, the
    /// conventional comparison value — bucket boundaries use real
    /// calendar months.
    fn minutes(&self) -> u64 {
        match self {
            GranularityUnit::Minute => 1,
            GranularityUnit::Hour => 60,
            GranularityUnit::Day => 1_440,
            GranularityUnit::Week => 10_080,
            GranularityUnit::Month => 43_200,
        }
    }
}

/// A parsed sampling period such as `m5` or `H1`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Granularity {
    unit: GranularityUnit,
    count: u32,
}

impl Granularity {
    pub fn new(unit: GranularityUnit, count: u32) -> Result<Self, GranularityError> {
        if count == 0 || count >= 100 {
            return Err(GranularityError::InvalidFormat(format!(
                "{}{count}",
                unit.letter()
            )));
        }
        Ok(Self { unit, count })
    }

    pub fn minutes(m: u32) -> Self {
        Self::new(GranularityUnit::Minute, m).unwrap()
    }

    pub fn hours(h: u32) -> Self {
        Self::new(GranularityUnit::Hour, h).unwrap()
    }

    pub fn days(d: u32) -> Self {
        Self::new(GranularityUnit::Day, d).unwrap()
    }

    pub fn unit(&self) -> GranularityUnit {
        self.unit
    }

    pub fn count(&self) -> u32 {
        self.count
    }

    /// Total span in minutes, the comparison value for ordering.
    pub fn span_minutes(&self) -> u64 {
        self.unit.minutes() * self.count as u64
    }

    /// Start of the bucket containing `ts`.
    ///
    /// Minute/hour/day buckets are anchored at the Unix epoch midnight,
    /// week buckets at Monday, month buckets at the first of the month.
    pub fn bucket_start(&self, ts: DateTime<Utc>) -> DateTime<Utc> {
        match self.unit {
            GranularityUnit::Minute | GranularityUnit::Hour | GranularityUnit::Day => {
                let span = self.span_minutes() as i64 * 60;
                let secs = ts.timestamp();
                Utc.timestamp_opt(secs - secs.rem_euclid(span), 0).unwrap()
            }
            GranularityUnit::Week => {
                let span_days = 7 * self.count as i64;
                let days = ts.timestamp().div_euclid(86_400);
                // 1970-01-01 was a Thursday; shift so buckets open on Monday.
                let start_day = days - (days + 3).rem_euclid(span_days);
                Utc.timestamp_opt(start_day * 86_400, 0).unwrap()
            }
            GranularityUnit::Month => {
                let months = ts.year() as i64 * 12 + ts.month0() as i64;
                let start = months - months.rem_euclid(self.count as i64);
                let (year, month0) = (start.div_euclid(12), start.rem_euclid(12));
                Utc.with_ymd_and_hms(year as i32, month0 as u32 + 1, 1, 0, 0, 0)
                    .unwrap()
            }
        }
    }

    /// Start of the bucket immediately after the one containing `ts`.
    pub fn next_bucket_start(&self, ts: DateTime<Utc>) -> DateTime<Utc> {
        let start = self.bucket_start(ts);
        match self.unit {
            GranularityUnit::Minute | GranularityUnit::Hour | GranularityUnit::Day => {
                start + Duration::minutes(self.span_minutes() as i64)
            }
            GranularityUnit::Week => start + Duration::days(7 * self.count as i64),
            GranularityUnit::Month => {
                start + chrono::Months::new(self.count)
            }
        }
    }
}

impl PartialOrd for Granularity {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Granularity {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.span_minutes()
            .cmp(&other.span_minutes())
            .then_with(|| self.unit.cmp(&other.unit))
    }
}

impl fmt::Display for Granularity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.unit.letter(), self.count)
    }
}

impl FromStr for Granularity {
    type Err = GranularityError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || GranularityError::InvalidFormat(s.to_string());
        let mut chars = s.chars();
        let unit = match chars.next().ok_or_else(invalid)? {
            'm' => GranularityUnit::Minute,
            'H' => GranularityUnit::Hour,
            'D' => GranularityUnit::Day,
            'W' => GranularityUnit::Week,
            'M' => GranularityUnit::Month,
            _ => return Err(invalid()),
        };
        let digits = chars.as_str();
        if digits.is_empty() || digits.len() > 2 || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return Err(invalid());
        }
        let count: u32 = digits.parse().map_err(|_| invalid())?;
        Self::new(unit, count).map_err(|_| invalid())
    }
}

impl Serialize for Granularity {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Granularity {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(D::Error::custom)
    }
}
