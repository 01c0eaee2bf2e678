//! Weekly calendar and opening window models.
//!
//! Defines the weekly time axis, day and clock-time tokens, and the
//! normalization of opening windows into the valid placement domain.
//!
//! # Time Model
//! All times are minutes from Monday 00:00 of a repeating week,
//! `0..HORIZON_MINUTES`. A timestamp `m` falls on weekday `m / 1440`
//! at clock time `m % 1440`.
//!
//! # Normalization
//! Every opening window maps to one `[open, close)` interval per day it
//! names. The union of all intervals, with overlapping or touching
//! intervals merged, is the [`WeekDomain`].

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Minutes in one day.
pub const MINUTES_PER_DAY: i64 = 1_440;

/// Days in the planning horizon.
pub const DAYS_PER_WEEK: i64 = 7;

/// Planning horizon: one week in minutes.
pub const HORIZON_MINUTES: i64 = MINUTES_PER_DAY * DAYS_PER_WEEK;

/// Errors raised while reading day and time tokens.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CalendarError {
    #[error("unknown day token: {0:?}")]
    InvalidDay(String),

    #[error("invalid time of day: {0:?}")]
    InvalidTime(String),

    #[error("window on {day} closes at {closing} before opening at {opening}")]
    EmptyWindow {
        day: String,
        opening: ClockTime,
        closing: ClockTime,
    },
}

/// Day of the week, Monday first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Weekday {
    Mon,
    Tue,
    Wed,
    Thu,
    Fri,
    Sat,
    Sun,
}

static WEEK: [Weekday; 7] = [
    Weekday::Mon,
    Weekday::Tue,
    Weekday::Wed,
    Weekday::Thu,
    Weekday::Fri,
    Weekday::Sat,
    Weekday::Sun,
];

impl Weekday {
    /// All days, Monday first.
    pub fn all() -> &'static [Weekday] {
        &WEEK
    }

    /// Zero-based index, Monday = 0.
    #[inline]
    pub fn index(self) -> i64 {
        self as i64
    }

    /// ISO day number, Monday = 1 .. Sunday = 7.
    #[inline]
    pub fn iso_number(self) -> u8 {
        self as u8 + 1
    }

    /// Day for a zero-based index, wrapping Sunday → Monday.
    pub fn from_index(index: i64) -> Self {
        WEEK[index.rem_euclid(DAYS_PER_WEEK) as usize]
    }

    /// Day on which a week minute falls.
    pub fn of_minute(minute: i64) -> Self {
        Self::from_index(minute.div_euclid(MINUTES_PER_DAY))
    }

    /// First minute of this day in the week.
    #[inline]
    pub fn start_minute(self) -> i64 {
        self.index() * MINUTES_PER_DAY
    }

    /// Lowercase three-letter token.
    pub fn token(self) -> &'static str {
        match self {
            Weekday::Mon => "mon",
            Weekday::Tue => "tue",
            Weekday::Wed => "wed",
            Weekday::Thu => "thu",
            Weekday::Fri => "fri",
            Weekday::Sat => "sat",
            Weekday::Sun => "sun",
        }
    }
}

impl fmt::Display for Weekday {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.token())
    }
}

/// A day selector: a single day or one of the aggregate tokens.
///
/// # Examples
///
/// ```
/// use u_timetable::models::{DayToken, Weekday};
///
/// let token: DayToken = "Weekend".parse().unwrap();
/// assert_eq!(token.days(), &[Weekday::Sat, Weekday::Sun]);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum DayToken {
    /// One named day.
    Day(Weekday),
    /// Monday through Friday.
    Weekdays,
    /// Saturday and Sunday.
    Weekend,
    /// Every day.
    All,
}

impl DayToken {
    /// The days this token selects, Monday first.
    pub fn days(self) -> &'static [Weekday] {
        match self {
            DayToken::Day(d) => {
                let i = d.index() as usize;
                &WEEK[i..=i]
            }
            DayToken::Weekdays => &WEEK[..5],
            DayToken::Weekend => &WEEK[5..],
            DayToken::All => &WEEK,
        }
    }

    /// Whether this token selects `day`.
    pub fn includes(self, day: Weekday) -> bool {
        self.days().contains(&day)
    }
}

impl From<Weekday> for DayToken {
    fn from(day: Weekday) -> Self {
        DayToken::Day(day)
    }
}

impl FromStr for DayToken {
    type Err = CalendarError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let token = match s.trim().to_ascii_lowercase().as_str() {
            "mon" => DayToken::Day(Weekday::Mon),
            "tue" => DayToken::Day(Weekday::Tue),
            "wed" => DayToken::Day(Weekday::Wed),
            "thu" => DayToken::Day(Weekday::Thu),
            "fri" => DayToken::Day(Weekday::Fri),
            "sat" => DayToken::Day(Weekday::Sat),
            "sun" => DayToken::Day(Weekday::Sun),
            "weekday" => DayToken::Weekdays,
            "weekend" => DayToken::Weekend,
            "all" => DayToken::All,
            _ => return Err(CalendarError::InvalidDay(s.to_string())),
        };
        Ok(token)
    }
}

impl TryFrom<String> for DayToken {
    type Error = CalendarError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl fmt::Display for DayToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DayToken::Day(d) => f.write_str(d.token()),
            DayToken::Weekdays => f.write_str("weekday"),
            DayToken::Weekend => f.write_str("weekend"),
            DayToken::All => f.write_str("all"),
        }
    }
}

impl From<DayToken> for String {
    fn from(token: DayToken) -> Self {
        token.to_string()
    }
}

/// Clock time of day at minute resolution, `00:00..=24:00`.
///
/// `24:00` is only meaningful as a closing time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ClockTime(i64);

impl ClockTime {
    /// Midnight at the start of a day.
    pub const MIDNIGHT: ClockTime = ClockTime(0);
    /// Midnight at the end of a day.
    pub const END_OF_DAY: ClockTime = ClockTime(MINUTES_PER_DAY);

    /// Creates a clock time from hours and minutes.
    pub fn hm(hour: i64, minute: i64) -> Result<Self, CalendarError> {
        let total = hour * 60 + minute;
        if !(0..60).contains(&minute) || !(0..=MINUTES_PER_DAY).contains(&total) || hour < 0 {
            return Err(CalendarError::InvalidTime(format!("{hour:02}:{minute:02}")));
        }
        Ok(Self(total))
    }

    /// Clock time of a minute count since midnight (taken modulo one day).
    pub fn from_minutes(minutes: i64) -> Self {
        Self(minutes.rem_euclid(MINUTES_PER_DAY))
    }

    /// Minutes since midnight.
    #[inline]
    pub fn minutes(self) -> i64 {
        self.0
    }

    pub fn hour(self) -> i64 {
        self.0 / 60
    }

    pub fn minute(self) -> i64 {
        self.0 % 60
    }

    /// `HH:MM:SS` rendering used by calendar feeds.
    pub fn to_hms(self) -> String {
        format!("{:02}:{:02}:00", self.hour(), self.minute())
    }
}

impl FromStr for ClockTime {
    type Err = CalendarError;

    /// Parses `HH:MM` or `HH:MM:SS`. Seconds are truncated.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || CalendarError::InvalidTime(s.to_string());
        let parts: Vec<&str> = s.trim().split(':').collect();
        if !(2..=3).contains(&parts.len()) {
            return Err(invalid());
        }

        let mut fields = [0i64; 3];
        for (slot, part) in fields.iter_mut().zip(&parts) {
            if part.is_empty() || part.len() > 2 || !part.bytes().all(|b| b.is_ascii_digit()) {
                return Err(invalid());
            }
            *slot = part.parse().map_err(|_| invalid())?;
        }
        let [hour, minute, second] = fields;
        if second > 59 || (hour == 24 && (minute > 0 || second > 0)) {
            return Err(invalid());
        }
        Self::hm(hour, minute).map_err(|_| invalid())
    }
}

impl TryFrom<String> for ClockTime {
    type Error = CalendarError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<ClockTime> for String {
    fn from(time: ClockTime) -> Self {
        time.to_string()
    }
}

impl fmt::Display for ClockTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}", self.hour(), self.minute())
    }
}

/// Splits a week minute into its weekday and clock time.
///
/// A minute at exactly the end of a day belongs to the next day at
/// `00:00`, wrapping Sunday → Monday.
pub fn split_week_minute(minute: i64) -> (Weekday, ClockTime) {
    (Weekday::of_minute(minute), ClockTime::from_minutes(minute))
}

/// A raw opening window as supplied by the instance source.
///
/// Day and times are kept as text until normalization so that malformed
/// input surfaces as a validation error rather than a decode failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpeningWindow {
    /// Day token (`mon`..`sun`, `weekday`, `weekend`, `all`).
    pub day: String,
    /// Opening clock time, `HH:MM[:SS]`.
    pub opening_time: String,
    /// Closing clock time, `HH:MM[:SS]` (`24:00` allowed).
    pub closing_time: String,
}

impl OpeningWindow {
    pub fn new(
        day: impl Into<String>,
        opening_time: impl Into<String>,
        closing_time: impl Into<String>,
    ) -> Self {
        Self {
            day: day.into(),
            opening_time: opening_time.into(),
            closing_time: closing_time.into(),
        }
    }

    /// Week-minute intervals covered by this window, one per selected day.
    pub fn resolve(&self) -> Result<Vec<TimeWindow>, CalendarError> {
        let token: DayToken = self.day.parse()?;
        let opening: ClockTime = self.opening_time.parse()?;
        let closing: ClockTime = self.closing_time.parse()?;
        if closing <= opening {
            return Err(CalendarError::EmptyWindow {
                day: self.day.clone(),
                opening,
                closing,
            });
        }

        Ok(token
            .days()
            .iter()
            .map(|d| {
                TimeWindow::new(
                    d.start_minute() + opening.minutes(),
                    d.start_minute() + closing.minutes(),
                )
            })
            .collect())
    }
}

/// A time interval [start, end) in week minutes.
///
/// Half-open interval: includes start, excludes end.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
pub struct TimeWindow {
    /// Interval start (minute, inclusive).
    pub start: i64,
    /// Interval end (minute, exclusive).
    pub end: i64,
}

impl TimeWindow {
    /// Creates a new time window.
    pub fn new(start: i64, end: i64) -> Self {
        Self { start, end }
    }

    /// Length of this window in minutes.
    #[inline]
    pub fn duration(&self) -> i64 {
        self.end - self.start
    }

    /// Whether a minute falls within this window.
    #[inline]
    pub fn contains(&self, minute: i64) -> bool {
        minute >= self.start && minute < self.end
    }

    /// Whether `[start, end)` lies entirely inside this window.
    #[inline]
    pub fn covers(&self, start: i64, end: i64) -> bool {
        start >= self.start && end <= self.end
    }

    /// Whether two windows overlap.
    pub fn overlaps(&self, other: &Self) -> bool {
        self.start < other.end && other.start < self.end
    }
}

/// The valid placement domain of the week: sorted, disjoint, non-touching
/// opening intervals.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WeekDomain {
    windows: Vec<TimeWindow>,
}

impl WeekDomain {
    /// Unions arbitrary windows. Overlapping or touching windows merge.
    pub fn from_windows(windows: impl IntoIterator<Item = TimeWindow>) -> Self {
        let mut sorted: Vec<TimeWindow> = windows.into_iter().filter(|w| w.end > w.start).collect();
        sorted.sort_unstable();

        let mut merged: Vec<TimeWindow> = Vec::with_capacity(sorted.len());
        for w in sorted {
            match merged.last_mut() {
                Some(last) if w.start <= last.end => last.end = last.end.max(w.end),
                _ => merged.push(w),
            }
        }
        Self { windows: merged }
    }

    /// Normalizes raw opening windows, failing on the first malformed one.
    pub fn from_opening_windows(windows: &[OpeningWindow]) -> Result<Self, CalendarError> {
        let mut intervals = Vec::new();
        for w in windows {
            intervals.extend(w.resolve()?);
        }
        Ok(Self::from_windows(intervals))
    }

    /// Merged windows in ascending order.
    pub fn windows(&self) -> &[TimeWindow] {
        &self.windows
    }

    pub fn is_empty(&self) -> bool {
        self.windows.is_empty()
    }

    /// Total open minutes in the week.
    pub fn open_minutes(&self) -> i64 {
        self.windows.iter().map(TimeWindow::duration).sum()
    }

    /// Whether a minute is open.
    pub fn contains(&self, minute: i64) -> bool {
        self.window_at(minute).is_some()
    }

    /// Whether `[start, end)` lies inside a single merged window.
    pub fn covers(&self, start: i64, end: i64) -> bool {
        self.window_at(start).is_some_and(|w| w.covers(start, end))
    }

    fn window_at(&self, minute: i64) -> Option<&TimeWindow> {
        let idx = self.windows.partition_point(|w| w.end <= minute);
        self.windows.get(idx).filter(|w| w.contains(minute))
    }

    /// Candidate start minutes for a span of `duration` minutes.
    ///
    /// Starts are `open + n*step` for each merged window, kept while the
    /// whole span fits before the window closes.
    pub fn start_candidates(&self, duration: i64, step: i64) -> Vec<i64> {
        let step = step.max(1);
        let mut starts = Vec::new();
        for w in &self.windows {
            let mut s = w.start;
            while s + duration <= w.end {
                starts.push(s);
                s += step;
            }
        }
        starts
    }
}
