/// Date resolution: which document backs a queried day.
///
/// Pure functions of (queried, today). Storage executes the returned
/// strategies in order and stops at the first one that finds a document.

use chrono::{Days, Local, NaiveDate};

use crate::storage::StorageError;

pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Role of a queried date relative to today.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateClass {
    Today,
    Past,
    Tomorrow,
    FarFuture,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateContext {
    pub queried: NaiveDate,
    pub today: NaiveDate,
}

impl DateContext {
    pub fn new(queried: NaiveDate, today: NaiveDate) -> Self {
        Self { queried, today }
    }

    pub fn classify(&self) -> DateClass {
        if self.queried == self.today {
            DateClass::Today
        } else if self.queried < self.today {
            DateClass::Past
        } else if Some(self.queried) == self.today.checked_add_days(Days::new(1)) {
            DateClass::Tomorrow
        } else {
            DateClass::FarFuture
        }
    }

    /// Only today's document accepts mutations.
    pub fn is_mutable(&self) -> bool {
        self.classify() == DateClass::Today
    }

    pub fn plan(&self) -> ResolutionPlan {
        ResolutionPlan::for_class(self.classify())
    }
}

/// One place a board may be loaded from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    /// `day_track/<date>.md`, created from the template when missing.
    DayTrackOrCreate,
    /// `day_track/<date>.md` if present.
    DayTrack,
    /// `archived/<date>/day_track.md` if present.
    Archived,
    /// `night_check/plan.md`, surfaced as a backlog-only preview.
    NightPlan,
}

/// Ordered strategies plus the message reported when all of them miss.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolutionPlan {
    pub class: DateClass,
    pub strategies: Vec<Strategy>,
    pub empty_message: Option<&'static str>,
}

impl ResolutionPlan {
    pub fn for_class(class: DateClass) -> Self {
        let (strategies, empty_message) = match class {
            DateClass::Today => (vec![Strategy::DayTrackOrCreate], None),
            DateClass::Past => (
                vec![Strategy::DayTrack, Strategy::Archived],
                Some("No task records for this date"),
            ),
            DateClass::Tomorrow => (vec![Strategy::NightPlan], Some("Tomorrow's plan not set")),
            DateClass::FarFuture => (Vec::new(), Some("Future date")),
        };
        Self {
            class,
            strategies,
            empty_message,
        }
    }
}

/// Source of "today". Swappable so tests can pin the calendar.
pub trait Clock: Send + Sync {
    fn today(&self) -> NaiveDate;
}

/// Local wall-clock date.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn today(&self) -> NaiveDate {
        Local::now().date_naive()
    }
}

#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub NaiveDate);

impl Clock for FixedClock {
    fn today(&self) -> NaiveDate {
        self.0
    }
}

/// Parse a zero-padded `YYYY-MM-DD` date.
pub fn parse_date(value: &str) -> Result<NaiveDate, StorageError> {
    let trimmed = value.trim();
    if trimmed.len() != 10 {
        return Err(StorageError::InvalidDate(value.to_string()));
    }
    NaiveDate::parse_from_str(trimmed, DATE_FORMAT)
        .map_err(|_| StorageError::InvalidDate(value.to_string()))
}

pub fn format_date(date: NaiveDate) -> String {
    date.format(DATE_FORMAT).to_string()
}

/// Whether a directory or file stem names a day.
pub fn looks_like_date(name: &str) -> bool {
    parse_date(name).is_ok()
}
