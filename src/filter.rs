use std::str::FromStr;

use chrono::{Datelike, NaiveDate};
use uuid::Uuid;

use crate::error::{AttendanceError, Result};
use crate::models::AttendanceEvent;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SubjectFilter {
    #[default]
    All,
    Only(Uuid),
}

impl SubjectFilter {
    pub fn matches(&self, event: &AttendanceEvent) -> bool {
        match self {
            Self::All => true,
            Self::Only(subject_id) => event.subject_id == *subject_id,
        }
    }
}

impl FromStr for SubjectFilter {
    type Err = AttendanceError;

    fn from_str(value: &str) -> Result<Self> {
        let value = value.trim();
        if value.eq_ignore_ascii_case("all") {
            return Ok(Self::All);
        }
        Uuid::parse_str(value)
            .map(Self::Only)
            .map_err(|_| AttendanceError::InvalidSubjectFilter(value.to_string()))
    }
}

/// Calendar month selector, 0-indexed (January is 0).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum MonthFilter {
    #[default]
    All,
    Month(u32),
}

impl MonthFilter {
    pub fn month(month0: u32) -> Result<Self> {
        if month0 > 11 {
            return Err(AttendanceError::InvalidMonth(month0.to_string()));
        }
        Ok(Self::Month(month0))
    }

    pub fn matches(&self, date: NaiveDate) -> bool {
        match self {
            Self::All => true,
            Self::Month(month0) => date.month0() == *month0,
        }
    }
}

impl FromStr for MonthFilter {
    type Err = AttendanceError;

    fn from_str(value: &str) -> Result<Self> {
        let value = value.trim();
        if value.eq_ignore_ascii_case("all") {
            return Ok(Self::All);
        }
        let month0 = value
            .parse::<u32>()
            .map_err(|_| AttendanceError::InvalidMonth(value.to_string()))?;
        Self::month(month0)
    }
}

/// The filter selections a view is currently showing. Changing a selection
/// produces a new value.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AttendanceFilter {
    pub subject: SubjectFilter,
    pub month: MonthFilter,
}

impl AttendanceFilter {
    pub fn with_subject(self, subject: SubjectFilter) -> Self {
        Self { subject, ..self }
    }

    pub fn with_month(self, month: MonthFilter) -> Self {
        Self { month, ..self }
    }

    pub fn is_unfiltered(&self) -> bool {
        self.subject == SubjectFilter::All && self.month == MonthFilter::All
    }

    pub fn apply(&self, events: &[AttendanceEvent]) -> Vec<AttendanceEvent> {
        filter_events(events, &self.subject, &self.month)
    }
}

/// Events matching both selectors, in their original order.
pub fn filter_events(
    events: &[AttendanceEvent],
    subject: &SubjectFilter,
    month: &MonthFilter,
) -> Vec<AttendanceEvent> {
    events
        .iter()
        .filter(|event| subject.matches(event) && month.matches(event.date))
        .cloned()
        .collect()
}
