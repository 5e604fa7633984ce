//! Attendance records for a college ERP: recording class sessions behind a
//! duplicate guard, then summarizing them per subject and overall.

pub mod aggregate;
pub mod config;
pub mod db;
pub mod error;
pub mod filter;
pub mod import;
pub mod models;
pub mod optimistic;
pub mod report;
pub mod sheet;
pub mod store;

pub use aggregate::{aggregate, LATE_CREDIT_WEIGHT};
pub use error::{AttendanceError, Result};
pub use filter::{filter_events, AttendanceFilter, MonthFilter, SubjectFilter};
pub use store::{AttendanceStore, MemoryAttendanceStore};
