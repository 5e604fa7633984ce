use std::io::Read;
use std::path::Path;

use chrono::NaiveDate;
use serde::Deserialize;
use tracing::{info, warn};

use crate::error::{AttendanceError, Result};
use crate::models::AttendanceStatus;
use crate::store::AttendanceStore;

/// One row of an attendance export.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportRow {
    pub roll_number: String,
    pub student_name: String,
    pub subject_code: String,
    pub subject_name: String,
    pub class_date: NaiveDate,
    pub status: AttendanceStatus,
    pub remarks: Option<String>,
    pub faculty_name: String,
}

/// Export rows belonging to one class session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionRows {
    pub subject_code: String,
    pub subject_name: String,
    pub class_date: NaiveDate,
    pub faculty_name: String,
    pub rows: Vec<ExportRow>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RosterRow {
    pub roll_number: String,
    pub status: AttendanceStatus,
    pub remarks: Option<String>,
}

#[derive(Deserialize)]
struct CsvExportRow {
    roll_number: String,
    student_name: String,
    subject_code: String,
    subject_name: String,
    class_date: NaiveDate,
    status: String,
    remarks: Option<String>,
    faculty_name: String,
}

#[derive(Deserialize)]
struct CsvRosterRow {
    roll_number: String,
    status: Option<String>,
    remarks: Option<String>,
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

pub fn read_export(path: &Path) -> Result<Vec<ExportRow>> {
    parse_export(std::fs::File::open(path)?)
}

pub fn parse_export<R: Read>(input: R) -> Result<Vec<ExportRow>> {
    let mut reader = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(input);
    let mut rows = Vec::new();

    for result in reader.deserialize::<CsvExportRow>() {
        let row = result?;
        rows.push(ExportRow {
            roll_number: row.roll_number,
            student_name: row.student_name,
            subject_code: row.subject_code,
            subject_name: row.subject_name,
            class_date: row.class_date,
            status: row.status.parse()?,
            remarks: non_blank(row.remarks),
            faculty_name: row.faculty_name,
        });
    }

    Ok(rows)
}

pub fn read_roster(path: &Path) -> Result<Vec<RosterRow>> {
    parse_roster(std::fs::File::open(path)?)
}

/// Roster rows with no status are marked present.
pub fn parse_roster<R: Read>(input: R) -> Result<Vec<RosterRow>> {
    let mut reader = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(input);
    let mut rows = Vec::new();

    for result in reader.deserialize::<CsvRosterRow>() {
        let row = result?;
        let status = match non_blank(row.status) {
            Some(value) => value.parse()?,
            None => AttendanceStatus::Present,
        };
        rows.push(RosterRow {
            roll_number: row.roll_number,
            status,
            remarks: non_blank(row.remarks),
        });
    }

    Ok(rows)
}

/// Groups rows by `(subject_code, class_date)` in order of first appearance.
/// The faculty name of a session is taken from its first row.
pub fn group_sessions(rows: Vec<ExportRow>) -> Vec<SessionRows> {
    let mut sessions: Vec<SessionRows> = Vec::new();

    for row in rows {
        let existing = sessions
            .iter_mut()
            .find(|s| s.subject_code == row.subject_code && s.class_date == row.class_date);

        match existing {
            Some(session) => session.rows.push(row),
            None => sessions.push(SessionRows {
                subject_code: row.subject_code.clone(),
                subject_name: row.subject_name.clone(),
                class_date: row.class_date,
                faculty_name: row.faculty_name.clone(),
                rows: vec![row],
            }),
        }
    }

    sessions
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ImportOutcome {
    pub inserted_events: usize,
    pub skipped_sessions: usize,
}

/// Feeds each session through the store's duplicate guard. Sessions that are
/// already marked are counted and skipped; any other error stops the import.
pub async fn import_sessions(
    store: &dyn AttendanceStore,
    sessions: &[SessionRows],
    class_name: &str,
) -> Result<ImportOutcome> {
    let mut outcome = ImportOutcome::default();

    for session in sessions {
        match store.import_session(session, class_name).await {
            Ok(inserted) => outcome.inserted_events += inserted,
            Err(AttendanceError::AlreadyMarked { .. }) => {
                warn!(
                    subject = %session.subject_code,
                    date = %session.class_date,
                    "session already marked, skipping"
                );
                outcome.skipped_sessions += 1;
            }
            Err(err) => return Err(err),
        }
    }

    Ok(outcome)
}

pub async fn import_file(
    store: &dyn AttendanceStore,
    path: &Path,
    class_name: &str,
) -> Result<ImportOutcome> {
    let sessions = group_sessions(read_export(path)?);
    let outcome = import_sessions(store, &sessions, class_name).await?;
    info!(
        inserted = outcome.inserted_events,
        skipped = outcome.skipped_sessions,
        path = %path.display(),
        "attendance import finished"
    );
    Ok(outcome)
}
