use chrono::NaiveDate;
use uuid::Uuid;

use crate::aggregate::StatusCounts;
use crate::error::Result;
use crate::models::{AttendanceBatch, AttendanceStatus, StudentMark, Subject};

/// A faculty member's in-progress marking for one class session.
///
/// Every edit returns a new sheet; the previous one is left untouched so a
/// caller can keep it for rollback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MarkingSheet {
    subject: Subject,
    date: NaiveDate,
    faculty_name: String,
    entries: Vec<StudentMark>,
}

impl MarkingSheet {
    pub fn new(
        subject: Subject,
        date: NaiveDate,
        faculty_name: impl Into<String>,
        roster: &[Uuid],
    ) -> Self {
        let mut entries: Vec<StudentMark> = Vec::with_capacity(roster.len());
        for student_id in roster {
            if entries.iter().any(|e| e.student_id == *student_id) {
                continue;
            }
            entries.push(StudentMark {
                student_id: *student_id,
                status: AttendanceStatus::Present,
                remarks: None,
            });
        }

        Self {
            subject,
            date,
            faculty_name: faculty_name.into(),
            entries,
        }
    }

    pub fn subject(&self) -> &Subject {
        &self.subject
    }

    pub fn date(&self) -> NaiveDate {
        self.date
    }

    pub fn entries(&self) -> &[StudentMark] {
        &self.entries
    }

    pub fn status_of(&self, student_id: Uuid) -> Option<AttendanceStatus> {
        self.entries
            .iter()
            .find(|e| e.student_id == student_id)
            .map(|e| e.status)
    }

    /// Students not on the roster are ignored.
    pub fn with_status(&self, student_id: Uuid, status: AttendanceStatus) -> Self {
        self.edit(student_id, |entry| entry.status = status)
    }

    pub fn with_remarks(&self, student_id: Uuid, remarks: Option<String>) -> Self {
        self.edit(student_id, |entry| entry.remarks = remarks.clone())
    }

    pub fn mark_all(&self, status: AttendanceStatus) -> Self {
        let mut next = self.clone();
        for entry in &mut next.entries {
            entry.status = status;
        }
        next
    }

    pub fn tally(&self) -> StatusCounts {
        let mut counts = StatusCounts::default();
        for entry in &self.entries {
            counts.record(entry.status);
        }
        counts
    }

    pub fn to_batch(&self) -> Result<AttendanceBatch> {
        AttendanceBatch::new(
            self.subject.clone(),
            self.date,
            self.faculty_name.clone(),
            self.entries.clone(),
        )
    }

    fn edit(&self, student_id: Uuid, apply: impl Fn(&mut StudentMark)) -> Self {
        let mut next = self.clone();
        if let Some(entry) = next.entries.iter_mut().find(|e| e.student_id == student_id) {
            apply(entry);
        }
        next
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AttendanceError;

    fn sheet(roster: &[Uuid]) -> MarkingSheet {
        let subject = Subject {
            id: Uuid::new_v4(),
            name: "Digital Electronics".to_string(),
            code: "EC202".to_string(),
        };
        let date = NaiveDate::from_ymd_opt(2025, 11, 3).unwrap();
        MarkingSheet::new(subject, date, "Dr. Das", roster)
    }

    #[test]
    fn everyone_starts_present() {
        let roster = [Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4()];
        let sheet = sheet(&roster);
        let tally = sheet.tally();
        assert_eq!(tally.present, 3);
        assert_eq!(tally.total(), 3);
    }

    #[test]
    fn edits_do_not_touch_the_previous_sheet() {
        let roster = [Uuid::new_v4(), Uuid::new_v4()];
        let original = sheet(&roster);
        let edited = original
            .with_status(roster[1], AttendanceStatus::Late)
            .with_remarks(roster[1], Some("traffic".to_string()));

        assert_eq!(original.status_of(roster[1]), Some(AttendanceStatus::Present));
        assert_eq!(edited.status_of(roster[1]), Some(AttendanceStatus::Late));
        assert_eq!(edited.entries()[1].remarks.as_deref(), Some("traffic"));
    }

    #[test]
    fn unknown_students_are_ignored() {
        let roster = [Uuid::new_v4()];
        let original = sheet(&roster);
        let edited = original.with_status(Uuid::new_v4(), AttendanceStatus::Absent);
        assert_eq!(edited, original);
    }

    #[test]
    fn mark_all_then_batch() {
        let roster = [Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4()];
        let sheet = sheet(&roster).mark_all(AttendanceStatus::Absent);
        let batch = sheet.to_batch().unwrap();
        assert_eq!(batch.marks().len(), 3);
        assert!(batch.marks().iter().all(|m| m.status == AttendanceStatus::Absent));
    }

    #[test]
    fn repeated_roster_entries_collapse() {
        let student = Uuid::new_v4();
        let sheet = sheet(&[student, student]);
        assert_eq!(sheet.entries().len(), 1);
    }

    #[test]
    fn empty_roster_cannot_be_submitted() {
        assert!(matches!(sheet(&[]).to_batch(), Err(AttendanceError::EmptyBatch)));
    }
}
