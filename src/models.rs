use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{AttendanceError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttendanceStatus {
    Present,
    Absent,
    Late,
}

impl AttendanceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Present => "present",
            Self::Absent => "absent",
            Self::Late => "late",
        }
    }
}

impl fmt::Display for AttendanceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AttendanceStatus {
    type Err = AttendanceError;

    fn from_str(value: &str) -> Result<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "present" => Ok(Self::Present),
            "absent" => Ok(Self::Absent),
            "late" => Ok(Self::Late),
            _ => Err(AttendanceError::InvalidStatus(value.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Student {
    pub id: Uuid,
    pub full_name: String,
    pub roll_number: String,
    pub class_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Subject {
    pub id: Uuid,
    pub name: String,
    pub code: String,
}

/// One student's status for one subject on one class day.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AttendanceEvent {
    pub student_id: Uuid,
    /// Display roll number, present when the store joined the student record.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub roll_number: Option<String>,
    pub subject_id: Uuid,
    pub subject_name: String,
    pub subject_code: String,
    pub date: NaiveDate,
    pub status: AttendanceStatus,
    pub remarks: Option<String>,
    pub faculty_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StudentMark {
    pub student_id: Uuid,
    pub status: AttendanceStatus,
    pub remarks: Option<String>,
}

/// Every mark for a single class session, recorded together or not at all.
#[derive(Debug, Clone)]
pub struct AttendanceBatch {
    subject: Subject,
    date: NaiveDate,
    faculty_name: String,
    marks: Vec<StudentMark>,
}

impl AttendanceBatch {
    pub fn new(
        subject: Subject,
        date: NaiveDate,
        faculty_name: impl Into<String>,
        marks: Vec<StudentMark>,
    ) -> Result<Self> {
        if marks.is_empty() {
            return Err(AttendanceError::EmptyBatch);
        }

        let mut seen = HashSet::with_capacity(marks.len());
        for mark in &marks {
            if !seen.insert(mark.student_id) {
                return Err(AttendanceError::DuplicateStudent(mark.student_id));
            }
        }

        Ok(Self {
            subject,
            date,
            faculty_name: faculty_name.into(),
            marks,
        })
    }

    pub fn subject(&self) -> &Subject {
        &self.subject
    }

    pub fn date(&self) -> NaiveDate {
        self.date
    }

    pub fn faculty_name(&self) -> &str {
        &self.faculty_name
    }

    pub fn marks(&self) -> &[StudentMark] {
        &self.marks
    }

    pub fn events(&self) -> Vec<AttendanceEvent> {
        self.marks
            .iter()
            .map(|mark| AttendanceEvent {
                student_id: mark.student_id,
                roll_number: None,
                subject_id: self.subject.id,
                subject_name: self.subject.name.clone(),
                subject_code: self.subject.code.clone(),
                date: self.date,
                status: mark.status,
                remarks: mark.remarks.clone(),
                faculty_name: self.faculty_name.clone(),
            })
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SubjectAttendanceSummary {
    pub subject_id: Uuid,
    pub subject_name: String,
    pub subject_code: String,
    pub total_classes: u32,
    pub present_classes: u32,
    pub absent_classes: u32,
    pub late_classes: u32,
    pub attendance_percentage: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct OverallAttendanceStats {
    pub total_classes: u32,
    pub present_classes: u32,
    pub absent_classes: u32,
    pub late_classes: u32,
    pub overall_percentage: u32,
    pub subjects_count: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AttendanceSummary {
    pub subjects: Vec<SubjectAttendanceSummary>,
    pub overall: OverallAttendanceStats,
}
