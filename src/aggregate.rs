use std::collections::HashMap;

use serde::Serialize;
use uuid::Uuid;

use crate::models::{
    AttendanceEvent, AttendanceStatus, AttendanceSummary, OverallAttendanceStats,
    SubjectAttendanceSummary,
};

/// Credit a late arrival earns toward the percentage. Present earns 1.0.
pub const LATE_CREDIT_WEIGHT: f64 = 0.5;

/// Attendance level quoted to students as the eligibility bar. Informational
/// only: nothing in this crate refuses or gates on it.
pub const ELIGIBILITY_THRESHOLD_PERCENT: u32 = 75;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StatusCounts {
    pub present: u32,
    pub absent: u32,
    pub late: u32,
}

impl StatusCounts {
    pub fn record(&mut self, status: AttendanceStatus) {
        match status {
            AttendanceStatus::Present => self.present += 1,
            AttendanceStatus::Absent => self.absent += 1,
            AttendanceStatus::Late => self.late += 1,
        }
    }

    pub fn total(&self) -> u32 {
        self.present + self.absent + self.late
    }

    pub fn percentage(&self) -> u32 {
        attendance_percentage(self.present, self.late, self.total())
    }
}

/// `round(100 * (present + LATE_CREDIT_WEIGHT * late) / total)`, or 0 when
/// there were no classes.
pub fn attendance_percentage(present: u32, late: u32, total: u32) -> u32 {
    if total == 0 {
        return 0;
    }

    let credited = present as f64 + late as f64 * LATE_CREDIT_WEIGHT;
    let percentage = (100.0 * credited / total as f64).round();
    percentage.clamp(0.0, 100.0) as u32
}

/// Per-subject and overall statistics for one student's events.
///
/// The overall percentage is computed over the flattened list, so a subject
/// with more sessions carries proportionally more weight.
pub fn aggregate(events: &[AttendanceEvent]) -> AttendanceSummary {
    let mut groups: HashMap<Uuid, (&AttendanceEvent, StatusCounts)> = HashMap::new();
    let mut overall = StatusCounts::default();

    for event in events {
        let entry = groups
            .entry(event.subject_id)
            .or_insert_with(|| (event, StatusCounts::default()));
        entry.1.record(event.status);
        overall.record(event.status);
    }

    let mut subjects: Vec<SubjectAttendanceSummary> = groups
        .into_iter()
        .map(|(subject_id, (first, counts))| SubjectAttendanceSummary {
            subject_id,
            subject_name: first.subject_name.clone(),
            subject_code: first.subject_code.clone(),
            total_classes: counts.total(),
            present_classes: counts.present,
            absent_classes: counts.absent,
            late_classes: counts.late,
            attendance_percentage: counts.percentage(),
        })
        .collect();

    subjects.sort_by(|a, b| {
        a.subject_code
            .cmp(&b.subject_code)
            .then_with(|| a.subject_name.cmp(&b.subject_name))
            .then_with(|| a.subject_id.cmp(&b.subject_id))
    });

    let overall = OverallAttendanceStats {
        total_classes: overall.total(),
        present_classes: overall.present,
        absent_classes: overall.absent,
        late_classes: overall.late,
        overall_percentage: overall.percentage(),
        subjects_count: subjects.len() as u32,
    };

    AttendanceSummary { subjects, overall }
}

impl SubjectAttendanceSummary {
    pub fn meets_eligibility_threshold(&self) -> bool {
        self.attendance_percentage >= ELIGIBILITY_THRESHOLD_PERCENT
    }
}

impl OverallAttendanceStats {
    pub fn meets_eligibility_threshold(&self) -> bool {
        self.overall_percentage >= ELIGIBILITY_THRESHOLD_PERCENT
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn sample_event(subject: (Uuid, &str), day: u32, status: AttendanceStatus) -> AttendanceEvent {
        AttendanceEvent {
            student_id: Uuid::nil(),
            roll_number: None,
            subject_id: subject.0,
            subject_name: format!("{} lecture", subject.1),
            subject_code: subject.1.to_string(),
            date: NaiveDate::from_ymd_opt(2025, 9, day).unwrap(),
            status,
            remarks: None,
            faculty_name: "Prof. Iyer".to_string(),
        }
    }

    #[test]
    fn late_counts_for_half_credit() {
        let math = (Uuid::new_v4(), "MA101");
        let events = vec![
            sample_event(math, 1, AttendanceStatus::Present),
            sample_event(math, 2, AttendanceStatus::Present),
            sample_event(math, 3, AttendanceStatus::Late),
            sample_event(math, 4, AttendanceStatus::Late),
        ];

        let summary = aggregate(&events);
        assert_eq!(summary.subjects.len(), 1);
        assert_eq!(summary.subjects[0].attendance_percentage, 75);
        assert_eq!(summary.subjects[0].late_classes, 2);
        assert_eq!(summary.overall.overall_percentage, 75);
    }

    #[test]
    fn empty_input_is_all_zero() {
        let summary = aggregate(&[]);
        assert!(summary.subjects.is_empty());
        assert_eq!(summary.overall, OverallAttendanceStats::default());
        assert_eq!(summary.overall.subjects_count, 0);
    }

    #[test]
    fn only_late_is_not_rounded_to_absent() {
        let physics = (Uuid::new_v4(), "PH101");
        let events = vec![
            sample_event(physics, 1, AttendanceStatus::Late),
            sample_event(physics, 2, AttendanceStatus::Late),
            sample_event(physics, 3, AttendanceStatus::Late),
        ];

        let summary = aggregate(&events);
        assert_eq!(summary.subjects[0].attendance_percentage, 50);
    }

    #[test]
    fn overall_weights_by_classes_not_subjects() {
        let heavy = (Uuid::new_v4(), "CS101");
        let light = (Uuid::new_v4(), "HS101");
        let mut events: Vec<AttendanceEvent> = (1..=9)
            .map(|day| sample_event(heavy, day, AttendanceStatus::Present))
            .collect();
        events.push(sample_event(light, 1, AttendanceStatus::Absent));

        let summary = aggregate(&events);
        // A mean of the subject percentages would give 50.
        assert_eq!(summary.overall.overall_percentage, 90);
        assert_eq!(summary.overall.subjects_count, 2);
        assert_eq!(summary.overall.total_classes, 10);
    }

    #[test]
    fn subjects_are_ordered_by_code() {
        let b = (Uuid::new_v4(), "EE210");
        let a = (Uuid::new_v4(), "CS101");
        let events = vec![
            sample_event(b, 1, AttendanceStatus::Absent),
            sample_event(a, 1, AttendanceStatus::Present),
        ];

        let summary = aggregate(&events);
        let codes: Vec<&str> = summary.subjects.iter().map(|s| s.subject_code.as_str()).collect();
        assert_eq!(codes, vec!["CS101", "EE210"]);
    }

    #[test]
    fn percentage_rounds_half_up() {
        assert_eq!(attendance_percentage(1, 0, 8), 13);
        assert_eq!(attendance_percentage(2, 0, 3), 67);
        assert_eq!(attendance_percentage(0, 0, 0), 0);
        assert_eq!(attendance_percentage(5, 0, 5), 100);
    }

    #[test]
    fn threshold_is_inclusive() {
        let math = (Uuid::new_v4(), "MA101");
        let events = vec![
            sample_event(math, 1, AttendanceStatus::Present),
            sample_event(math, 2, AttendanceStatus::Present),
            sample_event(math, 3, AttendanceStatus::Present),
            sample_event(math, 4, AttendanceStatus::Absent),
        ];

        let summary = aggregate(&events);
        assert!(summary.subjects[0].meets_eligibility_threshold());
        assert!(summary.overall.meets_eligibility_threshold());
    }
}
