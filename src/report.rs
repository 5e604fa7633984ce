use std::fmt::Write;

use chrono::NaiveDate;

use crate::aggregate::{aggregate, ELIGIBILITY_THRESHOLD_PERCENT};
use crate::filter::{AttendanceFilter, MonthFilter, SubjectFilter};
use crate::models::{AttendanceEvent, AttendanceSummary, Subject};

const MONTH_NAMES: [&str; 12] = [
    "January", "February", "March", "April", "May", "June", "July", "August", "September",
    "October", "November", "December",
];

pub fn describe_filter(filter: &AttendanceFilter, subject_label: Option<&str>) -> String {
    let subject = match (filter.subject, subject_label) {
        (SubjectFilter::All, _) => "all subjects".to_string(),
        (SubjectFilter::Only(_), Some(label)) => label.to_string(),
        (SubjectFilter::Only(id), None) => format!("subject {id}"),
    };
    let month = match filter.month {
        MonthFilter::All => "all months".to_string(),
        MonthFilter::Month(m) => MONTH_NAMES
            .get(m as usize)
            .map(|name| name.to_string())
            .unwrap_or_else(|| format!("month {m}")),
    };
    format!("{subject}, {month}")
}

pub fn summary_lines(summary: &AttendanceSummary) -> String {
    let mut output = String::new();
    let overall = &summary.overall;

    let _ = writeln!(
        output,
        "Overall: {}% across {} classes in {} subjects ({} present, {} late, {} absent)",
        overall.overall_percentage,
        overall.total_classes,
        overall.subjects_count,
        overall.present_classes,
        overall.late_classes,
        overall.absent_classes
    );

    for subject in &summary.subjects {
        let _ = writeln!(
            output,
            "- {} {}: {}% ({}/{} present, {} late, {} absent){}",
            subject.subject_code,
            subject.subject_name,
            subject.attendance_percentage,
            subject.present_classes,
            subject.total_classes,
            subject.late_classes,
            subject.absent_classes,
            if subject.meets_eligibility_threshold() {
                ""
            } else {
                " [below threshold]"
            }
        );
    }

    output
}

/// Markdown attendance report for one student. `events` are the already
/// filtered events the summary was computed from.
pub fn build_report(
    student_label: &str,
    filter_label: &str,
    summary: &AttendanceSummary,
    events: &[AttendanceEvent],
) -> String {
    let mut output = String::new();
    let overall = &summary.overall;

    let _ = writeln!(output, "# Attendance Report");
    let _ = writeln!(output, "Generated for {} ({})", student_label, filter_label);
    let _ = writeln!(output);
    let _ = writeln!(output, "## Overview");

    if overall.total_classes == 0 {
        let _ = writeln!(output, "No attendance recorded for this selection.");
        return output;
    }

    let _ = writeln!(
        output,
        "- Overall attendance: {}% over {} classes",
        overall.overall_percentage, overall.total_classes
    );
    let _ = writeln!(
        output,
        "- Present {}, late {}, absent {} across {} subjects",
        overall.present_classes,
        overall.late_classes,
        overall.absent_classes,
        overall.subjects_count
    );

    let _ = writeln!(output);
    let _ = writeln!(output, "## By Subject");
    let _ = writeln!(output, "| Code | Subject | Classes | Present | Late | Absent | % |");
    let _ = writeln!(output, "|------|---------|---------|---------|------|--------|---|");
    for subject in &summary.subjects {
        let _ = writeln!(
            output,
            "| {} | {} | {} | {} | {} | {} | {} |",
            subject.subject_code,
            subject.subject_name,
            subject.total_classes,
            subject.present_classes,
            subject.late_classes,
            subject.absent_classes,
            subject.attendance_percentage
        );
    }

    let below: Vec<_> = summary
        .subjects
        .iter()
        .filter(|s| !s.meets_eligibility_threshold())
        .collect();
    let _ = writeln!(output);
    let _ = writeln!(output, "## Below {}%", ELIGIBILITY_THRESHOLD_PERCENT);
    if below.is_empty() {
        let _ = writeln!(
            output,
            "Every subject is at or above {}%.",
            ELIGIBILITY_THRESHOLD_PERCENT
        );
    } else {
        for subject in below {
            let _ = writeln!(
                output,
                "- {} {} at {}%",
                subject.subject_code, subject.subject_name, subject.attendance_percentage
            );
        }
    }

    let mut noted: Vec<&AttendanceEvent> = events.iter().filter(|e| e.remarks.is_some()).collect();
    noted.sort_by(|a, b| b.date.cmp(&a.date));
    let _ = writeln!(output);
    let _ = writeln!(output, "## Recent Remarks");
    if noted.is_empty() {
        let _ = writeln!(output, "No remarks recorded.");
    } else {
        for event in noted.iter().take(5) {
            let _ = writeln!(
                output,
                "- {} {} ({}) on {}: {}",
                event.subject_code,
                event.subject_name,
                event.status,
                event.date,
                event.remarks.as_deref().unwrap_or_default()
            );
        }
    }

    output
}

/// Faculty view of one marked session.
pub fn session_sheet(subject: &Subject, date: NaiveDate, events: &[AttendanceEvent]) -> String {
    let mut output = String::new();
    let _ = writeln!(output, "{} {} on {}", subject.code, subject.name, date);

    if events.is_empty() {
        let _ = writeln!(output, "Attendance has not been marked for this session.");
        return output;
    }

    let overall = aggregate(events).overall;
    let _ = writeln!(
        output,
        "Marked by {}: {} present, {} late, {} absent ({}%)",
        events[0].faculty_name,
        overall.present_classes,
        overall.late_classes,
        overall.absent_classes,
        overall.overall_percentage
    );
    for event in events {
        let student = match &event.roll_number {
            Some(roll_number) => roll_number.clone(),
            None => event.student_id.to_string(),
        };
        match &event.remarks {
            Some(remarks) => {
                let _ = writeln!(output, "- {} {} ({})", student, event.status, remarks);
            }
            None => {
                let _ = writeln!(output, "- {} {}", student, event.status);
            }
        }
    }

    output
}
