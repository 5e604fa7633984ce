use chrono::NaiveDate;
use uuid::Uuid;

/// Errors raised while recording, loading or importing attendance.
///
/// Aggregation and filtering never produce these; they are total over any
/// well-formed event list.
#[derive(Debug, thiserror::Error)]
pub enum AttendanceError {
    #[error("attendance for subject {subject_id} on {date} is already marked")]
    AlreadyMarked { subject_id: Uuid, date: NaiveDate },

    #[error("attendance batch has no students")]
    EmptyBatch,

    #[error("student {0} appears more than once in the batch")]
    DuplicateStudent(Uuid),

    #[error("unknown attendance status '{0}' (expected present, absent or late)")]
    InvalidStatus(String),

    #[error("month must be \"all\" or between 0 and 11, got '{0}'")]
    InvalidMonth(String),

    #[error("subject filter must be \"all\" or a subject id, got '{0}'")]
    InvalidSubjectFilter(String),

    #[error("no student with roll number '{0}'")]
    UnknownStudent(String),

    #[error("no subject with code '{0}'")]
    UnknownSubject(String),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl AttendanceError {
    /// Rejections the caller caused; retrying the same request fails again.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            Self::AlreadyMarked { .. }
                | Self::EmptyBatch
                | Self::DuplicateStudent(_)
                | Self::InvalidStatus(_)
                | Self::InvalidMonth(_)
                | Self::InvalidSubjectFilter(_)
                | Self::UnknownStudent(_)
                | Self::UnknownSubject(_)
        )
    }

    /// Failures talking to the store. Nothing retries these automatically.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Database(_))
    }
}

pub type Result<T> = std::result::Result<T, AttendanceError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn already_marked_is_a_validation_error() {
        let err = AttendanceError::AlreadyMarked {
            subject_id: Uuid::nil(),
            date: NaiveDate::from_ymd_opt(2025, 3, 14).unwrap(),
        };
        assert!(err.is_validation());
        assert!(!err.is_transient());
        assert!(err.to_string().contains("2025-03-14"));
    }

    #[test]
    fn database_errors_are_transient() {
        let err = AttendanceError::from(sqlx::Error::PoolTimedOut);
        assert!(err.is_transient());
        assert!(!err.is_validation());
    }
}
