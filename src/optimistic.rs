use std::fmt::Display;

/// A change shown before the store confirms it.
///
/// `Pending` must be resolved with the store's answer: success keeps the
/// proposed value, failure restores the previous one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Submission<T> {
    Pending { previous: T, proposed: T },
    Confirmed(T),
    RolledBack { restored: T, reason: String },
}

impl<T> Submission<T> {
    pub fn begin(previous: T, proposed: T) -> Self {
        Self::Pending { previous, proposed }
    }

    /// Resolving an already settled submission is a no-op.
    pub fn resolve<R, E: Display>(self, result: &Result<R, E>) -> Self {
        match self {
            Self::Pending { previous, proposed } => match result {
                Ok(_) => Self::Confirmed(proposed),
                Err(err) => Self::RolledBack {
                    restored: previous,
                    reason: err.to_string(),
                },
            },
            settled => settled,
        }
    }

    /// The value to display right now.
    pub fn current(&self) -> &T {
        match self {
            Self::Pending { proposed, .. } => proposed,
            Self::Confirmed(value) => value,
            Self::RolledBack { restored, .. } => restored,
        }
    }

    pub fn is_pending(&self) -> bool {
        matches!(self, Self::Pending { .. })
    }

    pub fn into_current(self) -> T {
        match self {
            Self::Pending { proposed, .. } => proposed,
            Self::Confirmed(value) => value,
            Self::RolledBack { restored, .. } => restored,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pending_shows_the_proposal() {
        let submission = Submission::begin(vec!["chess"], vec!["chess", "robotics"]);
        assert!(submission.is_pending());
        assert_eq!(submission.current(), &vec!["chess", "robotics"]);
    }

    #[test]
    fn success_confirms_the_proposal() {
        let submission = Submission::begin(1, 2).resolve(&Ok::<(), String>(()));
        assert_eq!(submission, Submission::Confirmed(2));
        assert_eq!(submission.into_current(), 2);
    }

    #[test]
    fn failure_restores_the_previous_value() {
        let submission = Submission::begin(1, 2).resolve(&Err::<(), _>("connection reset"));
        assert_eq!(
            submission,
            Submission::RolledBack {
                restored: 1,
                reason: "connection reset".to_string()
            }
        );
        assert_eq!(*submission.current(), 1);
    }

    #[test]
    fn settled_submissions_ignore_later_results() {
        let confirmed = Submission::begin(1, 2).resolve(&Ok::<(), String>(()));
        let again = confirmed.resolve(&Err::<(), _>("late failure"));
        assert_eq!(again, Submission::Confirmed(2));
    }
}
