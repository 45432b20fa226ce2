/// Application status derivation from a document set
///
/// Pure functions; the manager applies their results.

use super::DocumentStatus;
use crate::applications::ApplicationStatus;

/// How a document set aggregates into an application status
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Aggregate {
    /// No documents at all
    Empty,
    /// Every document is not started
    AllNotStarted,
    /// At least one document is being drafted or reviewed
    Active,
    /// Only complete and not started documents remain
    Settled,
}

pub fn aggregate(statuses: &[DocumentStatus]) -> Aggregate {
    if statuses.is_empty() {
        Aggregate::Empty
    } else if statuses.iter().all(|s| *s == DocumentStatus::NotStarted) {
        Aggregate::AllNotStarted
    } else if statuses
        .iter()
        .any(|s| matches!(s, DocumentStatus::Draft | DocumentStatus::InReview))
    {
        Aggregate::Active
    } else {
        Aggregate::Settled
    }
}

/// Target status for an application, or `None` when it should stay as is.
///
/// Terminal applications never move. A settled document set (all complete,
/// or complete mixed with not started) also leaves the status untouched.
pub fn derive_status(
    current: ApplicationStatus,
    statuses: &[DocumentStatus],
) -> Option<ApplicationStatus> {
    if current.is_terminal() {
        return None;
    }

    let target = match aggregate(statuses) {
        Aggregate::Empty => ApplicationStatus::NotStarted,
        Aggregate::AllNotStarted => ApplicationStatus::Draft,
        Aggregate::Active => ApplicationStatus::InProgress,
        Aggregate::Settled => return None,
    };

    (target != current).then_some(target)
}

#[cfg(test)]
mod tests {
    use super::*;
    use DocumentStatus::*;

    const TERMINAL: [ApplicationStatus; 4] = [
        ApplicationStatus::Submitted,
        ApplicationStatus::Accepted,
        ApplicationStatus::Rejected,
        ApplicationStatus::Deleted,
    ];

    #[test]
    fn test_progress_mapping() {
        assert_eq!(NotStarted.progress(), 0);
        assert_eq!(Draft.progress(), 33);
        assert_eq!(InReview.progress(), 66);
        assert_eq!(Complete.progress(), 100);
        assert!(DocumentStatus::from_str("archived").is_err());
        assert!(DocumentStatus::from_str("").is_err());
    }

    #[test]
    fn test_terminal_statuses_never_change() {
        let sets: [&[DocumentStatus]; 4] =
            [&[], &[NotStarted, NotStarted], &[Draft, Complete], &[Complete]];
        for current in TERMINAL {
            for set in sets {
                assert_eq!(derive_status(current, set), None, "{:?}", current);
            }
        }
    }

    #[test]
    fn test_no_documents_is_not_started() {
        assert_eq!(
            derive_status(ApplicationStatus::Draft, &[]),
            Some(ApplicationStatus::NotStarted)
        );
        assert_eq!(derive_status(ApplicationStatus::NotStarted, &[]), None);
    }

    #[test]
    fn test_all_not_started_is_draft() {
        assert_eq!(
            derive_status(ApplicationStatus::InProgress, &[NotStarted, NotStarted, NotStarted]),
            Some(ApplicationStatus::Draft)
        );
        assert_eq!(derive_status(ApplicationStatus::Draft, &[NotStarted]), None);
    }

    #[test]
    fn test_any_active_document_is_in_progress() {
        for active in [Draft, InReview] {
            assert_eq!(
                derive_status(ApplicationStatus::Draft, &[NotStarted, active, Complete]),
                Some(ApplicationStatus::InProgress)
            );
        }
    }

    #[test]
    fn test_settled_documents_leave_status_unchanged() {
        assert_eq!(aggregate(&[Complete, NotStarted]), Aggregate::Settled);
        assert_eq!(aggregate(&[Complete, Complete]), Aggregate::Settled);
        assert_eq!(derive_status(ApplicationStatus::Draft, &[Complete, NotStarted]), None);
        assert_eq!(derive_status(ApplicationStatus::InProgress, &[Complete, Complete]), None);
    }
}
