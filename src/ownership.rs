/// Ownership verification for applications and their documents
///
/// Every lookup that is scoped to a user produces an `Access` value first and
/// converts it to an error in exactly one place, so "does not exist" and
/// "exists but belongs to someone else" are reported the same way on every
/// path.
use crate::{
    applications::{self, Application},
    documents::{self, ApplicationDocument},
    error::{AppError, AppResult},
};
use sqlx::SqlitePool;

/// Outcome of an ownership lookup
#[derive(Debug, Clone, PartialEq)]
pub enum Access<T> {
    Granted(T),
    NotFound,
    Forbidden,
}

impl<T> Access<T> {
    /// Classify an optional record against the caller
    pub fn check(record: Option<T>, user_id: &str, owner: impl FnOnce(&T) -> &str) -> Self {
        match record {
            None => Access::NotFound,
            Some(record) if owner(&record) == user_id => Access::Granted(record),
            Some(_) => Access::Forbidden,
        }
    }

    /// NotFound -> 404, Forbidden -> 403
    pub fn into_result(self, entity: &str) -> AppResult<T> {
        match self {
            Access::Granted(record) => Ok(record),
            Access::NotFound => Err(AppError::NotFound(format!("{} not found", entity))),
            Access::Forbidden => Err(AppError::Authorization(format!(
                "{} does not belong to the user",
                entity
            ))),
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Access<U> {
        match self {
            Access::Granted(record) => Access::Granted(f(record)),
            Access::NotFound => Access::NotFound,
            Access::Forbidden => Access::Forbidden,
        }
    }
}

pub async fn application_access(
    db: &SqlitePool,
    application_id: &str,
    user_id: &str,
) -> AppResult<Access<Application>> {
    let application = applications::fetch_application(db, application_id).await?;
    Ok(Access::check(application, user_id, |a| a.user_id.as_str()))
}

/// Load an application the caller owns
pub async fn require_ownership(
    db: &SqlitePool,
    application_id: &str,
    user_id: &str,
) -> AppResult<Application> {
    application_access(db, application_id, user_id)
        .await?
        .into_result("Application")
}

/// Load a document through its parent application
pub async fn require_document_ownership(
    db: &SqlitePool,
    document_id: &str,
    user_id: &str,
) -> AppResult<(ApplicationDocument, Application)> {
    let document = documents::fetch_document(db, document_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Document not found".to_string()))?;
    let application = require_ownership(db, &document.application_id, user_id).await?;
    Ok((document, application))
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Record {
        owner: String,
    }

    fn record(owner: &str) -> Option<Record> {
        Some(Record {
            owner: owner.to_string(),
        })
    }

    #[test]
    fn test_access_classification() {
        assert!(matches!(
            Access::check(record("alice"), "alice", |r| r.owner.as_str()),
            Access::Granted(_)
        ));
        assert!(matches!(
            Access::check(record("alice"), "bob", |r| r.owner.as_str()),
            Access::Forbidden
        ));
        assert!(matches!(
            Access::<Record>::check(None, "bob", |r| r.owner.as_str()),
            Access::NotFound
        ));
    }

    #[test]
    fn test_access_into_result() {
        assert!(matches!(
            Access::<()>::NotFound.into_result("Application"),
            Err(AppError::NotFound(msg)) if msg == "Application not found"
        ));
        assert!(matches!(
            Access::<()>::Forbidden.into_result("Application"),
            Err(AppError::Authorization(_))
        ));
        assert_eq!(Access::Granted(2).map(|n| n * 2).into_result("x").unwrap(), 4);
    }
}
