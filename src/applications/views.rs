/// Read-side joins of applications with catalog names and document progress

use super::{applications_for_user, Application, ApplicationManager, ApplicationPriority, ApplicationStatus};
use crate::{
    catalog::{Program, University},
    documents::{documents_for_application, ApplicationDocument, DocumentStatus, DocumentType},
    error::AppResult,
    ownership,
};
use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use serde::Serialize;
use std::cmp::Ordering;

const UNKNOWN_UNIVERSITY: &str = "Unknown University";
const UNKNOWN_PROGRAM: &str = "Unknown Program";
const UNKNOWN_DEGREE: &str = "Unknown Degree";
const UNKNOWN_DEPARTMENT: &str = "Unknown Department";

/// Application joined with catalog names and its documents
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplicationDetails {
    #[serde(flatten)]
    pub application: Application,
    pub university: String,
    pub program: String,
    pub degree: String,
    pub department: String,
    pub documents: Vec<ApplicationDocument>,
}

/// List row with document completion
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplicationSummary {
    pub id: String,
    pub university: String,
    pub program: String,
    pub degree: String,
    pub status: ApplicationStatus,
    pub priority: ApplicationPriority,
    pub deadline: String,
    pub documents_complete: usize,
    pub total_documents: usize,
    pub progress: i64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UniversityDocument {
    pub document_id: String,
    #[serde(rename = "type")]
    pub document_type: DocumentType,
    pub status: DocumentStatus,
    pub progress: i64,
    pub count: u32,
    pub program: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UniversityProgram {
    pub application_id: String,
    pub name: String,
}

/// Documents of every application at one university
#[derive(Debug, Clone, Serialize)]
pub struct UniversityDocuments {
    pub name: String,
    pub documents: Vec<UniversityDocument>,
    pub programs: Vec<UniversityProgram>,
}

/// `round(100 * complete / total)`, 0 without documents
pub fn completion_progress(documents: &[ApplicationDocument]) -> (usize, i64) {
    let complete = documents
        .iter()
        .filter(|d| d.status == DocumentStatus::Complete)
        .count();
    if documents.is_empty() {
        return (0, 0);
    }
    let progress = ((complete as f64 / documents.len() as f64) * 100.0).round() as i64;
    (complete, progress)
}

/// Deadline strings are either dates or RFC 3339 timestamps
pub fn parse_deadline(deadline: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(deadline) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(date) = NaiveDate::parse_from_str(deadline, "%Y-%m-%d") {
        return date.and_hms_opt(0, 0, 0).map(|dt| Utc.from_utc_datetime(&dt));
    }
    NaiveDateTime::parse_from_str(deadline, "%Y-%m-%dT%H:%M:%S")
        .ok()
        .map(|dt| Utc.from_utc_datetime(&dt))
}

/// Earliest first; unparseable deadlines sort last
pub fn compare_deadlines(a: &str, b: &str) -> Ordering {
    match (parse_deadline(a), parse_deadline(b)) {
        (Some(a), Some(b)) => a.cmp(&b),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

fn program_label(program: &Program) -> String {
    format!("{} in {}", program.degree, program.name)
}

impl ApplicationManager {
    async fn catalog_entries(
        &self,
        application: &Application,
    ) -> AppResult<(Option<University>, Option<Program>)> {
        let university = self.catalog.get_university(&application.university_id).await?;
        let program = self.catalog.get_program(&application.program_id).await?;
        Ok((university, program))
    }

    async fn details_for(&self, application: Application) -> AppResult<ApplicationDetails> {
        let (university, program) = self.catalog_entries(&application).await?;
        let documents = documents_for_application(&self.db, &application.id).await?;

        Ok(ApplicationDetails {
            university: university
                .map(|u| u.name)
                .unwrap_or_else(|| UNKNOWN_UNIVERSITY.to_string()),
            program: program
                .as_ref()
                .map(|p| p.name.clone())
                .unwrap_or_else(|| UNKNOWN_PROGRAM.to_string()),
            degree: program
                .as_ref()
                .map(|p| p.degree.clone())
                .unwrap_or_else(|| UNKNOWN_DEGREE.to_string()),
            department: program
                .map(|p| p.department)
                .unwrap_or_else(|| UNKNOWN_DEPARTMENT.to_string()),
            application,
            documents,
        })
    }

    /// Detail view of one owned application
    pub async fn get_with_details(
        &self,
        user_id: &str,
        application_id: &str,
    ) -> AppResult<ApplicationDetails> {
        let application = ownership::require_ownership(&self.db, application_id, user_id).await?;
        self.details_for(application).await
    }

    pub async fn list_with_details(&self, user_id: &str) -> AppResult<Vec<ApplicationDetails>> {
        let mut details = Vec::new();
        for application in applications_for_user(&self.db, user_id).await? {
            details.push(self.details_for(application).await?);
        }
        Ok(details)
    }

    pub async fn list_with_progress(&self, user_id: &str) -> AppResult<Vec<ApplicationSummary>> {
        let mut summaries = Vec::new();
        for application in applications_for_user(&self.db, user_id).await? {
            let (university, program) = self.catalog_entries(&application).await?;
            let documents = documents_for_application(&self.db, &application.id).await?;
            let (documents_complete, progress) = completion_progress(&documents);

            summaries.push(ApplicationSummary {
                id: application.id,
                university: university
                    .map(|u| u.name)
                    .unwrap_or_else(|| UNKNOWN_UNIVERSITY.to_string()),
                program: program
                    .as_ref()
                    .map(|p| p.name.clone())
                    .unwrap_or_else(|| UNKNOWN_PROGRAM.to_string()),
                degree: program
                    .map(|p| p.degree)
                    .unwrap_or_else(|| UNKNOWN_DEGREE.to_string()),
                status: application.status,
                priority: application.priority,
                deadline: application.deadline,
                documents_complete,
                total_documents: documents.len(),
                progress,
            });
        }
        Ok(summaries)
    }

    /// Applications with details, earliest deadline first
    pub async fn timeline(&self, user_id: &str) -> AppResult<Vec<ApplicationDetails>> {
        let mut details = self.list_with_details(user_id).await?;
        details.sort_by(|a, b| compare_deadlines(&a.application.deadline, &b.application.deadline));
        Ok(details)
    }

    /// Documents grouped by university name, in order of first application
    pub async fn documents_by_university(&self, user_id: &str) -> AppResult<Vec<UniversityDocuments>> {
        let mut groups: Vec<UniversityDocuments> = Vec::new();

        for application in applications_for_user(&self.db, user_id).await? {
            let (Some(university), Some(program)) = self.catalog_entries(&application).await? else {
                continue;
            };
            let label = program_label(&program);
            let documents = documents_for_application(&self.db, &application.id).await?;

            let index = match groups.iter().position(|g| g.name == university.name) {
                Some(index) => index,
                None => {
                    groups.push(UniversityDocuments {
                        name: university.name.clone(),
                        documents: Vec::new(),
                        programs: Vec::new(),
                    });
                    groups.len() - 1
                }
            };
            let group = &mut groups[index];

            if !group.programs.iter().any(|p| p.application_id == application.id) {
                group.programs.push(UniversityProgram {
                    application_id: application.id.clone(),
                    name: label.clone(),
                });
            }

            group
                .documents
                .extend(documents.into_iter().map(|doc| UniversityDocument {
                    document_id: doc.id,
                    document_type: doc.document_type,
                    status: doc.status,
                    progress: doc.progress,
                    count: 1,
                    program: label.clone(),
                }));
        }

        Ok(groups)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        activity::ActivityLog,
        applications::NewApplication,
        catalog::CatalogManager,
        db::{fixtures, test_pool},
        documents::DocumentManager,
    };

    fn doc(status: DocumentStatus) -> ApplicationDocument {
        ApplicationDocument {
            id: "d".to_string(),
            application_id: "a".to_string(),
            user_id: "u".to_string(),
            document_type: DocumentType::Sop,
            title: "Statement of Purpose".to_string(),
            status,
            progress: status.progress(),
            content: String::new(),
            recommender_name: None,
            recommender_email: None,
            last_edited: Utc::now(),
        }
    }

    #[test]
    fn test_completion_progress() {
        assert_eq!(completion_progress(&[]), (0, 0));
        assert_eq!(
            completion_progress(&[
                doc(DocumentStatus::Complete),
                doc(DocumentStatus::Draft),
                doc(DocumentStatus::NotStarted),
            ]),
            (1, 33)
        );
        assert_eq!(
            completion_progress(&[doc(DocumentStatus::Complete), doc(DocumentStatus::Complete), doc(DocumentStatus::Draft)]),
            (2, 67)
        );
    }

    #[test]
    fn test_deadline_ordering() {
        assert_eq!(compare_deadlines("2025-01-15", "2025-12-01"), Ordering::Less);
        assert_eq!(
            compare_deadlines("2025-12-01T00:00:00Z", "2025-01-15"),
            Ordering::Greater
        );
        assert_eq!(compare_deadlines("rolling", "2025-01-15"), Ordering::Greater);
    }

    #[tokio::test]
    async fn test_views() {
        let pool = test_pool().await;
        let ids = fixtures::catalog(&pool).await;
        let user = fixtures::user(&pool, "ext-1").await;
        let activity = ActivityLog::new(pool.clone());
        let documents = DocumentManager::new(pool.clone(), activity.clone());
        let manager = ApplicationManager::new(
            pool.clone(),
            CatalogManager::new(pool.clone()),
            documents.clone(),
            activity,
        );

        let mut created = Vec::new();
        for (university, program, deadline) in [
            (&ids.mit, &ids.mit_cs_ms, "2025-12-15"),
            (&ids.stanford, &ids.stanford_ee_ms, "2025-11-01"),
            (&ids.mit, &ids.mit_cs_phd, "2026-01-05"),
        ] {
            let id = manager
                .create(
                    &user,
                    NewApplication {
                        university_id: university.clone(),
                        program_id: program.clone(),
                        deadline: deadline.to_string(),
                        priority: ApplicationPriority::Low,
                        notes: None,
                        documents: None,
                    },
                )
                .await
                .unwrap();
            created.push(id);
        }

        let first_doc = documents
            .list_for_application(&user, &created[0])
            .await
            .unwrap()
            .remove(0);
        documents
            .set_status(&user, &first_doc.id, DocumentStatus::Complete)
            .await
            .unwrap();

        let summaries = manager.list_with_progress(&user).await.unwrap();
        assert_eq!(summaries.len(), 3);
        assert_eq!(summaries[0].documents_complete, 1);
        assert_eq!(summaries[0].total_documents, 3);
        assert_eq!(summaries[0].progress, 33);
        assert_eq!(summaries[0].degree, "MS");

        let timeline = manager.timeline(&user).await.unwrap();
        let deadlines: Vec<_> = timeline.iter().map(|d| d.application.deadline.as_str()).collect();
        assert_eq!(deadlines, vec!["2025-11-01", "2025-12-15", "2026-01-05"]);

        let grouped = manager.documents_by_university(&user).await.unwrap();
        assert_eq!(grouped.len(), 2);
        assert_eq!(grouped[0].name, "Massachusetts Institute of Technology");
        assert_eq!(grouped[0].programs.len(), 2);
        assert_eq!(grouped[0].documents.len(), 6);
        assert_eq!(grouped[0].programs[0].name, "MS in Computer Science");

        let details = manager.get_with_details(&user, &created[1]).await.unwrap();
        assert_eq!(details.university, "Stanford University");
        assert_eq!(details.department, "Department of Electrical Engineering");
        assert_eq!(details.documents.len(), 3);
    }
}
