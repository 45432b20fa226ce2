/// University and program reference data
///
/// Seeded out of band and read-only from the service's point of view.
use crate::error::{AppError, AppResult};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, QueryBuilder, Sqlite, SqlitePool};
use std::collections::{HashMap, HashSet};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub city: String,
    pub state: String,
    pub country: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct University {
    pub id: String,
    pub name: String,
    pub location: Location,
    pub ranking: Option<i64>,
    pub website: String,
    pub image_url: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgramRequirements {
    #[serde(rename = "minimumGPA")]
    pub minimum_gpa: Option<f64>,
    pub gre: Option<bool>,
    pub toefl: Option<bool>,
    pub recommendation_letters: Option<i64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProgramDeadlines {
    pub fall: Option<String>,
    pub spring: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Program {
    pub id: String,
    pub university_id: String,
    pub name: String,
    pub degree: String,
    pub department: String,
    pub requirements: ProgramRequirements,
    pub deadlines: ProgramDeadlines,
    pub website: Option<String>,
}

#[derive(FromRow)]
struct UniversityRow {
    id: String,
    name: String,
    city: String,
    state: String,
    country: String,
    ranking: Option<i64>,
    website: String,
    image_url: Option<String>,
}

impl From<UniversityRow> for University {
    fn from(row: UniversityRow) -> Self {
        Self {
            id: row.id,
            name: row.name,
            location: Location {
                city: row.city,
                state: row.state,
                country: row.country,
            },
            ranking: row.ranking,
            website: row.website,
            image_url: row.image_url,
        }
    }
}

#[derive(FromRow)]
struct ProgramRow {
    id: String,
    university_id: String,
    name: String,
    degree: String,
    department: String,
    minimum_gpa: Option<f64>,
    gre_required: Option<bool>,
    toefl_required: Option<bool>,
    recommendation_letters: Option<i64>,
    fall_deadline: Option<String>,
    spring_deadline: Option<String>,
    website: Option<String>,
}

impl From<ProgramRow> for Program {
    fn from(row: ProgramRow) -> Self {
        Self {
            id: row.id,
            university_id: row.university_id,
            name: row.name,
            degree: row.degree,
            department: row.department,
            requirements: ProgramRequirements {
                minimum_gpa: row.minimum_gpa,
                gre: row.gre_required,
                toefl: row.toefl_required,
                recommendation_letters: row.recommendation_letters,
            },
            deadlines: ProgramDeadlines {
                fall: row.fall_deadline,
                spring: row.spring_deadline,
            },
            website: row.website,
        }
    }
}

const UNIVERSITY_COLUMNS: &str =
    "SELECT id, name, city, state, country, ranking, website, image_url FROM universities";
const PROGRAM_COLUMNS: &str = "SELECT id, university_id, name, degree, department, minimum_gpa, gre_required, toefl_required, recommendation_letters, fall_deadline, spring_deadline, website FROM programs";

/// Catalog reader
#[derive(Clone)]
pub struct CatalogManager {
    db: SqlitePool,
}

impl CatalogManager {
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }

    pub async fn get_university(&self, university_id: &str) -> AppResult<Option<University>> {
        let row: Option<UniversityRow> =
            sqlx::query_as(&format!("{} WHERE id = ?", UNIVERSITY_COLUMNS))
                .bind(university_id)
                .fetch_optional(&self.db)
                .await?;
        Ok(row.map(University::from))
    }

    pub async fn get_program(&self, program_id: &str) -> AppResult<Option<Program>> {
        let row: Option<ProgramRow> = sqlx::query_as(&format!("{} WHERE id = ?", PROGRAM_COLUMNS))
            .bind(program_id)
            .fetch_optional(&self.db)
            .await?;
        Ok(row.map(Program::from))
    }

    pub async fn require_university(&self, university_id: &str) -> AppResult<University> {
        self.get_university(university_id)
            .await?
            .ok_or_else(|| AppError::NotFound("University not found".to_string()))
    }

    pub async fn require_program(&self, program_id: &str) -> AppResult<Program> {
        self.get_program(program_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Program not found".to_string()))
    }

    /// Both records must exist and the program must be offered by the university
    pub async fn validate_program_belongs_to_university(
        &self,
        university_id: &str,
        program_id: &str,
    ) -> AppResult<(University, Program)> {
        let university = self.require_university(university_id).await?;
        let program = self.require_program(program_id).await?;

        if program.university_id != university.id {
            return Err(AppError::ProgramMismatch);
        }

        Ok((university, program))
    }

    /// Distinct universities in order of first occurrence; unknown ids are skipped
    pub async fn universities_by_ids(&self, university_ids: &[String]) -> AppResult<Vec<University>> {
        let mut seen = HashSet::new();
        let ids: Vec<&String> = university_ids
            .iter()
            .filter(|id| seen.insert(id.as_str()))
            .collect();
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let mut query = QueryBuilder::<Sqlite>::new(UNIVERSITY_COLUMNS);
        query.push(" WHERE id IN (");
        let mut separated = query.separated(", ");
        for id in &ids {
            separated.push_bind(id.as_str());
        }
        separated.push_unseparated(")");

        let rows: Vec<UniversityRow> = query.build_query_as().fetch_all(&self.db).await?;
        let mut by_id: HashMap<String, University> = rows
            .into_iter()
            .map(|row| (row.id.clone(), University::from(row)))
            .collect();

        Ok(ids.into_iter().filter_map(|id| by_id.remove(id)).collect())
    }

    /// Programs in the requested order; unknown ids are skipped
    pub async fn programs_by_ids(&self, program_ids: &[String]) -> AppResult<Vec<Program>> {
        if program_ids.is_empty() {
            return Ok(Vec::new());
        }

        let mut query = QueryBuilder::<Sqlite>::new(PROGRAM_COLUMNS);
        query.push(" WHERE id IN (");
        let mut separated = query.separated(", ");
        for id in program_ids {
            separated.push_bind(id.as_str());
        }
        separated.push_unseparated(")");

        let rows: Vec<ProgramRow> = query.build_query_as().fetch_all(&self.db).await?;
        let by_id: HashMap<String, Program> = rows
            .into_iter()
            .map(|row| (row.id.clone(), Program::from(row)))
            .collect();

        Ok(program_ids
            .iter()
            .filter_map(|id| by_id.get(id).cloned())
            .collect())
    }

    pub async fn programs_by_university(&self, university_id: &str) -> AppResult<Vec<Program>> {
        let rows: Vec<ProgramRow> = sqlx::query_as(&format!(
            "{} WHERE university_id = ? ORDER BY rowid",
            PROGRAM_COLUMNS
        ))
        .bind(university_id)
        .fetch_all(&self.db)
        .await?;
        Ok(rows.into_iter().map(Program::from).collect())
    }

    pub async fn university_id_for_program(&self, program_id: &str) -> AppResult<Option<String>> {
        Ok(self.get_program(program_id).await?.map(|p| p.university_id))
    }

    pub async fn all_universities(&self) -> AppResult<Vec<University>> {
        let rows: Vec<UniversityRow> =
            sqlx::query_as(&format!("{} ORDER BY rowid", UNIVERSITY_COLUMNS))
                .fetch_all(&self.db)
                .await?;
        Ok(rows.into_iter().map(University::from).collect())
    }

    pub async fn all_programs(&self) -> AppResult<Vec<Program>> {
        let rows: Vec<ProgramRow> = sqlx::query_as(&format!("{} ORDER BY rowid", PROGRAM_COLUMNS))
            .fetch_all(&self.db)
            .await?;
        Ok(rows.into_iter().map(Program::from).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{fixtures, test_pool};

    #[tokio::test]
    async fn test_universities_by_ids_dedups_in_first_occurrence_order() {
        let pool = test_pool().await;
        let catalog_ids = fixtures::catalog(&pool).await;
        let catalog = CatalogManager::new(pool);

        let prog_a = catalog.require_program(&catalog_ids.mit_cs_ms).await.unwrap();
        let prog_b = catalog.require_program(&catalog_ids.mit_cs_phd).await.unwrap();
        assert_eq!(prog_a.university_id, prog_b.university_id);

        let universities = catalog
            .universities_by_ids(&[prog_a.university_id.clone(), prog_b.university_id.clone()])
            .await
            .unwrap();
        assert_eq!(universities.len(), 1);
        assert_eq!(universities[0].id, catalog_ids.mit);

        let universities = catalog
            .universities_by_ids(&[
                catalog_ids.stanford.clone(),
                catalog_ids.mit.clone(),
                catalog_ids.stanford.clone(),
                "missing".to_string(),
            ])
            .await
            .unwrap();
        let names: Vec<_> = universities.iter().map(|u| u.name.as_str()).collect();
        assert_eq!(names, vec!["Stanford University", "Massachusetts Institute of Technology"]);
    }

    #[tokio::test]
    async fn test_validate_program_belongs_to_university() {
        let pool = test_pool().await;
        let ids = fixtures::catalog(&pool).await;
        let catalog = CatalogManager::new(pool);

        assert!(catalog
            .validate_program_belongs_to_university(&ids.mit, &ids.mit_cs_ms)
            .await
            .is_ok());
        assert!(matches!(
            catalog
                .validate_program_belongs_to_university(&ids.stanford, &ids.mit_cs_ms)
                .await,
            Err(AppError::ProgramMismatch)
        ));
        assert!(matches!(
            catalog
                .validate_program_belongs_to_university("nope", &ids.mit_cs_ms)
                .await,
            Err(AppError::NotFound(_))
        ));
        assert!(matches!(
            catalog.validate_program_belongs_to_university(&ids.mit, "nope").await,
            Err(AppError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_program_mapping() {
        let pool = test_pool().await;
        let ids = fixtures::catalog(&pool).await;
        let catalog = CatalogManager::new(pool);

        let program = catalog.require_program(&ids.stanford_ee_ms).await.unwrap();
        assert_eq!(program.requirements.gre, Some(false));
        assert_eq!(program.requirements.minimum_gpa, Some(3.5));

        let programs = catalog
            .programs_by_ids(&[ids.stanford_ee_ms.clone(), ids.mit_cs_ms.clone()])
            .await
            .unwrap();
        assert_eq!(programs[0].id, ids.stanford_ee_ms);
        assert_eq!(programs[1].id, ids.mit_cs_ms);

        assert_eq!(catalog.programs_by_university(&ids.mit).await.unwrap().len(), 2);
    }
}
