/// Program search and facet listing
///
/// Search narrows two independent queries. Text hits restrict programs and
/// universities separately (a side without hits stays unrestricted), then the
/// university filters run, and the program filters only apply to programs of
/// the surviving universities.
use crate::{
    catalog::{CatalogManager, University},
    error::AppResult,
};
use serde::{Deserialize, Serialize};
use sqlx::{QueryBuilder, Row, Sqlite, SqlitePool};
use std::collections::{HashMap, HashSet};

/// Filter value meaning "no filter"
const ALL: &str = "all";

/// Degree code to display label
const DEGREE_LABELS: &[(&str, &str)] = &[
    ("MS", "Master of Science (MS)"),
    ("MA", "Master of Arts (MA)"),
    ("PhD", "Doctor of Philosophy (PhD)"),
    ("MBA", "Master of Business Admin (MBA)"),
    ("MFA", "Master of Fine Arts (MFA)"),
    ("MEng", "Master of Engineering (MEng)"),
    ("MCS", "Master of Computer Science (MCS)"),
    ("MSE", "Master of Science in Engineering (MSE)"),
    ("MFin", "Master in Finance (MFin)"),
];

#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LocationFilter {
    pub city: String,
    pub state: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchFilters {
    /// Degree code, or "all"
    pub program_type: Option<String>,
    pub location: Option<LocationFilter>,
    /// "top_N", or "all"
    pub ranking: Option<String>,
    /// Only programs that do not require the GRE
    pub gre: Option<bool>,
    /// Only programs that do not require the TOEFL
    pub toefl: Option<bool>,
    #[serde(rename = "minimumGPA")]
    pub minimum_gpa: Option<f64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SearchRequest {
    pub search: Option<String>,
    #[serde(default)]
    pub filters: SearchFilters,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DegreeType {
    pub value: String,
    pub label: String,
}

pub fn degree_label(code: &str) -> String {
    DEGREE_LABELS
        .iter()
        .find(|(value, _)| *value == code)
        .map(|(_, label)| label.to_string())
        .unwrap_or_else(|| code.to_string())
}

/// `"top_N"` -> `Some(N)`
fn parse_ranking(ranking: &str) -> Option<i64> {
    let (operator, value) = ranking.split_once('_')?;
    if operator != "top" {
        return None;
    }
    value.parse().ok()
}

/// `LIKE` patterns with the user's `%`, `_` and `\` taken literally
fn search_terms(query: &str) -> Vec<String> {
    query
        .split_whitespace()
        .map(|term| {
            let escaped = term
                .replace('\\', "\\\\")
                .replace('%', "\\%")
                .replace('_', "\\_");
            format!("%{}%", escaped)
        })
        .collect()
}

fn active(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.is_empty() && *v != ALL)
}

fn push_id_filter(query: &mut QueryBuilder<'_, Sqlite>, column: &str, ids: &[String]) {
    query.push(format!(" AND {} IN (", column));
    let mut separated = query.separated(", ");
    for id in ids {
        separated.push_bind(id.clone());
    }
    separated.push_unseparated(")");
}

/// Search service
#[derive(Clone)]
pub struct SearchService {
    db: SqlitePool,
    catalog: CatalogManager,
}

impl SearchService {
    pub fn new(db: SqlitePool, catalog: CatalogManager) -> Self {
        Self { db, catalog }
    }

    /// Ids of matching programs in catalog order
    pub async fn search_programs(&self, request: &SearchRequest) -> AppResult<Vec<String>> {
        let filters = &request.filters;
        let text = request.search.as_deref().map(str::trim).unwrap_or("");

        let (program_hits, university_hits) = if text.is_empty() {
            (Vec::new(), Vec::new())
        } else {
            let terms = search_terms(text);
            (
                self.text_hits("programs", &terms).await?,
                self.text_hits("universities", &terms).await?,
            )
        };

        let universities = self.filter_universities(&university_hits, filters).await?;
        if universities.is_empty() {
            return Ok(Vec::new());
        }

        let programs = self
            .filter_programs(&program_hits, &universities, filters)
            .await?;

        tracing::debug!(
            "Search {:?} matched {} universities, {} programs",
            text,
            universities.len(),
            programs.len()
        );

        Ok(programs)
    }

    /// Ids whose name contains any of the terms
    async fn text_hits(&self, table: &str, terms: &[String]) -> AppResult<Vec<String>> {
        let mut query = QueryBuilder::<Sqlite>::new(format!("SELECT id FROM {} WHERE ", table));
        let mut separated = query.separated(" OR ");
        for term in terms {
            separated.push("name LIKE ");
            separated.push_bind_unseparated(term.clone());
            separated.push_unseparated(" ESCAPE '\\'");
        }

        let rows = query.build().fetch_all(&self.db).await?;
        Ok(rows.iter().map(|row| row.get("id")).collect())
    }

    async fn filter_universities(
        &self,
        hits: &[String],
        filters: &SearchFilters,
    ) -> AppResult<Vec<String>> {
        let mut query = QueryBuilder::<Sqlite>::new("SELECT id FROM universities WHERE 1 = 1");

        if !hits.is_empty() {
            push_id_filter(&mut query, "id", hits);
        }

        if let Some(top) = active(&filters.ranking).and_then(parse_ranking) {
            query.push(" AND ranking <= ").push_bind(top);
        }

        if let Some(location) = filters.location.as_ref().filter(|l| l.state != ALL) {
            if !location.city.is_empty() && location.city != ALL {
                query.push(" AND city = ").push_bind(location.city.clone());
            }
            query.push(" AND state = ").push_bind(location.state.clone());
        }

        query.push(" ORDER BY rowid");
        let rows = query.build().fetch_all(&self.db).await?;
        Ok(rows.iter().map(|row| row.get("id")).collect())
    }

    async fn filter_programs(
        &self,
        hits: &[String],
        universities: &[String],
        filters: &SearchFilters,
    ) -> AppResult<Vec<String>> {
        let mut query = QueryBuilder::<Sqlite>::new("SELECT id FROM programs WHERE 1 = 1");
        push_id_filter(&mut query, "university_id", universities);

        if !hits.is_empty() {
            push_id_filter(&mut query, "id", hits);
        }
        if let Some(degree) = active(&filters.program_type) {
            query.push(" AND degree = ").push_bind(degree.to_string());
        }
        if filters.gre == Some(true) {
            query.push(" AND gre_required = 0");
        }
        if filters.toefl == Some(true) {
            query.push(" AND toefl_required = 0");
        }
        if let Some(minimum_gpa) = filters.minimum_gpa {
            query
                .push(" AND (minimum_gpa IS NULL OR minimum_gpa >= ")
                .push_bind(minimum_gpa)
                .push(")");
        }

        query.push(" ORDER BY rowid");
        let rows = query.build().fetch_all(&self.db).await?;
        Ok(rows.iter().map(|row| row.get("id")).collect())
    }

    /// Distinct parent universities of the given programs; `None` when there are none
    pub async fn universities_for_programs(
        &self,
        program_ids: &[String],
    ) -> AppResult<Option<Vec<University>>> {
        if program_ids.is_empty() {
            return Ok(None);
        }

        let university_ids: Vec<String> = self
            .catalog
            .programs_by_ids(program_ids)
            .await?
            .into_iter()
            .map(|p| p.university_id)
            .collect();
        if university_ids.is_empty() {
            return Ok(None);
        }

        Ok(Some(self.catalog.universities_by_ids(&university_ids).await?))
    }

    /// Distinct (city, state) pairs in catalog order
    pub async fn unique_locations(&self) -> AppResult<Vec<LocationFilter>> {
        let mut seen = HashSet::new();
        Ok(self
            .catalog
            .all_universities()
            .await?
            .into_iter()
            .map(|u| LocationFilter {
                city: u.location.city,
                state: u.location.state,
            })
            .filter(|location| seen.insert(location.clone()))
            .collect())
    }

    /// Degree codes with labels, most common first
    pub async fn unique_degree_types(&self) -> AppResult<Vec<DegreeType>> {
        let mut order: Vec<String> = Vec::new();
        let mut counts: HashMap<String, usize> = HashMap::new();

        for program in self.catalog.all_programs().await? {
            if program.degree.is_empty() {
                continue;
            }
            let count = counts.entry(program.degree.clone()).or_insert(0);
            if *count == 0 {
                order.push(program.degree);
            }
            *count += 1;
        }

        // Stable sort keeps first-seen order among equal counts
        order.sort_by(|a, b| counts[b].cmp(&counts[a]));

        Ok(order
            .into_iter()
            .map(|value| DegreeType {
                label: degree_label(&value),
                value,
            })
            .collect())
    }
}
