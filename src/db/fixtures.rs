/// Test fixtures shared by the manager tests

use crate::db;
use sqlx::SqlitePool;

pub struct CatalogIds {
    pub mit: String,
    pub stanford: String,
    pub berkeley: String,
    pub mit_cs_ms: String,
    pub mit_cs_phd: String,
    pub stanford_ee_ms: String,
    pub stanford_mba: String,
    pub berkeley_ds_ms: String,
    pub berkeley_cs_phd: String,
}

pub async fn user(pool: &SqlitePool, external_id: &str) -> String {
    let id = db::new_id();
    sqlx::query("INSERT INTO users (id, external_id, name, email, created_at) VALUES (?, ?, ?, ?, ?)")
        .bind(&id)
        .bind(external_id)
        .bind(format!("User {}", external_id))
        .bind(format!("{}@example.com", external_id))
        .bind(db::now_timestamp())
        .execute(pool)
        .await
        .unwrap();
    id
}

pub async fn university(
    pool: &SqlitePool,
    name: &str,
    city: &str,
    state: &str,
    ranking: Option<i64>,
) -> String {
    let id = db::new_id();
    sqlx::query(
        "INSERT INTO universities (id, name, city, state, country, ranking, website) VALUES (?, ?, ?, ?, 'USA', ?, ?)",
    )
    .bind(&id)
    .bind(name)
    .bind(city)
    .bind(state)
    .bind(ranking)
    .bind(format!("https://{}.edu", name.to_lowercase().replace(' ', "")))
    .execute(pool)
    .await
    .unwrap();
    id
}

pub async fn program(
    pool: &SqlitePool,
    university_id: &str,
    name: &str,
    degree: &str,
    minimum_gpa: Option<f64>,
    gre: bool,
    toefl: bool,
) -> String {
    let id = db::new_id();
    sqlx::query(
        r#"
        INSERT INTO programs (id, university_id, name, degree, department, minimum_gpa,
                              gre_required, toefl_required, recommendation_letters, fall_deadline)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, 3, '2025-12-15')
        "#,
    )
    .bind(&id)
    .bind(university_id)
    .bind(name)
    .bind(degree)
    .bind(format!("Department of {}", name))
    .bind(minimum_gpa)
    .bind(gre)
    .bind(toefl)
    .execute(pool)
    .await
    .unwrap();
    id
}

/// Three universities, six programs
pub async fn catalog(pool: &SqlitePool) -> CatalogIds {
    let mit = university(pool, "Massachusetts Institute of Technology", "Cambridge", "MA", Some(1)).await;
    let stanford = university(pool, "Stanford University", "Stanford", "CA", Some(3)).await;
    let berkeley = university(pool, "University of California Berkeley", "Berkeley", "CA", Some(12)).await;

    let mit_cs_ms = program(pool, &mit, "Computer Science", "MS", Some(3.5), true, true).await;
    let mit_cs_phd = program(pool, &mit, "Computer Science", "PhD", Some(3.7), true, true).await;
    let stanford_ee_ms = program(pool, &stanford, "Electrical Engineering", "MS", Some(3.5), false, true).await;
    let stanford_mba = program(pool, &stanford, "Business Administration", "MBA", None, false, false).await;
    let berkeley_ds_ms = program(pool, &berkeley, "Data Science", "MS", Some(3.0), false, false).await;
    let berkeley_cs_phd = program(pool, &berkeley, "Computer Science", "PhD", Some(3.8), true, true).await;

    CatalogIds {
        mit,
        stanford,
        berkeley,
        mit_cs_ms,
        mit_cs_phd,
        stanford_ee_ms,
        stanford_mba,
        berkeley_ds_ms,
        berkeley_cs_phd,
    }
}
