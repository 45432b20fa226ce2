/// Applicant profile and onboarding
///
/// The profile is filled in four steps. Personal info creates the row; the
/// other steps require it to exist. The current step is derived from which
/// field groups are populated, with test scores treated as optional.
use crate::{
    db,
    error::{AppError, AppResult},
};
use chrono::{DateTime, Utc};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use sqlx::{Row, SqlitePool};
use std::collections::BTreeMap;
use validator::Validate;

/// Onboarding steps in order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OnboardingStep {
    PersonalInfo,
    Education,
    TestScores,
    CareerGoals,
    Complete,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OnboardingStatus {
    pub is_complete: bool,
    pub current_step: OnboardingStep,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StepResult {
    pub current_step: OnboardingStep,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct GreScores {
    #[validate(range(min = 130.0, max = 170.0))]
    pub verbal: f64,
    #[validate(range(min = 130.0, max = 170.0))]
    pub quantitative: f64,
    #[validate(range(min = 0.0, max = 6.0))]
    pub analytical_writing: f64,
    pub test_date: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EnglishTestType {
    #[serde(rename = "TOEFL")]
    Toefl,
    #[serde(rename = "IELTS")]
    Ielts,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct EnglishTest {
    #[serde(rename = "type")]
    pub test_type: EnglishTestType,
    #[validate(range(min = 0.0, max = 120.0))]
    pub overall_score: f64,
    #[serde(default)]
    pub section_scores: BTreeMap<String, f64>,
    pub test_date: String,
}

/// Profile record
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub user_id: String,
    pub country_of_origin: String,
    pub date_of_birth: String,
    pub current_location: String,
    pub native_language: String,
    pub education_level: String,
    pub major: String,
    pub university: String,
    pub gpa: Option<f64>,
    pub gpa_scale: Option<f64>,
    pub graduation_date: String,
    pub research_experience: Option<String>,
    pub gre_scores: Option<GreScores>,
    pub english_test: Option<EnglishTest>,
    pub target_degree: String,
    pub intended_field: String,
    pub research_interests: Vec<String>,
    pub career_objectives: String,
    pub target_locations: Vec<String>,
    pub expected_start_date: String,
    pub budget_range: Option<String>,
    pub onboarding_completed: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl UserProfile {
    /// First field group that is still missing
    pub fn next_incomplete_step(&self) -> OnboardingStep {
        let blank = |s: &str| s.trim().is_empty();

        if blank(&self.country_of_origin)
            || blank(&self.date_of_birth)
            || blank(&self.current_location)
            || blank(&self.native_language)
        {
            return OnboardingStep::PersonalInfo;
        }

        if blank(&self.education_level)
            || blank(&self.major)
            || blank(&self.university)
            || self.gpa.map_or(true, |gpa| gpa <= 0.0)
            || blank(&self.graduation_date)
        {
            return OnboardingStep::Education;
        }

        if blank(&self.target_degree)
            || blank(&self.intended_field)
            || self.research_interests.is_empty()
            || blank(&self.career_objectives)
        {
            return OnboardingStep::CareerGoals;
        }

        OnboardingStep::Complete
    }
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct PersonalInfo {
    #[validate(length(min = 1, max = 100))]
    pub country_of_origin: String,
    #[validate(length(min = 1, max = 32))]
    pub date_of_birth: String,
    #[validate(length(min = 1, max = 200))]
    pub current_location: String,
    #[validate(length(min = 1, max = 100))]
    pub native_language: String,
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct Education {
    #[validate(length(min = 1, max = 100))]
    pub education_level: String,
    #[validate(length(min = 1, max = 200))]
    pub major: String,
    #[validate(length(min = 1, max = 200))]
    pub university: String,
    #[validate(range(min = 0.0, max = 100.0))]
    pub gpa: f64,
    #[validate(range(min = 1.0, max = 100.0))]
    pub gpa_scale: f64,
    #[validate(length(min = 1, max = 32))]
    pub graduation_date: String,
    #[validate(length(max = 5000))]
    pub research_experience: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct TestScores {
    #[validate(nested)]
    pub gre_scores: Option<GreScores>,
    #[validate(nested)]
    pub english_test: Option<EnglishTest>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CareerGoals {
    #[validate(length(min = 1, max = 100))]
    pub target_degree: String,
    #[validate(length(min = 1, max = 200))]
    pub intended_field: String,
    pub research_interests: Vec<String>,
    #[validate(length(min = 1, max = 5000))]
    pub career_objectives: String,
    pub target_locations: Vec<String>,
    #[validate(length(max = 32))]
    pub expected_start_date: String,
    pub budget_range: Option<String>,
}

fn validate(input: &impl Validate) -> AppResult<()> {
    input
        .validate()
        .map_err(|e| AppError::Validation(e.to_string()))
}

fn to_json<T: Serialize>(value: &T) -> AppResult<String> {
    serde_json::to_string(value)
        .map_err(|e| AppError::Internal(format!("Failed to encode profile field: {}", e)))
}

fn from_json<T: DeserializeOwned>(value: &str) -> AppResult<T> {
    serde_json::from_str(value)
        .map_err(|e| AppError::Internal(format!("Invalid profile field: {}", e)))
}

fn from_optional_json<T: DeserializeOwned>(value: Option<String>) -> AppResult<Option<T>> {
    value.as_deref().map(from_json).transpose()
}

/// Profile manager
#[derive(Clone)]
pub struct ProfileManager {
    db: SqlitePool,
}

impl ProfileManager {
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }

    pub async fn get(&self, user_id: &str) -> AppResult<Option<UserProfile>> {
        let row = sqlx::query("SELECT * FROM user_profiles WHERE user_id = ?")
            .bind(user_id)
            .fetch_optional(&self.db)
            .await?;

        row.map(|row| parse_profile(&row)).transpose()
    }

    pub async fn onboarding_status(&self, user_id: &str) -> AppResult<OnboardingStatus> {
        let current_step = match self.get(user_id).await? {
            Some(profile) => profile.next_incomplete_step(),
            None => OnboardingStep::PersonalInfo,
        };
        Ok(OnboardingStatus {
            is_complete: current_step == OnboardingStep::Complete,
            current_step,
        })
    }

    /// Create the profile or update its personal info
    pub async fn save_personal_info(&self, user_id: &str, info: &PersonalInfo) -> AppResult<StepResult> {
        validate(info)?;
        let now = db::now_timestamp();

        sqlx::query(
            r#"
            INSERT INTO user_profiles
                (user_id, country_of_origin, date_of_birth, current_location, native_language,
                 gpa_scale, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, 4.0, ?6, ?6)
            ON CONFLICT(user_id) DO UPDATE SET
                country_of_origin = excluded.country_of_origin,
                date_of_birth = excluded.date_of_birth,
                current_location = excluded.current_location,
                native_language = excluded.native_language,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(user_id)
        .bind(&info.country_of_origin)
        .bind(&info.date_of_birth)
        .bind(&info.current_location)
        .bind(&info.native_language)
        .bind(&now)
        .execute(&self.db)
        .await?;

        tracing::debug!("Saved personal info for {}", user_id);
        Ok(StepResult {
            current_step: OnboardingStep::Education,
        })
    }

    pub async fn save_education(&self, user_id: &str, education: &Education) -> AppResult<StepResult> {
        validate(education)?;
        if education.gpa > education.gpa_scale {
            return Err(AppError::Validation("GPA cannot exceed the GPA scale".to_string()));
        }

        let updated = sqlx::query(
            r#"
            UPDATE user_profiles
            SET education_level = ?, major = ?, university = ?, gpa = ?, gpa_scale = ?,
                graduation_date = ?, research_experience = ?, updated_at = ?
            WHERE user_id = ?
            "#,
        )
        .bind(&education.education_level)
        .bind(&education.major)
        .bind(&education.university)
        .bind(education.gpa)
        .bind(education.gpa_scale)
        .bind(&education.graduation_date)
        .bind(&education.research_experience)
        .bind(db::now_timestamp())
        .bind(user_id)
        .execute(&self.db)
        .await?;
        require_profile(updated.rows_affected())?;

        Ok(StepResult {
            current_step: OnboardingStep::TestScores,
        })
    }

    pub async fn save_test_scores(&self, user_id: &str, scores: &TestScores) -> AppResult<StepResult> {
        validate(scores)?;

        let gre = scores.gre_scores.as_ref().map(to_json).transpose()?;
        let english = scores.english_test.as_ref().map(to_json).transpose()?;

        let updated = sqlx::query(
            "UPDATE user_profiles SET gre_scores = ?, english_test = ?, updated_at = ? WHERE user_id = ?",
        )
        .bind(gre)
        .bind(english)
        .bind(db::now_timestamp())
        .bind(user_id)
        .execute(&self.db)
        .await?;
        require_profile(updated.rows_affected())?;

        Ok(StepResult {
            current_step: OnboardingStep::CareerGoals,
        })
    }

    /// Save career goals and mark onboarding complete
    pub async fn save_career_goals(&self, user_id: &str, goals: &CareerGoals) -> AppResult<StepResult> {
        validate(goals)?;

        let updated = sqlx::query(
            r#"
            UPDATE user_profiles
            SET target_degree = ?, intended_field = ?, research_interests = ?, career_objectives = ?,
                target_locations = ?, expected_start_date = ?, budget_range = ?,
                onboarding_completed = 1, updated_at = ?
            WHERE user_id = ?
            "#,
        )
        .bind(&goals.target_degree)
        .bind(&goals.intended_field)
        .bind(to_json(&goals.research_interests)?)
        .bind(&goals.career_objectives)
        .bind(to_json(&goals.target_locations)?)
        .bind(&goals.expected_start_date)
        .bind(&goals.budget_range)
        .bind(db::now_timestamp())
        .bind(user_id)
        .execute(&self.db)
        .await?;
        require_profile(updated.rows_affected())?;

        tracing::info!("Onboarding completed for {}", user_id);
        Ok(StepResult {
            current_step: OnboardingStep::Complete,
        })
    }
}

fn require_profile(rows_affected: u64) -> AppResult<()> {
    if rows_affected == 0 {
        return Err(AppError::Validation(
            "Personal information must be saved first".to_string(),
        ));
    }
    Ok(())
}

fn parse_profile(row: &sqlx::sqlite::SqliteRow) -> AppResult<UserProfile> {
    Ok(UserProfile {
        user_id: row.get("user_id"),
        country_of_origin: row.get("country_of_origin"),
        date_of_birth: row.get("date_of_birth"),
        current_location: row.get("current_location"),
        native_language: row.get("native_language"),
        education_level: row.get("education_level"),
        major: row.get("major"),
        university: row.get("university"),
        gpa: row.get("gpa"),
        gpa_scale: row.get("gpa_scale"),
        graduation_date: row.get("graduation_date"),
        research_experience: row.get("research_experience"),
        gre_scores: from_optional_json(row.get("gre_scores"))?,
        english_test: from_optional_json(row.get("english_test"))?,
        target_degree: row.get("target_degree"),
        intended_field: row.get("intended_field"),
        research_interests: from_json(&row.get::<String, _>("research_interests"))?,
        career_objectives: row.get("career_objectives"),
        target_locations: from_json(&row.get::<String, _>("target_locations"))?,
        expected_start_date: row.get("expected_start_date"),
        budget_range: row.get("budget_range"),
        onboarding_completed: row.get("onboarding_completed"),
        created_at: db::parse_timestamp(&row.get::<String, _>("created_at"))?,
        updated_at: db::parse_timestamp(&row.get::<String, _>("updated_at"))?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{fixtures, test_pool};

    fn personal() -> PersonalInfo {
        PersonalInfo {
            country_of_origin: "India".to_string(),
            date_of_birth: "1999-04-02".to_string(),
            current_location: "Pune".to_string(),
            native_language: "Marathi".to_string(),
        }
    }

    fn education() -> Education {
        Education {
            education_level: "Bachelor's".to_string(),
            major: "Computer Engineering".to_string(),
            university: "University of Pune".to_string(),
            gpa: 3.8,
            gpa_scale: 4.0,
            graduation_date: "2021-06-01".to_string(),
            research_experience: Some("Compiler optimizations".to_string()),
        }
    }

    #[tokio::test]
    async fn test_onboarding_flow() {
        let pool = test_pool().await;
        let user = fixtures::user(&pool, "ext-1").await;
        let profiles = ProfileManager::new(pool);

        let status = profiles.onboarding_status(&user).await.unwrap();
        assert_eq!(status.current_step, OnboardingStep::PersonalInfo);
        assert!(!status.is_complete);

        assert!(matches!(
            profiles.save_education(&user, &education()).await,
            Err(AppError::Validation(_))
        ));

        let step = profiles.save_personal_info(&user, &personal()).await.unwrap();
        assert_eq!(step.current_step, OnboardingStep::Education);
        assert_eq!(
            profiles.onboarding_status(&user).await.unwrap().current_step,
            OnboardingStep::Education
        );

        profiles.save_education(&user, &education()).await.unwrap();
        // Test scores are optional
        assert_eq!(
            profiles.onboarding_status(&user).await.unwrap().current_step,
            OnboardingStep::CareerGoals
        );

        let step = profiles
            .save_test_scores(
                &user,
                &TestScores {
                    gre_scores: Some(GreScores {
                        verbal: 160.0,
                        quantitative: 168.0,
                        analytical_writing: 4.5,
                        test_date: "2024-08-01".to_string(),
                    }),
                    english_test: None,
                },
            )
            .await
            .unwrap();
        assert_eq!(step.current_step, OnboardingStep::CareerGoals);

        profiles
            .save_career_goals(
                &user,
                &CareerGoals {
                    target_degree: "MS".to_string(),
                    intended_field: "Computer Science".to_string(),
                    research_interests: vec!["Programming languages".to_string()],
                    career_objectives: "Build compilers".to_string(),
                    target_locations: vec!["CA".to_string()],
                    expected_start_date: "2026-09".to_string(),
                    budget_range: None,
                },
            )
            .await
            .unwrap();

        let status = profiles.onboarding_status(&user).await.unwrap();
        assert!(status.is_complete);

        let profile = profiles.get(&user).await.unwrap().unwrap();
        assert!(profile.onboarding_completed);
        assert_eq!(profile.gre_scores.unwrap().quantitative, 168.0);
        assert_eq!(profile.research_interests, vec!["Programming languages"]);
    }

    #[tokio::test]
    async fn test_validation() {
        let pool = test_pool().await;
        let user = fixtures::user(&pool, "ext-1").await;
        let profiles = ProfileManager::new(pool);
        profiles.save_personal_info(&user, &personal()).await.unwrap();

        let mut bad = education();
        bad.gpa = 4.5;
        assert!(matches!(
            profiles.save_education(&user, &bad).await,
            Err(AppError::Validation(_))
        ));

        let mut blank = personal();
        blank.native_language = String::new();
        assert!(profiles.save_personal_info(&user, &blank).await.is_err());

        let scores = TestScores {
            gre_scores: Some(GreScores {
                verbal: 200.0,
                quantitative: 150.0,
                analytical_writing: 3.0,
                test_date: "2024-01-01".to_string(),
            }),
            english_test: None,
        };
        assert!(matches!(
            profiles.save_test_scores(&user, &scores).await,
            Err(AppError::Validation(_))
        ));
    }
}
