use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use crate::models::common::{
    validate_names, ExperienceLevel, SalaryRange, ValidationError, WorkMode,
};

/// A validated job posting as consumed by the scoring engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobPosting {
    pub id: Uuid,
    pub employer_id: Uuid,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub required_skills: Vec<String>,
    #[serde(default)]
    pub preferred_skills: Vec<String>,
    pub experience_level: ExperienceLevel,
    #[serde(default)]
    pub location: Option<String>,
    pub work_mode: WorkMode,
    #[serde(default)]
    pub required_education: Vec<String>,
    #[serde(default)]
    pub preferred_education: Vec<String>,
    #[serde(default)]
    pub salary: Option<SalaryRange>,
    pub posted_at: DateTime<Utc>,
    #[serde(default)]
    pub applications_count: u32,
    /// Skills held by applicants who advanced on this or similar postings.
    #[serde(default)]
    pub successful_applicant_skills: Vec<String>,
}

impl JobPosting {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.title.trim().is_empty() {
            return Err(ValidationError::new("title", "cannot be empty"));
        }
        validate_names("required_skills", &self.required_skills)?;
        validate_names("preferred_skills", &self.preferred_skills)?;
        validate_names("required_education", &self.required_education)?;
        validate_names("preferred_education", &self.preferred_education)?;
        if self.work_mode != WorkMode::Remote
            && self.location.as_deref().map_or(true, |l| l.trim().is_empty())
        {
            return Err(ValidationError::new(
                "location",
                "required unless the posting is remote",
            ));
        }
        if let Some(salary) = &self.salary {
            salary.validate("salary")?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct JobPostingRow {
    pub id: Uuid,
    pub employer_id: Uuid,
    pub title: String,
    pub description: String,
    pub required_skills: Vec<String>,
    pub preferred_skills: Vec<String>,
    pub experience_level: String,
    pub location: Option<String>,
    pub work_mode: String,
    pub required_education: Vec<String>,
    pub preferred_education: Vec<String>,
    pub salary_min: Option<i64>,
    pub salary_max: Option<i64>,
    pub posted_at: DateTime<Utc>,
    pub applications_count: i32,
    pub successful_applicant_skills: Vec<String>,
}

impl TryFrom<JobPostingRow> for JobPosting {
    type Error = ValidationError;

    fn try_from(row: JobPostingRow) -> Result<Self, Self::Error> {
        let applications_count = u32::try_from(row.applications_count).map_err(|_| {
            ValidationError::new("applications_count", "cannot be negative")
        })?;

        let posting = JobPosting {
            id: row.id,
            employer_id: row.employer_id,
            title: row.title,
            description: row.description,
            required_skills: row.required_skills,
            preferred_skills: row.preferred_skills,
            experience_level: row.experience_level.parse()?,
            location: row.location,
            work_mode: row.work_mode.parse()?,
            required_education: row.required_education,
            preferred_education: row.preferred_education,
            salary: SalaryRange::from_columns(row.salary_min, row.salary_max),
            posted_at: row.posted_at,
            applications_count,
            successful_applicant_skills: row.successful_applicant_skills,
        };
        posting.validate()?;
        Ok(posting)
    }
}
