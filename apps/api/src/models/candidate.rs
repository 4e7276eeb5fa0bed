use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use sqlx::FromRow;
use uuid::Uuid;

use crate::models::common::{
    validate_names, ExperienceLevel, SalaryRange, ValidationError, WorkMode,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Proficiency {
    Beginner,
    Intermediate,
    Advanced,
    Expert,
}

impl Proficiency {
    /// Normalized proficiency used as the skills bonus multiplier.
    pub fn weight(self) -> f64 {
        match self {
            Proficiency::Beginner => 0.25,
            Proficiency::Intermediate => 0.5,
            Proficiency::Advanced => 0.75,
            Proficiency::Expert => 1.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CandidateSkill {
    pub name: String,
    #[serde(default)]
    pub proficiency: Option<Proficiency>,
}

/// Highest-level academic credential recognised in a degree string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DegreeLevel {
    Other,
    Associate,
    Bachelor,
    Master,
    Phd,
}

impl DegreeLevel {
    /// Classifies a free-text degree ("MSc Computer Science", "B.A.", "Doctorate").
    pub fn detect(degree: &str) -> Self {
        let lower = degree.to_lowercase();
        // Leading token with dots stripped: "B.S." -> "bs", "MSc" -> "msc".
        let abbrev: String = lower
            .split_whitespace()
            .next()
            .unwrap_or("")
            .chars()
            .filter(|c| c.is_alphanumeric())
            .collect();

        if lower.contains("doctor") || matches!(abbrev.as_str(), "phd" | "dphil" | "edd") {
            DegreeLevel::Phd
        } else if lower.contains("master")
            || matches!(abbrev.as_str(), "ms" | "msc" | "ma" | "mba" | "meng" | "mfa")
        {
            DegreeLevel::Master
        } else if lower.contains("bachelor")
            || matches!(abbrev.as_str(), "bs" | "bsc" | "ba" | "bba" | "beng" | "bfa")
        {
            DegreeLevel::Bachelor
        } else if lower.contains("associate") || matches!(abbrev.as_str(), "aa" | "as" | "aas") {
            DegreeLevel::Associate
        } else {
            DegreeLevel::Other
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EducationRecord {
    pub degree: String,
    #[serde(default)]
    pub field: Option<String>,
    #[serde(default)]
    pub institution: Option<String>,
}

impl EducationRecord {
    pub fn level(&self) -> DegreeLevel {
        DegreeLevel::detect(&self.degree)
    }
}

/// A validated candidate profile as consumed by the scoring engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CandidateProfile {
    pub id: Uuid,
    pub full_name: String,
    #[serde(default)]
    pub headline: Option<String>,
    #[serde(default)]
    pub summary: Option<String>,
    #[serde(default)]
    pub skills: Vec<CandidateSkill>,
    pub experience_level: ExperienceLevel,
    #[serde(default)]
    pub years_of_experience: Option<f64>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub open_to_remote: bool,
    #[serde(default)]
    pub willing_to_relocate: bool,
    #[serde(default)]
    pub education: Vec<EducationRecord>,
    #[serde(default = "default_true")]
    pub is_active: bool,
    #[serde(default)]
    pub last_login_at: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub desired_salary: Option<SalaryRange>,
    #[serde(default)]
    pub preferred_work_modes: Vec<WorkMode>,
}

fn default_true() -> bool {
    true
}

impl CandidateProfile {
    /// Checks the record at the system boundary before it reaches scoring.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.full_name.trim().is_empty() {
            return Err(ValidationError::new("full_name", "cannot be empty"));
        }
        let names: Vec<String> = self.skills.iter().map(|s| s.name.clone()).collect();
        validate_names("skills", &names)?;
        if let Some(years) = self.years_of_experience {
            if !years.is_finite() || !(0.0..=80.0).contains(&years) {
                return Err(ValidationError::new(
                    "years_of_experience",
                    format!("{years} is out of range"),
                ));
            }
        }
        if self.education.iter().any(|e| e.degree.trim().is_empty()) {
            return Err(ValidationError::new("education", "degree cannot be blank"));
        }
        if let Some(salary) = &self.desired_salary {
            salary.validate("desired_salary")?;
        }
        Ok(())
    }

    pub fn highest_degree(&self) -> Option<DegreeLevel> {
        self.education.iter().map(EducationRecord::level).max()
    }
}

/// Storage shape of a candidate; converted into `CandidateProfile` via `TryFrom`.
#[derive(Debug, Clone, FromRow)]
pub struct CandidateRow {
    pub id: Uuid,
    pub full_name: String,
    pub headline: Option<String>,
    pub summary: Option<String>,
    pub skills: Json<Vec<CandidateSkill>>,
    pub experience_level: String,
    pub years_of_experience: Option<f64>,
    pub location: Option<String>,
    pub open_to_remote: bool,
    pub willing_to_relocate: bool,
    pub education: Json<Vec<EducationRecord>>,
    pub is_active: bool,
    pub last_login_at: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
    pub desired_salary_min: Option<i64>,
    pub desired_salary_max: Option<i64>,
    pub preferred_work_modes: Vec<String>,
}

impl TryFrom<CandidateRow> for CandidateProfile {
    type Error = ValidationError;

    fn try_from(row: CandidateRow) -> Result<Self, Self::Error> {
        let preferred_work_modes = row
            .preferred_work_modes
            .iter()
            .map(|m| m.parse())
            .collect::<Result<Vec<WorkMode>, _>>()?;

        let profile = CandidateProfile {
            id: row.id,
            full_name: row.full_name,
            headline: row.headline,
            summary: row.summary,
            skills: row.skills.0,
            experience_level: row.experience_level.parse()?,
            years_of_experience: row.years_of_experience,
            location: row.location,
            open_to_remote: row.open_to_remote,
            willing_to_relocate: row.willing_to_relocate,
            education: row.education.0,
            is_active: row.is_active,
            last_login_at: row.last_login_at,
            updated_at: row.updated_at,
            desired_salary: SalaryRange::from_columns(
                row.desired_salary_min,
                row.desired_salary_max,
            ),
            preferred_work_modes,
        };
        profile.validate()?;
        Ok(profile)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_row() -> CandidateRow {
        CandidateRow {
            id: Uuid::new_v4(),
            full_name: "Ada Lovelace".to_string(),
            headline: None,
            summary: None,
            skills: Json(vec![CandidateSkill {
                name: "rust".to_string(),
                proficiency: Some(Proficiency::Expert),
            }]),
            experience_level: "senior".to_string(),
            years_of_experience: Some(8.0),
            location: Some("London, UK".to_string()),
            open_to_remote: true,
            willing_to_relocate: false,
            education: Json(vec![]),
            is_active: true,
            last_login_at: None,
            updated_at: Utc::now(),
            desired_salary_min: Some(100_000),
            desired_salary_max: None,
            preferred_work_modes: vec!["remote".to_string()],
        }
    }

    #[test]
    fn test_degree_detection() {
        assert_eq!(DegreeLevel::detect("PhD in Physics"), DegreeLevel::Phd);
        assert_eq!(DegreeLevel::detect("Ph.D."), DegreeLevel::Phd);
        assert_eq!(DegreeLevel::detect("MSc Computer Science"), DegreeLevel::Master);
        assert_eq!(DegreeLevel::detect("B.S. Mathematics"), DegreeLevel::Bachelor);
        assert_eq!(DegreeLevel::detect("Associate of Arts"), DegreeLevel::Associate);
        assert_eq!(DegreeLevel::detect("Bootcamp certificate"), DegreeLevel::Other);
    }

    #[test]
    fn test_row_converts_to_profile() {
        let profile = CandidateProfile::try_from(make_row()).unwrap();
        assert_eq!(profile.experience_level, ExperienceLevel::Senior);
        assert_eq!(profile.preferred_work_modes, vec![WorkMode::Remote]);
        assert_eq!(profile.desired_salary.unwrap().max, 100_000);
    }

    #[test]
    fn test_row_with_unknown_level_is_rejected() {
        let mut row = make_row();
        row.experience_level = "guru".to_string();
        let err = CandidateProfile::try_from(row).unwrap_err();
        assert_eq!(err.field, "experience_level");
    }

    #[test]
    fn test_negative_years_rejected() {
        let mut row = make_row();
        row.years_of_experience = Some(-2.0);
        assert!(CandidateProfile::try_from(row).is_err());
    }

    #[test]
    fn test_blank_skill_rejected() {
        let mut row = make_row();
        row.skills = Json(vec![CandidateSkill {
            name: "  ".to_string(),
            proficiency: None,
        }]);
        assert!(CandidateProfile::try_from(row).is_err());
    }
}
