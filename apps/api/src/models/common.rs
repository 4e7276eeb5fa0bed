use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Raised when a candidate or posting record fails boundary validation.
#[derive(Debug, Clone, Error, PartialEq)]
#[error("invalid {field}: {message}")]
pub struct ValidationError {
    pub field: String,
    pub message: String,
}

impl ValidationError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

/// Seniority ladder shared by candidates and postings. Ordering is meaningful.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExperienceLevel {
    Entry,
    Mid,
    Senior,
    Executive,
}

impl ExperienceLevel {
    pub fn ordinal(self) -> i32 {
        match self {
            ExperienceLevel::Entry => 0,
            ExperienceLevel::Mid => 1,
            ExperienceLevel::Senior => 2,
            ExperienceLevel::Executive => 3,
        }
    }
}

impl FromStr for ExperienceLevel {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "entry" | "junior" | "entry_level" => Ok(ExperienceLevel::Entry),
            "mid" | "intermediate" | "mid_level" => Ok(ExperienceLevel::Mid),
            "senior" | "lead" => Ok(ExperienceLevel::Senior),
            "executive" | "principal" | "director" => Ok(ExperienceLevel::Executive),
            other => Err(ValidationError::new(
                "experience_level",
                format!("unknown level '{other}'"),
            )),
        }
    }
}

/// Where the work happens.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkMode {
    OnSite,
    Hybrid,
    Remote,
}

impl FromStr for WorkMode {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace('-', "_").as_str() {
            "on_site" | "onsite" | "office" => Ok(WorkMode::OnSite),
            "hybrid" => Ok(WorkMode::Hybrid),
            "remote" => Ok(WorkMode::Remote),
            other => Err(ValidationError::new(
                "work_mode",
                format!("unknown work mode '{other}'"),
            )),
        }
    }
}

impl fmt::Display for WorkMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            WorkMode::OnSite => "on_site",
            WorkMode::Hybrid => "hybrid",
            WorkMode::Remote => "remote",
        };
        f.write_str(s)
    }
}

/// Annual salary range in whole currency units.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SalaryRange {
    pub min: i64,
    pub max: i64,
}

impl SalaryRange {
    pub fn validate(&self, field: &str) -> Result<(), ValidationError> {
        if self.min < 0 || self.max < 0 {
            return Err(ValidationError::new(field, "salary cannot be negative"));
        }
        if self.min > self.max {
            return Err(ValidationError::new(field, "min exceeds max"));
        }
        Ok(())
    }

    /// Builds a range from nullable columns; both bounds must be present.
    pub fn from_columns(min: Option<i64>, max: Option<i64>) -> Option<Self> {
        match (min, max) {
            (Some(min), Some(max)) => Some(Self { min, max }),
            (Some(min), None) => Some(Self { min, max: min }),
            (None, Some(max)) => Some(Self { min: max, max }),
            (None, None) => None,
        }
    }
}

/// Rejects empty or whitespace-only entries in a list of names.
pub(crate) fn validate_names(field: &str, names: &[String]) -> Result<(), ValidationError> {
    if names.iter().any(|n| n.trim().is_empty()) {
        return Err(ValidationError::new(field, "entries cannot be blank"));
    }
    Ok(())
}
