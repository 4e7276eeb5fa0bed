use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Linear multipliers applied to the 0-100 factor scores. They do not need to sum to 1;
/// the weighted sum is capped at 100.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringWeights {
    pub skills: f64,
    pub experience: f64,
    pub location: f64,
    pub education: f64,
    pub availability: f64,
    pub recent_activity: f64,
}

impl Default for ScoringWeights {
    fn default() -> Self {
        Self {
            skills: 0.35,
            experience: 0.25,
            location: 0.15,
            education: 0.10,
            availability: 0.10,
            recent_activity: 0.05,
        }
    }
}

impl ScoringWeights {
    /// Distribution used by content-based scoring: content overlap over structured factors.
    pub fn content_based() -> Self {
        Self {
            skills: 0.45,
            experience: 0.25,
            location: 0.05,
            education: 0.05,
            availability: 0.05,
            recent_activity: 0.05,
        }
    }

    /// Negative weights are treated as zero.
    pub fn sanitized(self) -> Self {
        let clean = |w: f64| if w.is_finite() { w.max(0.0) } else { 0.0 };
        Self {
            skills: clean(self.skills),
            experience: clean(self.experience),
            location: clean(self.location),
            education: clean(self.education),
            availability: clean(self.availability),
            recent_activity: clean(self.recent_activity),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Algorithm {
    #[default]
    Comprehensive,
    Weighted,
    MlEnhanced,
    Collaborative,
    ContentBased,
}

impl Algorithm {
    pub fn as_str(self) -> &'static str {
        match self {
            Algorithm::Comprehensive => "comprehensive",
            Algorithm::Weighted => "weighted",
            Algorithm::MlEnhanced => "ml_enhanced",
            Algorithm::Collaborative => "collaborative",
            Algorithm::ContentBased => "content_based",
        }
    }
}

/// Employer-specific overrides used by weighted scoring.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmployerPreferences {
    #[serde(default)]
    pub preferred_skills: Vec<String>,
    /// Maximum points added when every preferred skill is present.
    #[serde(default = "default_boost")]
    pub boost: f64,
}

fn default_boost() -> f64 {
    10.0
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchContext {
    #[serde(default)]
    pub algorithm: Algorithm,
    #[serde(default)]
    pub weights: ScoringWeights,
    #[serde(default)]
    pub employer_preferences: Option<EmployerPreferences>,
    /// Reference instant for every time-decay term.
    #[serde(default = "Utc::now")]
    pub as_of: DateTime<Utc>,
}

impl Default for MatchContext {
    fn default() -> Self {
        Self {
            algorithm: Algorithm::default(),
            weights: ScoringWeights::default(),
            employer_preferences: None,
            as_of: Utc::now(),
        }
    }
}

impl MatchContext {
    pub fn with_algorithm(mut self, algorithm: Algorithm) -> Self {
        self.algorithm = algorithm;
        self
    }

    pub fn at(mut self, as_of: DateTime<Utc>) -> Self {
        self.as_of = as_of;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_weights_sum_to_one() {
        let w = ScoringWeights::default();
        let sum = w.skills + w.experience + w.location + w.education + w.availability + w.recent_activity;
        assert!((sum - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_content_based_weights_favor_skills() {
        let w = ScoringWeights::content_based();
        assert!(w.skills > ScoringWeights::default().skills);
        assert!(w.location < ScoringWeights::default().location);
    }

    #[test]
    fn test_sanitized_drops_negative_and_nan() {
        let w = ScoringWeights {
            skills: -1.0,
            experience: f64::NAN,
            ..ScoringWeights::default()
        }
        .sanitized();
        assert_eq!(w.skills, 0.0);
        assert_eq!(w.experience, 0.0);
        assert_eq!(w.location, 0.15);
    }

    #[test]
    fn test_context_deserializes_with_defaults() {
        let ctx: MatchContext = serde_json::from_str(r#"{"algorithm": "ml_enhanced"}"#).unwrap();
        assert_eq!(ctx.algorithm, Algorithm::MlEnhanced);
        assert_eq!(ctx.weights, ScoringWeights::default());
        assert!(ctx.employer_preferences.is_none());
    }

    #[test]
    fn test_partial_weights_fill_defaults() {
        let w: ScoringWeights = serde_json::from_str(r#"{"skills": 0.9}"#).unwrap();
        assert_eq!(w.skills, 0.9);
        assert_eq!(w.experience, 0.25);
    }
}
