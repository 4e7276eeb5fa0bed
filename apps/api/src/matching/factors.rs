//! Structured factor scores (experience, location, education, availability, activity).
//! Every function returns a value in [0, 100].

use std::sync::OnceLock;

use chrono::{DateTime, Utc};
use regex::Regex;

use crate::models::candidate::{CandidateProfile, DegreeLevel};
use crate::models::common::{ExperienceLevel, WorkMode};
use crate::models::posting::JobPosting;

/// Half-life exponential decay; 1.0 at zero elapsed days.
pub fn half_life_decay(elapsed_days: f64, half_life_days: f64) -> f64 {
    if elapsed_days <= 0.0 {
        return 1.0;
    }
    0.5_f64.powf(elapsed_days / half_life_days).clamp(0.0, 1.0)
}

fn days_between(earlier: DateTime<Utc>, later: DateTime<Utc>) -> f64 {
    (later - earlier).num_seconds() as f64 / 86_400.0
}

// ────────────────────────────────────────────────────────────────────────────
// Experience
// ────────────────────────────────────────────────────────────────────────────

/// Minimum and ideal years extracted from a job description.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct YearsRange {
    pub min: f64,
    pub ideal: f64,
}

fn range_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)(\d{1,2})\s*(?:-|–|to)\s*(\d{1,2})\+?\s*(?:years|yrs)")
            .expect("year range pattern is valid")
    })
}

fn minimum_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)(\d{1,2})\s*\+?\s*(?:years|yrs)").expect("minimum years pattern is valid")
    })
}

/// "3-5 years" / "3 to 5 years" → (3, 5); "5+ years" / "5 years" → (5, 7).
pub fn parse_years_range(description: &str) -> Option<YearsRange> {
    if let Some(caps) = range_regex().captures(description) {
        let a: f64 = caps[1].parse().ok()?;
        let b: f64 = caps[2].parse().ok()?;
        let (min, ideal) = if a <= b { (a, b) } else { (b, a) };
        return Some(YearsRange { min, ideal });
    }
    let caps = minimum_regex().captures(description)?;
    let min: f64 = caps[1].parse().ok()?;
    Some(YearsRange {
        min,
        ideal: min + 2.0,
    })
}

/// Level distance penalty only; used by weighted scoring.
pub fn level_distance(candidate: ExperienceLevel, job: ExperienceLevel) -> i32 {
    (candidate.ordinal() - job.ordinal()).abs()
}

pub fn experience_score(candidate: &CandidateProfile, job: &JobPosting) -> f64 {
    let diff = candidate.experience_level.ordinal() - job.experience_level.ordinal();
    let level_score = match diff {
        0 => 100.0,
        d if d < 0 => 100.0 - 30.0 * (-d) as f64,
        d => 100.0 - 20.0 * d as f64,
    };

    let adjustment = match (candidate.years_of_experience, parse_years_range(&job.description)) {
        (Some(years), Some(range)) => years_adjustment(years, range),
        _ => 0.0,
    };

    (level_score + adjustment).clamp(0.0, 100.0)
}

fn years_adjustment(years: f64, range: YearsRange) -> f64 {
    if years < range.min {
        if range.min <= 0.0 {
            return 0.0;
        }
        -(30.0 * (range.min - years) / range.min).min(30.0)
    } else if years < range.ideal {
        5.0
    } else {
        10.0
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Location
// ────────────────────────────────────────────────────────────────────────────

fn city(location: &str) -> String {
    location.split(',').next().unwrap_or("").trim().to_lowercase()
}

fn region(location: &str) -> String {
    location.rsplit(',').next().unwrap_or("").trim().to_lowercase()
}

pub fn location_score(candidate: &CandidateProfile, job: &JobPosting) -> f64 {
    if job.work_mode == WorkMode::Remote && candidate.open_to_remote {
        return 100.0;
    }

    let same_city = match (&candidate.location, &job.location) {
        (Some(c), Some(j)) => !city(c).is_empty() && city(c) == city(j),
        _ => false,
    };
    if same_city {
        return 100.0;
    }
    if job.work_mode == WorkMode::Remote {
        return 80.0;
    }
    if candidate.willing_to_relocate {
        return 60.0;
    }
    if job.work_mode == WorkMode::Hybrid && candidate.open_to_remote {
        return 50.0;
    }
    let same_region = match (&candidate.location, &job.location) {
        (Some(c), Some(j)) => !region(c).is_empty() && region(c) == region(j),
        _ => false,
    };
    if same_region {
        40.0
    } else {
        20.0
    }
}

/// Binary location heuristic used by weighted scoring.
pub fn simple_location_score(candidate: &CandidateProfile, job: &JobPosting) -> f64 {
    let exact = match (&candidate.location, &job.location) {
        (Some(c), Some(j)) => c.trim().eq_ignore_ascii_case(j.trim()),
        _ => false,
    };
    if exact || (job.work_mode == WorkMode::Remote && candidate.open_to_remote) {
        100.0
    } else {
        30.0
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Education
// ────────────────────────────────────────────────────────────────────────────

fn degree_base(level: Option<DegreeLevel>) -> f64 {
    match level {
        Some(DegreeLevel::Phd) => 40.0,
        Some(DegreeLevel::Master) => 32.0,
        Some(DegreeLevel::Bachelor) => 25.0,
        Some(DegreeLevel::Associate) => 15.0,
        Some(DegreeLevel::Other) => 5.0,
        None => 0.0,
    }
}

/// Degree-only table used by weighted scoring.
pub fn simple_education_score(candidate: &CandidateProfile) -> f64 {
    match candidate.highest_degree() {
        Some(DegreeLevel::Phd) => 100.0,
        Some(DegreeLevel::Master) => 85.0,
        Some(DegreeLevel::Bachelor) => 70.0,
        Some(DegreeLevel::Associate) => 50.0,
        Some(DegreeLevel::Other) | None => 30.0,
    }
}

/// Lowercased words with dots and apostrophes folded in: "B.S." -> "bs", "Master's" -> "masters".
fn phrase_words(text: &str) -> Vec<String> {
    text.to_lowercase()
        .replace(['.', '\''], "")
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(str::to_string)
        .collect()
}

/// True when `needle` occurs in `haystack` as a run of whole words.
fn contains_phrase(haystack: &[String], needle: &[String]) -> bool {
    !needle.is_empty() && haystack.windows(needle.len()).any(|w| w == needle)
}

/// Fraction of requirement strings matched by any of the candidate's degree or field keywords.
fn keyword_fraction(candidate: &CandidateProfile, requirements: &[String]) -> Option<f64> {
    if requirements.is_empty() {
        return None;
    }
    let keywords: Vec<Vec<String>> = candidate
        .education
        .iter()
        .flat_map(|e| std::iter::once(e.degree.as_str()).chain(e.field.as_deref()))
        .map(phrase_words)
        .filter(|w| !w.is_empty())
        .collect();

    let matched = requirements
        .iter()
        .filter(|req| {
            let req_words = phrase_words(req);
            keywords.iter().any(|k| {
                contains_phrase(&req_words, k) || contains_phrase(k, &req_words)
            }) || requirement_met_by_level(&req.to_lowercase(), candidate.highest_degree())
        })
        .count();
    Some(matched as f64 / requirements.len() as f64)
}

/// "Bachelor's degree" is met by any degree at or above bachelor level.
fn requirement_met_by_level(requirement: &str, highest: Option<DegreeLevel>) -> bool {
    let required = DegreeLevel::detect(requirement);
    match highest {
        Some(level) => required != DegreeLevel::Other && level >= required,
        None => false,
    }
}

pub fn education_score(candidate: &CandidateProfile, job: &JobPosting) -> f64 {
    let base = degree_base(candidate.highest_degree());
    let required = keyword_fraction(candidate, &job.required_education).map_or(40.0, |f| 40.0 * f);
    let preferred =
        keyword_fraction(candidate, &job.preferred_education).map_or(20.0, |f| 20.0 * f);
    (base + required + preferred).min(100.0)
}

// ────────────────────────────────────────────────────────────────────────────
// Availability and activity
// ────────────────────────────────────────────────────────────────────────────

pub fn availability_score(candidate: &CandidateProfile, as_of: DateTime<Utc>) -> f64 {
    let status = if candidate.is_active { 60.0 } else { 20.0 };
    let recency = candidate
        .last_login_at
        .map_or(0.0, |login| 40.0 * half_life_decay(days_between(login, as_of), 30.0));
    (status + recency).min(100.0)
}

pub fn recent_activity_score(candidate: &CandidateProfile, as_of: DateTime<Utc>) -> f64 {
    100.0 * half_life_decay(days_between(candidate.updated_at, as_of), 90.0)
}


#[cfg(test)]
mod tests {
    use super::fixtures::{as_of, candidate, posting};
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_parse_years_range_variants() {
        assert_eq!(
            parse_years_range("Requires 3-5 years of Go"),
            Some(YearsRange { min: 3.0, ideal: 5.0 })
        );
        assert_eq!(
            parse_years_range("2 to 4 yrs experience"),
            Some(YearsRange { min: 2.0, ideal: 4.0 })
        );
        assert_eq!(
            parse_years_range("5+ years building APIs"),
            Some(YearsRange { min: 5.0, ideal: 7.0 })
        );
        assert_eq!(parse_years_range("No experience needed"), None);
    }

    #[test]
    fn test_experience_exact_level_with_years_in_range() {
        let score = experience_score(&candidate(&[]), &posting(&[]));
        // level match 100, 4 years within [3, 5) → +5, capped
        assert_eq!(score, 100.0);
    }

    #[test]
    fn test_experience_underqualified_penalty() {
        let mut c = candidate(&[]);
        c.experience_level = ExperienceLevel::Entry;
        c.years_of_experience = Some(1.5);
        let mut j = posting(&[]);
        j.experience_level = ExperienceLevel::Senior;
        // 100 - 60 = 40, years 1.5 < 3 → -15
        assert!((experience_score(&c, &j) - 25.0).abs() < 1e-9);
    }

    #[test]
    fn test_experience_overqualified_penalty_is_smaller() {
        let mut c = candidate(&[]);
        c.experience_level = ExperienceLevel::Senior;
        c.years_of_experience = None;
        let under = {
            let mut j = posting(&[]);
            j.experience_level = ExperienceLevel::Executive;
            experience_score(&c, &j)
        };
        let over = {
            let mut j = posting(&[]);
            j.experience_level = ExperienceLevel::Mid;
            experience_score(&c, &j)
        };
        assert_eq!(under, 70.0);
        assert_eq!(over, 80.0);
    }

    #[test]
    fn test_location_tiers() {
        let mut c = candidate(&[]);
        let mut j = posting(&[]);
        assert_eq!(location_score(&c, &j), 100.0);

        j.location = Some("Dallas, TX".to_string());
        assert_eq!(location_score(&c, &j), 40.0);

        c.willing_to_relocate = true;
        assert_eq!(location_score(&c, &j), 60.0);

        c.willing_to_relocate = false;
        j.location = Some("Seattle, WA".to_string());
        assert_eq!(location_score(&c, &j), 20.0);

        j.work_mode = WorkMode::Hybrid;
        c.open_to_remote = true;
        assert_eq!(location_score(&c, &j), 50.0);

        j.work_mode = WorkMode::Remote;
        assert_eq!(location_score(&c, &j), 100.0);

        c.open_to_remote = false;
        assert_eq!(location_score(&c, &j), 80.0);
    }

    #[test]
    fn test_education_no_requirements() {
        // bachelor 25 + 40 + 20
        assert_eq!(education_score(&candidate(&[]), &posting(&[])), 85.0);
    }

    #[test]
    fn test_education_requirement_matched_by_field_and_level() {
        let mut j = posting(&[]);
        j.required_education = vec!["Bachelor's degree".to_string(), "Computer Science".to_string()];
        j.preferred_education = vec!["Master's in Statistics".to_string()];
        // 25 + 40 * 2/2 + 20 * 0
        assert_eq!(education_score(&candidate(&[]), &j), 65.0);
    }

    #[test]
    fn test_education_keywords_match_whole_words_only() {
        let mut c = candidate(&[]);
        c.education = vec![crate::models::candidate::EducationRecord {
            degree: "MS".to_string(),
            field: Some("Art".to_string()),
            institution: None,
        }];
        let mut j = posting(&[]);
        j.required_education = vec!["Information Systems".to_string(), "Fine Arts".to_string()];
        j.preferred_education = vec!["M.S. in Art".to_string()];
        // master 32 + 40 * 0/2 + 20 * 1/1
        assert_eq!(education_score(&c, &j), 52.0);
    }

    #[test]
    fn test_education_without_degree() {
        let mut c = candidate(&[]);
        c.education.clear();
        let mut j = posting(&[]);
        j.required_education = vec!["Bachelor's degree".to_string()];
        assert_eq!(education_score(&c, &j), 20.0);
    }

    #[test]
    fn test_availability_decays_with_login_age() {
        let mut c = candidate(&[]);
        assert_eq!(availability_score(&c, as_of()), 100.0);

        c.last_login_at = Some(as_of() - Duration::days(30));
        assert!((availability_score(&c, as_of()) - 80.0).abs() < 1e-6);

        c.last_login_at = None;
        c.is_active = false;
        assert_eq!(availability_score(&c, as_of()), 20.0);
    }

    #[test]
    fn test_recent_activity_half_life() {
        let mut c = candidate(&[]);
        c.updated_at = as_of() - Duration::days(90);
        assert!((recent_activity_score(&c, as_of()) - 50.0).abs() < 1e-6);
    }

    #[test]
    fn test_half_life_decay_future_is_one() {
        assert_eq!(half_life_decay(-3.0, 30.0), 1.0);
    }
}
