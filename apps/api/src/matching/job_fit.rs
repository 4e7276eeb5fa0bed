//! Job-side scoring: how well a posting suits the candidate.

use serde::{Deserialize, Serialize};

use crate::matching::engine::clamp_score;
use crate::matching::factors::{
    availability_score, education_score, experience_score, location_score,
};
use crate::matching::skills::assess_skills;
use crate::matching::weights::MatchContext;
use crate::models::candidate::CandidateProfile;
use crate::models::posting::JobPosting;

const STALE_POSTING_DAYS: i64 = 30;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobFitBreakdown {
    pub overall_score: f64,
    pub requirements_match: f64,
    pub candidate_fit: f64,
    pub compensation_fit: f64,
    pub culture_fit: f64,
    pub growth_potential: f64,
    pub market_demand: f64,
}

pub fn score_job_fit(
    candidate: &CandidateProfile,
    job: &JobPosting,
    context: &MatchContext,
) -> JobFitBreakdown {
    let skills = assess_skills(&candidate.skills, &job.required_skills, &job.preferred_skills);
    let requirements_match =
        (skills.score + experience_score(candidate, job) + education_score(candidate, job)) / 3.0;
    let candidate_fit =
        0.6 * location_score(candidate, job) + 0.4 * availability_score(candidate, context.as_of);
    let compensation_fit = compensation_fit(candidate, job);
    let culture_fit = culture_fit(candidate, job);
    let growth_potential = growth_potential(candidate, job);
    let market_demand = market_demand(job, context);

    let overall = 0.30 * requirements_match
        + 0.20 * candidate_fit
        + 0.15 * compensation_fit
        + 0.10 * culture_fit
        + 0.15 * growth_potential
        + 0.10 * market_demand;

    JobFitBreakdown {
        overall_score: clamp_score(overall),
        requirements_match: clamp_score(requirements_match),
        candidate_fit: clamp_score(candidate_fit),
        compensation_fit,
        culture_fit,
        growth_potential,
        market_demand,
    }
}

fn compensation_fit(candidate: &CandidateProfile, job: &JobPosting) -> f64 {
    let (Some(wanted), Some(offered)) = (&candidate.desired_salary, &job.salary) else {
        return 50.0;
    };
    if wanted.min >= offered.min && wanted.min <= offered.max {
        100.0
    } else if offered.max < wanted.min {
        if wanted.min == 0 {
            return 0.0;
        }
        let gap = (wanted.min - offered.max) as f64;
        (100.0 * (1.0 - gap / wanted.min as f64)).max(0.0)
    } else {
        // Candidate asks for less than the posting's floor.
        80.0
    }
}

fn culture_fit(candidate: &CandidateProfile, job: &JobPosting) -> f64 {
    if candidate.preferred_work_modes.is_empty() {
        60.0
    } else if candidate.preferred_work_modes.contains(&job.work_mode) {
        100.0
    } else {
        30.0
    }
}

fn growth_potential(candidate: &CandidateProfile, job: &JobPosting) -> f64 {
    let step = job.experience_level.ordinal() - candidate.experience_level.ordinal();
    match step {
        1 => 100.0,
        0 => 70.0,
        s if s >= 2 => 50.0,
        _ => 30.0,
    }
}

fn market_demand(job: &JobPosting, context: &MatchContext) -> f64 {
    let demand = 100.0 / (1.0 + job.applications_count as f64 / 50.0);
    let age_days = (context.as_of - job.posted_at).num_days();
    if age_days > STALE_POSTING_DAYS {
        (demand - 10.0).max(0.0)
    } else {
        demand
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matching::factors::fixtures::{as_of, candidate, posting};
    use crate::models::common::{ExperienceLevel, SalaryRange, WorkMode};

    fn ctx() -> MatchContext {
        MatchContext::default().at(as_of())
    }

    #[test]
    fn test_compensation_fit_cases() {
        let mut c = candidate(&[]);
        let mut j = posting(&[]);
        // 90k ask sits below the 100k floor
        assert_eq!(compensation_fit(&c, &j), 80.0);

        c.desired_salary = Some(SalaryRange { min: 110_000, max: 140_000 });
        assert_eq!(compensation_fit(&c, &j), 100.0);

        j.salary = Some(SalaryRange { min: 60_000, max: 88_000 });
        // gap 22k over 110k → 80
        assert!((compensation_fit(&c, &j) - 80.0).abs() < 1e-9);

        j.salary = None;
        assert_eq!(compensation_fit(&c, &j), 50.0);
    }

    #[test]
    fn test_culture_fit() {
        let mut c = candidate(&[]);
        let mut j = posting(&[]);
        assert_eq!(culture_fit(&c, &j), 100.0);
        j.work_mode = WorkMode::Remote;
        assert_eq!(culture_fit(&c, &j), 30.0);
        c.preferred_work_modes.clear();
        assert_eq!(culture_fit(&c, &j), 60.0);
    }

    #[test]
    fn test_growth_potential_steps() {
        let c = candidate(&[]);
        let mut j = posting(&[]);
        assert_eq!(growth_potential(&c, &j), 70.0);
        j.experience_level = ExperienceLevel::Senior;
        assert_eq!(growth_potential(&c, &j), 100.0);
        j.experience_level = ExperienceLevel::Executive;
        assert_eq!(growth_potential(&c, &j), 50.0);
        j.experience_level = ExperienceLevel::Entry;
        assert_eq!(growth_potential(&c, &j), 30.0);
    }

    #[test]
    fn test_market_demand_penalizes_crowded_and_stale_postings() {
        let mut j = posting(&[]);
        assert_eq!(market_demand(&j, &ctx()), 100.0);
        j.applications_count = 50;
        assert_eq!(market_demand(&j, &ctx()), 50.0);
        j.posted_at = as_of() - chrono::Duration::days(45);
        assert_eq!(market_demand(&j, &ctx()), 40.0);
    }

    #[test]
    fn test_overall_in_bounds() {
        let fit = score_job_fit(&candidate(&["react"]), &posting(&["react"]), &ctx());
        assert!((0.0..=100.0).contains(&fit.overall_score));
        assert!(fit.requirements_match > 0.0);
    }
}
