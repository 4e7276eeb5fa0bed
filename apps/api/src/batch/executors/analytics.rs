//! `analytics_generation`: score distribution and skill supply/demand over a period,
//! rendered to markdown and uploaded through the report sink.

use std::collections::{BTreeMap, HashSet};
use std::fmt::Write as _;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{info, warn};

use crate::batch::reports::ReportSink;
use crate::batch::store::{MatchScoreRecord, TalentStore};
use crate::jobs::error::JobError;
use crate::jobs::registry::{JobContext, JobExecutor};
use crate::matching::skills::normalize_skill;
use crate::models::batch::{JobResults, JobType};
use crate::models::candidate::CandidateProfile;
use crate::models::posting::JobPosting;

pub const NAME: &str = "analytics_generation";

/// Steps: score distribution, skill balance, report upload.
pub const ANALYTICS_STEPS: u64 = 3;

const BUCKETS: usize = 10;

fn default_period_days() -> i64 {
    30
}

fn default_top_n() -> usize {
    10
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalyticsParams {
    #[serde(default = "default_period_days")]
    pub period_days: i64,
    #[serde(default = "default_top_n")]
    pub top_n: usize,
}

impl Default for AnalyticsParams {
    fn default() -> Self {
        Self {
            period_days: default_period_days(),
            top_n: default_top_n(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreDistribution {
    pub count: u64,
    pub mean: f64,
    /// Ten 10-point buckets; a score of exactly 100 lands in the last one.
    pub buckets: Vec<u64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkillBalance {
    pub skill: String,
    /// Open postings asking for the skill.
    pub demand: u64,
    /// Candidates listing the skill.
    pub supply: u64,
}

impl SkillBalance {
    pub fn gap(&self) -> i64 {
        self.demand as i64 - self.supply as i64
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalyticsSummary {
    pub period_start: DateTime<Utc>,
    pub generated_at: DateTime<Utc>,
    pub distribution: ScoreDistribution,
    pub top_demanded: Vec<SkillBalance>,
    pub top_gaps: Vec<SkillBalance>,
    #[serde(default)]
    pub report_location: Option<String>,
}

pub fn score_distribution(scores: &[MatchScoreRecord]) -> ScoreDistribution {
    let mut buckets = vec![0u64; BUCKETS];
    let mut sum = 0.0;
    for score in scores {
        let value = score.overall_score.clamp(0.0, 100.0);
        let bucket = ((value / 10.0).floor() as usize).min(BUCKETS - 1);
        buckets[bucket] += 1;
        sum += value;
    }
    let count = scores.len() as u64;
    ScoreDistribution {
        count,
        mean: if count == 0 { 0.0 } else { sum / count as f64 },
        buckets,
    }
}

/// Demand counts each posting once per skill; supply counts each candidate once per skill.
pub fn skill_balance(candidates: &[CandidateProfile], postings: &[JobPosting]) -> Vec<SkillBalance> {
    let mut table: BTreeMap<String, (u64, u64)> = BTreeMap::new();
    for posting in postings {
        let wanted: HashSet<String> = posting
            .required_skills
            .iter()
            .chain(&posting.preferred_skills)
            .map(|s| normalize_skill(s))
            .collect();
        for skill in wanted {
            table.entry(skill).or_default().0 += 1;
        }
    }
    for candidate in candidates {
        let held: HashSet<String> = candidate
            .skills
            .iter()
            .map(|s| normalize_skill(&s.name))
            .collect();
        for skill in held {
            table.entry(skill).or_default().1 += 1;
        }
    }
    table
        .into_iter()
        .filter(|(skill, _)| !skill.is_empty())
        .map(|(skill, (demand, supply))| SkillBalance {
            skill,
            demand,
            supply,
        })
        .collect()
}

pub fn render_markdown(summary: &AnalyticsSummary) -> String {
    let mut md = String::new();
    let _ = writeln!(md, "# Matching Analytics\n");
    let _ = writeln!(
        md,
        "Period: {} to {}\n",
        summary.period_start.format("%Y-%m-%d"),
        summary.generated_at.format("%Y-%m-%d")
    );

    let dist = &summary.distribution;
    let _ = writeln!(md, "## Score distribution\n");
    let _ = writeln!(md, "Scored pairs: {}, mean score: {:.2}\n", dist.count, dist.mean);
    let _ = writeln!(md, "| Range | Pairs |");
    let _ = writeln!(md, "|---|---|");
    for (i, n) in dist.buckets.iter().enumerate() {
        let upper = if i == BUCKETS - 1 { 100 } else { (i + 1) * 10 - 1 };
        let _ = writeln!(md, "| {}-{} | {} |", i * 10, upper, n);
    }

    let _ = writeln!(md, "\n## Most demanded skills\n");
    let _ = writeln!(md, "| Skill | Postings | Candidates |");
    let _ = writeln!(md, "|---|---|---|");
    for s in &summary.top_demanded {
        let _ = writeln!(md, "| {} | {} | {} |", s.skill, s.demand, s.supply);
    }

    let _ = writeln!(md, "\n## Largest skill gaps\n");
    if summary.top_gaps.is_empty() {
        let _ = writeln!(md, "No skill is in shorter supply than demand.");
    } else {
        let _ = writeln!(md, "| Skill | Postings | Candidates | Gap |");
        let _ = writeln!(md, "|---|---|---|---|");
        for s in &summary.top_gaps {
            let _ = writeln!(
                md,
                "| {} | {} | {} | {} |",
                s.skill,
                s.demand,
                s.supply,
                s.gap()
            );
        }
    }
    md
}

pub struct AnalyticsExecutor {
    store: Arc<dyn TalentStore>,
    sink: Arc<dyn ReportSink>,
}

impl AnalyticsExecutor {
    pub fn new(store: Arc<dyn TalentStore>, sink: Arc<dyn ReportSink>) -> Self {
        Self { store, sink }
    }
}

#[async_trait]
impl JobExecutor for AnalyticsExecutor {
    fn job_type(&self) -> JobType {
        JobType::Analytics
    }

    fn name(&self) -> &'static str {
        NAME
    }

    fn validate_parameters(&self, parameters: &Value) -> Result<(), JobError> {
        let params: AnalyticsParams = serde_json::from_value(parameters.clone())?;
        if params.period_days < 1 {
            return Err(JobError::Validation("period_days must be at least 1".to_string()));
        }
        if params.top_n == 0 {
            return Err(JobError::Validation("top_n must be at least 1".to_string()));
        }
        Ok(())
    }

    async fn execute(&self, ctx: JobContext) -> Result<JobResults, JobError> {
        let params: AnalyticsParams = ctx.parameters()?;
        let generated_at = Utc::now();
        let period_start = generated_at - Duration::days(params.period_days);
        ctx.progress.set_total(ANALYTICS_STEPS).await;
        let mut results = JobResults::default();

        let scores = self.store.load_match_scores(period_start).await?;
        let distribution = score_distribution(&scores);
        results.record_success(1);
        ctx.progress.advance(1).await;

        let candidates = self.store.load_candidates(None).await?;
        let postings = self.store.load_postings(None).await?;
        let skipped = candidates.rejected.len() + postings.rejected.len();
        if skipped > 0 {
            results.warn(format!("{skipped} invalid records excluded from skill balance"));
        }
        let balance = skill_balance(&candidates.records, &postings.records);

        let mut top_demanded = balance.clone();
        top_demanded.sort_by(|a, b| b.demand.cmp(&a.demand).then_with(|| a.skill.cmp(&b.skill)));
        top_demanded.truncate(params.top_n);

        let mut top_gaps: Vec<SkillBalance> = balance.into_iter().filter(|s| s.gap() > 0).collect();
        top_gaps.sort_by(|a, b| b.gap().cmp(&a.gap()).then_with(|| a.skill.cmp(&b.skill)));
        top_gaps.truncate(params.top_n);
        results.record_success(1);
        ctx.progress.advance(1).await;

        let mut summary = AnalyticsSummary {
            period_start,
            generated_at,
            distribution,
            top_demanded,
            top_gaps,
            report_location: None,
        };

        let key = format!(
            "reports/analytics/{}/{}.md",
            generated_at.format("%Y-%m-%d"),
            ctx.job.id
        );
        match self.sink.put_report(&key, render_markdown(&summary)).await {
            Ok(location) => {
                summary.report_location = Some(location);
                results.record_success(1);
            }
            Err(e) => {
                warn!(job_id = %ctx.job.id, error = %e, "Analytics report upload failed");
                results.record_failure("report", e.to_string(), 1);
            }
        }
        ctx.progress.advance(1).await;

        info!(
            job_id = %ctx.job.id,
            scored_pairs = summary.distribution.count,
            gaps = summary.top_gaps.len(),
            "Analytics generated"
        );
        results.output = Some(serde_json::to_value(&summary)?);
        Ok(results)
    }
}
