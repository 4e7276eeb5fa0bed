/// HTTP client for the external scoring model service.
///
/// Exposes the service as a `ScoreAdjuster`. Retries on 429 and 5xx with exponential
/// backoff; any failure surfaces as `AdjustmentError` and the engine degrades.
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::matching::adjuster::{AdjustmentError, MatchFeatures, MlAdjustment, ScoreAdjuster};
use crate::models::candidate::CandidateProfile;
use crate::models::posting::JobPosting;

const MAX_RETRIES: u32 = 3;
const REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Serialize)]
struct MlRequest<'a> {
    candidate_id: Uuid,
    job_id: Uuid,
    features: &'a MatchFeatures,
}

#[derive(Debug, Serialize)]
struct CollaborativeRequest<'a> {
    candidate_id: Uuid,
    job_id: Uuid,
    candidate_skills: Vec<&'a str>,
}

#[derive(Debug, Deserialize)]
struct CollaborativeResponse {
    score: f64,
}

#[derive(Clone)]
pub struct ModelServiceAdjuster {
    client: Client,
    base_url: String,
}

impl ModelServiceAdjuster {
    pub fn new(base_url: impl Into<String>) -> Result<Self, AdjustmentError> {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| AdjustmentError::Service(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    async fn post_json<B: Serialize, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, AdjustmentError> {
        let url = format!("{}{}", self.base_url, path);
        let mut last_error: Option<AdjustmentError> = None;

        for attempt in 0..MAX_RETRIES {
            if attempt > 0 {
                // 200ms, 400ms
                let delay = Duration::from_millis(200 * (1 << (attempt - 1)));
                warn!(
                    "Model service call attempt {} failed, retrying after {}ms...",
                    attempt,
                    delay.as_millis()
                );
                tokio::time::sleep(delay).await;
            }

            let response = match self.client.post(&url).json(body).send().await {
                Ok(r) => r,
                Err(e) => {
                    last_error = Some(AdjustmentError::Service(e.to_string()));
                    continue;
                }
            };

            let status = response.status();
            if status.as_u16() == 429 || status.is_server_error() {
                let body = response.text().await.unwrap_or_default();
                last_error = Some(AdjustmentError::Service(format!("{status}: {body}")));
                continue;
            }
            if !status.is_success() {
                let body = response.text().await.unwrap_or_default();
                return Err(AdjustmentError::Service(format!("{status}: {body}")));
            }

            let parsed = response
                .json::<T>()
                .await
                .map_err(|e| AdjustmentError::Invalid(e.to_string()))?;
            debug!(path, "Model service call succeeded");
            return Ok(parsed);
        }

        Err(last_error.unwrap_or_else(|| {
            AdjustmentError::Service(format!("gave up after {MAX_RETRIES} attempts"))
        }))
    }
}

#[async_trait]
impl ScoreAdjuster for ModelServiceAdjuster {
    async fn ml_adjustment(
        &self,
        candidate: &CandidateProfile,
        job: &JobPosting,
        features: &MatchFeatures,
    ) -> Result<MlAdjustment, AdjustmentError> {
        let request = MlRequest {
            candidate_id: candidate.id,
            job_id: job.id,
            features,
        };
        let adjustment: MlAdjustment = self.post_json("/v1/adjustments/ml", &request).await?;
        adjustment.sanitized()
    }

    async fn collaborative_score(
        &self,
        candidate: &CandidateProfile,
        job: &JobPosting,
    ) -> Result<f64, AdjustmentError> {
        let request = CollaborativeRequest {
            candidate_id: candidate.id,
            job_id: job.id,
            candidate_skills: candidate.skills.iter().map(|s| s.name.as_str()).collect(),
        };
        let response: CollaborativeResponse = self
            .post_json("/v1/adjustments/collaborative", &request)
            .await?;
        if !response.score.is_finite() {
            return Err(AdjustmentError::Invalid("non-finite score".to_string()));
        }
        Ok(response.score.clamp(0.0, 100.0))
    }

    fn name(&self) -> &'static str {
        "model_service"
    }
}
