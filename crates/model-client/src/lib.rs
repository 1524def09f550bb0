//! HTTP client for the platform's prediction service.
//!
//! The engine only sees the `PredictionModel` trait; this crate maps it onto
//! the ml-service's `/predict` endpoint. The service is a pure function of
//! the posted factors and cross-sectional context, so retried calls are safe.

use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::debug;

use research_core::{
    CrossSectionStats, FactorSnapshot, PercentileBand, Prediction, PredictionModel,
    ResearchError, ResearchResult, SizeRegime, TurnoverRegime,
};

/// Configuration for the model service connection.
#[derive(Debug, Clone)]
pub struct ModelClientConfig {
    pub base_url: String,
    pub timeout: Duration,
}

impl Default for ModelClientConfig {
    fn default() -> Self {
        Self {
            base_url: std::env::var("MODEL_SERVICE_URL")
                .unwrap_or_else(|_| "http://localhost:8000".to_string()),
            timeout: Duration::from_secs(10),
        }
    }
}

#[derive(Clone)]
pub struct ModelClient {
    client: reqwest::Client,
    base_url: String,
}

#[derive(Debug, Serialize)]
struct PredictRequest<'a> {
    ticker: &'a str,
    date: NaiveDate,
    factors: &'a FactorSnapshot,
    stats: &'a CrossSectionStats,
}

#[derive(Debug, Deserialize)]
struct PredictResponse {
    point_estimate: f64,
    percentiles: PercentileBand,
    confidence: f64,
    size_regime: Option<SizeRegime>,
    turnover_regime: Option<TurnoverRegime>,
}

impl ModelClient {
    pub fn new(config: ModelClientConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .expect("Failed to create HTTP client");

        Self {
            client,
            base_url: config.base_url,
        }
    }

    pub fn with_defaults() -> Self {
        Self::new(ModelClientConfig::default())
    }
}

#[async_trait]
impl PredictionModel for ModelClient {
    async fn predict(
        &self,
        factors: &FactorSnapshot,
        stats: &CrossSectionStats,
    ) -> ResearchResult<Prediction> {
        let request = PredictRequest {
            ticker: &factors.ticker,
            date: factors.date,
            factors,
            stats,
        };

        let model_err = |detail: String| ResearchError::Model {
            ticker: factors.ticker.clone(),
            date: factors.date,
            detail,
        };

        let response = self
            .client
            .post(format!("{}/predict", self.base_url))
            .json(&request)
            .send()
            .await
            .map_err(|e| model_err(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(model_err(format!("status {status}: {body}")));
        }

        let parsed: PredictResponse = response
            .json()
            .await
            .map_err(|e| model_err(format!("invalid response: {e}")))?;

        debug!(
            ticker = %factors.ticker,
            date = %factors.date,
            point = parsed.point_estimate,
            "prediction received"
        );

        Ok(Prediction {
            point_estimate: parsed.point_estimate,
            percentiles: parsed.percentiles,
            confidence: parsed.confidence.clamp(0.0, 1.0),
            size_regime: parsed.size_regime,
            turnover_regime: parsed.turnover_regime,
        })
    }
}
