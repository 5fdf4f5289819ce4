//! Outbound calls to the food-category predictor and the relief demand
//! forecaster. Both are optional; every failure degrades to a fallback value.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::db::models::{EventType, Storage};

pub const FALLBACK_CATEGORY: &str = "other";

#[derive(Clone, Debug)]
pub struct MlClient {
    http: reqwest::Client,
    predict_url: Option<String>,
    forecast_url: Option<String>,
}

#[derive(Serialize)]
struct PredictRequest<'a> {
    food: &'a str,
    hours_old: u32,
    storage: &'a str,
}

#[derive(Deserialize)]
struct PredictResponse {
    category: String,
}

#[derive(Serialize)]
struct ForecastRequest {
    #[serde(rename = "type")]
    event_type: EventType,
    latitude: f64,
    longitude: f64,
}

#[derive(Deserialize)]
struct ForecastResponse {
    estimated_demand: f64,
}

impl MlClient {
    pub fn new(ml_api_url: Option<&str>, forecast_api_url: Option<&str>) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(5))
            .user_agent("FoodLoopAdmin/1.0")
            .build()?;
        Ok(MlClient {
            http,
            predict_url: ml_api_url.map(|base| format!("{}/predict", base)),
            forecast_url: forecast_api_url.map(|base| format!("{}/forecast", base)),
        })
    }

    /// Client with no upstreams configured; every call returns its fallback.
    pub fn disabled() -> Self {
        MlClient {
            http: reqwest::Client::new(),
            predict_url: None,
            forecast_url: None,
        }
    }

    /// Category for a freshly prepared food, `other` when the predictor is
    /// unset, unreachable or answers with garbage.
    pub async fn predict_category(&self, food: &str, storage: Storage) -> String {
        let Some(url) = &self.predict_url else {
            return FALLBACK_CATEGORY.to_string();
        };
        let body = PredictRequest {
            food,
            hours_old: 0,
            storage: storage.as_str(),
        };
        match self.post_json::<_, PredictResponse>(url, &body).await {
            Ok(resp) if !resp.category.trim().is_empty() => resp.category.trim().to_lowercase(),
            Ok(_) => FALLBACK_CATEGORY.to_string(),
            Err(e) => {
                tracing::warn!("ML prediction failed: {}", e);
                FALLBACK_CATEGORY.to_string()
            }
        }
    }

    /// Estimated demand for a relief camp; zero when no forecast is available.
    pub async fn forecast_demand(&self, event_type: EventType, latitude: f64, longitude: f64) -> f64 {
        let Some(url) = &self.forecast_url else {
            return 0.0;
        };
        let body = ForecastRequest {
            event_type,
            latitude,
            longitude,
        };
        match self.post_json::<_, ForecastResponse>(url, &body).await {
            Ok(resp) if resp.estimated_demand.is_finite() => resp.estimated_demand.max(0.0),
            Ok(_) => 0.0,
            Err(e) => {
                tracing::warn!("Demand forecast failed: {}", e);
                0.0
            }
        }
    }

    async fn post_json<B: Serialize, R: for<'de> Deserialize<'de>>(&self, url: &str, body: &B) -> anyhow::Result<R> {
        let resp = self.http.post(url).json(body).send().await?;
        if !resp.status().is_success() {
            return Err(anyhow::anyhow!("upstream response status {}", resp.status()));
        }
        Ok(resp.json().await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn disabled_client_falls_back() {
        let client = MlClient::disabled();
        assert_eq!(client.predict_category("dal rice", Storage::RoomTemp).await, "other");
        assert_eq!(client.forecast_demand(EventType::Flood, 19.07, 72.87).await, 0.0);
    }

    #[tokio::test]
    async fn unreachable_upstream_falls_back() {
        // port 9 (discard) is closed on test hosts
        let client = MlClient::new(Some("http://127.0.0.1:9"), Some("http://127.0.0.1:9")).unwrap();
        assert_eq!(client.predict_category("bread", Storage::Frozen).await, "other");
        assert_eq!(client.forecast_demand(EventType::Heatwave, 0.0, 0.0).await, 0.0);
    }
}
