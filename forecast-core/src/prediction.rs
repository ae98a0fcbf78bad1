use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use std::{collections::BTreeMap, convert::TryFrom, fmt::Debug};

use crate::{Config, error::PredictionError, model::Field, payload::PredictionPayload};

/// Path prefix of the prediction service's API.
pub const API_PATH: &str = "/api/v1/endpoints";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ModelId {
    #[default]
    Linear,
    Ridge,
    Lasso,
}

impl ModelId {
    pub fn as_str(&self) -> &'static str {
        match self {
            ModelId::Linear => "linear",
            ModelId::Ridge => "ridge",
            ModelId::Lasso => "lasso",
        }
    }

    pub const fn all() -> &'static [ModelId] {
        &[ModelId::Linear, ModelId::Ridge, ModelId::Lasso]
    }
}

impl std::fmt::Display for ModelId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<&str> for ModelId {
    type Error = PredictionError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        let lower = value.trim().to_lowercase();

        match lower.as_str() {
            "linear" => Ok(ModelId::Linear),
            "ridge" => Ok(ModelId::Ridge),
            "lasso" => Ok(ModelId::Lasso),
            _ => Err(PredictionError::UnknownModel(value.to_string())),
        }
    }
}

impl std::str::FromStr for ModelId {
    type Err = PredictionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ModelId::try_from(s)
    }
}

/// Scalar results returned by a model, keyed by field name.
#[derive(Debug, Clone, PartialEq)]
pub struct Prediction {
    pub model: ModelId,
    values: BTreeMap<String, f64>,
}

impl Prediction {
    pub fn new(model: ModelId, values: BTreeMap<String, f64>) -> Self {
        Self { model, values }
    }

    pub fn get(&self, name: &str) -> Option<f64> {
        self.values.get(name).copied()
    }

    pub fn field(&self, field: Field) -> Option<f64> {
        self.get(field.as_str())
    }

    pub fn values(&self) -> &BTreeMap<String, f64> {
        &self.values
    }
}

#[async_trait]
pub trait PredictionClient: Send + Sync + Debug {
    async fn predict(
        &self,
        model: ModelId,
        payload: &PredictionPayload,
    ) -> Result<Prediction, PredictionError>;
}

/// Client for `POST {base}/api/v1/endpoints/models/{model}/predict`.
#[derive(Debug, Clone)]
pub struct HttpPredictionClient {
    base_url: String,
    http: Client,
}

impl HttpPredictionClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            http: Client::new(),
        }
    }

    pub fn predict_url(&self, model: ModelId) -> String {
        format!("{}{API_PATH}/models/{model}/predict", self.base_url)
    }
}

#[async_trait]
impl PredictionClient for HttpPredictionClient {
    async fn predict(
        &self,
        model: ModelId,
        payload: &PredictionPayload,
    ) -> Result<Prediction, PredictionError> {
        let url = self.predict_url(model);
        tracing::info!(%model, days = payload.len(), "requesting prediction");

        let res = self
            .http
            .post(&url)
            .json(payload)
            .send()
            .await
            .map_err(|e| PredictionError::Network(url.clone(), e))?;

        let status = res.status();
        let body = res
            .text()
            .await
            .map_err(|e| PredictionError::Network(url.clone(), e))?;

        if !status.is_success() {
            return Err(PredictionError::Status {
                status,
                body: truncate_body(&body),
            });
        }

        parse_prediction(model, &body)
    }
}

/// Read `{ "Result": { <field>: <number>, ... } }`.
///
/// Members that are not finite numbers are skipped, so the caller sees those
/// predictions as absent. A body without a `Result` object is an error.
pub fn parse_prediction(model: ModelId, body: &str) -> Result<Prediction, PredictionError> {
    let parsed: Value = serde_json::from_str(body)?;

    let result = parsed
        .get("Result")
        .ok_or_else(|| PredictionError::UnexpectedShape("missing 'Result' member".to_string()))?
        .as_object()
        .ok_or_else(|| PredictionError::UnexpectedShape("'Result' is not an object".to_string()))?;

    let mut values = BTreeMap::new();
    for (name, value) in result {
        match value.as_f64().filter(|v| v.is_finite()) {
            Some(v) => {
                values.insert(name.clone(), v);
            }
            None => tracing::debug!(%model, field = %name, "ignoring non-numeric prediction value"),
        }
    }

    Ok(Prediction::new(model, values))
}

/// Construct the HTTP prediction client from config.
pub fn client_from_config(config: &Config) -> HttpPredictionClient {
    HttpPredictionClient::new(config.prediction.base_url.as_str())
}

fn truncate_body(body: &str) -> String {
    const MAX: usize = 200;
    match body.char_indices().nth(MAX) {
        Some((cut, _)) => format!("{}...", &body[..cut]),
        None => body.to_string(),
    }
}
