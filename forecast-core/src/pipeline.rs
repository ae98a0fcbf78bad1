//! One prediction request end to end: window → payload → remote model.
//!
//! Every run is tagged with a [`RequestToken`]. When parameters change while
//! an earlier request is still in flight, the earlier result comes back as
//! [`Outcome::Stale`] and must not be displayed.

use chrono::NaiveDate;
use std::sync::{
    Arc,
    atomic::{AtomicU64, Ordering},
};

use crate::{
    error::PredictionError,
    model::{Field, RecordSet},
    payload::{FieldSet, PredictionPayload, build_payload},
    prediction::{ModelId, Prediction, PredictionClient},
    window::{DEFAULT_LOOKBACK_DAYS, PredictionWindow, select_window},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RequestToken(u64);

/// Hands out increasing tokens and remembers the newest.
#[derive(Debug, Default)]
pub struct RequestSequencer {
    latest: AtomicU64,
}

impl RequestSequencer {
    pub fn issue(&self) -> RequestToken {
        RequestToken(self.latest.fetch_add(1, Ordering::SeqCst) + 1)
    }

    pub fn is_current(&self, token: RequestToken) -> bool {
        self.latest.load(Ordering::SeqCst) == token.0
    }
}

/// A displayed value that only ever moves forward in request order.
#[derive(Debug)]
pub struct LatestValue<T> {
    applied: Option<RequestToken>,
    value: Option<T>,
}

impl<T> Default for LatestValue<T> {
    fn default() -> Self {
        Self {
            applied: None,
            value: None,
        }
    }
}

impl<T> LatestValue<T> {
    /// Store `value` unless a result of the same or a newer request is
    /// already applied. Returns whether it was stored.
    pub fn apply(&mut self, token: RequestToken, value: T) -> bool {
        if self.applied.is_some_and(|applied| applied >= token) {
            return false;
        }
        self.applied = Some(token);
        self.value = Some(value);
        true
    }

    pub fn get(&self) -> Option<&T> {
        self.value.as_ref()
    }

    pub fn token(&self) -> Option<RequestToken> {
        self.applied
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineSettings {
    pub lookback_days: u32,
    pub fields: FieldSet,
    /// Don't call the model when the window has no records.
    pub skip_empty_window: bool,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            lookback_days: DEFAULT_LOOKBACK_DAYS,
            fields: FieldSet::default(),
            skip_empty_window: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PredictionRequest {
    pub location: String,
    pub anchor: NaiveDate,
    pub model: ModelId,
}

#[derive(Debug)]
pub enum PredictionStatus {
    Predicted(Prediction),
    /// Empty window; the model was not called.
    Skipped,
    Failed(PredictionError),
}

#[derive(Debug)]
pub struct PredictionView {
    pub request: PredictionRequest,
    pub token: RequestToken,
    pub window: PredictionWindow,
    pub payload: PredictionPayload,
    pub status: PredictionStatus,
}

impl PredictionView {
    pub fn prediction(&self) -> Option<&Prediction> {
        match &self.status {
            PredictionStatus::Predicted(prediction) => Some(prediction),
            _ => None,
        }
    }

    pub fn predicted(&self, field: Field) -> Option<f64> {
        self.prediction().and_then(|p| p.field(field))
    }

    /// Observed values over the window followed by the predicted value at the
    /// anchor date, when there is one.
    pub fn series(&self, field: Field) -> Vec<(NaiveDate, Option<f64>)> {
        let mut points: Vec<_> = self
            .window
            .records()
            .iter()
            .map(|r| (r.date, r.get(field).value()))
            .collect();

        if let Some(value) = self.predicted(field) {
            points.push((self.request.anchor, Some(value)));
        }
        points
    }
}

#[derive(Debug)]
pub enum Outcome {
    Current(PredictionView),
    /// A newer request was issued before this one finished.
    Stale(RequestToken),
}

#[derive(Debug)]
pub struct PredictionPipeline {
    records: Arc<RecordSet>,
    client: Arc<dyn PredictionClient>,
    settings: PipelineSettings,
    sequencer: RequestSequencer,
}

impl PredictionPipeline {
    pub fn new(
        records: Arc<RecordSet>,
        client: Arc<dyn PredictionClient>,
        settings: PipelineSettings,
    ) -> Self {
        Self {
            records,
            client,
            settings,
            sequencer: RequestSequencer::default(),
        }
    }

    pub fn records(&self) -> &RecordSet {
        &self.records
    }

    pub fn settings(&self) -> &PipelineSettings {
        &self.settings
    }

    pub fn sequencer(&self) -> &RequestSequencer {
        &self.sequencer
    }

    /// Window and payload for `request`, without calling the model.
    pub fn prepare(&self, request: &PredictionRequest) -> (PredictionWindow, PredictionPayload) {
        let window = select_window(
            self.records.records(),
            &request.location,
            request.anchor,
            self.settings.lookback_days,
        );
        let payload = build_payload(&window, &self.settings.fields);
        (window, payload)
    }

    pub async fn run(&self, request: PredictionRequest) -> Outcome {
        let token = self.sequencer.issue();
        let (window, payload) = self.prepare(&request);

        let status = if payload.is_empty() && self.settings.skip_empty_window {
            tracing::info!(
                location = %request.location,
                anchor = %request.anchor,
                "no observations in window, skipping prediction"
            );
            PredictionStatus::Skipped
        } else {
            match self.client.predict(request.model, &payload).await {
                Ok(prediction) => PredictionStatus::Predicted(prediction),
                Err(e) => {
                    tracing::warn!(
                        location = %request.location,
                        anchor = %request.anchor,
                        model = %request.model,
                        error = %e,
                        "prediction failed"
                    );
                    PredictionStatus::Failed(e)
                }
            }
        };

        if !self.sequencer.is_current(token) {
            tracing::debug!(?token, "discarding stale prediction result");
            return Outcome::Stale(token);
        }

        Outcome::Current(PredictionView {
            request,
            token,
            window,
            payload,
            status,
        })
    }
}
