//! End-to-end pipeline tests
//!
//! CSV text → records → window → payload → (fake) prediction service.

use async_trait::async_trait;
use chrono::{Datelike, Days, NaiveDate};
use forecast_core::{
    Field, FieldSet, ModelId, Outcome, PipelineSettings, Prediction, PredictionClient,
    PredictionError, PredictionPayload, PredictionPipeline, PredictionRequest, PredictionStatus,
    RecordSet, WeatherRecord, YearMonth, align_month, build_payload, parse_csv, select_window,
};
use proptest::prelude::*;
use std::{
    collections::{BTreeMap, BTreeSet},
    sync::{
        Arc, Mutex,
        atomic::{AtomicUsize, Ordering},
    },
};
use tokio::sync::Notify;

const HEADER: &str = "Date,Location,MinTemp,MaxTemp,Rainfall,Evaporation,Sunshine,WindGustDir,\
WindGustSpeed,WindDir9am,WindDir3pm,WindSpeed9am,WindSpeed3pm,Humidity9am,Humidity3pm,\
Pressure9am,Pressure3pm,Cloud9am,Cloud3pm,Temp9am,Temp3pm,RainToday,RainTomorrow";

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn melbourne_csv() -> String {
    format!(
        "{HEADER}\n\
         01-07-2008,Melbourne,10.2,20.5,0,NA,NA,W,44,W,WNW,20,24,71,22,1007.7,1007.1,8,NA,16.9,21.8,No,No\n\
         01-07-2008,Sydney,8.0,17.1,0.2,NA,NA,N,30,N,N,9,11,80,50,1020.1,1018.0,1,2,10.0,16.3,No,No\n\
         15-07-2008,Melbourne,NA,14.0,3.2,NA,NA,SW,52,SW,S,17,28,88,61,1011.2,1012.4,7,7,9.4,12.5,Yes,No\n"
    )
}

/// Answers every model call with the mean MinTemp of the payload.
#[derive(Debug, Default)]
struct MeanClient {
    calls: AtomicUsize,
    last_payload: Mutex<Option<String>>,
}

#[async_trait]
impl PredictionClient for MeanClient {
    async fn predict(&self, model: ModelId, payload: &PredictionPayload) -> Result<Prediction, PredictionError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.last_payload.lock().unwrap() = Some(payload.to_json()?);

        let temps: Vec<f64> = payload
            .entries()
            .iter()
            .filter_map(|e| e.get(Field::MinTemp).and_then(|m| m.value()))
            .collect();
        let mut values = BTreeMap::new();
        if !temps.is_empty() {
            values.insert("MinTemp".to_string(), temps.iter().sum::<f64>() / temps.len() as f64);
        }
        Ok(Prediction::new(model, values))
    }
}

#[derive(Debug)]
struct FailingClient;

#[async_trait]
impl PredictionClient for FailingClient {
    async fn predict(&self, _: ModelId, _: &PredictionPayload) -> Result<Prediction, PredictionError> {
        Err(PredictionError::UnexpectedShape("missing 'Result' member".into()))
    }
}

/// Holds `ridge` requests until released; answers everything else at once.
#[derive(Debug, Default)]
struct GatedClient {
    started: Notify,
    release: Notify,
}

#[async_trait]
impl PredictionClient for GatedClient {
    async fn predict(&self, model: ModelId, _: &PredictionPayload) -> Result<Prediction, PredictionError> {
        if model == ModelId::Ridge {
            self.started.notify_one();
            self.release.notified().await;
        }
        let mut values = BTreeMap::new();
        values.insert("MaxTemp".to_string(), if model == ModelId::Ridge { 1.0 } else { 2.0 });
        Ok(Prediction::new(model, values))
    }
}

fn request(location: &str, anchor: NaiveDate, model: ModelId) -> PredictionRequest {
    PredictionRequest {
        location: location.to_string(),
        anchor,
        model,
    }
}

#[test]
fn scenario_single_row_window_payload() {
    let records = parse_csv(&melbourne_csv());
    let window = select_window(records.records(), "Melbourne", date(2008, 7, 15), 14);

    assert_eq!(window.interval(), Some((date(2008, 7, 1), date(2008, 7, 14))));
    assert_eq!(window.len(), 1);

    let payload = build_payload(&window, &FieldSet::default());
    let json: serde_json::Value = serde_json::from_str(&payload.to_json().unwrap()).unwrap();
    let day0 = &json["Day0"];

    assert_eq!(json.as_object().unwrap().len(), 1);
    assert_eq!(day0["MinTemp"], 10.2);
    assert_eq!(day0["MaxTemp"], 20.5);
    assert_eq!(day0["Rainfall"], 0.0);
    assert!(day0["Cloud3pm"].is_null());
    assert_eq!(day0["Location"], "Melbourne");
    assert_eq!(day0["Year"], 2008);
    assert_eq!(day0["Month"], 7);
}

#[test]
fn scenario_na_row_still_fills_calendar_slot() {
    let records = parse_csv(&melbourne_csv());
    let series = align_month(
        records.records(),
        "Melbourne",
        YearMonth::new(2008, 7).unwrap(),
        &[Field::MinTemp, Field::MaxTemp],
    );

    assert_eq!(series.points.len(), 31);
    assert_eq!(series.value(15, Field::MinTemp), None);
    assert_eq!(series.value(15, Field::MaxTemp), Some(14.0));
    assert_eq!(series.value(1, Field::MinTemp), Some(10.2));
}

#[test]
fn scenario_unknown_location_gives_full_null_month() {
    let records = parse_csv(&melbourne_csv());
    let series = align_month(records.records(), "Darwin", YearMonth::new(2008, 2).unwrap(), &[Field::Rainfall]);

    assert_eq!(series.points.len(), 29);
    assert!(series.points.iter().all(|p| p.values == vec![None]));
}

#[test]
fn payload_is_byte_identical_across_runs() {
    let run = || {
        let records = parse_csv(&melbourne_csv());
        let window = select_window(records.records(), "Melbourne", date(2008, 7, 16), 14);
        build_payload(&window, &FieldSet::all()).to_json().unwrap()
    };

    assert_eq!(run(), run());
}

#[tokio::test]
async fn pipeline_merges_prediction_into_series() {
    let client = Arc::new(MeanClient::default());
    let pipeline = PredictionPipeline::new(
        Arc::new(parse_csv(&melbourne_csv())),
        client.clone(),
        PipelineSettings::default(),
    );

    let Outcome::Current(view) = pipeline.run(request("Melbourne", date(2008, 7, 15), ModelId::Ridge)).await else {
        panic!("only request should be current");
    };

    assert_eq!(client.calls.load(Ordering::SeqCst), 1);
    assert_eq!(view.window.len(), 1);
    assert_eq!(view.predicted(Field::MinTemp), Some(10.2));
    assert_eq!(view.predicted(Field::MaxTemp), None);
    assert_eq!(
        view.series(Field::MinTemp),
        vec![(date(2008, 7, 1), Some(10.2)), (date(2008, 7, 15), Some(10.2))]
    );
    // no predicted MaxTemp, so nothing is appended
    assert_eq!(view.series(Field::MaxTemp), vec![(date(2008, 7, 1), Some(20.5))]);

    let sent = client.last_payload.lock().unwrap().clone().unwrap();
    assert_eq!(sent, view.payload.to_json().unwrap());
}

#[tokio::test]
async fn empty_window_skips_remote_call_by_default() {
    let client = Arc::new(MeanClient::default());
    let pipeline = PredictionPipeline::new(
        Arc::new(parse_csv(&melbourne_csv())),
        client.clone(),
        PipelineSettings::default(),
    );

    let Outcome::Current(view) = pipeline.run(request("Melbourne", date(2010, 1, 1), ModelId::Linear)).await else {
        panic!("expected current outcome");
    };

    assert!(view.payload.is_empty());
    assert!(matches!(view.status, PredictionStatus::Skipped));
    assert_eq!(client.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn empty_window_calls_remote_when_configured() {
    let client = Arc::new(MeanClient::default());
    let settings = PipelineSettings {
        skip_empty_window: false,
        ..PipelineSettings::default()
    };
    let pipeline = PredictionPipeline::new(Arc::new(RecordSet::default()), client.clone(), settings);

    let outcome = pipeline.run(request("Melbourne", date(2010, 1, 1), ModelId::Linear)).await;

    assert!(matches!(outcome, Outcome::Current(_)));
    assert_eq!(client.calls.load(Ordering::SeqCst), 1);
    assert_eq!(client.last_payload.lock().unwrap().as_deref(), Some("{}"));
}

#[tokio::test]
async fn failed_prediction_is_reported_not_fatal() {
    let pipeline = PredictionPipeline::new(
        Arc::new(parse_csv(&melbourne_csv())),
        Arc::new(FailingClient),
        PipelineSettings::default(),
    );

    let Outcome::Current(view) = pipeline.run(request("Melbourne", date(2008, 7, 15), ModelId::Lasso)).await else {
        panic!("expected current outcome");
    };

    assert!(matches!(view.status, PredictionStatus::Failed(PredictionError::UnexpectedShape(_))));
    assert_eq!(view.predicted(Field::MinTemp), None);
    assert_eq!(view.series(Field::MinTemp).len(), 1);
}

#[tokio::test]
async fn superseded_request_comes_back_stale() {
    let client = Arc::new(GatedClient::default());
    let pipeline = PredictionPipeline::new(
        Arc::new(parse_csv(&melbourne_csv())),
        client.clone(),
        PipelineSettings::default(),
    );

    let first = pipeline.run(request("Melbourne", date(2008, 7, 15), ModelId::Ridge));
    tokio::pin!(first);

    // drive the first request until it is waiting on the model
    tokio::select! {
        biased;
        _ = &mut first => panic!("gated request finished early"),
        _ = client.started.notified() => {}
    }

    let second = pipeline.run(request("Melbourne", date(2008, 7, 15), ModelId::Linear)).await;
    client.release.notify_one();
    let first = first.await;

    let Outcome::Current(view) = second else {
        panic!("newest request must be current");
    };
    assert_eq!(view.predicted(Field::MaxTemp), Some(2.0));
    assert!(matches!(first, Outcome::Stale(_)));
}

fn arb_records() -> impl Strategy<Value = Vec<WeatherRecord>> {
    let location = prop::sample::select(vec!["Melbourne", "Sydney", "Perth"]);
    // days from 2008-01-01 over roughly two years
    let record = (0u64..730, location, prop::option::of(-5.0f64..45.0)).prop_map(|(offset, location, min)| {
        let mut record = WeatherRecord::new(date(2008, 1, 1) + Days::new(offset), location);
        record.set(Field::MinTemp, min.into());
        record
    });
    prop::collection::vec(record, 0..200)
}

proptest! {
    #[test]
    fn aligned_month_length_matches_calendar(records in arb_records(), year in 2007i32..2011, month in 1u32..=12) {
        let ym = YearMonth::new(year, month).unwrap();
        let series = align_month(&records, "Melbourne", ym, &[Field::MinTemp]);

        prop_assert_eq!(series.points.len() as u32, ym.days_in_month());
        for (i, point) in series.points.iter().enumerate() {
            prop_assert_eq!(point.day_of_month as usize, i + 1);
        }
    }

    #[test]
    fn window_stays_inside_interval(records in arb_records(), offset in 0u64..760, lookback in 0u32..30) {
        let anchor = date(2008, 1, 1) + Days::new(offset);
        let window = select_window(&records, "Sydney", anchor, lookback);

        prop_assert!(window.len() <= lookback as usize);
        for pair in window.records().windows(2) {
            prop_assert!(pair[0].date < pair[1].date);
        }
        for record in window.records() {
            prop_assert_eq!(record.location.as_str(), "Sydney");
            prop_assert!(record.date < anchor);
            prop_assert!(record.date >= anchor - Days::new(u64::from(lookback)));
        }
    }

    #[test]
    fn payload_keys_are_dense_and_chronological(records in arb_records(), offset in 0u64..760) {
        let anchor = date(2008, 1, 1) + Days::new(offset);
        let window = select_window(&records, "Perth", anchor, 14);
        let payload = build_payload(&window, &FieldSet::default());

        let value = serde_json::to_value(&payload).unwrap();
        let object = value.as_object().unwrap();

        let keys: BTreeSet<String> = object.keys().cloned().collect();
        let expected: BTreeSet<String> = (0..window.len()).map(|i| format!("Day{i}")).collect();
        prop_assert_eq!(keys, expected);

        for (i, record) in window.records().iter().enumerate() {
            let day = &object[&format!("Day{i}")];
            prop_assert_eq!(day["DayIndex"].as_i64(), Some(record.day_index()));
            prop_assert_eq!(day["Year"].as_i64(), Some(i64::from(record.date.year())));
            prop_assert_eq!(day["Month"].as_u64(), Some(u64::from(record.date.month())));
            prop_assert_eq!(day["Location"].as_str(), Some("Perth"));
        }
    }
}
