//! Core library for the `forecast` CLI.
//!
//! This crate defines:
//! - Parsing of daily weather observation CSV files
//! - Calendar-aligned monthly series for charts
//! - Prior-day prediction windows and the request payloads built from them
//! - A client abstraction over the remote prediction models
//! - Configuration, data retrieval and station reference data
//!
//! It is used by `forecast-cli`, but can also be reused by other binaries or services.

pub mod calendar;
pub mod config;
pub mod error;
pub mod model;
pub mod parser;
pub mod payload;
pub mod pipeline;
pub mod prediction;
pub mod reference;
pub mod retrieval;
pub mod series;
pub mod window;

pub use calendar::{DailySeriesPoint, MonthSeries, YearMonth, align_month};
pub use config::{Config, DataConfig, PredictionConfig};
pub use error::{CalendarError, ParseError, PredictionError, RetrievalError};
pub use model::{Field, Measurement, RecordSet, WeatherRecord};
pub use parser::{ColumnLayout, parse_csv, parse_line};
pub use payload::{FieldSet, PredictionPayload, build_payload};
pub use pipeline::{Outcome, PipelineSettings, PredictionPipeline, PredictionRequest, PredictionStatus};
pub use prediction::{HttpPredictionClient, ModelId, Prediction, PredictionClient};
pub use reference::ReferenceData;
pub use retrieval::{DataSource, HttpDataSource, LocalDataSource, fetch_records};
pub use series::{LocationSeries, location_series};
pub use window::{PredictionWindow, select_window};
