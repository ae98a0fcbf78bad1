use anyhow::{Context, Result, anyhow};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use forecast_core::{
    Config, Field, FieldSet, ModelId, Outcome, PredictionPipeline, PredictionRequest, RecordSet,
    ReferenceData, YearMonth, align_month, fetch_records, location_series, parser::parse_date,
    prediction::client_from_config, reference::canonical_location,
    retrieval::data_source_from_config, window::MAX_LOOKBACK_DAYS,
};
use inquire::{Confirm, CustomType, Select, Text};
use std::{path::PathBuf, sync::Arc};

use crate::output;

/// Top-level CLI struct.
#[derive(Debug, Parser)]
#[command(name = "forecast", version, about = "Weather observation series and predictions")]
pub struct Cli {
    /// Use this config file instead of the platform default.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Configure data and prediction service settings.
    ///
    /// Without options, asks interactively.
    Configure {
        /// Base URL of the prediction service.
        #[arg(long)]
        service_url: Option<String>,

        /// Base URL serving `/data/{file}.csv`.
        #[arg(long)]
        data_url: Option<String>,

        /// Read CSV files from a local directory instead.
        #[arg(long)]
        data_dir: Option<PathBuf>,

        /// Default model: linear, ridge or lasso.
        #[arg(long)]
        model: Option<ModelId>,

        /// Number of prior days in a prediction window.
        #[arg(long, value_parser = lookback_parser())]
        lookback: Option<u32>,

        /// Comma-separated payload fields, e.g. "MinTemp,MaxTemp".
        #[arg(long, value_delimiter = ',')]
        fields: Option<Vec<Field>>,

        /// Call the model even when the window has no observations.
        #[arg(long)]
        call_empty: Option<bool>,
    },

    /// Show one month of observations, one row per calendar day.
    Month {
        /// Location name, e.g. "Melbourne" or "Melbourne Airport".
        location: String,

        #[arg(long)]
        year: i32,

        /// Month number, 1-12.
        #[arg(long)]
        month: u32,

        #[arg(long, value_delimiter = ',', default_value = "MinTemp,MaxTemp")]
        fields: Vec<Field>,

        /// Print JSON instead of a table.
        #[arg(long)]
        json: bool,
    },

    /// Print the prediction payload for a date without calling the model.
    Window {
        location: String,

        /// Date to predict (dd-mm-yyyy or yyyy-mm-dd); excluded from the window.
        #[arg(long)]
        date: String,

        /// Override the configured lookback.
        #[arg(long, value_parser = lookback_parser())]
        lookback: Option<u32>,
    },

    /// Request a prediction for a date.
    Predict {
        location: String,

        #[arg(long)]
        date: String,

        /// Model to use; defaults to the configured one.
        #[arg(long)]
        model: Option<ModelId>,

        #[arg(long)]
        json: bool,
    },

    /// Show every observation of one field for a location, with anomalies.
    Series {
        location: String,

        #[arg(long, default_value = "MinTemp")]
        field: Field,

        #[arg(long)]
        json: bool,
    },

    /// List known locations, optionally for one state.
    Locations {
        #[arg(long)]
        state: Option<String>,
    },
}

impl Cli {
    pub async fn run(self) -> Result<()> {
        let config = match &self.config {
            Some(path) => Config::load_from(path)?,
            None => Config::load()?,
        };

        match self.command {
            Command::Configure {
                service_url,
                data_url,
                data_dir,
                model,
                lookback,
                fields,
                call_empty,
            } => {
                let mut config = config;
                let changes = ConfigChanges {
                    service_url,
                    data_url,
                    data_dir,
                    model,
                    lookback,
                    fields,
                    call_empty,
                };
                if changes.is_empty() {
                    configure_interactive(&mut config)?;
                } else {
                    changes.apply(&mut config);
                }

                let path = match &self.config {
                    Some(path) => {
                        config.save_to(path)?;
                        path.clone()
                    }
                    None => config.save()?,
                };
                println!("Configuration saved to {}", path.display());
            }
            Command::Month {
                location,
                year,
                month,
                fields,
                json,
            } => {
                let month = YearMonth::new(year, month)?;
                let records = load_records(&config, &config.data.raw_file).await?;
                let location = resolve_location(&records, &location);
                let series = align_month(records.records(), &location, month, &fields);

                if json {
                    println!("{}", serde_json::to_string_pretty(&series)?);
                } else {
                    output::print_month(&series);
                }
            }
            Command::Window {
                location,
                date,
                lookback,
            } => {
                let anchor = parse_anchor(&date)?;
                let records = load_records(&config, &config.data.processed_file).await?;
                let request = PredictionRequest {
                    location: resolve_location(&records, &location),
                    anchor,
                    model: ModelId::default(),
                };

                let mut settings = config.pipeline_settings();
                if let Some(lookback) = lookback {
                    settings.lookback_days = lookback;
                }
                let pipeline = PredictionPipeline::new(
                    Arc::new(records),
                    Arc::new(client_from_config(&config)),
                    settings,
                );
                let (window, payload) = pipeline.prepare(&request);

                output::print_window_summary(&window);
                println!("{}", payload.to_json_pretty()?);
            }
            Command::Predict {
                location,
                date,
                model,
                json,
            } => {
                let model = match model {
                    Some(model) => model,
                    None => config.default_model_id()?,
                };
                let anchor = parse_anchor(&date)?;
                let records = load_records(&config, &config.data.processed_file).await?;
                let request = PredictionRequest {
                    location: resolve_location(&records, &location),
                    anchor,
                    model,
                };
                let pipeline = PredictionPipeline::new(
                    Arc::new(records),
                    Arc::new(client_from_config(&config)),
                    config.pipeline_settings(),
                );

                match pipeline.run(request).await {
                    Outcome::Current(view) if json => output::print_prediction_json(&view)?,
                    Outcome::Current(view) => output::print_prediction(&view),
                    Outcome::Stale(_) => {
                        return Err(anyhow!("Prediction was superseded by a newer request"));
                    }
                }
            }
            Command::Series {
                location,
                field,
                json,
            } => {
                let records = load_records(&config, &config.data.raw_file).await?;
                let location = resolve_location(&records, &location);
                let series = location_series(records.records(), &location, field);

                if json {
                    println!("{}", serde_json::to_string_pretty(&series)?);
                } else {
                    output::print_series(&series);
                }
            }
            Command::Locations { state } => {
                let reference = ReferenceData::australia();
                match state {
                    Some(state) => {
                        let cities = reference.cities_in(&state).ok_or_else(|| {
                            anyhow!("Unknown state '{state}'. Known states: NSW, VIC, QLD, SA, WA, TAS, NT, ACT.")
                        })?;
                        output::print_cities(&state.to_uppercase(), cities);
                    }
                    None => {
                        for entry in reference.states() {
                            output::print_cities(entry.code, entry.cities);
                        }
                    }
                }
            }
        }

        Ok(())
    }
}

#[derive(Debug, Default)]
struct ConfigChanges {
    service_url: Option<String>,
    data_url: Option<String>,
    data_dir: Option<PathBuf>,
    model: Option<ModelId>,
    lookback: Option<u32>,
    fields: Option<Vec<Field>>,
    call_empty: Option<bool>,
}

impl ConfigChanges {
    fn is_empty(&self) -> bool {
        self.service_url.is_none()
            && self.data_url.is_none()
            && self.data_dir.is_none()
            && self.model.is_none()
            && self.lookback.is_none()
            && self.fields.is_none()
            && self.call_empty.is_none()
    }

    fn apply(self, config: &mut Config) {
        if let Some(url) = self.service_url {
            config.prediction.base_url = url;
        }
        if let Some(url) = self.data_url {
            config.data.base_url = url;
            // an explicit URL switches back from a local directory
            config.data.data_dir = None;
        }
        if let Some(dir) = self.data_dir {
            config.data.data_dir = Some(dir);
        }
        if let Some(model) = self.model {
            config.set_default_model(model);
        }
        if let Some(lookback) = self.lookback {
            config.prediction.lookback_days = lookback;
        }
        if let Some(fields) = self.fields {
            config.prediction.fields = FieldSet::new(fields);
        }
        if let Some(call_empty) = self.call_empty {
            config.prediction.skip_empty_window = !call_empty;
        }
    }
}

fn configure_interactive(config: &mut Config) -> Result<()> {
    config.prediction.base_url = Text::new("Prediction service URL:")
        .with_default(&config.prediction.base_url)
        .prompt()
        .context("Failed to read prediction service URL")?;

    let local = Confirm::new("Read CSV files from a local directory?")
        .with_default(config.data.data_dir.is_some())
        .prompt()
        .context("Failed to read data source choice")?;

    if local {
        let current = config
            .data
            .data_dir
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_default();
        let dir = Text::new("Data directory:")
            .with_default(&current)
            .prompt()
            .context("Failed to read data directory")?;
        config.data.data_dir = Some(PathBuf::from(dir));
    } else {
        config.data.base_url = Text::new("Data endpoint URL:")
            .with_default(&config.data.base_url)
            .prompt()
            .context("Failed to read data endpoint URL")?;
        config.data.data_dir = None;
    }

    let models: Vec<ModelId> = ModelId::all().to_vec();
    let current = config.default_model_id().unwrap_or_default();
    let start = models.iter().position(|m| *m == current).unwrap_or(0);
    let model = Select::new("Default model:", models)
        .with_starting_cursor(start)
        .prompt()
        .context("Failed to read default model")?;
    config.set_default_model(model);

    config.prediction.lookback_days = CustomType::<u32>::new("Lookback days:")
        .with_default(config.prediction.lookback_days)
        .with_validator(|days: &u32| {
            Ok(if (1..=MAX_LOOKBACK_DAYS).contains(days) {
                inquire::validator::Validation::Valid
            } else {
                inquire::validator::Validation::Invalid(
                    format!("must be between 1 and {MAX_LOOKBACK_DAYS}").into(),
                )
            })
        })
        .prompt()
        .context("Failed to read lookback days")?;

    Ok(())
}

fn lookback_parser() -> clap::builder::RangedI64ValueParser<u32> {
    clap::value_parser!(u32).range(1..=i64::from(MAX_LOOKBACK_DAYS))
}

/// Match `input` against the loaded locations; unknown names pass through in
/// dataset spelling with a warning, since they will show no observations.
fn resolve_location(records: &RecordSet, input: &str) -> String {
    match records.resolve_location(input) {
        Some(location) => location.to_string(),
        None => {
            let location = canonical_location(input);
            tracing::warn!(%location, "no observations for this location");
            location
        }
    }
}

async fn load_records(config: &Config, file_name: &str) -> Result<RecordSet> {
    let source = data_source_from_config(config);
    fetch_records(source.as_ref(), file_name)
        .await
        .with_context(|| format!("Weather data unavailable ({file_name})"))
}

fn parse_anchor(text: &str) -> Result<NaiveDate> {
    parse_date(text).map_err(|e| anyhow!("Invalid --date '{text}': {e}"))
}
