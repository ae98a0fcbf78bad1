use thiserror::Error;

/// Why a CSV line did not become a [`WeatherRecord`](crate::model::WeatherRecord).
///
/// Every variant means "discard this line"; batch parsing never surfaces them.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ParseError {
    #[error("line is a header row")]
    HeaderRow,

    #[error("line is empty")]
    EmptyLine,

    #[error("missing column '{0}'")]
    MissingColumn(&'static str),

    #[error("location is empty")]
    MissingLocation,

    #[error("invalid date '{0}'")]
    InvalidDate(String),

    #[error("malformed CSV line: {0}")]
    Csv(String),
}

#[derive(Debug, Error)]
pub enum RetrievalError {
    #[error("Invalid data file name '{0}': only plain '.csv' file names are served")]
    InvalidFileName(String),

    #[error("Data file '{0}' not found")]
    NotFound(String),

    #[error("Data request for '{file}' failed with status {status}: {body}")]
    Status {
        file: String,
        status: reqwest::StatusCode,
        body: String,
    },

    #[error("Network request failed for {0}")]
    Network(String, #[source] reqwest::Error),

    #[error("Failed to read data file '{0}'")]
    Io(String, #[source] std::io::Error),
}

#[derive(Debug, Error)]
pub enum PredictionError {
    #[error("Unknown model '{0}'. Supported models: linear, ridge, lasso.")]
    UnknownModel(String),

    #[error("Failed to send prediction request to {0}")]
    Network(String, #[source] reqwest::Error),

    #[error("Prediction request failed with status {status}: {body}")]
    Status {
        status: reqwest::StatusCode,
        body: String,
    },

    #[error("Failed to parse prediction response JSON")]
    Json(#[from] serde_json::Error),

    #[error("Unexpected prediction response shape: {0}")]
    UnexpectedShape(String),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CalendarError {
    #[error("month {0} is out of range 1..=12")]
    InvalidMonth(u32),

    #[error("year {0} is out of the supported calendar range")]
    InvalidYear(i32),
}
