use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize, Serializer};
use std::{
    collections::{BTreeSet, HashSet},
    fmt,
    str::FromStr,
};

use crate::reference::canonical_location;

/// `NaiveDate::num_days_from_ce` of 2000-01-01, the origin of `DayIndex`.
const DAY_INDEX_EPOCH_FROM_CE: i32 = 730_120;

/// A numeric observation that may be explicitly absent.
///
/// `Missing` is never the same thing as zero: it serializes to JSON `null`
/// and aligns to an empty chart slot.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum Measurement {
    #[default]
    Missing,
    Value(f64),
}

impl Measurement {
    /// Coerce a CSV cell. Anything that does not parse to a finite number
    /// (`NA`, empty, `NaN`, `inf`) is `Missing`.
    pub fn from_text(text: &str) -> Self {
        match text.trim().parse::<f64>() {
            Ok(v) if v.is_finite() => Measurement::Value(v),
            _ => Measurement::Missing,
        }
    }

    pub fn value(self) -> Option<f64> {
        match self {
            Measurement::Value(v) => Some(v),
            Measurement::Missing => None,
        }
    }

    pub fn is_missing(self) -> bool {
        matches!(self, Measurement::Missing)
    }
}

impl From<Option<f64>> for Measurement {
    fn from(value: Option<f64>) -> Self {
        match value {
            Some(v) if v.is_finite() => Measurement::Value(v),
            _ => Measurement::Missing,
        }
    }
}

impl Serialize for Measurement {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Measurement::Value(v) => serializer.serialize_f64(*v),
            Measurement::Missing => serializer.serialize_none(),
        }
    }
}

/// Named numeric columns of the daily observation file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Field {
    MinTemp,
    MaxTemp,
    Rainfall,
    Evaporation,
    Sunshine,
    WindGustSpeed,
    WindSpeed9am,
    WindSpeed3pm,
    Humidity9am,
    Humidity3pm,
    Pressure9am,
    Pressure3pm,
    Cloud9am,
    Cloud3pm,
    Temp9am,
    Temp3pm,
}

impl Field {
    pub const COUNT: usize = 16;

    pub const ALL: [Field; Field::COUNT] = [
        Field::MinTemp,
        Field::MaxTemp,
        Field::Rainfall,
        Field::Evaporation,
        Field::Sunshine,
        Field::WindGustSpeed,
        Field::WindSpeed9am,
        Field::WindSpeed3pm,
        Field::Humidity9am,
        Field::Humidity3pm,
        Field::Pressure9am,
        Field::Pressure3pm,
        Field::Cloud9am,
        Field::Cloud3pm,
        Field::Temp9am,
        Field::Temp3pm,
    ];

    /// Column name as it appears in the CSV header and in payloads.
    pub fn as_str(&self) -> &'static str {
        match self {
            Field::MinTemp => "MinTemp",
            Field::MaxTemp => "MaxTemp",
            Field::Rainfall => "Rainfall",
            Field::Evaporation => "Evaporation",
            Field::Sunshine => "Sunshine",
            Field::WindGustSpeed => "WindGustSpeed",
            Field::WindSpeed9am => "WindSpeed9am",
            Field::WindSpeed3pm => "WindSpeed3pm",
            Field::Humidity9am => "Humidity9am",
            Field::Humidity3pm => "Humidity3pm",
            Field::Pressure9am => "Pressure9am",
            Field::Pressure3pm => "Pressure3pm",
            Field::Cloud9am => "Cloud9am",
            Field::Cloud3pm => "Cloud3pm",
            Field::Temp9am => "Temp9am",
            Field::Temp3pm => "Temp3pm",
        }
    }

    pub(crate) fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Field {
    type Err = UnknownField;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        Field::ALL
            .iter()
            .copied()
            .find(|field| field.as_str().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| UnknownField(s.to_string()))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unknown field '{0}'")]
pub struct UnknownField(pub String);

/// One parsed daily observation for one location.
#[derive(Debug, Clone, PartialEq)]
pub struct WeatherRecord {
    pub date: NaiveDate,
    pub location: String,
    measurements: [Measurement; Field::COUNT],
    pub wind_gust_dir: Option<String>,
    pub wind_dir_9am: Option<String>,
    pub wind_dir_3pm: Option<String>,
    pub rain_today: Option<bool>,
    pub rain_tomorrow: Option<bool>,
}

impl WeatherRecord {
    /// A record with every measurement `Missing`.
    pub fn new(date: NaiveDate, location: impl Into<String>) -> Self {
        Self {
            date,
            location: location.into(),
            measurements: [Measurement::Missing; Field::COUNT],
            wind_gust_dir: None,
            wind_dir_9am: None,
            wind_dir_3pm: None,
            rain_today: None,
            rain_tomorrow: None,
        }
    }

    pub fn get(&self, field: Field) -> Measurement {
        self.measurements[field.index()]
    }

    pub fn set(&mut self, field: Field, value: Measurement) {
        self.measurements[field.index()] = value;
    }

    /// Builder-style [`set`](Self::set).
    pub fn with(mut self, field: Field, value: f64) -> Self {
        self.set(field, Measurement::from(Some(value)));
        self
    }

    pub fn year(&self) -> i32 {
        self.date.year()
    }

    pub fn month(&self) -> u32 {
        self.date.month()
    }

    pub fn day_index(&self) -> i64 {
        day_index(self.date)
    }
}

/// Days since 2000-01-01.
pub fn day_index(date: NaiveDate) -> i64 {
    i64::from(date.num_days_from_ce() - DAY_INDEX_EPOCH_FROM_CE)
}

/// Inverse of [`day_index`].
pub fn date_from_day_index(index: i64) -> Option<NaiveDate> {
    let days = i32::try_from(index)
        .ok()?
        .checked_add(DAY_INDEX_EPOCH_FROM_CE)?;
    NaiveDate::from_num_days_from_ce_opt(days)
}

/// Parsed observations with at most one record per (date, location).
///
/// Built once per retrieval and shared read-only.
#[derive(Debug, Clone, Default)]
pub struct RecordSet {
    records: Vec<WeatherRecord>,
    duplicates: usize,
}

impl RecordSet {
    /// Keeps the first record seen for each (date, location); later ones are dropped.
    pub fn from_records(records: impl IntoIterator<Item = WeatherRecord>) -> Self {
        let mut seen = HashSet::new();
        let mut kept = Vec::new();
        let mut duplicates = 0;

        for record in records {
            if seen.insert((record.date, record.location.clone())) {
                kept.push(record);
            } else {
                tracing::debug!(
                    date = %record.date,
                    location = %record.location,
                    "dropping duplicate observation"
                );
                duplicates += 1;
            }
        }

        Self {
            records: kept,
            duplicates,
        }
    }

    pub fn records(&self) -> &[WeatherRecord] {
        &self.records
    }

    pub fn for_location<'a>(&'a self, location: &'a str) -> impl Iterator<Item = &'a WeatherRecord> {
        self.records.iter().filter(move |r| r.location == location)
    }

    /// The dataset's spelling of `name`, matched ignoring whitespace and ASCII
    /// case, e.g. "melbourne airport" → `MelbourneAirport`.
    pub fn resolve_location(&self, name: &str) -> Option<&str> {
        let wanted = canonical_location(name);
        self.records
            .iter()
            .map(|r| r.location.as_str())
            .find(|location| location.eq_ignore_ascii_case(&wanted))
    }

    pub fn locations(&self) -> BTreeSet<&str> {
        self.records.iter().map(|r| r.location.as_str()).collect()
    }

    /// Number of records discarded as duplicates while building the set.
    pub fn duplicates(&self) -> usize {
        self.duplicates
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl FromIterator<WeatherRecord> for RecordSet {
    fn from_iter<I: IntoIterator<Item = WeatherRecord>>(iter: I) -> Self {
        Self::from_records(iter)
    }
}
