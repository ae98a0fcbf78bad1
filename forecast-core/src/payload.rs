//! Request bodies for the prediction service.
//!
//! A payload is a JSON object keyed `Day0`, `Day1`, ... in chronological
//! order. Every entry carries the same keys: each field of the [`FieldSet`]
//! (missing values as `null`), then `DayIndex`, `Year`, `Month` and `Location`.

use serde::{Deserialize, Serialize, Serializer, ser::SerializeMap};

use crate::{
    model::{Field, Measurement, UnknownField, WeatherRecord},
    window::PredictionWindow,
};

/// Ordered, duplicate-free list of fields to put in each payload entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<String>", into = "Vec<String>")]
pub struct FieldSet(Vec<Field>);

impl FieldSet {
    /// The features the prediction models were trained on.
    pub const PREDICTION: [Field; 14] = [
        Field::MinTemp,
        Field::MaxTemp,
        Field::Rainfall,
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

    /// Later repeats of a field are ignored.
    pub fn new(fields: impl IntoIterator<Item = Field>) -> Self {
        let mut unique = Vec::new();
        for field in fields {
            if !unique.contains(&field) {
                unique.push(field);
            }
        }
        Self(unique)
    }

    pub fn all() -> Self {
        Self(Field::ALL.to_vec())
    }

    pub fn from_names<S: AsRef<str>>(names: &[S]) -> Result<Self, UnknownField> {
        let fields = names
            .iter()
            .map(|name| name.as_ref().parse::<Field>())
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self::new(fields))
    }

    pub fn fields(&self) -> &[Field] {
        &self.0
    }

    pub fn contains(&self, field: Field) -> bool {
        self.0.contains(&field)
    }
}

impl Default for FieldSet {
    fn default() -> Self {
        Self(Self::PREDICTION.to_vec())
    }
}

impl TryFrom<Vec<String>> for FieldSet {
    type Error = UnknownField;

    fn try_from(names: Vec<String>) -> Result<Self, Self::Error> {
        Self::from_names(&names)
    }
}

impl From<FieldSet> for Vec<String> {
    fn from(set: FieldSet) -> Self {
        set.0.iter().map(|f| f.as_str().to_string()).collect()
    }
}

/// One `DayN` value of a [`PredictionPayload`].
#[derive(Debug, Clone, PartialEq)]
pub struct PayloadEntry {
    values: Vec<(Field, Measurement)>,
    pub day_index: i64,
    pub year: i32,
    pub month: u32,
    pub location: String,
}

impl PayloadEntry {
    fn from_record(record: &WeatherRecord, fields: &FieldSet) -> Self {
        Self {
            values: fields.fields().iter().map(|f| (*f, record.get(*f))).collect(),
            day_index: record.day_index(),
            year: record.year(),
            month: record.month(),
            location: record.location.clone(),
        }
    }

    pub fn get(&self, field: Field) -> Option<Measurement> {
        self.values.iter().find(|(f, _)| *f == field).map(|(_, v)| *v)
    }

    pub fn values(&self) -> &[(Field, Measurement)] {
        &self.values
    }
}

impl Serialize for PayloadEntry {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.values.len() + 4))?;
        for (field, value) in &self.values {
            map.serialize_entry(field.as_str(), value)?;
        }
        map.serialize_entry("DayIndex", &self.day_index)?;
        map.serialize_entry("Year", &self.year)?;
        map.serialize_entry("Month", &self.month)?;
        map.serialize_entry("Location", &self.location)?;
        map.end()
    }
}

/// Keyed request body, `Day0` being the earliest day of the window.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PredictionPayload {
    entries: Vec<PayloadEntry>,
}

impl PredictionPayload {
    pub fn entries(&self) -> &[PayloadEntry] {
        &self.entries
    }

    pub fn get(&self, key: &str) -> Option<&PayloadEntry> {
        let index: usize = key.strip_prefix("Day")?.parse().ok()?;
        self.entries.get(index)
    }

    pub fn keys(&self) -> impl Iterator<Item = String> + '_ {
        (0..self.entries.len()).map(day_key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    pub fn to_json_pretty(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

impl Serialize for PredictionPayload {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (index, entry) in self.entries.iter().enumerate() {
            map.serialize_entry(&day_key(index), entry)?;
        }
        map.end()
    }
}

fn day_key(index: usize) -> String {
    format!("Day{index}")
}

/// Build the payload for `window`, one entry per record in window order.
///
/// An empty window yields an empty payload.
pub fn build_payload(window: &PredictionWindow, fields: &FieldSet) -> PredictionPayload {
    PredictionPayload {
        entries: window
            .records()
            .iter()
            .map(|record| PayloadEntry::from_record(record, fields))
            .collect(),
    }
}
