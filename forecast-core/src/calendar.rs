//! Calendar-dense monthly series for charts.

use chrono::{Datelike, NaiveDate};
use serde::{
    Serialize, Serializer,
    ser::{SerializeMap, SerializeSeq, SerializeStruct},
};

use crate::{
    error::CalendarError,
    model::{Field, WeatherRecord},
};

/// A (year, month) pair with a valid month.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct YearMonth {
    year: i32,
    month: u32,
}

impl YearMonth {
    pub fn new(year: i32, month: u32) -> Result<Self, CalendarError> {
        if !(1..=12).contains(&month) {
            return Err(CalendarError::InvalidMonth(month));
        }
        NaiveDate::from_ymd_opt(year, month, 1).ok_or(CalendarError::InvalidYear(year))?;
        Ok(Self { year, month })
    }

    pub fn of(date: NaiveDate) -> Self {
        Self {
            year: date.year(),
            month: date.month(),
        }
    }

    pub fn year(&self) -> i32 {
        self.year
    }

    pub fn month(&self) -> u32 {
        self.month
    }

    pub fn days_in_month(&self) -> u32 {
        days_in_month(self.year, self.month)
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        date.year() == self.year && date.month() == self.month
    }
}

/// Number of days in the given month; 0 for an invalid month.
pub fn days_in_month(year: i32, month: u32) -> u32 {
    let first = NaiveDate::from_ymd_opt(year, month, 1);
    let next = if month == 12 {
        NaiveDate::from_ymd_opt(year + 1, 1, 1)
    } else {
        NaiveDate::from_ymd_opt(year, month + 1, 1)
    };

    match (first, next) {
        (Some(first), Some(next)) => u32::try_from((next - first).num_days()).unwrap_or(0),
        // December of the last representable year
        (Some(_), None) => 31,
        _ => 0,
    }
}

/// One calendar day of a [`MonthSeries`]. `None` means no value for that day.
#[derive(Debug, Clone, PartialEq)]
pub struct DailySeriesPoint {
    pub day_of_month: u32,
    pub values: Vec<Option<f64>>,
}

impl DailySeriesPoint {
    pub fn is_gap(&self) -> bool {
        self.values.iter().all(Option::is_none)
    }
}

/// Requested fields of one location over one month, one point per day.
#[derive(Debug, Clone, PartialEq)]
pub struct MonthSeries {
    pub location: String,
    pub month: YearMonth,
    pub fields: Vec<Field>,
    pub points: Vec<DailySeriesPoint>,
}

impl MonthSeries {
    /// Value of `field` on `day` (1-based).
    pub fn value(&self, day: u32, field: Field) -> Option<f64> {
        let column = self.fields.iter().position(|f| *f == field)?;
        let point = self.points.get(usize::try_from(day).ok()?.checked_sub(1)?)?;
        point.values.get(column).copied().flatten()
    }

    /// Days with no value for any requested field.
    pub fn gap_days(&self) -> Vec<u32> {
        self.points
            .iter()
            .filter(|p| p.is_gap())
            .map(|p| p.day_of_month)
            .collect()
    }
}

/// Align `records` for `location` onto every day of `month`.
///
/// The result always has `month.days_in_month()` points. Days without a record
/// get `None` for every field; so do fields whose value is missing. If more
/// than one record falls on the same day, the first one in `records` wins.
pub fn align_month(
    records: &[WeatherRecord],
    location: &str,
    month: YearMonth,
    fields: &[Field],
) -> MonthSeries {
    let days = month.days_in_month() as usize;
    let mut slots: Vec<Option<&WeatherRecord>> = vec![None; days];

    for record in records
        .iter()
        .filter(|r| r.location == location && month.contains(r.date))
    {
        let slot = &mut slots[record.date.day0() as usize];
        if slot.is_none() {
            *slot = Some(record);
        }
    }

    let points = slots
        .into_iter()
        .zip(1u32..)
        .map(|(slot, day_of_month)| DailySeriesPoint {
            day_of_month,
            values: fields
                .iter()
                .map(|field| slot.and_then(|r| r.get(*field).value()))
                .collect(),
        })
        .collect();

    tracing::debug!(
        location,
        year = month.year(),
        month = month.month(),
        "aligned month series"
    );

    MonthSeries {
        location: location.to_string(),
        month,
        fields: fields.to_vec(),
        points,
    }
}

/// Serializes as `{ location, year, month, points: [{ "day": 1, "MinTemp": .. }, ..] }`.
impl Serialize for MonthSeries {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut s = serializer.serialize_struct("MonthSeries", 4)?;
        s.serialize_field("location", &self.location)?;
        s.serialize_field("year", &self.month.year())?;
        s.serialize_field("month", &self.month.month())?;
        s.serialize_field(
            "points",
            &Rows {
                fields: &self.fields,
                points: &self.points,
            },
        )?;
        s.end()
    }
}

struct Rows<'a> {
    fields: &'a [Field],
    points: &'a [DailySeriesPoint],
}

struct Row<'a> {
    fields: &'a [Field],
    point: &'a DailySeriesPoint,
}

impl Serialize for Rows<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut seq = serializer.serialize_seq(Some(self.points.len()))?;
        for point in self.points {
            seq.serialize_element(&Row {
                fields: self.fields,
                point,
            })?;
        }
        seq.end()
    }
}

impl Serialize for Row<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.fields.len() + 1))?;
        map.serialize_entry("day", &self.point.day_of_month)?;
        for (field, value) in self.fields.iter().zip(&self.point.values) {
            map.serialize_entry(field.as_str(), value)?;
        }
        map.end()
    }
}
