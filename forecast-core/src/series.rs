//! Un-aligned per-location series for trend and anomaly views.

use chrono::NaiveDate;
use serde::Serialize;

use crate::model::{Field, WeatherRecord};

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SeriesPoint {
    pub date: NaiveDate,
    pub value: f64,
}

/// Every present value of one field for one location, ascending by date.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LocationSeries {
    pub location: String,
    pub field: Field,
    pub points: Vec<SeriesPoint>,
}

impl LocationSeries {
    pub fn mean(&self) -> Option<f64> {
        if self.points.is_empty() {
            return None;
        }
        Some(self.points.iter().map(|p| p.value).sum::<f64>() / self.points.len() as f64)
    }

    pub fn min(&self) -> Option<f64> {
        self.points.iter().map(|p| p.value).reduce(f64::min)
    }

    pub fn max(&self) -> Option<f64> {
        self.points.iter().map(|p| p.value).reduce(f64::max)
    }

    /// Each value minus the series mean.
    pub fn anomalies(&self) -> Vec<SeriesPoint> {
        let Some(mean) = self.mean() else {
            return Vec::new();
        };
        self.points
            .iter()
            .map(|p| SeriesPoint {
                date: p.date,
                value: p.value - mean,
            })
            .collect()
    }
}

/// Collect `field` for `location`. Records whose value is missing are left
/// out; there are no calendar slots to keep here.
pub fn location_series(records: &[WeatherRecord], location: &str, field: Field) -> LocationSeries {
    let mut points: Vec<SeriesPoint> = records
        .iter()
        .filter(|r| r.location == location)
        .filter_map(|r| {
            r.get(field).value().map(|value| SeriesPoint {
                date: r.date,
                value,
            })
        })
        .collect();
    points.sort_by_key(|p| p.date);

    LocationSeries {
        location: location.to_string(),
        field,
        points,
    }
}
