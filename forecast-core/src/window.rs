//! Prior-day feature windows for prediction requests.

use chrono::{Days, NaiveDate};

use crate::model::WeatherRecord;

/// Lookback used when nothing else is configured: the 14 days `[D-14, D-1]`.
pub const DEFAULT_LOOKBACK_DAYS: u32 = 14;

/// Longest lookback accepted anywhere; larger requests are clamped to it.
pub const MAX_LOOKBACK_DAYS: u32 = 366;

/// Records of one location over `[anchor - lookback_days, anchor - 1]`,
/// ascending by date.
///
/// Days without a record are simply absent; nothing is padded.
#[derive(Debug, Clone, PartialEq)]
pub struct PredictionWindow {
    location: String,
    anchor: NaiveDate,
    lookback_days: u32,
    records: Vec<WeatherRecord>,
}

impl PredictionWindow {
    pub fn location(&self) -> &str {
        &self.location
    }

    /// The day being predicted. Never part of the window.
    pub fn anchor(&self) -> NaiveDate {
        self.anchor
    }

    pub fn lookback_days(&self) -> u32 {
        self.lookback_days
    }

    pub fn records(&self) -> &[WeatherRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// First and last day of the interval, or `None` for a zero-day lookback.
    pub fn interval(&self) -> Option<(NaiveDate, NaiveDate)> {
        interval(self.anchor, self.lookback_days)
    }

    /// Days inside the interval that have no record.
    pub fn missing_days(&self) -> Vec<NaiveDate> {
        let Some((start, end)) = self.interval() else {
            return Vec::new();
        };

        let mut present = self.records.iter().map(|r| r.date).peekable();
        start
            .iter_days()
            .take(self.lookback_days as usize)
            .take_while(|day| *day <= end)
            .filter(|day| {
                if present.peek() == Some(day) {
                    present.next();
                    false
                } else {
                    true
                }
            })
            .collect()
    }
}

fn interval(anchor: NaiveDate, lookback_days: u32) -> Option<(NaiveDate, NaiveDate)> {
    if lookback_days == 0 {
        return None;
    }
    let end = anchor.pred_opt()?;
    let start = anchor
        .checked_sub_days(Days::new(u64::from(lookback_days)))
        .unwrap_or(NaiveDate::MIN);
    Some((start, end))
}

/// Select the window for `location` preceding `anchor`.
///
/// If several records share a date, the first one in `records` is kept.
/// `lookback_days` is clamped to [`MAX_LOOKBACK_DAYS`].
pub fn select_window(
    records: &[WeatherRecord],
    location: &str,
    anchor: NaiveDate,
    lookback_days: u32,
) -> PredictionWindow {
    let lookback_days = lookback_days.min(MAX_LOOKBACK_DAYS);
    let mut selected: Vec<WeatherRecord> = match interval(anchor, lookback_days) {
        Some((start, end)) => records
            .iter()
            .filter(|r| r.location == location && r.date >= start && r.date <= end)
            .cloned()
            .collect(),
        None => Vec::new(),
    };

    // stable sort keeps the first of any same-day records in front
    selected.sort_by_key(|r| r.date);
    selected.dedup_by_key(|r| r.date);

    tracing::debug!(
        location,
        %anchor,
        lookback_days,
        selected = selected.len(),
        "selected prediction window"
    );

    PredictionWindow {
        location: location.to_string(),
        anchor,
        lookback_days,
        records: selected,
    }
}
