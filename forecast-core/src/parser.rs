//! Turns delimited observation text into [`WeatherRecord`]s.
//!
//! Single lines go through [`parse_line`]; whole files through [`parse_csv`],
//! which detects the header, drops every line that fails to parse and
//! de-duplicates the result.

use chrono::NaiveDate;
use csv::{ReaderBuilder, StringRecord, Trim};

use crate::{
    error::ParseError,
    model::{Field, Measurement, RecordSet, WeatherRecord, date_from_day_index},
};

/// Positions of the numeric columns in the raw observation file.
const RAW_FIELD_COLUMNS: [(Field, usize); Field::COUNT] = [
    (Field::MinTemp, 2),
    (Field::MaxTemp, 3),
    (Field::Rainfall, 4),
    (Field::Evaporation, 5),
    (Field::Sunshine, 6),
    (Field::WindGustSpeed, 8),
    (Field::WindSpeed9am, 11),
    (Field::WindSpeed3pm, 12),
    (Field::Humidity9am, 13),
    (Field::Humidity3pm, 14),
    (Field::Pressure9am, 15),
    (Field::Pressure3pm, 16),
    (Field::Cloud9am, 17),
    (Field::Cloud3pm, 18),
    (Field::Temp9am, 19),
    (Field::Temp3pm, 20),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DateColumns {
    /// `dd-mm-yyyy`, `dd/mm/yyyy` or ISO text in one column.
    Text(usize),
    Parts { year: usize, month: usize, day: usize },
    /// Days since 2000-01-01.
    DayIndex(usize),
}

/// Which column holds what.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnLayout {
    date: DateColumns,
    location: usize,
    fields: [Option<usize>; Field::COUNT],
    wind_gust_dir: Option<usize>,
    wind_dir_9am: Option<usize>,
    wind_dir_3pm: Option<usize>,
    rain_today: Option<usize>,
    rain_tomorrow: Option<usize>,
}

impl ColumnLayout {
    /// The fixed column order of the raw file: `Date, Location, MinTemp, ...,
    /// RainToday, RainTomorrow`.
    pub fn raw() -> Self {
        let mut fields = [None; Field::COUNT];
        for (field, column) in RAW_FIELD_COLUMNS {
            fields[field.index()] = Some(column);
        }

        Self {
            date: DateColumns::Text(0),
            location: 1,
            fields,
            wind_gust_dir: Some(7),
            wind_dir_9am: Some(9),
            wind_dir_3pm: Some(10),
            rain_today: Some(21),
            rain_tomorrow: Some(22),
        }
    }

    /// Resolve columns by header name, so files with a different column order
    /// (e.g. the processed file with `Year`/`Month`/`DayIndex`) still parse.
    pub fn from_header(header: &StringRecord) -> Result<Self, ParseError> {
        let find = |name: &str| {
            header
                .iter()
                .position(|cell| cell.trim().eq_ignore_ascii_case(name))
        };

        let location = find("Location").ok_or(ParseError::MissingColumn("Location"))?;

        let date = if let Some(column) = find("Date") {
            DateColumns::Text(column)
        } else if let (Some(year), Some(month), Some(day)) = (find("Year"), find("Month"), find("Day")) {
            DateColumns::Parts { year, month, day }
        } else if let Some(column) = find("DayIndex") {
            DateColumns::DayIndex(column)
        } else {
            return Err(ParseError::MissingColumn("Date"));
        };

        let mut fields = [None; Field::COUNT];
        for field in Field::ALL {
            fields[field.index()] = find(field.as_str());
        }

        Ok(Self {
            date,
            location,
            fields,
            wind_gust_dir: find("WindGustDir"),
            wind_dir_9am: find("WindDir9am"),
            wind_dir_3pm: find("WindDir3pm"),
            rain_today: find("RainToday"),
            rain_tomorrow: find("RainTomorrow"),
        })
    }

    fn resolve_date(&self, row: &StringRecord) -> Result<NaiveDate, ParseError> {
        match self.date {
            DateColumns::Text(column) => {
                let text = row.get(column).ok_or(ParseError::MissingColumn("Date"))?;
                parse_date(text)
            }
            DateColumns::Parts { year, month, day } => {
                let cell = |column: usize, name: &'static str| {
                    row.get(column).ok_or(ParseError::MissingColumn(name))
                };
                let (y, m, d) = (cell(year, "Year")?, cell(month, "Month")?, cell(day, "Day")?);
                let invalid = || ParseError::InvalidDate(format!("{y}-{m}-{d}"));

                let year = parse_whole(y).and_then(|v| i32::try_from(v).ok()).ok_or_else(invalid)?;
                let month = parse_whole(m).and_then(|v| u32::try_from(v).ok()).ok_or_else(invalid)?;
                let day = parse_whole(d).and_then(|v| u32::try_from(v).ok()).ok_or_else(invalid)?;

                NaiveDate::from_ymd_opt(year, month, day).ok_or_else(invalid)
            }
            DateColumns::DayIndex(column) => {
                let text = row.get(column).ok_or(ParseError::MissingColumn("DayIndex"))?;
                parse_whole(text)
                    .and_then(date_from_day_index)
                    .ok_or_else(|| ParseError::InvalidDate(text.trim().to_string()))
            }
        }
    }
}

impl Default for ColumnLayout {
    fn default() -> Self {
        Self::raw()
    }
}

/// Parse a date written as day/month/year with `-` or `/` separators.
///
/// A four-digit first component is read as ISO year-month-day instead.
pub fn parse_date(text: &str) -> Result<NaiveDate, ParseError> {
    let trimmed = text.trim();
    let invalid = || ParseError::InvalidDate(trimmed.to_string());

    let parts: Vec<&str> = trimmed.split(['-', '/']).collect();
    let [first, second, third] = parts.as_slice() else {
        return Err(invalid());
    };

    let (year, month, day) = if first.len() == 4 {
        (first, second, third)
    } else {
        (third, second, first)
    };

    let year: i32 = year.parse().map_err(|_| invalid())?;
    let month: u32 = month.parse().map_err(|_| invalid())?;
    let day: u32 = day.parse().map_err(|_| invalid())?;

    NaiveDate::from_ymd_opt(year, month, day).ok_or_else(invalid)
}

/// Parse one line of text with the given layout.
pub fn parse_line(line: &str, layout: &ColumnLayout) -> Result<WeatherRecord, ParseError> {
    let mut reader = reader_builder().from_reader(line.as_bytes());
    let mut row = StringRecord::new();

    match reader.read_record(&mut row) {
        Ok(true) => parse_record(&row, layout),
        Ok(false) => Err(ParseError::EmptyLine),
        Err(e) => Err(ParseError::Csv(e.to_string())),
    }
}

/// Parse an already-split CSV row.
pub fn parse_record(row: &StringRecord, layout: &ColumnLayout) -> Result<WeatherRecord, ParseError> {
    if row.iter().all(|cell| cell.trim().is_empty()) {
        return Err(ParseError::EmptyLine);
    }

    let location = row
        .get(layout.location)
        .map(str::trim)
        .ok_or(ParseError::MissingLocation)?;

    if location.eq_ignore_ascii_case("Location") {
        return Err(ParseError::HeaderRow);
    }
    if location.is_empty() {
        return Err(ParseError::MissingLocation);
    }

    let date = layout.resolve_date(row)?;
    let mut record = WeatherRecord::new(date, location);

    for field in Field::ALL {
        if let Some(column) = layout.fields[field.index()] {
            let value = row.get(column).map(Measurement::from_text).unwrap_or_default();
            record.set(field, value);
        }
    }

    record.wind_gust_dir = text_cell(row, layout.wind_gust_dir);
    record.wind_dir_9am = text_cell(row, layout.wind_dir_9am);
    record.wind_dir_3pm = text_cell(row, layout.wind_dir_3pm);
    record.rain_today = flag_cell(row, layout.rain_today);
    record.rain_tomorrow = flag_cell(row, layout.rain_tomorrow);

    Ok(record)
}

/// Parse a whole CSV document.
///
/// If the first row is a header, the layout is resolved from it; otherwise
/// the raw layout is assumed. Lines that fail to parse are dropped.
pub fn parse_csv(text: &str) -> RecordSet {
    let mut reader = reader_builder().from_reader(text.as_bytes());
    let mut layout = ColumnLayout::raw();
    let mut records = Vec::new();
    let mut discarded = 0usize;

    for (line_no, row) in reader.records().enumerate() {
        let row = match row {
            Ok(row) => row,
            Err(e) => {
                tracing::debug!(line = line_no + 1, error = %e, "skipping malformed CSV line");
                discarded += 1;
                continue;
            }
        };

        if line_no == 0 && is_header(&row) {
            match ColumnLayout::from_header(&row) {
                Ok(resolved) => layout = resolved,
                Err(e) => tracing::warn!(error = %e, "unrecognised header, assuming raw column order"),
            }
            continue;
        }

        match parse_record(&row, &layout) {
            Ok(record) => records.push(record),
            Err(e) => {
                tracing::debug!(line = line_no + 1, error = %e, "discarding line");
                discarded += 1;
            }
        }
    }

    let set = RecordSet::from_records(records);
    tracing::info!(
        records = set.len(),
        discarded,
        duplicates = set.duplicates(),
        "parsed observations"
    );
    set
}

fn reader_builder() -> ReaderBuilder {
    let mut builder = ReaderBuilder::new();
    builder.has_headers(false).flexible(true).trim(Trim::All);
    builder
}

fn is_header(row: &StringRecord) -> bool {
    row.iter().any(|cell| cell.trim().eq_ignore_ascii_case("Location"))
}

/// Integer cell, tolerating a `.0` suffix as written by dataframe exports.
fn parse_whole(text: &str) -> Option<i64> {
    let text = text.trim();
    text.parse::<i64>().ok().or_else(|| {
        let v = text.parse::<f64>().ok()?;
        (v.is_finite() && v.fract() == 0.0).then_some(v as i64)
    })
}

fn text_cell(row: &StringRecord, column: Option<usize>) -> Option<String> {
    let cell = row.get(column?)?.trim();
    (!cell.is_empty() && !cell.eq_ignore_ascii_case("NA")).then(|| cell.to_string())
}

fn flag_cell(row: &StringRecord, column: Option<usize>) -> Option<bool> {
    let cell = row.get(column?)?.trim();
    if cell.eq_ignore_ascii_case("Yes") {
        Some(true)
    } else if cell.eq_ignore_ascii_case("No") {
        Some(false)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const HEADER: &str = "Date,Location,MinTemp,MaxTemp,Rainfall,Evaporation,Sunshine,WindGustDir,\
WindGustSpeed,WindDir9am,WindDir3pm,WindSpeed9am,WindSpeed3pm,Humidity9am,Humidity3pm,\
Pressure9am,Pressure3pm,Cloud9am,Cloud3pm,Temp9am,Temp3pm,RainToday,RainTomorrow";

    const MELBOURNE: &str =
        "01-07-2008,Melbourne,10.2,20.5,0,NA,NA,W,44,W,WNW,20,24,71,22,1007.7,1007.1,8,NA,16.9,21.8,No,Yes";

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn parses_raw_line() {
        let record = parse_line(MELBOURNE, &ColumnLayout::raw()).expect("line should parse");

        assert_eq!(record.date, date(2008, 7, 1));
        assert_eq!(record.location, "Melbourne");
        assert_eq!(record.get(Field::MinTemp), Measurement::Value(10.2));
        assert_eq!(record.get(Field::MaxTemp), Measurement::Value(20.5));
        assert_eq!(record.get(Field::Rainfall), Measurement::Value(0.0));
        assert_eq!(record.get(Field::Evaporation), Measurement::Missing);
        assert_eq!(record.get(Field::WindGustSpeed), Measurement::Value(44.0));
        assert_eq!(record.get(Field::Cloud3pm), Measurement::Missing);
        assert_eq!(record.get(Field::Temp3pm), Measurement::Value(21.8));
        assert_eq!(record.wind_gust_dir.as_deref(), Some("W"));
        assert_eq!(record.rain_today, Some(false));
        assert_eq!(record.rain_tomorrow, Some(true));
    }

    #[test]
    fn na_min_temp_is_missing_not_zero() {
        let line = "02-07-2008,Melbourne,NA,18.0,0";
        let record = parse_line(line, &ColumnLayout::raw()).unwrap();

        assert_eq!(record.get(Field::MinTemp), Measurement::Missing);
        assert_eq!(record.get(Field::MaxTemp), Measurement::Value(18.0));
        // columns past the end of a short line are missing too
        assert_eq!(record.get(Field::Temp3pm), Measurement::Missing);
    }

    #[test]
    fn header_row_is_discarded() {
        assert_eq!(parse_line(HEADER, &ColumnLayout::raw()), Err(ParseError::HeaderRow));
    }

    #[test]
    fn invalid_dates_are_discarded() {
        let layout = ColumnLayout::raw();
        assert!(matches!(
            parse_line("31-02-2008,Melbourne,1,2", &layout),
            Err(ParseError::InvalidDate(_))
        ));
        assert!(matches!(
            parse_line("July 1st,Melbourne,1,2", &layout),
            Err(ParseError::InvalidDate(_))
        ));
        assert!(matches!(parse_line(",Melbourne,1,2", &layout), Err(ParseError::InvalidDate(_))));
    }

    #[test]
    fn empty_location_is_discarded() {
        let layout = ColumnLayout::raw();
        assert_eq!(parse_line("01-07-2008,  ,1,2", &layout), Err(ParseError::MissingLocation));
        assert_eq!(parse_line("01-07-2008", &layout), Err(ParseError::MissingLocation));
        assert_eq!(parse_line("", &layout), Err(ParseError::EmptyLine));
    }

    #[test]
    fn location_is_trimmed() {
        let record = parse_line("01-07-2008,  Sydney ,1,2", &ColumnLayout::raw()).unwrap();
        assert_eq!(record.location, "Sydney");
    }

    #[test]
    fn date_accepts_both_separators_and_iso() {
        assert_eq!(parse_date("01-07-2008"), Ok(date(2008, 7, 1)));
        assert_eq!(parse_date("1/7/2008"), Ok(date(2008, 7, 1)));
        assert_eq!(parse_date("2008-07-01"), Ok(date(2008, 7, 1)));
        assert_eq!(parse_date("29-02-2008"), Ok(date(2008, 2, 29)));
        assert!(parse_date("29-02-2009").is_err());
        assert!(parse_date("01-07").is_err());
    }

    #[test]
    fn processed_header_resolves_day_index() {
        let text = "Location,Block,Id,MinTemp,MaxTemp,Rainfall,DayIndex,Year,Month\n\
                    Melbourne,0,0,10.2,20.5,0.0,3104,2008,7\n\
                    Melbourne,0,1,NA,19.0,1.2,3105,2008,7\n";

        let set = parse_csv(text);
        let records = set.records();

        assert_eq!(records.len(), 2);
        assert_eq!(records[0].date, date(2008, 7, 1));
        assert_eq!(records[1].date, date(2008, 7, 2));
        assert_eq!(records[1].get(Field::MinTemp), Measurement::Missing);
        assert_eq!(records[0].get(Field::Humidity9am), Measurement::Missing);
    }

    #[test]
    fn processed_header_prefers_year_month_day() {
        let text = "Location,Year,Month,Day,DayIndex,MinTemp\nPerth,2009,2,28,0,12.5\n";
        let set = parse_csv(text);

        assert_eq!(set.records()[0].date, date(2009, 2, 28));
    }

    #[test]
    fn parse_csv_drops_bad_lines_and_duplicates() {
        let text = format!(
            "{HEADER}\n{MELBOURNE}\nnot,a,valid,row\n\n31-13-2008,Melbourne,1\n\
             01-07-2008,Melbourne,99,99\n02-07-2008,,1,2\n02-07-2008,Sydney,8,17\n"
        );

        let set = parse_csv(&text);

        assert_eq!(set.len(), 2);
        assert_eq!(set.duplicates(), 1);
        let melbourne: Vec<_> = set.for_location("Melbourne").collect();
        assert_eq!(melbourne[0].get(Field::MinTemp), Measurement::Value(10.2));
    }

    #[test]
    fn parse_csv_without_header_uses_raw_layout() {
        let set = parse_csv(MELBOURNE);
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn from_header_requires_location_and_date() {
        let header = StringRecord::from(vec!["Date", "MinTemp"]);
        assert_eq!(ColumnLayout::from_header(&header), Err(ParseError::MissingColumn("Location")));

        let header = StringRecord::from(vec!["Location", "MinTemp"]);
        assert_eq!(ColumnLayout::from_header(&header), Err(ParseError::MissingColumn("Date")));
    }

    #[test]
    fn raw_header_resolves_to_raw_layout() {
        let header: StringRecord = HEADER.split(',').collect();
        assert_eq!(ColumnLayout::from_header(&header), Ok(ColumnLayout::raw()));
    }
}
