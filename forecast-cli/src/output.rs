use anyhow::Result;
use forecast_core::{
    LocationSeries, MonthSeries, PredictionStatus, PredictionWindow, pipeline::PredictionView,
};
use serde_json::json;

const MISSING: &str = "-";

fn cell(value: Option<f64>) -> String {
    value.map_or_else(|| MISSING.to_string(), |v| format!("{v:.1}"))
}

pub fn print_month(series: &MonthSeries) {
    println!(
        "{} {}-{:02}",
        series.location,
        series.month.year(),
        series.month.month()
    );

    let header: Vec<String> = series.fields.iter().map(|f| format!("{:>13}", f.as_str())).collect();
    println!("{:>4} {}", "Day", header.join(" "));

    for point in &series.points {
        let row: Vec<String> = point.values.iter().map(|v| format!("{:>13}", cell(*v))).collect();
        println!("{:>4} {}", point.day_of_month, row.join(" "));
    }

    let gaps = series.gap_days();
    if gaps.len() == series.points.len() {
        println!("No observations for this month.");
    } else if !gaps.is_empty() {
        println!("{} day(s) without observations", gaps.len());
    }
}

pub fn print_window_summary(window: &PredictionWindow) {
    match window.interval() {
        Some((first, last)) => eprintln!(
            "{}: {} observation(s) between {first} and {last}",
            window.location(),
            window.len()
        ),
        None => eprintln!("{}: empty window", window.location()),
    }

    let missing = window.missing_days();
    if !missing.is_empty() {
        eprintln!("  missing days: {}", join_dates(&missing));
    }
}

pub fn print_prediction(view: &PredictionView) {
    let request = &view.request;
    println!(
        "{} on {} ({} model)",
        request.location, request.anchor, request.model
    );
    print_window_summary(&view.window);

    match &view.status {
        PredictionStatus::Predicted(prediction) => {
            if prediction.values().is_empty() {
                println!("The model returned no values.");
            }
            for (name, value) in prediction.values() {
                println!("  {name:<14} {value:.2}");
            }
        }
        PredictionStatus::Skipped => {
            println!("No observations in the window; prediction not requested.");
        }
        PredictionStatus::Failed(e) => {
            println!("Prediction unavailable: {e}");
        }
    }
}

pub fn print_prediction_json(view: &PredictionView) -> Result<()> {
    let (status, values, error) = match &view.status {
        PredictionStatus::Predicted(p) => ("predicted", Some(p.values()), None),
        PredictionStatus::Skipped => ("skipped", None, None),
        PredictionStatus::Failed(e) => ("failed", None, Some(e.to_string())),
    };

    let doc = json!({
        "location": view.request.location,
        "date": view.request.anchor,
        "model": view.request.model.as_str(),
        "status": status,
        "prediction": values,
        "error": error,
        "payload": view.payload,
    });
    println!("{}", serde_json::to_string_pretty(&doc)?);
    Ok(())
}

pub fn print_series(series: &LocationSeries) {
    println!("{} {}", series.location, series.field);

    let (Some(mean), Some(min), Some(max)) = (series.mean(), series.min(), series.max()) else {
        println!("No observations.");
        return;
    };
    println!(
        "  {} observation(s), mean {mean:.1}, min {min:.1}, max {max:.1}",
        series.points.len()
    );

    println!("  {:<10} {:>8} {:>8}", "Date", "Value", "Anomaly");
    for (point, anomaly) in series.points.iter().zip(series.anomalies()) {
        println!(
            "  {:<10} {:>8.1} {:>+8.1}",
            point.date.to_string(),
            point.value,
            anomaly.value
        );
    }
}

pub fn print_cities(state: &str, cities: &[&str]) {
    println!("{state}: {}", cities.join(", "));
}

fn join_dates(dates: &[chrono::NaiveDate]) -> String {
    dates
        .iter()
        .map(|d| d.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_cells_render_as_dash() {
        assert_eq!(cell(None), "-");
        assert_eq!(cell(Some(12.34)), "12.3");
    }
}
