//! Offline datasets matched by keyword, used when the model path is unavailable.
use crate::chart::{ChartData, Series};

fn dataset(title: &str, unit: &str, labels: &[&str], series: Vec<(&str, Vec<f64>)>) -> ChartData {
    ChartData {
        title: Some(title.to_string()),
        unit: Some(unit.to_string()),
        labels: labels.iter().map(|l| l.to_string()).collect(),
        series: series
            .into_iter()
            .map(|(name, values)| Series {
                name: name.to_string(),
                values,
            })
            .collect(),
        sources: Vec::new(),
    }
}

pub fn parse_prompt(prompt: &str) -> ChartData {
    let normalized = prompt.to_lowercase();

    if normalized.contains("cloud") || normalized.contains("market share") {
        return dataset(
            "Cloud Service Provider Market Share",
            "%",
            &["AWS", "Azure", "GCP"],
            vec![("MarketShare", vec![34.0, 24.0, 11.0])],
        );
    }
    if normalized.contains("mag 7") || normalized.contains("capex") {
        return dataset(
            "Mag 7 CapEx",
            "USD_B",
            &["Apple", "Microsoft", "Amazon", "Alphabet", "Meta", "Nvidia", "Tesla"],
            vec![("CapEx", vec![40.0, 38.0, 32.0, 28.0, 24.0, 20.0, 16.0])],
        );
    }
    if normalized.contains("bitcoin") || normalized.contains("btc") {
        return dataset(
            "Average Bitcoin Price (5 Years)",
            "USD",
            &["2021", "2022", "2023", "2024", "2025"],
            vec![("BTC", vec![47000.0, 28000.0, 30000.0, 52000.0, 61000.0])],
        );
    }

    dataset(
        "Sample Multi-Series Data",
        "Users",
        &["Jan", "Feb", "Mar", "Apr", "May", "Jun"],
        vec![
            ("Desktop", vec![186.0, 305.0, 237.0, 73.0, 209.0, 214.0]),
            ("Mobile", vec![80.0, 200.0, 120.0, 190.0, 130.0, 140.0]),
        ],
    )
}
