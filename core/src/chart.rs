use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// The payload the rendering side consumes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChartData {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
    pub labels: Vec<String>,
    pub series: Vec<Series>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sources: Vec<Source>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Series {
    pub name: String,
    pub values: Vec<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Source {
    pub title: String,
    pub url: String,
}

/// One label with the value of every series at that position.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChartRow {
    pub label: String,
    pub values: Vec<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PieSlice {
    pub name: String,
    pub value: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChartSummary {
    pub title: String,
    pub unit: String,
    pub series_count: usize,
    pub points: usize,
}

/// Everything the data panel shows next to the chart.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChartView {
    pub summary: ChartSummary,
    pub rows: Vec<ChartRow>,
    pub slices: Vec<PieSlice>,
}

impl ChartData {
    pub fn view(&self) -> ChartView {
        ChartView {
            summary: self.summary(),
            rows: self.rows(),
            slices: self.pie_slices(),
        }
    }

    /// Tabular view, one row per label. Values missing from a series read as 0.
    pub fn rows(&self) -> Vec<ChartRow> {
        self.labels
            .iter()
            .enumerate()
            .map(|(index, label)| ChartRow {
                label: label.clone(),
                values: self
                    .series
                    .iter()
                    .map(|s| s.values.get(index).copied().unwrap_or(0.0))
                    .collect(),
            })
            .collect()
    }

    /// Slices for single-series charts, taken from the first series.
    pub fn pie_slices(&self) -> Vec<PieSlice> {
        let first = self.series.first();
        self.labels
            .iter()
            .enumerate()
            .map(|(index, label)| PieSlice {
                name: label.clone(),
                value: first
                    .and_then(|s| s.values.get(index).copied())
                    .unwrap_or(0.0),
            })
            .collect()
    }

    pub fn summary(&self) -> ChartSummary {
        ChartSummary {
            title: self
                .title
                .clone()
                .unwrap_or_else(|| "Untitled Chart".to_string()),
            unit: self.unit.clone().unwrap_or_else(|| "N/A".to_string()),
            series_count: self.series.len(),
            points: self.labels.len(),
        }
    }

    /// Renders the data as CSV. Missing values become empty cells.
    pub fn to_csv(&self) -> String {
        let mut header = vec!["Label".to_string()];
        header.extend(self.series.iter().map(|s| match &self.unit {
            Some(unit) if !unit.is_empty() => format!("{} ({})", s.name, unit),
            _ => s.name.clone(),
        }));

        let mut lines = vec![csv_line(&header)];
        for (index, label) in self.labels.iter().enumerate() {
            let mut row = vec![label.clone()];
            row.extend(self.series.iter().map(|s| {
                s.values
                    .get(index)
                    .map(|v| v.to_string())
                    .unwrap_or_default()
            }));
            lines.push(csv_line(&row));
        }
        lines.join("\n")
    }
}

fn csv_line(cells: &[String]) -> String {
    cells
        .iter()
        .map(|cell| {
            if cell.contains(',') {
                format!("\"{}\"", cell.replace('"', "\"\""))
            } else {
                cell.clone()
            }
        })
        .collect::<Vec<_>>()
        .join(",")
}

/// Chart kinds the UI offers. Advisory only; the server never rejects unknown ones.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChartType {
    Area,
    Bar,
    Line,
    Pie,
    Radar,
    Radial,
}

impl ChartType {
    pub fn is_single_series(self) -> bool {
        matches!(self, ChartType::Pie | ChartType::Radial)
    }
}

impl FromStr for ChartType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "area" => Ok(ChartType::Area),
            "bar" => Ok(ChartType::Bar),
            "line" => Ok(ChartType::Line),
            "pie" => Ok(ChartType::Pie),
            "radar" => Ok(ChartType::Radar),
            "radial" => Ok(ChartType::Radial),
            other => Err(format!("unknown chart type '{}'", other)),
        }
    }
}

impl fmt::Display for ChartType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ChartType::Area => "area",
            ChartType::Bar => "bar",
            ChartType::Line => "line",
            ChartType::Pie => "pie",
            ChartType::Radar => "radar",
            ChartType::Radial => "radial",
        };
        f.write_str(name)
    }
}
