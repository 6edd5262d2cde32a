//! In-place edits applied to a generated dataset by the data editor.
use serde::{Deserialize, Serialize};

use crate::chart::ChartData;

/// One editor action, as the data editor sends it.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "op", rename_all = "camelCase")]
pub enum Edit {
    Label { index: usize, value: String },
    SeriesName { index: usize, value: String },
    Unit { value: String },
    #[serde(rename_all = "camelCase")]
    Value {
        series_index: usize,
        label_index: usize,
        raw: String,
    },
}

/// Editor state of a single value cell after an edit attempt.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CellState {
    pub draft: String,
    pub invalid: bool,
}

impl ChartData {
    /// Applies one edit. Only value edits report a cell state.
    pub fn apply(&mut self, edit: Edit) -> Option<CellState> {
        match edit {
            Edit::Label { index, value } => {
                self.set_label(index, value);
                None
            }
            Edit::SeriesName { index, value } => {
                self.set_series_name(index, value);
                None
            }
            Edit::Unit { value } => {
                self.set_unit(value);
                None
            }
            Edit::Value {
                series_index,
                label_index,
                raw,
            } => Some(self.set_value(series_index, label_index, &raw)),
        }
    }

    pub fn set_label(&mut self, index: usize, value: impl Into<String>) {
        if let Some(label) = self.labels.get_mut(index) {
            *label = value.into();
        }
    }

    pub fn set_series_name(&mut self, index: usize, value: impl Into<String>) {
        if let Some(series) = self.series.get_mut(index) {
            series.name = value.into();
        }
    }

    pub fn set_unit(&mut self, value: impl Into<String>) {
        self.unit = Some(value.into());
    }

    /// Applies a raw cell edit. The value only lands when it is a finite number;
    /// otherwise the data stays as it was and the cell is flagged.
    pub fn set_value(&mut self, series_index: usize, label_index: usize, raw: &str) -> CellState {
        let parsed = parse_cell(raw);
        if let Some(value) = parsed {
            if let Some(point) = self
                .series
                .get_mut(series_index)
                .and_then(|s| s.values.get_mut(label_index))
            {
                *point = value;
            }
        }
        CellState {
            draft: raw.to_string(),
            invalid: parsed.is_none(),
        }
    }
}

fn parse_cell(raw: &str) -> Option<f64> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    trimmed.parse::<f64>().ok().filter(|v| v.is_finite())
}
