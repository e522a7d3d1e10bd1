//! Typed visualization payloads
//!
//! The backend sends `data` as free-form JSON whose shape depends on the result
//! type. Each shape here is validated on the way in; a payload that is missing
//! or fails validation is replaced by the empty value of the same kind.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::UnknownName;

/// The result types the backend can declare
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResultKind {
    BarChart,
    PieChart,
    LineChart,
    TimeSeries,
    Table,
    Text,
    Error,
}

impl ResultKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResultKind::BarChart => "bar_chart",
            ResultKind::PieChart => "pie_chart",
            ResultKind::LineChart => "line_chart",
            ResultKind::TimeSeries => "time_series",
            ResultKind::Table => "table",
            ResultKind::Text => "text",
            ResultKind::Error => "error",
        }
    }

    pub fn all() -> [ResultKind; 7] {
        [
            ResultKind::BarChart,
            ResultKind::PieChart,
            ResultKind::LineChart,
            ResultKind::TimeSeries,
            ResultKind::Table,
            ResultKind::Text,
            ResultKind::Error,
        ]
    }
}

impl FromStr for ResultKind {
    type Err = UnknownName;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ResultKind::all()
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| UnknownName {
                what: "result type",
                value: s.to_string(),
                expected: ResultKind::all().map(|k| k.as_str()).join(", "),
            })
    }
}

/// Labelled values, used by bar and pie charts
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CategoryData {
    pub labels: Vec<String>,
    pub values: Vec<f64>,
}

impl CategoryData {
    fn is_valid(&self) -> bool {
        self.labels.len() == self.values.len()
    }

    pub fn total(&self) -> f64 {
        self.values.iter().sum()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.labels.iter().map(String::as_str).zip(self.values.iter().copied())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LineSeries {
    pub name: String,
    pub data: Vec<f64>,
}

/// Several named series over a shared date axis
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LineData {
    pub series: Vec<LineSeries>,
    pub dates: Vec<String>,
}

/// One series over labelled points, optionally calling out a single label
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TimeSeriesData {
    pub labels: Vec<String>,
    pub values: Vec<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub highlight: Option<String>,
}

impl TimeSeriesData {
    fn is_valid(&self) -> bool {
        self.labels.len() == self.values.len()
    }

    /// Index of the highlighted label, if it names a point in the series
    pub fn highlight_index(&self) -> Option<usize> {
        let highlight = self.highlight.as_deref()?;
        self.labels.iter().position(|label| label == highlight)
    }
}

/// A single table cell as sent by the backend
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Cell {
    Number(f64),
    Text(String),
    Bool(bool),
    Empty,
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            // Counts come back as floats once parsed; show them without a trailing ".0"
            Cell::Number(n) if n.fract() == 0.0 && n.abs() < 1e15 => write!(f, "{}", *n as i64),
            Cell::Number(n) => write!(f, "{}", n),
            Cell::Text(s) => f.write_str(s),
            Cell::Bool(b) => write!(f, "{}", b),
            Cell::Empty => Ok(()),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TableData {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<Cell>>,
}

impl TableData {
    fn is_valid(&self) -> bool {
        self.rows.iter().all(|row| row.len() == self.headers.len())
    }
}

/// A chart payload keyed by its kind
#[derive(Debug, Clone, PartialEq)]
pub enum Visualization {
    Bar(CategoryData),
    Pie(CategoryData),
    Line(LineData),
    TimeSeries(TimeSeriesData),
    Table(TableData),
}

impl Visualization {
    /// Build the payload for a chart kind from raw `data`.
    ///
    /// Returns `None` for kinds that are not charts (`text`, `error`).
    pub fn from_data(kind: ResultKind, data: Option<&Value>) -> Option<Self> {
        let visualization = match kind {
            ResultKind::BarChart => Visualization::Bar(parse_or_empty(data, CategoryData::is_valid)),
            ResultKind::PieChart => Visualization::Pie(parse_or_empty(data, CategoryData::is_valid)),
            ResultKind::LineChart => Visualization::Line(parse_or_empty(data, |_| true)),
            ResultKind::TimeSeries => {
                Visualization::TimeSeries(parse_or_empty(data, TimeSeriesData::is_valid))
            }
            ResultKind::Table => Visualization::Table(parse_or_empty(data, TableData::is_valid)),
            ResultKind::Text | ResultKind::Error => return None,
        };
        Some(visualization)
    }

    pub fn kind(&self) -> ResultKind {
        match self {
            Visualization::Bar(_) => ResultKind::BarChart,
            Visualization::Pie(_) => ResultKind::PieChart,
            Visualization::Line(_) => ResultKind::LineChart,
            Visualization::TimeSeries(_) => ResultKind::TimeSeries,
            Visualization::Table(_) => ResultKind::Table,
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            Visualization::Bar(d) | Visualization::Pie(d) => d.labels.is_empty(),
            Visualization::Line(d) => d.series.is_empty(),
            Visualization::TimeSeries(d) => d.labels.is_empty(),
            Visualization::Table(d) => d.headers.is_empty() && d.rows.is_empty(),
        }
    }
}

fn parse_or_empty<T>(data: Option<&Value>, valid: impl Fn(&T) -> bool) -> T
where
    T: Default + for<'de> Deserialize<'de>,
{
    data.and_then(|value| T::deserialize(value).ok())
        .filter(|parsed| valid(parsed))
        .unwrap_or_default()
}

/// Text carried by a `text` result. The backend sends either a bare string or
/// `{"text": "..."}`.
pub fn text_content(data: Option<&Value>) -> String {
    match data {
        Some(Value::String(text)) => text.clone(),
        Some(Value::Object(map)) => map
            .get("text")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string(),
        _ => String::new(),
    }
}

/// `data.title`, when the payload is an object carrying a string title
pub fn data_title(data: Option<&Value>) -> Option<String> {
    data?
        .get("title")
        .and_then(Value::as_str)
        .filter(|title| !title.is_empty())
        .map(str::to_string)
}
