//! Presentation routing
//!
//! Maps a terminal (or in-flight) response to the instruction the presentation
//! layer acts on. Routing never fails: unknown types and bad payloads produce
//! an instruction of their own.

use crate::api::{ApiResponse, QueryStatus};
use crate::chart::{self, ResultKind, Visualization};

/// Shown when an error response carries no message
pub const DEFAULT_ERROR_MESSAGE: &str = "An error occurred";

/// What the presentation layer should draw
#[derive(Debug, Clone, PartialEq)]
pub enum RenderInstruction {
    /// Nothing final yet
    Processing,
    /// Show an error message instead of a chart
    Error { message: String },
    /// Markdown-capable text
    Text { content: String },
    /// A chart or table; `title` is drawn above it when present
    Chart {
        title: Option<String>,
        visualization: Visualization,
    },
    /// The backend declared a result type this client cannot draw
    Unsupported { kind: String },
}

impl RenderInstruction {
    /// Short label used in logs and the one-line chat summary
    pub fn label(&self) -> &str {
        match self {
            RenderInstruction::Processing => "processing",
            RenderInstruction::Error { .. } => "error",
            RenderInstruction::Text { .. } => "text",
            RenderInstruction::Chart { visualization, .. } => visualization.kind().as_str(),
            RenderInstruction::Unsupported { .. } => "unsupported",
        }
    }
}

pub fn route(response: &ApiResponse) -> RenderInstruction {
    match response.status {
        QueryStatus::Processing => RenderInstruction::Processing,
        QueryStatus::Error => RenderInstruction::Error {
            message: non_empty_or_default(response.error.as_deref()),
        },
        QueryStatus::Complete => {
            let Some(result) = &response.result else {
                return RenderInstruction::Processing;
            };

            let data = result.data.as_ref();
            match result.kind.parse::<ResultKind>().ok() {
                Some(ResultKind::Text) => RenderInstruction::Text {
                    content: chart::text_content(data),
                },
                Some(ResultKind::Error) => RenderInstruction::Error {
                    message: non_empty_or_default(result.message.as_deref()),
                },
                Some(kind) => match Visualization::from_data(kind, data) {
                    Some(visualization) => RenderInstruction::Chart {
                        title: chart::data_title(data),
                        visualization,
                    },
                    None => RenderInstruction::Unsupported {
                        kind: result.kind.clone(),
                    },
                },
                None => RenderInstruction::Unsupported {
                    kind: result.kind.clone(),
                },
            }
        }
    }
}

fn non_empty_or_default(message: Option<&str>) -> String {
    match message {
        Some(message) if !message.trim().is_empty() => message.to_string(),
        _ => DEFAULT_ERROR_MESSAGE.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::QueryResult;
    use crate::chart::{CategoryData, LineData, TableData, TimeSeriesData};
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn complete(kind: &str, data: Option<serde_json::Value>) -> ApiResponse {
        ApiResponse::complete("q", QueryResult::new(kind, data))
    }

    #[test]
    fn test_processing_and_missing_result() {
        assert_eq!(route(&ApiResponse::processing("q")), RenderInstruction::Processing);

        let mut response = ApiResponse::processing("q");
        response.status = QueryStatus::Complete;
        assert_eq!(route(&response), RenderInstruction::Processing);
    }

    #[test]
    fn test_error_status_uses_error_field() {
        let response = ApiResponse::failed("q", "dataset not loaded");
        assert_eq!(
            route(&response),
            RenderInstruction::Error {
                message: "dataset not loaded".to_string()
            }
        );
    }

    #[test]
    fn test_error_status_ignores_result() {
        let mut response = ApiResponse::failed("q", "boom");
        response.result = Some(QueryResult::new("bar_chart", Some(json!({"labels": ["A"], "values": [1]}))));
        assert_eq!(
            route(&response),
            RenderInstruction::Error {
                message: "boom".to_string()
            }
        );
    }

    #[test]
    fn test_error_without_message_uses_default() {
        let mut response = ApiResponse::failed("q", "");
        assert_eq!(
            route(&response),
            RenderInstruction::Error {
                message: DEFAULT_ERROR_MESSAGE.to_string()
            }
        );
        response.error = None;
        assert_eq!(route(&response).label(), "error");
    }

    #[test]
    fn test_complete_kind_matches_declared_type() {
        for kind in ["bar_chart", "pie_chart", "line_chart", "time_series", "table"] {
            let instruction = route(&complete(kind, None));
            assert_eq!(instruction.label(), kind);
        }
    }

    #[test]
    fn test_missing_data_gives_empty_payloads() {
        let cases = vec![
            ("bar_chart", Visualization::Bar(CategoryData::default())),
            ("pie_chart", Visualization::Pie(CategoryData::default())),
            ("line_chart", Visualization::Line(LineData::default())),
            ("time_series", Visualization::TimeSeries(TimeSeriesData::default())),
            ("table", Visualization::Table(TableData::default())),
        ];
        for (kind, expected) in cases {
            assert_eq!(
                route(&complete(kind, None)),
                RenderInstruction::Chart {
                    title: None,
                    visualization: expected,
                }
            );
        }
    }

    #[test]
    fn test_title_comes_from_data() {
        let response = complete(
            "pie_chart",
            Some(json!({
                "labels": ["New York (JFK)", "Los Angeles (LAX)"],
                "values": [850, 720],
                "title": "Top Destinations"
            })),
        );
        let RenderInstruction::Chart { title, visualization } = route(&response) else {
            panic!("expected a chart");
        };
        assert_eq!(title.as_deref(), Some("Top Destinations"));
        assert_eq!(visualization.kind(), ResultKind::PieChart);
        assert!(!visualization.is_empty());
    }

    #[test]
    fn test_text_result() {
        let response = complete("text", Some(json!("United Airlines has the most flights")));
        assert_eq!(
            route(&response),
            RenderInstruction::Text {
                content: "United Airlines has the most flights".to_string()
            }
        );
    }

    #[test]
    fn test_result_level_error_uses_message() {
        let mut result = QueryResult::new("error", None);
        result.message = Some("Error processing query: no such column".to_string());
        let response = ApiResponse::complete("q", result);
        assert_eq!(
            route(&response),
            RenderInstruction::Error {
                message: "Error processing query: no such column".to_string()
            }
        );
    }

    #[test]
    fn test_unknown_type_is_named() {
        let response = complete("scatter_plot", Some(json!({"x": [1], "y": [2]})));
        assert_eq!(
            route(&response),
            RenderInstruction::Unsupported {
                kind: "scatter_plot".to_string()
            }
        );
    }
}
