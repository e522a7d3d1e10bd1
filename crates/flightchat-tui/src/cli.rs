//! One-shot commands: `ask`, `report`, `health`, `suggest`, `config`

use std::sync::Arc;

use anyhow::{anyhow, Result};
use colored::*;
use tokio::sync::mpsc;

use flightchat_core::chart::{CategoryData, LineData, TableData, TimeSeriesData};
use flightchat_core::{
    route, suggestions, ApiResponse, Config, PollController, PollOutcome, QueryClient,
    RenderInstruction, Report, Visualization,
};

use crate::ui::{format_value, share};

/// Width of the widest text bar
const BAR_WIDTH: usize = 40;

fn client(config: &Config) -> Result<QueryClient> {
    Ok(QueryClient::with_timeout(config.api_url(), config.request_timeout())?)
}

/// Submit a question and wait for its terminal response
pub async fn ask(config: &Config, question: &str, json: bool) -> Result<()> {
    let (tx, mut rx) = mpsc::unbounded_channel();
    let mut controller = PollController::new(Arc::new(client(config)?), config.poll_config(), tx);

    if !controller.submit(question) {
        return Err(anyhow!("Question is empty"));
    }
    if !json {
        println!("✈️  Asking: {}\n", question.bold().cyan());
    }

    let outcome = loop {
        let message = rx
            .recv()
            .await
            .ok_or_else(|| anyhow!("Poll channel closed before the query finished"))?;
        if let Some(outcome) = controller.handle_message(message) {
            break outcome;
        }
    };

    match outcome {
        PollOutcome::Rejected { failure, .. } => {
            eprintln!("Make sure the backend is running at {}", config.api_url().bold());
            Err(failure.into())
        }
        PollOutcome::Finished { response, failure, .. } => {
            if json {
                println!("{}", serde_json::to_string_pretty(&response)?);
            } else {
                print!("{}", format_response(&response));
            }
            match failure {
                Some(failure) => Err(failure.into()),
                None => Ok(()),
            }
        }
    }
}

pub async fn report(config: &Config, report: Report, json: bool) -> Result<()> {
    let result = client(config)?.fetch_report(report).await?;
    if json {
        println!("{}", serde_json::to_string_pretty(&result)?);
        return Ok(());
    }

    println!("\n{}", format!("📊 {}", report.display_name()).bold().blue());
    println!("{}", "=".repeat(40).dimmed());
    print!("{}", format_response(&ApiResponse::complete(report.as_str(), result)));
    Ok(())
}

pub async fn health(config: &Config) -> Result<()> {
    match client(config)?.health().await {
        Ok(status) => {
            println!("{} {} ({})", "✓".green(), status.message, status.status.dimmed());
            Ok(())
        }
        Err(e) => {
            println!("{}: {}", "Backend unreachable".red(), e);
            println!("Make sure the backend is running at {}", config.api_url().bold());
            Err(e.into())
        }
    }
}

pub fn suggest() {
    println!("\n{}", "💬 Suggested questions".bold().blue());
    println!("{}", "=".repeat(30).dimmed());
    for (i, question) in suggestions::SUGGESTED_QUESTIONS.iter().enumerate() {
        println!("{:>3}. {}", i + 1, question);
    }
    println!(
        "\nYou can also ask about flight failures, or run {}",
        "flightchat report --help".bold()
    );
}

pub fn show_config(config: &Config, path: &str) {
    let poll = config.poll_config();
    println!("\n{}", "⚙️  Configuration".bold().blue());
    println!("{}", "=".repeat(30).dimmed());
    println!("  {:<20} {}", "file".dimmed(), path);
    println!("  {:<20} {}", "api_url".dimmed(), config.api_url().green());
    println!("  {:<20} {} ms", "poll_interval".dimmed(), poll.interval.as_millis());
    let ceiling = match poll.max_attempts {
        Some(n) => n.to_string(),
        None => "unlimited".to_string(),
    };
    println!("  {:<20} {}", "max_poll_attempts".dimmed(), ceiling);
    println!("  {:<20} {} s", "request_timeout".dimmed(), config.request_timeout().as_secs());
}

/// Plain-terminal rendering of a response, one line per row
pub fn format_response(response: &ApiResponse) -> String {
    let mut out = String::new();
    match route(response) {
        RenderInstruction::Processing => out.push_str(&format!("{}\n", "Still processing".yellow())),
        RenderInstruction::Error { message } => {
            out.push_str(&format!("{} {}\n", "Error:".red().bold(), message));
        }
        RenderInstruction::Text { content } => {
            out.push_str(&content);
            out.push('\n');
        }
        RenderInstruction::Unsupported { kind } => {
            out.push_str(&format!("{}\n", format!("Unsupported visualization type: {}", kind).yellow()));
        }
        RenderInstruction::Chart { title, visualization } => {
            if let Some(title) = title {
                out.push_str(&format!("{}\n\n", title.bold()));
            }
            if visualization.is_empty() {
                out.push_str(&format!("{}\n", "No data to display".dimmed()));
                return out;
            }
            match &visualization {
                Visualization::Bar(data) => out.push_str(&format_bars(data)),
                Visualization::Pie(data) => out.push_str(&format_shares(data)),
                Visualization::Line(data) => out.push_str(&format_series(data)),
                Visualization::TimeSeries(data) => out.push_str(&format_time_series(data)),
                Visualization::Table(data) => out.push_str(&format_table(data)),
            }
        }
    }
    out
}

fn label_width<'a>(labels: impl Iterator<Item = &'a String>) -> usize {
    labels.map(|l| l.chars().count()).max().unwrap_or(0)
}

fn format_bars(data: &CategoryData) -> String {
    let width = label_width(data.labels.iter());
    let max = data.values.iter().cloned().fold(0.0_f64, f64::max);

    data.iter()
        .map(|(label, value)| {
            let filled = if max > 0.0 {
                ((value.max(0.0) / max) * BAR_WIDTH as f64).round() as usize
            } else {
                0
            };
            format!("{:<width$}  {} {}\n", label, "█".repeat(filled).blue(), format_value(value))
        })
        .collect()
}

fn format_shares(data: &CategoryData) -> String {
    let width = label_width(data.labels.iter());
    let total = data.total();

    data.iter()
        .map(|(label, value)| {
            let percent = share(value, total);
            let filled = ((percent / 100.0) * BAR_WIDTH as f64).round() as usize;
            format!(
                "{:<width$}  {:>5.1}%  {} {}\n",
                label,
                percent,
                "█".repeat(filled).magenta(),
                format_value(value).dimmed()
            )
        })
        .collect()
}

fn format_series(data: &LineData) -> String {
    let headers: Vec<String> = std::iter::once("date".to_string())
        .chain(data.series.iter().map(|s| s.name.clone()))
        .collect();
    let rows: Vec<Vec<String>> = (0..data.dates.len())
        .map(|i| {
            std::iter::once(data.dates[i].clone())
                .chain(data.series.iter().map(|s| {
                    s.data.get(i).map(|v| format_value(*v)).unwrap_or_default()
                }))
                .collect()
        })
        .collect();
    format_grid(&headers, &rows)
}

fn format_time_series(data: &TimeSeriesData) -> String {
    let width = label_width(data.labels.iter());
    let highlight = data.highlight_index();

    data.labels
        .iter()
        .zip(&data.values)
        .enumerate()
        .map(|(i, (label, value))| {
            let line = format!("{:<width$}  {}", label, format_value(*value));
            if Some(i) == highlight {
                format!("{}  {}\n", line.yellow().bold(), "◀".yellow())
            } else {
                format!("{}\n", line)
            }
        })
        .collect()
}

fn format_table(data: &TableData) -> String {
    let rows: Vec<Vec<String>> = data
        .rows
        .iter()
        .map(|row| row.iter().map(|cell| cell.to_string()).collect())
        .collect();
    format_grid(&data.headers, &rows)
}

/// Column-aligned grid with an underlined header
fn format_grid(headers: &[String], rows: &[Vec<String>]) -> String {
    let mut widths: Vec<usize> = headers.iter().map(|h| h.chars().count()).collect();
    for row in rows {
        for (i, cell) in row.iter().enumerate() {
            if let Some(width) = widths.get_mut(i) {
                *width = (*width).max(cell.chars().count());
            }
        }
    }

    let render_row = |cells: &[String]| -> String {
        cells
            .iter()
            .zip(&widths)
            .map(|(cell, width)| format!("{:<width$}", cell, width = *width))
            .collect::<Vec<_>>()
            .join("  ")
            .trim_end()
            .to_string()
    };

    let mut out = format!("{}\n", render_row(headers).bold());
    let rule: usize = widths.iter().sum::<usize>() + 2 * widths.len().saturating_sub(1);
    out.push_str(&format!("{}\n", "-".repeat(rule).dimmed()));
    for row in rows {
        out.push_str(&render_row(row));
        out.push('\n');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use flightchat_core::QueryResult;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn plain(kind: &str, data: serde_json::Value) -> String {
        colored::control::set_override(false);
        format_response(&ApiResponse::complete("q", QueryResult::new(kind, Some(data))))
    }

    #[test]
    fn test_bars_scale_to_largest_value() {
        let out = plain("bar_chart", json!({"labels": ["United", "Delta"], "values": [40, 20]}));
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(lines[0], format!("United  {} 40", "█".repeat(40)));
        assert_eq!(lines[1], format!("Delta   {} 20", "█".repeat(20)));
    }

    #[test]
    fn test_shares_and_title() {
        let out = plain(
            "pie_chart",
            json!({"labels": ["Economy", "Business"], "values": [3, 1], "title": "Flight Classes"}),
        );
        assert!(out.starts_with("Flight Classes\n\n"));
        assert!(out.contains("Economy    75.0%"));
        assert!(out.contains("Business   25.0%"));
    }

    #[test]
    fn test_table_grid() {
        let out = plain(
            "table",
            json!({"headers": ["Airline", "Flights"], "rows": [["United", 120], ["KLM", 9]]}),
        );
        assert_eq!(
            out,
            "Airline  Flights\n----------------\nUnited   120\nKLM      9\n"
        );
    }

    #[test]
    fn test_line_series_grid() {
        let out = plain(
            "line_chart",
            json!({"dates": ["Jan", "Feb"], "series": [{"name": "Delays", "data": [4, 6.5]}]}),
        );
        assert_eq!(out, "date  Delays\n------------\nJan   4\nFeb   6.50\n");
    }

    #[test]
    fn test_time_series_marks_highlight() {
        let out = plain(
            "time_series",
            json!({"labels": ["Mon", "Tue"], "values": [1, 5], "highlight": "Tue"}),
        );
        assert_eq!(out, "Mon  1\nTue  5  ◀\n");
    }

    #[test]
    fn test_text_and_errors() {
        assert_eq!(plain("text", json!({"text": "United"})), "United\n");

        colored::control::set_override(false);
        let out = format_response(&ApiResponse::failed("q", "Dataset not loaded"));
        assert_eq!(out, "Error: Dataset not loaded\n");

        assert_eq!(plain("scatter_plot", json!({})), "Unsupported visualization type: scatter_plot\n");
        assert_eq!(plain("table", json!("garbage")), "No data to display\n");
    }
}
