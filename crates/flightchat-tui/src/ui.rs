use ratatui::{
    Frame,
    layout::{Constraint, Layout, Rect},
    style::{Color, Modifier, Style, Stylize},
    symbols,
    text::{Line, Span, Text},
    widgets::{
        Axis, Bar, BarChart, BarGroup, Block, Borders, Chart, Clear, Dataset, GraphType, Paragraph,
        Row, Table, Wrap,
    },
};
use crate::app::{App, FocusPane, InputMode, VISUALIZATION_NOTE};
use flightchat_core::chart::{CategoryData, LineData, TableData, TimeSeriesData};
use flightchat_core::{route, suggestions, ApiResponse, RenderInstruction, Sender, Visualization};

/// Series colors, cycled in order
const PALETTE: [Color; 5] = [Color::Red, Color::Blue, Color::Yellow, Color::Cyan, Color::Magenta];

/// Format a chart value, dropping the fraction for whole numbers
pub fn format_value(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        format!("{:.2}", value)
    }
}

/// Percentage of `total` taken by `value`; zero when the total is not positive
pub fn share(value: f64, total: f64) -> f64 {
    if total > 0.0 {
        value / total * 100.0
    } else {
        0.0
    }
}

/// Parse a line of text and convert **bold** markdown to styled spans
fn parse_markdown_line(text: &str) -> Line<'static> {
    // Headings and bullets first
    let trimmed = text.trim_start();
    if let Some(heading) = trimmed.strip_prefix('#') {
        let heading = heading.trim_start_matches('#').trim();
        return Line::from(Span::styled(
            heading.to_string(),
            Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
        ));
    }
    let (prefix, text) = match trimmed.strip_prefix("- ").or_else(|| trimmed.strip_prefix("* ")) {
        Some(rest) => ("  • ", rest),
        None => ("", text),
    };

    let mut spans: Vec<Span<'static>> = Vec::new();
    if !prefix.is_empty() {
        spans.push(Span::raw(prefix));
    }
    let mut chars = text.char_indices().peekable();
    let mut current_text = String::new();

    while let Some((_, c)) = chars.next() {
        if c == '*' && chars.peek().map(|(_, c)| *c) == Some('*') {
            // Consume the second *
            chars.next();

            // Push any accumulated plain text
            if !current_text.is_empty() {
                spans.push(Span::raw(std::mem::take(&mut current_text)));
            }

            // Find closing **
            let mut bold_text = String::new();
            let mut found_close = false;

            while let Some((_, c)) = chars.next() {
                if c == '*' && chars.peek().map(|(_, c)| *c) == Some('*') {
                    chars.next();
                    found_close = true;
                    break;
                }
                bold_text.push(c);
            }

            if found_close && !bold_text.is_empty() {
                spans.push(Span::styled(
                    bold_text,
                    Style::default().add_modifier(Modifier::BOLD),
                ));
            } else {
                // No closing **, treat as literal
                current_text.push_str("**");
                current_text.push_str(&bold_text);
            }
        } else {
            current_text.push(c);
        }
    }

    if !current_text.is_empty() {
        spans.push(Span::raw(current_text));
    }

    if spans.is_empty() {
        Line::default()
    } else {
        Line::from(spans)
    }
}

fn markdown_lines(text: &str) -> Vec<Line<'static>> {
    text.lines().map(parse_markdown_line).collect()
}

pub fn render(app: &mut App, frame: &mut Frame) {
    let area = frame.area();

    // Main layout: header, body, footer
    let [header_area, body_area, footer_area] = Layout::vertical([
        Constraint::Length(1),
        Constraint::Min(0),
        Constraint::Length(1),
    ])
    .areas(area);

    render_header(app, frame, header_area);

    // Chat on the left, visualization on the right
    let [chat_column, viz_area] = Layout::horizontal([
        Constraint::Percentage(45),
        Constraint::Percentage(55),
    ])
    .areas(body_area);

    render_chat(app, frame, chat_column);
    render_visualization(app, frame, viz_area);
    render_footer(app, frame, footer_area);

    if app.show_help {
        render_help(frame, area);
    }
}

fn render_header(app: &App, frame: &mut Frame, area: Rect) {
    let title = Line::from(vec![
        Span::styled(" Flight Booking Data Analysis ", Style::default().fg(Color::Cyan).bold()),
        Span::styled(app.api_url.clone(), Style::default().fg(Color::Gray)),
        Span::raw(" "),
        Span::styled(
            format!("v{}", env!("CARGO_PKG_VERSION")),
            Style::default().fg(Color::Gray),
        ),
    ]);

    let header = Paragraph::new(title).style(Style::default().bg(Color::DarkGray));
    frame.render_widget(header, area);
}

fn render_footer(app: &App, frame: &mut Frame, area: Rect) {
    let (mode_text, mode_style) = match app.input_mode {
        InputMode::Normal => (" NORMAL ", Style::default().bg(Color::Blue).fg(Color::White)),
        InputMode::Editing => (" ASK ", Style::default().bg(Color::Yellow).fg(Color::Black)),
    };

    // Key style: dark background with bright text for visibility on both light/dark terminals
    let key_style = Style::default().bg(Color::DarkGray).fg(Color::White);
    let label_style = Style::default().bg(Color::Black).fg(Color::White);

    let mut spans = vec![Span::styled(mode_text, mode_style), Span::raw(" ")];
    let hints: &[(&str, &str)] = match app.input_mode {
        InputMode::Editing => &[
            ("Enter", "send"),
            ("↑/↓", "suggestions"),
            ("Esc", "normal"),
            ("Tab", "focus"),
        ],
        InputMode::Normal => &[
            ("j/k", "scroll"),
            ("Tab", "focus"),
            ("i", "ask"),
            ("?", "help"),
            ("q", "quit"),
        ],
    };
    for (key, label) in hints {
        spans.push(Span::styled(format!(" {} ", key), key_style));
        spans.push(Span::styled(format!(" {} ", label), label_style));
    }
    if app.is_processing() {
        spans.push(Span::styled(" C-x ", key_style));
        spans.push(Span::styled(" cancel ", label_style));
    }

    if let Some(status) = &app.status_message {
        spans.push(Span::raw(" "));
        spans.push(Span::styled(status.clone(), Style::default().fg(Color::Red)));
    } else if app.is_processing() {
        spans.push(Span::raw(" "));
        spans.push(Span::styled(
            format!("status checks: {}", app.poller.attempts()),
            Style::default().fg(Color::DarkGray),
        ));
    }

    frame.render_widget(Paragraph::new(Line::from(spans)), area);
}

fn welcome_lines() -> Vec<Line<'static>> {
    let accent = Style::default().fg(Color::Blue);
    let mut lines = vec![Line::from(Span::styled(
        "Welcome! Ask me questions about flight data, such as:",
        accent.add_modifier(Modifier::BOLD),
    ))];
    for question in suggestions::SUGGESTED_QUESTIONS {
        lines.push(Line::from(Span::styled(format!("  • {}", question), accent)));
    }
    lines.push(Line::from(Span::styled(
        "You can also ask about flight failures if failure data is available.",
        accent,
    )));
    lines.push(Line::from(Span::styled(
        "Press ↑/↓ in the empty input box to pick one.",
        Style::default().fg(Color::DarkGray).add_modifier(Modifier::ITALIC),
    )));
    lines.push(Line::default());
    lines
}

fn reply_lines(response: &ApiResponse) -> Vec<Line<'static>> {
    match route(response) {
        RenderInstruction::Text { content } => markdown_lines(&content),
        RenderInstruction::Chart { .. } => vec![Line::from(Span::styled(
            VISUALIZATION_NOTE,
            Style::default().fg(Color::Magenta).add_modifier(Modifier::BOLD),
        ))],
        RenderInstruction::Error { message } => vec![Line::from(vec![
            Span::styled("Error: ", Style::default().fg(Color::Red).add_modifier(Modifier::BOLD)),
            Span::styled(message, Style::default().fg(Color::Red)),
        ])],
        RenderInstruction::Unsupported { kind } => vec![Line::from(Span::styled(
            format!("Unsupported visualization type: {}", kind),
            Style::default().fg(Color::DarkGray),
        ))],
        RenderInstruction::Processing => vec![Line::from("Processing...")],
    }
}

fn chat_lines(app: &App) -> Vec<Line<'static>> {
    let mut lines = Vec::new();
    if app.store.is_empty() {
        lines.extend(welcome_lines());
    }

    for msg in app.store.messages() {
        match msg.sender {
            Sender::User => {
                lines.push(Line::from(Span::styled(
                    "You:",
                    Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
                )));
                lines.push(Line::from(msg.text.clone()));
            }
            Sender::System => {
                lines.push(Line::from(Span::styled(
                    "System:",
                    Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD),
                )));
                lines.push(Line::from(Span::styled(
                    msg.text.clone(),
                    Style::default().fg(Color::DarkGray).add_modifier(Modifier::ITALIC),
                )));
                if let Some(response) = &msg.response {
                    lines.extend(reply_lines(response));
                }
            }
        }
        lines.push(Line::from(Span::styled(
            msg.timestamp.format("%H:%M:%S").to_string(),
            Style::default().fg(Color::DarkGray),
        )));
        lines.push(Line::default());
    }

    if app.is_processing() {
        lines.push(Line::from(Span::styled(
            "System:",
            Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD),
        )));
        lines.push(Line::from(Span::styled(
            processing_text(app),
            Style::default().fg(Color::DarkGray).add_modifier(Modifier::ITALIC),
        )));
    }

    lines
}

/// Animated ellipsis: cycles through ".", "..", "..."
fn processing_text(app: &App) -> String {
    format!("Processing your query{}", ".".repeat(app.animation_frame as usize + 1))
}

fn border_color(focused: bool) -> Color {
    if focused {
        Color::Cyan
    } else {
        Color::DarkGray
    }
}

fn render_chat(app: &mut App, frame: &mut Frame, area: Rect) {
    let [chat_area, input_area] = Layout::vertical([
        Constraint::Min(0),
        Constraint::Length(3),
    ])
    .areas(area);

    // Store areas for mouse hit-testing and scroll calculations
    app.chat_area = Some(chat_area);
    app.chat_height = chat_area.height.saturating_sub(2);
    app.chat_width = chat_area.width.saturating_sub(2);

    let chat_block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(border_color(app.focus == FocusPane::Chat)))
        .title(" Chat ");

    let chat = Paragraph::new(Text::from(chat_lines(app)))
        .block(chat_block)
        .wrap(Wrap { trim: true })
        .scroll((app.chat_scroll, 0));
    frame.render_widget(chat, chat_area);

    // Query input at the bottom - highlight when focused or editing
    let input_focused = app.focus == FocusPane::Input || app.input_mode == InputMode::Editing;
    let input_border_color = if input_focused { Color::Yellow } else { Color::DarkGray };
    let input_title = if app.is_processing() {
        " Processing... (Ctrl-X to cancel) "
    } else {
        " Ask about flights (Enter to send) "
    };

    let input_block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(input_border_color))
        .title(input_title);

    // Horizontal scrolling keeps the cursor visible
    let inner_width = input_area.width.saturating_sub(2) as usize;
    let cursor_pos = app.query_cursor;
    let scroll_offset = if inner_width == 0 {
        0
    } else if cursor_pos >= inner_width {
        cursor_pos - inner_width + 1
    } else {
        0
    };

    let visible_text: String = app.query_input
        .chars()
        .skip(scroll_offset)
        .take(inner_width)
        .collect();

    let input = Paragraph::new(visible_text)
        .style(Style::default().fg(Color::Cyan))
        .block(input_block);
    frame.render_widget(input, input_area);

    if app.input_mode == InputMode::Editing {
        let cursor_x = (cursor_pos - scroll_offset) as u16;
        frame.set_cursor_position((
            input_area.x + cursor_x + 1,
            input_area.y + 1,
        ));
    }
}

fn centered_message(frame: &mut Frame, area: Rect, text: String, style: Style) {
    let [_, middle, _] = Layout::vertical([
        Constraint::Fill(1),
        Constraint::Length(3),
        Constraint::Fill(1),
    ])
    .areas(area);
    let paragraph = Paragraph::new(text)
        .style(style)
        .centered()
        .wrap(Wrap { trim: true });
    frame.render_widget(paragraph, middle);
}

fn render_visualization(app: &mut App, frame: &mut Frame, area: Rect) {
    app.viz_area = Some(area);
    let instruction = app.current_instruction();

    let title = match &instruction {
        Some(RenderInstruction::Chart { visualization, .. }) => {
            format!(" Visualization: {} ", visualization.kind().as_str())
        }
        _ => " Visualization ".to_string(),
    };
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(border_color(app.focus == FocusPane::Visualization)))
        .title(title);
    let inner = block.inner(area);
    frame.render_widget(block, area);

    match instruction {
        None => centered_message(
            frame,
            inner,
            "Ask a question to see the answer here".to_string(),
            Style::default().fg(Color::DarkGray),
        ),
        Some(RenderInstruction::Processing) => centered_message(
            frame,
            inner,
            processing_text(app),
            Style::default().fg(Color::Blue).add_modifier(Modifier::BOLD),
        ),
        Some(RenderInstruction::Error { message }) => centered_message(
            frame,
            inner,
            message,
            Style::default().fg(Color::Red),
        ),
        Some(RenderInstruction::Unsupported { kind }) => centered_message(
            frame,
            inner,
            format!("Unsupported visualization type: {}", kind),
            Style::default().fg(Color::DarkGray),
        ),
        Some(RenderInstruction::Text { content }) => {
            let text = Paragraph::new(Text::from(markdown_lines(&content)))
                .wrap(Wrap { trim: false })
                .scroll((app.viz_scroll, 0));
            frame.render_widget(text, inner);
        }
        Some(RenderInstruction::Chart { title, visualization }) => {
            render_chart(frame, inner, title, &visualization, app.viz_scroll);
        }
    }
}

fn render_chart(
    frame: &mut Frame,
    area: Rect,
    title: Option<String>,
    visualization: &Visualization,
    scroll: u16,
) {
    let title_height = if title.is_some() { 2 } else { 0 };
    let [title_area, chart_area] = Layout::vertical([
        Constraint::Length(title_height),
        Constraint::Min(0),
    ])
    .areas(area);

    if let Some(title) = title {
        let heading = Paragraph::new(Span::styled(
            title,
            Style::default().fg(Color::White).add_modifier(Modifier::BOLD),
        ))
        .centered();
        frame.render_widget(heading, title_area);
    }

    if visualization.is_empty() {
        centered_message(
            frame,
            chart_area,
            "No data to display".to_string(),
            Style::default().fg(Color::DarkGray),
        );
        return;
    }

    match visualization {
        Visualization::Bar(data) => render_bar_chart(frame, chart_area, data),
        Visualization::Pie(data) => render_pie_chart(frame, chart_area, data, scroll),
        Visualization::Line(data) => render_line_chart(frame, chart_area, data),
        Visualization::TimeSeries(data) => render_time_series(frame, chart_area, data),
        Visualization::Table(data) => render_table(frame, chart_area, data, scroll),
    }
}

fn render_bar_chart(frame: &mut Frame, area: Rect, data: &CategoryData) {
    // Bars take integer heights; keep two decimals of precision
    let bars: Vec<Bar> = data
        .iter()
        .map(|(label, value)| {
            Bar::default()
                .value((value.max(0.0) * 100.0).round() as u64)
                .text_value(format_value(value))
                .label(Line::from(label.to_string()))
        })
        .collect();

    let count = bars.len().max(1) as u16;
    let bar_width = (area.width / count).saturating_sub(1).clamp(1, 16);

    let chart = BarChart::default()
        .data(BarGroup::default().bars(&bars))
        .bar_width(bar_width)
        .bar_gap(1)
        .bar_style(Style::default().fg(Color::Blue))
        .value_style(Style::default().fg(Color::White).bg(Color::Blue));
    frame.render_widget(chart, area);
}

fn render_pie_chart(frame: &mut Frame, area: Rect, data: &CategoryData, scroll: u16) {
    // Terminal stand-in for a pie: one proportional bar per slice
    let total = data.total();
    let label_width = data.labels.iter().map(|l| l.chars().count()).max().unwrap_or(0).min(24);
    let bar_room = (area.width as usize).saturating_sub(label_width + 22).max(4);

    let lines: Vec<Line> = data
        .iter()
        .enumerate()
        .map(|(i, (label, value))| {
            let color = PALETTE[i % PALETTE.len()];
            let percent = share(value, total);
            let filled = ((percent / 100.0) * bar_room as f64).round() as usize;
            let label: String = label.chars().take(label_width).collect();
            Line::from(vec![
                Span::styled("■ ", Style::default().fg(color)),
                Span::raw(format!("{:<width$} ", label, width = label_width)),
                Span::styled("█".repeat(filled), Style::default().fg(color)),
                Span::styled(
                    "░".repeat(bar_room.saturating_sub(filled)),
                    Style::default().fg(Color::DarkGray),
                ),
                Span::raw(format!(" {:>5.1}% ", percent)),
                Span::styled(format_value(value), Style::default().fg(Color::DarkGray)),
            ])
        })
        .collect();

    frame.render_widget(Paragraph::new(lines).scroll((scroll, 0)), area);
}

/// Y-axis bounds starting at zero unless data goes negative
fn y_bounds<'a>(values: impl Iterator<Item = &'a f64>) -> [f64; 2] {
    let (min, max) = values.fold((0.0_f64, 0.0_f64), |(lo, hi), v| (lo.min(*v), hi.max(*v)));
    let max = if max > min { max * 1.1 } else { min + 1.0 };
    [min, max]
}

/// First, middle and last label for a categorical x axis
fn x_labels(labels: &[String]) -> Vec<Span<'static>> {
    match labels.len() {
        0 => Vec::new(),
        1 => vec![Span::raw(labels[0].clone())],
        2 => vec![Span::raw(labels[0].clone()), Span::raw(labels[1].clone())],
        n => vec![
            Span::raw(labels[0].clone()),
            Span::raw(labels[n / 2].clone()),
            Span::raw(labels[n - 1].clone()),
        ],
    }
}

fn y_labels(bounds: [f64; 2]) -> Vec<Span<'static>> {
    let mid = (bounds[0] + bounds[1]) / 2.0;
    [bounds[0], mid, bounds[1]]
        .into_iter()
        .map(|v| Span::raw(format_value((v * 100.0).round() / 100.0)))
        .collect()
}

fn points(values: &[f64]) -> Vec<(f64, f64)> {
    values.iter().enumerate().map(|(i, v)| (i as f64, *v)).collect()
}

fn render_line_chart(frame: &mut Frame, area: Rect, data: &LineData) {
    let series_points: Vec<Vec<(f64, f64)>> = data.series.iter().map(|s| points(&s.data)).collect();
    let datasets: Vec<Dataset> = data
        .series
        .iter()
        .zip(&series_points)
        .enumerate()
        .map(|(i, (series, points))| {
            Dataset::default()
                .name(series.name.clone())
                .marker(symbols::Marker::Braille)
                .graph_type(GraphType::Line)
                .style(Style::default().fg(PALETTE[i % PALETTE.len()]))
                .data(points)
        })
        .collect();

    let longest = data.series.iter().map(|s| s.data.len()).max().unwrap_or(0).max(data.dates.len());
    let bounds = y_bounds(data.series.iter().flat_map(|s| s.data.iter()));

    let chart = Chart::new(datasets)
        .x_axis(
            Axis::default()
                .title("Date")
                .style(Style::default().fg(Color::Gray))
                .bounds([0.0, longest.saturating_sub(1).max(1) as f64])
                .labels(x_labels(&data.dates)),
        )
        .y_axis(
            Axis::default()
                .style(Style::default().fg(Color::Gray))
                .bounds(bounds)
                .labels(y_labels(bounds)),
        );
    frame.render_widget(chart, area);
}

fn render_time_series(frame: &mut Frame, area: Rect, data: &TimeSeriesData) {
    let highlight = data.highlight_index();
    let caption_height = if highlight.is_some() { 1 } else { 0 };
    let [chart_area, caption_area] = Layout::vertical([
        Constraint::Min(0),
        Constraint::Length(caption_height),
    ])
    .areas(area);

    let line_points = points(&data.values);
    let highlight_points: Vec<(f64, f64)> = highlight
        .map(|i| vec![(i as f64, data.values[i])])
        .unwrap_or_default();

    let mut datasets = vec![Dataset::default()
        .marker(symbols::Marker::Braille)
        .graph_type(GraphType::Line)
        .style(Style::default().fg(Color::Cyan))
        .data(&line_points)];
    if !highlight_points.is_empty() {
        datasets.push(
            Dataset::default()
                .marker(symbols::Marker::Dot)
                .graph_type(GraphType::Scatter)
                .style(Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD))
                .data(&highlight_points),
        );
    }

    let bounds = y_bounds(data.values.iter());
    let chart = Chart::new(datasets)
        .x_axis(
            Axis::default()
                .title("Date")
                .style(Style::default().fg(Color::Gray))
                .bounds([0.0, data.values.len().saturating_sub(1).max(1) as f64])
                .labels(x_labels(&data.labels)),
        )
        .y_axis(
            Axis::default()
                .style(Style::default().fg(Color::Gray))
                .bounds(bounds)
                .labels(y_labels(bounds)),
        );
    frame.render_widget(chart, chart_area);

    if let Some(i) = highlight {
        let caption = Line::from(vec![
            Span::styled("● ", Style::default().fg(Color::Yellow)),
            Span::raw(format!("{}: {}", data.labels[i], format_value(data.values[i]))),
        ]);
        frame.render_widget(Paragraph::new(caption), caption_area);
    }
}

fn render_table(frame: &mut Frame, area: Rect, data: &TableData, scroll: u16) {
    let columns = data.headers.len().max(1) as u32;
    let widths = vec![Constraint::Ratio(1, columns); columns as usize];

    let header = Row::new(data.headers.iter().cloned())
        .style(Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD))
        .bottom_margin(1);

    // Zebra striping for readability
    let rows: Vec<Row> = data
        .rows
        .iter()
        .enumerate()
        .skip(scroll as usize)
        .map(|(i, row)| {
            let style = if i % 2 == 0 {
                Style::default()
            } else {
                Style::default().bg(Color::Rgb(30, 30, 30))
            };
            Row::new(row.iter().map(|cell| cell.to_string())).style(style)
        })
        .collect();

    let table = Table::new(rows, widths).header(header).column_spacing(1);
    frame.render_widget(table, area);
}

fn render_help(frame: &mut Frame, area: Rect) {
    let popup_width = 52.min(area.width.saturating_sub(4));
    let popup_height = 16.min(area.height.saturating_sub(2));
    let popup_area = Rect {
        x: area.x + (area.width.saturating_sub(popup_width)) / 2,
        y: area.y + (area.height.saturating_sub(popup_height)) / 2,
        width: popup_width,
        height: popup_height,
    };

    frame.render_widget(Clear, popup_area);

    let key_style = Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD);
    let entries = [
        ("Enter", "Send the question"),
        ("↑ / ↓", "Cycle suggested questions (empty input)"),
        ("Esc", "Leave the input box"),
        ("Tab", "Move focus between panels"),
        ("j / k", "Scroll the focused panel"),
        ("Ctrl-d / Ctrl-u", "Scroll half a page"),
        ("g / G", "Jump to top / bottom"),
        ("Ctrl-x", "Abandon the running query"),
        ("?", "Toggle this help"),
        ("q / Ctrl-c", "Quit"),
    ];
    let lines: Vec<Line> = entries
        .iter()
        .map(|(key, action)| {
            Line::from(vec![
                Span::styled(format!(" {:<16}", key), key_style),
                Span::raw(*action),
            ])
        })
        .collect();

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Cyan))
        .title(" Keys (Esc to close) ");
    frame.render_widget(Paragraph::new(lines).block(block), popup_area);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tui::EventHandler;
    use flightchat_core::{Config, PollOutcome, QueryResult};
    use pretty_assertions::assert_eq;
    use ratatui::{backend::TestBackend, Terminal};
    use serde_json::json;

    fn test_app() -> (App, EventHandler) {
        let events = EventHandler::detached();
        let app = App::new(&Config::new(), events.poll_sender()).unwrap();
        (app, events)
    }

    fn finish(app: &mut App, response: ApiResponse) {
        app.apply_outcome(PollOutcome::Finished {
            query: "question".to_string(),
            response,
            failure: None,
        });
    }

    fn draw(app: &mut App) -> String {
        let mut terminal = Terminal::new(TestBackend::new(140, 40)).unwrap();
        terminal.draw(|frame| render(app, frame)).unwrap();
        let buffer = terminal.backend().buffer();
        buffer
            .content
            .chunks(buffer.area.width as usize)
            .map(|row| row.iter().map(|cell| cell.symbol()).collect::<String>())
            .collect::<Vec<_>>()
            .join("\n")
    }

    #[test]
    fn test_format_value_and_share() {
        assert_eq!(format_value(850.0), "850");
        assert_eq!(format_value(12.345), "12.35");
        assert_eq!(share(1.0, 4.0), 25.0);
        assert_eq!(share(1.0, 0.0), 0.0);
    }

    #[test]
    fn test_markdown_line() {
        let line = parse_markdown_line("**United** has 12 flights");
        assert_eq!(line.spans.len(), 2);
        assert_eq!(line.spans[0].content, "United");
        assert!(line.spans[0].style.add_modifier.contains(Modifier::BOLD));

        let bullet = parse_markdown_line("- JFK");
        assert_eq!(bullet.spans[0].content, "  • ");

        let unclosed = parse_markdown_line("**open");
        assert_eq!(unclosed.spans[0].content, "**open");
    }

    #[tokio::test]
    async fn test_welcome_and_empty_panel() {
        let (mut app, _events) = test_app();
        let screen = draw(&mut app);
        assert!(screen.contains("Welcome! Ask me questions about flight data"));
        assert!(screen.contains("Which airline has the most flights?"));
        assert!(screen.contains("Ask a question to see the answer here"));
    }

    #[tokio::test]
    async fn test_processing_indicator() {
        let (mut app, _events) = test_app();
        app.query_input = "Which airline has the most flights?".to_string();
        assert!(app.submit_query());

        let screen = draw(&mut app);
        assert!(screen.contains("Processing your query."));
        assert!(screen.contains("Ctrl-X to cancel"));
        app.shutdown();
    }

    #[tokio::test]
    async fn test_pie_chart_with_title() {
        let (mut app, _events) = test_app();
        finish(
            &mut app,
            ApiResponse::complete(
                "q",
                QueryResult::new(
                    "pie_chart",
                    Some(json!({
                        "labels": ["New York (JFK)", "Los Angeles (LAX)"],
                        "values": [75, 25],
                        "title": "Top Destinations"
                    })),
                ),
            ),
        );

        let screen = draw(&mut app);
        assert!(screen.contains("Top Destinations"));
        assert!(screen.contains("New York (JFK)"));
        assert!(screen.contains("75.0%"));
        assert!(screen.contains(VISUALIZATION_NOTE));
    }

    #[tokio::test]
    async fn test_bar_chart_renders_values() {
        let (mut app, _events) = test_app();
        finish(
            &mut app,
            ApiResponse::complete(
                "q",
                QueryResult::new(
                    "bar_chart",
                    Some(json!({"labels": ["United", "Delta"], "values": [120, 80], "title": "Flights by Airline"})),
                ),
            ),
        );

        let screen = draw(&mut app);
        assert!(screen.contains("Visualization: bar_chart"));
        assert!(screen.contains("Flights by Airline"));
        assert!(screen.contains("United"));
    }

    #[tokio::test]
    async fn test_table_rows() {
        let (mut app, _events) = test_app();
        finish(
            &mut app,
            ApiResponse::complete(
                "q",
                QueryResult::new(
                    "table",
                    Some(json!({"headers": ["Airline", "Avg Fare"], "rows": [["United", 245.5], ["Delta", 230]]})),
                ),
            ),
        );

        let screen = draw(&mut app);
        assert!(screen.contains("Avg Fare"));
        assert!(screen.contains("245.5"));
        assert!(screen.contains("Delta"));
    }

    #[tokio::test]
    async fn test_time_series_highlight_caption() {
        let (mut app, _events) = test_app();
        finish(
            &mut app,
            ApiResponse::complete(
                "q",
                QueryResult::new(
                    "time_series",
                    Some(json!({
                        "labels": ["2024-01", "2024-02", "2024-03"],
                        "values": [10, 32, 18],
                        "highlight": "2024-02"
                    })),
                ),
            ),
        );

        let screen = draw(&mut app);
        assert!(screen.contains("2024-02: 32"));
    }

    #[tokio::test]
    async fn test_text_error_and_unsupported_results() {
        let (mut app, _events) = test_app();

        finish(
            &mut app,
            ApiResponse::complete("q", QueryResult::new("text", Some(json!("United Airlines operates **120** flights")))),
        );
        let screen = draw(&mut app);
        assert!(screen.contains("United Airlines operates 120 flights"));

        finish(&mut app, ApiResponse::failed("q", "Dataset not loaded"));
        let screen = draw(&mut app);
        assert!(screen.contains("Error: Dataset not loaded"));

        finish(&mut app, ApiResponse::complete("q", QueryResult::new("heatmap", None)));
        let screen = draw(&mut app);
        assert!(screen.contains("Unsupported visualization type: heatmap"));
    }

    #[tokio::test]
    async fn test_empty_chart_payload() {
        let (mut app, _events) = test_app();
        finish(&mut app, ApiResponse::complete("q", QueryResult::new("line_chart", None)));
        let screen = draw(&mut app);
        assert!(screen.contains("No data to display"));
    }

    #[tokio::test]
    async fn test_help_popup() {
        let (mut app, _events) = test_app();
        app.show_help = true;
        let screen = draw(&mut app);
        assert!(screen.contains("Keys (Esc to close)"));
        assert!(screen.contains("Abandon the running query"));
    }
}
