//! UI rendering with ratatui.
//!
//! Single-column layout: header bar, references panel, answer panel, query
//! input and status bar.

use chrono::Local;
use gciqs_core::{Phase, Reference, Segment};
use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style, Stylize};
use ratatui::text::{Line, Span, Text};
use ratatui::widgets::{
    Block, Borders, Paragraph, Scrollbar, ScrollbarOrientation, ScrollbarState, Wrap,
};
use ratatui::Frame;

use crate::app::App;
use crate::types::HealthStatus;

/// Most reference rows shown before the panel stops growing.
const MAX_REFERENCE_ROWS: u16 = 6;

/// Horizontal padding for answer content.
const ANSWER_PADDING: u16 = 1;

/// Cursor glyph trailing the answer while it streams.
const STREAM_CURSOR: &str = "▌";

/// Render the UI.
pub fn render(frame: &mut Frame, app: &App) {
    let area = frame.area();
    let view = app.view();

    let reference_height = if view.references.is_empty() {
        0
    } else {
        u16::try_from(view.references.len())
            .unwrap_or(MAX_REFERENCE_ROWS)
            .min(MAX_REFERENCE_ROWS)
            + 2
    };
    let error_height = if view.error.is_some() { 3 } else { 0 };

    let layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(1),                // Header bar
            Constraint::Length(reference_height), // References
            Constraint::Length(error_height),     // Error banner
            Constraint::Min(3),                   // Answer
            Constraint::Length(3),                // Query input
            Constraint::Length(1),                // Status bar
        ])
        .split(area);

    render_header_bar(frame, app, layout[0]);
    if reference_height > 0 {
        render_references_panel(frame, &view.references, layout[1]);
    }
    if let Some(error) = &view.error {
        render_error_banner(frame, error, layout[2]);
    }
    render_answer_panel(frame, app, layout[3]);
    render_input_line(frame, app, layout[4]);
    render_status_bar(frame, app, layout[5]);
}

/// Truncate a string in the middle with ellipsis if it exceeds `max_len` characters.
fn truncate_middle(s: &str, max_len: usize) -> String {
    let len = s.chars().count();
    if len <= max_len {
        return s.to_string();
    }
    if max_len < 5 {
        return s.chars().take(max_len).collect();
    }
    let keep = (max_len - 3) / 2; // 3 chars for "..."
    let start: String = s.chars().take(keep).collect();
    let end: String = s.chars().skip(len - keep).collect();
    format!("{start}...{end}")
}

/// Render the header bar with the service URL and health.
fn render_header_bar(frame: &mut Frame, app: &App, area: Rect) {
    let title = "GCIQS";
    let status_text = health_text(&app.health);
    let status_style = Style::default().fg(app.health.color());

    let max_url_width = (area.width as usize / 2).saturating_sub(4);
    let display_url = truncate_middle(app.server_url(), max_url_width);

    let right_width = display_url.chars().count() + status_text.chars().count() + 3;
    let padding = (area.width as usize).saturating_sub(title.len() + right_width);

    let line = Line::from(vec![
        Span::styled(title, Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD)),
        Span::raw(" ".repeat(padding)),
        Span::raw(display_url),
        Span::raw(" ["),
        Span::styled(status_text, status_style),
        Span::raw("]"),
    ]);

    let header = Paragraph::new(line).style(Style::default().bg(Color::DarkGray));
    frame.render_widget(header, area);
}

/// Health label, with the local time of the last completed check.
fn health_text(health: &HealthStatus) -> String {
    match health.checked_at() {
        Some(at) => format!(
            "{} · {}",
            health.label(),
            at.with_timezone(&Local).format("%H:%M:%S")
        ),
        None => health.label(),
    }
}

/// One row of the references panel.
fn reference_line(reference: &Reference) -> Line<'_> {
    let mut spans = vec![
        Span::styled(
            format!("[{}] ", reference.id),
            Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
        ),
        Span::styled(reference.title.as_str(), Style::default().fg(Color::White)),
        Span::raw("  "),
        Span::styled(reference.gene_label(), Style::default().fg(Color::Magenta)),
        Span::styled(
            format!(" · {} · {:.2}", reference.kind, reference.score),
            Style::default().fg(Color::Gray),
        ),
    ];
    if !reference.citations.is_empty() {
        spans.push(Span::styled(
            format!("  {}", reference.citations.join("; ")),
            Style::default().fg(Color::DarkGray),
        ));
    }
    Line::from(spans)
}

/// Render the retrieved references.
fn render_references_panel(frame: &mut Frame, references: &[Reference], area: Rect) {
    let block = Block::default()
        .title(format!(" References ({}) ", references.len()))
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Gray));

    let lines: Vec<Line> = references.iter().map(reference_line).collect();
    let paragraph = Paragraph::new(Text::from(lines)).block(block);
    frame.render_widget(paragraph, area);
}

/// Render the error banner.
fn render_error_banner(frame: &mut Frame, error: &str, area: Rect) {
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Red));
    let line = Line::from(vec![
        Span::styled("⚠ ", Style::default().fg(Color::Red).bold()),
        Span::styled(error, Style::default().fg(Color::Red)),
    ]);
    frame.render_widget(Paragraph::new(line).block(block), area);
}

/// Build styled lines from citation-marked answer segments.
fn segment_lines(segments: &[Segment]) -> Vec<Line<'static>> {
    let citation_style = Style::default()
        .fg(Color::Yellow)
        .add_modifier(Modifier::BOLD);
    let mut lines = Vec::new();
    let mut current: Vec<Span<'static>> = Vec::new();

    for segment in segments {
        match segment {
            Segment::Text(text) => {
                let mut parts = text.split('\n');
                if let Some(first) = parts.next() {
                    if !first.is_empty() {
                        current.push(Span::raw(first.to_string()));
                    }
                }
                for part in parts {
                    lines.push(Line::from(std::mem::take(&mut current)));
                    if !part.is_empty() {
                        current.push(Span::raw(part.to_string()));
                    }
                }
            }
            Segment::Citation(id) => {
                current.push(Span::styled(format!("[{id}]"), citation_style));
            }
        }
    }

    lines.push(Line::from(current));
    lines
}

/// Build lines for the answer as it streams.
fn streaming_lines(answer: &str, streaming: bool) -> Vec<Line<'static>> {
    let mut lines: Vec<Line<'static>> = answer
        .split('\n')
        .map(|line| Line::from(line.to_string()))
        .collect();
    if streaming {
        if let Some(last) = lines.last_mut() {
            last.push_span(Span::styled(STREAM_CURSOR, Style::default().fg(Color::Cyan)));
        }
    }
    lines
}

/// Render the answer panel.
fn render_answer_panel(frame: &mut Frame, app: &App, area: Rect) {
    let view = app.view();

    let block = Block::default()
        .title(" Answer ")
        .borders(Borders::ALL)
        .border_style(if view.streaming {
            Style::default().fg(Color::Cyan)
        } else {
            Style::default().fg(Color::Gray)
        });
    let inner_full = block.inner(area);
    frame.render_widget(block, area);

    let inner = Rect::new(
        inner_full.x + ANSWER_PADDING,
        inner_full.y,
        inner_full.width.saturating_sub(ANSWER_PADDING * 2 + 1), // +1 for scrollbar
        inner_full.height,
    );

    if app.is_loading() {
        let loader = Line::from(vec![
            Span::styled(app.spinner_char(), Style::default().fg(Color::Yellow)),
            Span::styled(" retrieving documents...", Style::default().fg(Color::DarkGray)),
        ]);
        frame.render_widget(Paragraph::new(loader), inner);
        return;
    }

    if !view.answer_visible {
        if view.is_empty() {
            let help = Paragraph::new("Ask a genomics question and press Enter (Tab for examples)")
                .style(Style::default().fg(Color::DarkGray))
                .wrap(Wrap { trim: true });
            frame.render_widget(help, inner);
        }
        return;
    }

    let lines = match &view.cited {
        Some(cited) => segment_lines(cited.segments()),
        None => streaming_lines(&view.answer, view.streaming),
    };
    let text = Text::from(lines);

    let content_width = inner.width as usize;
    let visible_lines = inner.height as usize;
    let total_wrapped_lines = calculate_wrapped_line_count(&text, content_width);

    // Max scroll is how far we can scroll up from the bottom
    let max_scroll = total_wrapped_lines.saturating_sub(visible_lines);
    let effective_scroll = view.scroll.min(max_scroll);
    let scroll_offset = max_scroll.saturating_sub(effective_scroll);

    let paragraph = Paragraph::new(text)
        .wrap(Wrap { trim: false })
        .scroll((u16::try_from(scroll_offset).unwrap_or(u16::MAX), 0));
    frame.render_widget(paragraph, inner);

    if total_wrapped_lines > visible_lines {
        let scrollbar = Scrollbar::new(ScrollbarOrientation::VerticalRight)
            .begin_symbol(Some("▲"))
            .end_symbol(Some("▼"));

        let mut scrollbar_state = ScrollbarState::new(total_wrapped_lines)
            .position(scroll_offset)
            .viewport_content_length(visible_lines);

        frame.render_stateful_widget(scrollbar, inner_full, &mut scrollbar_state);
    }
}

/// Render the query input line.
fn render_input_line(frame: &mut Frame, app: &App, area: Rect) {
    let busy = app.is_busy();

    let block = Block::default()
        .title(if busy { " Query (answering...) " } else { " Query " })
        .borders(Borders::ALL)
        .border_style(if busy {
            Style::default().fg(Color::DarkGray)
        } else {
            Style::default().fg(Color::Cyan)
        });
    let inner = block.inner(area);

    let prompt = "> ";
    let input_line = Line::from(vec![
        Span::styled(prompt, Style::default().fg(if busy { Color::DarkGray } else { Color::Cyan })),
        Span::styled(
            app.input.as_str(),
            Style::default().fg(if busy { Color::DarkGray } else { Color::White }),
        ),
    ]);
    frame.render_widget(Paragraph::new(input_line).block(block), area);

    // Hide cursor while busy to prevent flickering
    if !busy {
        let column = cursor_column(prompt, &app.input, app.cursor_position);
        let offset = u16::try_from(column).unwrap_or(u16::MAX);
        frame.set_cursor_position((inner.x.saturating_add(offset), inner.y));
    }
}

/// Display column of the cursor, counting wide characters as two cells.
fn cursor_column(prompt: &str, input: &str, cursor: usize) -> usize {
    let before: String = input.chars().take(cursor).collect();
    Line::from(vec![Span::raw(prompt), Span::raw(before)]).width()
}

/// Render the status bar.
fn render_status_bar(frame: &mut Frame, app: &App, area: Rect) {
    let phase = app.controller.phase();
    let phase_indicator = Span::styled(
        format!(" {} ", phase.as_str().to_uppercase()),
        Style::default().fg(Color::Black).bg(match phase {
            Phase::Idle => Color::Blue,
            Phase::Loading | Phase::Streaming => Color::Yellow,
            Phase::Finalized => Color::Green,
            Phase::Errored => Color::Red,
        }),
    );

    let status = if let Some(status) = &app.status_message {
        Line::from(vec![
            phase_indicator,
            Span::styled(format!(" {status}"), Style::default().fg(Color::Green)),
        ])
    } else {
        Line::from(vec![
            phase_indicator,
            Span::raw(" "),
            Span::styled("Enter", Style::default().fg(Color::Yellow)),
            Span::raw(":ask "),
            Span::styled("Tab", Style::default().fg(Color::Yellow)),
            Span::raw(":example "),
            Span::styled("Ctrl+L", Style::default().fg(Color::Yellow)),
            Span::raw(":clear "),
            Span::styled("PgUp/PgDn", Style::default().fg(Color::Yellow)),
            Span::raw(":scroll "),
            Span::styled("Esc", Style::default().fg(Color::Yellow)),
            Span::raw(":quit"),
        ])
    };

    let status_bar = Paragraph::new(status).style(Style::default().bg(Color::DarkGray));
    frame.render_widget(status_bar, area);
}

/// Calculate the number of visual lines after text wrapping.
fn calculate_wrapped_line_count(text: &Text, available_width: usize) -> usize {
    if available_width == 0 {
        return text.lines.len();
    }

    text.lines
        .iter()
        .map(|line| line.width().div_ceil(available_width).max(1))
        .sum()
}

#[cfg(test)]
mod tests {
    use gciqs_core::mark_citations;

    use super::*;

    fn line_text(line: &Line) -> String {
        line.spans.iter().map(|s| s.content.as_ref()).collect()
    }

    #[test]
    fn truncate_middle_keeps_both_ends() {
        assert_eq!(truncate_middle("http://localhost:8000", 40), "http://localhost:8000");
        assert_eq!(truncate_middle("abcdefghijklmnop", 9), "abc...nop");
        assert_eq!(truncate_middle("abcdef", 3), "abc");
    }

    #[test]
    fn citation_segments_become_styled_spans() {
        let cited = mark_citations("BRCA1 [DOC-001]\nsee also [DOC-002]");
        let lines = segment_lines(cited.segments());

        assert_eq!(lines.len(), 2);
        assert_eq!(line_text(&lines[0]), "BRCA1 [DOC-001]");
        assert_eq!(line_text(&lines[1]), "see also [DOC-002]");

        let citation = &lines[0].spans[1];
        assert_eq!(citation.content, "[DOC-001]");
        assert_eq!(citation.style.fg, Some(Color::Yellow));
    }

    #[test]
    fn streaming_lines_trail_cursor() {
        let lines = streaming_lines("first\nsecond", true);
        assert_eq!(lines.len(), 2);
        assert_eq!(line_text(&lines[1]), format!("second{STREAM_CURSOR}"));

        let done = streaming_lines("first", false);
        assert_eq!(line_text(&done[0]), "first");
    }

    #[test]
    fn cursor_column_counts_display_width() {
        assert_eq!(cursor_column("> ", "BRCA1", 5), 7);
        assert_eq!(cursor_column("> ", "BRCA1", 2), 4);
        assert_eq!(cursor_column("> ", "日本語 gene", 2), 6);
        assert_eq!(cursor_column("> ", "αβ", 2), 4);
    }

    #[test]
    fn health_text_includes_check_time() {
        use chrono::Utc;

        assert_eq!(health_text(&HealthStatus::Unknown), "checking...");

        let at = Utc::now();
        let text = health_text(&HealthStatus::Online {
            index_size: 10,
            checked_at: at,
        });
        let time = at.with_timezone(&Local).format("%H:%M:%S").to_string();
        assert_eq!(text, format!("online · 10 docs indexed · {time}"));
    }

    #[test]
    fn wrapped_line_count() {
        let text = Text::from(vec![Line::from("abcdefghij"), Line::from("")]);
        assert_eq!(calculate_wrapped_line_count(&text, 4), 4);
        assert_eq!(calculate_wrapped_line_count(&text, 0), 2);
    }
}
