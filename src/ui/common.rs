//! Common UI components shared across views.
//!
//! This module contains the header bar, metric bar, status bar, and help overlay.

use chrono::{DateTime, Local, Utc};
use ratatui::{
    layout::Rect,
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Paragraph, Tabs},
    Frame,
};

use crate::app::App;
use crate::data::MetricKind;

/// Render the header bar.
///
/// Displays: title, time range, last update, and loading or retry notices.
pub fn render_header(frame: &mut Frame, app: &App, area: Rect) {
    let mut spans = vec![
        Span::styled(" REALTIME ANALYTICS ", app.theme.header),
        Span::raw("│ "),
        Span::styled(app.range.label(), Style::default().add_modifier(Modifier::BOLD)),
        Span::raw(" │ "),
        Span::raw(format!("Updated {}", format_updated(app.last_updated))),
    ];

    if app.any_loading() {
        spans.push(Span::raw(" │ "));
        spans.push(Span::styled(
            "Loading…",
            Style::default().add_modifier(Modifier::DIM),
        ));
    }

    if app.any_reconnecting() {
        spans.push(Span::raw(" │ "));
        spans.push(Span::styled(
            "retrying live connection…",
            Style::default().fg(app.theme.warning),
        ));
    }

    if !app.has_credential() {
        spans.push(Span::raw(" │ "));
        spans.push(Span::styled(
            "no credential",
            Style::default().fg(app.theme.critical),
        ));
    }

    frame.render_widget(Paragraph::new(Line::from(spans)), area);
}

/// Local wall-clock time of the last update.
fn format_updated(at: Option<DateTime<Utc>>) -> String {
    match at {
        Some(at) => at.with_timezone(&Local).format("%H:%M:%S").to_string(),
        None => "never".to_string(),
    }
}

/// Render the metric bar.
///
/// Every metric is listed with its toggle key; selected ones are highlighted.
pub fn render_metrics(frame: &mut Frame, app: &App, area: Rect) {
    let titles: Vec<Line> = MetricKind::ALL
        .iter()
        .enumerate()
        .map(|(i, metric)| {
            let marker = if app.selection.contains(*metric) { "●" } else { "○" };
            let style = if app.selection.contains(*metric) {
                app.theme.tab_active
            } else {
                app.theme.tab_inactive
            };
            Line::styled(format!(" {}:{} {} ", i + 1, marker, metric.label()), style)
        })
        .collect();

    let tabs = Tabs::new(titles).divider("|");

    frame.render_widget(tabs, area);
}

/// Render the status bar at the bottom.
///
/// Shows the newest toast if any, otherwise the history source and controls.
pub fn render_status_bar(frame: &mut Frame, app: &App, area: Rect) {
    if let Some(toast) = app.active_toasts().last() {
        let paragraph =
            Paragraph::new(format!(" {} ", toast.message)).style(app.theme.toast_style(toast.level));
        frame.render_widget(paragraph, area);
        return;
    }

    let status = format!(
        " {} | 1-4:metrics t/T:range r:refresh c:reconnect ?:help q:quit",
        app.source_description()
    );

    let paragraph = Paragraph::new(status).style(Style::default().add_modifier(Modifier::DIM));

    frame.render_widget(paragraph, area);
}

/// Render the help overlay with keyboard shortcuts.
///
/// Displayed as a centered modal on top of the dashboard.
pub fn render_help(frame: &mut Frame, app: &App, area: Rect) {
    let help_text = vec![
        Line::from(vec![Span::styled("Keyboard Shortcuts", app.theme.header)]),
        Line::from(""),
        Line::from(vec![Span::styled(
            " Metrics",
            Style::default().add_modifier(Modifier::BOLD),
        )]),
        Line::from("  1-4       Toggle CPU/Memory/Disk/Network"),
        Line::from("  t / T     Next / previous time range"),
        Line::from(""),
        Line::from(vec![Span::styled(
            " Connection",
            Style::default().add_modifier(Modifier::BOLD),
        )]),
        Line::from("  r         Refresh history now"),
        Line::from("  c         Reconnect failed streams"),
        Line::from("  x         Clear credential"),
        Line::from(""),
        Line::from(vec![Span::styled(
            " General",
            Style::default().add_modifier(Modifier::BOLD),
        )]),
        Line::from("  ?         Toggle help"),
        Line::from("  q         Quit"),
        Line::from(""),
        Line::from(vec![Span::styled(
            "Press any key to close",
            Style::default().add_modifier(Modifier::DIM),
        )]),
    ];

    let block = Block::default()
        .title(" Help ")
        .borders(Borders::ALL)
        .border_type(app.theme.border_type)
        .border_style(Style::default().fg(app.theme.highlight));

    let paragraph = Paragraph::new(help_text).block(block);

    let help_width = 46u16.min(area.width.saturating_sub(4));
    let help_height = 19u16.min(area.height.saturating_sub(2));
    let x = area.x + (area.width.saturating_sub(help_width)) / 2;
    let y = area.y + (area.height.saturating_sub(help_height)) / 2;
    let help_area = Rect::new(x, y, help_width, help_height);

    frame.render_widget(Clear, help_area);
    frame.render_widget(paragraph, help_area);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_updated_without_update() {
        assert_eq!(format_updated(None), "never");
    }

    #[test]
    fn test_format_updated_is_clock_time() {
        let formatted = format_updated(Some(Utc::now()));
        assert_eq!(formatted.len(), 8);
        assert_eq!(formatted.matches(':').count(), 2);
    }
}
