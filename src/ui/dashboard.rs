//! Metric cards.
//!
//! One bordered card per selected metric: a summary line with the newest
//! value and stream status, then a line chart of the merged series over the
//! current time window.

use chrono::{DateTime, Local, Utc};
use pulsedash_types::MergedSeries;
use ratatui::{
    layout::{Constraint, Layout, Rect},
    style::{Modifier, Style},
    symbols::Marker,
    text::{Line, Span},
    widgets::{Axis, Block, Borders, Chart, Dataset, GraphType, Paragraph},
    Frame,
};

use crate::app::{App, MetricPanel};
use crate::data::reconcile::parse_timestamp;

/// Cards narrower than this are stacked in a single column.
const MIN_CARD_WIDTH: u16 = 48;

/// Render every selected metric as a card.
pub fn render(frame: &mut Frame, app: &App, area: Rect) {
    let panels: Vec<&MetricPanel> = app.panels().collect();
    if panels.is_empty() {
        return;
    }

    let columns = if panels.len() > 1 && area.width >= MIN_CARD_WIDTH * 2 {
        2
    } else {
        1
    };
    let rows = panels.len().div_ceil(columns);

    let row_areas = Layout::vertical(vec![Constraint::Ratio(1, rows as u32); rows]).split(area);
    for (row, chunk) in panels.chunks(columns).enumerate() {
        let cells =
            Layout::horizontal(vec![Constraint::Ratio(1, columns as u32); columns]).split(row_areas[row]);
        for (panel, cell) in chunk.iter().zip(cells.iter()) {
            render_card(frame, app, panel, *cell);
        }
    }
}

fn render_card(frame: &mut Frame, app: &App, panel: &MetricPanel, area: Rect) {
    let status = app.status(panel.metric);

    let block = Block::default()
        .title(Line::from(vec![Span::styled(
            format!(" {} ", panel.metric.label()),
            Style::default().add_modifier(Modifier::BOLD),
        )]))
        .title_top(
            Line::from(Span::styled(format!(" {} ", status.label()), app.theme.status_style(status)))
                .right_aligned(),
        )
        .borders(Borders::ALL)
        .border_type(app.theme.border_type)
        .border_style(Style::default().fg(app.theme.border));

    let inner = block.inner(area);
    frame.render_widget(block, area);

    let chunks = Layout::vertical([
        Constraint::Length(1), // Latest value
        Constraint::Min(3),    // Chart
    ])
    .split(inner);

    let (value, at) = latest_value(&panel.series);
    let summary = Line::from(vec![
        Span::styled(format!(" {} ", value), app.theme.header),
        Span::styled(at, Style::default().add_modifier(Modifier::DIM)),
    ]);
    frame.render_widget(Paragraph::new(summary), chunks[0]);

    let from = app.bounds().from;
    let points = points(&panel.series, from);

    if points.is_empty() {
        let message = if panel.loading {
            "Loading…"
        } else {
            "No data in this window"
        };
        let paragraph = Paragraph::new(message)
            .alignment(ratatui::layout::Alignment::Center)
            .style(Style::default().add_modifier(Modifier::DIM));
        frame.render_widget(paragraph, chunks[1]);
        return;
    }

    let span = (app.bounds().to - from).num_seconds() as f64;
    let x_max = points.iter().map(|(x, _)| *x).fold(span, f64::max);
    let [y_min, y_max] = y_bounds(&points);

    let dataset = Dataset::default()
        .marker(Marker::Braille)
        .graph_type(GraphType::Line)
        .style(Style::default().fg(app.theme.series))
        .data(&points);

    let axis_style = Style::default().fg(app.theme.border);
    let chart = Chart::new(vec![dataset])
        .x_axis(
            Axis::default()
                .style(axis_style)
                .bounds([0.0, x_max])
                .labels(vec![
                    format!("-{}", app.range.label()),
                    "now".to_string(),
                ]),
        )
        .y_axis(
            Axis::default()
                .style(axis_style)
                .bounds([y_min, y_max])
                .labels(vec![format!("{:.1}", y_min), format!("{:.1}", y_max)]),
        );

    frame.render_widget(chart, chunks[1]);
}

/// The newest slot as display text: value to one decimal and its local time.
///
/// A gap or an empty series shows `--`.
fn latest_value(series: &MergedSeries) -> (String, String) {
    let Some(latest) = series.latest() else {
        return ("--".to_string(), String::new());
    };

    let value = latest
        .value
        .map(|v| format!("{:.1}", v))
        .unwrap_or_else(|| "--".to_string());
    let at = parse_timestamp(&latest.timestamp)
        .map(|t| format!("at {}", t.with_timezone(&Local).format("%H:%M:%S")))
        .unwrap_or_else(|| latest.timestamp.clone());

    (value, at)
}

/// Plottable points of the series as one continuous run.
///
/// x is seconds since `from`. "No data" slots and slots whose timestamp does
/// not parse are left out, so the line joins the neighbours on either side.
fn points(series: &MergedSeries, from: DateTime<Utc>) -> Vec<(f64, f64)> {
    series
        .points
        .iter()
        .filter_map(|point| {
            let at = parse_timestamp(&point.timestamp)?;
            let value = point.value?;
            Some(((at - from).num_milliseconds() as f64 / 1000.0, value))
        })
        .collect()
}

/// Y range covering every point with a little headroom.
fn y_bounds(points: &[(f64, f64)]) -> [f64; 2] {
    let (min, max) = points
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), (_, y)| {
            (lo.min(*y), hi.max(*y))
        });

    if !min.is_finite() || !max.is_finite() {
        return [0.0, 1.0];
    }
    if (max - min).abs() < f64::EPSILON {
        return [min - 1.0, max + 1.0];
    }

    let pad = (max - min) * 0.05;
    [min - pad, max + pad]
}
