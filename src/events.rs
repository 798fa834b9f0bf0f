use std::time::Duration;

use anyhow::Result;
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyModifiers};

use crate::app::App;
use crate::data::MetricKind;

/// Poll for events with a timeout
pub fn poll_event(timeout: Duration) -> Result<Option<Event>> {
    if event::poll(timeout)? {
        Ok(Some(event::read()?))
    } else {
        Ok(None)
    }
}

/// Handle a key event
pub fn handle_key_event(app: &mut App, key: KeyEvent) {
    // If help is shown, any key closes it
    if app.show_help {
        app.show_help = false;
        return;
    }

    match key.code {
        KeyCode::Char('q') | KeyCode::Esc => app.quit(),
        KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => app.quit(),

        // Metric toggles
        KeyCode::Char(c @ '1'..='4') => {
            if let Some(metric) = MetricKind::from_key(c) {
                app.toggle_metric(metric);
            }
        }

        // Time range
        KeyCode::Char('t') | KeyCode::Right => app.next_range(),
        KeyCode::Char('T') | KeyCode::Left => app.prev_range(),

        KeyCode::Char('r') => app.refresh(),
        KeyCode::Char('c') => app.reconnect_failed(),
        KeyCode::Char('x') => app.clear_credential(),

        KeyCode::Char('?') => app.toggle_help(),

        _ => {}
    }
}
