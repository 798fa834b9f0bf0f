//! Theme configuration for the TUI.
//!
//! Supports light and dark themes with automatic terminal detection.

use pulsedash_types::{ConnectionStatus, StatusSeverity};
use ratatui::style::{Color, Modifier, Style};
use ratatui::widgets::block::BorderType;

use crate::app::ToastLevel;

/// Color and style theme for the TUI.
///
/// Use [`Theme::auto_detect()`] for automatic theme selection based on
/// terminal background, or [`Theme::dark()`]/[`Theme::light()`] explicitly.
#[derive(Debug, Clone)]
pub struct Theme {
    /// Accent color for highlights and active elements.
    pub highlight: Color,
    /// Color for degraded states (reconnecting, warnings).
    pub warning: Color,
    /// Color for failures.
    pub critical: Color,
    /// Color for healthy states (connected).
    pub healthy: Color,
    /// Color for inactive states (idle, closed).
    pub muted: Color,
    /// Color for borders and separators.
    pub border: Color,
    /// Line color for chart series.
    pub series: Color,
    /// Style for titles and headings.
    pub header: Style,
    /// Style for selected metrics in the metric bar.
    pub tab_active: Style,
    /// Style for unselected metrics.
    pub tab_inactive: Style,
    /// Border style (rounded, plain, etc.).
    pub border_type: BorderType,
}

impl Theme {
    /// Create a dark theme suitable for dark terminal backgrounds.
    pub fn dark() -> Self {
        Self {
            highlight: Color::Cyan,
            warning: Color::Yellow,
            critical: Color::Red,
            healthy: Color::Green,
            muted: Color::DarkGray,
            border: Color::Gray,
            series: Color::Cyan,
            header: Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
            tab_active: Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
            tab_inactive: Style::default().fg(Color::Gray),
            border_type: BorderType::Rounded,
        }
    }

    /// Create a light theme suitable for light terminal backgrounds.
    pub fn light() -> Self {
        Self {
            highlight: Color::Blue,
            warning: Color::Yellow,
            critical: Color::Red,
            healthy: Color::Green,
            muted: Color::Gray,
            border: Color::DarkGray,
            series: Color::Blue,
            header: Style::default().fg(Color::Blue).add_modifier(Modifier::BOLD),
            tab_active: Style::default().fg(Color::Blue).add_modifier(Modifier::BOLD),
            tab_inactive: Style::default().fg(Color::DarkGray),
            border_type: BorderType::Rounded,
        }
    }

    /// Auto-detect based on terminal background
    pub fn auto_detect() -> Self {
        // Use terminal-light crate to detect background luminance
        match terminal_light::luma() {
            Ok(luma) if luma > 0.5 => Self::light(),
            _ => Self::dark(),
        }
    }

    /// Get style for a connection status
    pub fn status_style(&self, status: ConnectionStatus) -> Style {
        match status.severity() {
            StatusSeverity::Success => Style::default().fg(self.healthy),
            StatusSeverity::Warning => Style::default().fg(self.warning),
            StatusSeverity::Error => Style::default().fg(self.critical).add_modifier(Modifier::BOLD),
            StatusSeverity::Muted => Style::default().fg(self.muted),
        }
    }

    /// Get style for a toast
    pub fn toast_style(&self, level: ToastLevel) -> Style {
        match level {
            ToastLevel::Info => Style::default().fg(self.highlight),
            ToastLevel::Warning => Style::default().fg(self.warning),
            ToastLevel::Error => Style::default().fg(self.critical).add_modifier(Modifier::BOLD),
        }
    }
}
