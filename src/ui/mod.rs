//! Terminal UI rendering using ratatui.
//!
//! ## Submodules
//!
//! - [`dashboard`]: one card per selected metric with its chart and status
//! - [`common`]: Shared components (header, metric bar, status bar, help overlay)
//! - [`theme`]: Light/dark theme support with terminal auto-detection
//!
//! ## Rendering Architecture
//!
//! ```text
//! ┌──────────────────────────────────────┐
//! │ Header (common::render_header)       │
//! ├──────────────────────────────────────┤
//! │ Metric bar (common::render_metrics)  │
//! ├──────────────────────────────────────┤
//! │                                      │
//! │ Metric cards (dashboard::render)     │
//! │                                      │
//! ├──────────────────────────────────────┤
//! │ Status Bar (common::render_status)   │
//! └──────────────────────────────────────┘
//!         ↑
//!    Overlay rendered on top:
//!    - common::render_help
//! ```

pub mod common;
pub mod dashboard;
pub mod theme;

pub use theme::Theme;
