//! # pulsedash-types
//!
//! Core types shared between the pulsedash streaming client, the
//! reconciler and anything that renders merged metric series.
//!
//! ## Design Goals
//!
//! - **Zero required dependencies**: Core types work without any serialization framework
//! - **Optional serialization**: Enable the `serde` feature to read and write the wire format
//! - **Explicit gaps**: Non-finite samples become a "no data" marker instead of `NaN`
//!
//! ## Features
//!
//! - `std` (default): Standard library support
//! - `serde`: JSON serialization via serde, matching the metrics backend
//!
//! ## Example
//!
//! ```rust
//! use pulsedash_types::{ChartPoint, ConnectionStatus, MetricPoint};
//!
//! let point = MetricPoint::new("2024-05-01T10:00:00Z", 42.5, "cpu");
//! assert!(point.is_type("cpu"));
//!
//! let chart = ChartPoint::from(&point);
//! assert_eq!(chart.value, Some(42.5));
//!
//! assert_eq!(ConnectionStatus::default(), ConnectionStatus::Idle);
//! ```

#![cfg_attr(not(feature = "std"), no_std)]

extern crate alloc;

mod point;
mod series;
mod status;

pub use point::*;
pub use series::*;
pub use status::*;
