//! Metric kinds and the user's selection of them.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use anyhow::bail;
use serde::Deserialize;

/// A metric the backend can stream and serve history for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MetricKind {
    Cpu,
    Memory,
    Disk,
    Network,
}

impl MetricKind {
    /// All kinds, in display order.
    pub const ALL: [MetricKind; 4] = [
        MetricKind::Cpu,
        MetricKind::Memory,
        MetricKind::Disk,
        MetricKind::Network,
    ];

    /// Wire name, as used in `type` fields and query parameters.
    pub fn as_str(&self) -> &'static str {
        match self {
            MetricKind::Cpu => "cpu",
            MetricKind::Memory => "memory",
            MetricKind::Disk => "disk",
            MetricKind::Network => "network",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            MetricKind::Cpu => "CPU usage",
            MetricKind::Memory => "Memory usage",
            MetricKind::Disk => "Disk I/O",
            MetricKind::Network => "Network I/O",
        }
    }

    /// Kind bound to a number key (1-based, display order).
    pub fn from_key(key: char) -> Option<Self> {
        let index = key.to_digit(10)?.checked_sub(1)?;
        Self::ALL.get(index as usize).copied()
    }
}

impl fmt::Display for MetricKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MetricKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "cpu" => Ok(MetricKind::Cpu),
            "memory" => Ok(MetricKind::Memory),
            "disk" => Ok(MetricKind::Disk),
            "network" => Ok(MetricKind::Network),
            other => bail!("Unknown metric type: {}", other),
        }
    }
}

/// Non-empty set of selected metrics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selection {
    metrics: BTreeSet<MetricKind>,
}

impl Default for Selection {
    fn default() -> Self {
        Self {
            metrics: BTreeSet::from([MetricKind::Cpu, MetricKind::Memory]),
        }
    }
}

impl Selection {
    /// Returns `None` for an empty set.
    pub fn new(metrics: impl IntoIterator<Item = MetricKind>) -> Option<Self> {
        let metrics: BTreeSet<_> = metrics.into_iter().collect();
        if metrics.is_empty() {
            None
        } else {
            Some(Self { metrics })
        }
    }

    pub fn contains(&self, metric: MetricKind) -> bool {
        self.metrics.contains(&metric)
    }

    pub fn iter(&self) -> impl Iterator<Item = MetricKind> + '_ {
        self.metrics.iter().copied()
    }

    pub fn len(&self) -> usize {
        self.metrics.len()
    }

    /// Add or remove `metric`.
    ///
    /// Returns `false` (and changes nothing) when asked to remove the last
    /// selected metric.
    pub fn toggle(&mut self, metric: MetricKind) -> bool {
        if self.metrics.contains(&metric) {
            if self.metrics.len() == 1 {
                return false;
            }
            self.metrics.remove(&metric);
        } else {
            self.metrics.insert(metric);
        }
        true
    }
}
