//! Behavioral alerts
//!
//! Alerts are timestamped records appended by the state machine and drained
//! destructively by consumers (reports, transport). Throttling happens at the
//! call sites; the log itself never deduplicates.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, VecDeque};
use std::fmt;

/// Alert entries retained per session for status queries
pub const DEFAULT_ALERT_HISTORY: usize = 100;

/// Kind of suspicious behavior
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum AlertType {
    #[serde(rename = "Looking Away")]
    LookingAway,
    #[serde(rename = "Multiple People")]
    MultiplePeople,
    #[serde(rename = "Mobile Phone")]
    MobileDevice,
}

impl AlertType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AlertType::LookingAway => "Looking Away",
            AlertType::MultiplePeople => "Multiple People",
            AlertType::MobileDevice => "Mobile Phone",
        }
    }
}

impl fmt::Display for AlertType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Immutable alert record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alert {
    pub timestamp: DateTime<Utc>,
    #[serde(rename = "type")]
    pub alert_type: AlertType,
    pub details: String,
}

/// FIFO alert log with destructive drain
#[derive(Debug, Clone, Default)]
pub struct AlertLog {
    pending: VecDeque<Alert>,
}

impl AlertLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an alert stamped with the current time
    pub fn emit(&mut self, alert_type: AlertType, details: impl Into<String>) -> &Alert {
        self.emit_at(Utc::now(), alert_type, details)
    }

    pub fn emit_at(
        &mut self,
        timestamp: DateTime<Utc>,
        alert_type: AlertType,
        details: impl Into<String>,
    ) -> &Alert {
        let alert = Alert {
            timestamp,
            alert_type,
            details: details.into(),
        };
        tracing::info!(
            alert_type = %alert.alert_type,
            details = %alert.details,
            "alert raised"
        );
        self.pending.push_back(alert);
        &self.pending[self.pending.len() - 1]
    }

    /// Remove and return every pending alert in emission order
    pub fn drain(&mut self) -> Vec<Alert> {
        self.pending.drain(..).collect()
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}

/// Per-type alert counts
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AlertSummary {
    pub total_alerts: u64,
    pub alert_types: BTreeMap<AlertType, u64>,
}

impl AlertSummary {
    pub fn record(&mut self, alert: &Alert) {
        self.total_alerts += 1;
        *self.alert_types.entry(alert.alert_type).or_insert(0) += 1;
    }

    pub fn count(&self, alert_type: AlertType) -> u64 {
        self.alert_types.get(&alert_type).copied().unwrap_or(0)
    }
}

/// Bounded history of already-delivered alerts plus a running tally
#[derive(Debug, Clone)]
pub struct AlertHistory {
    recent: VecDeque<Alert>,
    capacity: usize,
    summary: AlertSummary,
}

impl Default for AlertHistory {
    fn default() -> Self {
        Self::new(DEFAULT_ALERT_HISTORY)
    }
}

impl AlertHistory {
    pub fn new(capacity: usize) -> Self {
        Self {
            recent: VecDeque::with_capacity(capacity),
            capacity,
            summary: AlertSummary::default(),
        }
    }

    pub fn extend<'a>(&mut self, alerts: impl IntoIterator<Item = &'a Alert>) {
        for alert in alerts {
            self.summary.record(alert);
            self.recent.push_back(alert.clone());
            while self.recent.len() > self.capacity {
                self.recent.pop_front();
            }
        }
    }

    pub fn recent(&self) -> Vec<Alert> {
        self.recent.iter().cloned().collect()
    }

    pub fn summary(&self) -> &AlertSummary {
        &self.summary
    }
}
