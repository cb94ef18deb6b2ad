//! Persistent store interface shared with the admin API's database.
//!
//! Monitor rows are written only by the API; observation and incident rows only by the prober,
//! so the two writers never conflict by construction.

pub mod postgres;

// crates.io
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
// self
use crate::{
	_prelude::*,
	model::{Incident, Monitor},
};

/// Observation payload for one started probe, ready to append.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct NewObservation {
	/// Monitor the probe targeted.
	pub monitor_id: i64,
	/// Probe start timestamp.
	pub ts: DateTime<Utc>,
	/// Response status; `None` iff transport failed.
	pub status_code: Option<i32>,
	/// Wall-clock latency in milliseconds; `None` iff transport failed.
	pub latency_ms: Option<i64>,
	/// Whether the status was in the monitor's expected set.
	pub ok: bool,
	/// Truncated transport diagnostic.
	pub error_reason: Option<String>,
}

/// Result of a guarded incident-open write.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct OpenedIncident {
	/// Id of the open incident row for the monitor.
	pub id: i64,
	/// Whether this call inserted the row; `false` means an open row already existed and was
	/// adopted instead.
	pub created: bool,
}

/// Aggregation window for uptime summaries.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum SummaryWindow {
	/// Trailing 24 hours.
	Day,
	/// Trailing 7 days.
	Week,
}
impl SummaryWindow {
	/// Parse the query-string spelling used by the public API.
	pub fn parse(value: &str) -> Option<Self> {
		match value {
			"24h" => Some(Self::Day),
			"7d" => Some(Self::Week),
			_ => None,
		}
	}

	/// Query-string spelling.
	pub fn as_str(&self) -> &'static str {
		match self {
			Self::Day => "24h",
			Self::Week => "7d",
		}
	}

	/// Duration covered by the window.
	pub fn lookback(&self) -> chrono::Duration {
		match self {
			Self::Day => chrono::Duration::hours(24),
			Self::Week => chrono::Duration::days(7),
		}
	}
}

/// Aggregate probe statistics over a window.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct UptimeSummary {
	/// Observations counted in the window.
	pub samples: u64,
	/// Passing share in percent, rounded to two decimals; `0.0` when no samples exist.
	pub uptime_percent: f64,
	/// Mean latency over observations that produced one, rounded to two decimals.
	pub avg_latency_ms: Option<f64>,
}
impl UptimeSummary {
	/// Derive a summary from raw counts.
	pub fn from_counts(samples: u64, passed: u64, avg_latency_ms: Option<f64>) -> Self {
		let uptime_percent = if samples == 0 {
			0.0
		} else {
			round2(passed as f64 / samples as f64 * 100.0)
		};

		Self { samples, uptime_percent, avg_latency_ms: avg_latency_ms.map(round2) }
	}
}

/// Store operations the prober core and the read side rely on.
#[async_trait]
pub trait ProbeStore: Send + Sync {
	/// Load every enabled monitor.
	async fn enabled_monitors(&self) -> Result<Vec<Monitor>>;

	/// Append one observation; returns the assigned id.
	async fn append_observation(&self, observation: &NewObservation) -> Result<i64>;

	/// Open an incident unless one is already open for the monitor.
	///
	/// The guard upholds the single-open-incident invariant even if the in-process ledger lost
	/// track; callers must treat `created == false` as an adoption, not a fresh episode.
	async fn open_incident(
		&self,
		monitor_id: i64,
		reason: &str,
		opened_at: DateTime<Utc>,
	) -> Result<OpenedIncident>;

	/// Move an open incident to `resolved`; returns whether the row was still open.
	async fn resolve_incident(&self, incident_id: i64, closed_at: DateTime<Utc>) -> Result<bool>;

	/// Every incident currently in the open state, across monitors.
	async fn open_incidents(&self) -> Result<Vec<Incident>>;

	/// Aggregate uptime and latency for one monitor over the window.
	async fn uptime_summary(
		&self,
		monitor_id: i64,
		window: SummaryWindow,
	) -> Result<UptimeSummary>;
}

fn round2(value: f64) -> f64 {
	(value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn summary_window_spellings_round_trip() {
		assert_eq!(SummaryWindow::parse("24h"), Some(SummaryWindow::Day));
		assert_eq!(SummaryWindow::parse(SummaryWindow::Week.as_str()), Some(SummaryWindow::Week));
		assert_eq!(SummaryWindow::parse("1h"), None);
	}

	#[test]
	fn summary_from_counts_rounds_and_handles_empty_windows() {
		let empty = UptimeSummary::from_counts(0, 0, None);

		assert_eq!(empty.uptime_percent, 0.0);
		assert_eq!(empty.avg_latency_ms, None);

		let summary = UptimeSummary::from_counts(3, 2, Some(123.456));

		assert_eq!(summary.uptime_percent, 66.67);
		assert_eq!(summary.avg_latency_ms, Some(123.46));
		assert_eq!(summary.samples, 3);
	}
}
