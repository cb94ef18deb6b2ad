//! Persistent row types shared with the admin API's store.

// std
use std::fmt::{Display, Formatter, Result as FmtResult};
// crates.io
use serde::{Deserialize, Serialize};
// self
use crate::_prelude::*;

/// HTTP method a monitor is probed with.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ProbeMethod {
	/// `GET`, the default.
	#[default]
	Get,
	/// `HEAD`, for targets where the body is irrelevant.
	Head,
	/// `POST`, for targets that only answer writes.
	Post,
}
impl ProbeMethod {
	/// Canonical uppercase spelling, as stored in the `monitors` table.
	pub fn as_str(&self) -> &'static str {
		match self {
			Self::Get => "GET",
			Self::Head => "HEAD",
			Self::Post => "POST",
		}
	}

	/// Parse the stored spelling; case-insensitive.
	pub fn parse(value: &str) -> Option<Self> {
		match value.trim().to_ascii_uppercase().as_str() {
			"GET" => Some(Self::Get),
			"HEAD" => Some(Self::Head),
			"POST" => Some(Self::Post),
			_ => None,
		}
	}
}
impl Display for ProbeMethod {
	fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// A probe target and its cadence parameters; written by the admin API, read here.
#[derive(Clone, Debug, Serialize, Deserialize, sqlx::FromRow)]
pub struct Monitor {
	/// Stable identifier.
	pub id: i64,
	/// Human-readable label.
	pub name: String,
	/// Probed URL.
	pub url: String,
	/// HTTP method as stored; see [`Monitor::probe_method`].
	pub method: String,
	/// Seconds between probes; `None` falls back to the configured default.
	pub interval_sec: Option<i32>,
	/// Total probe deadline in milliseconds; `None` falls back to the configured default.
	pub timeout_ms: Option<i32>,
	/// Status codes counted as passing; an empty set means `{200}`.
	pub expected_statuses: Vec<i32>,
	/// Row creation timestamp.
	pub created_at: DateTime<Utc>,
	/// Whether the prober considers this monitor at all.
	pub is_enabled: bool,
}
impl Monitor {
	/// Method to probe with; unknown stored spellings fall back to `GET`.
	pub fn probe_method(&self) -> ProbeMethod {
		ProbeMethod::parse(&self.method).unwrap_or_default()
	}

	/// Effective probe interval in seconds.
	pub fn effective_interval(&self, default_sec: u32) -> u64 {
		match self.interval_sec {
			Some(value) if value > 0 => value as u64,
			_ => u64::from(default_sec),
		}
	}

	/// Effective total probe deadline.
	pub fn effective_timeout(&self, default_ms: u32) -> Duration {
		let millis = match self.timeout_ms {
			Some(value) if value > 0 => value as u64,
			_ => u64::from(default_ms),
		};

		Duration::from_millis(millis)
	}

	/// Whether the status code counts as a pass for this monitor.
	pub fn expects(&self, status_code: u16) -> bool {
		let code = i32::from(status_code);

		if self.expected_statuses.is_empty() {
			code == 200
		} else {
			self.expected_statuses.contains(&code)
		}
	}
}

/// The persisted record of one started probe; append-only, written only by the prober.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Observation {
	/// Monotone identifier assigned by the store.
	pub id: i64,
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

/// Lifecycle state of an incident row.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IncidentState {
	/// The failure episode is ongoing.
	Open,
	/// The monitor recovered and the episode is closed.
	Resolved,
}
impl IncidentState {
	/// Lowercase spelling, as stored in the `incidents` table.
	pub fn as_str(&self) -> &'static str {
		match self {
			Self::Open => "open",
			Self::Resolved => "resolved",
		}
	}

	/// Parse the stored spelling.
	pub fn parse(value: &str) -> Option<Self> {
		match value {
			"open" => Some(Self::Open),
			"resolved" => Some(Self::Resolved),
			_ => None,
		}
	}
}
impl Display for IncidentState {
	fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// One sustained-failure episode for a monitor.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Incident {
	/// Stable identifier.
	pub id: i64,
	/// Monitor this episode belongs to.
	pub monitor_id: i64,
	/// When the episode was opened.
	pub opened_at: DateTime<Utc>,
	/// When the episode was resolved; `None` while open.
	pub closed_at: Option<DateTime<Utc>>,
	/// Diagnostic captured at open time, never overwritten.
	pub reason: String,
	/// Current lifecycle state.
	pub state: IncidentState,
}
