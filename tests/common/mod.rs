//! Shared fakes and builders for the integration tests.

#![allow(dead_code)]

// std
use std::{
	collections::HashSet,
	sync::{
		Mutex,
		atomic::{AtomicBool, AtomicI64, Ordering},
	},
	time::Duration,
};
// crates.io
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uptime_prober::{
	Error, ProberOptions, Result,
	alert::{AlertEvent, AlertSink},
	model::{Incident, IncidentState, Monitor},
	store::{NewObservation, OpenedIncident, ProbeStore, SummaryWindow, UptimeSummary},
};

/// In-memory stand-in for the Postgres store.
#[derive(Debug, Default)]
pub struct MemoryStore {
	pub monitors: Mutex<Vec<Monitor>>,
	pub observations: Mutex<Vec<NewObservation>>,
	pub incidents: Mutex<Vec<Incident>>,
	pub deny_appends_for: Mutex<HashSet<i64>>,
	pub fail_monitor_load: AtomicBool,
	next_observation_id: AtomicI64,
	next_incident_id: AtomicI64,
}
impl MemoryStore {
	pub fn new() -> Self {
		Self {
			next_observation_id: AtomicI64::new(1),
			next_incident_id: AtomicI64::new(1),
			..Self::default()
		}
	}

	pub fn insert_monitor(&self, monitor: Monitor) {
		self.monitors.lock().unwrap().push(monitor);
	}

	/// Seed an open incident row, as if a previous process wrote it before dying.
	pub fn seed_open_incident(&self, monitor_id: i64, reason: &str) -> i64 {
		let id = self.next_incident_id.fetch_add(1, Ordering::SeqCst);

		self.incidents.lock().unwrap().push(Incident {
			id,
			monitor_id,
			opened_at: Utc::now(),
			closed_at: None,
			reason: reason.to_string(),
			state: IncidentState::Open,
		});

		id
	}

	pub fn deny_appends(&self, monitor_id: i64) {
		self.deny_appends_for.lock().unwrap().insert(monitor_id);
	}

	pub fn allow_appends(&self, monitor_id: i64) {
		self.deny_appends_for.lock().unwrap().remove(&monitor_id);
	}

	pub fn observation_count(&self, monitor_id: i64) -> usize {
		self.observations.lock().unwrap().iter().filter(|o| o.monitor_id == monitor_id).count()
	}

	pub fn open_incident_count(&self, monitor_id: i64) -> usize {
		self.incidents
			.lock()
			.unwrap()
			.iter()
			.filter(|i| i.monitor_id == monitor_id && i.state == IncidentState::Open)
			.count()
	}

	fn unavailable(what: &'static str) -> Error {
		Error::Validation { field: what, reason: "memory store set to fail".into() }
	}
}
#[async_trait]
impl ProbeStore for MemoryStore {
	async fn enabled_monitors(&self) -> Result<Vec<Monitor>> {
		if self.fail_monitor_load.load(Ordering::SeqCst) {
			return Err(Self::unavailable("enabled_monitors"));
		}

		Ok(self.monitors.lock().unwrap().iter().filter(|m| m.is_enabled).cloned().collect())
	}

	async fn append_observation(&self, observation: &NewObservation) -> Result<i64> {
		if self.deny_appends_for.lock().unwrap().contains(&observation.monitor_id) {
			return Err(Self::unavailable("append_observation"));
		}

		self.observations.lock().unwrap().push(observation.clone());

		Ok(self.next_observation_id.fetch_add(1, Ordering::SeqCst))
	}

	async fn open_incident(
		&self,
		monitor_id: i64,
		reason: &str,
		opened_at: DateTime<Utc>,
	) -> Result<OpenedIncident> {
		let mut incidents = self.incidents.lock().unwrap();

		if let Some(existing) =
			incidents.iter().find(|i| i.monitor_id == monitor_id && i.state == IncidentState::Open)
		{
			return Ok(OpenedIncident { id: existing.id, created: false });
		}

		let id = self.next_incident_id.fetch_add(1, Ordering::SeqCst);

		incidents.push(Incident {
			id,
			monitor_id,
			opened_at,
			closed_at: None,
			reason: reason.to_string(),
			state: IncidentState::Open,
		});

		Ok(OpenedIncident { id, created: true })
	}

	async fn resolve_incident(&self, incident_id: i64, closed_at: DateTime<Utc>) -> Result<bool> {
		let mut incidents = self.incidents.lock().unwrap();

		match incidents.iter_mut().find(|i| i.id == incident_id && i.state == IncidentState::Open)
		{
			Some(incident) => {
				incident.state = IncidentState::Resolved;
				incident.closed_at = Some(closed_at);

				Ok(true)
			},
			None => Ok(false),
		}
	}

	async fn open_incidents(&self) -> Result<Vec<Incident>> {
		Ok(self
			.incidents
			.lock()
			.unwrap()
			.iter()
			.filter(|i| i.state == IncidentState::Open)
			.cloned()
			.collect())
	}

	async fn uptime_summary(
		&self,
		monitor_id: i64,
		window: SummaryWindow,
	) -> Result<UptimeSummary> {
		let since = Utc::now() - window.lookback();
		let observations = self.observations.lock().unwrap();
		let in_window: Vec<_> =
			observations.iter().filter(|o| o.monitor_id == monitor_id && o.ts >= since).collect();
		let samples = in_window.len() as u64;
		let passed = in_window.iter().filter(|o| o.ok).count() as u64;
		let latencies: Vec<i64> = in_window.iter().filter_map(|o| o.latency_ms).collect();
		let avg = if latencies.is_empty() {
			None
		} else {
			Some(latencies.iter().sum::<i64>() as f64 / latencies.len() as f64)
		};

		Ok(UptimeSummary::from_counts(samples, passed, avg))
	}
}

/// Collecting alert sink with a switchable failure mode.
#[derive(Debug, Default)]
pub struct VecSink {
	pub events: Mutex<Vec<AlertEvent>>,
	pub fail: AtomicBool,
}
impl VecSink {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn events(&self) -> Vec<AlertEvent> {
		self.events.lock().unwrap().clone()
	}
}
#[async_trait]
impl AlertSink for VecSink {
	async fn emit(&self, event: &AlertEvent) -> Result<()> {
		if self.fail.load(Ordering::SeqCst) {
			return Err(Error::Validation { field: "sink", reason: "sink set to fail".into() });
		}

		self.events.lock().unwrap().push(event.clone());

		Ok(())
	}
}

/// Monitor builder with sensible test defaults: GET, 60 s cadence, expecting 200.
pub fn monitor(id: i64, url: impl Into<String>) -> Monitor {
	Monitor {
		id,
		name: format!("monitor-{id}"),
		url: url.into(),
		method: "GET".into(),
		interval_sec: Some(60),
		timeout_ms: Some(5_000),
		expected_statuses: vec![200],
		created_at: Utc::now(),
		is_enabled: true,
	}
}

/// Prober options tuned for tests: default 3/2 thresholds, small pulse, small pool.
pub fn options() -> ProberOptions {
	ProberOptions {
		pulse: Duration::from_millis(10),
		probe_concurrency: 4,
		..ProberOptions::default()
	}
}
