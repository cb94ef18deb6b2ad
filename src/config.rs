//! Environment-driven settings for the prober process.
//!
//! The prober has no CLI surface; everything is read from the environment once at startup and
//! validated before any connection is attempted.

// std
use std::{env, fmt::Display, str::FromStr};
// self
use crate::{_prelude::*, incident::Thresholds};

/// Default probe interval applied when a monitor row carries none.
pub const DEFAULT_INTERVAL_SEC: u32 = 60;
/// Default total probe deadline applied when a monitor row carries none.
pub const DEFAULT_CHECK_TIMEOUT_MS: u32 = 5_000;
/// Default scheduler pulse.
pub const DEFAULT_PULSE_MS: u64 = 1_000;
/// Default cap on concurrently in-flight probes.
pub const DEFAULT_PROBE_CONCURRENCY: usize = 16;
/// Smallest accepted probe interval.
pub const MIN_INTERVAL_SEC: u32 = 15;
/// Largest accepted probe interval.
pub const MAX_INTERVAL_SEC: u32 = 3_600;
/// Smallest accepted probe deadline.
pub const MIN_TIMEOUT_MS: u32 = 500;
/// Largest accepted probe deadline.
pub const MAX_TIMEOUT_MS: u32 = 30_000;

/// Runtime configuration resolved from the environment.
#[derive(Clone, Debug)]
pub struct Settings {
	/// Postgres DSN for the shared persistent store.
	pub database_url: String,
	/// Redis endpoint carrying the alert queue.
	pub redis_url: String,
	/// Incident open/resolve thresholds.
	pub thresholds: Thresholds,
	/// Interval fallback for monitors without one.
	pub default_interval_sec: u32,
	/// Probe deadline fallback for monitors without one.
	pub default_timeout_ms: u32,
	/// Scheduler wake-up interval.
	pub pulse: Duration,
	/// Cap on concurrently in-flight probes.
	pub probe_concurrency: usize,
	/// Name of the Redis list alert events are appended to.
	pub alert_queue: String,
}
impl Settings {
	/// Resolve and validate settings from the process environment.
	pub fn from_env() -> Result<Self> {
		let database_url = env_value("DATABASE_URL")
			.ok_or(Error::Validation { field: "DATABASE_URL", reason: "Must be set.".into() })?;
		let redis_url = env_value("REDIS_URL")
			.ok_or(Error::Validation { field: "REDIS_URL", reason: "Must be set.".into() })?;
		let settings = Self {
			database_url,
			redis_url,
			thresholds: Thresholds {
				fail: parse_value(
					"FAIL_THRESHOLD",
					env_value("FAIL_THRESHOLD"),
					Thresholds::default().fail,
				)?,
				recover: parse_value(
					"RECOVER_THRESHOLD",
					env_value("RECOVER_THRESHOLD"),
					Thresholds::default().recover,
				)?,
			},
			default_interval_sec: parse_value(
				"DEFAULT_INTERVAL_SEC",
				env_value("DEFAULT_INTERVAL_SEC"),
				DEFAULT_INTERVAL_SEC,
			)?,
			default_timeout_ms: parse_value(
				"CHECK_TIMEOUT_MS",
				env_value("CHECK_TIMEOUT_MS"),
				DEFAULT_CHECK_TIMEOUT_MS,
			)?,
			pulse: Duration::from_millis(parse_value(
				"PULSE_MS",
				env_value("PULSE_MS"),
				DEFAULT_PULSE_MS,
			)?),
			probe_concurrency: parse_value(
				"PROBE_CONCURRENCY",
				env_value("PROBE_CONCURRENCY"),
				DEFAULT_PROBE_CONCURRENCY,
			)?,
			alert_queue: env_value("ALERT_QUEUE")
				.unwrap_or_else(|| crate::alert::DEFAULT_ALERT_QUEUE.to_string()),
		};

		settings.validate()?;

		Ok(settings)
	}

	/// Validate invariants for the resolved configuration.
	pub fn validate(&self) -> Result<()> {
		self.thresholds.validate()?;

		if !(MIN_INTERVAL_SEC..=MAX_INTERVAL_SEC).contains(&self.default_interval_sec) {
			return Err(Error::Validation {
				field: "DEFAULT_INTERVAL_SEC",
				reason: format!("Must be within [{MIN_INTERVAL_SEC}, {MAX_INTERVAL_SEC}]."),
			});
		}
		if !(MIN_TIMEOUT_MS..=MAX_TIMEOUT_MS).contains(&self.default_timeout_ms) {
			return Err(Error::Validation {
				field: "CHECK_TIMEOUT_MS",
				reason: format!("Must be within [{MIN_TIMEOUT_MS}, {MAX_TIMEOUT_MS}]."),
			});
		}
		if self.pulse < Duration::from_millis(100) {
			return Err(Error::Validation {
				field: "PULSE_MS",
				reason: "Must be at least 100 ms.".into(),
			});
		}
		if self.probe_concurrency == 0 {
			return Err(Error::Validation {
				field: "PROBE_CONCURRENCY",
				reason: "Must be greater than zero.".into(),
			});
		}
		if self.alert_queue.is_empty() {
			return Err(Error::Validation {
				field: "ALERT_QUEUE",
				reason: "Must not be empty.".into(),
			});
		}

		Ok(())
	}

	/// Project the knobs the prober core needs.
	pub fn prober_options(&self) -> crate::prober::ProberOptions {
		crate::prober::ProberOptions {
			thresholds: self.thresholds,
			default_interval_sec: self.default_interval_sec,
			default_timeout_ms: self.default_timeout_ms,
			pulse: self.pulse,
			probe_concurrency: self.probe_concurrency,
		}
	}
}

fn env_value(name: &str) -> Option<String> {
	env::var(name).ok().map(|value| value.trim().to_string()).filter(|value| !value.is_empty())
}

fn parse_value<T>(name: &'static str, raw: Option<String>, default: T) -> Result<T>
where
	T: FromStr,
	T::Err: Display,
{
	match raw {
		None => Ok(default),
		Some(value) => value.parse().map_err(|err| Error::Validation {
			field: name,
			reason: format!("Failed to parse '{value}': {err}."),
		}),
	}
}
