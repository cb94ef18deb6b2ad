//! Postgres implementation of the probe store.

// std
use std::future::Future;
// crates.io
use async_trait::async_trait;
use rand::Rng;
use sqlx::{PgPool, Row, postgres::PgPoolOptions};
use tokio::time;
// self
use crate::{
	_prelude::*,
	model::{Incident, IncidentState, Monitor},
	store::{NewObservation, OpenedIncident, ProbeStore, SummaryWindow, UptimeSummary},
};

// Idempotent DDL for the shared schema. The notifications table is owned by the dispatcher but
// created here so a fresh database serves every service.
const SCHEMA_DDL: &[&str] = &[
	"CREATE TABLE IF NOT EXISTS monitors (
		id BIGSERIAL PRIMARY KEY,
		name TEXT NOT NULL,
		url TEXT NOT NULL,
		method TEXT NOT NULL DEFAULT 'GET',
		interval_sec INTEGER,
		timeout_ms INTEGER,
		expected_statuses INTEGER[] NOT NULL DEFAULT '{200}',
		created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
		is_enabled BOOLEAN NOT NULL DEFAULT TRUE
	)",
	"CREATE TABLE IF NOT EXISTS checks (
		id BIGSERIAL PRIMARY KEY,
		monitor_id BIGINT NOT NULL REFERENCES monitors(id) ON DELETE CASCADE,
		ts TIMESTAMPTZ NOT NULL DEFAULT now(),
		status_code INTEGER,
		latency_ms BIGINT,
		ok BOOLEAN NOT NULL,
		error_reason TEXT
	)",
	"CREATE INDEX IF NOT EXISTS checks_monitor_ts_idx ON checks (monitor_id, ts)",
	"CREATE INDEX IF NOT EXISTS checks_ok_idx ON checks (ok)",
	"CREATE TABLE IF NOT EXISTS incidents (
		id BIGSERIAL PRIMARY KEY,
		monitor_id BIGINT NOT NULL REFERENCES monitors(id) ON DELETE CASCADE,
		opened_at TIMESTAMPTZ NOT NULL DEFAULT now(),
		closed_at TIMESTAMPTZ,
		reason TEXT NOT NULL,
		state TEXT NOT NULL DEFAULT 'open'
	)",
	"CREATE INDEX IF NOT EXISTS incidents_monitor_state_idx ON incidents (monitor_id, state)",
	"CREATE TABLE IF NOT EXISTS notifications (
		id BIGSERIAL PRIMARY KEY,
		incident_id BIGINT REFERENCES incidents(id),
		channel TEXT,
		sent_at TIMESTAMPTZ NOT NULL DEFAULT now(),
		status TEXT,
		detail TEXT
	)",
];

/// Bounded connect-retry policy for the bootstrap phase.
#[derive(Clone, Debug)]
pub struct BootstrapPolicy {
	/// Connection attempts before giving up.
	pub max_attempts: u32,
	/// Delay before the second attempt.
	pub initial_backoff: Duration,
	/// Upper bound applied to exponential backoff growth.
	pub max_backoff: Duration,
	/// Pool size once connected.
	pub max_connections: u32,
}
impl BootstrapPolicy {
	/// Compute the jittered backoff before the given retry attempt.
	pub fn backoff(&self, attempt: u32) -> Duration {
		let exponent = attempt.min(16);
		let base = self.initial_backoff.mul_f64(2_f64.powi(exponent as i32));
		let bounded = base.min(self.max_backoff).max(self.initial_backoff);
		let lower = bounded.mul_f64(0.8).max(self.initial_backoff);

		random_within(lower, bounded)
	}
}
impl Default for BootstrapPolicy {
	fn default() -> Self {
		Self {
			max_attempts: 30,
			initial_backoff: Duration::from_millis(500),
			max_backoff: Duration::from_secs(10),
			max_connections: 8,
		}
	}
}

/// Postgres-backed store handle; cheap to clone, owned by the scheduler.
#[derive(Clone, Debug)]
pub struct PgStore {
	pool: PgPool,
}
impl PgStore {
	/// Connect with bounded retries and ensure the schema exists.
	pub async fn connect(database_url: &str, policy: BootstrapPolicy) -> Result<Self> {
		let mut attempt = 0;

		loop {
			match PgPoolOptions::new()
				.max_connections(policy.max_connections)
				.connect(database_url)
				.await
			{
				Ok(pool) => {
					let store = Self { pool };

					store.ensure_schema().await?;

					tracing::info!(attempts = attempt + 1, "database ready");

					return Ok(store);
				},
				Err(err) => {
					attempt += 1;

					if attempt >= policy.max_attempts {
						return Err(Error::Bootstrap { attempts: attempt, last: err.to_string() });
					}

					let delay = policy.backoff(attempt);

					tracing::warn!(
						error = %err,
						attempt,
						delay = ?delay,
						"database not ready; retrying"
					);

					time::sleep(delay).await;
				},
			}
		}
	}

	/// Wrap an existing pool; the caller is responsible for schema bootstrap.
	pub fn with_pool(pool: PgPool) -> Self {
		Self { pool }
	}

	/// Apply the idempotent DDL.
	pub async fn ensure_schema(&self) -> Result<()> {
		for statement in SCHEMA_DDL {
			sqlx::query(statement).execute(&self.pool).await?;
		}

		Ok(())
	}

	// Undefined-table failures mean the schema was dropped out from under us; recreate it and
	// retry the operation once.
	async fn with_schema_retry<T, F, Fut>(&self, op: F) -> Result<T>
	where
		F: Fn() -> Fut,
		Fut: Future<Output = Result<T>>,
	{
		match op().await {
			Err(Error::Sqlx(err)) if is_undefined_table(&err) => {
				tracing::warn!("schema missing; recreating");

				self.ensure_schema().await?;

				op().await
			},
			result => result,
		}
	}
}
#[async_trait]
impl ProbeStore for PgStore {
	async fn enabled_monitors(&self) -> Result<Vec<Monitor>> {
		self.with_schema_retry(|| async move {
			sqlx::query_as::<_, Monitor>(
				"SELECT id, name, url, method, interval_sec, timeout_ms, expected_statuses, \
				 created_at, is_enabled FROM monitors WHERE is_enabled ORDER BY id",
			)
			.fetch_all(&self.pool)
			.await
			.map_err(Error::from)
		})
		.await
	}

	async fn append_observation(&self, observation: &NewObservation) -> Result<i64> {
		self.with_schema_retry(|| async move {
			sqlx::query_scalar::<_, i64>(
				"INSERT INTO checks (monitor_id, ts, status_code, latency_ms, ok, error_reason) \
				 VALUES ($1, $2, $3, $4, $5, $6) RETURNING id",
			)
			.bind(observation.monitor_id)
			.bind(observation.ts)
			.bind(observation.status_code)
			.bind(observation.latency_ms)
			.bind(observation.ok)
			.bind(&observation.error_reason)
			.fetch_one(&self.pool)
			.await
			.map_err(Error::from)
		})
		.await
	}

	async fn open_incident(
		&self,
		monitor_id: i64,
		reason: &str,
		opened_at: DateTime<Utc>,
	) -> Result<OpenedIncident> {
		self.with_schema_retry(|| async move {
			let mut tx = self.pool.begin().await?;
			let existing: Option<i64> = sqlx::query_scalar(
				"SELECT id FROM incidents WHERE monitor_id = $1 AND state = 'open' LIMIT 1",
			)
			.bind(monitor_id)
			.fetch_optional(&mut *tx)
			.await?;

			if let Some(id) = existing {
				tx.commit().await?;

				return Ok(OpenedIncident { id, created: false });
			}

			let id: i64 = sqlx::query_scalar(
				"INSERT INTO incidents (monitor_id, opened_at, reason, state) \
				 VALUES ($1, $2, $3, 'open') RETURNING id",
			)
			.bind(monitor_id)
			.bind(opened_at)
			.bind(reason)
			.fetch_one(&mut *tx)
			.await?;

			tx.commit().await?;

			Ok(OpenedIncident { id, created: true })
		})
		.await
	}

	async fn resolve_incident(&self, incident_id: i64, closed_at: DateTime<Utc>) -> Result<bool> {
		self.with_schema_retry(|| async move {
			let result = sqlx::query(
				"UPDATE incidents SET state = 'resolved', closed_at = $2 \
				 WHERE id = $1 AND state = 'open'",
			)
			.bind(incident_id)
			.bind(closed_at)
			.execute(&self.pool)
			.await?;

			Ok(result.rows_affected() == 1)
		})
		.await
	}

	async fn open_incidents(&self) -> Result<Vec<Incident>> {
		self.with_schema_retry(|| async move {
			let rows = sqlx::query(
				"SELECT id, monitor_id, opened_at, closed_at, reason, state FROM incidents \
				 WHERE state = 'open' ORDER BY id",
			)
			.fetch_all(&self.pool)
			.await?;

			rows.iter().map(incident_from_row).collect()
		})
		.await
	}

	async fn uptime_summary(
		&self,
		monitor_id: i64,
		window: SummaryWindow,
	) -> Result<UptimeSummary> {
		self.with_schema_retry(|| async move {
			let since = Utc::now() - window.lookback();
			let row = sqlx::query(
				"SELECT COUNT(*) AS samples, COUNT(*) FILTER (WHERE ok) AS passed, \
				 AVG(latency_ms::DOUBLE PRECISION) AS avg_latency \
				 FROM checks WHERE monitor_id = $1 AND ts >= $2",
			)
			.bind(monitor_id)
			.bind(since)
			.fetch_one(&self.pool)
			.await?;
			let samples: i64 = row.try_get("samples")?;
			let passed: i64 = row.try_get("passed")?;
			let avg_latency: Option<f64> = row.try_get("avg_latency")?;

			Ok(UptimeSummary::from_counts(samples.max(0) as u64, passed.max(0) as u64, avg_latency))
		})
		.await
	}
}

fn incident_from_row(row: &sqlx::postgres::PgRow) -> Result<Incident> {
	let state_raw: String = row.try_get("state")?;
	let state = IncidentState::parse(&state_raw).ok_or(Error::Validation {
		field: "incidents.state",
		reason: format!("Unknown state '{state_raw}'."),
	})?;

	Ok(Incident {
		id: row.try_get("id")?,
		monitor_id: row.try_get("monitor_id")?,
		opened_at: row.try_get("opened_at")?,
		closed_at: row.try_get("closed_at")?,
		reason: row.try_get("reason")?,
		state,
	})
}

fn is_undefined_table(err: &sqlx::Error) -> bool {
	matches!(err, sqlx::Error::Database(db) if db.code().as_deref() == Some("42P01"))
}

fn random_within(min: Duration, max: Duration) -> Duration {
	if max <= min {
		return max;
	}

	let mut rng = rand::rng();
	let span = (max - min).as_secs_f64();

	min + Duration::from_secs_f64(rng.random_range(0.0..=span))
}
