//! The probe scheduler: pulse loop, due selection, concurrent fan-out, and incident driving.

// std
use std::future::Future;
// crates.io
use tokio::{
	sync::{Mutex, Semaphore},
	task::JoinSet,
	time::{self, MissedTickBehavior},
};
// self
use crate::{
	_prelude::*,
	alert::{AlertEvent, AlertSink},
	incident::{Thresholds, Transition},
	model::Monitor,
	probe,
	store::{NewObservation, ProbeStore},
	streak::StreakLedger,
};

/// Knobs the prober core needs, projected from [`crate::config::Settings`].
#[derive(Clone, Copy, Debug)]
pub struct ProberOptions {
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
}
impl Default for ProberOptions {
	fn default() -> Self {
		Self {
			thresholds: Thresholds::default(),
			default_interval_sec: crate::config::DEFAULT_INTERVAL_SEC,
			default_timeout_ms: crate::config::DEFAULT_CHECK_TIMEOUT_MS,
			pulse: Duration::from_millis(crate::config::DEFAULT_PULSE_MS),
			probe_concurrency: crate::config::DEFAULT_PROBE_CONCURRENCY,
		}
	}
}

/// Single-writer probe scheduler.
///
/// Exactly one instance may run against a store; a second writer would break the
/// one-open-incident invariant. Within a pulse, probes of distinct monitors fan out
/// concurrently up to the configured cap, while probes of one monitor are serialised by the
/// admission stamp written before any I/O starts.
#[derive(Debug)]
pub struct Prober<S, A> {
	store: Arc<S>,
	sink: Arc<A>,
	client: reqwest::Client,
	ledger: Arc<Mutex<StreakLedger>>,
	concurrency: Arc<Semaphore>,
	options: ProberOptions,
}
impl<S, A> Clone for Prober<S, A> {
	fn clone(&self) -> Self {
		Self {
			store: self.store.clone(),
			sink: self.sink.clone(),
			client: self.client.clone(),
			ledger: self.ledger.clone(),
			concurrency: self.concurrency.clone(),
			options: self.options,
		}
	}
}
impl<S, A> Prober<S, A>
where
	S: ProbeStore + 'static,
	A: AlertSink + 'static,
{
	/// Build a prober over the given store and alert sink.
	pub fn new(store: Arc<S>, sink: Arc<A>, options: ProberOptions) -> Result<Self> {
		options.thresholds.validate()?;

		Ok(Self {
			store,
			sink,
			client: probe::build_client()?,
			ledger: Arc::new(Mutex::new(StreakLedger::new())),
			concurrency: Arc::new(Semaphore::new(options.probe_concurrency)),
			options,
		})
	}

	/// Reload open incidents from the store into the ledger.
	///
	/// Streak counters start at zero and every monitor is immediately due; only incident
	/// identity survives a restart, which is enough for a recovery streak to resolve it.
	pub async fn restore_open_incidents(&self) -> Result<usize> {
		let incidents = self.store.open_incidents().await?;
		let count = incidents.len();
		let mut ledger = self.ledger.lock().await;

		for incident in incidents {
			ledger.set_open_incident(incident.monitor_id, incident.id);
		}

		Ok(count)
	}

	/// Drive pulses until `shutdown` completes, then drain.
	///
	/// A pulse's fan-out is awaited before the next pulse is admitted, so breaking out of the
	/// loop leaves no in-flight probe behind and every started probe gets its observation write.
	pub async fn run<F>(&self, shutdown: F)
	where
		F: Future<Output = ()>,
	{
		let mut pulse = time::interval(self.options.pulse);

		pulse.set_missed_tick_behavior(MissedTickBehavior::Delay);

		tokio::pin!(shutdown);

		loop {
			tokio::select! {
				_ = &mut shutdown => {
					tracing::info!("shutdown signal received");

					break;
				},
				_ = pulse.tick() => {
					match self.tick(Utc::now().timestamp()).await {
						Ok(probed) =>
							if probed > 0 {
								tracing::debug!(probed, "tick complete");
							},
						Err(err) =>
							tracing::warn!(error = %err, "tick aborted; retrying on next pulse"),
					}
				},
			}
		}
	}

	/// Run one tick at the given unix-seconds clock.
	///
	/// Errors only when the monitor set cannot be loaded; per-monitor failures are contained
	/// inside the fan-out. Returns the number of probes admitted.
	pub async fn tick(&self, now: i64) -> Result<usize> {
		let monitors = self.store.enabled_monitors().await?;
		let due = {
			let mut ledger = self.ledger.lock().await;
			let mut due = Vec::new();

			for monitor in monitors {
				let interval = monitor.effective_interval(self.options.default_interval_sec);

				if ledger.due(monitor.id, now, interval) {
					ledger.mark_started(monitor.id, now);
					due.push(monitor);
				}
			}

			due
		};
		let admitted = due.len();
		let mut tasks = JoinSet::new();

		for monitor in due {
			let Ok(permit) = self.concurrency.clone().acquire_owned().await else {
				break;
			};
			let prober = self.clone();

			tasks.spawn(async move {
				let _permit = permit;

				prober.process(monitor).await;
			});
		}

		while let Some(joined) = tasks.join_next().await {
			if let Err(err) = joined {
				tracing::warn!(error = %err, "probe task aborted");
			}
		}

		Ok(admitted)
	}

	// Probe one admitted monitor, persist the observation, and apply the streak and incident
	// consequences. Never propagates: a failure here must not take down the loop.
	async fn process(&self, monitor: Monitor) {
		let timeout = monitor.effective_timeout(self.options.default_timeout_ms);
		let started_at = Utc::now();
		let outcome = probe::run_probe(&self.client, &monitor, timeout).await;
		let observation = NewObservation {
			monitor_id: monitor.id,
			ts: started_at,
			status_code: outcome.status_code,
			latency_ms: outcome.latency_ms,
			ok: outcome.ok,
			error_reason: outcome.error_reason.clone(),
		};

		if let Err(err) = self.store.append_observation(&observation).await {
			// Streaks stay untouched so the next cadence re-probes as if this one never ran.
			tracing::warn!(monitor = monitor.id, error = %err, "observation write failed");

			return;
		}

		let transition = {
			let mut ledger = self.ledger.lock().await;

			if outcome.ok {
				let passes = ledger.record_pass(monitor.id);

				self.options.thresholds.after_pass(passes, ledger.open_incident(monitor.id))
			} else {
				let fails = ledger.record_fail(monitor.id);

				self.options.thresholds.after_fail(
					fails,
					ledger.open_incident(monitor.id),
					outcome.failure_reason(),
				)
			}
		};

		match transition {
			Transition::None => {},
			Transition::Open { reason } => self.apply_open(&monitor, &reason).await,
			Transition::Resolve { incident_id } => self.apply_resolve(&monitor, incident_id).await,
		}
	}

	async fn apply_open(&self, monitor: &Monitor, reason: &str) {
		match self.store.open_incident(monitor.id, reason, Utc::now()).await {
			Ok(opened) => {
				self.ledger.lock().await.set_open_incident(monitor.id, opened.id);

				if opened.created {
					tracing::info!(monitor = monitor.id, incident = opened.id, reason, "incident opened");

					self.emit(AlertEvent::Incident {
						monitor_id: monitor.id,
						incident_id: opened.id,
						reason: reason.to_string(),
					})
					.await;
				} else {
					// The store already held an open episode the ledger lost track of; adopt it
					// without emitting a second open event.
					tracing::warn!(
						monitor = monitor.id,
						incident = opened.id,
						"open incident already present; adopted"
					);
				}
			},
			Err(err) => {
				tracing::warn!(monitor = monitor.id, error = %err, "incident open failed");

				// Step the streak back so the next failing observation retries the open.
				self.ledger.lock().await.rewind_fail(monitor.id);
			},
		}
	}

	async fn apply_resolve(&self, monitor: &Monitor, incident_id: i64) {
		match self.store.resolve_incident(incident_id, Utc::now()).await {
			Ok(resolved) => {
				self.ledger.lock().await.clear_open_incident(monitor.id);

				if resolved {
					tracing::info!(monitor = monitor.id, incident = incident_id, "incident resolved");

					self.emit(AlertEvent::Recovered {
						monitor_id: monitor.id,
						incident_id,
					})
					.await;
				} else {
					tracing::warn!(
						monitor = monitor.id,
						incident = incident_id,
						"incident was not open in the store; cleared from ledger"
					);
				}
			},
			Err(err) => {
				tracing::warn!(monitor = monitor.id, error = %err, "incident resolve failed");

				self.ledger.lock().await.rewind_pass(monitor.id);
			},
		}
	}

	// Emit failures are logged and dropped: the incident row is already durable and the queue
	// is best-effort at-most-once.
	async fn emit(&self, event: AlertEvent) {
		if let Err(err) = self.sink.emit(&event).await {
			tracing::warn!(error = %err, "alert emit failed; state already persisted");
		}
	}
}
