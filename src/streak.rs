//! Per-monitor cadence and streak bookkeeping.
//!
//! The ledger is authoritative for pacing and streak counts during a process lifetime only;
//! open-incident ids are reconstructed from the store at startup, and counters restart at zero,
//! which costs at most one redundant probe per monitor.

// std
use std::collections::HashMap;

/// Ephemeral per-monitor state.
///
/// The pass and fail counters are mutually exclusive: recording one direction clears the other.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct StreakState {
	/// Consecutive failing observations.
	pub consecutive_fails: u32,
	/// Consecutive passing observations.
	pub consecutive_passes: u32,
	/// Unix seconds of the last admitted probe; `None` means immediately due.
	pub last_run_ts: Option<i64>,
	/// Id of the currently open incident, if any.
	pub open_incident_id: Option<i64>,
}

/// In-process table of [`StreakState`] keyed by monitor id.
#[derive(Debug, Default)]
pub struct StreakLedger {
	states: HashMap<i64, StreakState>,
}
impl StreakLedger {
	/// Create an empty ledger.
	pub fn new() -> Self {
		Self::default()
	}

	/// Whether the monitor's cadence has elapsed at `now`.
	pub fn due(&self, monitor_id: i64, now: i64, interval_sec: u64) -> bool {
		match self.states.get(&monitor_id).and_then(|state| state.last_run_ts) {
			None => true,
			Some(last) => now.saturating_sub(last) >= interval_sec as i64,
		}
	}

	/// Stamp the admission gate; called before the probe's I/O is issued.
	pub fn mark_started(&mut self, monitor_id: i64, now: i64) {
		self.states.entry(monitor_id).or_default().last_run_ts = Some(now);
	}

	/// Record a passing observation; clears the fail streak and returns the new pass count.
	pub fn record_pass(&mut self, monitor_id: i64) -> u32 {
		let state = self.states.entry(monitor_id).or_default();

		state.consecutive_fails = 0;
		state.consecutive_passes = state.consecutive_passes.saturating_add(1);

		state.consecutive_passes
	}

	/// Record a failing observation; clears the pass streak and returns the new fail count.
	pub fn record_fail(&mut self, monitor_id: i64) -> u32 {
		let state = self.states.entry(monitor_id).or_default();

		state.consecutive_passes = 0;
		state.consecutive_fails = state.consecutive_fails.saturating_add(1);

		state.consecutive_fails
	}

	/// Id of the monitor's open incident, if one is tracked.
	pub fn open_incident(&self, monitor_id: i64) -> Option<i64> {
		self.states.get(&monitor_id).and_then(|state| state.open_incident_id)
	}

	/// Track an open incident for the monitor.
	pub fn set_open_incident(&mut self, monitor_id: i64, incident_id: i64) {
		self.states.entry(monitor_id).or_default().open_incident_id = Some(incident_id);
	}

	/// Stop tracking an open incident for the monitor.
	pub fn clear_open_incident(&mut self, monitor_id: i64) {
		if let Some(state) = self.states.get_mut(&monitor_id) {
			state.open_incident_id = None;
		}
	}

	/// Copy of the monitor's state; default when never seen.
	pub fn state(&self, monitor_id: i64) -> StreakState {
		self.states.get(&monitor_id).copied().unwrap_or_default()
	}

	// Undo the latest fail increment so a failed incident write is retried by the
	// next failing observation under equality thresholds.
	pub(crate) fn rewind_fail(&mut self, monitor_id: i64) {
		if let Some(state) = self.states.get_mut(&monitor_id) {
			state.consecutive_fails = state.consecutive_fails.saturating_sub(1);
		}
	}

	// Counterpart of `rewind_fail` for failed resolve writes.
	pub(crate) fn rewind_pass(&mut self, monitor_id: i64) {
		if let Some(state) = self.states.get_mut(&monitor_id) {
			state.consecutive_passes = state.consecutive_passes.saturating_sub(1);
		}
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn unseen_monitor_is_immediately_due() {
		let ledger = StreakLedger::new();

		assert!(ledger.due(7, 0, 60));
	}

	#[test]
	fn cadence_gates_on_the_admission_stamp() {
		let mut ledger = StreakLedger::new();

		ledger.mark_started(7, 100);

		assert!(!ledger.due(7, 100, 60));
		assert!(!ledger.due(7, 159, 60));
		assert!(ledger.due(7, 160, 60));
	}

	#[test]
	fn streak_directions_are_mutually_exclusive() {
		let mut ledger = StreakLedger::new();

		assert_eq!(ledger.record_fail(1), 1);
		assert_eq!(ledger.record_fail(1), 2);
		assert_eq!(ledger.record_pass(1), 1);

		let state = ledger.state(1);

		assert_eq!(state.consecutive_fails, 0);
		assert_eq!(state.consecutive_passes, 1);

		assert_eq!(ledger.record_fail(1), 1);
		assert_eq!(ledger.state(1).consecutive_passes, 0);
	}

	#[test]
	fn open_incident_tracking_round_trips() {
		let mut ledger = StreakLedger::new();

		assert_eq!(ledger.open_incident(3), None);

		ledger.set_open_incident(3, 41);

		assert_eq!(ledger.open_incident(3), Some(41));

		ledger.clear_open_incident(3);

		assert_eq!(ledger.open_incident(3), None);
	}

	#[test]
	fn rewinds_step_counters_back_once() {
		let mut ledger = StreakLedger::new();

		ledger.record_fail(5);
		ledger.record_fail(5);
		ledger.rewind_fail(5);

		assert_eq!(ledger.state(5).consecutive_fails, 1);

		ledger.record_pass(5);
		ledger.rewind_pass(5);

		assert_eq!(ledger.state(5).consecutive_passes, 0);

		// Rewinding an empty streak stays at zero.
		ledger.rewind_pass(5);

		assert_eq!(ledger.state(5).consecutive_passes, 0);
	}
}
