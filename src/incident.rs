//! Incident transition decisions.
//!
//! The decision half of the state machine is pure: given the streak count just recorded and the
//! currently tracked open incident, it names the transition the prober must persist and emit.
//! Threshold comparisons use equality, so exactly the Nth consecutive observation in a direction
//! triggers a transition and later same-direction observations stay silent.

// self
use crate::_prelude::*;

/// Consecutive failing probes required to open an incident.
pub const DEFAULT_FAIL_THRESHOLD: u32 = 3;
/// Consecutive passing probes required to resolve an open incident.
pub const DEFAULT_RECOVER_THRESHOLD: u32 = 2;

/// Hysteresis thresholds for the open/resolve transitions.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Thresholds {
	/// Fail streak length that opens an incident.
	pub fail: u32,
	/// Pass streak length that resolves an open incident.
	pub recover: u32,
}
impl Thresholds {
	/// Validate invariants for the threshold configuration.
	pub fn validate(&self) -> Result<()> {
		if self.fail == 0 {
			return Err(Error::Validation {
				field: "FAIL_THRESHOLD",
				reason: "Must be at least 1.".into(),
			});
		}
		if self.recover == 0 {
			return Err(Error::Validation {
				field: "RECOVER_THRESHOLD",
				reason: "Must be at least 1.".into(),
			});
		}

		Ok(())
	}

	/// Decide the transition after a failing observation.
	///
	/// `fails_after` is the streak count including the observation just recorded.
	pub fn after_fail(
		&self,
		fails_after: u32,
		open_incident: Option<i64>,
		reason: impl Into<String>,
	) -> Transition {
		if open_incident.is_none() && fails_after == self.fail {
			Transition::Open { reason: reason.into() }
		} else {
			Transition::None
		}
	}

	/// Decide the transition after a passing observation.
	pub fn after_pass(&self, passes_after: u32, open_incident: Option<i64>) -> Transition {
		match open_incident {
			Some(incident_id) if passes_after == self.recover => Transition::Resolve { incident_id },
			_ => Transition::None,
		}
	}
}
impl Default for Thresholds {
	fn default() -> Self {
		Self { fail: DEFAULT_FAIL_THRESHOLD, recover: DEFAULT_RECOVER_THRESHOLD }
	}
}

/// Store/emit work an observation has triggered.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Transition {
	/// Nothing to persist or emit.
	None,
	/// Open an incident with the captured diagnostic.
	Open {
		/// Diagnostic stamped on the new incident row.
		reason: String,
	},
	/// Resolve the tracked open incident.
	Resolve {
		/// Row to move to `resolved`.
		incident_id: i64,
	},
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn opens_exactly_at_the_fail_threshold() {
		let thresholds = Thresholds::default();

		assert_eq!(thresholds.after_fail(1, None, "HTTP 500"), Transition::None);
		assert_eq!(thresholds.after_fail(2, None, "HTTP 500"), Transition::None);
		assert_eq!(
			thresholds.after_fail(3, None, "HTTP 500"),
			Transition::Open { reason: "HTTP 500".into() }
		);
		// The fourth consecutive failure must not re-open.
		assert_eq!(thresholds.after_fail(4, None, "HTTP 500"), Transition::None);
	}

	#[test]
	fn never_opens_while_an_incident_is_tracked() {
		let thresholds = Thresholds::default();

		assert_eq!(thresholds.after_fail(3, Some(9), "HTTP 500"), Transition::None);
	}

	#[test]
	fn resolves_exactly_at_the_recover_threshold() {
		let thresholds = Thresholds::default();

		assert_eq!(thresholds.after_pass(1, Some(9)), Transition::None);
		assert_eq!(thresholds.after_pass(2, Some(9)), Transition::Resolve { incident_id: 9 });
		assert_eq!(thresholds.after_pass(3, Some(9)), Transition::None);
	}

	#[test]
	fn passes_without_an_incident_stay_silent() {
		let thresholds = Thresholds::default();

		assert_eq!(thresholds.after_pass(2, None), Transition::None);
	}

	#[test]
	fn full_sequences_follow_the_transition_table() {
		// Mirrors the flapping scenario: no streak ever reaches a threshold.
		let thresholds = Thresholds::default();
		let outcomes = [false, true, false, true, false, true];
		let mut ledger = crate::streak::StreakLedger::new();
		let mut transitions = 0;

		for ok in outcomes {
			let transition = if ok {
				let passes = ledger.record_pass(1);

				thresholds.after_pass(passes, ledger.open_incident(1))
			} else {
				let fails = ledger.record_fail(1);

				thresholds.after_fail(fails, ledger.open_incident(1), "HTTP 500")
			};

			if transition != Transition::None {
				transitions += 1;
			}
		}

		assert_eq!(transitions, 0);
	}

	#[test]
	fn recovery_requires_an_unbroken_pass_streak() {
		let thresholds = Thresholds::default();
		let mut ledger = crate::streak::StreakLedger::new();

		for _ in 0..3 {
			ledger.record_fail(1);
		}

		ledger.set_open_incident(1, 7);

		// Pass, fail, pass, pass: only the final pass resolves.
		assert_eq!(
			thresholds.after_pass(ledger.record_pass(1), ledger.open_incident(1)),
			Transition::None
		);
		assert_eq!(
			thresholds.after_fail(ledger.record_fail(1), ledger.open_incident(1), "HTTP 500"),
			Transition::None
		);
		assert_eq!(
			thresholds.after_pass(ledger.record_pass(1), ledger.open_incident(1)),
			Transition::None
		);
		assert_eq!(
			thresholds.after_pass(ledger.record_pass(1), ledger.open_incident(1)),
			Transition::Resolve { incident_id: 7 }
		);
	}

	#[test]
	fn zero_thresholds_are_rejected() {
		assert!(Thresholds { fail: 0, recover: 2 }.validate().is_err());
		assert!(Thresholds { fail: 3, recover: 0 }.validate().is_err());
		assert!(Thresholds::default().validate().is_ok());
	}
}
