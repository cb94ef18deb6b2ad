//! Uptime probe scheduler and incident state machine — a single-writer core that paces HTTP
//! probes, persists observations, and drives open/resolve incident transitions with hysteresis.

#![deny(clippy::all, missing_docs, unused_crate_dependencies)]

pub mod alert;
pub mod config;
pub mod incident;
pub mod model;
pub mod probe;
pub mod prober;
pub mod store;
pub mod streak;
pub mod telemetry;

mod error;
mod _prelude {
	pub use std::{sync::Arc, time::Duration};

	pub use chrono::{DateTime, Utc};
	pub use tokio::time::Instant;

	pub use crate::{Error, Result};
}
pub use crate::{
	error::{Error, Result},
	prober::{Prober, ProberOptions},
};
