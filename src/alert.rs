//! Alert events and the queue they are appended to.
//!
//! Delivery is at-most-once: the incident row is the durable record, so a failed append is
//! logged by the caller and never retried.

// crates.io
use async_trait::async_trait;
use redis::AsyncCommands;
use serde::{Deserialize, Serialize};
// self
use crate::_prelude::*;

/// Well-known name of the Redis list carrying alert events.
pub const DEFAULT_ALERT_QUEUE: &str = "alerts";

/// Typed message emitted on an incident transition.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AlertEvent {
	/// A sustained failure crossed the open threshold.
	Incident {
		/// Monitor the episode belongs to.
		monitor_id: i64,
		/// Freshly opened incident row.
		incident_id: i64,
		/// Diagnostic captured at open time.
		reason: String,
	},
	/// An open incident crossed the recover threshold.
	Recovered {
		/// Monitor the episode belongs to.
		monitor_id: i64,
		/// Resolved incident row.
		incident_id: i64,
	},
}

/// Destination for alert events.
#[async_trait]
pub trait AlertSink: Send + Sync {
	/// Append one event to the queue.
	async fn emit(&self, event: &AlertEvent) -> Result<()>;
}

/// Redis list sink; the producer pushes at the head, the dispatcher pops from the tail.
#[derive(Clone, Debug)]
pub struct RedisAlertQueue {
	client: redis::Client,
	queue: Arc<str>,
}
impl RedisAlertQueue {
	/// Wrap a Redis client, appending to the named list.
	pub fn new(client: redis::Client, queue: impl Into<Arc<str>>) -> Self {
		Self { client, queue: queue.into() }
	}
}
#[async_trait]
impl AlertSink for RedisAlertQueue {
	async fn emit(&self, event: &AlertEvent) -> Result<()> {
		let mut conn = self.client.get_multiplexed_async_connection().await?;
		let payload = serde_json::to_string(event)?;

		conn.lpush::<_, _, ()>(&*self.queue, payload).await?;

		Ok(())
	}
}
