//! Single-probe execution over HTTP.

// crates.io
use reqwest::{Client, Method, redirect::Policy};
use url::Url;
// self
use crate::{
	_prelude::*,
	model::{Monitor, ProbeMethod},
};

/// Upper bound on the persisted diagnostic, in bytes.
pub const MAX_REASON_BYTES: usize = 500;
/// Redirect depth applied to every probe.
pub const MAX_REDIRECTS: usize = 10;
/// Connect-phase timeout; the per-probe deadline still bounds the whole exchange.
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Outcome of one completed probe, ready to persist as an observation.
///
/// `status_code` and `latency_ms` are both `None` exactly when transport failed before a
/// response status was obtained.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProbeOutcome {
	/// Response status, when the exchange produced one.
	pub status_code: Option<i32>,
	/// Wall-clock latency in milliseconds, when the exchange produced a status.
	pub latency_ms: Option<i64>,
	/// Whether the status is in the monitor's expected set.
	pub ok: bool,
	/// Truncated diagnostic for transport failures.
	pub error_reason: Option<String>,
}
impl ProbeOutcome {
	/// Build the transport-failure shape from a diagnostic.
	pub fn transport_failure(reason: impl AsRef<str>) -> Self {
		Self {
			status_code: None,
			latency_ms: None,
			ok: false,
			error_reason: Some(truncate_reason(reason.as_ref())),
		}
	}

	/// Diagnostic to stamp on an incident opened by this outcome.
	pub fn failure_reason(&self) -> String {
		match (&self.error_reason, self.status_code) {
			(Some(reason), _) => reason.clone(),
			(None, Some(code)) => format!("HTTP {code}"),
			(None, None) => "probe failed".into(),
		}
	}
}

/// Build the shared probe client.
///
/// Redirect depth, TLS stack, and User-Agent are fixed here so every probe of a monitor
/// behaves the same way across its lifetime.
pub fn build_client() -> Result<Client> {
	Client::builder()
		.redirect(Policy::limited(MAX_REDIRECTS))
		.user_agent(format!("uptime-prober/{}", env!("CARGO_PKG_VERSION")))
		.connect_timeout(CONNECT_TIMEOUT)
		.build()
		.map_err(Error::from)
}

/// Issue one probe against the monitor's URL, bounded by `timeout` end to end.
pub async fn run_probe(client: &Client, monitor: &Monitor, timeout: Duration) -> ProbeOutcome {
	let url = match Url::parse(&monitor.url) {
		Ok(url) => url,
		Err(err) => return ProbeOutcome::transport_failure(format!("invalid url: {err}")),
	};
	let method = match monitor.probe_method() {
		ProbeMethod::Get => Method::GET,
		ProbeMethod::Head => Method::HEAD,
		ProbeMethod::Post => Method::POST,
	};
	let start = Instant::now();

	match client.request(method, url).timeout(timeout).send().await {
		Ok(response) => {
			let latency = start.elapsed().as_millis() as i64;
			let status = response.status().as_u16();

			ProbeOutcome {
				status_code: Some(i32::from(status)),
				latency_ms: Some(latency),
				ok: monitor.expects(status),
				error_reason: None,
			}
		},
		Err(err) => ProbeOutcome::transport_failure(err.to_string()),
	}
}

fn truncate_reason(raw: &str) -> String {
	if raw.len() <= MAX_REASON_BYTES {
		return raw.to_string();
	}

	let mut end = MAX_REASON_BYTES;

	while !raw.is_char_boundary(end) {
		end -= 1;
	}

	raw[..end].to_string()
}
