//! Prober entrypoint: settings, bootstrap, reconstruction, and the pulse loop.

// std
use std::sync::Arc;
// crates.io
use tokio::signal;
// self
use uptime_prober::{
	Prober, Result,
	alert::RedisAlertQueue,
	config::Settings,
	store::postgres::{BootstrapPolicy, PgStore},
	telemetry,
};

#[tokio::main]
async fn main() -> Result<()> {
	telemetry::init();

	let settings = Settings::from_env()?;
	let store = PgStore::connect(&settings.database_url, BootstrapPolicy::default()).await?;
	let redis = redis::Client::open(settings.redis_url.as_str())?;
	let sink = RedisAlertQueue::new(redis, settings.alert_queue.as_str());
	let prober = Prober::new(Arc::new(store), Arc::new(sink), settings.prober_options())?;
	let restored = prober.restore_open_incidents().await?;

	if restored > 0 {
		tracing::info!(restored, "open incidents reloaded from store");
	}

	tracing::info!("prober started");

	prober.run(shutdown_signal()).await;

	tracing::info!("prober stopped");

	Ok(())
}

async fn shutdown_signal() {
	let ctrl_c = async {
		signal::ctrl_c().await.expect("ctrl-c handler must install");
	};
	#[cfg(unix)]
	let terminate = async {
		signal::unix::signal(signal::unix::SignalKind::terminate())
			.expect("sigterm handler must install")
			.recv()
			.await;
	};
	#[cfg(not(unix))]
	let terminate = std::future::pending::<()>();

	tokio::select! {
		_ = ctrl_c => {},
		_ = terminate => {},
	}
}
