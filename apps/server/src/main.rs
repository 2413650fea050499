use std::{net::SocketAddr, sync::Arc};

use anyhow::Context;
use clap::Parser;
use pb_org::{BackendId, OrgConnection, Orgs};
use pb_stream::{stop_channel, Subscriber};
use pb_sync::{Notifier, Reconciler};
use tokio::net::TcpListener;
use tracing::{info, warn};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

mod app;
mod config;
mod relay;
mod utils;

use config::Config;

fn init_tracing(debug: bool) -> anyhow::Result<()> {
	let default_filter = if debug {
		"info,pb_org=debug,pb_stream=debug,pb_sync=debug,pb_server=debug"
	} else {
		"info"
	};

	tracing_subscriber::registry()
		.with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)))
		.with(fmt::layer().with_target(true))
		.try_init()
		.context("failed to initialize tracing")
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
	let config = Config::parse();
	init_tracing(config.debug)?;

	let source = Arc::new(
		OrgConnection::new(BackendId::Source, config.org_config(BackendId::Source))
			.context("failed to build source org connection")?,
	);
	let target = Arc::new(
		OrgConnection::new(BackendId::Target, config.org_config(BackendId::Target))
			.context("failed to build target org connection")?,
	);

	let notifier = Notifier::default();
	let reconciler = Arc::new(Reconciler::new(
		Orgs::new(Arc::clone(&source), target),
		notifier.clone(),
		config.reconcile_config(),
	));

	let subscriber = Subscriber::new(source, reconciler, config.subscriber_config())
		.context("failed to build change stream subscriber")?;
	let (stop_handle, stopper) = stop_channel();
	let subscriber_handle = tokio::spawn(subscriber.run(stopper));

	let addr = SocketAddr::from(([0u16; 8], config.port));
	let listener = TcpListener::bind(addr)
		.await
		.with_context(|| format!("failed to bind {addr}"))?;
	info!("Listening on http://localhost:{}", config.port);

	axum::serve(listener, app::router(notifier, &config.public_dir))
		.with_graceful_shutdown(utils::axum_shutdown_signal())
		.await
		.context("HTTP server failed")?;

	stop_handle.stop();
	if let Err(e) = subscriber_handle.await {
		warn!("Change stream subscriber task ended abnormally: {e:#?}");
	}

	Ok(())
}
