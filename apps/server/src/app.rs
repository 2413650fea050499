use std::path::Path;

use axum::{routing::get, Router};
use pb_sync::Notifier;
use tower_http::services::ServeDir;

use crate::relay;

pub fn router(notifier: Notifier, public_dir: impl AsRef<Path>) -> Router {
	Router::new()
		.route("/", get(|| async { "Pushbridge is listening for changes." }))
		.route("/health", get(|| async { "OK" }))
		.route("/socket", get(relay::socket))
		.fallback_service(ServeDir::new(public_dir.as_ref()))
		.with_state(notifier)
}
