use async_trait::async_trait;
use futures_concurrency::future::Join;
use pb_org::{Error, Orgs};
use pb_stream::{ChangeEvent, ChangeHandler};
use tracing::{debug, error, info, instrument};

use super::{
	mirror::{self, MirrorOutcome},
	notify::Notifier,
	propagate::{self, Propagation},
};

/// Which branches run for every change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconcileConfig {
	pub mirror: bool,
	pub propagate: bool,
}

impl Default for ReconcileConfig {
	fn default() -> Self {
		Self {
			mirror: true,
			propagate: true,
		}
	}
}

/// What happened to one change. A `None` branch was disabled.
#[derive(Debug)]
pub struct ReconcileReport {
	pub mirror: Option<Result<MirrorOutcome, Error>>,
	pub propagation: Option<Result<Propagation, Error>>,
}

pub struct Reconciler {
	orgs: Orgs,
	notifier: Notifier,
	config: ReconcileConfig,
}

impl Reconciler {
	#[must_use]
	pub const fn new(orgs: Orgs, notifier: Notifier, config: ReconcileConfig) -> Self {
		Self {
			orgs,
			notifier,
			config,
		}
	}

	#[must_use]
	pub const fn notifier(&self) -> &Notifier {
		&self.notifier
	}

	/// Runs both branches concurrently. Neither branch sees the other's result and a failure in
	/// one never stops the other.
	#[instrument(skip_all, fields(event = %event.label()))]
	pub async fn reconcile(&self, event: &ChangeEvent) -> ReconcileReport {
		let (mirror, propagation) = (
			async {
				if self.config.mirror {
					Some(self.mirror(event).await)
				} else {
					None
				}
			},
			async {
				if self.config.propagate {
					Some(self.propagate(event).await)
				} else {
					None
				}
			},
		)
			.join()
			.await;

		ReconcileReport {
			mirror,
			propagation,
		}
	}

	async fn mirror(&self, event: &ChangeEvent) -> Result<MirrorOutcome, Error> {
		let res = mirror::exec(&self.orgs, event).await;

		match &res {
			Ok(MirrorOutcome::Updated { task_id }) => {
				let message = format!(
					"CMC Task {task_id} updated with status of {} and {} submissions.",
					event.status.as_deref().unwrap_or("<none>"),
					event
						.submission_count
						.as_ref()
						.map_or_else(|| "<none>".to_string(), ToString::to_string),
				);
				info!("{message}");
				self.notifier.publish(message);
			}
			Ok(MirrorOutcome::Skipped) => debug!("mirror skipped"),
			Err(e) => {
				error!(error = %e, "failed to mirror change onto target task");
				self.notifier.publish(format!(
					"Could not update CMC Task {}: {e}",
					event.target_task_id.as_deref().unwrap_or("<none>")
				));
			}
		}

		res
	}

	async fn propagate(&self, event: &ChangeEvent) -> Result<Propagation, Error> {
		let res = propagate::exec(&self.orgs, event).await;

		match &res {
			Ok(Propagation::Updated {
				challenge_id,
				project_id,
			}) => {
				let message = format!(
					"CloudSpokes challenge {challenge_id} updated with Reference Number {project_id}."
				);
				info!("{message}");
				self.notifier.publish(message);
			}
			Ok(Propagation::NotFound {
				task_id,
				challenge_id,
				hop,
			}) => {
				let message =
					format!("Could not find a ProjectId for task {task_id} for challenge {challenge_id}");
				info!(%hop, "{message}");
				self.notifier.publish(message);
			}
			Ok(Propagation::Skipped) => debug!("propagation skipped"),
			Err(e) => {
				error!(error = %e, "failed to propagate project number to challenge");
				self.notifier.publish(format!(
					"Could not update CloudSpokes challenge {}: {e}",
					event.challenge_record_id().unwrap_or("<none>")
				));
			}
		}

		res
	}
}

#[async_trait]
impl ChangeHandler for Reconciler {
	async fn handle(&self, event: ChangeEvent) {
		self.reconcile(&event).await;
	}
}
