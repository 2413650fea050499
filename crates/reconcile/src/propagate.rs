//! Propagation of a task's project number back onto the source org challenge.

use pb_org::{BackendId, Error, Orgs, SObject};
use pb_stream::ChangeEvent;
use tracing::{debug, info, instrument};

use super::lookup::{project_query, resolve_project_id, Lookup};

pub const CHALLENGE_OBJECT: &str = "Challenge__c";
pub const REFERENCE_FIELD: &str = "Reference_Number__c";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Propagation {
	Updated {
		challenge_id: String,
		project_id: String,
	},
	/// The task's relationship chain does not lead to a project number.
	NotFound {
		task_id: String,
		challenge_id: String,
		hop: &'static str,
	},
	/// The change names no task or no challenge.
	Skipped,
}

#[instrument(skip_all, fields(task_id = ?event.target_task_id, challenge_id = ?event.challenge_record_id()))]
pub async fn exec(orgs: &Orgs, event: &ChangeEvent) -> Result<Propagation, Error> {
	let (Some(task_id), Some(challenge_id)) =
		(event.target_task_id.as_deref(), event.challenge_record_id())
	else {
		debug!("change names no task or challenge, nothing to propagate");
		return Ok(Propagation::Skipped);
	};

	let records = {
		let session = orgs.authenticate(BackendId::Target).await?;
		session.query(&project_query(task_id)).await?
	};

	let project_id = match resolve_project_id(&records) {
		Lookup::Found(project_id) => project_id,
		Lookup::Missing { hop } => {
			info!(%hop, "no project number found for task");
			return Ok(Propagation::NotFound {
				task_id: task_id.to_string(),
				challenge_id: challenge_id.to_string(),
				hop,
			});
		}
	};

	debug!(%project_id, "found project number");

	let session = orgs.authenticate(BackendId::Source).await?;
	session
		.update(
			&SObject::new(CHALLENGE_OBJECT, challenge_id)
				.with_field(REFERENCE_FIELD, project_id.as_str()),
		)
		.await?;

	Ok(Propagation::Updated {
		challenge_id: challenge_id.to_string(),
		project_id,
	})
}
