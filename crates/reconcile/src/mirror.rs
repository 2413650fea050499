//! Mirror of a challenge's status onto its target org task.

use pb_org::{BackendId, Error, Orgs, SObject};
use pb_stream::ChangeEvent;
use tracing::{debug, instrument};

pub const TASK_OBJECT: &str = "CMC_Task__c";

pub const STATUS_FIELD: &str = "CloudSpokes_Task_Status__c";
pub const SUBMISSIONS_FIELD: &str = "CloudSpokes_Submission_Count__c";
pub const NAME_FIELD: &str = "CloudSpokes_Challenge_Name__c";
pub const START_DATE_FIELD: &str = "CloudSpokes_Start_Date__c";
pub const END_DATE_FIELD: &str = "CloudSpokes_End_Date__c";
pub const URL_FIELD: &str = "CloudSpokes_Challenge_URL__c";
pub const EXTERNAL_ID_FIELD: &str = "CloudSpokes_Challenge_Id__c";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MirrorOutcome {
	Updated { task_id: String },
	/// The change names no target task.
	Skipped,
}

/// Field assignments for the task the change points at. Values the change does not carry are
/// left out so they keep whatever the task already holds.
#[must_use]
pub fn task_update(event: &ChangeEvent) -> Option<SObject> {
	let task_id = event.target_task_id.as_deref()?;
	let challenge = &event.challenge;

	Some(
		SObject::new(TASK_OBJECT, task_id)
			.with_optional_field(STATUS_FIELD, event.status.clone())
			.with_optional_field(SUBMISSIONS_FIELD, event.submission_count.clone())
			.with_optional_field(NAME_FIELD, challenge.name.clone())
			.with_optional_field(START_DATE_FIELD, challenge.start_date.clone())
			.with_optional_field(END_DATE_FIELD, challenge.end_date.clone())
			.with_optional_field(URL_FIELD, challenge.url.clone())
			.with_optional_field(EXTERNAL_ID_FIELD, challenge.external_id.clone()),
	)
}

#[instrument(skip_all, fields(task_id = ?event.target_task_id))]
pub async fn exec(orgs: &Orgs, event: &ChangeEvent) -> Result<MirrorOutcome, Error> {
	let Some(record) = task_update(event) else {
		debug!("change names no target task, nothing to mirror");
		return Ok(MirrorOutcome::Skipped);
	};

	let session = orgs.authenticate(BackendId::Target).await?;
	session.update(&record).await?;

	Ok(MirrorOutcome::Updated { task_id: record.id })
}
