use serde::{Deserialize, Deserializer};
use serde_json::{Number, Value};

use super::Error;

/// Descriptive fields of the challenge that changed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ChallengeMetadata {
	#[serde(rename = "Name", default)]
	pub name: Option<String>,
	#[serde(rename = "Start_Date__c", default)]
	pub start_date: Option<String>,
	#[serde(rename = "End_Date__c", default)]
	pub end_date: Option<String>,
	#[serde(rename = "Challenge_URL__c", default)]
	pub url: Option<String>,
	#[serde(
		rename = "Challenge_Id__c",
		default,
		deserialize_with = "string_or_number"
	)]
	pub external_id: Option<String>,
}

/// One record mutation pushed on the subscribed topic.
///
/// Every field is optional: the topic's query decides which fields are present.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChangeEvent {
	pub object_type: Option<String>,
	/// Id of the changed record in the source org.
	pub record_id: Option<String>,
	/// Source org challenge record the change belongs to.
	pub challenge_id: Option<String>,
	/// Target org task record mirrored by the challenge.
	pub target_task_id: Option<String>,
	pub status: Option<String>,
	pub submission_count: Option<Number>,
	pub challenge: ChallengeMetadata,
	/// `created` or `updated`, as reported by the notification envelope.
	pub event_type: Option<String>,
	pub created_date: Option<String>,
}

#[derive(Deserialize)]
struct Payload {
	#[serde(default)]
	event: Option<Envelope>,
	sobject: Option<Record>,
}

#[derive(Deserialize)]
struct Envelope {
	#[serde(rename = "type", default)]
	kind: Option<String>,
	#[serde(rename = "createdDate", default)]
	created_date: Option<String>,
}

#[derive(Deserialize)]
struct Attributes {
	#[serde(rename = "type", default)]
	kind: Option<String>,
}

#[derive(Deserialize)]
struct Record {
	#[serde(default)]
	attributes: Option<Attributes>,
	#[serde(rename = "Id", default)]
	id: Option<String>,
	#[serde(rename = "Challenge__c", default)]
	challenge: Option<String>,
	#[serde(rename = "CMC_Task__c", default)]
	task: Option<String>,
	#[serde(rename = "Status__c", default)]
	status: Option<String>,
	#[serde(rename = "Submissions__c", default)]
	submissions: Option<Number>,
	#[serde(flatten)]
	challenge_metadata: ChallengeMetadata,
}

fn string_or_number<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
	D: Deserializer<'de>,
{
	Ok(match Option::<Value>::deserialize(deserializer)? {
		Some(Value::String(s)) => Some(s),
		Some(Value::Number(n)) => Some(n.to_string()),
		_ => None,
	})
}

impl ChangeEvent {
	/// Builds an event from the `data` member of a topic message.
	pub fn from_payload(data: &Value) -> Result<Self, Error> {
		let Payload { event, sobject } = Payload::deserialize(data)
			.map_err(|e| Error::Malformed(format!("change payload: {e}")))?;

		let record = sobject.ok_or_else(|| Error::Malformed("change payload has no sobject".to_string()))?;
		let (event_type, created_date) = event
			.map(|envelope| (envelope.kind, envelope.created_date))
			.unwrap_or_default();

		Ok(Self {
			object_type: record.attributes.and_then(|attributes| attributes.kind),
			record_id: record.id,
			challenge_id: record.challenge,
			target_task_id: record.task,
			status: record.status,
			submission_count: record.submissions,
			challenge: record.challenge_metadata,
			event_type,
			created_date,
		})
	}

	/// The source org challenge this change belongs to: its `Challenge__c` lookup, or the
	/// changed record itself when the topic streams challenges directly.
	#[must_use]
	pub fn challenge_record_id(&self) -> Option<&str> {
		self.challenge_id.as_deref().or(self.record_id.as_deref())
	}

	/// Short label for logs and notifications.
	#[must_use]
	pub fn label(&self) -> String {
		format!(
			"challenge {} / task {}",
			self.challenge_record_id().unwrap_or("<none>"),
			self.target_task_id.as_deref().unwrap_or("<none>"),
		)
	}
}
