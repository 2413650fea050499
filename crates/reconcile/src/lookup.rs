//! Resolution of a task's project number through its relationship chain.

use pb_org::{api::escape_literal, RecordSet};
use serde_json::Value;

/// Relationship hops from a task down to its project number.
pub const PROJECT_CHAIN: [&str; 5] = [
	"Story__r",
	"Sprint__r",
	"Release__r",
	"Project__r",
	"pse__Project_ID__c",
];

/// Hop reported when the query matched no task at all.
pub const NO_RECORD: &str = "records";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Lookup {
	Found(String),
	/// The chain broke at `hop`, either null, absent or not of the expected shape.
	Missing { hop: &'static str },
}

#[must_use]
pub fn project_query(task_id: &str) -> String {
	format!(
		"select Id, {} from CMC_Task__c where Id = '{}'",
		PROJECT_CHAIN.join("."),
		escape_literal(task_id)
	)
}

#[must_use]
pub fn resolve_project_id(records: &RecordSet) -> Lookup {
	let Some(mut current) = records.first() else {
		return Lookup::Missing { hop: NO_RECORD };
	};

	for hop in PROJECT_CHAIN {
		match current.get(hop) {
			Some(Value::Null) | None => return Lookup::Missing { hop },
			Some(next) => current = next,
		}
	}

	match current {
		Value::String(id) if !id.trim().is_empty() => Lookup::Found(id.clone()),
		Value::Number(id) => Lookup::Found(id.to_string()),
		_ => Lookup::Missing {
			hop: PROJECT_CHAIN[PROJECT_CHAIN.len() - 1],
		},
	}
}
