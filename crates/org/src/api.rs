use std::time::Duration;

use serde::Deserialize;
use serde_json::{Map, Value};

use super::{auth::OAuthToken, BackendId, Error, Operation};

pub type FieldMap = Map<String, Value>;

pub struct RequestConfig<'a> {
	pub client: &'a reqwest::Client,
	pub backend: BackendId,
	pub api_version: &'a str,
	pub auth_token: &'a OAuthToken,
	pub timeout: Duration,
}

impl RequestConfig<'_> {
	fn data_url(&self) -> String {
		format!(
			"{}/services/data/v{}",
			self.auth_token.instance_url(),
			self.api_version
		)
	}

	fn timeout_or(&self, operation: Operation, e: reqwest::Error, other: Error) -> Error {
		if e.is_timeout() {
			Error::Timeout {
				backend: self.backend,
				operation,
				timeout: self.timeout,
			}
		} else {
			other
		}
	}
}

/// Records returned by a query.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordSet {
	pub total_size: u64,
	pub done: bool,
	#[serde(default)]
	pub records: Vec<Value>,
}

impl RecordSet {
	#[must_use]
	pub fn first(&self) -> Option<&Value> {
		self.records.first()
	}

	#[must_use]
	pub fn is_empty(&self) -> bool {
		self.records.is_empty()
	}
}

/// An existing record addressed by type and id, carrying the fields to assign.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SObject {
	pub object_type: String,
	pub id: String,
	pub fields: FieldMap,
}

impl SObject {
	pub fn new(object_type: impl Into<String>, id: impl Into<String>) -> Self {
		Self {
			object_type: object_type.into(),
			id: id.into(),
			fields: FieldMap::new(),
		}
	}

	#[must_use]
	pub fn with_field(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
		self.fields.insert(name.into(), value.into());
		self
	}

	/// Assigns the field only when a value is present, leaving the record's value untouched
	/// otherwise.
	#[must_use]
	pub fn with_optional_field(self, name: impl Into<String>, value: Option<impl Into<Value>>) -> Self {
		match value {
			Some(value) => self.with_field(name, value),
			None => self,
		}
	}
}

/// Quotes a value for use inside a single-quoted query literal.
#[must_use]
pub fn escape_literal(value: &str) -> String {
	let mut escaped = String::with_capacity(value.len());
	for c in value.chars() {
		if matches!(c, '\\' | '\'') {
			escaped.push('\\');
		}
		escaped.push(c);
	}
	escaped
}

/// Best effort extraction of the error message from a failed response.
pub(crate) async fn upstream_message(response: reqwest::Response) -> String {
	#[derive(Deserialize)]
	#[serde(rename_all = "camelCase")]
	struct ApiError {
		message: String,
		#[serde(default)]
		error_code: Option<String>,
	}

	#[derive(Deserialize)]
	struct OAuthError {
		error: String,
		#[serde(default)]
		error_description: Option<String>,
	}

	let status = response.status();
	let Ok(body) = response.text().await else {
		return status.to_string();
	};

	if let Ok(errors) = serde_json::from_str::<Vec<ApiError>>(&body) {
		if !errors.is_empty() {
			return errors
				.into_iter()
				.map(|e| match e.error_code {
					Some(code) => format!("{code}: {}", e.message),
					None => e.message,
				})
				.collect::<Vec<_>>()
				.join("; ");
		}
	}

	if let Ok(e) = serde_json::from_str::<OAuthError>(&body) {
		return e.error_description.unwrap_or(e.error);
	}

	if body.trim().is_empty() {
		status.to_string()
	} else {
		format!("{status}: {}", body.trim())
	}
}

pub use query::exec as query;
pub mod query {
	use super::*;

	use crate::auth::WithAuth;

	pub async fn exec(config: RequestConfig<'_>, soql: &str) -> Result<RecordSet, Error> {
		let query_err = |message: String| Error::Query {
			backend: config.backend,
			message,
		};

		let response = config
			.client
			.get(format!("{}/query", config.data_url()))
			.query(&[("q", soql)])
			.with_auth(config.auth_token)
			.send()
			.await
			.map_err(|e| {
				let message = e.to_string();
				config.timeout_or(Operation::Query, e, query_err(message))
			})?;

		if !response.status().is_success() {
			return Err(query_err(upstream_message(response).await));
		}

		response.json().await.map_err(|e| {
			let message = e.to_string();
			config.timeout_or(Operation::Query, e, query_err(message))
		})
	}
}

pub use update::exec as update;
pub mod update {
	use super::*;

	use crate::auth::WithAuth;

	pub async fn exec(config: RequestConfig<'_>, record: &SObject) -> Result<(), Error> {
		let update_err = |message: String| Error::Update {
			backend: config.backend,
			object_type: record.object_type.clone(),
			record_id: record.id.clone(),
			message,
		};

		let response = config
			.client
			.patch(format!(
				"{}/sobjects/{}/{}",
				config.data_url(),
				record.object_type,
				record.id
			))
			.json(&record.fields)
			.with_auth(config.auth_token)
			.send()
			.await
			.map_err(|e| {
				let message = e.to_string();
				config.timeout_or(Operation::Update, e, update_err(message))
			})?;

		if !response.status().is_success() {
			return Err(update_err(upstream_message(response).await));
		}

		Ok(())
	}
}
