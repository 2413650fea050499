use std::{fmt, time::Duration};

use thiserror::Error;

use super::BackendId;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
	Authenticate,
	Query,
	Update,
}

impl fmt::Display for Operation {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Self::Authenticate => write!(f, "authentication"),
			Self::Query => write!(f, "query"),
			Self::Update => write!(f, "update"),
		}
	}
}

#[derive(Debug, Error)]
pub enum Error {
	#[error("authentication to {backend} failed: {message}")]
	Auth { backend: BackendId, message: String },
	#[error("query against {backend} failed: {message}")]
	Query { backend: BackendId, message: String },
	#[error("update of {object_type} <id='{record_id}'> on {backend} failed: {message}")]
	Update {
		backend: BackendId,
		object_type: String,
		record_id: String,
		message: String,
	},
	#[error("{operation} against {backend} timed out after {timeout:?}")]
	Timeout {
		backend: BackendId,
		operation: Operation,
		timeout: Duration,
	},

	#[error("failed to build http client: {0}")]
	HttpClient(#[source] reqwest::Error),
}

impl Error {
	#[must_use]
	pub const fn backend(&self) -> Option<BackendId> {
		match self {
			Self::Auth { backend, .. }
			| Self::Query { backend, .. }
			| Self::Update { backend, .. }
			| Self::Timeout { backend, .. } => Some(*backend),
			Self::HttpClient(_) => None,
		}
	}

	#[must_use]
	pub const fn is_timeout(&self) -> bool {
		matches!(self, Self::Timeout { .. })
	}
}
