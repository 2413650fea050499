use std::time::Duration;

use reqwest::StatusCode;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
	#[error("transport has no session token")]
	NotAuthenticated,
	#[error("transport has not completed a handshake")]
	NoClientId,
	#[error("transport error: {0}")]
	Transport(#[source] reqwest::Error),
	#[error("streaming endpoint rejected the session (status {0})")]
	Unauthorized(StatusCode),
	#[error("unexpected response status {0}")]
	Status(StatusCode),
	#[error("long poll exceeded {0:?} without a response")]
	Timeout(Duration),
	#[error("malformed bayeux response: {0}")]
	Malformed(String),
	#[error("handshake failed: {0}")]
	Handshake(String),
	#[error("subscription to '{topic}' failed: {reason}")]
	Subscribe { topic: String, reason: String },
	#[error("disconnected by server: {0}")]
	Disconnected(String),
	#[error("change handler is no longer accepting events")]
	HandlerClosed,

	#[error(transparent)]
	Auth(#[from] pb_org::Error),
}

impl Error {
	/// Whether the failure came from the credential provider rather than the stream itself.
	#[must_use]
	pub const fn is_auth(&self) -> bool {
		matches!(self, Self::Auth(_))
	}
}
