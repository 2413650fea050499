//!
//! # Org client
//!
//! Authenticated access to the two record stores the bridge keeps in sync.
//!
//! Each backend is represented by one [`OrgConnection`], created once at startup and shared by
//! reference. The only way to issue a query or an update is through the [`Session`] returned by
//! [`OrgConnection::authenticate`], so every operation runs against a token obtained in the same
//! logical step. The session also holds the connection's lock until it is dropped, which keeps a
//! concurrent authentication from replacing the token mid-operation.
//!
//! ```no_run
//! use pb_org::{BackendId, OrgConfig, OrgConnection, SObject};
//!
//! # async fn run() -> Result<(), pb_org::Error> {
//! let target = OrgConnection::new(
//! 	BackendId::Target,
//! 	OrgConfig::new("client-id", "client-secret", "user@example.com", "password"),
//! )?;
//!
//! let session = target.authenticate().await?;
//! session
//! 	.update(&SObject::new("CMC_Task__c", "a0B000000000001").with_field("Status__c", "Active"))
//! 	.await?;
//! # Ok(())
//! # }
//! ```
#![warn(
	clippy::all,
	clippy::pedantic,
	clippy::correctness,
	clippy::perf,
	clippy::style,
	clippy::suspicious,
	clippy::complexity,
	clippy::nursery,
	clippy::unwrap_used,
	unused_qualifications,
	rust_2018_idioms,
	trivial_casts,
	trivial_numeric_casts,
	unused_allocation,
	clippy::unnecessary_cast,
	clippy::cast_lossless,
	clippy::cast_possible_truncation,
	clippy::cast_possible_wrap,
	clippy::cast_precision_loss,
	clippy::cast_sign_loss,
	clippy::dbg_macro,
	clippy::deprecated_cfg_attr,
	clippy::separated_literal_suffix,
	deprecated
)]
#![forbid(deprecated_in_future)]
#![allow(clippy::missing_errors_doc, clippy::module_name_repetitions)]

use std::{fmt, sync::Arc};

pub mod api;
pub mod auth;
pub mod config;
mod connection;
mod error;

pub use api::{FieldMap, RecordSet, SObject};
pub use auth::OAuthToken;
pub use config::{Environment, OrgConfig};
pub use connection::{OrgConnection, Session};
pub use error::{Error, Operation};

/// Which of the two record stores an operation targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BackendId {
	/// The org whose changes drive the bridge.
	Source,
	/// The org holding mirrored tasks and the project relationship chain.
	Target,
}

impl fmt::Display for BackendId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Self::Source => write!(f, "source org"),
			Self::Target => write!(f, "target org"),
		}
	}
}

/// Credential provider for both backends.
///
/// Hands out fresh sessions on demand, re-authenticating every time.
#[derive(Clone)]
pub struct Orgs {
	source: Arc<OrgConnection>,
	target: Arc<OrgConnection>,
}

impl Orgs {
	#[must_use]
	pub fn new(source: Arc<OrgConnection>, target: Arc<OrgConnection>) -> Self {
		Self { source, target }
	}

	#[must_use]
	pub fn get(&self, backend: BackendId) -> &Arc<OrgConnection> {
		match backend {
			BackendId::Source => &self.source,
			BackendId::Target => &self.target,
		}
	}

	pub async fn authenticate(&self, backend: BackendId) -> Result<Session<'_>, Error> {
		self.get(backend).authenticate().await
	}
}
