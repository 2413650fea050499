use tokio::sync::{Mutex, MutexGuard};
use tracing::{debug, instrument};

use super::{
	api::{self, RecordSet, RequestConfig, SObject},
	auth::{self, OAuthToken},
	BackendId, Error, OrgConfig,
};

/// One org's connection, shared process-wide.
///
/// The current token lives behind a lock that is held for as long as a [`Session`] is alive.
pub struct OrgConnection {
	backend: BackendId,
	config: OrgConfig,
	client: reqwest::Client,
	token: Mutex<Option<OAuthToken>>,
}

impl OrgConnection {
	pub fn new(backend: BackendId, config: OrgConfig) -> Result<Self, Error> {
		let client = reqwest::Client::builder()
			.timeout(config.request_timeout)
			.build()
			.map_err(Error::HttpClient)?;

		Ok(Self::with_client(backend, config, client))
	}

	#[must_use]
	pub fn with_client(backend: BackendId, config: OrgConfig, client: reqwest::Client) -> Self {
		Self {
			backend,
			config,
			client,
			token: Mutex::new(None),
		}
	}

	#[must_use]
	pub const fn backend(&self) -> BackendId {
		self.backend
	}

	#[must_use]
	pub const fn config(&self) -> &OrgConfig {
		&self.config
	}

	/// Authenticates and returns a session bound to the new token.
	///
	/// Other callers wanting to authenticate against this org wait until the returned session is
	/// dropped.
	#[instrument(skip(self), fields(backend = %self.backend))]
	pub async fn authenticate(&self) -> Result<Session<'_>, Error> {
		let mut guard = self.token.lock().await;

		let token = auth::password::exec(&self.client, self.backend, &self.config).await?;
		*guard = Some(token.clone());

		Ok(Session {
			connection: self,
			token,
			_guard: guard,
		})
	}
}

/// A freshly authenticated session, the only handle through which records can be read or
/// written.
pub struct Session<'conn> {
	connection: &'conn OrgConnection,
	token: OAuthToken,
	_guard: MutexGuard<'conn, Option<OAuthToken>>,
}

impl Session<'_> {
	#[must_use]
	pub const fn token(&self) -> &OAuthToken {
		&self.token
	}

	/// Releases the connection lock, keeping only the token.
	#[must_use]
	pub fn into_token(self) -> OAuthToken {
		self.token
	}

	#[must_use]
	pub const fn backend(&self) -> BackendId {
		self.connection.backend
	}

	fn request_config(&self) -> RequestConfig<'_> {
		RequestConfig {
			client: &self.connection.client,
			backend: self.connection.backend,
			api_version: &self.connection.config.api_version,
			auth_token: &self.token,
			timeout: self.connection.config.request_timeout,
		}
	}

	#[instrument(skip(self), fields(backend = %self.connection.backend), err)]
	pub async fn query(&self, soql: &str) -> Result<RecordSet, Error> {
		let records = api::query(self.request_config(), soql).await?;

		debug!(total_size = records.total_size, "query returned");

		Ok(records)
	}

	#[instrument(
		skip_all,
		fields(
			backend = %self.connection.backend,
			object_type = %record.object_type,
			record_id = %record.id,
		),
		err
	)]
	pub async fn update(&self, record: &SObject) -> Result<(), Error> {
		api::update(self.request_config(), record).await?;

		debug!("record updated");

		Ok(())
	}
}
