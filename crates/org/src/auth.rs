use std::fmt;

use serde::Deserialize;
use tracing::{debug, instrument};

use super::{api::upstream_message, BackendId, Error, Operation, OrgConfig};

const TOKEN_PATH: &str = "/services/oauth2/token";

fn default_token_type() -> String {
	"Bearer".to_string()
}

/// Access token and instance details returned by the OAuth token endpoint.
#[derive(Clone, Deserialize)]
pub struct OAuthToken {
	pub access_token: String,
	pub instance_url: String,
	#[serde(default = "default_token_type")]
	pub token_type: String,
	#[serde(default)]
	pub issued_at: Option<String>,
}

impl OAuthToken {
	#[must_use]
	pub fn authorization_header(&self) -> String {
		format!("{} {}", self.token_type, self.access_token)
	}

	#[must_use]
	pub fn instance_url(&self) -> &str {
		self.instance_url.trim_end_matches('/')
	}
}

impl fmt::Debug for OAuthToken {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("OAuthToken")
			.field("access_token", &"***SECRET***")
			.field("instance_url", &self.instance_url)
			.field("token_type", &self.token_type)
			.field("issued_at", &self.issued_at)
			.finish()
	}
}

pub(crate) trait WithAuth {
	fn with_auth(self, token: &OAuthToken) -> Self;
}

impl WithAuth for reqwest::RequestBuilder {
	fn with_auth(self, token: &OAuthToken) -> Self {
		self.header("authorization", token.authorization_header())
	}
}

/// OAuth 2.0 username-password flow.
pub mod password {
	use super::*;

	#[instrument(skip(client, config), fields(username = %config.username), err)]
	pub async fn exec(
		client: &reqwest::Client,
		backend: BackendId,
		config: &OrgConfig,
	) -> Result<OAuthToken, Error> {
		let map_err = |e: reqwest::Error| {
			if e.is_timeout() {
				Error::Timeout {
					backend,
					operation: Operation::Authenticate,
					timeout: config.request_timeout,
				}
			} else {
				Error::Auth {
					backend,
					message: e.to_string(),
				}
			}
		};

		let mut form = vec![
			("grant_type", "password"),
			("client_id", config.client_id.as_str()),
			("client_secret", config.client_secret.unsecure()),
			("username", config.username.as_str()),
			("password", config.password.unsecure()),
		];
		if let Some(redirect_uri) = config.redirect_uri.as_deref() {
			form.push(("redirect_uri", redirect_uri));
		}

		let response = client
			.post(format!("{}{TOKEN_PATH}", config.login_url()))
			.form(&form)
			.send()
			.await
			.map_err(map_err)?;

		if !response.status().is_success() {
			return Err(Error::Auth {
				backend,
				message: upstream_message(response).await,
			});
		}

		let token = response.json::<OAuthToken>().await.map_err(map_err)?;

		debug!(instance_url = %token.instance_url, "authenticated");

		Ok(token)
	}
}
