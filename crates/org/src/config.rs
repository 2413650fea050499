use std::{fmt, str::FromStr, time::Duration};

use secstr::SecUtf8;

pub const DEFAULT_API_VERSION: &str = "24.0";
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

const PRODUCTION_LOGIN_URL: &str = "https://login.salesforce.com";
const SANDBOX_LOGIN_URL: &str = "https://test.salesforce.com";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Environment {
	#[default]
	Production,
	Sandbox,
}

impl Environment {
	#[must_use]
	pub const fn login_url(self) -> &'static str {
		match self {
			Self::Production => PRODUCTION_LOGIN_URL,
			Self::Sandbox => SANDBOX_LOGIN_URL,
		}
	}
}

#[derive(Debug, thiserror::Error)]
#[error("unknown environment '{0}', expected 'production' or 'sandbox'")]
pub struct UnknownEnvironment(String);

impl FromStr for Environment {
	type Err = UnknownEnvironment;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s.trim().to_ascii_lowercase().as_str() {
			"" | "production" => Ok(Self::Production),
			"sandbox" => Ok(Self::Sandbox),
			_ => Err(UnknownEnvironment(s.to_string())),
		}
	}
}

impl fmt::Display for Environment {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Self::Production => write!(f, "production"),
			Self::Sandbox => write!(f, "sandbox"),
		}
	}
}

/// Connection parameters for one org, fixed for the life of the process.
#[derive(Debug, Clone)]
pub struct OrgConfig {
	pub client_id: String,
	pub client_secret: SecUtf8,
	pub username: String,
	pub password: SecUtf8,
	pub redirect_uri: Option<String>,
	pub environment: Environment,
	pub api_version: String,
	/// Overrides the environment's login host, mostly useful against a mock server.
	pub login_url: Option<String>,
	pub request_timeout: Duration,
}

impl OrgConfig {
	pub fn new(
		client_id: impl Into<String>,
		client_secret: impl Into<String>,
		username: impl Into<String>,
		password: impl Into<String>,
	) -> Self {
		Self {
			client_id: client_id.into(),
			client_secret: SecUtf8::from(client_secret.into()),
			username: username.into(),
			password: SecUtf8::from(password.into()),
			redirect_uri: None,
			environment: Environment::default(),
			api_version: DEFAULT_API_VERSION.to_string(),
			login_url: None,
			request_timeout: DEFAULT_REQUEST_TIMEOUT,
		}
	}

	#[must_use]
	pub fn with_environment(mut self, environment: Environment) -> Self {
		self.environment = environment;
		self
	}

	#[must_use]
	pub fn with_redirect_uri(mut self, redirect_uri: impl Into<String>) -> Self {
		self.redirect_uri = Some(redirect_uri.into());
		self
	}

	#[must_use]
	pub fn with_api_version(mut self, api_version: impl Into<String>) -> Self {
		self.api_version = api_version.into();
		self
	}

	#[must_use]
	pub fn with_login_url(mut self, login_url: impl Into<String>) -> Self {
		self.login_url = Some(login_url.into());
		self
	}

	#[must_use]
	pub const fn with_request_timeout(mut self, request_timeout: Duration) -> Self {
		self.request_timeout = request_timeout;
		self
	}

	#[must_use]
	pub fn login_url(&self) -> &str {
		self.login_url
			.as_deref()
			.unwrap_or_else(|| self.environment.login_url())
			.trim_end_matches('/')
	}
}
