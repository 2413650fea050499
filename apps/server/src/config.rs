use std::{convert::Infallible, path::PathBuf, time::Duration};

use clap::{builder::FalseyValueParser, ArgAction, Parser};
use pb_org::{BackendId, Environment, OrgConfig};
use pb_stream::{SubscriberConfig, DEFAULT_TOPIC};
use pb_sync::ReconcileConfig;
use secstr::SecUtf8;

const OAUTH_CALLBACK_PATH: &str = "/oauth/_callback";

#[allow(clippy::unnecessary_wraps)]
fn secret(value: &str) -> Result<SecUtf8, Infallible> {
	Ok(SecUtf8::from(value.to_string()))
}

/// Keeps the challenge records of the source org and the task records of the target org in step.
#[derive(Debug, Parser)]
#[command(name = "pb-server", version)]
pub struct Config {
	#[arg(long, env = "PORT", default_value_t = 3001)]
	pub port: u16,

	/// Log every inbound message and the details of each org call.
	#[arg(long, env = "DEBUG", action = ArgAction::SetTrue, value_parser = FalseyValueParser::new())]
	pub debug: bool,

	#[arg(long, env = "ENVIRONMENT", default_value = "production")]
	pub environment: Environment,

	/// Base URL the OAuth callback path is appended to.
	#[arg(long, env = "CALLBACK_URL")]
	pub callback_url: Option<String>,

	#[arg(long, env = "PUSH_TOPIC", default_value = DEFAULT_TOPIC)]
	pub push_topic: String,

	#[arg(long, env = "API_VERSION", default_value = "24.0")]
	pub api_version: String,

	/// Login host override for both orgs.
	#[arg(long, env = "LOGIN_URL")]
	pub login_url: Option<String>,

	#[arg(long, env = "REQUEST_TIMEOUT_SECS", default_value_t = 30)]
	pub request_timeout_secs: u64,

	#[arg(long, env = "STREAM_IDLE_TIMEOUT_SECS", default_value_t = 60)]
	pub stream_idle_timeout_secs: u64,

	#[arg(long, env = "STREAM_RETRY_SECS", default_value_t = 5)]
	pub stream_retry_secs: u64,

	/// Skip mirroring challenge status onto target org tasks.
	#[arg(long, env = "DISABLE_MIRROR", action = ArgAction::SetTrue, value_parser = FalseyValueParser::new())]
	pub disable_mirror: bool,

	/// Skip writing project numbers back onto source org challenges.
	#[arg(long, env = "DISABLE_PROPAGATION", action = ArgAction::SetTrue, value_parser = FalseyValueParser::new())]
	pub disable_propagation: bool,

	#[arg(long, env = "PUBLIC_DIR", default_value = "public")]
	pub public_dir: PathBuf,

	#[arg(long, env = "CS_CLIENT_ID")]
	pub cs_client_id: String,
	#[arg(long, env = "CS_CLIENT_SECRET", hide_env_values = true, value_parser = secret)]
	pub cs_client_secret: SecUtf8,
	#[arg(long, env = "CS_USERNAME")]
	pub cs_username: String,
	#[arg(long, env = "CS_PASSWORD", hide_env_values = true, value_parser = secret)]
	pub cs_password: SecUtf8,

	#[arg(long, env = "CMC_CLIENT_ID")]
	pub cmc_client_id: String,
	#[arg(long, env = "CMC_CLIENT_SECRET", hide_env_values = true, value_parser = secret)]
	pub cmc_client_secret: SecUtf8,
	#[arg(long, env = "CMC_USERNAME")]
	pub cmc_username: String,
	#[arg(long, env = "CMC_PASSWORD", hide_env_values = true, value_parser = secret)]
	pub cmc_password: SecUtf8,
}

impl Config {
	pub fn org_config(&self, backend: BackendId) -> OrgConfig {
		let (client_id, client_secret, username, password) = match backend {
			BackendId::Source => (
				&self.cs_client_id,
				&self.cs_client_secret,
				&self.cs_username,
				&self.cs_password,
			),
			BackendId::Target => (
				&self.cmc_client_id,
				&self.cmc_client_secret,
				&self.cmc_username,
				&self.cmc_password,
			),
		};

		let mut config = OrgConfig::new(
			client_id.as_str(),
			client_secret.unsecure(),
			username.as_str(),
			password.unsecure(),
		)
		.with_environment(self.environment)
		.with_api_version(self.api_version.as_str())
		.with_request_timeout(Duration::from_secs(self.request_timeout_secs));

		if let Some(callback_url) = &self.callback_url {
			config = config.with_redirect_uri(format!(
				"{}{OAUTH_CALLBACK_PATH}",
				callback_url.trim_end_matches('/')
			));
		}

		if let Some(login_url) = &self.login_url {
			config = config.with_login_url(login_url.as_str());
		}

		config
	}

	pub fn subscriber_config(&self) -> SubscriberConfig {
		SubscriberConfig::default()
			.with_topic(self.push_topic.as_str())
			.with_idle_timeout(Duration::from_secs(self.stream_idle_timeout_secs))
			.with_retry_interval(Duration::from_secs(self.stream_retry_secs))
	}

	pub const fn reconcile_config(&self) -> ReconcileConfig {
		ReconcileConfig {
			mirror: !self.disable_mirror,
			propagate: !self.disable_propagation,
		}
	}
}
