//! Minimal Bayeux long-polling client, enough to hold one topic subscription.

use std::time::Duration;

use pb_org::OAuthToken;
use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, trace};

use super::Error;

pub const HANDSHAKE: &str = "/meta/handshake";
pub const SUBSCRIBE: &str = "/meta/subscribe";
pub const CONNECT: &str = "/meta/connect";
pub const DISCONNECT: &str = "/meta/disconnect";

const LONG_POLLING: &str = "long-polling";

/// The server's long poll hold time when it gives no advice.
const DEFAULT_SERVER_TIMEOUT: Duration = Duration::from_secs(110);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Reconnect {
	Retry,
	Handshake,
	None,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
pub struct Advice {
	#[serde(default)]
	pub reconnect: Option<Reconnect>,
	/// Milliseconds to wait before the next connect.
	#[serde(default)]
	pub interval: Option<u64>,
	/// Milliseconds the server may hold a connect open.
	#[serde(default)]
	pub timeout: Option<u64>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
	pub channel: String,
	#[serde(default)]
	pub client_id: Option<String>,
	#[serde(default)]
	pub successful: Option<bool>,
	#[serde(default)]
	pub error: Option<String>,
	#[serde(default)]
	pub advice: Option<Advice>,
	#[serde(default)]
	pub subscription: Option<String>,
	#[serde(default)]
	pub data: Option<Value>,
}

impl Message {
	#[must_use]
	pub fn is_meta(&self) -> bool {
		self.channel.starts_with("/meta/")
	}

	fn is_successful(&self) -> bool {
		self.successful.unwrap_or(false)
	}

	fn failure_reason(&self) -> String {
		self.error
			.clone()
			.unwrap_or_else(|| "no reason given".to_string())
	}
}

/// What one long poll brought back.
#[derive(Debug, Default)]
pub struct Delivery {
	/// Non-meta messages, in the order the server sent them.
	pub messages: Vec<Message>,
	/// Set when the server dropped this client, with its reason.
	pub rehandshake: Option<String>,
}

/// Long-polling transport bound to one org instance.
///
/// The underlying client, and with it the cookie jar the server uses for load balancer
/// affinity, lives as long as the transport; a new session token only replaces the
/// authorization header and endpoint.
pub struct BayeuxTransport {
	client: reqwest::Client,
	api_version: String,
	request_timeout: Duration,
	idle_timeout: Duration,
	token: Option<OAuthToken>,
	client_id: Option<String>,
	advice: Advice,
	next_id: u64,
}

impl BayeuxTransport {
	pub fn new(
		api_version: impl Into<String>,
		request_timeout: Duration,
		idle_timeout: Duration,
	) -> Result<Self, Error> {
		let client = reqwest::Client::builder()
			.cookie_store(true)
			.build()
			.map_err(Error::Transport)?;

		Ok(Self {
			client,
			api_version: api_version.into(),
			request_timeout,
			idle_timeout,
			token: None,
			client_id: None,
			advice: Advice::default(),
			next_id: 0,
		})
	}

	/// Swaps the session token, forgetting the previous handshake.
	pub fn set_token(&mut self, token: OAuthToken) {
		self.token = Some(token);
		self.client_id = None;
	}

	#[must_use]
	pub fn client_id(&self) -> Option<&str> {
		self.client_id.as_deref()
	}

	#[must_use]
	pub const fn advice(&self) -> Advice {
		self.advice
	}

	/// How long to wait before the next connect, as last advised by the server.
	#[must_use]
	pub fn retry_interval(&self) -> Option<Duration> {
		self.advice
			.interval
			.filter(|interval| *interval > 0)
			.map(Duration::from_millis)
	}

	fn poll_timeout(&self) -> Duration {
		self.advice
			.timeout
			.map_or(DEFAULT_SERVER_TIMEOUT, Duration::from_millis)
			+ self.idle_timeout
	}

	fn endpoint(&self) -> Result<String, Error> {
		let token = self.token.as_ref().ok_or(Error::NotAuthenticated)?;
		Ok(format!("{}/cometd/{}", token.instance_url(), self.api_version))
	}

	fn next_id(&mut self) -> String {
		self.next_id += 1;
		self.next_id.to_string()
	}

	/// `interval` and `timeout` stay in effect until the server changes them, `reconnect` only
	/// applies to the reply that carried it.
	fn update_advice(&mut self, messages: &[Message]) {
		let advice = messages.iter().find_map(|message| message.advice);

		self.advice.reconnect = advice.and_then(|advice| advice.reconnect);
		if let Some(advice) = advice {
			self.advice.interval = advice.interval.or(self.advice.interval);
			self.advice.timeout = advice.timeout.or(self.advice.timeout);
		}
	}

	fn forget_client(&mut self) {
		self.client_id = None;
		self.advice.reconnect = None;
	}

	async fn send(&self, body: Value, timeout: Duration) -> Result<Vec<Message>, Error> {
		let endpoint = self.endpoint()?;
		let token = self.token.as_ref().ok_or(Error::NotAuthenticated)?;

		trace!(%body, "bayeux out");

		let response = self
			.client
			.post(endpoint)
			.header("authorization", token.authorization_header())
			.timeout(timeout)
			.json(&body)
			.send()
			.await
			.map_err(|e| {
				if e.is_timeout() {
					Error::Timeout(timeout)
				} else {
					Error::Transport(e)
				}
			})?;

		match response.status() {
			status if status.is_success() => {}
			status @ (StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN) => {
				return Err(Error::Unauthorized(status));
			}
			status => return Err(Error::Status(status)),
		}

		let body = response.json::<Value>().await.map_err(|e| {
			if e.is_timeout() {
				Error::Timeout(timeout)
			} else {
				Error::Malformed(e.to_string())
			}
		})?;

		trace!(%body, "bayeux in");

		match body {
			Value::Array(_) => serde_json::from_value(body).map_err(|e| Error::Malformed(e.to_string())),
			Value::Object(_) => serde_json::from_value(body)
				.map(|message| vec![message])
				.map_err(|e| Error::Malformed(e.to_string())),
			other => Err(Error::Malformed(format!("expected message list, got {other}"))),
		}
	}

	fn reply<'m>(messages: &'m [Message], channel: &str) -> Result<&'m Message, Error> {
		messages
			.iter()
			.find(|message| message.channel == channel)
			.ok_or_else(|| Error::Malformed(format!("no reply on {channel}")))
	}

	pub async fn handshake(&mut self) -> Result<(), Error> {
		let id = self.next_id();
		let messages = self
			.send(
				json!([{
					"channel": HANDSHAKE,
					"version": "1.0",
					"minimumVersion": "1.0",
					"supportedConnectionTypes": [LONG_POLLING],
					"id": id,
				}]),
				self.request_timeout,
			)
			.await?;

		self.update_advice(&messages);

		let reply = Self::reply(&messages, HANDSHAKE)?;
		if !reply.is_successful() {
			return Err(Error::Handshake(reply.failure_reason()));
		}

		let client_id = reply
			.client_id
			.clone()
			.ok_or_else(|| Error::Handshake("reply carried no client id".to_string()))?;

		debug!(%client_id, "handshake complete");
		self.client_id = Some(client_id);
		self.advice.reconnect = None;

		Ok(())
	}

	pub async fn subscribe(&mut self, topic: &str) -> Result<(), Error> {
		let client_id = self.client_id.clone().ok_or(Error::NoClientId)?;
		let id = self.next_id();
		let messages = self
			.send(
				json!([{
					"channel": SUBSCRIBE,
					"clientId": client_id,
					"subscription": topic,
					"id": id,
				}]),
				self.request_timeout,
			)
			.await?;

		self.update_advice(&messages);

		let reply = Self::reply(&messages, SUBSCRIBE)?;
		if !reply.is_successful() {
			return Err(Error::Subscribe {
				topic: topic.to_string(),
				reason: reply.failure_reason(),
			});
		}

		Ok(())
	}

	/// Issues one long poll.
	///
	/// Data messages delivered with the poll are always returned, even when the same reply
	/// drops the client; [`Delivery::rehandshake`] then tells the caller to start over.
	pub async fn connect(&mut self) -> Result<Delivery, Error> {
		let client_id = self.client_id.clone().ok_or(Error::NoClientId)?;
		let id = self.next_id();
		let timeout = self.poll_timeout();
		let messages = self
			.send(
				json!([{
					"channel": CONNECT,
					"clientId": client_id,
					"connectionType": LONG_POLLING,
					"id": id,
				}]),
				timeout,
			)
			.await?;

		self.update_advice(&messages);

		let mut delivery = Delivery {
			messages: Vec::with_capacity(messages.len()),
			rehandshake: None,
		};
		let mut connect_reply = None;
		for message in messages {
			if message.channel == CONNECT {
				connect_reply = Some(message);
			} else if !message.is_meta() {
				delivery.messages.push(message);
			}
		}

		if let Some(reply) = connect_reply.filter(|reply| !reply.is_successful()) {
			delivery.rehandshake = Some(reply.failure_reason());
		} else if matches!(
			self.advice.reconnect,
			Some(Reconnect::Handshake | Reconnect::None)
		) {
			delivery.rehandshake = Some("server advised a new handshake".to_string());
		}

		if delivery.rehandshake.is_some() {
			self.forget_client();
		}

		Ok(delivery)
	}

	/// Best effort; the server expires the client on its own if this never arrives.
	pub async fn disconnect(&mut self) {
		let Some(client_id) = self.client_id.take() else {
			return;
		};
		let id = self.next_id();

		if let Err(e) = self
			.send(
				json!([{ "channel": DISCONNECT, "clientId": client_id, "id": id }]),
				self.request_timeout,
			)
			.await
		{
			debug!(error = %e, "disconnect not acknowledged");
		}
	}
}
