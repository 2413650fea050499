use std::{future::Future, sync::Arc, time::Duration};

use async_channel as chan;
use async_trait::async_trait;
use futures_concurrency::future::Race;
use pb_org::OrgConnection;
use tokio::{sync::watch, time::sleep};
use tracing::{debug, error, info, instrument, warn, Instrument};

use super::{bayeux::BayeuxTransport, ChangeEvent, Error, Stopper};

pub const DEFAULT_TOPIC: &str = "/topic/CMC_Challenges";
pub const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(60);
pub const DEFAULT_RETRY_INTERVAL: Duration = Duration::from_secs(5);
pub const DEFAULT_QUEUE_CAPACITY: usize = 64;

/// Receives every change event, one at a time, in arrival order.
#[async_trait]
pub trait ChangeHandler: Send + Sync + 'static {
	async fn handle(&self, event: ChangeEvent);
}

#[async_trait]
impl<H: ChangeHandler> ChangeHandler for Arc<H> {
	async fn handle(&self, event: ChangeEvent) {
		(**self).handle(event).await;
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubscriptionState {
	Disconnected,
	Connecting,
	Connected,
	Error,
}

#[derive(Debug, Clone)]
pub struct SubscriberConfig {
	pub topic: String,
	/// Grace on top of the server's advised long poll time before the transport is considered
	/// down.
	pub idle_timeout: Duration,
	/// Pause between a transport failure and the next attempt.
	pub retry_interval: Duration,
	/// Events waiting for the handler before the long poll is held back.
	pub queue_capacity: usize,
}

impl Default for SubscriberConfig {
	fn default() -> Self {
		Self {
			topic: DEFAULT_TOPIC.to_string(),
			idle_timeout: DEFAULT_IDLE_TIMEOUT,
			retry_interval: DEFAULT_RETRY_INTERVAL,
			queue_capacity: DEFAULT_QUEUE_CAPACITY,
		}
	}
}

impl SubscriberConfig {
	#[must_use]
	pub fn with_topic(mut self, topic: impl Into<String>) -> Self {
		self.topic = topic.into();
		self
	}

	#[must_use]
	pub const fn with_idle_timeout(mut self, idle_timeout: Duration) -> Self {
		self.idle_timeout = idle_timeout;
		self
	}

	#[must_use]
	pub const fn with_retry_interval(mut self, retry_interval: Duration) -> Self {
		self.retry_interval = retry_interval;
		self
	}

	#[must_use]
	pub const fn with_queue_capacity(mut self, queue_capacity: usize) -> Self {
		self.queue_capacity = queue_capacity;
		self
	}
}

/// Holds the single topic subscription of the process.
///
/// Each cycle authenticates against the source org, hands the new token to the transport,
/// handshakes, subscribes and then long polls until the transport goes down. The next cycle
/// starts after `retry_interval`, reusing the same transport.
///
/// Events are handed to a worker task that runs the handler, so the long poll keeps going while
/// a change is being processed.
pub struct Subscriber<H> {
	connection: Arc<OrgConnection>,
	handler: Arc<H>,
	config: SubscriberConfig,
	transport: BayeuxTransport,
	state_tx: watch::Sender<SubscriptionState>,
}

enum RaceOutput<T> {
	Done(T),
	Stopped,
}

async fn until_stopped<T>(stop: &Stopper, fut: impl Future<Output = T>) -> Option<T> {
	match (async { RaceOutput::Done(fut.await) }, async {
		stop.await;
		RaceOutput::Stopped
	})
		.race()
		.await
	{
		RaceOutput::Done(out) => Some(out),
		RaceOutput::Stopped => None,
	}
}

impl<H: ChangeHandler> Subscriber<H> {
	pub fn new(
		connection: Arc<OrgConnection>,
		handler: H,
		config: SubscriberConfig,
	) -> Result<Self, Error> {
		let org_config = connection.config();
		let transport = BayeuxTransport::new(
			org_config.api_version.clone(),
			org_config.request_timeout,
			config.idle_timeout,
		)?;

		Ok(Self {
			connection,
			handler: Arc::new(handler),
			config,
			transport,
			state_tx: watch::channel(SubscriptionState::Disconnected).0,
		})
	}

	#[must_use]
	pub fn state(&self) -> watch::Receiver<SubscriptionState> {
		self.state_tx.subscribe()
	}

	fn set_state(&self, state: SubscriptionState) {
		let previous = self.state_tx.send_replace(state);
		if previous != state {
			debug!(?previous, current = ?state, "subscription state changed");
		}
	}

	/// Runs until `stop` fires. Never returns an error: failures are logged and retried on the
	/// next cycle. Events already queued are handled before this returns.
	#[instrument(skip_all, fields(topic = %self.config.topic))]
	pub async fn run(mut self, stop: Stopper) {
		info!("starting change stream subscriber");

		let (events_tx, events_rx) = chan::bounded(self.config.queue_capacity.max(1));
		let worker = tokio::spawn(deliver(Arc::clone(&self.handler), events_rx).in_current_span());

		while !stop.check_stop() {
			let Some(e) = until_stopped(&stop, self.cycle(&events_tx)).await else {
				break;
			};

			self.set_state(SubscriptionState::Error);

			if e.is_auth() {
				error!(error = %e, "re-authentication failed, subscription degraded");
			} else {
				warn!(error = %e, "transport down, will re-authenticate");
			}

			if until_stopped(&stop, sleep(self.config.retry_interval))
				.await
				.is_none()
			{
				break;
			}
		}

		self.transport.disconnect().await;

		events_tx.close();
		if let Err(e) = worker.await {
			error!("Change handler worker panicked: {e:#?}");
		}

		self.set_state(SubscriptionState::Disconnected);

		info!("change stream subscriber stopped");
	}

	/// One authenticate, handshake, subscribe and poll sequence. Only returns on failure.
	async fn cycle(&mut self, events: &chan::Sender<ChangeEvent>) -> Error {
		let token = match self.connection.authenticate().await {
			Ok(session) => session.into_token(),
			Err(e) => return e.into(),
		};

		self.transport.set_token(token);
		self.set_state(SubscriptionState::Connecting);

		if let Err(e) = self.transport.handshake().await {
			return e;
		}

		if let Err(e) = self.transport.subscribe(&self.config.topic).await {
			return e;
		}

		self.set_state(SubscriptionState::Connected);
		info!("upstream subscription is now active");

		loop {
			let delivery = match self.transport.connect().await {
				Ok(delivery) => delivery,
				Err(e) => return e,
			};

			for message in delivery.messages {
				if message.channel != self.config.topic {
					debug!(channel = %message.channel, "ignoring message on foreign channel");
					continue;
				}

				let Some(data) = message.data else {
					warn!("topic message without data");
					continue;
				};

				debug!(%data, "received upstream message");

				match ChangeEvent::from_payload(&data) {
					Ok(event) => {
						if let Err(e) = enqueue(events, event).await {
							return e;
						}
					}
					Err(e) => warn!(error = %e, "skipping malformed change message"),
				}
			}

			if let Some(reason) = delivery.rehandshake {
				return Error::Disconnected(reason);
			}

			if let Some(interval) = self.transport.retry_interval() {
				sleep(interval).await;
			}
		}
	}
}

async fn enqueue(events: &chan::Sender<ChangeEvent>, event: ChangeEvent) -> Result<(), Error> {
	match events.try_send(event) {
		Ok(()) => Ok(()),
		Err(chan::TrySendError::Full(event)) => {
			warn!("change handler is falling behind, holding the long poll");
			events.send(event).await.map_err(|_| Error::HandlerClosed)
		}
		Err(chan::TrySendError::Closed(_)) => Err(Error::HandlerClosed),
	}
}

async fn deliver<H: ChangeHandler>(handler: Arc<H>, events: chan::Receiver<ChangeEvent>) {
	while let Ok(event) = events.recv().await {
		handler.handle(event).await;
	}
}
