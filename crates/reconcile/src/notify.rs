use serde::Serialize;
use tokio::sync::broadcast;
use tracing::trace;

pub const DEFAULT_CAPACITY: usize = 64;

/// Human readable outcome of processing a change, relayed to live observers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notification {
	#[serde(rename = "msg")]
	pub message: String,
}

/// Best-effort fan out of [`Notification`]s.
///
/// Publishing never blocks and never fails: with no observers the notification is dropped, and
/// observers that fall behind lose the oldest ones.
#[derive(Debug, Clone)]
pub struct Notifier {
	tx: broadcast::Sender<Notification>,
}

impl Default for Notifier {
	fn default() -> Self {
		Self::new(DEFAULT_CAPACITY)
	}
}

impl Notifier {
	#[must_use]
	pub fn new(capacity: usize) -> Self {
		Self {
			tx: broadcast::channel(capacity.max(1)).0,
		}
	}

	pub fn publish(&self, message: impl Into<String>) {
		let notification = Notification {
			message: message.into(),
		};

		if self.tx.send(notification).is_err() {
			trace!("no observers for notification");
		}
	}

	#[must_use]
	pub fn subscribe(&self) -> broadcast::Receiver<Notification> {
		self.tx.subscribe()
	}

	#[must_use]
	pub fn observer_count(&self) -> usize {
		self.tx.receiver_count()
	}
}
