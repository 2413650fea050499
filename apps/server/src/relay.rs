use axum::{
	extract::{
		ws::{Message, WebSocket},
		State, WebSocketUpgrade,
	},
	response::Response,
};
use pb_sync::{Notification, Notifier};
use serde::Serialize;
use tokio::sync::broadcast::{self, error::RecvError};
use tracing::{debug, error, warn};

pub const RECORD_PROCESSED: &str = "record-processed";

#[derive(Serialize)]
struct RelayMessage<'a> {
	event: &'static str,
	#[serde(flatten)]
	notification: &'a Notification,
}

pub fn payload(notification: &Notification) -> Result<String, serde_json::Error> {
	serde_json::to_string(&RelayMessage {
		event: RECORD_PROCESSED,
		notification,
	})
}

pub async fn socket(ws: WebSocketUpgrade, State(notifier): State<Notifier>) -> Response {
	let notifications = notifier.subscribe();
	ws.on_upgrade(move |socket| relay(socket, notifications))
}

async fn relay(mut socket: WebSocket, mut notifications: broadcast::Receiver<Notification>) {
	debug!("observer connected");

	loop {
		tokio::select! {
			notification = notifications.recv() => {
				let notification = match notification {
					Ok(notification) => notification,
					Err(RecvError::Lagged(skipped)) => {
						warn!(%skipped, "observer fell behind, dropped notifications");
						continue;
					}
					Err(RecvError::Closed) => break,
				};

				let text = match payload(&notification) {
					Ok(text) => text,
					Err(e) => {
						error!("Failed to serialize notification: {e:#?}");
						continue;
					}
				};

				if socket.send(Message::Text(text)).await.is_err() {
					break;
				}
			}
			incoming = socket.recv() => {
				match incoming {
					Some(Ok(Message::Close(_)) | Err(_)) | None => break,
					Some(Ok(_)) => {}
				}
			}
		}
	}

	debug!("observer disconnected");
}
