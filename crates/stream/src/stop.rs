use std::{
	future::{Future, IntoFuture},
	pin::Pin,
	task::{Context, Poll},
};

use async_channel as chan;
use tracing::debug;

/// Creates a linked stop handle and stopper.
#[must_use]
pub fn stop_channel() -> (StopHandle, Stopper) {
	let (tx, rx) = chan::bounded(1);
	(StopHandle(tx), Stopper(rx))
}

/// Asks a running subscriber to stop. Dropping the handle has the same effect.
#[derive(Debug, Clone)]
pub struct StopHandle(chan::Sender<()>);

impl StopHandle {
	pub fn stop(&self) {
		self.0.close();
	}
}

#[derive(Debug)]
pub struct Stopper(chan::Receiver<()>);

impl Stopper {
	#[must_use]
	pub fn check_stop(&self) -> bool {
		self.0.is_closed() || self.0.try_recv().is_ok()
	}
}

pin_project_lite::pin_project! {
	pub struct StopFuture<'recv> {
		#[pin]
		fut: chan::Recv<'recv, ()>,
	}
}

impl Future for StopFuture<'_> {
	type Output = ();

	fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
		let this = self.project();

		match this.fut.poll(cx) {
			Poll::Ready(res) => {
				if res.is_err() {
					debug!("stop channel closed");
				}
				Poll::Ready(())
			}
			Poll::Pending => Poll::Pending,
		}
	}
}

impl<'recv> IntoFuture for &'recv Stopper {
	type Output = ();
	type IntoFuture = StopFuture<'recv>;

	fn into_future(self) -> Self::IntoFuture {
		Self::IntoFuture { fut: self.0.recv() }
	}
}
