//!
//! # Change stream
//!
//! Keeps a long-lived subscription to one PushTopic on the source org and turns every message
//! published on it into a [`ChangeEvent`] for a [`ChangeHandler`].
//!
//! The transport is Bayeux long polling. Whenever it goes down (dropped connection, rejected
//! session, server asking for a new handshake) the [`Subscriber`] re-authenticates through its
//! [`pb_org::OrgConnection`], swaps the token on the existing transport and subscribes again.
//! Its [`SubscriptionState`] can be observed through [`Subscriber::state`].
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

pub mod bayeux;
mod error;
mod event;
mod stop;
mod subscriber;

pub use error::Error;
pub use event::{ChallengeMetadata, ChangeEvent};
pub use stop::{stop_channel, StopHandle, Stopper};
pub use subscriber::{
	ChangeHandler, Subscriber, SubscriberConfig, SubscriptionState, DEFAULT_IDLE_TIMEOUT,
	DEFAULT_QUEUE_CAPACITY, DEFAULT_RETRY_INTERVAL, DEFAULT_TOPIC,
};
