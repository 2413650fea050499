//!
//! # Reconciliation
//!
//! Turns every change pushed by the source org into two independent updates:
//!
//! - the **mirror** branch copies the challenge's status, submission count and descriptive fields
//!   onto the task it points at in the target org;
//! - the **propagation** branch follows the task's relationship chain in the target org down to
//!   its project number and writes that number back onto the source org challenge.
//!
//! Both branches authenticate right before they touch an org, run concurrently and report their
//! outcome through the [`Notifier`]. Failures are logged and reported, never retried.
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

pub mod lookup;
pub mod mirror;
pub mod notify;
pub mod propagate;
mod reconciler;

pub use lookup::Lookup;
pub use mirror::MirrorOutcome;
pub use notify::{Notification, Notifier};
pub use propagate::Propagation;
pub use reconciler::{ReconcileConfig, ReconcileReport, Reconciler};
