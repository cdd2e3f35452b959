//! Observability helpers: structured spans over request flows, plus the
//! counters/histograms/gauges from §4.J.
//!
//! # Feature Flags
//!
//! - Enable `tracing` to emit structured spans named `uitsmijter.flow` with
//!   the `flow` and `stage` fields.
//! - Enable `metrics` to increment/observe/set the named instruments below.

mod metrics;
mod tracing;

pub use metrics::*;
pub use tracing::*;

// self
use crate::_prelude::*;

/// Request flows observed by the controller.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FlowKind {
	/// `POST /login`.
	Login,
	/// `GET /authorize`.
	Authorize,
	/// `POST /token`.
	Token,
	/// `POST /token/refresh` (the refresh_token grant).
	Refresh,
	/// `GET /interceptor`.
	Interceptor,
	/// `GET|POST /logout`.
	Logout,
	/// A single provider script execution inside the sandbox.
	Sandbox,
}
impl FlowKind {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			FlowKind::Login => "login",
			FlowKind::Authorize => "authorize",
			FlowKind::Token => "token",
			FlowKind::Refresh => "refresh",
			FlowKind::Interceptor => "interceptor",
			FlowKind::Logout => "logout",
			FlowKind::Sandbox => "sandbox",
		}
	}
}
impl Display for FlowKind {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Outcome labels recorded for each attempt.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FlowOutcome {
	/// Entry to a flow handler.
	Attempt,
	/// Successful completion.
	Success,
	/// Failure propagated back to the caller.
	Failure,
}
impl FlowOutcome {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			FlowOutcome::Attempt => "attempt",
			FlowOutcome::Success => "success",
			FlowOutcome::Failure => "failure",
		}
	}
}
impl Display for FlowOutcome {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}
