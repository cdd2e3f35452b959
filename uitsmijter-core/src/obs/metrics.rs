//! Counters, histograms, and gauges from §4.J, recorded via the global
//! `metrics` recorder when the `metrics` feature is enabled.

// self
use crate::obs::{FlowKind, FlowOutcome};

/// Records a flow attempt/success/failure against the generic flow counter,
/// used by flows with no dedicated named counter below.
pub fn record_flow_outcome(kind: FlowKind, outcome: FlowOutcome) {
	#[cfg(feature = "metrics")]
	{
		metrics::counter!("uitsmijter_flow_total", "flow" => kind.as_str(), "outcome" => outcome.as_str())
			.increment(1);
	}

	#[cfg(not(feature = "metrics"))]
	{
		let _ = (kind, outcome);
	}
}

macro_rules! named_counter {
	($fn_name:ident, $metric:literal) => {
		/// Increments the `
		#[doc = $metric]
		/// ` counter.
		pub fn $fn_name() {
			#[cfg(feature = "metrics")]
			metrics::counter!($metric).increment(1);
		}
	};
}

named_counter!(login_success, "uitsmijter_login_success_total");
named_counter!(login_failure, "uitsmijter_login_failure_total");
named_counter!(logout, "uitsmijter_logout_total");
named_counter!(interceptor_success, "uitsmijter_interceptor_success_total");
named_counter!(interceptor_failure, "uitsmijter_interceptor_failure_total");
named_counter!(oauth_success, "uitsmijter_oauth_success_total");
named_counter!(oauth_failure, "uitsmijter_oauth_failure_total");
named_counter!(revoke_success, "uitsmijter_revoke_success_total");
named_counter!(revoke_failure, "uitsmijter_revoke_failure_total");

/// Records one login attempt's provider-trial count on the `login_attempts` histogram.
pub fn observe_login_attempts(count: usize) {
	#[cfg(feature = "metrics")]
	metrics::histogram!("uitsmijter_login_attempts").record(count as f64);
	#[cfg(not(feature = "metrics"))]
	let _ = count;
}

/// Records the number of scopes granted on one `/authorize` call on the `authorize_attempts` histogram.
pub fn observe_authorize_attempts(count: usize) {
	#[cfg(feature = "metrics")]
	metrics::histogram!("uitsmijter_authorize_attempts").record(count as f64);
	#[cfg(not(feature = "metrics"))]
	let _ = count;
}

/// Records the number of sessions currently stored on the `token_stored` histogram.
pub fn observe_token_stored(count: usize) {
	#[cfg(feature = "metrics")]
	metrics::histogram!("uitsmijter_token_stored").record(count as f64);
	#[cfg(not(feature = "metrics"))]
	let _ = count;
}

/// Sets the `tenants_count` gauge to the Entity Store's current tenant count.
pub fn set_tenants_count(count: usize) {
	#[cfg(feature = "metrics")]
	metrics::gauge!("uitsmijter_tenants_count").set(count as f64);
	#[cfg(not(feature = "metrics"))]
	let _ = count;
}

/// Sets the `clients_count` gauge to the Entity Store's current client count.
pub fn set_clients_count(count: usize) {
	#[cfg(feature = "metrics")]
	metrics::gauge!("uitsmijter_clients_count").set(count as f64);
	#[cfg(not(feature = "metrics"))]
	let _ = count;
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn instruments_are_callable_without_a_recorder_installed() {
		record_flow_outcome(FlowKind::Login, FlowOutcome::Attempt);
		login_success();
		login_failure();
		logout();
		observe_login_attempts(1);
		set_tenants_count(3);
		set_clients_count(7);
	}
}
