// self
use crate::{
	error::ErrorCategory,
	obs::{FlowKind, FlowOutcome},
};

/// Records a flow outcome via the global metrics recorder (when enabled).
pub fn record_flow_outcome(kind: FlowKind, outcome: FlowOutcome) {
	#[cfg(feature = "metrics")]
	{
		metrics::counter!(
			"login_broker_flow_total",
			"flow" => kind.as_str(),
			"outcome" => outcome.as_str()
		)
		.increment(1);
	}

	#[cfg(not(feature = "metrics"))]
	{
		let _ = (kind, outcome);
	}
}

/// Records a failed attempt by error category (when enabled).
pub fn record_failure_category(category: ErrorCategory) {
	#[cfg(feature = "metrics")]
	{
		metrics::counter!("login_broker_failure_total", "category" => category.as_str())
			.increment(1);
	}

	#[cfg(not(feature = "metrics"))]
	{
		let _ = category;
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn recorders_noop_without_metrics() {
		record_flow_outcome(FlowKind::CompleteLogin, FlowOutcome::Failure);
		record_failure_category(ErrorCategory::InvalidState);
	}
}
