// self
use crate::{_prelude::*, exchange::ProviderCall, obs::FlowKind, tenant::TenantResolution};

/// Type alias that resolves to an instrumented future when tracing is enabled.
#[cfg(feature = "tracing")]
pub type InstrumentedFlow<F> = tracing::instrument::Instrumented<F>;
/// Passthrough future type when tracing is disabled.
#[cfg(not(feature = "tracing"))]
pub type InstrumentedFlow<F> = F;

/// A span builder used by login flows.
#[derive(Clone, Debug)]
pub struct FlowSpan {
	#[cfg(feature = "tracing")]
	span: tracing::Span,
}
impl FlowSpan {
	/// Creates a new span tagged with the provided flow kind + stage.
	pub fn new(kind: FlowKind, stage: &'static str) -> Self {
		#[cfg(feature = "tracing")]
		{
			let span = tracing::info_span!("login_broker.flow", flow = kind.as_str(), stage);

			Self { span }
		}
		#[cfg(not(feature = "tracing"))]
		{
			let _ = (kind, stage);

			Self {}
		}
	}

	/// Instruments an async block without holding a guard across `.await` points.
	pub fn instrument<Fut>(&self, fut: Fut) -> InstrumentedFlow<Fut>
	where
		Fut: Future,
	{
		#[cfg(feature = "tracing")]
		{
			use tracing::Instrument;

			fut.instrument(self.span.clone())
		}
		#[cfg(not(feature = "tracing"))]
		{
			fut
		}
	}
}

/// Emits a debug event when a login reaches `stage`.
pub fn record_stage(kind: FlowKind, stage: &'static str) {
	#[cfg(feature = "tracing")]
	{
		tracing::debug!(flow = kind.as_str(), stage, "Login stage reached.");
	}
	#[cfg(not(feature = "tracing"))]
	{
		let _ = (kind, stage);
	}
}

/// Emits an info event naming the resolved tenant. Ignored hints and default fallbacks are
/// called out so misconfigured clients show up in the logs.
pub fn record_resolution(tenant: &str, via: TenantResolution, hint_ignored: bool) {
	#[cfg(feature = "tracing")]
	{
		if hint_ignored {
			tracing::info!(tenant, via = via.as_str(), "Unknown tenant hint ignored.");
		} else if via == TenantResolution::Default {
			tracing::info!(tenant, via = via.as_str(), "Falling back to the default tenant.");
		} else {
			tracing::debug!(tenant, via = via.as_str(), "Tenant resolved.");
		}
	}
	#[cfg(not(feature = "tracing"))]
	{
		let _ = (tenant, via, hint_ignored);
	}
}

/// Emits a warn event for a failed login. `stage` is the last stage the attempt reached.
pub fn record_failure(kind: FlowKind, stage: Option<&'static str>, err: &Error) {
	#[cfg(feature = "tracing")]
	{
		tracing::warn!(
			flow = kind.as_str(),
			stage = stage.unwrap_or("none"),
			category = err.category().as_str(),
			error = %err,
			"Login attempt failed."
		);
	}
	#[cfg(not(feature = "tracing"))]
	{
		let _ = (kind, stage, err);
	}
}

/// Emits a warn event when an optional provider call degrades to a fallback value.
pub fn record_degraded(call: ProviderCall, err: &Error) {
	#[cfg(feature = "tracing")]
	{
		tracing::warn!(call = call.as_str(), error = %err, "Provider call degraded to fallback.");
	}
	#[cfg(not(feature = "tracing"))]
	{
		let _ = (call, err);
	}
}
