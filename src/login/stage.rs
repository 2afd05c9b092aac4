//! Login state machine stages and per-attempt progress tracking.

// self
use crate::{
	_prelude::*,
	login::LoginMetrics,
	obs::{self, FlowKind, FlowOutcome},
};

/// Stages of a login, each a strict prerequisite for the next.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum LoginStage {
	/// Authorization state minted and authorize URL returned.
	Initiated,
	/// Authorization state atomically removed and validated.
	Consumed,
	/// Code exchanged for provider tokens.
	Exchanged,
	/// Id token verified and claims checked.
	Verified,
	/// Pseudonymous id derived and linkage merged.
	Linked,
	/// Session credential issued.
	Issued,
}
impl LoginStage {
	/// Returns a stable label suitable for span or log fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			Self::Initiated => "initiated",
			Self::Consumed => "consumed",
			Self::Exchanged => "exchanged",
			Self::Verified => "verified",
			Self::Linked => "linked",
			Self::Issued => "issued",
		}
	}
}
impl Display for LoginStage {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Tracks the furthest stage one attempt reached and reports its outcome.
#[derive(Debug)]
pub(crate) struct StageTracker {
	kind: FlowKind,
	reached: Option<LoginStage>,
}
impl StageTracker {
	pub(crate) fn start(kind: FlowKind, metrics: &LoginMetrics) -> Self {
		obs::record_flow_outcome(kind, FlowOutcome::Attempt);
		metrics.record_attempt();

		Self { kind, reached: None }
	}

	pub(crate) fn reach(&mut self, stage: LoginStage) {
		debug_assert!(self.reached < Some(stage), "Login stages must advance monotonically.");

		obs::record_stage(self.kind, stage.as_str());

		self.reached = Some(stage);
	}

	pub(crate) fn finish<T>(&self, result: &Result<T>, metrics: &LoginMetrics) {
		match result {
			Ok(_) => {
				obs::record_flow_outcome(self.kind, FlowOutcome::Success);
				metrics.record_success();
			},
			Err(err) => {
				obs::record_flow_outcome(self.kind, FlowOutcome::Failure);
				obs::record_failure_category(err.category());
				obs::record_failure(self.kind, self.reached.map(LoginStage::as_str), err);
				metrics.record_failure();
			},
		}
	}
}
