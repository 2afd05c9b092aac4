//! Login error taxonomy, response categories, and the supporting error types.

// self
use crate::{_prelude::*, exchange::ProviderCall};

/// Crate-wide result type alias returning [`Error`] by default.
pub type Result<T, E = Error> = std::result::Result<T, E>;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Canonical login error exposed by public APIs.
///
/// The unit of failure is one login attempt; nothing here is fatal to the process and nothing
/// is retried by the broker.
#[derive(Debug, ThisError)]
pub enum Error {
	/// A required request parameter was absent or empty.
	#[error("Missing required parameter `{name}`.")]
	MissingParameter {
		/// Parameter name.
		name: &'static str,
	},
	/// The request origin, redirect URI, or return path is not allowed.
	#[error("Origin rejected: {reason}.")]
	InvalidOrigin {
		/// Broker-supplied reason string.
		reason: String,
	},
	/// The authorization state is absent, expired, already consumed, or mismatched.
	#[error("Authorization state rejected: {reason}.")]
	InvalidState {
		/// Broker-supplied reason string.
		reason: &'static str,
	},
	/// The provider did not turn the code into an access token and id token.
	#[error("Token exchange failed: {reason}.")]
	TokenExchangeFailed {
		/// Provider- or broker-supplied reason string.
		reason: String,
	},
	/// The id token failed provider verification or a local claim check.
	#[error("Identity token rejected: {reason}.")]
	InvalidIdToken {
		/// Provider- or broker-supplied reason string.
		reason: String,
	},
	/// The provider could not be reached or answered with a server failure.
	#[error(transparent)]
	UpstreamUnavailable(#[from] UpstreamError),
	/// A storage backend failed.
	#[error("{0}")]
	PersistenceFailure(
		#[from]
		#[source]
		crate::store::StoreError,
	),
	/// Local configuration problem.
	#[error(transparent)]
	Config(#[from] ConfigError),
}
impl Error {
	/// Stable category surfaced to callers.
	pub fn category(&self) -> ErrorCategory {
		match self {
			Self::MissingParameter { .. } => ErrorCategory::MissingParameter,
			Self::InvalidOrigin { .. } => ErrorCategory::InvalidOrigin,
			Self::InvalidState { .. } => ErrorCategory::InvalidState,
			Self::TokenExchangeFailed { .. } => ErrorCategory::TokenExchangeFailed,
			Self::InvalidIdToken { .. } => ErrorCategory::InvalidIdToken,
			Self::UpstreamUnavailable(_) => ErrorCategory::UpstreamUnavailable,
			Self::PersistenceFailure(_) => ErrorCategory::PersistenceFailure,
			Self::Config(_) => ErrorCategory::Internal,
		}
	}

	/// Builds the non-leaking payload returned to the client.
	pub fn to_response(&self) -> ErrorResponse {
		let category = self.category();

		ErrorResponse { error: category, message: category.public_message().into() }
	}
}

/// Response category for each error; one distinct code per taxonomy entry.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
	/// See [`Error::MissingParameter`].
	MissingParameter,
	/// See [`Error::InvalidOrigin`].
	InvalidOrigin,
	/// See [`Error::InvalidState`].
	InvalidState,
	/// See [`Error::TokenExchangeFailed`].
	TokenExchangeFailed,
	/// See [`Error::InvalidIdToken`].
	InvalidIdToken,
	/// See [`Error::UpstreamUnavailable`].
	UpstreamUnavailable,
	/// See [`Error::PersistenceFailure`].
	PersistenceFailure,
	/// Broker misconfiguration.
	Internal,
}
impl ErrorCategory {
	/// Returns a stable label suitable for logs, metrics, and response bodies.
	pub const fn as_str(self) -> &'static str {
		match self {
			Self::MissingParameter => "missing_parameter",
			Self::InvalidOrigin => "invalid_origin",
			Self::InvalidState => "invalid_state",
			Self::TokenExchangeFailed => "token_exchange_failed",
			Self::InvalidIdToken => "invalid_id_token",
			Self::UpstreamUnavailable => "upstream_unavailable",
			Self::PersistenceFailure => "persistence_failure",
			Self::Internal => "internal",
		}
	}

	/// HTTP status an HTTP surface should answer with.
	pub const fn http_status(self) -> u16 {
		match self {
			Self::MissingParameter => 400,
			Self::InvalidOrigin => 403,
			Self::InvalidState | Self::InvalidIdToken => 401,
			Self::TokenExchangeFailed => 502,
			Self::UpstreamUnavailable => 503,
			Self::PersistenceFailure | Self::Internal => 500,
		}
	}

	/// Generic message that reveals nothing about tokens, secrets, or internals.
	pub const fn public_message(self) -> &'static str {
		match self {
			Self::MissingParameter => "A required parameter is missing.",
			Self::InvalidOrigin => "The request origin is not allowed.",
			Self::InvalidState => "The login request is invalid or has expired.",
			Self::TokenExchangeFailed => "The identity provider did not complete the login.",
			Self::InvalidIdToken => "The identity could not be verified.",
			Self::UpstreamUnavailable => "The identity provider is unavailable.",
			Self::PersistenceFailure | Self::Internal => "Internal server error.",
		}
	}
}
impl Display for ErrorCategory {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Serializable error body returned to callers.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorResponse {
	/// Error category.
	pub error: ErrorCategory,
	/// Generic, non-leaking message.
	pub message: String,
}

/// Configuration and validation failures raised while assembling the broker.
#[derive(Debug, ThisError)]
pub enum ConfigError {
	/// HTTP client could not be constructed.
	#[error("HTTP client could not be constructed.")]
	HttpClientBuild {
		/// Underlying transport builder failure.
		#[source]
		source: BoxError,
	},
	/// HTTP request construction failed.
	#[error(transparent)]
	HttpRequest(#[from] oauth2::http::Error),
	/// A provider endpoint cannot be used by the OAuth client.
	#[error("Provider descriptor contains an invalid URL.")]
	InvalidDescriptor {
		/// Underlying parsing failure.
		#[source]
		source: oauth2::url::ParseError,
	},
	/// Redirect URI cannot be used by the OAuth client.
	#[error("Redirect URI is invalid.")]
	InvalidRedirect {
		/// Underlying parsing failure.
		#[source]
		source: oauth2::url::ParseError,
	},
	/// Provider descriptor failed validation.
	#[error(transparent)]
	Descriptor(#[from] crate::provider::ProviderDescriptorError),
	/// Configuration document could not be read.
	#[error("Configuration file {path} could not be read.")]
	Read {
		/// Path of the document.
		path: String,
		/// Underlying IO failure.
		#[source]
		source: std::io::Error,
	},
	/// Configuration document is malformed.
	#[error("Configuration is malformed.")]
	Parse {
		/// Structured parsing failure, including the failing path.
		#[source]
		source: serde_path_to_error::Error<serde_json::Error>,
	},
	/// Configuration failed a semantic check.
	#[error("Configuration is invalid: {reason}.")]
	Invalid {
		/// Human-readable reason.
		reason: String,
	},
	/// Hash parameters were rejected or hashing failed.
	#[error("Identity hashing failed: {message}.")]
	Hashing {
		/// Message reported by the hashing backend.
		message: String,
	},
	/// Session credential could not be signed.
	#[error("Session credential could not be signed.")]
	Signing(#[from] jsonwebtoken::errors::Error),
}
impl ConfigError {
	/// Wraps a transport's builder failure inside [`ConfigError`].
	pub fn http_client_build(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::HttpClientBuild { source: Box::new(src) }
	}

	/// Shorthand for [`ConfigError::Invalid`].
	pub fn invalid(reason: impl Into<String>) -> Self {
		Self::Invalid { reason: reason.into() }
	}
}
#[cfg(feature = "reqwest")]
impl From<ReqwestError> for ConfigError {
	fn from(e: ReqwestError) -> Self {
		Self::http_client_build(e)
	}
}

/// Failures reaching the provider (network, IO, or a server-side status).
#[derive(Debug, ThisError)]
pub enum UpstreamError {
	/// Underlying HTTP client reported a network failure.
	#[error("Network error occurred while calling the {call} endpoint.")]
	Network {
		/// Provider call that failed.
		call: ProviderCall,
		/// Transport-specific network error.
		#[source]
		source: BoxError,
	},
	/// Underlying IO failure surfaced during transport.
	#[error("I/O error occurred while calling the {call} endpoint.")]
	Io {
		/// Provider call that failed.
		call: ProviderCall,
		/// IO failure.
		#[source]
		source: std::io::Error,
	},
	/// Provider answered with a status that signals an outage.
	#[error("The {call} endpoint answered with HTTP {status}.")]
	Status {
		/// Provider call that failed.
		call: ProviderCall,
		/// HTTP status code.
		status: u16,
	},
	/// Transport failed without further detail.
	#[error("HTTP client error occurred while calling the {call} endpoint: {message}.")]
	Other {
		/// Provider call that failed.
		call: ProviderCall,
		/// Transport-supplied message.
		message: String,
	},
}
impl UpstreamError {
	/// Wraps a transport-specific network error.
	pub fn network(call: ProviderCall, src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::Network { call, source: Box::new(src) }
	}
}
