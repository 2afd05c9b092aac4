//! Provider calls: authorize URL construction, code exchange, id token verification, and the
//! best-effort profile fetch.
//!
//! The token exchange goes through the `oauth2` client so the grant request, client
//! authentication, and error-body parsing follow RFC 6749. Verification and profile calls are
//! plain HTTP requests sent through the same [`ProviderHttpClient`] handle, so every provider
//! call shares one transport and one error mapper.

pub use oauth2;

// std
use std::borrow::Cow;
// crates.io
use oauth2::{
	AsyncHttpClient, AuthType, AuthUrl, AuthorizationCode, Client, ClientId, ClientSecret,
	CsrfToken, EndpointNotSet, EndpointSet, ExtraTokenFields, HttpClientError, HttpRequest,
	HttpResponse, RedirectUrl, RequestTokenError, Scope, StandardRevocableToken,
	StandardTokenResponse, TokenResponse, TokenUrl,
	basic::{
		BasicErrorResponse, BasicRequestTokenError, BasicRevocationErrorResponse,
		BasicTokenIntrospectionResponse, BasicTokenType,
	},
	http::{
		Method, Request,
		header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE},
	},
};
use url::form_urlencoded;
// self
use crate::{
	_prelude::*,
	auth::{Profile, ProviderTokens, Secret, VerifiedIdentityClaim},
	error::{ConfigError, UpstreamError},
	http::{ProviderHttpClient, ResponseMetadata, ResponseMetadataSlot},
	obs,
	provider::ProviderDescriptor,
	tenant::TenantCredential,
};

type LoginTokenResponse = StandardTokenResponse<IdTokenFields, BasicTokenType>;
type ConfiguredClient = Client<
	BasicErrorResponse,
	LoginTokenResponse,
	BasicTokenIntrospectionResponse,
	StandardRevocableToken,
	BasicRevocationErrorResponse,
	EndpointSet,
	EndpointNotSet,
	EndpointNotSet,
	EndpointNotSet,
	EndpointSet,
>;

/// Provider endpoint a request was addressed to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ProviderCall {
	/// Authorization code exchange.
	Token,
	/// Id token verification.
	Verify,
	/// Profile lookup.
	Profile,
}
impl ProviderCall {
	/// Returns a stable label suitable for log fields and error messages.
	pub const fn as_str(self) -> &'static str {
		match self {
			Self::Token => "token",
			Self::Verify => "verify",
			Self::Profile => "profile",
		}
	}
}
impl Display for ProviderCall {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Maps HTTP transport failures into login [`Error`] values.
pub trait TransportErrorMapper<E>
where
	Self: 'static + Send + Sync,
	E: 'static + Send + Sync + StdError,
{
	/// Converts an [`HttpClientError`] emitted by the transport into a login error.
	fn map_transport_error(
		&self,
		call: ProviderCall,
		metadata: Option<&ResponseMetadata>,
		error: HttpClientError<E>,
	) -> Error;
}

/// Default mapper for reqwest-backed transports.
#[cfg(feature = "reqwest")]
#[derive(Clone, Debug, Default)]
pub struct ReqwestTransportErrorMapper;
#[cfg(feature = "reqwest")]
impl TransportErrorMapper<ReqwestError> for ReqwestTransportErrorMapper {
	fn map_transport_error(
		&self,
		call: ProviderCall,
		meta: Option<&ResponseMetadata>,
		err: HttpClientError<ReqwestError>,
	) -> Error {
		match err {
			HttpClientError::Reqwest(inner) =>
				if inner.is_builder() {
					ConfigError::from(*inner).into()
				} else {
					UpstreamError::network(call, *inner).into()
				},
			HttpClientError::Http(inner) => ConfigError::from(inner).into(),
			HttpClientError::Io(inner) => UpstreamError::Io { call, source: inner }.into(),
			HttpClientError::Other(message) => UpstreamError::Other { call, message }.into(),
			_ => unknown_transport_error(call, meta),
		}
	}
}

/// Extra token-response fields carried by OpenID Connect providers.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct IdTokenFields {
	/// Identity token minted alongside the access token.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub id_token: Option<String>,
}
impl ExtraTokenFields for IdTokenFields {}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct VerifyResponse {
	error: Option<String>,
	error_description: Option<String>,
	iss: Option<String>,
	sub: Option<String>,
	aud: Option<String>,
	exp: Option<i64>,
}

/// Client for the provider's token, verify, and profile endpoints.
///
/// Tenant credentials are passed per call; the client itself only owns the provider descriptor
/// and the transport.
pub struct TokenExchangeClient<C, M>
where
	C: ?Sized + ProviderHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	descriptor: Arc<ProviderDescriptor>,
	http_client: Arc<C>,
	error_mapper: Arc<M>,
}
impl<C, M> TokenExchangeClient<C, M>
where
	C: ?Sized + ProviderHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	/// Creates a client for `descriptor` using the provided transport and error mapper.
	pub fn new(
		descriptor: ProviderDescriptor,
		http_client: impl Into<Arc<C>>,
		error_mapper: impl Into<Arc<M>>,
	) -> Self {
		Self {
			descriptor: Arc::new(descriptor),
			http_client: http_client.into(),
			error_mapper: error_mapper.into(),
		}
	}

	/// Provider descriptor shared by every call.
	pub fn descriptor(&self) -> &ProviderDescriptor {
		&self.descriptor
	}

	/// Builds the provider authorize URL for a minted state token.
	///
	/// The query carries `response_type=code`, `client_id`, `state`, `redirect_uri`, and the
	/// descriptor's scope.
	pub fn authorize_url(
		&self,
		credential: &TenantCredential,
		redirect_uri: &Url,
		state: &str,
	) -> Result<Url> {
		let redirect_url = RedirectUrl::new(redirect_uri.to_string())
			.map_err(|source| ConfigError::InvalidRedirect { source })?;
		let state = state.to_owned();
		let (url, _) = self
			.oauth_client(credential)?
			.set_redirect_uri(redirect_url)
			.authorize_url(move || CsrfToken::new(state))
			.add_scopes(self.descriptor.scope.split_whitespace().map(|s| Scope::new(s.to_owned())))
			.url();

		Ok(url)
	}

	/// Exchanges an authorization code for the provider's access token and id token.
	///
	/// OAuth error bodies, malformed responses, and responses without an id token fail with
	/// [`Error::TokenExchangeFailed`]; transport failures and server-side statuses fail with
	/// [`Error::UpstreamUnavailable`].
	pub async fn exchange_code(
		&self,
		code: &str,
		redirect_uri: &Url,
		credential: &TenantCredential,
	) -> Result<ProviderTokens> {
		let oauth_client = self.oauth_client(credential)?;
		let redirect_url = RedirectUrl::new(redirect_uri.to_string())
			.map_err(|source| ConfigError::InvalidRedirect { source })?;
		let meta = ResponseMetadataSlot::default();
		let instrumented = self.http_client.with_metadata(meta.clone());
		let response = oauth_client
			.exchange_code(AuthorizationCode::new(code.to_owned()))
			.set_redirect_uri(Cow::Owned(redirect_url))
			.request_async(&instrumented)
			.await
			.map_err(|err| map_token_error(meta.take(), err, self.error_mapper.as_ref()))?;
		let access_token = response.access_token().secret();

		if access_token.is_empty() {
			return Err(Error::TokenExchangeFailed {
				reason: "token endpoint returned an empty access token".into(),
			});
		}

		let id_token =
			response.extra_fields().id_token.as_deref().filter(|token| !token.is_empty()).ok_or_else(
				|| Error::TokenExchangeFailed {
					reason: "token endpoint response is missing id_token".into(),
				},
			)?;

		Ok(ProviderTokens {
			access_token: Secret::new(access_token.as_str()),
			id_token: Secret::new(id_token),
		})
	}

	/// Submits the id token to the provider's verification endpoint and checks the returned
	/// claims against the tenant's client id, the issuer allow-list, and the current time.
	pub async fn verify(
		&self,
		id_token: &Secret,
		credential: &TenantCredential,
	) -> Result<VerifiedIdentityClaim> {
		let body = form_urlencoded::Serializer::new(String::new())
			.append_pair("id_token", id_token.expose())
			.append_pair("client_id", &credential.client_id)
			.finish();
		let request = Request::builder()
			.method(Method::POST)
			.uri(self.descriptor.endpoints.verify.as_str())
			.header(CONTENT_TYPE, "application/x-www-form-urlencoded")
			.header(ACCEPT, "application/json")
			.body(body.into_bytes())
			.map_err(ConfigError::from)?;
		let response = self.send(ProviderCall::Verify, request).await?;
		let status = response.status();

		if status.is_server_error() {
			return Err(UpstreamError::Status { call: ProviderCall::Verify, status: status.as_u16() }
				.into());
		}

		let payload = parse_json::<VerifyResponse>(response.body()).map_err(|reason| {
			Error::InvalidIdToken { reason: format!("verify endpoint returned {reason}") }
		})?;

		if let Some(error) = payload.error.as_deref() {
			let reason = match payload.error_description.as_deref() {
				Some(description) => format!("provider rejected the id token: {error} ({description})"),
				None => format!("provider rejected the id token: {error}"),
			};

			return Err(Error::InvalidIdToken { reason });
		}
		if !status.is_success() {
			return Err(Error::InvalidIdToken {
				reason: format!("verify endpoint answered with HTTP {}", status.as_u16()),
			});
		}

		check_claims(payload, &credential.client_id, &self.descriptor, OffsetDateTime::now_utc())
	}

	/// Fetches display attributes for `access_token`.
	///
	/// Never fails: any transport error, non-success status, or malformed body degrades to an
	/// empty [`Profile`].
	pub async fn fetch_profile(&self, access_token: &Secret) -> Profile {
		match self.try_fetch_profile(access_token).await {
			Ok(profile) => profile,
			Err(err) => {
				obs::record_degraded(ProviderCall::Profile, &err);

				Profile::default()
			},
		}
	}

	async fn try_fetch_profile(&self, access_token: &Secret) -> Result<Profile> {
		let request = Request::builder()
			.method(Method::GET)
			.uri(self.descriptor.endpoints.profile.as_str())
			.header(AUTHORIZATION, format!("Bearer {}", access_token.expose()))
			.header(ACCEPT, "application/json")
			.body(Vec::new())
			.map_err(ConfigError::from)?;
		let response = self.send(ProviderCall::Profile, request).await?;
		let status = response.status();

		if !status.is_success() {
			return Err(
				UpstreamError::Status { call: ProviderCall::Profile, status: status.as_u16() }.into()
			);
		}

		parse_json(response.body())
			.map_err(|message| UpstreamError::Other { call: ProviderCall::Profile, message }.into())
	}

	async fn send(&self, call: ProviderCall, request: HttpRequest) -> Result<HttpResponse> {
		let meta = ResponseMetadataSlot::default();
		let handle = self.http_client.with_metadata(meta.clone());

		handle
			.call(request)
			.await
			.map_err(|err| self.error_mapper.map_transport_error(call, meta.take().as_ref(), err))
	}

	fn oauth_client(&self, credential: &TenantCredential) -> Result<ConfiguredClient> {
		let auth_url = AuthUrl::new(self.descriptor.endpoints.authorization.to_string())
			.map_err(|source| ConfigError::InvalidDescriptor { source })?;
		let token_url = TokenUrl::new(self.descriptor.endpoints.token.to_string())
			.map_err(|source| ConfigError::InvalidDescriptor { source })?;

		Ok(Client::new(ClientId::new(credential.client_id.clone()))
			.set_client_secret(ClientSecret::new(credential.client_secret.expose().to_owned()))
			.set_auth_uri(auth_url)
			.set_token_uri(token_url)
			.set_auth_type(AuthType::RequestBody))
	}
}
impl<C, M> Clone for TokenExchangeClient<C, M>
where
	C: ?Sized + ProviderHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	fn clone(&self) -> Self {
		Self {
			descriptor: self.descriptor.clone(),
			http_client: self.http_client.clone(),
			error_mapper: self.error_mapper.clone(),
		}
	}
}
impl<C, M> Debug for TokenExchangeClient<C, M>
where
	C: ?Sized + ProviderHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("TokenExchangeClient").field("provider", &self.descriptor.id).finish()
	}
}

/// Applies the local claim checks to a verification response.
fn check_claims(
	payload: VerifyResponse,
	client_id: &str,
	descriptor: &ProviderDescriptor,
	now: OffsetDateTime,
) -> Result<VerifiedIdentityClaim> {
	let reject = |reason: &str| Error::InvalidIdToken { reason: reason.to_owned() };
	let exp = payload.exp.ok_or_else(|| reject("claims are missing exp"))?;
	let expires_at =
		OffsetDateTime::from_unix_timestamp(exp).map_err(|_| reject("exp is out of range"))?;

	if expires_at <= now {
		return Err(reject("id token has expired"));
	}

	let audience = payload.aud.ok_or_else(|| reject("claims are missing aud"))?;

	if audience != client_id {
		return Err(reject("audience does not match the tenant client id"));
	}

	let issuer = payload.iss.ok_or_else(|| reject("claims are missing iss"))?;

	if !descriptor.accepts_issuer(&issuer) {
		return Err(reject("issuer is not on the allow-list"));
	}

	let subject =
		payload.sub.filter(|sub| !sub.is_empty()).ok_or_else(|| reject("claims are missing sub"))?;

	Ok(VerifiedIdentityClaim { subject, audience, issuer, expires_at })
}

fn parse_json<T>(body: &[u8]) -> Result<T, String>
where
	T: for<'de> Deserialize<'de>,
{
	let mut deserializer = serde_json::Deserializer::from_slice(body);

	serde_path_to_error::deserialize(&mut deserializer)
		.map_err(|e| format!("a malformed JSON body at `{}`: {}", e.path(), e.inner()))
}

fn map_token_error<E, M>(
	meta: Option<ResponseMetadata>,
	err: BasicRequestTokenError<HttpClientError<E>>,
	mapper: &M,
) -> Error
where
	E: 'static + Send + Sync + StdError,
	M: ?Sized + TransportErrorMapper<E>,
{
	let meta_ref = meta.as_ref();

	match (err, outage(meta_ref)) {
		(RequestTokenError::Request(error), _) =>
			mapper.map_transport_error(ProviderCall::Token, meta_ref, error),
		(_, Some(status)) => UpstreamError::Status { call: ProviderCall::Token, status }.into(),
		(RequestTokenError::ServerResponse(response), None) => {
			let reason = match response.error_description() {
				Some(description) => format!("{} ({description})", response.error().as_ref()),
				None => response.error().as_ref().to_owned(),
			};

			Error::TokenExchangeFailed { reason: format!("provider returned {reason}") }
		},
		(RequestTokenError::Parse(error, _body), None) => Error::TokenExchangeFailed {
			reason: format!("token response is malformed at `{}`: {}", error.path(), error.inner()),
		},
		(RequestTokenError::Other(message), None) =>
			Error::TokenExchangeFailed { reason: format!("unexpected token response: {message}") },
	}
}

#[cfg(feature = "reqwest")]
fn unknown_transport_error(call: ProviderCall, meta: Option<&ResponseMetadata>) -> Error {
	match meta.and_then(|value| value.status) {
		Some(status) => UpstreamError::Status { call, status }.into(),
		None => UpstreamError::Other { call, message: "unknown transport failure".into() }.into(),
	}
}

fn outage(meta: Option<&ResponseMetadata>) -> Option<u16> {
	meta.and_then(|value| value.status).filter(|status| *status >= 500)
}
