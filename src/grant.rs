//! Resource-owner password grant: credentials in, bearer access token out.
//!
//! [`PasswordGrant`] performs one token exchange. It checks the transport and the request shape,
//! asks the [`Authenticator`] to sign the user in, builds a ticket for the requesting client, and
//! hands it to the [`TokenFormatter`]. Routing and request parsing belong to the host server.

// std
use std::fmt::{Debug, Display, Formatter, Result as FmtResult};
// crates.io
use secrecy::SecretString;
use serde::Serialize;
// self
use crate::{
	_prelude::*,
	error::ErrorKind,
	formatter::TokenFormatter,
	settings::ServerSettings,
	ticket::ClaimsIdentity,
};

/// Authentication type stamped on credentials and issued identities.
pub const AUTHENTICATION_TYPE: &str = "JWT";
/// The only supported `grant_type`.
pub const GRANT_TYPE_PASSWORD: &str = "password";
/// `token_type` of every issued token.
pub const TOKEN_TYPE_BEARER: &str = "bearer";

/// Credentials supplied by the resource owner.
#[derive(Clone)]
pub struct Credentials {
	/// Authentication type the resulting identity should carry.
	pub authentication_type: String,
	/// User name as submitted.
	pub user_name: String,
	/// Password as submitted.
	pub password: SecretString,
}
impl Debug for Credentials {
	fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
		f.debug_struct("Credentials")
			.field("authentication_type", &self.authentication_type)
			.field("user_name", &self.user_name)
			.finish_non_exhaustive()
	}
}

/// Signs users in.
pub trait Authenticator {
	/// Error reported when sign-in cannot be completed.
	type Error: Display;

	/// Return the user's identity, or `None` when the credentials are rejected.
	fn sign_in(
		&self,
		credentials: &Credentials,
	) -> std::result::Result<Option<ClaimsIdentity>, Self::Error>;
}

/// Token request fields relevant to the password grant.
#[derive(Clone, Debug)]
pub struct PasswordGrantRequest {
	/// Requested grant type; must be `password`.
	pub grant_type: String,
	/// Requesting client.
	pub client_id: Option<String>,
	/// Resource owner's user name.
	pub user_name: String,
	/// Resource owner's password.
	pub password: SecretString,
	/// Whether the request arrived over a secure transport.
	pub secure_transport: bool,
}
impl PasswordGrantRequest {
	/// Request for `client_id` over a secure transport.
	pub fn new(
		client_id: impl Into<String>,
		user_name: impl Into<String>,
		password: impl Into<SecretString>,
	) -> Self {
		Self {
			grant_type: GRANT_TYPE_PASSWORD.into(),
			client_id: Some(client_id.into()),
			user_name: user_name.into(),
			password: password.into(),
			secure_transport: true,
		}
	}

	/// Mark whether the request arrived over a secure transport.
	pub fn with_secure_transport(mut self, secure: bool) -> Self {
		self.secure_transport = secure;

		self
	}
}

/// Successful token response body.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct TokenResponse {
	/// The issued access token.
	pub access_token: String,
	/// Always `bearer`.
	pub token_type: &'static str,
	/// Whole seconds until the token expires.
	pub expires_in: i64,
}

/// Error response body as defined by RFC 6749 §5.2.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ErrorResponse {
	/// OAuth error code.
	pub error: &'static str,
	/// Human-readable description.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub error_description: Option<String>,
}
impl From<&Error> for ErrorResponse {
	fn from(err: &Error) -> Self {
		let error_description = match err {
			Error::InvalidGrant(description) => Some(description.clone()),
			err if err.kind() == ErrorKind::Domain || err.kind() == ErrorKind::Unsupported =>
				Some(err.to_string()),
			// Configuration and library failures stay out of client-facing responses.
			_ => None,
		};

		Self { error: err.oauth_error(), error_description }
	}
}

/// Password-grant token exchange over a shared [`TokenFormatter`].
pub struct PasswordGrant<A> {
	settings: ServerSettings,
	formatter: TokenFormatter,
	authenticator: A,
}
impl<A> PasswordGrant<A>
where
	A: Authenticator,
{
	/// Validate the settings and build the formatter.
	pub fn new(settings: ServerSettings, authenticator: A) -> Result<Self> {
		let formatter = TokenFormatter::new(&settings)?;

		Ok(Self { settings, formatter, authenticator })
	}

	/// The underlying formatter.
	pub fn formatter(&self) -> &TokenFormatter {
		&self.formatter
	}

	/// Token endpoint path from the settings.
	pub fn token_endpoint_path(&self) -> &str {
		&self.settings.token_endpoint_path
	}

	/// Exchange credentials for an access token at the current time.
	pub fn exchange(&self, request: &PasswordGrantRequest) -> Result<TokenResponse> {
		self.exchange_at(request, Utc::now())
	}

	/// Exchange credentials for an access token issued at `issued_at`.
	#[tracing::instrument(
		skip_all,
		fields(client = request.client_id.as_deref().unwrap_or_default(), user = %request.user_name)
	)]
	pub fn exchange_at(
		&self,
		request: &PasswordGrantRequest,
		issued_at: DateTime<Utc>,
	) -> Result<TokenResponse> {
		if !request.secure_transport && !self.settings.allow_insecure_http {
			return Err(Error::Security("Token requests must use a secure transport.".into()));
		}
		if request.grant_type != GRANT_TYPE_PASSWORD {
			return Err(Error::Validation {
				field: "grant_type",
				reason: format!("Grant type '{}' is not supported.", request.grant_type),
			});
		}

		let client_id = match request.client_id.as_deref() {
			Some(client_id) if self.formatter.contains_client(client_id) => client_id,
			Some(client_id) => return Err(Error::UnknownClient { client: client_id.to_owned() }),
			None => {
				return Err(Error::Validation {
					field: "client_id",
					reason: "Must be supplied.".into(),
				});
			},
		};
		let credentials = Credentials {
			authentication_type: AUTHENTICATION_TYPE.into(),
			user_name: request.user_name.clone(),
			password: request.password.clone(),
		};
		let identity = match self.authenticator.sign_in(&credentials) {
			Ok(Some(identity)) => identity,
			Ok(None) => {
				tracing::debug!("authenticator rejected the credentials");

				return Err(Error::InvalidGrant("The user name or password is incorrect.".into()));
			},
			Err(err) => {
				tracing::warn!(error = %err, "authenticator failed");

				return Err(Error::InvalidGrant(err.to_string()));
			},
		};
		let ticket = self.settings.ticket_for(identity, client_id, issued_at)?;
		let access_token = self.formatter.protect(&ticket)?;
		let expires_in =
			ticket.remaining_lifetime(Utc::now()).map(|left| left.num_seconds()).unwrap_or_default();

		Ok(TokenResponse { access_token, token_type: TOKEN_TYPE_BEARER, expires_in })
	}
}
impl<A> Debug for PasswordGrant<A> {
	fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
		f.debug_struct("PasswordGrant")
			.field("settings", &self.settings)
			.field("formatter", &self.formatter)
			.finish_non_exhaustive()
	}
}
