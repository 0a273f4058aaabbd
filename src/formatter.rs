//! Access-token formatter: resolves the requesting client, signs the ticket, and optionally
//! encrypts the result for the client's certificate.

// std
use std::fmt::{Debug, Formatter, Result as FmtResult};
// crates.io
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use rsa::RsaPublicKey;
use secrecy::ExposeSecret;
use serde::{Serialize, Serializer, ser::SerializeMap};
// self
use crate::{
	_prelude::*,
	certificate::{CertificateFetcher, CertificateSource},
	jwe,
	metrics::{self, ClientMetrics},
	registry::{ClientRegistry, RegistryEntry},
	security::decode_client_secret,
	settings::{Client, ServerSettings},
	ticket::{AuthenticationTicket, ClaimsIdentity},
};

/// Claim names owned by the token itself; identity claims with these names are dropped.
const RESERVED_CLAIMS: [&str; 5] = ["iss", "aud", "iat", "nbf", "exp"];

/// Two-way conversion between a value and its protected text form.
pub trait SecureDataFormat<T> {
	/// Serialize and protect `data`.
	fn protect(&self, data: &T) -> Result<String>;

	/// Recover the value from its protected text.
	fn unprotect(&self, protected_text: &str) -> Result<T>;
}

/// How a client's tokens are encrypted.
#[derive(Clone, Debug)]
enum EncryptionBinding {
	None,
	Cached(Arc<RsaPublicKey>),
	Refetch(CertificateSource),
}

/// Client validated at startup, holding decoded key material.
///
/// The HMAC key is built once from the decoded secret and lives as long as the client. The
/// decoded secret itself is zeroized as soon as the key exists, and signing never copies it.
pub struct ResolvedClient {
	id: String,
	signing_key: EncodingKey,
	encryption: EncryptionBinding,
	metrics: Arc<ClientMetrics>,
}
impl ResolvedClient {
	fn resolve(client: &Client, cache_certificates: bool) -> Result<Self> {
		let signing_key = {
			let secret = decode_client_secret(&client.id, &client.secret)?;

			EncodingKey::from_secret(secret.expose_secret())
		};
		let encryption = match client.certificate.fetcher() {
			None => EncryptionBinding::None,
			Some(fetcher) => {
				let public_key = load_public_key(&*fetcher).map_err(|err| Error::Configuration {
					client: client.id.clone(),
					reason: err.to_string(),
				})?;

				if cache_certificates {
					EncryptionBinding::Cached(Arc::new(public_key))
				} else {
					EncryptionBinding::Refetch(client.certificate.clone())
				}
			},
		};

		Ok(Self {
			id: client.id.clone(),
			signing_key,
			encryption,
			metrics: ClientMetrics::new(),
		})
	}

	/// Client identifier.
	pub fn id(&self) -> &str {
		&self.id
	}

	/// Whether tokens for this client are encrypted.
	pub fn is_encrypted(&self) -> bool {
		!matches!(self.encryption, EncryptionBinding::None)
	}

	/// Per-client issuance counters.
	pub fn metrics(&self) -> Arc<ClientMetrics> {
		self.metrics.clone()
	}

	fn sign(&self, issuer: &str, ticket: &AuthenticationTicket) -> Result<String> {
		let claims = TokenClaims {
			issuer,
			audience: &self.id,
			issued_at: ticket.properties.issued_at.map(|at| at.timestamp()),
			expires_at: ticket.properties.expires_at.map(|at| at.timestamp()),
			identity: &ticket.identity,
		};

		Ok(jsonwebtoken::encode(&Header::new(Algorithm::HS512), &claims, &self.signing_key)?)
	}

	fn seal(&self, jwt: String) -> Result<String> {
		match &self.encryption {
			EncryptionBinding::None => Ok(jwt),
			EncryptionBinding::Cached(public_key) =>
				jwe::encrypt_compact(jwt.as_bytes(), public_key),
			EncryptionBinding::Refetch(source) => {
				let public_key = source
					.fetcher()
					.ok_or_else(|| "No certificate source is configured.".to_owned())
					.and_then(|fetcher| load_public_key(&*fetcher).map_err(|err| err.to_string()))
					.map_err(|reason| Error::CertificateUnavailable {
						client: self.id.clone(),
						reason,
					})?;

				jwe::encrypt_compact(jwt.as_bytes(), &public_key)
			},
		}
	}
}
impl Debug for ResolvedClient {
	fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
		f.debug_struct("ResolvedClient")
			.field("id", &self.id)
			.field("encryption", &self.encryption)
			.field("metrics", &self.metrics)
			.finish_non_exhaustive()
	}
}
impl RegistryEntry for ResolvedClient {
	fn id(&self) -> &str {
		&self.id
	}
}

/// Builder for [`TokenFormatter`].
#[derive(Clone, Debug)]
pub struct TokenFormatterBuilder {
	settings: ServerSettings,
	cache_certificates: bool,
}
impl TokenFormatterBuilder {
	/// Start from the given settings; certificates are cached by default.
	pub fn new(settings: ServerSettings) -> Self {
		Self { settings, cache_certificates: true }
	}

	/// Keep certificate public keys for the life of the formatter (`true`), or load them again on
	/// every encrypted request (`false`).
	///
	/// Certificates are loaded once during [`build`](Self::build) either way, so a broken
	/// certificate still fails startup.
	pub fn cache_certificates(mut self, enabled: bool) -> Self {
		self.cache_certificates = enabled;

		self
	}

	/// Validate every client and build the formatter.
	pub fn build(self) -> Result<TokenFormatter> {
		let Self { settings, cache_certificates } = self;

		settings.validate()?;

		let clients = settings
			.clients()
			.iter()
			.map(|client| ResolvedClient::resolve(client, cache_certificates))
			.collect::<Result<Vec<_>>>()?;
		let clients = ClientRegistry::new(clients);

		if let Some(&id) = clients.duplicate_ids().first() {
			return Err(Error::Configuration {
				client: id.to_owned(),
				reason: "Client id is registered more than once.".into(),
			});
		}

		tracing::info!(
			clients = clients.len(),
			encrypted = clients.iter().filter(|client| client.is_encrypted()).count(),
			cache_certificates,
			"token formatter ready"
		);

		Ok(TokenFormatter { issuer: settings.issuer().to_owned(), clients })
	}
}

/// Formats authentication tickets as signed, and optionally encrypted, JWT access tokens.
///
/// All validation happens at construction. [`protect`](Self::protect) only looks up the client
/// and runs the cryptography, so a single formatter can be shared across threads.
#[derive(Debug)]
pub struct TokenFormatter {
	issuer: String,
	clients: ClientRegistry<ResolvedClient>,
}
impl TokenFormatter {
	/// Build a formatter with default options.
	pub fn new(settings: &ServerSettings) -> Result<Self> {
		Self::builder(settings.clone()).build()
	}

	/// Start a [`TokenFormatterBuilder`].
	pub fn builder(settings: ServerSettings) -> TokenFormatterBuilder {
		TokenFormatterBuilder::new(settings)
	}

	/// Issuer written to the `iss` claim.
	pub fn issuer(&self) -> &str {
		&self.issuer
	}

	/// Whether a client id is registered.
	pub fn contains_client(&self, client_id: &str) -> bool {
		self.clients.find(client_id).is_some()
	}

	/// Resolved client by id.
	pub fn client(&self, client_id: &str) -> Option<&ResolvedClient> {
		self.clients.find(client_id)
	}

	/// Issue an access token for `ticket`.
	///
	/// The ticket's `audience` property selects the client whose secret signs the token (HS512).
	/// When that client has a certificate, the signed token is wrapped in a compact JWE.
	#[tracing::instrument(
		skip_all,
		fields(client = tracing::field::Empty, encrypted = tracing::field::Empty)
	)]
	pub fn protect(&self, ticket: &AuthenticationTicket) -> Result<String> {
		let Some(audience) = ticket.properties.audience().filter(|value| !value.trim().is_empty())
		else {
			tracing::warn!("ticket has no audience");
			metrics::record_token_failure(None, &Error::MissingAudience);

			return Err(Error::MissingAudience);
		};

		tracing::Span::current().record("client", audience);

		let Some(client) = self.clients.find(audience) else {
			let err = Error::UnknownClient { client: audience.to_owned() };

			tracing::warn!("ticket audience is not a registered client");
			metrics::record_token_failure(None, &err);

			return Err(err);
		};
		let encrypted = client.is_encrypted();

		tracing::Span::current().record("encrypted", encrypted);

		match client.sign(&self.issuer, ticket).and_then(|jwt| client.seal(jwt)) {
			Ok(token) => {
				client.metrics.record_issued(encrypted);
				metrics::record_token_issued(&client.id, encrypted);
				tracing::debug!("issued access token");

				Ok(token)
			},
			Err(err) => {
				client.metrics.record_failure();
				metrics::record_token_failure(Some(&client.id), &err);
				tracing::warn!(error = %err, "failed to issue access token");

				Err(err)
			},
		}
	}

	/// Always fails: access tokens are consumed by resource servers, never read back here.
	pub fn unprotect(&self, _protected_text: &str) -> Result<AuthenticationTicket> {
		Err(Error::Unsupported { operation: "unprotect" })
	}
}
impl SecureDataFormat<AuthenticationTicket> for TokenFormatter {
	fn protect(&self, data: &AuthenticationTicket) -> Result<String> {
		TokenFormatter::protect(self, data)
	}

	fn unprotect(&self, protected_text: &str) -> Result<AuthenticationTicket> {
		TokenFormatter::unprotect(self, protected_text)
	}
}

struct TokenClaims<'a> {
	issuer: &'a str,
	audience: &'a str,
	issued_at: Option<i64>,
	expires_at: Option<i64>,
	identity: &'a ClaimsIdentity,
}
impl Serialize for TokenClaims<'_> {
	fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
	where
		S: Serializer,
	{
		let identity_claims = group_claims(self.identity);
		let mut map = serializer.serialize_map(None)?;

		map.serialize_entry("iss", self.issuer)?;
		map.serialize_entry("aud", self.audience)?;

		if let Some(issued_at) = self.issued_at {
			map.serialize_entry("iat", &issued_at)?;
			map.serialize_entry("nbf", &issued_at)?;
		}
		if let Some(expires_at) = self.expires_at {
			map.serialize_entry("exp", &expires_at)?;
		}

		for (claim_type, values) in identity_claims {
			match values.as_slice() {
				[value] => map.serialize_entry(claim_type, value)?,
				values => map.serialize_entry(claim_type, values)?,
			}
		}

		map.end()
	}
}

/// Group claim values by type in first-seen order, skipping reserved names.
fn group_claims(identity: &ClaimsIdentity) -> Vec<(&str, Vec<&str>)> {
	let mut grouped: Vec<(&str, Vec<&str>)> = Vec::new();

	for claim in identity.claims() {
		let claim_type = claim.claim_type.as_str();

		if RESERVED_CLAIMS.contains(&claim_type) {
			continue;
		}

		match grouped.iter_mut().find(|(existing, _)| *existing == claim_type) {
			Some((_, values)) => values.push(claim.value.as_str()),
			None => grouped.push((claim_type, vec![claim.value.as_str()])),
		}
	}

	grouped
}

fn load_public_key(fetcher: &(dyn CertificateFetcher + Send + Sync)) -> Result<RsaPublicKey> {
	let certificate = fetcher.fetch()?;

	certificate.public_key().cloned().ok_or_else(|| {
		Error::CertificateLoad(format!(
			"Certificate {} does not carry an RSA public key.",
			certificate.thumbprint()
		))
	})
}
