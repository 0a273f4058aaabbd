//! Server settings, client configuration, and load-time validation.
//!
//! Operators describe clients with [`ClientConfig`], which mirrors the configuration file and may
//! therefore name both certificate sources. Conversion into [`Client`] collapses the two optional
//! fields into a single [`CertificateSource`] and rejects the ambiguous case.

// std
use std::{
	fs, mem,
	path::{Path, PathBuf},
};
// crates.io
use secrecy::SecretString;
use serde::{Deserialize, Deserializer};
// self
use crate::{
	_prelude::*,
	certificate::CertificateSource,
	registry::{ClientRegistry, RegistryEntry},
	security::Thumbprint,
	ticket::{AuthenticationTicket, ClaimsIdentity},
};

/// Default token endpoint path.
pub const DEFAULT_TOKEN_ENDPOINT_PATH: &str = "/token";
/// Default access-token lifetime.
pub const DEFAULT_ACCESS_TOKEN_LIFETIME: Duration = Duration::from_secs(20 * 60);

/// Key-storage options applied when loading a PKCS#12 certificate.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
pub struct KeyStorageFlags {
	/// Keep the private key on the loaded [`Certificate`](crate::Certificate).
	///
	/// When unset the private key is dropped as soon as the public key has been extracted.
	#[serde(default)]
	pub exportable: bool,
}
impl KeyStorageFlags {
	/// Flags that retain the private key.
	pub fn exportable() -> Self {
		Self { exportable: true }
	}
}

/// PKCS#12 certificate stored on disk relative to a base directory.
#[derive(Clone, Debug, Deserialize)]
pub struct FileCertificate {
	/// Directory the relative path is resolved against.
	#[serde(default)]
	pub base_path: PathBuf,
	/// Path of the PKCS#12 file relative to `base_path`.
	pub relative_file_path: PathBuf,
	/// Password protecting the PKCS#12 container.
	pub password: SecretString,
	/// Key-storage options for the loaded key pair.
	#[serde(default)]
	pub key_storage: KeyStorageFlags,
}
impl FileCertificate {
	/// Describe a certificate at `base_path/relative_file_path`.
	pub fn new(
		base_path: impl Into<PathBuf>,
		relative_file_path: impl Into<PathBuf>,
		password: impl Into<SecretString>,
	) -> Self {
		Self {
			base_path: base_path.into(),
			relative_file_path: relative_file_path.into(),
			password: password.into(),
			key_storage: KeyStorageFlags::default(),
		}
	}

	/// Override the key-storage flags.
	pub fn with_key_storage(mut self, key_storage: KeyStorageFlags) -> Self {
		self.key_storage = key_storage;

		self
	}

	/// Absolute (or base-relative) location of the PKCS#12 file.
	pub fn path(&self) -> PathBuf {
		self.base_path.join(&self.relative_file_path)
	}
}

/// Certificate located in a certificate store by thumbprint.
#[derive(Clone, Debug, Deserialize)]
pub struct StoreCertificate {
	/// Directory holding the store's X.509 certificates.
	pub store_path: PathBuf,
	/// SHA-1 thumbprint of the certificate to use, written as hex in configuration.
	pub thumbprint: Thumbprint,
}
impl StoreCertificate {
	/// Describe a store lookup.
	pub fn new(store_path: impl Into<PathBuf>, thumbprint: Thumbprint) -> Self {
		Self { store_path: store_path.into(), thumbprint }
	}
}

/// Client entry as written in configuration.
#[derive(Clone, Debug, Deserialize)]
pub struct ClientConfig {
	/// Client identifier, used as the token audience.
	pub id: String,
	/// URL-safe Base64 encoded secret shared with the client.
	pub secret: SecretString,
	/// PKCS#12 certificate used to encrypt this client's tokens.
	#[serde(default)]
	pub relative_file_certificate: Option<FileCertificate>,
	/// Store certificate used to encrypt this client's tokens.
	#[serde(default)]
	pub store_certificate: Option<StoreCertificate>,
}

/// Validated client registration.
#[derive(Clone, Debug)]
pub struct Client {
	/// Client identifier, used as the token audience.
	pub id: String,
	/// URL-safe Base64 encoded secret shared with the client.
	pub secret: SecretString,
	/// Where the encryption certificate comes from, if any.
	pub certificate: CertificateSource,
}
impl Client {
	/// Register a client whose tokens are signed but not encrypted.
	pub fn new(id: impl Into<String>, secret: impl Into<SecretString>) -> Self {
		Self { id: id.into(), secret: secret.into(), certificate: CertificateSource::None }
	}

	/// Attach an encryption certificate source.
	pub fn with_certificate(mut self, certificate: CertificateSource) -> Self {
		self.certificate = certificate;

		self
	}
}
impl RegistryEntry for Client {
	fn id(&self) -> &str {
		&self.id
	}
}
impl TryFrom<ClientConfig> for Client {
	type Error = Error;

	fn try_from(config: ClientConfig) -> Result<Self> {
		let ClientConfig { id, secret, relative_file_certificate, store_certificate } = config;
		let certificate = match (relative_file_certificate, store_certificate) {
			(Some(_), Some(_)) => {
				return Err(Error::Configuration {
					client: id,
					reason: "Both a file certificate and a store certificate are configured; \
					         specify at most one."
						.into(),
				});
			},
			(Some(file), None) => CertificateSource::File(file),
			(None, Some(store)) => CertificateSource::Store(store),
			(None, None) => CertificateSource::None,
		};

		Ok(Self { id, secret, certificate })
	}
}

/// Server settings as written in configuration.
#[derive(Clone, Debug, Deserialize)]
pub struct ServerSettingsConfig {
	/// Issuer placed in the `iss` claim.
	#[serde(default)]
	pub issuer: Option<String>,
	/// Path the token endpoint is served from.
	#[serde(default = "default_token_endpoint_path")]
	pub token_endpoint_path: String,
	/// Lifetime of issued access tokens, as whole seconds or `{ "secs", "nanos" }`.
	#[serde(
		default = "default_access_token_lifetime",
		deserialize_with = "deserialize_lifetime"
	)]
	pub access_token_lifetime: Duration,
	/// Whether the token endpoint may be reached over plain HTTP.
	#[serde(default)]
	pub allow_insecure_http: bool,
	/// Clients allowed to request tokens, in priority order.
	#[serde(default)]
	pub allowed_clients: Vec<ClientConfig>,
}

/// Process-wide settings, immutable once loaded.
#[derive(Clone, Debug)]
pub struct ServerSettings {
	/// Issuer placed in the `iss` claim; the empty string is used when unset.
	pub issuer: Option<String>,
	/// Path the token endpoint is served from.
	pub token_endpoint_path: String,
	/// Lifetime of issued access tokens.
	pub access_token_lifetime: Duration,
	/// Whether the token endpoint may be reached over plain HTTP.
	pub allow_insecure_http: bool,
	clients: ClientRegistry<Client>,
}
impl ServerSettings {
	/// Settings with defaults and no registered clients.
	pub fn new() -> Self {
		Self {
			issuer: None,
			token_endpoint_path: DEFAULT_TOKEN_ENDPOINT_PATH.into(),
			access_token_lifetime: DEFAULT_ACCESS_TOKEN_LIFETIME,
			allow_insecure_http: false,
			clients: ClientRegistry::default(),
		}
	}

	/// Convert and validate a deserialized configuration.
	pub fn from_config(config: ServerSettingsConfig) -> Result<Self> {
		let ServerSettingsConfig {
			issuer,
			token_endpoint_path,
			access_token_lifetime,
			allow_insecure_http,
			allowed_clients,
		} = config;
		let clients = allowed_clients
			.into_iter()
			.map(Client::try_from)
			.collect::<Result<Vec<_>>>()?;
		let settings = Self {
			issuer,
			token_endpoint_path,
			access_token_lifetime,
			allow_insecure_http,
			clients: ClientRegistry::new(clients),
		};

		settings.validate()?;

		Ok(settings)
	}

	/// Parse settings from JSON text.
	pub fn from_json_str(json: &str) -> Result<Self> {
		Self::from_config(serde_json::from_str(json)?)
	}

	/// Read settings from a JSON file.
	pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
		let bytes = fs::read(path.as_ref())?;

		tracing::debug!(path = %path.as_ref().display(), "loading server settings");

		Self::from_config(serde_json::from_slice(&bytes)?)
	}

	/// Set the issuer.
	pub fn with_issuer(mut self, issuer: impl Into<String>) -> Self {
		self.issuer = Some(issuer.into());

		self
	}

	/// Set the access-token lifetime.
	pub fn with_access_token_lifetime(mut self, lifetime: Duration) -> Self {
		self.access_token_lifetime = lifetime;

		self
	}

	/// Allow or forbid plain-HTTP token requests.
	pub fn with_allow_insecure_http(mut self, allow: bool) -> Self {
		self.allow_insecure_http = allow;

		self
	}

	/// Append a client to the registry.
	pub fn with_client(mut self, client: Client) -> Self {
		let mut clients = mem::take(&mut self.clients).into_entries();

		clients.push(client);

		self.clients = ClientRegistry::new(clients);

		self
	}

	/// Registered clients.
	pub fn clients(&self) -> &ClientRegistry<Client> {
		&self.clients
	}

	/// Issuer value for the `iss` claim.
	pub fn issuer(&self) -> &str {
		self.issuer.as_deref().unwrap_or_default()
	}

	/// Build a ticket for `identity` addressed to `client_id`, valid from `issued_at` for the
	/// configured access-token lifetime.
	pub fn ticket_for(
		&self,
		identity: ClaimsIdentity,
		client_id: impl Into<String>,
		issued_at: DateTime<Utc>,
	) -> Result<AuthenticationTicket> {
		let expires_at = self.expiry_from(issued_at)?;

		Ok(AuthenticationTicket::new(identity)
			.with_audience(client_id)
			.with_issued_at(issued_at)
			.with_expires_at(expires_at))
	}

	fn expiry_from(&self, issued_at: DateTime<Utc>) -> Result<DateTime<Utc>> {
		TimeDelta::from_std(self.access_token_lifetime)
			.ok()
			.and_then(|lifetime| issued_at.checked_add_signed(lifetime))
			.ok_or_else(|| Error::Validation {
				field: "access_token_lifetime",
				reason: format!(
					"{:?} is out of range for timestamps issued at {issued_at}.",
					self.access_token_lifetime
				),
			})
	}

	/// Validate the settings against the documented constraints.
	pub fn validate(&self) -> Result<()> {
		if !self.token_endpoint_path.starts_with('/') {
			return Err(Error::Validation {
				field: "token_endpoint_path",
				reason: "Must start with '/'.".into(),
			});
		}
		if self.access_token_lifetime < Duration::from_secs(1) {
			return Err(Error::Validation {
				field: "access_token_lifetime",
				reason: "Must be at least 1 second.".into(),
			});
		}

		self.expiry_from(Utc::now())?;

		if let Some(issuer) = &self.issuer
			&& issuer.trim().len() != issuer.len()
		{
			return Err(Error::Validation {
				field: "issuer",
				reason: "Must not have leading or trailing whitespace.".into(),
			});
		}
		for client in self.clients.iter() {
			if client.id.trim().is_empty() {
				return Err(Error::Validation {
					field: "allowed_clients.id",
					reason: "Must not be blank.".into(),
				});
			}
		}

		Ok(())
	}
}
impl Default for ServerSettings {
	fn default() -> Self {
		Self::new()
	}
}

fn default_token_endpoint_path() -> String {
	DEFAULT_TOKEN_ENDPOINT_PATH.into()
}

fn default_access_token_lifetime() -> Duration {
	DEFAULT_ACCESS_TOKEN_LIFETIME
}

fn deserialize_lifetime<'de, D>(deserializer: D) -> std::result::Result<Duration, D::Error>
where
	D: Deserializer<'de>,
{
	#[derive(Deserialize)]
	#[serde(untagged)]
	enum Lifetime {
		Seconds(u64),
		Structured(Duration),
	}

	Ok(match Lifetime::deserialize(deserializer)? {
		Lifetime::Seconds(secs) => Duration::from_secs(secs),
		Lifetime::Structured(duration) => duration,
	})
}
