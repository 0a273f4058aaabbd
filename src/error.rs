//! Crate-wide error types and `Result` alias.

/// Library-wide result type.
pub type Result<T> = std::result::Result<T, Error>;

/// Broad category of an [`Error`], used by callers to decide how to react.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ErrorKind {
	/// Misconfiguration detected while loading settings or building the formatter.
	///
	/// These must abort startup.
	Configuration,
	/// Per-request rejection the calling OAuth layer should translate into a protocol error.
	Domain,
	/// The operation is intentionally not provided.
	Unsupported,
	/// Failure inside an underlying cryptographic or encoding library.
	Internal,
}
impl ErrorKind {
	/// Stable lowercase label, suitable for metric labels.
	pub fn as_str(self) -> &'static str {
		match self {
			Self::Configuration => "configuration",
			Self::Domain => "domain",
			Self::Unsupported => "unsupported",
			Self::Internal => "internal",
		}
	}
}

/// Unified error type for the token issuer crate.
#[allow(missing_docs)]
#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error(transparent)]
	Io(#[from] std::io::Error),

	#[error(transparent)]
	Jsonwebtoken(#[from] jsonwebtoken::errors::Error),
	#[error(transparent)]
	OpenSsl(#[from] openssl::error::ErrorStack),
	#[error(transparent)]
	Rsa(#[from] rsa::Error),
	#[error(transparent)]
	Serde(#[from] serde_json::Error),

	#[error("Failed to load certificate: {0}")]
	CertificateLoad(String),
	#[error("Certificate for client '{client}' is unavailable: {reason}")]
	CertificateUnavailable { client: String, reason: String },
	#[error("Invalid configuration for client '{client}': {reason}")]
	Configuration { client: String, reason: String },
	#[error("Content encryption failed: {0}")]
	Encryption(String),
	#[error("Invalid grant: {0}")]
	InvalidGrant(String),
	#[cfg(feature = "prometheus")]
	#[error("Metrics exporter error: {0}")]
	Metrics(String),
	#[error("Authentication ticket does not specify an audience.")]
	MissingAudience,
	#[error("Secret for client '{client}' is not valid URL-safe Base64: {source}")]
	SecretFormat { client: String, source: base64::DecodeError },
	#[error("Security violation: {0}")]
	Security(String),
	#[error("Client '{client}' is not registered.")]
	UnknownClient { client: String },
	#[error("Operation '{operation}' is not supported.")]
	Unsupported { operation: &'static str },
	#[error("Validation failed for {field}: {reason}")]
	Validation { field: &'static str, reason: String },
}
impl Error {
	/// Classify the error.
	pub fn kind(&self) -> ErrorKind {
		match self {
			Self::Configuration { .. }
			| Self::SecretFormat { .. }
			| Self::CertificateLoad(_)
			| Self::Validation { .. }
			| Self::Serde(_)
			| Self::Io(_) => ErrorKind::Configuration,
			Self::MissingAudience
			| Self::UnknownClient { .. }
			| Self::CertificateUnavailable { .. }
			| Self::InvalidGrant(_)
			| Self::Security(_) => ErrorKind::Domain,
			Self::Unsupported { .. } => ErrorKind::Unsupported,
			Self::Jsonwebtoken(_) | Self::OpenSsl(_) | Self::Rsa(_) | Self::Encryption(_) =>
				ErrorKind::Internal,
			#[cfg(feature = "prometheus")]
			Self::Metrics(_) => ErrorKind::Internal,
		}
	}

	/// OAuth 2.0 error code (RFC 6749 §5.2) the token endpoint should report for this error.
	pub fn oauth_error(&self) -> &'static str {
		match self {
			Self::UnknownClient { .. } | Self::Validation { field: "client_id", .. } =>
				"invalid_client",
			Self::Validation { field: "grant_type", .. } => "unsupported_grant_type",
			Self::InvalidGrant(_) => "invalid_grant",
			Self::MissingAudience | Self::Security(_) | Self::Validation { .. } =>
				"invalid_request",
			_ => "server_error",
		}
	}
}
