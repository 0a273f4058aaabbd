//! JWT access-token issuance for OAuth password grants, with per-client HS512 signing and optional
//! RSA-OAEP-256/A256GCM encryption bound to the client's certificate.

#![deny(clippy::all, missing_docs, unused_crate_dependencies)]

pub mod certificate;
pub mod grant;
pub mod jwe;
pub mod metrics;
pub mod security;
pub mod ticket;

mod error;
mod formatter;
mod registry;
mod settings;
mod _prelude {
	pub use std::{sync::Arc, time::Duration};

	pub use chrono::{DateTime, TimeDelta, Utc};

	pub use crate::{Error, Result};
}

#[cfg(feature = "prometheus")] pub use crate::metrics::install_default_exporter;
pub use crate::{
	certificate::{Certificate, CertificateFetcher, CertificateSource},
	error::{Error, ErrorKind, Result},
	formatter::{ResolvedClient, SecureDataFormat, TokenFormatter, TokenFormatterBuilder},
	registry::{ClientRegistry, RegistryEntry},
	settings::{
		Client, ClientConfig, FileCertificate, KeyStorageFlags, ServerSettings,
		ServerSettingsConfig, StoreCertificate,
	},
	ticket::{AuthenticationProperties, AuthenticationTicket, Claim, ClaimsIdentity},
};
