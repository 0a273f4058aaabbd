//! Certificate sources and the fetchers that load them.
//!
//! A client either has no encryption certificate, a PKCS#12 file on disk, or a certificate held
//! in a store and addressed by thumbprint. Each source maps onto one [`CertificateFetcher`].

pub mod file;
pub mod store;

// std
use std::fmt::{Debug, Formatter, Result as FmtResult};
// crates.io
use openssl::{
	hash::MessageDigest,
	pkey::{PKeyRef, Private},
	x509::X509Ref,
};
use rsa::{
	RsaPrivateKey, RsaPublicKey,
	pkcs8::{DecodePrivateKey, DecodePublicKey},
};
use zeroize::Zeroizing;
// self
use crate::{
	_prelude::*,
	certificate::{file::FileCertificateFetcher, store::StoreCertificateFetcher},
	security::Thumbprint,
	settings::{FileCertificate, StoreCertificate},
};

/// Capability to load a certificate together with its key material.
pub trait CertificateFetcher {
	/// Load the certificate, failing with [`Error::CertificateLoad`].
	fn fetch(&self) -> Result<Certificate>;
}

/// Where a client's encryption certificate comes from.
#[derive(Clone, Debug, Default)]
pub enum CertificateSource {
	/// Tokens are signed but not encrypted.
	#[default]
	None,
	/// PKCS#12 container on disk.
	File(FileCertificate),
	/// Certificate store lookup by thumbprint.
	Store(StoreCertificate),
}
impl CertificateSource {
	/// Whether a certificate is configured.
	pub fn is_configured(&self) -> bool {
		!matches!(self, Self::None)
	}

	/// Fetcher for this source, or `None` when no certificate is configured.
	pub fn fetcher(&self) -> Option<Box<dyn CertificateFetcher + Send + Sync + '_>> {
		match self {
			Self::None => None,
			Self::File(descriptor) => Some(Box::new(FileCertificateFetcher::new(descriptor))),
			Self::Store(descriptor) => Some(Box::new(StoreCertificateFetcher::new(descriptor))),
		}
	}
}

/// Loaded X.509 certificate with its RSA key material.
pub struct Certificate {
	thumbprint: Thumbprint,
	subject: String,
	public_key: Option<RsaPublicKey>,
	private_key: Option<RsaPrivateKey>,
}
impl Certificate {
	pub(crate) fn from_x509(
		certificate: &X509Ref,
		private_key: Option<&PKeyRef<Private>>,
	) -> Result<Self> {
		let thumbprint = Thumbprint::from_digest(&certificate.digest(MessageDigest::sha1())?)?;
		let subject = certificate
			.subject_name()
			.entries()
			.filter_map(|entry| {
				let name = entry.object().nid().short_name().ok()?;
				let value = entry.data().as_utf8().ok()?;

				Some(format!("{name}={value}"))
			})
			.collect::<Vec<_>>()
			.join(", ");
		let spki = certificate.public_key()?.public_key_to_der()?;
		let public_key = RsaPublicKey::from_public_key_der(&spki).ok();

		if public_key.is_none() {
			tracing::debug!(%thumbprint, "certificate public key is not RSA");
		}

		let private_key = match private_key {
			Some(key) => {
				let pkcs8 = Zeroizing::new(key.private_key_to_pkcs8()?);

				RsaPrivateKey::from_pkcs8_der(&pkcs8).ok()
			},
			None => None,
		};

		Ok(Self { thumbprint, subject, public_key, private_key })
	}

	/// SHA-1 thumbprint of the DER certificate.
	pub fn thumbprint(&self) -> &Thumbprint {
		&self.thumbprint
	}

	/// Subject distinguished name, e.g. `CN=example`.
	pub fn subject(&self) -> &str {
		&self.subject
	}

	/// RSA public key, when the certificate carries one.
	pub fn public_key(&self) -> Option<&RsaPublicKey> {
		self.public_key.as_ref()
	}

	/// RSA private key, retained only for exportable PKCS#12 certificates.
	pub fn private_key(&self) -> Option<&RsaPrivateKey> {
		self.private_key.as_ref()
	}
}
impl Debug for Certificate {
	fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
		f.debug_struct("Certificate")
			.field("thumbprint", &self.thumbprint)
			.field("subject", &self.subject)
			.field("has_public_key", &self.public_key.is_some())
			.field("has_private_key", &self.private_key.is_some())
			.finish()
	}
}
