//! PKCS#12 certificates loaded from disk.

// std
use std::fs;
// crates.io
use openssl::pkcs12::Pkcs12;
use secrecy::ExposeSecret;
// self
use crate::{
	_prelude::*,
	certificate::{Certificate, CertificateFetcher},
	settings::FileCertificate,
};

/// Loads a password-protected PKCS#12 container from `base_path/relative_file_path`.
#[derive(Debug)]
pub struct FileCertificateFetcher<'a> {
	descriptor: &'a FileCertificate,
}
impl<'a> FileCertificateFetcher<'a> {
	/// Create a fetcher for the given descriptor.
	pub fn new(descriptor: &'a FileCertificate) -> Self {
		Self { descriptor }
	}
}
impl CertificateFetcher for FileCertificateFetcher<'_> {
	#[tracing::instrument(skip(self), fields(path = %self.descriptor.path().display()))]
	fn fetch(&self) -> Result<Certificate> {
		let path = self.descriptor.path();
		let password = self.descriptor.password.expose_secret();

		// OpenSSL takes the password as a C string.
		if password.contains('\0') {
			return Err(Error::CertificateLoad(format!(
				"Password for '{}' contains a NUL byte.",
				path.display()
			)));
		}

		let der = fs::read(&path).map_err(|err| {
			Error::CertificateLoad(format!("Cannot read '{}': {err}.", path.display()))
		})?;
		let parsed = Pkcs12::from_der(&der).and_then(|pkcs12| pkcs12.parse2(password)).map_err(
			|err| {
				Error::CertificateLoad(format!(
					"Cannot open PKCS#12 container '{}': {err}.",
					path.display()
				))
			},
		)?;
		let Some(x509) = parsed.cert else {
			return Err(Error::CertificateLoad(format!(
				"PKCS#12 container '{}' holds no certificate.",
				path.display()
			)));
		};
		let private_key =
			if self.descriptor.key_storage.exportable { parsed.pkey.as_deref() } else { None };
		let certificate = Certificate::from_x509(&x509, private_key)?;

		tracing::debug!(
			thumbprint = %certificate.thumbprint(),
			exportable = self.descriptor.key_storage.exportable,
			"loaded file certificate"
		);

		Ok(certificate)
	}
}
