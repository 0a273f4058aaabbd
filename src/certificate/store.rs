//! Certificate store lookups by thumbprint.
//!
//! A store is a directory of X.509 certificates in PEM (`.pem`, `.crt`) or DER (`.cer`, `.der`)
//! form. PEM files may hold several certificates. Entries that cannot be read or parsed are
//! skipped, since a store typically carries certificates unrelated to this service.

// std
use std::{
	fs,
	path::{Path, PathBuf},
};
// crates.io
use openssl::{hash::MessageDigest, x509::X509};
// self
use crate::{
	_prelude::*,
	certificate::{Certificate, CertificateFetcher},
	settings::StoreCertificate,
};

const STORE_EXTENSIONS: [&str; 4] = ["pem", "crt", "cer", "der"];

/// Finds a certificate in a store directory by SHA-1 thumbprint.
///
/// Store certificates carry no private key.
#[derive(Debug)]
pub struct StoreCertificateFetcher<'a> {
	descriptor: &'a StoreCertificate,
}
impl<'a> StoreCertificateFetcher<'a> {
	/// Create a fetcher for the given descriptor.
	pub fn new(descriptor: &'a StoreCertificate) -> Self {
		Self { descriptor }
	}
}
impl CertificateFetcher for StoreCertificateFetcher<'_> {
	#[tracing::instrument(
		skip(self),
		fields(store = %self.descriptor.store_path.display(), thumbprint = %self.descriptor.thumbprint)
	)]
	fn fetch(&self) -> Result<Certificate> {
		let wanted = &self.descriptor.thumbprint;

		for path in store_entries(&self.descriptor.store_path)? {
			let bytes = match fs::read(&path) {
				Ok(bytes) => bytes,
				Err(err) => {
					tracing::debug!(path = %path.display(), error = %err, "skipping unreadable store entry");

					continue;
				},
			};

			for x509 in parse_certificates(&bytes) {
				let digest = x509.digest(MessageDigest::sha1())?;

				if &*digest == wanted.as_bytes().as_slice() {
					tracing::debug!(path = %path.display(), "matched store certificate");

					return Certificate::from_x509(&x509, None);
				}
			}
		}

		Err(Error::CertificateLoad(format!(
			"No certificate with thumbprint {wanted} in store '{}'.",
			self.descriptor.store_path.display()
		)))
	}
}

fn store_entries(store_path: &Path) -> Result<Vec<PathBuf>> {
	let entries = fs::read_dir(store_path).map_err(|err| {
		Error::CertificateLoad(format!("Cannot open store '{}': {err}.", store_path.display()))
	})?;
	let mut paths = entries
		.filter_map(|entry| entry.ok().map(|entry| entry.path()))
		.filter(|path| {
			path.is_file()
				&& path
					.extension()
					.and_then(|ext| ext.to_str())
					.is_some_and(|ext| STORE_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
		})
		.collect::<Vec<_>>();

	// Directory order is unspecified; sorting keeps lookups deterministic.
	paths.sort();

	Ok(paths)
}

fn parse_certificates(bytes: &[u8]) -> Vec<X509> {
	if bytes.trim_ascii_start().starts_with(b"-----BEGIN") {
		X509::stack_from_pem(bytes).unwrap_or_default()
	} else {
		X509::from_der(bytes).map(|x509| vec![x509]).unwrap_or_default()
	}
}
