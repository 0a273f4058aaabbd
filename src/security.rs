//! Security utilities covering client secret decoding and certificate thumbprints.
//!
//! # Secret Handling
//! Client secrets arrive as URL-safe Base64 text wrapped in [`SecretString`]. Decoded bytes are
//! moved straight into a [`SecretSlice`] so that they are zeroized once the caller has derived
//! its signing key. Nothing in this module logs secret material.

// std
use std::fmt::{Debug, Display, Formatter, Result as FmtResult};
// crates.io
use base64::{
	alphabet,
	engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig},
	prelude::*,
};
use secrecy::{ExposeSecret, SecretSlice, SecretString};
use serde::{Deserialize, Serialize};
use zeroize::Zeroizing;
// self
use crate::_prelude::*;

/// URL-safe Base64 engine that accepts both padded and unpadded input.
const BASE64_URL_SAFE_LENIENT: GeneralPurpose = GeneralPurpose::new(
	&alphabet::URL_SAFE,
	GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// SHA-1 thumbprint of a DER-encoded X.509 certificate.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Thumbprint {
	bytes: Arc<[u8; 20]>,
}
impl Thumbprint {
	/// Parse a hex thumbprint; upper and lower case digits are both accepted.
	pub fn from_hex(value: &str) -> Result<Self> {
		let decoded = hex::decode(value).map_err(|err| {
			Error::CertificateLoad(format!("Thumbprint '{value}' is not valid hex: {err}."))
		})?;
		let bytes = <[u8; 20]>::try_from(decoded.as_slice()).map_err(|_| {
			Error::CertificateLoad(format!(
				"Thumbprint '{value}' must decode to 20 bytes (SHA-1), got {}.",
				decoded.len()
			))
		})?;

		Ok(Self { bytes: Arc::new(bytes) })
	}

	/// Build a thumbprint from a raw SHA-1 digest.
	pub fn from_digest(digest: &[u8]) -> Result<Self> {
		let bytes = <[u8; 20]>::try_from(digest).map_err(|_| {
			Error::CertificateLoad(format!(
				"Certificate digest must be 20 bytes (SHA-1), got {}.",
				digest.len()
			))
		})?;

		Ok(Self { bytes: Arc::new(bytes) })
	}

	/// Raw thumbprint bytes.
	pub fn as_bytes(&self) -> &[u8; 20] {
		self.bytes.as_ref()
	}
}
impl Debug for Thumbprint {
	fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
		write!(f, "Thumbprint({self})")
	}
}
impl Display for Thumbprint {
	fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
		f.write_str(&hex::encode_upper(self.bytes.as_ref()))
	}
}
impl TryFrom<String> for Thumbprint {
	type Error = Error;

	fn try_from(value: String) -> Result<Self> {
		Self::from_hex(&value)
	}
}
impl From<Thumbprint> for String {
	fn from(value: Thumbprint) -> Self {
		value.to_string()
	}
}

/// Decode a client secret supplied as URL-safe Base64 text.
///
/// Padding is optional. The decoded key must not be empty.
pub fn decode_client_secret(client: &str, secret: &SecretString) -> Result<SecretSlice<u8>> {
	let decoded = Zeroizing::new(
		BASE64_URL_SAFE_LENIENT
			.decode(secret.expose_secret())
			.map_err(|source| Error::SecretFormat { client: client.to_owned(), source })?,
	);

	if decoded.is_empty() {
		return Err(Error::Configuration {
			client: client.to_owned(),
			reason: "Secret must decode to at least one byte.".into(),
		});
	}

	Ok(SecretSlice::from(decoded.to_vec()))
}

/// Encode bytes as unpadded URL-safe Base64, the encoding used by every JOSE segment.
pub fn b64url(bytes: impl AsRef<[u8]>) -> String {
	BASE64_URL_SAFE_NO_PAD.encode(bytes)
}
