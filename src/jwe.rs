//! Compact JWE encryption (RFC 7516) with RSA-OAEP-256 key wrapping, A256GCM content
//! encryption, and DEFLATE compression.

// std
use std::io::Write;
// crates.io
use aes_gcm::{
	Aes256Gcm, Nonce,
	aead::{Aead, KeyInit, Payload},
};
use flate2::{Compression, write::DeflateEncoder};
use rand::RngCore;
use rsa::{Oaep, RsaPublicKey, rand_core::OsRng};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use zeroize::Zeroizing;
// self
use crate::{_prelude::*, security::b64url};

/// Key-management algorithm identifier.
pub const ALG_RSA_OAEP_256: &str = "RSA-OAEP-256";
/// Content-encryption algorithm identifier.
pub const ENC_A256GCM: &str = "A256GCM";
/// Compression algorithm identifier.
pub const ZIP_DEFLATE: &str = "DEF";

const CEK_LEN: usize = 32;
const IV_LEN: usize = 12;
const TAG_LEN: usize = 16;

/// JOSE protected header of the tokens this module produces.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct JweHeader {
	/// Key-management algorithm.
	pub alg: String,
	/// Content-encryption algorithm.
	pub enc: String,
	/// Compression applied to the plaintext before encryption.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub zip: Option<String>,
}
impl Default for JweHeader {
	fn default() -> Self {
		Self {
			alg: ALG_RSA_OAEP_256.into(),
			enc: ENC_A256GCM.into(),
			zip: Some(ZIP_DEFLATE.into()),
		}
	}
}

/// Encrypt `plaintext` for the holder of `public_key`.
///
/// Output is the five-segment compact serialization
/// `header.encrypted_key.iv.ciphertext.tag`, every segment unpadded Base64url.
pub fn encrypt_compact(plaintext: &[u8], public_key: &RsaPublicKey) -> Result<String> {
	let header = b64url(serde_json::to_vec(&JweHeader::default())?);
	let mut cek = Zeroizing::new([0u8; CEK_LEN]);
	let mut iv = [0u8; IV_LEN];
	let mut rng = rand::rng();

	rng.fill_bytes(&mut cek[..]);
	rng.fill_bytes(&mut iv);

	let encrypted_key = public_key.encrypt(&mut OsRng, Oaep::new::<Sha256>(), &cek[..])?;
	let compressed = Zeroizing::new(deflate(plaintext)?);
	let cipher = Aes256Gcm::new_from_slice(&cek[..])
		.map_err(|err| Error::Encryption(format!("Invalid content-encryption key: {err}.")))?;
	// The protected header, as encoded, is the additional authenticated data.
	let mut sealed = cipher
		.encrypt(Nonce::from_slice(&iv), Payload { msg: &compressed, aad: header.as_bytes() })
		.map_err(|err| Error::Encryption(format!("AES-256-GCM sealing failed: {err}.")))?;
	let tag = sealed.split_off(sealed.len() - TAG_LEN);

	Ok(format!(
		"{header}.{}.{}.{}.{}",
		b64url(encrypted_key),
		b64url(iv),
		b64url(&sealed),
		b64url(tag)
	))
}

fn deflate(bytes: &[u8]) -> Result<Vec<u8>> {
	let mut encoder = DeflateEncoder::new(Vec::with_capacity(bytes.len()), Compression::default());

	encoder
		.write_all(bytes)
		.and_then(|()| encoder.finish())
		.map_err(|err| Error::Encryption(format!("DEFLATE compression failed: {err}.")))
}
