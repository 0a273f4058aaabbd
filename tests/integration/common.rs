//! Shared fixtures: generated certificates and a JWE reader.

// std
use std::{io::Read, path::Path};
// crates.io
use aes_gcm::{
	Aes256Gcm, Nonce,
	aead::{Aead, KeyInit, Payload},
};
use base64::prelude::*;
use flate2::read::DeflateDecoder;
use jwt_oauth_issuer::{
	CertificateFetcher, FileCertificate, KeyStorageFlags, certificate::file::FileCertificateFetcher,
};
use openssl::{
	asn1::Asn1Time,
	bn::BigNum,
	hash::MessageDigest,
	nid::Nid,
	pkcs12::Pkcs12,
	pkey::PKey,
	rsa::Rsa,
	x509::{X509, X509NameBuilder},
};
use rsa::{Oaep, RsaPrivateKey};
use serde_json::Value;
use sha2::Sha256;

pub const SECRET: &str = "JkgHgUR3npkGFrHOXOph1R_NBtp6GikiWv_CKNt_xXU";
pub const CLIENT_ID: &str = "valid_client_id";
pub const CERTIFICATE_FILE: &str = "TestCertificate.pfx";
pub const CERTIFICATE_PASSWORD: &str = "Test";

/// Write a fresh self-signed RSA certificate as a PKCS#12 file and a PEM file, returning the
/// lowercase hex SHA-1 thumbprint.
pub fn write_test_certificate(dir: &Path) -> String {
	let key = PKey::from_rsa(Rsa::generate(2048).expect("rsa key")).expect("pkey");
	let mut name = X509NameBuilder::new().expect("name builder");

	name.append_entry_by_nid(Nid::COMMONNAME, "TestCertificate").expect("common name");

	let name = name.build();
	let mut builder = X509::builder().expect("x509 builder");
	let serial = BigNum::from_u32(7).and_then(|n| n.to_asn1_integer()).expect("serial");

	builder.set_version(2).expect("version");
	builder.set_serial_number(&serial).expect("serial");
	builder.set_subject_name(&name).expect("subject");
	builder.set_issuer_name(&name).expect("issuer");
	builder.set_pubkey(&key).expect("public key");
	builder.set_not_before(&Asn1Time::days_from_now(0).expect("now")).expect("not before");
	builder.set_not_after(&Asn1Time::days_from_now(30).expect("later")).expect("not after");
	builder.sign(&key, MessageDigest::sha256()).expect("sign");

	let certificate = builder.build();
	let pfx = Pkcs12::builder()
		.name("TestCertificate")
		.pkey(&key)
		.cert(&certificate)
		.build2(CERTIFICATE_PASSWORD)
		.and_then(|pkcs12| pkcs12.to_der())
		.expect("pkcs12");

	std::fs::write(dir.join(CERTIFICATE_FILE), pfx).expect("write pfx");
	std::fs::write(dir.join("TestCertificate.pem"), certificate.to_pem().expect("pem"))
		.expect("write pem");

	hex::encode(certificate.digest(MessageDigest::sha1()).expect("digest"))
}

/// Exportable descriptor for the certificate written by [`write_test_certificate`].
pub fn file_certificate(dir: &Path) -> FileCertificate {
	FileCertificate::new(dir, CERTIFICATE_FILE, CERTIFICATE_PASSWORD)
		.with_key_storage(KeyStorageFlags::exportable())
}

/// Private key of the certificate written by [`write_test_certificate`].
pub fn private_key(dir: &Path) -> RsaPrivateKey {
	let descriptor = file_certificate(dir);
	let certificate = FileCertificateFetcher::new(&descriptor).fetch().expect("certificate");

	certificate.private_key().cloned().expect("exportable private key")
}

/// Decrypt a compact JWE produced for `private_key`, returning the inner token.
pub fn decrypt(token: &str, private_key: &RsaPrivateKey) -> String {
	let segments: Vec<&str> = token.split('.').collect();

	assert_eq!(segments.len(), 5, "expected a compact JWE");

	let decode = |segment: &str| BASE64_URL_SAFE_NO_PAD.decode(segment).expect("base64url");
	let cek = private_key.decrypt(Oaep::new::<Sha256>(), &decode(segments[1])).expect("unwrap");
	let mut sealed = decode(segments[3]);

	sealed.extend_from_slice(&decode(segments[4]));

	let compressed = Aes256Gcm::new_from_slice(&cek)
		.expect("key length")
		.decrypt(
			Nonce::from_slice(&decode(segments[2])),
			Payload { msg: &sealed, aad: segments[0].as_bytes() },
		)
		.expect("authentic ciphertext");
	let mut jwt = String::new();

	DeflateDecoder::new(compressed.as_slice()).read_to_string(&mut jwt).expect("inflate");

	jwt
}

/// Decode the JSON segment at `index` of a compact JWT.
pub fn segment(jwt: &str, index: usize) -> Value {
	let segments: Vec<&str> = jwt.split('.').collect();

	assert_eq!(segments.len(), 3, "expected a compact JWT");

	serde_json::from_slice(&BASE64_URL_SAFE_NO_PAD.decode(segments[index]).expect("base64url"))
		.expect("json")
}
