//! Token issuance from JSON settings through to decrypted tokens.

// std
use std::fs;
// crates.io
use chrono::{TimeDelta, Utc};
use jwt_oauth_issuer::{
	AuthenticationTicket, CertificateSource, ClaimsIdentity, Client, Error, ErrorKind, Result,
	SecureDataFormat, ServerSettings, StoreCertificate, TokenFormatter, security::Thumbprint,
};
use tempfile::TempDir;
// self
use crate::common::{self, CLIENT_ID, SECRET};

fn ticket() -> AuthenticationTicket {
	let identity = ClaimsIdentity::new("JWT")
		.with_claim("sub", "testuser@mydomain.com")
		.with_claim("role", "reader");

	AuthenticationTicket::new(identity).with_audience(CLIENT_ID)
}

#[test]
fn json_configured_file_certificate_encrypts_tokens() -> Result<()> {
	let _ = tracing_subscriber::fmt::try_init();
	let dir = TempDir::new()?;

	common::write_test_certificate(dir.path());

	let settings_path = dir.path().join("settings.json");

	fs::write(
		&settings_path,
		serde_json::json!({
			"issuer": "https://issuer.example",
			"access_token_lifetime": { "secs": 22, "nanos": 0 },
			"allowed_clients": [{
				"id": CLIENT_ID,
				"secret": SECRET,
				"relative_file_certificate": {
					"base_path": dir.path(),
					"relative_file_path": common::CERTIFICATE_FILE,
					"password": common::CERTIFICATE_PASSWORD,
				},
			}],
		})
		.to_string(),
	)?;

	let settings = ServerSettings::from_json_file(&settings_path)?;
	let formatter = TokenFormatter::new(&settings)?;
	let issued = Utc::now();
	let identity = ClaimsIdentity::new("JWT").with_claim("sub", "u");
	let token = formatter.protect(&settings.ticket_for(identity, CLIENT_ID, issued)?)?;
	let jwt = common::decrypt(&token, &common::private_key(dir.path()));
	let header = common::segment(&jwt, 0);
	let payload = common::segment(&jwt, 1);
	let delta = payload["exp"].as_i64().unwrap_or_default() - issued.timestamp();

	assert_eq!(header["alg"], "HS512");
	assert_eq!(payload["aud"], CLIENT_ID);
	assert_eq!(payload["iss"], "https://issuer.example");
	assert_eq!(payload["sub"], "u");
	assert!((21..=22).contains(&delta), "unexpected expiry delta {delta}");

	Ok(())
}

#[test]
fn store_and_file_certificates_produce_equivalent_tokens() -> Result<()> {
	let dir = TempDir::new()?;
	let thumbprint = common::write_test_certificate(dir.path());
	let thumbprint = Thumbprint::from_hex(&thumbprint.to_uppercase())?;
	let store = StoreCertificate::new(dir.path(), thumbprint);
	let settings = ServerSettings::new()
		.with_client(
			Client::new(CLIENT_ID, SECRET)
				.with_certificate(CertificateSource::File(common::file_certificate(dir.path()))),
		)
		.with_client(
			Client::new("store_client", SECRET).with_certificate(CertificateSource::Store(store)),
		);
	let formatter = TokenFormatter::new(&settings)?;
	let private_key = common::private_key(dir.path());

	for client in [CLIENT_ID, "store_client"] {
		let token = formatter.protect(&ticket().with_audience(client))?;
		let payload = common::segment(&common::decrypt(&token, &private_key), 1);

		assert_eq!(payload["aud"], client);
		assert_eq!(payload["role"], "reader");
	}

	Ok(())
}

#[test]
fn plain_clients_and_encrypted_clients_coexist() -> Result<()> {
	let dir = TempDir::new()?;

	common::write_test_certificate(dir.path());

	let settings = ServerSettings::new()
		.with_client(Client::new("plain", SECRET))
		.with_client(
			Client::new(CLIENT_ID, SECRET)
				.with_certificate(CertificateSource::File(common::file_certificate(dir.path()))),
		);
	let formatter = TokenFormatter::new(&settings)?;
	let plain = formatter.protect(&ticket().with_audience("plain"))?;
	let encrypted = formatter.protect(&ticket())?;

	assert_eq!(common::segment(&plain, 1)["aud"], "plain");
	assert_eq!(common::segment(&plain, 1)["sub"], "testuser@mydomain.com");
	assert_eq!(encrypted.split('.').count(), 5);

	Ok(())
}

#[test]
fn misconfiguration_fails_before_any_token_is_issued() {
	let ambiguous = r#"{
		"allowed_clients": [{
			"id": "valid_client_id",
			"secret": "JkgHgUR3npkGFrHOXOph1R_NBtp6GikiWv_CKNt_xXU",
			"relative_file_certificate": { "relative_file_path": "a.pfx", "password": "Test" },
			"store_certificate": {
				"store_path": "/tmp",
				"thumbprint": "0000000000000000000000000000000000000000"
			}
		}]
	}"#;
	let err = ServerSettings::from_json_str(ambiguous).expect_err("ambiguous certificate");

	assert_eq!(err.kind(), ErrorKind::Configuration);

	let bad_secret = ServerSettings::new().with_client(Client::new(CLIENT_ID, "invalid secret"));
	let err = TokenFormatter::new(&bad_secret).expect_err("bad secret");

	assert!(matches!(err, Error::SecretFormat { .. }));
	assert_eq!(err.kind(), ErrorKind::Configuration);
}

#[test]
fn request_errors_are_domain_errors() -> Result<()> {
	let settings = ServerSettings::new().with_client(Client::new(CLIENT_ID, SECRET));
	let formatter = TokenFormatter::new(&settings)?;
	let no_audience = AuthenticationTicket::new(ClaimsIdentity::new("JWT"))
		.with_issued_at(Utc::now())
		.with_expires_at(Utc::now() + TimeDelta::minutes(1));

	assert!(matches!(formatter.protect(&no_audience), Err(Error::MissingAudience)));
	assert!(matches!(
		formatter.protect(&ticket().with_audience("invalid_client_id")),
		Err(Error::UnknownClient { .. })
	));
	assert!(matches!(
		SecureDataFormat::unprotect(&formatter, "anything"),
		Err(Error::Unsupported { .. })
	));

	Ok(())
}
