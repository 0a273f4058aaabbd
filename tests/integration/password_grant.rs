//! Password-grant exchanges end to end.

// crates.io
use jwt_oauth_issuer::{
	CertificateSource, ClaimsIdentity, Client, Result, ServerSettings,
	grant::{Authenticator, Credentials, ErrorResponse, PasswordGrant, PasswordGrantRequest},
};
use tempfile::TempDir;
// self
use crate::common::{self, CLIENT_ID, SECRET};

struct StaticAuthenticator;
impl Authenticator for StaticAuthenticator {
	type Error = &'static str;

	fn sign_in(
		&self,
		credentials: &Credentials,
	) -> std::result::Result<Option<ClaimsIdentity>, Self::Error> {
		match credentials.user_name.as_str() {
			"broken" => Err("This is a test"),
			"username" => Ok(Some(
				ClaimsIdentity::new(credentials.authentication_type.clone())
					.with_claim("sub", credentials.user_name.clone()),
			)),
			_ => Ok(None),
		}
	}
}

#[test]
fn encrypted_token_response_round_trips() -> Result<()> {
	let _ = tracing_subscriber::fmt::try_init();
	let dir = TempDir::new()?;

	common::write_test_certificate(dir.path());

	let settings = ServerSettings::new()
		.with_allow_insecure_http(true)
		.with_access_token_lifetime(std::time::Duration::from_secs(22))
		.with_client(
			Client::new(CLIENT_ID, SECRET)
				.with_certificate(CertificateSource::File(common::file_certificate(dir.path()))),
		);
	let grant = PasswordGrant::new(settings, StaticAuthenticator)?;
	let request = PasswordGrantRequest::new(CLIENT_ID, "username", "password")
		.with_secure_transport(false);
	let response = grant.exchange(&request)?;
	let body = serde_json::to_value(&response)?;
	let jwt = common::decrypt(&response.access_token, &common::private_key(dir.path()));

	assert_eq!(body["token_type"], "bearer");
	assert!((21..=22).contains(&response.expires_in));
	assert_eq!(jwt.split('.').count(), 3);
	assert_eq!(common::segment(&jwt, 1)["aud"], CLIENT_ID);
	assert_eq!(common::segment(&jwt, 1)["sub"], "username");

	Ok(())
}

#[test]
fn failed_sign_in_maps_to_invalid_grant_bodies() -> Result<()> {
	let settings = ServerSettings::new().with_client(Client::new(CLIENT_ID, SECRET));
	let grant = PasswordGrant::new(settings, StaticAuthenticator)?;

	for (user, description) in [
		("nobody", "The user name or password is incorrect."),
		("broken", "This is a test"),
	] {
		let err = grant
			.exchange(&PasswordGrantRequest::new(CLIENT_ID, user, "password"))
			.expect_err("sign-in fails");
		let body = serde_json::to_value(ErrorResponse::from(&err))?;

		assert_eq!(body["error"], "invalid_grant");
		assert_eq!(body["error_description"], description);
	}

	Ok(())
}

#[test]
fn unknown_client_is_an_invalid_client() -> Result<()> {
	let settings = ServerSettings::new().with_client(Client::new(CLIENT_ID, SECRET));
	let grant = PasswordGrant::new(settings, StaticAuthenticator)?;
	let err = grant
		.exchange(&PasswordGrantRequest::new("invalid_client_id", "username", "password"))
		.expect_err("unknown client");

	assert_eq!(ErrorResponse::from(&err).error, "invalid_client");

	Ok(())
}
