//! Authentication tickets handed to the token formatter.
//!
//! A ticket pairs the authenticated [`ClaimsIdentity`] with [`AuthenticationProperties`] that
//! carry the audience and the validity window.

// std
use std::collections::HashMap;
// self
use crate::_prelude::*;

/// Property key naming the client a ticket is issued for.
pub const AUDIENCE_PROPERTY: &str = "audience";

/// A single identity claim.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Claim {
	/// Claim type, used as the JWT claim name.
	pub claim_type: String,
	/// Claim value.
	pub value: String,
}
impl Claim {
	/// Create a claim.
	pub fn new(claim_type: impl Into<String>, value: impl Into<String>) -> Self {
		Self { claim_type: claim_type.into(), value: value.into() }
	}
}

/// Identity established by the authenticator.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ClaimsIdentity {
	/// Authentication scheme that produced the identity.
	pub authentication_type: String,
	claims: Vec<Claim>,
}
impl ClaimsIdentity {
	/// Empty identity for the given authentication type.
	pub fn new(authentication_type: impl Into<String>) -> Self {
		Self { authentication_type: authentication_type.into(), claims: Vec::new() }
	}

	/// Add a claim; a claim type may repeat.
	pub fn with_claim(mut self, claim_type: impl Into<String>, value: impl Into<String>) -> Self {
		self.add_claim(claim_type, value);

		self
	}

	/// Add a claim in place.
	pub fn add_claim(&mut self, claim_type: impl Into<String>, value: impl Into<String>) {
		self.claims.push(Claim::new(claim_type, value));
	}

	/// Claims in the order they were added.
	pub fn claims(&self) -> &[Claim] {
		&self.claims
	}

	/// First value of the given claim type.
	pub fn find_first(&self, claim_type: &str) -> Option<&str> {
		self.claims
			.iter()
			.find(|claim| claim.claim_type == claim_type)
			.map(|claim| claim.value.as_str())
	}
}

/// Ticket metadata: validity window and free-form items such as the audience.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AuthenticationProperties {
	/// When the ticket was issued; omitted from the token when unset.
	pub issued_at: Option<DateTime<Utc>>,
	/// When the ticket expires; omitted from the token when unset.
	pub expires_at: Option<DateTime<Utc>>,
	items: HashMap<String, String>,
}
impl AuthenticationProperties {
	/// Raw property lookup.
	pub fn get(&self, key: &str) -> Option<&str> {
		self.items.get(key).map(String::as_str)
	}

	/// Set a property, returning the previous value.
	pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) -> Option<String> {
		self.items.insert(key.into(), value.into())
	}

	/// The `audience` property.
	pub fn audience(&self) -> Option<&str> {
		self.get(AUDIENCE_PROPERTY)
	}
}

/// Authenticated identity plus the properties describing the token to issue.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AuthenticationTicket {
	/// Identity whose claims are copied into the token.
	pub identity: ClaimsIdentity,
	/// Audience and validity window.
	pub properties: AuthenticationProperties,
}
impl AuthenticationTicket {
	/// Ticket for `identity` with empty properties.
	pub fn new(identity: ClaimsIdentity) -> Self {
		Self { identity, properties: AuthenticationProperties::default() }
	}

	/// Set the `audience` property.
	pub fn with_audience(mut self, audience: impl Into<String>) -> Self {
		self.properties.insert(AUDIENCE_PROPERTY, audience);

		self
	}

	/// Set the issued-at timestamp.
	pub fn with_issued_at(mut self, issued_at: DateTime<Utc>) -> Self {
		self.properties.issued_at = Some(issued_at);

		self
	}

	/// Set the expiry timestamp.
	pub fn with_expires_at(mut self, expires_at: DateTime<Utc>) -> Self {
		self.properties.expires_at = Some(expires_at);

		self
	}

	/// Remaining lifetime at `now`, or `None` when the ticket has no expiry.
	pub fn remaining_lifetime(&self, now: DateTime<Utc>) -> Option<TimeDelta> {
		self.properties.expires_at.map(|expires_at| (expires_at - now).max(TimeDelta::zero()))
	}
}
