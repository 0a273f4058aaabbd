//! Integration tests for token issuance through the public API.

mod common;
mod password_grant;
mod token_issuance;
