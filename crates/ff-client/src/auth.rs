// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Authentication against the flag evaluation service.
//!
//! One network exchange at startup produces an [`AuthSession`]: the bearer
//! token plus the environment identifier decoded from its payload. The
//! token is a JWT issued by the trusted service and is decoded without
//! signature verification. Sessions are replaced, never mutated in place.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{FfError, Result};

/// The credentials and scope for all subsequent fetch and stream calls.
#[derive(Debug, Clone)]
pub struct AuthSession {
	/// Opaque bearer token for fetch and stream requests.
	pub token: String,
	/// Environment identifier scoping all fetch and stream URLs.
	pub environment: String,
	/// Cluster routing hint, echoed back as a query parameter when the
	/// service provides one.
	pub cluster_identifier: Option<String>,
}

#[derive(Debug, Serialize)]
struct AuthRequest<'a> {
	#[serde(rename = "apiKey")]
	api_key: &'a str,
}

#[derive(Debug, Deserialize)]
struct AuthResponse {
	#[serde(rename = "authToken")]
	auth_token: String,
}

#[derive(Debug, Deserialize)]
struct TokenClaims {
	environment: String,
	#[serde(rename = "clusterIdentifier")]
	cluster_identifier: Option<String>,
}

/// Performs the authentication exchange and decodes the session scope.
///
/// Fails with [`FfError::Authentication`] when the transport errors or
/// the response cannot be parsed into a token, and with
/// [`FfError::TokenDecode`] when the token payload is unusable. No retry:
/// a failed authentication leaves the client instance permanently
/// unauthenticated.
pub async fn authenticate(http: &Client, base_url: &str, api_key: &str) -> Result<AuthSession> {
	let url = format!("{base_url}/client/auth");
	debug!(url = %url, "Authenticating");

	let response = http
		.post(&url)
		.json(&AuthRequest { api_key })
		.send()
		.await
		.map_err(|e| FfError::Authentication(e.to_string()))?;

	if !response.status().is_success() {
		let status = response.status().as_u16();
		let message = response.text().await.unwrap_or_default();
		return Err(FfError::Authentication(format!(
			"server returned {status}: {message}"
		)));
	}

	let body: AuthResponse = response
		.json()
		.await
		.map_err(|e| FfError::Authentication(format!("unparsable auth response: {e}")))?;

	let claims = decode_token_claims(&body.auth_token)?;
	info!(environment = %claims.environment, "Authenticated");

	Ok(AuthSession {
		token: body.auth_token,
		environment: claims.environment,
		cluster_identifier: claims.cluster_identifier,
	})
}

/// Decodes the JWT payload segment without verifying the signature.
fn decode_token_claims(token: &str) -> Result<TokenClaims> {
	let payload = token
		.split('.')
		.nth(1)
		.ok_or_else(|| FfError::TokenDecode("missing payload segment".to_string()))?;

	let bytes = URL_SAFE_NO_PAD
		.decode(payload)
		.map_err(|e| FfError::TokenDecode(e.to_string()))?;

	serde_json::from_slice(&bytes).map_err(|e| FfError::TokenDecode(e.to_string()))
}

/// Builds an unsigned token with the given claims, for tests.
#[cfg(test)]
pub(crate) fn make_token(claims: serde_json::Value) -> String {
	let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"HS256","typ":"JWT"}"#);
	let payload = URL_SAFE_NO_PAD.encode(claims.to_string().as_bytes());
	format!("{header}.{payload}.sig")
}
