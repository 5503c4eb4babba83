// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Error types for the feature flags client.
//!
//! Errors are never raised out of the public facade operations; they are
//! delivered to the embedding application through the `Error` event
//! channel. An application that never registers an `Error` listener will
//! observe silent failure, so registering one is a required integration
//! step.

use thiserror::Error;

/// Feature flags client errors.
#[derive(Debug, Error)]
pub enum FfError {
	/// The authentication exchange failed or returned an unusable body.
	/// Fatal to initialization; the client stays unauthenticated and does
	/// not retry.
	#[error("authentication failed: {0}")]
	Authentication(String),

	/// The auth token payload could not be decoded to extract the
	/// environment identifier.
	#[error("auth token payload is not decodable: {0}")]
	TokenDecode(String),

	/// HTTP transport failure (connect, timeout, body read).
	#[error("HTTP request failed: {0}")]
	RequestFailed(#[from] reqwest::Error),

	/// The evaluation service returned a non-OK status.
	#[error("server error ({status}): {message}")]
	ServerError { status: u16, message: String },

	/// A push-stream message could not be parsed. Non-fatal; the message
	/// is dropped and the stream keeps running.
	#[error("malformed stream message: {0}")]
	ParseFailed(String),

	/// Connection-level failure on the push stream. The stream transport
	/// owns reconnection; this is surfaced for observability only.
	#[error("stream transport error: {0}")]
	StreamError(String),
}

/// Result type alias for client operations.
pub type Result<T> = std::result::Result<T, FfError>;
