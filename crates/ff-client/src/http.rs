// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Shared HTTP client construction with a consistent User-Agent header.

use std::time::Duration;

use reqwest::{Client, ClientBuilder};

use crate::error::{FfError, Result};

/// SDK name for identification.
pub(crate) const SDK_NAME: &str = "ff-client-rust";
/// SDK version for identification.
pub(crate) const SDK_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Returns the standard SDK User-Agent string.
///
/// Format: `ff-client-rust/{version}`
pub fn user_agent() -> String {
	format!("{SDK_NAME}/{SDK_VERSION}")
}

/// Creates a new HTTP client builder with the standard User-Agent header.
///
/// Used without a request timeout for the long-lived stream connection;
/// fetch paths apply a timeout via [`new_client`].
pub fn builder() -> ClientBuilder {
	Client::builder().user_agent(user_agent())
}

/// Creates a new HTTP client for fetch and auth calls.
pub fn new_client(timeout: Duration) -> Result<Client> {
	builder()
		.timeout(timeout)
		.build()
		.map_err(FfError::RequestFailed)
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn user_agent_has_correct_format() {
		let ua = user_agent();
		assert!(ua.starts_with("ff-client-rust/"));
		let parts: Vec<&str> = ua.split('/').collect();
		assert_eq!(parts.len(), 2);
		assert!(!parts[1].is_empty());
	}

	#[test]
	fn client_builds_with_timeout() {
		assert!(new_client(Duration::from_secs(5)).is_ok());
	}
}
