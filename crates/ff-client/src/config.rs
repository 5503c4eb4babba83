// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Client configuration and defaults.

use std::collections::HashMap;
use std::time::Duration;

use ff_client_core::Target;

use crate::sse::SseConfig;

/// Default base URL of the flag configuration service.
pub const DEFAULT_BASE_URL: &str = "https://config.ff.harness.io/api/1.0";
/// Default base URL of the event ingestion service.
pub const DEFAULT_EVENT_URL: &str = "https://events.ff.harness.io/api/1.0";

/// Configuration for the feature flags client.
///
/// All fields are optional in the sense that [`Default`] provides working
/// values; construct with struct-update syntax:
///
/// ```
/// use ff_client::ClientOptions;
///
/// let options = ClientOptions {
///     stream_enabled: false,
///     ..ClientOptions::default()
/// };
/// ```
#[derive(Debug, Clone)]
pub struct ClientOptions {
	/// Enables verbose logging of configuration, fetch results, and
	/// stream traffic at debug level.
	pub debug: bool,
	/// Base URL for authentication, evaluation fetches, and the stream.
	pub base_url: String,
	/// Base URL for event ingestion. Reserved; metrics posting is not
	/// part of this client.
	pub event_url: String,
	/// Whether to open the push stream after the initial bulk fetch.
	/// When disabled the client serves the bulk snapshot only (polling is
	/// not yet supported).
	pub stream_enabled: bool,
	/// Treat every target attribute as private when logging.
	pub all_attributes_private: bool,
	/// Target attribute names that must never appear in log output.
	pub private_attribute_names: Vec<String>,
	/// Delay applied before the point fetch triggered by a `create`
	/// stream event. Heuristic mitigation for server-side propagation
	/// lag; see the reconciler module docs.
	pub create_fetch_delay: Duration,
	/// Timeout for auth and evaluation fetch requests. The stream
	/// connection is not subject to this timeout.
	pub request_timeout: Duration,
	/// Reconnection policy for the push stream.
	pub sse: SseConfig,
}

impl Default for ClientOptions {
	fn default() -> Self {
		Self {
			debug: false,
			base_url: DEFAULT_BASE_URL.to_string(),
			event_url: DEFAULT_EVENT_URL.to_string(),
			stream_enabled: true,
			all_attributes_private: false,
			private_attribute_names: Vec::new(),
			create_fetch_delay: Duration::from_secs(1),
			request_timeout: Duration::from_secs(30),
			sse: SseConfig::default(),
		}
	}
}

impl ClientOptions {
	/// Returns the target's attributes with private values replaced, for
	/// safe inclusion in log output.
	pub(crate) fn redacted_attributes(&self, target: &Target) -> HashMap<String, serde_json::Value> {
		target
			.attributes
			.iter()
			.map(|(key, value)| {
				let private = self.all_attributes_private
					|| self.private_attribute_names.iter().any(|name| name == key);
				let logged = if private {
					serde_json::Value::String("<redacted>".to_string())
				} else {
					value.clone()
				};
				(key.clone(), logged)
			})
			.collect()
	}
}
