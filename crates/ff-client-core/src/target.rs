// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! The subject flag evaluations are computed for.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// The subject (user, device, service) for which flag evaluations are
/// computed. Immutable for the lifetime of a client instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Target {
	/// Unique identifier of the target within an environment.
	pub identifier: String,
	/// Optional display name.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub name: Option<String>,
	/// Whether the target is anonymous (not tied to a known account).
	#[serde(default)]
	pub anonymous: bool,
	/// Free-form attributes used by server-side targeting rules.
	#[serde(default, skip_serializing_if = "HashMap::is_empty")]
	pub attributes: HashMap<String, serde_json::Value>,
}

impl Target {
	/// Creates a target with the given identifier and no attributes.
	pub fn new(identifier: impl Into<String>) -> Self {
		Self {
			identifier: identifier.into(),
			name: None,
			anonymous: false,
			attributes: HashMap::new(),
		}
	}

	/// Sets the display name.
	pub fn with_name(mut self, name: impl Into<String>) -> Self {
		self.name = Some(name.into());
		self
	}

	/// Marks the target as anonymous.
	pub fn anonymous(mut self) -> Self {
		self.anonymous = true;
		self
	}

	/// Adds a targeting attribute.
	pub fn with_attribute(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
		self.attributes.insert(key.into(), value);
		self
	}
}
