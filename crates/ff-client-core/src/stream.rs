// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Push-stream change notifications.
//!
//! The push stream delivers one JSON message per flag change, tagged by
//! operation kind:
//!
//! - `create` - a flag was created; the client must fetch its evaluation
//! - `patch` - a flag changed; the client must re-fetch its evaluation
//! - `delete` - a flag was removed; the client drops it from the cache
//!
//! Messages carry no sequence number or version, so delivery order cannot
//! be validated by the receiver. Transient: parsed from a wire message,
//! consumed immediately, never stored.

use serde::{Deserialize, Serialize};

/// A single change notification from the push stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "lowercase")]
pub enum FlagStreamEvent {
	/// A flag was created in the environment.
	Create {
		/// The affected flag identifier.
		identifier: String,
	},
	/// A flag's configuration or evaluation changed.
	Patch {
		/// The affected flag identifier.
		identifier: String,
	},
	/// A flag was deleted from the environment.
	Delete {
		/// The affected flag identifier.
		identifier: String,
	},
}

impl FlagStreamEvent {
	/// Returns the event kind name as it appears on the wire.
	pub fn event_type(&self) -> &'static str {
		match self {
			FlagStreamEvent::Create { .. } => "create",
			FlagStreamEvent::Patch { .. } => "patch",
			FlagStreamEvent::Delete { .. } => "delete",
		}
	}

	/// Returns the flag identifier the event refers to.
	pub fn identifier(&self) -> &str {
		match self {
			FlagStreamEvent::Create { identifier }
			| FlagStreamEvent::Patch { identifier }
			| FlagStreamEvent::Delete { identifier } => identifier,
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn parses_wire_messages() {
		let event: FlagStreamEvent =
			serde_json::from_str(r#"{"event":"patch","identifier":"checkout.new_flow"}"#).unwrap();
		assert_eq!(
			event,
			FlagStreamEvent::Patch {
				identifier: "checkout.new_flow".to_string()
			}
		);
		assert_eq!(event.event_type(), "patch");
		assert_eq!(event.identifier(), "checkout.new_flow");
	}

	#[test]
	fn serializes_with_event_tag() {
		let event = FlagStreamEvent::Delete {
			identifier: "theme".to_string(),
		};
		let json = serde_json::to_string(&event).unwrap();
		assert!(json.contains(r#""event":"delete""#));
		assert!(json.contains(r#""identifier":"theme""#));
	}

	#[test]
	fn rejects_unknown_event_kinds() {
		let result: Result<FlagStreamEvent, _> =
			serde_json::from_str(r#"{"event":"upsert","identifier":"x"}"#);
		assert!(result.is_err());
	}

	#[test]
	fn rejects_missing_identifier() {
		let result: Result<FlagStreamEvent, _> = serde_json::from_str(r#"{"event":"create"}"#);
		assert!(result.is_err());
	}

	#[test]
	fn event_type_matches_serialized_tag() {
		let events = [
			FlagStreamEvent::Create {
				identifier: "a".to_string(),
			},
			FlagStreamEvent::Patch {
				identifier: "a".to_string(),
			},
			FlagStreamEvent::Delete {
				identifier: "a".to_string(),
			},
		];

		for event in events {
			let json = serde_json::to_string(&event).unwrap();
			assert!(json.contains(&format!(r#""event":"{}""#, event.event_type())));
		}
	}
}
