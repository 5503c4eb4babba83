// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Evaluated flag values as returned by the evaluation service.

use serde::{Deserialize, Serialize};

/// The currently effective value of a flag for a target.
///
/// Flags can resolve to a boolean, a number, a string, or an arbitrary JSON
/// structure. The untagged representation matches the service wire format,
/// where the value field carries the raw JSON value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum VariationValue {
	/// Boolean flag value.
	Boolean(bool),
	/// Numeric flag value.
	Number(f64),
	/// String flag value.
	String(String),
	/// JSON-structured flag value.
	Json(serde_json::Value),
}

impl VariationValue {
	/// Returns the boolean value, if this is a boolean variation.
	pub fn as_bool(&self) -> Option<bool> {
		match self {
			VariationValue::Boolean(b) => Some(*b),
			_ => None,
		}
	}

	/// Returns the numeric value, if this is a number variation.
	pub fn as_f64(&self) -> Option<f64> {
		match self {
			VariationValue::Number(n) => Some(*n),
			_ => None,
		}
	}

	/// Returns the string value, if this is a string variation.
	pub fn as_str(&self) -> Option<&str> {
		match self {
			VariationValue::String(s) => Some(s),
			_ => None,
		}
	}
}

impl From<bool> for VariationValue {
	fn from(value: bool) -> Self {
		VariationValue::Boolean(value)
	}
}

impl From<f64> for VariationValue {
	fn from(value: f64) -> Self {
		VariationValue::Number(value)
	}
}

impl From<&str> for VariationValue {
	fn from(value: &str) -> Self {
		VariationValue::String(value.to_string())
	}
}

impl From<String> for VariationValue {
	fn from(value: String) -> Self {
		VariationValue::String(value)
	}
}

impl From<serde_json::Value> for VariationValue {
	fn from(value: serde_json::Value) -> Self {
		VariationValue::Json(value)
	}
}

/// A single flag evaluation produced by the remote service.
///
/// Immutable once received. `kind` and `identifier` are passthrough
/// metadata the service attaches to evaluations; the client only keys on
/// `flag` and stores `value`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Evaluation {
	/// The flag identifier this evaluation belongs to.
	pub flag: String,
	/// The evaluated value for the authenticated target.
	pub value: VariationValue,
	/// The flag kind reported by the service (e.g. "boolean", "json").
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub kind: Option<String>,
	/// The matched variation identifier, when the service reports one.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub identifier: Option<String>,
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn variation_value_parses_booleans() {
		let v: VariationValue = serde_json::from_str("true").unwrap();
		assert_eq!(v, VariationValue::Boolean(true));
		assert_eq!(v.as_bool(), Some(true));
	}

	#[test]
	fn variation_value_parses_numbers() {
		let v: VariationValue = serde_json::from_str("42.5").unwrap();
		assert_eq!(v.as_f64(), Some(42.5));
	}

	#[test]
	fn variation_value_parses_strings() {
		let v: VariationValue = serde_json::from_str(r#""dark""#).unwrap();
		assert_eq!(v.as_str(), Some("dark"));
	}

	#[test]
	fn variation_value_parses_json_objects() {
		let v: VariationValue = serde_json::from_str(r#"{"limit":10}"#).unwrap();
		match v {
			VariationValue::Json(value) => assert_eq!(value["limit"], 10),
			other => panic!("expected Json variant, got {other:?}"),
		}
	}

	#[test]
	fn accessors_reject_other_kinds() {
		let v = VariationValue::String("true".to_string());
		assert_eq!(v.as_bool(), None);
		assert_eq!(v.as_f64(), None);
	}

	#[test]
	fn evaluation_parses_service_payload() {
		let json = r#"{"flag":"checkout.new_flow","kind":"boolean","identifier":"on","value":true}"#;
		let evaluation: Evaluation = serde_json::from_str(json).unwrap();
		assert_eq!(evaluation.flag, "checkout.new_flow");
		assert_eq!(evaluation.value, VariationValue::Boolean(true));
		assert_eq!(evaluation.kind.as_deref(), Some("boolean"));
		assert_eq!(evaluation.identifier.as_deref(), Some("on"));
	}

	#[test]
	fn evaluation_tolerates_missing_metadata() {
		let json = r#"{"flag":"theme","value":"dark"}"#;
		let evaluation: Evaluation = serde_json::from_str(json).unwrap();
		assert_eq!(evaluation.kind, None);
		assert_eq!(evaluation.identifier, None);
	}
}
