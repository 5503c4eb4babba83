// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Wire types for the feature flags evaluation client.
//!
//! This crate holds the data model shared between the client SDK
//! (`ff-client`) and any tooling that speaks the same protocol: evaluated
//! flag values, the target a flag is evaluated for, and the change
//! notifications delivered over the push stream.
//!
//! # Example
//!
//! ```
//! use ff_client_core::{Evaluation, FlagStreamEvent, Target, VariationValue};
//!
//! let target = Target::new("user-123").with_name("Test User");
//!
//! let evaluation = Evaluation {
//!     flag: "checkout.new_flow".to_string(),
//!     value: VariationValue::Boolean(true),
//!     kind: Some("boolean".to_string()),
//!     identifier: None,
//! };
//!
//! let event: FlagStreamEvent =
//!     serde_json::from_str(r#"{"event":"patch","identifier":"checkout.new_flow"}"#).unwrap();
//! assert_eq!(event.identifier(), "checkout.new_flow");
//! ```

pub mod evaluation;
pub mod stream;
pub mod target;

pub use evaluation::{Evaluation, VariationValue};
pub use stream::FlagStreamEvent;
pub use target::Target;
