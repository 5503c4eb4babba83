// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Client-side feature flag evaluation SDK.
//!
//! This crate keeps a local cache of flag evaluations for a single target
//! and serves flag lookups from it synchronously. The cache is seeded by a
//! bulk fetch and kept current by a server-push stream; push messages
//! carry only flag identifiers, and the client fetches the authoritative
//! value itself.
//!
//! # Features
//!
//! - **API Key Authentication**: JWT-based auth against the flags service
//! - **Real-time Updates**: SSE streaming with automatic reconnection
//! - **Local Caching**: In-memory cache for synchronous, non-blocking lookups
//! - **Event Channels**: Ready, Changed, Error, Connected, Disconnected
//! - **Type-safe Evaluation**: Boolean, string, number, and JSON values
//!
//! # Example
//!
//! ```ignore
//! use ff_client::{ClientOptions, EventKind, FfClient, Target};
//!
//! #[tokio::main]
//! async fn main() {
//!     let client = FfClient::initialize(
//!         "your-client-sdk-key",
//!         Target::new("user-123")
//!             .with_name("Test User")
//!             .with_attribute("plan", serde_json::json!("enterprise")),
//!         ClientOptions::default(),
//!     );
//!
//!     client.on(EventKind::Ready, |event| {
//!         println!("flags loaded: {event:?}");
//!     });
//!     client.on(EventKind::Error, |event| {
//!         eprintln!("flag client error: {event:?}");
//!     });
//!
//!     let dark_mode = client.bool_variation("dark_mode", false);
//!     let theme = client.string_variation("ui_theme", "light");
//!
//!     client.close().await;
//! }
//! ```

mod auth;
mod cache;
mod client;
mod config;
mod error;
mod events;
mod fetch;
mod http;
mod reconcile;
mod sse;

pub use auth::{authenticate, AuthSession};
pub use cache::EvaluationCache;
pub use client::FfClient;
pub use config::{ClientOptions, DEFAULT_BASE_URL, DEFAULT_EVENT_URL};
pub use error::{FfError, Result};
pub use events::{ClientEvent, EventKind, FlagChange, ListenerId};
pub use fetch::{EvaluationSource, HttpEvaluationSource};
pub use sse::SseConfig;

// Re-export core types for convenience
pub use ff_client_core::{Evaluation, FlagStreamEvent, Target, VariationValue};
