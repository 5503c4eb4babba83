// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! The public client facade.
//!
//! [`FfClient::initialize`] returns immediately; authentication, the
//! initial bulk fetch, and stream startup run in a background task.
//! Failures are delivered on the `Error` event channel, never returned
//! from facade operations, so register listeners right after
//! `initialize`; an application without an `Error` listener observes
//! silent failure.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use ff_client_core::{Target, VariationValue};
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use crate::auth::authenticate;
use crate::cache::EvaluationCache;
use crate::config::ClientOptions;
use crate::error::FfError;
use crate::events::{ClientEvent, EventBus, EventKind, ListenerId};
use crate::fetch::{EvaluationSource, HttpEvaluationSource};
use crate::http;
use crate::reconcile::Reconciler;
use crate::sse::{SseConnection, StreamContext};

struct ClientInner {
	api_key: String,
	target: Target,
	options: ClientOptions,
	cache: EvaluationCache,
	bus: EventBus,
	closed: Arc<AtomicBool>,
	sse: tokio::sync::Mutex<SseConnection>,
	bootstrap: Mutex<Option<JoinHandle<()>>>,
}

/// Feature flags evaluation client.
///
/// Cheap to clone; clones share the same cache and subscriptions.
///
/// # Example
///
/// ```ignore
/// use ff_client::{ClientOptions, EventKind, FfClient, Target, VariationValue};
///
/// let client = FfClient::initialize(
///     "your-client-sdk-key",
///     Target::new("user-123").with_name("Test User"),
///     ClientOptions::default(),
/// );
///
/// client.on(EventKind::Ready, |event| {
///     println!("flags loaded: {event:?}");
/// });
/// client.on(EventKind::Error, |event| {
///     eprintln!("flag client error: {event:?}");
/// });
///
/// let dark_mode = client.bool_variation("dark_mode", false);
/// ```
#[derive(Clone)]
pub struct FfClient {
	inner: Arc<ClientInner>,
}

impl FfClient {
	/// Creates a client and starts initialization in the background.
	///
	/// Must be called within a Tokio runtime. The sequencing gate holds:
	/// the push stream is opened only after the bulk fetch succeeds, and
	/// `Ready` is emitted only after that gate passes. Auth or bulk-fetch
	/// failure emits `Error` and halts initialization without retry.
	pub fn initialize(api_key: impl Into<String>, target: Target, options: ClientOptions) -> Self {
		let inner = Arc::new(ClientInner {
			api_key: api_key.into(),
			target,
			options,
			cache: EvaluationCache::new(),
			bus: EventBus::new(),
			closed: Arc::new(AtomicBool::new(false)),
			sse: tokio::sync::Mutex::new(SseConnection::new()),
			bootstrap: Mutex::new(None),
		});

		let handle = tokio::spawn(bootstrap(Arc::clone(&inner)));
		*inner
			.bootstrap
			.lock()
			.unwrap_or_else(PoisonError::into_inner) = Some(handle);

		Self { inner }
	}

	/// Registers a callback for an event kind. Callbacks for the same
	/// kind run in registration order.
	pub fn on<F>(&self, kind: EventKind, callback: F) -> ListenerId
	where
		F: Fn(&ClientEvent) + Send + Sync + 'static,
	{
		self.inner.bus.on(kind, callback)
	}

	/// Removes a single callback. Returns whether it was registered.
	pub fn off(&self, kind: EventKind, id: ListenerId) -> bool {
		self.inner.bus.off(kind, id)
	}

	/// Removes every callback registered for a kind.
	pub fn off_all(&self, kind: EventKind) {
		self.inner.bus.off_all(kind)
	}

	/// Synchronous cache lookup.
	///
	/// Returns `fallback` exactly when the flag is absent (including
	/// before `Ready` and after `close`). Never blocks, never errors,
	/// never touches the network.
	pub fn variation(&self, flag: &str, fallback: VariationValue) -> VariationValue {
		self.inner.cache.get(flag).unwrap_or(fallback)
	}

	/// Boolean lookup; `fallback` when absent or not a boolean.
	pub fn bool_variation(&self, flag: &str, fallback: bool) -> bool {
		self.inner
			.cache
			.get(flag)
			.and_then(|value| value.as_bool())
			.unwrap_or(fallback)
	}

	/// String lookup; `fallback` when absent or not a string.
	pub fn string_variation(&self, flag: &str, fallback: &str) -> String {
		self.inner
			.cache
			.get(flag)
			.and_then(|value| value.as_str().map(str::to_string))
			.unwrap_or_else(|| fallback.to_string())
	}

	/// Numeric lookup; `fallback` when absent or not a number.
	pub fn number_variation(&self, flag: &str, fallback: f64) -> f64 {
		self.inner
			.cache
			.get(flag)
			.and_then(|value| value.as_f64())
			.unwrap_or(fallback)
	}

	/// Returns true once `close` has been called.
	pub fn is_closed(&self) -> bool {
		self.inner.closed.load(Ordering::SeqCst)
	}

	/// Shuts the client down: clears the cache and all subscriptions,
	/// stops the stream, and aborts initialization if still running.
	///
	/// Idempotent; closing twice is a no-op. A point fetch that is in
	/// flight when `close` runs completes without mutating the cache.
	pub async fn close(&self) {
		if self.inner.closed.swap(true, Ordering::SeqCst) {
			return;
		}

		if let Some(handle) = self
			.inner
			.bootstrap
			.lock()
			.unwrap_or_else(PoisonError::into_inner)
			.take()
		{
			handle.abort();
		}

		self.inner.sse.lock().await.stop().await;
		self.inner.cache.clear();
		self.inner.bus.clear();
		info!("Client closed");
	}
}

/// Authenticates, seeds the cache, and starts the stream.
async fn bootstrap(inner: Arc<ClientInner>) {
	let options = &inner.options;

	if options.debug {
		debug!(
			base_url = %options.base_url,
			stream_enabled = options.stream_enabled,
			target = %inner.target.identifier,
			attributes = ?options.redacted_attributes(&inner.target),
			"Client configuration"
		);
	}

	let http = match http::new_client(options.request_timeout) {
		Ok(client) => client,
		Err(e) => {
			error!(error = %e, "Failed to build HTTP client");
			inner.bus.emit(ClientEvent::Error(Arc::new(e)));
			return;
		}
	};

	let session = match authenticate(&http, &options.base_url, &inner.api_key).await {
		Ok(session) => session,
		Err(e) => {
			error!(error = %e, "Authentication failed");
			inner.bus.emit(ClientEvent::Error(Arc::new(e)));
			return;
		}
	};

	let source: Arc<dyn EvaluationSource> = Arc::new(HttpEvaluationSource::new(
		http,
		options.base_url.clone(),
		session.clone(),
		inner.target.identifier.clone(),
	));

	// Sequencing gate: a failed bulk fetch must not be followed by
	// push-driven cache writes.
	match source.fetch_all().await {
		Ok(evaluations) => {
			let count = inner.cache.merge(evaluations);
			debug!(flags = count, "Initial evaluations cached");
		}
		Err(e) => {
			error!(error = %e, "Bulk evaluation fetch failed, stream will not be started");
			inner.bus.emit(ClientEvent::Error(Arc::new(e)));
			return;
		}
	}

	if inner.closed.load(Ordering::SeqCst) {
		return;
	}

	if options.stream_enabled {
		let reconciler = Reconciler::new(
			inner.cache.clone(),
			inner.bus.clone(),
			source,
			Arc::clone(&inner.closed),
			options.create_fetch_delay,
		);
		let ctx = StreamContext {
			url: format!("{}/stream", options.base_url),
			token: session.token.clone(),
			api_key: inner.api_key.clone(),
			reconciler,
			bus: inner.bus.clone(),
		};

		let mut sse = inner.sse.lock().await;
		if inner.closed.load(Ordering::SeqCst) {
			return;
		}
		sse.start(ctx, options.sse.clone()).await;
	} else {
		info!("Stream disabled by configuration, polling is not yet supported");
	}

	let snapshot = inner.cache.snapshot();
	info!(flags = snapshot.len(), "Client ready");
	inner.bus.emit(ClientEvent::Ready(snapshot));
}
