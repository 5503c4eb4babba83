// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! SSE (Server-Sent Events) connection for push-driven flag updates.
//!
//! This module owns the long-lived stream connection: connecting,
//! reconnecting with backoff, and handing each parsed notification to the
//! reconciler. Connection lifecycle is observed by the rest of the client
//! through `Connected`/`Disconnected`/`Error` events; the reconciler
//! never drives reconnection itself.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use eventsource_stream::Eventsource;
use futures::StreamExt;
use ff_client_core::FlagStreamEvent;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::error::{FfError, Result};
use crate::events::{ClientEvent, EventBus};
use crate::http;
use crate::reconcile::Reconciler;

/// Configuration for SSE connection behavior.
#[derive(Debug, Clone)]
pub struct SseConfig {
	/// Base delay for reconnection attempts.
	pub reconnect_base_delay: Duration,
	/// Maximum delay for reconnection attempts.
	pub reconnect_max_delay: Duration,
	/// Maximum number of consecutive failed attempts (0 = unlimited).
	pub max_reconnect_attempts: u32,
	/// Whether to use exponential backoff for reconnection.
	pub use_exponential_backoff: bool,
}

impl Default for SseConfig {
	fn default() -> Self {
		Self {
			reconnect_base_delay: Duration::from_secs(1),
			reconnect_max_delay: Duration::from_secs(30),
			max_reconnect_attempts: 0, // Unlimited
			use_exponential_backoff: true,
		}
	}
}

/// Everything the stream task needs to connect and dispatch messages.
pub(crate) struct StreamContext {
	/// Full URL of the stream endpoint.
	pub url: String,
	/// Bearer token from the auth session.
	pub token: String,
	/// The API key, sent alongside the token per the service contract.
	pub api_key: String,
	/// Receives each parsed notification.
	pub reconciler: Reconciler,
	/// Receives connection lifecycle and error events.
	pub bus: EventBus,
}

/// Manages the SSE connection in a background task.
pub struct SseConnection {
	connected: Arc<AtomicBool>,
	reconnect_attempts: Arc<AtomicU64>,
	events_received: Arc<AtomicU64>,
	task_handle: Option<JoinHandle<()>>,
	shutdown_tx: Option<mpsc::Sender<()>>,
}

impl SseConnection {
	/// Creates a new, unstarted connection manager.
	pub fn new() -> Self {
		Self {
			connected: Arc::new(AtomicBool::new(false)),
			reconnect_attempts: Arc::new(AtomicU64::new(0)),
			events_received: Arc::new(AtomicU64::new(0)),
			task_handle: None,
			shutdown_tx: None,
		}
	}

	/// Starts the connection in a background task.
	///
	/// The task reconnects on failure according to `config`.
	pub(crate) async fn start(&mut self, ctx: StreamContext, config: SseConfig) {
		// If already running, stop first
		self.stop().await;

		let (shutdown_tx, shutdown_rx) = mpsc::channel::<()>(1);
		self.shutdown_tx = Some(shutdown_tx);

		let connected = Arc::clone(&self.connected);
		let reconnect_attempts = Arc::clone(&self.reconnect_attempts);
		let events_received = Arc::clone(&self.events_received);

		let handle = tokio::spawn(async move {
			run_stream_loop(
				ctx,
				config,
				connected,
				reconnect_attempts,
				events_received,
				shutdown_rx,
			)
			.await;
		});

		self.task_handle = Some(handle);
	}

	/// Stops the connection. Safe to call repeatedly or before `start`.
	pub async fn stop(&mut self) {
		if let Some(tx) = self.shutdown_tx.take() {
			let _ = tx.send(()).await;
		}
		if let Some(handle) = self.task_handle.take() {
			handle.abort();
			let _ = handle.await;
		}
		self.connected.store(false, Ordering::SeqCst);
	}
}

impl Default for SseConnection {
	fn default() -> Self {
		Self::new()
	}
}

impl Drop for SseConnection {
	fn drop(&mut self) {
		if let Some(handle) = self.task_handle.take() {
			handle.abort();
		}
	}
}

/// Runs the connection loop with reconnection logic.
async fn run_stream_loop(
	ctx: StreamContext,
	config: SseConfig,
	connected: Arc<AtomicBool>,
	reconnect_attempts: Arc<AtomicU64>,
	events_received: Arc<AtomicU64>,
	mut shutdown_rx: mpsc::Receiver<()>,
) {
	let mut consecutive_failures: u32 = 0;

	loop {
		// Check for shutdown signal
		if shutdown_rx.try_recv().is_ok() {
			info!("Stream received shutdown signal");
			break;
		}

		info!(url = %ctx.url, "Connecting to event stream");

		match connect_and_process(&ctx, &connected, &events_received).await {
			Ok(()) => {
				// Normal disconnect (e.g., server closed connection)
				debug!("Event stream ended normally");
				consecutive_failures = 0;
			}
			Err(e) => {
				error!(error = %e, "Event stream error");
				consecutive_failures += 1;
				ctx.bus.emit(ClientEvent::Error(Arc::new(e)));
			}
		}

		if connected.swap(false, Ordering::SeqCst) {
			ctx.bus.emit(ClientEvent::Disconnected);
		}

		// Check max reconnect attempts
		if config.max_reconnect_attempts > 0 && consecutive_failures >= config.max_reconnect_attempts {
			error!(
				attempts = consecutive_failures,
				"Max reconnection attempts reached, stopping stream"
			);
			break;
		}

		// Calculate backoff delay
		let delay = if config.use_exponential_backoff {
			let factor = 2u64.saturating_pow(consecutive_failures.min(10));
			let delay_ms = config.reconnect_base_delay.as_millis() as u64 * factor;
			Duration::from_millis(delay_ms.min(config.reconnect_max_delay.as_millis() as u64))
		} else {
			config.reconnect_base_delay
		};

		reconnect_attempts.fetch_add(1, Ordering::SeqCst);
		warn!(
			delay_ms = delay.as_millis(),
			attempts = consecutive_failures,
			"Reconnecting to event stream"
		);

		// Wait with shutdown check
		tokio::select! {
			_ = tokio::time::sleep(delay) => {}
			_ = shutdown_rx.recv() => {
				info!("Stream received shutdown signal during reconnect wait");
				break;
			}
		}
	}
}

/// Connects to the stream and processes messages until disconnection.
async fn connect_and_process(
	ctx: &StreamContext,
	connected: &Arc<AtomicBool>,
	events_received: &Arc<AtomicU64>,
) -> Result<()> {
	// No request timeout here: the whole point is a long-lived response.
	let client = http::builder().build().map_err(FfError::RequestFailed)?;

	let response = client
		.get(&ctx.url)
		.header("Authorization", format!("Bearer {}", ctx.token))
		.header("API-Key", &ctx.api_key)
		.header("Accept", "text/event-stream")
		.header("Cache-Control", "no-cache")
		.send()
		.await
		.map_err(FfError::RequestFailed)?;

	if !response.status().is_success() {
		return Err(FfError::ServerError {
			status: response.status().as_u16(),
			message: response.text().await.unwrap_or_default(),
		});
	}

	connected.store(true, Ordering::SeqCst);
	info!("Event stream connected");
	ctx.bus.emit(ClientEvent::Connected);

	let mut event_stream = response.bytes_stream().eventsource();

	while let Some(event_result) = event_stream.next().await {
		match event_result {
			Ok(event) => {
				events_received.fetch_add(1, Ordering::SeqCst);
				handle_message(&event.data, ctx);
			}
			Err(e) => {
				return Err(FfError::StreamError(e.to_string()));
			}
		}
	}

	Ok(())
}

/// Parses one stream message and hands it to the reconciler.
///
/// Malformed payloads are surfaced as a non-fatal `Error` event; the
/// stream keeps running.
fn handle_message(data: &str, ctx: &StreamContext) {
	// Keep-alive comments arrive as empty data
	if data.is_empty() {
		return;
	}

	match serde_json::from_str::<FlagStreamEvent>(data) {
		Ok(event) => ctx.reconciler.handle_event(event),
		Err(e) => {
			warn!(data = %data, error = %e, "Failed to parse stream message");
			ctx.bus
				.emit(ClientEvent::Error(Arc::new(FfError::ParseFailed(
					e.to_string(),
				))));
		}
	}
}
