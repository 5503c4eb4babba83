// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Stream-driven cache reconciliation.
//!
//! Each push notification is dispatched purely by operation kind; the
//! transport provides no sequence numbers, so delivery order cannot be
//! validated and the reconciler settles for eventual consistency:
//!
//! - `create` fetches the flag after [`ClientOptions::create_fetch_delay`]
//!   (default 1s). The notification can outrace the service's own
//!   propagation, so an immediate fetch may see a stale value or a 404.
//!   The delay is a heuristic mitigation, not a guarantee.
//! - `patch` fetches immediately.
//! - `delete` removes the flag from the cache synchronously (no network
//!   round-trip) and emits the deletion marker before the next stream
//!   message is processed.
//!
//! Because `create` fetches are deferred and `patch` fetches are not, two
//! notifications for the same flag can resolve out of order. The cache
//! ends up holding whichever point fetch completes last in wall-clock
//! order, not whichever was requested last. This race is accepted; a
//! later notification's fetch always reflects the server's current state.
//!
//! [`ClientOptions::create_fetch_delay`]: crate::ClientOptions

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use ff_client_core::FlagStreamEvent;
use tracing::{debug, warn};

use crate::cache::EvaluationCache;
use crate::events::{ClientEvent, EventBus, FlagChange};
use crate::fetch::EvaluationSource;

/// Applies stream notifications to the evaluation cache.
///
/// Cheap to clone; clones share the cache, bus, source, and closed flag.
#[derive(Clone)]
pub struct Reconciler {
	cache: EvaluationCache,
	bus: EventBus,
	source: Arc<dyn EvaluationSource>,
	closed: Arc<AtomicBool>,
	create_fetch_delay: Duration,
}

impl Reconciler {
	/// Creates a reconciler over the given cache and fetch source.
	///
	/// `closed` is shared with the owning client; once set, no fetch
	/// completion may mutate the cache.
	pub fn new(
		cache: EvaluationCache,
		bus: EventBus,
		source: Arc<dyn EvaluationSource>,
		closed: Arc<AtomicBool>,
		create_fetch_delay: Duration,
	) -> Self {
		Self {
			cache,
			bus,
			source,
			closed,
			create_fetch_delay,
		}
	}

	/// Dispatches one stream notification.
	///
	/// `delete` is applied before returning; `create` and `patch` spawn
	/// point fetches and return immediately.
	pub fn handle_event(&self, event: FlagStreamEvent) {
		debug!(event = event.event_type(), flag = event.identifier(), "Processing stream event");

		match event {
			FlagStreamEvent::Create { identifier } => {
				let reconciler = self.clone();
				tokio::spawn(async move {
					tokio::time::sleep(reconciler.create_fetch_delay).await;
					reconciler.reconcile_flag(&identifier).await;
				});
			}
			FlagStreamEvent::Patch { identifier } => {
				let reconciler = self.clone();
				tokio::spawn(async move {
					reconciler.reconcile_flag(&identifier).await;
				});
			}
			FlagStreamEvent::Delete { identifier } => {
				self.apply_delete(&identifier);
			}
		}
	}

	/// Removes a flag from the cache and emits the deletion marker.
	fn apply_delete(&self, identifier: &str) {
		if self.closed.load(Ordering::SeqCst) {
			return;
		}

		self.cache.remove(identifier);
		self.bus.emit(ClientEvent::Changed(FlagChange::Deleted {
			flag: identifier.to_string(),
		}));
	}

	/// Point-fetches one flag and folds the result into the cache.
	///
	/// On success the cache mutation happens before the `Changed`
	/// emission. On failure the stale cached value, if any, is retained:
	/// staleness is preferred over holding an unconfirmed value.
	pub(crate) async fn reconcile_flag(&self, identifier: &str) {
		match self.source.fetch_flag(identifier).await {
			Ok(evaluation) => {
				if self.closed.load(Ordering::SeqCst) {
					debug!(flag = %identifier, "Client closed, dropping fetched evaluation");
					return;
				}

				self.cache.insert(identifier, evaluation.value.clone());
				self.bus
					.emit(ClientEvent::Changed(FlagChange::Updated(evaluation)));
			}
			Err(e) => {
				warn!(flag = %identifier, error = %e, "Point fetch failed, keeping cached value");
				self.bus.emit(ClientEvent::Error(Arc::new(e)));
			}
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::sync::atomic::AtomicUsize;

	use async_trait::async_trait;
	use ff_client_core::{Evaluation, VariationValue};
	use tokio::sync::mpsc;

	use crate::error::{FfError, Result};
	use crate::events::EventKind;

	/// Returns scripted values with per-call latencies; repeats the last
	/// entry once the script is exhausted.
	struct ScriptedSource {
		calls: AtomicUsize,
		script: Vec<(Duration, VariationValue)>,
	}

	impl ScriptedSource {
		fn new(script: Vec<(Duration, VariationValue)>) -> Self {
			assert!(!script.is_empty());
			Self {
				calls: AtomicUsize::new(0),
				script,
			}
		}

		fn instant(value: VariationValue) -> Self {
			Self::new(vec![(Duration::ZERO, value)])
		}

		fn calls(&self) -> usize {
			self.calls.load(Ordering::SeqCst)
		}
	}

	#[async_trait]
	impl EvaluationSource for ScriptedSource {
		async fn fetch_all(&self) -> Result<Vec<Evaluation>> {
			Ok(Vec::new())
		}

		async fn fetch_flag(&self, identifier: &str) -> Result<Evaluation> {
			let index = self.calls.fetch_add(1, Ordering::SeqCst);
			let (latency, value) = self
				.script
				.get(index)
				.or_else(|| self.script.last())
				.cloned()
				.unwrap();
			if !latency.is_zero() {
				tokio::time::sleep(latency).await;
			}
			Ok(Evaluation {
				flag: identifier.to_string(),
				value,
				kind: None,
				identifier: None,
			})
		}
	}

	struct FailingSource;

	#[async_trait]
	impl EvaluationSource for FailingSource {
		async fn fetch_all(&self) -> Result<Vec<Evaluation>> {
			Err(FfError::ServerError {
				status: 500,
				message: "bulk failure".to_string(),
			})
		}

		async fn fetch_flag(&self, _identifier: &str) -> Result<Evaluation> {
			Err(FfError::ServerError {
				status: 404,
				message: "not found".to_string(),
			})
		}
	}

	fn reconciler(
		source: Arc<dyn EvaluationSource>,
		delay: Duration,
	) -> (Reconciler, EvaluationCache, EventBus, Arc<AtomicBool>) {
		let cache = EvaluationCache::new();
		let bus = EventBus::new();
		let closed = Arc::new(AtomicBool::new(false));
		let reconciler = Reconciler::new(
			cache.clone(),
			bus.clone(),
			source,
			Arc::clone(&closed),
			delay,
		);
		(reconciler, cache, bus, closed)
	}

	fn change_channel(bus: &EventBus) -> mpsc::UnboundedReceiver<FlagChange> {
		let (tx, rx) = mpsc::unbounded_channel();
		bus.on(EventKind::Changed, move |event| {
			if let ClientEvent::Changed(change) = event {
				let _ = tx.send(change.clone());
			}
		});
		rx
	}

	fn error_channel(bus: &EventBus) -> mpsc::UnboundedReceiver<Arc<FfError>> {
		let (tx, rx) = mpsc::unbounded_channel();
		bus.on(EventKind::Error, move |event| {
			if let ClientEvent::Error(error) = event {
				let _ = tx.send(Arc::clone(error));
			}
		});
		rx
	}

	async fn settle() {
		for _ in 0..16 {
			tokio::task::yield_now().await;
		}
	}

	#[tokio::test]
	async fn create_fetch_waits_for_delay_and_runs_exactly_once() {
		tokio::time::pause();

		let source = Arc::new(ScriptedSource::instant(VariationValue::Boolean(true)));
		let (reconciler, cache, bus, _) =
			reconciler(Arc::clone(&source) as Arc<dyn EvaluationSource>, Duration::from_secs(1));
		let mut changes = change_channel(&bus);

		reconciler.handle_event(FlagStreamEvent::Create {
			identifier: "a".to_string(),
		});

		settle().await;
		assert_eq!(source.calls(), 0, "fetch must not run before the delay");

		tokio::time::advance(Duration::from_millis(999)).await;
		settle().await;
		assert_eq!(source.calls(), 0, "fetch must not run before the delay elapses");

		tokio::time::advance(Duration::from_millis(1)).await;
		let change = changes.recv().await.unwrap();
		assert_eq!(source.calls(), 1);
		assert_eq!(change.flag(), "a");
		assert_eq!(cache.get("a"), Some(VariationValue::Boolean(true)));

		tokio::time::advance(Duration::from_secs(5)).await;
		settle().await;
		assert_eq!(source.calls(), 1, "fetch must run exactly once");
	}

	#[tokio::test]
	async fn patch_fetches_immediately() {
		let source = Arc::new(ScriptedSource::instant(VariationValue::String(
			"dark".to_string(),
		)));
		let (reconciler, cache, bus, _) = reconciler(
			Arc::clone(&source) as Arc<dyn EvaluationSource>,
			Duration::from_secs(1),
		);
		let mut changes = change_channel(&bus);

		reconciler.handle_event(FlagStreamEvent::Patch {
			identifier: "theme".to_string(),
		});

		let change = changes.recv().await.unwrap();
		match change {
			FlagChange::Updated(evaluation) => {
				assert_eq!(evaluation.flag, "theme");
				assert_eq!(evaluation.value, VariationValue::String("dark".to_string()));
			}
			other => panic!("expected Updated, got {other:?}"),
		}
		assert_eq!(
			cache.get("theme"),
			Some(VariationValue::String("dark".to_string()))
		);
	}

	#[tokio::test]
	async fn delete_applies_synchronously_with_marker() {
		let source = Arc::new(ScriptedSource::instant(VariationValue::Boolean(true)));
		let (reconciler, cache, bus, _) = reconciler(source, Duration::from_secs(1));
		cache.insert("a", VariationValue::Boolean(true));
		let mut changes = change_channel(&bus);

		reconciler.handle_event(FlagStreamEvent::Delete {
			identifier: "a".to_string(),
		});

		// No await between dispatch and the assertions: the delete path
		// completes before handle_event returns.
		assert_eq!(cache.get("a"), None);
		let change = changes.try_recv().unwrap();
		assert!(change.is_deleted());
		assert_eq!(change.flag(), "a");
	}

	#[tokio::test]
	async fn failed_point_fetch_keeps_stale_value() {
		let (reconciler, cache, bus, _) =
			reconciler(Arc::new(FailingSource), Duration::from_secs(1));
		cache.insert("a", VariationValue::Boolean(true));
		let mut changes = change_channel(&bus);
		let mut errors = error_channel(&bus);

		reconciler.reconcile_flag("a").await;

		assert_eq!(cache.get("a"), Some(VariationValue::Boolean(true)));
		assert!(changes.try_recv().is_err(), "no Changed event on failure");
		let error = errors.try_recv().unwrap();
		assert!(matches!(
			*error,
			FfError::ServerError { status: 404, .. }
		));
	}

	#[tokio::test]
	async fn close_during_in_flight_fetch_prevents_mutation() {
		tokio::time::pause();

		let source = Arc::new(ScriptedSource::new(vec![(
			Duration::from_millis(100),
			VariationValue::Boolean(true),
		)]));
		let (reconciler, cache, bus, closed) = reconciler(
			Arc::clone(&source) as Arc<dyn EvaluationSource>,
			Duration::from_secs(1),
		);
		let mut changes = change_channel(&bus);

		reconciler.handle_event(FlagStreamEvent::Patch {
			identifier: "a".to_string(),
		});
		settle().await;

		closed.store(true, Ordering::SeqCst);
		tokio::time::advance(Duration::from_millis(100)).await;
		settle().await;

		assert_eq!(source.calls(), 1);
		assert_eq!(cache.get("a"), None, "cache must not be mutated after close");
		assert!(changes.try_recv().is_err());
	}

	#[tokio::test]
	async fn delete_after_close_is_ignored() {
		let source = Arc::new(ScriptedSource::instant(VariationValue::Boolean(true)));
		let (reconciler, cache, bus, closed) = reconciler(source, Duration::from_secs(1));
		cache.insert("a", VariationValue::Boolean(true));
		let mut changes = change_channel(&bus);

		closed.store(true, Ordering::SeqCst);
		reconciler.handle_event(FlagStreamEvent::Delete {
			identifier: "a".to_string(),
		});

		assert_eq!(cache.get("a"), Some(VariationValue::Boolean(true)));
		assert!(changes.try_recv().is_err());
	}

	#[tokio::test]
	async fn overlapping_fetches_last_completion_wins() {
		tokio::time::pause();

		// First request resolves slowly, second quickly: the slow first
		// response completes last and must win.
		let source = Arc::new(ScriptedSource::new(vec![
			(Duration::from_millis(500), VariationValue::String("first".to_string())),
			(Duration::from_millis(50), VariationValue::String("second".to_string())),
		]));
		let (reconciler, cache, bus, _) = reconciler(
			Arc::clone(&source) as Arc<dyn EvaluationSource>,
			Duration::from_secs(1),
		);
		let mut changes = change_channel(&bus);

		reconciler.handle_event(FlagStreamEvent::Patch {
			identifier: "a".to_string(),
		});
		reconciler.handle_event(FlagStreamEvent::Patch {
			identifier: "a".to_string(),
		});

		// Auto-advance fires the 50ms fetch first, then the 500ms one.
		let first_completion = changes.recv().await.unwrap();
		match first_completion {
			FlagChange::Updated(evaluation) => {
				assert_eq!(evaluation.value, VariationValue::String("second".to_string()));
			}
			other => panic!("expected Updated, got {other:?}"),
		}

		let second_completion = changes.recv().await.unwrap();
		match second_completion {
			FlagChange::Updated(evaluation) => {
				assert_eq!(evaluation.value, VariationValue::String("first".to_string()));
			}
			other => panic!("expected Updated, got {other:?}"),
		}

		assert_eq!(
			cache.get("a"),
			Some(VariationValue::String("first".to_string())),
			"last completed fetch must win"
		);
	}

	#[tokio::test]
	async fn patches_for_distinct_flags_do_not_interfere() {
		let source = Arc::new(ScriptedSource::instant(VariationValue::Boolean(true)));
		let (reconciler, cache, bus, _) = reconciler(
			Arc::clone(&source) as Arc<dyn EvaluationSource>,
			Duration::from_secs(1),
		);
		let mut changes = change_channel(&bus);
		cache.insert("untouched", VariationValue::Boolean(false));

		for flag in ["a", "b", "c"] {
			reconciler.handle_event(FlagStreamEvent::Patch {
				identifier: flag.to_string(),
			});
		}
		for _ in 0..3 {
			changes.recv().await.unwrap();
		}

		assert_eq!(cache.get("a"), Some(VariationValue::Boolean(true)));
		assert_eq!(cache.get("b"), Some(VariationValue::Boolean(true)));
		assert_eq!(cache.get("c"), Some(VariationValue::Boolean(true)));
		assert_eq!(cache.get("untouched"), Some(VariationValue::Boolean(false)));
	}
}
