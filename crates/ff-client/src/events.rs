// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! In-process event fan-out to application subscribers.
//!
//! The bus is an observer registry owned by the client instance; there is
//! no process-wide singleton. Callbacks registered for an event kind run
//! in registration order. Cache mutation always happens before the
//! corresponding `Changed` emission, so a callback observing an event can
//! rely on `variation()` reflecting it.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use ff_client_core::{Evaluation, VariationValue};

use crate::error::FfError;

/// The kinds of events the client emits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
	/// Initialization finished; payload is the full cache snapshot.
	Ready,
	/// A single flag changed or was deleted.
	Changed,
	/// A failure was observed; see [`FfError`] for the taxonomy.
	Error,
	/// The push stream connected.
	Connected,
	/// The push stream disconnected.
	Disconnected,
}

/// A change to a single flag, carried by `Changed` events.
///
/// Deletion is a distinct marker so subscribers can tell "removed" apart
/// from "set to an empty value".
#[derive(Debug, Clone, PartialEq)]
pub enum FlagChange {
	/// The flag has a new evaluation.
	Updated(Evaluation),
	/// The flag was removed from the environment.
	Deleted {
		/// The removed flag identifier.
		flag: String,
	},
}

impl FlagChange {
	/// The identifier of the affected flag.
	pub fn flag(&self) -> &str {
		match self {
			FlagChange::Updated(evaluation) => &evaluation.flag,
			FlagChange::Deleted { flag } => flag,
		}
	}

	/// Returns true for the deletion marker.
	pub fn is_deleted(&self) -> bool {
		matches!(self, FlagChange::Deleted { .. })
	}
}

/// An event delivered to subscribers.
#[derive(Debug, Clone)]
pub enum ClientEvent {
	/// Initial bulk fetch complete; carries the cache snapshot.
	Ready(HashMap<String, VariationValue>),
	/// A flag changed or was deleted.
	Changed(FlagChange),
	/// A failure was observed. Shared so the event stays cheap to clone
	/// across the fan-out.
	Error(Arc<FfError>),
	/// Push stream connected.
	Connected,
	/// Push stream disconnected.
	Disconnected,
}

impl ClientEvent {
	/// Returns the kind this event is dispatched under.
	pub fn kind(&self) -> EventKind {
		match self {
			ClientEvent::Ready(_) => EventKind::Ready,
			ClientEvent::Changed(_) => EventKind::Changed,
			ClientEvent::Error(_) => EventKind::Error,
			ClientEvent::Connected => EventKind::Connected,
			ClientEvent::Disconnected => EventKind::Disconnected,
		}
	}
}

/// Handle identifying a registered callback, returned by [`EventBus::on`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

type Callback = Arc<dyn Fn(&ClientEvent) + Send + Sync>;

#[derive(Default)]
struct Registry {
	next_id: u64,
	listeners: HashMap<EventKind, Vec<(ListenerId, Callback)>>,
}

/// Instance-owned publish/subscribe relay.
///
/// Cheap to clone; clones share the same registry.
#[derive(Clone, Default)]
pub struct EventBus {
	inner: Arc<Mutex<Registry>>,
}

impl EventBus {
	/// Creates an empty bus.
	pub fn new() -> Self {
		Self::default()
	}

	/// Registers a callback for an event kind. Callbacks for a kind are
	/// invoked in registration order.
	pub fn on<F>(&self, kind: EventKind, callback: F) -> ListenerId
	where
		F: Fn(&ClientEvent) + Send + Sync + 'static,
	{
		let mut registry = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
		registry.next_id += 1;
		let id = ListenerId(registry.next_id);
		registry
			.listeners
			.entry(kind)
			.or_default()
			.push((id, Arc::new(callback)));
		id
	}

	/// Removes a single callback. Returns whether it was registered.
	pub fn off(&self, kind: EventKind, id: ListenerId) -> bool {
		let mut registry = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
		match registry.listeners.get_mut(&kind) {
			Some(callbacks) => {
				let before = callbacks.len();
				callbacks.retain(|(listener_id, _)| *listener_id != id);
				callbacks.len() != before
			}
			None => false,
		}
	}

	/// Removes every callback registered for a kind.
	pub fn off_all(&self, kind: EventKind) {
		self.inner
			.lock()
			.unwrap_or_else(PoisonError::into_inner)
			.listeners
			.remove(&kind);
	}

	/// Empties the registry. Used on shutdown.
	pub fn clear(&self) {
		self.inner
			.lock()
			.unwrap_or_else(PoisonError::into_inner)
			.listeners
			.clear();
	}

	/// Delivers an event to every callback registered for its kind.
	///
	/// The registry lock is released before callbacks run, so a callback
	/// may register or remove listeners without deadlocking.
	pub fn emit(&self, event: ClientEvent) {
		let callbacks: Vec<Callback> = {
			let registry = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
			registry
				.listeners
				.get(&event.kind())
				.map(|entries| entries.iter().map(|(_, cb)| Arc::clone(cb)).collect())
				.unwrap_or_default()
		};

		for callback in callbacks {
			callback(&event);
		}
	}

	/// Returns the number of callbacks registered for a kind.
	pub fn listener_count(&self, kind: EventKind) -> usize {
		self.inner
			.lock()
			.unwrap_or_else(PoisonError::into_inner)
			.listeners
			.get(&kind)
			.map(Vec::len)
			.unwrap_or(0)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::sync::atomic::{AtomicUsize, Ordering};

	#[test]
	fn callbacks_run_in_registration_order() {
		let bus = EventBus::new();
		let order = Arc::new(Mutex::new(Vec::new()));

		for label in ["first", "second", "third"] {
			let order = Arc::clone(&order);
			bus.on(EventKind::Connected, move |_| {
				order.lock().unwrap().push(label);
			});
		}

		bus.emit(ClientEvent::Connected);
		assert_eq!(*order.lock().unwrap(), vec!["first", "second", "third"]);
	}

	#[test]
	fn off_removes_only_the_given_callback() {
		let bus = EventBus::new();
		let count = Arc::new(AtomicUsize::new(0));

		let keep = Arc::clone(&count);
		bus.on(EventKind::Connected, move |_| {
			keep.fetch_add(1, Ordering::SeqCst);
		});
		let removed_count = Arc::clone(&count);
		let removed = bus.on(EventKind::Connected, move |_| {
			removed_count.fetch_add(100, Ordering::SeqCst);
		});

		assert!(bus.off(EventKind::Connected, removed));
		assert!(!bus.off(EventKind::Connected, removed));

		bus.emit(ClientEvent::Connected);
		assert_eq!(count.load(Ordering::SeqCst), 1);
	}

	#[test]
	fn off_all_clears_one_kind() {
		let bus = EventBus::new();
		bus.on(EventKind::Connected, |_| {});
		bus.on(EventKind::Disconnected, |_| {});

		bus.off_all(EventKind::Connected);

		assert_eq!(bus.listener_count(EventKind::Connected), 0);
		assert_eq!(bus.listener_count(EventKind::Disconnected), 1);
	}

	#[test]
	fn events_only_reach_their_kind() {
		let bus = EventBus::new();
		let count = Arc::new(AtomicUsize::new(0));

		let connected = Arc::clone(&count);
		bus.on(EventKind::Connected, move |_| {
			connected.fetch_add(1, Ordering::SeqCst);
		});

		bus.emit(ClientEvent::Disconnected);
		assert_eq!(count.load(Ordering::SeqCst), 0);
	}

	#[test]
	fn emit_without_listeners_is_a_no_op() {
		let bus = EventBus::new();
		bus.emit(ClientEvent::Ready(HashMap::new()));
	}

	#[test]
	fn callback_may_mutate_registry_during_emit() {
		let bus = EventBus::new();
		let count = Arc::new(AtomicUsize::new(0));

		let inner_bus = bus.clone();
		let inner_count = Arc::clone(&count);
		bus.on(EventKind::Connected, move |_| {
			let late = Arc::clone(&inner_count);
			inner_bus.on(EventKind::Disconnected, move |_| {
				late.fetch_add(1, Ordering::SeqCst);
			});
		});

		bus.emit(ClientEvent::Connected);
		bus.emit(ClientEvent::Disconnected);
		assert_eq!(count.load(Ordering::SeqCst), 1);
	}

	#[test]
	fn flag_change_accessors() {
		let change = FlagChange::Deleted {
			flag: "a".to_string(),
		};
		assert!(change.is_deleted());
		assert_eq!(change.flag(), "a");

		let change = FlagChange::Updated(Evaluation {
			flag: "b".to_string(),
			value: VariationValue::Boolean(true),
			kind: None,
			identifier: None,
		});
		assert!(!change.is_deleted());
		assert_eq!(change.flag(), "b");
	}
}
