// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! In-memory evaluation cache.
//!
//! Maps flag identifiers to their currently effective values for the
//! authenticated target. The cache has no knowledge of the network; it is
//! mutated only by the bulk fetcher (additive merge), the point-fetch
//! reconcile path (single replace), and the stream delete path (single
//! removal).
//!
//! Lookups are synchronous and never await, which is why this uses a
//! `std::sync::RwLock` rather than an async lock: `variation()` must not
//! block or suspend. Write critical sections are single map operations.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use ff_client_core::{Evaluation, VariationValue};
use tracing::debug;

/// Cheap-to-clone handle to the evaluation cache.
///
/// Clones share the same underlying map; the fetchers, the reconciler,
/// and the public facade each hold a clone.
#[derive(Debug, Clone, Default)]
pub struct EvaluationCache {
	inner: Arc<RwLock<HashMap<String, VariationValue>>>,
}

impl EvaluationCache {
	/// Creates an empty cache.
	pub fn new() -> Self {
		Self::default()
	}

	/// Returns the cached value for `flag`, if present.
	pub fn get(&self, flag: &str) -> Option<VariationValue> {
		self.inner
			.read()
			.unwrap_or_else(PoisonError::into_inner)
			.get(flag)
			.cloned()
	}

	/// Returns a point-in-time copy of the whole cache.
	pub fn snapshot(&self) -> HashMap<String, VariationValue> {
		self.inner
			.read()
			.unwrap_or_else(PoisonError::into_inner)
			.clone()
	}

	/// Inserts or replaces the value for a single flag.
	pub fn insert(&self, flag: impl Into<String>, value: VariationValue) {
		self.inner
			.write()
			.unwrap_or_else(PoisonError::into_inner)
			.insert(flag.into(), value);
	}

	/// Additively merges a set of evaluations, one entry per flag.
	/// Returns the number of entries written.
	pub fn merge(&self, evaluations: impl IntoIterator<Item = Evaluation>) -> usize {
		let mut map = self.inner.write().unwrap_or_else(PoisonError::into_inner);
		let mut written = 0;
		for evaluation in evaluations {
			map.insert(evaluation.flag, evaluation.value);
			written += 1;
		}
		written
	}

	/// Removes a flag. Returns whether an entry was present.
	pub fn remove(&self, flag: &str) -> bool {
		let removed = self
			.inner
			.write()
			.unwrap_or_else(PoisonError::into_inner)
			.remove(flag)
			.is_some();
		debug!(flag = %flag, removed, "Removed flag from cache");
		removed
	}

	/// Empties the cache.
	pub fn clear(&self) {
		self.inner
			.write()
			.unwrap_or_else(PoisonError::into_inner)
			.clear();
	}

	/// Returns the number of cached flags.
	pub fn len(&self) -> usize {
		self.inner
			.read()
			.unwrap_or_else(PoisonError::into_inner)
			.len()
	}

	/// Returns true if no flags are cached.
	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}
}
