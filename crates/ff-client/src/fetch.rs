// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Evaluation fetchers.
//!
//! [`EvaluationSource`] is the seam between the reconciler and the
//! network: the bulk fetch that seeds the cache and the point fetch that
//! reconciles a single flag after a stream notification. Production uses
//! [`HttpEvaluationSource`]; tests substitute mock sources with
//! controllable latency.

use async_trait::async_trait;
use ff_client_core::Evaluation;
use reqwest::Client;
use tracing::debug;

use crate::auth::AuthSession;
use crate::error::{FfError, Result};

/// Fetches evaluations for the authenticated target.
#[async_trait]
pub trait EvaluationSource: Send + Sync {
	/// Fetches the full evaluation set for the target.
	async fn fetch_all(&self) -> Result<Vec<Evaluation>>;

	/// Fetches the evaluation of a single flag.
	async fn fetch_flag(&self, identifier: &str) -> Result<Evaluation>;
}

/// HTTP implementation against the flag evaluation service.
pub struct HttpEvaluationSource {
	http: Client,
	base_url: String,
	session: AuthSession,
	target_identifier: String,
}

impl HttpEvaluationSource {
	/// Creates a source bound to one session and target.
	pub fn new(
		http: Client,
		base_url: impl Into<String>,
		session: AuthSession,
		target_identifier: impl Into<String>,
	) -> Self {
		Self {
			http,
			base_url: base_url.into(),
			session,
			target_identifier: target_identifier.into(),
		}
	}

	fn evaluations_url(&self) -> String {
		format!(
			"{}/client/env/{}/target/{}/evaluations",
			self.base_url, self.session.environment, self.target_identifier
		)
	}

	async fn get_json<T: serde::de::DeserializeOwned>(&self, url: &str) -> Result<T> {
		let mut request = self
			.http
			.get(url)
			.header("Authorization", format!("Bearer {}", self.session.token));
		if let Some(cluster) = &self.session.cluster_identifier {
			request = request.query(&[("cluster", cluster.as_str())]);
		}

		let response = request.send().await?;

		if !response.status().is_success() {
			let status = response.status().as_u16();
			let message = response.text().await.unwrap_or_default();
			return Err(FfError::ServerError { status, message });
		}

		Ok(response.json().await?)
	}
}

#[async_trait]
impl EvaluationSource for HttpEvaluationSource {
	async fn fetch_all(&self) -> Result<Vec<Evaluation>> {
		let url = self.evaluations_url();
		debug!(url = %url, "Fetching all evaluations");

		let evaluations: Vec<Evaluation> = self.get_json(&url).await?;
		debug!(count = evaluations.len(), "Bulk evaluation fetch complete");
		Ok(evaluations)
	}

	async fn fetch_flag(&self, identifier: &str) -> Result<Evaluation> {
		let url = format!("{}/{}", self.evaluations_url(), identifier);
		debug!(url = %url, flag = %identifier, "Fetching single evaluation");

		self.get_json(&url).await
	}
}
