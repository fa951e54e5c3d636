// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Error types for the telemetry SDK.

use std::time::Duration;

use loom_sentry_core::SentryError;
use thiserror::Error;

/// Result type alias for SDK operations.
pub type Result<T> = std::result::Result<T, SdkError>;

/// Errors returned from SDK construction and configuration calls.
///
/// Capture calls never return these; delivery problems are logged and the
/// event is dropped.
#[derive(Debug, Error)]
pub enum SdkError {
	/// Invalid DSN, context object, or other malformed input.
	#[error(transparent)]
	Core(#[from] SentryError),

	/// The HTTP client backing the default transport could not be built.
	#[error("failed to build HTTP client: {0}")]
	HttpClient(#[from] reqwest::Error),

	/// The delivery worker thread could not be spawned.
	#[error("failed to start delivery worker: {0}")]
	Worker(#[from] std::io::Error),
}

/// Outcome of a failed delivery attempt.
#[derive(Debug, Error)]
pub enum TransportError {
	/// The attempt did not complete within the configured HTTP timeout.
	#[error("request timed out after {0:?}")]
	Timeout(Duration),

	/// Connection, TLS, or protocol failure.
	#[error("request failed: {0}")]
	Request(String),

	/// The collector answered with a non-2xx status.
	#[error("collector returned status {status}: {body}")]
	Status {
		/// HTTP status code.
		status: u16,
		/// Response body, possibly truncated.
		body: String,
	},

	/// The response body was not a JSON object carrying an `id`.
	#[error("invalid collector response: {0}")]
	InvalidResponse(String),
}

impl From<reqwest::Error> for TransportError {
	fn from(err: reqwest::Error) -> Self {
		Self::Request(err.to_string())
	}
}
