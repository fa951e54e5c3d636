// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Error types for the telemetry core.

use thiserror::Error;

/// Errors surfaced synchronously to callers of the telemetry client.
///
/// Only construction-path failures live here. Anything that goes wrong while
/// building or delivering an event is logged and swallowed by the SDK.
#[derive(Debug, Error)]
pub enum SentryError {
	#[error("invalid DSN: {0}")]
	InvalidDsn(String),

	#[error("invalid context: {0}")]
	InvalidContext(String),

	#[error("invalid level: {0}")]
	InvalidLevel(String),

	#[error("invalid event ID: {0}")]
	InvalidEventId(String),

	#[error("serialization error: {0}")]
	Serialization(#[from] serde_json::Error),
}

/// Result type for telemetry core operations.
pub type Result<T> = std::result::Result<T, SentryError>;
