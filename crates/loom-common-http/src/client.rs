// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! Shared HTTP client builder.

use reqwest::{Client, ClientBuilder};

/// Creates an HTTP client builder that identifies itself as `user_agent`.
///
/// Callers finish the builder themselves so construction failures surface as
/// a `reqwest::Error` instead of a panic.
///
/// # Example
/// ```ignore
/// let client = loom_common_http::builder_with_user_agent("loom-sentry-rust/0.1.0")
///     .timeout(Duration::from_secs(2))
///     .build()?;
/// ```
pub fn builder_with_user_agent(user_agent: impl Into<String>) -> ClientBuilder {
	Client::builder().user_agent(user_agent.into())
}
