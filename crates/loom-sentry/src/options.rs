// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Client configuration.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::transport::Transport;

/// Environment variable consulted when no DSN is configured.
pub const DSN_ENV: &str = "SENTRY_DSN";
/// Environment variable consulted when no environment name is configured.
pub const ENVIRONMENT_ENV: &str = "SENTRY_ENVIRONMENT";
/// Environment variable overriding the reported hostname.
pub const HOSTNAME_ENV: &str = "LOOM_SENTRY_HOSTNAME";

/// Default number of breadcrumbs kept per scope.
pub const DEFAULT_MAX_BREADCRUMBS: usize = 50;
/// Default bound on a single delivery attempt.
pub const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_millis(2000);
/// Default number of unresolved delivery jobs before capture calls wait.
pub const DEFAULT_MAX_PENDING_JOBS: usize = 32;

/// Predicate marking a module (e.g. `serde_json::de`) as third-party code.
pub type SymbolPredicate = Arc<dyn Fn(&str) -> bool + Send + Sync>;

/// Configuration for the telemetry client.
#[derive(Clone)]
pub struct ClientOptions {
	/// Collector DSN. `None` falls back to `SENTRY_DSN`; an empty string
	/// disables the client.
	pub dsn: Option<String>,
	/// Environment name. `None` falls back to `SENTRY_ENVIRONMENT`.
	pub environment: Option<String>,
	pub release: Option<String>,
	/// Reported hostname. `None` falls back to `LOOM_SENTRY_HOSTNAME`, then
	/// the OS hostname.
	pub server_name: Option<String>,
	/// Probability in `[0, 1]` that an event is sent.
	pub sample_rate: f64,
	pub max_breadcrumbs: usize,
	pub http_timeout: Duration,
	pub max_pending_jobs: usize,
	/// Attach the capturing thread's stack to message events.
	pub attach_stacktrace: bool,
	/// Frames from modules matching this are reported as not in-app.
	pub symbol_is_external: Option<SymbolPredicate>,
	/// Replaces the default reqwest transport.
	pub transport: Option<Arc<dyn Transport>>,
}

impl Default for ClientOptions {
	fn default() -> Self {
		Self {
			dsn: None,
			environment: None,
			release: None,
			server_name: None,
			sample_rate: 1.0,
			max_breadcrumbs: DEFAULT_MAX_BREADCRUMBS,
			http_timeout: DEFAULT_HTTP_TIMEOUT,
			max_pending_jobs: DEFAULT_MAX_PENDING_JOBS,
			attach_stacktrace: false,
			symbol_is_external: None,
			transport: None,
		}
	}
}

impl fmt::Debug for ClientOptions {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("ClientOptions")
			.field("dsn", &self.dsn.as_ref().map(|_| "[REDACTED]"))
			.field("environment", &self.environment)
			.field("release", &self.release)
			.field("server_name", &self.server_name)
			.field("sample_rate", &self.sample_rate)
			.field("max_breadcrumbs", &self.max_breadcrumbs)
			.field("http_timeout", &self.http_timeout)
			.field("max_pending_jobs", &self.max_pending_jobs)
			.field("attach_stacktrace", &self.attach_stacktrace)
			.field("symbol_is_external", &self.symbol_is_external.is_some())
			.field("transport", &self.transport.is_some())
			.finish()
	}
}

impl ClientOptions {
	/// Fills unset fields from the environment and normalizes ranges.
	pub(crate) fn resolve(mut self) -> Self {
		if self.dsn.is_none() {
			self.dsn = Some(std::env::var(DSN_ENV).unwrap_or_default());
		}
		if self.environment.is_none() {
			self.environment = non_empty_env(ENVIRONMENT_ENV);
		}
		if self.server_name.is_none() {
			self.server_name = non_empty_env(HOSTNAME_ENV).or_else(crate::system::hostname);
		}
		self.sample_rate = if self.sample_rate.is_nan() {
			1.0
		} else {
			self.sample_rate.clamp(0.0, 1.0)
		};
		self
	}

	/// Whether a module belongs to third-party code.
	pub fn is_external(&self, module: &str) -> bool {
		self.symbol_is_external
			.as_ref()
			.is_some_and(|predicate| predicate(module))
	}
}

fn non_empty_env(name: &str) -> Option<String> {
	std::env::var(name).ok().filter(|value| !value.is_empty())
}
