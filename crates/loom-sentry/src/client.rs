// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Telemetry client: owns the credentials and the delivery queue.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use loom_sentry_core::{
	AppContext, ClientSdkInfo, Credentials, Event, EventId, Stacktrace, PLATFORM,
};
use tracing::{debug, info, warn};

use crate::backtrace;
use crate::error::Result;
use crate::options::{ClientOptions, SymbolPredicate};
use crate::queue::{DeliveryConfig, DeliveryQueue};
use crate::scope::{Scope, ScopeState};
use crate::system;
use crate::transport::{ReqwestTransport, Transport};

/// SDK name for identification.
pub const SDK_NAME: &str = "loom-sentry-rust";
/// SDK version for identification.
pub const SDK_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Builder for constructing a [`Client`].
#[derive(Debug, Default)]
pub struct ClientBuilder {
	options: ClientOptions,
}

impl ClientBuilder {
	pub fn new() -> Self {
		Self::default()
	}

	/// Sets the collector DSN. An empty string disables the client.
	pub fn dsn(mut self, dsn: impl Into<String>) -> Self {
		self.options.dsn = Some(dsn.into());
		self
	}

	/// Sets the environment name.
	///
	/// Example: `production`, `staging`, `development`
	pub fn environment(mut self, environment: impl Into<String>) -> Self {
		self.options.environment = Some(environment.into());
		self
	}

	/// Sets the release version.
	///
	/// Example: `1.2.3` or a git commit SHA
	pub fn release(mut self, release: impl Into<String>) -> Self {
		self.options.release = Some(release.into());
		self
	}

	pub fn server_name(mut self, name: impl Into<String>) -> Self {
		self.options.server_name = Some(name.into());
		self
	}

	/// Sets the probability that an event is sent. Clamped to `[0, 1]`.
	pub fn sample_rate(mut self, rate: f64) -> Self {
		self.options.sample_rate = rate;
		self
	}

	pub fn max_breadcrumbs(mut self, max: usize) -> Self {
		self.options.max_breadcrumbs = max;
		self
	}

	pub fn http_timeout(mut self, timeout: Duration) -> Self {
		self.options.http_timeout = timeout;
		self
	}

	pub fn max_pending_jobs(mut self, max: usize) -> Self {
		self.options.max_pending_jobs = max;
		self
	}

	pub fn attach_stacktrace(mut self, enabled: bool) -> Self {
		self.options.attach_stacktrace = enabled;
		self
	}

	pub fn symbol_is_external(mut self, predicate: impl Fn(&str) -> bool + Send + Sync + 'static) -> Self {
		let predicate: SymbolPredicate = Arc::new(predicate);
		self.options.symbol_is_external = Some(predicate);
		self
	}

	/// Replaces the default reqwest transport.
	pub fn transport(mut self, transport: Arc<dyn Transport>) -> Self {
		self.options.transport = Some(transport);
		self
	}

	pub fn build(self) -> Result<Client> {
		Client::from_options(self.options)
	}
}

/// Event fields computed once at construction.
struct EventDefaults {
	sdk: ClientSdkInfo,
	start_time: DateTime<Utc>,
	pid: u32,
	os: loom_sentry_core::OsContext,
	device: loom_sentry_core::DeviceContext,
	runtime: loom_sentry_core::RuntimeContext,
}

struct ClientInner {
	options: ClientOptions,
	credentials: Option<Credentials>,
	queue: Option<DeliveryQueue>,
	defaults: EventDefaults,
	closed: AtomicBool,
}

/// Client for capturing events and delivering them to a collector.
///
/// A client built from an empty DSN is disabled: every capture call is
/// accepted and ignored.
///
/// # Example
///
/// ```ignore
/// use loom_sentry::Client;
///
/// let client = Client::builder()
///     .dsn("https://public@sentry.example.com/42")
///     .environment("production")
///     .release(env!("CARGO_PKG_VERSION"))
///     .build()?;
///
/// client.capture_event(Event::message("hello", Level::Info));
/// let stored = client.get_last_event_id();
/// ```
#[derive(Clone)]
pub struct Client {
	inner: Arc<ClientInner>,
}

impl Client {
	pub fn builder() -> ClientBuilder {
		ClientBuilder::new()
	}

	/// Builds a client, resolving unset options from the environment.
	///
	/// Fails with `InvalidDsn` for a malformed non-empty DSN.
	pub fn from_options(options: ClientOptions) -> Result<Self> {
		let options = options.resolve();
		let credentials = Credentials::parse(options.dsn.as_deref().unwrap_or_default())?;

		let sdk_ident = format!("{SDK_NAME}/{SDK_VERSION}");
		let queue = match &credentials {
			Some(credentials) => {
				let transport: Arc<dyn Transport> = match &options.transport {
					Some(transport) => Arc::clone(transport),
					None => Arc::new(ReqwestTransport::new(&sdk_ident, options.http_timeout)?),
				};
				Some(DeliveryQueue::start(DeliveryConfig {
					credentials: credentials.clone(),
					transport,
					http_timeout: options.http_timeout,
					max_pending_jobs: options.max_pending_jobs,
					sdk_ident,
				})?)
			}
			None => None,
		};

		match &credentials {
			Some(credentials) => info!(
				host = %credentials.host(),
				project_id = %credentials.project_id(),
				environment = ?options.environment,
				sample_rate = options.sample_rate,
				"telemetry client initialized"
			),
			None => info!("telemetry client disabled: no DSN configured"),
		}

		let defaults = EventDefaults {
			sdk: ClientSdkInfo {
				name: SDK_NAME.to_string(),
				version: SDK_VERSION.to_string(),
				integrations: Vec::new(),
			},
			start_time: Utc::now(),
			pid: std::process::id(),
			os: system::os_context(),
			device: system::device_context(options.server_name.as_deref()),
			runtime: system::runtime_context(),
		};

		Ok(Self {
			inner: Arc::new(ClientInner {
				options,
				credentials,
				queue,
				defaults,
				closed: AtomicBool::new(false),
			}),
		})
	}

	/// Resolved options.
	pub fn options(&self) -> &ClientOptions {
		&self.inner.options
	}

	pub fn credentials(&self) -> Option<&Credentials> {
		self.inner.credentials.as_ref()
	}

	/// True when the client has credentials and has not been closed.
	pub fn is_enabled(&self) -> bool {
		self.inner.queue.is_some() && !self.inner.closed.load(Ordering::SeqCst)
	}

	/// Scope seeded from the configuration, used as the root of a hub.
	pub fn new_scope(&self) -> Scope {
		let state = ScopeState {
			environment: self.inner.options.environment.clone(),
			..ScopeState::default()
		};
		Scope::with_state(self.inner.options.max_breadcrumbs, state)
	}

	/// Captures and symbolizes the current stack, classifying frames with the
	/// configured `symbol_is_external` predicate.
	#[inline(never)]
	pub fn capture_stacktrace(&self, skip_frames: usize) -> Stacktrace {
		let options = &self.inner.options;
		backtrace::capture(skip_frames + 1, &|module: &str| options.is_external(module))
	}

	/// Stamps, samples, serializes, and queues an event.
	///
	/// Returns the event ID if the event was queued. `None` means it was
	/// dropped: disabled client, sampled out, or serialization failure.
	/// Delivery itself is best-effort and happens in the background.
	pub fn capture_event(&self, event: Event) -> Option<EventId> {
		let (event_id, body) = self.prepare(event)?;
		let queue = self.inner.queue.as_ref()?;
		if queue.enqueue(event_id, body) {
			debug!(event_id = %event_id, "event queued");
			Some(event_id)
		} else {
			warn!(event_id = %event_id, "event dropped: client closed");
			None
		}
	}

	/// Like [`Client::capture_event`] but never waits for a lock or for room
	/// in the queue. Used from crash handlers; does not log.
	pub fn capture_crash_event(&self, event: Event) -> Option<EventId> {
		let (event_id, body) = self.prepare_quiet(event)?;
		let queue = self.inner.queue.as_ref()?;
		queue.try_enqueue(event_id, body).then_some(event_id)
	}

	fn prepare(&self, event: Event) -> Option<(EventId, Vec<u8>)> {
		if !self.is_enabled() {
			return None;
		}
		if !self.sampled() {
			debug!(sample_rate = self.inner.options.sample_rate, "event dropped by sampling");
			return None;
		}
		let event = self.stamp(event);
		let event_id = event.event_id?;
		match serde_json::to_vec(&event) {
			Ok(body) => Some((event_id, body)),
			Err(e) => {
				warn!(event_id = %event_id, error = %e, "failed to serialize event");
				None
			}
		}
	}

	fn prepare_quiet(&self, event: Event) -> Option<(EventId, Vec<u8>)> {
		if !self.is_enabled() || !self.sampled() {
			return None;
		}
		let event = self.stamp(event);
		let event_id = event.event_id?;
		serde_json::to_vec(&event).ok().map(|body| (event_id, body))
	}

	fn sampled(&self) -> bool {
		fastrand::f64() < self.inner.options.sample_rate
	}

	/// Assigns a fresh ID and timestamp and fills unset defaults.
	fn stamp(&self, mut event: Event) -> Event {
		let options = &self.inner.options;
		let defaults = &self.inner.defaults;

		event.event_id = Some(EventId::new());
		event.timestamp = Some(Utc::now());
		event.platform.get_or_insert_with(|| PLATFORM.to_string());
		event.sdk.get_or_insert_with(|| defaults.sdk.clone());
		if event.server_name.is_none() {
			event.server_name = options.server_name.clone();
		}
		if event.release.is_none() {
			event.release = options.release.clone();
		}
		if event.environment.is_none() {
			event.environment = options.environment.clone();
		}

		let contexts = &mut event.contexts;
		contexts.os.get_or_insert_with(|| defaults.os.clone());
		contexts.device.get_or_insert_with(|| defaults.device.clone());
		contexts.runtime.get_or_insert_with(|| defaults.runtime.clone());
		contexts
			.app
			.get_or_insert_with(AppContext::default)
			.app_start_time
			.get_or_insert(defaults.start_time);

		event
			.extra
			.entry("PID")
			.or_insert_with(|| serde_json::Value::from(defaults.pid));

		event
	}

	/// Waits until every queued event has been resolved and returns the
	/// collector-assigned ID of the most recent successful delivery.
	///
	/// Returns immediately when nothing is queued, and `None` if nothing was
	/// ever delivered.
	pub fn get_last_event_id(&self) -> Option<String> {
		self.inner.queue.as_ref()?.last_event_id()
	}

	/// Waits up to `timeout` for queued events. Returns `true` once drained.
	pub fn flush(&self, timeout: Duration) -> bool {
		match &self.inner.queue {
			Some(queue) => queue.flush(timeout),
			None => true,
		}
	}

	/// Non-blocking variant of [`Client::flush`] for crash handlers.
	pub fn try_flush(&self, timeout: Duration) -> bool {
		match &self.inner.queue {
			Some(queue) => queue.try_flush(timeout),
			None => true,
		}
	}

	/// Refuses further captures and waits up to `timeout` for queued events.
	pub fn close(&self, timeout: Duration) -> bool {
		if self.inner.closed.swap(true, Ordering::SeqCst) {
			return self.flush(timeout);
		}
		let drained = match &self.inner.queue {
			Some(queue) => queue.close(timeout),
			None => true,
		};
		info!(drained, "telemetry client closed");
		drained
	}

	pub fn is_closed(&self) -> bool {
		self.inner.closed.load(Ordering::SeqCst)
	}
}

impl std::fmt::Debug for Client {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("Client")
			.field("credentials", &self.inner.credentials)
			.field("options", &self.inner.options)
			.field("closed", &self.is_closed())
			.finish()
	}
}
