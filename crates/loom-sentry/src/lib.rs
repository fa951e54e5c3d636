// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Error and crash telemetry for Rust applications.
//!
//! Events are posted to any collector speaking the Sentry store protocol.
//! Captures are cheap for the caller: the event is enriched from the active
//! scope, serialized, and handed to a single background worker that delivers
//! it with a bounded timeout.
//!
//! # Quick Start
//!
//! ```ignore
//! use loom_sentry::{ClientOptions, Level};
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let hub = loom_sentry::init(ClientOptions {
//!         dsn: Some("https://public@sentry.example.com/42".into()),
//!         release: Some(env!("CARGO_PKG_VERSION").into()),
//!         ..Default::default()
//!     })?;
//!
//!     // Report signals and panics
//!     loom_sentry::crash::install(&hub)?;
//!
//!     loom_sentry::configure_scope(|scope| scope.set_tag("server", "web-01"));
//!     loom_sentry::capture_message("application started", Level::Info);
//!
//!     if let Err(e) = std::fs::read("config.toml") {
//!         loom_sentry::capture_error(&e);
//!     }
//!
//!     loom_sentry::shutdown(std::time::Duration::from_secs(2));
//!     Ok(())
//! }
//! ```
//!
//! # Features
//!
//! - **Scopes**: user, request, tags, extra, and breadcrumbs merged into every event
//! - **Before-send hook**: inspect, edit, or drop events before delivery
//! - **Crash reporting**: POSIX signal handlers and a panic hook
//! - **Logging**: a `tracing` layer turning log events into events or breadcrumbs
//! - **Sampling**: a configurable share of events is sent

pub mod backtrace;
pub mod client;
pub mod crash;
pub mod error;
pub mod exception;
pub mod hub;
pub mod options;
pub mod queue;
pub mod scope;
pub mod sentry_layer;
pub mod system;
pub mod transport;

use std::error::Error;
use std::time::Duration;

pub use client::{Client, ClientBuilder, SDK_NAME, SDK_VERSION};
pub use error::{Result, SdkError, TransportError};
pub use hub::{BeforeSend, Hub};
pub use options::ClientOptions;
pub use scope::{Scope, ScopeState};
pub use sentry_layer::{LogAction, SentryLayer};
pub use transport::{ReqwestTransport, Transport, TransportRequest, TransportResponse};

pub use loom_sentry_core::{
	Breadcrumb, BreadcrumbType, Contexts, Credentials, Event, EventId, Exception, Frame, Level,
	Mechanism, Request, SentryError, Stacktrace, User,
};

/// Builds a client from `options` and installs a hub for it as the
/// process-wide hub used by the free functions in this crate.
///
/// The returned handle refers to the same hub. An empty DSN yields a hub
/// that silently drops everything; a malformed one is an error.
pub fn init(options: ClientOptions) -> Result<Hub> {
	let hub = Hub::new(Client::from_options(options)?);
	if let Some(previous) = Hub::set_main(Some(hub.clone())) {
		previous.close(Duration::ZERO);
	}
	Ok(hub)
}

/// Closes the process-wide hub, waiting up to `timeout` for queued events,
/// and removes the crash handlers. Returns `true` if everything was sent.
pub fn shutdown(timeout: Duration) -> bool {
	crash::uninstall();
	match Hub::set_main(None) {
		Some(hub) => hub.close(timeout),
		None => true,
	}
}

pub fn capture_message(message: impl Into<String>, level: Level) -> Option<EventId> {
	Hub::try_main()?.capture_message(message, level)
}

pub fn capture_event(event: Event) -> Option<EventId> {
	Hub::try_main()?.capture_event(event)
}

pub fn capture_error(err: &(dyn Error + 'static)) -> Option<EventId> {
	Hub::try_main()?.capture_error(err)
}

pub fn capture_signal(signal: i32, handled: bool) -> Option<EventId> {
	Hub::try_main()?.capture_signal(signal, handled)
}

/// Sends the calling thread's last OS error, read before anything else runs.
/// `errno` holds the same value afterwards.
pub fn capture_last_os_error() -> Option<EventId> {
	let err = std::io::Error::last_os_error();
	let id = Hub::try_main().and_then(|hub| hub.capture_os_error(&err));
	system::restore_errno(&err);
	id
}

pub fn add_breadcrumb(breadcrumb: Breadcrumb) {
	if let Some(hub) = Hub::try_main() {
		hub.add_breadcrumb(breadcrumb);
	}
}

/// Runs `f` against the active scope of the process-wide hub. Returns `None`
/// before [`init`].
pub fn configure_scope<R>(f: impl FnOnce(&Scope) -> R) -> Option<R> {
	Hub::try_main().map(|hub| hub.configure_scope(f))
}

/// Runs `f` with a temporary scope. `f` still runs before [`init`], against
/// a detached scope.
pub fn with_scope<R>(f: impl FnOnce(&Scope) -> R) -> R {
	match Hub::try_main() {
		Some(hub) => hub.with_scope(f),
		None => f(&Scope::new(options::DEFAULT_MAX_BREADCRUMBS)),
	}
}

pub fn set_before_send_hook(hook: impl Fn(&mut Event) -> bool + Send + Sync + 'static) {
	if let Some(hub) = Hub::try_main() {
		hub.set_before_send_hook(hook);
	}
}

pub fn get_last_event_id() -> Option<String> {
	Hub::try_main()?.get_last_event_id()
}

pub fn flush(timeout: Duration) -> bool {
	Hub::try_main().map_or(true, |hub| hub.flush(timeout))
}
