// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! Tracing layer that forwards log events to a hub.

use std::fmt;

use loom_sentry_core::{Breadcrumb, Event as SentryEvent, Level};
use serde_json::{Map, Value};
use tracing::field::{Field, Visit};
use tracing::{Event, Subscriber};
use tracing_subscriber::layer::Context;
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::Layer;

use crate::hub::Hub;
use crate::queue::WORKER_THREAD_NAME;

/// Targets whose events are never forwarded.
const IGNORED_TARGETS: &[&str] = &["loom_sentry", "loom_common_http"];

/// What the layer does with a log event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogAction {
	/// Send an event with this level.
	Message(Level),
	/// Record a breadcrumb with this level.
	Breadcrumb(Level),
	Ignore,
}

/// Default mapping: errors become events, everything else a breadcrumb.
pub fn default_action(level: &tracing::Level) -> LogAction {
	match *level {
		tracing::Level::ERROR => LogAction::Message(Level::Error),
		tracing::Level::WARN => LogAction::Breadcrumb(Level::Warning),
		tracing::Level::INFO => LogAction::Breadcrumb(Level::Info),
		_ => LogAction::Breadcrumb(Level::Debug),
	}
}

type ActionFn = dyn Fn(&tracing::Level) -> LogAction + Send + Sync;

/// A tracing [`Layer`] reporting log events as messages or breadcrumbs.
///
/// Without an explicit hub, events go to the process-wide hub and are
/// dropped while none is installed. Events emitted by this crate and by the
/// delivery worker thread are skipped.
pub struct SentryLayer {
	hub: Option<Hub>,
	action: Box<ActionFn>,
}

impl SentryLayer {
	pub fn new() -> Self {
		Self {
			hub: None,
			action: Box::new(default_action),
		}
	}

	/// Reports to `hub` instead of the process-wide hub.
	pub fn with_hub(mut self, hub: Hub) -> Self {
		self.hub = Some(hub);
		self
	}

	/// Replaces the level mapping.
	pub fn with_action(
		mut self,
		action: impl Fn(&tracing::Level) -> LogAction + Send + Sync + 'static,
	) -> Self {
		self.action = Box::new(action);
		self
	}

	fn hub(&self) -> Option<Hub> {
		self.hub.clone().or_else(Hub::try_main)
	}
}

impl Default for SentryLayer {
	fn default() -> Self {
		Self::new()
	}
}

impl fmt::Debug for SentryLayer {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("SentryLayer")
			.field("hub", &self.hub)
			.finish_non_exhaustive()
	}
}

fn is_ignored(target: &str) -> bool {
	IGNORED_TARGETS.iter().any(|prefix| {
		target
			.strip_prefix(prefix)
			.is_some_and(|rest| rest.is_empty() || rest.starts_with("::"))
	}) || std::thread::current().name() == Some(WORKER_THREAD_NAME)
}

impl<S> Layer<S> for SentryLayer
where
	S: Subscriber + for<'a> LookupSpan<'a>,
{
	fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
		let metadata = event.metadata();
		let action = (self.action)(metadata.level());
		if action == LogAction::Ignore || is_ignored(metadata.target()) {
			return;
		}
		let Some(hub) = self.hub() else {
			return;
		};

		let mut visitor = FieldVisitor::default();
		event.record(&mut visitor);
		let message = visitor.message.unwrap_or_default();

		match action {
			LogAction::Message(level) => {
				let mut draft = SentryEvent::message(message, level);
				draft.logger = Some(metadata.target().to_string());
				draft.extra = visitor.fields;
				hub.capture_event(draft);
			}
			LogAction::Breadcrumb(level) => {
				let mut breadcrumb = Breadcrumb::new(metadata.target(), message).with_level(level);
				breadcrumb.data = visitor.fields;
				hub.add_breadcrumb(breadcrumb);
			}
			LogAction::Ignore => {}
		}
	}
}

/// Collects the `message` field and every other field as JSON.
#[derive(Default)]
struct FieldVisitor {
	message: Option<String>,
	fields: Map<String, Value>,
}

impl FieldVisitor {
	fn record(&mut self, field: &Field, value: Value) {
		if field.name() == "message" {
			self.message = Some(match value {
				Value::String(s) => s,
				other => other.to_string(),
			});
		} else {
			self.fields.insert(field.name().to_string(), value);
		}
	}
}

impl Visit for FieldVisitor {
	fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
		self.record(field, Value::String(format!("{value:?}")));
	}

	fn record_str(&mut self, field: &Field, value: &str) {
		self.record(field, Value::String(value.to_string()));
	}

	fn record_i64(&mut self, field: &Field, value: i64) {
		self.record(field, value.into());
	}

	fn record_u64(&mut self, field: &Field, value: u64) {
		self.record(field, value.into());
	}

	fn record_bool(&mut self, field: &Field, value: bool) {
		self.record(field, value.into());
	}

	fn record_f64(&mut self, field: &Field, value: f64) {
		self.record(field, value.into());
	}

	fn record_error(&mut self, field: &Field, value: &(dyn std::error::Error + 'static)) {
		self.record(field, Value::String(value.to_string()));
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::client::Client;
	use crate::transport::testing::RecordingTransport;
	use std::sync::Arc;
	use tracing_subscriber::layer::SubscriberExt;

	fn hub_with(transport: &RecordingTransport) -> Hub {
		let client = Client::builder()
			.dsn("http://abc@127.0.0.1:5000/7")
			.transport(Arc::new(transport.clone()))
			.build()
			.unwrap();
		Hub::new(client)
	}

	#[test]
	fn test_default_mapping() {
		assert_eq!(
			default_action(&tracing::Level::ERROR),
			LogAction::Message(Level::Error)
		);
		assert_eq!(
			default_action(&tracing::Level::WARN),
			LogAction::Breadcrumb(Level::Warning)
		);
		assert_eq!(
			default_action(&tracing::Level::INFO),
			LogAction::Breadcrumb(Level::Info)
		);
		assert_eq!(
			default_action(&tracing::Level::TRACE),
			LogAction::Breadcrumb(Level::Debug)
		);
	}

	#[test]
	fn test_own_targets_are_ignored() {
		assert!(is_ignored("loom_sentry"));
		assert!(is_ignored("loom_sentry::queue"));
		assert!(is_ignored("loom_common_http::gzip"));
		assert!(!is_ignored("loom_sentry_demo"));
		assert!(!is_ignored("my_app::billing"));
	}

	#[test]
	fn test_errors_become_events_and_info_breadcrumbs() {
		let transport = RecordingTransport::default();
		let hub = hub_with(&transport);
		let subscriber = tracing_subscriber::registry().with(SentryLayer::new().with_hub(hub.clone()));

		tracing::subscriber::with_default(subscriber, || {
			tracing::info!(target: "my_app", user_id = 7, "checkout started");
			tracing::error!(target: "my_app", order = "A-1", "payment failed");
		});
		hub.get_last_event_id();

		let requests = transport.requests();
		assert_eq!(requests.len(), 1);
		let body = loom_common_http::gunzip(&requests[0].body).unwrap();
		let event: Value = serde_json::from_slice(&body).unwrap();
		assert_eq!(event["message"], "payment failed");
		assert_eq!(event["level"], "error");
		assert_eq!(event["logger"], "my_app");
		assert_eq!(event["extra"]["order"], "A-1");

		let crumb = &event["breadcrumbs"]["values"][0];
		assert_eq!(crumb["message"], "checkout started");
		assert_eq!(crumb["category"], "my_app");
		assert_eq!(crumb["data"]["user_id"], 7);
	}

	#[test]
	fn test_custom_mapping_can_ignore() {
		let transport = RecordingTransport::default();
		let hub = hub_with(&transport);
		let layer = SentryLayer::new()
			.with_hub(hub.clone())
			.with_action(|_| LogAction::Ignore);
		let subscriber = tracing_subscriber::registry().with(layer);

		tracing::subscriber::with_default(subscriber, || {
			tracing::error!(target: "my_app", "ignored");
		});
		hub.get_last_event_id();

		assert!(transport.requests().is_empty());
		assert!(hub.scope().breadcrumbs().is_empty());
	}
}
