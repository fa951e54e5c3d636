// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Sends a few events to the collector named by `SENTRY_DSN`.
//!
//! ```bash
//! SENTRY_DSN=https://public@sentry.example.com/42 cargo run -p loom-sentry --example capture
//! ```

use std::time::Duration;

use loom_sentry::{ClientOptions, Level, SentryLayer, User};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

fn main() -> Result<(), Box<dyn std::error::Error>> {
	tracing_subscriber::registry()
		.with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
		.with(tracing_subscriber::fmt::layer())
		.with(SentryLayer::new())
		.init();

	let hub = loom_sentry::init(ClientOptions {
		release: Some(concat!("capture-demo@", env!("CARGO_PKG_VERSION")).into()),
		attach_stacktrace: true,
		..ClientOptions::default()
	})?;
	loom_sentry::crash::install(&hub)?;

	loom_sentry::configure_scope(|scope| {
		scope.set_user(User {
			id: Some("demo".into()),
			..User::default()
		});
		scope.set_tag("example", "capture");
	});

	tracing::info!(step = 1, "loading configuration");
	if let Err(e) = std::fs::read("/nonexistent/config.toml") {
		loom_sentry::capture_error(&e);
	}
	tracing::warn!("falling back to defaults");
	tracing::error!(attempts = 3, "upstream unavailable");
	loom_sentry::capture_message("capture demo finished", Level::Info);

	match loom_sentry::get_last_event_id() {
		Some(id) => println!("last stored event: {id}"),
		None => println!("nothing was stored; is SENTRY_DSN set?"),
	}
	loom_sentry::shutdown(Duration::from_secs(2));
	Ok(())
}
