// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Core types for the Loom error telemetry client.
//!
//! This crate holds everything that does not need a runtime: DSN parsing and
//! the credentials derived from it, and the event payload model posted to a
//! Sentry-protocol collector. It is used by `loom-sentry`, which owns the
//! scope, hub, delivery queue and crash handlers.

pub mod breadcrumb;
pub mod context;
pub mod dsn;
pub mod error;
pub mod event;
pub mod exception;

pub use breadcrumb::{Breadcrumb, BreadcrumbType};
pub use context::{AppContext, Contexts, DeviceContext, OsContext, Request, RuntimeContext, User};
pub use dsn::{Credentials, Scheme, AUTH_HEADER, PROTOCOL_VERSION};
pub use error::{Result, SentryError};
pub use event::{
	ClientSdkInfo, ErrnoMeta, Event, EventId, Exception, Frame, Level, Mechanism, MechanismMeta,
	SignalMeta, Stacktrace, Values, PLATFORM,
};
pub use exception::{signal_info, SignalInfo};
