// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Builds exception values from Rust errors, panics, and OS errors.

use std::error::Error;
use std::panic::PanicHookInfo;

use loom_sentry_core::{Exception, Mechanism, Stacktrace};

pub const ERROR_MECHANISM: &str = "error";
pub const PANIC_MECHANISM: &str = "panic";

/// Converts an error and its `source()` chain into exception values.
///
/// The root cause comes first and `err` itself last, which is where the
/// mechanism and the stack trace are attached.
pub fn exceptions_from_error(
	err: &(dyn Error + 'static),
	handled: bool,
	stacktrace: Option<Stacktrace>,
) -> Vec<Exception> {
	let mut chain = Vec::new();
	let mut current: Option<&(dyn Error + 'static)> = Some(err);
	while let Some(err) = current {
		chain.push(Exception {
			ty: type_name_from_debug(&format!("{err:?}")),
			value: Some(err.to_string()),
			..Exception::default()
		});
		current = err.source();
	}
	chain.reverse();

	if let Some(outermost) = chain.last_mut() {
		outermost.mechanism = Some(Mechanism {
			ty: ERROR_MECHANISM.to_string(),
			handled: Some(handled),
			..Mechanism::default()
		});
		outermost.stacktrace = stacktrace.filter(|trace| !trace.is_empty());
	}
	chain
}

/// Best-effort type name from an error's `Debug` output: the leading path
/// before any `(` or `{`.
pub fn type_name_from_debug(debug: &str) -> String {
	let end = debug
		.find(|c: char| !(c.is_alphanumeric() || c == '_' || c == ':'))
		.unwrap_or(debug.len());
	let name = debug[..end].trim_end_matches(':');
	if name.is_empty() {
		"Error".to_string()
	} else {
		name.to_string()
	}
}

/// Message carried by a panic payload.
pub fn panic_message(info: &PanicHookInfo<'_>) -> String {
	let payload = info.payload();
	if let Some(s) = payload.downcast_ref::<&str>() {
		(*s).to_string()
	} else if let Some(s) = payload.downcast_ref::<String>() {
		s.clone()
	} else {
		"Box<dyn Any>".to_string()
	}
}

/// Unhandled exception for a panic.
pub fn exception_from_panic(info: &PanicHookInfo<'_>, stacktrace: Option<Stacktrace>) -> Exception {
	let mut mechanism = Mechanism {
		ty: PANIC_MECHANISM.to_string(),
		handled: Some(false),
		..Mechanism::default()
	};
	if let Some(location) = info.location() {
		mechanism.data.insert(
			"location".into(),
			format!("{}:{}:{}", location.file(), location.line(), location.column()).into(),
		);
	}
	Exception {
		ty: "panic".to_string(),
		value: Some(panic_message(info)),
		mechanism: Some(mechanism),
		stacktrace: stacktrace.filter(|trace| !trace.is_empty()),
		thread_id: std::thread::current().name().map(str::to_string),
		..Exception::default()
	}
}

/// Exception for an OS error. `None` when the error carries no OS code or
/// the code is zero.
pub fn exception_from_os_error(err: &std::io::Error) -> Option<Exception> {
	let number = err.raw_os_error().filter(|n| *n != 0)?;
	let rendered = err.to_string();
	let message = rendered
		.strip_suffix(&format!(" (os error {number})"))
		.unwrap_or(&rendered);
	let name = errno_name(number)
		.map(str::to_string)
		.unwrap_or_else(|| format!("errno {number}"));
	Some(Exception::from_errno(number, &name, message))
}

/// Symbolic name of common errno values.
#[cfg(unix)]
pub fn errno_name(number: i32) -> Option<&'static str> {
	let name = match number {
		libc::EPERM => "EPERM",
		libc::ENOENT => "ENOENT",
		libc::ESRCH => "ESRCH",
		libc::EINTR => "EINTR",
		libc::EIO => "EIO",
		libc::ENXIO => "ENXIO",
		libc::E2BIG => "E2BIG",
		libc::ENOEXEC => "ENOEXEC",
		libc::EBADF => "EBADF",
		libc::ECHILD => "ECHILD",
		libc::EAGAIN => "EAGAIN",
		libc::ENOMEM => "ENOMEM",
		libc::EACCES => "EACCES",
		libc::EFAULT => "EFAULT",
		libc::EBUSY => "EBUSY",
		libc::EEXIST => "EEXIST",
		libc::EXDEV => "EXDEV",
		libc::ENODEV => "ENODEV",
		libc::ENOTDIR => "ENOTDIR",
		libc::EISDIR => "EISDIR",
		libc::EINVAL => "EINVAL",
		libc::ENFILE => "ENFILE",
		libc::EMFILE => "EMFILE",
		libc::ENOTTY => "ENOTTY",
		libc::EFBIG => "EFBIG",
		libc::ENOSPC => "ENOSPC",
		libc::ESPIPE => "ESPIPE",
		libc::EROFS => "EROFS",
		libc::EMLINK => "EMLINK",
		libc::EPIPE => "EPIPE",
		libc::EDOM => "EDOM",
		libc::ERANGE => "ERANGE",
		libc::EDEADLK => "EDEADLK",
		libc::ENAMETOOLONG => "ENAMETOOLONG",
		libc::ENOSYS => "ENOSYS",
		libc::ENOTEMPTY => "ENOTEMPTY",
		libc::ENOTSOCK => "ENOTSOCK",
		libc::EADDRINUSE => "EADDRINUSE",
		libc::EADDRNOTAVAIL => "EADDRNOTAVAIL",
		libc::ENETDOWN => "ENETDOWN",
		libc::ENETUNREACH => "ENETUNREACH",
		libc::ECONNABORTED => "ECONNABORTED",
		libc::ECONNRESET => "ECONNRESET",
		libc::ENOTCONN => "ENOTCONN",
		libc::ETIMEDOUT => "ETIMEDOUT",
		libc::ECONNREFUSED => "ECONNREFUSED",
		libc::EHOSTUNREACH => "EHOSTUNREACH",
		libc::EALREADY => "EALREADY",
		libc::EINPROGRESS => "EINPROGRESS",
		_ => return None,
	};
	Some(name)
}

#[cfg(not(unix))]
pub fn errno_name(_number: i32) -> Option<&'static str> {
	None
}
