// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Host information reported in event contexts.

use loom_sentry_core::{DeviceContext, OsContext, RuntimeContext};

/// Hostname of the machine, if the OS reports one.
pub fn hostname() -> Option<String> {
	hostname::get()
		.ok()
		.map(|h| h.to_string_lossy().into_owned())
		.filter(|name| !name.is_empty())
}

/// Puts an OS error code back into the calling thread's `errno`.
pub fn restore_errno(err: &std::io::Error) {
	let Some(code) = err.raw_os_error() else {
		return;
	};
	// SAFETY: each accessor returns the calling thread's errno slot.
	#[cfg(any(target_os = "linux", target_os = "emscripten", target_os = "redox"))]
	unsafe {
		*libc::__errno_location() = code;
	}
	#[cfg(any(target_os = "macos", target_os = "ios", target_os = "freebsd"))]
	unsafe {
		*libc::__error() = code;
	}
	#[cfg(target_os = "android")]
	unsafe {
		*libc::__errno() = code;
	}
	#[cfg(not(any(
		target_os = "linux",
		target_os = "emscripten",
		target_os = "redox",
		target_os = "macos",
		target_os = "ios",
		target_os = "freebsd",
		target_os = "android"
	)))]
	let _ = code;
}

/// Kernel release as reported by `uname`.
fn kernel_version() -> Option<String> {
	#[cfg(unix)]
	{
		// SAFETY: utsname is plain old data; uname fills it in or fails.
		let mut uts: libc::utsname = unsafe { std::mem::zeroed() };
		if unsafe { libc::uname(&mut uts) } != 0 {
			return None;
		}
		// SAFETY: uname NUL-terminates every field on success.
		let release = unsafe { std::ffi::CStr::from_ptr(uts.release.as_ptr()) };
		Some(release.to_string_lossy().into_owned())
	}
	#[cfg(not(unix))]
	{
		None
	}
}

pub fn os_context() -> OsContext {
	let name = match std::env::consts::OS {
		"linux" => "Linux",
		"macos" => "macOS",
		"windows" => "Windows",
		"freebsd" => "FreeBSD",
		other => other,
	};
	OsContext {
		name: Some(name.to_string()),
		version: None,
		kernel_version: kernel_version(),
	}
}

pub fn device_context(hostname: Option<&str>) -> DeviceContext {
	DeviceContext {
		name: hostname.map(str::to_string),
		arch: Some(std::env::consts::ARCH.to_string()),
		processor_count: std::thread::available_parallelism()
			.ok()
			.and_then(|n| u32::try_from(n.get()).ok()),
	}
}

pub fn runtime_context() -> RuntimeContext {
	RuntimeContext {
		name: Some("rustc".to_string()),
		version: None,
	}
}
