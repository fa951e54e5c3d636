// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Backtrace capture and symbolication.
//!
//! Capture and symbolication are split. [`RawBacktrace`] records instruction
//! pointers into a fixed-size buffer without allocating, which is what the
//! crash path needs. [`RawBacktrace::symbolize`] turns those addresses into
//! [`Frame`]s afterwards.

use std::ffi::c_void;
use std::path::Path;

use loom_sentry_core::{Frame, Stacktrace};

/// Maximum number of frames recorded by a single capture.
pub const MAX_FRAMES: usize = 128;

/// Predicate deciding whether a module belongs to a third-party library.
pub type IsExternal<'a> = &'a dyn Fn(&str) -> bool;

/// Captures and symbolizes the current thread's stack.
///
/// `skip_frames` drops that many frames above the caller of this function.
/// Frames are ordered from the outermost caller to the innermost frame.
/// Builds without debug info produce frames carrying only addresses, and
/// targets without unwinding support produce an empty trace.
#[inline(never)]
pub fn capture(skip_frames: usize, is_external: IsExternal<'_>) -> Stacktrace {
	RawBacktrace::capture(skip_frames + 1).symbolize(is_external)
}

/// Unsymbolized instruction pointers, innermost first.
#[derive(Clone, Copy)]
pub struct RawBacktrace {
	ips: [usize; MAX_FRAMES],
	len: usize,
}

impl RawBacktrace {
	/// Records the current stack, skipping `skip_frames` frames above the
	/// caller.
	#[inline(never)]
	pub fn capture(skip_frames: usize) -> Self {
		let anchor = Self::capture as fn(usize) -> Self as usize;
		let mut raw = Self::empty();
		let mut to_skip = 0;
		backtrace::trace(|frame| raw.record(frame, anchor, skip_frames, &mut to_skip));
		raw
	}

	/// Records the current stack without taking the backtrace crate's global
	/// lock.
	///
	/// # Safety
	///
	/// No other thread may be walking or symbolizing a stack at the same time.
	/// The crash path satisfies this on a best-effort basis: it runs once, on
	/// the faulting thread, and the process terminates right after.
	#[inline(never)]
	pub unsafe fn capture_unsynchronized(skip_frames: usize) -> Self {
		let anchor = Self::capture_unsynchronized as unsafe fn(usize) -> Self as usize;
		let mut raw = Self::empty();
		let mut to_skip = 0;
		backtrace::trace_unsynchronized(|frame| raw.record(frame, anchor, skip_frames, &mut to_skip));
		raw
	}

	pub const fn empty() -> Self {
		Self {
			ips: [0; MAX_FRAMES],
			len: 0,
		}
	}

	/// Unwinder frames come before `anchor`, the capturing function itself.
	/// Once the walk reaches it, everything recorded so far is discarded and
	/// the next `skip_frames` frames are dropped. If the anchor is never
	/// identified the unwinder frames stay in the trace.
	fn record(
		&mut self,
		frame: &backtrace::Frame,
		anchor: usize,
		skip_frames: usize,
		to_skip: &mut usize,
	) -> bool {
		if frame.symbol_address() as usize == anchor {
			self.len = 0;
			*to_skip = skip_frames;
			return true;
		}
		let ip = frame.ip() as usize;
		if *to_skip > 0 {
			*to_skip -= 1;
			return true;
		}
		if ip == 0 {
			return true;
		}
		self.ips[self.len] = ip;
		self.len += 1;
		self.len < MAX_FRAMES
	}

	pub fn ips(&self) -> &[usize] {
		&self.ips[..self.len]
	}

	pub fn is_empty(&self) -> bool {
		self.len == 0
	}

	/// Resolves every recorded address.
	///
	/// One address can expand to several frames when functions were inlined.
	pub fn symbolize(&self, is_external: IsExternal<'_>) -> Stacktrace {
		let mut frames = Vec::with_capacity(self.len);

		for &ip in self.ips() {
			let before = frames.len();
			backtrace::resolve(ip as *mut c_void, |symbol| {
				frames.push(symbol_to_frame(ip, symbol, is_external));
			});
			if frames.len() == before {
				frames.push(Frame {
					instruction_addr: Some(format_addr(ip)),
					in_app: false,
					..Frame::default()
				});
			}
		}

		// Resolution walks innermost first; events list the outermost caller first.
		frames.reverse();
		Stacktrace { frames }
	}
}

impl std::fmt::Debug for RawBacktrace {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_list()
			.entries(self.ips().iter().map(|ip| format_addr(*ip)))
			.finish()
	}
}

fn symbol_to_frame(ip: usize, symbol: &backtrace::Symbol, is_external: IsExternal<'_>) -> Frame {
	let raw_name = symbol
		.name()
		.map(|name| name.as_str().map(str::to_string).unwrap_or_else(|| name.to_string()));
	let function = raw_name.as_deref().map(demangle);
	let module = function.as_deref().and_then(module_of);

	let in_app = match function.as_deref() {
		Some(function) => is_in_app(function, module.as_deref(), is_external),
		None => false,
	};

	Frame {
		raw_function: raw_name.filter(|raw| Some(raw) != function.as_ref()),
		function,
		module,
		filename: symbol
			.filename()
			.and_then(Path::file_name)
			.map(|name| name.to_string_lossy().into_owned()),
		abs_path: symbol.filename().map(|path| path.display().to_string()),
		lineno: symbol.lineno(),
		colno: symbol.colno(),
		in_app,
		instruction_addr: Some(format_addr(ip)),
	}
}

fn format_addr(ip: usize) -> String {
	format!("{ip:#x}")
}

/// Demangles a Rust symbol without its hash suffix. Anything that is not a
/// Rust symbol is returned unchanged.
pub fn demangle(raw: &str) -> String {
	match rustc_demangle::try_demangle(raw) {
		Ok(demangled) => format!("{demangled:#}"),
		Err(_) => raw.to_string(),
	}
}

/// Module path of a demangled function: everything before the last `::`.
pub fn module_of(function: &str) -> Option<String> {
	function.rfind("::").map(|idx| function[..idx].to_string())
}

/// Decides whether a frame is application code.
///
/// Frames from the standard library, the async runtime, this SDK, and
/// modules matching `is_external` are not.
pub fn is_in_app(function: &str, module: Option<&str>, is_external: IsExternal<'_>) -> bool {
	const SYSTEM_PREFIXES: &[&str] = &[
		"std::",
		"core::",
		"alloc::",
		"<std::",
		"<core::",
		"<alloc::",
		"tokio::",
		"<tokio::",
		"futures::",
		"<futures::",
		"async_trait::",
		"tracing::",
		"<tracing::",
		"tracing_subscriber::",
		"<tracing_subscriber::",
		"backtrace::",
		"<backtrace::",
		"loom_sentry::",
		"<loom_sentry::",
		"loom_sentry_core::",
		"<loom_sentry_core::",
		"panic_unwind::",
		"<panic_unwind::",
		"rust_begin_unwind",
		"rust_panic",
		"__rust_",
		"_rust_",
		"__libc_",
		"__restore_rt",
		"_start",
	];

	const SYSTEM_CONTAINS: &[&str] = &[
		"::panic::",
		"::panicking::",
		"::rt::",
		"::sys_common::",
	];

	if SYSTEM_PREFIXES.iter().any(|prefix| function.starts_with(prefix)) {
		return false;
	}
	if SYSTEM_CONTAINS.iter().any(|needle| function.contains(needle)) {
		return false;
	}

	!is_external(module.unwrap_or(function))
}

#[cfg(test)]
mod tests {
	use super::*;

	fn never_external(_: &str) -> bool {
		false
	}

	#[test]
	fn test_is_in_app_excludes_std_and_runtime() {
		assert!(!is_in_app("std::panic::panic_any", Some("std::panic"), &never_external));
		assert!(!is_in_app("core::panicking::panic", Some("core::panicking"), &never_external));
		assert!(!is_in_app("alloc::vec::Vec::push", Some("alloc::vec::Vec"), &never_external));
		assert!(!is_in_app(
			"tokio::runtime::Runtime::block_on",
			Some("tokio::runtime::Runtime"),
			&never_external
		));
	}

	#[test]
	fn test_is_in_app_excludes_own_namespace() {
		assert!(!is_in_app(
			"loom_sentry::hub::Hub::capture_event",
			Some("loom_sentry::hub::Hub"),
			&never_external
		));
		assert!(!is_in_app(
			"<loom_sentry::scope::Scope as core::clone::Clone>::clone",
			None,
			&never_external
		));
	}

	#[test]
	fn test_is_in_app_includes_user_code() {
		assert!(is_in_app("my_app::main", Some("my_app"), &never_external));
		assert!(is_in_app("foo::bar::baz", Some("foo::bar"), &never_external));
	}

	#[test]
	fn test_is_in_app_consults_external_predicate() {
		let is_external = |module: &str| module.starts_with("serde_json");
		assert!(!is_in_app(
			"serde_json::de::from_str",
			Some("serde_json::de"),
			&is_external
		));
		assert!(is_in_app("my_app::parse", Some("my_app"), &is_external));
	}

	#[test]
	fn test_demangles_legacy_symbols_without_hash() {
		assert_eq!(
			demangle("_ZN4testE"),
			"test"
		);
		assert_eq!(
			demangle("_ZN3foo3bar17h05af221e174051e9E"),
			"foo::bar"
		);
	}

	#[test]
	fn test_leaves_foreign_symbols_alone() {
		assert_eq!(demangle("__libc_start_main"), "__libc_start_main");
	}

	#[test]
	fn test_module_is_path_without_last_segment() {
		assert_eq!(module_of("my_app::handlers::process").as_deref(), Some("my_app::handlers"));
		assert_eq!(module_of("main"), None);
	}

	#[test]
	fn test_raw_capture_fits_fixed_buffer() {
		fn recurse(depth: usize) -> RawBacktrace {
			if depth == 0 {
				RawBacktrace::capture(0)
			} else {
				std::hint::black_box(recurse(depth - 1))
			}
		}
		let raw = recurse(MAX_FRAMES + 20);
		assert!(raw.ips().len() <= MAX_FRAMES);
	}

	#[test]
	fn test_skip_frames_drops_callers_frames() {
		#[inline(never)]
		fn skipped() -> Stacktrace {
			capture(1, &never_external)
		}
		#[inline(never)]
		fn outer_marker() -> Stacktrace {
			std::hint::black_box(skipped())
		}
		let trace = std::hint::black_box(outer_marker());
		let last = trace.frames.last().and_then(|frame| frame.function.clone());
		if let (Some(last), false) = (last, cfg!(target_vendor = "apple")) {
			assert!(last.contains("outer_marker"), "innermost frame was {last}");
		}
	}

	#[test]
	fn test_symbolized_frames_are_outermost_first() {
		#[inline(never)]
		fn innermost_marker() -> Stacktrace {
			capture(0, &never_external)
		}
		let trace = std::hint::black_box(innermost_marker());
		if trace.is_empty() {
			// Unwinding unavailable on this target.
			return;
		}

		let position = |needle: &str| {
			trace.frames.iter().position(|frame| {
				frame
					.function
					.as_deref()
					.is_some_and(|function| function.contains(needle))
			})
		};
		if let (Some(marker), Some(test_fn)) = (
			position("innermost_marker"),
			position("test_symbolized_frames_are_outermost_first"),
		) {
			assert!(test_fn < marker);
		}
		// Apple unwinders report no enclosing-function address to anchor on.
		if let (Some(marker), false) = (position("innermost_marker"), cfg!(target_vendor = "apple")) {
			assert_eq!(marker, trace.frames.len() - 1, "{:?}", trace.frames.last());
			assert!(!trace
				.frames
				.iter()
				.any(|frame| frame.function.as_deref().is_some_and(|f| f.starts_with("backtrace::"))));
		}
		assert!(trace.frames.iter().all(|frame| frame.instruction_addr.is_some()));
	}
}
