// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Crash reporting: POSIX signal handlers and a panic hook.
//!
//! Both report through the hub passed to [`install`], then hand control back
//! to whatever was installed before. The signal path never waits for a lock
//! and never logs. Stack capture goes into a fixed buffer; symbolication and
//! serialization still allocate, so delivery from a signal handler is best
//! effort.

use std::panic::PanicHookInfo;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, PoisonError, RwLock, TryLockError};

use loom_sentry_core::Breadcrumb;
use tracing::info;

use crate::hub::Hub;
use crate::queue::WORKER_THREAD_NAME;

/// Breadcrumb category recorded right before a crash report.
pub const CRASH_CATEGORY: &str = "crash handler";

type PanicHook = dyn Fn(&PanicHookInfo<'_>) + Send + Sync + 'static;

static CRASH_HUB: RwLock<Option<Hub>> = RwLock::new(None);
static IN_CRASH_HANDLER: AtomicBool = AtomicBool::new(false);
static PANIC_INSTALLED: AtomicBool = AtomicBool::new(false);
static PREVIOUS_PANIC_HOOK: RwLock<Option<Arc<PanicHook>>> = RwLock::new(None);

/// Installs the signal handlers and the panic hook, reporting to `hub`.
///
/// Installing twice is a no-op for the handlers; the hub is replaced.
pub fn install(hub: &Hub) -> std::io::Result<()> {
	set_crash_hub(Some(hub.clone()));
	signals::install()?;
	install_panic_hook();
	Ok(())
}

/// Restores the handlers that were active before [`install`] and forgets the
/// hub.
pub fn uninstall() {
	signals::uninstall();
	uninstall_panic_hook();
	set_crash_hub(None);
}

/// Replaces the hub crash reports are sent to.
pub fn set_crash_hub(hub: Option<Hub>) {
	*CRASH_HUB.write().unwrap_or_else(PoisonError::into_inner) = hub;
}

pub fn signal_handlers_installed() -> bool {
	signals::installed()
}

pub fn panic_hook_installed() -> bool {
	PANIC_INSTALLED.load(Ordering::SeqCst)
}

/// The crash hub, unless its slot is being replaced right now.
fn crash_hub() -> Option<Hub> {
	match CRASH_HUB.try_read() {
		Ok(hub) => hub.clone(),
		Err(TryLockError::Poisoned(poisoned)) => poisoned.into_inner().clone(),
		Err(TryLockError::WouldBlock) => None,
	}
}

/// Runs `report` unless another crash report is already in progress.
fn guarded(report: impl FnOnce()) {
	if IN_CRASH_HANDLER.swap(true, Ordering::SeqCst) {
		return;
	}
	report();
	IN_CRASH_HANDLER.store(false, Ordering::SeqCst);
}

/// Installs a panic hook that reports the panic, then runs the hook that was
/// installed before it.
pub fn install_panic_hook() {
	if PANIC_INSTALLED
		.compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
		.is_err()
	{
		return;
	}

	let previous: Arc<PanicHook> = Arc::from(std::panic::take_hook());
	*PREVIOUS_PANIC_HOOK
		.write()
		.unwrap_or_else(PoisonError::into_inner) = Some(Arc::clone(&previous));

	std::panic::set_hook(Box::new(move |info| {
		report_panic(info);
		previous(info);
	}));
	info!("panic hook installed");
}

/// Puts back the panic hook that was active before [`install_panic_hook`].
pub fn uninstall_panic_hook() {
	if PANIC_INSTALLED
		.compare_exchange(true, false, Ordering::SeqCst, Ordering::SeqCst)
		.is_err()
	{
		return;
	}
	let previous = PREVIOUS_PANIC_HOOK
		.write()
		.unwrap_or_else(PoisonError::into_inner)
		.take();
	match previous {
		Some(previous) => std::panic::set_hook(Box::new(move |info| previous(info))),
		None => drop(std::panic::take_hook()),
	}
	info!("panic hook removed");
}

/// The delivery worker cannot wait for its own queue, so crashes on it go
/// unreported.
fn on_delivery_worker() -> bool {
	std::thread::current().name() == Some(WORKER_THREAD_NAME)
}

fn report_panic(info: &PanicHookInfo<'_>) {
	if on_delivery_worker() {
		return;
	}
	let Some(hub) = crash_hub() else {
		return;
	};
	guarded(|| {
		hub.try_add_breadcrumb(Breadcrumb::new(CRASH_CATEGORY, "panic hook"));
		if hub.capture_panic(info).is_some() {
			hub.try_flush(hub.client().options().http_timeout);
		}
	});
}

pub use signals::CRASH_SIGNALS;

#[cfg(unix)]
mod signals {
	use std::io;
	use std::sync::atomic::{AtomicBool, Ordering};
	use std::sync::{Mutex, PoisonError, TryLockError};

	use libc::c_int;
	use loom_sentry_core::{Breadcrumb, Exception};
	use tracing::info;

	use super::{crash_hub, guarded, on_delivery_worker, CRASH_CATEGORY};
	use crate::backtrace::RawBacktrace;
	use crate::hub::Hub;

	/// Signals that trigger a crash report.
	pub const CRASH_SIGNALS: [i32; 6] = [
		libc::SIGTERM,
		libc::SIGSEGV,
		libc::SIGINT,
		libc::SIGILL,
		libc::SIGABRT,
		libc::SIGFPE,
	];

	static INSTALLED: AtomicBool = AtomicBool::new(false);
	static PREVIOUS: Mutex<Vec<(c_int, libc::sigaction)>> = Mutex::new(Vec::new());

	pub fn installed() -> bool {
		INSTALLED.load(Ordering::SeqCst)
	}

	fn handler_action() -> libc::sigaction {
		// SAFETY: sigaction is plain old data; all-zero is a valid value.
		let mut action: libc::sigaction = unsafe { std::mem::zeroed() };
		action.sa_sigaction = handle_signal as extern "C" fn(c_int) as libc::sighandler_t;
		// NODEFER lets the re-raised signal reach the previous handler before
		// ours returns.
		action.sa_flags = libc::SA_ONSTACK | libc::SA_NODEFER;
		// SAFETY: sa_mask is a valid, owned sigset_t.
		unsafe { libc::sigemptyset(&mut action.sa_mask) };
		action
	}

	pub fn install() -> io::Result<()> {
		if INSTALLED
			.compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
			.is_err()
		{
			return Ok(());
		}

		let action = handler_action();
		let mut previous = PREVIOUS.lock().unwrap_or_else(PoisonError::into_inner);
		for signal in CRASH_SIGNALS {
			// SAFETY: all-zero is a valid sigaction to be overwritten.
			let mut old: libc::sigaction = unsafe { std::mem::zeroed() };
			// SAFETY: both pointers refer to live sigaction values.
			if unsafe { libc::sigaction(signal, &action, &mut old) } != 0 {
				let err = io::Error::last_os_error();
				restore_all(&mut previous);
				INSTALLED.store(false, Ordering::SeqCst);
				return Err(err);
			}
			previous.push((signal, old));
		}
		info!(signals = ?CRASH_SIGNALS, "crash signal handlers installed");
		Ok(())
	}

	pub fn uninstall() {
		if INSTALLED
			.compare_exchange(true, false, Ordering::SeqCst, Ordering::SeqCst)
			.is_err()
		{
			return;
		}
		restore_all(&mut PREVIOUS.lock().unwrap_or_else(PoisonError::into_inner));
		info!("crash signal handlers removed");
	}

	fn restore_all(previous: &mut Vec<(c_int, libc::sigaction)>) {
		for (signal, old) in previous.drain(..) {
			// SAFETY: `old` was filled in by a successful sigaction call.
			unsafe { libc::sigaction(signal, &old, std::ptr::null_mut()) };
		}
	}

	extern "C" fn handle_signal(signal: c_int) {
		if !on_delivery_worker() {
			if let Some(hub) = crash_hub() {
				guarded(|| report_signal(&hub, signal));
			}
		}
		resume(signal);
	}

	#[inline(never)]
	fn report_signal(hub: &Hub, signal: c_int) {
		hub.try_add_breadcrumb(Breadcrumb::new(CRASH_CATEGORY, "signal handler"));

		// SAFETY: the crash guard keeps this the only stack walk started from
		// a crash handler; see `capture_unsynchronized`.
		let raw = unsafe { RawBacktrace::capture_unsynchronized(1) };
		let options = hub.client().options();
		let trace = raw.symbolize(&|module: &str| options.is_external(module));

		let mut exception = Exception::from_signal(signal, false);
		exception.stacktrace = (!trace.is_empty()).then_some(trace);
		if hub.capture_crash(exception).is_some() {
			hub.try_flush(options.http_timeout);
		}
	}

	/// Hands the signal to the disposition that was active before ours.
	fn resume(signal: c_int) {
		let previous = match PREVIOUS.try_lock() {
			Ok(previous) => find(&previous, signal),
			Err(TryLockError::Poisoned(poisoned)) => find(&poisoned.into_inner(), signal),
			Err(TryLockError::WouldBlock) => None,
		};

		// SAFETY: sigaction and raise are async-signal-safe; every pointer
		// refers to a live local.
		unsafe {
			match previous {
				Some(old) => libc::sigaction(signal, &old, std::ptr::null_mut()),
				None => {
					let mut default: libc::sigaction = std::mem::zeroed();
					default.sa_sigaction = libc::SIG_DFL;
					libc::sigaction(signal, &default, std::ptr::null_mut())
				}
			};
			libc::raise(signal);
		}

		// The previous handler returned. Synchronous faults must still end
		// the process; other signals go back to being reported.
		if is_fault(signal) {
			// SAFETY: as above.
			unsafe {
				libc::signal(signal, libc::SIG_DFL);
				libc::raise(signal);
			}
		} else if installed() {
			let action = handler_action();
			// SAFETY: as above.
			unsafe { libc::sigaction(signal, &action, std::ptr::null_mut()) };
		}
	}

	fn find(previous: &[(c_int, libc::sigaction)], signal: c_int) -> Option<libc::sigaction> {
		previous
			.iter()
			.find(|(installed, _)| *installed == signal)
			.map(|(_, old)| *old)
	}

	fn is_fault(signal: c_int) -> bool {
		matches!(
			signal,
			libc::SIGSEGV | libc::SIGILL | libc::SIGFPE | libc::SIGABRT | libc::SIGBUS
		)
	}
}

#[cfg(not(unix))]
mod signals {
	/// Signals that trigger a crash report. Empty where POSIX signals are
	/// unavailable.
	pub const CRASH_SIGNALS: [i32; 0] = [];

	pub fn installed() -> bool {
		false
	}

	pub fn install() -> std::io::Result<()> {
		Ok(())
	}

	pub fn uninstall() {}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_guard_rejects_nested_reports() {
		let mut outer = false;
		let mut inner = false;
		guarded(|| {
			outer = true;
			guarded(|| inner = true);
		});
		assert!(outer);
		assert!(!inner);

		let mut again = false;
		guarded(|| again = true);
		assert!(again);
	}

	#[test]
	fn test_delivery_worker_is_recognized_by_name() {
		assert!(!on_delivery_worker());
		let on_worker = std::thread::Builder::new()
			.name(WORKER_THREAD_NAME.to_string())
			.spawn(on_delivery_worker)
			.unwrap()
			.join()
			.unwrap();
		assert!(on_worker);
	}

	#[cfg(unix)]
	#[test]
	fn test_crash_signals_cover_fatal_set() {
		for signal in [libc::SIGSEGV, libc::SIGABRT, libc::SIGILL, libc::SIGFPE] {
			assert!(CRASH_SIGNALS.contains(&signal));
		}
	}
}
