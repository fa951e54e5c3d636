// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Crash handler tests.
//!
//! Signal dispositions and the panic hook are process-wide, so everything
//! runs inside a single test function.

mod support;

use std::sync::atomic::{AtomicBool, Ordering};

use loom_sentry::crash;
use support::CollectorStub;

#[cfg(unix)]
static PREVIOUS_SIGINT_RAN: AtomicBool = AtomicBool::new(false);

#[cfg(unix)]
extern "C" fn previous_sigint(_signal: libc::c_int) {
	PREVIOUS_SIGINT_RAN.store(true, Ordering::SeqCst);
}

#[cfg(unix)]
fn install_previous_sigint() {
	unsafe {
		let mut action: libc::sigaction = std::mem::zeroed();
		action.sa_sigaction = previous_sigint as extern "C" fn(libc::c_int) as libc::sighandler_t;
		libc::sigemptyset(&mut action.sa_mask);
		assert_eq!(libc::sigaction(libc::SIGINT, &action, std::ptr::null_mut()), 0);
	}
}

#[test]
fn test_crash_handlers_report_and_chain() {
	let collector = CollectorStub::new();
	let hub = collector.hub();

	#[cfg(unix)]
	install_previous_sigint();

	crash::install(&hub).unwrap();
	assert!(crash::panic_hook_installed());
	#[cfg(unix)]
	assert!(crash::signal_handlers_installed());

	// Installing again does not chain the handlers twice.
	crash::install(&hub).unwrap();

	// Panics are reported with the payload and then reach the previous hook.
	let result = std::thread::Builder::new()
		.name("worker-7".into())
		.spawn(|| std::panic::catch_unwind(|| panic!("ledger out of balance")))
		.unwrap()
		.join()
		.unwrap();
	assert!(result.is_err());
	hub.get_last_event_id();

	let events = collector.events();
	assert_eq!(events.len(), 1);
	let panic_event = &events[0];
	assert_eq!(panic_event["level"], "fatal");
	let exception = &panic_event["exception"][0];
	assert_eq!(exception["type"], "panic");
	assert_eq!(exception["value"], "ledger out of balance");
	assert_eq!(exception["thread_id"], "worker-7");
	assert_eq!(exception["mechanism"]["type"], "panic");
	assert_eq!(exception["mechanism"]["handled"], false);
	assert!(exception["mechanism"]["data"]["location"]
		.as_str()
		.unwrap()
		.contains("crash_handler.rs"));
	let crumbs = panic_event["breadcrumbs"]["values"].as_array().unwrap();
	assert_eq!(crumbs.last().unwrap()["category"], "crash handler");
	assert_eq!(crumbs.last().unwrap()["message"], "panic hook");

	// A signal is reported, then handed to the handler installed before ours.
	#[cfg(unix)]
	{
		unsafe { libc::raise(libc::SIGINT) };
		assert!(PREVIOUS_SIGINT_RAN.load(Ordering::SeqCst));
		hub.get_last_event_id();

		let events = collector.events();
		assert_eq!(events.len(), 2);
		let signal_event = &events[1];
		assert_eq!(signal_event["level"], "fatal");
		let exception = &signal_event["exception"][0];
		assert_eq!(exception["type"], "SIGINT");
		assert_eq!(exception["mechanism"]["type"], "signal");
		assert_eq!(exception["mechanism"]["handled"], false);
		assert_eq!(exception["mechanism"]["meta"]["signal"]["number"], libc::SIGINT);
		let crumbs = signal_event["breadcrumbs"]["values"].as_array().unwrap();
		assert_eq!(crumbs.last().unwrap()["message"], "signal handler");

		// Our handler is back in place after the previous one returned.
		PREVIOUS_SIGINT_RAN.store(false, Ordering::SeqCst);
		unsafe { libc::raise(libc::SIGINT) };
		assert!(PREVIOUS_SIGINT_RAN.load(Ordering::SeqCst));
		hub.get_last_event_id();
		assert_eq!(collector.events().len(), 3);
	}

	crash::uninstall();
	assert!(!crash::panic_hook_installed());
	assert!(!crash::signal_handlers_installed());

	let before = collector.requests().len();
	let _ = std::panic::catch_unwind(|| panic!("after uninstall"));
	#[cfg(unix)]
	{
		PREVIOUS_SIGINT_RAN.store(false, Ordering::SeqCst);
		unsafe { libc::raise(libc::SIGINT) };
		assert!(PREVIOUS_SIGINT_RAN.load(Ordering::SeqCst));
	}
	hub.get_last_event_id();
	assert_eq!(collector.requests().len(), before);
}
