// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Exception values for signals and OS error numbers.

use std::borrow::Cow;

use crate::event::{ErrnoMeta, Exception, Mechanism, MechanismMeta, SignalMeta};

pub const SIGNAL_MECHANISM: &str = "signal";
pub const SIGNAL_DESCRIPTION: &str = "A signal has been received.";
pub const SIGNAL_HELP_LINK: &str = "https://en.wikipedia.org/wiki/Signal_(IPC)";

pub const ERRNO_MECHANISM: &str = "errno";
pub const ERRNO_DESCRIPTION: &str = "A previous call set errno to a non-zero value.";
pub const ERRNO_HELP_LINK: &str = "https://en.cppreference.com/w/cpp/error/errno_macros";

/// Name and description of a POSIX signal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignalInfo {
	pub name: Cow<'static, str>,
	pub description: Option<&'static str>,
}

/// Looks up a signal by number. Unknown signals are named `signal N`.
pub fn signal_info(signal: i32) -> SignalInfo {
	let known = |name: &'static str, description: &'static str| SignalInfo {
		name: Cow::Borrowed(name),
		description: Some(description),
	};
	match signal {
		1 => known(
			"SIGHUP",
			"Hangup detected on controlling terminal or death of controlling process",
		),
		2 => known("SIGINT", "Interrupt from keyboard; interactive attention signal."),
		3 => known("SIGQUIT", "Quit from keyboard."),
		4 => known("SIGILL", "Illegal instruction."),
		5 => known("SIGTRAP", "Trace/breakpoint trap."),
		6 => known("SIGABRT", "Abnormal termination; abort signal from abort(3)."),
		8 => known("SIGFPE", "Floating-point exception: erroneous arithmetic operation."),
		11 => known("SIGSEGV", "Segmentation violation: invalid memory reference."),
		14 => known("SIGALRM", "Alarm clock timer signal: alarm(2)."),
		15 => known("SIGTERM", "Termination request."),
		other => SignalInfo {
			name: Cow::Owned(format!("signal {other}")),
			description: None,
		},
	}
}

impl Exception {
	/// Exception for a received signal. The caller attaches the stack trace.
	pub fn from_signal(signal: i32, handled: bool) -> Self {
		let info = signal_info(signal);
		Self {
			ty: info.name.to_string(),
			value: info.description.map(str::to_string),
			mechanism: Some(Mechanism {
				ty: SIGNAL_MECHANISM.to_string(),
				description: Some(SIGNAL_DESCRIPTION.to_string()),
				help_link: Some(SIGNAL_HELP_LINK.to_string()),
				handled: Some(handled),
				meta: MechanismMeta {
					signal: Some(SignalMeta {
						number: signal,
						code: Some(signal),
						name: Some(info.name.into_owned()),
					}),
					errno: None,
				},
				..Mechanism::default()
			}),
			..Self::default()
		}
	}

	/// Exception for an OS error number.
	///
	/// `name` is the symbolic constant (`ENOENT`), `message` the human readable
	/// text (`No such file or directory`).
	pub fn from_errno(number: i32, name: &str, message: &str) -> Self {
		Self {
			ty: name.to_string(),
			value: Some(message.to_string()),
			mechanism: Some(Mechanism {
				ty: ERRNO_MECHANISM.to_string(),
				description: Some(ERRNO_DESCRIPTION.to_string()),
				help_link: Some(ERRNO_HELP_LINK.to_string()),
				meta: MechanismMeta {
					signal: None,
					errno: Some(ErrnoMeta {
						number,
						name: Some(message.to_string()),
					}),
				},
				..Mechanism::default()
			}),
			..Self::default()
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use proptest::prelude::*;

	#[test]
	fn test_segv_uses_table_entry() {
		let exc = Exception::from_signal(11, false);
		assert_eq!(exc.ty, "SIGSEGV");
		assert_eq!(
			exc.value.as_deref(),
			Some("Segmentation violation: invalid memory reference.")
		);

		let mechanism = exc.mechanism.unwrap();
		assert_eq!(mechanism.ty, "signal");
		assert_eq!(mechanism.handled, Some(false));
		assert_eq!(mechanism.help_link.as_deref(), Some(SIGNAL_HELP_LINK));
		let signal = mechanism.meta.signal.unwrap();
		assert_eq!(signal.number, 11);
		assert_eq!(signal.name.as_deref(), Some("SIGSEGV"));
	}

	#[test]
	fn test_errno_exception_carries_meta() {
		let exc = Exception::from_errno(2, "ENOENT", "No such file or directory");
		let json = serde_json::to_value(&exc).unwrap();
		assert_eq!(json["type"], "ENOENT");
		assert_eq!(json["value"], "No such file or directory");
		assert_eq!(json["mechanism"]["type"], "errno");
		assert_eq!(json["mechanism"]["meta"]["errno"]["number"], 2);
		assert!(json["mechanism"].get("handled").is_none());
	}

	proptest! {
		#[test]
		fn test_unknown_signals_are_numbered(signal in 16..64i32) {
			let info = signal_info(signal);
			let expected = format!("signal {signal}");
			prop_assert_eq!(info.name.as_ref(), expected.as_str());
			prop_assert!(info.description.is_none());

			let exc = Exception::from_signal(signal, true);
			prop_assert!(exc.value.is_none());
		}
	}
}
