// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! The hub routes captures through the active scope and the before-send hook
//! to the client.

use std::error::Error;
use std::panic::PanicHookInfo;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock, TryLockError};
use std::time::Duration;

use loom_sentry_core::{Breadcrumb, Event, EventId, Exception, Level};
use tracing::debug;

use crate::client::Client;
use crate::exception::{exception_from_os_error, exception_from_panic, exceptions_from_error};
use crate::scope::Scope;
use crate::system;

/// Filter run on every event right before it is handed to the client.
/// Returning `false` drops the event; the hook may also edit it.
pub type BeforeSend = Arc<dyn Fn(&mut Event) -> bool + Send + Sync>;

static MAIN: RwLock<Option<Hub>> = RwLock::new(None);

struct HubInner {
	client: Client,
	/// Never empty; the last entry is the active scope.
	scopes: Mutex<Vec<Arc<Scope>>>,
	before_send: RwLock<Option<BeforeSend>>,
}

/// Entry point for captures: one client plus a stack of scopes.
///
/// Cloning a hub is cheap and yields a handle to the same state.
#[derive(Clone)]
pub struct Hub {
	inner: Arc<HubInner>,
}

impl Hub {
	/// Creates a hub whose root scope is seeded from the client's options.
	pub fn new(client: Client) -> Self {
		let root = Arc::new(client.new_scope());
		Self {
			inner: Arc::new(HubInner {
				client,
				scopes: Mutex::new(vec![root]),
				before_send: RwLock::new(None),
			}),
		}
	}

	/// The process-wide hub installed by [`crate::init`].
	///
	/// # Panics
	///
	/// Panics if `init` has not been called. That is a programming error, not
	/// a runtime condition; use [`Hub::try_main`] where the hub is optional.
	pub fn main() -> Hub {
		match Self::try_main() {
			Some(hub) => hub,
			None => panic!("loom_sentry::init must be called before Hub::main"),
		}
	}

	/// The process-wide hub, if one is installed.
	pub fn try_main() -> Option<Hub> {
		MAIN.read().unwrap_or_else(PoisonError::into_inner).clone()
	}

	/// Installs `hub` as the process-wide hub and returns the previous one.
	pub fn set_main(hub: Option<Hub>) -> Option<Hub> {
		let mut main = MAIN.write().unwrap_or_else(PoisonError::into_inner);
		std::mem::replace(&mut *main, hub)
	}

	pub fn client(&self) -> &Client {
		&self.inner.client
	}

	/// True if both handles point at the same hub.
	pub fn ptr_eq(&self, other: &Hub) -> bool {
		Arc::ptr_eq(&self.inner, &other.inner)
	}

	fn scopes(&self) -> MutexGuard<'_, Vec<Arc<Scope>>> {
		self.inner.scopes.lock().unwrap_or_else(PoisonError::into_inner)
	}

	/// The active (top-of-stack) scope.
	pub fn scope(&self) -> Arc<Scope> {
		let scopes = self.scopes();
		Arc::clone(scopes.last().unwrap_or_else(|| unreachable!("scope stack is never empty")))
	}

	pub fn scope_depth(&self) -> usize {
		self.scopes().len()
	}

	/// Runs `f` against the active scope.
	pub fn configure_scope<R>(&self, f: impl FnOnce(&Scope) -> R) -> R {
		let scope = self.scope();
		f(&scope)
	}

	/// Pushes a copy of the active scope; later changes affect only the copy
	/// until it is popped.
	pub fn push_scope(&self) -> Arc<Scope> {
		let mut scopes = self.scopes();
		let top = scopes.last().map(|scope| Scope::clone(scope));
		let scope = Arc::new(top.unwrap_or_else(|| self.inner.client.new_scope()));
		scopes.push(Arc::clone(&scope));
		scope
	}

	/// Pops the active scope. The root scope is never popped; returns `false`
	/// when only the root is left.
	pub fn pop_scope(&self) -> bool {
		let mut scopes = self.scopes();
		if scopes.len() > 1 {
			scopes.pop();
			true
		} else {
			false
		}
	}

	/// Runs `f` with a temporary scope pushed on top of the stack.
	pub fn with_scope<R>(&self, f: impl FnOnce(&Scope) -> R) -> R {
		struct PopOnDrop<'a> {
			hub: &'a Hub,
			scope: Arc<Scope>,
		}

		impl Drop for PopOnDrop<'_> {
			fn drop(&mut self) {
				let mut scopes = self.hub.scopes();
				if let Some(pos) = scopes.iter().rposition(|s| Arc::ptr_eq(s, &self.scope)) {
					if pos > 0 {
						scopes.remove(pos);
					}
				}
			}
		}

		let guard = PopOnDrop {
			hub: self,
			scope: self.push_scope(),
		};
		f(&guard.scope)
	}

	/// Replaces the before-send hook. Captures already past the hook keep
	/// the one they read.
	pub fn set_before_send_hook(&self, hook: impl Fn(&mut Event) -> bool + Send + Sync + 'static) {
		let hook: BeforeSend = Arc::new(hook);
		*self
			.inner
			.before_send
			.write()
			.unwrap_or_else(PoisonError::into_inner) = Some(hook);
	}

	pub fn clear_before_send_hook(&self) {
		*self
			.inner
			.before_send
			.write()
			.unwrap_or_else(PoisonError::into_inner) = None;
	}

	fn before_send(&self) -> Option<BeforeSend> {
		self.inner
			.before_send
			.read()
			.unwrap_or_else(PoisonError::into_inner)
			.clone()
	}

	fn dispatch(&self, mut event: Event) -> Option<EventId> {
		if let Some(hook) = self.before_send() {
			if !hook(&mut event) {
				debug!("event dropped by before-send hook");
				return None;
			}
		}
		self.inner.client.capture_event(event)
	}

	/// Applies the active scope to `event` and sends it.
	pub fn capture_event(&self, mut event: Event) -> Option<EventId> {
		if !self.inner.client.is_enabled() {
			return None;
		}
		self.scope().apply_to_event(&mut event);
		self.dispatch(event)
	}

	/// Sends a message event. The stack is attached when `attach_stacktrace`
	/// is enabled.
	#[inline(never)]
	pub fn capture_message(&self, message: impl Into<String>, level: Level) -> Option<EventId> {
		let client = &self.inner.client;
		if !client.is_enabled() {
			return None;
		}
		let mut event = Event::new();
		self.scope().apply_to_event(&mut event);
		event.message = Some(message.into());
		event.level = Some(level);
		if client.options().attach_stacktrace {
			let trace = client.capture_stacktrace(1);
			event.stacktrace = (!trace.is_empty()).then_some(trace);
		}
		self.dispatch(event)
	}

	/// Sends one exception on top of `event`.
	///
	/// The level is `error` when the exception's mechanism says it was
	/// handled, `fatal` otherwise.
	pub fn capture_exception(&self, exception: Exception, event: Event) -> Option<EventId> {
		self.capture_exceptions(vec![exception], event)
	}

	/// Sends a chain of exceptions, root cause first.
	pub fn capture_exceptions(&self, exceptions: Vec<Exception>, mut event: Event) -> Option<EventId> {
		if !self.inner.client.is_enabled() {
			return None;
		}
		self.scope().apply_to_event(&mut event);
		event.level = Some(exception_level(&exceptions));
		event.exception = exceptions;
		self.dispatch(event)
	}

	/// Sends an error and its source chain as a handled exception.
	#[inline(never)]
	pub fn capture_error(&self, err: &(dyn Error + 'static)) -> Option<EventId> {
		if !self.inner.client.is_enabled() {
			return None;
		}
		let trace = self.inner.client.capture_stacktrace(1);
		self.capture_exceptions(exceptions_from_error(err, true, Some(trace)), Event::new())
	}

	/// Sends an exception describing `signal`.
	#[inline(never)]
	pub fn capture_signal(&self, signal: i32, handled: bool) -> Option<EventId> {
		if !self.inner.client.is_enabled() {
			return None;
		}
		let mut exception = Exception::from_signal(signal, handled);
		exception.stacktrace = Some(self.inner.client.capture_stacktrace(1)).filter(|t| !t.is_empty());
		self.capture_exception(exception, Event::new())
	}

	/// Sends the calling thread's last OS error. Does nothing when it is zero.
	///
	/// `errno` holds the same value afterwards.
	pub fn capture_last_os_error(&self) -> Option<EventId> {
		let err = std::io::Error::last_os_error();
		let id = self.capture_os_error(&err);
		system::restore_errno(&err);
		id
	}

	/// Sends an OS error as an `errno` exception, tagged with the calling
	/// thread. Errors without an OS code, or with code zero, are ignored.
	#[inline(never)]
	pub fn capture_os_error(&self, err: &std::io::Error) -> Option<EventId> {
		if !self.inner.client.is_enabled() {
			return None;
		}
		let mut exception = exception_from_os_error(err)?;
		exception.stacktrace = Some(self.inner.client.capture_stacktrace(1)).filter(|t| !t.is_empty());

		let mut event = Event::new();
		event.extra.insert(
			"TID".into(),
			format!("{:?}", std::thread::current().id()).into(),
		);
		self.capture_exception(exception, event)
	}

	pub fn add_breadcrumb(&self, breadcrumb: Breadcrumb) {
		self.scope().add_breadcrumb(breadcrumb);
	}

	/// See [`Client::get_last_event_id`].
	pub fn get_last_event_id(&self) -> Option<String> {
		self.inner.client.get_last_event_id()
	}

	pub fn flush(&self, timeout: Duration) -> bool {
		self.inner.client.flush(timeout)
	}

	pub fn close(&self, timeout: Duration) -> bool {
		self.inner.client.close(timeout)
	}

	fn try_scope(&self) -> Option<Arc<Scope>> {
		match self.inner.scopes.try_lock() {
			Ok(scopes) => scopes.last().cloned(),
			Err(TryLockError::Poisoned(poisoned)) => poisoned.into_inner().last().cloned(),
			Err(TryLockError::WouldBlock) => None,
		}
	}

	/// Records a breadcrumb without waiting for any lock.
	pub(crate) fn try_add_breadcrumb(&self, breadcrumb: Breadcrumb) -> bool {
		self.try_scope()
			.is_some_and(|scope| scope.try_add_breadcrumb(breadcrumb))
	}

	/// Crash-path capture: never waits for a lock, never logs.
	///
	/// Scope data and the before-send hook are skipped if their locks are
	/// held; the event is still sent.
	pub(crate) fn capture_crash(&self, exception: Exception) -> Option<EventId> {
		let client = &self.inner.client;
		if !client.is_enabled() {
			return None;
		}
		let mut event = Event::new();
		if let Some(scope) = self.try_scope() {
			scope.try_apply_to_event(&mut event);
		}
		event.level = Some(exception_level(std::slice::from_ref(&exception)));
		event.exception = vec![exception];

		let hook = match self.inner.before_send.try_read() {
			Ok(hook) => hook.clone(),
			Err(TryLockError::Poisoned(poisoned)) => poisoned.into_inner().clone(),
			Err(TryLockError::WouldBlock) => None,
		};
		if let Some(hook) = hook {
			if !hook(&mut event) {
				return None;
			}
		}
		client.capture_crash_event(event)
	}

	/// Crash-path capture of a panic.
	pub(crate) fn capture_panic(&self, info: &PanicHookInfo<'_>) -> Option<EventId> {
		if !self.inner.client.is_enabled() {
			return None;
		}
		let trace = self.inner.client.capture_stacktrace(2);
		self.capture_crash(exception_from_panic(info, Some(trace)))
	}

	pub(crate) fn try_flush(&self, timeout: Duration) -> bool {
		self.inner.client.try_flush(timeout)
	}
}

impl std::fmt::Debug for Hub {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("Hub")
			.field("client", &self.inner.client)
			.field("scope_depth", &self.scope_depth())
			.finish()
	}
}

/// `error` for a handled exception, `fatal` for anything else.
fn exception_level(exceptions: &[Exception]) -> Level {
	let handled = exceptions
		.last()
		.and_then(|exception| exception.mechanism.as_ref())
		.and_then(|mechanism| mechanism.handled)
		.unwrap_or(false);
	if handled {
		Level::Error
	} else {
		Level::Fatal
	}
}
