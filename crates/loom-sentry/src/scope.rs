// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Mutable contextual state merged into every captured event.

use std::collections::{BTreeMap, VecDeque};
use std::sync::{Mutex, MutexGuard, PoisonError};

use chrono::Utc;
use loom_sentry_core::{Breadcrumb, Event, Level, Request, SentryError, User};
use serde_json::{Map, Value};

use crate::error::Result;

/// Context kinds accepted by [`Scope::add_context`].
pub const CONTEXT_KINDS: &[&str] = &["user", "tags", "request", "extra"];

/// Everything a scope holds.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScopeState {
	pub user: Option<User>,
	pub request: Option<Request>,
	pub environment: Option<String>,
	pub extra: Map<String, Value>,
	pub tags: BTreeMap<String, String>,
	pub level: Option<Level>,
	pub transaction: Option<String>,
	pub fingerprint: Option<Vec<String>>,
	pub breadcrumbs: VecDeque<Breadcrumb>,
}

impl ScopeState {
	/// Copies the state onto an event draft.
	///
	/// Fields set here replace the draft's; unset fields leave the draft alone.
	/// `extra` is merged key by key with the scope winning on collisions.
	fn apply_to_event(&self, event: &mut Event) {
		if let Some(user) = &self.user {
			event.user = Some(user.clone());
		}
		if let Some(request) = &self.request {
			event.request = Some(request.clone());
		}
		if let Some(environment) = &self.environment {
			event.environment = Some(environment.clone());
		}
		for (key, value) in &self.extra {
			event.extra.insert(key.clone(), value.clone());
		}
		if !self.tags.is_empty() {
			event.tags = self.tags.clone();
		}
		if let Some(level) = self.level {
			event.level = Some(level);
		}
		if let Some(transaction) = &self.transaction {
			event.transaction = Some(transaction.clone());
		}
		if let Some(fingerprint) = &self.fingerprint {
			event.fingerprint = fingerprint.clone();
		}
		if !self.breadcrumbs.is_empty() {
			event.breadcrumbs.values = self.breadcrumbs.iter().cloned().collect();
		}
	}

	fn push_breadcrumb(&mut self, mut breadcrumb: Breadcrumb, max_breadcrumbs: usize) {
		if breadcrumb.timestamp.is_none() {
			breadcrumb.timestamp = Some(Utc::now());
		}
		self.breadcrumbs.push_back(breadcrumb);
		while self.breadcrumbs.len() > max_breadcrumbs {
			self.breadcrumbs.pop_front();
		}
	}

	fn context(&self) -> Value {
		let mut context = Map::new();
		context.insert("user".into(), to_object(&self.user));
		context.insert("tags".into(), to_object(&self.tags));
		context.insert("request".into(), to_object(&self.request));
		context.insert("extra".into(), Value::Object(self.extra.clone()));
		Value::Object(context)
	}
}

fn to_object<T: serde::Serialize>(value: &T) -> Value {
	match serde_json::to_value(value) {
		Ok(Value::Object(map)) => Value::Object(map),
		_ => Value::Object(Map::new()),
	}
}

/// A scope guarding [`ScopeState`] behind a scope-local lock.
///
/// All setters may be called from any thread. Breadcrumb eviction happens
/// under the same lock, so `breadcrumbs.len() <= max_breadcrumbs` holds after
/// every call.
#[derive(Debug)]
pub struct Scope {
	state: Mutex<ScopeState>,
	initial: ScopeState,
	max_breadcrumbs: usize,
}

impl Scope {
	pub fn new(max_breadcrumbs: usize) -> Self {
		Self::with_state(max_breadcrumbs, ScopeState::default())
	}

	/// Creates a scope starting from `state`, which also becomes the snapshot
	/// restored by [`Scope::clear_context`].
	pub fn with_state(max_breadcrumbs: usize, mut state: ScopeState) -> Self {
		while state.breadcrumbs.len() > max_breadcrumbs {
			state.breadcrumbs.pop_front();
		}
		Self {
			initial: state.clone(),
			state: Mutex::new(state),
			max_breadcrumbs,
		}
	}

	pub fn max_breadcrumbs(&self) -> usize {
		self.max_breadcrumbs
	}

	fn lock(&self) -> MutexGuard<'_, ScopeState> {
		self.state.lock().unwrap_or_else(PoisonError::into_inner)
	}

	/// Consistent copy of the current state.
	pub fn snapshot(&self) -> ScopeState {
		self.lock().clone()
	}

	pub fn set_user(&self, user: User) {
		self.lock().user = Some(user);
	}

	pub fn remove_user(&self) {
		self.lock().user = None;
	}

	pub fn set_request(&self, request: Request) {
		self.lock().request = Some(request);
	}

	pub fn remove_request(&self) {
		self.lock().request = None;
	}

	pub fn set_environment(&self, environment: impl Into<String>) {
		self.lock().environment = Some(environment.into());
	}

	pub fn remove_environment(&self) {
		self.lock().environment = None;
	}

	pub fn set_extra(&self, key: impl Into<String>, value: Value) {
		self.lock().extra.insert(key.into(), value);
	}

	pub fn remove_extra(&self, key: &str) {
		self.lock().extra.remove(key);
	}

	/// Replaces all extra values.
	pub fn set_extras(&self, extras: Map<String, Value>) {
		self.lock().extra = extras;
	}

	pub fn set_tag(&self, key: impl Into<String>, value: impl Into<String>) {
		self.lock().tags.insert(key.into(), value.into());
	}

	pub fn remove_tag(&self, key: &str) {
		self.lock().tags.remove(key);
	}

	/// Replaces all tags.
	pub fn set_tags(&self, tags: BTreeMap<String, String>) {
		self.lock().tags = tags;
	}

	pub fn set_level(&self, level: Option<Level>) {
		self.lock().level = level;
	}

	pub fn set_transaction(&self, transaction: Option<String>) {
		self.lock().transaction = transaction;
	}

	pub fn set_fingerprint(&self, fingerprint: Option<Vec<String>>) {
		self.lock().fingerprint = fingerprint;
	}

	/// Records a breadcrumb, stamping the current time when none was given and
	/// evicting the oldest entries beyond `max_breadcrumbs`.
	pub fn add_breadcrumb(&self, breadcrumb: Breadcrumb) {
		let max = self.max_breadcrumbs;
		self.lock().push_breadcrumb(breadcrumb, max);
	}

	/// Like [`Scope::add_breadcrumb`] but gives up instead of waiting for the
	/// lock. Used on the crash path.
	pub fn try_add_breadcrumb(&self, breadcrumb: Breadcrumb) -> bool {
		let max = self.max_breadcrumbs;
		match self.state.try_lock() {
			Ok(mut state) => {
				state.push_breadcrumb(breadcrumb, max);
				true
			}
			Err(std::sync::TryLockError::Poisoned(poisoned)) => {
				poisoned.into_inner().push_breadcrumb(breadcrumb, max);
				true
			}
			Err(std::sync::TryLockError::WouldBlock) => false,
		}
	}

	pub fn breadcrumbs(&self) -> Vec<Breadcrumb> {
		self.lock().breadcrumbs.iter().cloned().collect()
	}

	pub fn clear_breadcrumbs(&self) {
		self.lock().breadcrumbs.clear();
	}

	/// Resets every field to its empty default.
	pub fn clear(&self) {
		*self.lock() = ScopeState::default();
	}

	/// Copies the scope onto `event` under the scope lock.
	pub fn apply_to_event(&self, event: &mut Event) {
		self.lock().apply_to_event(event);
	}

	/// Like [`Scope::apply_to_event`] but gives up instead of waiting for the
	/// lock. Used on the crash path.
	pub fn try_apply_to_event(&self, event: &mut Event) -> bool {
		match self.state.try_lock() {
			Ok(state) => {
				state.apply_to_event(event);
				true
			}
			Err(std::sync::TryLockError::Poisoned(poisoned)) => {
				poisoned.into_inner().apply_to_event(event);
				true
			}
			Err(std::sync::TryLockError::WouldBlock) => false,
		}
	}

	/// Merges a JSON object into one of the context kinds in
	/// [`CONTEXT_KINDS`].
	///
	/// Keys of `object` overwrite existing keys of that kind. Unknown kinds and
	/// non-object values are rejected with [`SentryError::InvalidContext`].
	pub fn add_context(&self, kind: &str, object: Value) -> Result<()> {
		let Value::Object(object) = object else {
			return Err(SentryError::InvalidContext(format!(
				"context '{kind}' must be a JSON object"
			))
			.into());
		};

		let mut state = self.lock();
		match kind {
			"user" => {
				let merged = merge_into(&state.user, object)?;
				state.user = Some(merged);
			}
			"request" => {
				let merged = merge_into(&state.request, object)?;
				state.request = Some(merged);
			}
			"tags" => {
				let mut tags = state.tags.clone();
				for (key, value) in object {
					let value = match value {
						Value::String(s) => s,
						other => other.to_string(),
					};
					tags.insert(key, value);
				}
				state.tags = tags;
			}
			"extra" => {
				state.extra.extend(object);
			}
			other => {
				return Err(SentryError::InvalidContext(format!(
					"unsupported context '{other}', expected one of {CONTEXT_KINDS:?}"
				))
				.into());
			}
		}
		Ok(())
	}

	pub fn add_user_context(&self, object: Value) -> Result<()> {
		self.add_context("user", object)
	}

	pub fn add_tags_context(&self, object: Value) -> Result<()> {
		self.add_context("tags", object)
	}

	pub fn add_request_context(&self, object: Value) -> Result<()> {
		self.add_context("request", object)
	}

	pub fn add_extra_context(&self, object: Value) -> Result<()> {
		self.add_context("extra", object)
	}

	/// The user, tags, request and extra contexts as one JSON object.
	pub fn get_context(&self) -> Value {
		self.lock().context()
	}

	/// Restores the user, tags, request and extra contexts to the values they
	/// had when this scope was created.
	pub fn clear_context(&self) {
		let mut state = self.lock();
		state.user = self.initial.user.clone();
		state.tags = self.initial.tags.clone();
		state.request = self.initial.request.clone();
		state.extra = self.initial.extra.clone();
	}
}

/// Forks the scope: the copy starts from the current state and takes it as
/// its own construction snapshot.
impl Clone for Scope {
	fn clone(&self) -> Self {
		Self::with_state(self.max_breadcrumbs, self.snapshot())
	}
}

fn merge_into<T>(current: &Option<T>, object: Map<String, Value>) -> Result<T>
where
	T: serde::Serialize + serde::de::DeserializeOwned + Default,
{
	let mut base = match serde_json::to_value(current.as_ref().unwrap_or(&T::default())) {
		Ok(Value::Object(map)) => map,
		_ => Map::new(),
	};
	base.extend(object);
	serde_json::from_value(Value::Object(base))
		.map_err(|e| SentryError::InvalidContext(e.to_string()).into())
}
