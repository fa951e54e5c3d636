// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! The event payload posted to the collector.
//!
//! Every optional field is omitted from the JSON when unset or empty, so a
//! freshly constructed [`Event`] serializes to `{}`.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use uuid::Uuid;

use crate::breadcrumb::Breadcrumb;
use crate::context::{Contexts, Request, User};
use crate::error::SentryError;

/// Platform reported for every event produced by this SDK.
pub const PLATFORM: &str = "native";

/// Identifier of an event: a random UUIDv4 rendered as 32 lowercase hex digits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EventId(pub Uuid);

impl EventId {
	pub fn new() -> Self {
		Self(Uuid::new_v4())
	}
}

impl Default for EventId {
	fn default() -> Self {
		Self::new()
	}
}

impl fmt::Display for EventId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}", self.0.simple())
	}
}

impl FromStr for EventId {
	type Err = SentryError;

	/// Accepts both the simple and the hyphenated form.
	fn from_str(s: &str) -> Result<Self, Self::Err> {
		Uuid::parse_str(s)
			.map(Self)
			.map_err(|e| SentryError::InvalidEventId(format!("{s}: {e}")))
	}
}

impl Serialize for EventId {
	fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
		serializer.collect_str(self)
	}
}

impl<'de> Deserialize<'de> for EventId {
	fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
		let s = String::deserialize(deserializer)?;
		s.parse().map_err(serde::de::Error::custom)
	}
}

/// Severity of an event or breadcrumb.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
	Debug,
	#[default]
	Info,
	Warning,
	Error,
	Fatal,
}

impl fmt::Display for Level {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Self::Debug => write!(f, "debug"),
			Self::Info => write!(f, "info"),
			Self::Warning => write!(f, "warning"),
			Self::Error => write!(f, "error"),
			Self::Fatal => write!(f, "fatal"),
		}
	}
}

impl FromStr for Level {
	type Err = SentryError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s {
			"debug" => Ok(Self::Debug),
			"info" => Ok(Self::Info),
			"warning" => Ok(Self::Warning),
			"error" => Ok(Self::Error),
			"fatal" => Ok(Self::Fatal),
			_ => Err(SentryError::InvalidLevel(s.to_string())),
		}
	}
}

/// Wrapper for the `{"values": [...]}` shape the protocol uses for lists.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Values<T> {
	pub values: Vec<T>,
}

impl<T> Values<T> {
	pub fn new() -> Self {
		Self { values: Vec::new() }
	}

	pub fn is_empty(&self) -> bool {
		self.values.is_empty()
	}
}

impl<T> Default for Values<T> {
	fn default() -> Self {
		Self::new()
	}
}

impl<T> From<Vec<T>> for Values<T> {
	fn from(values: Vec<T>) -> Self {
		Self { values }
	}
}

/// Name and version of the SDK that produced an event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClientSdkInfo {
	pub name: String,
	pub version: String,
	#[serde(default, skip_serializing_if = "Vec::is_empty")]
	pub integrations: Vec<String>,
}

/// A single stack frame.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Frame {
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub function: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub raw_function: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub module: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub filename: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub abs_path: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub lineno: Option<u32>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub colno: Option<u32>,
	pub in_app: bool,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub instruction_addr: Option<String>,
}

/// Stack trace with frames ordered from the outermost caller to the
/// innermost (faulting) frame.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Stacktrace {
	pub frames: Vec<Frame>,
}

impl Stacktrace {
	pub fn is_empty(&self) -> bool {
		self.frames.is_empty()
	}
}

/// Signal details attached to a `signal` mechanism.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SignalMeta {
	pub number: i32,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub code: Option<i32>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub name: Option<String>,
}

/// Error number details attached to an `errno` mechanism.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ErrnoMeta {
	pub number: i32,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub name: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MechanismMeta {
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub signal: Option<SignalMeta>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub errno: Option<ErrnoMeta>,
}

impl MechanismMeta {
	pub fn is_empty(&self) -> bool {
		self.signal.is_none() && self.errno.is_none()
	}
}

/// How an exception was captured.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Mechanism {
	#[serde(rename = "type")]
	pub ty: String,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub description: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub help_link: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub handled: Option<bool>,
	#[serde(default, skip_serializing_if = "MechanismMeta::is_empty")]
	pub meta: MechanismMeta,
	#[serde(default, skip_serializing_if = "serde_json::Map::is_empty")]
	pub data: serde_json::Map<String, serde_json::Value>,
}

/// An exception value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Exception {
	#[serde(rename = "type")]
	pub ty: String,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub value: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub module: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub thread_id: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub mechanism: Option<Mechanism>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub stacktrace: Option<Stacktrace>,
}

/// An event as posted to the collector.
///
/// A draft starts out without `event_id` and `timestamp`; the client stamps
/// both right before the event is queued for delivery.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Event {
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub event_id: Option<EventId>,
	#[serde(
		default,
		skip_serializing_if = "Option::is_none",
		with = "timestamp::option"
	)]
	pub timestamp: Option<DateTime<Utc>>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub message: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub level: Option<Level>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub logger: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub platform: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub transaction: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub server_name: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub release: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub dist: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub environment: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub sdk: Option<ClientSdkInfo>,
	#[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
	pub tags: BTreeMap<String, String>,
	#[serde(default, skip_serializing_if = "serde_json::Map::is_empty")]
	pub extra: serde_json::Map<String, serde_json::Value>,
	#[serde(default, skip_serializing_if = "Vec::is_empty")]
	pub fingerprint: Vec<String>,
	#[serde(default, skip_serializing_if = "Vec::is_empty")]
	pub exception: Vec<Exception>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub stacktrace: Option<Stacktrace>,
	#[serde(default, skip_serializing_if = "Values::is_empty")]
	pub breadcrumbs: Values<Breadcrumb>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub user: Option<User>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub request: Option<Request>,
	#[serde(default, skip_serializing_if = "Contexts::is_empty")]
	pub contexts: Contexts,
}

impl Event {
	pub fn new() -> Self {
		Self::default()
	}

	/// Draft for a plain message at the given level.
	pub fn message(message: impl Into<String>, level: Level) -> Self {
		Self {
			message: Some(message.into()),
			level: Some(level),
			..Self::default()
		}
	}
}

/// Serde helpers for the second-resolution `YYYY-MM-DDTHH:MM:SSZ` format.
pub mod timestamp {
	use chrono::{DateTime, NaiveDateTime, Utc};
	use serde::{Deserialize, Deserializer, Serializer};

	pub const FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";

	pub fn format(ts: &DateTime<Utc>) -> String {
		ts.format(FORMAT).to_string()
	}

	pub fn parse(s: &str) -> Result<DateTime<Utc>, chrono::ParseError> {
		NaiveDateTime::parse_from_str(s, FORMAT).map(|naive| naive.and_utc())
	}

	pub fn serialize<S: Serializer>(ts: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error> {
		serializer.collect_str(&ts.format(FORMAT))
	}

	pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<DateTime<Utc>, D::Error> {
		let s = String::deserialize(deserializer)?;
		parse(&s).map_err(serde::de::Error::custom)
	}

	pub mod option {
		use super::*;

		pub fn serialize<S: Serializer>(
			ts: &Option<DateTime<Utc>>,
			serializer: S,
		) -> Result<S::Ok, S::Error> {
			match ts {
				Some(ts) => super::serialize(ts, serializer),
				None => serializer.serialize_none(),
			}
		}

		pub fn deserialize<'de, D: Deserializer<'de>>(
			deserializer: D,
		) -> Result<Option<DateTime<Utc>>, D::Error> {
			let s = Option::<String>::deserialize(deserializer)?;
			s.map(|s| parse(&s).map_err(serde::de::Error::custom))
				.transpose()
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use chrono::TimeZone;
	use proptest::prelude::*;

	#[test]
	fn test_empty_event_serializes_to_empty_object() {
		let json = serde_json::to_string(&Event::new()).unwrap();
		assert_eq!(json, "{}");
	}

	#[test]
	fn test_event_id_is_simple_uuid_v4() {
		let id = EventId::new().to_string();
		assert_eq!(id.len(), 32);
		assert!(id.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
		assert_eq!(id.as_bytes()[12], b'4');
	}

	#[test]
	fn test_consecutive_event_ids_differ() {
		let a = EventId::new();
		let b = EventId::new();
		assert_ne!(a, b);
	}

	#[test]
	fn test_event_id_parses_hyphenated_form() {
		let id: EventId = "fc6d8c0c-43fc-4630-ad85-0f5b9e6e4b2b".parse().unwrap();
		assert_eq!(id.to_string(), "fc6d8c0c43fc4630ad850f5b9e6e4b2b");
	}

	#[test]
	fn test_timestamp_has_second_resolution() {
		let ts = Utc.with_ymd_and_hms(2024, 3, 9, 7, 5, 1).unwrap();
		let event = Event {
			timestamp: Some(ts),
			..Event::default()
		};
		let json = serde_json::to_value(&event).unwrap();
		assert_eq!(json["timestamp"], "2024-03-09T07:05:01Z");

		let back: Event = serde_json::from_value(json).unwrap();
		assert_eq!(back.timestamp, Some(ts));
	}

	#[test]
	fn test_exception_type_is_renamed() {
		let event = Event {
			exception: vec![Exception {
				ty: "SIGSEGV".into(),
				value: Some("Segmentation violation: invalid memory reference.".into()),
				mechanism: Some(Mechanism {
					ty: "signal".into(),
					handled: Some(false),
					..Mechanism::default()
				}),
				..Exception::default()
			}],
			..Event::default()
		};
		let json = serde_json::to_value(&event).unwrap();
		assert_eq!(json["exception"][0]["type"], "SIGSEGV");
		assert_eq!(json["exception"][0]["mechanism"]["type"], "signal");
		assert_eq!(json["exception"][0]["mechanism"]["handled"], false);
		assert!(json["exception"][0]["mechanism"].get("meta").is_none());
	}

	#[test]
	fn test_breadcrumbs_use_values_wrapper() {
		let event = Event {
			breadcrumbs: vec![Breadcrumb {
				message: Some("hello".into()),
				..Breadcrumb::default()
			}]
			.into(),
			..Event::default()
		};
		let json = serde_json::to_value(&event).unwrap();
		assert_eq!(json["breadcrumbs"]["values"][0]["message"], "hello");
	}

	proptest! {
		#[test]
		fn test_level_roundtrip(level in prop_oneof![
			Just(Level::Debug),
			Just(Level::Info),
			Just(Level::Warning),
			Just(Level::Error),
			Just(Level::Fatal),
		]) {
			let parsed: Level = level.to_string().parse().unwrap();
			prop_assert_eq!(level, parsed);

			let json = serde_json::to_string(&level).unwrap();
			prop_assert_eq!(json, format!("\"{level}\""));
		}

		#[test]
		fn test_event_id_display_roundtrip(bytes in any::<[u8; 16]>()) {
			let id = EventId(Uuid::from_bytes(bytes));
			let parsed: EventId = id.to_string().parse().unwrap();
			prop_assert_eq!(id, parsed);
		}
	}
}
