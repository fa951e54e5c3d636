// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Context types attached to events (user, request, OS, device, runtime, app).

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::event::timestamp;

/// The user affected by an event.
///
/// Keys outside the well-known set are kept in `other` and serialized inline.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct User {
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub id: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub email: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub username: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub ip_address: Option<String>,
	#[serde(flatten)]
	pub other: serde_json::Map<String, serde_json::Value>,
}

/// HTTP request that was being handled when the event happened.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Request {
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub url: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub method: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub data: Option<serde_json::Value>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub query_string: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub cookies: Option<String>,
	#[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
	pub headers: BTreeMap<String, String>,
	#[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
	pub env: BTreeMap<String, String>,
	#[serde(flatten)]
	pub other: serde_json::Map<String, serde_json::Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OsContext {
	/// "Linux", "macOS", "Windows"
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub name: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub version: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub kernel_version: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DeviceContext {
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub name: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub arch: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub processor_count: Option<u32>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RuntimeContext {
	/// "rustc"
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub name: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub version: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AppContext {
	#[serde(
		default,
		skip_serializing_if = "Option::is_none",
		with = "timestamp::option"
	)]
	pub app_start_time: Option<DateTime<Utc>>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub app_name: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub app_version: Option<String>,
}

/// The `contexts` object of an event.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Contexts {
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub os: Option<OsContext>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub device: Option<DeviceContext>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub runtime: Option<RuntimeContext>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub app: Option<AppContext>,
	#[serde(flatten)]
	pub other: serde_json::Map<String, serde_json::Value>,
}

impl Contexts {
	pub fn is_empty(&self) -> bool {
		self.os.is_none()
			&& self.device.is_none()
			&& self.runtime.is_none()
			&& self.app.is_none()
			&& self.other.is_empty()
	}
}
