// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Breadcrumb types (events leading up to a capture).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::SentryError;
use crate::event::{timestamp, Level};

/// A breadcrumb attached to subsequent events.
///
/// `timestamp` may be left unset; the scope stamps the current time when the
/// breadcrumb is recorded.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Breadcrumb {
	#[serde(
		default,
		skip_serializing_if = "Option::is_none",
		with = "timestamp::option"
	)]
	pub timestamp: Option<DateTime<Utc>>,
	#[serde(rename = "type", default, skip_serializing_if = "BreadcrumbType::is_default")]
	pub ty: BreadcrumbType,
	/// "http", "navigation", "log", "crash handler"
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub category: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub message: Option<String>,
	#[serde(default)]
	pub level: Level,
	#[serde(default, skip_serializing_if = "serde_json::Map::is_empty")]
	pub data: serde_json::Map<String, serde_json::Value>,
}

impl Breadcrumb {
	pub fn new(category: impl Into<String>, message: impl Into<String>) -> Self {
		Self {
			category: Some(category.into()),
			message: Some(message.into()),
			..Self::default()
		}
	}

	pub fn with_level(mut self, level: Level) -> Self {
		self.level = level;
		self
	}
}

/// Rendering hint for a breadcrumb.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BreadcrumbType {
	#[default]
	Default,
	Http,
	Navigation,
}

impl BreadcrumbType {
	pub fn is_default(&self) -> bool {
		*self == Self::Default
	}
}

impl fmt::Display for BreadcrumbType {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Self::Default => write!(f, "default"),
			Self::Http => write!(f, "http"),
			Self::Navigation => write!(f, "navigation"),
		}
	}
}

impl FromStr for BreadcrumbType {
	type Err = SentryError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s {
			"default" => Ok(Self::Default),
			"http" => Ok(Self::Http),
			"navigation" => Ok(Self::Navigation),
			_ => Err(SentryError::InvalidContext(format!("unknown breadcrumb type '{s}'"))),
		}
	}
}
