// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Tracking calls that can be deferred until the provider is ready.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::properties::Properties;

/// An error reported through `Beacon::track_error`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorReport {
	/// Error type name, e.g. `TypeError` or a Rust type path.
	#[serde(default = "default_error_kind")]
	pub kind: String,
	/// The error message, when the source carried one.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub message: Option<String>,
}

fn default_error_kind() -> String {
	"Error".to_string()
}

impl ErrorReport {
	pub fn new(message: impl Into<String>) -> Self {
		Self {
			kind: default_error_kind(),
			message: Some(message.into()),
		}
	}

	pub fn with_kind(mut self, kind: impl Into<String>) -> Self {
		self.kind = kind.into();
		self
	}

	/// Captures the type name and display message of a Rust error.
	pub fn from_error<E: std::error::Error + ?Sized>(error: &E) -> Self {
		Self {
			kind: std::any::type_name_of_val(error).to_string(),
			message: Some(error.to_string()),
		}
	}
}

/// One tracking call, with the arguments it was made with.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "call", rename_all = "snake_case")]
pub enum Call {
	Event {
		name: String,
		#[serde(default, skip_serializing_if = "Option::is_none")]
		properties: Option<Properties>,
	},
	Pageview {
		#[serde(default, skip_serializing_if = "Option::is_none")]
		path: Option<String>,
	},
	TrackOutbound {
		url: String,
		#[serde(default, skip_serializing_if = "Option::is_none")]
		text: Option<String>,
		#[serde(default, skip_serializing_if = "Option::is_none")]
		target: Option<String>,
	},
	TrackError {
		error: ErrorReport,
		#[serde(default, skip_serializing_if = "Option::is_none")]
		context: Option<Properties>,
	},
	Identify {
		user_id: String,
		#[serde(default, skip_serializing_if = "Option::is_none")]
		traits: Option<Properties>,
	},
	SetTraits {
		traits: Properties,
	},
}

impl Call {
	/// The public method this call was made through.
	pub fn method_name(&self) -> &'static str {
		match self {
			Call::Event { .. } => "event",
			Call::Pageview { .. } => "pageview",
			Call::TrackOutbound { .. } => "trackOutbound",
			Call::TrackError { .. } => "trackError",
			Call::Identify { .. } => "identify",
			Call::SetTraits { .. } => "setTraits",
		}
	}
}

/// A call deferred because the provider was not ready.
#[derive(Debug, Clone, PartialEq)]
pub struct QueuedCall {
	pub call: Call,
	pub enqueued_at: DateTime<Utc>,
}

impl QueuedCall {
	pub fn new(call: Call) -> Self {
		Self {
			call,
			enqueued_at: Utc::now(),
		}
	}

	pub fn method_name(&self) -> &'static str {
		self.call.method_name()
	}

	/// Enqueue time as milliseconds since the Unix epoch.
	pub fn timestamp_millis(&self) -> i64 {
		self.enqueued_at.timestamp_millis()
	}
}
