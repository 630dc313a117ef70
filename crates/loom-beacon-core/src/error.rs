// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Error types for the analytics beacon.
//!
//! None of these cross the public `Beacon` surface: they are produced by
//! configuration loading, provider acquisition and provider operations, and
//! the lifecycle controller absorbs them into log records and state changes.

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur while loading or validating a [`BeaconConfig`](crate::BeaconConfig).
#[derive(Debug, Error)]
pub enum ConfigError {
	/// I/O error reading config file
	#[error("I/O error: {0}")]
	Io(#[from] std::io::Error),

	/// TOML parsing error
	#[error("TOML parse error in {path}: {source}")]
	TomlParse {
		path: PathBuf,
		#[source]
		source: toml::de::Error,
	},

	/// Missing required field
	#[error("Missing required field: {0}")]
	MissingField(String),

	/// Invalid value
	#[error("Invalid value for {field}: {message}")]
	InvalidValue { field: String, message: String },
}

impl ConfigError {
	/// Create a missing field error
	pub fn missing_field(field: impl Into<String>) -> Self {
		Self::MissingField(field.into())
	}

	/// Create an invalid value error
	pub fn invalid_value(field: impl Into<String>, message: impl Into<String>) -> Self {
		Self::InvalidValue {
			field: field.into(),
			message: message.into(),
		}
	}
}

/// A provider operation rejected a call.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ProviderError {
	/// The provider refused or failed the operation.
	#[error("{operation} rejected by provider: {message}")]
	Rejected {
		operation: &'static str,
		message: String,
	},

	/// The provider is not in a state where it can accept calls.
	#[error("provider unavailable")]
	Unavailable,
}

impl ProviderError {
	/// Create a rejection for the named operation.
	pub fn rejected(operation: &'static str, message: impl Into<String>) -> Self {
		Self::Rejected {
			operation,
			message: message.into(),
		}
	}
}

/// Errors raised while acquiring a provider handle.
#[derive(Debug, Error)]
pub enum LoadError {
	/// The provider did not appear before the load timeout elapsed.
	#[error("provider did not initialize within {timeout_ms}ms")]
	Timeout { timeout_ms: u64 },

	/// The host reported that the provider script failed to load.
	#[error("failed to load provider script from {src}")]
	ScriptFailed { src: String },

	/// The host cannot inject scripts, so the provider can never appear.
	#[error("no script host available to load {src}")]
	NoScriptHost { src: String },

	/// SDK strategy requested but no provider exposing `init` was registered.
	#[error("SDK load strategy requires a registered provider exposing init()")]
	MissingInitHook,

	/// The provider's `init` hook failed.
	#[error("provider init failed: {0}")]
	InitFailed(#[source] ProviderError),

	/// The configuration handed to boot is unusable.
	#[error("invalid configuration: {0}")]
	InvalidConfig(#[from] ConfigError),
}

/// Result type alias for provider operations.
pub type Result<T> = std::result::Result<T, ProviderError>;
