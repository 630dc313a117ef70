// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Core types for the Loom web analytics beacon.
//!
//! This crate holds the runtime-free vocabulary shared by the beacon and its
//! integrations: configuration, properties, deferred calls, the provider
//! contract and error types. The lifecycle controller lives in `loom-beacon`.

pub mod call;
pub mod config;
pub mod error;
pub mod properties;
pub mod provider;

pub use call::{Call, ErrorReport, QueuedCall};
pub use config::{BeaconConfig, LoadStrategy, DEFAULT_IDENTITY_SELECTOR, DEFAULT_LOAD_TIMEOUT_MS};
pub use error::{ConfigError, LoadError, ProviderError, Result};
pub use properties::{merge_global, GlobalProperties, Properties, PropertyValue};
pub use provider::{
	satisfies_contract, Capability, Cleanup, ErrorCapability, InitOptions, PageChangeCallback,
	PageChanges, Provider, ProviderInit, SessionReplay, TraitsCapability, Unsubscribe,
};
