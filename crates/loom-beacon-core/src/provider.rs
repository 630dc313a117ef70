// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! The provider contract: the capability set the beacon drives once a
//! provider handle has been obtained.
//!
//! A provider has a required core ([`Provider`]'s required methods) and a
//! separate set of optional capabilities. Each optional capability is its own
//! trait, reached through an accessor on [`Provider`] that returns `None`
//! when the provider does not support it:
//!
//! | Capability | Accessor |
//! |------------|----------|
//! | `setTraits` | [`Provider::traits`] |
//! | `error` | [`Provider::error_reporting`] |
//! | session replay | [`Provider::session_replay`] |
//! | `onPageChange` | [`Provider::page_changes`] |
//! | `cleanup` | [`Provider::cleanup_hook`] |
//! | `init` | [`Provider::initializer`] |

use std::collections::BTreeSet;
use std::fmt;

use async_trait::async_trait;

use crate::call::ErrorReport;
use crate::error::Result;
use crate::properties::Properties;

/// Operations a provider may expose.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Capability {
	Pageview,
	Event,
	TrackOutbound,
	Identify,
	ClearUserId,
	GetUserId,
	SetTraits,
	Error,
	SessionReplay,
	PageChange,
	Cleanup,
	Init,
}

impl Capability {
	/// The minimal set every provider handle must expose.
	pub const REQUIRED: [Capability; 6] = [
		Capability::Pageview,
		Capability::Event,
		Capability::TrackOutbound,
		Capability::Identify,
		Capability::ClearUserId,
		Capability::GetUserId,
	];
}

/// Callback invoked with `(path, previous_path)` on client-side navigation.
pub type PageChangeCallback = Box<dyn Fn(&str, &str) + Send + Sync>;

/// A one-shot capability that removes exactly one registration.
pub struct Unsubscribe {
	inner: Option<Box<dyn FnOnce() + Send + Sync>>,
}

impl Unsubscribe {
	pub fn new(f: impl FnOnce() + Send + Sync + 'static) -> Self {
		Self {
			inner: Some(Box::new(f)),
		}
	}

	/// An unsubscribe that does nothing, returned when registration was refused.
	pub fn noop() -> Self {
		Self { inner: None }
	}

	pub fn unsubscribe(mut self) {
		if let Some(f) = self.inner.take() {
			f();
		}
	}
}

impl fmt::Debug for Unsubscribe {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("Unsubscribe")
			.field("noop", &self.inner.is_none())
			.finish()
	}
}

/// Options handed to a provider's async init hook.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InitOptions {
	pub analytics_host: String,
	pub site_id: String,
	pub debug: bool,
}

/// User traits update.
pub trait TraitsCapability: Send + Sync {
	fn set_traits(&self, traits: &Properties) -> Result<()>;
}

/// Native error reporting.
pub trait ErrorCapability: Send + Sync {
	fn error(&self, error: &ErrorReport, context: Option<&Properties>) -> Result<()>;
}

pub trait SessionReplay: Send + Sync {
	fn start(&self) -> Result<()>;
	fn stop(&self) -> Result<()>;
	fn is_active(&self) -> bool;
}

/// Client-side navigation notifications.
pub trait PageChanges: Send + Sync {
	fn on_page_change(&self, callback: PageChangeCallback) -> Unsubscribe;
}

pub trait Cleanup: Send + Sync {
	fn cleanup(&self);
}

/// Async initialization used by the SDK load strategy.
#[async_trait]
pub trait ProviderInit: Send + Sync {
	async fn init(&self, options: InitOptions) -> Result<()>;
}

/// The analytics engine's runtime surface.
pub trait Provider: Send + Sync {
	fn pageview(&self, path: Option<&str>) -> Result<()>;

	fn event(&self, name: &str, properties: Option<&Properties>) -> Result<()>;

	fn track_outbound(&self, url: &str, text: Option<&str>, target: Option<&str>) -> Result<()>;

	fn identify(&self, user_id: &str, traits: Option<&Properties>) -> Result<()>;

	fn clear_user_id(&self) -> Result<()>;

	fn user_id(&self) -> Option<String>;

	fn traits(&self) -> Option<&dyn TraitsCapability> {
		None
	}

	fn error_reporting(&self) -> Option<&dyn ErrorCapability> {
		None
	}

	fn session_replay(&self) -> Option<&dyn SessionReplay> {
		None
	}

	fn page_changes(&self) -> Option<&dyn PageChanges> {
		None
	}

	fn cleanup_hook(&self) -> Option<&dyn Cleanup> {
		None
	}

	fn initializer(&self) -> Option<&dyn ProviderInit> {
		None
	}

	/// The capabilities this handle actually exposes.
	///
	/// Native implementations get the required core plus whatever optional
	/// accessors return `Some`. Handles that wrap a foreign object override
	/// this to report what the object really has.
	fn capabilities(&self) -> BTreeSet<Capability> {
		let mut caps: BTreeSet<Capability> = Capability::REQUIRED.into_iter().collect();
		let optional = [
			(self.traits().is_some(), Capability::SetTraits),
			(self.error_reporting().is_some(), Capability::Error),
			(self.session_replay().is_some(), Capability::SessionReplay),
			(self.page_changes().is_some(), Capability::PageChange),
			(self.cleanup_hook().is_some(), Capability::Cleanup),
			(self.initializer().is_some(), Capability::Init),
		];
		caps.extend(
			optional
				.into_iter()
				.filter_map(|(present, cap)| present.then_some(cap)),
		);
		caps
	}
}

/// Returns true when the handle exposes every required operation and may be
/// treated as a provider.
pub fn satisfies_contract(provider: &dyn Provider) -> bool {
	let caps = provider.capabilities();
	Capability::REQUIRED.iter().all(|cap| caps.contains(cap))
}
