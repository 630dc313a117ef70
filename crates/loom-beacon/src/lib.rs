// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Queue-before-ready web analytics beacon.
//!
//! Application code emits events through a [`Beacon`] at any point in its
//! lifecycle. Until the external analytics provider has been acquired, calls
//! are held in a bounded FIFO queue; once boot completes they are replayed in
//! order, exactly once, and later calls go straight through.
//!
//! # Pipeline
//!
//! ```text
//!  Beacon::event ─► merge globals ─► notify listeners ─┬─► provider   (ready)
//!                                                      └─► CallQueue  (not ready)
//!  pageview / identify / ... ──────────────────────────┘
//!
//!  AutoTracker (clicks) ──┐
//!  DataLayerBridge ───────┴─► Beacon::event
//! ```
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//!
//! use loom_beacon::testing::{RecordingProvider, StaticLoader};
//! use loom_beacon::{Beacon, BeaconConfig, Properties};
//!
//! # tokio_test::block_on(async {
//! let provider = Arc::new(RecordingProvider::new());
//! let beacon = Beacon::builder()
//! 	.loader(Arc::new(StaticLoader::new(provider.clone())))
//! 	.build();
//!
//! beacon.pageview(Some("/pricing"));
//! beacon.event("click_cta", Properties::new().insert("button", "hero"));
//!
//! beacon
//! 	.boot(BeaconConfig::new("https://analytics.example.com", "site_1"))
//! 	.await;
//!
//! assert_eq!(provider.calls().len(), 2);
//! # });
//! ```

mod auto_track;
mod beacon;
mod bridge;
pub mod dom;
mod dry_run;
mod global;
mod identify;
mod isolation;
pub mod loader;
mod queue;
mod registry;
pub mod standard_events;
pub mod testing;

pub use auto_track::{AutoTracker, ATTR_PREFIX, EVENT_ATTR};
pub use beacon::{Beacon, BeaconBuilder, BootState};
pub use bridge::{translate_entry, DataLayer, DataLayerBridge, EventSink};
pub use dom::{Document, Element};
pub use dry_run::DryRunProvider;
pub use global::{global, reset_global};
pub use identify::{identity_from_document, IDENTITY_ATTRIBUTES};
pub use loader::{DefaultLoader, Loader, ProviderSlot, ScriptInjector, ScriptTag};
pub use queue::{CallQueue, DEFAULT_QUEUE_CAPACITY};
pub use registry::{EventListener, ReadyCallback};

pub use loom_beacon_core::{
	BeaconConfig, Call, ErrorReport, GlobalProperties, LoadStrategy, Properties, PropertyValue,
	Provider, Unsubscribe,
};
