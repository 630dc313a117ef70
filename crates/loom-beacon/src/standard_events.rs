// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! GA4-compatible typed events.
//!
//! Each method only builds a property bag and calls [`Beacon::event`], so
//! global properties and event listeners apply as usual. Optional fields that
//! are unset, or set to an empty string, are omitted. An event whose fields
//! are all optional and all unset is sent with absent properties.

use loom_beacon_core::Properties;
use serde::Serialize;

use crate::beacon::Beacon;

/// A line item in a purchase.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct EcommerceItem {
	pub id: String,
	pub name: String,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub price: Option<f64>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub quantity: Option<u32>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub category: Option<String>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub variant: Option<String>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub brand: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Purchase {
	pub transaction_id: String,
	pub value: f64,
	pub currency: Option<String>,
	/// Each item is sent as its JSON encoding.
	pub items: Option<Vec<EcommerceItem>>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct CartItem {
	pub item_id: String,
	pub item_name: String,
	pub price: Option<f64>,
	pub quantity: Option<u32>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ViewCart {
	pub items_count: Option<u32>,
	pub value: Option<f64>,
	pub currency: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ViewItem {
	pub item_id: String,
	pub item_name: String,
	pub category: Option<String>,
	pub price: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Share {
	pub method: Option<String>,
	pub content_type: Option<String>,
	pub item_id: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct BeginCheckout {
	pub value: Option<f64>,
	pub currency: Option<String>,
	pub items_count: Option<u32>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct VideoPlay {
	pub video_id: Option<String>,
	pub video_title: Option<String>,
	/// Seconds.
	pub duration: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct WishlistItem {
	pub item_id: String,
	pub item_name: String,
	pub price: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Promotion {
	pub promotion_id: Option<String>,
	pub promotion_name: Option<String>,
	pub location: Option<String>,
}

fn text(value: Option<&str>) -> Option<&str> {
	value.filter(|v| !v.is_empty())
}

fn owned_text(value: &Option<String>) -> Option<&str> {
	text(value.as_deref())
}

impl Beacon {
	pub fn track_login(&self, method: Option<&str>) {
		self.event("login", Properties::new().insert_some("method", text(method)).non_empty());
	}

	pub fn track_sign_up(&self, method: Option<&str>) {
		self.event("sign_up", Properties::new().insert_some("method", text(method)).non_empty());
	}

	pub fn track_logout(&self) {
		self.event("logout", None);
	}

	pub fn track_purchase(&self, purchase: &Purchase) {
		let items = purchase.items.as_ref().map(|items| {
			items
				.iter()
				.filter_map(|item| serde_json::to_string(item).ok())
				.collect::<Vec<_>>()
		});

		let properties = Properties::new()
			.insert("transaction_id", purchase.transaction_id.as_str())
			.insert("value", purchase.value)
			.insert_some("currency", owned_text(&purchase.currency))
			.insert_some("items", items);
		self.event("purchase", properties);
	}

	pub fn track_add_to_cart(&self, item: &CartItem) {
		let properties = Properties::new()
			.insert("item_id", item.item_id.as_str())
			.insert("item_name", item.item_name.as_str())
			.insert_some("price", item.price)
			.insert_some("quantity", item.quantity);
		self.event("add_to_cart", properties);
	}

	pub fn track_remove_from_cart(&self, item_id: &str, item_name: &str) {
		let properties = Properties::new()
			.insert("item_id", item_id)
			.insert("item_name", item_name);
		self.event("remove_from_cart", properties);
	}

	pub fn track_view_cart(&self, cart: &ViewCart) {
		let properties = Properties::new()
			.insert_some("items_count", cart.items_count)
			.insert_some("value", cart.value)
			.insert_some("currency", owned_text(&cart.currency));
		self.event("view_cart", properties.non_empty());
	}

	pub fn track_view_item(&self, item: &ViewItem) {
		let properties = Properties::new()
			.insert("item_id", item.item_id.as_str())
			.insert("item_name", item.item_name.as_str())
			.insert_some("category", owned_text(&item.category))
			.insert_some("price", item.price);
		self.event("view_item", properties);
	}

	pub fn track_search(&self, search_term: &str, results_count: Option<u32>) {
		let properties = Properties::new()
			.insert("search_term", search_term)
			.insert_some("results_count", results_count);
		self.event("search", properties);
	}

	pub fn track_share(&self, share: &Share) {
		let properties = Properties::new()
			.insert_some("method", owned_text(&share.method))
			.insert_some("content_type", owned_text(&share.content_type))
			.insert_some("item_id", owned_text(&share.item_id));
		self.event("share", properties.non_empty());
	}

	pub fn track_begin_checkout(&self, checkout: &BeginCheckout) {
		let properties = Properties::new()
			.insert_some("value", checkout.value)
			.insert_some("currency", owned_text(&checkout.currency))
			.insert_some("items_count", checkout.items_count);
		self.event("begin_checkout", properties.non_empty());
	}

	pub fn track_generate_lead(&self, source: Option<&str>, value: Option<f64>) {
		let properties = Properties::new()
			.insert_some("source", text(source))
			.insert_some("value", value);
		self.event("generate_lead", properties.non_empty());
	}

	pub fn track_contact_form(&self, form_id: Option<&str>, form_name: Option<&str>) {
		let properties = Properties::new()
			.insert_some("form_id", text(form_id))
			.insert_some("form_name", text(form_name));
		self.event("contact_form_submit", properties.non_empty());
	}

	pub fn track_newsletter(&self, source: Option<&str>) {
		self.event(
			"newsletter_subscribe",
			Properties::new().insert_some("source", text(source)).non_empty(),
		);
	}

	pub fn track_file_download(&self, file_name: &str, file_extension: Option<&str>) {
		let properties = Properties::new()
			.insert("file_name", file_name)
			.insert_some("file_extension", text(file_extension));
		self.event("file_download", properties);
	}

	pub fn track_click_cta(&self, button: Option<&str>, location: Option<&str>) {
		let properties = Properties::new()
			.insert_some("button", text(button))
			.insert_some("location", text(location));
		self.event("click_cta", properties.non_empty());
	}

	pub fn track_video_play(&self, video: &VideoPlay) {
		let properties = Properties::new()
			.insert_some("video_id", owned_text(&video.video_id))
			.insert_some("video_title", owned_text(&video.video_title))
			.insert_some("duration", video.duration);
		self.event("video_play", properties.non_empty());
	}

	/// `percent` is the scrolled share of the page, 0 to 100.
	pub fn track_scroll_depth(&self, percent: u32, page: Option<&str>) {
		let properties = Properties::new()
			.insert("percent", percent)
			.insert_some("page", text(page));
		self.event("scroll_depth", properties);
	}

	pub fn track_comment(&self, page_id: Option<&str>, page_title: Option<&str>) {
		let properties = Properties::new()
			.insert_some("page_id", text(page_id))
			.insert_some("page_title", text(page_title));
		self.event("comment_submit", properties.non_empty());
	}

	pub fn track_rating(&self, rating: f64, item_id: Option<&str>, max_rating: Option<f64>) {
		let properties = Properties::new()
			.insert("rating", rating)
			.insert_some("item_id", text(item_id))
			.insert_some("max_rating", max_rating);
		self.event("rating_submit", properties);
	}

	pub fn track_add_to_wishlist(&self, item: &WishlistItem) {
		let properties = Properties::new()
			.insert("item_id", item.item_id.as_str())
			.insert("item_name", item.item_name.as_str())
			.insert_some("price", item.price);
		self.event("add_to_wishlist", properties);
	}

	pub fn track_view_promotion(&self, promotion: &Promotion) {
		let properties = Properties::new()
			.insert_some("promotion_id", owned_text(&promotion.promotion_id))
			.insert_some("promotion_name", owned_text(&promotion.promotion_name))
			.insert_some("location", owned_text(&promotion.location));
		self.event("view_promotion", properties.non_empty());
	}

	pub fn track_select_promotion(&self, promotion_id: Option<&str>, promotion_name: Option<&str>) {
		let properties = Properties::new()
			.insert_some("promotion_id", text(promotion_id))
			.insert_some("promotion_name", text(promotion_name));
		self.event("select_promotion", properties.non_empty());
	}

	pub fn track_refund(&self, transaction_id: &str, value: Option<f64>, currency: Option<&str>) {
		let properties = Properties::new()
			.insert("transaction_id", transaction_id)
			.insert_some("value", value)
			.insert_some("currency", text(currency));
		self.event("refund", properties);
	}
}
