// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Server-push stream payloads and frame decoding.
//!
//! A frame on the wire is one or more `field: value` lines terminated by a
//! blank line. Only `event:` and `data:` matter here; splitting the byte
//! stream into frames is the transport's job. [`StreamEvent::decode`] takes
//! the event name and the single-line JSON data of one frame.
//!
//! # Events
//!
//! - `heartbeat` - Keep-alive, ignored
//! - `flag-updated` - A single flag changed
//! - `config-updated` - Environment configuration changed, all flags are stale
//! - `api-key-rotated` - Advisory: the current key expires at `validUntil`
//!
//! # Example
//!
//! ```
//! use flipswitch_sync_core::{ChangeEvent, StreamEvent};
//!
//! let event = StreamEvent::decode(
//!     "flag-updated",
//!     r#"{"flagKey":"beta","timestamp":"2024-03-15T10:30:00Z"}"#,
//! )
//! .unwrap()
//! .unwrap();
//!
//! assert_eq!(
//!     event.change_event(),
//!     Some(ChangeEvent::for_flag("beta", "2024-03-15T10:30:00Z"))
//! );
//! ```

use serde::{Deserialize, Serialize};

use crate::error::DecodeError;
use crate::event::ChangeEvent;

/// Wire names of the recognized event types.
pub mod event_types {
	pub const HEARTBEAT: &str = "heartbeat";
	pub const FLAG_UPDATED: &str = "flag-updated";
	pub const CONFIG_UPDATED: &str = "config-updated";
	pub const API_KEY_ROTATED: &str = "api-key-rotated";
}

/// Payload of a `flag-updated` event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FlagUpdatedData {
	/// Empty or absent means every flag may have changed.
	#[serde(default)]
	pub flag_key: String,
	#[serde(default)]
	pub timestamp: String,
}

/// Payload of a `config-updated` event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigUpdatedData {
	#[serde(default)]
	pub timestamp: String,
}

/// Payload of an `api-key-rotated` event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiKeyRotatedData {
	/// When the key currently in use stops being accepted.
	#[serde(default)]
	pub valid_until: String,
	#[serde(default)]
	pub timestamp: String,
}

/// Advisory notice handed to the key-rotation side channel.
pub type KeyRotationNotice = ApiKeyRotatedData;

/// A decoded stream event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEvent {
	Heartbeat,
	FlagUpdated(FlagUpdatedData),
	ConfigUpdated(ConfigUpdatedData),
	ApiKeyRotated(ApiKeyRotatedData),
}

impl StreamEvent {
	/// Decodes one frame.
	///
	/// Returns `Ok(None)` for frames that carry nothing to act on: an empty
	/// `data` field or an unrecognized event type. A heartbeat is decoded
	/// so callers can count it, but it never yields a [`ChangeEvent`].
	pub fn decode(event_type: &str, data: &str) -> Result<Option<Self>, DecodeError> {
		let data = data.trim();
		if data.is_empty() {
			return Ok(None);
		}

		let event = match event_type.trim() {
			event_types::HEARTBEAT => StreamEvent::Heartbeat,
			event_types::FLAG_UPDATED => {
				StreamEvent::FlagUpdated(parse(event_types::FLAG_UPDATED, data)?)
			}
			event_types::CONFIG_UPDATED => {
				StreamEvent::ConfigUpdated(parse(event_types::CONFIG_UPDATED, data)?)
			}
			event_types::API_KEY_ROTATED => {
				StreamEvent::ApiKeyRotated(parse(event_types::API_KEY_ROTATED, data)?)
			}
			_ => return Ok(None),
		};

		Ok(Some(event))
	}

	/// Returns the event type name as a string.
	pub fn event_type(&self) -> &'static str {
		match self {
			StreamEvent::Heartbeat => event_types::HEARTBEAT,
			StreamEvent::FlagUpdated(_) => event_types::FLAG_UPDATED,
			StreamEvent::ConfigUpdated(_) => event_types::CONFIG_UPDATED,
			StreamEvent::ApiKeyRotated(_) => event_types::API_KEY_ROTATED,
		}
	}

	/// The listener-facing change this event represents, if any.
	///
	/// `config-updated` maps to a bulk invalidation. Heartbeats and key
	/// rotation notices never produce a change.
	pub fn change_event(&self) -> Option<ChangeEvent> {
		match self {
			StreamEvent::FlagUpdated(data) => {
				Some(ChangeEvent::for_flag(&data.flag_key, &data.timestamp))
			}
			StreamEvent::ConfigUpdated(data) => Some(ChangeEvent::bulk(&data.timestamp)),
			StreamEvent::Heartbeat | StreamEvent::ApiKeyRotated(_) => None,
		}
	}
}

fn parse<T: for<'de> Deserialize<'de>>(
	event_type: &'static str,
	data: &str,
) -> Result<T, DecodeError> {
	serde_json::from_str(data).map_err(|source| DecodeError::Json { event_type, source })
}
