// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! The change notification delivered to listeners.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A flag change notification.
///
/// An empty `flag_key` is a bulk invalidation: every flag may have changed
/// and all previously evaluated values should be treated as stale.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangeEvent {
	/// Key of the changed flag, or empty for a bulk invalidation.
	#[serde(default, skip_serializing_if = "String::is_empty")]
	pub flag_key: String,
	/// ISO-8601 timestamp of the change, as sent by the server.
	#[serde(default)]
	pub timestamp: String,
}

impl ChangeEvent {
	/// Creates an event for a single flag.
	pub fn for_flag(flag_key: impl Into<String>, timestamp: impl Into<String>) -> Self {
		Self {
			flag_key: flag_key.into(),
			timestamp: timestamp.into(),
		}
	}

	/// Creates a bulk invalidation event.
	pub fn bulk(timestamp: impl Into<String>) -> Self {
		Self {
			flag_key: String::new(),
			timestamp: timestamp.into(),
		}
	}

	/// Creates a bulk invalidation stamped with the current time.
	pub fn bulk_now() -> Self {
		Self::bulk(Utc::now().to_rfc3339())
	}

	pub fn is_bulk_invalidation(&self) -> bool {
		self.flag_key.is_empty()
	}

	/// Parses the timestamp as RFC 3339.
	///
	/// Returns `Ok(None)` when the server sent no timestamp.
	pub fn timestamp_as_datetime(&self) -> Result<Option<DateTime<Utc>>, chrono::ParseError> {
		if self.timestamp.is_empty() {
			return Ok(None);
		}
		DateTime::parse_from_rfc3339(&self.timestamp).map(|dt| Some(dt.with_timezone(&Utc)))
	}
}
