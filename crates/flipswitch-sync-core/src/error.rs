// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use thiserror::Error;

/// Errors produced while decoding a stream frame.
#[derive(Debug, Error)]
pub enum DecodeError {
	/// The payload was not valid JSON for the event type.
	#[error("malformed {event_type} payload: {source}")]
	Json {
		event_type: &'static str,
		#[source]
		source: serde_json::Error,
	},
}

impl DecodeError {
	/// The wire name of the event whose payload failed to decode.
	pub fn event_type(&self) -> &'static str {
		match self {
			DecodeError::Json { event_type, .. } => *event_type,
		}
	}
}
