// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use std::fmt;

use serde::{Deserialize, Serialize};

/// State of the streaming connection.
///
/// Exactly one value is current at any time. Transitions are reported to
/// observers in the order they happen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionStatus {
	Connecting,
	Connected,
	#[default]
	Disconnected,
	Error,
}

impl ConnectionStatus {
	pub fn as_str(&self) -> &'static str {
		match self {
			ConnectionStatus::Connecting => "connecting",
			ConnectionStatus::Connected => "connected",
			ConnectionStatus::Disconnected => "disconnected",
			ConnectionStatus::Error => "error",
		}
	}
}

impl fmt::Display for ConnectionStatus {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}
