// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Polling fallback for when the SSE connection keeps failing.
//!
//! The controller counts consecutive [`ConnectionStatus::Error`] statuses.
//! Once the count reaches the configured threshold it starts a periodic task
//! that asks the [`RefreshSource`] for a bulk re-evaluation and then
//! dispatches a bulk invalidation through the [`ListenerRegistry`]. The first
//! [`ConnectionStatus::Connected`] stops the task and resets the count.

use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use flipswitch_sync_core::{ChangeEvent, ConnectionStatus};
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

use crate::config::SyncConfig;
use crate::error::{Result, SyncError};
use crate::listeners::ListenerRegistry;

pub const DEFAULT_POLLING_INTERVAL: Duration = Duration::from_secs(30);

/// Consecutive SSE errors before polling starts.
pub const DEFAULT_MAX_SSE_RETRIES: u32 = 5;

/// Performs a bulk flag re-evaluation.
///
/// Errors are logged by the polling task and never stop it.
#[async_trait]
pub trait RefreshSource: Send + Sync + 'static {
	async fn refresh(&self) -> Result<()>;
}

/// A [`RefreshSource`] backed by an async closure. See [`refresh_fn`].
pub struct RefreshFn<F>(F);

/// Wraps an async closure as a [`RefreshSource`].
///
/// ```ignore
/// let source = refresh_fn(move || {
///     let flags = flags.clone();
///     async move { flags.reload().await.map_err(|e| SyncError::Refresh(e.to_string())) }
/// });
/// ```
pub fn refresh_fn<F, Fut>(f: F) -> RefreshFn<F>
where
	F: Fn() -> Fut + Send + Sync + 'static,
	Fut: Future<Output = Result<()>> + Send + 'static,
{
	RefreshFn(f)
}

#[async_trait]
impl<F, Fut> RefreshSource for RefreshFn<F>
where
	F: Fn() -> Fut + Send + Sync + 'static,
	Fut: Future<Output = Result<()>> + Send + 'static,
{
	async fn refresh(&self) -> Result<()> {
		(self.0)().await
	}
}

/// Polling fallback settings.
#[derive(Debug, Clone)]
pub struct PollingConfig {
	pub enabled: bool,
	pub interval: Duration,
	/// Consecutive errors that trigger polling.
	pub max_failures: u32,
}

impl Default for PollingConfig {
	fn default() -> Self {
		Self {
			enabled: true,
			interval: DEFAULT_POLLING_INTERVAL,
			max_failures: DEFAULT_MAX_SSE_RETRIES,
		}
	}
}

impl From<&SyncConfig> for PollingConfig {
	fn from(config: &SyncConfig) -> Self {
		Self {
			enabled: config.polling_fallback,
			interval: config.polling_interval,
			max_failures: config.max_sse_retries,
		}
	}
}

#[derive(Default)]
struct PollingState {
	consecutive_failures: u32,
	stop_tx: Option<watch::Sender<bool>>,
	shut_down: bool,
}

impl PollingState {
	fn is_active(&self) -> bool {
		self.stop_tx.is_some()
	}

	fn stop(&mut self) -> bool {
		match self.stop_tx.take() {
			Some(tx) => {
				tx.send_replace(true);
				true
			}
			None => false,
		}
	}
}

/// Starts and stops periodic refresh based on SSE health.
pub struct PollingFallbackController {
	config: PollingConfig,
	refresh: Arc<dyn RefreshSource>,
	registry: ListenerRegistry,
	state: Mutex<PollingState>,
}

impl PollingFallbackController {
	pub fn new(
		config: PollingConfig,
		refresh: Arc<dyn RefreshSource>,
		registry: ListenerRegistry,
	) -> Self {
		Self {
			config,
			refresh,
			registry,
			state: Mutex::new(PollingState::default()),
		}
	}

	/// Feeds one connection status, in the order statuses occur.
	pub fn on_status(&self, status: ConnectionStatus) {
		let mut state = self.lock();
		match status {
			ConnectionStatus::Error => {
				state.consecutive_failures = state.consecutive_failures.saturating_add(1);
				if state.consecutive_failures >= self.config.max_failures {
					self.start(&mut state);
				}
			}
			ConnectionStatus::Connected => {
				state.consecutive_failures = 0;
				if state.stop() {
					info!("SSE reconnected, stopping polling fallback");
				}
			}
			ConnectionStatus::Connecting | ConnectionStatus::Disconnected => {}
		}
	}

	/// Whether the periodic refresh task is running.
	pub fn is_active(&self) -> bool {
		self.lock().is_active()
	}

	pub fn consecutive_failures(&self) -> u32 {
		self.lock().consecutive_failures
	}

	/// Stops polling for good. Later statuses never restart it.
	pub fn shutdown(&self) {
		let mut state = self.lock();
		state.shut_down = true;
		if state.stop() {
			debug!("Polling fallback stopped on shutdown");
		}
	}

	fn start(&self, state: &mut PollingState) {
		if !self.config.enabled || state.shut_down || state.is_active() {
			return;
		}

		let runtime = match tokio::runtime::Handle::try_current() {
			Ok(runtime) => runtime,
			Err(_) => {
				error!(error = %SyncError::NoRuntime, "Cannot start polling fallback");
				return;
			}
		};

		warn!(
			failures = state.consecutive_failures,
			interval_ms = self.config.interval.as_millis() as u64,
			"SSE connection failing, starting polling fallback"
		);

		let (stop_tx, stop_rx) = watch::channel(false);
		state.stop_tx = Some(stop_tx);
		runtime.spawn(run_polling_loop(
			self.config.interval,
			Arc::clone(&self.refresh),
			self.registry.clone(),
			stop_rx,
		));
	}

	fn lock(&self) -> MutexGuard<'_, PollingState> {
		self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
	}
}

impl std::fmt::Debug for PollingFallbackController {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		let state = self.lock();
		f.debug_struct("PollingFallbackController")
			.field("config", &self.config)
			.field("active", &state.is_active())
			.field("consecutive_failures", &state.consecutive_failures)
			.finish()
	}
}

impl Drop for PollingFallbackController {
	fn drop(&mut self) {
		self.lock().stop();
	}
}

async fn run_polling_loop(
	period: Duration,
	refresh: Arc<dyn RefreshSource>,
	registry: ListenerRegistry,
	mut stop: watch::Receiver<bool>,
) {
	let mut ticker = tokio::time::interval(period);
	ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
	ticker.tick().await;

	loop {
		tokio::select! {
			biased;
			_ = stop.wait_for(|stopped| *stopped) => break,
			_ = ticker.tick() => {}
		}

		debug!("Polling for flag changes");
		if let Err(e) = refresh.refresh().await {
			warn!(error = %e, "Polling refresh failed");
		}
		registry.dispatch(&ChangeEvent::bulk_now());
	}

	debug!("Polling task stopped");
}
