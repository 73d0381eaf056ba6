// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! SSE (Server-Sent Events) connection for real-time flag change notices.
//!
//! [`StreamingClient`] owns one logical connection to the flag events
//! endpoint. A single background task drives the cycle
//! connect → read → disconnect → backoff → reconnect until [`close`] is
//! called. Status transitions and decoded change events are reported through
//! the callbacks supplied to [`StreamingClientBuilder`], in the order they
//! occur, from that task.
//!
//! [`close`]: StreamingClient::close

use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use eventsource_stream::Eventsource;
use flipswitch_sync_core::{ChangeEvent, ConnectionStatus, StreamEvent};
use futures::StreamExt;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, ACCEPT, CACHE_CONTROL};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::backoff::{Backoff, DEFAULT_MAX_RETRY_DELAY, DEFAULT_MIN_RETRY_DELAY};
use crate::config::{normalize_base_url, ApiKey, SyncConfig};
use crate::error::{Result, SyncError};
use crate::listeners::{panic_message, ChangeListener};
use crate::rotation::{KeyRotationHook, NoOpKeyRotationHook, SharedKeyRotationHook};

/// Header carrying the environment API key.
pub const API_KEY_HEADER: &str = "X-API-Key";

/// Path of the flag events endpoint, relative to the base URL.
pub const EVENTS_PATH: &str = "/api/v1/flags/events";

/// Callback invoked on every connection status transition.
pub type StatusListener = Arc<dyn Fn(ConnectionStatus) + Send + Sync>;

struct ClientState {
	status: ConnectionStatus,
	backoff: Backoff,
	started: bool,
	closed: bool,
}

struct Shared {
	url: String,
	headers: HeaderMap,
	http: reqwest::Client,
	state: Mutex<ClientState>,
	on_change: ChangeListener,
	on_status: StatusListener,
	rotation_hook: SharedKeyRotationHook,
	reconnect_attempts: AtomicU64,
	frames_received: AtomicU64,
	shutdown_tx: watch::Sender<bool>,
}

/// How one connect/read cycle ended.
enum Cycle {
	/// `close()` was observed.
	Shutdown,
	/// The server ended the stream cleanly.
	Ended,
	/// The stream broke after the handshake.
	Interrupted(SyncError),
	/// The handshake failed.
	Failed(SyncError),
}

/// Manages the SSE connection for real-time flag change notices.
///
/// Created through [`StreamingClient::builder`]. Not reusable after
/// [`close`](StreamingClient::close); build a fresh client to reconnect.
pub struct StreamingClient {
	shared: Arc<Shared>,
	task: Mutex<Option<JoinHandle<()>>>,
}

impl StreamingClient {
	pub fn builder() -> StreamingClientBuilder {
		StreamingClientBuilder::default()
	}

	/// Starts background connection management.
	///
	/// Idempotent: a second call, or a call after [`close`](Self::close),
	/// does nothing. Must be called from within a Tokio runtime; otherwise
	/// the failure is logged and the client stays disconnected.
	pub fn connect(&self) {
		{
			let mut state = self.shared.lock();
			if state.closed || state.started {
				return;
			}
			state.started = true;
		}

		let runtime = match tokio::runtime::Handle::try_current() {
			Ok(runtime) => runtime,
			Err(_) => {
				error!(error = %SyncError::NoRuntime, "Cannot start SSE connection");
				self.shared.lock().started = false;
				return;
			}
		};

		let shared = Arc::clone(&self.shared);
		let shutdown_rx = self.shared.shutdown_tx.subscribe();
		let handle = runtime.spawn(run_stream_loop(shared, shutdown_rx));
		*lock_task(&self.task) = Some(handle);
	}

	/// Stops the connection and every future reconnect attempt.
	///
	/// Idempotent and callable from any thread. Observers receive a final
	/// [`ConnectionStatus::Disconnected`].
	pub fn close(&self) {
		let started = {
			let mut state = self.shared.lock();
			if state.closed {
				return;
			}
			state.closed = true;
			state.status = ConnectionStatus::Disconnected;
			state.started
		};

		info!("Closing SSE connection");
		self.shared.shutdown_tx.send_replace(true);

		// A live task reports the final status as it exits.
		let task_alive = started
			&& lock_task(&self.task)
				.as_ref()
				.map_or(true, |handle| !handle.is_finished());
		if !task_alive {
			self.shared.notify_status(ConnectionStatus::Disconnected);
		}
	}

	/// Current connection status. Never blocks on I/O.
	pub fn status(&self) -> ConnectionStatus {
		self.shared.lock().status
	}

	pub fn is_closed(&self) -> bool {
		self.shared.lock().closed
	}

	/// Delay that will be waited before the next reconnect attempt.
	pub fn retry_delay(&self) -> Duration {
		self.shared.lock().backoff.current()
	}

	/// Number of reconnect attempts scheduled since the client was built.
	pub fn reconnect_attempts(&self) -> u64 {
		self.shared.reconnect_attempts.load(Ordering::SeqCst)
	}

	/// Number of frames received since the client was built.
	pub fn frames_received(&self) -> u64 {
		self.shared.frames_received.load(Ordering::SeqCst)
	}

	/// URL of the events endpoint this client connects to.
	pub fn url(&self) -> &str {
		&self.shared.url
	}
}

impl std::fmt::Debug for StreamingClient {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("StreamingClient")
			.field("url", &self.shared.url)
			.field("status", &self.status())
			.field("closed", &self.is_closed())
			.finish()
	}
}

impl Drop for StreamingClient {
	fn drop(&mut self) {
		self.close();
	}
}

impl Shared {
	fn lock(&self) -> MutexGuard<'_, ClientState> {
		self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
	}

	/// Records a status and reports it. Returns false once closed.
	fn transition(&self, status: ConnectionStatus) -> bool {
		{
			let mut state = self.lock();
			if state.closed {
				return false;
			}
			state.status = status;
			if status == ConnectionStatus::Connected {
				state.backoff.reset();
			}
		}
		self.notify_status(status);
		true
	}

	fn notify_status(&self, status: ConnectionStatus) {
		let on_status = &self.on_status;
		if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(|| on_status(status))) {
			error!(
				status = %status,
				panic = %panic_message(payload.as_ref()),
				"Status listener panicked"
			);
		}
	}

	fn notify_change(&self, change: &ChangeEvent) {
		let on_change = &self.on_change;
		if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(|| on_change(change))) {
			error!(
				flag_key = %change.flag_key,
				panic = %panic_message(payload.as_ref()),
				"Change listener panicked"
			);
		}
	}

	fn handle_frame(&self, event_type: &str, data: &str) {
		self.frames_received.fetch_add(1, Ordering::SeqCst);

		let event = match StreamEvent::decode(event_type, data) {
			Ok(Some(event)) => event,
			Ok(None) => {
				debug!(event_type = %event_type, "Ignoring SSE frame");
				return;
			}
			Err(e) => {
				let event_type = e.event_type();
				let error = SyncError::from(e);
				warn!(event_type = %event_type, error = %error, "Failed to parse SSE event");
				return;
			}
		};

		match event {
			StreamEvent::Heartbeat => {}
			StreamEvent::ApiKeyRotated(notice) => {
				warn!(
					valid_until = %notice.valid_until,
					"API key was rotated; the current key stops working at valid_until"
				);
				let hook = &self.rotation_hook;
				if let Err(payload) =
					panic::catch_unwind(AssertUnwindSafe(|| hook.on_api_key_rotated(&notice)))
				{
					error!(
						panic = %panic_message(payload.as_ref()),
						"Key rotation hook panicked"
					);
				}
			}
			other => {
				if let Some(change) = other.change_event() {
					debug!(event_type = %other.event_type(), flag_key = %change.flag_key, "Flag change received");
					self.notify_change(&change);
				}
			}
		}
	}

	async fn connect_and_read(&self, shutdown: &mut watch::Receiver<bool>) -> Cycle {
		info!(url = %self.url, "Connecting to SSE stream");

		let request = self.http.get(&self.url).headers(self.headers.clone());
		let response = tokio::select! {
			response = request.send() => response,
			_ = shutdown.wait_for(|closed| *closed) => return Cycle::Shutdown,
		};

		let response = match response {
			Ok(response) => response,
			Err(e) => return Cycle::Failed(SyncError::ConnectionFailed(e)),
		};

		let status = response.status();
		if !status.is_success() {
			let message = tokio::select! {
				text = response.text() => text.unwrap_or_default(),
				_ = shutdown.wait_for(|closed| *closed) => return Cycle::Shutdown,
			};
			return Cycle::Failed(SyncError::Handshake {
				status: status.as_u16(),
				message,
			});
		}

		if !self.transition(ConnectionStatus::Connected) {
			return Cycle::Shutdown;
		}
		info!("SSE connection established");

		let mut events = response.bytes_stream().eventsource();
		loop {
			let next = tokio::select! {
				next = events.next() => next,
				_ = shutdown.wait_for(|closed| *closed) => return Cycle::Shutdown,
			};

			if *shutdown.borrow() {
				return Cycle::Shutdown;
			}

			match next {
				Some(Ok(event)) => self.handle_frame(&event.event, &event.data),
				Some(Err(e)) => return Cycle::Interrupted(SyncError::Stream(e.to_string())),
				None => return Cycle::Ended,
			}
		}
	}
}

/// Runs the connect/read/backoff cycle until the client is closed.
async fn run_stream_loop(shared: Arc<Shared>, mut shutdown: watch::Receiver<bool>) {
	loop {
		if !shared.transition(ConnectionStatus::Connecting) {
			break;
		}

		let next_status = match shared.connect_and_read(&mut shutdown).await {
			Cycle::Shutdown => break,
			Cycle::Ended => {
				info!("SSE stream closed by server");
				ConnectionStatus::Disconnected
			}
			Cycle::Interrupted(e) => {
				warn!(error = %e, "SSE stream interrupted");
				ConnectionStatus::Disconnected
			}
			Cycle::Failed(e) => {
				if e.is_retryable() {
					warn!(error = %e, "SSE connection error");
				} else {
					error!(error = %e, "SSE connection error");
				}
				if let SyncError::Handshake { message, .. } = &e {
					if !message.is_empty() {
						debug!(body = %message, "SSE handshake response body");
					}
				}
				ConnectionStatus::Error
			}
		};

		if !shared.transition(next_status) {
			break;
		}

		let delay = shared.lock().backoff.current();
		shared.reconnect_attempts.fetch_add(1, Ordering::SeqCst);
		info!(delay_ms = delay.as_millis() as u64, "Scheduling SSE reconnect");

		tokio::select! {
			_ = tokio::time::sleep(delay) => {}
			_ = shutdown.wait_for(|closed| *closed) => {
				debug!("SSE reconnect wait cancelled");
				break;
			}
		}

		shared.lock().backoff.advance();
	}

	shared.notify_status(ConnectionStatus::Disconnected);
	debug!("SSE task stopped");
}

fn lock_task(task: &Mutex<Option<JoinHandle<()>>>) -> MutexGuard<'_, Option<JoinHandle<()>>> {
	task.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Builder for [`StreamingClient`].
pub struct StreamingClientBuilder {
	base_url: Option<String>,
	api_key: Option<ApiKey>,
	headers: Vec<(String, String)>,
	min_retry_delay: Duration,
	max_retry_delay: Duration,
	on_change: Option<ChangeListener>,
	on_status: Option<StatusListener>,
	rotation_hook: SharedKeyRotationHook,
}

impl Default for StreamingClientBuilder {
	fn default() -> Self {
		Self {
			base_url: None,
			api_key: None,
			headers: Vec::new(),
			min_retry_delay: DEFAULT_MIN_RETRY_DELAY,
			max_retry_delay: DEFAULT_MAX_RETRY_DELAY,
			on_change: None,
			on_status: None,
			rotation_hook: Arc::new(NoOpKeyRotationHook),
		}
	}
}

impl StreamingClientBuilder {
	/// Takes the URL, key, retry delays and headers from a finalized config.
	///
	/// Telemetry headers are added when `config.telemetry` is set, before
	/// the configured extra headers.
	pub fn config(mut self, config: &SyncConfig) -> Self {
		self.base_url = Some(config.base_url.clone());
		self.api_key = Some(config.api_key.clone());
		self.min_retry_delay = config.min_retry_delay;
		self.max_retry_delay = config.max_retry_delay;
		if config.telemetry {
			self.headers
				.extend(flipswitch_common_http::telemetry_headers(config.enable_realtime));
		}
		self.headers.extend(
			config
				.extra_headers
				.iter()
				.map(|(k, v)| (k.clone(), v.clone())),
		);
		self
	}

	/// Sets the server base URL, e.g. `https://api.flipswitch.io`.
	pub fn base_url(mut self, url: impl Into<String>) -> Self {
		self.base_url = Some(url.into());
		self
	}

	pub fn api_key(mut self, key: impl Into<String>) -> Self {
		self.api_key = Some(ApiKey::new(key));
		self
	}

	/// Adds a pass-through header. Client-set headers take precedence.
	pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
		self.headers.push((name.into(), value.into()));
		self
	}

	pub fn headers<I, K, V>(mut self, headers: I) -> Self
	where
		I: IntoIterator<Item = (K, V)>,
		K: Into<String>,
		V: Into<String>,
	{
		self.headers
			.extend(headers.into_iter().map(|(k, v)| (k.into(), v.into())));
		self
	}

	pub fn retry_delays(mut self, min: Duration, max: Duration) -> Self {
		self.min_retry_delay = min;
		self.max_retry_delay = max;
		self
	}

	/// Callback for decoded change events.
	pub fn on_change<F>(mut self, callback: F) -> Self
	where
		F: Fn(&ChangeEvent) + Send + Sync + 'static,
	{
		self.on_change = Some(Arc::new(callback));
		self
	}

	/// Callback for status transitions.
	pub fn on_status<F>(mut self, callback: F) -> Self
	where
		F: Fn(ConnectionStatus) + Send + Sync + 'static,
	{
		self.on_status = Some(Arc::new(callback));
		self
	}

	pub fn key_rotation_hook<H: KeyRotationHook>(mut self, hook: H) -> Self {
		self.rotation_hook = Arc::new(hook);
		self
	}

	pub fn shared_key_rotation_hook(mut self, hook: SharedKeyRotationHook) -> Self {
		self.rotation_hook = hook;
		self
	}

	pub fn build(self) -> Result<StreamingClient> {
		let api_key = self
			.api_key
			.filter(|key| !key.is_empty())
			.ok_or(SyncError::MissingApiKey)?;
		let base_url = self
			.base_url
			.ok_or_else(|| SyncError::InvalidBaseUrl("base URL is required".to_string()))?;
		let url = format!("{}{}", normalize_base_url(&base_url)?, EVENTS_PATH);

		let headers = request_headers(&self.headers, &api_key)?;

		let http = flipswitch_common_http::streaming_builder()
			.build()
			.map_err(SyncError::ClientBuild)?;

		let (shutdown_tx, _) = watch::channel(false);

		let shared = Shared {
			url,
			headers,
			http,
			state: Mutex::new(ClientState {
				status: ConnectionStatus::Disconnected,
				backoff: Backoff::new(self.min_retry_delay, self.max_retry_delay),
				started: false,
				closed: false,
			}),
			on_change: self.on_change.unwrap_or_else(ignore_change),
			on_status: self.on_status.unwrap_or_else(ignore_status),
			rotation_hook: self.rotation_hook,
			reconnect_attempts: AtomicU64::new(0),
			frames_received: AtomicU64::new(0),
			shutdown_tx,
		};

		Ok(StreamingClient {
			shared: Arc::new(shared),
			task: Mutex::new(None),
		})
	}
}

fn ignore_change() -> ChangeListener {
	Arc::new(|_: &ChangeEvent| {})
}

fn ignore_status() -> StatusListener {
	Arc::new(|_: ConnectionStatus| {})
}

/// Pass-through headers first, then the client-set ones so they win.
fn request_headers(pass_through: &[(String, String)], api_key: &ApiKey) -> Result<HeaderMap> {
	let mut headers = HeaderMap::new();

	for (name, value) in pass_through {
		let invalid = || SyncError::InvalidHeader { name: name.clone() };
		let header_name = HeaderName::from_bytes(name.as_bytes()).map_err(|_| invalid())?;
		let header_value = HeaderValue::from_str(value).map_err(|_| invalid())?;
		headers.insert(header_name, header_value);
	}

	let mut key_value =
		HeaderValue::from_str(api_key.expose()).map_err(|_| SyncError::InvalidHeader {
			name: API_KEY_HEADER.to_string(),
		})?;
	key_value.set_sensitive(true);
	headers.insert(HeaderName::from_static("x-api-key"), key_value);
	headers.insert(ACCEPT, HeaderValue::from_static("text/event-stream"));
	headers.insert(CACHE_CONTROL, HeaderValue::from_static("no-cache"));

	Ok(headers)
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::rotation::KeyRotationNotice;

	#[derive(Default)]
	struct Recorder {
		changes: Mutex<Vec<ChangeEvent>>,
		statuses: Mutex<Vec<ConnectionStatus>>,
		rotations: Mutex<Vec<KeyRotationNotice>>,
	}

	struct RecordingHook(Arc<Recorder>);

	impl KeyRotationHook for RecordingHook {
		fn on_api_key_rotated(&self, notice: &KeyRotationNotice) {
			self.0.rotations.lock().unwrap().push(notice.clone());
		}
	}

	fn client(recorder: &Arc<Recorder>) -> StreamingClient {
		let changes = Arc::clone(recorder);
		let statuses = Arc::clone(recorder);
		StreamingClient::builder()
			.base_url("http://127.0.0.1:9")
			.api_key("test-key")
			.on_change(move |e| changes.changes.lock().unwrap().push(e.clone()))
			.on_status(move |s| statuses.statuses.lock().unwrap().push(s))
			.key_rotation_hook(RecordingHook(Arc::clone(recorder)))
			.build()
			.unwrap()
	}

	#[test]
	fn test_build_requires_api_key() {
		let result = StreamingClient::builder()
			.base_url("http://localhost")
			.build();
		assert!(matches!(result, Err(SyncError::MissingApiKey)));

		let result = StreamingClient::builder()
			.base_url("http://localhost")
			.api_key("   ")
			.build();
		assert!(matches!(result, Err(SyncError::MissingApiKey)));
	}

	#[test]
	fn test_build_rejects_invalid_header() {
		let result = StreamingClient::builder()
			.base_url("http://localhost")
			.api_key("k")
			.header("bad header", "v")
			.build();
		assert!(matches!(result, Err(SyncError::InvalidHeader { name }) if name == "bad header"));
	}

	#[test]
	fn test_url_joins_events_path() {
		let client = StreamingClient::builder()
			.base_url("https://flags.example.com/")
			.api_key("k")
			.build()
			.unwrap();
		assert_eq!(client.url(), "https://flags.example.com/api/v1/flags/events");
	}

	#[test]
	fn test_config_url_matches_builder_url() {
		let mut config = SyncConfig::new("k").unwrap();
		config.base_url = "http://localhost:8080/".to_string();
		let client = StreamingClient::builder().config(&config).build().unwrap();
		assert_eq!(client.url(), "http://localhost:8080/api/v1/flags/events");
	}

	#[test]
	fn test_client_headers_win_over_pass_through() {
		let pass_through = vec![
			("X-API-Key".to_string(), "spoofed".to_string()),
			("Accept".to_string(), "application/json".to_string()),
			("X-Flipswitch-SDK".to_string(), "rust/0.1.0".to_string()),
		];
		let headers = request_headers(&pass_through, &ApiKey::new("real")).unwrap();
		assert_eq!(headers.get("x-api-key").unwrap(), "real");
		assert!(headers.get("x-api-key").unwrap().is_sensitive());
		assert_eq!(headers.get(ACCEPT).unwrap(), "text/event-stream");
		assert_eq!(headers.get(CACHE_CONTROL).unwrap(), "no-cache");
		assert_eq!(headers.get("x-flipswitch-sdk").unwrap(), "rust/0.1.0");
	}

	#[test]
	fn test_config_adds_telemetry_headers() {
		let mut config = SyncConfig::new("k").unwrap();
		config
			.extra_headers
			.insert("X-Team".to_string(), "growth".to_string());
		let builder = StreamingClient::builder().config(&config);
		let names: Vec<&str> = builder.headers.iter().map(|(k, _)| k.as_str()).collect();
		assert!(names.contains(&"X-Flipswitch-SDK"));
		assert!(names.contains(&"X-Team"));

		config.telemetry = false;
		let builder = StreamingClient::builder().config(&config);
		assert_eq!(builder.headers.len(), 1);
	}

	#[test]
	fn test_flag_updated_frame_reaches_on_change() {
		let recorder = Arc::new(Recorder::default());
		let client = client(&recorder);

		client.shared.handle_frame(
			"flag-updated",
			r#"{"flagKey":"dark-mode","timestamp":"2024-01-01T00:00:00Z"}"#,
		);

		let changes = recorder.changes.lock().unwrap();
		assert_eq!(changes.len(), 1);
		assert_eq!(changes[0].flag_key, "dark-mode");
		assert_eq!(client.frames_received(), 1);
	}

	#[test]
	fn test_config_updated_frame_is_bulk() {
		let recorder = Arc::new(Recorder::default());
		let client = client(&recorder);

		client
			.shared
			.handle_frame("config-updated", r#"{"timestamp":"2024-01-01T00:00:00Z"}"#);

		let changes = recorder.changes.lock().unwrap();
		assert_eq!(changes.len(), 1);
		assert!(changes[0].is_bulk_invalidation());
	}

	#[test]
	fn test_flag_updated_without_key_is_bulk() {
		let recorder = Arc::new(Recorder::default());
		let client = client(&recorder);

		client
			.shared
			.handle_frame("flag-updated", r#"{"flagKey":"","timestamp":"t1"}"#);
		client
			.shared
			.handle_frame("flag-updated", r#"{"timestamp":"t2"}"#);

		let changes = recorder.changes.lock().unwrap();
		assert_eq!(changes.len(), 2);
		assert!(changes.iter().all(ChangeEvent::is_bulk_invalidation));
		assert_eq!(changes[1].timestamp, "t2");
	}

	#[test]
	fn test_rotation_frame_goes_to_hook_only() {
		let recorder = Arc::new(Recorder::default());
		let client = client(&recorder);

		client.shared.handle_frame(
			"api-key-rotated",
			r#"{"validUntil":"2024-02-01T00:00:00Z","timestamp":"2024-01-01T00:00:00Z"}"#,
		);

		assert!(recorder.changes.lock().unwrap().is_empty());
		let rotations = recorder.rotations.lock().unwrap();
		assert_eq!(rotations.len(), 1);
		assert_eq!(rotations[0].valid_until, "2024-02-01T00:00:00Z");
	}

	#[test]
	fn test_heartbeat_unknown_and_malformed_frames_are_dropped() {
		let recorder = Arc::new(Recorder::default());
		let client = client(&recorder);

		client.shared.handle_frame("heartbeat", "{}");
		client.shared.handle_frame("flag-deleted", r#"{"flagKey":"x"}"#);
		client.shared.handle_frame("flag-updated", "not json");
		client.shared.handle_frame("flag-updated", "");

		assert!(recorder.changes.lock().unwrap().is_empty());
		assert_eq!(client.frames_received(), 4);
	}

	#[test]
	fn test_panicking_callbacks_do_not_escape() {
		let client = StreamingClient::builder()
			.base_url("http://127.0.0.1:9")
			.api_key("test-key")
			.on_change(|_| panic!("change listener exploded"))
			.on_status(|_| panic!("status listener exploded"))
			.build()
			.unwrap();

		client.shared.handle_frame(
			"flag-updated",
			r#"{"flagKey":"dark-mode","timestamp":"2024-01-01T00:00:00Z"}"#,
		);
		assert!(client.shared.transition(ConnectionStatus::Connected));
		assert_eq!(client.status(), ConnectionStatus::Connected);

		client.close();
		assert_eq!(client.status(), ConnectionStatus::Disconnected);
	}

	#[test]
	fn test_close_before_connect_reports_disconnected_once() {
		let recorder = Arc::new(Recorder::default());
		let client = client(&recorder);

		client.close();
		client.close();
		client.connect();

		assert!(client.is_closed());
		assert_eq!(client.status(), ConnectionStatus::Disconnected);
		assert_eq!(
			*recorder.statuses.lock().unwrap(),
			vec![ConnectionStatus::Disconnected]
		);
	}

	#[test]
	fn test_connect_without_runtime_stays_disconnected() {
		let recorder = Arc::new(Recorder::default());
		let client = client(&recorder);

		client.connect();

		assert_eq!(client.status(), ConnectionStatus::Disconnected);
		assert!(recorder.statuses.lock().unwrap().is_empty());
	}

	#[test]
	fn test_transition_refused_after_close() {
		let recorder = Arc::new(Recorder::default());
		let client = client(&recorder);

		assert!(client.shared.transition(ConnectionStatus::Connecting));
		client.close();
		assert!(!client.shared.transition(ConnectionStatus::Connecting));
		assert_eq!(client.status(), ConnectionStatus::Disconnected);
	}

	#[test]
	fn test_connected_resets_retry_delay() {
		let recorder = Arc::new(Recorder::default());
		let client = client(&recorder);

		client.shared.lock().backoff.advance();
		client.shared.lock().backoff.advance();
		assert_eq!(client.retry_delay(), Duration::from_secs(4));

		client.shared.transition(ConnectionStatus::Connected);
		assert_eq!(client.retry_delay(), Duration::from_secs(1));
	}

	#[derive(Clone, Default)]
	struct CapturedLogs(Arc<Mutex<Vec<u8>>>);

	impl std::io::Write for CapturedLogs {
		fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
			self.0.lock().unwrap().extend_from_slice(buf);
			Ok(buf.len())
		}

		fn flush(&mut self) -> std::io::Result<()> {
			Ok(())
		}
	}

	#[test]
	fn test_logs_never_contain_api_key() {
		let logs = CapturedLogs::default();
		let writer = logs.clone();
		let subscriber = tracing_subscriber::fmt()
			.with_writer(move || writer.clone())
			.with_ansi(false)
			.with_max_level(tracing::Level::DEBUG)
			.finish();

		tracing::subscriber::with_default(subscriber, || {
			let config = SyncConfig::new("fs_live_super_secret").unwrap();
			let client = StreamingClient::builder().config(&config).build().unwrap();
			debug!(config = ?config, client = ?client, "Built client");
			client.shared.handle_frame("flag-updated", "{broken");
			client.shared.handle_frame(
				"api-key-rotated",
				r#"{"validUntil":"2024-02-01T00:00:00Z","timestamp":""}"#,
			);
			client.close();
		});

		let output = String::from_utf8(logs.0.lock().unwrap().clone()).unwrap();
		assert!(output.contains("Failed to parse SSE event"));
		assert!(output.contains("2024-02-01T00:00:00Z"));
		assert!(output.contains("[REDACTED]"));
		assert!(!output.contains("fs_live_super_secret"));
	}

	#[tokio::test(start_paused = true)]
	async fn test_close_cancels_backoff_without_doubling() {
		let recorder = Arc::new(Recorder::default());
		let client = client(&recorder);

		client.connect();
		client.connect();

		// 127.0.0.1:9 refuses connections, so the task lands in backoff.
		for _ in 0..50 {
			if client.reconnect_attempts() > 0 {
				break;
			}
			tokio::task::yield_now().await;
			tokio::time::advance(Duration::from_millis(1)).await;
		}

		client.close();
		let handle = lock_task(&client.task).take();
		if let Some(handle) = handle {
			handle.await.unwrap();
		}

		let statuses = recorder.statuses.lock().unwrap().clone();
		assert_eq!(statuses.first(), Some(&ConnectionStatus::Connecting));
		assert_eq!(statuses.last(), Some(&ConnectionStatus::Disconnected));
		assert!(client.reconnect_attempts() <= 1);
		assert_eq!(client.retry_delay(), Duration::from_secs(1));
	}
}
