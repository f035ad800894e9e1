//! Connection lifecycle manager
//!
//! Owns the state machine (CLOSED -> CONNECTING -> INITIALIZING -> CONNECTED
//! -> DISCONNECTED -> RECONNECTING -> CLOSED), the single link slot, the
//! connect timeout and the auto-reconnect policy.
//!
//! There is no true cancellation for an in-flight attempt. Every teardown
//! bumps a generation counter; every asynchronous continuation re-checks the
//! generation (and state, for the timeout) under the lock before touching
//! shared state, and discards its effect when stale. The timeout task is
//! aborted synchronously on every path that leaves the connecting phase.

use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use tokio::task::AbortHandle;

use crate::error::{AttemptError, Error, LinkError};
use crate::handler::{DeviceEvent, DeviceHandler, EventDispatcher};
use crate::link::{uuid, Link, LinkFilter, LinkProvider};
use crate::services::{Callbacks, ServiceSet};
use bitlink_proto::{codec, gatt, ButtonState, MicrobitVersion};

/// Default deadline for one connect or reconnect attempt.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Connection state. Exactly one holds at any instant; CONNECTED is reachable
/// only through INITIALIZING, and CLOSED is the initial and at-rest state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Closed,
    Connecting,
    Initializing,
    Connected,
    Disconnected,
    Reconnecting,
}

/// Last-known facts about the peripheral. Sticky: values survive disconnects
/// and are only overwritten by the next successful initialization.
#[derive(Debug, Clone, Default)]
pub struct PeripheralIdentity {
    pub version: Option<MicrobitVersion>,
    pub name: Option<String>,
}

/// Tunables for one device connection.
#[derive(Debug, Clone)]
pub struct DeviceConfig {
    /// Five-letter micro:bit name to narrow the scan filter, if known.
    pub name: Option<String>,
    /// Deadline for one connect or reconnect attempt.
    pub connect_timeout: Duration,
    /// Whether to schedule one automatic reconnect per unexpected disconnect.
    pub auto_reconnect: bool,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            name: None,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            auto_reconnect: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Attempt {
    Initial,
    Reconnect,
}

struct Shared {
    state: ConnectionState,
    generation: u64,
    auto_reconnect: bool,
    link: Option<Arc<dyn Link>>,
    services: Option<Arc<ServiceSet>>,
    identity: PeripheralIdentity,
    last_link_id: Option<String>,
    timeout: Option<AbortHandle>,
    watch: Option<AbortHandle>,
}

struct Inner {
    provider: Arc<dyn LinkProvider>,
    config: DeviceConfig,
    callbacks: Arc<Callbacks>,
    events: EventDispatcher,
    shared: Mutex<Shared>,
}

/// The connection lifecycle manager for one peripheral.
#[derive(Clone)]
pub struct BleDevice {
    inner: Arc<Inner>,
}

impl BleDevice {
    pub fn new(provider: Arc<dyn LinkProvider>, config: DeviceConfig) -> Self {
        let auto_reconnect = config.auto_reconnect;
        Self {
            inner: Arc::new(Inner {
                provider,
                config,
                callbacks: Arc::new(Callbacks::default()),
                events: EventDispatcher::new(),
                shared: Mutex::new(Shared {
                    state: ConnectionState::Closed,
                    generation: 0,
                    auto_reconnect,
                    link: None,
                    services: None,
                    identity: PeripheralIdentity::default(),
                    last_link_id: None,
                    timeout: None,
                    watch: None,
                }),
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Shared> {
        self.inner.shared.lock().expect("device state poisoned")
    }

    pub fn state(&self) -> ConnectionState {
        self.lock().state
    }

    pub fn identity(&self) -> PeripheralIdentity {
        self.lock().identity.clone()
    }

    pub fn set_auto_reconnect(&self, enabled: bool) {
        self.lock().auto_reconnect = enabled;
    }

    pub fn is_auto_reconnect_enabled(&self) -> bool {
        self.lock().auto_reconnect
    }

    pub fn set_handler(&self, handler: Arc<dyn DeviceHandler>) {
        self.inner.events.set_handler(handler);
    }

    // Capability callbacks. One per capability; registering replaces the
    // previous one and survives reconnects.

    pub fn on_accelerometer(&self, callback: impl Fn(i16, i16, i16) + Send + Sync + 'static) {
        self.inner.callbacks.set_accelerometer(Arc::new(callback));
    }

    pub fn on_button_a(&self, callback: impl Fn(ButtonState) + Send + Sync + 'static) {
        self.inner.callbacks.set_button_a(Arc::new(callback));
    }

    pub fn on_button_b(&self, callback: impl Fn(ButtonState) + Send + Sync + 'static) {
        self.inner.callbacks.set_button_b(Arc::new(callback));
    }

    pub fn on_text(&self, callback: impl Fn(&str) + Send + Sync + 'static) {
        self.inner.callbacks.set_text(Arc::new(callback));
    }

    /// Start a connection attempt. A no-op unless the device is at rest
    /// (CLOSED or DISCONNECTED). The outcome is reported through
    /// [`DeviceEvent`]s; this method resolves when the attempt settles.
    pub async fn connect(&self) {
        let generation = {
            let mut shared = self.lock();
            match shared.state {
                ConnectionState::Closed | ConnectionState::Disconnected => {}
                state => {
                    tracing::debug!(?state, "connect ignored in current state");
                    return;
                }
            }
            self.begin_attempt(&mut shared, Attempt::Initial)
        };
        self.run_attempt(generation, Attempt::Initial).await;
    }

    /// Tear down from any state: clear auto-reconnect first, then release the
    /// link and land in CLOSED.
    pub async fn close(&self) {
        let link = {
            let mut shared = self.lock();
            shared.auto_reconnect = false;
            if shared.state == ConnectionState::Closed {
                return;
            }
            let link = self.teardown(&mut shared);
            self.inner.events.emit(DeviceEvent::Closed);
            link
        };
        self.release(link);
    }

    /// Send a UART text message to the peripheral.
    pub async fn send_text(&self, message: &str) -> Result<(), Error> {
        self.write_handle()?.send_text(message).await
    }

    /// Display a 5x5 boolean matrix on the LED grid.
    pub async fn set_led_matrix(&self, matrix: &[Vec<bool>]) -> Result<(), Error> {
        self.write_handle()?.set_led_matrix(matrix).await
    }

    fn write_handle(&self) -> Result<Arc<ServiceSet>, Error> {
        let shared = self.lock();
        match shared.state {
            ConnectionState::Connected => shared.services.clone().ok_or(Error::NotReady),
            // Mid-attempt the write handles are not resolved yet.
            ConnectionState::Connecting
            | ConnectionState::Initializing
            | ConnectionState::Reconnecting => Err(Error::NotReady),
            ConnectionState::Closed | ConnectionState::Disconnected => Err(Error::NotInitialized),
        }
    }

    /// Enter CONNECTING or RECONNECTING under the lock: bump the generation,
    /// emit the transition and arm the timeout.
    fn begin_attempt(&self, shared: &mut Shared, kind: Attempt) -> u64 {
        shared.generation += 1;
        let generation = shared.generation;
        match kind {
            Attempt::Initial => {
                shared.state = ConnectionState::Connecting;
                self.inner.events.emit(DeviceEvent::Connecting);
            }
            Attempt::Reconnect => {
                shared.state = ConnectionState::Reconnecting;
                self.inner.events.emit(DeviceEvent::Reconnecting);
            }
        }
        self.arm_timeout(shared, generation, kind);
        generation
    }

    fn arm_timeout(&self, shared: &mut Shared, generation: u64, kind: Attempt) {
        if let Some(stale) = shared.timeout.take() {
            stale.abort();
        }
        let device = self.clone();
        let deadline = self.inner.config.connect_timeout;
        let handle = tokio::spawn(async move {
            tokio::time::sleep(deadline).await;
            device.abort_attempt(generation, kind);
        })
        .abort_handle();
        shared.timeout = Some(handle);
    }

    /// Timeout callback. The attempt itself cannot be cancelled, so this
    /// re-checks generation and state before forcing CLOSED; a transition
    /// that already left the connecting phase wins.
    fn abort_attempt(&self, generation: u64, kind: Attempt) {
        let link = {
            let mut shared = self.lock();
            if shared.generation != generation {
                return;
            }
            match shared.state {
                ConnectionState::Connecting
                | ConnectionState::Initializing
                | ConnectionState::Reconnecting => {}
                _ => return,
            }
            tracing::warn!(?kind, deadline = ?self.inner.config.connect_timeout, "connection attempt timed out");
            let link = self.teardown(&mut shared);
            let error = Error::ConnectTimeout(self.inner.config.connect_timeout);
            self.inner.events.emit(match kind {
                Attempt::Initial => DeviceEvent::ConnectError(error),
                Attempt::Reconnect => DeviceEvent::ReconnectError(error),
            });
            self.inner.events.emit(DeviceEvent::Closed);
            link
        };
        self.release(link);
    }

    async fn run_attempt(&self, generation: u64, kind: Attempt) {
        if let Err(error) = self.try_establish(generation, kind).await {
            self.fail_attempt(generation, kind, error);
        }
    }

    /// One connection attempt: link, then services, then identity, strictly
    /// in sequence. Each continuation re-checks the generation before
    /// applying its effect.
    ///
    /// Returns an explicitly `Send` boxed future: the disconnect watcher it
    /// spawns re-enters this function on reconnect, and the resulting cycle
    /// defeats auto-trait inference for an opaque `async fn` future.
    fn try_establish(
        &self,
        generation: u64,
        kind: Attempt,
    ) -> Pin<Box<dyn Future<Output = Result<(), AttemptError>> + Send + '_>> {
        Box::pin(self.try_establish_inner(generation, kind))
    }

    async fn try_establish_inner(&self, generation: u64, kind: Attempt) -> Result<(), AttemptError> {
        let filter = {
            let shared = self.lock();
            LinkFilter {
                name: self.inner.config.name.clone(),
                known_id: match kind {
                    Attempt::Reconnect => shared.last_link_id.clone(),
                    Attempt::Initial => None,
                },
            }
        };

        let link = self.inner.provider.open(&filter).await?;

        {
            let mut shared = self.lock();
            if shared.generation != generation {
                self.release(Some(link));
                return Ok(());
            }
            shared.link = Some(link.clone());
            shared.state = ConnectionState::Initializing;
            self.inner.events.emit(DeviceEvent::Initializing);
        }

        let services = ServiceSet::initialize(link.clone(), self.inner.callbacks.clone()).await?;

        let payload = link
            .read(uuid(gatt::DEVICE_INFO_SERVICE), uuid(gatt::MODEL_NUMBER))
            .await?;
        let model = codec::decode_model_number(&payload)?;
        let version = codec::version_for_model(model);

        let mut shared = self.lock();
        if shared.generation != generation {
            drop(services);
            self.release(Some(link));
            return Ok(());
        }

        // Cancel the timeout before any other side effect.
        if let Some(timeout) = shared.timeout.take() {
            timeout.abort();
        }

        shared.services = Some(Arc::new(services));
        shared.identity.version = Some(version);
        if let Some(name) = link.name() {
            shared.identity.name = Some(name);
        }
        shared.last_link_id = Some(link.id());
        shared.state = ConnectionState::Connected;

        let device = self.clone();
        let watched = link.clone();
        let watch = tokio::spawn(async move {
            watched.closed().await;
            device.handle_unexpected_disconnect(generation).await;
        })
        .abort_handle();
        if let Some(stale) = shared.watch.replace(watch) {
            stale.abort();
        }

        tracing::info!(?version, model, "connected");
        self.inner.events.emit(DeviceEvent::Connected(version));
        Ok(())
    }

    /// Classify and report a failed attempt, then force CLOSED. Stale
    /// failures (a newer generation took over) are logged and discarded.
    fn fail_attempt(&self, generation: u64, kind: Attempt, error: AttemptError) {
        let link = {
            let mut shared = self.lock();
            if shared.generation != generation {
                tracing::debug!(%error, "stale connection attempt failed; ignoring");
                return;
            }
            match shared.state {
                ConnectionState::Connecting
                | ConnectionState::Initializing
                | ConnectionState::Reconnecting => {}
                state => {
                    tracing::debug!(%error, ?state, "attempt failed outside connecting phase; ignoring");
                    return;
                }
            }
            tracing::warn!(%error, ?kind, "connection attempt failed");
            let link = self.teardown(&mut shared);
            self.inner.events.emit(classify(kind, error));
            self.inner.events.emit(DeviceEvent::Closed);
            link
        };
        self.release(link);
    }

    /// Unexpected link drop while CONNECTED: one automatic reconnect attempt
    /// if the policy allows, otherwise CLOSED. Stale watchers are ignored.
    async fn handle_unexpected_disconnect(&self, generation: u64) {
        let next = {
            let mut shared = self.lock();
            if shared.generation != generation || shared.state != ConnectionState::Connected {
                return;
            }
            tracing::info!("link dropped unexpectedly");
            shared.watch = None;
            shared.services = None;
            shared.link = None;
            shared.state = ConnectionState::Disconnected;
            self.inner.events.emit(DeviceEvent::Disconnected);

            if shared.auto_reconnect {
                Some(self.begin_attempt(&mut shared, Attempt::Reconnect))
            } else {
                shared.generation += 1;
                shared.state = ConnectionState::Closed;
                self.inner.events.emit(DeviceEvent::Closed);
                None
            }
        };

        if let Some(new_generation) = next {
            self.run_attempt(new_generation, Attempt::Reconnect).await;
        }
    }

    /// Release everything under the lock and land in CLOSED. Bumping the
    /// generation invalidates every in-flight continuation of the old
    /// attempt. Returns the link for out-of-lock release.
    fn teardown(&self, shared: &mut Shared) -> Option<Arc<dyn Link>> {
        shared.generation += 1;
        if let Some(timeout) = shared.timeout.take() {
            timeout.abort();
        }
        if let Some(watch) = shared.watch.take() {
            watch.abort();
        }
        shared.services = None;
        shared.state = ConnectionState::Closed;
        shared.link.take()
    }

    /// Best-effort link disconnect off the current task.
    fn release(&self, link: Option<Arc<dyn Link>>) {
        if let Some(link) = link {
            tokio::spawn(async move {
                if let Err(error) = link.disconnect().await {
                    tracing::debug!(%error, "error while releasing link");
                }
            });
        }
    }
}

fn classify(kind: Attempt, error: AttemptError) -> DeviceEvent {
    let error = match error {
        AttemptError::Link(LinkError::PlatformUnsupported) => {
            Error::LinkUnavailable(LinkError::PlatformUnsupported)
        }
        other => match kind {
            Attempt::Initial => Error::ConnectFailed(other),
            Attempt::Reconnect => Error::ReconnectFailed(other),
        },
    };
    match kind {
        Attempt::Initial => DeviceEvent::ConnectError(error),
        Attempt::Reconnect => DeviceEvent::ReconnectError(error),
    }
}
