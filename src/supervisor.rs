//! Connection lifecycle and health supervision.
//!
//! [`ConnectionHealthSupervisor`] drives a connection from
//! [`ConnectionState::Disconnected`] through application and account
//! authentication to [`ConnectionState::Ready`], then runs one supervision
//! task that sends heartbeats, tracks the server's heartbeats and restarts
//! the connection when the server goes silent or announces a disconnect.
//! After a restart every registered live bar subscription is replayed.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use parking_lot::{Mutex, RwLock};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::Result;
use crate::auth::{authenticate_app, authenticate_user};
use crate::config::CTraderConfig;
use crate::coordinator::SubscriptionCoordinator;
use crate::credentials::Credentials;
use crate::models::{EventKind, PushEvent};
use crate::upstream::{Connection, ListenerToken};

/// Interval between client heartbeats.
pub const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(5);

/// Server silence after which the connection is considered dead.
pub const MAX_SERVER_SILENCE: Duration = Duration::from_secs(5 * 60);

/// Pause between tearing a connection down and opening it again.
pub const RECONNECT_COOLDOWN: Duration = Duration::from_secs(1);

/// Lifecycle state of a supervised connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    AppAuthenticating,
    UserAuthenticating,
    Ready,
}

impl ConnectionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConnectionState::Disconnected => "disconnected",
            ConnectionState::Connecting => "connecting",
            ConnectionState::AppAuthenticating => "app_authenticating",
            ConnectionState::UserAuthenticating => "user_authenticating",
            ConnectionState::Ready => "ready",
        }
    }
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Timing and behavior of the supervisor.
#[derive(Debug, Clone)]
pub struct SupervisorConfig {
    pub heartbeat_interval: Duration,
    pub max_server_silence: Duration,
    pub reconnect_cooldown: Duration,
    /// Restart on server silence or disconnect events.
    pub auto_reconnect: bool,
    /// Log every heartbeat sent.
    pub debug: bool,
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            heartbeat_interval: HEARTBEAT_INTERVAL,
            max_server_silence: MAX_SERVER_SILENCE,
            reconnect_cooldown: RECONNECT_COOLDOWN,
            auto_reconnect: true,
            debug: false,
        }
    }
}

impl From<&CTraderConfig> for SupervisorConfig {
    fn from(config: &CTraderConfig) -> Self {
        Self {
            auto_reconnect: config.auto_reconnect,
            debug: config.debug,
            ..Self::default()
        }
    }
}

/// Listeners and the spot router belonging to one opened connection.
struct Session {
    listeners: Vec<ListenerToken>,
    router: JoinHandle<()>,
}

struct SupervisionTask {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

/// Owns the lifecycle of one connection.
pub struct ConnectionHealthSupervisor<C: ?Sized> {
    connection: Arc<C>,
    credentials: Arc<Credentials>,
    coordinator: Arc<SubscriptionCoordinator<C>>,
    config: SupervisorConfig,
    state: RwLock<ConnectionState>,
    session: Mutex<Option<Session>>,
    task: Mutex<Option<SupervisionTask>>,
    /// Serializes `connect` and `disconnect`.
    lifecycle: tokio::sync::Mutex<()>,
    last_server_heartbeat: Mutex<Option<Instant>>,
    reconnect_count: AtomicU64,
    /// Set while a restart has not yet succeeded.
    recovering: AtomicBool,
}

impl<C> ConnectionHealthSupervisor<C>
where
    C: Connection + ?Sized + 'static,
{
    pub fn new(
        connection: Arc<C>,
        credentials: Arc<Credentials>,
        coordinator: Arc<SubscriptionCoordinator<C>>,
        config: SupervisorConfig,
    ) -> Self {
        Self {
            connection,
            credentials,
            coordinator,
            config,
            state: RwLock::new(ConnectionState::Disconnected),
            session: Mutex::new(None),
            task: Mutex::new(None),
            lifecycle: tokio::sync::Mutex::new(()),
            last_server_heartbeat: Mutex::new(None),
            reconnect_count: AtomicU64::new(0),
            recovering: AtomicBool::new(false),
        }
    }

    pub fn state(&self) -> ConnectionState {
        *self.state.read()
    }

    /// Number of completed automatic restarts.
    pub fn reconnect_count(&self) -> u64 {
        self.reconnect_count.load(Ordering::Relaxed)
    }

    /// Time of the last heartbeat received from the server on the current
    /// session.
    pub fn last_server_heartbeat(&self) -> Option<Instant> {
        *self.last_server_heartbeat.lock()
    }

    /// Opens and authenticates the connection, then starts supervision.
    ///
    /// Does nothing if the connection is already up.
    ///
    /// # Errors
    ///
    /// Returns [`FeedError::Connection`](crate::FeedError::Connection),
    /// [`FeedError::ApplicationAuthentication`](crate::FeedError::ApplicationAuthentication)
    /// or [`FeedError::UserAuthentication`](crate::FeedError::UserAuthentication);
    /// the supervisor is back in [`ConnectionState::Disconnected`] then.
    pub async fn connect(self: &Arc<Self>) -> Result<()> {
        let _guard = self.lifecycle.lock().await;
        if self.state() != ConnectionState::Disconnected {
            debug!(state = %self.state(), "Connect requested while not disconnected");
            return Ok(());
        }

        self.stop_supervision().await;
        if self.state() != ConnectionState::Disconnected {
            // A cancelled restart may have left a half-built session.
            self.teardown().await;
        }
        self.recovering.store(false, Ordering::Relaxed);
        let events = self.establish().await?;

        // Subscribers left over from an abandoned restart.
        if !self.coordinator.registry().is_empty() {
            let restored = self.coordinator.resubscribe_all().await;
            info!(restored, "Replayed live bar subscriptions");
        }

        let cancel = CancellationToken::new();
        let handle = tokio::spawn(self.clone().supervise(cancel.clone(), events));
        *self.task.lock() = Some(SupervisionTask { cancel, handle });

        info!(
            account_id = self.credentials.ctid_trader_account_id,
            "Connection ready"
        );
        Ok(())
    }

    /// Stops supervision, closes the connection and completes every live
    /// bar stream.
    pub async fn disconnect(&self) {
        let _guard = self.lifecycle.lock().await;
        self.stop_supervision().await;
        self.recovering.store(false, Ordering::Relaxed);
        self.teardown().await;

        let completed = self.coordinator.registry().clear();
        info!(completed, "Disconnected");
    }

    async fn stop_supervision(&self) {
        let task = self.task.lock().take();
        if let Some(task) = task {
            task.cancel.cancel();
            if let Err(e) = task.handle.await {
                warn!(error = %e, "Supervision task ended abnormally");
            }
        }
    }

    fn set_state(&self, state: ConnectionState) {
        let previous = std::mem::replace(&mut *self.state.write(), state);
        if previous != state {
            debug!(from = %previous, to = %state, "Connection state changed");
        }
    }

    /// Opens the connection, installs a fresh session and authenticates.
    ///
    /// Returns the receiver of the session's heartbeat and disconnect events.
    async fn establish(&self) -> Result<mpsc::UnboundedReceiver<PushEvent>> {
        self.set_state(ConnectionState::Connecting);
        info!("Opening connection");
        if let Err(e) = self.connection.open().await {
            error!(error = %e, "Failed to open connection");
            self.teardown().await;
            return Err(crate::FeedError::Connection(e.to_string()));
        }

        let (spot_tx, spot_rx) = mpsc::unbounded_channel();
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let listeners = vec![
            self.connection.on(EventKind::Spot, spot_tx),
            self.connection.on(EventKind::Heartbeat, event_tx.clone()),
            self.connection.on(EventKind::ClientDisconnect, event_tx.clone()),
            self.connection.on(EventKind::AccountDisconnect, event_tx),
        ];
        let router = tokio::spawn(self.coordinator.clone().run_router(spot_rx));
        *self.session.lock() = Some(Session { listeners, router });

        self.set_state(ConnectionState::AppAuthenticating);
        if let Err(e) = authenticate_app(&*self.connection, &self.credentials).await {
            self.teardown().await;
            return Err(e);
        }

        self.set_state(ConnectionState::UserAuthenticating);
        if let Err(e) = authenticate_user(&*self.connection, &self.credentials).await {
            self.teardown().await;
            return Err(e);
        }

        self.set_state(ConnectionState::Ready);
        Ok(event_rx)
    }

    /// Drops the current session and closes the connection.
    async fn teardown(&self) {
        let session = self.session.lock().take();
        if let Some(session) = session {
            for token in session.listeners {
                self.connection.remove_event_listener(token);
            }
            session.router.abort();
        }
        *self.last_server_heartbeat.lock() = None;

        self.connection.close().await;
        self.coordinator.forget_upstream().await;
        self.set_state(ConnectionState::Disconnected);
    }

    async fn supervise(
        self: Arc<Self>,
        cancel: CancellationToken,
        events: mpsc::UnboundedReceiver<PushEvent>,
    ) {
        let mut events = Some(events);
        let mut ticker = tokio::time::interval(self.config.heartbeat_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                () = cancel.cancelled() => break,

                _ = ticker.tick() => {
                    if let Some(rx) = self.on_heartbeat_tick(&cancel).await {
                        events = Some(rx);
                    }
                }

                event = next_event(&mut events) => {
                    let restarted = match event {
                        Some(event) => self.on_event(event, &cancel).await,
                        None => {
                            // The session's listeners were removed.
                            events = None;
                            None
                        }
                    };
                    if let Some(rx) = restarted {
                        events = Some(rx);
                    }
                }
            }
        }
        debug!("Supervision stopped");
    }

    async fn on_heartbeat_tick(
        &self,
        cancel: &CancellationToken,
    ) -> Option<mpsc::UnboundedReceiver<PushEvent>> {
        if self.recovering.load(Ordering::Relaxed) {
            return self.restart("previous reconnect attempt failed", cancel).await;
        }
        if self.state() != ConnectionState::Ready {
            return None;
        }

        let silence = self.last_server_heartbeat().map(|last| last.elapsed());
        if let Some(silence) = silence
            && silence >= self.config.max_server_silence
        {
            if self.config.auto_reconnect {
                return self.restart("server silent for too long", cancel).await;
            }
            warn!(
                silence_secs = silence.as_secs(),
                "Detected abnormal server inactivity, but auto reconnect is disabled"
            );
        }

        match self.connection.send_heartbeat().await {
            Ok(()) if self.config.debug => debug!("Heartbeat sent"),
            Ok(()) => {}
            Err(e) => warn!(error = %e, "Failed to send heartbeat"),
        }
        None
    }

    async fn on_event(
        &self,
        event: PushEvent,
        cancel: &CancellationToken,
    ) -> Option<mpsc::UnboundedReceiver<PushEvent>> {
        let reason = match event {
            PushEvent::Heartbeat => {
                *self.last_server_heartbeat.lock() = Some(Instant::now());
                if self.config.debug {
                    debug!("Server heartbeat received");
                }
                return None;
            }
            PushEvent::ClientDisconnect(event) => format!(
                "client disconnected by server: {}",
                event.reason.as_deref().unwrap_or("no reason given")
            ),
            PushEvent::AccountDisconnect(event) => format!(
                "account {} disconnected by server",
                event.ctid_trader_account_id
            ),
            PushEvent::Spot(_) => return None,
        };

        if self.config.auto_reconnect {
            return self.restart(&reason, cancel).await;
        }

        warn!(%reason, "Connection lost and auto reconnect is disabled");
        self.teardown().await;
        let completed = self.coordinator.registry().clear();
        info!(completed, "Live bar streams ended with the connection");
        None
    }

    /// Tears the connection down and brings it back up.
    ///
    /// On failure the supervisor stays disconnected and the next heartbeat
    /// tick tries again.
    async fn restart(
        &self,
        reason: &str,
        cancel: &CancellationToken,
    ) -> Option<mpsc::UnboundedReceiver<PushEvent>> {
        warn!(%reason, "Issuing automatic restart");
        self.recovering.store(true, Ordering::Relaxed);
        self.teardown().await;

        let attempt = async {
            tokio::time::sleep(self.config.reconnect_cooldown).await;
            self.establish().await
        };
        let result = tokio::select! {
            () = cancel.cancelled() => return None,
            result = attempt => result,
        };

        match result {
            Ok(events) => {
                self.recovering.store(false, Ordering::Relaxed);
                let restored = self.coordinator.resubscribe_all().await;
                let count = self.reconnect_count.fetch_add(1, Ordering::Relaxed) + 1;
                info!(reconnects = count, restored, "Connection restarted");
                Some(events)
            }
            Err(e) => {
                error!(error = %e, "Restart failed, retrying on next heartbeat");
                None
            }
        }
    }
}

async fn next_event(events: &mut Option<mpsc::UnboundedReceiver<PushEvent>>) -> Option<PushEvent> {
    match events {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}
