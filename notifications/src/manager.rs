use crate::error::Error;
use crate::message::Notification;
use crate::state::{DeliveryState, Mode, Snapshot};
use crate::transport::{NotificationApi, NotificationStream, TaskHandle};
use futures_util::stream::StreamExt;
use log::*;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::{self, error::Elapsed, Instant, MissedTickBehavior};

/// Tuning for a delivery session.
#[derive(Debug, Clone, PartialEq)]
pub struct DeliveryConfig {
    /// Period between unread-count fetches while polling.
    pub poll_interval: Duration,
    /// Upper bound on any single fetch issued by the manager.
    pub request_timeout: Duration,
    /// When false, opening the panel only clears the badge locally.
    pub eager_fetch_on_open: bool,
    /// Page size used by the eager panel fetch.
    pub page_size: u32,
}

impl Default for DeliveryConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(15),
            request_timeout: Duration::from_secs(5),
            eager_fetch_on_open: false,
            page_size: 5,
        }
    }
}

/// The live channel. Holds at most one task handle, dropping it releases it.
/// The handles are never read, only owned.
enum Transport {
    Idle,
    Streaming(#[allow(dead_code)] TaskHandle),
    Polling(#[allow(dead_code)] TaskHandle),
    Disabled,
}

impl Transport {
    fn mode(&self) -> Mode {
        match self {
            Transport::Idle => Mode::Idle,
            Transport::Streaming(_) => Mode::Streaming,
            Transport::Polling(_) => Mode::Polling,
            Transport::Disabled => Mode::Disabled,
        }
    }
}

struct Session {
    transport: Transport,
    state: DeliveryState,
    /// Bumped on every activation, deactivation and disable. Work started
    /// under an older generation must not touch the state.
    generation: u64,
    /// Set once a pushed event lands in the current activation. A later
    /// activation count is older than that event and is not applied.
    pushed: bool,
}

impl Session {
    fn snapshot(&self) -> Snapshot {
        self.state.snapshot(self.transport.mode())
    }
}

struct Inner {
    api: Arc<dyn NotificationApi>,
    config: DeliveryConfig,
    session: Mutex<Session>,
    updates: watch::Sender<Snapshot>,
}

/// Delivers unread counts and recent notifications for one signed-in session.
///
/// Prefers the server-push stream, falls back to polling when the stream
/// fails, and stops for good when the server reports the feature unavailable.
/// No operation returns an error: failures are logged and show up only as
/// state. Dropping the manager releases whatever transport is live.
///
/// Must be used from within a tokio runtime.
pub struct Manager {
    inner: Arc<Inner>,
}

impl Manager {
    pub fn new(api: Arc<dyn NotificationApi>, config: DeliveryConfig) -> Self {
        let (updates, _) = watch::channel(Snapshot::default());
        Self {
            inner: Arc::new(Inner {
                api,
                config,
                session: Mutex::new(Session {
                    transport: Transport::Idle,
                    state: DeliveryState::new(),
                    generation: 0,
                    pushed: false,
                }),
                updates,
            }),
        }
    }

    pub fn mode(&self) -> Mode {
        self.inner.session().transport.mode()
    }

    pub fn unread_count(&self) -> u64 {
        self.inner.session().state.unread_count()
    }

    pub fn recent_items(&self) -> Vec<Notification> {
        self.inner.session().state.recent_items().to_vec()
    }

    pub fn snapshot(&self) -> Snapshot {
        self.inner.session().snapshot()
    }

    /// Receives a fresh snapshot after every state change.
    pub fn subscribe(&self) -> watch::Receiver<Snapshot> {
        self.inner.updates.subscribe()
    }

    /// Starts delivery for `user_id`: stream first, polling if the stream cannot
    /// be set up. Also fetches the unread count once right away.
    ///
    /// No-op without a user id, or unless the manager is `Idle`.
    pub fn activate(&self, user_id: Option<&str>) {
        let Some(user_id) = user_id.map(str::trim).filter(|id| !id.is_empty()) else {
            debug!("Ignoring notification activation without a user id");
            return;
        };

        let mut session = self.inner.session();
        let mode = session.transport.mode();
        if mode != Mode::Idle {
            debug!("Ignoring notification activation while {mode:?}");
            return;
        }

        session.generation += 1;
        session.pushed = false;
        let generation = session.generation;
        session.state.set_user_id(user_id.to_string());

        let transport = match self.inner.api.open_stream(user_id) {
            Ok(stream) => {
                info!("Notification stream opened for user {user_id}");
                Transport::Streaming(TaskHandle::spawn(read_stream(
                    Arc::downgrade(&self.inner),
                    generation,
                    user_id.to_string(),
                    stream,
                )))
            }
            Err(e) if e.is_unavailable() => {
                self.inner.disable(&mut session);
                return;
            }
            Err(e) => {
                warn!("Notification stream setup failed, polling instead: {e}");
                self.inner.start_polling(generation, user_id)
            }
        };
        session.transport = transport;
        self.inner.publish(&session);
        drop(session);

        tokio::spawn(initial_fetch(
            Arc::downgrade(&self.inner),
            generation,
            user_id.to_string(),
        ));
    }

    /// Releases the live transport and returns to `Idle`. Safe to call at any
    /// time; `Disabled` stays `Disabled`.
    pub fn deactivate(&self) {
        let mut session = self.inner.session();
        if session.transport.mode().is_active() {
            session.generation += 1;
            session.transport = Transport::Idle;
            info!("Notification delivery stopped");
            self.inner.publish(&session);
        }
    }

    /// Applies one pushed notification. Ignored unless streaming.
    pub fn on_stream_event(&self, notification: Notification) {
        let generation = self.inner.session().generation;
        self.inner.apply_stream_event(generation, notification);
    }

    /// Runs one polling cycle. Ignored unless polling.
    pub async fn on_poll_tick(&self) {
        let Some((generation, user_id)) = self.inner.polling_session() else {
            return;
        };
        let result = fetch_unread(&self.inner.api, self.inner.config.request_timeout, &user_id).await;
        self.inner.apply_poll_result(generation, result);
    }

    /// Acknowledges a notification, then reflects it locally. On failure the
    /// state is left alone for the next sync to correct.
    pub async fn mark_read(&self, notification_id: &str) {
        let generation = {
            let session = self.inner.session();
            if session.transport.mode() == Mode::Disabled {
                return;
            }
            session.generation
        };

        let result = time::timeout(
            self.inner.config.request_timeout,
            self.inner.api.mark_read(notification_id),
        )
        .await;

        match result {
            Ok(Ok(())) => {
                self.inner.update(generation, |session| {
                    session.state.apply_mark_read(notification_id);
                    true
                });
            }
            Ok(Err(e)) => warn!("Failed to mark notification {notification_id} read: {e}"),
            Err(_) => warn!("Timed out marking notification {notification_id} read"),
        }
    }

    /// Panel shown. Without `eager_fetch_on_open` this only clears the badge and
    /// list locally and makes no request.
    pub async fn open_panel(&self) {
        if !self.inner.config.eager_fetch_on_open {
            let mut session = self.inner.session();
            if session.transport.mode() != Mode::Disabled {
                session.state.clear();
                self.inner.publish(&session);
            }
            return;
        }

        let user_id = self.inner.session().state.user_id().map(str::to_string);
        let Some(user_id) = user_id else {
            debug!("Notification panel opened before any activation");
            return;
        };
        self.activate(Some(&user_id));

        let generation = {
            let session = self.inner.session();
            if session.transport.mode() == Mode::Disabled {
                return;
            }
            session.generation
        };

        let result = time::timeout(
            self.inner.config.request_timeout,
            self.inner.api.list(&user_id, 0, self.inner.config.page_size),
        )
        .await;

        match result {
            Ok(Ok(page)) => {
                self.inner.update(generation, |session| {
                    session.state.replace_items(page.content);
                    true
                });
            }
            Ok(Err(e)) if e.is_unavailable() => self.inner.disable_if_current(generation),
            Ok(Err(e)) => debug!("Notification page fetch failed: {e}"),
            Err(_) => debug!("Notification page fetch timed out"),
        }
    }

    /// Panel hidden.
    pub fn close_panel(&self) {
        self.deactivate();
    }
}

impl Inner {
    fn session(&self) -> MutexGuard<'_, Session> {
        self.session.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn publish(&self, session: &Session) {
        self.updates.send_replace(session.snapshot());
    }

    /// Runs `f` if `generation` is still current; `f` returns whether it
    /// changed anything worth publishing. Returns false for stale work.
    fn update<F>(&self, generation: u64, f: F) -> bool
    where
        F: FnOnce(&mut Session) -> bool,
    {
        let mut session = self.session();
        if session.generation != generation {
            debug!("Discarding stale notification result (generation {generation})");
            return false;
        }
        if f(&mut session) {
            self.publish(&session);
        }
        true
    }

    fn disable(&self, session: &mut Session) {
        info!("Notification service unavailable, delivery disabled for this session");
        session.generation += 1;
        session.transport = Transport::Disabled;
        session.state.clear();
        self.publish(session);
    }

    fn disable_if_current(&self, generation: u64) {
        let mut session = self.session();
        if session.generation == generation {
            self.disable(&mut session);
        }
    }

    fn start_polling(self: &Arc<Self>, generation: u64, user_id: &str) -> Transport {
        Transport::Polling(TaskHandle::spawn(run_poller(
            Arc::downgrade(self),
            Arc::clone(&self.api),
            generation,
            user_id.to_string(),
            self.config.poll_interval,
            self.config.request_timeout,
        )))
    }

    fn polling_session(&self) -> Option<(u64, String)> {
        let session = self.session();
        if session.transport.mode() != Mode::Polling {
            return None;
        }
        let user_id = session.state.user_id()?.to_string();
        Some((session.generation, user_id))
    }

    /// Returns false once the stream's session is over.
    fn apply_stream_event(&self, generation: u64, notification: Notification) -> bool {
        let mut applied = false;
        self.update(generation, |session| {
            if session.transport.mode() == Mode::Streaming {
                debug!("Notification {} received", notification.id);
                session.state.apply_stream_event(notification);
                session.pushed = true;
                applied = true;
            }
            applied
        });
        applied
    }

    /// Replaces the stream with the poller after a transient stream failure.
    fn fall_back_to_polling(self: &Arc<Self>, generation: u64, user_id: &str) {
        let mut session = self.session();
        if session.generation != generation || session.transport.mode() != Mode::Streaming {
            return;
        }
        session.transport = self.start_polling(generation, user_id);
        self.publish(&session);
    }

    /// Applies one poll outcome. Returns whether the poller should keep going.
    fn apply_poll_result(&self, generation: u64, result: Result<Result<i64, Error>, Elapsed>) -> bool {
        let mut session = self.session();
        if session.generation != generation || session.transport.mode() != Mode::Polling {
            debug!("Discarding stale unread count poll (generation {generation})");
            return false;
        }

        match result {
            Ok(Ok(count)) => {
                session.state.apply_polled_count(count);
                self.publish(&session);
                true
            }
            Ok(Err(e)) if e.is_unavailable() => {
                self.disable(&mut session);
                false
            }
            Ok(Err(e)) => {
                debug!("Unread count poll failed, retrying next tick: {e}");
                true
            }
            Err(_) => {
                debug!("Unread count poll timed out, retrying next tick");
                true
            }
        }
    }
}

async fn fetch_unread(
    api: &Arc<dyn NotificationApi>,
    timeout: Duration,
    user_id: &str,
) -> Result<Result<i64, Error>, Elapsed> {
    time::timeout(timeout, api.unread_count(user_id)).await
}

async fn initial_fetch(inner: Weak<Inner>, generation: u64, user_id: String) {
    let (api, timeout) = match inner.upgrade() {
        Some(inner) => (Arc::clone(&inner.api), inner.config.request_timeout),
        None => return,
    };

    let result = fetch_unread(&api, timeout, &user_id).await;

    let Some(inner) = inner.upgrade() else {
        return;
    };
    match result {
        Ok(Ok(count)) => {
            inner.update(generation, |session| {
                if session.pushed {
                    debug!("Skipping initial unread count, stream events already applied");
                    return false;
                }
                session.state.apply_polled_count(count);
                true
            });
        }
        Ok(Err(e)) if e.is_unavailable() => inner.disable_if_current(generation),
        Ok(Err(e)) => debug!("Initial unread count fetch failed: {e}"),
        Err(_) => debug!("Initial unread count fetch timed out"),
    }
}

async fn read_stream(
    inner: Weak<Inner>,
    generation: u64,
    user_id: String,
    mut stream: NotificationStream,
) {
    let failure = loop {
        match stream.next().await {
            Some(Ok(notification)) => {
                let Some(strong) = inner.upgrade() else {
                    return;
                };
                if !strong.apply_stream_event(generation, notification) {
                    return;
                }
            }
            Some(Err(e)) => break Some(e),
            None => break None,
        }
    };
    drop(stream);

    let Some(inner) = inner.upgrade() else {
        return;
    };
    match failure {
        Some(e) if e.is_unavailable() => inner.disable_if_current(generation),
        Some(e) => {
            warn!("Notification stream failed, falling back to polling: {e}");
            inner.fall_back_to_polling(generation, &user_id);
        }
        None => {
            warn!("Notification stream ended, falling back to polling");
            inner.fall_back_to_polling(generation, &user_id);
        }
    }
}

async fn run_poller(
    inner: Weak<Inner>,
    api: Arc<dyn NotificationApi>,
    generation: u64,
    user_id: String,
    period: Duration,
    timeout: Duration,
) {
    let mut ticker = time::interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;
        let result = fetch_unread(&api, timeout, &user_id).await;

        let Some(inner) = inner.upgrade() else {
            return;
        };
        if !inner.apply_poll_result(generation, result) {
            return;
        }
    }
}
