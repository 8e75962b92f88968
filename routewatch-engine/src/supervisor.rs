//! Push channel lifecycle: connect, read, reconnect with backoff.

use std::fmt;
use std::sync::Arc;

use futures_util::StreamExt;
use parking_lot::Mutex;
use routewatch_types::{ConnectionState, ConnectionStatus};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::config::ReconnectPolicy;
use crate::ingest::StreamIngester;
use crate::transport::PushTransport;

/// Callback run every time the channel re-opens after the first open.
pub type ReconnectHook = Arc<dyn Fn() + Send + Sync>;

enum StreamEnd {
    Closed,
    Failed(String),
    Stopped,
}

/// Owns the push connection and its state machine.
///
/// The state cycles `connecting -> open -> {closed, error} -> connecting`
/// until the supervisor is stopped. Failures never escape: they are logged
/// and show up only as [`ConnectionState::Error`].
pub struct ConnectionSupervisor {
    transport: Arc<dyn PushTransport>,
    ingester: Arc<StreamIngester>,
    policy: ReconnectPolicy,
    state_tx: watch::Sender<ConnectionState>,
    on_reconnect: Option<ReconnectHook>,
}

impl fmt::Debug for ConnectionSupervisor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionSupervisor")
            .field("transport", &self.transport)
            .field("policy", &self.policy)
            .field("state", &*self.state_tx.borrow())
            .field("on_reconnect", &self.on_reconnect.is_some())
            .finish()
    }
}

impl ConnectionSupervisor {
    pub fn new(
        transport: Arc<dyn PushTransport>,
        ingester: Arc<StreamIngester>,
        policy: ReconnectPolicy,
    ) -> Self {
        let (state_tx, _) = watch::channel(ConnectionState::Closed);
        Self {
            transport,
            ingester,
            policy,
            state_tx,
            on_reconnect: None,
        }
    }

    /// Run `hook` whenever the channel re-opens.
    pub fn with_reconnect_hook(mut self, hook: ReconnectHook) -> Self {
        self.on_reconnect = Some(hook);
        self
    }

    pub fn state(&self) -> ConnectionState {
        *self.state_tx.borrow()
    }

    pub fn connection_status(&self) -> ConnectionStatus {
        self.state().status()
    }

    /// Subscribe to state transitions.
    pub fn subscribe_state(&self) -> watch::Receiver<ConnectionState> {
        self.state_tx.subscribe()
    }

    fn set_state(&self, state: ConnectionState) {
        let previous = self.state_tx.send_replace(state);
        if previous != state {
            debug!(from = %previous, to = %state, "Push channel state changed");
        }
    }

    /// Run until `stop` flips to true or its sender is dropped.
    ///
    /// Also returns once `max_attempts` consecutive connects have failed.
    pub async fn run(&self, mut stop: watch::Receiver<bool>) {
        let target = self.transport.description().to_string();
        let mut attempt: u32 = 0;
        let mut failures: u32 = 0;
        let mut opened_before = false;

        loop {
            if *stop.borrow() {
                break;
            }

            self.set_state(ConnectionState::Connecting);
            let connected = tokio::select! {
                _ = stop.changed() => break,
                result = self.transport.connect() => result,
            };

            match connected {
                Ok(mut frames) => {
                    self.set_state(ConnectionState::Open);
                    info!(%target, "Push channel open");
                    attempt = 0;
                    failures = 0;

                    if opened_before {
                        if let Some(hook) = &self.on_reconnect {
                            hook();
                        }
                    }
                    opened_before = true;

                    let end = loop {
                        tokio::select! {
                            _ = stop.changed() => break StreamEnd::Stopped,
                            frame = frames.next() => match frame {
                                Some(Ok(bytes)) => {
                                    self.ingester.ingest(&bytes);
                                }
                                Some(Err(e)) => break StreamEnd::Failed(e.to_string()),
                                None => break StreamEnd::Closed,
                            },
                        }
                    };

                    match end {
                        StreamEnd::Stopped => break,
                        StreamEnd::Closed => {
                            info!(%target, "Push channel closed by peer");
                            self.set_state(ConnectionState::Closed);
                        }
                        StreamEnd::Failed(reason) => {
                            warn!(%target, %reason, "Push channel lost");
                            self.set_state(ConnectionState::Error);
                        }
                    }
                }
                Err(e) => {
                    failures += 1;
                    warn!(%target, error = %e, failures, "Push channel connect failed");
                    self.set_state(ConnectionState::Error);

                    if !self.policy.allows(failures) {
                        warn!(%target, failures, "Giving up on push channel");
                        return;
                    }
                }
            }

            let delay = self.policy.delay_for(attempt);
            attempt = attempt.saturating_add(1);
            debug!(%target, ?delay, "Reconnecting after backoff");

            tokio::select! {
                _ = stop.changed() => break,
                _ = tokio::time::sleep(delay) => {}
            }
        }

        self.set_state(ConnectionState::Closed);
        info!(%target, "Push channel stopped");
    }
}

#[derive(Debug, Default)]
struct ChannelInner {
    subscribers: usize,
    stop_tx: Option<watch::Sender<bool>>,
    task: Option<JoinHandle<()>>,
}

/// The process-wide push connection, shared by every view that needs it.
///
/// The supervisor task starts when the first [`ChannelLease`] is acquired
/// and is told to stop when the last one is dropped, so there is exactly
/// one connection however many consumers are mounted.
#[derive(Debug)]
pub struct PushChannel {
    supervisor: Arc<ConnectionSupervisor>,
    inner: Mutex<ChannelInner>,
}

impl PushChannel {
    pub fn new(supervisor: ConnectionSupervisor) -> Arc<Self> {
        Arc::new(Self {
            supervisor: Arc::new(supervisor),
            inner: Mutex::new(ChannelInner::default()),
        })
    }

    /// Register a consumer. Must be called from within a tokio runtime.
    ///
    /// Restarts the supervisor if it gave up after `max_attempts`.
    pub fn acquire(self: &Arc<Self>) -> ChannelLease {
        let mut inner = self.inner.lock();
        inner.subscribers += 1;

        let finished = inner.task.as_ref().map_or(true, |task| task.is_finished());
        if inner.subscribers == 1 || finished {
            if let Some(previous) = inner.task.take() {
                previous.abort();
            }

            let (stop_tx, stop_rx) = watch::channel(false);
            let supervisor = self.supervisor.clone();
            inner.task = Some(tokio::spawn(async move {
                supervisor.run(stop_rx).await;
            }));
            inner.stop_tx = Some(stop_tx);
            debug!(subscribers = inner.subscribers, "Push channel supervisor started");
        }

        ChannelLease {
            channel: self.clone(),
        }
    }

    fn release(&self) {
        let mut inner = self.inner.lock();
        inner.subscribers = inner.subscribers.saturating_sub(1);

        if inner.subscribers == 0 {
            if let Some(stop_tx) = inner.stop_tx.take() {
                let _ = stop_tx.send(true);
            }
            debug!("Push channel released by last subscriber");
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.inner.lock().subscribers
    }

    pub fn is_running(&self) -> bool {
        self.inner
            .lock()
            .task
            .as_ref()
            .is_some_and(|task| !task.is_finished())
    }

    pub fn state(&self) -> ConnectionState {
        self.supervisor.state()
    }

    pub fn connection_status(&self) -> ConnectionStatus {
        self.supervisor.connection_status()
    }

    pub fn subscribe_state(&self) -> watch::Receiver<ConnectionState> {
        self.supervisor.subscribe_state()
    }
}

/// One consumer's hold on the [`PushChannel`]. Dropping it releases the hold.
#[derive(Debug)]
pub struct ChannelLease {
    channel: Arc<PushChannel>,
}

impl ChannelLease {
    pub fn channel(&self) -> &Arc<PushChannel> {
        &self.channel
    }
}

impl Drop for ChannelLease {
    fn drop(&mut self) {
        self.channel.release();
    }
}
