use tokio::sync::broadcast::{self, error::RecvError, error::TryRecvError, Receiver};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::{log_debug, log_warn};

use super::{PageTracker, Visibility};

const DEFAULT_CAPACITY: usize = 64;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostEvent {
    Navigated {
        path: String,
        search: Option<String>,
    },
    VisibilityChanged(Visibility),
    Unload,
}

/// Broadcast bus the host publishes navigation and lifecycle events on.
#[derive(Clone)]
pub struct HostEvents {
    tx: broadcast::Sender<HostEvent>,
}

impl Default for HostEvents {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl HostEvents {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    /// Publish an event. Returns false when no tracker is listening.
    pub fn emit(&self, event: HostEvent) -> bool {
        self.tx.send(event).is_ok()
    }

    pub fn navigated(&self, path: impl Into<String>, search: Option<String>) -> bool {
        self.emit(HostEvent::Navigated {
            path: path.into(),
            search,
        })
    }

    pub fn listener_count(&self) -> usize {
        self.tx.receiver_count()
    }

    pub(crate) fn subscribe(&self) -> Receiver<HostEvent> {
        self.tx.subscribe()
    }
}

/// A tracker's subscription to [`HostEvents`], running as its own task.
pub(crate) struct EventListener {
    handle: JoinHandle<()>,
    cancel_token: CancellationToken,
}

impl EventListener {
    pub fn spawn(tracker: PageTracker, rx: Receiver<HostEvent>) -> Self {
        let cancel_token = CancellationToken::new();
        let handle = tokio::spawn(listen_loop(tracker, rx, cancel_token.clone()));
        Self {
            handle,
            cancel_token,
        }
    }

    /// Handle whatever is already queued, then detach.
    pub async fn stop(self) {
        self.cancel_token.cancel();
        if let Err(err) = self.handle.await {
            log_warn!("host event listener ended abnormally: {err}");
        }
    }
}

async fn listen_loop(tracker: PageTracker, mut rx: Receiver<HostEvent>, cancel_token: CancellationToken) {
    loop {
        tokio::select! {
            biased;
            _ = cancel_token.cancelled() => {
                drain_queued(&tracker, &mut rx).await;
                log_debug!("host event listener for {} detached", tracker.session_id());
                break;
            }
            received = rx.recv() => match received {
                Ok(event) => handle_event(&tracker, event).await,
                Err(RecvError::Lagged(skipped)) => {
                    log_warn!("host event listener fell behind, {skipped} events skipped");
                }
                Err(RecvError::Closed) => break,
            }
        }
    }
}

async fn drain_queued(tracker: &PageTracker, rx: &mut Receiver<HostEvent>) {
    loop {
        match rx.try_recv() {
            Ok(event) => handle_event(tracker, event).await,
            Err(TryRecvError::Lagged(_)) => continue,
            Err(TryRecvError::Empty | TryRecvError::Closed) => break,
        }
    }
}

async fn handle_event(tracker: &PageTracker, event: HostEvent) {
    match event {
        HostEvent::Navigated { path, search } => tracker.track_page(&path, search.as_deref()).await,
        HostEvent::VisibilityChanged(visibility) => tracker.set_visibility(visibility).await,
        HostEvent::Unload => tracker.unload().await,
    }
}
