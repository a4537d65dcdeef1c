use std::sync::Arc;

use tokio::{sync::Mutex, time::Instant};

use crate::{
    classifier::classify,
    dispatch::VisitDispatcher,
    environment::HostEnvironment,
    log_info, log_warn,
    models::{PageVisit, SessionId},
};

use super::{
    events::{EventListener, HostEvents},
    TrackerState, Visibility,
};

#[derive(Debug, Clone, Copy, Default)]
pub struct TrackerOptions {
    /// Send a keep-alive snapshot of the open record each time the host hides.
    pub flush_on_hide: bool,
}

/// Tracks the page on screen and reports each finished visit.
///
/// Cheap to clone; clones share one state. Every handler runs to completion
/// under the state lock, so calls are applied in the order they are made.
/// Nothing here returns an error: delivery is best-effort by contract.
#[derive(Clone)]
pub struct PageTracker {
    session_id: SessionId,
    state: Arc<Mutex<TrackerState>>,
    env: HostEnvironment,
    dispatcher: VisitDispatcher,
    listener: Arc<Mutex<Option<EventListener>>>,
    options: TrackerOptions,
}

impl PageTracker {
    pub fn new(env: HostEnvironment, dispatcher: VisitDispatcher, options: TrackerOptions) -> Self {
        let session_id = SessionId::generate();
        let state = TrackerState::new(session_id.clone(), env.visibility());
        Self {
            state: Arc::new(Mutex::new(state)),
            session_id,
            env,
            dispatcher,
            listener: Arc::new(Mutex::new(None)),
            options,
        }
    }

    pub fn session_id(&self) -> &SessionId {
        &self.session_id
    }

    /// Whether two handles point at the same tracker instance.
    pub fn same_instance(&self, other: &PageTracker) -> bool {
        Arc::ptr_eq(&self.state, &other.state)
    }

    pub async fn is_active(&self) -> bool {
        self.state.lock().await.is_active()
    }

    /// Snapshot of the open record with dwell time counted up to now.
    pub async fn current_visit(&self) -> Option<PageVisit> {
        let guard = self.state.lock().await;
        guard.current.as_ref().map(|pending| {
            let mut record = pending.record.clone();
            let spent = pending.timer.current(Instant::now());
            if !spent.is_zero() {
                record.time_spent_seconds = Some(spent.as_secs());
            }
            record
        })
    }

    /// Close out the current page, if any, and start timing `path`.
    ///
    /// The same path twice produces two records; duplicates are left for the
    /// analytics side to fold.
    pub async fn track_page(&self, path: &str, search: Option<&str>) {
        let record = self.open_record(path, search);
        let previous = {
            let mut state = self.state.lock().await;
            if !state.is_active() {
                log_warn!("track_page({path}) on a destroyed tracker ignored");
                return;
            }
            state.begin_page(record, Instant::now())
        };

        if let Some(visit) = previous {
            self.dispatcher.send(visit, false);
        }
    }

    pub async fn set_visibility(&self, visibility: Visibility) {
        self.env.set_visibility(visibility);
        let snapshot = {
            let mut state = self.state.lock().await;
            if !state.is_active() || !state.set_visibility(visibility, Instant::now()) {
                return;
            }
            let hidden = visibility == Visibility::Hidden;
            (hidden && self.options.flush_on_hide)
                .then(|| state.current.as_ref().map(|pending| pending.record.clone()))
                .flatten()
        };

        if let Some(visit) = snapshot {
            self.dispatcher.send(visit, true);
        }
    }

    /// The host document is going away: flush the open record over the
    /// keep-alive path. The tracker itself stays usable.
    pub async fn unload(&self) {
        let last = {
            let mut state = self.state.lock().await;
            if !state.is_active() {
                return;
            }
            state.finish_page(Instant::now())
        };

        if let Some(visit) = last {
            self.dispatcher.send(visit, true);
        }
    }

    pub(crate) async fn attach(&self, events: &HostEvents) {
        let mut guard = self.listener.lock().await;
        if guard.is_none() {
            *guard = Some(EventListener::spawn(self.clone(), events.subscribe()));
        }
    }

    /// Detach from host events, then finalize and flush the open record.
    pub(crate) async fn shutdown(&self) {
        let listener = self.listener.lock().await.take();
        if let Some(listener) = listener {
            listener.stop().await;
        }

        let last = {
            let mut state = self.state.lock().await;
            if !state.is_active() {
                return;
            }
            state.destroy(Instant::now())
        };

        log_info!("page tracker {} destroyed", self.session_id);
        if let Some(visit) = last {
            self.dispatcher.send(visit, true);
        }
    }

    fn open_record(&self, path: &str, search: Option<&str>) -> PageVisit {
        let meta = classify(path, search);
        PageVisit {
            page_path: full_path(path, search),
            page_title: self.env.title(),
            page_type: meta.page_type.unwrap_or_default(),
            page_id: meta.page_id,
            referrer: self.env.referrer(),
            session_id: self.session_id.clone(),
            time_spent_seconds: None,
            user_agent: self.env.user_agent(),
            device_type: self.env.device_type(),
        }
    }
}

fn full_path(path: &str, search: Option<&str>) -> String {
    match search.map(|s| s.trim_start_matches('?')).filter(|s| !s.is_empty()) {
        Some(query) if !path.contains('?') => format!("{path}?{query}"),
        _ => path.to_string(),
    }
}
