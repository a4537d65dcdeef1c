use std::sync::Arc;

use anyhow::Result;
use tokio::sync::Mutex;

use crate::{
    dispatch::{HttpSink, NullSink, VisitDispatcher, VisitSink},
    environment::HostEnvironment,
    log_info,
    settings::TrackerSettings,
};

use super::{events::HostEvents, PageTracker, TrackerOptions};

/// Provides the one tracker of an application scope.
///
/// The host keeps a single registry and passes clones to whoever needs to
/// report navigation. `init` creates the tracker on first use; after `destroy`
/// the next `init` creates a fresh one with a new session id.
#[derive(Clone)]
pub struct TrackerRegistry {
    current: Arc<Mutex<Option<PageTracker>>>,
    env: HostEnvironment,
    events: HostEvents,
    dispatcher: VisitDispatcher,
    options: TrackerOptions,
}

impl TrackerRegistry {
    pub fn new(
        env: HostEnvironment,
        events: HostEvents,
        dispatcher: VisitDispatcher,
        options: TrackerOptions,
    ) -> Self {
        Self {
            current: Arc::new(Mutex::new(None)),
            env,
            events,
            dispatcher,
            options,
        }
    }

    /// Build a registry that posts to the endpoint described by `settings`,
    /// or discards visits when tracking is disabled.
    pub fn from_settings(
        settings: &TrackerSettings,
        env: HostEnvironment,
        events: HostEvents,
    ) -> Result<Self> {
        let sink: Arc<dyn VisitSink> = if settings.enabled {
            Arc::new(HttpSink::new(
                &settings.api_base_url,
                &settings.visit_path,
                settings.auth_token.clone(),
            )?)
        } else {
            log_info!("page visit tracking disabled; visits will not leave the process");
            Arc::new(NullSink)
        };

        let options = TrackerOptions {
            flush_on_hide: settings.flush_on_hide,
        };
        Ok(Self::new(env, events, VisitDispatcher::new(sink), options))
    }

    pub fn env(&self) -> &HostEnvironment {
        &self.env
    }

    pub fn events(&self) -> &HostEvents {
        &self.events
    }

    pub fn dispatcher(&self) -> &VisitDispatcher {
        &self.dispatcher
    }

    /// Return the active tracker, creating and attaching one if needed.
    pub async fn init(&self) -> PageTracker {
        let mut current = self.current.lock().await;
        if let Some(tracker) = current.as_ref() {
            return tracker.clone();
        }

        let tracker = PageTracker::new(self.env.clone(), self.dispatcher.clone(), self.options);
        tracker.attach(&self.events).await;
        log_info!("page tracker started, session {}", tracker.session_id());
        *current = Some(tracker.clone());
        tracker
    }

    pub async fn current(&self) -> Option<PageTracker> {
        self.current.lock().await.clone()
    }

    /// Shortcut for `init().await.track_page(..)`.
    pub async fn track_page(&self, path: &str, search: Option<&str>) {
        self.init().await.track_page(path, search).await;
    }

    /// Finalize and flush the active tracker, detach it, and forget it.
    /// A no-op when nothing is active.
    pub async fn destroy(&self) {
        let tracker = self.current.lock().await.take();
        if let Some(tracker) = tracker {
            tracker.shutdown().await;
        }
    }
}
