//! Fire-and-forget delivery of finished visit records.
//!
//! Every send runs as a detached task. Failures are logged at debug level and
//! dropped: no retries, no error ever reaches the caller. Keep-alive sends are
//! additionally registered with a [`TaskTracker`] so a host that is shutting
//! down can give them a short grace period with [`VisitDispatcher::drain`].

mod sink;

pub use sink::{Delivery, HttpSink, NullSink, VisitSink, DEFAULT_VISIT_PATH};

use std::{sync::Arc, time::Duration};
use tokio_util::task::TaskTracker;

use crate::log_debug;
use crate::models::PageVisit;

#[derive(Clone)]
pub struct VisitDispatcher {
    sink: Arc<dyn VisitSink>,
    keepalive: TaskTracker,
}

impl VisitDispatcher {
    pub fn new(sink: Arc<dyn VisitSink>) -> Self {
        Self {
            sink,
            keepalive: TaskTracker::new(),
        }
    }

    /// Hand a record off for delivery. `sync` selects the keep-alive path used
    /// on unload. Must be called from within a Tokio runtime.
    pub fn send(&self, visit: PageVisit, sync: bool) {
        let sink = Arc::clone(&self.sink);
        if sync {
            self.keepalive.spawn(deliver(sink, visit, Delivery::KeepAlive));
        } else {
            tokio::spawn(deliver(sink, visit, Delivery::Background));
        }
    }

    /// Keep-alive sends still in flight.
    pub fn pending_keepalive(&self) -> usize {
        self.keepalive.len()
    }

    /// Wait up to `grace` for keep-alive sends. Returns true if they all
    /// finished. Sends still running afterwards are abandoned, not aborted.
    pub async fn drain(&self, grace: Duration) -> bool {
        self.keepalive.close();
        let finished = tokio::time::timeout(grace, self.keepalive.wait())
            .await
            .is_ok();
        self.keepalive.reopen();
        finished
    }
}

async fn deliver(sink: Arc<dyn VisitSink>, visit: PageVisit, delivery: Delivery) {
    match sink.deliver(&visit, delivery).await {
        Ok(()) => log_debug!(
            "page visit delivered ({:?}) {} path={} session={}",
            delivery,
            visit.page_type.as_str(),
            visit.page_path,
            visit.session_id
        ),
        Err(err) => log_debug!(
            "page visit dropped ({:?}) path={}: {err:#}",
            delivery,
            visit.page_path
        ),
    }
}


#[cfg(test)]
mod tests {
    use super::testing::{settle, FailingSink, RecordingSink};
    use super::*;
    use crate::models::{DeviceType, PageType, SessionId};
    use std::sync::atomic::Ordering;

    fn visit(path: &str) -> PageVisit {
        PageVisit {
            page_path: path.into(),
            page_title: None,
            page_type: PageType::Unknown,
            page_id: None,
            referrer: None,
            session_id: SessionId::generate(),
            time_spent_seconds: None,
            user_agent: None,
            device_type: DeviceType::Desktop,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn background_and_keepalive_reach_sink() {
        let sink = Arc::new(RecordingSink::default());
        let dispatcher = VisitDispatcher::new(sink.clone());

        dispatcher.send(visit("/news"), false);
        dispatcher.send(visit("/faq"), true);
        assert!(dispatcher.drain(Duration::from_secs(1)).await);
        settle().await;

        let delivered = sink.delivered();
        assert_eq!(delivered.len(), 2);
        assert!(delivered
            .iter()
            .any(|(v, d)| v.page_path == "/faq" && *d == Delivery::KeepAlive));
        assert!(delivered
            .iter()
            .any(|(v, d)| v.page_path == "/news" && *d == Delivery::Background));
        assert_eq!(dispatcher.pending_keepalive(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn failures_are_swallowed() {
        let sink = Arc::new(FailingSink::default());
        let dispatcher = VisitDispatcher::new(sink.clone());

        dispatcher.send(visit("/news/1"), false);
        dispatcher.send(visit("/news/2"), true);
        assert!(dispatcher.drain(Duration::from_secs(1)).await);
        settle().await;

        // One attempt each, never retried.
        assert_eq!(sink.attempts.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn send_after_drain_still_tracked() {
        let sink = Arc::new(RecordingSink::default());
        let dispatcher = VisitDispatcher::new(sink.clone());

        assert!(dispatcher.drain(Duration::from_millis(10)).await);
        dispatcher.send(visit("/profile"), true);
        assert!(dispatcher.drain(Duration::from_secs(1)).await);
        assert_eq!(sink.delivered().len(), 1);
    }
}
