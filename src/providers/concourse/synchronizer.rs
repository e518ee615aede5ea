use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use futures::{Stream, StreamExt};
use indexmap::IndexMap;
use log::{debug, warn};
use tokio::sync::watch;
use tokio::task::JoinHandle;

use super::types::{Metadata, Resource, ResourceEvent};
use crate::error::Result;

/// Options for one metadata synchronization.
#[derive(Debug, Clone, Copy, Default)]
pub struct SyncOptions {
    /// Upper bound on the wait; `None` waits until every resource reported or the
    /// stream ended.
    pub timeout: Option<Duration>,
}

/// How the wait for resource metadata ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncOutcome {
    /// Every resource reported metadata, or the event stream ended.
    Completed,
    /// The caller's interrupt fired first.
    Interrupted,
    /// The configured timeout elapsed first.
    TimedOut,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncReport {
    pub expected: usize,
    pub resolved: usize,
    pub outcome: SyncOutcome,
}

impl SyncReport {
    pub fn is_complete(&self) -> bool {
        self.resolved == self.expected
    }
}

/// Countdown latch backed by a watch channel.
#[derive(Debug)]
pub(super) struct Countdown {
    remaining: watch::Sender<usize>,
}

impl Countdown {
    pub(super) fn new(count: usize) -> Self {
        let (remaining, _) = watch::channel(count);
        Self { remaining }
    }

    pub(super) fn count_down(&self) {
        self.remaining.send_modify(|n| *n = n.saturating_sub(1));
    }

    /// Forces the count to zero, releasing every waiter.
    pub(super) fn release(&self) {
        self.remaining.send_replace(0);
    }

    #[cfg(test)]
    pub(super) fn remaining(&self) -> usize {
        *self.remaining.borrow()
    }

    pub(super) async fn wait(&self) {
        let mut remaining = self.remaining.subscribe();
        // The sender lives as long as `self`, so this cannot fail.
        let _ = remaining.wait_for(|n| *n == 0).await;
    }
}

/// Latched interrupt signal.
///
/// Once triggered it stays triggered, so a wait that starts after the trigger
/// ends right away.
#[derive(Debug)]
pub struct Interrupt {
    triggered: watch::Sender<bool>,
}

impl Default for Interrupt {
    fn default() -> Self {
        Self::new()
    }
}

impl Interrupt {
    pub fn new() -> Self {
        let (triggered, _) = watch::channel(false);
        Self { triggered }
    }

    pub fn trigger(&self) {
        self.triggered.send_replace(true);
    }

    pub fn is_triggered(&self) -> bool {
        *self.triggered.borrow()
    }

    /// Resolves once [`Interrupt::trigger`] has been called, now or earlier.
    pub async fn wait(&self) {
        let mut triggered = self.triggered.subscribe();
        // The sender lives as long as `self`, so this cannot fail.
        let _ = triggered.wait_for(|t| *t).await;
    }
}

#[derive(Debug, Default)]
struct Arena {
    metadata: HashMap<String, Metadata>,
    counted: HashSet<String>,
}

/// State shared between the event producer and the waiting caller.
struct SyncState {
    tracked: HashSet<String>,
    arena: Mutex<Arena>,
    countdown: Countdown,
}

impl SyncState {
    fn new(tracked: HashSet<String>) -> Self {
        let countdown = Countdown::new(tracked.len());
        Self {
            tracked,
            arena: Mutex::new(Arena::default()),
            countdown,
        }
    }

    /// Records the event's metadata and returns whether it was the first event
    /// seen for that resource. Only first events count down.
    fn apply(&self, event: ResourceEvent) -> bool {
        if !self.tracked.contains(&event.resource_id) {
            return false;
        }

        let mut arena = self.arena.lock().unwrap_or_else(PoisonError::into_inner);
        let first = arena.counted.insert(event.resource_id.clone());
        arena.metadata.insert(event.resource_id, event.metadata);
        if first {
            self.countdown.count_down();
        }
        first
    }

    fn take(&self) -> (HashMap<String, Metadata>, usize) {
        let mut arena = self.arena.lock().unwrap_or_else(PoisonError::into_inner);
        let resolved = arena.counted.len();
        (std::mem::take(&mut arena.metadata), resolved)
    }
}

/// A running consumer of a build's event stream.
///
/// Dropping the subscription aborts the consumer; [`Subscription::dispose`]
/// additionally waits until it has stopped.
pub struct Subscription {
    handle: Option<JoinHandle<()>>,
}

impl Subscription {
    fn spawn<S>(events: S, state: Arc<SyncState>) -> Self
    where
        S: Stream<Item = Result<ResourceEvent>> + Send + 'static,
    {
        let handle = tokio::spawn(async move {
            let mut events = Box::pin(events);
            while let Some(event) = events.next().await {
                match event {
                    Ok(event) => {
                        let resource_id = event.resource_id.clone();
                        if state.apply(event) {
                            debug!("Received metadata for resource {resource_id}");
                        }
                    }
                    Err(e) => {
                        warn!("Build event stream failed, treating it as ended: {e}");
                        break;
                    }
                }
            }
            // No more events will arrive: release resources that never reported.
            state.countdown.release();
        });

        Self {
            handle: Some(handle),
        }
    }

    pub async fn dispose(mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
            if let Err(e) = handle.await {
                if !e.is_cancelled() {
                    warn!("Build event subscription terminated abnormally: {e}");
                }
            }
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }
}

/// Waits for metadata of every resource on the build's event stream and writes it
/// into `resources`.
///
/// The event stream is consumed on a separate task. The wait ends when each
/// resource has received at least one event, when the stream ends, when
/// `interrupt` resolves, or when `options.timeout` elapses, whichever comes first.
/// Later events for the same resource overwrite earlier metadata. Resources that
/// never reported keep empty metadata.
///
/// This never fails: an interrupted or timed-out wait is logged and the metadata
/// received so far is kept.
pub async fn synchronize<S, I>(
    events: S,
    resources: &mut IndexMap<String, Resource>,
    options: SyncOptions,
    interrupt: I,
) -> SyncReport
where
    S: Stream<Item = Result<ResourceEvent>> + Send + 'static,
    I: Future<Output = ()>,
{
    let expected = resources.len();
    let state = Arc::new(SyncState::new(resources.keys().cloned().collect()));
    let subscription = Subscription::spawn(events, Arc::clone(&state));

    let outcome = wait_for_metadata(&state.countdown, options.timeout, interrupt).await;
    subscription.dispose().await;

    let (metadata, resolved) = state.take();
    for (resource_id, metadata) in metadata {
        if let Some(resource) = resources.get_mut(&resource_id) {
            resource.metadata = metadata;
        }
    }

    match outcome {
        SyncOutcome::Completed => {
            debug!("Resolved metadata for {resolved}/{expected} resources");
        }
        SyncOutcome::Interrupted => {
            warn!("Unable to fully read event stream: interrupted with {resolved}/{expected} resources resolved");
        }
        SyncOutcome::TimedOut => {
            warn!("Unable to fully read event stream: timed out with {resolved}/{expected} resources resolved");
        }
    }

    SyncReport {
        expected,
        resolved,
        outcome,
    }
}

async fn wait_for_metadata<I>(countdown: &Countdown, timeout: Option<Duration>, interrupt: I) -> SyncOutcome
where
    I: Future<Output = ()>,
{
    let deadline = async {
        match timeout {
            Some(timeout) => tokio::time::sleep(timeout).await,
            None => std::future::pending().await,
        }
    };

    tokio::select! {
        biased;
        () = countdown.wait() => SyncOutcome::Completed,
        () = interrupt => SyncOutcome::Interrupted,
        () = deadline => SyncOutcome::TimedOut,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::stream;
    use tokio_test::{assert_pending, assert_ready, task};

    fn event(resource_id: &str, pairs: &[(&str, &str)]) -> ResourceEvent {
        ResourceEvent {
            resource_id: resource_id.to_string(),
            metadata: pairs
                .iter()
                .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
                .collect(),
        }
    }

    fn resources(ids: &[&str]) -> IndexMap<String, Resource> {
        ids.iter()
            .map(|id| ((*id).to_string(), Resource::new(*id, format!("name-{id}"), "git")))
            .collect()
    }

    fn tracked(ids: &[&str]) -> HashSet<String> {
        ids.iter().map(|id| (*id).to_string()).collect()
    }

    /// Yields the given events, then never completes.
    fn open_stream(events: Vec<ResourceEvent>) -> impl Stream<Item = Result<ResourceEvent>> + Send + 'static {
        stream::iter(events.into_iter().map(Ok)).chain(stream::pending())
    }

    #[test]
    fn countdown_wait_completes_at_zero() {
        let countdown = Countdown::new(2);
        let mut wait = task::spawn(countdown.wait());

        assert_pending!(wait.poll());
        countdown.count_down();
        assert_pending!(wait.poll());
        countdown.count_down();
        assert!(wait.is_woken());
        assert_ready!(wait.poll());
    }

    #[test]
    fn countdown_release_forces_zero() {
        let countdown = Countdown::new(5);
        let mut wait = task::spawn(countdown.wait());

        assert_pending!(wait.poll());
        countdown.release();
        assert_ready!(wait.poll());
        assert_eq!(countdown.remaining(), 0);
    }

    #[test]
    fn countdown_of_zero_is_ready_immediately() {
        let countdown = Countdown::new(0);
        let mut wait = task::spawn(countdown.wait());
        assert_ready!(wait.poll());
    }

    #[test]
    fn repeated_events_count_down_once() {
        let state = SyncState::new(tracked(&["r1", "r2"]));

        let counted: Vec<bool> = (1..=3)
            .map(|n| state.apply(event("r1", &[("n", &n.to_string())])))
            .collect();

        assert_eq!(counted, vec![true, false, false]);
        assert_eq!(state.countdown.remaining(), 1, "only r1 has counted down");

        let (metadata, resolved) = state.take();
        assert_eq!(resolved, 1);
        assert_eq!(metadata["r1"].get("n").map(String::as_str), Some("3"), "last event wins");
    }

    #[test]
    fn untracked_events_are_ignored() {
        let state = SyncState::new(tracked(&["r1"]));

        assert!(!state.apply(event("other", &[("a", "1")])));
        assert_eq!(state.countdown.remaining(), 1);
        assert!(state.take().0.is_empty());
    }

    #[tokio::test]
    async fn completes_once_every_resource_reported() {
        let mut resources = resources(&["r1"]);
        let events = open_stream(vec![
            event("r1", &[("a", "1")]),
            event("r1", &[("a", "2")]),
            event("r1", &[("a", "3"), ("b", "4")]),
        ]);

        let report = synchronize(events, &mut resources, SyncOptions::default(), std::future::pending()).await;

        assert_eq!(report.outcome, SyncOutcome::Completed);
        assert_eq!(report.resolved, 1);
        assert!(report.is_complete());
        assert!(!resources["r1"].metadata.is_empty());
    }

    #[tokio::test]
    async fn stream_end_releases_waiter() {
        let mut resources = resources(&["r1", "r2"]);
        let events = stream::iter(vec![Ok(event("r1", &[("commit", "abc")]))]);

        let report = synchronize(events, &mut resources, SyncOptions::default(), std::future::pending()).await;

        assert_eq!(report.outcome, SyncOutcome::Completed);
        assert_eq!(report.expected, 2);
        assert_eq!(report.resolved, 1);
        assert!(!report.is_complete());
        assert_eq!(resources["r1"].metadata.get("commit").map(String::as_str), Some("abc"));
        assert!(resources["r2"].metadata.is_empty());
    }

    #[tokio::test]
    async fn stream_error_releases_waiter() {
        let mut resources = resources(&["r1", "r2"]);
        let events = stream::iter(vec![
            Ok(event("r1", &[("a", "1")])),
            Err(crate::error::BuildLensError::ApiError {
                status: 502,
                message: "bad gateway".to_string(),
            }),
        ])
        .chain(stream::pending());

        let report = synchronize(events, &mut resources, SyncOptions::default(), std::future::pending()).await;

        assert_eq!(report.outcome, SyncOutcome::Completed);
        assert_eq!(report.resolved, 1);
    }

    #[tokio::test]
    async fn timeout_keeps_partial_metadata() {
        let mut resources = resources(&["r1", "r2"]);
        let events = open_stream(vec![event("r1", &[("a", "1")])]);
        let options = SyncOptions {
            timeout: Some(Duration::from_millis(100)),
        };

        let report = synchronize(events, &mut resources, options, std::future::pending()).await;

        assert_eq!(report.outcome, SyncOutcome::TimedOut);
        assert_eq!(report.resolved, 1);
        assert_eq!(resources["r1"].metadata.get("a").map(String::as_str), Some("1"));
        assert!(resources["r2"].metadata.is_empty());
    }

    #[tokio::test]
    async fn interrupt_ends_wait() {
        let mut resources = resources(&["r1"]);
        let events = open_stream(vec![]);
        let (tx, rx) = tokio::sync::oneshot::channel::<()>();
        tx.send(()).unwrap();
        let interrupt = async {
            let _ = rx.await;
        };

        let report = synchronize(events, &mut resources, SyncOptions::default(), interrupt).await;

        assert_eq!(report.outcome, SyncOutcome::Interrupted);
        assert_eq!(report.resolved, 0);
        assert!(resources["r1"].metadata.is_empty());
    }

    #[test]
    fn interrupt_stays_triggered() {
        let interrupt = Interrupt::new();
        let mut before = task::spawn(interrupt.wait());
        assert_pending!(before.poll());

        interrupt.trigger();
        assert!(before.is_woken());
        assert_ready!(before.poll());

        let mut after = task::spawn(interrupt.wait());
        assert_ready!(after.poll());
        assert!(interrupt.is_triggered());
    }

    #[tokio::test]
    async fn interrupt_triggered_before_wait_ends_it() {
        let mut resources = resources(&["r1"]);
        let interrupt = Interrupt::new();
        interrupt.trigger();

        let report = synchronize(stream::pending(), &mut resources, SyncOptions::default(), interrupt.wait()).await;

        assert_eq!(report.outcome, SyncOutcome::Interrupted);
        assert_eq!(report.resolved, 0);
    }

    #[tokio::test]
    async fn subscription_is_disposed_after_wait() {
        let mut resources = resources(&["r1"]);
        let (tx, rx) = futures::channel::mpsc::unbounded::<ResourceEvent>();
        tx.unbounded_send(event("r1", &[("a", "1")])).unwrap();

        let report = synchronize(rx.map(Ok), &mut resources, SyncOptions::default(), std::future::pending()).await;

        assert_eq!(report.outcome, SyncOutcome::Completed);
        assert!(tx.is_closed(), "event consumer must be gone once the wait returns");
    }

    #[tokio::test]
    async fn empty_resources_return_immediately() {
        let mut resources = IndexMap::new();

        let report = synchronize(open_stream(vec![]), &mut resources, SyncOptions::default(), std::future::pending()).await;

        assert_eq!(report.outcome, SyncOutcome::Completed);
        assert_eq!(report.expected, 0);
    }
}
