//! Find containers that show up asynchronously and mount ad widgets into them.
//!
//! Article HTML arrives from the server with placeholder ids (`qctaboo-mid`,
//! Adsconex containers, ...) that may not be in the document yet when the
//! controller starts. Two discovery strategies are offered behind
//! [`await_element`]:
//!
//! - [`AwaitStrategy::Poll`]: check, then re-check on a fixed interval up to a
//!   bounded number of attempts;
//! - [`AwaitStrategy::Observe`]: check, then watch mutation records for any of
//!   the ids until a timeout.
//!
//! Both stop their timer and observer as soon as they return. A
//! [`TeardownSignal`] stops them early: once the page is torn down the wait
//! resolves to `None` and nothing is mounted.

use crate::ads::AdQueue;
use crate::ads::widgets::{MountedWidget, mount_widget};
use crate::dom::{Dom, NodeId};
use crate::models::AdSlotDescriptor;
use serde::{Deserialize, Serialize};
use std::cell::{Cell, RefCell};
use std::time::Duration;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::watch;
use tokio::time::{Instant, sleep, timeout_at};
use tracing::{debug, info, instrument, warn};

/// How to wait for an element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(tag = "strategy", rename_all = "lowercase")]
pub enum AwaitStrategy {
    Poll { interval_ms: u64, max_attempts: u32 },
    Observe { timeout_ms: u64 },
}

impl Default for AwaitStrategy {
    fn default() -> Self {
        AwaitStrategy::Poll { interval_ms: 100, max_attempts: 10 }
    }
}

/// Owner side of the page teardown flag. Held by the controller.
#[derive(Debug)]
pub struct Teardown {
    tx: watch::Sender<bool>,
}

impl Default for Teardown {
    fn default() -> Self {
        Self::new()
    }
}

impl Teardown {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(false);
        Self { tx }
    }

    /// Flip the flag and wake every pending waiter. Idempotent.
    pub fn trigger(&self) {
        self.tx.send_replace(true);
    }

    pub fn is_triggered(&self) -> bool {
        *self.tx.borrow()
    }

    /// A receiver handed to resolvers and loaders.
    pub fn signal(&self) -> TeardownSignal {
        TeardownSignal { rx: self.tx.subscribe() }
    }
}

/// Receiver side of [`Teardown`].
#[derive(Debug, Clone)]
pub struct TeardownSignal {
    rx: watch::Receiver<bool>,
}

impl TeardownSignal {
    /// A signal that never fires, for waits that are not tied to a page.
    pub fn never() -> Self {
        let (_, rx) = watch::channel(false);
        Self { rx }
    }

    pub fn is_cancelled(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolves once teardown has been triggered. Pends forever if the
    /// owner is dropped without triggering.
    pub async fn cancelled(&self) {
        let mut rx = self.rx.clone();
        if rx.wait_for(|torn_down| *torn_down).await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}

/// An element located by [`await_element`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Found {
    pub id: String,
    pub node: NodeId,
}

/// Run `check` now, then up to `max_attempts` more times spaced by `interval`.
pub async fn poll_until<T>(
    mut check: impl FnMut() -> Option<T>,
    interval: Duration,
    max_attempts: u32,
) -> Option<T> {
    if let Some(found) = check() {
        return Some(found);
    }
    for attempt in 1..=max_attempts {
        sleep(interval).await;
        if let Some(found) = check() {
            debug!(attempt, "poll_until satisfied");
            return Some(found);
        }
    }
    None
}

fn find_any<D: Dom>(dom: &D, ids: &[&str]) -> Option<Found> {
    ids.iter().find_map(|id| {
        dom.get_element_by_id(id).map(|node| Found { id: id.to_string(), node })
    })
}

/// Wait until any element with one of `ids` is attached.
///
/// # Arguments
///
/// * `dom` - the page to search; borrowed only between awaits
/// * `ids` - element ids to look for, any one of them satisfies the wait
/// * `strategy` - polling or mutation observing, with its limits
/// * `teardown` - stops the timer and the observer when the page goes away
///
/// # Returns
///
/// The first matching element, or `None` when the attempts or the timeout
/// run out or teardown fires first.
pub async fn await_element<D: Dom>(
    dom: &RefCell<D>,
    ids: &[&str],
    strategy: AwaitStrategy,
    teardown: &TeardownSignal,
) -> Option<Found> {
    if teardown.is_cancelled() {
        return None;
    }
    tokio::select! {
        biased;
        _ = teardown.cancelled() => {
            debug!("Teardown while waiting; timer and observer released");
            None
        }
        found = wait_for_element(dom, ids, strategy, teardown) => found,
    }
}

async fn wait_for_element<D: Dom>(
    dom: &RefCell<D>,
    ids: &[&str],
    strategy: AwaitStrategy,
    teardown: &TeardownSignal,
) -> Option<Found> {
    match strategy {
        AwaitStrategy::Poll { interval_ms, max_attempts } => {
            poll_until(
                || {
                    if teardown.is_cancelled() {
                        return None;
                    }
                    find_any(&*dom.borrow(), ids)
                },
                Duration::from_millis(interval_ms),
                max_attempts,
            )
            .await
        }
        AwaitStrategy::Observe { timeout_ms } => {
            // Subscribe before the first check so an insertion in between is not lost.
            let mut records = dom.borrow().observe_mutations();
            if let Some(found) = find_any(&*dom.borrow(), ids) {
                debug!(id = %found.id, "Element present immediately");
                return Some(found);
            }
            let deadline = Instant::now() + Duration::from_millis(timeout_ms);
            loop {
                match timeout_at(deadline, records.recv()).await {
                    Err(_) => return None,
                    Ok(Ok(_)) if teardown.is_cancelled() => return None,
                    Ok(Ok(record)) => {
                        let hit = ids.iter().any(|id| record.added_ids.iter().any(|a| a == id));
                        if hit {
                            if let Some(found) = find_any(&*dom.borrow(), ids) {
                                debug!(id = %found.id, "Element detected via mutation");
                                return Some(found);
                            }
                        }
                    }
                    Ok(Err(RecvError::Lagged(skipped))) => {
                        debug!(skipped, "Mutation records lagged; re-checking document");
                        if let Some(found) = find_any(&*dom.borrow(), ids) {
                            return Some(found);
                        }
                    }
                    Ok(Err(RecvError::Closed)) => return None,
                }
            }
        }
    }
}

/// Portals one ad slot into a container that appears asynchronously.
///
/// Mounts at most once per resolver, however many times it is asked, and
/// never after teardown.
#[derive(Debug)]
pub struct AdMountResolver {
    /// How the mount target is discovered.
    strategy: AwaitStrategy,
    /// Set by the first successful mount.
    mounted: Cell<bool>,
    /// Aborts a pending wait and blocks any later mount.
    teardown: TeardownSignal,
}

impl AdMountResolver {
    pub fn new(strategy: AwaitStrategy) -> Self {
        Self { strategy, mounted: Cell::new(false), teardown: TeardownSignal::never() }
    }

    /// Tie this resolver to a page's teardown.
    pub fn with_teardown(mut self, teardown: TeardownSignal) -> Self {
        self.teardown = teardown;
        self
    }

    pub fn is_mounted(&self) -> bool {
        self.mounted.get()
    }

    /// Wait for `target_id` and mount `slot` into it.
    ///
    /// # Arguments
    ///
    /// * `dom` - the page; the mutable borrow is taken only to mount
    /// * `target_id` - id of the container the article HTML provides
    /// * `slot` - the widget to mount
    /// * `queue` - vendor queues the widget pushes onto
    ///
    /// # Returns
    ///
    /// The mounted widget, or `None` when already mounted, torn down, or the
    /// target never appeared.
    #[instrument(level = "info", skip_all, fields(mount_target = %target_id, container = %slot.container_id))]
    pub async fn mount_into<D: Dom>(
        &self,
        dom: &RefCell<D>,
        target_id: &str,
        slot: &AdSlotDescriptor,
        queue: &dyn AdQueue,
    ) -> Option<MountedWidget> {
        if self.mounted.get() || self.teardown.is_cancelled() {
            return None;
        }
        let found = await_element(dom, &[target_id], self.strategy, &self.teardown).await;
        if self.teardown.is_cancelled() {
            debug!("Page torn down; slot not mounted");
            return None;
        }
        let Some(found) = found else {
            warn!(strategy = ?self.strategy, "Mount target never appeared; slot left empty");
            return None;
        };
        // Another call may have won while this one was waiting.
        if self.mounted.replace(true) {
            return None;
        }
        let widget = mount_widget(&mut *dom.borrow_mut(), found.node, slot, queue);
        if widget.is_some() {
            info!("Ad slot mounted");
        }
        widget
    }
}
