//! Notification lifecycle management.
//!
//! `NotificationQueue` owns the ordered set of active notifications. Each entry
//! gets its own expiry task; whichever of expiry or manual dismissal happens
//! first removes the entry, and the other becomes a no-op.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::AbortHandle;
use tracing::debug;

use super::notification::{Kind, Notification, NotificationId};

/// How long a notification stays visible unless a ttl is given.
pub const DEFAULT_TTL: Duration = Duration::from_millis(5000);

/// Deadline used when a ttl overflows the clock; such entries only leave by
/// dismissal.
const FAR_FUTURE: Duration = Duration::from_secs(86_400 * 365 * 30);

/// Cheaply cloneable handle to a shared notification queue.
///
/// Pushing requires a running Tokio runtime, which drives the expiry timers.
#[derive(Clone)]
pub struct NotificationQueue {
    shared: Arc<Shared>,
}

struct Shared {
    default_ttl: Duration,
    entries: Mutex<Entries>,
    /// Bumped after every mutation of `entries`.
    revision: watch::Sender<u64>,
}

#[derive(Default)]
struct Entries {
    /// Oldest first
    active: Vec<Notification>,
    timers: HashMap<NotificationId, AbortHandle>,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, Entries> {
        self.entries.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn bump(&self) {
        self.revision.send_modify(|rev| *rev = rev.wrapping_add(1));
    }

    /// Remove an entry if it is still active. The expiry task aborts its
    /// pending timer only when `cancel_timer` is set.
    fn remove(&self, id: NotificationId, cancel_timer: bool) -> bool {
        let removed = {
            let mut entries = self.lock();
            if let Some(timer) = entries.timers.remove(&id) {
                if cancel_timer {
                    timer.abort();
                }
            }
            match entries.active.iter().position(|n| n.id() == id) {
                Some(pos) => {
                    entries.active.remove(pos);
                    true
                }
                None => false,
            }
        };

        if removed {
            self.bump();
        }
        removed
    }
}

impl Drop for Shared {
    fn drop(&mut self) {
        let entries = self.entries.get_mut().unwrap_or_else(|e| e.into_inner());
        for (_, timer) in entries.timers.drain() {
            timer.abort();
        }
    }
}

impl NotificationQueue {
    pub fn new() -> Self {
        Self::with_default_ttl(DEFAULT_TTL)
    }

    pub fn with_default_ttl(default_ttl: Duration) -> Self {
        let default_ttl = if default_ttl.is_zero() { DEFAULT_TTL } else { default_ttl };
        let (revision, _) = watch::channel(0);
        Self {
            shared: Arc::new(Shared {
                default_ttl,
                entries: Mutex::new(Entries::default()),
                revision,
            }),
        }
    }

    pub fn default_ttl(&self) -> Duration {
        self.shared.default_ttl
    }

    // =========================================================================
    // Mutations
    // =========================================================================

    /// Append a notification that expires after the default ttl.
    pub fn push(&self, kind: Kind, message: impl Into<String>) -> NotificationId {
        self.push_with_ttl(kind, message, self.shared.default_ttl)
    }

    /// Append a notification that expires after `ttl`. A zero ttl falls back
    /// to the default.
    ///
    /// Identical messages are not coalesced; every call gets its own entry.
    pub fn push_with_ttl(
        &self,
        kind: Kind,
        message: impl Into<String>,
        ttl: Duration,
    ) -> NotificationId {
        let ttl = if ttl.is_zero() { self.shared.default_ttl } else { ttl };
        let notification = Notification::new(kind, message.into(), ttl);
        let id = notification.id();
        let now = tokio::time::Instant::now();
        let deadline = now.checked_add(ttl).unwrap_or(now + FAR_FUTURE);

        {
            let mut entries = self.shared.lock();
            entries.active.push(notification);

            // The timer cannot observe the entry before its handle is stored:
            // removal takes the same lock.
            let shared = Arc::downgrade(&self.shared);
            let timer = tokio::spawn(async move {
                tokio::time::sleep_until(deadline).await;
                if let Some(shared) = shared.upgrade() {
                    if shared.remove(id, false) {
                        debug!(%id, "Notification expired");
                    }
                }
            });
            entries.timers.insert(id, timer.abort_handle());
        }

        self.shared.bump();
        debug!(%id, kind = kind.label(), ttl_ms = ttl.as_millis() as u64, "Notification pushed");
        id
    }

    pub fn success(&self, message: impl Into<String>) -> NotificationId {
        self.push(Kind::Success, message)
    }

    pub fn error(&self, message: impl Into<String>) -> NotificationId {
        self.push(Kind::Error, message)
    }

    pub fn info(&self, message: impl Into<String>) -> NotificationId {
        self.push(Kind::Info, message)
    }

    pub fn warning(&self, message: impl Into<String>) -> NotificationId {
        self.push(Kind::Warning, message)
    }

    /// Remove a notification now and cancel its timer.
    ///
    /// Returns `false` if it was already gone (expired or dismissed); that is
    /// not an error.
    pub fn dismiss(&self, id: NotificationId) -> bool {
        let removed = self.shared.remove(id, true);
        if removed {
            debug!(%id, "Notification dismissed");
        }
        removed
    }

    /// Remove every notification and cancel all timers.
    pub fn clear(&self) {
        let had_entries = {
            let mut entries = self.shared.lock();
            for (_, timer) in entries.timers.drain() {
                timer.abort();
            }
            let had_entries = !entries.active.is_empty();
            entries.active.clear();
            had_entries
        };

        if had_entries {
            self.shared.bump();
        }
    }

    // =========================================================================
    // Reads
    // =========================================================================

    /// Active notifications, oldest first.
    pub fn list(&self) -> Vec<Notification> {
        self.shared.lock().active.clone()
    }

    pub fn len(&self) -> usize {
        self.shared.lock().active.len()
    }

    pub fn is_empty(&self) -> bool {
        self.shared.lock().active.is_empty()
    }

    pub fn oldest(&self) -> Option<NotificationId> {
        self.shared.lock().active.first().map(Notification::id)
    }

    /// Receiver marked changed after every insertion or removal.
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.shared.revision.subscribe()
    }

    pub fn revision(&self) -> u64 {
        *self.shared.revision.borrow()
    }
}

impl Default for NotificationQueue {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use tokio::time::sleep;

    fn ids(queue: &NotificationQueue) -> Vec<NotificationId> {
        queue.list().iter().map(Notification::id).collect()
    }

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    #[tokio::test(start_paused = true)]
    async fn test_push_is_visible_immediately_and_expires_after_default_ttl() {
        let queue = NotificationQueue::new();
        queue.push(Kind::Error, "Connection failed");

        let list = queue.list();
        assert_eq!(list.len(), 1);
        assert_eq!(list[0].kind(), Kind::Error);
        assert_eq!(list[0].message(), "Connection failed");
        assert_eq!(list[0].ttl(), DEFAULT_TTL);

        sleep(ms(4999)).await;
        assert_eq!(queue.len(), 1);

        sleep(ms(2)).await;
        assert!(queue.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_identical_messages_are_separate_entries() {
        let queue = NotificationQueue::new();
        let first = queue.info("Sync started");
        let second = queue.info("Sync started");

        assert_ne!(first, second);
        assert_eq!(ids(&queue), vec![first, second]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_insertion_order_survives_out_of_order_removal() {
        let queue = NotificationQueue::new();
        let a = queue.push_with_ttl(Kind::Info, "a", ms(300));
        let b = queue.push_with_ttl(Kind::Info, "b", ms(100));
        let c = queue.push_with_ttl(Kind::Info, "c", ms(200));
        let d = queue.push_with_ttl(Kind::Info, "d", ms(400));
        assert_eq!(ids(&queue), vec![a, b, c, d]);

        sleep(ms(150)).await;
        assert_eq!(ids(&queue), vec![a, c, d]);

        queue.dismiss(d);
        assert_eq!(ids(&queue), vec![a, c]);

        sleep(ms(100)).await;
        assert_eq!(ids(&queue), vec![a]);

        sleep(ms(100)).await;
        assert!(queue.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_dismiss_then_timer_elapses_removes_once() {
        let queue = NotificationQueue::new();
        let id = queue.success("Saved");

        let mut changes = queue.subscribe();
        changes.borrow_and_update();

        assert!(queue.dismiss(id));
        assert!(queue.is_empty());
        assert!(changes.has_changed().unwrap());
        changes.borrow_and_update();

        // Well past the first deadline: no second removal signal
        sleep(DEFAULT_TTL * 2).await;
        assert!(!changes.has_changed().unwrap());
        assert!(!queue.dismiss(id));
    }

    #[tokio::test(start_paused = true)]
    async fn test_huge_ttl_stays_until_dismissed() {
        let queue = NotificationQueue::new();
        let id = queue.push_with_ttl(Kind::Info, "forever", Duration::MAX);
        assert_eq!(queue.list()[0].ttl(), Duration::MAX);

        sleep(Duration::from_secs(86_400 * 365)).await;
        assert_eq!(ids(&queue), vec![id]);

        assert!(queue.dismiss(id));
        assert!(queue.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_dismiss_after_expiry_is_a_noop() {
        let queue = NotificationQueue::new();
        let id = queue.push_with_ttl(Kind::Warning, "Quota at 90%", ms(50));
        let keep = queue.push_with_ttl(Kind::Info, "still here", ms(500));

        sleep(ms(60)).await;
        assert!(!queue.dismiss(id));
        assert_eq!(ids(&queue), vec![keep]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_ttl_uses_default() {
        let queue = NotificationQueue::with_default_ttl(ms(1000));
        queue.push_with_ttl(Kind::Info, "zero", Duration::ZERO);
        assert_eq!(queue.list()[0].ttl(), ms(1000));

        sleep(ms(999)).await;
        assert_eq!(queue.len(), 1);
        sleep(ms(2)).await;
        assert!(queue.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_clear_cancels_all_timers() {
        let queue = NotificationQueue::new();
        for i in 0..3 {
            queue.info(format!("message {i}"));
        }
        let mut changes = queue.subscribe();
        changes.borrow_and_update();

        queue.clear();
        assert!(queue.is_empty());
        assert!(changes.has_changed().unwrap());
        changes.borrow_and_update();

        sleep(DEFAULT_TTL * 2).await;
        assert!(!changes.has_changed().unwrap());
    }

    #[tokio::test(start_paused = true)]
    async fn test_revision_advances_on_every_change() {
        let queue = NotificationQueue::new();
        let start = queue.revision();

        let id = queue.error("boom");
        assert_eq!(queue.revision(), start + 1);
        queue.dismiss(id);
        assert_eq!(queue.revision(), start + 2);
        queue.dismiss(id);
        assert_eq!(queue.revision(), start + 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_oldest() {
        let queue = NotificationQueue::new();
        assert_eq!(queue.oldest(), None);
        let first = queue.info("first");
        queue.info("second");
        assert_eq!(queue.oldest(), Some(first));
    }

    #[tokio::test(start_paused = true)]
    async fn test_clones_share_state() {
        let queue = NotificationQueue::new();
        let handle = queue.clone();
        let id = handle.success("from clone");
        assert_eq!(ids(&queue), vec![id]);
        assert!(queue.dismiss(id));
        assert!(handle.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropping_queue_closes_change_feed() {
        let queue = NotificationQueue::new();
        queue.info("pending");
        let mut changes = queue.subscribe();
        drop(queue);

        assert!(changes.changed().await.is_err());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_pushes_keep_per_caller_order() {
        let queue = NotificationQueue::with_default_ttl(Duration::from_secs(60));

        let mut tasks = Vec::new();
        for worker in 0..8 {
            let queue = queue.clone();
            tasks.push(tokio::spawn(async move {
                (0..50)
                    .map(|i| queue.info(format!("{worker}-{i}")))
                    .collect::<Vec<_>>()
            }));
        }

        let mut pushed = Vec::new();
        for task in tasks {
            pushed.push(task.await.unwrap());
        }

        let listed = ids(&queue);
        assert_eq!(listed.len(), 400);
        assert_eq!(listed.iter().collect::<HashSet<_>>().len(), 400);

        for own in pushed {
            let positions: Vec<usize> = own
                .iter()
                .map(|id| listed.iter().position(|l| l == id).unwrap())
                .collect();
            assert!(positions.windows(2).all(|w| w[0] < w[1]));
        }
    }
}
