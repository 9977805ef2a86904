use std::collections::HashMap;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::instrument;

use crate::constants::{SPAM_MAX_USES, SPAM_WINDOW};

/// Stores above this many users get idle entries dropped on the next check.
const PRUNE_THRESHOLD: usize = 4096;

#[derive(Debug, Clone, Copy)]
struct TagCounter {
    count: u32,
    last_seen: Instant,
}

#[derive(Debug)]
struct UserCounters {
    last_activity: Instant,
    tags: HashMap<String, TagCounter>,
}

/// In-memory usage counters keyed by user, then by normalized tag.
///
/// Lost on restart.
#[derive(Debug, Default)]
pub struct SpamStore {
    users: HashMap<String, UserCounters>,
}

impl SpamStore {
    /// Records one use of `tag` by `user_id` at `now` and returns the use count inside the
    /// current window.
    fn record(&mut self, user_id: &str, tag: &str, now: Instant, window: Duration) -> u32 {
        let user = self
            .users
            .entry(user_id.to_string())
            .or_insert_with(|| UserCounters {
                last_activity: now,
                tags: HashMap::new(),
            });

        // lazily forget everything once the user has been idle for a full window
        if now.saturating_duration_since(user.last_activity) > window {
            user.tags.clear();
        }
        user.last_activity = now;

        let counter = user.tags.entry(tag.to_string()).or_insert(TagCounter {
            count: 0,
            last_seen: now,
        });

        if now.saturating_duration_since(counter.last_seen) > window {
            counter.count = 0;
        }

        counter.count = counter.count.saturating_add(1);
        counter.last_seen = now;
        counter.count
    }

    /// Takes back one use of `tag`, leaving timestamps untouched.
    fn release(&mut self, user_id: &str, tag: &str) {
        let counter = self
            .users
            .get_mut(user_id)
            .and_then(|user| user.tags.get_mut(tag));

        if let Some(counter) = counter {
            counter.count = counter.count.saturating_sub(1);
        }
    }

    fn prune_idle(&mut self, now: Instant, window: Duration) {
        self.users
            .retain(|_, user| now.saturating_duration_since(user.last_activity) <= window);
    }

    pub fn len(&self) -> usize {
        self.users.len()
    }
}

/// Soft per-user rate limiting for repeated tags.
///
/// A single coarse lock guards the store; the critical section never awaits.
#[derive(Debug)]
pub struct SpamGuard {
    window: Duration,
    max_uses: u32,
    store: Mutex<SpamStore>,
}

impl SpamGuard {
    pub fn new(window: Duration, max_uses: u32) -> Self {
        Self {
            window,
            max_uses,
            store: Mutex::new(SpamStore::default()),
        }
    }

    /// Records a use of `tag` by `user_id`, returning `true` when this use exceeds the allowance
    /// and should contribute nothing.
    pub async fn should_suppress(&self, user_id: &str, tag: &str) -> bool {
        self.should_suppress_at(user_id, tag, Instant::now()).await
    }

    #[instrument(skip(self, now))]
    pub async fn should_suppress_at(&self, user_id: &str, tag: &str, now: Instant) -> bool {
        let mut store = self.store.lock().await;
        if store.len() > PRUNE_THRESHOLD {
            store.prune_idle(now, self.window);
        }

        let uses = store.record(user_id, tag, now, self.window);
        let suppressed = uses > self.max_uses;
        if suppressed {
            tracing::warn!(user = user_id, tag, uses, "suppressing repeated tag");
        }

        suppressed
    }

    /// Returns the uses of `tags` recorded for a message that ended up earning nothing.
    #[instrument(skip(self))]
    pub async fn release(&self, user_id: &str, tags: &[String]) {
        let mut store = self.store.lock().await;
        for tag in tags {
            store.release(user_id, tag);
        }
    }

    #[cfg(test)]
    async fn tracked_users(&self) -> usize {
        self.store.lock().await.len()
    }
}

impl Default for SpamGuard {
    fn default() -> Self {
        Self::new(SPAM_WINDOW, SPAM_MAX_USES)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_fourth_use_is_suppressed() {
        let guard = SpamGuard::default();

        for _ in 0..3 {
            assert!(!guard.should_suppress("u1", "aporte").await);
            tokio::time::advance(Duration::from_secs(30)).await;
        }

        assert!(guard.should_suppress("u1", "aporte").await);
        assert!(guard.should_suppress("u1", "aporte").await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_counters_are_per_user_and_tag() {
        let guard = SpamGuard::default();

        for _ in 0..3 {
            guard.should_suppress("u1", "aporte").await;
        }

        assert!(!guard.should_suppress("u2", "aporte").await);
        assert!(!guard.should_suppress("u1", "critica").await);
        assert!(guard.should_suppress("u1", "aporte").await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_idle_user_resets() {
        let guard = SpamGuard::default();

        for _ in 0..4 {
            guard.should_suppress("u1", "aporte").await;
        }
        assert!(guard.should_suppress("u1", "aporte").await);

        tokio::time::advance(SPAM_WINDOW + Duration::from_secs(1)).await;

        assert!(!guard.should_suppress("u1", "aporte").await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_idle_user_resets_every_tag() {
        let guard = SpamGuard::default();

        for tag in ["aporte", "critica"] {
            for _ in 0..3 {
                guard.should_suppress("u1", tag).await;
            }
            assert!(guard.should_suppress("u1", tag).await);
        }

        tokio::time::advance(SPAM_WINDOW + Duration::from_secs(1)).await;

        for tag in ["aporte", "critica"] {
            for _ in 0..3 {
                assert!(!guard.should_suppress("u1", tag).await, "{tag}");
            }
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_exact_window_edge_still_counts() {
        let guard = SpamGuard::default();

        for _ in 0..3 {
            guard.should_suppress("u1", "aporte").await;
        }

        tokio::time::advance(SPAM_WINDOW).await;
        assert!(guard.should_suppress("u1", "aporte").await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_release_gives_back_a_use() {
        let guard = SpamGuard::default();
        let tags = vec!["aporte".to_string()];

        for _ in 0..3 {
            guard.should_suppress("u1", "aporte").await;
        }
        guard.release("u1", &tags).await;

        assert!(!guard.should_suppress("u1", "aporte").await);
        assert!(guard.should_suppress("u1", "aporte").await);

        // unknown users and tags are a no-op
        guard.release("u2", &tags).await;
        guard.release("u1", &["critica".to_string()]).await;
        assert_eq!(guard.tracked_users().await, 1);
    }

    #[tokio::test]
    async fn test_explicit_timestamps() {
        let guard = SpamGuard::new(Duration::from_secs(10), 1);
        let start = Instant::now();

        assert!(!guard.should_suppress_at("u1", "x", start).await);
        assert!(
            guard
                .should_suppress_at("u1", "x", start + Duration::from_secs(5))
                .await
        );
        assert!(
            !guard
                .should_suppress_at("u1", "x", start + Duration::from_secs(16))
                .await
        );
        assert_eq!(guard.tracked_users().await, 1);
    }
}
