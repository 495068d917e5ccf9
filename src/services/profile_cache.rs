use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use uuid::Uuid;

use crate::models::profile::Profile;

#[derive(Debug, Clone)]
struct CachedProfile {
    loaded_at: Instant,
    profile: Profile,
}

type Slot = Arc<tokio::sync::Mutex<Option<CachedProfile>>>;

/// Per-user profile cache. Loads for the same user id are serialised, so a
/// burst of concurrent requests issues a single profile query.
#[derive(Clone)]
pub struct ProfileCache {
    ttl: Duration,
    slots: Arc<Mutex<HashMap<Uuid, Slot>>>,
}

impl ProfileCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            slots: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    fn slot(&self, user_id: Uuid) -> Slot {
        let mut slots = self.slots.lock().expect("profile cache mutex poisoned");
        slots.entry(user_id).or_default().clone()
    }

    pub async fn get_or_load<F, Fut>(&self, user_id: Uuid, load: F) -> Profile
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Profile>,
    {
        let slot = self.slot(user_id);
        let mut guard = slot.lock().await;
        if let Some(cached) = guard.as_ref() {
            if cached.loaded_at.elapsed() < self.ttl {
                return cached.profile.clone();
            }
        }

        let profile = load().await;
        *guard = Some(CachedProfile {
            loaded_at: Instant::now(),
            profile: profile.clone(),
        });
        profile
    }

    pub fn invalidate(&self, user_id: Uuid) {
        let mut slots = self.slots.lock().expect("profile cache mutex poisoned");
        slots.remove(&user_id);
    }

    pub fn len(&self) -> usize {
        self.slots.lock().expect("profile cache mutex poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn concurrent_loads_for_one_user_run_once() {
        let cache = ProfileCache::new(Duration::from_secs(30));
        let calls = Arc::new(AtomicUsize::new(0));
        let user = Uuid::new_v4();

        let load = |calls: Arc<AtomicUsize>| async move {
            calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(20)).await;
            Profile::minimal(user, "a@b.pt")
        };

        let (a, b) = tokio::join!(
            cache.get_or_load(user, || load(calls.clone())),
            cache.get_or_load(user, || load(calls.clone())),
        );
        assert_eq!(a.id, b.id);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn invalidation_forces_a_reload() {
        let cache = ProfileCache::new(Duration::from_secs(30));
        let user = Uuid::new_v4();
        let first = cache
            .get_or_load(user, || async { Profile::minimal(user, "old@b.pt") })
            .await;
        assert_eq!(first.email, "old@b.pt");

        cache.invalidate(user);
        assert!(cache.is_empty());
        let second = cache
            .get_or_load(user, || async { Profile::minimal(user, "new@b.pt") })
            .await;
        assert_eq!(second.email, "new@b.pt");
    }

    #[tokio::test]
    async fn expired_entries_reload() {
        let cache = ProfileCache::new(Duration::from_millis(0));
        let user = Uuid::new_v4();
        cache
            .get_or_load(user, || async { Profile::minimal(user, "one@b.pt") })
            .await;
        let again = cache
            .get_or_load(user, || async { Profile::minimal(user, "two@b.pt") })
            .await;
        assert_eq!(again.email, "two@b.pt");
    }
}
