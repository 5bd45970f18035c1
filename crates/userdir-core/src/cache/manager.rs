use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::models::User;

use super::store::KeyValueStore;

/// The one key the user collection is cached under, for both the list
/// path and locally added users.
pub const USERS_KEY: &str = "users";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CachedData<T> {
    pub data: T,
    pub cached_at: DateTime<Utc>,
}

impl<T> CachedData<T> {
    pub fn new(data: T) -> Self {
        Self {
            data,
            cached_at: Utc::now(),
        }
    }

    pub fn age_minutes(&self) -> i64 {
        let now = Utc::now();
        (now - self.cached_at).num_minutes()
    }

    pub fn age_display(&self) -> String {
        let minutes = self.age_minutes();
        if minutes < 1 {
            // Also covers clock skew (negative ages)
            "just now".to_string()
        } else if minutes < 60 {
            format!("{}m ago", minutes)
        } else if minutes < 1440 {
            let hours = minutes / 60;
            if minutes % 60 >= 30 {
                // Round up: 1h 30m+ becomes 2h
                format!("{}h ago", hours + 1)
            } else {
                format!("{}h ago", hours)
            }
        } else {
            let days = minutes / 1440;
            if (minutes % 1440) / 60 >= 12 {
                // Round up: 1d 12h+ becomes 2d
                format!("{}d ago", days + 1)
            } else {
                format!("{}d ago", days)
            }
        }
    }
}

/// Shapes accepted under the users key
#[derive(Deserialize)]
#[serde(untagged)]
enum StoredUsers {
    Stamped(CachedData<Vec<User>>),
    Bare(Vec<User>),
}

/// Typed JSON cache over an injected [`KeyValueStore`].
pub struct UserCache {
    store: Box<dyn KeyValueStore>,
}

impl UserCache {
    pub fn new(store: Box<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    fn save<T: Serialize>(&mut self, key: &str, data: &T) -> Result<()> {
        let cached = CachedData::new(data);
        let contents = serde_json::to_vec_pretty(&cached)?;
        self.store.set(key, &contents)?;
        debug!(key, bytes = contents.len(), "Cache entry written");
        Ok(())
    }

    /// Read the cached collection. A bare JSON array of users is accepted
    /// too and treated as written just now.
    pub fn load_users(&self) -> Result<Option<CachedData<Vec<User>>>> {
        let Some(bytes) = self.store.get(USERS_KEY)? else {
            return Ok(None);
        };

        let stored: StoredUsers = serde_json::from_slice(&bytes)
            .with_context(|| format!("Failed to parse cache entry: {}", USERS_KEY))?;

        Ok(Some(match stored {
            StoredUsers::Stamped(cached) => cached,
            StoredUsers::Bare(users) => CachedData::new(users),
        }))
    }

    pub fn save_users(&mut self, users: &[User]) -> Result<()> {
        self.save(USERS_KEY, &users)
    }

    /// Drop the cached collection so the next load goes to the remote.
    pub fn invalidate_users(&mut self) -> Result<()> {
        self.store.remove(USERS_KEY)
    }

    /// Wipe everything in the underlying store.
    pub fn clear(&mut self) -> Result<()> {
        self.store.clear()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::store::MemoryStore;
    use chrono::Duration;

    fn user(id: u64, name: &str) -> User {
        serde_json::from_value(serde_json::json!({
            "id": id, "name": name, "email": "e@x", "phone": "1"
        }))
        .unwrap()
    }

    #[test]
    fn test_cached_data_age_display_just_now() {
        let cached = CachedData::new(vec![1, 2, 3]);
        assert_eq!(cached.age_display(), "just now");
    }

    #[test]
    fn test_cached_data_age_display_rounding() {
        let mut cached = CachedData::new(());
        cached.cached_at = Utc::now() - Duration::minutes(5);
        assert_eq!(cached.age_display(), "5m ago");

        cached.cached_at = Utc::now() - Duration::minutes(95);
        assert_eq!(cached.age_display(), "2h ago");

        cached.cached_at = Utc::now() - Duration::minutes(65);
        assert_eq!(cached.age_display(), "1h ago");

        cached.cached_at = Utc::now() - Duration::hours(36);
        assert_eq!(cached.age_display(), "2d ago");

        // Clock skew
        cached.cached_at = Utc::now() + Duration::minutes(10);
        assert_eq!(cached.age_display(), "just now");
    }

    #[test]
    fn test_user_cache_roundtrip_preserves_order() {
        let mut cache = UserCache::new(Box::new(MemoryStore::new()));
        assert!(cache.load_users().unwrap().is_none());

        let users = vec![user(3, "C"), user(1, "A"), user(2, "B")];
        cache.save_users(&users).unwrap();

        let cached = cache.load_users().unwrap().expect("cached users");
        assert_eq!(cached.data, users);
    }

    #[test]
    fn test_user_cache_invalidate() {
        let mut cache = UserCache::new(Box::new(MemoryStore::new()));
        cache.save_users(&[user(1, "A")]).unwrap();
        cache.invalidate_users().unwrap();
        assert!(cache.load_users().unwrap().is_none());
    }

    #[test]
    fn test_user_cache_corrupt_entry_is_an_error() {
        let mut store = MemoryStore::new();
        store.set(USERS_KEY, b"not json").unwrap();
        let cache = UserCache::new(Box::new(store));
        assert!(cache.load_users().is_err());
    }

    #[test]
    fn test_user_cache_accepts_bare_array() {
        let mut store = MemoryStore::new();
        let users = vec![user(2, "B"), user(1, "A")];
        store
            .set(USERS_KEY, &serde_json::to_vec(&users).unwrap())
            .unwrap();

        let cache = UserCache::new(Box::new(store));
        let cached = cache.load_users().unwrap().expect("cached users");
        assert_eq!(cached.data, users);
        assert_eq!(cached.age_display(), "just now");
    }
}
