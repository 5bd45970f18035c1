//! The user collection manager.
//!
//! `UserDirectory` owns the session's ordered user list. Reads go to the
//! cache first and the remote source only on a miss; every mutation is
//! written through to the cache under the single `users` key.

use anyhow::Result;
use chrono::{DateTime, Utc};
use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};

use crate::api::UserSource;
use crate::cache::{CachedData, KeyValueStore, UserCache};
use crate::models::{NewUser, User, UserId, ValidationError};

use super::events::{DirectoryEvent, EventBus, Notice};

/// Prompt shown before a user is removed
pub const DELETE_PROMPT: &str = "Are you sure you want to delete this user?";

/// Outcome of the cache check at the start of a load.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadPlan {
    /// Served from the cache; loading is done
    Cached(usize),
    /// Cache missed; the caller must fetch the list and call `finish_load`
    FetchRemote,
}

/// Asks the operator to approve a destructive action.
pub trait Confirm {
    fn confirm(&self, prompt: &str) -> bool;
}

impl<F: Fn(&str) -> bool> Confirm for F {
    fn confirm(&self, prompt: &str) -> bool {
        self(prompt)
    }
}

/// A pending deletion. Dropping it declines.
#[derive(Debug, Clone, PartialEq, Eq)]
#[must_use = "a delete request does nothing until confirmed"]
pub struct DeleteRequest {
    id: UserId,
    name: String,
}

impl DeleteRequest {
    pub fn id(&self) -> UserId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn prompt(&self) -> &'static str {
        DELETE_PROMPT
    }

    pub fn cancel(self) {
        debug!(id = self.id, "Delete declined");
    }
}

pub struct UserDirectory {
    cache: UserCache,
    users: Vec<User>,
    loading: bool,
    /// Set once the collection came from the cache or the remote. Until
    /// then nothing is written back.
    loaded: bool,
    /// Local edits made while a fetch is in flight, replayed onto its result
    added_while_loading: Vec<User>,
    removed_while_loading: Vec<UserId>,
    cached_at: Option<DateTime<Utc>>,
    events: EventBus,
}

impl UserDirectory {
    pub fn new(cache: UserCache) -> Self {
        Self {
            cache,
            users: Vec::new(),
            loading: true,
            loaded: false,
            added_while_loading: Vec::new(),
            removed_while_loading: Vec::new(),
            cached_at: None,
            events: EventBus::new(),
        }
    }

    pub fn with_store(store: Box<dyn KeyValueStore>) -> Self {
        Self::new(UserCache::new(store))
    }

    // =========================================================================
    // State
    // =========================================================================

    pub fn users(&self) -> &[User] {
        &self.users
    }

    pub fn get(&self, id: UserId) -> Option<&User> {
        self.users.iter().find(|u| u.id == id)
    }

    pub fn len(&self) -> usize {
        self.users.len()
    }

    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    pub fn subscribe(&self) -> broadcast::Receiver<DirectoryEvent> {
        self.events.subscribe()
    }

    /// How long ago the collection was last written to the cache
    pub fn cache_age(&self) -> String {
        match self.cached_at {
            Some(cached_at) => CachedData {
                data: (),
                cached_at,
            }
            .age_display(),
            None => "never".to_string(),
        }
    }

    // =========================================================================
    // Loading
    // =========================================================================

    /// Start a load: adopt the cached collection if there is one.
    ///
    /// An unreadable cache entry is treated as a miss.
    pub fn begin_load(&mut self) -> LoadPlan {
        self.loading = true;

        match self.cache.load_users() {
            Ok(Some(cached)) => {
                let count = cached.data.len();
                debug!(count, "Loaded users from cache");
                self.users = cached.data;
                self.cached_at = Some(cached.cached_at);
                self.loading = false;
                self.loaded = true;
                self.events.publish(DirectoryEvent::Loaded {
                    count,
                    from_cache: true,
                });
                LoadPlan::Cached(count)
            }
            Ok(None) => {
                debug!("No cached users");
                LoadPlan::FetchRemote
            }
            Err(e) => {
                warn!(error = %e, "Failed to read cached users, fetching instead");
                LoadPlan::FetchRemote
            }
        }
    }

    /// Settle a load with the result of the remote list call.
    ///
    /// Returns false (and changes nothing) if no load is pending, so a
    /// late or duplicate result cannot flip the loading flag twice.
    /// Adds and deletes made while the fetch ran are applied on top of the
    /// remote list.
    pub fn finish_load(&mut self, result: Result<Vec<User>>) -> bool {
        if !self.loading {
            debug!("Ignoring list result, no load pending");
            return false;
        }

        match result {
            Ok(mut users) => {
                info!(count = users.len(), "Fetched users from remote");
                users.retain(|u| !self.removed_while_loading.contains(&u.id));
                for added in self.added_while_loading.drain(..) {
                    if !users.iter().any(|u| u.id == added.id) {
                        users.push(added);
                    }
                }

                let count = users.len();
                self.users = users;
                self.loaded = true;
                self.persist();
                self.events.publish(DirectoryEvent::Loaded {
                    count,
                    from_cache: false,
                });
            }
            Err(e) => {
                error!(error = %e, "Failed to fetch users");
                self.events.publish(DirectoryEvent::Notice(Notice::LoadFailed));
            }
        }

        self.added_while_loading.clear();
        self.removed_while_loading.clear();
        self.loading = false;
        true
    }

    /// Cache check, then the remote fetch on a miss.
    pub async fn load(&mut self, source: &dyn UserSource) -> LoadPlan {
        let plan = self.begin_load();
        if plan == LoadPlan::FetchRemote {
            let result = source.list_users().await;
            self.finish_load(result);
        }
        plan
    }

    /// Forget the cached collection and start a fresh remote load.
    /// The current list stays visible until the fetch settles.
    pub fn begin_reload(&mut self) -> LoadPlan {
        if let Err(e) = self.cache.invalidate_users() {
            warn!(error = %e, "Failed to invalidate cached users");
        }
        self.cached_at = None;
        self.begin_load()
    }

    // =========================================================================
    // Mutations
    // =========================================================================

    /// Validate and append a locally created user.
    ///
    /// Rejected input publishes a validation notice and leaves the
    /// collection untouched.
    pub fn add_user(&mut self, name: &str, email: &str, phone: &str) -> Result<User, ValidationError> {
        match NewUser::parse(name, email, phone) {
            Ok(new_user) => Ok(self.add_new_user(new_user)),
            Err(e) => {
                debug!(missing = ?e.missing_fields(), "Rejected new user");
                self.events
                    .publish(DirectoryEvent::Notice(Notice::Validation(e.clone())));
                Err(e)
            }
        }
    }

    /// Append already-validated input. Local only: nothing is sent remotely.
    pub fn add_new_user(&mut self, new_user: NewUser) -> User {
        let user = User::from_new(self.next_id(), new_user);
        info!(id = user.id, name = %user.name, "Added user");

        if self.loading {
            self.added_while_loading.push(user.clone());
        }
        self.users.push(user.clone());
        self.persist();
        self.events.publish(DirectoryEvent::UserAdded(user.clone()));
        user
    }

    /// Begin deleting `id`. `None` if no such user is listed.
    pub fn request_delete(&self, id: UserId) -> Option<DeleteRequest> {
        self.get(id).map(|user| DeleteRequest {
            id,
            name: user.name.clone(),
        })
    }

    pub fn confirm_delete(&mut self, request: DeleteRequest) -> Option<User> {
        self.remove_user(request.id)
    }

    /// Ask `confirm` first, then remove `id` if approved. Approving the
    /// delete of an absent id is a no-op.
    pub fn delete_user(&mut self, id: UserId, confirm: &dyn Confirm) -> Option<User> {
        if !confirm.confirm(DELETE_PROMPT) {
            debug!(id, "Delete declined");
            return None;
        }
        self.remove_user(id)
    }

    /// Remove the first user with `id`, keeping the order of the rest.
    /// Removing an absent id is a no-op.
    pub fn remove_user(&mut self, id: UserId) -> Option<User> {
        let Some(index) = self.users.iter().position(|u| u.id == id) else {
            debug!(id, "Delete of absent user ignored");
            return None;
        };

        let removed = self.users.remove(index);
        if self.loading {
            match self.added_while_loading.iter().position(|u| u.id == id) {
                Some(pending) => {
                    self.added_while_loading.remove(pending);
                }
                None => self.removed_while_loading.push(id),
            }
        }
        info!(id, name = %removed.name, "Removed user");
        self.persist();
        self.events.publish(DirectoryEvent::UserRemoved(id));
        Some(removed)
    }

    // =========================================================================
    // Helpers
    // =========================================================================

    /// Write the whole collection through to the cache. Failures are logged.
    ///
    /// Skipped until a load has succeeded, so a failed fetch followed by an
    /// add cannot leave a cache entry that hides the remote list.
    fn persist(&mut self) {
        if !self.loaded {
            debug!(count = self.users.len(), "No successful load yet, not caching");
            return;
        }
        match self.cache.save_users(&self.users) {
            Ok(()) => self.cached_at = Some(Utc::now()),
            Err(e) => warn!(error = %e, "Failed to cache users"),
        }
    }

    /// Wall-clock milliseconds, bumped past every listed id so ids keep
    /// increasing even when two users are added within one millisecond.
    fn next_id(&self) -> UserId {
        let now = u64::try_from(Utc::now().timestamp_millis()).unwrap_or(0);
        let floor = self
            .users
            .iter()
            .map(|u| u.id)
            .max()
            .map_or(0, |max| max.saturating_add(1));
        now.max(floor)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{FileStore, MemoryStore, USERS_KEY};
    use crate::test_support::{sample_user, ScriptedSource};

    fn leanne() -> User {
        User {
            id: 1,
            name: "Leanne Graham".to_string(),
            username: None,
            email: "Sincere@april.biz".to_string(),
            address: None,
            phone: "1-770-736-8031-5596".to_string(),
            website: None,
            company: None,
        }
    }

    fn memory_directory() -> UserDirectory {
        UserDirectory::with_store(Box::new(MemoryStore::new()))
    }

    fn seeded(users: Vec<User>) -> UserDirectory {
        let mut cache = UserCache::new(Box::new(MemoryStore::new()));
        cache.save_users(&users).unwrap();
        let mut directory = UserDirectory::new(cache);
        assert_eq!(directory.begin_load(), LoadPlan::Cached(users.len()));
        directory
    }

    fn cached_users(directory: &UserDirectory) -> Vec<User> {
        directory
            .cache
            .load_users()
            .unwrap()
            .map(|c| c.data)
            .unwrap_or_default()
    }

    // ===== Loading =====

    #[tokio::test]
    async fn test_load_from_remote_populates_cache() {
        let source = ScriptedSource::with_users(vec![leanne()]);
        let mut directory = memory_directory();
        let mut events = directory.subscribe();
        assert!(directory.is_loading());

        let plan = directory.load(&source).await;

        assert_eq!(plan, LoadPlan::FetchRemote);
        assert!(!directory.is_loading());
        assert_eq!(directory.users(), &[leanne()]);
        assert_eq!(cached_users(&directory), vec![leanne()]);
        assert_eq!(source.list_calls(), 1);
        assert_eq!(
            events.try_recv().unwrap(),
            DirectoryEvent::Loaded {
                count: 1,
                from_cache: false
            }
        );
    }

    #[tokio::test]
    async fn test_load_prefers_cache_without_network() {
        let cached = vec![sample_user(3, "C"), sample_user(1, "A"), sample_user(2, "B")];
        let source = ScriptedSource::with_users(vec![leanne()]);

        let mut cache = UserCache::new(Box::new(MemoryStore::new()));
        cache.save_users(&cached).unwrap();
        let mut directory = UserDirectory::new(cache);

        let plan = directory.load(&source).await;

        assert_eq!(plan, LoadPlan::Cached(3));
        assert_eq!(source.list_calls(), 0);
        assert_eq!(directory.users(), cached.as_slice());
        assert!(!directory.is_loading());
    }

    #[tokio::test]
    async fn test_load_of_n_remote_records() {
        let remote: Vec<User> = (1..=10).map(|i| sample_user(i, "User")).collect();
        let source = ScriptedSource::with_users(remote.clone());
        let mut directory = memory_directory();

        directory.load(&source).await;

        assert_eq!(directory.len(), 10);
        assert_eq!(cached_users(&directory), remote);
    }

    #[tokio::test]
    async fn test_load_failure_notifies_and_settles_empty() {
        let source = ScriptedSource::failing();
        let mut directory = memory_directory();
        let mut events = directory.subscribe();

        directory.load(&source).await;

        assert!(!directory.is_loading());
        assert!(directory.is_empty());
        assert!(cached_users(&directory).is_empty());
        assert_eq!(
            events.try_recv().unwrap(),
            DirectoryEvent::Notice(Notice::LoadFailed)
        );
        assert_eq!(source.list_calls(), 1);
    }

    #[test]
    fn test_finish_load_only_settles_once() {
        let mut directory = memory_directory();
        assert_eq!(directory.begin_load(), LoadPlan::FetchRemote);

        assert!(directory.finish_load(Ok(vec![leanne()])));
        assert!(!directory.finish_load(Ok(vec![])));
        assert!(!directory.finish_load(Err(anyhow::anyhow!("late failure"))));

        assert_eq!(directory.users(), &[leanne()]);
    }

    #[test]
    fn test_add_during_first_load_survives_fetch() {
        let mut directory = memory_directory();
        assert_eq!(directory.begin_load(), LoadPlan::FetchRemote);

        let ada = directory.add_user("Ada", "ada@x.com", "555").unwrap();
        assert!(directory.finish_load(Ok(vec![leanne()])));

        assert_eq!(directory.users(), &[leanne(), ada.clone()]);
        assert_eq!(cached_users(&directory), vec![leanne(), ada]);
    }

    #[tokio::test]
    async fn test_edits_during_reload_survive_fetch() {
        let source = ScriptedSource::with_users(vec![leanne(), sample_user(2, "Ervin Howell")]);
        let mut directory = seeded(vec![leanne(), sample_user(2, "Ervin Howell")]);

        directory.begin_reload();
        directory.remove_user(2);
        let ada = directory.add_user("Ada", "ada@x.com", "555").unwrap();
        let grace = directory.add_user("Grace", "grace@x.com", "556").unwrap();
        directory.remove_user(grace.id);
        directory.finish_load(source.list_users().await);

        assert_eq!(directory.users(), &[leanne(), ada.clone()]);
        assert_eq!(cached_users(&directory), vec![leanne(), ada]);
    }

    #[tokio::test]
    async fn test_add_after_failed_load_is_not_cached() {
        let dir = tempfile::tempdir().unwrap();
        let open = || UserDirectory::with_store(Box::new(FileStore::new(dir.path().to_path_buf()).unwrap()));

        let mut offline = open();
        offline.load(&ScriptedSource::failing()).await;
        let ada = offline.add_user("Ada", "ada@x.com", "555").unwrap();
        assert_eq!(offline.users(), &[ada]);
        assert!(cached_users(&offline).is_empty());

        let source = ScriptedSource::with_users(vec![leanne()]);
        let mut online = open();
        assert_eq!(online.load(&source).await, LoadPlan::FetchRemote);
        assert_eq!(source.list_calls(), 1);
        assert_eq!(online.users(), &[leanne()]);
    }

    #[test]
    fn test_corrupt_cache_falls_back_to_remote() {
        let mut store = MemoryStore::new();
        store.set(USERS_KEY, b"{ nope").unwrap();
        let mut directory = UserDirectory::with_store(Box::new(store));

        assert_eq!(directory.begin_load(), LoadPlan::FetchRemote);
        assert!(directory.is_loading());
    }

    #[tokio::test]
    async fn test_reload_bypasses_cache() {
        let source = ScriptedSource::with_users(vec![leanne()]);
        let mut directory = seeded(vec![sample_user(9, "Stale")]);

        assert_eq!(directory.begin_reload(), LoadPlan::FetchRemote);
        // Old list stays visible while the fetch runs
        assert_eq!(directory.len(), 1);
        assert!(directory.is_loading());

        directory.finish_load(source.list_users().await);
        assert_eq!(directory.users(), &[leanne()]);
        assert_eq!(cached_users(&directory), vec![leanne()]);
    }

    #[tokio::test]
    async fn test_cache_round_trip_across_instances() {
        let dir = tempfile::tempdir().unwrap();
        let source = ScriptedSource::with_users(vec![leanne(), sample_user(2, "Ervin Howell")]);

        let mut first =
            UserDirectory::with_store(Box::new(FileStore::new(dir.path().to_path_buf()).unwrap()));
        first.load(&source).await;
        first.add_user("Ada", "ada@x.com", "555").unwrap();

        let mut second =
            UserDirectory::with_store(Box::new(FileStore::new(dir.path().to_path_buf()).unwrap()));
        assert_eq!(second.load(&source).await, LoadPlan::Cached(3));
        assert_eq!(second.users(), first.users());
        assert_eq!(source.list_calls(), 1);
    }

    #[tokio::test]
    async fn test_instances_do_not_see_each_other_until_reload() {
        let dir = tempfile::tempdir().unwrap();
        let source = ScriptedSource::with_users(vec![leanne()]);
        let open = || UserDirectory::with_store(Box::new(FileStore::new(dir.path().to_path_buf()).unwrap()));

        let mut first = open();
        let mut second = open();
        first.load(&source).await;
        second.load(&source).await;

        first.add_user("Ada", "ada@x.com", "555").unwrap();
        assert_eq!(second.len(), 1);

        second.begin_load();
        assert_eq!(second.len(), 2);
    }

    // ===== Adding =====

    #[test]
    fn test_add_user_trims_and_appends() {
        let mut directory = seeded(vec![leanne()]);
        let mut events = directory.subscribe();

        let user = directory.add_user(" Ada ", " ada@x.com ", " 555 ").unwrap();

        assert_eq!(user.name, "Ada");
        assert_eq!(user.email, "ada@x.com");
        assert_eq!(user.phone, "555");
        assert_eq!(directory.len(), 2);
        assert_eq!(directory.users().last(), Some(&user));
        assert_eq!(cached_users(&directory).last(), Some(&user));

        // Exactly one notification, carrying the new record
        assert_eq!(events.try_recv().unwrap(), DirectoryEvent::UserAdded(user));
        assert!(events.try_recv().is_err());
    }

    #[test]
    fn test_add_user_rejects_blank_fields() {
        let mut directory = seeded(vec![leanne()]);
        let mut events = directory.subscribe();

        for (name, email, phone) in [("", "a@x", "1"), ("Ada", "   ", "1"), ("Ada", "a@x", "\t")] {
            let err = directory.add_user(name, email, phone).unwrap_err();
            assert_eq!(
                events.try_recv().unwrap(),
                DirectoryEvent::Notice(Notice::Validation(err))
            );
        }

        assert_eq!(directory.users(), &[leanne()]);
        assert_eq!(cached_users(&directory), vec![leanne()]);
    }

    #[test]
    fn test_new_ids_are_unique_and_increasing() {
        let mut directory = memory_directory();
        let ids: Vec<UserId> = (0..20)
            .map(|i| directory.add_user(&format!("U{}", i), "u@x", "1").unwrap().id)
            .collect();
        assert!(ids.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn test_new_id_is_past_existing_ids() {
        let far_future = u64::try_from(Utc::now().timestamp_millis()).unwrap() + 1_000_000;
        let mut directory = seeded(vec![sample_user(far_future, "Future")]);
        let user = directory.add_user("Ada", "ada@x.com", "555").unwrap();
        assert_eq!(user.id, far_future + 1);
    }

    // ===== Deleting =====

    #[test]
    fn test_remove_keeps_relative_order() {
        let mut directory = seeded((1..=4).map(|i| sample_user(i, "U")).collect());
        let mut events = directory.subscribe();

        let removed = directory.remove_user(2).unwrap();
        assert_eq!(removed.id, 2);

        let ids: Vec<UserId> = directory.users().iter().map(|u| u.id).collect();
        assert_eq!(ids, vec![1, 3, 4]);
        let cached_ids: Vec<UserId> = cached_users(&directory).iter().map(|u| u.id).collect();
        assert_eq!(cached_ids, vec![1, 3, 4]);
        assert_eq!(events.try_recv().unwrap(), DirectoryEvent::UserRemoved(2));
    }

    #[test]
    fn test_remove_absent_is_noop() {
        let mut directory = seeded(vec![leanne()]);
        let mut events = directory.subscribe();

        assert!(directory.remove_user(42).is_none());
        assert!(directory.remove_user(42).is_none());

        assert_eq!(directory.users(), &[leanne()]);
        assert!(events.try_recv().is_err());
    }

    #[test]
    fn test_remove_only_first_duplicate() {
        let mut directory = seeded(vec![sample_user(1, "A"), sample_user(1, "B")]);
        directory.remove_user(1);
        assert_eq!(directory.len(), 1);
        assert_eq!(directory.users()[0].name, "B");
    }

    #[test]
    fn test_delete_declined_changes_nothing() {
        let mut directory = seeded(vec![leanne()]);
        let asked = std::cell::Cell::new(0);

        let removed = directory.delete_user(1, &|prompt: &str| {
            assert_eq!(prompt, DELETE_PROMPT);
            asked.set(asked.get() + 1);
            false
        });

        assert!(removed.is_none());
        assert_eq!(asked.get(), 1);
        assert_eq!(directory.len(), 1);
    }

    #[test]
    fn test_delete_confirmed() {
        let mut directory = seeded(vec![leanne(), sample_user(2, "Ervin Howell")]);
        let removed = directory.delete_user(1, &|_: &str| true);
        assert_eq!(removed.map(|u| u.id), Some(1));
        assert_eq!(directory.len(), 1);
    }

    #[test]
    fn test_delete_asks_before_looking_up() {
        let mut directory = seeded(vec![leanne()]);
        let asked = std::cell::Cell::new(0);

        let removed = directory.delete_user(99, &|prompt: &str| {
            assert_eq!(prompt, DELETE_PROMPT);
            asked.set(asked.get() + 1);
            true
        });

        assert!(removed.is_none());
        assert_eq!(asked.get(), 1);
        assert_eq!(directory.users(), &[leanne()]);
    }

    #[test]
    fn test_delete_request_token() {
        let mut directory = seeded(vec![leanne()]);
        let request = directory.request_delete(1).unwrap();
        assert_eq!(request.name(), "Leanne Graham");

        // User vanished between request and confirmation
        directory.remove_user(1);
        assert!(directory.confirm_delete(request).is_none());
    }

    #[test]
    fn test_cache_age_tracks_writes() {
        let mut directory = memory_directory();
        assert_eq!(directory.cache_age(), "never");
        directory.begin_load();
        directory.finish_load(Ok(vec![leanne()]));
        assert_eq!(directory.cache_age(), "just now");
    }
}
