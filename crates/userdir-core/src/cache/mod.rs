//! Local caching module for the user collection.
//!
//! `UserCache` stores the collection as JSON under a single key in an
//! injected `KeyValueStore`. Store tiers:
//! - `MemoryStore`: gone when the process exits
//! - `FileStore`: files under the cache directory, kept until cleared
//! - `NullStore`: keeps nothing

pub mod manager;
pub mod store;

pub use manager::{CachedData, UserCache, USERS_KEY};
pub use store::{open_store, FileStore, KeyValueStore, MemoryStore, NullStore, StorageTier, StoreError};
