//! Core library for userdir.
//!
//! A user directory backed by a read-mostly REST API. The collection is
//! cached in a swappable key/value store; locally added or deleted users
//! live only in that store.
//!
//! - `api`: remote user source and its reqwest client
//! - `cache`: store tiers and the typed user cache
//! - `directory`: the collection manager, detail view and change events
//! - `models`: user records and add-user validation
//! - `config`: on-disk configuration with environment overrides
//! - `utils`: display formatting helpers

pub mod api;
pub mod cache;
pub mod config;
pub mod directory;
pub mod models;
pub mod utils;

#[cfg(test)]
mod test_support;

pub use api::{ApiClient, ApiError, UserSource};
pub use cache::{open_store, KeyValueStore, StorageTier, UserCache};
pub use config::Config;
pub use directory::{DetailState, DetailView, DirectoryEvent, LoadPlan, Notice, UserDirectory};
pub use models::{NewUser, User, UserId, ValidationError};
