//! The user collection manager and the state that hangs off it.
//!
//! - `UserDirectory`: ordered user list with cache-first loading and
//!   write-through add/delete
//! - `DetailView`: single-user lookups that ignore superseded responses
//! - `EventBus`: broadcast of `DirectoryEvent`s to interested views

pub mod collection;
pub mod detail;
pub mod events;

pub use collection::{Confirm, DeleteRequest, LoadPlan, UserDirectory, DELETE_PROMPT};
pub use detail::{fetch_detail, DetailResponse, DetailState, DetailTicket, DetailView};
pub use events::{DirectoryEvent, EventBus, Notice};
