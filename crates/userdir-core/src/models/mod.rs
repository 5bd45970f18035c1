//! Data models for the user directory.
//!
//! - `User`: a directory record as served by the remote API
//! - `Address`, `Geo`, `Company`: optional nested user details
//! - `NewUser`: validated input for a locally created user

pub mod user;

pub use user::{Address, Company, Field, Geo, NewUser, User, UserId, ValidationError};
