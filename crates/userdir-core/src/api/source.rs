use anyhow::Result;
use async_trait::async_trait;

use crate::models::{NewUser, User, UserId};

/// A remote source of user records.
///
/// `ApiClient` is the production implementation; anything that can list
/// and look up users can stand in for it.
#[async_trait]
pub trait UserSource: Send + Sync {
    /// Fetch the whole user collection, in server order.
    async fn list_users(&self) -> Result<Vec<User>>;

    /// Fetch a single user. A missing user is an error (`ApiError::NotFound`
    /// for HTTP sources).
    async fn get_user(&self, id: UserId) -> Result<User>;

    /// Send a new user to the remote. The remote echoes the record back but
    /// is not required to keep it.
    async fn create_user(&self, user: &NewUser) -> Result<User>;

    /// Ask the remote to delete a user. Like `create_user`, not durable.
    async fn delete_user(&self, id: UserId) -> Result<()>;
}
