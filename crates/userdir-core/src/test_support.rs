//! Test doubles shared by the unit tests.

use std::sync::atomic::{AtomicUsize, Ordering};

use anyhow::Result;
use async_trait::async_trait;

use crate::api::{ApiError, UserSource};
use crate::models::{NewUser, User, UserId};

pub fn sample_user(id: UserId, name: &str) -> User {
    User {
        id,
        name: name.to_string(),
        username: None,
        email: format!("user{}@example.com", id),
        address: None,
        phone: format!("555-000{}", id),
        website: None,
        company: None,
    }
}

/// In-memory `UserSource` that counts calls.
#[derive(Default)]
pub struct ScriptedSource {
    users: Vec<User>,
    fail: bool,
    list_calls: AtomicUsize,
    get_calls: AtomicUsize,
}

impl ScriptedSource {
    pub fn with_users(users: Vec<User>) -> Self {
        Self {
            users,
            ..Default::default()
        }
    }

    /// Every call fails like an unreachable server.
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Default::default()
        }
    }

    pub fn list_calls(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }

    pub fn get_calls(&self) -> usize {
        self.get_calls.load(Ordering::SeqCst)
    }

    fn unreachable() -> anyhow::Error {
        ApiError::ServerError("503 Service Unavailable".to_string()).into()
    }
}

#[async_trait]
impl UserSource for ScriptedSource {
    async fn list_users(&self) -> Result<Vec<User>> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(Self::unreachable());
        }
        Ok(self.users.clone())
    }

    async fn get_user(&self, id: UserId) -> Result<User> {
        self.get_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(Self::unreachable());
        }
        self.users
            .iter()
            .find(|u| u.id == id)
            .cloned()
            .ok_or_else(|| ApiError::NotFound("{}".to_string()).into())
    }

    async fn create_user(&self, user: &NewUser) -> Result<User> {
        if self.fail {
            return Err(Self::unreachable());
        }
        Ok(User::from_new(self.users.len() as UserId + 1, user.clone()))
    }

    async fn delete_user(&self, _id: UserId) -> Result<()> {
        if self.fail {
            return Err(Self::unreachable());
        }
        Ok(())
    }
}
