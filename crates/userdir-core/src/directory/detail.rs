//! Single-user detail view state.
//!
//! Detail lookups always go to the remote source and never touch the user
//! cache. Each `open` bumps a generation; a response is only applied if it
//! carries the current generation, so a slow answer for a previous user
//! (or one arriving after the view was closed) is dropped.

use tracing::{debug, warn};

use crate::api::{is_not_found, UserSource};
use crate::models::{User, UserId};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DetailState {
    Closed,
    Loading(UserId),
    Found(User),
    /// Missing user or failed fetch; the two are not told apart
    NotFound(UserId),
}

/// Handle for one outstanding detail request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DetailTicket {
    generation: u64,
    id: UserId,
}

impl DetailTicket {
    pub fn id(&self) -> UserId {
        self.id
    }
}

#[derive(Debug, Clone)]
pub struct DetailResponse {
    pub ticket: DetailTicket,
    pub user: Option<User>,
}

#[derive(Debug)]
pub struct DetailView {
    generation: u64,
    state: DetailState,
}

impl Default for DetailView {
    fn default() -> Self {
        Self::new()
    }
}

impl DetailView {
    pub fn new() -> Self {
        Self {
            generation: 0,
            state: DetailState::Closed,
        }
    }

    pub fn state(&self) -> &DetailState {
        &self.state
    }

    pub fn is_open(&self) -> bool {
        !matches!(self.state, DetailState::Closed)
    }

    pub fn is_loading(&self) -> bool {
        matches!(self.state, DetailState::Loading(_))
    }

    /// Show `id`, superseding any request still in flight.
    pub fn open(&mut self, id: UserId) -> DetailTicket {
        self.generation += 1;
        self.state = DetailState::Loading(id);
        DetailTicket {
            generation: self.generation,
            id,
        }
    }

    /// Leave the detail view. Responses still in flight will be ignored.
    pub fn close(&mut self) {
        self.generation += 1;
        self.state = DetailState::Closed;
    }

    /// Apply a response. Returns false if it was stale and dropped.
    pub fn resolve(&mut self, response: DetailResponse) -> bool {
        let ticket = response.ticket;
        if ticket.generation != self.generation {
            debug!(
                id = ticket.id,
                generation = ticket.generation,
                current = self.generation,
                "Dropping stale detail response"
            );
            return false;
        }

        self.state = match response.user {
            Some(user) => DetailState::Found(user),
            None => DetailState::NotFound(ticket.id),
        };
        true
    }
}

/// Fetch the user for `ticket`. Exactly one remote call; errors are logged
/// and come back as `user: None`.
pub async fn fetch_detail(source: &dyn UserSource, ticket: DetailTicket) -> DetailResponse {
    let user = match source.get_user(ticket.id).await {
        Ok(user) => Some(user),
        Err(e) if is_not_found(&e) => {
            debug!(id = ticket.id, "User not found");
            None
        }
        Err(e) => {
            warn!(id = ticket.id, error = %e, "Failed to fetch user details");
            None
        }
    };
    DetailResponse { ticket, user }
}
