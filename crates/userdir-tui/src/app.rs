//! Application state management for the userdir TUI.
//!
//! This module contains the `App` struct: UI state, the user directory,
//! the detail view, and the channel background fetches report back on.

use anyhow::Result;
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, error, info, warn};

use userdir_core::api::{ApiClient, UserSource};
use userdir_core::cache::open_store;
use userdir_core::directory::{
    fetch_detail, DeleteRequest, DetailResponse, DirectoryEvent, LoadPlan,
};
use userdir_core::models::{Field, User};
use userdir_core::{Config, DetailView, UserDirectory};

// ============================================================================
// Constants
// ============================================================================

/// Buffer size for the background fetch channel.
const CHANNEL_BUFFER_SIZE: usize = 16;

/// Maximum length of a single add-user form field.
pub const MAX_FIELD_LENGTH: usize = 64;

/// Number of rows to move on page up/down.
pub const PAGE_SCROLL_SIZE: usize = 10;

// ============================================================================
// UI State Types
// ============================================================================

/// Which screen is showing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum View {
    List,
    Detail,
}

/// Overall application state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppState {
    Normal,
    AddingUser,
    ConfirmingDelete,
    ShowingHelp,
    ConfirmingQuit,
    Quitting,
}

/// Add-user form contents
#[derive(Debug, Clone)]
pub struct AddForm {
    pub name: String,
    pub email: String,
    pub phone: String,
    pub focus: Field,
}

impl Default for AddForm {
    fn default() -> Self {
        Self {
            name: String::new(),
            email: String::new(),
            phone: String::new(),
            focus: Field::Name,
        }
    }
}

impl AddForm {
    pub fn value(&self, field: Field) -> &str {
        match field {
            Field::Name => &self.name,
            Field::Email => &self.email,
            Field::Phone => &self.phone,
        }
    }

    fn value_mut(&mut self, field: Field) -> &mut String {
        match field {
            Field::Name => &mut self.name,
            Field::Email => &mut self.email,
            Field::Phone => &mut self.phone,
        }
    }

    pub fn push_char(&mut self, c: char) {
        let focus = self.focus;
        let value = self.value_mut(focus);
        if can_add_field_char(value.chars().count(), c) {
            value.push(c);
        }
    }

    pub fn pop_char(&mut self) {
        let focus = self.focus;
        self.value_mut(focus).pop();
    }

    pub fn next_field(&mut self) {
        self.focus = match self.focus {
            Field::Name => Field::Email,
            Field::Email => Field::Phone,
            Field::Phone => Field::Name,
        };
    }

    pub fn prev_field(&mut self) {
        self.focus = match self.focus {
            Field::Name => Field::Phone,
            Field::Email => Field::Name,
            Field::Phone => Field::Email,
        };
    }
}

// ============================================================================
// Background Task Results
// ============================================================================

/// Results sent back from spawned network tasks.
enum FetchResult {
    /// The remote user list (or why it could not be fetched)
    Users(Result<Vec<User>>),
    /// Answer to a detail lookup
    Detail(DetailResponse),
}

// ============================================================================
// Main Application Struct
// ============================================================================

pub struct App {
    pub config: Config,
    api: ApiClient,
    pub directory: UserDirectory,
    pub detail: DetailView,
    events: broadcast::Receiver<DirectoryEvent>,

    // UI state
    pub state: AppState,
    pub view: View,
    pub selection: usize,
    pub form: AddForm,
    pub pending_delete: Option<DeleteRequest>,
    /// Blocking message shown above everything else
    pub notice: Option<String>,
    pub status_message: Option<String>,

    fetch_rx: mpsc::Receiver<FetchResult>,
    fetch_tx: mpsc::Sender<FetchResult>,
}

impl App {
    /// Create a new application instance
    pub fn new(config: Config) -> Result<Self> {
        let api = ApiClient::from_config(&config)?;
        let store = open_store(config.storage, &config.store_dir()?)?;
        let directory = UserDirectory::with_store(store);
        debug!(base_url = api.base_url(), storage = %config.storage, "App configured");

        Ok(Self::with_parts(config, api, directory))
    }

    pub fn with_parts(config: Config, api: ApiClient, directory: UserDirectory) -> Self {
        let events = directory.subscribe();
        let (fetch_tx, fetch_rx) = mpsc::channel(CHANNEL_BUFFER_SIZE);

        Self {
            config,
            api,
            directory,
            detail: DetailView::new(),
            events,

            state: AppState::Normal,
            view: View::List,
            selection: 0,
            form: AddForm::default(),
            pending_delete: None,
            notice: None,
            status_message: None,

            fetch_rx,
            fetch_tx,
        }
    }

    // =========================================================================
    // Loading
    // =========================================================================

    /// Load the user list: cache first, remote fetch in the background on a miss
    pub fn start_load(&mut self) {
        let plan = self.directory.begin_load();
        self.follow_plan(plan);
    }

    /// Drop the cached list and fetch it again
    pub fn reload(&mut self) {
        if self.directory.is_loading() {
            self.status_message = Some("Already loading...".to_string());
            return;
        }
        info!("Reloading users from remote");
        let plan = self.directory.begin_reload();
        self.follow_plan(plan);
    }

    fn follow_plan(&mut self, plan: LoadPlan) {
        match plan {
            LoadPlan::Cached(count) => {
                debug!(count, "Users served from cache");
            }
            LoadPlan::FetchRemote => {
                self.status_message = Some("Loading users...".to_string());
                self.spawn_list_fetch();
            }
        }
    }

    fn spawn_list_fetch(&self) {
        let api = self.api.clone();
        let tx = self.fetch_tx.clone();

        tokio::spawn(async move {
            let result = api.list_users().await;
            Self::send_result(&tx, FetchResult::Users(result)).await;
        });
    }

    /// Helper to send fetch results, logging any channel errors
    async fn send_result(tx: &mpsc::Sender<FetchResult>, result: FetchResult) {
        if tx.send(result).await.is_err() {
            // The app has shut down; nothing left to update
            debug!("Fetch result dropped - channel closed");
        }
    }

    // =========================================================================
    // Detail View
    // =========================================================================

    pub fn selected_user(&self) -> Option<&User> {
        self.directory.users().get(self.selection)
    }

    /// Open the detail view for the selected user
    pub fn open_detail(&mut self) {
        let Some(id) = self.selected_user().map(|u| u.id) else {
            return;
        };

        let ticket = self.detail.open(id);
        self.view = View::Detail;

        let api = self.api.clone();
        let tx = self.fetch_tx.clone();
        tokio::spawn(async move {
            let response = fetch_detail(&api, ticket).await;
            Self::send_result(&tx, FetchResult::Detail(response)).await;
        });
    }

    pub fn close_detail(&mut self) {
        self.detail.close();
        self.view = View::List;
    }

    // =========================================================================
    // Add / Delete
    // =========================================================================

    pub fn start_add_user(&mut self) {
        self.form = AddForm::default();
        self.state = AppState::AddingUser;
    }

    /// Submit the add form. On validation failure the form stays open and
    /// the directory publishes a notice.
    pub fn submit_add_user(&mut self) {
        let result = self
            .directory
            .add_user(&self.form.name, &self.form.email, &self.form.phone);

        if result.is_ok() {
            self.form = AddForm::default();
            self.state = AppState::Normal;
        }
    }

    pub fn cancel_add_user(&mut self) {
        self.state = AppState::Normal;
    }

    pub fn start_delete(&mut self) {
        let Some(id) = self.selected_user().map(|u| u.id) else {
            return;
        };
        if let Some(request) = self.directory.request_delete(id) {
            self.pending_delete = Some(request);
            self.state = AppState::ConfirmingDelete;
        }
    }

    pub fn answer_delete(&mut self, confirmed: bool) {
        if let Some(request) = self.pending_delete.take() {
            if confirmed {
                self.directory.confirm_delete(request);
            } else {
                request.cancel();
            }
        }
        self.state = AppState::Normal;
    }

    // =========================================================================
    // Navigation
    // =========================================================================

    pub fn select_next(&mut self, step: usize) {
        let last = self.directory.len().saturating_sub(1);
        self.selection = self.selection.saturating_add(step).min(last);
    }

    pub fn select_prev(&mut self, step: usize) {
        self.selection = self.selection.saturating_sub(step);
    }

    fn clamp_selection(&mut self) {
        self.selection = self.selection.min(self.directory.len().saturating_sub(1));
    }

    // =========================================================================
    // Background Results & Events
    // =========================================================================

    /// Apply finished fetches and directory events
    pub fn check_background_tasks(&mut self) {
        while let Ok(result) = self.fetch_rx.try_recv() {
            match result {
                FetchResult::Users(result) => {
                    self.directory.finish_load(result);
                }
                FetchResult::Detail(response) => {
                    self.detail.resolve(response);
                }
            }
        }

        loop {
            match self.events.try_recv() {
                Ok(event) => self.handle_event(event),
                Err(broadcast::error::TryRecvError::Lagged(skipped)) => {
                    warn!(skipped, "Directory events lagged");
                }
                Err(broadcast::error::TryRecvError::Empty) => break,
                Err(broadcast::error::TryRecvError::Closed) => {
                    error!("Directory event channel closed");
                    break;
                }
            }
        }
    }

    fn handle_event(&mut self, event: DirectoryEvent) {
        match event {
            DirectoryEvent::Loaded { count, from_cache } => {
                self.clamp_selection();
                self.status_message = Some(if from_cache {
                    format!("{} users (cached)", count)
                } else {
                    format!("Loaded {} users", count)
                });
            }
            DirectoryEvent::UserAdded(user) => {
                self.selection = self.directory.len().saturating_sub(1);
                self.status_message = Some(format!("Added {}", user.name));
            }
            DirectoryEvent::UserRemoved(id) => {
                self.clamp_selection();
                self.status_message = Some(format!("Deleted user {}", id));
            }
            DirectoryEvent::Notice(notice) => {
                self.notice = Some(notice.message());
            }
        }
    }

    pub fn dismiss_notice(&mut self) {
        self.notice = None;
    }
}

// ============================================================================
// Input Validation
// ============================================================================

/// Check if a character is valid for form input
fn is_valid_input_char(c: char) -> bool {
    !c.is_control()
}

/// Check if a character can be added to a form field of `current_len` chars
pub fn can_add_field_char(current_len: usize, c: char) -> bool {
    current_len < MAX_FIELD_LENGTH && is_valid_input_char(c)
}

// ============================================================================
// Tests
// ============================================================================
