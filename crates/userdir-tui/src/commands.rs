//! One-shot subcommands that run without the terminal interface.
//!
//! Each command builds the same `UserDirectory` the TUI uses, so the
//! cache-first load and write-through rules are identical.

use std::io::{self, BufRead, Write};

use anyhow::{Context, Result};
use tokio::sync::broadcast;
use tracing::{info, warn};

use userdir_core::api::{ApiClient, UserSource};
use userdir_core::cache::open_store;
use userdir_core::directory::fetch_detail;
use userdir_core::models::{NewUser, User, UserId};
use userdir_core::utils::{format_optional, format_phone, truncate_string};
use userdir_core::{Config, DetailState, DetailView, DirectoryEvent, UserCache, UserDirectory};

/// Width of the name column in `list` output
const NAME_COLUMN_WIDTH: usize = 28;

/// Text printed when a detail lookup finds nothing
const NOT_FOUND_MESSAGE: &str = "USER NOT FOUND!!!";

fn open_directory(config: &Config) -> Result<UserDirectory> {
    let store = open_store(config.storage, &config.store_dir()?)?;
    Ok(UserDirectory::with_store(store))
}

/// Load through the cache, printing any blocking notice to stderr.
async fn load_directory(config: &Config, api: &ApiClient) -> Result<UserDirectory> {
    let mut directory = open_directory(config)?;
    let mut events = directory.subscribe();

    directory.load(api).await;
    report_notices(&mut events);

    Ok(directory)
}

fn report_notices(events: &mut broadcast::Receiver<DirectoryEvent>) {
    while let Ok(event) = events.try_recv() {
        if let DirectoryEvent::Notice(notice) = event {
            eprintln!("{}", notice.message());
        }
    }
}

// ============================================================================
// list
// ============================================================================

pub async fn list(config: &Config, json: bool) -> Result<()> {
    let api = ApiClient::from_config(config)?;
    let directory = load_directory(config, &api).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(directory.users())?);
        return Ok(());
    }

    print!("{}", format_table(directory.users()));
    Ok(())
}

fn format_table(users: &[User]) -> String {
    if users.is_empty() {
        return "No users!!\n".to_string();
    }

    let mut out = String::new();
    for user in users {
        out.push_str(&format!(
            "{:>13}  {:<width$}  {}\n",
            user.id,
            truncate_string(&user.name, NAME_COLUMN_WIDTH),
            user.email,
            width = NAME_COLUMN_WIDTH,
        ));
    }
    out
}

// ============================================================================
// show
// ============================================================================

/// Fetch one user straight from the API. The cache is not consulted.
pub async fn show(config: &Config, id: UserId, json: bool) -> Result<()> {
    let api = ApiClient::from_config(config)?;

    let mut detail = DetailView::new();
    let ticket = detail.open(id);
    let response = fetch_detail(&api, ticket).await;
    detail.resolve(response);

    match detail.state() {
        DetailState::Found(user) if json => {
            println!("{}", serde_json::to_string_pretty(user)?);
        }
        DetailState::Found(user) => print!("{}", format_detail(user)),
        _ => println!("{}", NOT_FOUND_MESSAGE),
    }
    Ok(())
}

fn format_detail(user: &User) -> String {
    let mut out = String::new();
    out.push_str(&format!("{}\n", user.name));
    out.push_str(&format!("  Username: {}\n", format_optional(user.username.as_deref(), "-")));
    out.push_str(&format!("  Email:    {}\n", user.email));
    out.push_str(&format!("  Phone:    {}\n", format_phone(&user.phone)));
    out.push_str(&format!("  Website:  {}\n", format_optional(user.website.as_deref(), "-")));

    let address = user.address_lines();
    if !address.is_empty() {
        out.push_str("Address\n");
        for line in address {
            out.push_str(&format!("  {}\n", line));
        }
    }

    let company = user.company_lines();
    if !company.is_empty() {
        out.push_str("Company\n");
        for line in company {
            out.push_str(&format!("  {}\n", line));
        }
    }
    out
}

// ============================================================================
// add / remove
// ============================================================================

pub async fn add(config: &Config, name: &str, email: &str, phone: &str, publish: bool) -> Result<()> {
    let new_user = NewUser::parse(name, email, phone)?;

    let api = ApiClient::from_config(config)?;
    let mut directory = load_directory(config, &api).await?;
    let user = directory.add_new_user(new_user.clone());
    println!("Added {} ({})", user.name, user.id);

    if publish {
        match api.create_user(&new_user).await {
            Ok(echo) => info!(remote_id = echo.id, "API accepted new user"),
            Err(e) => warn!(error = %e, "API rejected new user"),
        }
    }
    Ok(())
}

pub async fn remove(config: &Config, id: UserId, yes: bool, publish: bool) -> Result<()> {
    let api = ApiClient::from_config(config)?;
    let mut directory = load_directory(config, &api).await?;

    let removed = if yes {
        directory.remove_user(id)
    } else {
        directory.delete_user(id, &prompt_stdin)
    };

    match removed {
        Some(user) => {
            println!("Removed {} ({})", user.name, user.id);
            if publish {
                if let Err(e) = api.delete_user(id).await {
                    warn!(error = %e, id, "API rejected delete");
                }
            }
        }
        None if directory.get(id).is_some() => println!("Cancelled"),
        None => println!("No user with id {}", id),
    }
    Ok(())
}

/// Ask on stderr, read the answer from stdin
fn prompt_stdin(prompt: &str) -> bool {
    eprint!("{} [y/N] ", prompt);
    let _ = io::stderr().flush();

    let mut answer = String::new();
    match io::stdin().lock().read_line(&mut answer) {
        Ok(_) => is_yes(&answer),
        Err(e) => {
            warn!(error = %e, "Failed to read confirmation");
            false
        }
    }
}

fn is_yes(answer: &str) -> bool {
    matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes")
}

// ============================================================================
// clear-cache
// ============================================================================

pub fn clear_cache(config: &Config) -> Result<()> {
    let store = open_store(config.storage, &config.store_dir()?)?;
    UserCache::new(store)
        .clear()
        .with_context(|| format!("Failed to clear {} store", config.storage))?;
    println!("Cache cleared");
    Ok(())
}

// ============================================================================
// config
// ============================================================================

/// Print the effective configuration, optionally writing it to disk.
pub fn config(config: &Config, save: bool) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(config)?);

    if save {
        config.save().context("Failed to save config")?;
        println!("Saved to {}", Config::config_path()?.display());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(id: UserId, name: &str) -> User {
        User::from_new(
            id,
            NewUser::parse(name, &format!("{}@example.com", id), "555").expect("valid user"),
        )
    }

    #[test]
    fn test_is_yes() {
        assert!(is_yes("y\n"));
        assert!(is_yes(" YES "));
        assert!(!is_yes("\n"));
        assert!(!is_yes("no"));
        assert!(!is_yes("yep"));
    }

    #[test]
    fn test_format_table_empty() {
        assert_eq!(format_table(&[]), "No users!!\n");
    }

    #[test]
    fn test_format_table_keeps_order() {
        let out = format_table(&[user(2, "Ervin Howell"), user(1, "Leanne Graham")]);
        let lines: Vec<&str> = out.lines().collect();

        assert_eq!(lines.len(), 2);
        assert!(lines[0].contains("Ervin Howell"));
        assert!(lines[1].contains("Leanne Graham"));
        assert!(lines[1].trim_start().starts_with('1'));
    }

    #[test]
    fn test_format_detail_local_user() {
        let out = format_detail(&user(7, "Ada"));

        assert!(out.starts_with("Ada\n"));
        assert!(out.contains("Email:    7@example.com"));
        assert!(out.contains("Username: -"));
        // Locally added users carry no address or company
        assert!(!out.contains("Address"));
        assert!(!out.contains("Company"));
    }
}
