//! Keyboard input handling for the TUI.
//!
//! This module translates key events into application state changes.

use crossterm::event::{KeyCode, KeyEvent};

use crate::app::{App, AppState, View, PAGE_SCROLL_SIZE};

/// Handle keyboard input. Returns true if the app should quit.
pub fn handle_input(app: &mut App, key: KeyEvent) -> bool {
    // A notice blocks everything until dismissed
    if app.notice.is_some() {
        app.dismiss_notice();
        return false;
    }

    match app.state {
        AppState::AddingUser => {
            handle_form_input(app, key);
            false
        }
        AppState::ConfirmingDelete => {
            match key.code {
                KeyCode::Char('y') | KeyCode::Char('Y') | KeyCode::Enter => app.answer_delete(true),
                KeyCode::Char('n') | KeyCode::Char('N') | KeyCode::Esc => app.answer_delete(false),
                _ => {}
            }
            false
        }
        AppState::ShowingHelp => {
            if matches!(key.code, KeyCode::Esc | KeyCode::Char('?') | KeyCode::Char('q')) {
                app.state = AppState::Normal;
            }
            false
        }
        AppState::ConfirmingQuit => match key.code {
            KeyCode::Char('y') | KeyCode::Char('Y') | KeyCode::Enter => {
                app.state = AppState::Quitting;
                true
            }
            KeyCode::Char('n') | KeyCode::Char('N') | KeyCode::Esc => {
                app.state = AppState::Normal;
                false
            }
            _ => false,
        },
        AppState::Quitting => true,
        AppState::Normal => {
            handle_normal_input(app, key);
            false
        }
    }
}

fn handle_normal_input(app: &mut App, key: KeyEvent) {
    // Global keys
    match key.code {
        KeyCode::Char('q') => {
            app.state = AppState::ConfirmingQuit;
            return;
        }
        KeyCode::Char('?') => {
            app.state = AppState::ShowingHelp;
            return;
        }
        _ => {}
    }

    match app.view {
        View::List => match key.code {
            KeyCode::Down | KeyCode::Char('j') => app.select_next(1),
            KeyCode::Up | KeyCode::Char('k') => app.select_prev(1),
            KeyCode::PageDown => app.select_next(PAGE_SCROLL_SIZE),
            KeyCode::PageUp => app.select_prev(PAGE_SCROLL_SIZE),
            KeyCode::Home => app.selection = 0,
            KeyCode::End => app.select_next(usize::MAX),
            KeyCode::Enter => app.open_detail(),
            KeyCode::Char('a') => app.start_add_user(),
            KeyCode::Char('d') | KeyCode::Delete => app.start_delete(),
            KeyCode::Char('r') => app.reload(),
            _ => {}
        },
        View::Detail => {
            if matches!(key.code, KeyCode::Esc | KeyCode::Backspace | KeyCode::Left) {
                app.close_detail();
            }
        }
    }
}

fn handle_form_input(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Esc => app.cancel_add_user(),
        KeyCode::Enter => app.submit_add_user(),
        KeyCode::Tab | KeyCode::Down => app.form.next_field(),
        KeyCode::BackTab | KeyCode::Up => app.form.prev_field(),
        KeyCode::Backspace => app.form.pop_char(),
        KeyCode::Char(c) => app.form.push_char(c),
        _ => {}
    }
}
