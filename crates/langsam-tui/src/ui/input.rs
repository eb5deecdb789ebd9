//! Keyboard input handling for the TUI.
//!
//! Translates key events into session commands and app state changes.

use crossterm::event::{KeyCode, KeyEvent, KeyEventKind};

use langsam_core::Level;

use crate::app::{App, AppState, PAGE_SCROLL_SIZE};

/// Handle keyboard input. Returns true if the app should quit.
pub fn handle_input(app: &mut App, key: KeyEvent) -> bool {
    if key.kind == KeyEventKind::Release {
        return false;
    }

    if matches!(app.state, AppState::ShowingHelp) {
        if matches!(key.code, KeyCode::Esc | KeyCode::Char('?') | KeyCode::Char('q')) {
            app.state = AppState::Normal;
        }
        return false;
    }

    // Keys that work everywhere
    match key.code {
        KeyCode::Char('q') => {
            app.state = AppState::Quitting;
            return true;
        }
        KeyCode::Char('?') => {
            app.state = AppState::ShowingHelp;
            return false;
        }
        KeyCode::Char('1') => {
            app.set_level(Level::One);
            return false;
        }
        KeyCode::Char('2') => {
            app.set_level(Level::Two);
            return false;
        }
        KeyCode::Char('3') => {
            app.set_level(Level::Three);
            return false;
        }
        KeyCode::Char('[') => {
            app.change_speed(false);
            return false;
        }
        KeyCode::Char(']') => {
            app.change_speed(true);
            return false;
        }
        _ => {}
    }

    if app.in_detail() {
        handle_detail_input(app, key);
    } else {
        handle_list_input(app, key);
    }
    false
}

fn handle_list_input(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Down | KeyCode::Char('j') => app.select_next(1),
        KeyCode::Up | KeyCode::Char('k') => app.select_previous(1),
        KeyCode::PageDown => app.select_next(PAGE_SCROLL_SIZE),
        KeyCode::PageUp => app.select_previous(PAGE_SCROLL_SIZE),
        KeyCode::Home => app.list_selection = 0,
        KeyCode::End => app.select_next(usize::MAX / 2),
        KeyCode::Enter => app.open_selected(),
        _ => {}
    }
}

fn handle_detail_input(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Esc | KeyCode::Backspace => app.back_to_list(),
        KeyCode::Char(' ') => app.session.toggle_play(),
        KeyCode::Left => app.session.rewind(),
        KeyCode::Right => app.session.skip_forward(),
        KeyCode::Char('0') => app.session.seek(0.0),
        KeyCode::Down | KeyCode::Char('j') => app.scroll_detail(true),
        KeyCode::Up | KeyCode::Char('k') => app.scroll_detail(false),
        KeyCode::Char('g') => app.session.toggle_german(),
        KeyCode::Char('e') => app.session.toggle_english(),
        _ => {}
    }
}
