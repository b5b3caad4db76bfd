use anyhow::Result;
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers, MouseEvent, MouseEventKind};
use ratatui::layout::Rect;
use crate::app::{App, FocusPane, InputMode};
use crate::tui::AppEvent;

/// Convert a character index to a byte index for UTF-8 safe string operations
fn char_to_byte_index(s: &str, char_idx: usize) -> usize {
    s.char_indices()
        .nth(char_idx)
        .map(|(i, _)| i)
        .unwrap_or(s.len())
}

pub fn handle_event(app: &mut App, event: AppEvent) -> Result<()> {
    match event {
        AppEvent::Key(key) => handle_key(app, key),
        AppEvent::Mouse(mouse) => handle_mouse(app, mouse),
        AppEvent::Resize(_, _) => {}
        AppEvent::Tick => app.tick(),
    }
    Ok(())
}

fn handle_key(app: &mut App, key: KeyEvent) {
    // Global keys that work in any mode
    if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
        app.should_quit = true;
        return;
    }

    match app.input_mode {
        InputMode::Editing => handle_editing_mode(app, key),
        InputMode::Renaming => handle_renaming_mode(app, key),
        InputMode::Normal if app.show_history => handle_history_normal(app, key),
        InputMode::Normal => handle_chat_normal(app, key),
    }
}

fn handle_chat_normal(app: &mut App, key: KeyEvent) {
    let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);

    match key.code {
        KeyCode::Char('q') => app.should_quit = true,

        // Start typing
        KeyCode::Char('i') | KeyCode::Enter => {
            app.input_mode = InputMode::Editing;
            app.focus = FocusPane::Input;
        }

        // Scrolling
        KeyCode::Char('d') if ctrl => app.scroll_half_page_down(),
        KeyCode::Char('u') if ctrl => app.scroll_half_page_up(),
        KeyCode::Char('j') | KeyCode::Down => app.scroll_down(),
        KeyCode::Char('k') | KeyCode::Up => app.scroll_up(),
        KeyCode::Char('g') => {
            app.chat_scroll = 0;
            app.follow_output = false;
        }
        KeyCode::Char('G') => app.scroll_to_bottom(),

        // Widget focus
        KeyCode::Tab => {
            app.focus = FocusPane::Chat;
            app.focus_next_widget();
        }
        KeyCode::BackTab => {
            app.focus = FocusPane::Chat;
            app.focus_prev_widget();
        }
        KeyCode::Esc => app.widget_focus = None,
        KeyCode::Char('l') | KeyCode::Right => app.focus_next_item(),
        KeyCode::Char('h') | KeyCode::Left => app.focus_prev_item(),

        // Widget interactions
        KeyCode::Char(c @ '1'..='9') => {
            if let Some(digit) = c.to_digit(10) {
                app.answer_focused(digit as usize - 1);
            }
        }
        KeyCode::Char(' ') => app.flip_focused(),

        // Panels and sessions
        KeyCode::Char('Q') => app.show_queue_panel = !app.show_queue_panel,
        KeyCode::Char('x') => app.cancel_last_queued(),
        KeyCode::Char('H') => open_history(app),
        KeyCode::Char('n') => app.new_chat(),
        KeyCode::Char('C') => app.clear_chat(),

        _ => {}
    }
}

fn open_history(app: &mut App) {
    app.show_history = true;
    app.focus = FocusPane::History;
    app.sync_history_selection();
}

fn close_history(app: &mut App) {
    app.show_history = false;
    app.focus = FocusPane::Chat;
}

fn handle_history_normal(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Char('q') => app.should_quit = true,
        KeyCode::Char('H') | KeyCode::Esc => close_history(app),
        KeyCode::Char('j') | KeyCode::Down => app.history_nav_down(),
        KeyCode::Char('k') | KeyCode::Up => app.history_nav_up(),
        KeyCode::Enter => app.load_selected_chat(),
        KeyCode::Char('d') => app.delete_selected_chat(),
        KeyCode::Char('p') => app.toggle_pin_selected(),
        KeyCode::Char('r') => app.start_rename_selected(),
        KeyCode::Char('n') => {
            app.new_chat();
            close_history(app);
        }
        _ => {}
    }
}

fn handle_editing_mode(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Esc => {
            app.input_mode = InputMode::Normal;
            app.focus = FocusPane::Chat;
        }
        // Stay in editing so follow-ups can be queued while a reply streams
        KeyCode::Enter => app.submit_input(),
        _ => edit_line(app, key),
    }
}

fn handle_renaming_mode(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Esc => app.cancel_rename(),
        KeyCode::Enter => app.commit_rename(),
        _ => edit_line(app, key),
    }
}

/// Cursor movement and character edits shared by the input box modes
fn edit_line(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Backspace => {
            if app.query_cursor > 0 {
                app.query_cursor -= 1;
                let byte_pos = char_to_byte_index(&app.query_input, app.query_cursor);
                app.query_input.remove(byte_pos);
            }
        }
        KeyCode::Delete => {
            if app.query_cursor < app.query_input.chars().count() {
                let byte_pos = char_to_byte_index(&app.query_input, app.query_cursor);
                app.query_input.remove(byte_pos);
            }
        }
        KeyCode::Left => app.query_cursor = app.query_cursor.saturating_sub(1),
        KeyCode::Right => {
            app.query_cursor = (app.query_cursor + 1).min(app.query_input.chars().count());
        }
        KeyCode::Home => app.query_cursor = 0,
        KeyCode::End => app.query_cursor = app.query_input.chars().count(),
        KeyCode::Char(c) => {
            let byte_pos = char_to_byte_index(&app.query_input, app.query_cursor);
            app.query_input.insert(byte_pos, c);
            app.query_cursor += 1;
        }
        _ => {}
    }
}

fn point_in_rect(x: u16, y: u16, rect: Rect) -> bool {
    x >= rect.x && x < rect.x + rect.width && y >= rect.y && y < rect.y + rect.height
}

fn handle_mouse(app: &mut App, mouse: MouseEvent) {
    let in_chat = app
        .chat_area
        .map(|r| point_in_rect(mouse.column, mouse.row, r))
        .unwrap_or(false);
    if !in_chat {
        return;
    }

    match mouse.kind {
        MouseEventKind::ScrollDown => {
            for _ in 0..3 {
                app.scroll_down();
            }
        }
        MouseEventKind::ScrollUp => {
            for _ in 0..3 {
                app.scroll_up();
            }
        }
        _ => {}
    }
}
