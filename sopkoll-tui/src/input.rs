use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

use crate::app::{App, Screen};

#[derive(Debug, Clone, Copy)]
pub(crate) enum Action {
    None,
    Quit,
    /// Persist the highlighted address and load its schedule
    SelectAddress,
    /// Re-run the schedule fetch for the current address
    Refresh,
    /// Go back to the search screen to pick another address
    ChangeAddress,
    /// Grant reminder permission and arm the agent
    EnableNotifications,
    /// Activate the notification banner: close it, focus the schedule view
    OpenNotification,
}

pub(crate) fn handle_key_event(key: KeyEvent, app: &mut App) -> Action {
    use KeyCode::{Backspace, Char, Down, Enter, Esc, Up};

    // Ctrl-C always quits; plain 'q' only outside the text input screen.
    if key.code == Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
        return Action::Quit;
    }
    if key.code == Char('q')
        && key.modifiers.is_empty()
        && !matches!(app.screen, Screen::AddressSearch)
    {
        return Action::Quit;
    }

    // Banner activation works everywhere except the text input screen,
    // where 'o' has to stay typeable.
    if key.code == Char('o')
        && app.banner.is_some()
        && !matches!(app.screen, Screen::AddressSearch)
    {
        return Action::OpenNotification;
    }

    let mut action = Action::None;

    match app.screen {
        Screen::MunicipalitySelect => match key.code {
            Up | Char('k') => {
                if app.municipality_list_index > 0 {
                    app.municipality_list_index -= 1;
                }
            }
            Down | Char('j') => {
                if app.municipality_list_index + 1 < app.municipalities.len() {
                    app.municipality_list_index += 1;
                }
            }
            Enter | Char(' ') => {
                app.select_current_municipality();
            }
            _ => {}
        },

        Screen::AddressSearch => match key.code {
            Up => {
                if app.search_list_index > 0 {
                    app.search_list_index -= 1;
                }
            }
            Down => {
                if app.search_list_index + 1 < app.search_results.len() {
                    app.search_list_index += 1;
                }
            }
            Char(character) => {
                if !key.modifiers.contains(KeyModifiers::CONTROL)
                    && !key.modifiers.contains(KeyModifiers::ALT)
                {
                    app.search_input.push(character);
                    app.note_query_edited();
                }
            }
            Backspace => {
                app.search_input.pop();
                app.note_query_edited();
            }
            Enter => {
                action = Action::SelectAddress;
            }
            Esc => {
                if app.selected_address.is_some() {
                    // Cancel changing the address, keep the old schedule.
                    app.screen = Screen::ScheduleView;
                } else {
                    app.search_input.clear();
                    app.search_results.clear();
                    app.search_list_index = 0;
                }
            }
            _ => {}
        },

        Screen::ScheduleView => match key.code {
            Char('r') => {
                action = Action::Refresh;
            }
            Char('a') => {
                action = Action::ChangeAddress;
            }
            Char('n') => {
                action = Action::EnableNotifications;
            }
            _ => {}
        },
    }
    action
}
