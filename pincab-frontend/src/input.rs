// Copyright 2024 Colin Marc <hi@colinmarc.com>
//
// SPDX-License-Identifier: MIT

//! The input dispatcher: per-frame event routing, modal gating, and the
//! debounce rules around external launches. It turns low-level events into
//! [`Command`]s; the application applies their effects.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use pincab_model::input::InputEvent;
use pincab_model::keybinds::{Action, KeybindStore};
use pincab_model::TableRecord;
use rand::Rng;
use tracing::debug;

use crate::sound::UiSound;

/// Input is ignored for this long after an external app returns.
pub const EXTERNAL_APP_DEBOUNCE: Duration = Duration::from_millis(500);

/// Two clicks within this window commit the window layout.
pub const DOUBLE_CLICK_WINDOW: Duration = Duration::from_millis(300);

/// The exclusive UI states. Toggles are state transitions; each state
/// honours a different subset of actions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UiState {
    LoadingTables,
    Normal,
    ConfigOpen,
    EditorOpen,
    CatalogOpen,
    ExternalAppActive,
}

/// A side effect for the application to carry out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Navigate to a table and load its assets.
    LoadTable { index: usize, sound: UiSound },
    /// Launch the external player for a table.
    Launch { index: usize },
    /// Enter screenshot mode for a table.
    Screenshot { index: usize },
    /// A modal was opened or closed; play the panel sound.
    ModalToggled,
    /// Toggle the metadata overlay panel.
    ToggleMetadataPanel,
    /// Persist the current window geometry into settings.
    CommitWindowLayout,
    Quit,
}

pub struct InputDispatcher {
    state: UiState,
    last_external_return: Option<Instant>,
    last_clicks: HashMap<u64, Instant>,
}

impl InputDispatcher {
    pub fn new() -> Self {
        InputDispatcher {
            state: UiState::LoadingTables,
            last_external_return: None,
            last_clicks: HashMap::new(),
        }
    }

    pub fn state(&self) -> UiState {
        self.state
    }

    pub fn tables_loading(&mut self) {
        self.state = UiState::LoadingTables;
    }

    pub fn tables_loaded(&mut self) {
        if self.state == UiState::LoadingTables {
            self.state = UiState::Normal;
        }
    }

    /// Called when the launch or screenshot process has finished and media
    /// is resumed; starts the debounce window.
    pub fn external_app_returned(&mut self, now: Instant) {
        self.state = UiState::Normal;
        self.last_external_return = Some(now);
    }

    fn debouncing(&self, now: Instant) -> bool {
        self.last_external_return
            .is_some_and(|at| now.duration_since(at) < EXTERNAL_APP_DEBOUNCE)
    }

    /// Routes one input event, honouring the current state's action subset.
    pub fn handle_event(
        &mut self,
        event: &InputEvent,
        keybinds: &KeybindStore,
        tables: &[TableRecord],
        current_index: usize,
        now: Instant,
    ) -> Option<Command> {
        match self.state {
            UiState::LoadingTables => {
                if keybinds.is_action(event, Action::Quit) {
                    return Some(Command::Quit);
                }
                None
            }
            UiState::ExternalAppActive => None,
            _ if self.debouncing(now) => None,
            UiState::ConfigOpen => {
                if keybinds.is_action(event, Action::ToggleConfig)
                    || keybinds.is_action(event, Action::Quit)
                {
                    self.state = UiState::Normal;
                    return Some(Command::ModalToggled);
                }
                None
            }
            UiState::EditorOpen => {
                if keybinds.is_action(event, Action::ToggleEditor)
                    || keybinds.is_action(event, Action::Quit)
                {
                    self.state = UiState::Normal;
                    return Some(Command::ModalToggled);
                }
                // The editor keeps table navigation live so the user can
                // scan while editing.
                if keybinds.is_action(event, Action::PreviousTable) {
                    return navigate(tables, current_index, -1, UiSound::ScrollNormal);
                }
                if keybinds.is_action(event, Action::NextTable) {
                    return navigate(tables, current_index, 1, UiSound::ScrollNormal);
                }
                None
            }
            UiState::CatalogOpen => {
                if keybinds.is_action(event, Action::ToggleCatalog)
                    || keybinds.is_action(event, Action::Quit)
                {
                    self.state = UiState::Normal;
                    return Some(Command::ModalToggled);
                }
                None
            }
            UiState::Normal => self.handle_normal(event, keybinds, tables, current_index),
        }
    }

    fn handle_normal(
        &mut self,
        event: &InputEvent,
        keybinds: &KeybindStore,
        tables: &[TableRecord],
        current_index: usize,
    ) -> Option<Command> {
        let action = Action::ALL.into_iter().find(|action| {
            // These two belong to the screenshot sub-mode.
            !matches!(action, Action::ScreenshotKey | Action::ScreenshotQuit)
                && keybinds.is_action(event, *action)
        })?;

        debug!(action = action.label(), "triggering action");

        match action {
            Action::PreviousTable => navigate(tables, current_index, -1, UiSound::ScrollNormal),
            Action::NextTable => navigate(tables, current_index, 1, UiSound::ScrollNormal),
            Action::FastPreviousTable => navigate(tables, current_index, -10, UiSound::ScrollFast),
            Action::FastNextTable => navigate(tables, current_index, 10, UiSound::ScrollFast),
            Action::JumpPreviousLetter => {
                jump_letter(tables, current_index, false).map(|index| Command::LoadTable {
                    index,
                    sound: UiSound::ScrollJump,
                })
            }
            Action::JumpNextLetter => {
                jump_letter(tables, current_index, true).map(|index| Command::LoadTable {
                    index,
                    sound: UiSound::ScrollJump,
                })
            }
            Action::RandomTable => {
                if tables.is_empty() {
                    return None;
                }
                let index = rand::thread_rng().gen_range(0..tables.len());
                if index == current_index {
                    return None;
                }
                Some(Command::LoadTable {
                    index,
                    sound: UiSound::ScrollRandom,
                })
            }
            Action::LaunchTable => {
                if tables.is_empty() {
                    return None;
                }
                self.state = UiState::ExternalAppActive;
                Some(Command::Launch {
                    index: current_index,
                })
            }
            Action::ScreenshotMode => {
                if tables.is_empty() {
                    return None;
                }
                self.state = UiState::ExternalAppActive;
                Some(Command::Screenshot {
                    index: current_index,
                })
            }
            Action::ToggleConfig => {
                self.state = UiState::ConfigOpen;
                Some(Command::ModalToggled)
            }
            Action::ToggleEditor => {
                self.state = UiState::EditorOpen;
                Some(Command::ModalToggled)
            }
            Action::ToggleCatalog => {
                self.state = UiState::CatalogOpen;
                Some(Command::ModalToggled)
            }
            Action::ToggleMetadata => Some(Command::ToggleMetadataPanel),
            Action::Quit => Some(Command::Quit),
            Action::ScreenshotKey | Action::ScreenshotQuit => unreachable!(),
        }
    }

    /// Left-button clicks on window chrome. A double click within the
    /// window commits the current geometry; the click pair is consumed, so
    /// a third click starts a fresh pair.
    pub fn handle_click(&mut self, window: u64, now: Instant) -> Option<Command> {
        if self.state != UiState::Normal || self.debouncing(now) {
            return None;
        }

        match self.last_clicks.get(&window) {
            Some(first) if now.duration_since(*first) <= DOUBLE_CLICK_WINDOW => {
                debug!(window, "double click, committing window layout");
                self.last_clicks.remove(&window);
                Some(Command::CommitWindowLayout)
            }
            _ => {
                self.last_clicks.insert(window, now);
                None
            }
        }
    }
}

impl Default for InputDispatcher {
    fn default() -> Self {
        Self::new()
    }
}

fn navigate(
    tables: &[TableRecord],
    current: usize,
    step: i64,
    sound: UiSound,
) -> Option<Command> {
    if tables.is_empty() {
        return None;
    }

    let len = tables.len() as i64;
    let index = (current as i64 + step).rem_euclid(len) as usize;
    if index == current {
        return None;
    }

    Some(Command::LoadTable { index, sound })
}

/// The first character of a title, uppercased, when it's a letter or digit.
fn jump_key(title: &str) -> Option<char> {
    let c = title.chars().next()?;
    c.is_ascii_alphanumeric().then(|| c.to_ascii_uppercase())
}

/// Finds the next table whose first character sorts after (or before) the
/// current one, wrapping to the first valid title when exhausted. Empty
/// titles are skipped.
fn jump_letter(tables: &[TableRecord], current: usize, forward: bool) -> Option<usize> {
    let current_key = jump_key(&tables.get(current)?.title)?;

    let found = if forward {
        tables
            .iter()
            .enumerate()
            .skip(current + 1)
            .find(|(_, t)| jump_key(&t.title).is_some_and(|k| k > current_key))
            .map(|(i, _)| i)
            .or_else(|| {
                tables
                    .iter()
                    .position(|t| jump_key(&t.title).is_some())
            })
    } else {
        tables
            .iter()
            .enumerate()
            .take(current)
            .rev()
            .find(|(_, t)| jump_key(&t.title).is_some_and(|k| k < current_key))
            .map(|(i, _)| i)
            .or_else(|| {
                tables
                    .iter()
                    .rposition(|t| jump_key(&t.title).is_some())
            })
    };

    found.filter(|i| *i != current)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pincab_model::input::Key;
    use pretty_assertions::assert_eq;

    fn tables(titles: &[&str]) -> Vec<TableRecord> {
        titles
            .iter()
            .map(|t| TableRecord {
                title: t.to_string(),
                ..Default::default()
            })
            .collect()
    }

    fn press(key: Key) -> InputEvent {
        InputEvent::KeyDown(key)
    }

    fn ready_dispatcher() -> InputDispatcher {
        let mut d = InputDispatcher::new();
        d.tables_loaded();
        d
    }

    #[test]
    fn previous_from_zero_wraps_to_last() {
        let tables = tables(&["Aladdin", "Medieval Madness", "T2"]);
        let cmd = navigate(&tables, 0, -1, UiSound::ScrollNormal).unwrap();
        assert_eq!(
            cmd,
            Command::LoadTable {
                index: 2,
                sound: UiSound::ScrollNormal
            }
        );
    }

    #[test]
    fn next_wraps_around() {
        let tables = tables(&["Aladdin", "Medieval Madness", "T2"]);
        assert_eq!(
            navigate(&tables, 2, 1, UiSound::ScrollNormal),
            Some(Command::LoadTable {
                index: 0,
                sound: UiSound::ScrollNormal
            })
        );
    }

    #[test]
    fn jump_next_letter_finds_the_next_initial() {
        let tables = tables(&["Aladdin", "Attack from Mars", "Medieval Madness", "T2"]);
        assert_eq!(jump_letter(&tables, 0, true), Some(2));
        assert_eq!(jump_letter(&tables, 2, true), Some(3));
    }

    #[test]
    fn jump_next_letter_wraps_from_the_greatest() {
        let tables = tables(&["Aladdin", "Medieval Madness", "T2"]);
        assert_eq!(jump_letter(&tables, 2, true), Some(0));
    }

    #[test]
    fn jump_skips_empty_titles() {
        let tables = tables(&["Aladdin", "", "T2"]);
        assert_eq!(jump_letter(&tables, 0, true), Some(2));
    }

    #[test]
    fn jump_previous_finds_a_smaller_initial() {
        let tables = tables(&["Aladdin", "Medieval Madness", "T2"]);
        assert_eq!(jump_letter(&tables, 2, false), Some(1));
        assert_eq!(jump_letter(&tables, 1, false), Some(0));
    }

    #[test]
    fn launch_enters_external_state_and_blocks_input() {
        let mut d = ready_dispatcher();
        let keybinds = KeybindStore::default();
        let tables = tables(&["Aladdin"]);
        let now = Instant::now();

        let cmd = d.handle_event(&press(Key::Return), &keybinds, &tables, 0, now);
        assert_eq!(cmd, Some(Command::Launch { index: 0 }));
        assert_eq!(d.state(), UiState::ExternalAppActive);

        // Everything is ignored while the external app runs.
        let cmd = d.handle_event(&press(Key::RightShift), &keybinds, &tables, 0, now);
        assert_eq!(cmd, None);
    }

    #[test]
    fn debounce_window_after_return() {
        let mut d = ready_dispatcher();
        let keybinds = KeybindStore::default();
        let tables = tables(&["Aladdin", "T2"]);
        let returned = Instant::now();

        d.state = UiState::ExternalAppActive;
        d.external_app_returned(returned);

        let blocked = d.handle_event(
            &press(Key::RightShift),
            &keybinds,
            &tables,
            0,
            returned + Duration::from_millis(499),
        );
        assert_eq!(blocked, None);

        let allowed = d.handle_event(
            &press(Key::RightShift),
            &keybinds,
            &tables,
            0,
            returned + Duration::from_millis(501),
        );
        assert_eq!(
            allowed,
            Some(Command::LoadTable {
                index: 1,
                sound: UiSound::ScrollNormal
            })
        );
    }

    #[test]
    fn loading_state_only_honours_quit() {
        let mut d = InputDispatcher::new();
        let keybinds = KeybindStore::default();
        let tables = tables(&["Aladdin"]);
        let now = Instant::now();

        assert_eq!(
            d.handle_event(&press(Key::RightShift), &keybinds, &tables, 0, now),
            None
        );
        assert_eq!(
            d.handle_event(&press(Key::Q), &keybinds, &tables, 0, now),
            Some(Command::Quit)
        );
    }

    #[test]
    fn config_modal_gates_navigation() {
        let mut d = ready_dispatcher();
        let keybinds = KeybindStore::default();
        let tables = tables(&["Aladdin", "T2"]);
        let now = Instant::now();

        d.handle_event(&press(Key::C), &keybinds, &tables, 0, now);
        assert_eq!(d.state(), UiState::ConfigOpen);

        assert_eq!(
            d.handle_event(&press(Key::RightShift), &keybinds, &tables, 0, now),
            None
        );

        // Quit closes the modal rather than the app.
        assert_eq!(
            d.handle_event(&press(Key::Q), &keybinds, &tables, 0, now),
            Some(Command::ModalToggled)
        );
        assert_eq!(d.state(), UiState::Normal);
    }

    #[test]
    fn editor_modal_keeps_navigation_live() {
        let mut d = ready_dispatcher();
        let keybinds = KeybindStore::default();
        let tables = tables(&["Aladdin", "T2"]);
        let now = Instant::now();

        d.handle_event(&press(Key::E), &keybinds, &tables, 0, now);
        assert_eq!(d.state(), UiState::EditorOpen);

        assert_eq!(
            d.handle_event(&press(Key::RightShift), &keybinds, &tables, 0, now),
            Some(Command::LoadTable {
                index: 1,
                sound: UiSound::ScrollNormal
            })
        );
    }

    #[test]
    fn double_click_commits_once() {
        let mut d = ready_dispatcher();
        let start = Instant::now();

        assert_eq!(d.handle_click(7, start), None);
        assert_eq!(
            d.handle_click(7, start + Duration::from_millis(200)),
            Some(Command::CommitWindowLayout)
        );

        // A third click within 300ms of the first does not re-commit.
        assert_eq!(d.handle_click(7, start + Duration::from_millis(250)), None);
    }

    #[test]
    fn clicks_on_different_windows_do_not_pair() {
        let mut d = ready_dispatcher();
        let start = Instant::now();

        assert_eq!(d.handle_click(1, start), None);
        assert_eq!(d.handle_click(2, start + Duration::from_millis(100)), None);
    }
}
