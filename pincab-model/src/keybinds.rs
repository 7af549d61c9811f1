// Copyright 2024 Colin Marc <hi@colinmarc.com>
//
// SPDX-License-Identifier: MIT

use std::collections::BTreeMap;

use thiserror::Error;
use tracing::error;

use crate::input::{HatDirection, InputEvent, Key};

/// Axis deadband: an axis event only registers as a press past this
/// magnitude (out of the i16 range of 32768).
pub const AXIS_THRESHOLD: i16 = 16384;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Action {
    PreviousTable,
    NextTable,
    FastPreviousTable,
    FastNextTable,
    JumpPreviousLetter,
    JumpNextLetter,
    RandomTable,
    LaunchTable,
    ScreenshotMode,
    ScreenshotKey,
    ScreenshotQuit,
    ToggleConfig,
    ToggleEditor,
    ToggleCatalog,
    ToggleMetadata,
    Quit,
}

impl Action {
    pub const ALL: [Action; 16] = [
        Action::PreviousTable,
        Action::NextTable,
        Action::FastPreviousTable,
        Action::FastNextTable,
        Action::JumpPreviousLetter,
        Action::JumpNextLetter,
        Action::RandomTable,
        Action::LaunchTable,
        Action::ScreenshotMode,
        Action::ScreenshotKey,
        Action::ScreenshotQuit,
        Action::ToggleConfig,
        Action::ToggleEditor,
        Action::ToggleCatalog,
        Action::ToggleMetadata,
        Action::Quit,
    ];

    /// The label used in the persisted keybinds section.
    pub fn label(&self) -> &'static str {
        match self {
            Action::PreviousTable => "Previous Table",
            Action::NextTable => "Next Table",
            Action::FastPreviousTable => "Fast Previous Table",
            Action::FastNextTable => "Fast Next Table",
            Action::JumpPreviousLetter => "Jump Previous Letter",
            Action::JumpNextLetter => "Jump Next Letter",
            Action::RandomTable => "Random Table",
            Action::LaunchTable => "Launch Table",
            Action::ScreenshotMode => "Screenshot Mode",
            Action::ScreenshotKey => "Screenshot Key",
            Action::ScreenshotQuit => "Screenshot Quit",
            Action::ToggleConfig => "Toggle Config",
            Action::ToggleEditor => "Toggle Editor",
            Action::ToggleCatalog => "Toggle Catalog",
            Action::ToggleMetadata => "Toggle Metadata",
            Action::Quit => "Quit",
        }
    }

    pub fn from_label(s: &str) -> Option<Action> {
        Action::ALL.into_iter().find(|a| a.label() == s)
    }
}

/// One input an action is bound to. Each action has exactly one binding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Binding {
    Key(Key),
    Button { joystick: u32, button: u8 },
    Hat { joystick: u32, hat: u8, direction: HatDirection },
    Axis { joystick: u32, axis: u8, positive: bool },
}

#[derive(Debug, Error)]
#[error("unrecognized binding token {token:?}")]
pub struct BindingParseError {
    pub token: String,
}

impl Binding {
    pub fn matches(&self, event: &InputEvent) -> bool {
        match (self, event) {
            (Binding::Key(key), InputEvent::KeyDown(pressed)) => key == pressed,
            (
                Binding::Button { joystick, button },
                InputEvent::ButtonDown {
                    joystick: ev_joystick,
                    button: ev_button,
                },
            ) => joystick == ev_joystick && button == ev_button,
            (
                Binding::Hat {
                    joystick,
                    hat,
                    direction,
                },
                InputEvent::HatMotion {
                    joystick: ev_joystick,
                    hat: ev_hat,
                    direction: ev_direction,
                },
            ) => joystick == ev_joystick && hat == ev_hat && direction == ev_direction,
            (
                Binding::Axis {
                    joystick,
                    axis,
                    positive,
                },
                InputEvent::AxisMotion {
                    joystick: ev_joystick,
                    axis: ev_axis,
                    value,
                },
            ) => {
                joystick == ev_joystick
                    && axis == ev_axis
                    && if *positive {
                        *value > AXIS_THRESHOLD
                    } else {
                        *value < -AXIS_THRESHOLD
                    }
            }
            _ => false,
        }
    }

    /// The canonical string stored in the settings document.
    pub fn to_binding_string(&self) -> String {
        match self {
            Binding::Key(key) => key.name().to_owned(),
            Binding::Button { joystick, button } => {
                format!("JOY_{}_BUTTON_{}", joystick, button)
            }
            Binding::Hat {
                joystick,
                hat,
                direction,
            } => format!("JOY_{}_HAT_{}_{}", joystick, hat, direction.name()),
            Binding::Axis {
                joystick,
                axis,
                positive,
            } => format!(
                "JOY_{}_AXIS_{}_{}",
                joystick,
                axis,
                if *positive { "POSITIVE" } else { "NEGATIVE" }
            ),
        }
    }

    pub fn parse(token: &str) -> Result<Binding, BindingParseError> {
        let err = || BindingParseError {
            token: token.to_owned(),
        };

        if let Some(rest) = token.strip_prefix("JOY_") {
            if let Some((joystick, spec)) = rest.split_once('_') {
                let joystick: u32 = joystick.parse().map_err(|_| err())?;

                if let Some(button) = spec.strip_prefix("BUTTON_") {
                    return Ok(Binding::Button {
                        joystick,
                        button: button.parse().map_err(|_| err())?,
                    });
                }

                if let Some(spec) = spec.strip_prefix("HAT_") {
                    let (hat, direction) = spec.split_once('_').ok_or_else(err)?;
                    return Ok(Binding::Hat {
                        joystick,
                        hat: hat.parse().map_err(|_| err())?,
                        direction: HatDirection::from_name(direction).ok_or_else(err)?,
                    });
                }

                if let Some(spec) = spec.strip_prefix("AXIS_") {
                    let (axis, sign) = spec.split_once('_').ok_or_else(err)?;
                    let positive = match sign {
                        "POSITIVE" => true,
                        "NEGATIVE" => false,
                        _ => return Err(err()),
                    };
                    return Ok(Binding::Axis {
                        joystick,
                        axis: axis.parse().map_err(|_| err())?,
                        positive,
                    });
                }
            }

            return Err(err());
        }

        Key::from_name(token).map(Binding::Key).ok_or_else(err)
    }

    /// The binding an event would produce when captured in a bind-assignment
    /// dialog. Axis motion below the deadband and diagonal hats produce
    /// nothing.
    pub fn for_event(event: &InputEvent) -> Option<Binding> {
        match *event {
            InputEvent::KeyDown(key) => Some(Binding::Key(key)),
            InputEvent::ButtonDown { joystick, button } => {
                Some(Binding::Button { joystick, button })
            }
            InputEvent::HatMotion {
                joystick,
                hat,
                direction,
            } => Some(Binding::Hat {
                joystick,
                hat,
                direction,
            }),
            InputEvent::AxisMotion {
                joystick,
                axis,
                value,
            } => {
                if value.unsigned_abs() > AXIS_THRESHOLD as u16 {
                    Some(Binding::Axis {
                        joystick,
                        axis,
                        positive: value > 0,
                    })
                } else {
                    None
                }
            }
        }
    }
}

/// The action-to-binding table, persisted in the `Keybinds` section.
#[derive(Debug, Clone, PartialEq)]
pub struct KeybindStore {
    bindings: BTreeMap<Action, Binding>,
}

impl Default for KeybindStore {
    fn default() -> Self {
        let mut bindings = BTreeMap::new();
        bindings.insert(Action::PreviousTable, Binding::Key(Key::LeftShift));
        bindings.insert(Action::NextTable, Binding::Key(Key::RightShift));
        bindings.insert(Action::FastPreviousTable, Binding::Key(Key::LeftCtrl));
        bindings.insert(Action::FastNextTable, Binding::Key(Key::RightCtrl));
        bindings.insert(Action::JumpPreviousLetter, Binding::Key(Key::Z));
        bindings.insert(Action::JumpNextLetter, Binding::Key(Key::Slash));
        bindings.insert(Action::RandomTable, Binding::Key(Key::R));
        bindings.insert(Action::LaunchTable, Binding::Key(Key::Return));
        bindings.insert(Action::ScreenshotMode, Binding::Key(Key::S));
        bindings.insert(Action::ScreenshotKey, Binding::Key(Key::S));
        bindings.insert(Action::ScreenshotQuit, Binding::Key(Key::Q));
        bindings.insert(Action::ToggleConfig, Binding::Key(Key::C));
        bindings.insert(Action::ToggleEditor, Binding::Key(Key::E));
        bindings.insert(Action::ToggleCatalog, Binding::Key(Key::N));
        bindings.insert(Action::ToggleMetadata, Binding::Key(Key::M));
        bindings.insert(Action::Quit, Binding::Key(Key::Q));
        KeybindStore { bindings }
    }
}

impl KeybindStore {
    pub fn binding(&self, action: Action) -> Binding {
        // The default table covers every action, so this lookup can't miss.
        *self
            .bindings
            .get(&action)
            .expect("keybind store missing an action")
    }

    pub fn set(&mut self, action: Action, binding: Binding) {
        self.bindings.insert(action, binding);
    }

    pub fn is_action(&self, event: &InputEvent, action: Action) -> bool {
        self.binding(action).matches(event)
    }

    /// The first action the event matches, in `Action::ALL` order.
    pub fn action_for(&self, event: &InputEvent) -> Option<Action> {
        Action::ALL
            .into_iter()
            .find(|action| self.is_action(event, *action))
    }

    /// Loads persisted bindings. Unknown actions or unparsable tokens keep
    /// the default and log; this never fails.
    pub fn load(&mut self, persisted: &BTreeMap<String, String>) {
        for (label, token) in persisted {
            let Some(action) = Action::from_label(label) else {
                error!(action = %label, "unknown keybind action, ignoring");
                continue;
            };

            match Binding::parse(token) {
                Ok(binding) => {
                    self.bindings.insert(action, binding);
                }
                Err(e) => {
                    error!(action = %label, "{}, keeping default", e);
                }
            }
        }
    }

    pub fn save(&self) -> BTreeMap<String, String> {
        self.bindings
            .iter()
            .map(|(action, binding)| {
                (action.label().to_owned(), binding.to_binding_string())
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn defaults_cover_every_action() {
        let store = KeybindStore::default();
        for action in Action::ALL {
            // Panics on a gap.
            store.binding(action);
        }
    }

    #[test]
    fn binding_string_round_trips_for_every_shape() {
        let bindings = [
            Binding::Key(Key::LeftShift),
            Binding::Key(Key::Slash),
            Binding::Button {
                joystick: 0,
                button: 3,
            },
            Binding::Hat {
                joystick: 1,
                hat: 0,
                direction: HatDirection::Left,
            },
            Binding::Axis {
                joystick: 2,
                axis: 1,
                positive: false,
            },
        ];

        for binding in bindings {
            let s = binding.to_binding_string();
            assert_eq!(Binding::parse(&s).unwrap(), binding, "{}", s);
        }
    }

    #[test]
    fn event_capture_round_trips() {
        let events = [
            InputEvent::KeyDown(Key::R),
            InputEvent::ButtonDown {
                joystick: 0,
                button: 7,
            },
            InputEvent::HatMotion {
                joystick: 0,
                hat: 0,
                direction: HatDirection::Up,
            },
            InputEvent::AxisMotion {
                joystick: 1,
                axis: 0,
                value: 20000,
            },
        ];

        for event in events {
            let binding = Binding::for_event(&event).unwrap();
            let parsed = Binding::parse(&binding.to_binding_string()).unwrap();
            assert_eq!(parsed, binding);
        }
    }

    #[test]
    fn axis_below_deadband_captures_nothing() {
        let event = InputEvent::AxisMotion {
            joystick: 0,
            axis: 0,
            value: 12000,
        };
        assert_eq!(Binding::for_event(&event), None);
    }

    #[test]
    fn axis_matching_respects_sign_and_deadband() {
        let binding = Binding::Axis {
            joystick: 0,
            axis: 1,
            positive: true,
        };

        let press = |value| InputEvent::AxisMotion {
            joystick: 0,
            axis: 1,
            value,
        };

        assert!(binding.matches(&press(20000)));
        assert!(!binding.matches(&press(16384)));
        assert!(!binding.matches(&press(-20000)));
    }

    #[test]
    fn load_keeps_default_on_bad_token() {
        let mut store = KeybindStore::default();
        let mut persisted = BTreeMap::new();
        persisted.insert("Launch Table".to_owned(), "JOY_x_BUTTON_2".to_owned());
        persisted.insert("Random Table".to_owned(), "JOY_0_BUTTON_5".to_owned());
        store.load(&persisted);

        assert_eq!(store.binding(Action::LaunchTable), Binding::Key(Key::Return));
        assert_eq!(
            store.binding(Action::RandomTable),
            Binding::Button {
                joystick: 0,
                button: 5
            }
        );
    }

    #[test]
    fn save_load_round_trips() {
        let mut store = KeybindStore::default();
        store.set(
            Action::NextTable,
            Binding::Hat {
                joystick: 0,
                hat: 0,
                direction: HatDirection::Right,
            },
        );

        let mut restored = KeybindStore::default();
        restored.load(&store.save());
        assert_eq!(restored, store);
    }
}
