// Copyright 2024 Colin Marc <hi@colinmarc.com>
//
// SPDX-License-Identifier: MIT

//! Backend-independent input events. The frontend translates winit and gilrs
//! events into these before they reach the keybind layer.

macro_rules! keys {
    ($($variant:ident => $name:literal,)+) => {
        /// A named keyboard key, decoupled from any windowing toolkit.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum Key {
            $($variant,)+
        }

        impl Key {
            pub const ALL: &'static [Key] = &[$(Key::$variant,)+];

            /// The canonical name used in the persisted keybind document.
            pub fn name(&self) -> &'static str {
                match self {
                    $(Key::$variant => $name,)+
                }
            }

            pub fn from_name(s: &str) -> Option<Key> {
                match s {
                    $($name => Some(Key::$variant),)+
                    _ => None,
                }
            }
        }
    };
}

keys! {
    A => "A", B => "B", C => "C", D => "D", E => "E", F => "F", G => "G",
    H => "H", I => "I", J => "J", K => "K", L => "L", M => "M", N => "N",
    O => "O", P => "P", Q => "Q", R => "R", S => "S", T => "T", U => "U",
    V => "V", W => "W", X => "X", Y => "Y", Z => "Z",
    Num0 => "0", Num1 => "1", Num2 => "2", Num3 => "3", Num4 => "4",
    Num5 => "5", Num6 => "6", Num7 => "7", Num8 => "8", Num9 => "9",
    F1 => "F1", F2 => "F2", F3 => "F3", F4 => "F4", F5 => "F5", F6 => "F6",
    F7 => "F7", F8 => "F8", F9 => "F9", F10 => "F10", F11 => "F11", F12 => "F12",
    Left => "Left", Right => "Right", Up => "Up", Down => "Down",
    Space => "Space", Return => "Return", Escape => "Escape", Tab => "Tab",
    Backspace => "Backspace", Delete => "Delete", Insert => "Insert",
    Home => "Home", End => "End", PageUp => "Page Up", PageDown => "Page Down",
    LeftShift => "Left Shift", RightShift => "Right Shift",
    LeftCtrl => "Left Ctrl", RightCtrl => "Right Ctrl",
    LeftAlt => "Left Alt", RightAlt => "Right Alt",
    LeftGui => "Left GUI", RightGui => "Right GUI",
    Minus => "-", Equals => "=", LeftBracket => "[", RightBracket => "]",
    Backslash => "\\", Semicolon => ";", Apostrophe => "'", Comma => ",",
    Period => ".", Slash => "/", Backquote => "`",
    CapsLock => "CapsLock", NumLock => "Numlock", PrintScreen => "PrintScreen",
    Pause => "Pause",
    Keypad0 => "Keypad 0", Keypad1 => "Keypad 1", Keypad2 => "Keypad 2",
    Keypad3 => "Keypad 3", Keypad4 => "Keypad 4", Keypad5 => "Keypad 5",
    Keypad6 => "Keypad 6", Keypad7 => "Keypad 7", Keypad8 => "Keypad 8",
    Keypad9 => "Keypad 9",
    KeypadPlus => "Keypad +", KeypadMinus => "Keypad -",
    KeypadMultiply => "Keypad *", KeypadDivide => "Keypad /",
    KeypadEnter => "Keypad Enter", KeypadPeriod => "Keypad .",
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HatDirection {
    Up,
    Down,
    Left,
    Right,
}

impl HatDirection {
    pub fn name(&self) -> &'static str {
        match self {
            HatDirection::Up => "UP",
            HatDirection::Down => "DOWN",
            HatDirection::Left => "LEFT",
            HatDirection::Right => "RIGHT",
        }
    }

    pub fn from_name(s: &str) -> Option<HatDirection> {
        match s {
            "UP" => Some(HatDirection::Up),
            "DOWN" => Some(HatDirection::Down),
            "LEFT" => Some(HatDirection::Left),
            "RIGHT" => Some(HatDirection::Right),
            _ => None,
        }
    }
}

/// A low-level input event, already reduced to press edges. Axis motion
/// carries the raw signed magnitude so the binding layer can apply its
/// deadband.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputEvent {
    KeyDown(Key),
    ButtonDown { joystick: u32, button: u8 },
    HatMotion { joystick: u32, hat: u8, direction: HatDirection },
    AxisMotion { joystick: u32, axis: u8, value: i16 },
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn key_names_round_trip() {
        for key in Key::ALL {
            assert_eq!(Key::from_name(key.name()), Some(*key));
        }
    }

    #[test]
    fn unknown_key_name_is_rejected() {
        assert_eq!(Key::from_name("Hyper"), None);
    }
}
