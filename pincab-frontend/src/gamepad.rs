// Copyright 2024 Colin Marc <hi@colinmarc.com>
//
// SPDX-License-Identifier: MIT

use gilrs::EventType;
use pincab_model::input::{HatDirection, InputEvent};
use tracing::{debug, error, trace};
use winit::event_loop::EventLoopProxy;

/// Spawns a thread that watches for joystick events and forwards them to
/// the event loop as [`InputEvent`]s.
pub fn spawn_gamepad_monitor<T>(proxy: EventLoopProxy<T>) -> anyhow::Result<()>
where
    T: From<InputEvent> + Send + 'static,
{
    let mut gilrs = gilrs::Gilrs::new()
        .map_err(|e| anyhow::anyhow!("failed to create gilrs context: {e:?}"))?;

    std::thread::Builder::new()
        .name("gamepad monitor".into())
        .spawn(move || loop {
            let Some(gilrs::Event { id, event: ev, .. }) = gilrs.next_event_blocking(None)
            else {
                continue;
            };

            trace!(?id, ?ev, "gamepad event");

            let joystick = usize::from(id) as u32;
            let translated = translate_event(joystick, ev);

            for event in translated {
                if proxy.send_event(event.into()).is_err() {
                    // Event loop is gone; we're shutting down.
                    return;
                }
            }
        })?;

    Ok(())
}

/// Translates a gilrs event into zero or more input events. The dpad comes
/// in as buttons or as an axis depending on the pad; both are normalised to
/// hat motion on hat 0, which is how bindings address them.
fn translate_event(joystick: u32, ev: EventType) -> Vec<InputEvent> {
    match ev {
        EventType::ButtonPressed(button, _) => {
            if let Some(direction) = dpad_direction(button) {
                return vec![InputEvent::HatMotion {
                    joystick,
                    hat: 0,
                    direction,
                }];
            }

            match button_index(button) {
                Some(button) => vec![InputEvent::ButtonDown { joystick, button }],
                None => {
                    debug!(?button, "ignoring unknown gamepad button");
                    vec![]
                }
            }
        }
        EventType::AxisChanged(axis, value, _) => {
            // Some pads report the dpad as an axis pair.
            if matches!(axis, gilrs::Axis::DPadX | gilrs::Axis::DPadY) {
                let direction = match (axis, value) {
                    (gilrs::Axis::DPadX, v) if v < 0.0 => Some(HatDirection::Left),
                    (gilrs::Axis::DPadX, v) if v > 0.0 => Some(HatDirection::Right),
                    (gilrs::Axis::DPadY, v) if v < 0.0 => Some(HatDirection::Down),
                    (gilrs::Axis::DPadY, v) if v > 0.0 => Some(HatDirection::Up),
                    _ => None,
                };

                return direction
                    .map(|direction| {
                        vec![InputEvent::HatMotion {
                            joystick,
                            hat: 0,
                            direction,
                        }]
                    })
                    .unwrap_or_default();
            }

            match axis_index(axis) {
                Some(axis) => vec![InputEvent::AxisMotion {
                    joystick,
                    axis,
                    value: axis_to_i16(value),
                }],
                None => vec![],
            }
        }
        EventType::Connected | EventType::Disconnected => {
            debug!(joystick, ?ev, "gamepad availability changed");
            vec![]
        }
        EventType::ButtonReleased(..)
        | EventType::ButtonRepeated(..)
        | EventType::ButtonChanged(..)
        | EventType::Dropped => vec![],
        other => {
            error!(?other, "unhandled gamepad event type");
            vec![]
        }
    }
}

/// Scales a normalised axis value into the i16 domain the binding deadband
/// is defined over.
fn axis_to_i16(value: f32) -> i16 {
    (value.clamp(-1.0, 1.0) * i16::MAX as f32) as i16
}

fn dpad_direction(button: gilrs::Button) -> Option<HatDirection> {
    match button {
        gilrs::Button::DPadUp => Some(HatDirection::Up),
        gilrs::Button::DPadDown => Some(HatDirection::Down),
        gilrs::Button::DPadLeft => Some(HatDirection::Left),
        gilrs::Button::DPadRight => Some(HatDirection::Right),
        _ => None,
    }
}

/// Stable button numbering for the persisted binding strings.
fn button_index(button: gilrs::Button) -> Option<u8> {
    let index = match button {
        gilrs::Button::South => 0,
        gilrs::Button::East => 1,
        gilrs::Button::North => 2,
        gilrs::Button::West => 3,
        gilrs::Button::LeftTrigger => 4,
        gilrs::Button::RightTrigger => 5,
        gilrs::Button::LeftTrigger2 => 6,
        gilrs::Button::RightTrigger2 => 7,
        gilrs::Button::Select => 8,
        gilrs::Button::Start => 9,
        gilrs::Button::Mode => 10,
        gilrs::Button::LeftThumb => 11,
        gilrs::Button::RightThumb => 12,
        gilrs::Button::C => 13,
        gilrs::Button::Z => 14,
        _ => return None,
    };

    Some(index)
}

fn axis_index(axis: gilrs::Axis) -> Option<u8> {
    let index = match axis {
        gilrs::Axis::LeftStickX => 0,
        gilrs::Axis::LeftStickY => 1,
        gilrs::Axis::LeftZ => 2,
        gilrs::Axis::RightStickX => 3,
        gilrs::Axis::RightStickY => 4,
        gilrs::Axis::RightZ => 5,
        _ => return None,
    };

    Some(index)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pincab_model::keybinds::AXIS_THRESHOLD;
    use pretty_assertions::assert_eq;

    #[test]
    fn dpad_buttons_map_to_hat_directions() {
        assert_eq!(
            dpad_direction(gilrs::Button::DPadLeft),
            Some(HatDirection::Left)
        );
        assert_eq!(dpad_direction(gilrs::Button::South), None);
    }

    #[test]
    fn axis_values_scale_to_i16() {
        assert_eq!(axis_to_i16(1.0), i16::MAX);
        assert_eq!(axis_to_i16(-1.0), -i16::MAX);
        assert_eq!(axis_to_i16(0.0), 0);
        // Values past the deadband must still be past it after scaling.
        assert!(axis_to_i16(0.9) > AXIS_THRESHOLD);
        assert!(axis_to_i16(-0.9) < -AXIS_THRESHOLD);
    }

    #[test]
    fn button_numbering_is_stable() {
        assert_eq!(button_index(gilrs::Button::South), Some(0));
        assert_eq!(button_index(gilrs::Button::Start), Some(9));
        assert_eq!(button_index(gilrs::Button::Unknown), None);
    }
}
