//! Edge detection for the four front-panel keys.
//!
//! Levels are sampled once per menu tick. A key that is down on both of the
//! last two samples is held, down only now is pressed, down only before is
//! released.

use serde::Deserialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Button {
    Up,
    Down,
    Set,
    Power,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ButtonEvent {
    Idle,
    Pressed,
    Held,
    Released,
}

/// Raw key levels, `true` while the key is down.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
pub struct ButtonLevels {
    #[serde(default)]
    pub up: bool,
    #[serde(default)]
    pub down: bool,
    #[serde(default)]
    pub set: bool,
    #[serde(default)]
    pub power: bool,
}

impl ButtonLevels {
    fn get(&self, button: Button) -> bool {
        match button {
            Button::Up => self.up,
            Button::Down => self.down,
            Button::Set => self.set,
            Button::Power => self.power,
        }
    }

    pub fn any(&self) -> bool {
        self.up || self.down || self.set || self.power
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ButtonSampler {
    previous: ButtonLevels,
    current: ButtonLevels,
}

impl ButtonSampler {
    pub fn sample(&mut self, levels: ButtonLevels) {
        self.previous = self.current;
        self.current = levels;
    }

    pub fn event(&self, button: Button) -> ButtonEvent {
        match (self.previous.get(button), self.current.get(button)) {
            (false, false) => ButtonEvent::Idle,
            (false, true) => ButtonEvent::Pressed,
            (true, true) => ButtonEvent::Held,
            (true, false) => ButtonEvent::Released,
        }
    }

    pub fn pressed(&self, button: Button) -> bool {
        self.event(button) == ButtonEvent::Pressed
    }

    pub fn held(&self, button: Button) -> bool {
        self.event(button) == ButtonEvent::Held
    }

    pub fn released(&self, button: Button) -> bool {
        self.event(button) == ButtonEvent::Released
    }

    pub fn held_or_released(&self, button: Button) -> bool {
        self.previous.get(button)
    }

    /// Any key down now or on the previous sample.
    pub fn active(&self) -> bool {
        self.previous.any() || self.current.any()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn up(down: bool) -> ButtonLevels {
        ButtonLevels {
            up: down,
            ..ButtonLevels::default()
        }
    }

    #[test]
    fn press_hold_release_sequence() {
        let mut sampler = ButtonSampler::default();
        sampler.sample(up(true));
        assert_eq!(sampler.event(Button::Up), ButtonEvent::Pressed);
        sampler.sample(up(true));
        assert_eq!(sampler.event(Button::Up), ButtonEvent::Held);
        assert!(sampler.held_or_released(Button::Up));
        sampler.sample(up(false));
        assert_eq!(sampler.event(Button::Up), ButtonEvent::Released);
        assert!(sampler.held_or_released(Button::Up));
        sampler.sample(up(false));
        assert_eq!(sampler.event(Button::Up), ButtonEvent::Idle);
        assert!(!sampler.active());
    }

    #[test]
    fn keys_are_independent() {
        let mut sampler = ButtonSampler::default();
        sampler.sample(ButtonLevels {
            set: true,
            ..ButtonLevels::default()
        });
        assert!(sampler.pressed(Button::Set));
        assert_eq!(sampler.event(Button::Down), ButtonEvent::Idle);
    }
}
