//! Front-panel menu state machine, stepped once per 100 ms tick.

use crate::{
    buttons::{Button, ButtonSampler},
    display::{run_mode_row, text_row, version_row, Display, Glyph},
    params::{Param, PARAMS, PARAM_COUNT},
    store::{
        clamp, kind_of, menu_address, parameter_addr, step_setpoint_addr, ConfigStore,
        StoreBackend, NO_OF_PROFILES, PROFILE_SIZE,
    },
};

/// Ticks the power key must stay down before power toggles.
pub const TMR_POWERDOWN: u8 = 30;
/// Ticks each page of the down-key carousel stays up.
pub const TMR_SHOW_PROFILE_ITEM: u8 = 15;
/// Ticks without a key before an open menu closes.
pub const TMR_NO_KEY_TIMEOUT: u8 = 150;
/// Value changes at +/-1 before acceleration kicks in.
pub const TMR_KEY_ACC: i8 = 20;

/// Menu item that holds the parameters rather than a profile.
pub const PARAMETER_MENU: usize = NO_OF_PROFILES;
/// Number of idle views cycled by a short power press.
pub const IDLE_VIEWS: u8 = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MenuState {
    Idle,
    PowerDownConfirm,
    ShowVersion,
    ShowRunModeDown,
    ShowStepDown,
    ShowDurationDown,
    ShowMenuItem,
    SelectMenuItem,
    ShowConfigItem,
    EditConfigItem,
    ShowConfigValue,
    EditConfigValue,
}

impl MenuState {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "IDLE",
            Self::PowerDownConfirm => "POWER_DOWN_CONFIRM",
            Self::ShowVersion => "SHOW_VERSION",
            Self::ShowRunModeDown => "SHOW_RUN_MODE",
            Self::ShowStepDown => "SHOW_STEP",
            Self::ShowDurationDown => "SHOW_DURATION",
            Self::ShowMenuItem => "SHOW_MENU_ITEM",
            Self::SelectMenuItem => "SELECT_MENU_ITEM",
            Self::ShowConfigItem => "SHOW_CONFIG_ITEM",
            Self::EditConfigItem => "EDIT_CONFIG_ITEM",
            Self::ShowConfigValue => "SHOW_CONFIG_VALUE",
            Self::EditConfigValue => "EDIT_CONFIG_VALUE",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MenuEvent {
    PowerToggled(bool),
    ValueCommitted { addr: usize, value: i16 },
}

#[derive(Debug, Clone)]
pub struct Menu {
    state: MenuState,
    return_state: MenuState,
    menu_item: usize,
    config_item: usize,
    countdown: u8,
    config_value: i16,
    key_held_tmr: i8,
    idle_view: u8,
}

impl Default for Menu {
    fn default() -> Self {
        Self::new()
    }
}

impl Menu {
    pub fn new() -> Self {
        Self {
            state: MenuState::Idle,
            return_state: MenuState::Idle,
            menu_item: 0,
            config_item: 0,
            countdown: 0,
            config_value: 0,
            key_held_tmr: TMR_KEY_ACC,
            idle_view: 0,
        }
    }

    pub fn state(&self) -> MenuState {
        self.state
    }

    pub fn is_idle(&self) -> bool {
        self.state == MenuState::Idle
    }

    pub fn menu_item(&self) -> usize {
        self.menu_item
    }

    pub fn config_item(&self) -> usize {
        self.config_item
    }

    pub fn config_value(&self) -> i16 {
        self.config_value
    }

    /// 0 = temperature, 1 = secondary probe, 2 = one-wire, 3 = PID output.
    pub fn idle_view(&self) -> u8 {
        self.idle_view
    }

    fn address(&self) -> usize {
        menu_address(self.menu_item, self.config_item)
    }

    fn in_profile(&self) -> bool {
        self.menu_item < PARAMETER_MENU
    }

    pub fn tick<B: StoreBackend>(
        &mut self,
        keys: &ButtonSampler,
        store: &mut ConfigStore<B>,
        display: &mut Display,
    ) -> Option<MenuEvent> {
        self.countdown = self.countdown.saturating_sub(1);
        let mut event = None;

        match self.state {
            MenuState::Idle => {
                if keys.pressed(Button::Power) {
                    self.countdown = TMR_POWERDOWN;
                    self.state = MenuState::PowerDownConfirm;
                } else if store.power_on() && keys.active() {
                    if keys.pressed(Button::Up) {
                        self.state = MenuState::ShowVersion;
                    } else if keys.pressed(Button::Down) {
                        self.countdown = TMR_SHOW_PROFILE_ITEM;
                        self.state = MenuState::ShowRunModeDown;
                    } else if keys.released(Button::Set) {
                        self.state = MenuState::ShowMenuItem;
                    }
                }
            }
            MenuState::PowerDownConfirm => {
                if self.countdown == 0 {
                    let on = !store.power_on();
                    store.set_power_on(on);
                    event = Some(MenuEvent::PowerToggled(on));
                    self.state = MenuState::Idle;
                } else if !keys.held(Button::Power) {
                    self.idle_view = (self.idle_view + 1) % IDLE_VIEWS;
                    self.state = MenuState::Idle;
                }
            }
            MenuState::ShowVersion => {
                display.top = text_row("uEr");
                display.bottom = version_row();
                if !keys.held(Button::Up) {
                    self.state = MenuState::Idle;
                }
            }
            MenuState::ShowRunModeDown => {
                let run_mode = store.param(Param::RunMode);
                display.top = text_row("run");
                display.bottom = run_mode_row(run_mode, store.flag(Param::PidTs));
                if run_mode < NO_OF_PROFILES as i16 && self.countdown == 0 {
                    self.countdown = TMR_SHOW_PROFILE_ITEM;
                    self.state = MenuState::ShowStepDown;
                }
                self.leave_carousel_on_release(keys);
            }
            MenuState::ShowStepDown => {
                display.top = text_row("St");
                display.set_bottom_value(store.param(Param::ProfileStep), false);
                if self.countdown == 0 {
                    self.countdown = TMR_SHOW_PROFILE_ITEM;
                    self.state = MenuState::ShowDurationDown;
                }
                self.leave_carousel_on_release(keys);
            }
            MenuState::ShowDurationDown => {
                display.top = text_row("dh");
                display.set_bottom_value(store.param(Param::ProfileDuration), false);
                if self.countdown == 0 {
                    self.countdown = TMR_SHOW_PROFILE_ITEM;
                    self.state = MenuState::ShowRunModeDown;
                }
                self.leave_carousel_on_release(keys);
            }
            MenuState::ShowMenuItem => {
                display.top = text_row("SEt");
                display.bottom = if self.in_profile() {
                    run_mode_row(self.menu_item as i16, false)
                } else {
                    text_row("PAr")
                };
                self.countdown = TMR_NO_KEY_TIMEOUT;
                self.state = MenuState::SelectMenuItem;
            }
            MenuState::SelectMenuItem => {
                if self.countdown == 0 || keys.released(Button::Power) {
                    self.state = MenuState::Idle;
                } else if keys.released(Button::Up) {
                    self.menu_item = (self.menu_item + 1) % (PARAMETER_MENU + 1);
                    self.state = MenuState::ShowMenuItem;
                } else if keys.released(Button::Down) {
                    self.menu_item = (self.menu_item + PARAMETER_MENU) % (PARAMETER_MENU + 1);
                    self.state = MenuState::ShowMenuItem;
                } else if keys.released(Button::Set) {
                    self.config_item = 0;
                    self.state = MenuState::ShowConfigItem;
                }
            }
            MenuState::ShowConfigItem => {
                display.top = if self.in_profile() {
                    let mut row = text_row(if self.config_item % 2 == 1 { "dh" } else { "SP" });
                    row[2] = Glyph::new(digit_char(self.config_item / 2));
                    row
                } else {
                    text_row(PARAMS[self.config_item].glyphs)
                };
                self.config_value = store.read_clamped(self.address());
                self.countdown = TMR_NO_KEY_TIMEOUT;
                self.return_state = MenuState::EditConfigItem;
                self.state = MenuState::ShowConfigValue;
            }
            MenuState::EditConfigItem => {
                if self.countdown == 0 {
                    self.state = MenuState::Idle;
                } else if keys.released(Button::Power) {
                    self.state = MenuState::ShowMenuItem;
                } else if keys.released(Button::Up) {
                    self.step_config_item(true, store);
                    self.return_state = MenuState::ShowConfigItem;
                    self.state = MenuState::ShowConfigValue;
                } else if keys.released(Button::Down) {
                    self.step_config_item(false, store);
                    self.return_state = MenuState::ShowConfigItem;
                    self.state = MenuState::ShowConfigValue;
                } else if keys.released(Button::Set) {
                    self.countdown = TMR_NO_KEY_TIMEOUT;
                    self.state = MenuState::EditConfigValue;
                }
                self.config_value = store.read_clamped(self.address());
            }
            MenuState::ShowConfigValue => {
                self.show_config_value(store, display);
                self.countdown = TMR_NO_KEY_TIMEOUT;
                self.state = self.return_state;
            }
            MenuState::EditConfigValue => {
                let addr = self.address();
                if self.countdown == 0 {
                    self.state = MenuState::Idle;
                } else if keys.released(Button::Power) {
                    self.state = MenuState::ShowConfigItem;
                } else if keys.held_or_released(Button::Up) {
                    self.adjust_value(1, addr, store);
                } else if keys.held_or_released(Button::Down) {
                    self.adjust_value(-1, addr, store);
                } else if keys.released(Button::Set) {
                    let value = self.commit(addr, store);
                    event = Some(MenuEvent::ValueCommitted { addr, value });
                    self.state = MenuState::ShowConfigItem;
                } else {
                    self.key_held_tmr = TMR_KEY_ACC;
                }
            }
        }

        event
    }

    fn leave_carousel_on_release(&mut self, keys: &ButtonSampler) {
        if !keys.held(Button::Down) {
            self.state = MenuState::Idle;
        }
    }

    fn step_config_item<B: StoreBackend>(&mut self, up: bool, store: &ConfigStore<B>) {
        let size = if self.in_profile() {
            PROFILE_SIZE
        } else {
            PARAM_COUNT
        };
        self.config_item = if up {
            (self.config_item + 1) % size
        } else {
            (self.config_item + size - 1) % size
        };
        if !self.in_profile() {
            self.skip_profile_fields(store);
        }
    }

    /// Step and elapsed-duration mean nothing in thermostat mode, so browsing jumps over them.
    fn skip_profile_fields<B: StoreBackend>(&mut self, store: &ConfigStore<B>) {
        if store.param(Param::RunMode) < NO_OF_PROFILES as i16 {
            return;
        }
        if self.config_item == Param::ProfileStep.ordinal() {
            self.config_item += 2;
        } else if self.config_item == Param::ProfileDuration.ordinal() {
            self.config_item -= 2;
        }
    }

    fn adjust_value<B: StoreBackend>(&mut self, delta: i32, addr: usize, store: &ConfigStore<B>) {
        let mut value = self.config_value as i32 + delta;
        let accelerate = value > 1000 || {
            self.key_held_tmr = self.key_held_tmr.saturating_sub(1);
            self.key_held_tmr < 0
        };
        if accelerate {
            value += 9 * delta;
        }
        self.config_value = clamp(value, kind_of(addr), store.units());
        self.return_state = MenuState::EditConfigValue;
        self.state = MenuState::ShowConfigValue;
    }

    fn commit<B: StoreBackend>(&mut self, addr: usize, store: &mut ConfigStore<B>) -> i16 {
        if addr == parameter_addr(Param::RunMode) {
            store.write_param(Param::ProfileStep, 0);
            store.write_param(Param::ProfileDuration, 0);
            if self.config_value < NO_OF_PROFILES as i16 {
                let first_step = step_setpoint_addr(self.config_value as usize, 0);
                store.write_param(Param::Setpoint, store.read(first_step) as i32);
                if store.read(first_step + 1) == 0 {
                    self.config_value = NO_OF_PROFILES as i16;
                }
            }
        }
        store.write(addr, self.config_value as i32)
    }

    fn show_config_value<B: StoreBackend>(&self, store: &ConfigStore<B>, display: &mut Display) {
        if self.in_profile() {
            display.set_bottom_value(self.config_value, self.config_item % 2 == 0);
            return;
        }
        let descriptor = &PARAMS[self.config_item];
        if descriptor.param == Param::RunMode {
            display.bottom = run_mode_row(self.config_value, store.flag(Param::PidTs));
        } else {
            display.set_bottom_value(self.config_value, descriptor.kind.is_temperature());
        }
    }
}

fn digit_char(value: usize) -> char {
    char::from_digit(value as u32 % 10, 10).unwrap_or(' ')
}
