//! Address-mapped configuration store.
//!
//! The layout is six profiles of nineteen words each (nine setpoint/duration
//! pairs plus a final setpoint), then the parameter block, then one word for
//! the power-on flag. Every word is a signed 16-bit value.

use crate::{
    params::{Param, PARAMS, PARAM_COUNT},
    types::{Units, ValueKind},
};

pub const NO_OF_PROFILES: usize = 6;
pub const STEPS: usize = 9;
pub const PROFILE_SIZE: usize = 2 * STEPS + 1;
pub const PARAM_BASE: usize = NO_OF_PROFILES * PROFILE_SIZE;
pub const POWER_ON_ADDR: usize = PARAM_BASE + PARAM_COUNT;
pub const STORE_WORDS: usize = POWER_ON_ADDR + 1;

pub const DEFAULT_PROFILE: [i16; PROFILE_SIZE] = [
    160, 24, 170, 24, 180, 24, 190, 24, 200, 144, 250, 48, 40, 0, 0, 0, 0, 0, 0,
];

pub fn profile_base(profile: usize) -> usize {
    assert!(profile < NO_OF_PROFILES, "profile {profile} out of range");
    profile * PROFILE_SIZE
}

/// Setpoint slot of `step`. Step 9 addresses the final setpoint.
pub fn step_setpoint_addr(profile: usize, step: usize) -> usize {
    assert!(step <= STEPS, "step {step} out of range");
    profile_base(profile) + 2 * step
}

pub fn step_duration_addr(profile: usize, step: usize) -> usize {
    assert!(step < STEPS, "step {step} has no duration");
    step_setpoint_addr(profile, step) + 1
}

pub fn parameter_addr(param: Param) -> usize {
    PARAM_BASE + param.ordinal()
}

/// Address of `config_item` within menu item `menu_item` (profiles 0-5, 6 = parameters).
pub fn menu_address(menu_item: usize, config_item: usize) -> usize {
    menu_item * PROFILE_SIZE + config_item
}

/// Range kind of the word at `addr`.
pub fn kind_of(addr: usize) -> ValueKind {
    assert!(addr < STORE_WORDS, "store address {addr} out of range");
    if addr < PARAM_BASE {
        if (addr % PROFILE_SIZE) % 2 == 0 {
            ValueKind::Temperature
        } else {
            ValueKind::DurationHours
        }
    } else if addr < POWER_ON_ADDR {
        PARAMS[addr - PARAM_BASE].kind
    } else {
        ValueKind::Boolean
    }
}

pub fn bounds(kind: ValueKind, units: Units) -> (i16, i16) {
    let fahrenheit = units == Units::Fahrenheit;
    match kind {
        ValueKind::Temperature if fahrenheit => (-400, 2500),
        ValueKind::Temperature => (-400, 1400),
        ValueKind::TemperatureDifference if fahrenheit => (-100, 100),
        ValueKind::TemperatureDifference => (-50, 50),
        ValueKind::HysteresisPrimary if fahrenheit => (0, 100),
        ValueKind::HysteresisPrimary => (0, 50),
        ValueKind::HysteresisSecondary if fahrenheit => (0, 500),
        ValueKind::HysteresisSecondary => (0, 250),
        ValueKind::SetpointAlarm if fahrenheit => (-800, 800),
        ValueKind::SetpointAlarm => (-400, 400),
        ValueKind::StepIndex => (0, STEPS as i16 - 1),
        ValueKind::DelayMinutes => (0, 60),
        ValueKind::RunMode => (0, NO_OF_PROFILES as i16),
        ValueKind::DurationHours => (0, 999),
        ValueKind::Boolean => (0, 1),
        ValueKind::FreeInteger => (0, 9999),
    }
}

/// Wraparound clamp: above the range rolls to the minimum, below it to the maximum.
pub fn clamp(value: i32, kind: ValueKind, units: Units) -> i16 {
    let (min, max) = bounds(kind, units);
    if value > max as i32 {
        min
    } else if value < min as i32 {
        max
    } else {
        value as i16
    }
}

pub fn default_image() -> Vec<i16> {
    let mut words = Vec::with_capacity(STORE_WORDS);
    for _ in 0..NO_OF_PROFILES {
        words.extend_from_slice(&DEFAULT_PROFILE);
    }
    words.extend(PARAMS.iter().map(|descriptor| descriptor.default));
    words.push(1);
    words
}

/// Durable home of the store image.
///
/// `persist` must not return before the image is durable. It is infallible
/// to the store: a backend that cannot write reports the failure itself and
/// the store keeps serving its in-memory copy, so the next write retries.
pub trait StoreBackend {
    fn load(&mut self) -> Option<Vec<i16>>;
    fn persist(&mut self, words: &[i16]);
}

/// Backend with no durability, used by tests and simulations.
#[derive(Debug, Default, Clone)]
pub struct MemoryBackend {
    pub image: Option<Vec<i16>>,
    pub persist_count: usize,
}

impl MemoryBackend {
    pub fn with_image(image: Vec<i16>) -> Self {
        Self {
            image: Some(image),
            persist_count: 0,
        }
    }
}

impl StoreBackend for MemoryBackend {
    fn load(&mut self) -> Option<Vec<i16>> {
        self.image.clone()
    }

    fn persist(&mut self, words: &[i16]) {
        self.image = Some(words.to_vec());
        self.persist_count += 1;
    }
}

#[derive(Debug)]
pub struct ConfigStore<B: StoreBackend> {
    words: Vec<i16>,
    backend: B,
    first_boot: bool,
}

impl<B: StoreBackend> ConfigStore<B> {
    /// Loads the image, or writes the built-in defaults when there is none.
    pub fn open(mut backend: B) -> Self {
        match backend.load() {
            Some(words) if words.len() == STORE_WORDS => Self {
                words,
                backend,
                first_boot: false,
            },
            _ => {
                let words = default_image();
                backend.persist(&words);
                Self {
                    words,
                    backend,
                    first_boot: true,
                }
            }
        }
    }

    pub fn first_boot(&self) -> bool {
        self.first_boot
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn words(&self) -> &[i16] {
        &self.words
    }

    pub fn read(&self, addr: usize) -> i16 {
        assert!(addr < STORE_WORDS, "store address {addr} out of range");
        self.words[addr]
    }

    /// Reads `addr` and passes it through the range rule for its kind.
    pub fn read_clamped(&self, addr: usize) -> i16 {
        clamp(self.read(addr) as i32, kind_of(addr), self.units())
    }

    pub fn param(&self, param: Param) -> i16 {
        self.words[parameter_addr(param)]
    }

    pub fn flag(&self, param: Param) -> bool {
        self.param(param) != 0
    }

    pub fn units(&self) -> Units {
        Units::from_flag(self.flag(Param::Fahrenheit))
    }

    pub fn power_on(&self) -> bool {
        self.words[POWER_ON_ADDR] != 0
    }

    /// Clamps `value` for the kind at `addr`, stores and persists it.
    pub fn write(&mut self, addr: usize, value: i32) -> i16 {
        let value = clamp(value, kind_of(addr), self.units());
        self.write_raw(addr, value);
        value
    }

    pub fn write_param(&mut self, param: Param, value: i32) -> i16 {
        self.write(parameter_addr(param), value)
    }

    pub fn set_power_on(&mut self, on: bool) {
        self.write_raw(POWER_ON_ADDR, on as i16);
    }

    /// Stores `value` verbatim. Only the debug word/byte commands bypass the range rule.
    pub fn write_raw(&mut self, addr: usize, value: i16) {
        assert!(addr < STORE_WORDS, "store address {addr} out of range");
        self.words[addr] = value;
        self.backend.persist(&self.words);
    }

    /// Byte view of the image, big-endian within each word.
    pub fn read_byte(&self, byte_addr: usize) -> u8 {
        let bytes = self.read(byte_addr / 2).to_be_bytes();
        bytes[byte_addr % 2]
    }

    pub fn write_byte(&mut self, byte_addr: usize, value: u8) {
        let addr = byte_addr / 2;
        let mut bytes = self.read(addr).to_be_bytes();
        bytes[byte_addr % 2] = value;
        self.write_raw(addr, i16::from_be_bytes(bytes));
    }

    /// Menu block `index`: a profile (0-5) or the parameter block (6).
    pub fn block(&self, index: usize) -> &[i16] {
        if index < NO_OF_PROFILES {
            let base = profile_base(index);
            &self.words[base..base + PROFILE_SIZE]
        } else {
            &self.words[PARAM_BASE..PARAM_BASE + PARAM_COUNT]
        }
    }
}
