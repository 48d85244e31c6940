use crate::types::ThermostatState;

/// Everything one control tick needs. Temperatures are in tenths.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ThermostatInput {
    pub temp: i16,
    pub setpoint: i16,
    pub hysteresis: i16,
    pub hysteresis2: i16,
    /// Secondary probe reading, `None` unless the second probe is enabled.
    pub secondary: Option<i16>,
    pub cooling_delay_s: u16,
    pub heating_delay_s: u16,
}

impl ThermostatInput {
    fn too_warm(&self) -> bool {
        self.temp as i32 > self.setpoint as i32 + self.hysteresis as i32
    }

    fn too_cold(&self) -> bool {
        (self.temp as i32) < self.setpoint as i32 - self.hysteresis as i32
    }

    /// Surroundings are cold enough to do the cooling.
    fn ambient_cool(&self) -> bool {
        self.secondary
            .is_some_and(|t2| (t2 as i32) < self.setpoint as i32 - self.hysteresis2 as i32)
    }

    /// Surroundings are warm enough to do the heating.
    fn ambient_warm(&self) -> bool {
        self.secondary
            .is_some_and(|t2| t2 as i32 > self.setpoint as i32 + self.hysteresis2 as i32)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LedMode {
    Off,
    On,
    Blink,
    SlowBlink,
}

#[derive(Debug, Clone, Copy, Default)]
struct Led {
    lit: bool,
    slow_phase: bool,
}

impl Led {
    fn apply(&mut self, mode: LedMode) {
        match mode {
            LedMode::Off => self.lit = false,
            LedMode::On => self.lit = true,
            LedMode::Blink => self.lit = !self.lit,
            LedMode::SlowBlink => {
                if self.slow_phase {
                    self.lit = !self.lit;
                }
                self.slow_phase = !self.slow_phase;
            }
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RelayOutputs {
    pub heat: bool,
    pub cool: bool,
    pub heat_led: bool,
    pub cool_led: bool,
}

#[derive(Debug, Clone)]
pub struct ThermostatEngine {
    state: ThermostatState,
    cooling_delay: u16,
    heating_delay: u16,
    heat_led: Led,
    cool_led: Led,
}

impl Default for ThermostatEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl ThermostatEngine {
    pub fn new() -> Self {
        Self {
            state: ThermostatState::Off,
            cooling_delay: 0,
            heating_delay: 0,
            heat_led: Led::default(),
            cool_led: Led::default(),
        }
    }

    pub fn state(&self) -> ThermostatState {
        self.state
    }

    pub fn cooling_delay_remaining(&self) -> u16 {
        self.cooling_delay
    }

    pub fn heating_delay_remaining(&self) -> u16 {
        self.heating_delay
    }

    /// The PID loop may only integrate while the heater is actually engaged.
    pub fn pid_enabled(&self) -> bool {
        self.state == ThermostatState::Heating
    }

    /// Drops to `Off` with both relays released and the anti-short-cycle delays re-armed.
    pub fn force_off(&mut self, cooling_delay_s: u16, heating_delay_s: u16) -> RelayOutputs {
        self.state = ThermostatState::Off;
        self.cooling_delay = cooling_delay_s;
        self.heating_delay = heating_delay_s;
        self.heat_led.apply(LedMode::Off);
        self.cool_led.apply(LedMode::Off);
        self.outputs()
    }

    pub fn tick(&mut self, input: &ThermostatInput) -> RelayOutputs {
        self.state = self.next_state(input);
        let (heat_mode, cool_mode) = match self.state {
            ThermostatState::Off => (LedMode::Off, LedMode::Off),
            ThermostatState::HeatDelay => (LedMode::Blink, LedMode::Off),
            ThermostatState::SkipHeat => (LedMode::SlowBlink, LedMode::Off),
            ThermostatState::Heating => (LedMode::On, LedMode::Off),
            ThermostatState::CoolDelay => (LedMode::Off, LedMode::Blink),
            ThermostatState::SkipCool => (LedMode::Off, LedMode::SlowBlink),
            ThermostatState::Cooling => (LedMode::Off, LedMode::On),
        };
        self.heat_led.apply(heat_mode);
        self.cool_led.apply(cool_mode);
        self.outputs()
    }

    fn outputs(&self) -> RelayOutputs {
        RelayOutputs {
            heat: self.state == ThermostatState::Heating,
            cool: self.state == ThermostatState::Cooling,
            heat_led: self.heat_led.lit,
            cool_led: self.cool_led.lit,
        }
    }

    fn next_state(&mut self, input: &ThermostatInput) -> ThermostatState {
        use ThermostatState::*;

        match self.state {
            Off => {
                self.cooling_delay = input.cooling_delay_s;
                self.heating_delay = input.heating_delay_s;
                if input.too_warm() {
                    if input.ambient_cool() {
                        SkipCool
                    } else {
                        CoolDelay
                    }
                } else if input.too_cold() {
                    if input.ambient_warm() {
                        SkipHeat
                    } else {
                        HeatDelay
                    }
                } else {
                    Off
                }
            }
            HeatDelay => {
                if input.temp >= input.setpoint || input.ambient_warm() {
                    Off
                } else {
                    self.heating_delay = self.heating_delay.saturating_sub(1);
                    if self.heating_delay == 0 {
                        Heating
                    } else {
                        HeatDelay
                    }
                }
            }
            CoolDelay => {
                if input.temp <= input.setpoint || input.ambient_cool() {
                    Off
                } else {
                    self.cooling_delay = self.cooling_delay.saturating_sub(1);
                    if self.cooling_delay == 0 {
                        Cooling
                    } else {
                        CoolDelay
                    }
                }
            }
            SkipHeat => {
                let still_warm = input.secondary.is_some_and(|t2| {
                    t2 as i32 >= input.setpoint as i32 + input.hysteresis2 as i32
                });
                if input.temp >= input.setpoint || !still_warm {
                    Off
                } else {
                    SkipHeat
                }
            }
            SkipCool => {
                let still_cool = input.secondary.is_some_and(|t2| {
                    t2 as i32 <= input.setpoint as i32 - input.hysteresis2 as i32
                });
                if input.temp <= input.setpoint || !still_cool {
                    Off
                } else {
                    SkipCool
                }
            }
            Heating => {
                if input.temp >= input.setpoint {
                    Off
                } else if input.ambient_warm() {
                    SkipHeat
                } else {
                    Heating
                }
            }
            Cooling => {
                if input.temp <= input.setpoint {
                    Off
                } else if input.ambient_cool() {
                    SkipCool
                } else {
                    Cooling
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn input(temp: i16) -> ThermostatInput {
        ThermostatInput {
            temp,
            setpoint: 200,
            hysteresis: 5,
            hysteresis2: 20,
            secondary: None,
            cooling_delay_s: 300,
            heating_delay_s: 120,
        }
    }

    #[test]
    fn too_warm_enters_cool_delay_then_cools() {
        let mut engine = ThermostatEngine::new();
        let outputs = engine.tick(&input(260));
        assert_eq!(engine.state(), ThermostatState::CoolDelay);
        assert!(!outputs.cool);

        for _ in 0..299 {
            engine.tick(&input(260));
        }
        assert_eq!(engine.state(), ThermostatState::CoolDelay);
        assert_eq!(engine.cooling_delay_remaining(), 1);

        let outputs = engine.tick(&input(260));
        assert_eq!(engine.state(), ThermostatState::Cooling);
        assert!(outputs.cool);
        assert!(outputs.cool_led);
        assert!(!outputs.heat);
    }

    #[test]
    fn within_band_stays_off() {
        let mut engine = ThermostatEngine::new();
        for temp in [195, 200, 205] {
            let outputs = engine.tick(&input(temp));
            assert_eq!(engine.state(), ThermostatState::Off);
            assert_eq!(outputs, RelayOutputs::default());
        }
    }

    #[test]
    fn delay_is_abandoned_when_temperature_recovers() {
        let mut engine = ThermostatEngine::new();
        engine.tick(&input(190));
        assert_eq!(engine.state(), ThermostatState::HeatDelay);
        engine.tick(&input(200));
        assert_eq!(engine.state(), ThermostatState::Off);
    }

    #[test]
    fn delays_run_out_with_neutral_second_probe() {
        let mut engine = ThermostatEngine::new();
        let mut cold = input(190);
        cold.heating_delay_s = 2;
        cold.secondary = Some(200);
        engine.tick(&cold);
        assert_eq!(engine.state(), ThermostatState::HeatDelay);
        engine.tick(&cold);
        assert_eq!(engine.state(), ThermostatState::HeatDelay);
        engine.tick(&cold);
        assert_eq!(engine.state(), ThermostatState::Heating);

        let mut engine = ThermostatEngine::new();
        let mut warm = input(210);
        warm.cooling_delay_s = 2;
        warm.secondary = Some(200);
        engine.tick(&warm);
        assert_eq!(engine.state(), ThermostatState::CoolDelay);
        engine.tick(&warm);
        assert_eq!(engine.state(), ThermostatState::CoolDelay);
        engine.tick(&warm);
        assert_eq!(engine.state(), ThermostatState::Cooling);
    }

    #[test]
    fn ambient_assistance_cancels_delays() {
        let mut engine = ThermostatEngine::new();
        let mut cold = input(190);
        cold.secondary = Some(200);
        engine.tick(&cold);
        assert_eq!(engine.state(), ThermostatState::HeatDelay);
        cold.secondary = Some(230);
        engine.tick(&cold);
        assert_eq!(engine.state(), ThermostatState::Off);

        let mut engine = ThermostatEngine::new();
        let mut warm = input(210);
        warm.secondary = Some(200);
        engine.tick(&warm);
        assert_eq!(engine.state(), ThermostatState::CoolDelay);
        warm.secondary = Some(170);
        engine.tick(&warm);
        assert_eq!(engine.state(), ThermostatState::Off);
    }

    #[test]
    fn heating_stops_at_setpoint() {
        let mut engine = ThermostatEngine::new();
        let mut cold = input(190);
        cold.heating_delay_s = 1;
        engine.tick(&cold);
        let outputs = engine.tick(&cold);
        assert_eq!(engine.state(), ThermostatState::Heating);
        assert!(outputs.heat);
        assert!(engine.pid_enabled());

        let outputs = engine.tick(&input(200));
        assert_eq!(engine.state(), ThermostatState::Off);
        assert!(!outputs.heat);
        assert!(!engine.pid_enabled());
    }

    #[test]
    fn zero_delay_engages_on_next_tick() {
        let mut engine = ThermostatEngine::new();
        let mut warm = input(260);
        warm.cooling_delay_s = 0;
        engine.tick(&warm);
        engine.tick(&warm);
        assert_eq!(engine.state(), ThermostatState::Cooling);
    }

    #[test]
    fn cool_ambient_skips_cooling() {
        let mut engine = ThermostatEngine::new();
        let mut warm = input(260);
        warm.secondary = Some(150);
        engine.tick(&warm);
        assert_eq!(engine.state(), ThermostatState::SkipCool);

        let first = engine.tick(&warm);
        let second = engine.tick(&warm);
        let third = engine.tick(&warm);
        assert!(!first.cool && !second.cool && !third.cool);
        assert_ne!(first.cool_led, third.cool_led);

        warm.secondary = Some(190);
        engine.tick(&warm);
        assert_eq!(engine.state(), ThermostatState::Off);
    }

    #[test]
    fn warm_ambient_interrupts_heating() {
        let mut engine = ThermostatEngine::new();
        let mut cold = input(150);
        cold.heating_delay_s = 1;
        cold.secondary = Some(200);
        engine.tick(&cold);
        engine.tick(&cold);
        assert_eq!(engine.state(), ThermostatState::Heating);

        cold.secondary = Some(230);
        let outputs = engine.tick(&cold);
        assert_eq!(engine.state(), ThermostatState::SkipHeat);
        assert!(!outputs.heat);
    }

    #[test]
    fn force_off_rearms_delays() {
        let mut engine = ThermostatEngine::new();
        let mut warm = input(260);
        warm.cooling_delay_s = 1;
        engine.tick(&warm);
        engine.tick(&warm);
        assert_eq!(engine.state(), ThermostatState::Cooling);

        let outputs = engine.force_off(300, 120);
        assert_eq!(engine.state(), ThermostatState::Off);
        assert_eq!(outputs, RelayOutputs::default());
        assert_eq!(engine.cooling_delay_remaining(), 300);
        assert_eq!(engine.heating_delay_remaining(), 120);
    }

    #[test]
    fn relays_are_never_both_on() {
        let mut engine = ThermostatEngine::new();
        let mut seed: u32 = 0x2545_f491;
        for _ in 0..20_000 {
            seed = seed.wrapping_mul(1_103_515_245).wrapping_add(12_345);
            let temp = 150 + ((seed >> 16) % 100) as i16;
            let secondary = match (seed >> 8) % 3 {
                0 => None,
                _ => Some(150 + ((seed >> 4) % 100) as i16),
            };
            let outputs = engine.tick(&ThermostatInput {
                secondary,
                cooling_delay_s: (seed % 4) as u16,
                heating_delay_s: ((seed >> 2) % 4) as u16,
                ..input(temp)
            });
            assert!(!(outputs.heat && outputs.cool));
        }
    }
}
