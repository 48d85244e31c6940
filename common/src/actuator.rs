//! Output stage: slow PWM for the SSR, setpoint alarm and compressor fan.

use crate::pid::OUTPUT_MAX;

/// SSR period in menu ticks (12.5 s).
pub const SSR_PERIOD: u8 = 125;

/// On-time for PID output `u`: 1.25 ticks per percent, rounded.
pub fn on_ticks(u: i16, powered: bool) -> u8 {
    if !powered {
        return 0;
    }
    let u = u.clamp(0, OUTPUT_MAX) as i32;
    ((u + 4) / 8).min(SSR_PERIOD as i32) as u8
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SsrPhase {
    #[default]
    Off,
    On,
}

/// Turns the PID output into on/off phases. Each phase takes its length from
/// `u` as it starts; a phase that would last zero ticks is skipped.
#[derive(Debug, Clone, Copy, Default)]
pub struct TimeProportioner {
    phase: SsrPhase,
    remaining: u8,
}

impl TimeProportioner {
    pub fn phase(&self) -> SsrPhase {
        self.phase
    }

    /// Advances one 100 ms tick and returns the SSR level.
    pub fn tick(&mut self, u: i16, powered: bool) -> bool {
        if !powered {
            self.phase = SsrPhase::Off;
            self.remaining = 0;
            return false;
        }
        if self.remaining == 0 {
            let on = on_ticks(u, powered);
            let (next, length) = match self.phase {
                SsrPhase::Off => (SsrPhase::On, on),
                SsrPhase::On => (SsrPhase::Off, SSR_PERIOD - on),
            };
            if length > 0 {
                self.phase = next;
                self.remaining = length;
            } else {
                self.remaining = SSR_PERIOD;
            }
        }
        self.remaining -= 1;
        self.phase == SsrPhase::On
    }
}

/// `SA` rule: positive thresholds alarm outside the band, negative ones inside it.
pub fn setpoint_alarm(temp: i16, setpoint: i16, threshold: i16) -> bool {
    if threshold == 0 {
        return false;
    }
    let diff = (temp as i32 - setpoint as i32).abs();
    if threshold < 0 {
        diff <= -(threshold as i32)
    } else {
        diff >= threshold as i32
    }
}

/// Compressor fan with a `FLo`/`FHI` band on the one-wire reading.
#[derive(Debug, Clone, Copy, Default)]
pub struct FanControl {
    on: bool,
}

impl FanControl {
    pub fn is_on(&self) -> bool {
        self.on
    }

    pub fn tick(&mut self, enabled: bool, onewire: Option<i16>, low: i16, high: i16) -> bool {
        if !enabled {
            self.on = false;
        } else if let Some(temp) = onewire {
            if temp >= high {
                self.on = true;
            } else if temp <= low {
                self.on = false;
            }
        }
        self.on
    }
}
