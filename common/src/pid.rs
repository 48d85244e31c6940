//! Takahashi type-C PID controller.
//!
//! ```text
//! u[k] = u[k-1] + Kc.(y[k-1] - y[k]) + ki.(w[k] - y[k]) + kd.(2.y[k-1] - y[k] - y[k-2])
//! ki = Kc.Ts/Ti, kd = Kc.Td/Ts
//! ```
//!
//! Proportional and derivative action only look at the process value, so a
//! setpoint change does not kick the output. `u` is in tenths of a percent.

pub const OUTPUT_MAX: i16 = 1000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PidParams {
    /// Gain in %/degree.
    pub kc: i16,
    /// Integral time in seconds.
    pub ti: i16,
    /// Derivative time in seconds.
    pub td: i16,
    /// Sample time in seconds, 0 disables the loop.
    pub ts: i16,
}

/// Heater power limit (`HPL`) and rating (`HPt`) in watts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct HeatPower {
    pub limit: i16,
    pub total: i16,
}

impl HeatPower {
    pub fn output_limit(self) -> i16 {
        if self.total <= 0 {
            return OUTPUT_MAX;
        }
        let total = self.total as i32;
        let scaled = (2 * self.limit.max(0) as i32 * OUTPUT_MAX as i32 + total) / (2 * total);
        scaled.min(OUTPUT_MAX as i32) as i16
    }
}

fn rounded_ratio(numerator: i64, denominator: i64) -> i64 {
    if denominator == 0 {
        0
    } else {
        (2 * numerator + denominator) / (2 * denominator)
    }
}

#[derive(Debug, Clone, Default)]
pub struct PidController {
    params: Option<PidParams>,
    ki: i64,
    kd: i64,
    yk_1: i16,
    yk_2: i16,
    output: i16,
    sample_timer: u16,
    power: Option<HeatPower>,
    limit: i16,
    manual: Option<i16>,
}

impl PidController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn output(&self) -> i16 {
        self.output
    }

    pub fn limit(&self) -> i16 {
        self.limit
    }

    pub fn gains(&self) -> (i64, i64) {
        (self.ki, self.kd)
    }

    pub fn manual(&self) -> Option<i16> {
        self.manual
    }

    /// Pins the output to `value`, or hands control back to the loop with `None`.
    pub fn set_manual(&mut self, value: Option<i16>) {
        self.manual = value.map(|value| value.clamp(0, OUTPUT_MAX));
    }

    /// Output to zero; used on probe faults and while powered off.
    pub fn shutdown(&mut self) {
        self.output = 0;
    }

    fn init(&mut self, params: PidParams, temp: i16) {
        let kc = params.kc as i64;
        self.ki = if params.ti == 0 {
            0
        } else {
            rounded_ratio(kc * params.ts as i64, params.ti as i64)
        };
        self.kd = if params.ts == 0 {
            0
        } else {
            rounded_ratio(kc * params.td as i64, params.ts as i64)
        };
        self.yk_1 = temp;
        self.yk_2 = temp;
        self.params = Some(params);
    }

    /// Called once per control second.
    pub fn tick(
        &mut self,
        temp: i16,
        setpoint: i16,
        params: PidParams,
        power: HeatPower,
        enabled: bool,
    ) -> i16 {
        if params.ts <= 0 {
            self.output = 0;
        } else {
            if self.params != Some(params) {
                self.init(params, temp);
            }
            if self.power != Some(power) {
                self.limit = power.output_limit();
                self.power = Some(power);
            }
            self.sample_timer += 1;
            if self.sample_timer >= params.ts as u16 {
                self.sample_timer = 0;
                self.step(temp, setpoint, params.kc, enabled);
            }
        }
        if let Some(fixed) = self.manual {
            self.output = fixed;
        }
        self.output
    }

    fn step(&mut self, yk: i16, setpoint: i16, kc: i16, enabled: bool) {
        if enabled {
            // every term fits in i64 for any stored gain, the sum saturates
            let (yk, yk_1, yk_2) = (yk as i64, self.yk_1 as i64, self.yk_2 as i64);
            let proportional = kc as i64 * (yk_1 - yk);
            let integral = self.ki * (setpoint as i64 - yk);
            let derivative = self.kd * (2 * yk_1 - yk - yk_2);
            let next = (self.output as i64)
                .saturating_add(proportional)
                .saturating_add(integral)
                .saturating_add(derivative);
            self.output = next.clamp(0, self.limit as i64) as i16;
        } else {
            self.output = 0;
        }
        self.yk_2 = self.yk_1;
        self.yk_1 = yk;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const EVERY_SECOND: PidParams = PidParams {
        kc: 80,
        ti: 140,
        td: 10,
        ts: 1,
    };
    const FULL_POWER: HeatPower = HeatPower {
        limit: 500,
        total: 500,
    };

    #[test]
    fn gains_round_to_nearest() {
        let mut pid = PidController::new();
        pid.tick(200, 200, PidParams { ts: 20, ..EVERY_SECOND }, FULL_POWER, true);
        // 80*20/140 = 11.43, 80*10/20 = 40
        assert_eq!(pid.gains(), (11, 40));

        pid.tick(200, 200, PidParams { ti: 0, ts: 3, ..EVERY_SECOND }, FULL_POWER, true);
        // 80*10/3 = 266.67
        assert_eq!(pid.gains(), (0, 267));
    }

    #[test]
    fn output_limit_follows_heater_rating() {
        assert_eq!(HeatPower { limit: 150, total: 500 }.output_limit(), 300);
        assert_eq!(HeatPower { limit: 1, total: 3 }.output_limit(), 333);
        assert_eq!(HeatPower { limit: 2, total: 3 }.output_limit(), 667);
        assert_eq!(HeatPower { limit: 150, total: 0 }.output_limit(), 1000);
        assert_eq!(HeatPower { limit: 900, total: 500 }.output_limit(), 1000);
    }

    #[test]
    fn zero_error_does_not_drift() {
        let mut pid = PidController::new();
        for _ in 0..5 {
            pid.tick(190, 200, EVERY_SECOND, FULL_POWER, true);
        }
        assert!(pid.output() > 0);

        pid.tick(200, 200, EVERY_SECOND, FULL_POWER, true);
        pid.tick(200, 200, EVERY_SECOND, FULL_POWER, true);
        let settled = pid.output();
        for _ in 0..10 {
            assert_eq!(pid.tick(200, 200, EVERY_SECOND, FULL_POWER, true), settled);
        }
    }

    #[test]
    fn output_is_clamped_to_limit() {
        let mut pid = PidController::new();
        let half = HeatPower {
            limit: 250,
            total: 500,
        };
        for _ in 0..20 {
            pid.tick(100, 600, EVERY_SECOND, half, true);
        }
        assert_eq!(pid.output(), 500);

        for _ in 0..20 {
            pid.tick(900, 100, EVERY_SECOND, half, true);
        }
        assert_eq!(pid.output(), 0);
    }

    #[test]
    fn disabled_loop_holds_output_at_zero() {
        let mut pid = PidController::new();
        for _ in 0..5 {
            assert_eq!(pid.tick(150, 200, EVERY_SECOND, FULL_POWER, false), 0);
        }
    }

    #[test]
    fn runs_every_ts_seconds() {
        let mut pid = PidController::new();
        let slow = PidParams {
            ts: 3,
            ..EVERY_SECOND
        };
        pid.tick(190, 200, slow, FULL_POWER, true);
        pid.tick(190, 200, slow, FULL_POWER, true);
        assert_eq!(pid.output(), 0);
        pid.tick(190, 200, slow, FULL_POWER, true);
        assert!(pid.output() > 0);
    }

    #[test]
    fn zero_sample_time_disables_loop() {
        let mut pid = PidController::new();
        let off = PidParams {
            ts: 0,
            ..EVERY_SECOND
        };
        assert_eq!(pid.tick(100, 600, off, FULL_POWER, true), 0);
    }

    #[test]
    fn largest_gains_stay_within_limit() {
        let mut pid = PidController::new();
        let aggressive = PidParams {
            kc: 9999,
            ti: 0,
            td: 9999,
            ts: 1,
        };
        pid.tick(200, 200, aggressive, FULL_POWER, true);
        assert_eq!(pid.gains(), (0, 99_980_001));
        assert_eq!(pid.tick(100, 200, aggressive, FULL_POWER, true), 1000);
        assert_eq!(pid.tick(300, 200, aggressive, FULL_POWER, true), 0);

        let integrating = PidParams {
            kc: 9999,
            ti: 1,
            td: 0,
            ts: 255,
        };
        let mut pid = PidController::new();
        for _ in 0..255 {
            pid.tick(-400, 1400, integrating, FULL_POWER, true);
        }
        assert_eq!(pid.output(), 1000);
    }

    #[test]
    fn manual_override_wins_until_cleared() {
        let mut pid = PidController::new();
        pid.set_manual(Some(420));
        assert_eq!(pid.tick(200, 200, EVERY_SECOND, FULL_POWER, false), 420);
        pid.set_manual(None);
        assert_eq!(pid.tick(200, 200, EVERY_SECOND, FULL_POWER, false), 0);
    }
}
