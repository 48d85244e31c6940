//! Temperature profile scheduler.
//!
//! Called once per scheduling unit. Progress (step index and time spent in
//! the step) lives in the store so a power cycle resumes where it left off.

use serde::{Deserialize, Serialize};

use crate::{
    params::Param,
    store::{step_setpoint_addr, ConfigStore, StoreBackend, NO_OF_PROFILES, STEPS},
    types::RunMode,
};

/// Length of one profile duration unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProfileTimebase {
    Minutes,
    #[default]
    Hours,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProfileOutcome {
    /// Thermostat mode, nothing to do.
    Inactive,
    /// Still inside the current step.
    Waiting { step: usize, elapsed: i16 },
    /// Still inside the current step, setpoint moved along the ramp.
    Ramped { step: usize, elapsed: i16, setpoint: i16 },
    /// Moved on to `step` with its setpoint.
    Advanced { step: usize, setpoint: i16 },
    /// Last step done; run mode fell back to thermostat.
    Finished { setpoint: i16 },
}

pub fn update_profile<B: StoreBackend>(store: &mut ConfigStore<B>) -> ProfileOutcome {
    let Some(profile) = RunMode::from_raw(store.param(Param::RunMode)).profile() else {
        return ProfileOutcome::Inactive;
    };

    let step = store.param(Param::ProfileStep).clamp(0, STEPS as i16 - 1) as usize;
    let mut elapsed = store.param(Param::ProfileDuration) as i32 + 1;

    let setpoint_addr = step_setpoint_addr(profile, step);
    let duration = store.read(setpoint_addr + 1) as i32;
    let next_setpoint = store.read(setpoint_addr + 2);

    let outcome = if elapsed >= duration {
        let setpoint = store.write_param(Param::Setpoint, next_setpoint as i32);
        if step == STEPS - 1 || store.read(setpoint_addr + 3) == 0 {
            store.write_param(Param::RunMode, NO_OF_PROFILES as i32);
            return ProfileOutcome::Finished { setpoint };
        }
        elapsed = 0;
        store.write_param(Param::ProfileStep, step as i32 + 1);
        ProfileOutcome::Advanced {
            step: step + 1,
            setpoint,
        }
    } else if store.flag(Param::Ramping) {
        let ramped = ramp(store.read(setpoint_addr), next_setpoint, elapsed, duration);
        let setpoint = store.write_param(Param::Setpoint, ramped as i32);
        ProfileOutcome::Ramped {
            step,
            elapsed: elapsed as i16,
            setpoint,
        }
    } else {
        ProfileOutcome::Waiting {
            step,
            elapsed: elapsed as i16,
        }
    };

    store.write_param(Param::ProfileDuration, elapsed);
    outcome
}

/// Linear interpolation in 1/64 steps between `current` and `next`.
pub fn ramp(current: i16, next: i16, elapsed: i32, duration: i32) -> i16 {
    let mut fraction = elapsed << 6;
    let mut sum: i32 = 32;
    for _ in 0..64 {
        if fraction >= duration {
            fraction -= duration;
            sum += next as i32;
        } else {
            sum += current as i32;
        }
    }
    (sum >> 6) as i16
}

/// Divides the one-minute profile task down to the configured timebase.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProfileTimer {
    minutes: u8,
}

impl ProfileTimer {
    /// Returns true when the scheduler is due.
    pub fn tick(&mut self, timebase: ProfileTimebase) -> bool {
        match timebase {
            ProfileTimebase::Minutes => {
                self.minutes = 0;
                true
            }
            ProfileTimebase::Hours => {
                self.minutes += 1;
                if self.minutes >= 60 {
                    self.minutes = 0;
                    true
                } else {
                    false
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{step_duration_addr, MemoryBackend};
    use pretty_assertions::assert_eq;

    fn store_in_profile(profile: i32, ramping: bool) -> ConfigStore<MemoryBackend> {
        let mut store = ConfigStore::open(MemoryBackend::default());
        store.write_param(Param::RunMode, profile);
        store.write_param(Param::Ramping, ramping as i32);
        store.write_param(Param::Setpoint, 160);
        store
    }

    #[test]
    fn thermostat_mode_is_a_no_op() {
        let mut store = ConfigStore::open(MemoryBackend::default());
        let before = store.words().to_vec();
        assert_eq!(update_profile(&mut store), ProfileOutcome::Inactive);
        assert_eq!(store.words(), &before[..]);
    }

    #[test]
    fn setpoint_holds_until_duration_then_switches() {
        let mut store = store_in_profile(0, false);
        for elapsed in 1..24 {
            assert_eq!(
                update_profile(&mut store),
                ProfileOutcome::Waiting { step: 0, elapsed }
            );
            assert_eq!(store.param(Param::Setpoint), 160);
        }
        assert_eq!(
            update_profile(&mut store),
            ProfileOutcome::Advanced {
                step: 1,
                setpoint: 170
            }
        );
        assert_eq!(store.param(Param::ProfileStep), 1);
        assert_eq!(store.param(Param::ProfileDuration), 0);
    }

    #[test]
    fn ramp_interpolates_in_sixty_fourths() {
        assert_eq!(ramp(160, 170, 0, 24), 160);
        assert_eq!(ramp(160, 170, 12, 24), 165);
        assert_eq!(ramp(160, 170, 6, 24), 163);
        assert_eq!(ramp(200, 100, 1, 2), 150);
    }

    #[test]
    fn ramping_moves_setpoint_each_tick() {
        let mut store = store_in_profile(0, true);
        let outcome = update_profile(&mut store);
        assert_eq!(
            outcome,
            ProfileOutcome::Ramped {
                step: 0,
                elapsed: 1,
                setpoint: 160
            }
        );
        for _ in 1..12 {
            update_profile(&mut store);
        }
        assert_eq!(store.param(Param::Setpoint), 165);
    }

    #[test]
    fn zero_next_duration_falls_back_to_thermostat() {
        let mut store = store_in_profile(2, false);
        store.write(step_duration_addr(2, 1), 0);
        store.write(step_duration_addr(2, 0), 1);
        assert_eq!(
            update_profile(&mut store),
            ProfileOutcome::Finished { setpoint: 170 }
        );
        assert_eq!(store.param(Param::RunMode), 6);
        assert_eq!(store.param(Param::Setpoint), 170);
    }

    #[test]
    fn last_step_falls_back_to_thermostat() {
        let mut store = store_in_profile(4, false);
        for step in 0..STEPS {
            store.write(step_duration_addr(4, step), 1);
        }
        store.write(step_setpoint_addr(4, STEPS), 123);
        store.write_param(Param::ProfileStep, STEPS as i32 - 1);
        assert_eq!(
            update_profile(&mut store),
            ProfileOutcome::Finished { setpoint: 123 }
        );
        assert_eq!(store.param(Param::RunMode), 6);
    }

    #[test]
    fn hours_timebase_divides_by_sixty() {
        let mut timer = ProfileTimer::default();
        let due = (0..120)
            .filter(|_| timer.tick(ProfileTimebase::Hours))
            .count();
        assert_eq!(due, 2);
        assert!(timer.tick(ProfileTimebase::Minutes));
    }
}
