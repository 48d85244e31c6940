//! First-order model of a chamber with a heater, a compressor and an ambient
//! room. Temperatures are in tenths of a degree.

use tempctl_common::ControllerStatePayload;

/// Actuator levels last published by the controller.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Drive {
    pub heat: bool,
    pub cool: bool,
    pub ssr: bool,
}

impl From<&ControllerStatePayload> for Drive {
    fn from(payload: &ControllerStatePayload) -> Self {
        Self {
            heat: payload.heat,
            cool: payload.cool,
            ssr: payload.ssr,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Plant {
    chamber: f32,
    ambient: f32,
    compressor: f32,
}

const LEAK_PER_STEP: f32 = 0.02;
const HEAT_PER_STEP: f32 = 1.5;
const COOL_PER_STEP: f32 = 2.0;
const COMPRESSOR_WARMING: f32 = 4.0;

impl Plant {
    pub fn new(chamber: i16, ambient: i16) -> Self {
        Self {
            chamber: chamber as f32,
            ambient: ambient as f32,
            compressor: ambient as f32,
        }
    }

    pub fn step(&mut self, drive: Drive) {
        self.chamber += (self.ambient - self.chamber) * LEAK_PER_STEP;
        if drive.heat || drive.ssr {
            self.chamber += HEAT_PER_STEP;
        }
        if drive.cool {
            self.chamber -= COOL_PER_STEP;
            self.compressor += COMPRESSOR_WARMING;
        }
        self.compressor += (self.ambient - self.compressor) * LEAK_PER_STEP * 5.0;
    }

    pub fn chamber(&self) -> i16 {
        self.chamber.round() as i16
    }

    pub fn ambient(&self) -> i16 {
        self.ambient.round() as i16
    }

    pub fn compressor(&self) -> i16 {
        self.compressor.round() as i16
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn idle_chamber_drifts_to_ambient() {
        let mut plant = Plant::new(260, 180);
        for _ in 0..500 {
            plant.step(Drive::default());
        }
        assert!((plant.chamber() - plant.ambient()).abs() <= 1);
    }

    #[test]
    fn cooling_pulls_down_and_warms_the_compressor() {
        let mut plant = Plant::new(260, 260);
        let cool = Drive {
            cool: true,
            ..Drive::default()
        };
        for _ in 0..10 {
            plant.step(cool);
        }
        assert!(plant.chamber() < 260);
        assert!(plant.compressor() > 260);
    }

    #[test]
    fn heater_or_ssr_warms() {
        let mut plant = Plant::new(150, 150);
        plant.step(Drive {
            ssr: true,
            ..Drive::default()
        });
        assert!(plant.chamber() > 150);
    }
}
