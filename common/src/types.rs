use serde::{Deserialize, Serialize};

use crate::store::NO_OF_PROFILES;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Units {
    Celsius,
    Fahrenheit,
}

impl Units {
    pub fn from_flag(fahrenheit: bool) -> Self {
        if fahrenheit {
            Self::Fahrenheit
        } else {
            Self::Celsius
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Celsius => "C",
            Self::Fahrenheit => "F",
        }
    }
}

/// How a configuration value is ranged and displayed.
///
/// The first five kinds are shown as temperatures (one decimal place).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueKind {
    Temperature,
    TemperatureDifference,
    HysteresisPrimary,
    HysteresisSecondary,
    SetpointAlarm,
    StepIndex,
    DelayMinutes,
    RunMode,
    DurationHours,
    Boolean,
    FreeInteger,
}

impl ValueKind {
    pub fn is_temperature(self) -> bool {
        matches!(
            self,
            Self::Temperature
                | Self::TemperatureDifference
                | Self::HysteresisPrimary
                | Self::HysteresisSecondary
                | Self::SetpointAlarm
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", tag = "mode", content = "profile")]
pub enum RunMode {
    Profile(u8),
    Thermostat,
}

impl RunMode {
    pub fn from_raw(raw: i16) -> Self {
        if (0..NO_OF_PROFILES as i16).contains(&raw) {
            Self::Profile(raw as u8)
        } else {
            Self::Thermostat
        }
    }

    pub fn raw(self) -> i16 {
        match self {
            Self::Profile(profile) => profile as i16,
            Self::Thermostat => NO_OF_PROFILES as i16,
        }
    }

    pub fn profile(self) -> Option<usize> {
        match self {
            Self::Profile(profile) => Some(profile as usize),
            Self::Thermostat => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ThermostatState {
    Off,
    HeatDelay,
    CoolDelay,
    Heating,
    Cooling,
    /// Too cold, but the secondary probe says the surroundings are warming it.
    SkipHeat,
    /// Too warm, but the secondary probe says the surroundings are cooling it.
    SkipCool,
}

impl ThermostatState {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Off => "OFF",
            Self::HeatDelay => "HEAT_DELAY",
            Self::CoolDelay => "COOL_DELAY",
            Self::Heating => "HEATING",
            Self::Cooling => "COOLING",
            Self::SkipHeat => "SKIP_HEAT",
            Self::SkipCool => "SKIP_COOL",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AlarmCause {
    ProbeFault,
    SetpointDeviation,
}

/// Published to MQTT and read back by the simulated probe front end.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ControllerStatePayload {
    pub temp: Option<f32>,
    pub setpoint: f32,
    pub state: ThermostatState,
    pub heat: bool,
    pub cool: bool,
    pub ssr: bool,
    #[serde(rename = "pidOutput")]
    pub pid_output: i16,
    pub alarm: Option<AlarmCause>,
    #[serde(rename = "powerOn")]
    pub power_on: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct ControllerStatus {
    #[serde(rename = "currentTemp")]
    pub current_temp: Option<f32>,
    #[serde(rename = "secondaryTemp")]
    pub secondary_temp: Option<f32>,
    #[serde(rename = "oneWireTemp")]
    pub one_wire_temp: Option<f32>,
    pub setpoint: f32,
    pub hysteresis: f32,
    pub units: Units,
    #[serde(rename = "runMode")]
    pub run_mode: RunMode,
    pub step: i16,
    #[serde(rename = "stepElapsed")]
    pub step_elapsed: i16,
    pub state: &'static str,
    pub heat: bool,
    pub cool: bool,
    #[serde(rename = "heatLed")]
    pub heat_led: bool,
    #[serde(rename = "coolLed")]
    pub cool_led: bool,
    pub ssr: bool,
    pub fan: bool,
    #[serde(rename = "pidOutput")]
    pub pid_output: i16,
    #[serde(rename = "pidManual")]
    pub pid_manual: bool,
    pub alarm: Option<AlarmCause>,
    pub buzzer: bool,
    #[serde(rename = "powerOn")]
    pub power_on: bool,
    #[serde(rename = "menuState")]
    pub menu_state: &'static str,
    #[serde(rename = "displayTop")]
    pub display_top: String,
    #[serde(rename = "displayBottom")]
    pub display_bottom: String,
}

/// Converts a stored tenths value to degrees/units.
pub fn tenths_to_f32(value: i16) -> f32 {
    value as f32 / 10.0
}

/// Parses a decimal reading such as `21.5` or `-3` into tenths.
pub fn parse_tenths(text: &str) -> Option<i16> {
    let value = text.trim().parse::<f32>().ok()?;
    if !value.is_finite() {
        return None;
    }
    let tenths = (value * 10.0).round();
    if tenths < i16::MIN as f32 || tenths > i16::MAX as f32 {
        return None;
    }
    Some(tenths as i16)
}

/// Formats a tenths value as `12.3` / `-0.5`.
pub fn format_tenths(value: i16) -> String {
    let magnitude = (value as i32).abs();
    let sign = if value < 0 { "-" } else { "" };
    format!("{sign}{}.{}", magnitude / 10, magnitude % 10)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn run_mode_maps_out_of_range_to_thermostat() {
        assert_eq!(RunMode::from_raw(0), RunMode::Profile(0));
        assert_eq!(RunMode::from_raw(5), RunMode::Profile(5));
        assert_eq!(RunMode::from_raw(6), RunMode::Thermostat);
        assert_eq!(RunMode::from_raw(-1), RunMode::Thermostat);
        assert_eq!(RunMode::Thermostat.raw(), 6);
    }

    #[test]
    fn tenths_formatting_handles_sign() {
        assert_eq!(format_tenths(150), "15.0");
        assert_eq!(format_tenths(-5), "-0.5");
        assert_eq!(format_tenths(-123), "-12.3");
        assert_eq!(format_tenths(0), "0.0");
    }

    #[test]
    fn tenths_parsing_rounds() {
        assert_eq!(parse_tenths("21.5"), Some(215));
        assert_eq!(parse_tenths(" -3 "), Some(-30));
        assert_eq!(parse_tenths("20.04"), Some(200));
        assert_eq!(parse_tenths("warm"), None);
        assert_eq!(parse_tenths("NaN"), None);
    }

    #[test]
    fn state_payload_uses_camel_case_keys() {
        let payload = ControllerStatePayload {
            temp: Some(20.5),
            setpoint: 20.0,
            state: ThermostatState::CoolDelay,
            heat: false,
            cool: false,
            ssr: false,
            pid_output: 0,
            alarm: None,
            power_on: true,
        };
        let json = serde_json::to_value(&payload).unwrap();
        assert_eq!(json["state"], "COOL_DELAY");
        assert_eq!(json["pidOutput"], 0);
        assert_eq!(json["powerOn"], true);
    }
}
