use crate::types::ValueKind;

/// Named configuration fields, in store order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Param {
    Setpoint,
    Hysteresis,
    Hysteresis2,
    TempCorrection,
    TempCorrection2,
    SetpointAlarm,
    ProfileStep,
    ProfileDuration,
    CoolingDelay,
    HeatingDelay,
    Ramping,
    Fahrenheit,
    SecondProbe,
    PidKc,
    PidTi,
    PidTd,
    PidTs,
    FanControl,
    FanLow,
    FanHigh,
    HeatPowerLimit,
    HeatPowerTotal,
    RunMode,
}

pub const PARAM_COUNT: usize = 23;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParamDescriptor {
    pub param: Param,
    /// Mnemonic accepted by tools and shown in logs.
    pub name: &'static str,
    /// Text rendered on the top row while browsing the parameter menu.
    pub glyphs: &'static str,
    pub kind: ValueKind,
    pub default: i16,
}

const fn entry(
    param: Param,
    name: &'static str,
    glyphs: &'static str,
    kind: ValueKind,
    default: i16,
) -> ParamDescriptor {
    ParamDescriptor {
        param,
        name,
        glyphs,
        kind,
        default,
    }
}

pub static PARAMS: [ParamDescriptor; PARAM_COUNT] = [
    entry(Param::Setpoint, "SP", "SP", ValueKind::Temperature, 200),
    entry(Param::Hysteresis, "hy", "hy", ValueKind::HysteresisPrimary, 5),
    entry(Param::Hysteresis2, "hy2", "hy2", ValueKind::HysteresisSecondary, 20),
    entry(Param::TempCorrection, "tc", "tc", ValueKind::TemperatureDifference, -8),
    entry(Param::TempCorrection2, "tc2", "tc2", ValueKind::TemperatureDifference, -1),
    entry(Param::SetpointAlarm, "SA", "SA", ValueKind::SetpointAlarm, 0),
    entry(Param::ProfileStep, "St", "St", ValueKind::StepIndex, 0),
    entry(Param::ProfileDuration, "dh", "dh", ValueKind::DurationHours, 0),
    entry(Param::CoolingDelay, "cd", "cd", ValueKind::DelayMinutes, 5),
    entry(Param::HeatingDelay, "hd", "hd", ValueKind::DelayMinutes, 2),
    entry(Param::Ramping, "rP", "rP", ValueKind::Boolean, 1),
    entry(Param::Fahrenheit, "CF", "CF", ValueKind::Boolean, 0),
    entry(Param::SecondProbe, "Pb2", "Pb2", ValueKind::Boolean, 0),
    entry(Param::PidKc, "Hc", "Hc", ValueKind::FreeInteger, 80),
    entry(Param::PidTi, "Ti", "tI", ValueKind::FreeInteger, 140),
    entry(Param::PidTd, "Td", "td", ValueKind::FreeInteger, 10),
    entry(Param::PidTs, "Ts", "tS", ValueKind::FreeInteger, 20),
    entry(Param::FanControl, "FAn", "FAn", ValueKind::FreeInteger, 1),
    entry(Param::FanLow, "FLo", "FLo", ValueKind::Temperature, 300),
    entry(Param::FanHigh, "FHI", "FHI", ValueKind::Temperature, 350),
    entry(Param::HeatPowerLimit, "HPL", "HPL", ValueKind::FreeInteger, 150),
    entry(Param::HeatPowerTotal, "HPt", "HPt", ValueKind::FreeInteger, 500),
    entry(Param::RunMode, "rn", "run", ValueKind::RunMode, 6),
];

impl Param {
    pub fn ordinal(self) -> usize {
        self as usize
    }

    pub fn from_ordinal(ordinal: usize) -> Option<Self> {
        PARAMS.get(ordinal).map(|descriptor| descriptor.param)
    }

    pub fn descriptor(self) -> &'static ParamDescriptor {
        &PARAMS[self.ordinal()]
    }

    pub fn kind(self) -> ValueKind {
        self.descriptor().kind
    }

    pub fn default_value(self) -> i16 {
        self.descriptor().default
    }

    pub fn name(self) -> &'static str {
        self.descriptor().name
    }
}
