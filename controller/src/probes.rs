use tempctl_common::{
    types::parse_tenths, BusFault, ProbeFault, ProbeReadings, PROBE_FAULT_PAYLOAD,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeChannel {
    Primary,
    Secondary,
    OneWire,
}

/// Parses a probe topic payload: a decimal reading or the fault marker.
pub fn parse_probe_payload(message: &str) -> Option<Result<i16, ProbeFault>> {
    let message = message.trim();
    if message.eq_ignore_ascii_case(PROBE_FAULT_PAYLOAD) {
        return Some(Err(ProbeFault::OutOfRange));
    }
    parse_tenths(message).map(Ok)
}

/// Parses the bus topic payload: a JSON list of device addresses or the fault marker.
pub fn parse_bus_payload(message: &str) -> Option<Result<Vec<u8>, BusFault>> {
    let message = message.trim();
    if message.eq_ignore_ascii_case(PROBE_FAULT_PAYLOAD) {
        return Some(Err(BusFault));
    }
    serde_json::from_str::<Vec<u8>>(message).ok().map(Ok)
}

#[derive(Debug, Clone, Copy)]
struct Latched<T> {
    value: T,
    at_ms: u64,
}

/// Most recent MQTT readings, handed to the controller by the ADC task.
#[derive(Debug, Clone, Default)]
pub struct ProbeLatch {
    primary: Option<Latched<Result<i16, ProbeFault>>>,
    secondary: Option<Latched<Result<i16, ProbeFault>>>,
    onewire: Option<Latched<Result<i16, ProbeFault>>>,
    bus: Option<Latched<Result<Vec<u8>, BusFault>>>,
}

impl ProbeLatch {
    pub fn record(&mut self, channel: ProbeChannel, value: Result<i16, ProbeFault>, now_ms: u64) {
        let slot = match channel {
            ProbeChannel::Primary => &mut self.primary,
            ProbeChannel::Secondary => &mut self.secondary,
            ProbeChannel::OneWire => &mut self.onewire,
        };
        *slot = Some(Latched {
            value,
            at_ms: now_ms,
        });
    }

    pub fn record_bus(&mut self, value: Result<Vec<u8>, BusFault>, now_ms: u64) {
        self.bus = Some(Latched {
            value,
            at_ms: now_ms,
        });
    }

    /// Readings older than `stale_after_ms` come back as missing.
    pub fn snapshot(&self, now_ms: u64, stale_after_ms: u64) -> ProbeReadings {
        let fresh = |at_ms: u64| now_ms.saturating_sub(at_ms) <= stale_after_ms;
        let reading = |slot: &Option<Latched<Result<i16, ProbeFault>>>| match slot {
            Some(latched) if fresh(latched.at_ms) => latched.value,
            _ => Err(ProbeFault::Missing),
        };
        ProbeReadings {
            primary: reading(&self.primary),
            secondary: reading(&self.secondary),
            onewire: reading(&self.onewire),
            bus: match &self.bus {
                Some(latched) if fresh(latched.at_ms) => latched.value.clone(),
                _ => Err(BusFault),
            },
        }
    }
}
