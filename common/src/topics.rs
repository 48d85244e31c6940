pub const TOPIC_PROBE_PRIMARY: &str = "tempctl/probe/primary";
pub const TOPIC_PROBE_SECONDARY: &str = "tempctl/probe/secondary";
pub const TOPIC_PROBE_ONEWIRE: &str = "tempctl/probe/onewire";
pub const TOPIC_PROBE_BUS: &str = "tempctl/probe/bus";
pub const TOPIC_PROBE_STATUS: &str = "tempctl/probe/status";

pub const TOPIC_CONTROLLER_STATE: &str = "tempctl/controller/state";

/// Payload a probe topic carries when the sensor reports an open or shorted probe.
pub const PROBE_FAULT_PAYLOAD: &str = "fault";
