pub mod actuator;
pub mod buttons;
pub mod command;
pub mod config;
pub mod control;
pub mod display;
pub mod error;
pub mod menu;
pub mod params;
pub mod pid;
pub mod profile;
pub mod scheduler;
pub mod store;
pub mod thermostat;
pub mod topics;
pub mod types;

pub use buttons::ButtonLevels;
pub use config::{ControllerConfig, NetworkConfig, RuntimeConfig};
pub use control::{ControlReport, ControllerContext, ProbeReadings};
pub use error::{BusFault, CommandError, ProbeFault};
pub use menu::MenuEvent;
pub use profile::{ProfileOutcome, ProfileTimebase};
pub use store::{ConfigStore, MemoryBackend, StoreBackend, STORE_WORDS};
pub use thermostat::{RelayOutputs, ThermostatEngine};
pub use topics::*;
pub use types::{AlarmCause, ControllerStatePayload, ControllerStatus, ThermostatState};
