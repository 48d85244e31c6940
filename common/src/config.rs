use serde::{Deserialize, Serialize};

use crate::profile::ProfileTimebase;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ControllerConfig {
    /// Unit of the profile step durations.
    pub profile_timebase: ProfileTimebase,
    pub state_publish_interval_ms: u64,
    /// Probe readings older than this are treated as missing.
    pub probe_stale_timeout_ms: u64,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            profile_timebase: ProfileTimebase::Hours,
            state_publish_interval_ms: 10_000,
            probe_stale_timeout_ms: 30_000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NetworkConfig {
    pub mqtt_host: String,
    pub mqtt_port: u16,
    pub mqtt_user: String,
    pub mqtt_pass: String,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            mqtt_host: "127.0.0.1".to_string(),
            mqtt_port: 1883,
            mqtt_user: String::new(),
            mqtt_pass: String::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RuntimeConfig {
    #[serde(default)]
    pub controller: ControllerConfig,
    #[serde(default)]
    pub network: NetworkConfig,
    pub http_port: u16,
    pub console_port: u16,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            controller: ControllerConfig::default(),
            network: NetworkConfig::default(),
            http_port: 8080,
            console_port: 2323,
        }
    }
}

impl ControllerConfig {
    pub fn sanitize(&mut self) {
        let defaults = Self::default();
        if self.state_publish_interval_ms < 1_000 {
            self.state_publish_interval_ms = defaults.state_publish_interval_ms;
        }
        if self.probe_stale_timeout_ms < 1_000 {
            self.probe_stale_timeout_ms = defaults.probe_stale_timeout_ms;
        }
    }
}

impl RuntimeConfig {
    pub fn sanitize(&mut self) {
        let defaults = Self::default();
        self.controller.sanitize();
        if self.network.mqtt_port == 0 {
            self.network.mqtt_port = defaults.network.mqtt_port;
        }
        if self.http_port == 0 {
            self.http_port = defaults.http_port;
        }
        if self.console_port == 0 {
            self.console_port = defaults.console_port;
        }
    }
}
