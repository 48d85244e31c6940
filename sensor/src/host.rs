use std::{sync::Arc, time::Duration};

use anyhow::Context;
use rumqttc::{AsyncClient, Event, Incoming, MqttOptions, QoS};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use tempctl_common::{
    types::format_tenths, ControllerStatePayload, PROBE_FAULT_PAYLOAD, TOPIC_CONTROLLER_STATE,
    TOPIC_PROBE_BUS, TOPIC_PROBE_ONEWIRE, TOPIC_PROBE_PRIMARY, TOPIC_PROBE_SECONDARY,
    TOPIC_PROBE_STATUS,
};

use crate::plant::{Drive, Plant};

/// I2C addresses of the secondary-probe ADC and the one-wire bridge.
const BUS_DEVICES: [u8; 2] = [0x18, 0x30];

/// Channels forced to report a fault, from `SENSOR_FAULTS=primary,bus,...`.
#[derive(Debug, Clone, Copy, Default)]
struct FaultInjection {
    primary: bool,
    secondary: bool,
    onewire: bool,
    bus: bool,
}

impl FaultInjection {
    fn from_env() -> Self {
        let mut faults = Self::default();
        let list = std::env::var("SENSOR_FAULTS").unwrap_or_default();
        for name in list.split(',').map(str::trim).filter(|name| !name.is_empty()) {
            match name.to_ascii_lowercase().as_str() {
                "primary" => faults.primary = true,
                "secondary" => faults.secondary = true,
                "onewire" => faults.onewire = true,
                "bus" => faults.bus = true,
                other => warn!("ignoring unknown fault channel {other:?}"),
            }
        }
        faults
    }
}

pub async fn run() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let mqtt_host = std::env::var("MQTT_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
    let mqtt_port = std::env::var("MQTT_PORT")
        .ok()
        .and_then(|value| value.parse::<u16>().ok())
        .unwrap_or(1883);

    let mut mqtt_options = MqttOptions::new("tempctl-sensor", mqtt_host, mqtt_port);

    if let Ok(user) = std::env::var("MQTT_USER") {
        let pass = std::env::var("MQTT_PASS").unwrap_or_default();
        mqtt_options.set_credentials(user, pass);
    }

    let (mqtt, mut eventloop) = AsyncClient::new(mqtt_options, 32);

    mqtt.subscribe(TOPIC_CONTROLLER_STATE, QoS::AtMostOnce)
        .await
        .context("failed to subscribe to controller state")?;
    mqtt.publish(TOPIC_PROBE_STATUS, QoS::AtLeastOnce, true, "online")
        .await
        .context("failed to publish sensor online status")?;

    let drive = Arc::new(Mutex::new(Drive::default()));
    let latest_drive = drive.clone();
    tokio::spawn(async move {
        loop {
            match eventloop.poll().await {
                Ok(Event::Incoming(Incoming::Publish(message)))
                    if message.topic == TOPIC_CONTROLLER_STATE =>
                {
                    match serde_json::from_slice::<ControllerStatePayload>(&message.payload) {
                        Ok(payload) => *latest_drive.lock().await = Drive::from(&payload),
                        Err(err) => warn!("rejected controller state payload: {err}"),
                    }
                }
                Ok(_) => {}
                Err(err) => {
                    warn!("sensor mqtt poll error: {err}");
                    tokio::time::sleep(Duration::from_secs(2)).await;
                }
            }
        }
    });

    let faults = FaultInjection::from_env();
    info!("sensor simulator started ({faults:?})");

    let mut plant = Plant::new(240, 180);
    let mut interval = tokio::time::interval(Duration::from_secs(2));

    loop {
        interval.tick().await;
        plant.step(*drive.lock().await);

        let reading = |faulted: bool, value: i16| {
            if faulted {
                PROBE_FAULT_PAYLOAD.to_string()
            } else {
                format_tenths(value)
            }
        };
        let bus = if faults.bus {
            PROBE_FAULT_PAYLOAD.to_string()
        } else {
            serde_json::to_string(&BUS_DEVICES)?
        };
        let messages = [
            (TOPIC_PROBE_PRIMARY, reading(faults.primary, plant.chamber())),
            (TOPIC_PROBE_SECONDARY, reading(faults.secondary, plant.ambient())),
            (TOPIC_PROBE_ONEWIRE, reading(faults.onewire, plant.compressor())),
            (TOPIC_PROBE_BUS, bus),
        ];
        debug!("chamber {}", format_tenths(plant.chamber()));

        for (topic, payload) in messages {
            mqtt.publish(topic, QoS::AtLeastOnce, true, payload)
                .await
                .with_context(|| format!("failed to publish {topic}"))?;
        }
    }
}
