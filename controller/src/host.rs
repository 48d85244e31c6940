use std::{
    net::SocketAddr,
    sync::{Arc, OnceLock},
    time::{Duration, Instant},
};

use anyhow::Context;
use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use rumqttc::{AsyncClient, Event, Incoming, MqttOptions, QoS};
use serde::{Deserialize, Serialize};
use tokio::{
    io::{AsyncBufReadExt, AsyncWriteExt, BufReader},
    net::{TcpListener, TcpStream},
    sync::Mutex,
    time::MissedTickBehavior,
};
use tower_http::services::ServeDir;
use tracing::{debug, info, warn};

use tempctl_common::{
    scheduler::{TaskSpec, ADC_TASK, CTL_TASK, PRF_TASK, STD_TASK},
    ButtonLevels, ControllerContext, MenuEvent, ProfileOutcome, ProfileTimebase, RuntimeConfig,
    TOPIC_CONTROLLER_STATE, TOPIC_PROBE_BUS, TOPIC_PROBE_ONEWIRE, TOPIC_PROBE_PRIMARY,
    TOPIC_PROBE_SECONDARY, TOPIC_PROBE_STATUS,
};

use crate::{
    probes::{parse_bus_payload, parse_probe_payload, ProbeChannel, ProbeLatch},
    storage::{AppStore, FileBackend},
};

#[derive(Clone)]
struct AppState {
    controller: Arc<Mutex<ControllerContext<FileBackend>>>,
    probes: Arc<Mutex<ProbeLatch>>,
    buttons: Arc<Mutex<ButtonLevels>>,
    runtime: Arc<Mutex<RuntimeConfig>>,
    mqtt: AsyncClient,
    store: AppStore,
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    code: Option<&'static str>,
}

#[derive(Debug, Deserialize)]
struct CommandRequest {
    line: String,
}

#[derive(Debug, Serialize)]
struct CommandResponse {
    response: String,
}

#[derive(Debug, Deserialize)]
struct TimebaseUpdate {
    value: ProfileTimebase,
}

const MAX_MQTT_PAYLOAD_BYTES: usize = 512;
const MAX_CONSOLE_LINE_BYTES: usize = 128;

pub async fn run() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let store = AppStore::new();
    let mut runtime = store.load_runtime_config().await.unwrap_or_else(|err| {
        warn!("failed to load runtime config from store: {err:#}");
        RuntimeConfig::default()
    });
    apply_env_overrides(&mut runtime);
    runtime.sanitize();

    let controller = ControllerContext::new(
        store.store_backend(),
        runtime.controller.profile_timebase,
    );
    if controller.store().first_boot() {
        info!("configuration store initialised from defaults");
    }

    let network = &runtime.network;
    let mut mqtt_options = MqttOptions::new(
        "tempctl-controller",
        network.mqtt_host.clone(),
        network.mqtt_port,
    );
    if !network.mqtt_user.is_empty() {
        mqtt_options.set_credentials(network.mqtt_user.clone(), network.mqtt_pass.clone());
    }
    let (mqtt, eventloop) = AsyncClient::new(mqtt_options, 64);

    let http_port = runtime.http_port;
    let console_port = runtime.console_port;
    let app_state = AppState {
        controller: Arc::new(Mutex::new(controller)),
        probes: Arc::new(Mutex::new(ProbeLatch::default())),
        buttons: Arc::new(Mutex::new(ButtonLevels::default())),
        runtime: Arc::new(Mutex::new(runtime)),
        mqtt,
        store,
    };

    subscribe_topics(&app_state.mqtt).await?;
    spawn_mqtt_loop(app_state.clone(), eventloop);
    spawn_adc_loop(app_state.clone());
    spawn_menu_loop(app_state.clone());
    spawn_control_loop(app_state.clone());
    spawn_profile_loop(app_state.clone());
    spawn_state_publish_loop(app_state.clone());

    let console_addr = SocketAddr::from(([0, 0, 0, 0], console_port));
    let console = TcpListener::bind(console_addr)
        .await
        .with_context(|| format!("failed to bind command console at {console_addr}"))?;
    info!("command console listening on {console_addr}");
    tokio::spawn(serve_console(app_state.clone(), console));

    let web_root = format!("{}/web", env!("CARGO_MANIFEST_DIR"));
    let app = Router::new()
        .route("/api/status", get(handle_get_status))
        .route("/api/command", post(handle_command))
        .route("/api/buttons", post(handle_buttons))
        .route("/api/timebase", post(handle_set_timebase))
        .fallback_service(ServeDir::new(web_root))
        .with_state(app_state);

    let addr = SocketAddr::from(([0, 0, 0, 0], http_port));
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind controller server at {addr}"))?;

    info!("controller listening on http://{addr}");
    axum::serve(listener, app).await?;
    Ok(())
}

fn apply_env_overrides(runtime: &mut RuntimeConfig) {
    let port = |name: &str| {
        std::env::var(name)
            .ok()
            .and_then(|value| value.parse::<u16>().ok())
    };

    if let Ok(host) = std::env::var("MQTT_HOST") {
        runtime.network.mqtt_host = host;
    }
    if let Some(mqtt_port) = port("MQTT_PORT") {
        runtime.network.mqtt_port = mqtt_port;
    }
    if let Ok(user) = std::env::var("MQTT_USER") {
        runtime.network.mqtt_user = user;
    }
    if let Ok(pass) = std::env::var("MQTT_PASS") {
        runtime.network.mqtt_pass = pass;
    }
    if let Some(http_port) = port("CONTROLLER_HTTP_PORT") {
        runtime.http_port = http_port;
    }
    if let Some(console_port) = port("CONTROLLER_CONSOLE_PORT") {
        runtime.console_port = console_port;
    }
}

async fn subscribe_topics(mqtt: &AsyncClient) -> anyhow::Result<()> {
    let topics = [
        TOPIC_PROBE_PRIMARY,
        TOPIC_PROBE_SECONDARY,
        TOPIC_PROBE_ONEWIRE,
        TOPIC_PROBE_BUS,
        TOPIC_PROBE_STATUS,
    ];

    for topic in topics {
        mqtt.subscribe(topic, QoS::AtMostOnce).await?;
    }
    Ok(())
}

fn spawn_mqtt_loop(app_state: AppState, mut eventloop: rumqttc::EventLoop) {
    tokio::spawn(async move {
        loop {
            match eventloop.poll().await {
                Ok(Event::Incoming(Incoming::Publish(message))) => {
                    if let Err(err) =
                        handle_mqtt_message(&app_state, message.topic, message.payload.to_vec())
                            .await
                    {
                        warn!("mqtt message handling error: {err:#}");
                    }
                }
                Ok(Event::Incoming(Incoming::ConnAck(_))) => {
                    info!("mqtt connected");
                }
                Ok(_) => {}
                Err(err) => {
                    warn!("mqtt poll error: {err}");
                    tokio::time::sleep(Duration::from_secs(2)).await;
                }
            }
        }
    });
}

async fn handle_mqtt_message(
    app_state: &AppState,
    topic: String,
    payload: Vec<u8>,
) -> anyhow::Result<()> {
    if payload.len() > MAX_MQTT_PAYLOAD_BYTES {
        warn!(
            "dropping oversized MQTT payload on topic {} ({} bytes)",
            topic,
            payload.len()
        );
        return Ok(());
    }

    let message = String::from_utf8(payload).context("non utf8 mqtt payload")?;
    let now_ms = monotonic_ms();

    let channel = match topic.as_str() {
        TOPIC_PROBE_PRIMARY => ProbeChannel::Primary,
        TOPIC_PROBE_SECONDARY => ProbeChannel::Secondary,
        TOPIC_PROBE_ONEWIRE => ProbeChannel::OneWire,
        TOPIC_PROBE_BUS => {
            match parse_bus_payload(&message) {
                Some(devices) => app_state.probes.lock().await.record_bus(devices, now_ms),
                None => warn!("rejected bus payload {message:?}"),
            }
            return Ok(());
        }
        TOPIC_PROBE_STATUS => {
            info!("probe front end is {}", message.trim());
            return Ok(());
        }
        _ => return Ok(()),
    };

    match parse_probe_payload(&message) {
        Some(reading) => app_state
            .probes
            .lock()
            .await
            .record(channel, reading, now_ms),
        None => warn!("rejected {channel:?} probe payload {message:?}"),
    }
    Ok(())
}

/// Interval for a task table entry: first tick after its phase, then every period.
fn task_interval(task: &TaskSpec) -> tokio::time::Interval {
    let start = tokio::time::Instant::now() + Duration::from_millis(task.phase_ms);
    let mut interval = tokio::time::interval_at(start, Duration::from_millis(task.period_ms));
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    interval
}

fn spawn_adc_loop(app_state: AppState) {
    tokio::spawn(async move {
        let mut interval = task_interval(&ADC_TASK);
        loop {
            interval.tick().await;
            let stale_after_ms = app_state.runtime.lock().await.controller.probe_stale_timeout_ms;
            let readings = app_state
                .probes
                .lock()
                .await
                .snapshot(monotonic_ms(), stale_after_ms);
            app_state.controller.lock().await.update_probes(readings);
        }
    });
}

fn spawn_menu_loop(app_state: AppState) {
    tokio::spawn(async move {
        let mut interval = task_interval(&STD_TASK);
        loop {
            interval.tick().await;
            let levels = *app_state.buttons.lock().await;
            let event = app_state.controller.lock().await.menu_tick(levels);
            match event {
                Some(MenuEvent::PowerToggled(on)) => {
                    info!("power {}", if on { "on" } else { "off" });
                }
                Some(MenuEvent::ValueCommitted { addr, value }) => {
                    info!("menu stored {value} at address {addr}");
                }
                None => {}
            }
        }
    });
}

fn spawn_control_loop(app_state: AppState) {
    tokio::spawn(async move {
        let mut interval = task_interval(&CTL_TASK);
        loop {
            interval.tick().await;
            let report = app_state.controller.lock().await.control_tick();

            if report.state_changed() {
                info!(
                    "thermostat {} -> {}",
                    report.previous.as_str(),
                    report.state.as_str()
                );
            }
            if report.alarm_changed() {
                match report.alarm {
                    Some(cause) => warn!("alarm raised: {cause:?}"),
                    None => info!("alarm cleared"),
                }
            }
            debug!(
                heat = report.outputs.heat,
                cool = report.outputs.cool,
                pid_output = report.pid_output,
                "control tick"
            );
        }
    });
}

fn spawn_profile_loop(app_state: AppState) {
    tokio::spawn(async move {
        let mut interval = task_interval(&PRF_TASK);
        loop {
            interval.tick().await;
            let outcome = app_state.controller.lock().await.profile_tick();
            match outcome {
                Some(ProfileOutcome::Advanced { step, setpoint }) => {
                    info!("profile advanced to step {step}, setpoint {setpoint}");
                }
                Some(ProfileOutcome::Finished { setpoint }) => {
                    info!("profile finished at setpoint {setpoint}, back to thermostat mode");
                }
                Some(other) => debug!("profile tick: {other:?}"),
                None => {}
            }
        }
    });
}

fn spawn_state_publish_loop(app_state: AppState) {
    tokio::spawn(async move {
        let period_ms = app_state
            .runtime
            .lock()
            .await
            .controller
            .state_publish_interval_ms;
        let mut interval = tokio::time::interval(Duration::from_millis(period_ms));
        loop {
            interval.tick().await;

            let payload = {
                let controller = app_state.controller.lock().await;
                serde_json::to_vec(&controller.state_payload())
            };

            match payload {
                Ok(body) => {
                    if let Err(err) = app_state
                        .mqtt
                        .publish(TOPIC_CONTROLLER_STATE, QoS::AtLeastOnce, true, body)
                        .await
                    {
                        warn!("controller state publish failed: {err}");
                    }
                }
                Err(err) => warn!("controller state serialization failed: {err}"),
            }
        }
    });
}

async fn serve_console(app_state: AppState, listener: TcpListener) {
    loop {
        match listener.accept().await {
            Ok((stream, peer)) => {
                debug!("console client connected from {peer}");
                let app_state = app_state.clone();
                tokio::spawn(async move {
                    if let Err(err) = handle_console(app_state, stream).await {
                        warn!("console session with {peer} ended: {err:#}");
                    }
                });
            }
            Err(err) => {
                warn!("console accept failed: {err}");
                tokio::time::sleep(Duration::from_secs(1)).await;
            }
        }
    }
}

async fn handle_console(app_state: AppState, stream: TcpStream) -> anyhow::Result<()> {
    let (reader, mut writer) = stream.into_split();
    let mut lines = BufReader::new(reader).lines();

    while let Some(line) = lines.next_line().await.context("console read failed")? {
        if line.len() > MAX_CONSOLE_LINE_BYTES {
            writer.write_all(b"ERR_CMD\n").await?;
            continue;
        }
        let reply = run_command(&app_state, &line).await.unwrap_or_else(|code| code.to_string());
        if !reply.is_empty() {
            writer.write_all(reply.as_bytes()).await?;
            writer.write_all(b"\n").await?;
        }
    }
    Ok(())
}

/// Executes one protocol line, returning the response text or the error code.
async fn run_command(app_state: &AppState, line: &str) -> Result<String, &'static str> {
    let result = app_state.controller.lock().await.execute(line);
    result.map_err(|err| {
        warn!("command {line:?} rejected: {err}");
        err.code()
    })
}

async fn handle_get_status(State(state): State<AppState>) -> impl IntoResponse {
    let status = state.controller.lock().await.status();
    Json(status)
}

async fn handle_command(
    State(state): State<AppState>,
    Json(request): Json<CommandRequest>,
) -> impl IntoResponse {
    match run_command(&state, &request.line).await {
        Ok(response) => Json(CommandResponse { response }).into_response(),
        Err(code) => (
            StatusCode::BAD_REQUEST,
            Json(ErrorBody {
                error: format!("command rejected: {}", request.line.trim()),
                code: Some(code),
            }),
        )
            .into_response(),
    }
}

async fn handle_buttons(
    State(state): State<AppState>,
    Query(levels): Query<ButtonLevels>,
) -> impl IntoResponse {
    *state.buttons.lock().await = levels;
    handle_get_status(State(state)).await.into_response()
}

async fn handle_set_timebase(
    State(state): State<AppState>,
    Query(update): Query<TimebaseUpdate>,
) -> impl IntoResponse {
    state.controller.lock().await.set_timebase(update.value);
    state.runtime.lock().await.controller.profile_timebase = update.value;

    if let Err(err) = persist_timebase(&state, update.value).await {
        warn!("failed to persist timebase update: {err:#}");
        return error_response(
            StatusCode::INTERNAL_SERVER_ERROR,
            "Failed to persist runtime settings",
        );
    }
    info!("profile timebase set to {:?}", update.value);

    handle_get_status(State(state)).await.into_response()
}

/// Writes the timebase into `runtime.json` without baking in environment overrides.
async fn persist_timebase(state: &AppState, timebase: ProfileTimebase) -> anyhow::Result<()> {
    let mut runtime = state.store.load_runtime_config().await?;
    runtime.controller.profile_timebase = timebase;
    state.store.save_runtime_config(&runtime).await
}

fn error_response(status: StatusCode, message: &str) -> axum::response::Response {
    (
        status,
        Json(ErrorBody {
            error: message.to_string(),
            code: None,
        }),
    )
        .into_response()
}

fn monotonic_ms() -> u64 {
    static START: OnceLock<Instant> = OnceLock::new();
    START
        .get_or_init(Instant::now)
        .elapsed()
        .as_millis()
        .try_into()
        .unwrap_or(u64::MAX)
}
