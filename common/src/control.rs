//! The controller context: every piece of runtime state, owned in one place and
//! stepped by the task loops.

use crate::{
    actuator::{setpoint_alarm, FanControl, TimeProportioner},
    buttons::{ButtonLevels, ButtonSampler},
    command::{self, format_block, format_bus_scan, Command, SystemQuery},
    display::{text_row, Display, VERSION},
    error::{BusFault, CommandError, ProbeFault},
    menu::{Menu, MenuEvent},
    params::Param,
    pid::{HeatPower, PidController, PidParams, OUTPUT_MAX},
    profile::{update_profile, ProfileOutcome, ProfileTimebase, ProfileTimer},
    scheduler::describe_tasks,
    store::{bounds, ConfigStore, StoreBackend},
    thermostat::{RelayOutputs, ThermostatEngine, ThermostatInput},
    types::{
        format_tenths, tenths_to_f32, AlarmCause, ControllerStatePayload, ControllerStatus,
        RunMode, ThermostatState, Units, ValueKind,
    },
};

/// Latest readings from the probe front end, raw (uncorrected) tenths.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeReadings {
    pub primary: Result<i16, ProbeFault>,
    pub secondary: Result<i16, ProbeFault>,
    pub onewire: Result<i16, ProbeFault>,
    /// Device addresses found on the sensor bus.
    pub bus: Result<Vec<u8>, BusFault>,
}

impl Default for ProbeReadings {
    fn default() -> Self {
        Self {
            primary: Err(ProbeFault::Missing),
            secondary: Err(ProbeFault::Missing),
            onewire: Err(ProbeFault::Missing),
            bus: Err(BusFault),
        }
    }
}

/// Store fields the control loop works from, copied once per control tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct RuntimeCache {
    setpoint: i16,
    hysteresis: i16,
    hysteresis2: i16,
    setpoint_alarm: i16,
    second_probe: bool,
    cooling_delay_s: u16,
    heating_delay_s: u16,
    pid: PidParams,
    power: HeatPower,
    fan_enabled: bool,
    fan_low: i16,
    fan_high: i16,
}

impl RuntimeCache {
    fn load<B: StoreBackend>(store: &ConfigStore<B>) -> Self {
        let minutes = |param| store.param(param).max(0) as u16 * 60;
        Self {
            setpoint: store.param(Param::Setpoint),
            hysteresis: store.param(Param::Hysteresis),
            hysteresis2: store.param(Param::Hysteresis2),
            setpoint_alarm: store.param(Param::SetpointAlarm),
            second_probe: store.flag(Param::SecondProbe),
            cooling_delay_s: minutes(Param::CoolingDelay),
            heating_delay_s: minutes(Param::HeatingDelay),
            pid: PidParams {
                kc: store.param(Param::PidKc),
                ti: store.param(Param::PidTi),
                td: store.param(Param::PidTd),
                ts: store.param(Param::PidTs),
            },
            power: HeatPower {
                limit: store.param(Param::HeatPowerLimit),
                total: store.param(Param::HeatPowerTotal),
            },
            fan_enabled: store.flag(Param::FanControl),
            fan_low: store.param(Param::FanLow),
            fan_high: store.param(Param::FanHigh),
        }
    }
}

/// What one control tick decided.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ControlReport {
    pub previous: ThermostatState,
    pub state: ThermostatState,
    pub previous_alarm: Option<AlarmCause>,
    pub alarm: Option<AlarmCause>,
    pub outputs: RelayOutputs,
    pub pid_output: i16,
}

impl ControlReport {
    pub fn state_changed(&self) -> bool {
        self.previous != self.state
    }

    pub fn alarm_changed(&self) -> bool {
        self.previous_alarm != self.alarm
    }
}

pub struct ControllerContext<B: StoreBackend> {
    store: ConfigStore<B>,
    menu: Menu,
    keys: ButtonSampler,
    display: Display,
    engine: ThermostatEngine,
    pid: PidController,
    ssr: TimeProportioner,
    ssr_on: bool,
    fan: FanControl,
    profile_timer: ProfileTimer,
    timebase: ProfileTimebase,
    probes: ProbeReadings,
    relays: RelayOutputs,
    alarm: Option<AlarmCause>,
    show_sa: bool,
    cache: RuntimeCache,
}

impl<B: StoreBackend> ControllerContext<B> {
    pub fn new(backend: B, timebase: ProfileTimebase) -> Self {
        let store = ConfigStore::open(backend);
        let cache = RuntimeCache::load(&store);
        Self {
            store,
            menu: Menu::new(),
            keys: ButtonSampler::default(),
            display: Display::default(),
            engine: ThermostatEngine::new(),
            pid: PidController::new(),
            ssr: TimeProportioner::default(),
            ssr_on: false,
            fan: FanControl::default(),
            profile_timer: ProfileTimer::default(),
            timebase,
            probes: ProbeReadings::default(),
            relays: RelayOutputs::default(),
            alarm: None,
            show_sa: false,
            cache,
        }
    }

    pub fn store(&self) -> &ConfigStore<B> {
        &self.store
    }

    pub fn display(&self) -> &Display {
        &self.display
    }

    pub fn relays(&self) -> RelayOutputs {
        self.relays
    }

    pub fn alarm(&self) -> Option<AlarmCause> {
        self.alarm
    }

    pub fn ssr_on(&self) -> bool {
        self.ssr_on
    }

    pub fn state(&self) -> ThermostatState {
        self.engine.state()
    }

    pub fn timebase(&self) -> ProfileTimebase {
        self.timebase
    }

    pub fn set_timebase(&mut self, timebase: ProfileTimebase) {
        self.timebase = timebase;
    }

    /// ADC task: latches new readings, applying the `tc`/`tc2` corrections.
    /// Readings outside the temperature range count as a shorted or open probe.
    pub fn update_probes(&mut self, readings: ProbeReadings) {
        let (low, high) = bounds(ValueKind::Temperature, self.store.units());
        let validate = |reading: Result<i16, ProbeFault>, correction: i16| {
            reading.and_then(|raw| {
                if (low..=high).contains(&raw) {
                    Ok(raw.saturating_add(correction))
                } else {
                    Err(ProbeFault::OutOfRange)
                }
            })
        };
        self.probes = ProbeReadings {
            primary: validate(readings.primary, self.store.param(Param::TempCorrection)),
            secondary: validate(readings.secondary, self.store.param(Param::TempCorrection2)),
            onewire: validate(readings.onewire, 0),
            bus: readings.bus,
        };
    }

    /// STD task, every 100 ms: buttons, menu, SSR.
    pub fn menu_tick(&mut self, levels: ButtonLevels) -> Option<MenuEvent> {
        self.keys.sample(levels);
        let event = self
            .menu
            .tick(&self.keys, &mut self.store, &mut self.display);
        if event == Some(MenuEvent::PowerToggled(false)) {
            self.shut_down();
            self.alarm = None;
        }

        let powered = self.store.power_on();
        if !powered && self.menu.is_idle() {
            self.display.show_off();
        }
        self.ssr_on = self.ssr.tick(self.pid.output(), powered);
        event
    }

    /// CTL task, every second: alarm, fan, thermostat, PID and the idle display.
    pub fn control_tick(&mut self) -> ControlReport {
        self.cache = RuntimeCache::load(&self.store);
        let previous = self.engine.state();
        let previous_alarm = self.alarm;

        if !self.store.power_on() {
            self.shut_down();
            self.fan.tick(false, None, 0, 0);
            self.alarm = None;
        } else if let Some(temp) = self.healthy_primary() {
            self.regulate(temp);
        } else {
            self.shut_down();
            self.alarm = Some(AlarmCause::ProbeFault);
            if self.menu.is_idle() {
                self.display.top = text_row("AL");
            }
        }

        ControlReport {
            previous,
            state: self.engine.state(),
            previous_alarm,
            alarm: self.alarm,
            outputs: self.relays,
            pid_output: self.pid.output(),
        }
    }

    /// PRF task, every minute.
    pub fn profile_tick(&mut self) -> Option<ProfileOutcome> {
        if !self.profile_timer.tick(self.timebase) {
            return None;
        }
        Some(update_profile(&mut self.store))
    }

    /// Primary reading when neither probe in use is faulted.
    fn healthy_primary(&self) -> Option<i16> {
        let secondary_ok = !self.cache.second_probe || self.probes.secondary.is_ok();
        self.probes.primary.ok().filter(|_| secondary_ok)
    }

    fn shut_down(&mut self) {
        self.relays = self
            .engine
            .force_off(self.cache.cooling_delay_s, self.cache.heating_delay_s);
        self.pid.shutdown();
    }

    fn regulate(&mut self, temp: i16) {
        let cache = self.cache;
        self.fan.tick(
            cache.fan_enabled,
            self.probes.onewire.ok(),
            cache.fan_low,
            cache.fan_high,
        );
        self.alarm = setpoint_alarm(temp, cache.setpoint, cache.setpoint_alarm)
            .then_some(AlarmCause::SetpointDeviation);

        let input = ThermostatInput {
            temp,
            setpoint: cache.setpoint,
            hysteresis: cache.hysteresis,
            hysteresis2: cache.hysteresis2,
            secondary: if cache.second_probe {
                self.probes.secondary.ok()
            } else {
                None
            },
            cooling_delay_s: cache.cooling_delay_s,
            heating_delay_s: cache.heating_delay_s,
        };
        self.relays = self.engine.tick(&input);
        self.pid.tick(
            temp,
            cache.setpoint,
            cache.pid,
            cache.power,
            self.engine.pid_enabled(),
        );

        if self.menu.is_idle() {
            self.show_idle_view(temp);
        }
    }

    fn show_idle_view(&mut self, temp: i16) {
        if self.alarm.is_some() && self.show_sa {
            self.display.top = text_row("SA");
        } else {
            match self.menu.idle_view() {
                0 => {
                    self.display.set_top_value(temp, true);
                    self.display.set_bottom_value(self.cache.setpoint, true);
                }
                1 => {
                    self.show_reading(self.probes.secondary);
                    self.display.set_bottom_text("t2");
                }
                2 => {
                    self.show_reading(self.probes.onewire);
                    self.display.set_bottom_text("OnE");
                }
                _ => {
                    self.display.set_top_value(self.pid.output(), true);
                    self.display.set_bottom_text("Pid");
                }
            }
        }
        self.show_sa = !self.show_sa;
    }

    fn show_reading(&mut self, reading: Result<i16, ProbeFault>) {
        match reading {
            Ok(value) => self.display.set_top_value(value, true),
            Err(_) => self.display.set_top_text("---"),
        }
    }

    /// Runs one console line and returns the text to send back.
    pub fn execute(&mut self, line: &str) -> Result<String, CommandError> {
        let response = match command::parse(line)? {
            Command::Empty => String::new(),
            Command::Setpoint(value) => {
                if let Some(value) = value {
                    self.store.write_param(Param::Setpoint, value);
                }
                format!("SP={}", format_tenths(self.store.param(Param::Setpoint)))
            }
            Command::Pid(value) => {
                match value {
                    Some(value) if value > OUTPUT_MAX as i32 => self.pid.set_manual(None),
                    Some(value) => self
                        .pid
                        .set_manual(Some(value.clamp(0, OUTPUT_MAX as i32) as i16)),
                    None => {}
                }
                let shown = self.pid.manual().unwrap_or(self.pid.output());
                format!("pid_out={}", format_tenths(shown))
            }
            Command::ReadByte(addr) => {
                let value = self.store.read_byte(addr);
                format!("0x{value:X} ({value})")
            }
            Command::ReadWord(addr) => {
                let value = self.store.read(addr / 2) as u16;
                format!("{value:X} ({value})")
            }
            Command::WriteByte(addr, value) => {
                self.store.write_byte(addr, value);
                "NO_ERR".to_string()
            }
            Command::WriteWord(addr, value) => {
                self.store.write_raw(addr / 2, value as i16);
                "NO_ERR".to_string()
            }
            Command::DumpBlock(block) => format_block(block, self.store.block(block)),
            Command::System(SystemQuery::Version) => VERSION.to_string(),
            Command::System(SystemQuery::BusScan) => match &self.probes.bus {
                Ok(devices) => format_bus_scan(devices),
                Err(fault) => return Err((*fault).into()),
            },
            Command::System(SystemQuery::Tasks) => describe_tasks(),
            Command::System(SystemQuery::OneWire) => match self.probes.onewire {
                Ok(value) => format!("OW: err=0, T={}", format_tenths(value)),
                Err(_) => "OW: err=1, T=-".to_string(),
            },
            Command::SetValue { addr, value } => {
                self.store.write(addr, value);
                "NO_ERR".to_string()
            }
        };
        Ok(response)
    }

    pub fn status(&self) -> ControllerStatus {
        let store = &self.store;
        ControllerStatus {
            current_temp: self.probes.primary.ok().map(tenths_to_f32),
            secondary_temp: self.probes.secondary.ok().map(tenths_to_f32),
            one_wire_temp: self.probes.onewire.ok().map(tenths_to_f32),
            setpoint: tenths_to_f32(store.param(Param::Setpoint)),
            hysteresis: tenths_to_f32(store.param(Param::Hysteresis)),
            units: store.units(),
            run_mode: RunMode::from_raw(store.param(Param::RunMode)),
            step: store.param(Param::ProfileStep),
            step_elapsed: store.param(Param::ProfileDuration),
            state: self.engine.state().as_str(),
            heat: self.relays.heat,
            cool: self.relays.cool,
            heat_led: self.relays.heat_led,
            cool_led: self.relays.cool_led,
            ssr: self.ssr_on,
            fan: self.fan.is_on(),
            pid_output: self.pid.output(),
            pid_manual: self.pid.manual().is_some(),
            alarm: self.alarm,
            buzzer: self.alarm.is_some(),
            power_on: store.power_on(),
            menu_state: self.menu.state().as_str(),
            display_top: self.display.top_text(),
            display_bottom: self.display.bottom_text(),
        }
    }

    pub fn state_payload(&self) -> ControllerStatePayload {
        ControllerStatePayload {
            temp: self.probes.primary.ok().map(tenths_to_f32),
            setpoint: tenths_to_f32(self.store.param(Param::Setpoint)),
            state: self.engine.state(),
            heat: self.relays.heat,
            cool: self.relays.cool,
            ssr: self.ssr_on,
            pid_output: self.pid.output(),
            alarm: self.alarm,
            power_on: self.store.power_on(),
        }
    }

    pub fn units(&self) -> Units {
        self.store.units()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{parameter_addr, MemoryBackend};
    use pretty_assertions::assert_eq;

    fn readings(primary: i16) -> ProbeReadings {
        ProbeReadings {
            primary: Ok(primary),
            secondary: Ok(180),
            onewire: Ok(250),
            bus: Ok(vec![0x18]),
        }
    }

    /// Context with zero probe corrections so readings pass straight through.
    fn context() -> ControllerContext<MemoryBackend> {
        let mut ctx = ControllerContext::new(MemoryBackend::default(), ProfileTimebase::Hours);
        ctx.execute("v117=0").unwrap();
        ctx.execute("v118=0").unwrap();
        ctx
    }

    #[test]
    fn setpoint_command_writes_through() {
        let mut ctx = context();
        assert_eq!(ctx.execute("sp=150").unwrap(), "SP=15.0");
        assert_eq!(ctx.execute("SP").unwrap(), "SP=15.0");
        assert_eq!(ctx.store().param(Param::Setpoint), 150);
        assert_eq!(ctx.store().backend().image.as_ref().unwrap()[114], 150);
    }

    #[test]
    fn pid_command_pins_and_releases_output() {
        let mut ctx = context();
        assert_eq!(ctx.execute("pid=500").unwrap(), "pid_out=50.0");
        assert!(ctx.status().pid_manual);
        assert_eq!(ctx.execute("pid=1001").unwrap(), "pid_out=0.0");
        assert!(!ctx.status().pid_manual);
    }

    #[test]
    fn manual_pid_output_drives_the_ssr() {
        let mut ctx = context();
        ctx.update_probes(readings(200));
        ctx.execute("pid=1000").unwrap();
        ctx.control_tick();
        let on = (0..250)
            .filter(|_| {
                ctx.menu_tick(ButtonLevels::default());
                ctx.ssr_on()
            })
            .count();
        assert_eq!(on, 250);
    }

    #[test]
    fn debug_reads_and_writes() {
        let mut ctx = context();
        // word 114 is SP = 200 = 0x00c8
        assert_eq!(ctx.execute("rw e4").unwrap(), "C8 (200)");
        assert_eq!(ctx.execute("rb e5").unwrap(), "0xC8 (200)");
        assert_eq!(ctx.execute("wb e4 01").unwrap(), "NO_ERR");
        assert_eq!(ctx.store().param(Param::Setpoint), 0x01c8);
        assert_eq!(ctx.execute("ww e4 00fa").unwrap(), "NO_ERR");
        assert_eq!(ctx.store().param(Param::Setpoint), 250);
    }

    #[test]
    fn block_dump_lists_profile_and_parameters() {
        let mut ctx = context();
        let profile = ctx.execute("p0").unwrap();
        assert!(profile.starts_with("p0 160,24,170,24,"));
        assert_eq!(profile.split(',').count(), 19);
        let params = ctx.execute("p6").unwrap();
        assert_eq!(params.split(',').count(), 23);
    }

    #[test]
    fn value_command_wraps_out_of_range() {
        let mut ctx = context();
        let hysteresis = parameter_addr(Param::Hysteresis);
        ctx.execute(&format!("v{hysteresis}=51")).unwrap();
        assert_eq!(ctx.store().param(Param::Hysteresis), 0);
    }

    #[test]
    fn system_queries() {
        let mut ctx = context();
        assert_eq!(ctx.execute("s0").unwrap(), VERSION);
        assert_eq!(ctx.execute("s1").unwrap_err().code(), "ERR_I2C");
        assert_eq!(ctx.execute("s3").unwrap(), "OW: err=1, T=-");
        ctx.update_probes(readings(200));
        assert_eq!(ctx.execute("s1").unwrap(), "I2C: 0x18");
        assert_eq!(ctx.execute("s3").unwrap(), "OW: err=0, T=25.0");
        assert_eq!(ctx.execute("s2").unwrap().lines().count(), 4);
    }

    #[test]
    fn probe_fault_forces_relays_off_and_alarms() {
        let mut ctx = context();
        ctx.execute("v122=0").unwrap();
        ctx.update_probes(readings(260));
        for _ in 0..2 {
            ctx.control_tick();
        }
        assert_eq!(ctx.state(), ThermostatState::Cooling);

        ctx.update_probes(ProbeReadings {
            primary: Err(ProbeFault::OutOfRange),
            ..readings(260)
        });
        let report = ctx.control_tick();
        assert_eq!(report.alarm, Some(AlarmCause::ProbeFault));
        assert!(report.alarm_changed());
        assert_eq!(report.state, ThermostatState::Off);
        assert_eq!(report.outputs, RelayOutputs::default());
        assert_eq!(ctx.display().top_text(), "AL ");
        assert!(ctx.status().buzzer);
    }

    #[test]
    fn second_probe_fault_only_counts_when_enabled() {
        let mut ctx = context();
        ctx.update_probes(ProbeReadings {
            secondary: Err(ProbeFault::Missing),
            ..readings(200)
        });
        assert_eq!(ctx.control_tick().alarm, None);
        ctx.store.write_param(Param::SecondProbe, 1);
        assert_eq!(ctx.control_tick().alarm, Some(AlarmCause::ProbeFault));
    }

    #[test]
    fn readings_outside_the_range_are_faults() {
        let mut ctx = context();
        ctx.update_probes(readings(1500));
        assert_eq!(ctx.control_tick().alarm, Some(AlarmCause::ProbeFault));
    }

    #[test]
    fn corrections_apply_on_entry() {
        let mut ctx = ControllerContext::new(MemoryBackend::default(), ProfileTimebase::Hours);
        ctx.update_probes(readings(200));
        assert_eq!(ctx.status().current_temp, Some(19.2));
        assert_eq!(ctx.status().secondary_temp, Some(17.9));
    }

    #[test]
    fn idle_display_shows_temperature_and_setpoint() {
        let mut ctx = context();
        ctx.update_probes(readings(215));
        ctx.control_tick();
        assert_eq!(ctx.display().top_text(), "21.5");
        assert_eq!(ctx.display().bottom_text(), "20.0");
    }

    #[test]
    fn setpoint_alarm_alternates_with_the_reading() {
        let mut ctx = context();
        ctx.execute("v119=20").unwrap();
        ctx.update_probes(readings(250));
        let report = ctx.control_tick();
        assert_eq!(report.alarm, Some(AlarmCause::SetpointDeviation));
        assert_eq!(ctx.display().top_text(), "25.0");
        ctx.control_tick();
        assert_eq!(ctx.display().top_text(), "SA ");
        ctx.control_tick();
        assert_eq!(ctx.display().top_text(), "25.0");
    }

    #[test]
    fn powered_off_controller_stays_dark() {
        let mut ctx = context();
        ctx.execute("v137=0").unwrap();
        ctx.update_probes(readings(260));
        ctx.execute("pid=1000").unwrap();
        let report = ctx.control_tick();
        assert_eq!(report.outputs, RelayOutputs::default());
        ctx.menu_tick(ButtonLevels::default());
        assert!(!ctx.ssr_on());
        assert_eq!(ctx.display().top_text(), "OFF");
        assert!(!ctx.status().power_on);
    }

    #[test]
    fn profile_task_respects_timebase() {
        let mut ctx = context();
        ctx.execute("v136=0").unwrap();
        assert_eq!(ctx.profile_tick(), None);
        ctx.set_timebase(ProfileTimebase::Minutes);
        assert_eq!(
            ctx.profile_tick(),
            Some(ProfileOutcome::Ramped {
                step: 0,
                elapsed: 1,
                setpoint: 160
            })
        );
    }
}
