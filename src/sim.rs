//! # Simulated Logic Board
//!
//! An in-memory stand-in for the logic board firmware. It keeps the state a
//! test sequence can observe (rails, test clock, RTC, input lines) and
//! answers request lines exactly as the real board does, so the protocol
//! engine and controller can be exercised without hardware.

use std::time::{Duration, Instant};

use crate::board::STANDBY_DELAY;
use crate::command::{Command, ParseCommandError};

/// Number of ADC1 channels the firmware exposes.
pub const ADC_CHANNELS: usize = 19;

// Diagnostic codes sent back with `ER`.
pub const ERR_UNKNOWN_COMMAND: u8 = 1;
pub const ERR_BAD_ARGUMENT: u8 = 2;
pub const ERR_ADC_CHANNEL: u8 = 3;

// Which signal the TESTCLK pin is driving.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum TestClock {
    #[default]
    Off,
    Hse8MHz,
    Lse32kHz,
}

// Board-driven output lines.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct Outputs {
    pub vmotion: bool,
    pub vmotor: bool,
    pub opto_bypass: bool,
    pub contactor: bool,
    pub escon_enable: bool,
    pub capcharge: bool,
}

// Lines the board samples; the fixture (or a test) drives these.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct Inputs {
    // QUADA 0x01, QUADB 0x02, QUADI 0x04
    pub quad: u8,
    pub escon_ready: bool,
    // cartridge 0x01, standby 0x02, inject 0x04
    pub switches: u8,
    // ~CHG_PG 0x01, ~CHG 0x02
    pub charger: u8,
    // PHOTO_BH 0x01, PHOTO_FH 0x02
    pub photogates: u8,
    pub adc: [u16; ADC_CHANNELS],
}

// The whole observable state of the simulated board.
#[derive(Debug, Clone)]
pub struct SimulatedBoard {
    pub unique_id: String,
    pub test_clock: TestClock,
    pub outputs: Outputs,
    pub inputs: Inputs,
    pub watchdog_enabled: bool,
    // Number of watchdog kicks since it was enabled; advanced per request.
    pub watchdog_kicks: u32,
    rtc_base: u32,
    rtc_set_at: Instant,
    standby_delay: Duration,
    standby_requested_at: Option<Instant>,
}

impl SimulatedBoard {
    /// Creates a board reporting `unique_id`, everything off.
    pub fn new(unique_id: impl Into<String>) -> Self {
        Self {
            unique_id: unique_id.into(),
            test_clock: TestClock::Off,
            outputs: Outputs::default(),
            inputs: Inputs::default(),
            watchdog_enabled: false,
            watchdog_kicks: 0,
            rtc_base: 0,
            rtc_set_at: Instant::now(),
            standby_delay: STANDBY_DELAY,
            standby_requested_at: None,
        }
    }

    /// Overrides the delay between the standby ack and actually sleeping.
    pub fn with_standby_delay(mut self, delay: Duration) -> Self {
        self.standby_delay = delay;
        self
    }

    /// True once the standby delay has run out; a sleeping board is silent.
    pub fn is_asleep(&self) -> bool {
        self.standby_requested_at
            .is_some_and(|at| at.elapsed() >= self.standby_delay)
    }

    pub fn rtc(&self) -> u32 {
        self.rtc_base
            .saturating_add(self.rtc_set_at.elapsed().as_secs() as u32)
    }

    /// Processes one request line (terminator stripped) and returns the
    /// complete response frame, or an empty string when asleep.
    pub fn process_request(&mut self, request: &str) -> String {
        if self.is_asleep() {
            return String::new();
        }
        if self.watchdog_enabled {
            self.watchdog_kicks += 1;
        }

        let command = match request.parse::<Command>() {
            Ok(command) => command,
            Err(ParseCommandError::UnknownOpcode(_)) => return error_frame(ERR_UNKNOWN_COMMAND),
            Err(_) => return error_frame(ERR_BAD_ARGUMENT),
        };

        match self.execute_command(command) {
            Ok(value) => format!("{}:OK\r\n", value),
            Err(code) => error_frame(code),
        }
    }

    // Applies a parsed command and returns the response value.
    fn execute_command(&mut self, command: Command) -> Result<String, u8> {
        let value = match command {
            Command::GetId => return Ok(self.unique_id.clone()),
            Command::TestClk8MHz => {
                self.test_clock = TestClock::Hse8MHz;
                0
            }
            Command::TestClk32kHz => {
                self.test_clock = TestClock::Lse32kHz;
                0
            }
            Command::TestClkOff => {
                self.test_clock = TestClock::Off;
                0
            }
            Command::ReadAdc(channel) => {
                let count = self
                    .inputs
                    .adc
                    .get(channel as usize)
                    .ok_or(ERR_ADC_CHANNEL)?;
                u32::from(*count)
            }
            Command::ReadRtc => self.rtc(),
            Command::SetRtc(timestamp) => {
                self.rtc_base = timestamp;
                self.rtc_set_at = Instant::now();
                0
            }
            Command::VMotionOn => set(&mut self.outputs.vmotion, true),
            Command::VMotionOff => set(&mut self.outputs.vmotion, false),
            Command::VMotorOn => set(&mut self.outputs.vmotor, true),
            Command::VMotorOff => set(&mut self.outputs.vmotor, false),
            Command::OptoBypassOn => set(&mut self.outputs.opto_bypass, true),
            Command::OptoBypassOff => set(&mut self.outputs.opto_bypass, false),
            Command::ContactorOn => set(&mut self.outputs.contactor, true),
            Command::ContactorOff => set(&mut self.outputs.contactor, false),
            Command::EsconEnable => set(&mut self.outputs.escon_enable, true),
            Command::EsconDisable => set(&mut self.outputs.escon_enable, false),
            Command::CapChargeOn => set(&mut self.outputs.capcharge, true),
            Command::CapChargeOff => set(&mut self.outputs.capcharge, false),
            Command::GetQuadState => u32::from(self.inputs.quad & 0x07),
            Command::EsconReadyState => u32::from(self.inputs.escon_ready),
            Command::SwitchState => u32::from(self.inputs.switches & 0x07),
            Command::ChargerState => u32::from(self.inputs.charger & 0x03),
            Command::PhotogateState => u32::from(self.inputs.photogates & 0x03),
            Command::WatchdogOn => {
                self.watchdog_enabled = true;
                self.watchdog_kicks = 0;
                0
            }
            Command::WatchdogOff => set(&mut self.watchdog_enabled, false),
            Command::EnterStandby => {
                self.standby_requested_at = Some(Instant::now());
                0
            }
        };
        Ok(value.to_string())
    }
}

fn set(line: &mut bool, on: bool) -> u32 {
    *line = on;
    0
}

fn error_frame(code: u8) -> String {
    format!("{}:ER\r\n", code)
}
