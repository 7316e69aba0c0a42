//! Semantic operations on the logic board.
//!
//! Every method is one exchange with the board: it blocks until the board
//! acknowledges, and the engine's lock keeps exchanges strictly ordered.

use std::time::Duration;

use bitflags::bitflags;
use tracing::info;

use crate::command::Command;
use crate::error::{BenchError, Result};
use crate::protocol::{ProtocolEngine, Value};
use crate::transport::Transport;

/// How long after acknowledging `enter_standby` the board actually sleeps.
pub const STANDBY_DELAY: Duration = Duration::from_secs(1);

bitflags! {
    /// Quadrature encoder lines as sampled by the board.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct QuadState: u8 {
        const QUADA = 0x01;
        const QUADB = 0x02;
        const QUADI = 0x04;
    }
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct EsconReady: u8 {
        const READY = 0x01;
    }
}

bitflags! {
    /// Front panel switches.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct SwitchState: u8 {
        const CARTRIDGE = 0x01;
        const STANDBY = 0x02;
        const INJECT = 0x04;
    }
}

bitflags! {
    /// Charger status pins. Both are active low on the board, the bits
    /// report the raw pin level.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct ChargerState: u8 {
        const N_CHG_PG = 0x01;
        const N_CHG = 0x02;
    }
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct PhotogateState: u8 {
        const PHOTO_BH = 0x01;
        const PHOTO_FH = 0x02;
    }
}

/// A connected logic board.
pub struct LogicBoard<T: Transport> {
    engine: ProtocolEngine<T>,
    unique_id: String,
}

impl<T: Transport> LogicBoard<T> {
    /// Takes over `link` and queries the board's unique ID, which is cached
    /// for the rest of the session.
    pub fn connect(link: T, timeout: Duration) -> Result<Self> {
        let engine = ProtocolEngine::with_timeout(link, timeout);
        let unique_id = engine.send(Command::GetId)?.into_string();
        info!(id = %unique_id, "logic board connected");
        Ok(Self { engine, unique_id })
    }

    /// The ID reported at connect time.
    pub fn id(&self) -> &str {
        &self.unique_id
    }

    pub fn engine(&self) -> &ProtocolEngine<T> {
        &self.engine
    }

    /// Closes the session and hands the link back.
    pub fn disconnect(self) -> T {
        self.engine.into_inner()
    }

    /// Runs any command and returns the raw value.
    pub fn send(&self, command: Command) -> Result<Value> {
        self.engine.send(command)
    }

    fn ack(&self, command: Command) -> Result<()> {
        self.engine.send(command).map(|_| ())
    }

    fn number<N: std::str::FromStr>(&self, command: Command) -> Result<N> {
        let value = self.engine.send(command)?;
        value.parse().ok_or_else(|| BenchError::UnexpectedValue {
            opcode: command.opcode(),
            value: value.into_string(),
        })
    }

    /// Routes the 8 MHz HSE clock to TESTCLK.
    pub fn testclk_8mhz(&self) -> Result<()> {
        self.ack(Command::TestClk8MHz)
    }

    /// Routes the 32.768 kHz LSE clock to TESTCLK.
    pub fn testclk_32khz(&self) -> Result<()> {
        self.ack(Command::TestClk32kHz)
    }

    /// Puts TESTCLK back to hi-Z.
    pub fn testclk_off(&self) -> Result<()> {
        self.ack(Command::TestClkOff)
    }

    /// Reads one ADC1 channel, returning the raw count.
    pub fn read_adc(&self, channel: u8) -> Result<u32> {
        self.number(Command::ReadAdc(channel))
    }

    /// Current RTC time as a Unix timestamp.
    pub fn read_rtc(&self) -> Result<u32> {
        self.number(Command::ReadRtc)
    }

    pub fn set_rtc(&self, timestamp: u32) -> Result<()> {
        self.ack(Command::SetRtc(timestamp))
    }

    /// Load switch for PP3V0_MOTION.
    pub fn vmotion_on(&self) -> Result<()> {
        self.ack(Command::VMotionOn)
    }

    pub fn vmotion_off(&self) -> Result<()> {
        self.ack(Command::VMotionOff)
    }

    /// Drives ESCON_POWER_EN.
    pub fn vmotor_on(&self) -> Result<()> {
        self.ack(Command::VMotorOn)
    }

    pub fn vmotor_off(&self) -> Result<()> {
        self.ack(Command::VMotorOff)
    }

    pub fn opto_bypass_on(&self) -> Result<()> {
        self.ack(Command::OptoBypassOn)
    }

    pub fn opto_bypass_off(&self) -> Result<()> {
        self.ack(Command::OptoBypassOff)
    }

    /// Drives LB2PB_CONTACTOR_EN high.
    pub fn contactor_enable(&self) -> Result<()> {
        self.ack(Command::ContactorOn)
    }

    pub fn contactor_disable(&self) -> Result<()> {
        self.ack(Command::ContactorOff)
    }

    /// Drives LB2PB_ESCON_EN high.
    pub fn escon_enable(&self) -> Result<()> {
        self.ack(Command::EsconEnable)
    }

    pub fn escon_disable(&self) -> Result<()> {
        self.ack(Command::EsconDisable)
    }

    /// Enables capacitor charging (LB2PB_CAP_CHARGE_EN is active low).
    pub fn capcharge_enable(&self) -> Result<()> {
        self.ack(Command::CapChargeOn)
    }

    pub fn capcharge_disable(&self) -> Result<()> {
        self.ack(Command::CapChargeOff)
    }

    pub fn quad_state(&self) -> Result<QuadState> {
        self.number(Command::GetQuadState).map(QuadState::from_bits_retain)
    }

    pub fn escon_ready_state(&self) -> Result<EsconReady> {
        self.number(Command::EsconReadyState).map(EsconReady::from_bits_retain)
    }

    pub fn switch_state(&self) -> Result<SwitchState> {
        self.number(Command::SwitchState).map(SwitchState::from_bits_retain)
    }

    pub fn charger_state(&self) -> Result<ChargerState> {
        self.number(Command::ChargerState).map(ChargerState::from_bits_retain)
    }

    pub fn photogate_state(&self) -> Result<PhotogateState> {
        self.number(Command::PhotogateState).map(PhotogateState::from_bits_retain)
    }

    /// Asserts ~WD_EN and starts kicking the watchdog.
    pub fn watchdog_on(&self) -> Result<()> {
        self.ack(Command::WatchdogOn)
    }

    pub fn watchdog_off(&self) -> Result<()> {
        self.ack(Command::WatchdogOff)
    }

    /// Requests the lowest power state.
    ///
    /// The board acknowledges first and goes to sleep [`STANDBY_DELAY`]
    /// later, so it may still answer for a short while after this returns.
    pub fn enter_standby(&self) -> Result<()> {
        self.ack(Command::EnterStandby)?;
        info!(delay = ?STANDBY_DELAY, "board entering standby");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::{SimulatedBoard, TestClock};
    use crate::transport::LoopbackTransport;

    fn connected(board: SimulatedBoard) -> LogicBoard<LoopbackTransport> {
        LogicBoard::connect(LoopbackTransport::new(board), Duration::from_millis(100)).unwrap()
    }

    fn sim(board: &LogicBoard<LoopbackTransport>) -> SimulatedBoard {
        board.engine().with_link(|link| link.board().clone())
    }

    #[test]
    fn connect_caches_id() {
        let board = connected(SimulatedBoard::new("LB-00A7"));
        assert_eq!(board.id(), "LB-00A7");
        // changing the board afterwards does not change the cached id
        board
            .engine()
            .with_link(|link| link.board_mut().unique_id = "other".into());
        assert_eq!(board.id(), "LB-00A7");
    }

    #[test]
    fn rail_commands_reach_the_board() {
        let board = connected(SimulatedBoard::new("x"));
        board.vmotion_on().unwrap();
        board.vmotor_on().unwrap();
        board.opto_bypass_on().unwrap();
        board.contactor_enable().unwrap();
        board.escon_enable().unwrap();
        board.capcharge_enable().unwrap();
        let outputs = sim(&board).outputs;
        assert!(outputs.vmotion && outputs.vmotor && outputs.opto_bypass);
        assert!(outputs.contactor && outputs.escon_enable && outputs.capcharge);

        board.vmotor_off().unwrap();
        board.capcharge_disable().unwrap();
        let outputs = sim(&board).outputs;
        assert!(!outputs.vmotor && !outputs.capcharge);
        assert!(outputs.vmotion);
    }

    #[test]
    fn test_clock_selection() {
        let board = connected(SimulatedBoard::new("x"));
        board.testclk_8mhz().unwrap();
        assert_eq!(sim(&board).test_clock, TestClock::Hse8MHz);
        board.testclk_32khz().unwrap();
        assert_eq!(sim(&board).test_clock, TestClock::Lse32kHz);
        board.testclk_off().unwrap();
        assert_eq!(sim(&board).test_clock, TestClock::Off);
    }

    #[test]
    fn state_queries_decode_bits() {
        let mut sim_board = SimulatedBoard::new("x");
        sim_board.inputs.quad = 0x05;
        sim_board.inputs.switches = 0x02;
        sim_board.inputs.charger = 0x01;
        sim_board.inputs.photogates = 0x03;
        sim_board.inputs.escon_ready = true;
        let board = connected(sim_board);

        assert_eq!(board.quad_state().unwrap(), QuadState::QUADA | QuadState::QUADI);
        assert_eq!(board.switch_state().unwrap(), SwitchState::STANDBY);
        assert_eq!(board.charger_state().unwrap(), ChargerState::N_CHG_PG);
        assert_eq!(board.photogate_state().unwrap(), PhotogateState::all());
        assert!(board.escon_ready_state().unwrap().contains(EsconReady::READY));
    }

    #[test]
    fn adc_and_rtc() {
        let mut sim_board = SimulatedBoard::new("x");
        sim_board.inputs.adc[0] = 1234;
        let board = connected(sim_board);
        assert_eq!(board.read_adc(0).unwrap(), 1234);
        board.set_rtc(1_600_000_000).unwrap();
        let now = board.read_rtc().unwrap();
        assert!((1_600_000_000..1_600_000_005).contains(&now));
    }

    #[test]
    fn device_error_is_passed_through() {
        let board = connected(SimulatedBoard::new("x"));
        match board.read_adc(200) {
            Err(BenchError::Device { code }) => assert_eq!(code, "3"),
            other => panic!("expected device error, got {:?}", other),
        }
    }

    #[test]
    fn watchdog_toggles() {
        let board = connected(SimulatedBoard::new("x"));
        board.watchdog_on().unwrap();
        assert!(sim(&board).watchdog_enabled);
        board.watchdog_off().unwrap();
        assert!(!sim(&board).watchdog_enabled);
    }

    #[test]
    fn standby_is_acked_before_sleep() {
        let board = connected(SimulatedBoard::new("x").with_standby_delay(Duration::from_millis(30)));
        board.enter_standby().unwrap();
        // acknowledged but not yet asleep
        board.read_rtc().unwrap();
        std::thread::sleep(Duration::from_millis(40));
        assert!(matches!(board.read_rtc(), Err(BenchError::Timeout(_))));
    }

    #[test]
    fn non_numeric_value_is_reported() {
        let board = connected(SimulatedBoard::new("x"));
        board
            .engine()
            .with_link(|link| link.board_mut().inputs.adc[1] = 7);
        assert_eq!(board.read_adc(1).unwrap(), 7);
        // get_id returns text; asking for it as a number must fail cleanly
        let err = board.number::<u32>(Command::GetId).unwrap_err();
        assert!(matches!(err, BenchError::UnexpectedValue { opcode: "get_id", .. }));
    }
}
