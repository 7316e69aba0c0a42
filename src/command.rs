//! The logic board's command set.
//!
//! Each variant carries its fixed opcode and the rule for formatting its
//! argument, so an unknown opcode can only come from text parsed at the
//! edges (the interactive console), never from the controller itself.

use std::fmt;
use std::str::FromStr;

/// Separates the opcode from its argument, and the value from the status.
pub const FIELD_DELIMITER: char = ':';
/// Terminates every request and response frame.
pub const EOL: &[u8; 2] = b"\r\n";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    GetId,
    TestClk8MHz,
    TestClk32kHz,
    TestClkOff,
    ReadAdc(u8),
    ReadRtc,
    SetRtc(u32),
    VMotionOn,
    VMotionOff,
    VMotorOn,
    VMotorOff,
    OptoBypassOn,
    OptoBypassOff,
    ContactorOn,
    ContactorOff,
    EsconEnable,
    EsconDisable,
    CapChargeOn,
    CapChargeOff,
    GetQuadState,
    EsconReadyState,
    SwitchState,
    ChargerState,
    PhotogateState,
    WatchdogOn,
    WatchdogOff,
    EnterStandby,
}

// Opcodes that take no argument, for parsing typed requests.
const PLAIN_OPCODES: &[(&str, Command)] = &[
    ("get_id", Command::GetId),
    ("testclk_8mhz_on", Command::TestClk8MHz),
    ("testclk_32khz_on", Command::TestClk32kHz),
    ("testclk_off", Command::TestClkOff),
    ("rtcread", Command::ReadRtc),
    ("vmotion_on", Command::VMotionOn),
    ("vmotion_off", Command::VMotionOff),
    ("vmotor_on", Command::VMotorOn),
    ("vmotor_off", Command::VMotorOff),
    ("opto_bypass_on", Command::OptoBypassOn),
    ("opto_bypass_off", Command::OptoBypassOff),
    ("contactor_on", Command::ContactorOn),
    ("contactor_off", Command::ContactorOff),
    ("escon_enable", Command::EsconEnable),
    ("escon_disable", Command::EsconDisable),
    ("capcharge_on", Command::CapChargeOn),
    ("capcharge_off", Command::CapChargeOff),
    ("get_quad_state", Command::GetQuadState),
    ("escon_ready_state", Command::EsconReadyState),
    ("switch_state", Command::SwitchState),
    ("charger_state", Command::ChargerState),
    ("photogate_state", Command::PhotogateState),
    ("watchdog_on", Command::WatchdogOn),
    ("watchdog_off", Command::WatchdogOff),
    ("enter_standby", Command::EnterStandby),
];

impl Command {
    pub fn opcode(&self) -> &'static str {
        match self {
            Command::GetId => "get_id",
            Command::TestClk8MHz => "testclk_8mhz_on",
            Command::TestClk32kHz => "testclk_32khz_on",
            Command::TestClkOff => "testclk_off",
            Command::ReadAdc(_) => "adcread",
            Command::ReadRtc => "rtcread",
            Command::SetRtc(_) => "rtcset",
            Command::VMotionOn => "vmotion_on",
            Command::VMotionOff => "vmotion_off",
            Command::VMotorOn => "vmotor_on",
            Command::VMotorOff => "vmotor_off",
            Command::OptoBypassOn => "opto_bypass_on",
            Command::OptoBypassOff => "opto_bypass_off",
            Command::ContactorOn => "contactor_on",
            Command::ContactorOff => "contactor_off",
            Command::EsconEnable => "escon_enable",
            Command::EsconDisable => "escon_disable",
            Command::CapChargeOn => "capcharge_on",
            Command::CapChargeOff => "capcharge_off",
            Command::GetQuadState => "get_quad_state",
            Command::EsconReadyState => "escon_ready_state",
            Command::SwitchState => "switch_state",
            Command::ChargerState => "charger_state",
            Command::PhotogateState => "photogate_state",
            Command::WatchdogOn => "watchdog_on",
            Command::WatchdogOff => "watchdog_off",
            Command::EnterStandby => "enter_standby",
        }
    }

    pub fn argument(&self) -> Option<String> {
        match self {
            Command::ReadAdc(channel) => Some(channel.to_string()),
            Command::SetRtc(timestamp) => Some(timestamp.to_string()),
            _ => None,
        }
    }

    /// Renders the complete request frame, terminator included.
    pub fn to_frame(&self) -> Vec<u8> {
        let mut frame = self.to_string().into_bytes();
        frame.extend_from_slice(EOL);
        frame
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.argument() {
            Some(arg) => write!(f, "{}{}{}", self.opcode(), FIELD_DELIMITER, arg),
            None => f.write_str(self.opcode()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseCommandError {
    /// The opcode is not part of the board's command set.
    UnknownOpcode(String),
    /// The opcode needs an argument that was missing or not a number.
    BadArgument(String),
    /// The opcode takes no argument but one was given.
    UnexpectedArgument(String),
}

impl fmt::Display for ParseCommandError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParseCommandError::UnknownOpcode(op) => write!(f, "unknown opcode '{}'", op),
            ParseCommandError::BadArgument(op) => write!(f, "'{}' needs a numeric argument", op),
            ParseCommandError::UnexpectedArgument(op) => write!(f, "'{}' takes no argument", op),
        }
    }
}

impl std::error::Error for ParseCommandError {}

impl FromStr for Command {
    type Err = ParseCommandError;

    /// Parses the request text as it appears on the wire, without terminator.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let (opcode, arg) = match s.split_once(FIELD_DELIMITER) {
            Some((op, arg)) => (op, Some(arg)),
            None => (s, None),
        };

        match (opcode, arg) {
            ("adcread", Some(arg)) => arg
                .parse()
                .map(Command::ReadAdc)
                .map_err(|_| ParseCommandError::BadArgument(opcode.to_string())),
            ("rtcset", Some(arg)) => arg
                .parse()
                .map(Command::SetRtc)
                .map_err(|_| ParseCommandError::BadArgument(opcode.to_string())),
            ("adcread" | "rtcset", None) => Err(ParseCommandError::BadArgument(opcode.to_string())),
            (op, arg) => {
                let cmd = PLAIN_OPCODES
                    .iter()
                    .find(|(name, _)| *name == op)
                    .map(|(_, cmd)| *cmd)
                    .ok_or_else(|| ParseCommandError::UnknownOpcode(op.to_string()))?;
                match arg {
                    Some(_) => Err(ParseCommandError::UnexpectedArgument(op.to_string())),
                    None => Ok(cmd),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_command_frame() {
        assert_eq!(Command::VMotorOn.to_frame(), b"vmotor_on\r\n".to_vec());
        assert_eq!(Command::EnterStandby.to_string(), "enter_standby");
    }

    #[test]
    fn argument_is_appended_with_delimiter() {
        assert_eq!(Command::ReadAdc(3).to_frame(), b"adcread:3\r\n".to_vec());
        assert_eq!(Command::SetRtc(1_700_000_000).to_string(), "rtcset:1700000000");
    }

    #[test]
    fn every_plain_opcode_round_trips_through_the_table() {
        for (op, cmd) in PLAIN_OPCODES {
            assert_eq!(cmd.opcode(), *op);
            assert_eq!(op.parse::<Command>().unwrap(), *cmd);
        }
    }

    #[test]
    fn parse_rejects_bad_input() {
        assert_eq!(
            "foobar".parse::<Command>().unwrap_err(),
            ParseCommandError::UnknownOpcode("foobar".into())
        );
        assert_eq!(
            "adcread".parse::<Command>().unwrap_err(),
            ParseCommandError::BadArgument("adcread".into())
        );
        assert_eq!(
            "adcread:x".parse::<Command>().unwrap_err(),
            ParseCommandError::BadArgument("adcread".into())
        );
        assert_eq!(
            "vmotor_on:1".parse::<Command>().unwrap_err(),
            ParseCommandError::UnexpectedArgument("vmotor_on".into())
        );
    }

    #[test]
    fn parse_accepts_arguments() {
        assert_eq!(" adcread:7 ".parse::<Command>().unwrap(), Command::ReadAdc(7));
        assert_eq!("rtcset:42".parse::<Command>().unwrap(), Command::SetRtc(42));
    }
}
