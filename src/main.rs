use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use clap::Parser;
use lb_bench::config::{BenchConfig, LogLevel, SerialConfig};
use lb_bench::protocol::DEFAULT_RESPONSE_TIMEOUT;
use lb_bench::transport::DEFAULT_BAUD_RATE;
use lb_bench::{
    logging, BenchError, Command, FixtureKind, LogicBoard, LoopbackTransport, SerialTransport,
    SimulatedBoard, Transport,
};

// Interactive console for poking a logic board by hand.
#[derive(Debug, Parser)]
#[command(name = "bench_cli", version, about = "Logic board bench console")]
struct Args {
    /// TOML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Serial port of the board; overrides the config file.
    #[arg(short, long)]
    port: Option<String>,

    #[arg(short, long)]
    baud: Option<u32>,

    /// Response timeout in milliseconds.
    #[arg(long)]
    timeout_ms: Option<u64>,

    /// Fixture on the bench (logic or power).
    #[arg(long, value_parser = parse_fixture)]
    fixture: Option<FixtureKind>,

    /// Talk to the built-in board simulator instead of real hardware.
    #[arg(long)]
    simulate: bool,

    /// List serial ports and exit.
    #[arg(long)]
    list_ports: bool,

    #[arg(short, long)]
    verbose: bool,
}

fn parse_fixture(s: &str) -> Result<FixtureKind, String> {
    match s {
        "logic" => Ok(FixtureKind::Logic),
        "power" => Ok(FixtureKind::Power),
        other => Err(format!("unknown fixture '{}', expected logic or power", other)),
    }
}

// The main entry point for the bench console.
fn main() -> ExitCode {
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => match BenchConfig::load(path) {
            Ok(config) => config,
            Err(e) => {
                eprintln!("[ERROR] {}: {}", path.display(), e);
                return ExitCode::FAILURE;
            }
        },
        None => BenchConfig::default(),
    };
    if args.verbose {
        config.log_level = LogLevel::Debug;
    }
    if let Some(fixture) = args.fixture {
        config.fixture = fixture;
    }
    if let Err(e) = logging::init(config.log_level) {
        eprintln!("[WARNING] {}", e);
    }

    if args.list_ports {
        list_ports();
        return ExitCode::SUCCESS;
    }

    println!("=========================");
    println!("   Logic Board Console   ");
    println!("=========================");
    println!("Fixture: {:?}", config.fixture);

    let serial = merge_serial(&args, config.serial.take());
    let timeout = serial
        .as_ref()
        .map(SerialConfig::timeout)
        .unwrap_or(DEFAULT_RESPONSE_TIMEOUT);

    let result = if args.simulate {
        let link = LoopbackTransport::new(SimulatedBoard::new("SIM-0001"));
        run_session(link, timeout)
    } else {
        let Some(serial) = serial else {
            eprintln!("[ERROR] No serial port given. Use --port, a config file, or --simulate.");
            return ExitCode::FAILURE;
        };
        match SerialTransport::open(&serial.port, serial.baud_rate) {
            Ok(link) => run_session(link, timeout),
            Err(e) => Err(e),
        }
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("[ERROR] {}", e);
            ExitCode::FAILURE
        }
    }
}

// Command-line values win over the config file.
fn merge_serial(args: &Args, file: Option<SerialConfig>) -> Option<SerialConfig> {
    let mut serial = match (file, &args.port) {
        (Some(mut serial), Some(port)) => {
            serial.port = port.clone();
            serial
        }
        (Some(serial), None) => serial,
        (None, Some(port)) => SerialConfig {
            port: port.clone(),
            baud_rate: DEFAULT_BAUD_RATE,
            timeout_ms: DEFAULT_RESPONSE_TIMEOUT.as_millis() as u64,
        },
        (None, None) => return None,
    };
    if let Some(baud) = args.baud {
        serial.baud_rate = baud;
    }
    if let Some(ms) = args.timeout_ms {
        serial.timeout_ms = ms;
    }
    Some(serial)
}

fn list_ports() {
    match serialport::available_ports() {
        Ok(ports) if ports.is_empty() => eprintln!("[ERROR] No serial ports found."),
        Ok(ports) => {
            println!("Available serial ports:");
            for (i, port) in ports.iter().enumerate() {
                println!("  {}: {}", i, port.port_name);
            }
        }
        Err(e) => eprintln!("[ERROR] Could not enumerate serial ports: {}", e),
    }
}

// Connects, then reads wire commands from stdin until 'exit'.
fn run_session<T: Transport>(link: T, timeout: Duration) -> lb_bench::Result<()> {
    let board = LogicBoard::connect(link, timeout)?;
    println!("Connected to board {}", board.id());
    println!("Enter commands such as 'adcread:3', or type 'exit' to quit.");
    prompt();

    let stdin = io::stdin();
    for line in stdin.lock().lines() {
        let line = line?;
        let input = line.trim();

        if input == "exit" {
            break;
        }
        if !input.is_empty() {
            send_and_display(&board, input);
        }
        prompt();
    }
    Ok(())
}

fn prompt() {
    print!("> ");
    let _ = io::stdout().flush();
}

fn send_and_display<T: Transport>(board: &LogicBoard<T>, input: &str) {
    let command: Command = match input.parse() {
        Ok(command) => command,
        Err(e) => {
            eprintln!("[ERROR] {}", e);
            return;
        }
    };

    match board.send(command) {
        Ok(value) => println!("< {}", value),
        Err(BenchError::Device { code }) => eprintln!("[ERROR] Board returned error code {}.", code),
        Err(BenchError::Timeout(t)) => eprintln!("[ERROR] No response within {:?}.", t),
        Err(e) => eprintln!("[ERROR] {}", e),
    }
}
