#![deny(clippy::unwrap_used)]

use clap::builder::BoolishValueParser;
use clap::{arg, command, value_parser, ArgMatches};
use std::io::ErrorKind;
use std::process::exit;
use std::time::Duration;

use et44ctrl::device::{Device, Options};
use et44ctrl::eng::to_eng;
use et44ctrl::proto::{ProtoError, Result};
use et44ctrl::settings::{
    Averaging, Circuit, DisplayPage, OutputImpedance, PrimaryMode, SecondaryMode, Speed,
    TriggerSource,
};
use et44ctrl::{logging, DEFAULT_BAUDRATE, DEFAULT_TIMEOUT, DEFAULT_TTY};

fn cli() -> clap::Command {
    command!() // requires `cargo` feature
        .arg(
            arg!(
                -p --device <PORT> "Serial port of the instrument"
            )
            .default_value(DEFAULT_TTY)
            .required(false),
        )
        .arg(arg!(
            -d --debug ... "Turn debugging information on"
        ))
        .arg(
            arg!(
                -b --baudrate <BAUDRATE> "Baudrate"
            )
            .default_value(DEFAULT_BAUDRATE.to_string())
            .value_parser(value_parser!(u32)),
        )
        .arg(
            arg!(
                -t --timeout <MS> "Read timeout in milliseconds"
            )
            .default_value(DEFAULT_TIMEOUT.as_millis().to_string())
            .value_parser(value_parser!(u64)),
        )
        .arg(arg!(
            -m --model <MODEL> "Override the model reported by the instrument"
        ))
        .subcommand(clap::Command::new("ident").about("Device identification"))
        .subcommand(clap::Command::new("status").about("Show current configuration"))
        .subcommand(clap::Command::new("beep").about("Sound a beep"))
        .subcommand(clap::Command::new("trigger").about("Send trigger event"))
        .subcommand(clap::Command::new("lock").about("Lock keyboard"))
        .subcommand(clap::Command::new("unlock").about("Unlock keyboard"))
        .subcommand(
            clap::Command::new("calibrate")
                .about("Open/short correction, run twice for each of open and short"),
        )
        .subcommand(clap::Command::new("read").about("Read primary and secondary value"))
        .subcommand(
            clap::Command::new("primary")
                .about("Primary mode (AUTO | R | C | L | Z | DCR | ECAP)")
                .arg(arg!([mode] "Set primary mode").value_parser(value_parser!(PrimaryMode))),
        )
        .subcommand(
            clap::Command::new("secondary")
                .about("Secondary mode (X | D | Q | THETA | ESR)")
                .arg(
                    arg!([mode] "Set secondary mode").value_parser(value_parser!(SecondaryMode)),
                ),
        )
        .subcommand(
            clap::Command::new("circuit")
                .about("Equivalent circuit (SER | PAR)")
                .arg(arg!([mode] "Set equivalent circuit").value_parser(value_parser!(Circuit))),
        )
        .subcommand(
            clap::Command::new("speed")
                .about("Measurement speed (FAST | MEDIUM | SLOW)")
                .arg(arg!([speed] "Set speed").value_parser(value_parser!(Speed))),
        )
        .subcommand(
            clap::Command::new("source")
                .about("Trigger source (INT | MAN | EXT)")
                .arg(
                    arg!([source] "Set trigger source")
                        .value_parser(value_parser!(TriggerSource)),
                ),
        )
        .subcommand(
            clap::Command::new("impedance")
                .about("Output impedance in Ohm (30 | 100)")
                .arg(
                    arg!([ohm] "Set output impedance")
                        .value_parser(value_parser!(OutputImpedance)),
                ),
        )
        .subcommand(
            clap::Command::new("voltage")
                .about("Test signal level in mV")
                .arg(arg!([mv] "Set voltage").value_parser(value_parser!(u32))),
        )
        .subcommand(
            clap::Command::new("bias")
                .about("DC bias in mV (0 - 1500)")
                .arg(arg!([mv] "Set bias").value_parser(value_parser!(u32))),
        )
        .subcommand(
            clap::Command::new("frequency")
                .about("Measurement frequency in Hz")
                .arg(arg!([hz] "Set frequency").value_parser(value_parser!(u32))),
        )
        .subcommand(
            clap::Command::new("relative")
                .about("Relative (deviation) mode")
                .arg(arg!([state] "Set relative mode").value_parser(BoolishValueParser::new())),
        )
        .subcommand(
            clap::Command::new("autorange")
                .about("Auto ranging")
                .arg(arg!([state] "Set auto ranging").value_parser(BoolishValueParser::new())),
        )
        .subcommand(
            clap::Command::new("averaging")
                .about("Min/max/average mode (MIN | MAX | AVG | OFF)")
                .arg(arg!([mode] "Set averaging mode").value_parser(value_parser!(Averaging))),
        )
        .subcommand(
            clap::Command::new("display")
                .about("Display page (MEAS | COMP | SYS)")
                .arg(arg!([page] "Switch display page").value_parser(value_parser!(DisplayPage))),
        )
        .subcommand(
            clap::Command::new("raw")
                .about("Send a raw command")
                .arg(arg!(<command> "Command line, e.g. \"FUNC:IMP:A?\""))
                .arg(
                    arg!(
                        -l --lines <N> "Number of response lines for queries"
                    )
                    .default_value("1")
                    .value_parser(value_parser!(u16).range(1..)),
                ),
        )
        .subcommand_required(true)
}

#[tokio::main]
async fn main() {
    let matches = cli().get_matches();
    logging::init(matches.get_count("debug"));

    if let Err(e) = handle_args(&matches).await {
        let port = matches
            .get_one::<String>("device")
            .map(String::as_str)
            .unwrap_or(DEFAULT_TTY);

        match e {
            ProtoError::ConnectionFailed { source, .. } => {
                if source.kind() == tokio_serial::ErrorKind::NoDevice
                    || matches!(source.kind(), tokio_serial::ErrorKind::Io(ErrorKind::NotFound))
                {
                    eprintln!("{}: File not found", port);
                } else {
                    eprintln!("I/O Error: {} [device: {}]", source, port);
                }
            }
            ProtoError::Io(err) => {
                eprintln!("I/O Error: {} [device: {}]", err, port);
            }
            ProtoError::UnknownCommand(cmd) => {
                eprintln!("Command '{}' was not recognized by device, aborting!", cmd);
            }
            ProtoError::ExecutionFailed(cmd) => {
                eprintln!(
                    "Command '{}' was not executed, maybe device is locked or the value is out of range?",
                    cmd
                );
            }
            ProtoError::Timeout { timeout, .. } => {
                eprintln!(
                    "No response from device within {:?}, check port and baudrate!",
                    timeout
                );
            }
            ProtoError::Abort => {
                eprintln!("Failed to communicate with device, aborting!");
            }
            other => {
                eprintln!("{}", other);
            }
        }
        exit(-1);
    }
}

fn options(matches: &ArgMatches) -> Options {
    Options {
        baudrate: *matches
            .get_one::<u32>("baudrate")
            .unwrap_or(&DEFAULT_BAUDRATE),
        timeout: matches
            .get_one::<u64>("timeout")
            .map(|ms| Duration::from_millis(*ms))
            .unwrap_or(DEFAULT_TIMEOUT),
        model: matches.get_one::<String>("model").cloned(),
        ..Default::default()
    }
}

fn format_value(value: f64) -> String {
    let eng = to_eng(value);
    format!("{:.4} {}", eng.value, eng.prefix)
}

async fn handle_args(matches: &ArgMatches) -> Result<()> {
    let port = matches
        .get_one::<String>("device")
        .map(String::as_str)
        .unwrap_or(DEFAULT_TTY);

    let mut device = Device::new(port, options(matches)).await?;
    eprintln!("Connected to: {} ({})\n", device.ident().model, port);

    match matches.subcommand() {
        Some(("ident", _args)) => {
            let ident = device.ident();
            println!("Manufacturer: {}", ident.manufacturer);
            println!("Model: {}", ident.model);
            println!("Firmware: {}", ident.firmware);
            println!("Hardware: {}", ident.hardware);
            println!("Serial: {}", ident.serial);
        }
        Some(("status", _args)) => {
            println!("{}", device.snapshot().await?);
        }
        Some(("beep", _args)) => {
            device.beep().await?;
            println!("OK");
        }
        Some(("trigger", _args)) => {
            device.trigger().await?;
            println!("OK");
        }
        Some(("lock", _args)) => {
            device.lock().await?;
            println!("OK");
        }
        Some(("unlock", _args)) => {
            device.unlock().await?;
            println!("OK");
        }
        Some(("calibrate", _args)) => {
            device.calibrate().await?;
            println!("OK");
        }
        Some(("read", _args)) => {
            let reading = device.read().await?;
            println!("Primary: {}", format_value(reading.primary));
            println!("Secondary: {}", format_value(reading.secondary));
        }
        Some(("primary", args)) => {
            if let Some(mode) = args.get_one::<PrimaryMode>("mode") {
                device.set_primary_mode(*mode).await?;
                println!("OK");
            } else {
                println!("Primary mode: {}", device.primary_mode().await?);
            }
        }
        Some(("secondary", args)) => {
            if let Some(mode) = args.get_one::<SecondaryMode>("mode") {
                device.set_secondary_mode(*mode).await?;
                println!("OK");
            } else {
                println!("Secondary mode: {}", device.secondary_mode().await?);
            }
        }
        Some(("circuit", args)) => {
            if let Some(circuit) = args.get_one::<Circuit>("mode") {
                device.set_circuit(*circuit).await?;
                println!("OK");
            } else {
                println!("Equivalent circuit: {}", device.circuit().await?);
            }
        }
        Some(("speed", args)) => {
            if let Some(speed) = args.get_one::<Speed>("speed") {
                device.set_speed(*speed).await?;
                println!("OK");
            } else {
                println!("Speed: {}", device.speed().await?);
            }
        }
        Some(("source", args)) => {
            if let Some(source) = args.get_one::<TriggerSource>("source") {
                device.set_trigger_source(*source).await?;
                println!("OK");
            } else {
                println!("Trigger source: {}", device.trigger_source().await?);
            }
        }
        Some(("impedance", args)) => {
            if let Some(z) = args.get_one::<OutputImpedance>("ohm") {
                device.set_output_impedance(*z).await?;
                println!("OK");
            } else {
                println!("Output impedance: {} Ohm", device.output_impedance().await?);
            }
        }
        Some(("voltage", args)) => {
            if let Some(mv) = args.get_one::<u32>("mv") {
                device.set_voltage(*mv).await?;
                println!("OK");
            } else {
                println!("Voltage: {} mV", device.voltage().await?);
            }
        }
        Some(("bias", args)) => {
            if let Some(mv) = args.get_one::<u32>("mv") {
                device.set_bias(*mv).await?;
                println!("OK");
            } else {
                println!("Bias: {} mV", device.bias().await?);
            }
        }
        Some(("frequency", args)) => {
            if let Some(hz) = args.get_one::<u32>("hz") {
                device.set_frequency(*hz).await?;
                println!("OK");
            } else {
                println!("Frequency: {} Hz", device.frequency().await?);
            }
        }
        Some(("relative", args)) => {
            if let Some(state) = args.get_one::<bool>("state") {
                device.set_relative(*state).await?;
                println!("OK");
            } else {
                println!("Relative mode: {}", device.relative().await?);
            }
        }
        Some(("autorange", args)) => {
            if let Some(state) = args.get_one::<bool>("state") {
                device.set_auto_range(*state).await?;
                println!("OK");
            } else {
                println!("Auto range: {}", device.auto_range().await?);
            }
        }
        Some(("averaging", args)) => {
            if let Some(mode) = args.get_one::<Averaging>("mode") {
                device.set_averaging(*mode).await?;
                println!("OK");
            } else {
                println!("Averaging: {}", device.averaging().await?);
                match device.averaged_value().await? {
                    Some(value) => println!("Value: {}", value),
                    None => println!("Value: --- OFF ---"),
                }
            }
        }
        Some(("display", args)) => {
            if let Some(page) = args.get_one::<DisplayPage>("page") {
                device.set_display_page(*page).await?;
                println!("OK");
            } else {
                println!("Display page: {}", device.display_page().await?);
            }
        }
        Some(("raw", args)) => {
            let command = args
                .get_one::<String>("command")
                .cloned()
                .unwrap_or_default();
            let lines = usize::from(*args.get_one::<u16>("lines").unwrap_or(&1));
            if command.trim_end().ends_with('?') {
                for line in device.query_lines(command, lines, None).await? {
                    println!("{}", line.as_deref().unwrap_or("--- Rcmd err ---"));
                }
            } else {
                device.write(command).await?;
                println!("OK");
            }
        }
        _ => unreachable!("subcommand_required"),
    }

    device.close().await
}
