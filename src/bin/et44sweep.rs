#![deny(clippy::unwrap_used)]

use clap::{arg, command, value_parser, ArgMatches};
use std::path::Path;
use std::process::exit;
use std::time::Duration;

use et44ctrl::device::Options;
use et44ctrl::eng::scale_series;
use et44ctrl::settings::{Circuit, PrimaryMode, SecondaryMode, Speed};
use et44ctrl::sweep::{self, SweepError, SweepRequest, SweepResult};
use et44ctrl::{logging, DEFAULT_BAUDRATE, DEFAULT_TTY};

fn cli() -> clap::Command {
    command!()
        .about("Frequency sweep measurement")
        .arg(
            arg!(<primary> "Primary parameter")
                .value_parser(["L", "C", "R", "Z"])
                .ignore_case(true),
        )
        .arg(
            arg!([secondary] ... "Secondary parameter(s) (Q | X | THETA | D | ESR)")
                .value_parser(value_parser!(SecondaryMode)),
        )
        .arg(
            arg!(
                -p --device <PORT> "Serial port of the instrument"
            )
            .default_value(DEFAULT_TTY)
            .required(false),
        )
        .arg(
            arg!(
                --baudrate <BAUDRATE> "Baudrate"
            )
            .default_value(DEFAULT_BAUDRATE.to_string())
            .value_parser(value_parser!(u32)),
        )
        .arg(
            arg!(
                -s --circuit <MODE> "Equivalent circuit (SER | PAR)"
            )
            .default_value("SER")
            .value_parser(value_parser!(Circuit)),
        )
        .arg(
            arg!(
                -v --volt <MV> "Voltage level [mV] for measurement"
            )
            .default_value("1000")
            .value_parser(value_parser!(u32)),
        )
        .arg(
            arg!(
                -b --bias <MV> "DC voltage bias [mV] (0 - 1500)"
            )
            .default_value("0")
            .value_parser(value_parser!(u32)),
        )
        .arg(
            arg!(
                -S --speed <SPEED> "Speed (FAST | MEDIUM | SLOW)"
            )
            .default_value("SLOW")
            .value_parser(value_parser!(Speed)),
        )
        .arg(
            arg!(
                -d --delay <SECONDS> "Delay after changing the frequency"
            )
            .default_value("2.0")
            .value_parser(value_parser!(f64)),
        )
        .arg(
            arg!(
                -o --output <BASENAME> "Basename of the output files"
            )
            .default_value("sweep"),
        )
        .arg(arg!(
            --debug ... "Turn debugging information on (long form only, -d is --delay)"
        ))
}

fn request(matches: &ArgMatches) -> Result<SweepRequest, String> {
    let primary: PrimaryMode = matches
        .get_one::<String>("primary")
        .ok_or("primary parameter missing")?
        .parse()
        .map_err(|e| format!("{}", e))?;
    let secondaries = matches
        .get_many::<SecondaryMode>("secondary")
        .map(|modes| modes.copied().collect())
        .unwrap_or_default();
    let delay = *matches.get_one::<f64>("delay").unwrap_or(&2.0);
    let settle = Duration::try_from_secs_f64(delay).map_err(|e| format!("delay: {}", e))?;

    let mut request = SweepRequest::new(primary, secondaries);
    request.circuit = *matches
        .get_one::<Circuit>("circuit")
        .unwrap_or(&Circuit::Series);
    request.voltage = *matches.get_one::<u32>("volt").unwrap_or(&1000);
    request.bias = *matches.get_one::<u32>("bias").unwrap_or(&0);
    request.speed = *matches.get_one::<Speed>("speed").unwrap_or(&Speed::Slow);
    request.settle = settle;
    Ok(request)
}

/// Unit of a column, by header token.
fn unit(token: &str) -> &'static str {
    match token {
        "f" => "kHz",
        "L" => "H",
        "C" => "F",
        "R" | "Z" | "X" | "ESR" => "Ω",
        "THETA" => "°",
        _ => "",
    }
}

fn write_csv(path: &Path, result: &SweepResult) -> Result<(), csv::Error> {
    let mut writer = csv::Writer::from_path(path)?;
    writer.write_record(&result.header)?;
    for row in &result.rows {
        writer.write_record(row.values().iter().map(f64::to_string))?;
    }
    writer.flush()?;
    Ok(())
}

/// Result table with every measured column in engineering notation.
fn print_table(result: &SweepResult) {
    let mut columns = Vec::with_capacity(result.header.len());
    let mut titles = Vec::with_capacity(result.header.len());
    for (index, name) in result.header.iter().enumerate() {
        let mut column = result.column(index);
        let prefix = if index == 0 {
            ""
        } else {
            scale_series(&mut column).prefix
        };
        let unit = unit(name);
        titles.push(if unit.is_empty() && prefix.is_empty() {
            name.clone()
        } else {
            format!("{} [{}{}]", name, prefix, unit)
        });
        columns.push(column);
    }

    println!("Sweep started {}", result.started.format("%Y-%m-%d %H:%M:%S"));
    println!(
        "{}",
        titles
            .iter()
            .map(|t| format!("{:>14}", t))
            .collect::<String>()
    );
    for row in 0..result.rows.len() {
        println!(
            "{}",
            columns
                .iter()
                .map(|c| format!("{:>14.4}", c[row]))
                .collect::<String>()
        );
    }
}

fn save(output: &str, result: &SweepResult) {
    let path = format!("{}.csv", output);
    match write_csv(Path::new(&path), result) {
        Ok(()) => eprintln!("Saved {} rows to {}", result.rows.len(), path),
        Err(err) => {
            eprintln!("Unable to write {}: {}", path, err);
            exit(-1);
        }
    }
}

#[tokio::main]
async fn main() {
    let matches = cli().get_matches();
    logging::init(matches.get_count("debug"));

    let request = match request(&matches) {
        Ok(request) => request,
        Err(err) => {
            eprintln!("{}", err);
            exit(2);
        }
    };
    let port = matches
        .get_one::<String>("device")
        .map(String::as_str)
        .unwrap_or(DEFAULT_TTY);
    let output = matches
        .get_one::<String>("output")
        .map(String::as_str)
        .unwrap_or("sweep");
    let options = Options {
        baudrate: *matches
            .get_one::<u32>("baudrate")
            .unwrap_or(&DEFAULT_BAUDRATE),
        ..Default::default()
    };

    match sweep::run(port, options, &request).await {
        Ok(result) => {
            save(output, &result);
            print_table(&result);
        }
        Err(SweepError::Connect(err)) => {
            eprintln!("Connection to instrument failed: {} [device: {}]", err, port);
            exit(-1);
        }
        Err(SweepError::Measure {
            frequency,
            source,
            partial,
        }) => {
            eprintln!("Measurement at {} Hz failed: {}", frequency, source);
            if !partial.rows.is_empty() {
                save(output, &partial);
                print_table(&partial);
            }
            exit(-1);
        }
        Err(err) => {
            eprintln!("{}", err);
            exit(-1);
        }
    }
}
