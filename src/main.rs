mod cli;

use std::io;
use std::path::Path;
use std::time::Duration;

use clap::Parser;
use serialport::SerialPort;
use tracing::{debug, error, info};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::prelude::*;
use tracing_subscriber::fmt;

use cli::{Cli, Cmd};
use siggen::config::AppConfig;
use siggen::devices::{self, SignalGenerator};
use siggen::devices::siggen::list_ports;
use siggen::monitor::{self, MonitorConfig};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => AppConfig::load(path)?,
        None => AppConfig::default(),
    };
    if cli.port.is_some() {
        config.port = cli.port.clone();
    }

    // Set up logging, keeping the guard alive so buffered lines reach the file
    let _guard = setup_logging(&config.log_dir, cli.verbose);
    info!("Starting application");

    if let Err(e) = run(cli.cmd, &config) {
        error!("Command failed: {}", e);
        eprintln!("Error: {}", e);
        return Err(e);
    }

    info!("Application shutting down");
    Ok(())
}

fn run(cmd: Cmd, config: &AppConfig) -> Result<(), Box<dyn std::error::Error>> {
    match cmd {
        Cmd::Ports => {
            let ports = list_ports()?;
            if ports.is_empty() {
                println!("No serial ports found");
            }
            for port in ports {
                let mark = if port.description == config.description { "*" } else { " " };
                println!("{} {}: {}", mark, port.port_name, port.description);
            }
        }
        Cmd::Connect => {
            let (sg, id) = connect(config)?;
            println!(
                "Connected to {} on {}",
                id,
                sg.port_name().unwrap_or("unknown port")
            );
        }
        Cmd::Set { options } => {
            let (mut sg, _) = connect(config)?;
            match sg.parse_inputs(&options.join(" "))? {
                Some(command) => println!("Sent: {}", command),
                None => println!("Settings stored, nothing sent (RF is off)"),
            }
            for line in sg.user_data() {
                println!("{}", line);
            }
            for line in sg.log_data() {
                info!("{}", line);
            }
            for line in sg.rf_data() {
                debug!("{}", line);
            }
        }
        Cmd::Talk => {
            let (mut sg, id) = connect(config)?;
            println!("Connected to {}. Type `exit` to leave.", id);
            sg.talk(io::stdin().lock(), io::stdout().lock())?;
        }
        Cmd::Monitor {
            duration,
            interval,
            csv,
        } => {
            let (mut sg, _) = connect(config)?;
            let monitor_config = MonitorConfig {
                duration,
                interval: interval
                    .map(Duration::from_millis)
                    .unwrap_or_else(|| config.poll_interval()),
                stale_after: config.stale_after(),
                record_csv: csv,
                log_dir: config.log_dir.clone(),
            };
            let summary = monitor::run_monitor(&mut sg, &monitor_config, &mut io::stdout().lock())?;
            if let Some(path) = summary.csv_path {
                println!("Readbacks saved to: {}", path.display());
            }
        }
    }
    Ok(())
}

fn connect(config: &AppConfig) -> devices::Result<(SignalGenerator<Box<dyn SerialPort>>, String)> {
    let mut sg: SignalGenerator<Box<dyn SerialPort>> =
        SignalGenerator::new(&config.description, &config.identity);
    let id = sg.connect(
        config.port.as_deref(),
        config.baud_rate,
        config.read_timeout(),
    )?;
    Ok((sg, id))
}

fn setup_logging(log_dir: &Path, verbose: bool) -> WorkerGuard {
    // Set up file-based logging with rotation
    let file_appender = rolling::daily(log_dir, "siggen.log");
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let file_layer = fmt::layer()
        .with_writer(non_blocking)
        .with_ansi(false) // Disable ANSI colors in log files
        .with_level(true)
        .with_filter(LevelFilter::DEBUG);

    let console_level = if verbose { LevelFilter::DEBUG } else { LevelFilter::WARN };
    let console_layer = fmt::layer()
        .with_writer(io::stderr)
        .with_target(false)
        .with_filter(console_level);

    tracing_subscriber::registry()
        .with(file_layer)
        .with(console_layer)
        .init();

    guard
}
