use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(author, version, about = "Control an RF signal generator over its serial port", long_about = None)]
pub struct Cli {
    /// Serial port to use instead of discovery (e.g. /dev/ttyACM0, COM3)
    #[arg(long, global = true)]
    pub port: Option<String>,

    /// JSON configuration file
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Show debug output on the console
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub cmd: Cmd,
}

#[derive(Subcommand, Debug)]
pub enum Cmd {
    /// List serial ports and mark the ones that look like a generator
    Ports,
    /// Find the generator, connect and print its identity
    Connect,
    /// Apply an option string, e.g. `set -- -f 100 -r 1`
    Set {
        #[arg(required = true, allow_hyphen_values = true, trailing_var_arg = true)]
        options: Vec<String>,
    },
    /// Type commands straight to the generator (`exit` to leave)
    Talk,
    /// Show the measured frequency and power as they arrive
    Monitor {
        /// Seconds to run
        #[arg(short, long, default_value = "10", value_parser = parse_seconds)]
        duration: Duration,

        /// Refresh interval in milliseconds (config value if omitted)
        #[arg(short, long)]
        interval: Option<u64>,

        /// Save readbacks to a CSV file in the log directory
        #[arg(long)]
        csv: bool,
    },
}

fn parse_seconds(s: &str) -> Result<Duration, String> {
    let secs: f64 = s.parse().map_err(|e| format!("{}", e))?;
    Duration::try_from_secs_f64(secs).map_err(|e| format!("{}: {}", s, e))
}
