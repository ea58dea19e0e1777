use std::io::{BufRead, Read, Write};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serialport::{SerialPort, SerialPortInfo, SerialPortType};
use thiserror::Error;
use tracing::{debug, error, info, warn};

use super::link::LineLink;
use super::protocol::{self, Command, Reading, Response};
use crate::options::{GeneratorConfig, OptionArgs};

pub const DEFAULT_DESCRIPTION: &str = "RF Signal Generator";
pub const DEFAULT_IDENTITY: &str = "Josh's Signal Generator!";
pub const DEFAULT_BAUD_RATE: u32 = 115_200;

#[derive(Error, Debug)]
pub enum SigGenError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serial port error: {0}")]
    SerialError(#[from] serialport::Error),

    #[error("Device not connected")]
    NotConnected,

    #[error("No serial port described as {0:?}")]
    PortNotFound(String),

    #[error("Device did not answer {0}")]
    NoResponse(&'static str),

    #[error("Unexpected device identity: expected {expected:?}, got {received:?}")]
    Identification { expected: String, received: String },

    #[error("LED option not found: {0}")]
    UnknownLedMode(String),

    #[error("Invalid options: {0}")]
    Options(String),
}

pub type Result<T> = std::result::Result<T, SigGenError>;

/// Enumeration result reduced to what discovery needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortCandidate {
    pub port_name: String,
    pub description: String,
}

impl From<SerialPortInfo> for PortCandidate {
    fn from(info: SerialPortInfo) -> Self {
        let description = match info.port_type {
            SerialPortType::UsbPort(usb) => usb.product.unwrap_or_default(),
            SerialPortType::BluetoothPort => "Bluetooth".to_string(),
            SerialPortType::PciPort => "PCI".to_string(),
            SerialPortType::Unknown => String::new(),
        };
        PortCandidate {
            port_name: info.port_name,
            description,
        }
    }
}

pub fn list_ports() -> Result<Vec<PortCandidate>> {
    let mut ports: Vec<PortCandidate> = serialport::available_ports()?
        .into_iter()
        .map(PortCandidate::from)
        .collect();
    ports.sort_by(|a, b| a.port_name.cmp(&b.port_name));
    Ok(ports)
}

/// Port whose description equals `description` exactly. Ports are scanned in
/// name order and a later match replaces an earlier one.
pub fn select_port(ports: &[PortCandidate], description: &str) -> Option<String> {
    let mut sorted: Vec<&PortCandidate> = ports.iter().collect();
    sorted.sort_by(|a, b| a.port_name.cmp(&b.port_name));
    sorted
        .into_iter()
        .filter(|p| p.description == description)
        .last()
        .map(|p| p.port_name.clone())
}

/// Last readback seen on a `?` line, stamped on arrival.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Measurement {
    pub frequency_mhz: f64,
    pub power_dbm: f64,
    pub received_at: DateTime<Utc>,
}

impl Measurement {
    pub fn age(&self, now: DateTime<Utc>) -> chrono::Duration {
        now - self.received_at
    }

    pub fn is_stale(&self, max_age: chrono::Duration, now: DateTime<Utc>) -> bool {
        self.age(now) > max_age
    }
}

/// Which response buffer `get_data` should echo and return.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataFilter {
    User,
    Log,
    Rf,
}

/// Serial session with the generator. Generic over the port so tests can run
/// against an in-memory double.
pub struct SignalGenerator<P = Box<dyn SerialPort>> {
    link: Option<LineLink<P>>,
    port_name: Option<String>,
    connected: bool,
    description: String,
    identity: String,
    pub config: GeneratorConfig,
    measurement: Option<Measurement>,
    fresh: Vec<Measurement>,
    user_data: Vec<String>,
    rf_data: Vec<String>,
    log_data: Vec<String>,
}

impl<P: Read + Write> SignalGenerator<P> {
    pub fn new(description: &str, identity: &str) -> Self {
        info!("Initializing signal generator session, looking for {:?}", description);
        SignalGenerator {
            link: None,
            port_name: None,
            connected: false,
            description: description.to_string(),
            identity: identity.to_string(),
            config: GeneratorConfig::default(),
            measurement: None,
            fresh: Vec::new(),
            user_data: Vec::new(),
            rf_data: Vec::new(),
            log_data: Vec::new(),
        }
    }

    pub fn is_connected(&self) -> bool {
        self.connected
    }

    pub fn port_name(&self) -> Option<&str> {
        self.port_name.as_deref()
    }

    pub fn measurement(&self) -> Option<Measurement> {
        self.measurement
    }

    pub fn user_data(&self) -> &[String] {
        &self.user_data
    }

    pub fn log_data(&self) -> &[String] {
        &self.log_data
    }

    pub fn rf_data(&self) -> &[String] {
        &self.rf_data
    }

    #[cfg(test)]
    pub fn port_mut(&mut self) -> Option<&mut P> {
        self.link.as_mut().map(LineLink::get_mut)
    }

    /// Picks the generator's port out of `ports`.
    pub fn find_serial(&mut self, ports: &[PortCandidate]) -> Result<String> {
        match select_port(ports, &self.description) {
            Some(name) => {
                info!("Signal Generator found on port: {}", name);
                self.port_name = Some(name.clone());
                Ok(name)
            }
            None => {
                warn!("Signal Generator not found among {} ports", ports.len());
                Err(SigGenError::PortNotFound(self.description.clone()))
            }
        }
    }

    /// Takes over an already opened port and runs the WHOAMI handshake.
    pub fn attach(&mut self, port: P) -> Result<String> {
        self.link = Some(LineLink::new(port));
        self.connected = false;

        self.send_command(&Command::WhoAmI)?;
        let reply = self
            .get_data(None, true)?
            .into_iter()
            .next()
            .ok_or(SigGenError::NoResponse(protocol::WHOAMI))?;
        let received = protocol::user_text(&reply).to_string();

        if received == self.identity {
            info!("Connected to {}", received);
            self.connected = true;
            Ok(received)
        } else {
            error!("WHOAMI answered {:?}, expected {:?}", received, self.identity);
            Err(SigGenError::Identification {
                expected: self.identity.clone(),
                received,
            })
        }
    }

    pub fn send_data(&mut self, data: &str) -> Result<()> {
        match &mut self.link {
            Some(link) => {
                info!("Sending command to signal generator: {}", data);
                link.send_line(data)?;
                Ok(())
            }
            None => {
                error!("Attempted to send {:?} but signal generator is not connected", data);
                Err(SigGenError::NotConnected)
            }
        }
    }

    pub fn send_command(&mut self, command: &Command) -> Result<()> {
        self.send_data(&command.to_string())
    }

    fn next_line(&mut self) -> Result<Option<String>> {
        match &mut self.link {
            Some(link) => Ok(link.read_line()?),
            None => Err(SigGenError::NotConnected),
        }
    }

    /// Reads response lines until the port goes quiet. With `single_line`
    /// only one raw line is read and returned as is (minus trailing
    /// whitespace). Otherwise every line is sorted by its marker and the
    /// buffer picked by `filter` is returned (empty when `filter` is `None`).
    pub fn get_data(&mut self, filter: Option<DataFilter>, single_line: bool) -> Result<Vec<String>> {
        if single_line {
            let line = self.next_line()?;
            return Ok(line.map(|l| l.trim_end().to_string()).into_iter().collect());
        }

        self.user_data.clear();
        self.rf_data.clear();
        self.fresh.clear();

        while let Some(line) = self.next_line()? {
            self.record(&line, filter);
        }

        Ok(match filter {
            Some(DataFilter::User) => self.user_data.clone(),
            Some(DataFilter::Log) => self.log_data.clone(),
            Some(DataFilter::Rf) => self.rf_data.clone(),
            None => Vec::new(),
        })
    }

    fn record(&mut self, line: &str, filter: Option<DataFilter>) {
        let text = line.trim_end().to_string();
        match Response::classify(line) {
            Response::User(_) => {
                if filter == Some(DataFilter::User) {
                    info!("{}", text);
                }
                self.user_data.push(text);
            }
            Response::Log(_) => {
                if filter == Some(DataFilter::Log) {
                    info!("{}", text);
                }
                self.log_data.push(text);
            }
            Response::Measurement(Reading {
                frequency_mhz,
                power_dbm,
            }) => {
                let measurement = Measurement {
                    frequency_mhz,
                    power_dbm,
                    received_at: Utc::now(),
                };
                self.measurement = Some(measurement);
                self.fresh.push(measurement);
                if filter == Some(DataFilter::Rf) {
                    info!("{}", text);
                }
                self.rf_data.push(text);
            }
            Response::MalformedMeasurement(raw) => {
                warn!("Ignoring malformed readback: {:?}", raw);
            }
            Response::Other(raw) => {
                debug!("Unclassified line: {:?}", raw);
            }
        }
    }

    /// Reads whatever lines are waiting and returns every readback they
    /// carried, oldest first.
    pub fn poll(&mut self) -> Result<Vec<Measurement>> {
        self.get_data(None, false)?;
        Ok(std::mem::take(&mut self.fresh))
    }

    pub fn config_sig_gen(&mut self, frequency_mhz: Option<f64>, power_dbm: Option<f64>) -> Result<()> {
        let command = Command::SigGen {
            frequency_mhz: frequency_mhz.unwrap_or(self.config.frequency_mhz),
            power_dbm: power_dbm.unwrap_or(self.config.power_dbm),
        };
        self.send_command(&command)
    }

    pub fn config_sweep(
        &mut self,
        start_mhz: Option<f64>,
        stop_mhz: Option<f64>,
        power_dbm: Option<f64>,
        steps: Option<u32>,
        time_s: Option<f64>,
    ) -> Result<()> {
        let command = Command::Sweep {
            start_mhz: start_mhz.unwrap_or(self.config.sweep_start_mhz),
            stop_mhz: stop_mhz.unwrap_or(self.config.sweep_stop_mhz),
            steps: steps.unwrap_or(self.config.sweep_steps),
            power_dbm: power_dbm.unwrap_or(self.config.power_dbm),
            time_s: time_s.unwrap_or(self.config.sweep_time_s),
        };
        self.send_command(&command)
    }

    pub fn config_rf(&mut self, enabled: bool) -> Result<()> {
        info!("{} RF output", if enabled { "Enabling" } else { "Disabling" });
        self.config.rf_enabled = enabled;
        let command = self.config.rf_command();
        self.send_command(&command)
    }

    pub fn config_leds(&mut self, led_display: &str) -> Result<()> {
        let command = match led_display.parse() {
            Ok(mode) => Command::Led(mode),
            Err(name) => {
                warn!("LED option not found: {}", name);
                return Err(SigGenError::UnknownLedMode(name));
            }
        };
        self.config.led_display = led_display.to_string();
        self.send_command(&command)
    }

    /// Applies an option string to the settings, sends whatever command the
    /// change calls for, then drains the device's replies.
    pub fn parse_inputs(&mut self, user_input: &str) -> Result<Option<Command>> {
        let outcome = self.apply_options(user_input);
        // replies are drained even when the option string was rejected
        self.get_data(None, false)?;
        outcome
    }

    fn apply_options(&mut self, user_input: &str) -> Result<Option<Command>> {
        let args = OptionArgs::parse_str(user_input)?;
        let pending = self.config.apply(&args)?;
        let command = self.config.command_for(pending)?;
        if let Some(cmd) = &command {
            self.send_command(cmd)?;
        }
        Ok(command)
    }

    /// Pass-through console: every input line goes to the device verbatim and
    /// user lines from the reply are echoed. Ends on `exit` or end of input.
    pub fn talk<R: BufRead, W: Write>(&mut self, input: R, mut output: W) -> Result<()> {
        if !self.connected {
            return Err(SigGenError::NotConnected);
        }
        for line in input.lines() {
            let line = line?;
            let line = line.trim_end();
            if line.eq_ignore_ascii_case("exit") {
                info!("Leaving talk mode");
                break;
            }
            self.send_command(&Command::Raw(line.to_string()))?;
            for reply in self.get_data(Some(DataFilter::User), false)? {
                writeln!(output, "{}", reply)?;
            }
            output.flush()?;
        }
        Ok(())
    }
}

impl SignalGenerator<Box<dyn SerialPort>> {
    /// Opens `com_port` (or the port found earlier) and checks WHOAMI.
    pub fn connect_serial(
        &mut self,
        com_port: Option<&str>,
        baud_rate: u32,
        timeout: Duration,
    ) -> Result<String> {
        if let Some(name) = com_port {
            self.port_name = Some(name.to_string());
        }
        let name = self.port_name.clone().ok_or(SigGenError::NotConnected)?;

        info!("Attempting to connect to signal generator at {}", name);
        let port = serialport::new(&name, baud_rate).timeout(timeout).open()?;
        self.attach(port)
    }

    /// Discovers the port when none is known yet, then connects.
    pub fn connect(&mut self, com_port: Option<&str>, baud_rate: u32, timeout: Duration) -> Result<String> {
        if com_port.is_none() && self.port_name.is_none() {
            let ports = list_ports()?;
            self.find_serial(&ports)?;
        }
        self.connect_serial(com_port, baud_rate, timeout)
    }
}
