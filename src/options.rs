use crate::devices::protocol::{Command, LedMode};
use crate::devices::{Result, SigGenError};
use clap::Parser;
use tracing::{info, warn};

/// Option strings accepted by `SignalGenerator::parse_inputs`, e.g.
/// `"--frequency 100.000"` or `"-m w -r 1"`.
#[derive(Parser, Debug, Default, Clone, PartialEq)]
#[command(name = "siggen", about = "Controls RF Signal Generator", no_binary_name = true)]
pub struct OptionArgs {
    /// select mode ([g]enerator, s[w]eep)
    #[arg(short = 'm', long = "mode")]
    pub mode: Option<String>,

    /// frequency for signal generator in MHz
    #[arg(short = 'f', long = "frequency", allow_negative_numbers = true)]
    pub frequency: Option<f64>,

    /// output power in dBm
    #[arg(short = 'p', long = "power", allow_negative_numbers = true)]
    pub power: Option<f64>,

    /// start frequency for sweep in MHz
    #[arg(short = 'a', long = "start", allow_negative_numbers = true)]
    pub start_freq: Option<f64>,

    /// stop frequency for sweep in MHz
    #[arg(short = 'o', long = "stop", allow_negative_numbers = true)]
    pub stop_freq: Option<f64>,

    /// number of steps in sweep
    #[arg(short = 's', long = "steps")]
    pub steps: Option<u32>,

    /// time to sweep frequencies in seconds
    #[arg(short = 't', long = "time", allow_negative_numbers = true)]
    pub time: Option<f64>,

    /// led display (kitt, rainbow, binary, off)
    #[arg(short = 'l', long = "led")]
    pub led: Option<String>,

    /// rf enabled (1, 0)
    #[arg(short = 'r', long = "rf", allow_negative_numbers = true)]
    pub rf_enabled: Option<i64>,
}

impl OptionArgs {
    pub fn parse_str(input: &str) -> Result<Self> {
        OptionArgs::try_parse_from(input.split_whitespace())
            .map_err(|e| SigGenError::Options(e.to_string().trim().to_string()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Generator,
    Sweep,
}

/// Which one-shot setting the latest option string touched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PendingUpdate {
    Rf,
    Led,
}

/// Current generator settings. Every option string overwrites the fields it
/// names; nothing else is remembered.
#[derive(Debug, Clone, PartialEq)]
pub struct GeneratorConfig {
    pub mode: Mode,
    pub frequency_mhz: f64,
    pub power_dbm: f64,
    pub sweep_start_mhz: f64,
    pub sweep_stop_mhz: f64,
    pub sweep_steps: u32,
    pub sweep_time_s: f64,
    pub led_display: String,
    pub rf_enabled: bool,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            mode: Mode::Generator,
            frequency_mhz: 25.0,
            power_dbm: 0.0,
            sweep_start_mhz: 25.0,
            sweep_stop_mhz: 100.0,
            sweep_steps: 100,
            sweep_time_s: 5.0,
            led_display: "kitt".to_string(),
            rf_enabled: false,
        }
    }
}

impl GeneratorConfig {
    /// Copies the given options into the settings. When both `--led` and
    /// `--rf` are present the RF update is the one reported. An unknown LED
    /// name rejects the whole update and leaves the settings untouched.
    pub fn apply(&mut self, args: &OptionArgs) -> Result<Option<PendingUpdate>> {
        if let Some(led) = &args.led {
            led.parse::<LedMode>().map_err(|name| {
                warn!("LED option not found: {}", name);
                SigGenError::UnknownLedMode(name)
            })?;
        }

        let mut pending = None;

        match args.mode.as_deref() {
            Some("g") => self.mode = Mode::Generator,
            Some("w") => self.mode = Mode::Sweep,
            Some(other) => warn!("Ignoring unknown mode {:?}", other),
            None => {}
        }

        if let Some(frequency) = args.frequency {
            self.frequency_mhz = frequency;
        }
        if let Some(power) = args.power {
            self.power_dbm = power;
        }
        if let Some(start) = args.start_freq {
            self.sweep_start_mhz = start;
        }
        if let Some(stop) = args.stop_freq {
            self.sweep_stop_mhz = stop;
        }
        if let Some(steps) = args.steps {
            self.sweep_steps = steps;
        }
        if let Some(time) = args.time {
            self.sweep_time_s = time;
        }

        if let Some(led) = &args.led {
            pending = Some(PendingUpdate::Led);
            self.led_display = led.clone();
        }

        if let Some(rf) = args.rf_enabled {
            pending = Some(PendingUpdate::Rf);
            match rf {
                1 => self.rf_enabled = true,
                0 => self.rf_enabled = false,
                other => warn!("RF flag {} is neither 0 nor 1, keeping current state", other),
            }
        }

        Ok(pending)
    }

    pub fn sig_gen_command(&self) -> Command {
        Command::SigGen {
            frequency_mhz: self.frequency_mhz,
            power_dbm: self.power_dbm,
        }
    }

    pub fn sweep_command(&self) -> Command {
        Command::Sweep {
            start_mhz: self.sweep_start_mhz,
            stop_mhz: self.sweep_stop_mhz,
            steps: self.sweep_steps,
            power_dbm: self.power_dbm,
            time_s: self.sweep_time_s,
        }
    }

    pub fn rf_command(&self) -> Command {
        if self.rf_enabled {
            Command::EnableRf
        } else {
            Command::DisableRf
        }
    }

    pub fn led_command(&self) -> Result<Command> {
        self.led_display
            .parse::<LedMode>()
            .map(Command::Led)
            .map_err(SigGenError::UnknownLedMode)
    }

    /// The command that brings the device in line with these settings after
    /// an update, if any. Output settings are only pushed while RF is on.
    pub fn command_for(&self, pending: Option<PendingUpdate>) -> Result<Option<Command>> {
        let command = match pending {
            Some(PendingUpdate::Rf) => Some(self.rf_command()),
            Some(PendingUpdate::Led) => Some(self.led_command()?),
            None if !self.rf_enabled => None,
            None => match self.mode {
                Mode::Generator => Some(self.sig_gen_command()),
                Mode::Sweep => Some(self.sweep_command()),
            },
        };
        if let Some(cmd) = &command {
            info!("Settings produce command: {}", cmd);
        }
        Ok(command)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(config: &mut GeneratorConfig, input: &str) -> Option<String> {
        let args = OptionArgs::parse_str(input).unwrap();
        let pending = config.apply(&args).unwrap();
        config
            .command_for(pending)
            .unwrap()
            .map(|c| c.to_string())
    }

    #[test]
    fn parses_long_and_short_flags() {
        let args = OptionArgs::parse_str("-m w --frequency 100.000 -p -3.5 -s 20 --rf 1").unwrap();
        assert_eq!(args.mode.as_deref(), Some("w"));
        assert_eq!(args.frequency, Some(100.0));
        assert_eq!(args.power, Some(-3.5));
        assert_eq!(args.steps, Some(20));
        assert_eq!(args.rf_enabled, Some(1));
        assert_eq!(args.led, None);
    }

    #[test]
    fn bad_option_strings_are_rejected() {
        assert!(matches!(
            OptionArgs::parse_str("--bogus 1"),
            Err(SigGenError::Options(_))
        ));
        assert!(matches!(
            OptionArgs::parse_str("--frequency abc"),
            Err(SigGenError::Options(_))
        ));
    }

    #[test]
    fn settings_wait_for_rf() {
        let mut config = GeneratorConfig::default();
        assert_eq!(run(&mut config, "--frequency 100.000"), None);
        assert_eq!(config.frequency_mhz, 100.0);

        assert_eq!(run(&mut config, "--rf 1").as_deref(), Some("enableRF"));
        assert_eq!(
            run(&mut config, "--power -2.0").as_deref(),
            Some("sigGen(100.0,-2.0)")
        );
    }

    #[test]
    fn sweep_mode_sends_sweep() {
        let mut config = GeneratorConfig::default();
        config.rf_enabled = true;
        assert_eq!(
            run(&mut config, "--mode w").as_deref(),
            Some("sweep(25.0,100.0,100,0.0,5.0)")
        );
        assert_eq!(
            run(&mut config, "--start 50.5 --time 10").as_deref(),
            Some("sweep(50.5,100.0,100,0.0,10.0)")
        );
        assert_eq!(config.mode, Mode::Sweep);
    }

    #[test]
    fn unknown_mode_keeps_previous() {
        let mut config = GeneratorConfig::default();
        run(&mut config, "--mode x");
        assert_eq!(config.mode, Mode::Generator);
    }

    #[test]
    fn rf_update_beats_led_update() {
        let mut config = GeneratorConfig::default();
        assert_eq!(
            run(&mut config, "--led rainbow --rf 0").as_deref(),
            Some("disableRF")
        );
        assert_eq!(config.led_display, "rainbow");
    }

    #[test]
    fn odd_rf_value_resends_current_state() {
        let mut config = GeneratorConfig::default();
        config.rf_enabled = true;
        assert_eq!(run(&mut config, "--rf 7").as_deref(), Some("enableRF"));
        assert!(config.rf_enabled);
    }

    #[test]
    fn led_modes_map_to_commands() {
        let mut config = GeneratorConfig::default();
        assert_eq!(run(&mut config, "--led off").as_deref(), Some("led 0"));
        assert_eq!(run(&mut config, "-l binary").as_deref(), Some("binary"));

    }

    #[test]
    fn unknown_led_leaves_settings_alone() {
        let mut config = GeneratorConfig::default();
        let before = config.clone();
        let args = OptionArgs::parse_str("--led disco -f 300 --rf 1").unwrap();
        assert!(matches!(
            config.apply(&args),
            Err(SigGenError::UnknownLedMode(name)) if name == "disco"
        ));
        assert_eq!(config, before);
        assert_eq!(config.led_display, "kitt");
    }

    #[test]
    fn same_input_same_command() {
        let mut a = GeneratorConfig::default();
        let mut b = GeneratorConfig::default();
        for input in ["--rf 1", "-f 433.92 -p 5", "-m w", "-o 200 -s 50"] {
            assert_eq!(run(&mut a, input), run(&mut b, input));
        }
        assert_eq!(a, b);
    }
}
