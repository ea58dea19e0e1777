use std::fmt;
use std::str::FromStr;

/// Identification command sent right after opening the port.
pub const WHOAMI: &str = "WHOAMI";

/// LED display patterns known to the generator firmware.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LedMode {
    Kitt,
    Binary,
    Rainbow,
    Off,
}

impl LedMode {
    pub fn name(&self) -> &'static str {
        match self {
            LedMode::Kitt => "kitt",
            LedMode::Binary => "binary",
            LedMode::Rainbow => "rainbow",
            LedMode::Off => "off",
        }
    }
}

impl FromStr for LedMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "kitt" => Ok(LedMode::Kitt),
            "binary" => Ok(LedMode::Binary),
            "rainbow" => Ok(LedMode::Rainbow),
            "off" => Ok(LedMode::Off),
            other => Err(other.to_string()),
        }
    }
}

impl fmt::Display for LedMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Float argument as the firmware receives it: whole values keep a trailing
/// `.0` (`100.0`, `-3.0`), others print in shortest form (`100.25`).
struct Float(f64);

impl fmt::Display for Float {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_finite() && self.0.fract() == 0.0 {
            write!(f, "{:.1}", self.0)
        } else {
            write!(f, "{}", self.0)
        }
    }
}

/// A single request written to the generator.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    WhoAmI,
    SigGen {
        frequency_mhz: f64,
        power_dbm: f64,
    },
    Sweep {
        start_mhz: f64,
        stop_mhz: f64,
        steps: u32,
        power_dbm: f64,
        time_s: f64,
    },
    EnableRf,
    DisableRf,
    Led(LedMode),
    /// Text typed by the user in talk mode, sent unchanged.
    Raw(String),
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Command::WhoAmI => f.write_str(WHOAMI),
            Command::SigGen {
                frequency_mhz,
                power_dbm,
            } => write!(f, "sigGen({},{})", Float(*frequency_mhz), Float(*power_dbm)),
            Command::Sweep {
                start_mhz,
                stop_mhz,
                steps,
                power_dbm,
                time_s,
            } => write!(
                f,
                "sweep({},{},{},{},{})",
                Float(*start_mhz),
                Float(*stop_mhz),
                steps,
                Float(*power_dbm),
                Float(*time_s)
            ),
            Command::EnableRf => f.write_str("enableRF"),
            Command::DisableRf => f.write_str("disableRF"),
            Command::Led(LedMode::Off) => f.write_str("led 0"),
            Command::Led(mode) => f.write_str(mode.name()),
            Command::Raw(text) => f.write_str(text),
        }
    }
}

/// Frequency and power carried by a `?` line.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Reading {
    pub frequency_mhz: f64,
    pub power_dbm: f64,
}

/// A response line, classified by its first character.
#[derive(Debug, Clone, PartialEq)]
pub enum Response {
    /// `>` text meant for the user.
    User(String),
    /// `+` firmware log text.
    Log(String),
    /// `?` readback with both fields parsed.
    Measurement(Reading),
    /// `?` line whose fields are missing or not numeric.
    MalformedMeasurement(String),
    Other(String),
}

impl Response {
    pub fn classify(line: &str) -> Response {
        let line = line.trim_end();
        match line.chars().next() {
            Some('>') => Response::User(line.to_string()),
            Some('+') => Response::Log(line.to_string()),
            Some('?') => match parse_reading(line) {
                Some(reading) => Response::Measurement(reading),
                None => Response::MalformedMeasurement(line.to_string()),
            },
            _ => Response::Other(line.to_string()),
        }
    }
}

// Fields are positional after a single-space split: "? <freq> <power>".
fn parse_reading(line: &str) -> Option<Reading> {
    let mut fields = line.split(' ').skip(1);
    let frequency_mhz = fields.next()?.parse::<f64>().ok()?;
    let power_dbm = fields.next()?.parse::<f64>().ok()?;
    Some(Reading {
        frequency_mhz,
        power_dbm,
    })
}

/// Strips the trailing whitespace and any leading `>`/space markers from a
/// user line, leaving the text the firmware printed.
pub fn user_text(line: &str) -> &str {
    line.trim_end().trim_start_matches(['>', ' '])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn commands_render_wire_text() {
        assert_eq!(Command::WhoAmI.to_string(), "WHOAMI");
        assert_eq!(
            Command::SigGen {
                frequency_mhz: 100.5,
                power_dbm: -3.0
            }
            .to_string(),
            "sigGen(100.5,-3.0)"
        );
        assert_eq!(
            Command::Sweep {
                start_mhz: 25.0,
                stop_mhz: 100.0,
                steps: 100,
                power_dbm: 0.0,
                time_s: 5.0
            }
            .to_string(),
            "sweep(25.0,100.0,100,0.0,5.0)"
        );
        assert_eq!(
            Command::SigGen {
                frequency_mhz: 433.92,
                power_dbm: 0.0
            }
            .to_string(),
            "sigGen(433.92,0.0)"
        );
        assert_eq!(Command::EnableRf.to_string(), "enableRF");
        assert_eq!(Command::DisableRf.to_string(), "disableRF");
        assert_eq!(Command::Led(LedMode::Rainbow).to_string(), "rainbow");
        assert_eq!(Command::Led(LedMode::Off).to_string(), "led 0");
        assert_eq!(Command::Raw("help".into()).to_string(), "help");
    }

    #[test]
    fn led_modes_parse_by_name() {
        assert_eq!("kitt".parse::<LedMode>(), Ok(LedMode::Kitt));
        assert_eq!("off".parse::<LedMode>(), Ok(LedMode::Off));
        assert_eq!("Kitt".parse::<LedMode>(), Err("Kitt".to_string()));
    }

    #[test]
    fn classification_follows_first_character() {
        assert_eq!(
            Response::classify("> hello\r\n"),
            Response::User("> hello".into())
        );
        assert_eq!(
            Response::classify("+ pll locked"),
            Response::Log("+ pll locked".into())
        );
        assert_eq!(
            Response::classify("? 100.25 -4.5\r"),
            Response::Measurement(Reading {
                frequency_mhz: 100.25,
                power_dbm: -4.5
            })
        );
        assert_eq!(Response::classify("ok"), Response::Other("ok".into()));
        assert_eq!(Response::classify(""), Response::Other(String::new()));
    }

    #[test]
    fn broken_readback_is_not_a_measurement() {
        assert_eq!(
            Response::classify("? 100.25"),
            Response::MalformedMeasurement("? 100.25".into())
        );
        assert_eq!(
            Response::classify("? abc -1"),
            Response::MalformedMeasurement("? abc -1".into())
        );
        // two spaces leave an empty positional field
        assert!(matches!(
            Response::classify("?  100 -1"),
            Response::MalformedMeasurement(_)
        ));
    }

    #[test]
    fn user_text_drops_markers() {
        assert_eq!(user_text("> Josh's Signal Generator!\r\n"), "Josh's Signal Generator!");
        assert_eq!(user_text(">>  hi "), "hi");
    }
}
