use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::devices::siggen::Measurement;

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct ReadbackRecord {
    pub timestamp: DateTime<Utc>, // arrival time, written as RFC 3339
    #[serde(rename = "frequency_MHz")]
    pub frequency_mhz: f64,
    #[serde(rename = "power_dBm")]
    pub power_dbm: f64,
}

impl From<&Measurement> for ReadbackRecord {
    fn from(m: &Measurement) -> Self {
        ReadbackRecord {
            timestamp: m.received_at,
            frequency_mhz: m.frequency_mhz,
            power_dbm: m.power_dbm,
        }
    }
}
