pub mod data;

use std::fs::File;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use chrono::Utc;
use csv::Writer;
use data::ReadbackRecord;
use tracing::{info, warn};

use crate::devices::siggen::Measurement;
use crate::devices::{Result, SignalGenerator};

/// Settings for a readback monitoring run
#[derive(Debug, Clone)]
pub struct MonitorConfig {
    pub duration: Duration,            // Total time to watch the device
    pub interval: Duration,            // Time between display refreshes
    pub stale_after: chrono::Duration, // Readbacks older than this are flagged
    pub record_csv: bool,              // Save every fresh readback to CSV
    pub log_dir: PathBuf,              // Where the CSV file goes
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            duration: Duration::from_secs(10),
            interval: Duration::from_millis(100),
            stale_after: chrono::Duration::seconds(1),
            record_csv: false,
            log_dir: PathBuf::from("logs"),
        }
    }
}

/// Outcome of a monitoring run
#[derive(Debug)]
pub struct MonitorSummary {
    pub ticks: u64,
    pub readbacks: usize,
    pub csv_path: Option<PathBuf>,
}

/// Polls the generator on a fixed interval and writes one status line per
/// tick to `out`, the way the front panel display refreshes. The run ends at
/// `duration` after the start however long each poll blocks on the port.
pub fn run_monitor<P: Read + Write, W: Write>(
    sg: &mut SignalGenerator<P>,
    config: &MonitorConfig,
    out: &mut W,
) -> Result<MonitorSummary> {
    info!("Starting readback monitor with configuration: {:?}", config);

    let deadline = Instant::now() + config.duration;
    let mut records = Vec::new();
    let mut ticks = 0_u64;

    loop {
        let tick_start = Instant::now();
        records.extend(sg.poll()?.iter().map(ReadbackRecord::from));
        ticks += 1;

        let latest = sg.measurement();
        writeln!(out, "{}", status_line(latest.as_ref(), config.stale_after, Utc::now()))?;
        out.flush()?;

        let now = Instant::now();
        if now >= deadline {
            break;
        }
        let wait = config
            .interval
            .saturating_sub(tick_start.elapsed())
            .min(deadline - now);
        std::thread::sleep(wait);
    }

    let csv_path = if config.record_csv {
        if records.is_empty() {
            warn!("No readbacks received, nothing to save");
            None
        } else {
            Some(save_readbacks_to_csv(&config.log_dir, &records)?)
        }
    } else {
        None
    };

    info!("Monitor finished after {} ticks, {} readbacks", ticks, records.len());
    Ok(MonitorSummary {
        ticks,
        readbacks: records.len(),
        csv_path,
    })
}

/// One display line for the latest readback.
pub fn status_line(
    measurement: Option<&Measurement>,
    stale_after: chrono::Duration,
    now: chrono::DateTime<Utc>,
) -> String {
    match measurement {
        None => "Frequency: ---  Power: ---  (no readback yet)".to_string(),
        Some(m) => {
            let age_ms = m.age(now).num_milliseconds();
            let flag = if m.is_stale(stale_after, now) { "  STALE" } else { "" };
            format!(
                "Frequency: {:.3} MHz  Power: {:.1} dBm  (age {} ms){}",
                m.frequency_mhz, m.power_dbm, age_ms, flag
            )
        }
    }
}

/// Save the readback records to a timestamped CSV file under `dir`
fn save_readbacks_to_csv(dir: &Path, data: &[ReadbackRecord]) -> io::Result<PathBuf> {
    let file_name = chrono::Local::now()
        .format("readback_%Y-%m-%d_%H-%M-%S.csv")
        .to_string();

    std::fs::create_dir_all(dir)?;
    let path = dir.join(file_name);

    let file = File::create(&path)?;
    let mut writer = Writer::from_writer(file);
    for record in data {
        writer.serialize(record)?;
    }
    writer.flush()?;

    info!("Readbacks saved to {}", path.display());
    Ok(path)
}
