use std::fs::File;
use std::io::Read;
use std::path::Path;

use chrono::{DateTime, Utc};
use flate2::read::GzDecoder;

use crate::device::{ChannelRange, DeviceProfile};
use crate::error::{Result, WriterError};
use crate::packet::Packet;

const DELIMITER: u8 = b'\t';
const ACCELEROMETER_AXES: usize = 3;
/// Rate assumed for captures without a montage.
const DEFAULT_SAMPLE_FREQUENCY: usize = 500;

/// Replays tab-separated `.easy` captures as a packet stream.
///
/// Each row holds the EEG channels in nanovolts, optionally three
/// accelerometer columns, a marker and a unix timestamp in milliseconds. The
/// reader stands in for a live headset driver: rows become [`Packet`]s with
/// the row text as raw payload, EEG quantised through the profile's EEG
/// range and the first two accelerometer axes fed to the gyroscope pair.
#[derive(Debug)]
pub struct CaptureReader {
    verbose: bool,
    /// Path to the `.easy` or `.easy.gz` file.
    filepath: String,

    /// File path without the capture extension, used to locate the `.info`
    /// sidecar.
    filenameroot: String,

    /// Number of EEG columns at the start of every row.
    num_channels: usize,

    /// Whether rows carry the three accelerometer columns.
    has_accelerometer: bool,

    /// Timestamp of the first row.
    start_date: Option<DateTime<Utc>>,
}

impl CaptureReader {
    pub fn open(filepath: &str, verbose: bool) -> Result<Self> {
        if verbose {
            log::info!("opening capture {filepath}");
        }

        let filenameroot = if let Some(root) = filepath.strip_suffix(".easy.gz") {
            root.to_string()
        } else if let Some(root) = filepath.strip_suffix(".easy") {
            root.to_string()
        } else {
            return Err(WriterError::Parse(format!(
                "{filepath}: expected a .easy or .easy.gz capture"
            )));
        };

        let mut reader = CaptureReader {
            verbose,
            filepath: filepath.to_string(),
            filenameroot,
            num_channels: 0,
            has_accelerometer: false,
            start_date: None,
        };
        reader.read_layout()?;
        Ok(reader)
    }

    /// Inspects the first row to find the channel count and start date.
    fn read_layout(&mut self) -> Result<()> {
        let mut rdr = self.csv_reader()?;
        let first_record = rdr
            .records()
            .next()
            .ok_or_else(|| WriterError::Parse(format!("{}: capture is empty", self.filepath)))??;

        let num_columns = first_record.len();
        let (num_channels, has_accelerometer) = if [13, 25, 37].contains(&num_columns) {
            (num_columns - 5, true)
        } else if [10, 22, 34].contains(&num_columns) {
            (num_columns - 2, false)
        } else {
            return Err(WriterError::Parse(format!(
                "{}: unexpected number of columns ({num_columns})",
                self.filepath
            )));
        };

        let timestamp = parse_field::<i64>(&first_record, num_columns - 1)?;
        self.start_date = DateTime::from_timestamp(timestamp / 1000, 0);
        self.num_channels = num_channels;
        self.has_accelerometer = has_accelerometer;

        if self.verbose {
            log::info!(
                "{}: {} EEG channels, accelerometer {}, first sample at {}",
                self.filepath,
                num_channels,
                if has_accelerometer { "on" } else { "off" },
                self.start_date
                    .map(|d| d.format("%Y-%m-%d %H:%M:%S").to_string())
                    .unwrap_or_else(|| "unknown".into())
            );
        }
        Ok(())
    }

    pub fn num_channels(&self) -> usize {
        self.num_channels
    }

    pub fn has_accelerometer(&self) -> bool {
        self.has_accelerometer
    }

    pub fn start_date(&self) -> Option<DateTime<Utc>> {
        self.start_date
    }

    /// Path of the `.info` montage written next to the capture.
    pub fn info_path(&self) -> String {
        format!("{}.info", self.filenameroot)
    }

    /// Picks the device profile for this capture.
    ///
    /// An explicit `.json` profile or `.info` montage wins. Otherwise the
    /// `.info` sidecar next to the capture is used, and failing that a
    /// generic profile named `Ch1..ChN` after the capture's own columns.
    pub fn profile(&self, explicit: Option<&Path>) -> Result<DeviceProfile> {
        if let Some(path) = explicit {
            return if path.extension().is_some_and(|ext| ext == "json") {
                DeviceProfile::from_json_file(path)
            } else {
                DeviceProfile::from_info_file(path)
            };
        }
        let info = self.info_path();
        match DeviceProfile::from_info_file(&info) {
            Ok(profile) if profile.eeg_channels() <= self.num_channels => Ok(profile),
            Ok(profile) => {
                log::warn!(
                    "{info} names {} sensors but the capture has {} EEG columns; using a generic profile",
                    profile.eeg_channels(),
                    self.num_channels
                );
                Ok(self.generic_profile())
            }
            Err(e) => {
                log::warn!("no usable montage at {info} ({e}); using a generic profile");
                Ok(self.generic_profile())
            }
        }
    }

    fn generic_profile(&self) -> DeviceProfile {
        let gyro_unit = if self.has_accelerometer { "mm/s^2" } else { "deg/s" };
        DeviceProfile {
            name: format!("{}-channel capture", self.num_channels),
            sensors: (1..=self.num_channels).map(|n| format!("Ch{n}")).collect(),
            sample_frequency: DEFAULT_SAMPLE_FREQUENCY,
            eeg: ChannelRange::unit_scale("uV"),
            gyro: ChannelRange::unit_scale(gyro_unit),
            file_type: Default::default(),
        }
    }

    /// Converts every row into a packet for `profile`.
    ///
    /// EEG columns are matched to `profile.sensors` by position. Extra
    /// columns are ignored, but a profile naming more sensors than the
    /// capture has columns is rejected: those channels would never receive
    /// a sample.
    pub fn read_packets(&self, profile: &DeviceProfile) -> Result<Vec<Packet>> {
        if profile.eeg_channels() > self.num_channels {
            return Err(WriterError::Parse(format!(
                "{} has {} EEG columns but profile {} names {} sensors",
                self.filepath,
                self.num_channels,
                profile.name,
                profile.eeg_channels()
            )));
        }

        let mut rdr = self.csv_reader()?;
        let mut packets = Vec::new();
        let rest_gyro = profile.gyro.to_digital(0.0);

        for (counter, record) in rdr.records().enumerate() {
            let record = record?;
            let mut raw = record.iter().collect::<Vec<_>>().join("\t").into_bytes();
            raw.push(b'\n');
            let mut packet = Packet::new(counter as u32, raw);

            for (column, sensor) in profile.sensors.iter().enumerate() {
                let nanovolts = parse_field::<f64>(&record, column)?;
                packet = packet.with_sample(sensor, profile.eeg.to_digital(nanovolts / 1000.0));
            }

            packet = if self.has_accelerometer {
                let x = parse_field::<f64>(&record, self.num_channels)?;
                let y = parse_field::<f64>(&record, self.num_channels + 1)?;
                packet.with_gyro(profile.gyro.to_digital(x), profile.gyro.to_digital(y))
            } else {
                packet.with_gyro(rest_gyro, rest_gyro)
            };
            packets.push(packet);
        }

        if self.verbose {
            let seconds = packets.len() as f64 / profile.sample_frequency as f64;
            log::info!(
                "{}: read {} packets (~{seconds:.1}s at {} Hz, {} accelerometer axes)",
                self.filepath,
                packets.len(),
                profile.sample_frequency,
                if self.has_accelerometer { ACCELEROMETER_AXES } else { 0 }
            );
        }
        Ok(packets)
    }

    fn csv_reader(&self) -> Result<csv::Reader<Box<dyn Read>>> {
        let reader = get_file_reader(&self.filepath)?;
        Ok(csv::ReaderBuilder::new()
            .delimiter(DELIMITER)
            .has_headers(false)
            .from_reader(reader))
    }
}

/// Opens `filepath`, transparently decompressing `.gz` files.
fn get_file_reader(filepath: &str) -> Result<Box<dyn Read>> {
    let file = File::open(Path::new(filepath))?;
    if filepath.ends_with(".gz") {
        Ok(Box::new(GzDecoder::new(file)))
    } else {
        Ok(Box::new(file))
    }
}

fn parse_field<T: std::str::FromStr>(record: &csv::StringRecord, index: usize) -> Result<T> {
    let value = record
        .get(index)
        .ok_or_else(|| WriterError::Parse(format!("row is missing column {index}")))?;
    value
        .trim()
        .parse::<T>()
        .map_err(|_| WriterError::Parse(format!("column {index}: cannot parse {value:?}")))
}
