use std::collections::{BTreeMap, HashSet};
use std::fs::File;
use std::io::{self, BufRead};
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Result, WriterError};

/// Labels of the two gyroscope channels appended after the EEG sensors.
pub const GYRO_LABELS: [&str; 2] = ["gyroX", "gyroY"];

/// Sensor order of the 14-electrode consumer headset.
pub const EPOC_SENSORS: [&str; 14] = [
    "F3", "FC5", "AF3", "F7", "T7", "P7", "O1", "O2", "P8", "T8", "F8", "AF4", "FC6", "F4",
];

pub const EPOC_SAMPLE_FREQUENCY: usize = 128;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileType {
    Edf,
    #[default]
    #[serde(alias = "edf+")]
    EdfPlus,
}

/// Calibration of one class of channels: the digital range the device
/// produces and the physical range it maps onto.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelRange {
    pub physical_min: f64,
    pub physical_max: f64,
    pub digital_min: i32,
    pub digital_max: i32,
    pub unit: String,
}

impl ChannelRange {
    /// 14-bit EEG samples, roughly 1 uV per count around the midpoint.
    pub fn epoc_eeg() -> Self {
        ChannelRange {
            physical_min: -8192.0,
            physical_max: 8191.0,
            digital_min: 0,
            digital_max: 16383,
            unit: "uV".to_string(),
        }
    }

    pub fn epoc_gyro() -> Self {
        ChannelRange {
            physical_min: -128.0,
            physical_max: 127.0,
            digital_min: -128,
            digital_max: 127,
            unit: "deg/s".to_string(),
        }
    }

    /// Full i16 range at one count per unit.
    pub fn unit_scale(unit: &str) -> Self {
        ChannelRange {
            physical_min: i16::MIN as f64,
            physical_max: i16::MAX as f64,
            digital_min: i16::MIN as i32,
            digital_max: i16::MAX as i32,
            unit: unit.to_string(),
        }
    }

    /// Maps a physical value onto the digital scale, clamped to the range.
    pub fn to_digital(&self, physical: f64) -> i16 {
        let span_phys = self.physical_max - self.physical_min;
        let span_dig = (self.digital_max - self.digital_min) as f64;
        let digital = (physical - self.physical_min) * span_dig / span_phys + self.digital_min as f64;
        digital
            .round()
            .clamp(self.digital_min as f64, self.digital_max as f64) as i16
    }

    pub fn to_physical(&self, digital: i16) -> f64 {
        let span_phys = self.physical_max - self.physical_min;
        let span_dig = (self.digital_max - self.digital_min) as f64;
        (digital as f64 - self.digital_min as f64) * span_phys / span_dig + self.physical_min
    }
}

/// Static description of a headset model: which sensors it has, how fast it
/// samples and how its readings are calibrated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceProfile {
    pub name: String,
    pub sensors: Vec<String>,
    pub sample_frequency: usize,
    pub eeg: ChannelRange,
    pub gyro: ChannelRange,
    #[serde(default)]
    pub file_type: FileType,
}

impl DeviceProfile {
    pub fn emotiv_epoc() -> Self {
        DeviceProfile {
            name: "Emotiv EPOC".to_string(),
            sensors: EPOC_SENSORS.iter().map(|s| s.to_string()).collect(),
            sample_frequency: EPOC_SAMPLE_FREQUENCY,
            eeg: ChannelRange::epoc_eeg(),
            gyro: ChannelRange::epoc_gyro(),
            file_type: FileType::EdfPlus,
        }
    }

    pub fn eeg_channels(&self) -> usize {
        self.sensors.len()
    }

    /// EEG sensors plus the two gyroscope axes.
    pub fn channel_count(&self) -> usize {
        self.sensors.len() + GYRO_LABELS.len()
    }

    pub fn labels(&self) -> Vec<String> {
        self.sensors
            .iter()
            .cloned()
            .chain(GYRO_LABELS.iter().map(|s| s.to_string()))
            .collect()
    }

    pub fn range_for(&self, channel: usize) -> &ChannelRange {
        if channel < self.eeg_channels() {
            &self.eeg
        } else {
            &self.gyro
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.sensors.is_empty() {
            return Err(WriterError::InvalidProfile("no EEG sensors configured".into()));
        }
        if self.sample_frequency == 0 {
            return Err(WriterError::InvalidProfile(
                "sample frequency must be greater than zero".into(),
            ));
        }
        let mut seen = HashSet::new();
        for label in self.labels() {
            if !seen.insert(label.clone()) {
                return Err(WriterError::InvalidProfile(format!(
                    "duplicate channel label {label:?}"
                )));
            }
        }
        Ok(())
    }

    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(path)?;
        let profile: DeviceProfile = serde_json::from_reader(io::BufReader::new(file))?;
        profile.validate()?;
        Ok(profile)
    }

    /// Builds a profile from a `.info` montage file as written by the
    /// acquisition software next to each `.easy` capture.
    pub fn from_info_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(path.as_ref())?;
        let reader = io::BufReader::new(file);
        let mut montage = BTreeMap::new();
        let mut sample_frequency = 0;
        let mut eeg_units = String::from("nV");
        let mut accelerometer = false;
        let mut device_class = String::new();
        let mut in_settings = false;

        for line in reader.lines() {
            let line = line?;

            if line.contains("EEG Settings") {
                in_settings = true;
                continue;
            } else if line.contains("Trigger information") {
                in_settings = false;
                continue;
            }

            if line.contains("Device class") {
                device_class = value_of(&line).to_string();
                continue;
            }
            if !in_settings {
                continue;
            }

            if line.contains("EEG sampling rate") {
                sample_frequency = value_of(&line)
                    .split_whitespace()
                    .next()
                    .and_then(|v| v.parse::<f32>().ok())
                    .map(|v| v.round() as usize)
                    .unwrap_or(0);
            } else if line.contains("EEG units") {
                eeg_units = value_of(&line).to_string();
            } else if line.contains("Accelerometer data") {
                accelerometer = line.contains("ON");
            } else if line.trim_start().starts_with("Channel ") {
                let mut parts = line.splitn(2, ':');
                let number = parts
                    .next()
                    .and_then(|head| head.split_whitespace().nth(1))
                    .and_then(|n| n.trim().parse::<usize>().ok());
                let electrode = parts.next().map(str::trim).unwrap_or("");
                if let (Some(number), false) = (number, electrode.is_empty()) {
                    montage.insert(number, electrode.to_string());
                }
            }
        }

        log::debug!(
            "parsed info file {}: {} channels at {} Hz ({eeg_units})",
            path.as_ref().display(),
            montage.len(),
            sample_frequency
        );

        let gyro_unit = if accelerometer { "mm/s^2" } else { "deg/s" };
        let profile = DeviceProfile {
            name: if device_class.is_empty() {
                "info montage".to_string()
            } else {
                device_class
            },
            sensors: montage.into_values().collect(),
            sample_frequency,
            // captures are converted to microvolts before quantisation
            eeg: ChannelRange::unit_scale("uV"),
            gyro: ChannelRange::unit_scale(gyro_unit),
            file_type: FileType::EdfPlus,
        };
        profile.validate()?;
        Ok(profile)
    }
}

impl Default for DeviceProfile {
    fn default() -> Self {
        Self::emotiv_epoc()
    }
}

fn value_of(line: &str) -> &str {
    line.splitn(2, ':').nth(1).unwrap_or("").trim()
}
