use chrono::{Datelike, NaiveDate, NaiveDateTime, Timelike};

use crate::device::{ChannelRange, FileType};
use crate::error::{Result, WriterError};
use crate::metadata::PatientInfo;

pub const MAIN_HEADER_BYTES: usize = 256;
pub const SIGNAL_HEADER_BYTES: usize = 256;
/// Byte offset of the "number of data records" field in the main header.
pub const RECORD_COUNT_OFFSET: u64 = 236;
pub const LABEL_MAX: usize = 16;
pub const DIMENSION_MAX: usize = 8;

pub const ANNOTATION_LABEL: &str = "EDF Annotations";
/// Two bytes per sample, 114 bytes of TAL space per record.
pub const ANNOTATION_SAMPLES: usize = 57;

/// Everything the header needs to know about one data signal.
#[derive(Debug, Clone, PartialEq)]
pub struct ChannelSpec {
    pub label: String,
    pub sample_frequency: usize,
    pub physical_min: f64,
    pub physical_max: f64,
    pub digital_min: i32,
    pub digital_max: i32,
    pub dimension: String,
}

impl ChannelSpec {
    pub fn new(label: &str, sample_frequency: usize, range: &ChannelRange) -> Self {
        ChannelSpec {
            label: label.to_string(),
            sample_frequency,
            physical_min: range.physical_min,
            physical_max: range.physical_max,
            digital_min: range.digital_min,
            digital_max: range.digital_max,
            dimension: range.unit.clone(),
        }
    }

    fn annotation() -> Self {
        ChannelSpec {
            label: ANNOTATION_LABEL.to_string(),
            sample_frequency: ANNOTATION_SAMPLES,
            physical_min: -1.0,
            physical_max: 1.0,
            digital_min: i16::MIN as i32,
            digital_max: i16::MAX as i32,
            dimension: String::new(),
        }
    }

    pub fn validate(&self, index: usize) -> Result<()> {
        let reject = |reason: String| -> Result<()> {
            Err(WriterError::InvalidChannel { index, reason })
        };

        if self.label.is_empty() || self.label.len() > LABEL_MAX {
            return reject(format!("label {:?} must be 1..={LABEL_MAX} bytes", self.label));
        }
        if self.dimension.len() > DIMENSION_MAX {
            return reject(format!(
                "physical dimension {:?} exceeds {DIMENSION_MAX} bytes",
                self.dimension
            ));
        }
        if self.sample_frequency == 0 {
            return reject("sample frequency must be greater than zero".into());
        }
        let i16_range = i16::MIN as i32..=i16::MAX as i32;
        if !i16_range.contains(&self.digital_min) || !i16_range.contains(&self.digital_max) {
            return reject(format!(
                "digital range {}..{} does not fit 16 bits",
                self.digital_min, self.digital_max
            ));
        }
        if self.digital_min >= self.digital_max {
            return reject("digital minimum must be below digital maximum".into());
        }
        if !self.physical_min.is_finite() || !self.physical_max.is_finite() {
            return reject("physical range must be finite".into());
        }
        match (number_field(self.physical_min), number_field(self.physical_max)) {
            (Some(min), Some(max)) if min == max => reject(format!(
                "physical minimum and maximum both render as {min:?}"
            )),
            (Some(_), Some(_)) => Ok(()),
            _ => reject("physical range does not fit an 8 character field".into()),
        }
    }
}

/// Fixed-width header image for a whole file.
pub struct HeaderLayout<'a> {
    pub file_type: FileType,
    pub start: NaiveDateTime,
    pub patient: &'a PatientInfo,
    pub channels: &'a [ChannelSpec],
}

impl HeaderLayout<'_> {
    pub fn signal_count(&self) -> usize {
        match self.file_type {
            FileType::EdfPlus => self.channels.len() + 1,
            FileType::Edf => self.channels.len(),
        }
    }

    pub fn header_bytes(&self) -> usize {
        MAIN_HEADER_BYTES + SIGNAL_HEADER_BYTES * self.signal_count()
    }

    /// Bytes taken by a single data record, annotation signal included.
    pub fn record_bytes(&self) -> usize {
        self.all_signals()
            .iter()
            .map(|s| s.sample_frequency * 2)
            .sum()
    }

    fn all_signals(&self) -> Vec<ChannelSpec> {
        let mut signals = self.channels.to_vec();
        if self.file_type == FileType::EdfPlus {
            signals.push(ChannelSpec::annotation());
        }
        signals
    }

    /// Renders the header with the record count set to -1; the real count is
    /// patched in when the file is finalized.
    pub fn render(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.header_bytes());
        let start_date = self.start.date();

        push_field(&mut out, "0", 8);
        push_field(&mut out, &self.patient_field(), 80);
        push_field(&mut out, &self.recording_field(), 80);
        push_field(
            &mut out,
            &format!(
                "{:02}.{:02}.{:02}",
                start_date.day(),
                start_date.month(),
                start_date.year() % 100
            ),
            8,
        );
        push_field(
            &mut out,
            &format!(
                "{:02}.{:02}.{:02}",
                self.start.hour(),
                self.start.minute(),
                self.start.second()
            ),
            8,
        );
        push_field(&mut out, &self.header_bytes().to_string(), 8);
        let reserved = match self.file_type {
            FileType::EdfPlus => "EDF+C",
            FileType::Edf => "",
        };
        push_field(&mut out, reserved, 44);
        push_field(&mut out, "-1", 8);
        push_field(&mut out, "1", 8);
        push_field(&mut out, &self.signal_count().to_string(), 4);

        let signals = self.all_signals();
        for s in &signals {
            push_field(&mut out, &s.label, 16);
        }
        for _ in &signals {
            push_field(&mut out, "", 80);
        }
        for s in &signals {
            push_field(&mut out, &s.dimension, 8);
        }
        for s in &signals {
            push_field(&mut out, &number_field(s.physical_min).unwrap_or_default(), 8);
        }
        for s in &signals {
            push_field(&mut out, &number_field(s.physical_max).unwrap_or_default(), 8);
        }
        for s in &signals {
            push_field(&mut out, &s.digital_min.to_string(), 8);
        }
        for s in &signals {
            push_field(&mut out, &s.digital_max.to_string(), 8);
        }
        for _ in &signals {
            push_field(&mut out, "", 80);
        }
        for s in &signals {
            push_field(&mut out, &s.sample_frequency.to_string(), 8);
        }
        for _ in &signals {
            push_field(&mut out, "", 32);
        }
        out
    }

    fn patient_field(&self) -> String {
        let p = self.patient;
        match self.file_type {
            FileType::EdfPlus => [
                "X".to_string(),
                subfield(p.gender.as_deref()),
                p.birthdate.map(edf_date).unwrap_or_else(|| "X".to_string()),
                subfield(p.patient.as_deref()),
                p.patient_additional.clone().unwrap_or_default(),
            ]
            .join(" ")
            .trim_end()
            .to_string(),
            FileType::Edf => [
                p.patient.clone(),
                p.gender.clone(),
                p.birthdate.map(edf_date),
                p.patient_additional.clone(),
            ]
            .into_iter()
            .flatten()
            .collect::<Vec<_>>()
            .join(" "),
        }
    }

    fn recording_field(&self) -> String {
        let date = edf_date(self.start.date());
        match self.file_type {
            FileType::EdfPlus => format!("Startdate {date} X X X"),
            FileType::Edf => format!("Startdate {date}"),
        }
    }
}

/// Time-keeping annotation for the record starting `second` seconds in.
pub fn timekeeping_tal(second: u64) -> Vec<u8> {
    let mut tal = format!("+{second}\x14\x14\0").into_bytes();
    tal.resize(ANNOTATION_SAMPLES * 2, 0);
    tal
}

/// `dd-MMM-yyyy` with an upper-case English month, as EDF+ wants it.
pub fn edf_date(date: NaiveDate) -> String {
    date.format("%d-%b-%Y").to_string().to_uppercase()
}

fn subfield(value: Option<&str>) -> String {
    match value {
        Some(v) if !v.is_empty() => v.replace(' ', "_"),
        _ => "X".to_string(),
    }
}

fn number_field(value: f64) -> Option<String> {
    let text = value.to_string();
    if text.len() <= 8 {
        return Some(text);
    }
    let cut = text[..8].trim_end_matches('.');
    // only fractional digits may be dropped
    if text.find('.').map_or(false, |dot| dot <= 8) {
        Some(cut.to_string())
    } else {
        None
    }
}

fn push_field(out: &mut Vec<u8>, value: &str, width: usize) {
    let mut bytes: Vec<u8> = value
        .chars()
        .map(|c| if c.is_ascii() && !c.is_ascii_control() { c as u8 } else { b'_' })
        .take(width)
        .collect();
    bytes.resize(width, b' ');
    out.extend_from_slice(&bytes);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::DeviceProfile;

    fn field(bytes: &[u8], from: usize, len: usize) -> String {
        String::from_utf8_lossy(&bytes[from..from + len]).trim_end().to_string()
    }

    fn start() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 2, 7)
            .unwrap()
            .and_hms_opt(13, 5, 9)
            .unwrap()
    }

    fn channels() -> Vec<ChannelSpec> {
        let profile = DeviceProfile::emotiv_epoc();
        profile
            .labels()
            .iter()
            .enumerate()
            .map(|(i, label)| ChannelSpec::new(label, 128, profile.range_for(i)))
            .collect()
    }

    #[test]
    fn edf_plus_main_header_fields() {
        let patient = PatientInfo::new()
            .with_patient("Jane Doe")
            .with_gender("F")
            .with_birthdate(NaiveDate::from_ymd_opt(1984, 3, 9).unwrap());
        let channels = channels();
        let layout = HeaderLayout {
            file_type: FileType::EdfPlus,
            start: start(),
            patient: &patient,
            channels: &channels,
        };
        let bytes = layout.render();

        assert_eq!(bytes.len(), 256 * 18);
        assert_eq!(field(&bytes, 0, 8), "0");
        assert_eq!(field(&bytes, 8, 80), "X F 09-MAR-1984 Jane_Doe");
        assert_eq!(field(&bytes, 88, 80), "Startdate 07-FEB-2024 X X X");
        assert_eq!(field(&bytes, 168, 8), "07.02.24");
        assert_eq!(field(&bytes, 176, 8), "13.05.09");
        assert_eq!(field(&bytes, 184, 8), (256 * 18).to_string());
        assert_eq!(field(&bytes, 192, 44), "EDF+C");
        assert_eq!(field(&bytes, 236, 8), "-1");
        assert_eq!(field(&bytes, 244, 8), "1");
        assert_eq!(field(&bytes, 252, 4), "17");

        assert_eq!(field(&bytes, 256, 16), "F3");
        assert_eq!(field(&bytes, 256 + 14 * 16, 16), "gyroX");
        assert_eq!(field(&bytes, 256 + 16 * 16, 16), ANNOTATION_LABEL);
        assert_eq!(layout.record_bytes(), 16 * 128 * 2 + 114);
    }

    #[test]
    fn plain_edf_has_no_annotation_signal() {
        let patient = PatientInfo::new().with_patient("Jane Doe");
        let channels = channels();
        let layout = HeaderLayout {
            file_type: FileType::Edf,
            start: start(),
            patient: &patient,
            channels: &channels,
        };
        let bytes = layout.render();
        assert_eq!(bytes.len(), 256 * 17);
        assert_eq!(field(&bytes, 8, 80), "Jane Doe");
        assert_eq!(field(&bytes, 192, 44), "");
        assert_eq!(field(&bytes, 252, 4), "16");
        assert_eq!(layout.record_bytes(), 16 * 128 * 2);
    }

    #[test]
    fn channel_validation() {
        let good = ChannelSpec::new("F3", 128, &ChannelRange::epoc_eeg());
        good.validate(0).unwrap();

        let mut bad = good.clone();
        bad.digital_max = 40_000;
        assert!(matches!(bad.validate(3), Err(WriterError::InvalidChannel { index: 3, .. })));

        let mut bad = good.clone();
        bad.digital_min = bad.digital_max;
        assert!(bad.validate(0).is_err());

        let mut bad = good.clone();
        bad.physical_max = bad.physical_min;
        assert!(bad.validate(0).is_err());

        // distinct values that collapse to the same header text
        let mut bad = good.clone();
        bad.physical_min = 1e-7;
        bad.physical_max = 2e-7;
        assert_eq!(number_field(bad.physical_min), number_field(bad.physical_max));
        assert!(bad.validate(0).is_err());

        let mut bad = good.clone();
        bad.label = "a-very-long-channel-label".into();
        assert!(bad.validate(0).is_err());

        let mut bad = good;
        bad.dimension = "microvolt".into();
        assert!(bad.validate(0).is_err());
    }

    #[test]
    fn tal_is_padded() {
        let tal = timekeeping_tal(12);
        assert_eq!(tal.len(), 114);
        assert_eq!(&tal[..6], b"+12\x14\x14\0");
        assert!(tal[6..].iter().all(|b| *b == 0));
    }

    #[test]
    fn numbers_fit_eight_characters() {
        assert_eq!(number_field(-8192.0).unwrap(), "-8192");
        assert_eq!(number_field(0.123456789).unwrap(), "0.123456");
        assert!(number_field(-123456789.0).is_none());
    }
}
