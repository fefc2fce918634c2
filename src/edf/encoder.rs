use std::collections::VecDeque;
use std::fs::File;
use std::io::{BufWriter, Seek, SeekFrom, Write};
use std::path::Path;

use chrono::NaiveDateTime;

use crate::device::FileType;
use crate::edf::header::{timekeeping_tal, ChannelSpec, HeaderLayout, RECORD_COUNT_OFFSET};
use crate::edf::SignalEncoder;
use crate::error::{Result, WriterError};
use crate::metadata::PatientInfo;

/// Windows a channel may be queued ahead of an empty channel before the
/// empty one is padded.
pub const MAX_BACKLOG: usize = 8;

/// Writes EDF / EDF+ files with one-second data records.
///
/// Windows handed to [`SignalEncoder::write_samples`] are queued per channel
/// and a data record is emitted as soon as every channel has a window
/// waiting, so channels may complete their windows in any order. A channel
/// that falls more than [`MAX_BACKLOG`] windows behind the others is filled
/// with digital-minimum windows, as is every incomplete record left at
/// finalize, so no completed window is ever lost. The header goes out with
/// the first record (or on finalize for an empty recording); the record
/// count is patched in by [`SignalEncoder::finalize`].
pub struct EdfEncoder<W: Write + Seek> {
    out: W,
    file_type: FileType,
    start: NaiveDateTime,
    channels: Vec<Option<ChannelSpec>>,
    patient: PatientInfo,
    patient_set: bool,
    header_start: Option<u64>,
    pending: Vec<VecDeque<Vec<i16>>>,
    records: u64,
    padded: u64,
    finalized: bool,
}

impl EdfEncoder<BufWriter<File>> {
    /// Creates (or truncates) `path` and returns an encoder for
    /// `channel_count` data signals.
    pub fn create<P: AsRef<Path>>(
        path: P,
        channel_count: usize,
        file_type: FileType,
        start: NaiveDateTime,
    ) -> Result<Self> {
        let file = File::create(path.as_ref())?;
        Ok(EdfEncoder::new(
            BufWriter::new(file),
            channel_count,
            file_type,
            start,
        ))
    }
}

impl<W: Write + Seek> EdfEncoder<W> {
    pub fn new(out: W, channel_count: usize, file_type: FileType, start: NaiveDateTime) -> Self {
        EdfEncoder {
            out,
            file_type,
            start,
            channels: vec![None; channel_count],
            patient: PatientInfo::default(),
            patient_set: false,
            header_start: None,
            pending: vec![VecDeque::new(); channel_count],
            records: 0,
            padded: 0,
            finalized: false,
        }
    }

    /// Data records emitted so far.
    pub fn records(&self) -> u64 {
        self.records
    }

    /// Windows synthesised for channels that had no data of their own.
    pub fn padded_windows(&self) -> u64 {
        self.padded
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    fn check_open(&self) -> Result<()> {
        if self.finalized {
            Err(WriterError::Closed)
        } else {
            Ok(())
        }
    }

    fn configured(&self) -> Result<Vec<ChannelSpec>> {
        self.channels
            .iter()
            .enumerate()
            .map(|(index, spec)| {
                spec.clone().ok_or_else(|| WriterError::InvalidChannel {
                    index,
                    reason: "channel was never configured".into(),
                })
            })
            .collect()
    }

    fn ensure_header(&mut self) -> Result<()> {
        if self.header_start.is_some() {
            return Ok(());
        }
        let channels = self.configured()?;
        let layout = HeaderLayout {
            file_type: self.file_type,
            start: self.start,
            patient: &self.patient,
            channels: &channels,
        };
        let bytes = layout.render();
        let position = self.out.stream_position()?;
        self.out.write_all(&bytes)?;
        self.header_start = Some(position);
        log::debug!(
            "wrote {} byte EDF header for {} signals",
            bytes.len(),
            layout.signal_count()
        );
        Ok(())
    }

    fn emit_ready_records(&mut self) -> Result<()> {
        loop {
            let complete = self.pending.iter().all(|queue| !queue.is_empty());
            let backlog = self.pending.iter().map(VecDeque::len).max().unwrap_or(0);
            if !complete && backlog <= MAX_BACKLOG {
                return Ok(());
            }
            self.write_record()?;
        }
    }

    /// Writes the next data record, padding channels with nothing queued.
    fn write_record(&mut self) -> Result<()> {
        self.ensure_header()?;
        let channels = self.configured()?;
        let mut padded = Vec::new();
        for (channel, queue) in self.pending.iter_mut().enumerate() {
            match queue.pop_front() {
                Some(window) => {
                    for sample in window {
                        self.out.write_all(&sample.to_le_bytes())?;
                    }
                }
                None => {
                    let spec = &channels[channel];
                    let fill = (spec.digital_min as i16).to_le_bytes();
                    for _ in 0..spec.sample_frequency {
                        self.out.write_all(&fill)?;
                    }
                    padded.push(spec.label.as_str());
                }
            }
        }
        if !padded.is_empty() {
            log::warn!(
                "record {} has no data for {}; filled with digital minimum",
                self.records,
                padded.join(", ")
            );
            self.padded += padded.len() as u64;
        }
        if self.file_type == FileType::EdfPlus {
            self.out.write_all(&timekeeping_tal(self.records))?;
        }
        self.records += 1;
        Ok(())
    }
}

impl<W: Write + Seek> SignalEncoder for EdfEncoder<W> {
    fn channel_count(&self) -> usize {
        self.channels.len()
    }

    fn configure_channel(&mut self, index: usize, spec: &ChannelSpec) -> Result<()> {
        self.check_open()?;
        if self.header_start.is_some() {
            return Err(WriterError::HeaderAlreadyWritten);
        }
        if index >= self.channels.len() {
            return Err(WriterError::InvalidChannel {
                index,
                reason: format!("only {} channels declared", self.channels.len()),
            });
        }
        spec.validate(index)?;
        self.channels[index] = Some(spec.clone());
        Ok(())
    }

    fn write_header(&mut self, patient: &PatientInfo) -> Result<()> {
        self.check_open()?;
        if self.patient_set || self.header_start.is_some() {
            return Err(WriterError::HeaderAlreadyWritten);
        }
        self.patient = patient.truncated();
        self.patient_set = true;
        Ok(())
    }

    fn write_samples(&mut self, channel: usize, samples: &[i16]) -> Result<()> {
        self.check_open()?;
        let spec = self
            .channels
            .get(channel)
            .ok_or_else(|| WriterError::InvalidChannel {
                index: channel,
                reason: format!("only {} channels declared", self.channels.len()),
            })?
            .as_ref()
            .ok_or_else(|| WriterError::InvalidChannel {
                index: channel,
                reason: "channel was never configured".into(),
            })?;
        if samples.len() != spec.sample_frequency {
            return Err(WriterError::SampleCount {
                channel,
                expected: spec.sample_frequency,
                actual: samples.len(),
            });
        }
        let (lo, hi) = (spec.digital_min as i16, spec.digital_max as i16);
        let window = samples.iter().map(|s| (*s).clamp(lo, hi)).collect();
        self.pending[channel].push_back(window);
        self.emit_ready_records()
    }

    fn finalize(&mut self) -> Result<()> {
        self.check_open()?;
        self.ensure_header()?;

        while self.pending.iter().any(|queue| !queue.is_empty()) {
            self.write_record()?;
        }

        let header_start = self.header_start.unwrap_or_default();
        self.out.flush()?;
        let end = self.out.stream_position()?;
        self.out
            .seek(SeekFrom::Start(header_start + RECORD_COUNT_OFFSET))?;
        self.out
            .write_all(format!("{:<8}", self.records).as_bytes())?;
        self.out.seek(SeekFrom::Start(end))?;
        self.out.flush()?;
        self.finalized = true;
        Ok(())
    }
}
