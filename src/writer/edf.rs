use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

use crate::device::DeviceProfile;
use crate::edf::{ChannelSpec, EdfEncoder, SignalEncoder};
use crate::error::{Result, WriterError};
use crate::metadata::PatientInfo;
use crate::packet::Packet;
use crate::writer::{PacketWriter, Session, WriterKind};

/// Turns a live packet stream into an EDF recording with one-second records.
///
/// Every channel (EEG sensors in profile order, then `gyroX` and `gyroY`)
/// owns a buffer that fills up to the sample frequency and is then handed to
/// the encoder on its own; channels never wait for each other.
///
/// Samples still buffered when the writer is closed are discarded, so a
/// recording always ends on a whole second.
pub struct EdfWriter<E: SignalEncoder = EdfEncoder<BufWriter<File>>> {
    session: Session,
    encoder: E,
    sensors: Vec<String>,
    labels: Vec<String>,
    sample_frequency: usize,
    buffers: Vec<Vec<i16>>,
    flushes: u64,
    closed: bool,
}

/// Validated channel descriptions for `profile`, in encoder order.
fn channel_specs(profile: &DeviceProfile) -> Result<Vec<ChannelSpec>> {
    profile.validate()?;
    profile
        .labels()
        .iter()
        .enumerate()
        .map(|(index, label)| {
            let spec = ChannelSpec::new(label, profile.sample_frequency, profile.range_for(index));
            spec.validate(index)?;
            Ok(spec)
        })
        .collect()
}

impl EdfWriter {
    /// Creates the EDF file at `path`. Nothing is created unless every
    /// channel of `profile` is valid.
    pub fn open<P: AsRef<Path>>(
        path: P,
        profile: &DeviceProfile,
        patient: Option<&PatientInfo>,
    ) -> Result<Self> {
        let specs = channel_specs(profile)?;
        let session = Session::start(path);
        let encoder = EdfEncoder::create(
            session.path(),
            specs.len(),
            profile.file_type,
            session.started_at().naive_local(),
        )?;
        log::info!(
            "EDF recording of {} ({} channels at {} Hz) started at '{}'",
            profile.name,
            specs.len(),
            profile.sample_frequency,
            session.path().display()
        );
        Self::from_specs(session, encoder, profile, specs, patient)
    }
}

impl<E: SignalEncoder> EdfWriter<E> {
    /// Configures `encoder` for `profile` and writes the patient fields.
    pub fn with_encoder(
        session: Session,
        encoder: E,
        profile: &DeviceProfile,
        patient: Option<&PatientInfo>,
    ) -> Result<Self> {
        let specs = channel_specs(profile)?;
        Self::from_specs(session, encoder, profile, specs, patient)
    }

    fn from_specs(
        mut session: Session,
        mut encoder: E,
        profile: &DeviceProfile,
        specs: Vec<ChannelSpec>,
        patient: Option<&PatientInfo>,
    ) -> Result<Self> {
        if encoder.channel_count() != specs.len() {
            return Err(WriterError::InvalidProfile(format!(
                "encoder declares {} channels, profile needs {}",
                encoder.channel_count(),
                specs.len()
            )));
        }
        for (index, spec) in specs.iter().enumerate() {
            encoder.configure_channel(index, spec)?;
        }

        if let Some(patient) = patient.filter(|p| !p.is_empty()) {
            encoder.write_header(&patient.truncated())?;
            session.record("patient header written");
        }

        let labels: Vec<String> = specs.into_iter().map(|spec| spec.label).collect();
        Ok(EdfWriter {
            session,
            encoder,
            sensors: profile.sensors.clone(),
            buffers: vec![Vec::with_capacity(profile.sample_frequency); labels.len()],
            labels,
            sample_frequency: profile.sample_frequency,
            flushes: 0,
            closed: false,
        })
    }

    pub fn channel_count(&self) -> usize {
        self.labels.len()
    }

    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    pub fn sample_frequency(&self) -> usize {
        self.sample_frequency
    }

    /// Samples currently waiting in `channel`'s buffer.
    pub fn buffered(&self, channel: usize) -> usize {
        self.buffers.get(channel).map_or(0, Vec::len)
    }

    /// Windows handed to the encoder so far, over all channels.
    pub fn flushes(&self) -> u64 {
        self.flushes
    }

    pub fn encoder(&self) -> &E {
        &self.encoder
    }

    fn push(&mut self, channel: usize, value: i16) -> Result<()> {
        let buffer = &mut self.buffers[channel];
        buffer.push(value);
        if buffer.len() == self.sample_frequency {
            self.encoder.write_samples(channel, &buffer[..])?;
            buffer.clear();
            self.flushes += 1;
            log::debug!("flushed {} samples of {}", self.sample_frequency, self.labels[channel]);
        }
        Ok(())
    }
}

impl<E: SignalEncoder> PacketWriter for EdfWriter<E> {
    fn kind(&self) -> WriterKind {
        WriterKind::Edf
    }

    fn session(&self) -> &Session {
        &self.session
    }

    fn write_packet(&mut self, packet: &Packet) -> Result<()> {
        if self.closed {
            return Err(WriterError::Closed);
        }
        log::trace!("packet {}", packet.counter);

        for channel in 0..self.sensors.len() {
            if let Some(value) = packet.sample(&self.sensors[channel]) {
                self.push(channel, value)?;
            }
        }
        let gyro_x = self.sensors.len();
        self.push(gyro_x, packet.gyro.x)?;
        self.push(gyro_x + 1, packet.gyro.y)?;
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        if self.closed {
            return Err(WriterError::Closed);
        }
        self.closed = true;

        let leftover: usize = self.buffers.iter().map(Vec::len).sum();
        if leftover > 0 {
            log::debug!("discarding {leftover} samples short of a full second");
        }
        self.buffers.iter_mut().for_each(Vec::clear);

        self.encoder.finalize()?;
        self.session
            .record(format!("closed after {} channel flushes", self.flushes));
        log::info!(
            "EDF recording '{}' closed after {:.1?}",
            self.session.path().display(),
            self.session.elapsed()
        );
        Ok(())
    }
}
