use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use crate::device::DeviceProfile;
use crate::error::{Result, WriterError};
use crate::packet::Packet;
use crate::writer::{PacketWriter, Session, WriterKind};

/// Dumps every packet's raw payload to disk, back to back, with no framing.
pub struct RawWriter {
    session: Session,
    stream: Option<BufWriter<File>>,
    packets_written: u64,
    bytes_written: u64,
}

impl RawWriter {
    pub fn open<P: AsRef<Path>>(path: P, profile: &DeviceProfile) -> Result<Self> {
        let session = Session::start(path);
        let file = File::create(session.path())?;
        log::info!(
            "raw recording of {} started at '{}'",
            profile.name,
            session.path().display()
        );
        Ok(RawWriter {
            session,
            stream: Some(BufWriter::new(file)),
            packets_written: 0,
            bytes_written: 0,
        })
    }

    pub fn packets_written(&self) -> u64 {
        self.packets_written
    }

    pub fn bytes_written(&self) -> u64 {
        self.bytes_written
    }
}

impl PacketWriter for RawWriter {
    fn kind(&self) -> WriterKind {
        WriterKind::Raw
    }

    fn session(&self) -> &Session {
        &self.session
    }

    fn write_packet(&mut self, packet: &Packet) -> Result<()> {
        let stream = self.stream.as_mut().ok_or(WriterError::Closed)?;
        stream.write_all(&packet.raw)?;
        self.packets_written += 1;
        self.bytes_written += packet.raw.len() as u64;
        log::trace!("packet {} -> {} raw bytes", packet.counter, packet.raw.len());
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        let mut stream = self.stream.take().ok_or(WriterError::Closed)?;
        stream.flush()?;
        let elapsed = self.session.elapsed();
        self.session.record(format!(
            "closed after {} packets ({} bytes)",
            self.packets_written, self.bytes_written
        ));
        log::info!(
            "raw recording '{}' closed: {} packets, {} bytes in {:.1?}",
            self.session.path().display(),
            self.packets_written,
            self.bytes_written,
            elapsed
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn output_is_concatenation_of_payloads() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.bin");
        let mut writer = RawWriter::open(&path, &DeviceProfile::emotiv_epoc()).unwrap();

        let payloads: Vec<Vec<u8>> = (0..5u8).map(|i| vec![i; 32 + i as usize]).collect();
        let mut expected = Vec::new();
        for (i, raw) in payloads.iter().enumerate() {
            writer
                .write_packet(&Packet::new(i as u32, raw.clone()))
                .unwrap();
            expected.extend_from_slice(raw);
        }
        writer.write_packet(&Packet::new(5, Vec::new())).unwrap();
        writer.close().unwrap();

        assert_eq!(std::fs::read(&path).unwrap(), expected);
        assert_eq!(writer.packets_written(), 6);
        assert_eq!(writer.bytes_written(), expected.len() as u64);
    }

    #[test]
    fn writing_after_close_fails() {
        let dir = tempfile::tempdir().unwrap();
        let mut writer =
            RawWriter::open(dir.path().join("x.bin"), &DeviceProfile::emotiv_epoc()).unwrap();
        writer.close().unwrap();
        assert!(matches!(
            writer.write_packet(&Packet::new(0, vec![1])),
            Err(WriterError::Closed)
        ));
        assert!(matches!(writer.close(), Err(WriterError::Closed)));
    }

    #[test]
    fn unopenable_path_is_an_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing").join("x.bin");
        assert!(matches!(
            RawWriter::open(path, &DeviceProfile::emotiv_epoc()),
            Err(WriterError::Io(_))
        ));
    }
}
