//! Session writers: the common [`PacketWriter`] contract and the factory
//! that picks an implementation at construction time.

pub mod edf;
pub mod raw;

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::{Duration, Instant};

use chrono::{DateTime, Local};

use crate::device::DeviceProfile;
use crate::error::{Result, WriterError};
use crate::metadata::PatientInfo;
use crate::packet::Packet;

pub use edf::EdfWriter;
pub use raw::RawWriter;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriterKind {
    Raw,
    Edf,
}

impl fmt::Display for WriterKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WriterKind::Raw => write!(f, "raw"),
            WriterKind::Edf => write!(f, "edf"),
        }
    }
}

impl FromStr for WriterKind {
    type Err = WriterError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "raw" | "bin" => Ok(WriterKind::Raw),
            "edf" | "edf+" => Ok(WriterKind::Edf),
            other => Err(WriterError::Parse(format!("unknown writer kind {other:?}"))),
        }
    }
}

/// Bookkeeping shared by every writer: where it writes, when it started and
/// a short log of what happened to it.
#[derive(Debug)]
pub struct Session {
    path: PathBuf,
    started: Instant,
    started_at: DateTime<Local>,
    events: Vec<String>,
}

impl Session {
    pub fn start<P: AsRef<Path>>(path: P) -> Self {
        let started_at = Local::now();
        Session {
            path: path.as_ref().to_path_buf(),
            started: Instant::now(),
            started_at,
            events: vec![format!("session opened: {}", started_at.to_rfc3339())],
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn started_at(&self) -> DateTime<Local> {
        self.started_at
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    pub fn record(&mut self, event: impl Into<String>) {
        self.events.push(event.into());
    }

    pub fn events(&self) -> &[String] {
        &self.events
    }
}

/// Lifecycle shared by the raw and EDF writers: open, any number of
/// `write_packet` calls in arrival order, then exactly one `close`.
pub trait PacketWriter {
    fn kind(&self) -> WriterKind;

    fn session(&self) -> &Session;

    fn write_packet(&mut self, packet: &Packet) -> Result<()>;

    /// Flushes whatever the writer still holds and releases the output.
    /// Any call after this returns [`WriterError::Closed`].
    fn close(&mut self) -> Result<()>;

    fn elapsed(&self) -> Duration {
        self.session().elapsed()
    }

    fn path(&self) -> &Path {
        self.session().path()
    }
}

/// Opens the writer selected by `kind`. Patient metadata only applies to EDF
/// output.
pub fn open_writer<P: AsRef<Path>>(
    kind: WriterKind,
    path: P,
    profile: &DeviceProfile,
    patient: Option<&PatientInfo>,
) -> Result<Box<dyn PacketWriter>> {
    match kind {
        WriterKind::Raw => {
            if patient.is_some_and(|p| !p.is_empty()) {
                log::debug!("raw output has no header; ignoring patient metadata");
            }
            Ok(Box::new(RawWriter::open(path, profile)?))
        }
        WriterKind::Edf => Ok(Box::new(EdfWriter::open(path, profile, patient)?)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_writer_kinds() {
        assert_eq!("raw".parse::<WriterKind>().unwrap(), WriterKind::Raw);
        assert_eq!("EDF".parse::<WriterKind>().unwrap(), WriterKind::Edf);
        assert!("csv".parse::<WriterKind>().is_err());
        assert_eq!(WriterKind::Edf.to_string(), "edf");
    }

    #[test]
    fn elapsed_never_goes_backwards() {
        let session = Session::start("unused.bin");
        let mut last = session.elapsed();
        for _ in 0..100 {
            let now = session.elapsed();
            assert!(now >= last);
            last = now;
        }
        assert_eq!(session.events().len(), 1);
        assert!(session.events()[0].starts_with("session opened"));
    }

    #[test]
    fn factory_selects_implementation() {
        let dir = tempfile::tempdir().unwrap();
        let profile = DeviceProfile::emotiv_epoc();

        let mut raw = open_writer(WriterKind::Raw, dir.path().join("a.bin"), &profile, None).unwrap();
        assert_eq!(raw.kind(), WriterKind::Raw);
        raw.close().unwrap();

        let mut edf = open_writer(WriterKind::Edf, dir.path().join("a.edf"), &profile, None).unwrap();
        assert_eq!(edf.kind(), WriterKind::Edf);
        assert_eq!(edf.path(), dir.path().join("a.edf"));
        edf.close().unwrap();
    }
}
