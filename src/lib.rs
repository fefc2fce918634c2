//! Recording of headset EEG + gyroscope packet streams.
//!
//! A [`writer::PacketWriter`] is opened for one device session, fed packets
//! in arrival order and closed once. Two implementations exist:
//! [`writer::RawWriter`] dumps the undecoded payloads and
//! [`writer::EdfWriter`] buffers one second per channel and hands it to an
//! [`edf::SignalEncoder`], by default the EDF/EDF+ file encoder in
//! [`edf::EdfEncoder`].

pub mod capture;
pub mod device;
pub mod edf;
pub mod error;
pub mod metadata;
pub mod packet;
pub mod writer;

pub use device::{ChannelRange, DeviceProfile, FileType};
pub use error::{Result, WriterError};
pub use metadata::PatientInfo;
pub use packet::{GyroSample, Packet};
pub use writer::{open_writer, EdfWriter, PacketWriter, RawWriter, Session, WriterKind};
