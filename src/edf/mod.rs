//! EDF output: header layout and the encoder behind [`SignalEncoder`].

pub mod encoder;
pub mod header;

pub use encoder::EdfEncoder;
pub use header::ChannelSpec;

use crate::error::Result;
use crate::metadata::PatientInfo;

/// The narrow surface an EDF backend has to offer the recording writer.
///
/// Channels are configured before anything else, patient fields may be set
/// once, and each `write_samples` call hands over one data record's worth of
/// digital samples for a single channel.
pub trait SignalEncoder {
    /// Number of data signals declared when the encoder was opened.
    fn channel_count(&self) -> usize;
    fn configure_channel(&mut self, index: usize, spec: &ChannelSpec) -> Result<()>;
    fn write_header(&mut self, patient: &PatientInfo) -> Result<()>;
    fn write_samples(&mut self, channel: usize, samples: &[i16]) -> Result<()>;
    fn finalize(&mut self) -> Result<()>;
}
