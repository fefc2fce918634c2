use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::{Parser, ValueEnum};
use nerven::{capture::CaptureReader, open_writer, FileType, PatientInfo, WriterKind};

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Format {
    Raw,
    Edf,
}

impl From<Format> for WriterKind {
    fn from(format: Format) -> Self {
        match format {
            Format::Raw => WriterKind::Raw,
            Format::Edf => WriterKind::Edf,
        }
    }
}

/// Replays a `.easy` capture into a raw dump or an EDF recording.
#[derive(Debug, Parser)]
#[command(name = "nerven-record", version)]
struct Cli {
    /// `.easy` or `.easy.gz` capture to replay
    capture: String,

    /// Output file
    #[arg(short, long)]
    output: PathBuf,

    #[arg(short, long, value_enum, default_value = "edf")]
    format: Format,

    /// Device profile (`.json`, or a `.info` montage). Defaults to the
    /// capture's own `.info` file, then to a generic profile with one
    /// channel per EEG column.
    #[arg(long)]
    profile: Option<PathBuf>,

    /// Write plain EDF instead of EDF+
    #[arg(long)]
    plain_edf: bool,

    #[arg(long)]
    patient: Option<String>,

    #[arg(long)]
    gender: Option<String>,

    #[arg(long)]
    patient_additional: Option<String>,

    /// Birthdate as YYYY-MM-DD
    #[arg(long)]
    birthdate: Option<NaiveDate>,

    #[arg(short, long)]
    verbose: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(if cli.verbose { "debug" } else { "info" }),
    )
    .init();

    let reader = CaptureReader::open(&cli.capture, cli.verbose)
        .with_context(|| format!("opening capture {}", cli.capture))?;
    let mut profile = reader
        .profile(cli.profile.as_deref())
        .with_context(|| format!("loading profile for {}", cli.capture))?;
    if cli.plain_edf {
        profile.file_type = FileType::Edf;
    }

    let patient = PatientInfo {
        patient: cli.patient.clone(),
        gender: cli.gender.clone(),
        patient_additional: cli.patient_additional.clone(),
        birthdate: cli.birthdate,
    };

    let packets = reader.read_packets(&profile)?;
    let mut writer = open_writer(cli.format.into(), &cli.output, &profile, Some(&patient))
        .with_context(|| format!("opening {}", cli.output.display()))?;
    for packet in &packets {
        writer.write_packet(packet)?;
    }
    writer.close()?;

    log::info!(
        "wrote {} packets to {} as {} in {:.2?}",
        packets.len(),
        writer.path().display(),
        writer.kind(),
        writer.elapsed()
    );
    for event in writer.session().events() {
        log::debug!("- {event}");
    }
    Ok(())
}
