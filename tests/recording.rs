use chrono::NaiveDate;
use nerven::{
    open_writer, DeviceProfile, EdfWriter, FileType, Packet, PacketWriter, PatientInfo, WriterKind,
};

fn field(bytes: &[u8], from: usize, len: usize) -> String {
    String::from_utf8_lossy(&bytes[from..from + len])
        .trim_end()
        .to_string()
}

fn packet(profile: &DeviceProfile, n: u32) -> Packet {
    let raw: Vec<u8> = (0..32).map(|i| (n as u8).wrapping_add(i)).collect();
    profile
        .sensors
        .iter()
        .enumerate()
        .fold(Packet::new(n, raw), |p, (i, s)| {
            p.with_sample(s, 8000 + i as i16)
        })
        .with_gyro(3, -4)
}

#[test]
fn edf_plus_file_holds_whole_seconds_only() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("session.edf");
    let profile = DeviceProfile::emotiv_epoc();
    let patient = PatientInfo::new()
        .with_patient("x".repeat(100))
        .with_gender("F")
        .with_birthdate(NaiveDate::from_ymd_opt(1990, 12, 1).unwrap());

    let mut writer = EdfWriter::open(&path, &profile, Some(&patient)).unwrap();
    assert_eq!(writer.channel_count(), 16);
    for n in 0..(2 * 128 + 5) {
        writer.write_packet(&packet(&profile, n)).unwrap();
    }
    writer.close().unwrap();

    let bytes = std::fs::read(&path).unwrap();
    let signals = 17;
    let header = 256 * (signals + 1);
    let record = 16 * 128 * 2 + 114;

    assert_eq!(field(&bytes, 184, 8), header.to_string());
    assert_eq!(field(&bytes, 192, 44), "EDF+C");
    assert_eq!(field(&bytes, 236, 8), "2");
    assert_eq!(field(&bytes, 252, 4), signals.to_string());
    assert_eq!(bytes.len(), header + 2 * record);

    let patient_field = field(&bytes, 8, 80);
    assert!(patient_field.starts_with("X F 01-DEC-1990 xxxx"));
    assert_eq!(patient_field.len(), 80);

    let labels: Vec<String> = (0..signals).map(|i| field(&bytes, 256 + i * 16, 16)).collect();
    assert_eq!(labels[..14], profile.sensors[..]);
    assert_eq!(labels[14], "gyroX");
    assert_eq!(labels[15], "gyroY");
    assert_eq!(labels[16], "EDF Annotations");

    let sample = |offset: usize| i16::from_le_bytes([bytes[offset], bytes[offset + 1]]);
    // first record: channel 1 (FC5) then gyroY
    assert_eq!(sample(header + 128 * 2), 8001);
    assert_eq!(sample(header + 15 * 128 * 2), -4);
    // second record starts with F3 again
    assert_eq!(sample(header + record), 8000);
}

#[test]
fn stalled_sensors_are_padded_instead_of_lost() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("stalled.edf");
    let profile = DeviceProfile::emotiv_epoc();
    let live = 8;

    let mut writer = EdfWriter::open(&path, &profile, None).unwrap();
    for n in 0..(10 * 128) {
        let raw = vec![n as u8; 32];
        let packet = profile.sensors[..live]
            .iter()
            .enumerate()
            .fold(Packet::new(n, raw), |p, (i, s)| p.with_sample(s, 8000 + i as i16))
            .with_gyro(3, -4);
        writer.write_packet(&packet).unwrap();
    }
    assert_eq!(writer.flushes(), 10 * (live as u64 + 2));
    assert!(writer.encoder().records() > 0);
    writer.close().unwrap();
    assert_eq!(writer.encoder().records(), 10);
    assert_eq!(writer.encoder().padded_windows(), 10 * (14 - live as u64));

    let bytes = std::fs::read(&path).unwrap();
    let header = 256 * 18;
    let record = 16 * 128 * 2 + 114;
    assert_eq!(field(&bytes, 236, 8), "10");
    assert_eq!(bytes.len(), header + 10 * record);

    let sample = |offset: usize| i16::from_le_bytes([bytes[offset], bytes[offset + 1]]);
    let at = |r: usize, channel: usize| header + r * record + channel * 128 * 2;
    for r in [0, 9] {
        assert_eq!(sample(at(r, 0)), 8000);
        assert_eq!(sample(at(r, live - 1)), 8007);
        // stalled EEG sensors hold the digital minimum
        assert_eq!(sample(at(r, live)), 0);
        assert_eq!(sample(at(r, 13)), 0);
        assert_eq!(sample(at(r, 15)), -4);
    }
}

#[test]
fn plain_edf_without_metadata() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("plain.edf");
    let profile = DeviceProfile {
        file_type: FileType::Edf,
        ..DeviceProfile::emotiv_epoc()
    };

    let mut writer = open_writer(WriterKind::Edf, &path, &profile, None).unwrap();
    for n in 0..100 {
        writer.write_packet(&packet(&profile, n)).unwrap();
    }
    writer.close().unwrap();

    let bytes = std::fs::read(&path).unwrap();
    assert_eq!(bytes.len(), 256 * 17);
    assert_eq!(field(&bytes, 8, 80), "");
    assert_eq!(field(&bytes, 236, 8), "0");
    assert_eq!(field(&bytes, 252, 4), "16");
}

#[test]
fn raw_dump_round_trips_payloads() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("session.bin");
    let profile = DeviceProfile::emotiv_epoc();

    let mut writer = open_writer(WriterKind::Raw, &path, &profile, None).unwrap();
    let mut expected = Vec::new();
    for n in 0..300 {
        let p = packet(&profile, n);
        expected.extend_from_slice(&p.raw);
        writer.write_packet(&p).unwrap();
    }
    writer.close().unwrap();

    assert_eq!(std::fs::read(&path).unwrap(), expected);
    assert!(writer.write_packet(&packet(&profile, 0)).is_err());
}

#[test]
fn invalid_profile_fails_before_writing() {
    let dir = tempfile::tempdir().unwrap();
    let mut profile = DeviceProfile::emotiv_epoc();
    profile.eeg.unit = "microvolts".into();
    let path = dir.path().join("bad.edf");
    assert!(EdfWriter::open(&path, &profile, None).is_err());
    assert!(!path.exists());
}
