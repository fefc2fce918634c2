use std::collections::HashMap;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GyroSample {
    pub x: i16,
    pub y: i16,
}

/// One sensor packet as delivered by the headset driver.
///
/// `raw` is the undecoded payload, kept so a session can be dumped
/// byte-for-byte. `digital` holds the calibrated sample of every EEG sensor
/// the packet carried, keyed by sensor name; a sensor absent from the map
/// simply contributes nothing for this packet.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Packet {
    pub counter: u32,
    pub raw: Vec<u8>,
    pub digital: HashMap<String, i16>,
    pub gyro: GyroSample,
}

impl Packet {
    pub fn new(counter: u32, raw: Vec<u8>) -> Self {
        Packet {
            counter,
            raw,
            ..Default::default()
        }
    }

    pub fn with_sample(mut self, sensor: &str, value: i16) -> Self {
        self.digital.insert(sensor.to_string(), value);
        self
    }

    pub fn with_gyro(mut self, x: i16, y: i16) -> Self {
        self.gyro = GyroSample { x, y };
        self
    }

    pub fn sample(&self, sensor: &str) -> Option<i16> {
        self.digital.get(sensor).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_fills_samples_and_gyro() {
        let packet = Packet::new(7, vec![1, 2, 3])
            .with_sample("F3", 4100)
            .with_gyro(-3, 12);
        assert_eq!(packet.counter, 7);
        assert_eq!(packet.sample("F3"), Some(4100));
        assert_eq!(packet.sample("F4"), None);
        assert_eq!(packet.gyro, GyroSample { x: -3, y: 12 });
    }
}
