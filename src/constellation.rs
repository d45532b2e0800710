use serde::Deserialize;
use std::fmt;
use std::ops::RangeInclusive;

pub const GPS_L1_HZ: f64 = 1_575.42e6;
pub const GALILEO_E1_HZ: f64 = 1_575.42e6;
pub const BEIDOU_B1_HZ: f64 = 1_561.098e6;
pub const GLONASS_L1_HZ: f64 = 1_602.0e6;

/// GLONASS L1 channel spacing.
pub const GLONASS_CHANNEL_STEP_HZ: f64 = 562_500.0;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Constellation {
    Gps,
    Glonass,
    Galileo,
    Beidou,
}

impl Constellation {
    pub const ALL: [Constellation; 4] = [
        Constellation::Gps,
        Constellation::Glonass,
        Constellation::Galileo,
        Constellation::Beidou,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Constellation::Gps => "GPS",
            Constellation::Glonass => "GLONASS",
            Constellation::Galileo => "Galileo",
            Constellation::Beidou => "BeiDou",
        }
    }

    /// Nominal carrier of the open-service L1/E1/B1 signal.
    pub fn carrier_hz(self) -> f64 {
        match self {
            Constellation::Gps => GPS_L1_HZ,
            Constellation::Glonass => GLONASS_L1_HZ,
            Constellation::Galileo => GALILEO_E1_HZ,
            Constellation::Beidou => BEIDOU_B1_HZ,
        }
    }

    /// RINEX 3 system letter.
    pub fn rinex_letter(self) -> char {
        match self {
            Constellation::Gps => 'G',
            Constellation::Glonass => 'R',
            Constellation::Galileo => 'E',
            Constellation::Beidou => 'C',
        }
    }

    /// Satellite identifiers the default satellite set covers.
    pub fn id_range(self) -> RangeInclusive<u8> {
        match self {
            Constellation::Gps => 1..=32,
            Constellation::Glonass => 1..=24,
            Constellation::Galileo => 1..=36,
            Constellation::Beidou => 1..=37,
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "gps" | "g" => Some(Constellation::Gps),
            "glonass" | "glo" | "r" => Some(Constellation::Glonass),
            "galileo" | "gal" | "e" => Some(Constellation::Galileo),
            "beidou" | "bds" | "c" => Some(Constellation::Beidou),
            _ => None,
        }
    }
}

impl fmt::Display for Constellation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
