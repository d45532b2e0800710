use super::{bit_to_chip, Lfsr};
use crate::error::GnssError;

pub const CHIP_RATE_HZ: f64 = 1.023e6;
pub const PERIOD_CHIPS: u64 = 1023;

/// G1 = 1 + x^3 + x^10
const G1_TAPS: u32 = 0x204;
/// G2 = 1 + x^2 + x^3 + x^6 + x^8 + x^9 + x^10
const G2_TAPS: u32 = 0x3A6;

/// G2 phase-selector stage pairs for PRN 1..=37.
const G2_SELECT: [(u32, u32); 37] = [
    (2, 6),
    (3, 7),
    (4, 8),
    (5, 9),
    (1, 9),
    (2, 10),
    (1, 8),
    (2, 9),
    (3, 10),
    (2, 3),
    (3, 4),
    (5, 6),
    (6, 7),
    (7, 8),
    (8, 9),
    (9, 10),
    (1, 4),
    (2, 5),
    (3, 6),
    (4, 7),
    (5, 8),
    (6, 9),
    (1, 3),
    (4, 6),
    (5, 7),
    (6, 8),
    (7, 9),
    (8, 10),
    (1, 6),
    (2, 7),
    (3, 8),
    (4, 9),
    (5, 10),
    (4, 10),
    (1, 7),
    (2, 8),
    (4, 10),
];

pub const MAX_PRN: u8 = G2_SELECT.len() as u8;

/// L1 C/A Gold code.
#[derive(Clone, Debug)]
pub struct GpsCode {
    prn: u8,
    g1: Lfsr,
    g2: Lfsr,
    select: (u32, u32),
}

impl GpsCode {
    pub fn new(prn: u8) -> Result<Self, GnssError> {
        if prn == 0 || prn > MAX_PRN {
            return Err(GnssError::config(format!(
                "GPS PRN {prn} outside 1..={MAX_PRN}"
            )));
        }
        Ok(Self {
            prn,
            g1: Lfsr::new(10, G1_TAPS, 0x3FF),
            g2: Lfsr::new(10, G2_TAPS, 0x3FF),
            select: G2_SELECT[(prn - 1) as usize],
        })
    }

    pub fn prn(&self) -> u8 {
        self.prn
    }

    #[inline]
    pub fn next_bit(&mut self) -> u8 {
        let (a, b) = self.select;
        let bit = self.g1.output() ^ self.g2.stage(a) ^ self.g2.stage(b);
        self.g1.clock();
        self.g2.clock();
        bit
    }

    #[inline]
    pub fn next_chip(&mut self) -> i8 {
        bit_to_chip(self.next_bit())
    }

    pub fn reset(&mut self) {
        self.g1.reset();
        self.g2.reset();
    }
}
