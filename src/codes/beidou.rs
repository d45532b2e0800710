use super::{bit_to_chip, Lfsr};
use crate::error::GnssError;

pub const CHIP_RATE_HZ: f64 = 2.046e6;
pub const PERIOD_CHIPS: u64 = 2046;

/// x^11 + x^9 + x^8 + x^5 + x^2 + 1
const A_TAPS: u32 = 0x592;
/// x^11 + x^10 + x^8 + x^7 + x^4 + x^3 + 1
const B_TAPS: u32 = 0x6CC;

/// B1I-style code from two 11-bit registers, combined by `prn % 4`.
#[derive(Clone, Debug)]
pub struct BeidouCode {
    prn: u8,
    a: Lfsr,
    b: Lfsr,
    pos: u64,
}

impl BeidouCode {
    pub fn new(prn: u8) -> Result<Self, GnssError> {
        if prn == 0 {
            return Err(GnssError::config("BeiDou PRN must be >= 1"));
        }
        let p = prn as u32;
        let seed_a = 0x400 + (p & 0x3FF);
        let mut seed_b = (0x600 + ((p * 7) & 0x3FF)) & 0x7FF;
        if seed_b == 0 {
            seed_b = 0x7FF;
        }
        Ok(Self {
            prn,
            a: Lfsr::new(11, A_TAPS, seed_a),
            b: Lfsr::new(11, B_TAPS, seed_b),
            pos: 0,
        })
    }

    pub fn prn(&self) -> u8 {
        self.prn
    }

    #[inline]
    pub fn next_bit(&mut self) -> u8 {
        let a = self.a.clock();
        let b = self.b.clock();
        let bit = match self.prn % 4 {
            0 => a ^ b,
            1 => a & (b ^ 1),
            2 => (a ^ 1) ^ b,
            _ => a,
        };
        self.pos += 1;
        if self.pos == PERIOD_CHIPS {
            self.pos = 0;
            self.a.reset();
            self.b.reset();
        }
        bit
    }

    #[inline]
    pub fn next_chip(&mut self) -> i8 {
        bit_to_chip(self.next_bit())
    }

    pub fn reset(&mut self) {
        self.a.reset();
        self.b.reset();
        self.pos = 0;
    }
}
