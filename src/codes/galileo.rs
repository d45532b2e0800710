use super::{bit_to_chip, Lfsr};
use crate::error::GnssError;

pub const CHIP_RATE_HZ: f64 = 1.023e6;
pub const PRIMARY_CHIPS: u64 = 4092;
pub const SECONDARY_CHIPS: u64 = 25;
pub const PERIOD_CHIPS: u64 = PRIMARY_CHIPS * SECONDARY_CHIPS;

/// x^12 + x^6 + x^4 + x + 1
const PRIMARY_TAPS: u32 = 0x829;
/// x^5 + x^3 + 1
const SECONDARY_TAPS: u32 = 0x14;

/// Tiered E1 code: 4092-chip primary XOR a 25-chip secondary clocked once
/// per primary period.
#[derive(Clone, Debug)]
pub struct GalileoCode {
    prn: u8,
    primary: Lfsr,
    secondary: Lfsr,
    primary_pos: u64,
    secondary_pos: u64,
}

impl GalileoCode {
    pub fn new(prn: u8) -> Result<Self, GnssError> {
        if prn == 0 {
            return Err(GnssError::config("Galileo PRN must be >= 1"));
        }
        let p = prn as u32;
        let mut primary_seed = (0x800 + ((p * 13) & 0xFFF)) & 0xFFF;
        if primary_seed == 0 {
            primary_seed = 0xFFF;
        }
        let mut secondary_seed = (0x10 + ((p * 3) & 0x1F)) & 0x1F;
        if secondary_seed == 0 {
            secondary_seed = 0x1F;
        }
        Ok(Self {
            prn,
            primary: Lfsr::new(12, PRIMARY_TAPS, primary_seed),
            secondary: Lfsr::new(5, SECONDARY_TAPS, secondary_seed),
            primary_pos: 0,
            secondary_pos: 0,
        })
    }

    pub fn prn(&self) -> u8 {
        self.prn
    }

    #[inline]
    pub fn next_bit(&mut self) -> u8 {
        let bit = self.primary.clock() ^ self.secondary.output();
        self.primary_pos += 1;
        if self.primary_pos == PRIMARY_CHIPS {
            self.primary_pos = 0;
            self.primary.reset();
            self.secondary.clock();
            self.secondary_pos += 1;
            if self.secondary_pos == SECONDARY_CHIPS {
                self.secondary_pos = 0;
                self.secondary.reset();
            }
        }
        bit
    }

    #[inline]
    pub fn next_chip(&mut self) -> i8 {
        bit_to_chip(self.next_bit())
    }

    pub fn reset(&mut self) {
        self.primary.reset();
        self.secondary.reset();
        self.primary_pos = 0;
        self.secondary_pos = 0;
    }
}

/// BOC(1,1) subcarrier: +1 in the first half of each chip, -1 in the second.
#[inline]
pub fn boc11_sign(chip_pos: f64) -> i8 {
    if chip_pos.fract() < 0.5 {
        1
    } else {
        -1
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codes::take_chips;

    #[test]
    fn tiered_code_repeats_every_102300_chips() -> anyhow::Result<()> {
        let mut code = GalileoCode::new(11)?;
        let n = PERIOD_CHIPS as usize;
        let chips = take_chips(|| code.next_chip(), 2 * n);
        assert_eq!(chips[..n], chips[n..]);
        Ok(())
    }

    #[test]
    fn secondary_flips_whole_primary_periods() -> anyhow::Result<()> {
        let mut code = GalileoCode::new(3)?;
        let p = PRIMARY_CHIPS as usize;
        let chips = take_chips(|| code.next_chip(), PERIOD_CHIPS as usize);
        let first = &chips[..p];
        for k in 1..SECONDARY_CHIPS as usize {
            let seg = &chips[k * p..(k + 1) * p];
            let same = seg == first;
            let inverted = seg.iter().zip(first).all(|(a, b)| *a == -*b);
            assert!(same || inverted, "period {k} is not +/- the primary");
        }
        Ok(())
    }

    #[test]
    fn prns_differ() -> anyhow::Result<()> {
        let mut a = GalileoCode::new(1)?;
        let mut b = GalileoCode::new(2)?;
        let ca = take_chips(|| a.next_chip(), 4092);
        let cb = take_chips(|| b.next_chip(), 4092);
        assert_ne!(ca, cb);
        Ok(())
    }

    #[test]
    fn boc_sign_follows_half_chips() {
        assert_eq!(boc11_sign(10.0), 1);
        assert_eq!(boc11_sign(10.49), 1);
        assert_eq!(boc11_sign(10.5), -1);
        assert_eq!(boc11_sign(10.99), -1);
    }
}
