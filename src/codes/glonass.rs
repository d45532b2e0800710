use super::{bit_to_chip, Lfsr};

pub const CHIP_RATE_HZ: f64 = 0.511e6;
pub const PERIOD_CHIPS: u64 = 511;

/// x^9 + x^5 + 1
const TAPS: u32 = 0x110;

/// L1OF ranging code, identical on every frequency channel.
#[derive(Clone, Debug)]
pub struct GlonassCode {
    reg: Lfsr,
}

impl Default for GlonassCode {
    fn default() -> Self {
        Self::new()
    }
}

impl GlonassCode {
    pub fn new() -> Self {
        Self {
            reg: Lfsr::new(9, TAPS, 0x1FF),
        }
    }

    #[inline]
    pub fn next_chip(&mut self) -> i8 {
        bit_to_chip(self.reg.clock())
    }

    pub fn reset(&mut self) {
        self.reg.reset();
    }
}
