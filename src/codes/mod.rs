//! Spreading-code generators.
//!
//! Every register uses the same convention: stage `i` (1-based) lives in bit
//! `i - 1`, the output is the highest stage read before the shift, and the
//! feedback (parity of the tapped stages) enters stage 1.

pub mod beidou;
pub mod galileo;
pub mod glonass;
pub mod gps;

pub use beidou::BeidouCode;
pub use galileo::GalileoCode;
pub use glonass::GlonassCode;
pub use gps::GpsCode;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Lfsr {
    width: u32,
    taps: u32,
    seed: u32,
    state: u32,
}

impl Lfsr {
    pub fn new(width: u32, taps: u32, seed: u32) -> Self {
        let mask = (1u32 << width) - 1;
        let seed = seed & mask;
        Self {
            width,
            taps: taps & mask,
            seed,
            state: seed,
        }
    }

    fn mask(&self) -> u32 {
        (1u32 << self.width) - 1
    }

    /// Value of stage `i`, 1-based.
    #[inline]
    pub fn stage(&self, i: u32) -> u8 {
        ((self.state >> (i - 1)) & 1) as u8
    }

    #[inline]
    pub fn output(&self) -> u8 {
        self.stage(self.width)
    }

    /// Shift once and return the bit that was on the output stage.
    #[inline]
    pub fn clock(&mut self) -> u8 {
        let out = self.output();
        let fb = (self.state & self.taps).count_ones() & 1;
        self.state = ((self.state << 1) | fb) & self.mask();
        out
    }

    pub fn reset(&mut self) {
        self.state = self.seed;
    }

    pub fn state(&self) -> u32 {
        self.state
    }
}

/// Logic 0 is chip +1, logic 1 is chip -1.
#[inline]
pub fn bit_to_chip(bit: u8) -> i8 {
    1 - 2 * (bit & 1) as i8
}

/// Maps absolute sample indices onto the chip grid and reports chip edges.
#[derive(Clone, Debug)]
pub struct ChipClock {
    chips_per_sample: f64,
    last_chip: Option<u64>,
}

impl ChipClock {
    pub fn new(chip_rate_hz: f64, sample_rate_hz: f64) -> Self {
        Self {
            chips_per_sample: chip_rate_hz / sample_rate_hz,
            last_chip: None,
        }
    }

    /// Chip position of sample `n`, in chips.
    #[inline]
    pub fn position(&self, n: u64) -> f64 {
        n as f64 * self.chips_per_sample
    }

    /// True when sample `n` falls in a chip different from the previous call.
    #[inline]
    pub fn tick(&mut self, n: u64) -> bool {
        let chip = self.position(n).floor() as u64;
        if self.last_chip == Some(chip) {
            return false;
        }
        self.last_chip = Some(chip);
        true
    }

    pub fn reset(&mut self) {
        self.last_chip = None;
    }
}

/// Code-division spreading codes, one per satellite.
#[derive(Clone, Debug)]
pub enum CdmaCode {
    Gps(GpsCode),
    Galileo(GalileoCode),
    Beidou(BeidouCode),
}

impl CdmaCode {
    pub fn chip_rate_hz(&self) -> f64 {
        match self {
            CdmaCode::Gps(_) => gps::CHIP_RATE_HZ,
            CdmaCode::Galileo(_) => galileo::CHIP_RATE_HZ,
            CdmaCode::Beidou(_) => beidou::CHIP_RATE_HZ,
        }
    }

    pub fn period_chips(&self) -> u64 {
        match self {
            CdmaCode::Gps(_) => gps::PERIOD_CHIPS,
            CdmaCode::Galileo(_) => galileo::PERIOD_CHIPS,
            CdmaCode::Beidou(_) => beidou::PERIOD_CHIPS,
        }
    }

    #[inline]
    pub fn next_chip(&mut self) -> i8 {
        match self {
            CdmaCode::Gps(c) => c.next_chip(),
            CdmaCode::Galileo(c) => c.next_chip(),
            CdmaCode::Beidou(c) => c.next_chip(),
        }
    }

    /// Square-wave subcarrier at chip position `pos`; 1 for plain BPSK.
    #[inline]
    pub fn subcarrier(&self, pos: f64) -> i8 {
        match self {
            CdmaCode::Galileo(_) => galileo::boc11_sign(pos),
            _ => 1,
        }
    }

    pub fn reset(&mut self) {
        match self {
            CdmaCode::Gps(c) => c.reset(),
            CdmaCode::Galileo(c) => c.reset(),
            CdmaCode::Beidou(c) => c.reset(),
        }
    }
}

/// First `n` chips of any generator, for period checks.
#[cfg(test)]
pub(crate) fn take_chips(mut next: impl FnMut() -> i8, n: usize) -> Vec<i8> {
    (0..n).map(|_| next()).collect()
}
