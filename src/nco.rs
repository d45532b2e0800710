//! Table-driven numerically controlled oscillator.
//!
//! Phase is a 32-bit fraction of a turn, so wrapping at 2π is plain integer
//! overflow and the phase carried between calls is exact.

use crate::sample::{saturate_f32, IqSample};
use num_complex::Complex32;
use std::sync::Arc;

/// Table size used by provider-level oscillators (16384 entries).
pub const PROVIDER_TABLE_BITS: u32 = 14;
/// Table size used by per-channel FDMA oscillators (8192 entries).
pub const CHANNEL_TABLE_BITS: u32 = 13;

/// Attenuation applied by [`Nco::mix`].
pub const MIX_SCALE: f32 = 0.5;

/// Offsets below this magnitude are treated as already at baseband.
pub const BYPASS_HZ: f64 = 1.0;

const TURN: f64 = 4_294_967_296.0;

/// Precomputed unit phasors `e^{j 2π i / N}`.
#[derive(Debug)]
pub struct SineTable {
    bits: u32,
    entries: Vec<Complex32>,
}

impl SineTable {
    pub fn new(bits: u32) -> Arc<Self> {
        let bits = bits.clamp(4, 20);
        let n = 1usize << bits;
        let entries = (0..n)
            .map(|i| {
                let ph = 2.0 * std::f64::consts::PI * (i as f64) / (n as f64);
                Complex32::new(ph.cos() as f32, ph.sin() as f32)
            })
            .collect();
        Arc::new(Self { bits, entries })
    }

    #[inline]
    fn lookup(&self, phase: u32) -> Complex32 {
        self.entries[(phase >> (32 - self.bits)) as usize]
    }
}

#[derive(Clone, Debug)]
pub struct Nco {
    table: Arc<SineTable>,
    sample_rate_hz: f64,
    frequency_hz: f64,
    phase: u32,
    increment: u32,
}

impl Nco {
    pub fn new(sample_rate_hz: f64, table_bits: u32) -> Self {
        Self::with_table(sample_rate_hz, SineTable::new(table_bits))
    }

    /// Oscillator sharing an existing table.
    pub fn with_table(sample_rate_hz: f64, table: Arc<SineTable>) -> Self {
        Self {
            table,
            sample_rate_hz,
            frequency_hz: 0.0,
            phase: 0,
            increment: 0,
        }
    }

    /// Sets the output frequency. The current phase is kept.
    pub fn configure(&mut self, frequency_hz: f64) {
        self.frequency_hz = frequency_hz;
        let turns = (frequency_hz / self.sample_rate_hz).rem_euclid(1.0);
        // `as` saturates, and 2^32 itself wraps back to 0
        self.increment = ((turns * TURN).round() as u64 & 0xFFFF_FFFF) as u32;
    }

    #[must_use]
    pub fn frequency_hz(&self) -> f64 {
        self.frequency_hz
    }

    #[must_use]
    pub fn is_bypassed(&self) -> bool {
        self.frequency_hz.abs() < BYPASS_HZ
    }

    /// Current phase as a fraction of a turn in `[0, 1)`.
    #[must_use]
    pub fn phase_turns(&self) -> f64 {
        self.phase as f64 / TURN
    }

    #[inline]
    fn step(&mut self) -> Complex32 {
        let c = self.table.lookup(self.phase);
        self.phase = self.phase.wrapping_add(self.increment);
        c
    }

    /// Next `n` carrier samples.
    pub fn advance(&mut self, n: usize) -> Vec<Complex32> {
        (0..n).map(|_| self.step()).collect()
    }

    /// Frequency-shift an integer block in place, scaled by [`MIX_SCALE`].
    pub fn mix(&mut self, block: &mut [IqSample]) {
        if self.is_bypassed() {
            return;
        }
        for s in block.iter_mut() {
            let z = Complex32::new(s.re as f32, s.im as f32) * self.step() * MIX_SCALE;
            *s = IqSample::new(saturate_f32(z.re), saturate_f32(z.im));
        }
    }

    /// Unit-gain rotation of a float buffer in place.
    pub fn rotate(&mut self, buf: &mut [Complex32]) {
        if self.is_bypassed() {
            return;
        }
        for v in buf.iter_mut() {
            *v *= self.step();
        }
    }
}
