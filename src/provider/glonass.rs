use super::{base_amplitude, nominal_power_dbm, quantize, SatelliteInfo};
use crate::codes::glonass::CHIP_RATE_HZ;
use crate::codes::{ChipClock, GlonassCode};
use crate::constellation::{Constellation, GLONASS_CHANNEL_STEP_HZ};
use crate::ephemeris::{EphemerisRecord, EphemerisSet};
use crate::error::GnssError;
use crate::nco::{Nco, SineTable, CHANNEL_TABLE_BITS, PROVIDER_TABLE_BITS};
use crate::params::GlobalConfig;
use crate::sample::{sample_index, sum_saturating, SampleBlock};
use num_complex::{Complex, Complex32};
use rayon::prelude::*;

pub const MIN_CHANNEL: i8 = -7;
pub const MAX_CHANNEL: i8 = 6;

/// One frequency slot `k`, with its own translator oscillator.
#[derive(Clone, Debug)]
pub struct FdmaChannel {
    k: i8,
    prn: u8,
    code: GlonassCode,
    clock: ChipClock,
    chip: i8,
    amplitude: f32,
    power_dbm: f64,
    default_active: bool,
    active: bool,
    doppler_hz: f64,
    translator: Nco,
    doppler: Nco,
    record: Option<EphemerisRecord>,
}

impl FdmaChannel {
    pub fn k(&self) -> i8 {
        self.k
    }

    pub fn prn(&self) -> u8 {
        self.prn
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Offset of this channel from the L1 nominal carrier.
    pub fn delta_hz(&self) -> f64 {
        self.k as f64 * GLONASS_CHANNEL_STEP_HZ
    }

    fn default_prn(k: i8) -> u8 {
        (k + 8) as u8
    }

    fn render(&mut self, n0: u64, n: usize) -> Vec<Complex<i32>> {
        let mut buf = Vec::with_capacity(n);
        for idx in n0..n0 + n as u64 {
            if self.clock.tick(idx) {
                self.chip = self.code.next_chip();
            }
            buf.push(Complex32::new(self.chip as f32 * self.amplitude, 0.0));
        }
        self.translator.rotate(&mut buf);
        self.doppler.configure(self.doppler_hz);
        self.doppler.rotate(&mut buf);
        quantize(&buf)
    }
}

/// Frequency-division provider: every channel carries the same code on its
/// own frequency `1602 MHz + k * 562.5 kHz`.
pub struct GlonassProvider {
    sample_rate_hz: f64,
    offset_hz: f64,
    nco: Nco,
    channels: Vec<FdmaChannel>,
    ephemeris: Option<EphemerisSet>,
}

impl GlonassProvider {
    pub fn new(cfg: &GlobalConfig) -> Self {
        let params = cfg.constellation(Constellation::Glonass);
        let fs = cfg.sample_rate_hz;
        let channel_table = SineTable::new(CHANNEL_TABLE_BITS);
        let amplitude = base_amplitude(Constellation::Glonass) * params.weight as f32;

        let channels = (MIN_CHANNEL..=MAX_CHANNEL)
            .enumerate()
            .map(|(i, k)| {
                let mut translator = Nco::with_table(fs, channel_table.clone());
                translator.configure(k as f64 * GLONASS_CHANNEL_STEP_HZ);
                FdmaChannel {
                    k,
                    prn: FdmaChannel::default_prn(k),
                    code: GlonassCode::new(),
                    clock: ChipClock::new(CHIP_RATE_HZ, fs),
                    chip: 1,
                    amplitude,
                    power_dbm: nominal_power_dbm(Constellation::Glonass),
                    default_active: i < params.satellites,
                    active: false,
                    doppler_hz: 0.0,
                    translator,
                    doppler: Nco::with_table(fs, channel_table.clone()),
                    record: None,
                }
            })
            .collect();

        Self {
            sample_rate_hz: fs,
            offset_hz: 0.0,
            nco: Nco::new(fs, PROVIDER_TABLE_BITS),
            channels,
            ephemeris: None,
        }
    }

    pub fn set_frequency_offset(&mut self, offset_hz: f64) {
        self.offset_hz = offset_hz;
        self.nco.configure(offset_hz);
    }

    pub fn frequency_offset_hz(&self) -> f64 {
        self.offset_hz
    }

    /// Records announcing a frequency channel claim that slot and give it
    /// their satellite number; other records match a slot by number.
    pub(super) fn apply_ephemeris(&mut self, set: Option<EphemerisSet>) -> usize {
        for ch in &mut self.channels {
            ch.prn = FdmaChannel::default_prn(ch.k);
            ch.record = set.as_ref().and_then(|s| match s.by_channel(ch.k) {
                Some(r) => Some(r.clone()),
                None => s.get(ch.prn).filter(|r| r.freq_channel().is_none()).cloned(),
            });
            if let Some(r) = &ch.record {
                ch.prn = r.id;
            }
            ch.active = ch.default_active && ch.record.as_ref().is_some_and(|r| r.healthy);
            ch.doppler_hz = 0.0;
        }
        self.ephemeris = set;
        self.active_count()
    }

    pub fn active_count(&self) -> usize {
        self.channels.iter().filter(|c| c.active).count()
    }

    pub fn is_ready(&self) -> bool {
        self.ephemeris.is_some() && self.active_count() > 0
    }

    pub fn produce_chunk(&mut self, time_s: f64, n: usize) -> Result<SampleBlock, GnssError> {
        if self.ephemeris.is_none() {
            return Err(GnssError::NotReady {
                constellation: Constellation::Glonass,
                reason: "no ephemeris loaded",
            });
        }
        if self.active_count() == 0 {
            return Err(GnssError::NotReady {
                constellation: Constellation::Glonass,
                reason: "no active channels",
            });
        }
        let n0 = sample_index(time_s, self.sample_rate_hz);
        let carrier = Constellation::Glonass.carrier_hz();

        let parts: Vec<Vec<Complex<i32>>> = self
            .channels
            .par_iter_mut()
            .filter(|c| c.active)
            .map(|c| {
                let f = carrier + c.delta_hz();
                c.doppler_hz = c.record.as_ref().map_or(0.0, |r| r.doppler_hz(time_s, f));
                c.render(n0, n)
            })
            .collect();

        let mut block = sum_saturating(n, &parts);
        self.nco.mix(&mut block);
        Ok(block)
    }

    pub fn satellites(&self) -> Vec<SatelliteInfo> {
        let carrier = Constellation::Glonass.carrier_hz();
        self.channels
            .iter()
            .map(|c| SatelliteInfo {
                constellation: Constellation::Glonass,
                id: c.prn,
                freq_channel: Some(c.k),
                frequency_hz: carrier + c.delta_hz() + c.doppler_hz,
                offset_hz: self.offset_hz + c.delta_hz(),
                power_dbm: c.power_dbm,
                doppler_hz: c.doppler_hz,
                active: c.active,
            })
            .collect()
    }
}
