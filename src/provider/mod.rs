//! Constellation providers: each owns its satellites' generation state and
//! produces one chunk at a time.

use crate::constellation::Constellation;
use crate::ephemeris::{EphemerisSet, EphemerisSource};
use crate::error::GnssError;
use crate::params::GlobalConfig;
use crate::sample::SampleBlock;
use num_complex::{Complex, Complex32};
use tracing::{debug, info};

mod cdma;
mod glonass;

pub use cdma::{CdmaProvider, CdmaSatellite};
pub use glonass::{FdmaChannel, GlonassProvider};

/// Per-satellite amplitude before the constellation weight.
pub fn base_amplitude(c: Constellation) -> f32 {
    match c {
        Constellation::Gps => 1000.0,
        Constellation::Galileo => 800.0,
        Constellation::Beidou => 900.0,
        Constellation::Glonass => 1000.0 * 0.7,
    }
}

/// Nominal received power reported for each satellite.
pub fn nominal_power_dbm(c: Constellation) -> f64 {
    match c {
        Constellation::Gps => -130.0,
        Constellation::Galileo => -127.0,
        Constellation::Beidou => -133.0,
        Constellation::Glonass => -128.0,
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct SatelliteInfo {
    pub constellation: Constellation,
    pub id: u8,
    pub freq_channel: Option<i8>,
    /// RF frequency including channel spacing and Doppler.
    pub frequency_hz: f64,
    /// Position of the signal in the output spectrum, Doppler excluded.
    pub offset_hz: f64,
    pub power_dbm: f64,
    pub doppler_hz: f64,
    pub active: bool,
}

/// Round a float buffer onto the wide integer grid used for summation.
pub(crate) fn quantize(buf: &[Complex32]) -> Vec<Complex<i32>> {
    buf.iter()
        .map(|z| Complex::new(z.re.round() as i32, z.im.round() as i32))
        .collect()
}

pub enum Provider {
    Gps(CdmaProvider),
    Galileo(CdmaProvider),
    Beidou(CdmaProvider),
    Glonass(GlonassProvider),
}

impl Provider {
    pub fn new(constellation: Constellation, cfg: &GlobalConfig) -> Result<Self, GnssError> {
        Ok(match constellation {
            Constellation::Gps => Provider::Gps(CdmaProvider::new(constellation, cfg)?),
            Constellation::Galileo => Provider::Galileo(CdmaProvider::new(constellation, cfg)?),
            Constellation::Beidou => Provider::Beidou(CdmaProvider::new(constellation, cfg)?),
            Constellation::Glonass => Provider::Glonass(GlonassProvider::new(cfg)),
        })
    }

    pub fn constellation(&self) -> Constellation {
        match self {
            Provider::Gps(_) => Constellation::Gps,
            Provider::Galileo(_) => Constellation::Galileo,
            Provider::Beidou(_) => Constellation::Beidou,
            Provider::Glonass(_) => Constellation::Glonass,
        }
    }

    pub fn carrier_frequency_hz(&self) -> f64 {
        self.constellation().carrier_hz()
    }

    pub fn set_frequency_offset(&mut self, offset_hz: f64) {
        match self {
            Provider::Gps(p) | Provider::Galileo(p) | Provider::Beidou(p) => {
                p.set_frequency_offset(offset_hz)
            }
            Provider::Glonass(p) => p.set_frequency_offset(offset_hz),
        }
    }

    pub fn frequency_offset_hz(&self) -> f64 {
        match self {
            Provider::Gps(p) | Provider::Galileo(p) | Provider::Beidou(p) => p.frequency_offset_hz(),
            Provider::Glonass(p) => p.frequency_offset_hz(),
        }
    }

    /// Loads ephemeris and returns the number of active satellites. On error
    /// every satellite is deactivated and the provider stays not ready.
    pub fn load_ephemeris(&mut self, source: &EphemerisSource) -> Result<usize, GnssError> {
        let constellation = self.constellation();
        match source.load(constellation) {
            Ok(set) => {
                let active = self.apply_ephemeris(Some(set));
                info!(
                    constellation = %constellation,
                    source = %source.describe(),
                    active,
                    "ephemeris loaded"
                );
                Ok(active)
            }
            Err(e) => {
                self.apply_ephemeris(None);
                Err(e)
            }
        }
    }

    fn apply_ephemeris(&mut self, set: Option<EphemerisSet>) -> usize {
        match self {
            Provider::Gps(p) | Provider::Galileo(p) | Provider::Beidou(p) => p.apply_ephemeris(set),
            Provider::Glonass(p) => p.apply_ephemeris(set),
        }
    }

    pub fn is_ready(&self) -> bool {
        match self {
            Provider::Gps(p) | Provider::Galileo(p) | Provider::Beidou(p) => p.is_ready(),
            Provider::Glonass(p) => p.is_ready(),
        }
    }

    pub fn active_count(&self) -> usize {
        match self {
            Provider::Gps(p) | Provider::Galileo(p) | Provider::Beidou(p) => p.active_count(),
            Provider::Glonass(p) => p.active_count(),
        }
    }

    /// One chunk of `n` samples starting at simulation time `time_s`.
    pub fn produce_chunk(&mut self, time_s: f64, n: usize) -> Result<SampleBlock, GnssError> {
        let block = match self {
            Provider::Gps(p) | Provider::Galileo(p) | Provider::Beidou(p) => {
                p.produce_chunk(time_s, n)
            }
            Provider::Glonass(p) => p.produce_chunk(time_s, n),
        }?;
        debug!(constellation = %self.constellation(), time_s, n, "chunk produced");
        Ok(block)
    }

    pub fn satellites(&self) -> Vec<SatelliteInfo> {
        match self {
            Provider::Gps(p) | Provider::Galileo(p) | Provider::Beidou(p) => p.satellites(),
            Provider::Glonass(p) => p.satellites(),
        }
    }
}

#[cfg(test)]
mod tests;
