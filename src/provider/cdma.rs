use super::{base_amplitude, nominal_power_dbm, quantize, SatelliteInfo};
use crate::codes::{BeidouCode, CdmaCode, ChipClock, GalileoCode, GpsCode};
use crate::constellation::Constellation;
use crate::ephemeris::{EphemerisRecord, EphemerisSet};
use crate::error::GnssError;
use crate::nco::{Nco, SineTable, PROVIDER_TABLE_BITS};
use crate::params::GlobalConfig;
use crate::sample::{sample_index, sum_saturating, SampleBlock};
use num_complex::{Complex, Complex32};
use rayon::prelude::*;

fn code_for(constellation: Constellation, prn: u8) -> Result<CdmaCode, GnssError> {
    Ok(match constellation {
        Constellation::Gps => CdmaCode::Gps(GpsCode::new(prn)?),
        Constellation::Galileo => CdmaCode::Galileo(GalileoCode::new(prn)?),
        Constellation::Beidou => CdmaCode::Beidou(BeidouCode::new(prn)?),
        Constellation::Glonass => {
            return Err(GnssError::config("GLONASS is not a code-division provider"))
        }
    })
}

#[derive(Clone, Debug)]
pub struct CdmaSatellite {
    prn: u8,
    code: CdmaCode,
    clock: ChipClock,
    chip: i8,
    amplitude: f32,
    power_dbm: f64,
    default_active: bool,
    active: bool,
    doppler_hz: f64,
    doppler: Nco,
    record: Option<EphemerisRecord>,
}

impl CdmaSatellite {
    pub fn prn(&self) -> u8 {
        self.prn
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    fn render(&mut self, n0: u64, n: usize) -> Vec<Complex<i32>> {
        let mut buf = Vec::with_capacity(n);
        for idx in n0..n0 + n as u64 {
            if self.clock.tick(idx) {
                self.chip = self.code.next_chip();
            }
            let sym = self.chip * self.code.subcarrier(self.clock.position(idx));
            buf.push(Complex32::new(sym as f32 * self.amplitude, 0.0));
        }
        self.doppler.configure(self.doppler_hz);
        self.doppler.rotate(&mut buf);
        quantize(&buf)
    }
}

/// Shared shape of the GPS, Galileo and BeiDou providers.
pub struct CdmaProvider {
    constellation: Constellation,
    sample_rate_hz: f64,
    offset_hz: f64,
    nco: Nco,
    satellites: Vec<CdmaSatellite>,
    ephemeris: Option<EphemerisSet>,
}

impl CdmaProvider {
    pub fn new(constellation: Constellation, cfg: &GlobalConfig) -> Result<Self, GnssError> {
        let params = cfg.constellation(constellation);
        let fs = cfg.sample_rate_hz;
        let table = SineTable::new(PROVIDER_TABLE_BITS);
        let amplitude = base_amplitude(constellation) * params.weight as f32;

        let mut satellites = Vec::new();
        for (i, prn) in constellation.id_range().enumerate() {
            let code = code_for(constellation, prn)?;
            satellites.push(CdmaSatellite {
                prn,
                clock: ChipClock::new(code.chip_rate_hz(), fs),
                code,
                chip: 1,
                amplitude,
                power_dbm: nominal_power_dbm(constellation),
                default_active: i < params.satellites,
                active: false,
                doppler_hz: 0.0,
                doppler: Nco::with_table(fs, table.clone()),
                record: None,
            });
        }

        Ok(Self {
            constellation,
            sample_rate_hz: fs,
            offset_hz: 0.0,
            nco: Nco::with_table(fs, table),
            satellites,
            ephemeris: None,
        })
    }

    pub fn constellation(&self) -> Constellation {
        self.constellation
    }

    pub fn set_frequency_offset(&mut self, offset_hz: f64) {
        self.offset_hz = offset_hz;
        self.nco.configure(offset_hz);
    }

    pub fn frequency_offset_hz(&self) -> f64 {
        self.offset_hz
    }

    pub(super) fn apply_ephemeris(&mut self, set: Option<EphemerisSet>) -> usize {
        for sat in &mut self.satellites {
            sat.record = set.as_ref().and_then(|s| s.get(sat.prn)).cloned();
            sat.active = sat.default_active && sat.record.as_ref().is_some_and(|r| r.healthy);
            sat.doppler_hz = 0.0;
        }
        self.ephemeris = set;
        self.active_count()
    }

    pub fn active_count(&self) -> usize {
        self.satellites.iter().filter(|s| s.active).count()
    }

    pub fn is_ready(&self) -> bool {
        self.ephemeris.is_some() && self.active_count() > 0
    }

    fn check_ready(&self) -> Result<(), GnssError> {
        let reason = if self.ephemeris.is_none() {
            "no ephemeris loaded"
        } else if self.active_count() == 0 {
            "no active satellites"
        } else {
            return Ok(());
        };
        Err(GnssError::NotReady {
            constellation: self.constellation,
            reason,
        })
    }

    pub fn produce_chunk(&mut self, time_s: f64, n: usize) -> Result<SampleBlock, GnssError> {
        self.check_ready()?;
        let n0 = sample_index(time_s, self.sample_rate_hz);
        let carrier = self.constellation.carrier_hz();

        let parts: Vec<Vec<Complex<i32>>> = self
            .satellites
            .par_iter_mut()
            .filter(|s| s.active)
            .map(|s| {
                s.doppler_hz = s
                    .record
                    .as_ref()
                    .map_or(0.0, |r| r.doppler_hz(time_s, carrier));
                s.render(n0, n)
            })
            .collect();

        let mut block = sum_saturating(n, &parts);
        self.nco.mix(&mut block);
        Ok(block)
    }

    pub fn satellites(&self) -> Vec<SatelliteInfo> {
        let carrier = self.constellation.carrier_hz();
        self.satellites
            .iter()
            .map(|s| SatelliteInfo {
                constellation: self.constellation,
                id: s.prn,
                freq_channel: None,
                frequency_hz: carrier + s.doppler_hz,
                offset_hz: self.offset_hz,
                power_dbm: s.power_dbm,
                doppler_hz: s.doppler_hz,
                active: s.active,
            })
            .collect()
    }
}
