//! Broadcast ephemeris records and the minimal RINEX navigation reader that
//! feeds them to the providers.
//!
//! Simulation time zero is taken as each record's reference epoch, so Doppler
//! is evaluated at `toe + t`.

use crate::constellation::Constellation;
use crate::error::GnssError;
use anyhow::Context;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

pub const SPEED_OF_LIGHT_MPS: f64 = 299_792_458.0;
/// WGS-84 value used by IS-GPS-200.
pub const GM_EARTH: f64 = 3.986005e14;

#[derive(Clone, Debug, Default, PartialEq)]
pub struct KeplerianOrbit {
    pub toe_s: f64,
    pub sqrt_a: f64,
    pub e: f64,
    pub m0: f64,
    pub delta_n: f64,
    pub i0: f64,
    pub omega0: f64,
    pub omega: f64,
    pub omega_dot: f64,
    pub idot: f64,
    pub crs: f64,
    pub crc: f64,
    pub cus: f64,
    pub cuc: f64,
    pub cis: f64,
    pub cic: f64,
    pub af0: f64,
    pub af1: f64,
    pub af2: f64,
}

impl KeplerianOrbit {
    fn true_anomaly(&self, dt: f64) -> f64 {
        let a = self.sqrt_a * self.sqrt_a;
        let n = (GM_EARTH / (a * a * a)).sqrt() + self.delta_n;
        let m = self.m0 + n * dt;
        let mut ecc = m;
        for _ in 0..10 {
            ecc = m + self.e * ecc.sin();
        }
        let (s, c) = (ecc / 2.0).sin_cos();
        2.0 * ((1.0 + self.e).sqrt() * s).atan2((1.0 - self.e).sqrt() * c)
    }

    /// Geocentric range rate (m/s) at `dt` seconds past the reference epoch.
    pub fn radial_velocity_mps(&self, dt: f64) -> f64 {
        let a = self.sqrt_a * self.sqrt_a;
        if a <= 0.0 || !(0.0..1.0).contains(&self.e) {
            return 0.0;
        }
        let p = a * (1.0 - self.e * self.e);
        (GM_EARTH / p).sqrt() * self.e * self.true_anomaly(dt).sin()
    }
}

/// GLONASS-style PZ-90 state vector (meters, m/s, m/s^2).
#[derive(Clone, Debug, Default, PartialEq)]
pub struct StateVector {
    pub position_m: [f64; 3],
    pub velocity_mps: [f64; 3],
    pub acceleration_mps2: [f64; 3],
    /// Frequency channel number `k`, when broadcast.
    pub freq_channel: Option<i8>,
}

impl StateVector {
    pub fn radial_velocity_mps(&self, dt: f64) -> f64 {
        let mut pos = [0.0; 3];
        let mut vel = [0.0; 3];
        for i in 0..3 {
            let acc = self.acceleration_mps2[i];
            pos[i] = self.position_m[i] + self.velocity_mps[i] * dt + 0.5 * acc * dt * dt;
            vel[i] = self.velocity_mps[i] + acc * dt;
        }
        let r = pos.iter().map(|x| x * x).sum::<f64>().sqrt();
        if r == 0.0 {
            return 0.0;
        }
        pos.iter().zip(&vel).map(|(p, v)| p * v).sum::<f64>() / r
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum Orbit {
    Keplerian(KeplerianOrbit),
    StateVector(StateVector),
}

#[derive(Clone, Debug, PartialEq)]
pub struct EphemerisRecord {
    pub id: u8,
    pub healthy: bool,
    pub orbit: Option<Orbit>,
}

impl EphemerisRecord {
    /// Healthy record without orbit data (zero Doppler).
    pub fn nominal(id: u8) -> Self {
        Self {
            id,
            healthy: true,
            orbit: None,
        }
    }

    pub fn freq_channel(&self) -> Option<i8> {
        match &self.orbit {
            Some(Orbit::StateVector(sv)) => sv.freq_channel,
            _ => None,
        }
    }

    /// Doppler shift seen from the Earth's center, for a signal at `carrier_hz`.
    pub fn doppler_hz(&self, t_s: f64, carrier_hz: f64) -> f64 {
        let v = match &self.orbit {
            Some(Orbit::Keplerian(k)) => k.radial_velocity_mps(t_s),
            Some(Orbit::StateVector(sv)) => sv.radial_velocity_mps(t_s),
            None => 0.0,
        };
        if !v.is_finite() {
            return 0.0;
        }
        -v * carrier_hz / SPEED_OF_LIGHT_MPS
    }
}

/// Records for one constellation, keyed by satellite identifier.
#[derive(Clone, Debug, PartialEq)]
pub struct EphemerisSet {
    constellation: Constellation,
    records: BTreeMap<u8, EphemerisRecord>,
}

impl EphemerisSet {
    pub fn new(constellation: Constellation) -> Self {
        Self {
            constellation,
            records: BTreeMap::new(),
        }
    }

    pub fn nominal(constellation: Constellation) -> Self {
        let mut set = Self::new(constellation);
        for id in constellation.id_range() {
            set.insert(EphemerisRecord::nominal(id));
        }
        set
    }

    pub fn constellation(&self) -> Constellation {
        self.constellation
    }

    /// Later records for the same satellite replace earlier ones.
    pub fn insert(&mut self, rec: EphemerisRecord) {
        self.records.insert(rec.id, rec);
    }

    pub fn get(&self, id: u8) -> Option<&EphemerisRecord> {
        self.records.get(&id)
    }

    /// Record broadcasting frequency channel `k`.
    pub fn by_channel(&self, k: i8) -> Option<&EphemerisRecord> {
        self.records.values().find(|r| r.freq_channel() == Some(k))
    }

    pub fn iter(&self) -> impl Iterator<Item = &EphemerisRecord> {
        self.records.values()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Where a provider gets its ephemeris from.
#[derive(Clone, Debug)]
pub enum EphemerisSource {
    Rinex(PathBuf),
    Records(EphemerisSet),
    /// Healthy, orbit-less records for every satellite of the constellation.
    Nominal,
}

impl EphemerisSource {
    pub fn describe(&self) -> String {
        match self {
            EphemerisSource::Rinex(p) => p.display().to_string(),
            EphemerisSource::Records(_) => "<records>".to_string(),
            EphemerisSource::Nominal => "<nominal>".to_string(),
        }
    }

    pub fn load(&self, constellation: Constellation) -> Result<EphemerisSet, GnssError> {
        let load_err = |message: String| GnssError::EphemerisLoad {
            constellation,
            path: self.describe(),
            message,
        };
        match self {
            EphemerisSource::Nominal => Ok(EphemerisSet::nominal(constellation)),
            EphemerisSource::Records(set) if set.constellation() == constellation => {
                Ok(set.clone())
            }
            EphemerisSource::Records(set) => Err(load_err(format!(
                "records are for {}",
                set.constellation()
            ))),
            EphemerisSource::Rinex(path) => {
                read_rinex_nav(path, constellation).map_err(|e| load_err(format!("{e:#}")))
            }
        }
    }
}

pub fn read_rinex_nav(path: &Path, constellation: Constellation) -> anyhow::Result<EphemerisSet> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("read navigation file {}", path.display()))?;
    parse_rinex_nav(&text, constellation)
}

struct Header {
    version: f64,
    /// System of a version 2 file (`N` = GPS, `G` = GLONASS).
    v2_system: Option<Constellation>,
    body_start: usize,
}

fn parse_header(lines: &[&str]) -> anyhow::Result<Header> {
    let mut version = None;
    let mut v2_system = None;
    for (i, line) in lines.iter().enumerate() {
        let label = line.get(60..).unwrap_or("").trim();
        if label == "RINEX VERSION / TYPE" {
            let v: f64 = column(line, 0, 9)
                .trim()
                .parse()
                .with_context(|| format!("bad RINEX version on line {}", i + 1))?;
            version = Some(v);
            v2_system = match column(line, 20, 1) {
                "N" => Some(Constellation::Gps),
                "G" => Some(Constellation::Glonass),
                _ => None,
            };
        } else if label == "END OF HEADER" {
            let Some(version) = version else {
                anyhow::bail!("missing RINEX VERSION / TYPE header");
            };
            return Ok(Header {
                version,
                v2_system,
                body_start: i + 1,
            });
        }
    }
    anyhow::bail!("missing END OF HEADER")
}

fn column(line: &str, start: usize, len: usize) -> &str {
    let end = (start + len).min(line.len());
    line.get(start..end).unwrap_or("")
}

/// Fortran-style float; blank fields read as zero.
fn parse_field(s: &str) -> anyhow::Result<f64> {
    let t = s.trim();
    if t.is_empty() {
        return Ok(0.0);
    }
    let t = t.replace(['D', 'd'], "E");
    t.parse::<f64>()
        .with_context(|| format!("bad numeric field {s:?}"))
}

/// Record layout: the first line's numeric fields start at `first`, the
/// continuation lines' at `cont`; each field is 19 characters wide.
struct Layout {
    first: usize,
    cont: usize,
}

impl Layout {
    fn fields(&self, block: &[&str], line_no: usize) -> anyhow::Result<Vec<[f64; 4]>> {
        let mut out = Vec::with_capacity(block.len());
        for (j, line) in block.iter().enumerate() {
            let (start, n) = if j == 0 { (self.first, 3) } else { (self.cont, 4) };
            let mut f = [0.0; 4];
            for (k, slot) in f.iter_mut().take(n).enumerate() {
                *slot = parse_field(column(line, start + 19 * k, 19))
                    .with_context(|| format!("line {}", line_no + j))?;
            }
            out.push(f);
        }
        Ok(out)
    }
}

fn keplerian_record(id: u8, f: &[[f64; 4]]) -> EphemerisRecord {
    let orbit = KeplerianOrbit {
        af0: f[0][0],
        af1: f[0][1],
        af2: f[0][2],
        crs: f[1][1],
        delta_n: f[1][2],
        m0: f[1][3],
        cuc: f[2][0],
        e: f[2][1],
        cus: f[2][2],
        sqrt_a: f[2][3],
        toe_s: f[3][0],
        cic: f[3][1],
        omega0: f[3][2],
        cis: f[3][3],
        i0: f[4][0],
        crc: f[4][1],
        omega: f[4][2],
        omega_dot: f[4][3],
        idot: f[5][0],
    };
    EphemerisRecord {
        id,
        healthy: f[6][1] == 0.0,
        orbit: Some(Orbit::Keplerian(orbit)),
    }
}

fn state_vector_record(id: u8, f: &[[f64; 4]]) -> EphemerisRecord {
    let km = 1_000.0;
    let sv = StateVector {
        position_m: [f[1][0] * km, f[2][0] * km, f[3][0] * km],
        velocity_mps: [f[1][1] * km, f[2][1] * km, f[3][1] * km],
        acceleration_mps2: [f[1][2] * km, f[2][2] * km, f[3][2] * km],
        freq_channel: Some(f[2][3].round() as i8),
    };
    EphemerisRecord {
        id,
        healthy: f[1][3] == 0.0,
        orbit: Some(Orbit::StateVector(sv)),
    }
}

fn record_lines(system: char) -> usize {
    match system {
        'R' | 'S' => 4,
        _ => 8,
    }
}

/// Navigation-message subset: version 2 GPS or GLONASS files and version 3
/// files with G/E/C (Keplerian) and R (state vector) records. Records for
/// other systems are skipped.
pub fn parse_rinex_nav(text: &str, constellation: Constellation) -> anyhow::Result<EphemerisSet> {
    let lines: Vec<&str> = text.lines().collect();
    let header = parse_header(&lines)?;
    let v3 = header.version >= 3.0;
    if !v3 && header.v2_system != Some(constellation) {
        anyhow::bail!(
            "version {} file does not carry {constellation} records",
            header.version
        );
    }
    let target = constellation.rinex_letter();
    let layout = if v3 {
        Layout { first: 23, cont: 4 }
    } else {
        Layout { first: 22, cont: 3 }
    };

    let mut set = EphemerisSet::new(constellation);
    let mut i = header.body_start;
    while i < lines.len() {
        let line = lines[i];
        if line.trim().is_empty() {
            i += 1;
            continue;
        }
        let (system, id_col) = if v3 {
            (line.chars().next().unwrap_or(' '), column(line, 1, 2))
        } else {
            (target, column(line, 0, 2))
        };
        let n = record_lines(system);
        if i + n > lines.len() {
            anyhow::bail!("truncated record starting on line {}", i + 1);
        }
        if system == target {
            let id: u8 = id_col
                .trim()
                .parse()
                .with_context(|| format!("bad satellite number on line {}", i + 1))?;
            let fields = layout.fields(&lines[i..i + n], i + 1)?;
            let rec = if system == 'R' {
                state_vector_record(id, &fields)
            } else {
                keplerian_record(id, &fields)
            };
            set.insert(rec);
        }
        i += n;
    }

    if set.is_empty() {
        anyhow::bail!("no {constellation} records found");
    }
    Ok(set)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn header(version: &str, kind: &str, system: &str) -> String {
        format!(
            "{version:>9}{:11}{kind:<20}{system:<20}RINEX VERSION / TYPE\n{:60}END OF HEADER\n",
            "", ""
        )
    }

    fn line(head: &str, vals: &[f64]) -> String {
        let mut s = head.to_string();
        for v in vals {
            s.push_str(&format!("{v:19.12E}"));
        }
        s.push('\n');
        s
    }

    fn kepler_block(head: &str, cont: &str, sqrt_a: f64, e: f64, health: f64) -> String {
        let mut s = line(head, &[1.0e-5, 0.0, 0.0]);
        s += &line(cont, &[12.0, -20.0, 4.5e-9, 0.3]);
        s += &line(cont, &[1.0e-6, e, 2.0e-6, sqrt_a]);
        s += &line(cont, &[0.0, 1.0e-8, 1.2, -2.0e-8]);
        s += &line(cont, &[0.96, 250.0, 0.5, -8.0e-9]);
        s += &line(cont, &[1.0e-10, 1.0, 2300.0, 0.0]);
        s += &line(cont, &[2.0, health, 0.0, 12.0]);
        s += &line(cont, &[0.0, 4.0]);
        s
    }

    fn glonass_block(head: &str, k: f64, health: f64) -> String {
        let cont = "    ";
        let mut s = line(head, &[1.0e-5, 0.0, 0.0]);
        s += &line(cont, &[12_000.0, 1.5, 0.0, health]);
        s += &line(cont, &[-15_000.0, 2.0, 0.0, k]);
        s += &line(cont, &[18_000.0, 0.5, 0.0, 0.0]);
        s
    }

    #[test]
    fn parses_mixed_version3_file() -> anyhow::Result<()> {
        let mut text = header("3.04", "N: GNSS NAV DATA", "M: MIXED");
        text += &kepler_block("G05 2024 01 01 00 00 00", "    ", 5153.6, 0.01, 0.0);
        text += &kepler_block("E11 2024 01 01 00 00 00", "    ", 5440.6, 0.0002, 0.0);
        text += &kepler_block("C07 2024 01 01 00 00 00", "    ", 6493.4, 0.003, 1.0);
        text += &glonass_block("R03 2024 01 01 00 15 00", 5.0, 0.0);

        let gps = parse_rinex_nav(&text, Constellation::Gps)?;
        assert_eq!(gps.len(), 1);
        let rec = gps.get(5).ok_or_else(|| anyhow::anyhow!("missing G05"))?;
        assert!(rec.healthy);
        match &rec.orbit {
            Some(Orbit::Keplerian(k)) => {
                assert_eq!(k.sqrt_a, 5153.6);
                assert_eq!(k.e, 0.01);
                assert_eq!(k.m0, 0.3);
            }
            other => panic!("unexpected orbit {other:?}"),
        }

        let bds = parse_rinex_nav(&text, Constellation::Beidou)?;
        assert!(!bds.get(7).map(|r| r.healthy).unwrap_or(true));

        let glo = parse_rinex_nav(&text, Constellation::Glonass)?;
        let r3 = glo.get(3).ok_or_else(|| anyhow::anyhow!("missing R03"))?;
        assert_eq!(r3.freq_channel(), Some(5));
        assert_eq!(glo.by_channel(5).map(|r| r.id), Some(3));
        Ok(())
    }

    #[test]
    fn parses_version2_gps_with_d_exponents() -> anyhow::Result<()> {
        let mut text = header("2.11", "N: GPS NAV DATA", "");
        let block = kepler_block(" 1 24  1  1  0  0  0.0", "   ", 5153.6, 0.01, 0.0);
        text += &block.replace('E', "D");
        let set = parse_rinex_nav(&text, Constellation::Gps)?;
        assert_eq!(set.len(), 1);
        assert!(set.get(1).is_some());
        // a GPS file offers nothing to other systems
        assert!(parse_rinex_nav(&text, Constellation::Galileo).is_err());
        Ok(())
    }

    #[test]
    fn rejects_truncated_and_headerless_input() {
        let mut text = header("3.04", "N: GNSS NAV DATA", "G: GPS");
        text += &line("G01 2024 01 01 00 00 00", &[0.0, 0.0, 0.0]);
        assert!(parse_rinex_nav(&text, Constellation::Gps).is_err());
        assert!(parse_rinex_nav("garbage\n", Constellation::Gps).is_err());
    }

    #[test]
    fn missing_file_is_an_ephemeris_load_error() {
        let src = EphemerisSource::Rinex(PathBuf::from("/nonexistent/brdc.nav"));
        match src.load(Constellation::Galileo) {
            Err(GnssError::EphemerisLoad { constellation, .. }) => {
                assert_eq!(constellation, Constellation::Galileo)
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn records_for_another_constellation_are_rejected() {
        let src = EphemerisSource::Records(EphemerisSet::nominal(Constellation::Gps));
        assert!(src.load(Constellation::Beidou).is_err());
        assert!(src.load(Constellation::Gps).is_ok());
    }

    #[test]
    fn nominal_records_have_zero_doppler() {
        let set = EphemerisSet::nominal(Constellation::Beidou);
        assert_eq!(set.len(), 37);
        assert!(set.iter().all(|r| r.healthy && r.doppler_hz(12.0, 1.5e9) == 0.0));
    }

    #[test]
    fn receding_satellite_has_negative_doppler() {
        let orbit = KeplerianOrbit {
            sqrt_a: 5153.6,
            e: 0.02,
            m0: 1.0,
            ..Default::default()
        };
        let rec = EphemerisRecord {
            id: 1,
            healthy: true,
            orbit: Some(Orbit::Keplerian(orbit)),
        };
        let d = rec.doppler_hz(0.0, 1_575.42e6);
        // past perigee the range grows
        assert!(d < 0.0 && d > -2_000.0, "doppler {d}");
    }

    #[test]
    fn state_vector_range_rate() {
        let sv = StateVector {
            position_m: [20_000e3, 0.0, 0.0],
            velocity_mps: [100.0, 3_000.0, 0.0],
            ..Default::default()
        };
        assert!((sv.radial_velocity_mps(0.0) - 100.0).abs() < 1e-9);
    }
}
