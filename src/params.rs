use crate::constellation::Constellation;
use crate::error::GnssError;
use anyhow::Context;
use serde::Deserialize;
use std::time::Duration;

/// How provider offsets are placed relative to the master center frequency.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FrequencyPlan {
    /// `carrier - center`, shifted up so the lowest constellation sits at 0 Hz
    /// whenever any offset would be negative.
    #[default]
    LowestAtZero,
    /// Plain `carrier - center`.
    Centered,
}

#[derive(Clone, Debug, PartialEq)]
pub struct ConstellationParams {
    pub enabled: bool,
    /// Relative power multiplier applied to every satellite amplitude.
    pub weight: f64,
    /// Number of default-active satellites (GLONASS: frequency slots).
    pub satellites: usize,
    /// Ephemeris file; `None` means nominal records.
    pub ephemeris: Option<String>,
}

impl ConstellationParams {
    fn with(weight: f64, satellites: usize) -> Self {
        Self {
            enabled: true,
            weight,
            satellites,
            ephemeris: None,
        }
    }

    fn merge(&mut self, table: ConstellationTable) {
        if let Some(v) = table.enabled {
            self.enabled = v;
        }
        if let Some(v) = table.weight {
            self.weight = v;
        }
        if let Some(v) = table.satellites {
            self.satellites = v;
        }
        if table.ephemeris.is_some() {
            self.ephemeris = table.ephemeris;
        }
    }
}

/// Run-wide parameters, created once and only read afterwards.
///
/// Deserialized keys are laid over [`GlobalConfig::default`], per
/// constellation table as well, so a table naming only `ephemeris` keeps
/// that constellation's default weight and satellite count.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(from = "ConfigFile")]
pub struct GlobalConfig {
    pub sample_rate_hz: f64,
    pub center_frequency_hz: f64,
    pub chunk_duration_s: f64,
    pub bits_per_sample: u32,
    /// Sleep between chunks, for consumers that cannot take data at full rate.
    pub pacing_ms: u64,
    pub frequency_plan: FrequencyPlan,

    pub gps: ConstellationParams,
    pub glonass: ConstellationParams,
    pub galileo: ConstellationParams,
    pub beidou: ConstellationParams,
}

impl Default for GlobalConfig {
    fn default() -> Self {
        Self {
            sample_rate_hz: 60.0e6,
            center_frequency_hz: 1_581.5e6,
            chunk_duration_s: 0.01,
            bits_per_sample: 16,
            pacing_ms: 0,
            frequency_plan: FrequencyPlan::LowestAtZero,
            gps: ConstellationParams::with(1.0, 8),
            glonass: ConstellationParams::with(0.8, 8),
            galileo: ConstellationParams::with(1.0, 6),
            beidou: ConstellationParams::with(1.0, 5),
        }
    }
}

/// One `[gps]`-style table as written in the file.
#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct ConstellationTable {
    enabled: Option<bool>,
    weight: Option<f64>,
    satellites: Option<usize>,
    ephemeris: Option<String>,
}

/// File layout; every key optional.
#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct ConfigFile {
    sample_rate_hz: Option<f64>,
    center_frequency_hz: Option<f64>,
    chunk_duration_s: Option<f64>,
    bits_per_sample: Option<u32>,
    pacing_ms: Option<u64>,
    frequency_plan: Option<FrequencyPlan>,
    gps: ConstellationTable,
    glonass: ConstellationTable,
    galileo: ConstellationTable,
    beidou: ConstellationTable,
}

impl From<ConfigFile> for GlobalConfig {
    fn from(file: ConfigFile) -> Self {
        let mut cfg = GlobalConfig::default();
        if let Some(v) = file.sample_rate_hz {
            cfg.sample_rate_hz = v;
        }
        if let Some(v) = file.center_frequency_hz {
            cfg.center_frequency_hz = v;
        }
        if let Some(v) = file.chunk_duration_s {
            cfg.chunk_duration_s = v;
        }
        if let Some(v) = file.bits_per_sample {
            cfg.bits_per_sample = v;
        }
        if let Some(v) = file.pacing_ms {
            cfg.pacing_ms = v;
        }
        if let Some(v) = file.frequency_plan {
            cfg.frequency_plan = v;
        }
        cfg.gps.merge(file.gps);
        cfg.glonass.merge(file.glonass);
        cfg.galileo.merge(file.galileo);
        cfg.beidou.merge(file.beidou);
        cfg
    }
}

impl GlobalConfig {
    pub fn from_file(path: &str) -> anyhow::Result<Self> {
        let content =
            std::fs::read_to_string(path).with_context(|| format!("read config file {path}"))?;
        let cfg: GlobalConfig = toml::from_str(&content).context("parse config toml")?;
        Ok(cfg)
    }

    /// Configuration with exactly the listed constellations enabled, one
    /// active satellite each.
    pub fn single_satellite(enabled: &[Constellation]) -> Self {
        let mut cfg = Self::default();
        for c in Constellation::ALL {
            let p = cfg.constellation_mut(c);
            p.enabled = enabled.contains(&c);
            p.satellites = 1;
        }
        cfg
    }

    pub fn constellation(&self, c: Constellation) -> &ConstellationParams {
        match c {
            Constellation::Gps => &self.gps,
            Constellation::Glonass => &self.glonass,
            Constellation::Galileo => &self.galileo,
            Constellation::Beidou => &self.beidou,
        }
    }

    pub fn constellation_mut(&mut self, c: Constellation) -> &mut ConstellationParams {
        match c {
            Constellation::Gps => &mut self.gps,
            Constellation::Glonass => &mut self.glonass,
            Constellation::Galileo => &mut self.galileo,
            Constellation::Beidou => &mut self.beidou,
        }
    }

    pub fn enabled_constellations(&self) -> Vec<Constellation> {
        Constellation::ALL
            .into_iter()
            .filter(|&c| self.constellation(c).enabled)
            .collect()
    }

    pub fn chunk_samples(&self) -> usize {
        (self.sample_rate_hz * self.chunk_duration_s).round() as usize
    }

    pub fn pacing(&self) -> Duration {
        Duration::from_millis(self.pacing_ms)
    }

    pub fn validate(&self) -> Result<(), GnssError> {
        if !(self.sample_rate_hz.is_finite() && self.sample_rate_hz > 0.0) {
            return Err(GnssError::config(format!(
                "sample rate must be positive, got {}",
                self.sample_rate_hz
            )));
        }
        if !(self.center_frequency_hz.is_finite() && self.center_frequency_hz > 0.0) {
            return Err(GnssError::config(format!(
                "center frequency must be positive, got {}",
                self.center_frequency_hz
            )));
        }
        if !(self.chunk_duration_s.is_finite() && self.chunk_duration_s > 0.0) {
            return Err(GnssError::config(format!(
                "chunk duration must be positive, got {}",
                self.chunk_duration_s
            )));
        }
        if self.chunk_samples() == 0 {
            return Err(GnssError::config("chunk duration yields zero samples"));
        }
        if self.bits_per_sample != 8 && self.bits_per_sample != 16 {
            return Err(GnssError::config(format!(
                "bits per sample must be 8 or 16, got {}",
                self.bits_per_sample
            )));
        }
        for c in Constellation::ALL {
            let w = self.constellation(c).weight;
            if !(w.is_finite() && w >= 0.0) {
                return Err(GnssError::config(format!("{c} weight must be >= 0, got {w}")));
            }
        }
        if self.enabled_constellations().is_empty() {
            return Err(GnssError::config("no constellation enabled"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let cfg = GlobalConfig::default();
        assert!(cfg.validate().is_ok());
        assert_eq!(cfg.chunk_samples(), 600_000);
        assert_eq!(cfg.enabled_constellations().len(), 4);
    }

    #[test]
    fn rejects_bad_parameters() {
        let mut cfg = GlobalConfig::default();
        cfg.sample_rate_hz = 0.0;
        assert!(matches!(cfg.validate(), Err(GnssError::Configuration(_))));

        let mut cfg = GlobalConfig::default();
        cfg.bits_per_sample = 12;
        assert!(cfg.validate().is_err());

        let cfg = GlobalConfig::single_satellite(&[]);
        assert_eq!(
            cfg.validate(),
            Err(GnssError::config("no constellation enabled"))
        );
    }

    #[test]
    fn parses_partial_toml() -> anyhow::Result<()> {
        let cfg: GlobalConfig = toml::from_str(
            r#"
            sample_rate_hz = 20e6
            frequency_plan = "centered"

            [glonass]
            enabled = false

            [gps]
            satellites = 3
            weight = 0.5
            ephemeris = "brdc0010.24n"
            "#,
        )?;
        let defaults = GlobalConfig::default();
        assert_eq!(cfg.sample_rate_hz, 20e6);
        assert_eq!(cfg.frequency_plan, FrequencyPlan::Centered);
        assert_eq!(cfg.center_frequency_hz, defaults.center_frequency_hz);
        assert!(!cfg.glonass.enabled);
        assert_eq!(cfg.glonass.weight, defaults.glonass.weight);
        assert_eq!(cfg.glonass.satellites, defaults.glonass.satellites);
        assert_eq!(cfg.gps.satellites, 3);
        assert_eq!(cfg.gps.weight, 0.5);
        assert_eq!(cfg.gps.ephemeris.as_deref(), Some("brdc0010.24n"));
        assert_eq!(cfg.beidou, defaults.beidou);
        assert_eq!(cfg.galileo, defaults.galileo);
        Ok(())
    }

    #[test]
    fn partial_tables_keep_run_defaults() -> anyhow::Result<()> {
        let cfg: GlobalConfig = toml::from_str(
            r#"
            [gps]
            ephemeris = "brdc.nav"

            [glonass]
            enabled = true
            "#,
        )?;
        let defaults = GlobalConfig::default();
        assert_eq!(cfg.gps.satellites, 8);
        assert_eq!(cfg.gps.weight, defaults.gps.weight);
        assert_eq!(cfg.gps.ephemeris.as_deref(), Some("brdc.nav"));
        assert_eq!(cfg.glonass, defaults.glonass);
        assert_eq!(cfg.glonass.weight, 0.8);
        Ok(())
    }

    #[test]
    fn empty_file_is_the_default_config() -> anyhow::Result<()> {
        let cfg: GlobalConfig = toml::from_str("")?;
        assert_eq!(cfg, GlobalConfig::default());
        Ok(())
    }

    #[test]
    fn unknown_keys_are_rejected() {
        assert!(toml::from_str::<GlobalConfig>("sample_rate = 1e6").is_err());
        assert!(toml::from_str::<GlobalConfig>("[gps]
sats = 3").is_err());
    }
}
