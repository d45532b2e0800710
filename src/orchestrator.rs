use crate::constellation::Constellation;
use crate::ephemeris::EphemerisSource;
use crate::error::GnssError;
use crate::params::{FrequencyPlan, GlobalConfig};
use crate::provider::{Provider, SatelliteInfo};
use crate::sample::{sum_saturating, SampleBlock};
use rayon::prelude::*;
use std::collections::HashMap;
use tracing::{debug, info, warn};

/// Offsets that place each carrier relative to `center_hz` under `plan`.
pub fn frequency_offsets(carriers: &[f64], center_hz: f64, plan: FrequencyPlan) -> Vec<f64> {
    let raw: Vec<f64> = carriers.iter().map(|c| c - center_hz).collect();
    match plan {
        FrequencyPlan::Centered => raw,
        FrequencyPlan::LowestAtZero => {
            let lowest = raw.iter().copied().fold(0.0f64, f64::min);
            raw.iter().map(|o| o - lowest).collect()
        }
    }
}

/// Owns the providers and sums their chunks into one stream.
pub struct SignalOrchestrator {
    config: GlobalConfig,
    providers: Vec<Provider>,
}

impl SignalOrchestrator {
    pub fn new(config: GlobalConfig) -> Result<Self, GnssError> {
        config.validate()?;
        Ok(Self {
            config,
            providers: Vec::new(),
        })
    }

    /// Orchestrator with one provider per enabled constellation.
    pub fn from_config(config: GlobalConfig) -> Result<Self, GnssError> {
        let mut orch = Self::new(config)?;
        for c in orch.config.enabled_constellations() {
            let p = Provider::new(c, &orch.config)?;
            orch.add_provider(p);
        }
        Ok(orch)
    }

    pub fn config(&self) -> &GlobalConfig {
        &self.config
    }

    /// Replaces any provider already registered for the same constellation.
    pub fn add_provider(&mut self, provider: Provider) {
        let c = provider.constellation();
        self.providers.retain(|p| p.constellation() != c);
        self.providers.push(provider);
    }

    pub fn providers(&self) -> &[Provider] {
        &self.providers
    }

    pub fn provider(&self, c: Constellation) -> Option<&Provider> {
        self.providers.iter().find(|p| p.constellation() == c)
    }

    /// Hands each provider its ephemeris and fixes the frequency plan.
    /// Providers without a source, or whose source fails to load, stay not
    /// ready and are skipped during generation. Returns the number of ready
    /// providers.
    pub fn initialize(
        &mut self,
        sources: &HashMap<Constellation, EphemerisSource>,
    ) -> Result<usize, GnssError> {
        for p in &mut self.providers {
            let c = p.constellation();
            let Some(src) = sources.get(&c) else {
                info!(constellation = %c, "no ephemeris source, provider disabled");
                continue;
            };
            if let Err(e) = p.load_ephemeris(src) {
                if !e.is_recoverable() {
                    return Err(e);
                }
                warn!(constellation = %c, error = %e, "ephemeris unavailable, provider disabled");
            }
        }

        // only ready providers take part in the plan, so an idle provider
        // cannot move the others
        let ready: Vec<usize> = (0..self.providers.len())
            .filter(|&i| self.providers[i].is_ready())
            .collect();
        let carriers: Vec<f64> = ready
            .iter()
            .map(|&i| self.providers[i].carrier_frequency_hz())
            .collect();
        let offsets = frequency_offsets(
            &carriers,
            self.config.center_frequency_hz,
            self.config.frequency_plan,
        );
        for (&i, offset) in ready.iter().zip(offsets) {
            let p = &mut self.providers[i];
            p.set_frequency_offset(offset);
            info!(
                constellation = %p.constellation(),
                offset_hz = offset,
                active = p.active_count(),
                "provider placed"
            );
            if offset.abs() > self.config.sample_rate_hz / 2.0 {
                warn!(
                    constellation = %p.constellation(),
                    offset_hz = offset,
                    "offset beyond Nyquist, signal will alias"
                );
            }
        }

        if ready.is_empty() {
            warn!("no provider is ready, output will be silent");
        }
        Ok(ready.len())
    }

    pub fn is_ready(&self) -> bool {
        self.providers.iter().any(Provider::is_ready)
    }

    pub fn produce_chunk(&mut self, time_s: f64) -> Result<SampleBlock, GnssError> {
        let n = self.config.chunk_samples();
        self.produce_samples(time_s, n)
    }

    /// Like [`produce_chunk`](Self::produce_chunk) with an explicit length.
    pub fn produce_samples(&mut self, time_s: f64, n: usize) -> Result<SampleBlock, GnssError> {
        let results: Vec<Result<SampleBlock, GnssError>> = self
            .providers
            .par_iter_mut()
            .filter(|p| p.is_ready())
            .map(|p| p.produce_chunk(time_s, n))
            .collect();

        let mut blocks = Vec::with_capacity(results.len());
        for r in results {
            match r {
                Ok(b) => blocks.push(b),
                Err(e) if e.is_recoverable() => debug!(error = %e, "provider skipped"),
                Err(e) => return Err(e),
            }
        }
        Ok(sum_saturating(n, &blocks))
    }

    /// Active satellites of every ready provider.
    pub fn satellites(&self) -> Vec<SatelliteInfo> {
        self.providers
            .iter()
            .filter(|p| p.is_ready())
            .flat_map(|p| p.satellites())
            .filter(|s| s.active)
            .collect()
    }
}
