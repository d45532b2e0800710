//! Chunk-at-a-time generation loop feeding an [`IqWriter`].

use crate::orchestrator::SignalOrchestrator;
use crate::sample::IqWriter;
use anyhow::Context;
use std::io::Write;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{error, info};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LoopState {
    Running,
    Stopped,
}

#[derive(Clone, Debug, Default)]
pub struct LoopOptions {
    /// Stop after this many chunks.
    pub max_chunks: Option<u64>,
    /// Sleep between chunks.
    pub pacing: Duration,
    pub start_time_s: f64,
}

#[derive(Clone, Debug, PartialEq)]
pub struct LoopSummary {
    pub chunks: u64,
    pub samples: u64,
    pub sim_time_s: f64,
    pub state: LoopState,
}

pub struct GenerationLoop<W: Write> {
    orchestrator: SignalOrchestrator,
    writer: IqWriter<W>,
    options: LoopOptions,
    stop: Arc<AtomicBool>,
    state: LoopState,
    chunks: u64,
    next_status_s: f64,
}

impl<W: Write> GenerationLoop<W> {
    pub fn new(orchestrator: SignalOrchestrator, writer: IqWriter<W>, options: LoopOptions) -> Self {
        let next_status_s = options.start_time_s + 1.0;
        Self {
            orchestrator,
            writer,
            options,
            stop: Arc::new(AtomicBool::new(false)),
            state: LoopState::Running,
            chunks: 0,
            next_status_s,
        }
    }

    /// Flag that ends the loop before the next chunk once set.
    pub fn stop_handle(&self) -> Arc<AtomicBool> {
        self.stop.clone()
    }

    pub fn state(&self) -> LoopState {
        self.state
    }

    pub fn sim_time_s(&self) -> f64 {
        self.options.start_time_s + self.chunks as f64 * self.orchestrator.config().chunk_duration_s
    }

    pub fn summary(&self) -> LoopSummary {
        LoopSummary {
            chunks: self.chunks,
            samples: self.writer.samples_written(),
            sim_time_s: self.sim_time_s(),
            state: self.state,
        }
    }

    fn should_stop(&self) -> bool {
        if self.stop.load(Ordering::SeqCst) {
            return true;
        }
        self.options.max_chunks.is_some_and(|m| self.chunks >= m)
    }

    /// Produces and writes one chunk. Returns `false` once stopped.
    pub fn step(&mut self) -> anyhow::Result<bool> {
        if self.state == LoopState::Stopped {
            return Ok(false);
        }
        if self.should_stop() {
            self.halt()?;
            return Ok(false);
        }

        let t = self.sim_time_s();
        let result = self
            .orchestrator
            .produce_chunk(t)
            .with_context(|| format!("chunk at t={t:.3}s"))
            .and_then(|block| {
                self.writer
                    .write_block(&block)
                    .context("write sample chunk")
            });
        if let Err(e) = result {
            error!(error = %format!("{e:#}"), "generation failed, stopping");
            if let Err(flush) = self.halt() {
                error!(error = %flush, "flush after failure");
            }
            return Err(e);
        }
        self.chunks += 1;

        let now = self.sim_time_s();
        if now + 1e-9 >= self.next_status_s {
            info!(
                sim_time_s = now,
                chunks = self.chunks,
                samples = self.writer.samples_written(),
                "generating"
            );
            self.next_status_s += 1.0;
        }
        Ok(true)
    }

    fn halt(&mut self) -> anyhow::Result<()> {
        self.state = LoopState::Stopped;
        self.writer.flush().context("flush output")
    }

    /// Runs until stopped, the chunk limit is reached, or a chunk fails.
    pub fn run(&mut self) -> anyhow::Result<LoopSummary> {
        info!(
            sample_rate_hz = self.orchestrator.config().sample_rate_hz,
            chunk_samples = self.orchestrator.config().chunk_samples(),
            "generation started"
        );
        let started = Instant::now();
        while self.step()? {
            if !self.options.pacing.is_zero() {
                std::thread::sleep(self.options.pacing);
            }
        }
        let summary = self.summary();
        info!(
            chunks = summary.chunks,
            samples = summary.samples,
            sim_time_s = summary.sim_time_s,
            wall_s = started.elapsed().as_secs_f64(),
            "generation stopped"
        );
        Ok(summary)
    }

    pub fn into_parts(self) -> (SignalOrchestrator, IqWriter<W>) {
        (self.orchestrator, self.writer)
    }
}
