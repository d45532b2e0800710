use anyhow::Context;
use clap::Parser;
use quad_gnss::constellation::Constellation;
use quad_gnss::ephemeris::EphemerisSource;
use quad_gnss::generator::{GenerationLoop, LoopOptions};
use quad_gnss::orchestrator::SignalOrchestrator;
use quad_gnss::params::{FrequencyPlan, GlobalConfig};
use quad_gnss::sample::{IqWriter, SampleFormat};
use std::collections::HashMap;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::PathBuf;
use std::sync::atomic::Ordering;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(about = "Four-constellation GNSS baseband generator (GPS, GLONASS, Galileo, BeiDou)")]
struct Args {
    /// TOML configuration file. Flags below override its values.
    #[arg(long)]
    config: Option<String>,

    /// Output file for interleaved I/Q samples, `-` for stdout.
    #[arg(short, long, default_value = "-")]
    output: String,

    #[arg(long)]
    sample_rate_hz: Option<f64>,

    /// Master center frequency (Hz).
    #[arg(long)]
    center_hz: Option<f64>,

    /// Chunk duration (seconds).
    #[arg(long)]
    chunk_s: Option<f64>,

    /// Output bit depth per component: 16 or 8.
    #[arg(long)]
    bits: Option<u32>,

    /// Comma-separated constellations to enable, e.g. `gps,galileo`.
    #[arg(long)]
    constellations: Option<String>,

    /// Active satellites per enabled constellation.
    #[arg(long)]
    satellites: Option<usize>,

    /// Place offsets as plain `carrier - center` instead of lifting the lowest to 0 Hz.
    #[arg(long, default_value_t = false)]
    centered: bool,

    #[arg(long)]
    gps_eph: Option<String>,

    #[arg(long)]
    glonass_eph: Option<String>,

    #[arg(long)]
    galileo_eph: Option<String>,

    #[arg(long)]
    beidou_eph: Option<String>,

    /// Stop after N chunks (0 = run until interrupted).
    #[arg(long, default_value_t = 0)]
    chunks: u64,

    /// Sleep between chunks (milliseconds).
    #[arg(long)]
    pacing_ms: Option<u64>,

    /// Print the active satellites and exit.
    #[arg(long, default_value_t = false)]
    list: bool,
}

fn build_config(args: &Args) -> anyhow::Result<GlobalConfig> {
    let mut cfg = match &args.config {
        Some(path) => GlobalConfig::from_file(path)?,
        None => GlobalConfig::default(),
    };
    if let Some(v) = args.sample_rate_hz {
        cfg.sample_rate_hz = v;
    }
    if let Some(v) = args.center_hz {
        cfg.center_frequency_hz = v;
    }
    if let Some(v) = args.chunk_s {
        cfg.chunk_duration_s = v;
    }
    if let Some(v) = args.bits {
        cfg.bits_per_sample = v;
    }
    if let Some(v) = args.pacing_ms {
        cfg.pacing_ms = v;
    }
    if args.centered {
        cfg.frequency_plan = FrequencyPlan::Centered;
    }
    if let Some(list) = &args.constellations {
        let mut enabled = Vec::new();
        for name in list.split(',').filter(|s| !s.trim().is_empty()) {
            let c = Constellation::parse(name)
                .with_context(|| format!("unknown constellation {name:?}"))?;
            enabled.push(c);
        }
        for c in Constellation::ALL {
            cfg.constellation_mut(c).enabled = enabled.contains(&c);
        }
    }
    for (c, eph) in [
        (Constellation::Gps, &args.gps_eph),
        (Constellation::Glonass, &args.glonass_eph),
        (Constellation::Galileo, &args.galileo_eph),
        (Constellation::Beidou, &args.beidou_eph),
    ] {
        let p = cfg.constellation_mut(c);
        if let Some(path) = eph {
            p.ephemeris = Some(path.clone());
        }
        if let Some(n) = args.satellites {
            p.satellites = n;
        }
    }
    cfg.validate()?;
    Ok(cfg)
}

fn ephemeris_sources(cfg: &GlobalConfig) -> HashMap<Constellation, EphemerisSource> {
    cfg.enabled_constellations()
        .into_iter()
        .map(|c| {
            let src = match &cfg.constellation(c).ephemeris {
                Some(path) => EphemerisSource::Rinex(PathBuf::from(path)),
                None => {
                    warn!(constellation = %c, "no ephemeris file, using nominal records");
                    EphemerisSource::Nominal
                }
            };
            (c, src)
        })
        .collect()
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(io::stderr)
        .init();

    let args = Args::parse();
    let cfg = build_config(&args)?;

    let mut orch = SignalOrchestrator::from_config(cfg.clone())?;
    let ready = orch.initialize(&ephemeris_sources(&cfg))?;

    if args.list {
        for s in orch.satellites() {
            println!(
                "{:<8} id={:>2} k={:>3} f={:.3} MHz offset={:+.3} MHz doppler={:+.1} Hz power={} dBm",
                s.constellation.name(),
                s.id,
                s.freq_channel.map_or("-".to_string(), |k| k.to_string()),
                s.frequency_hz / 1e6,
                s.offset_hz / 1e6,
                s.doppler_hz,
                s.power_dbm,
            );
        }
        return Ok(());
    }
    if ready == 0 {
        anyhow::bail!("no constellation could be initialized");
    }

    let format = SampleFormat::from_bits(cfg.bits_per_sample)?;
    let sink: Box<dyn Write> = if args.output == "-" {
        Box::new(BufWriter::new(io::stdout().lock()))
    } else {
        let f = File::create(&args.output)
            .with_context(|| format!("create output file {}", args.output))?;
        Box::new(BufWriter::new(f))
    };
    info!(
        output = %args.output,
        bits = cfg.bits_per_sample,
        providers = ready,
        satellites = orch.satellites().len(),
        "starting"
    );

    let opts = LoopOptions {
        max_chunks: (args.chunks > 0).then_some(args.chunks),
        pacing: cfg.pacing(),
        start_time_s: 0.0,
    };
    let mut runner = GenerationLoop::new(orch, IqWriter::new(sink, format), opts);
    let stop = runner.stop_handle();
    ctrlc::set_handler(move || {
        stop.store(true, Ordering::SeqCst);
    })
    .context("install Ctrl-C handler")?;

    let summary = runner.run()?;
    let (_, writer) = runner.into_parts();
    writer.finish().context("flush output")?;
    info!(
        chunks = summary.chunks,
        samples = summary.samples,
        sim_time_s = summary.sim_time_s,
        "done"
    );
    Ok(())
}
