use super::*;
use crate::codes::{ChipClock, GlonassCode, GpsCode};
use crate::ephemeris::{EphemerisRecord, Orbit, StateVector};
use crate::sample::IqSample;

fn config(c: Constellation, satellites: usize, fs: f64) -> GlobalConfig {
    let mut cfg = GlobalConfig::single_satellite(&[c]);
    cfg.sample_rate_hz = fs;
    cfg.constellation_mut(c).satellites = satellites;
    cfg
}

fn ready(c: Constellation, satellites: usize, fs: f64) -> anyhow::Result<Provider> {
    let mut p = Provider::new(c, &config(c, satellites, fs))?;
    p.load_ephemeris(&EphemerisSource::Nominal)?;
    Ok(p)
}

fn glonass_record(id: u8, k: i8, healthy: bool) -> EphemerisRecord {
    EphemerisRecord {
        id,
        healthy,
        orbit: Some(Orbit::StateVector(StateVector {
            freq_channel: Some(k),
            ..Default::default()
        })),
    }
}

#[test]
fn not_ready_without_ephemeris() -> anyhow::Result<()> {
    for c in Constellation::ALL {
        let mut p = Provider::new(c, &config(c, 1, 1e6))?;
        assert!(!p.is_ready());
        match p.produce_chunk(0.0, 16) {
            Err(GnssError::NotReady { constellation, reason }) => {
                assert_eq!(constellation, c);
                assert_eq!(reason, "no ephemeris loaded");
            }
            other => panic!("{c}: unexpected {other:?}"),
        }
    }
    Ok(())
}

#[test]
fn not_ready_without_active_channels() -> anyhow::Result<()> {
    let mut p = ready(Constellation::Glonass, 0, 1e6)?;
    assert!(!p.is_ready());
    assert!(matches!(
        p.produce_chunk(0.0, 16),
        Err(GnssError::NotReady { reason: "no active channels", .. })
    ));
    Ok(())
}

#[test]
fn nominal_ephemeris_activates_default_set() -> anyhow::Result<()> {
    let p = ready(Constellation::Gps, 8, 1e6)?;
    assert!(p.is_ready());
    assert_eq!(p.active_count(), 8);
    let sats = p.satellites();
    assert_eq!(sats.len(), 32);
    let active: Vec<u8> = sats.iter().filter(|s| s.active).map(|s| s.id).collect();
    assert_eq!(active, (1..=8).collect::<Vec<u8>>());
    assert!(sats.iter().all(|s| s.power_dbm == -130.0));
    Ok(())
}

#[test]
fn unhealthy_or_missing_records_deactivate() -> anyhow::Result<()> {
    let mut set = EphemerisSet::new(Constellation::Beidou);
    set.insert(EphemerisRecord::nominal(1));
    set.insert(EphemerisRecord {
        id: 2,
        healthy: false,
        orbit: None,
    });
    // 3 has no record, 9 is healthy but outside the default-active set
    set.insert(EphemerisRecord::nominal(9));

    let mut p = Provider::new(Constellation::Beidou, &config(Constellation::Beidou, 3, 1e6))?;
    let active = p.load_ephemeris(&EphemerisSource::Records(set))?;
    assert_eq!(active, 1);
    let ids: Vec<u8> = p
        .satellites()
        .iter()
        .filter(|s| s.active)
        .map(|s| s.id)
        .collect();
    assert_eq!(ids, vec![1]);
    Ok(())
}

#[test]
fn failed_load_leaves_provider_not_ready() -> anyhow::Result<()> {
    let mut p = ready(Constellation::Galileo, 2, 1e6)?;
    assert!(p.is_ready());
    let bad = EphemerisSource::Rinex("/nonexistent/nav.rnx".into());
    assert!(matches!(
        p.load_ephemeris(&bad),
        Err(GnssError::EphemerisLoad { .. })
    ));
    assert!(!p.is_ready());
    assert_eq!(p.active_count(), 0);
    Ok(())
}

#[test]
fn gps_chips_hold_for_whole_chip_and_repeat() -> anyhow::Result<()> {
    // four samples per chip
    let mut p = ready(Constellation::Gps, 1, 4.0 * 1.023e6)?;
    let block = p.produce_chunk(0.0, 3 * 4092)?;

    let mut code = GpsCode::new(1)?;
    for (i, s) in block[..4092].iter().enumerate() {
        if i % 4 == 0 {
            let chip = code.next_chip();
            assert_eq!(*s, IqSample::new(1000 * chip as i16, 0), "chip {}", i / 4);
        } else {
            assert_eq!(*s, block[i - 1]);
        }
    }
    assert_eq!(block[..4092], block[4092..8184]);
    assert_eq!(block[..4092], block[8184..]);
    Ok(())
}

#[test]
fn galileo_applies_boc_subcarrier() -> anyhow::Result<()> {
    let mut p = ready(Constellation::Galileo, 1, 4.0 * 1.023e6)?;
    let block = p.produce_chunk(0.0, 400)?;
    for chip in block.chunks_exact(4) {
        assert_eq!(chip[0].re.abs(), 800);
        assert_eq!(chip[0], chip[1]);
        assert_eq!(chip[2].re, -chip[0].re);
        assert_eq!(chip[2], chip[3]);
    }
    Ok(())
}

#[test]
fn chunked_output_matches_single_call() -> anyhow::Result<()> {
    let fs = 60e6;
    for c in Constellation::ALL {
        let mut whole = ready(c, 3, fs)?;
        let mut split = ready(c, 3, fs)?;
        whole.set_frequency_offset(3_456_789.0);
        split.set_frequency_offset(3_456_789.0);

        let n = 7_001;
        let expect = whole.produce_chunk(0.0, 3 * n)?;
        let mut got = Vec::with_capacity(3 * n);
        for i in 0..3 {
            got.extend(split.produce_chunk((i * n) as f64 / fs, n)?);
        }
        assert_eq!(expect, got, "{c}");
    }
    Ok(())
}

#[test]
fn weight_scales_amplitude() -> anyhow::Result<()> {
    let fs = 1.023e6;
    let mut cfg = config(Constellation::Gps, 1, fs);
    cfg.gps.weight = 0.5;
    let mut p = Provider::new(Constellation::Gps, &cfg)?;
    p.load_ephemeris(&EphemerisSource::Nominal)?;
    let block = p.produce_chunk(0.0, 64)?;
    assert!(block.iter().all(|s| s.re.abs() == 500 && s.im == 0));
    Ok(())
}

#[test]
fn glonass_records_reassign_slots() -> anyhow::Result<()> {
    let mut set = EphemerisSet::new(Constellation::Glonass);
    set.insert(glonass_record(21, -7, true));
    set.insert(glonass_record(4, 3, true));
    set.insert(glonass_record(9, -6, false));

    let mut p = Provider::new(
        Constellation::Glonass,
        &config(Constellation::Glonass, 14, 8e6),
    )?;
    let active = p.load_ephemeris(&EphemerisSource::Records(set))?;
    assert_eq!(active, 2);

    let sats = p.satellites();
    assert_eq!(sats.len(), 14);
    let slot = |k: i8| sats.iter().find(|s| s.freq_channel == Some(k));
    assert_eq!(slot(-7).map(|s| (s.id, s.active)), Some((21, true)));
    assert_eq!(slot(3).map(|s| (s.id, s.active)), Some((4, true)));
    assert_eq!(slot(-6).map(|s| (s.id, s.active)), Some((9, false)));
    // untouched slot keeps its default number
    assert_eq!(slot(0).map(|s| (s.id, s.active)), Some((8, false)));
    let f3 = slot(3).map(|s| s.frequency_hz).unwrap_or_default();
    assert!((f3 - (1_602e6 + 3.0 * 562_500.0)).abs() < 1e-3);
    Ok(())
}

/// Despread with the channel code and measure power at `freq_hz`.
fn despread_power(block: &[IqSample], fs: f64, freq_hz: f64) -> f64 {
    let mut code = GlonassCode::new();
    let mut clock = ChipClock::new(crate::codes::glonass::CHIP_RATE_HZ, fs);
    let mut chip = 1i8;
    let mut acc = Complex::<f64>::new(0.0, 0.0);
    for (n, s) in block.iter().enumerate() {
        if clock.tick(n as u64) {
            chip = code.next_chip();
        }
        let ph = -2.0 * std::f64::consts::PI * freq_hz * n as f64 / fs;
        let lo = Complex::<f64>::from_polar(1.0, ph);
        acc += Complex::<f64>::new(s.re as f64, s.im as f64) * lo * chip as f64;
    }
    acc.norm() / block.len() as f64
}

#[test]
fn glonass_channel_lands_on_its_slot() -> anyhow::Result<()> {
    let fs = 8e6;
    let mut set = EphemerisSet::new(Constellation::Glonass);
    set.insert(glonass_record(5, 2, true));
    let cfg = config(Constellation::Glonass, 14, fs);
    let mut p = Provider::new(Constellation::Glonass, &cfg)?;
    p.load_ephemeris(&EphemerisSource::Records(set))?;

    let block = p.produce_chunk(0.0, 8_000)?;
    let on = despread_power(&block, fs, 2.0 * 562_500.0);
    let off = despread_power(&block, fs, 3.0 * 562_500.0);
    let expect = base_amplitude(Constellation::Glonass) as f64 * cfg.glonass.weight;
    assert!((on - expect).abs() < 20.0, "on-slot amplitude {on}, expected {expect}");
    assert!(off < 0.1 * on, "off-slot {off} vs {on}");
    Ok(())
}
