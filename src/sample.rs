use crate::error::GnssError;
use num_complex::Complex;
use rayon::prelude::*;
use std::io::{self, Write};

/// One output sample: 16-bit signed in-phase and quadrature components.
pub type IqSample = Complex<i16>;

/// One chunk of output samples.
pub type SampleBlock = Vec<IqSample>;

const SUM_GRAIN: usize = 8192;

/// Absolute sample index of simulation time `t_s`. Negative times map to 0.
pub fn sample_index(t_s: f64, sample_rate_hz: f64) -> u64 {
    (t_s * sample_rate_hz).round().max(0.0) as u64
}

#[inline]
pub fn saturate(v: i32) -> i16 {
    v.clamp(i16::MIN as i32, i16::MAX as i32) as i16
}

/// Round to nearest and clamp into the i16 range. NaN maps to 0.
#[inline]
pub fn saturate_f32(v: f32) -> i16 {
    // float-to-int `as` saturates
    v.round() as i16
}

#[inline]
pub fn saturate_sample(re: i32, im: i32) -> IqSample {
    Complex::new(saturate(re), saturate(im))
}

/// Add every contribution sample-by-sample in a 32-bit accumulator and clamp
/// the total to the output range.
///
/// Contributions shorter than `len` count as zero past their end.
pub fn sum_saturating<T>(len: usize, parts: &[Vec<Complex<T>>]) -> SampleBlock
where
    T: Copy + Into<i32> + Sync,
{
    let mut out = vec![IqSample::new(0, 0); len];
    out.par_chunks_mut(SUM_GRAIN)
        .enumerate()
        .for_each(|(ci, chunk)| {
            let base = ci * SUM_GRAIN;
            for (j, o) in chunk.iter_mut().enumerate() {
                let mut re = 0i32;
                let mut im = 0i32;
                for p in parts {
                    if let Some(s) = p.get(base + j) {
                        re = re.saturating_add(s.re.into());
                        im = im.saturating_add(s.im.into());
                    }
                }
                *o = saturate_sample(re, im);
            }
        });
    out
}

/// On-the-wire sample width.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SampleFormat {
    I16,
    /// High byte of each 16-bit component.
    I8,
}

impl SampleFormat {
    pub fn from_bits(bits: u32) -> Result<Self, GnssError> {
        match bits {
            16 => Ok(SampleFormat::I16),
            8 => Ok(SampleFormat::I8),
            other => Err(GnssError::config(format!(
                "unsupported output bit depth {other}"
            ))),
        }
    }

    pub fn bytes_per_pair(self) -> usize {
        match self {
            SampleFormat::I16 => 4,
            SampleFormat::I8 => 2,
        }
    }
}

/// Headerless interleaved I/Q byte stream, little-endian.
pub struct IqWriter<W: Write> {
    inner: W,
    format: SampleFormat,
    buf: Vec<u8>,
    samples_written: u64,
}

impl<W: Write> IqWriter<W> {
    pub fn new(inner: W, format: SampleFormat) -> Self {
        Self {
            inner,
            format,
            buf: Vec::new(),
            samples_written: 0,
        }
    }

    pub fn samples_written(&self) -> u64 {
        self.samples_written
    }

    /// Serializes the whole block and writes it in one call, so a pair is
    /// never split between writes.
    pub fn write_block(&mut self, block: &[IqSample]) -> io::Result<()> {
        self.buf.clear();
        self.buf.reserve(block.len() * self.format.bytes_per_pair());
        match self.format {
            SampleFormat::I16 => {
                for s in block {
                    self.buf.extend_from_slice(&s.re.to_le_bytes());
                    self.buf.extend_from_slice(&s.im.to_le_bytes());
                }
            }
            SampleFormat::I8 => {
                for s in block {
                    self.buf.push(((s.re >> 8) as i8) as u8);
                    self.buf.push(((s.im >> 8) as i8) as u8);
                }
            }
        }
        self.inner.write_all(&self.buf)?;
        self.samples_written += block.len() as u64;
        Ok(())
    }

    pub fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }

    pub fn finish(mut self) -> io::Result<W> {
        self.inner.flush()?;
        Ok(self.inner)
    }
}
