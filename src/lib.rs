//! Multi-constellation GNSS baseband synthesizer.
//!
//! GPS, Galileo and BeiDou share a code-division shape; GLONASS is
//! frequency-division with one oscillator per channel. A
//! [`SignalOrchestrator`] places every provider in one spectrum and sums
//! their chunks into a single 16-bit I/Q stream.

pub mod codes;
pub mod constellation;
pub mod ephemeris;
pub mod error;
pub mod generator;
pub mod nco;
pub mod orchestrator;
pub mod params;
pub mod provider;
pub mod sample;

pub use constellation::Constellation;
pub use error::GnssError;
pub use orchestrator::SignalOrchestrator;
pub use params::GlobalConfig;
pub use sample::{IqSample, SampleBlock};
