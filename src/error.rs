use crate::constellation::Constellation;

/// Failure taxonomy of the synthesis core.
///
/// Saturation is not listed here: every accumulation stage clamps to the
/// output range and that is never reported.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum GnssError {
    #[error("invalid configuration: {0}")]
    Configuration(String),

    #[error("{constellation} provider not ready: {reason}")]
    NotReady {
        constellation: Constellation,
        reason: &'static str,
    },

    #[error("failed to load {constellation} ephemeris from {path}: {message}")]
    EphemerisLoad {
        constellation: Constellation,
        path: String,
        message: String,
    },
}

impl GnssError {
    pub fn config(msg: impl Into<String>) -> Self {
        GnssError::Configuration(msg.into())
    }

    /// Per-provider conditions the orchestrator tolerates by skipping the provider.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            GnssError::NotReady { .. } | GnssError::EphemerisLoad { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, GnssError>;
