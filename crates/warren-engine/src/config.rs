//! Engine configuration, validation, and error types.
//!
//! [`EngineConfig`] is supplied by the embedding application. The engine
//! calls [`validate()`](EngineConfig::validate) before spawning any
//! threads.

use std::error::Error;
use std::fmt;
use std::time::Duration;

use crate::scheduler::SchedulerError;

// ── ConfigError ──────────────────────────────────────────────────

/// Errors detected while validating configuration or starting the engine.
#[derive(Debug, PartialEq, Eq)]
pub enum ConfigError {
    /// `crowd_size` is zero, so no fight could ever start.
    CrowdSizeZero,
    /// The damage range is empty or negative.
    InvalidDamage {
        /// Configured minimum.
        min: i64,
        /// Configured maximum.
        max: i64,
    },
    /// `round_duration` is zero.
    ZeroRoundDuration,
    /// A respawned player would arrive dead.
    InvalidRespawnHealth {
        /// The configured value.
        value: i64,
    },
    /// The timer thread could not be started.
    Scheduler(SchedulerError),
    /// A dispatch worker thread could not be spawned.
    ThreadSpawnFailed {
        /// Description of which thread failed.
        reason: String,
    },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::CrowdSizeZero => write!(f, "crowd_size must be at least 1"),
            Self::InvalidDamage { min, max } => {
                write!(f, "damage range {min}..={max} must satisfy 0 <= min <= max")
            }
            Self::ZeroRoundDuration => write!(f, "round_duration must be non-zero"),
            Self::InvalidRespawnHealth { value } => {
                write!(f, "respawn_health must be at least 1, got {value}")
            }
            Self::Scheduler(e) => write!(f, "scheduler: {e}"),
            Self::ThreadSpawnFailed { reason } => write!(f, "thread spawn failed: {reason}"),
        }
    }
}

impl Error for ConfigError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Scheduler(e) => Some(e),
            _ => None,
        }
    }
}

impl From<SchedulerError> for ConfigError {
    fn from(e: SchedulerError) -> Self {
        Self::Scheduler(e)
    }
}

// ── EngineConfig ─────────────────────────────────────────────────

/// Tunables for combat, clean-up and the dispatch pool.
#[derive(Clone, Debug)]
pub struct EngineConfig {
    /// A location holding this many actors is too crowded to start a
    /// fight, and too noisy to hear one nearby. Default: 10.
    pub crowd_size: usize,
    /// Delay between combat rounds. Default: 3s.
    pub round_duration: Duration,
    /// Smallest damage dealt by a hit. Default: 2.
    pub damage_min: i64,
    /// Largest damage dealt by a hit. Default: 4.
    pub damage_max: i64,
    /// How long a corpse lies before turning to dust. Default: 60s.
    pub corpse_cleanup_after: Duration,
    /// Health a player respawns with. Default: 1.
    pub respawn_health: i64,
    /// Below this health a survivor "looks nearly dead". Default: 4.
    pub nearly_dead: i64,
    /// Number of dispatch worker threads. `None` = auto-detect
    /// (`available_parallelism / 2`, clamped to `[2, 16]`).
    pub dispatch_workers: Option<usize>,
    /// Seed for the engine's dice. `None` seeds from entropy.
    pub seed: Option<u64>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            crowd_size: 10,
            round_duration: Duration::from_secs(3),
            damage_min: 2,
            damage_max: 4,
            corpse_cleanup_after: Duration::from_secs(60),
            respawn_health: 1,
            nearly_dead: 4,
            dispatch_workers: None,
            seed: None,
        }
    }
}

impl EngineConfig {
    /// Check every invariant.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.crowd_size == 0 {
            return Err(ConfigError::CrowdSizeZero);
        }
        if self.damage_min < 0 || self.damage_min > self.damage_max {
            return Err(ConfigError::InvalidDamage {
                min: self.damage_min,
                max: self.damage_max,
            });
        }
        if self.round_duration.is_zero() {
            return Err(ConfigError::ZeroRoundDuration);
        }
        if self.respawn_health < 1 {
            return Err(ConfigError::InvalidRespawnHealth {
                value: self.respawn_health,
            });
        }
        Ok(())
    }

    /// Resolve the actual worker count, applying auto-detection if `None`.
    ///
    /// Explicit values are clamped to `[1, 64]`: with no workers nothing
    /// scheduled would ever run.
    pub fn resolved_worker_count(&self) -> usize {
        match self.dispatch_workers {
            Some(n) => n.clamp(1, 64),
            None => {
                let cpus = std::thread::available_parallelism()
                    .map(|n| n.get())
                    .unwrap_or(4);
                (cpus / 2).clamp(2, 16)
            }
        }
    }
}
