//! Construction-time configuration errors.

use thiserror::Error;

/// Raised when a [`crate::scheduler::SchedulerConfig`] would violate one of
/// the engine's invariants. These are always fatal at construction time —
/// render-time anomalies are reported separately, as warnings, and never
/// fail a render (see [`crate::scheduler::Scheduler::render`]).
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("block_size ({block_size}) must be a multiple of tick_width ({tick_width})")]
    BlockSizeNotMultipleOfTick { block_size: u64, tick_width: u64 },

    #[error("sample_rate must be positive, got {0}")]
    NonPositiveSampleRate(u32),

    #[error("tick_width must be positive")]
    NonPositiveTickWidth,

    #[error("block_size must be positive")]
    NonPositiveBlockSize,

    #[error("polyphony (voice count) must be at least 1")]
    ZeroPolyphony,
}
