//! Offline, sample-accurate polyphonic event scheduler and voice engine.
//!
//! The crate is organized around a small seam between *what makes sound*
//! (the [`Generator`] contract, driven by an [`Envelope`]) and *when it
//! sounds* ([`event`] quantization feeding a [`scheduler::Scheduler`]'s
//! voice pool). [`track::Track`] and [`mixer::Master`] compose schedulers
//! into a multi-part mix.
//!
//! Concrete tone generation is deliberately minimal
//! ([`reference_generators`]): this crate is a scheduler and voice engine,
//! not a synthesis library.

pub mod envelope;
pub mod error;
pub mod event;
pub mod frame;
pub mod generator;
pub mod mixer;
pub mod reference_generators;
pub mod scheduler;
pub mod track;
pub mod voice;

pub use envelope::{Envelope, EnvelopeStage, ExpAdsr};
pub use error::ConfigError;
pub use event::{Event, EventBin, EventTimeline};
pub use frame::{AudioBuffer, StereoFrame};
pub use generator::{Generator, VoiceState};
pub use mixer::Master;
pub use reference_generators::{ConstantGenerator, SineGenerator, ToneState};
pub use scheduler::{RetriggerMode, Scheduler, SchedulerBuilder, SchedulerConfig};
pub use track::{Clip, ClipNote, Track};
pub use voice::Voice;
