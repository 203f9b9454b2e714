//! Exponential ADSR envelope.
//!
//! Each non-sustain segment follows `y_i = target + (start - target) *
//! exp(-i / tau)`, where `tau = segment_length / NUM_TAU` and `i` is the
//! sample index within the segment. Sustain holds the current value with
//! no forced jump; idle forces the value to `0.0`.

use std::fmt;

/// Number of time constants a segment is considered to span. Larger values
/// make the exponential approach its target more completely by the time
/// the segment's nominal duration elapses.
const NUM_TAU: f64 = 5.0;

/// Lifecycle stage of an [`Envelope`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnvelopeStage {
    Idle,
    Attack,
    Decay,
    Sustain,
    Release,
}

/// Contract a voice drives its amplitude envelope through.
pub trait Envelope: Clone {
    /// Return to `Idle` with level `0.0` and no pending segment.
    fn reset(&mut self);

    /// Begin (or restart) the attack segment from the envelope's current
    /// value — never forced to zero, so a retrigger mid-decay/release
    /// continues smoothly into the new attack.
    fn note_on(&mut self);

    /// Begin the release segment from the current value. A no-op while
    /// `Idle`.
    fn note_off(&mut self);

    fn stage(&self) -> EnvelopeStage;

    /// Current envelope value without advancing time.
    fn level(&self) -> f64;

    /// Advance `n` samples, returning one value per sample.
    fn generate(&mut self, n: usize) -> Vec<f64>;

    /// Register a callback fired exactly once per Release → Idle
    /// transition (i.e. when the release segment fully elapses).
    fn register_idle_handler(&mut self, handler: Box<dyn FnMut() + Send>);
}

/// A single ramped segment: sample index within the segment, its length in
/// samples, and the exponential parameters driving it.
#[derive(Clone, Copy, Debug, Default)]
struct Segment {
    i: u64,
    n: u64,
    start: f64,
    target: f64,
    tau: f64,
}

impl Segment {
    fn new(length_samples: u64, start: f64, target: f64) -> Self {
        let tau = if length_samples > 0 { length_samples as f64 / NUM_TAU } else { 1.0 };
        Self { i: 0, n: length_samples, start, target, tau }
    }

    /// Advances one sample. Returns `(value, finished)`.
    fn step(&mut self) -> (f64, bool) {
        if self.n == 0 {
            // Zero-length segments elapse instantly, without forcing a
            // value — continuity is preserved for the next segment.
            return (self.start, true);
        }
        let value = self.target + (self.start - self.target) * (-(self.i as f64) / self.tau).exp();
        self.i += 1;
        (value, self.i >= self.n)
    }
}

/// Exponential-decay ADSR envelope, as specified by
/// [`Envelope`].
pub struct ExpAdsr {
    sample_rate: u32,
    attack_s: f64,
    decay_s: f64,
    sustain_level: f64,
    release_s: f64,

    stage: EnvelopeStage,
    value: f64,
    segment: Option<Segment>,

    idle_handlers: Vec<Box<dyn FnMut() + Send>>,
}

impl fmt::Debug for ExpAdsr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExpAdsr")
            .field("sample_rate", &self.sample_rate)
            .field("attack_s", &self.attack_s)
            .field("decay_s", &self.decay_s)
            .field("sustain_level", &self.sustain_level)
            .field("release_s", &self.release_s)
            .field("stage", &self.stage)
            .field("value", &self.value)
            .finish()
    }
}

impl Clone for ExpAdsr {
    fn clone(&self) -> Self {
        Self {
            sample_rate: self.sample_rate,
            attack_s: self.attack_s,
            decay_s: self.decay_s,
            sustain_level: self.sustain_level,
            release_s: self.release_s,
            stage: self.stage,
            value: self.value,
            segment: self.segment,
            // Handlers are per-voice wiring, not shared state; a clone
            // starts without subscribers, same as a freshly constructed
            // prototype instance.
            idle_handlers: Vec::new(),
        }
    }
}

impl ExpAdsr {
    pub fn new(sample_rate: u32, attack_s: f64, decay_s: f64, sustain_level: f64, release_s: f64) -> Self {
        Self {
            sample_rate,
            attack_s: attack_s.max(0.0),
            decay_s: decay_s.max(0.0),
            sustain_level: sustain_level.clamp(0.0, 1.0),
            release_s: release_s.max(0.0),
            stage: EnvelopeStage::Idle,
            value: 0.0,
            segment: None,
            idle_handlers: Vec::new(),
        }
    }

    fn secs_to_samples(&self, secs: f64) -> u64 {
        // Truncates toward zero, matching `exp_adsr.py`'s `int(s * sr)`.
        (secs * self.sample_rate as f64) as u64
    }

    fn enter_attack(&mut self) {
        self.stage = EnvelopeStage::Attack;
        self.segment = Some(Segment::new(self.secs_to_samples(self.attack_s), self.value, 1.0));
    }

    fn enter_decay(&mut self) {
        self.stage = EnvelopeStage::Decay;
        self.segment = Some(Segment::new(self.secs_to_samples(self.decay_s), self.value, self.sustain_level));
    }

    fn enter_sustain(&mut self) {
        self.stage = EnvelopeStage::Sustain;
        self.segment = None;
        // Deliberately does not touch `self.value` — no jump on entry.
    }

    fn enter_release(&mut self) {
        self.stage = EnvelopeStage::Release;
        self.segment = Some(Segment::new(self.secs_to_samples(self.release_s), self.value, 0.0));
    }

    fn enter_idle(&mut self) {
        self.stage = EnvelopeStage::Idle;
        self.segment = None;
        self.value = 0.0;
        for handler in &mut self.idle_handlers {
            handler();
        }
    }
}

impl Envelope for ExpAdsr {
    fn reset(&mut self) {
        self.stage = EnvelopeStage::Idle;
        self.value = 0.0;
        self.segment = None;
    }

    fn note_on(&mut self) {
        self.enter_attack();
    }

    fn note_off(&mut self) {
        if self.stage != EnvelopeStage::Idle {
            self.enter_release();
        }
    }

    fn stage(&self) -> EnvelopeStage {
        self.stage
    }

    fn level(&self) -> f64 {
        self.value
    }

    fn generate(&mut self, n: usize) -> Vec<f64> {
        let mut out = Vec::with_capacity(n);
        for _ in 0..n {
            match self.stage {
                EnvelopeStage::Idle => {
                    self.value = 0.0;
                }
                EnvelopeStage::Sustain => {
                    // Holds; no segment to step.
                }
                EnvelopeStage::Attack | EnvelopeStage::Decay | EnvelopeStage::Release => {
                    let mut segment = self.segment.expect("non-idle, non-sustain stage always has a segment");
                    let (value, finished) = segment.step();
                    self.value = value;
                    self.segment = Some(segment);
                    if finished {
                        match self.stage {
                            EnvelopeStage::Attack => self.enter_decay(),
                            EnvelopeStage::Decay => self.enter_sustain(),
                            EnvelopeStage::Release => self.enter_idle(),
                            _ => unreachable!(),
                        }
                    }
                }
            }
            out.push(self.value);
        }
        out
    }

    fn register_idle_handler(&mut self, handler: Box<dyn FnMut() + Send>) {
        self.idle_handlers.push(handler);
    }
}
