//! Minimal [`Generator`] implementations.
//!
//! These exist so the scheduler and voice pool can be exercised and tested
//! without a production synthesis stack — they are not a synthesis
//! library. No filters, effects, noise, or wavetables live here; that is
//! explicitly out of scope.

use std::f64::consts::TAU;

use crate::frame::StereoFrame;
use crate::generator::{Generator, VoiceState};

/// Per-voice parameters shared by both reference generators.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ToneState {
    pub note_id: u64,
    pub frequency: f64,
    pub amplitude: f64,
}

impl ToneState {
    pub fn new(note_id: u64, frequency: f64, amplitude: f64) -> Self {
        Self { note_id, frequency, amplitude }
    }
}

impl VoiceState for ToneState {
    fn note_id(&self) -> u64 {
        self.note_id
    }
}

/// Emits a fixed-amplitude constant signal on both channels, independent of
/// frequency. Useful for isolating scheduler/envelope behavior in tests
/// without oscillator phase noise in the way.
#[derive(Debug, Clone)]
pub struct ConstantGenerator {
    state: ToneState,
}

impl ConstantGenerator {
    pub fn new() -> Self {
        Self { state: ToneState::new(0, 0.0, 1.0) }
    }
}

impl Default for ConstantGenerator {
    fn default() -> Self {
        Self::new()
    }
}

impl Generator for ConstantGenerator {
    type State = ToneState;

    fn set_state(&mut self, state: Self::State) {
        self.state = state;
    }

    fn reset(&mut self) {
        // No internal clock to rewind; amplitude is held in `state`.
    }

    fn process(&mut self, n: usize) -> Vec<StereoFrame> {
        vec![StereoFrame::mono(self.state.amplitude); n]
    }
}

/// A phase-accumulator sine oscillator, keyed off [`ToneState`].
#[derive(Debug, Clone)]
pub struct SineGenerator {
    sample_rate: f64,
    state: ToneState,
    phase: f64,
}

impl SineGenerator {
    pub fn new(sample_rate: u32) -> Self {
        Self { sample_rate: sample_rate as f64, state: ToneState::new(0, 0.0, 1.0), phase: 0.0 }
    }
}

impl Generator for SineGenerator {
    type State = ToneState;

    fn set_state(&mut self, state: Self::State) {
        self.state = state;
    }

    fn reset(&mut self) {
        self.phase = 0.0;
    }

    fn process(&mut self, n: usize) -> Vec<StereoFrame> {
        let increment = TAU * self.state.frequency / self.sample_rate;
        let mut out = Vec::with_capacity(n);
        for _ in 0..n {
            let sample = self.phase.sin() * self.state.amplitude;
            out.push(StereoFrame::mono(sample));
            self.phase = (self.phase + increment) % TAU;
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constant_generator_emits_fixed_amplitude() {
        let mut gen = ConstantGenerator::new();
        gen.set_state(ToneState::new(1, 440.0, 0.5));
        let frames = gen.process(4);
        assert!(frames.iter().all(|f| f.left == 0.5 && f.right == 0.5));
    }

    #[test]
    fn sine_generator_is_pure_under_split() {
        let mut whole = SineGenerator::new(48_000);
        whole.set_state(ToneState::new(1, 440.0, 1.0));
        let combined = whole.process(200);

        let mut split = SineGenerator::new(48_000);
        split.set_state(ToneState::new(1, 440.0, 1.0));
        let mut first = split.process(80);
        let second = split.process(120);
        first.extend(second);

        for (a, b) in combined.iter().zip(first.iter()) {
            assert!((a.left - b.left).abs() < 1e-12);
        }
    }

    #[test]
    fn sine_generator_reset_rewinds_phase() {
        let mut gen = SineGenerator::new(48_000);
        gen.set_state(ToneState::new(1, 440.0, 1.0));
        let first = gen.process(10);
        gen.reset();
        let second = gen.process(10);
        for (a, b) in first.iter().zip(second.iter()) {
            assert!((a.left - b.left).abs() < 1e-12);
        }
    }
}
