//! Voice-pool management, event quantization, and block-wise rendering.

use crate::envelope::Envelope;
use crate::error::ConfigError;
use crate::event::{quantize_note_off, quantize_note_on, Event, EventTimeline};
use crate::frame::{db_to_linear, StereoFrame};
use crate::generator::{Generator, VoiceState};
use crate::voice::Voice;

/// How a `NOTE_ON` that matches an already-sounding note is handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RetriggerMode {
    /// Never matches a running voice for retrigger: every `NOTE_ON` gets a
    /// free or stolen voice, so overlapping notes of the same pitch ring
    /// out independently.
    #[default]
    AllowTails,
    /// Hard reset: the matched voice's generator and envelope are both
    /// reset before the new note begins.
    CutTails,
    /// Soft reset: only the envelope's attack segment restarts, continuing
    /// from its current level; the generator is left running. Degrades to
    /// `CutTails` when the voice has no envelope, since there is then
    /// nothing to continue from.
    AttackFromCurrentLevel,
}

/// Construction parameters for a [`Scheduler`].
#[derive(Clone)]
pub struct SchedulerConfig<G: Generator, E: Envelope> {
    pub sample_rate: u32,
    pub polyphony: usize,
    pub block_size: u64,
    pub tick_width: u64,
    pub retrigger_mode: RetriggerMode,
    pub silence_floor_db: f64,
    pub max_seconds_after_last_note_off: f64,
    pub generator_template: G,
    pub envelope_template: Option<E>,
}

/// Builder for [`SchedulerConfig`], following the fluent, self-consuming
/// style used throughout the envelope/generator constructors.
pub struct SchedulerBuilder<G: Generator, E: Envelope> {
    config: SchedulerConfig<G, E>,
}

impl<G: Generator, E: Envelope> SchedulerBuilder<G, E> {
    pub fn new(sample_rate: u32, generator_template: G) -> Self {
        Self {
            config: SchedulerConfig {
                sample_rate,
                polyphony: 8,
                block_size: 512,
                tick_width: 4,
                retrigger_mode: RetriggerMode::AllowTails,
                silence_floor_db: -60.0,
                max_seconds_after_last_note_off: 4.0,
                generator_template,
                envelope_template: None,
            },
        }
    }

    pub fn polyphony(mut self, polyphony: usize) -> Self {
        self.config.polyphony = polyphony;
        self
    }

    pub fn block_size(mut self, block_size: u64) -> Self {
        self.config.block_size = block_size;
        self
    }

    pub fn tick_width(mut self, tick_width: u64) -> Self {
        self.config.tick_width = tick_width;
        self
    }

    pub fn retrigger_mode(mut self, mode: RetriggerMode) -> Self {
        self.config.retrigger_mode = mode;
        self
    }

    pub fn silence_floor_db(mut self, db: f64) -> Self {
        self.config.silence_floor_db = db;
        self
    }

    pub fn max_seconds_after_last_note_off(mut self, seconds: f64) -> Self {
        self.config.max_seconds_after_last_note_off = seconds;
        self
    }

    pub fn envelope_template(mut self, envelope: E) -> Self {
        self.config.envelope_template = Some(envelope);
        self
    }

    pub fn build(self) -> Result<Scheduler<G, E>, ConfigError> {
        Scheduler::new(self.config)
    }
}

/// Owns a fixed voice pool and the event timeline it services, producing
/// audio a block at a time via [`Scheduler::render`].
pub struct Scheduler<G: Generator, E: Envelope> {
    config: SchedulerConfig<G, E>,
    voices: Vec<Voice<G, E>>,
    timeline: EventTimeline<G::State>,
}

impl<G: Generator, E: Envelope> Scheduler<G, E> {
    pub fn new(config: SchedulerConfig<G, E>) -> Result<Self, ConfigError> {
        if config.sample_rate == 0 {
            return Err(ConfigError::NonPositiveSampleRate(config.sample_rate));
        }
        if config.tick_width == 0 {
            return Err(ConfigError::NonPositiveTickWidth);
        }
        if config.block_size == 0 {
            return Err(ConfigError::NonPositiveBlockSize);
        }
        if config.polyphony == 0 {
            return Err(ConfigError::ZeroPolyphony);
        }
        if config.block_size % config.tick_width != 0 {
            return Err(ConfigError::BlockSizeNotMultipleOfTick {
                block_size: config.block_size,
                tick_width: config.tick_width,
            });
        }

        let voices = (0..config.polyphony)
            .map(|_| Voice::new(config.generator_template.clone(), config.envelope_template.clone()))
            .collect();

        Ok(Self { config, voices, timeline: EventTimeline::new() })
    }

    /// Schedule a raw event at a given time in seconds, quantized per
    /// `NOTE_ON`/`NOTE_OFF` rounding rules.
    pub fn add_event(&mut self, time_s: f64, event: Event<G::State>) {
        let index = match &event {
            Event::NoteOn(_) => quantize_note_on(time_s, self.config.sample_rate, self.config.tick_width),
            Event::NoteOff(_) => quantize_note_off(time_s, self.config.sample_rate, self.config.tick_width),
        };
        self.timeline.add_event(index, event);
    }

    /// Convenience: schedule a `NOTE_ON` at `time_s` and a matching
    /// `NOTE_OFF` at `time_s + duration_s`.
    pub fn add_note(&mut self, time_s: f64, duration_s: f64, state: G::State) {
        self.add_event(time_s, Event::NoteOn(state.clone()));
        self.add_event(time_s + duration_s, Event::NoteOff(state));
    }

    /// Estimate the total sample count this render will produce, for
    /// callers that want to drive their own progress reporting. Mirrors
    /// the bound the render loop itself terminates by.
    pub fn progress_estimate(&self) -> u64 {
        let last_index = self.timeline.last_index().unwrap_or(0);
        let last_off = self.timeline.last_note_off_index().unwrap_or(0);
        let max_tail = self.max_tail_samples();
        last_index.max(last_off + max_tail)
    }

    fn max_tail_samples(&self) -> u64 {
        (self.config.max_seconds_after_last_note_off * self.config.sample_rate as f64).round() as u64
    }

    fn find_retrigger_voice(&self, note_id: u64) -> Option<usize> {
        self.voices.iter().position(|v| v.is_running() && v.current_note_id() == Some(note_id))
    }

    fn find_free_voice(&self) -> Option<usize> {
        self.voices.iter().position(|v| !v.is_running())
    }

    /// Steal priority: among voices with an envelope, prefer the one whose
    /// release began earliest; if none are releasing, or voices have no
    /// envelope at all, steal the one whose note-on happened earliest.
    fn find_voice_to_steal(&self) -> usize {
        let releasing: Vec<usize> =
            self.voices.iter().enumerate().filter(|(_, v)| v.is_releasing()).map(|(i, _)| i).collect();
        if !releasing.is_empty() {
            return releasing
                .into_iter()
                .min_by_key(|&i| self.voices[i].last_off_index())
                .expect("non-empty");
        }
        (0..self.voices.len())
            .min_by_key(|&i| self.voices[i].last_on_index())
            .expect("voice pool is never empty")
    }

    fn handle_note_on(&mut self, note_id: u64, state: G::State, sample_index: u64) {
        let retrigger = if self.config.retrigger_mode != RetriggerMode::AllowTails {
            self.find_retrigger_voice(note_id)
        } else {
            None
        };

        if let Some(idx) = retrigger {
            match self.config.retrigger_mode {
                RetriggerMode::AllowTails => unreachable!("AllowTails never retrigger-matches"),
                RetriggerMode::CutTails => {
                    self.voices[idx].note_on(note_id, state, sample_index, true, true, true);
                }
                RetriggerMode::AttackFromCurrentLevel => {
                    if self.voices[idx].has_envelope() {
                        self.voices[idx].note_on(note_id, state, sample_index, false, false, true);
                    } else {
                        // Degrade to CutTails: nothing to continue from.
                        self.voices[idx].note_on(note_id, state, sample_index, true, true, true);
                    }
                }
            }
            return;
        }

        let idx = self.find_free_voice().unwrap_or_else(|| self.find_voice_to_steal());
        self.voices[idx].note_on(note_id, state, sample_index, true, true, true);
    }

    fn handle_note_off(&mut self, note_id: u64, sample_index: u64) {
        if let Some(idx) =
            self.voices.iter().position(|v| v.is_running() && v.current_note_id() == Some(note_id))
        {
            self.voices[idx].note_off(sample_index);
        }
        // A NOTE_OFF with no matching running voice is silently discarded.
    }

    fn apply_event(&mut self, event: Event<G::State>, sample_index: u64) {
        match event {
            Event::NoteOn(state) => self.handle_note_on(state.note_id(), state, sample_index),
            Event::NoteOff(state) => self.handle_note_off(state.note_id(), sample_index),
        }
    }

    fn running_voice_count(&self) -> usize {
        self.voices.iter().filter(|v| v.is_running()).count()
    }

    fn render_segment(&mut self, n: usize) -> Vec<StereoFrame> {
        if n == 0 {
            return Vec::new();
        }
        let mut sum = vec![StereoFrame::SILENT; n];
        for voice in self.voices.iter_mut().filter(|v| v.is_running()) {
            let frames = voice.process(n);
            for (out, f) in sum.iter_mut().zip(frames.into_iter()) {
                *out += f;
            }
        }
        sum
    }

    /// Render the full timeline using this scheduler's configured silence
    /// floor and tail window, collecting every block into one buffer.
    pub fn render_collect(&mut self) -> Vec<StereoFrame> {
        let silence_db = self.config.silence_floor_db;
        let max_tail_s = self.config.max_seconds_after_last_note_off;
        self.render_collect_with(silence_db, max_tail_s)
    }

    /// As [`Scheduler::render_collect`], overriding the silence floor (dB
    /// full-scale) and tail window (seconds after the last `NOTE_OFF`) for
    /// this render only.
    pub fn render_collect_with(&mut self, silence_db: f64, max_tail_s: f64) -> Vec<StereoFrame> {
        let mut out = Vec::new();
        for block in self.render_with(silence_db, max_tail_s) {
            out.extend(block);
        }
        out
    }

    /// Render lazily, one block at a time, using this scheduler's
    /// configured silence floor and tail window. See [`BlockRenderer`].
    pub fn render(&mut self) -> BlockRenderer<'_, G, E> {
        let silence_db = self.config.silence_floor_db;
        let max_tail_s = self.config.max_seconds_after_last_note_off;
        self.render_with(silence_db, max_tail_s)
    }

    /// As [`Scheduler::render`], overriding the silence floor (dB
    /// full-scale) and tail window (seconds after the last `NOTE_OFF`) for
    /// this render only — matching the scheduler's `render(silence_db,
    /// max_tail_s)` contract.
    pub fn render_with(&mut self, silence_db: f64, max_tail_s: f64) -> BlockRenderer<'_, G, E> {
        let last_note_off_index = self.timeline.last_note_off_index();
        // No events at all, or events with no NOTE_OFF among them: the
        // Python original returns an empty generator in both cases rather
        // than rendering anything. A no-NOTE_OFF timeline is also a hang
        // hazard — the lone voice would sustain forever since nothing
        // ever calls note_off — so both cases must yield nothing.
        let finished = if self.timeline.is_empty() {
            log::warn!("render() called with no scheduled events; yielding an empty stream");
            true
        } else if last_note_off_index.is_none() {
            log::warn!("scheduled events contain no NOTE_OFF; yielding an empty stream");
            true
        } else {
            false
        };
        let max_tail_samples = (max_tail_s * self.config.sample_rate as f64).round() as u64;
        BlockRenderer {
            cursor: 0,
            finished,
            silence_floor: db_to_linear(silence_db),
            max_tail_samples,
            last_note_off_index,
            scheduler: self,
        }
    }
}

/// Lazily produces one rendered block per `next()` call, splitting each
/// block at any event boundaries that fall inside it so events land on the
/// exact sample they were quantized to.
pub struct BlockRenderer<'a, G: Generator, E: Envelope> {
    scheduler: &'a mut Scheduler<G, E>,
    cursor: u64,
    finished: bool,
    silence_floor: f64,
    max_tail_samples: u64,
    /// Captured once, at render start, from the full timeline — bins get
    /// drained as blocks are produced, so the live timeline can no longer
    /// answer this once the last `NOTE_OFF` bin itself has been consumed.
    last_note_off_index: Option<u64>,
}

impl<'a, G: Generator, E: Envelope> Iterator for BlockRenderer<'a, G, E> {
    type Item = Vec<StereoFrame>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }

        let block_size = self.scheduler.config.block_size;
        let cursor_end = self.cursor + block_size;

        let mut bins = self.scheduler.timeline.drain_before(cursor_end);
        bins.retain(|(idx, _)| *idx >= self.cursor);

        let mut block = vec![StereoFrame::SILENT; block_size as usize];
        let mut position = self.cursor;
        let mut write_offset = 0usize;

        for (bin_index, bin) in bins {
            let segment_len = (bin_index - position) as usize;
            let segment = self.scheduler.render_segment(segment_len);
            block[write_offset..write_offset + segment_len].copy_from_slice(&segment);
            write_offset += segment_len;
            position = bin_index;

            for event in bin.simplified() {
                self.scheduler.apply_event(event, bin_index);
            }
        }

        let remaining = block_size as usize - write_offset;
        let tail = self.scheduler.render_segment(remaining);
        block[write_offset..].copy_from_slice(&tail);

        self.cursor = cursor_end;

        let block_is_silent = block.iter().all(|f| f.amplitude() < self.silence_floor);
        let no_running = self.scheduler.running_voice_count() == 0;
        let no_more_events = self.scheduler.timeline.is_empty();

        // Hard cap: once every scheduled event has been applied, halts at
        // last_note_off + max_tail regardless of whether a voice is still
        // reported running, so a release tail longer than max_tail_s
        // cannot outlive the configured window. Still gated on
        // no_more_events — a future, not-yet-applied note must never be
        // dropped just because an earlier note's tail ran long.
        let past_hard_cap = self
            .last_note_off_index
            .is_some_and(|off| self.cursor >= off + self.max_tail_samples);
        let silent_and_idle = no_running && block_is_silent;

        if no_more_events && (past_hard_cap || silent_and_idle) {
            self.finished = true;
        }

        Some(block)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::envelope::ExpAdsr;
    use crate::reference_generators::{ConstantGenerator, ToneState};

    fn builder() -> SchedulerBuilder<ConstantGenerator, ExpAdsr> {
        SchedulerBuilder::new(48_000, ConstantGenerator::new())
            .block_size(512)
            .tick_width(4)
            .polyphony(4)
    }

    #[test]
    fn rejects_block_size_not_multiple_of_tick() {
        let result = SchedulerBuilder::new(48_000, ConstantGenerator::new()).block_size(500).tick_width(4).build();
        assert!(matches!(result, Err(ConfigError::BlockSizeNotMultipleOfTick { .. })));
    }

    #[test]
    fn rejects_zero_polyphony() {
        let result = SchedulerBuilder::new(48_000, ConstantGenerator::new()).polyphony(0).build();
        assert_eq!(result.unwrap_err(), ConfigError::ZeroPolyphony);
    }

    #[test]
    fn single_note_no_envelope_renders_then_stops() {
        let mut sched = builder().build().unwrap();
        sched.add_note(0.0, 0.01, ToneState::new(1, 440.0, 1.0));
        let out = sched.render_collect();
        assert!(!out.is_empty());
        // After the note-off and with no envelope tail, later blocks are
        // silent and the render terminates.
        assert!(out.iter().all(|f| f.left.is_finite()));
    }

    #[test]
    fn mid_tick_quantization_floors_on_and_ceils_off() {
        let sched = builder().build().unwrap();
        // 10 samples at 48kHz, tick_width 4 -> on floors to 8, off ceils to 12.
        assert_eq!(quantize_note_on(10.0 / 48_000.0, 48_000, 4), 8);
        assert_eq!(quantize_note_off(10.0 / 48_000.0, 48_000, 4), 12);
        let _ = sched;
    }

    #[test]
    fn stray_note_off_is_silently_discarded() {
        let mut sched = builder().build().unwrap();
        sched.add_event(0.0, Event::NoteOff(ToneState::new(99, 440.0, 1.0)));
        // Should not panic, and should still terminate.
        let out = sched.render_collect();
        assert!(out.iter().all(|f| f == &StereoFrame::SILENT));
    }

    #[test]
    fn cut_tails_resets_envelope_on_retrigger() {
        let mut sched = SchedulerBuilder::new(48_000, ConstantGenerator::new())
            .block_size(512)
            .tick_width(4)
            .polyphony(4)
            .envelope_template(ExpAdsr::new(48_000, 0.001, 0.001, 0.5, 0.001))
            .retrigger_mode(RetriggerMode::CutTails)
            .build()
            .unwrap();
        sched.add_event(0.0, Event::NoteOn(ToneState::new(1, 440.0, 1.0)));
        // Retrigger same note_id shortly after; should hit the retrigger
        // path and reset, not allocate a second voice.
        sched.add_event(0.02, Event::NoteOn(ToneState::new(1, 440.0, 1.0)));
        sched.add_event(0.05, Event::NoteOff(ToneState::new(1, 440.0, 1.0)));
        let out = sched.render_collect();
        assert!(!out.is_empty());
    }

    #[test]
    fn steal_prefers_releasing_voice_by_earliest_release() {
        let mut sched = SchedulerBuilder::new(48_000, ConstantGenerator::new())
            .block_size(512)
            .tick_width(4)
            .polyphony(1)
            .envelope_template(ExpAdsr::new(48_000, 0.0, 0.0, 1.0, 10.0))
            .build()
            .unwrap();
        sched.add_event(0.0, Event::NoteOn(ToneState::new(1, 440.0, 1.0)));
        sched.add_event(0.01, Event::NoteOff(ToneState::new(1, 440.0, 1.0)));
        // With only 1 voice, this NOTE_ON must steal the (releasing) voice.
        sched.add_event(0.02, Event::NoteOn(ToneState::new(2, 440.0, 1.0)));
        let out = sched.render_collect();
        assert!(!out.is_empty());
    }
}
