//! Quantized scheduling events, grouped into bins by sample index.

use std::collections::BTreeMap;

use crate::generator::VoiceState;

/// A single scheduling instruction tagged with the voice state it carries.
#[derive(Debug, Clone)]
pub enum Event<S: VoiceState> {
    NoteOn(S),
    NoteOff(S),
}

impl<S: VoiceState> Event<S> {
    pub fn note_id(&self) -> u64 {
        match self {
            Event::NoteOn(s) | Event::NoteOff(s) => s.note_id(),
        }
    }
}

/// Quantize a `NOTE_ON` time to the start of its containing tick:
/// `floor(time_s * sample_rate / tick_width) * tick_width`.
pub fn quantize_note_on(time_s: f64, sample_rate: u32, tick_width: u64) -> u64 {
    let raw = time_s * sample_rate as f64;
    ((raw / tick_width as f64).floor() as i64).max(0) as u64 * tick_width
}

/// Quantize a `NOTE_OFF` time to the end of its containing tick:
/// `ceil(time_s * sample_rate / tick_width) * tick_width`.
pub fn quantize_note_off(time_s: f64, sample_rate: u32, tick_width: u64) -> u64 {
    let raw = time_s * sample_rate as f64;
    ((raw / tick_width as f64).ceil() as i64).max(0) as u64 * tick_width
}

/// All events quantized to the same sample index, grouped by note id.
#[derive(Debug, Clone, Default)]
pub struct EventBin<S: VoiceState> {
    events: BTreeMap<u64, Vec<Event<S>>>,
}

impl<S: VoiceState> EventBin<S> {
    pub fn new() -> Self {
        Self { events: BTreeMap::new() }
    }

    pub fn add_event(&mut self, event: Event<S>) {
        self.events.entry(event.note_id()).or_default().push(event);
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Collapse each note id's event list to at most two events: the
    /// first `NOTE_OFF` (if any) followed by the first `NOTE_ON` (if any).
    /// This fixes the within-tick ordering so a note that is turned off
    /// and back on inside the same tick is always handled off-then-on.
    pub fn simplified(&self) -> Vec<Event<S>> {
        let mut out = Vec::new();
        for events in self.events.values() {
            let first_off = events.iter().find(|e| matches!(e, Event::NoteOff(_)));
            let first_on = events.iter().find(|e| matches!(e, Event::NoteOn(_)));
            if let Some(off) = first_off {
                out.push(off.clone());
            }
            if let Some(on) = first_on {
                out.push(on.clone());
            }
        }
        out
    }
}

/// Ordered map from quantized sample index to the bin of events at that
/// index. Iteration order is always ascending by sample index.
#[derive(Debug, Clone, Default)]
pub struct EventTimeline<S: VoiceState> {
    bins: BTreeMap<u64, EventBin<S>>,
}

impl<S: VoiceState> EventTimeline<S> {
    pub fn new() -> Self {
        Self { bins: BTreeMap::new() }
    }

    pub fn add_event(&mut self, sample_index: u64, event: Event<S>) {
        self.bins.entry(sample_index).or_insert_with(EventBin::new).add_event(event);
    }

    pub fn is_empty(&self) -> bool {
        self.bins.is_empty()
    }

    /// Highest sample index with any scheduled event, if any.
    pub fn last_index(&self) -> Option<u64> {
        self.bins.keys().next_back().copied()
    }

    /// Highest sample index carrying at least one simplified `NOTE_OFF`.
    pub fn last_note_off_index(&self) -> Option<u64> {
        self.bins
            .iter()
            .rev()
            .find(|(_, bin)| bin.simplified().iter().any(|e| matches!(e, Event::NoteOff(_))))
            .map(|(idx, _)| *idx)
    }

    /// Remove and return all bins with index `< before`, in ascending
    /// order.
    pub fn drain_before(&mut self, before: u64) -> Vec<(u64, EventBin<S>)> {
        let tail = self.bins.split_off(&before);
        std::mem::replace(&mut self.bins, tail).into_iter().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reference_generators::ToneState;

    #[test]
    fn quantize_note_on_floors_to_tick_start() {
        // 48000 Hz, tick_width 4: sample 10 -> tick starting at 8.
        assert_eq!(quantize_note_on(10.0 / 48_000.0, 48_000, 4), 8);
    }

    #[test]
    fn quantize_note_off_ceils_to_tick_end() {
        assert_eq!(quantize_note_off(10.0 / 48_000.0, 48_000, 4), 12);
    }

    #[test]
    fn simplification_keeps_first_off_then_first_on() {
        let mut bin = EventBin::new();
        bin.add_event(Event::NoteOn(ToneState::new(1, 440.0, 1.0)));
        bin.add_event(Event::NoteOff(ToneState::new(1, 440.0, 1.0)));
        bin.add_event(Event::NoteOn(ToneState::new(1, 660.0, 1.0)));
        let simplified = bin.simplified();
        assert_eq!(simplified.len(), 2);
        assert!(matches!(simplified[0], Event::NoteOff(_)));
        assert!(matches!(simplified[1], Event::NoteOn(_)));
    }

    #[test]
    fn timeline_drain_before_removes_only_earlier_bins() {
        let mut tl: EventTimeline<ToneState> = EventTimeline::new();
        tl.add_event(0, Event::NoteOn(ToneState::new(1, 440.0, 1.0)));
        tl.add_event(512, Event::NoteOn(ToneState::new(2, 440.0, 1.0)));
        let drained = tl.drain_before(512);
        assert_eq!(drained.len(), 1);
        assert_eq!(drained[0].0, 0);
        assert!(!tl.is_empty());
    }
}
