//! A named, gain-staged wrapper around a [`Scheduler`].

use crate::envelope::Envelope;
use crate::frame::StereoFrame;
use crate::generator::Generator;
use crate::scheduler::Scheduler;

/// One scheduler plus the linear gain it contributes to a [`crate::mixer::Master`] mix.
pub struct Track<G: Generator, E: Envelope> {
    pub name: String,
    pub volume: f64,
    scheduler: Scheduler<G, E>,
}

impl<G: Generator, E: Envelope> Track<G, E> {
    pub fn new(name: impl Into<String>, volume: f64, scheduler: Scheduler<G, E>) -> Self {
        Self { name: name.into(), volume, scheduler }
    }

    pub fn add_note(&mut self, time_s: f64, duration_s: f64, state: G::State) {
        self.scheduler.add_note(time_s, duration_s, state);
    }

    pub fn render_collect(&mut self) -> Vec<StereoFrame> {
        self.scheduler.render_collect()
    }
}

/// A single note in a [`Clip`], positioned relative to the clip's own
/// running cursor rather than an absolute time.
#[derive(Clone)]
pub struct ClipNote<S> {
    pub start_s: f64,
    pub duration_s: f64,
    pub state: S,
}

/// Sequential note-list builder: a thin convenience over repeated
/// [`Track::add_note`] calls, for callers composing a part note-by-note
/// instead of tracking absolute times themselves.
#[derive(Default)]
pub struct Clip<S> {
    notes: Vec<ClipNote<S>>,
    cursor_s: f64,
}

impl<S: Clone> Clip<S> {
    pub fn new() -> Self {
        Self { notes: Vec::new(), cursor_s: 0.0 }
    }

    /// Append a note starting at the clip's current cursor, then advance
    /// the cursor by `duration_s`.
    pub fn push_note(&mut self, duration_s: f64, state: S) -> &mut Self {
        self.notes.push(ClipNote { start_s: self.cursor_s, duration_s, state });
        self.cursor_s += duration_s;
        self
    }

    /// Advance the cursor without emitting a note.
    pub fn push_rest(&mut self, duration_s: f64) -> &mut Self {
        self.cursor_s += duration_s;
        self
    }

    pub fn notes(&self) -> &[ClipNote<S>] {
        &self.notes
    }
}

impl<G: Generator, E: Envelope> Track<G, E> {
    /// Schedule every note in `clip` onto this track.
    pub fn schedule_clip(&mut self, clip: &Clip<G::State>) {
        for note in clip.notes() {
            self.add_note(note.start_s, note.duration_s, note.state.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::envelope::ExpAdsr;
    use crate::reference_generators::{ConstantGenerator, ToneState};
    use crate::scheduler::SchedulerBuilder;

    #[test]
    fn clip_tracks_cursor_across_notes_and_rests() {
        let mut clip: Clip<ToneState> = Clip::new();
        clip.push_note(0.5, ToneState::new(1, 440.0, 1.0))
            .push_rest(0.25)
            .push_note(0.5, ToneState::new(2, 440.0, 1.0));
        let notes = clip.notes();
        assert_eq!(notes.len(), 2);
        assert_eq!(notes[0].start_s, 0.0);
        assert_eq!(notes[1].start_s, 0.75);
    }

    #[test]
    fn track_render_collect_delegates_to_scheduler() {
        let scheduler = SchedulerBuilder::new(48_000, ConstantGenerator::new())
            .envelope_template(ExpAdsr::new(48_000, 0.001, 0.001, 0.5, 0.001))
            .build()
            .unwrap();
        let mut track = Track::new("lead", 0.8, scheduler);
        track.add_note(0.0, 0.01, ToneState::new(1, 440.0, 1.0));
        let out = track.render_collect();
        assert!(!out.is_empty());
    }
}
