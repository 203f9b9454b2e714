//! Linear, gain-weighted summation of rendered tracks into one mix.

use crate::envelope::Envelope;
use crate::frame::StereoFrame;
use crate::generator::Generator;
use crate::track::Track;

/// Owns a set of tracks and mixes their rendered output down to one
/// stereo buffer, zero-padding any track shorter than the longest.
pub struct Master<G: Generator, E: Envelope> {
    tracks: Vec<Track<G, E>>,
}

impl<G: Generator, E: Envelope> Master<G, E> {
    pub fn new(tracks: Vec<Track<G, E>>) -> Self {
        Self { tracks }
    }

    pub fn render_collect(&mut self) -> Vec<StereoFrame> {
        let rendered: Vec<(f64, Vec<StereoFrame>)> =
            self.tracks.iter_mut().map(|t| (t.volume, t.render_collect())).collect();
        mix(&rendered)
    }
}

/// Sum `(gain, buffer)` pairs into one buffer as long as the longest
/// input, with shorter inputs implicitly zero-padded.
pub fn mix(setup: &[(f64, Vec<StereoFrame>)]) -> Vec<StereoFrame> {
    let length = setup.iter().map(|(_, frames)| frames.len()).max().unwrap_or(0);
    let mut result = vec![StereoFrame::SILENT; length];
    for (volume, frames) in setup {
        for (out, frame) in result.iter_mut().zip(frames.iter()) {
            *out += frame.scale(*volume);
        }
    }
    result
}
