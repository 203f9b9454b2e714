//! Cross-module integration tests: scheduler + track + master.

use polyphony::{
    ConstantGenerator, ExpAdsr, Master, RetriggerMode, SchedulerBuilder, ToneState, Track,
};

fn adsr() -> ExpAdsr {
    ExpAdsr::new(48_000, 0.001, 0.001, 0.6, 0.01)
}

#[test]
fn two_tracks_mix_into_one_longer_buffer() {
    let sched_a = SchedulerBuilder::new(48_000, ConstantGenerator::new())
        .envelope_template(adsr())
        .build()
        .unwrap();
    let sched_b = SchedulerBuilder::new(48_000, ConstantGenerator::new())
        .envelope_template(adsr())
        .build()
        .unwrap();

    let mut track_a = Track::new("a", 1.0, sched_a);
    track_a.add_note(0.0, 0.01, ToneState::new(1, 440.0, 1.0));

    let mut track_b = Track::new("b", 0.5, sched_b);
    track_b.add_note(0.0, 0.2, ToneState::new(2, 330.0, 1.0));

    let mut master = Master::new(vec![track_a, track_b]);
    let mix = master.render_collect();

    assert!(!mix.is_empty());
    assert!(mix.iter().all(|f| f.left.is_finite() && f.right.is_finite()));
}

#[test]
fn retrigger_under_cut_tails_reuses_the_same_voice() {
    let mut sched = SchedulerBuilder::new(48_000, ConstantGenerator::new())
        .envelope_template(adsr())
        .polyphony(2)
        .retrigger_mode(RetriggerMode::CutTails)
        .build()
        .unwrap();

    sched.add_event(0.0, polyphony::Event::NoteOn(ToneState::new(1, 440.0, 1.0)));
    sched.add_event(0.05, polyphony::Event::NoteOn(ToneState::new(1, 440.0, 1.0)));
    sched.add_event(0.1, polyphony::Event::NoteOff(ToneState::new(1, 440.0, 1.0)));

    let out = sched.render_collect();
    assert!(!out.is_empty());
}

#[test]
fn attack_from_current_level_degrades_without_envelope() {
    // No envelope template: ATTACK_FROM_CURRENT_LEVEL must degrade to
    // CUT_TAILS rather than panicking or silently doing nothing.
    let mut sched: polyphony::Scheduler<ConstantGenerator, ExpAdsr> =
        SchedulerBuilder::new(48_000, ConstantGenerator::new())
            .retrigger_mode(RetriggerMode::AttackFromCurrentLevel)
            .build()
            .unwrap();

    sched.add_event(0.0, polyphony::Event::NoteOn(ToneState::new(1, 440.0, 1.0)));
    sched.add_event(0.01, polyphony::Event::NoteOn(ToneState::new(1, 440.0, 1.0)));
    sched.add_event(0.02, polyphony::Event::NoteOff(ToneState::new(1, 440.0, 1.0)));

    let out = sched.render_collect();
    assert!(!out.is_empty());
}
