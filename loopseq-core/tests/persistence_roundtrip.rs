use loopseq_core::persistence;
use loopseq_core::{Pattern, PersistenceError, Pitch};
use std::fs;

fn pitch(name: &str) -> Pitch {
    name.parse().unwrap()
}

fn sample_pattern() -> Pattern {
    let p = Pattern::new(8);
    p.set_tempo(96).unwrap();
    p.set_swing(33).unwrap();
    p.set_humanize_velocity(12).unwrap();
    p.set_humanize_timing(5).unwrap();
    p.set_note(1, pitch("C3")).unwrap();
    p.set_note_with_duration(3, pitch("D#3"), 3).unwrap();
    p.set_gate(3, 45).unwrap();
    p.set_note(7, pitch("Bb2")).unwrap();
    p.set_velocity(7, 127).unwrap();
    p.set_step_cc(5, 71, 20).unwrap();
    p
}

#[test]
fn test_save_after_apply_global_cc_then_reload() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("pattern.json");

    let p = sample_pattern();
    p.set_step_cc(1, 74, 3).unwrap();
    p.set_global_cc(74, 90).unwrap();
    p.set_global_cc(1, 10).unwrap();
    p.apply_global_cc(74).unwrap();

    persistence::save(&p, &path).unwrap();
    let loaded = persistence::load(&path).unwrap();

    for step in 1..=p.len() {
        assert_eq!(loaded.step_cc(step).unwrap(), p.step_cc(step).unwrap());
    }
    assert_eq!(loaded.step_cc(1).unwrap()[&74], 90);
    assert!(loaded.global_cc().is_empty());
}

#[test]
fn test_reload_reproduces_pattern() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("groove.json");

    let p = sample_pattern();
    persistence::save(&p, &path).unwrap();
    let loaded = persistence::load(&path).unwrap();

    assert_eq!(loaded.snapshot(), p.snapshot());
}

#[test]
fn test_installing_a_load_keeps_pending_global_cc() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("next.json");
    persistence::save(&sample_pattern(), &path).unwrap();

    let pending = Pattern::new(16);
    pending.set_global_cc(74, 90).unwrap();
    pending.install_loaded(&persistence::load(&path).unwrap());

    assert_eq!(pending.len(), 8);
    assert_eq!(pending.tempo(), 96);
    assert_eq!(pending.global_cc().get(&74), Some(&90));
}

#[test]
fn test_failed_load_reports_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("broken.json");
    fs::write(&path, "{ not json").unwrap();

    assert!(matches!(
        persistence::load(&path),
        Err(PersistenceError::Json(_))
    ));
}
