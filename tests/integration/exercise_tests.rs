//! Scheduled and manual exercise runs.

use genctl::adapters::nvs::NvsAdapter;
use genctl::adapters::sim::{SimBoard, SimOperator};
use genctl::app::commands::OverrideIntent;
use genctl::app::events::NotifyKind;
use genctl::app::ports::{Relay, StorageError, StoragePort};
use genctl::app::service::Controller;
use genctl::eventlog::EventKind;
use genctl::fsm::StateId;
use genctl::persist::{CONFIG_KEY, ConfigLoad, ConfigStore};

use crate::sim_rig::{MIN, Rig, STEP_MS};

/// Tuesday 2024-01-02 11:00:00 UTC, the default exercise slot.
const TUE_11H: u32 = 1_704_193_200;

fn clocked_board(wall: u32) -> SimBoard {
    let mut b = SimBoard::new();
    b.set_wall_clock(wall);
    b
}

#[test]
fn scheduled_run_persists_trigger_and_leaves_load_alone() {
    let mut rig = Rig::boot(clocked_board(TUE_11H));
    rig.run_for(1_000);
    assert!(rig.ctl.exercise_active());
    assert_eq!(rig.ctl.config().exercise_last_run, TUE_11H);
    assert_eq!(rig.ctl.operator_mut().notifications, vec![NotifyKind::Test]);

    // Default duration is 15 minutes.
    rig.run_for(16 * MIN);
    assert!(!rig.ctl.exercise_active());
    assert_eq!(rig.ctl.state(), StateId::Monitoring);
    assert_eq!(rig.count(EventKind::ExerciseStart), 1);
    assert_eq!(rig.count(EventKind::ExerciseEnd), 1);

    let runs = rig.board().run_intervals();
    assert_eq!(runs.len(), 1);
    let ran = runs[0].1 - runs[0].0;
    assert!((15 * MIN..15 * MIN + 5_000).contains(&ran), "ran {} ms", ran);
    assert!(rig.writes(Relay::Connect, true).is_empty());
    assert!(!rig.board().gen_running());

    let (_, mut storage) = rig.reset();
    match ConfigStore::load(&mut storage) {
        ConfigLoad::Loaded(cfg) => assert_eq!(cfg.exercise_last_run, TUE_11H),
        other => panic!("unexpected {:?}", other),
    }
}

#[test]
fn reset_mid_run_does_not_refire_the_slot() {
    let mut rig = Rig::boot(clocked_board(TUE_11H));
    rig.run_for(5 * MIN);
    assert!(rig.ctl.exercise_active());

    let (_, storage) = rig.reset();
    let mut rig = Rig::boot_with(clocked_board(TUE_11H + 300), storage);
    rig.run_for(10 * MIN);
    assert!(!rig.ctl.exercise_active());
    assert_eq!(rig.board().start_count(), 0);
    assert_eq!(rig.count(EventKind::ExerciseStart), 1);
}

#[test]
fn off_slot_and_unset_clock_do_not_trigger() {
    let mut rig = Rig::boot(clocked_board(TUE_11H + 2 * 3_600));
    rig.run_for(2 * MIN);
    assert!(!rig.ctl.exercise_active());

    let mut rig = Rig::boot(SimBoard::new());
    rig.run_for(2 * MIN);
    assert!(!rig.ctl.exercise_active());
}

#[test]
fn manual_exercise_from_monitoring() {
    let mut rig = Rig::boot(SimBoard::new());
    rig.run_for(1_000);
    rig.operator_mut().press(OverrideIntent::ForceStart);
    rig.operator_mut().press(OverrideIntent::ConfirmPendingPrompt);
    rig.run_for(1_000);
    assert!(rig.ctl.exercise_active());
    let start = rig
        .entries()
        .into_iter()
        .find(|e| e.kind == EventKind::ExerciseStart)
        .unwrap();
    assert_eq!(start.payload, Some(1));
    // No wall clock: nothing to persist.
    assert_eq!(rig.ctl.config().exercise_last_run, 0);

    rig.operator_mut().press(OverrideIntent::ForceStopOrRest);
    rig.operator_mut().press(OverrideIntent::ConfirmPendingPrompt);
    rig.run_for(5_000);
    assert!(!rig.ctl.exercise_active());
    assert_eq!(rig.count(EventKind::ExerciseEnd), 1);
}

#[test]
fn outage_takes_over_a_running_exercise() {
    let mut rig = Rig::boot(clocked_board(TUE_11H));
    rig.run_for(MIN);
    assert!(rig.ctl.exercise_active());

    rig.board_mut().set_utility(false);
    rig.run_for(3 * MIN);
    assert!(!rig.ctl.exercise_active());
    assert_eq!(rig.ctl.state(), StateId::Running);
    // One continuous run: no stop between the exercise and the outage.
    assert_eq!(rig.board().start_count(), 1);
    assert!(rig.writes(Relay::Run, false).is_empty());
    assert!(rig.board().switch_on_generator());
    assert_eq!(rig.count(EventKind::ExerciseEnd), 0);
    assert!(!rig.ctl.is_halted());
}

/// NVS whose config record can no longer be rewritten.
struct ConfigLocked(NvsAdapter);

impl StoragePort for ConfigLocked {
    fn read(&self, namespace: &str, key: &str, buf: &mut [u8]) -> Result<usize, StorageError> {
        self.0.read(namespace, key, buf)
    }

    fn write(&mut self, namespace: &str, key: &str, data: &[u8]) -> Result<(), StorageError> {
        if key == CONFIG_KEY {
            return Err(StorageError::IoError);
        }
        self.0.write(namespace, key, data)
    }

    fn delete(&mut self, namespace: &str, key: &str) -> Result<(), StorageError> {
        self.0.delete(namespace, key)
    }

    fn exists(&self, namespace: &str, key: &str) -> bool {
        self.0.exists(namespace, key)
    }

    fn capacity_bytes(&self) -> usize {
        self.0.capacity_bytes()
    }
}

#[test]
fn unsaved_trigger_skips_the_scheduled_run() {
    let storage = ConfigLocked(NvsAdapter::new().unwrap());
    let mut ctl = Controller::boot(clocked_board(TUE_11H), storage, SimOperator::new());
    let save_failures = |ctl: &Controller<SimBoard, ConfigLocked, SimOperator>| {
        ctl.log()
            .entries()
            .filter(|e| e.kind == EventKind::Misc && e.text.as_str() == "exercise save fail")
            .count()
    };

    for _ in 0..40 {
        ctl.tick();
        ctl.board_mut().advance(STEP_MS);
    }
    assert!(!ctl.exercise_active());
    assert_eq!(ctl.board().start_count(), 0);
    // Logged once, not on every tick of the slot.
    assert_eq!(save_failures(&ctl), 1);

    // An operator-forced run still goes ahead.
    ctl.operator_mut().press(OverrideIntent::ForceStart);
    ctl.operator_mut().press(OverrideIntent::ConfirmPendingPrompt);
    for _ in 0..4 {
        ctl.tick();
        ctl.board_mut().advance(STEP_MS);
    }
    assert!(ctl.exercise_active());
    assert_eq!(ctl.board().start_count(), 1);
    assert_eq!(save_failures(&ctl), 2);
}
