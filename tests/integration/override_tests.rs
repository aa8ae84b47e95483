//! Operator overrides and config updates arriving through the
//! collaborator's service slot.

use genctl::adapters::sim::SimBoard;
use genctl::app::commands::OverrideIntent;
use genctl::app::ports::Relay;
use genctl::config::{ConfigUpdate, RunLimit};
use genctl::eventlog::EventKind;
use genctl::fsm::StateId;

use crate::sim_rig::{MIN, Rig};

fn awaiting_rig(delay: u16) -> Rig {
    let mut board = SimBoard::new();
    board.set_utility(false);
    let mut rig = Rig::boot_configured(
        board,
        &[
            ConfigUpdate::GenDelayMins(delay),
            ConfigUpdate::GenRun(RunLimit::Forever),
        ],
    );
    rig.run_for(5_000);
    assert_eq!(rig.ctl.state(), StateId::AwaitingStart);
    rig
}

#[test]
fn confirmed_force_start_skips_the_delay() {
    let mut rig = awaiting_rig(30);
    rig.operator_mut().press(OverrideIntent::ForceStart);
    rig.run_for(3_000);
    assert_eq!(rig.ctl.state(), StateId::AwaitingStart);
    assert_eq!(
        rig.ctl.operator_mut().last_status.as_ref().and_then(|s| s.prompt),
        Some("start")
    );

    rig.operator_mut().press(OverrideIntent::ConfirmPendingPrompt);
    rig.run_for(1_000);
    assert_eq!(rig.ctl.state(), StateId::Running);
    assert_eq!(rig.writes(Relay::Run, true).len(), 1);
}

#[test]
fn expired_prompt_cannot_be_confirmed() {
    let mut rig = awaiting_rig(30);
    rig.operator_mut().press(OverrideIntent::ForceStart);
    rig.run_for(16_000);
    rig.operator_mut().press(OverrideIntent::ConfirmPendingPrompt);
    rig.run_for(5_000);
    assert_eq!(rig.ctl.state(), StateId::AwaitingStart);
}

#[test]
fn at_home_starts_immediately_and_is_logged() {
    let mut rig = awaiting_rig(30);
    rig.operator_mut().press(OverrideIntent::ToggleAtHome);
    rig.run_for(1_000);
    assert!(rig.ctl.at_home());
    assert_eq!(rig.ctl.state(), StateId::Running);
    assert_eq!(rig.count(EventKind::AtHomeOn), 1);
    assert!(rig.ctl.snapshot().at_home);
}

#[test]
fn manual_rest_stops_a_forever_run() {
    let mut board = SimBoard::new();
    board.set_utility(false);
    let mut rig = Rig::boot_configured(
        board,
        &[
            ConfigUpdate::GenDelayMins(0),
            ConfigUpdate::GenRun(RunLimit::Forever),
        ],
    );
    rig.run_for(MIN);
    assert_eq!(rig.ctl.state(), StateId::Running);

    rig.operator_mut().press(OverrideIntent::ForceStopOrRest);
    rig.operator_mut().press(OverrideIntent::ConfirmPendingPrompt);
    rig.run_for(1_000);
    assert_eq!(rig.ctl.state(), StateId::Resting);
    assert_eq!(rig.count(EventKind::ManualOverride), 1);
    assert_eq!(rig.writes(Relay::Run, false).len(), 1);
}

#[test]
fn config_updates_from_operator_are_persisted_and_logged() {
    let mut rig = Rig::boot(SimBoard::new());
    rig.operator_mut().submit(ConfigUpdate::GenCooldownMins(9));
    rig.operator_mut().submit(ConfigUpdate::ExerciseHour(24));
    rig.run_for(500);
    assert_eq!(rig.ctl.config().gen_cooldown_mins, 9);
    assert_eq!(rig.ctl.config().exercise_hour, 11);
    let updated: Vec<_> = rig
        .entries()
        .into_iter()
        .filter(|e| e.kind == EventKind::ConfigUpdated && e.payload.is_some())
        .collect();
    assert_eq!(updated.len(), 1);
    assert_eq!(updated[0].payload, Some(4));
}

#[test]
fn status_snapshot_reaches_operator_every_step() {
    let mut rig = Rig::boot(SimBoard::new());
    rig.run_for(2_000);
    let op = rig.operator_mut();
    assert!(op.services >= 8);
    let status = op.last_status.clone().unwrap();
    assert_eq!(status.state, "Monitoring");
    assert!(status.utility_present);
    let json = status.to_json().unwrap();
    assert!(json.contains("\"switch\":\"Utility\""));
    assert!(json.contains("\"recent\":["));
}
