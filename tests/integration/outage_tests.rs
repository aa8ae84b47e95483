//! Outage cycle timing against the simulated generator and switch.

use genctl::adapters::sim::SimBoard;
use genctl::app::commands::OverrideIntent;
use genctl::app::events::NotifyKind;
use genctl::app::ports::{Relay, RelayPort};
use genctl::config::{ConfigUpdate, RunLimit};
use genctl::eventlog::EventKind;
use genctl::fsm::StateId;

use crate::sim_rig::{MIN, Rig, STEP_MS, within};

fn outage_board() -> SimBoard {
    let mut b = SimBoard::new();
    b.set_utility(false);
    b
}

fn cycle_config(delay: u16, run: RunLimit, rest: u16) -> [ConfigUpdate; 3] {
    [
        ConfigUpdate::GenDelayMins(delay),
        ConfigUpdate::GenRun(run),
        ConfigUpdate::GenRestMins(rest),
    ]
}

// ── Run / rest duty cycle ─────────────────────────────────────

#[test]
fn six_hour_outage_follows_run_rest_cycle() {
    let mut rig = Rig::boot_configured(
        outage_board(),
        &cycle_config(0, RunLimit::Minutes(30), 180),
    );
    rig.run_for(360 * MIN);

    let runs = rig.board().run_intervals();
    assert_eq!(runs.len(), 2, "run intervals: {:?}", runs);
    // Battery settle only.
    assert!(runs[0].0 <= 5_000, "first start at {}", runs[0].0);
    // Each boundary is seen on the first tick at or after it.
    for &(on, off) in &runs {
        assert!(within(off - on, 30 * MIN, 30 * MIN + STEP_MS), "{:?}", runs);
    }
    let rested = runs[1].0 - runs[0].1;
    assert!(within(rested, 180 * MIN, 180 * MIN + STEP_MS), "rested {}", rested);
    assert!(within(rig.board().runtime_ms(), 60 * MIN, 60 * MIN + 2 * STEP_MS));

    assert_eq!(rig.ctl.state(), StateId::Resting);
    assert_eq!(rig.count(EventKind::UtilFail), 1);
    assert_eq!(rig.ctl.operator_mut().notifications, vec![NotifyKind::Failed]);
    assert!(!rig.ctl.is_halted());
}

#[test]
fn duty_cycle_does_not_drift_over_a_day() {
    let mut rig = Rig::boot_configured(
        outage_board(),
        &cycle_config(0, RunLimit::Minutes(30), 180),
    );
    rig.run_for(24 * 60 * MIN);

    // One 210-minute period per start: 0, 210, ..., 1260 min.
    let runs = rig.board().run_intervals();
    assert_eq!(runs.len(), 7, "run intervals: {:?}", runs);
    let first = runs[0].0;
    for (k, &(on, off)) in runs.iter().enumerate() {
        let k = k as u64;
        let due = first + k * 210 * MIN;
        assert!(
            within(on, due, due + k * 2 * STEP_MS),
            "start {} at {} ms, due {} ms",
            k,
            on,
            due
        );
        assert!(within(off - on, 30 * MIN, 30 * MIN + STEP_MS), "run {} lasted {} ms", k, off - on);
    }
}

#[test]
fn watchdog_is_fed_through_long_waits() {
    let mut rig = Rig::boot_configured(
        outage_board(),
        &cycle_config(0, RunLimit::Minutes(10), 10),
    );
    rig.run_for(45 * MIN);
    assert!(rig.board().start_count() >= 2);
    assert!(
        rig.board().max_feed_gap_ms() <= 1_000,
        "feed gap {} ms",
        rig.board().max_feed_gap_ms()
    );
}

#[test]
fn start_delay_is_honoured() {
    let mut rig = Rig::boot_configured(
        outage_board(),
        &cycle_config(3, RunLimit::Forever, 0),
    );
    rig.run_for(2 * MIN);
    assert_eq!(rig.ctl.state(), StateId::AwaitingStart);
    assert!(rig.writes(Relay::Run, true).is_empty());

    rig.run_for(2 * MIN);
    assert_eq!(rig.ctl.state(), StateId::Running);
    let started = rig.writes(Relay::Run, true)[0];
    assert!(within(started, 3 * MIN, 3 * MIN + 1_000), "started at {}", started);
    assert!(rig.board().switch_on_generator());
    assert_eq!(rig.count(EventKind::BatteryRead), 1);
}

// ── Return to utility ─────────────────────────────────────────

#[test]
fn return_to_utility_settles_then_cools_down() {
    let mut rig = Rig::boot_configured(
        outage_board(),
        &cycle_config(0, RunLimit::Forever, 0),
    );
    rig.run_for(2 * MIN);
    assert_eq!(rig.ctl.state(), StateId::Running);
    assert!(rig.board().switch_on_generator());

    let back = rig.now();
    rig.board_mut().set_utility(true);
    rig.run_for(10 * MIN);

    // Default util_return = 6 min, cooldown = 2 min.
    let to_utility = rig.writes(Relay::Connect, false);
    assert_eq!(to_utility.len(), 1);
    assert!(within(to_utility[0], back + 6 * MIN, back + 6 * MIN + 2_000));

    let stops = rig.writes(Relay::Run, false);
    assert_eq!(stops.len(), 1);
    assert!(within(stops[0], back + 8 * MIN, back + 8 * MIN + 5_000));

    assert_eq!(rig.ctl.state(), StateId::Monitoring);
    assert!(!rig.board().gen_running());
    assert!(!rig.board().switch_on_generator());
    assert_eq!(rig.count(EventKind::GenCooldown), 1);
    assert_eq!(
        rig.ctl.operator_mut().notifications,
        vec![NotifyKind::Failed, NotifyKind::Restored]
    );
}

#[test]
fn utility_loss_during_cooldown_restarts_the_run() {
    let mut rig = Rig::boot_configured(
        outage_board(),
        &cycle_config(0, RunLimit::Minutes(30), 60),
    );
    rig.run_for(MIN);
    assert_eq!(rig.ctl.state(), StateId::Running);
    // Keep on until utility returns.
    rig.operator_mut().press(OverrideIntent::ForceStart);
    rig.operator_mut().press(OverrideIntent::ConfirmPendingPrompt);
    rig.run_for(1_000);

    rig.board_mut().set_utility(true);
    assert!(rig.run_until(8 * MIN, |c| c
        .log()
        .entries()
        .any(|e| e.kind == EventKind::GenCooldown)));
    assert!(!rig.board().switch_on_generator());

    rig.board_mut().set_utility(false);
    rig.run_for(10_000);
    assert_eq!(rig.ctl.state(), StateId::Running);
    assert!(rig.board().switch_on_generator());
    // The generator idled through the cooldown and was never stopped.
    assert!(rig.writes(Relay::Run, false).is_empty());
    assert_eq!(rig.count(EventKind::UtilFail), 2);

    // Keep-on ended with the first outage: this run rests on schedule.
    assert!(rig.run_until(31 * MIN, |c| c.state() == StateId::Resting));
    assert!(!rig.ctl.is_halted());
}

#[test]
fn utility_blip_during_settle_resumes_running() {
    let mut rig = Rig::boot_configured(
        outage_board(),
        &cycle_config(0, RunLimit::Forever, 0),
    );
    rig.run_for(2 * MIN);
    rig.board_mut().set_utility(true);
    rig.run_for(MIN);
    assert_eq!(rig.ctl.state(), StateId::ReturningToUtility);

    rig.board_mut().set_utility(false);
    rig.run_for(5_000);
    assert_eq!(rig.ctl.state(), StateId::Running);
    // Same run: the generator was never stopped or restarted.
    assert_eq!(rig.board().start_count(), 1);
    assert!(rig.writes(Relay::Run, false).is_empty());
    assert_eq!(rig.count(EventKind::UtilFail), 2);
}

#[test]
fn short_utility_dropout_is_filtered() {
    let mut rig = Rig::boot(SimBoard::new());
    rig.run_for(1_000);
    rig.board_mut().set_utility(false);
    rig.run_for(250);
    rig.board_mut().set_utility(true);
    rig.run_for(5_000);
    assert_eq!(rig.ctl.state(), StateId::Monitoring);
    assert_eq!(rig.count(EventKind::UtilFail), 0);
}

// ── Load-based rest skipping ──────────────────────────────────

#[test]
fn heavy_load_skips_rest_until_it_drops() {
    let mut board = outage_board();
    board.load_amps = 40.0;
    let mut rig = Rig::boot_configured(board, &cycle_config(0, RunLimit::Minutes(30), 180));

    rig.run_for(45 * MIN);
    assert_eq!(rig.ctl.state(), StateId::Running);
    assert!(rig.writes(Relay::Run, false).is_empty());
    let skipped: Vec<_> = rig
        .entries()
        .into_iter()
        .filter(|e| e.kind == EventKind::RestSkipped)
        .collect();
    assert_eq!(skipped.len(), 1);
    assert_eq!(skipped[0].payload, Some(40));

    rig.board_mut().load_amps = 10.0;
    assert!(rig.run_until(20 * MIN, |c| c.state() == StateId::Resting));
    assert_eq!(rig.count(EventKind::RestSkipped), 1);
}

// ── Relay failures ────────────────────────────────────────────

#[test]
fn start_failure_aborts_cycle_and_retries() {
    let mut board = outage_board();
    board.start_latency_ms = None;
    let mut rig = Rig::boot_configured(board, &cycle_config(0, RunLimit::Forever, 0));

    assert!(rig.run_until(MIN, |c| c.state() == StateId::Monitoring
        && c.log().entries().any(|e| e.kind == EventKind::CycleAborted)));
    let aborted = rig
        .entries()
        .into_iter()
        .find(|e| e.kind == EventKind::CycleAborted)
        .unwrap();
    assert_eq!(aborted.payload, Some(1));
    assert_eq!(rig.count(EventKind::GenOnFail), 1);
    assert!(!rig.board().relay(Relay::Run));
    assert_eq!(rig.count(EventKind::GenConnect), 0);

    rig.run_for(40_000);
    assert!(rig.count(EventKind::GenOnFail) >= 2);
    assert!(rig.board().max_feed_gap_ms() <= 1_000);
    assert!(!rig.ctl.is_halted());
}

#[test]
fn stuck_switch_aborts_and_releases_both_relays() {
    let mut board = outage_board();
    board.transfer_latency_ms = None;
    let mut rig = Rig::boot_configured(board, &cycle_config(0, RunLimit::Forever, 0));

    assert!(rig.run_until(MIN, |c| c
        .log()
        .entries()
        .any(|e| e.kind == EventKind::CycleAborted)));
    let aborted = rig
        .entries()
        .into_iter()
        .find(|e| e.kind == EventKind::CycleAborted)
        .unwrap();
    assert_eq!(aborted.payload, Some(3));
    assert_eq!(rig.count(EventKind::GenConnectFail), 1);
    assert_eq!(rig.ctl.state(), StateId::Monitoring);
    assert!(!rig.board().relay(Relay::Connect));
    assert!(!rig.board().relay(Relay::Run));

    // Utility comes back, then the switch frees up.
    rig.board_mut().set_utility(true);
    rig.run_for(2 * MIN);
    assert_eq!(rig.ctl.state(), StateId::Monitoring);
    assert!(!rig.board().relay(Relay::Connect));
    rig.board_mut().transfer_latency_ms = Some(1_000);

    // An exercise afterwards is still a no-load run.
    rig.operator_mut().press(OverrideIntent::ForceStart);
    rig.operator_mut().press(OverrideIntent::ConfirmPendingPrompt);
    rig.run_for(10_000);
    assert!(rig.ctl.exercise_active());
    assert_eq!(rig.ctl.state(), StateId::Monitoring);
    assert!(!rig.board().switch_on_generator());
    assert!(!rig.ctl.is_halted());
}

#[test]
fn stuck_switch_on_return_keeps_generator_on_load() {
    let mut rig = Rig::boot_configured(
        outage_board(),
        &cycle_config(0, RunLimit::Forever, 0),
    );
    rig.run_for(2 * MIN);
    assert!(rig.board().switch_on_generator());

    rig.board_mut().transfer_latency_ms = None;
    rig.board_mut().set_utility(true);
    assert!(rig.run_until(8 * MIN, |c| c
        .log()
        .entries()
        .any(|e| e.kind == EventKind::CycleAborted)));
    let aborted = rig
        .entries()
        .into_iter()
        .find(|e| e.kind == EventKind::CycleAborted)
        .unwrap();
    assert_eq!(aborted.payload, Some(4));
    assert_eq!(rig.count(EventKind::UtilConnectFail), 1);
    // The load never lost its source.
    assert!(rig.board().relay(Relay::Run));
    assert!(rig.board().gen_running());
    assert!(rig.board().switch_on_generator());

    // The next monitoring tick takes the return up again.
    rig.run_for(1_000);
    assert_eq!(rig.ctl.state(), StateId::ReturningToUtility);
    rig.board_mut().transfer_latency_ms = Some(1_000);
    assert!(rig.run_until(10 * MIN, |c| c.state() == StateId::Monitoring
        && !c.board().gen_running()));
    assert!(!rig.board().switch_on_generator());
    assert_eq!(rig.count(EventKind::CycleAborted), 1);
    assert!(!rig.ctl.is_halted());
}

#[test]
fn stop_timeout_is_logged_and_cycle_continues() {
    let mut board = outage_board();
    board.stop_latency_ms = None;
    let mut rig = Rig::boot_configured(board, &cycle_config(0, RunLimit::Minutes(5), 60));
    rig.run_for(10 * MIN);
    assert_eq!(rig.ctl.state(), StateId::Resting);
    assert_eq!(rig.count(EventKind::GenOffFail), 1);
    assert!(!rig.board().relay(Relay::Run));
}

// ── Boot ──────────────────────────────────────────────────────

#[test]
fn boot_on_generator_resumes_running() {
    let rig = Rig::boot(SimBoard::generator_on_load());
    assert_eq!(rig.ctl.state(), StateId::Running);
    assert_eq!(rig.count(EventKind::AmbiguousStart), 1);
    assert!(rig.board().relay(Relay::Run));
    assert!(rig.board().switch_on_generator());
    assert_eq!(rig.count(EventKind::UtilFail), 0);
}
