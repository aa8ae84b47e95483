//! Config and event log across resets.

use genctl::adapters::nvs::NvsAdapter;
use genctl::adapters::sim::SimBoard;
use genctl::app::commands::OverrideIntent;
use genctl::app::ports::StoragePort;
use genctl::config::{CONFIG_VERSION, ConfigUpdate, GenConfig};
use genctl::eventlog::EventKind;
use genctl::persist::{
    CONFIG_KEY, CONFIG_RECORD_BYTES, LOG_ENTRY_BYTES, LOG_HEADER_BYTES, LOG_HEADER_KEY, NAMESPACE,
};

use crate::sim_rig::Rig;

#[test]
fn first_boot_writes_defaults() {
    let rig = Rig::boot(SimBoard::new());
    assert_eq!(*rig.ctl.config(), GenConfig::default());
    assert_eq!(
        rig.kinds(),
        vec![EventKind::Startup, EventKind::ConfigUpdated]
    );
    assert_eq!(rig.entries()[1].text.as_str(), "defaults");
}

#[test]
fn config_and_log_survive_reset() {
    let mut rig = Rig::boot(SimBoard::new());
    rig.ctl.update_config(ConfigUpdate::GenRestMins(45)).unwrap();
    rig.operator_mut().press(OverrideIntent::ToggleAtHome);
    rig.run_for(1_000);

    let (_, storage) = rig.reset();
    let rig = Rig::boot_with(SimBoard::new(), storage);
    assert_eq!(rig.ctl.config().gen_rest_mins, 45);
    assert_eq!(
        rig.kinds(),
        vec![
            EventKind::Startup,
            EventKind::ConfigUpdated,
            EventKind::ConfigUpdated,
            EventKind::AtHomeOn,
            EventKind::Startup,
        ]
    );
    // At-home is not persisted.
    assert!(!rig.ctl.at_home());
}

#[test]
fn format_mismatch_resets_config_and_clears_log() {
    let mut rig = Rig::boot(SimBoard::new());
    rig.operator_mut().press(OverrideIntent::ToggleAtHome);
    rig.run_for(1_000);
    let (_, mut storage) = rig.reset();

    let mut old = GenConfig::default();
    old.version = CONFIG_VERSION - 1;
    old.gen_delay_mins = 7;
    storage
        .write(NAMESPACE, CONFIG_KEY, &postcard::to_allocvec(&old).unwrap())
        .unwrap();

    let rig = Rig::boot_with(SimBoard::new(), storage);
    assert_eq!(*rig.ctl.config(), GenConfig::default());
    assert_eq!(
        rig.kinds(),
        vec![EventKind::Startup, EventKind::ConfigUpdated]
    );
}

#[test]
fn corrupt_log_header_is_reset_and_logged() {
    let mut rig = Rig::boot(SimBoard::new());
    rig.ctl.update_config(ConfigUpdate::GenRestMins(45)).unwrap();
    rig.operator_mut().press(OverrideIntent::ToggleAtHome);
    rig.run_for(1_000);
    let (_, mut storage) = rig.reset();
    storage.write(NAMESPACE, LOG_HEADER_KEY, &[0xff; 3]).unwrap();

    let rig = Rig::boot_with(SimBoard::new(), storage);
    // The config is untouched; only the log starts over.
    assert_eq!(rig.ctl.config().gen_rest_mins, 45);
    assert_eq!(rig.kinds(), vec![EventKind::Startup, EventKind::Misc]);
    assert_eq!(rig.entries()[1].text.as_str(), "log reset");
}

#[test]
fn watchdog_reset_is_logged_at_boot() {
    let mut board = SimBoard::new();
    board.watchdog_reset = true;
    let rig = Rig::boot(board);
    assert_eq!(rig.count(EventKind::WatchdogReset), 1);
}

#[test]
fn log_wraps_at_storage_capacity() {
    let slots = 5;
    let bytes = CONFIG_RECORD_BYTES + LOG_HEADER_BYTES + slots * LOG_ENTRY_BYTES;
    let storage = NvsAdapter::with_capacity(bytes).unwrap();
    let mut rig = Rig::boot_with(SimBoard::new(), storage);
    assert_eq!(rig.ctl.log().capacity(), slots);

    for _ in 0..6 {
        rig.operator_mut().press(OverrideIntent::ToggleAtHome);
        rig.run_for(250);
    }
    assert_eq!(rig.ctl.log().len(), slots);
    assert!(rig.ctl.log().check_invariants().is_ok());
    assert!(!rig.ctl.is_halted());
    let newest = rig.ctl.log().recent(1).next().unwrap().kind;
    assert_eq!(newest, EventKind::AtHomeOff);

    let (_, storage) = rig.reset();
    let rig = Rig::boot_with(SimBoard::new(), storage);
    assert_eq!(rig.ctl.log().len(), slots);
    assert_eq!(rig.kinds().last(), Some(&EventKind::Startup));
}
