//! Concrete state handler functions and table builder.
//!
//! Each state is defined by plain `fn` pointers with no closures, no
//! dynamic dispatch, and no heap.
//!
//! ```text
//!  MONITORING ──[utility lost]──▶ AWAITING_START ──[delay | at-home | start-now]──▶ RUNNING
//!      ▲   ▲                          │                                            │   ▲
//!      │   └──────[utility back]──────┘                        [deadline, load ok] │   │ [deadline |
//!      │                                                                           ▼   │  start-now |
//!      │                                                                         RESTING  at-home]
//!      │                                                                           │
//!      └──[restored]── RETURNING_TO_UTILITY ◀──────────[utility back]──────────────┘ (also from RUNNING)
//!                         │
//!                         └──[utility lost again]──▶ resume RUNNING / RESTING
//!
//!  Any state ──[invariant failure]──▶ HALTED (terminal)
//! ```

use log::{error, info, warn};

use super::context::{Command, Deadline, FsmContext, ReturnPhase, Resume};
use super::{StateDescriptor, StateId};
use crate::app::commands::Directive;
use crate::app::events::NotifyKind;
use crate::config::mins_to_ms;
use crate::eventlog::EventKind;
use crate::sensors::battery::BATTERY_SETTLE_MS;

// ═══════════════════════════════════════════════════════════════════════════
//  Table builder
// ═══════════════════════════════════════════════════════════════════════════

pub fn build_state_table() -> [StateDescriptor; StateId::COUNT] {
    [
        StateDescriptor {
            id: StateId::Monitoring,
            name: "Monitoring",
            on_enter: Some(monitoring_enter),
            on_exit: None,
            on_update: monitoring_update,
        },
        StateDescriptor {
            id: StateId::AwaitingStart,
            name: "AwaitingStart",
            on_enter: Some(awaiting_enter),
            on_exit: None,
            on_update: awaiting_update,
        },
        StateDescriptor {
            id: StateId::Running,
            name: "Running",
            on_enter: Some(running_enter),
            on_exit: None,
            on_update: running_update,
        },
        StateDescriptor {
            id: StateId::Resting,
            name: "Resting",
            on_enter: Some(resting_enter),
            on_exit: None,
            on_update: resting_update,
        },
        StateDescriptor {
            id: StateId::ReturningToUtility,
            name: "ReturningToUtility",
            on_enter: Some(returning_enter),
            on_exit: None,
            on_update: returning_update,
        },
        StateDescriptor {
            id: StateId::Halted,
            name: "Halted",
            on_enter: Some(halted_enter),
            on_exit: None,
            on_update: halted_update,
        },
    ]
}

// ═══════════════════════════════════════════════════════════════════════════
//  MONITORING
// ═══════════════════════════════════════════════════════════════════════════

fn monitoring_enter(ctx: &mut FsmContext) {
    ctx.resume = None;
    ctx.keep_on = false;
    ctx.deadline = Deadline::Never;
    info!("MONITORING: on utility");
}

fn monitoring_update(ctx: &mut FsmContext) -> Option<StateId> {
    if !ctx.inputs.utility_present {
        return Some(StateId::AwaitingStart);
    }
    // Utility is fine but the load is still on the generator, e.g. after
    // a reset mid-return.  Finish the return properly.
    if ctx.inputs.on_generator {
        return Some(StateId::ReturningToUtility);
    }
    None
}

// ═══════════════════════════════════════════════════════════════════════════
//  AWAITING_START: battery check, then the start delay
// ═══════════════════════════════════════════════════════════════════════════

fn awaiting_enter(ctx: &mut FsmContext) {
    ctx.battery_sampled = false;
    ctx.record(EventKind::UtilFail, None);
    ctx.push(Command::CancelExercise);
    ctx.push(Command::Notify(NotifyKind::Failed));
    warn!(
        "AWAITING_START: utility lost, starting in {} min",
        ctx.config.gen_delay_mins
    );
}

fn awaiting_update(ctx: &mut FsmContext) -> Option<StateId> {
    if ctx.inputs.utility_present {
        info!("AWAITING_START: utility back before start");
        ctx.record(EventKind::PowerBack, None);
        // An exercise run cancelled by the outage leaves the generator up.
        if ctx.inputs.run_relay {
            ctx.push(Command::StopGenerator);
        }
        return Some(StateId::Monitoring);
    }

    if !ctx.battery_sampled {
        if ctx.ms_in_state >= BATTERY_SETTLE_MS {
            ctx.push(Command::SampleBattery);
            ctx.battery_sampled = true;
        }
        return None;
    }

    if ctx.take_directive(Directive::StartNow) {
        info!("AWAITING_START: manual start");
        return Some(StateId::Running);
    }
    if ctx.inputs.at_home {
        info!("AWAITING_START: at-home, starting now");
        return Some(StateId::Running);
    }
    if ctx.ms_in_state >= mins_to_ms(ctx.config.gen_delay_mins) {
        return Some(StateId::Running);
    }
    None
}

// ═══════════════════════════════════════════════════════════════════════════
//  RUNNING: generator on load
// ═══════════════════════════════════════════════════════════════════════════

fn running_enter(ctx: &mut FsmContext) {
    if let Some(r) = ctx.take_resume(StateId::Running) {
        ctx.deadline = r.deadline;
        ctx.keep_on = r.keep_on;
        info!("RUNNING: resumed");
        return;
    }
    // The run window opens with the run relay, this tick.
    ctx.deadline = match ctx.config.gen_run.as_ms() {
        Some(run_ms) if !stays_on(ctx) => ctx.after(run_ms),
        _ => Deadline::Never,
    };
    ctx.push(Command::StartGenerator);
    ctx.push(Command::ConnectToGenerator);
    info!("RUNNING: starting generator");
}

/// No stop deadline applies.
fn stays_on(ctx: &FsmContext) -> bool {
    ctx.config.gen_run.is_forever() || ctx.inputs.at_home || ctx.keep_on
}

fn running_update(ctx: &mut FsmContext) -> Option<StateId> {
    if ctx.inputs.utility_present {
        ctx.resume = Some(Resume {
            state: StateId::Running,
            deadline: ctx.deadline,
            keep_on: ctx.keep_on,
        });
        return Some(StateId::ReturningToUtility);
    }

    if ctx.take_directive(Directive::StartNow) {
        info!("RUNNING: keep on until utility returns");
        ctx.keep_on = true;
    }
    if ctx.take_directive(Directive::StopOrRest) {
        info!("RUNNING: manual rest");
        ctx.record(EventKind::ManualOverride, None);
        return Some(StateId::Resting);
    }

    if stays_on(ctx) {
        ctx.deadline = Deadline::Never;
        return None;
    }

    let run_ms = ctx.config.gen_run.as_ms().unwrap_or(0);
    if ctx.deadline == Deadline::Never {
        ctx.deadline = ctx.after(run_ms);
    }
    if !ctx.deadline.passed(ctx.now_ms) {
        return None;
    }

    // Rest decision point.  Load is only checked here.
    if ctx.inputs.load_amps > f32::from(ctx.config.load_limit_amps) {
        let amps = ctx.inputs.load_amps.round() as i16;
        info!("RUNNING: load {} A over limit, skipping rest", amps);
        ctx.record(EventKind::RestSkipped, Some(amps));
        ctx.deadline = ctx.after(run_ms);
        return None;
    }
    Some(StateId::Resting)
}

// ═══════════════════════════════════════════════════════════════════════════
//  RESTING: generator off, load unpowered
// ═══════════════════════════════════════════════════════════════════════════

fn resting_enter(ctx: &mut FsmContext) {
    ctx.keep_on = false;
    if let Some(r) = ctx.take_resume(StateId::Resting) {
        ctx.deadline = r.deadline;
        info!("RESTING: resumed");
        return;
    }
    ctx.push(Command::StopGenerator);
    ctx.deadline = ctx.after(mins_to_ms(ctx.config.gen_rest_mins));
    info!("RESTING: for {} min", ctx.config.gen_rest_mins);
}

fn resting_update(ctx: &mut FsmContext) -> Option<StateId> {
    if ctx.inputs.utility_present {
        ctx.resume = Some(Resume {
            state: StateId::Resting,
            deadline: ctx.deadline,
            keep_on: false,
        });
        return Some(StateId::ReturningToUtility);
    }
    if ctx.take_directive(Directive::StartNow) {
        info!("RESTING: manual start");
        return Some(StateId::Running);
    }
    if ctx.inputs.at_home || ctx.deadline.passed(ctx.now_ms) {
        return Some(StateId::Running);
    }
    None
}

// ═══════════════════════════════════════════════════════════════════════════
//  RETURNING_TO_UTILITY: settle, reconnect, cool down
// ═══════════════════════════════════════════════════════════════════════════

fn returning_enter(ctx: &mut FsmContext) {
    ctx.record(EventKind::PowerBack, None);
    ctx.return_phase = ReturnPhase::Settling;
    ctx.deadline = ctx.after(mins_to_ms(ctx.config.util_return_mins));
    info!(
        "RETURNING: utility back, switching in {} min",
        ctx.config.util_return_mins
    );
}

fn returning_update(ctx: &mut FsmContext) -> Option<StateId> {
    match ctx.return_phase {
        ReturnPhase::Settling => {
            if !ctx.inputs.utility_present {
                return Some(abort_return(ctx));
            }
            if ctx.take_directive(Directive::StopOrRest) || ctx.deadline.passed(ctx.now_ms) {
                ctx.return_phase = ReturnPhase::Reconnecting;
                ctx.push(Command::ConnectToUtility);
            }
            None
        }
        ReturnPhase::Reconnecting => {
            if ctx.inputs.generator_present && ctx.config.gen_cooldown_mins > 0 {
                info!(
                    "RETURNING: load on utility, cooling down {} min",
                    ctx.config.gen_cooldown_mins
                );
                ctx.record(EventKind::GenCooldown, None);
                ctx.return_phase = ReturnPhase::CoolingDown;
                ctx.deadline = ctx.after(mins_to_ms(ctx.config.gen_cooldown_mins));
                return None;
            }
            Some(finish_return(ctx))
        }
        ReturnPhase::CoolingDown => {
            if !ctx.inputs.utility_present {
                warn!("RETURNING: utility lost during cooldown");
                ctx.record(EventKind::UtilFail, None);
                ctx.resume = None;
                ctx.keep_on = false;
                return Some(StateId::Running);
            }
            if ctx.take_directive(Directive::StopOrRest) || ctx.deadline.passed(ctx.now_ms) {
                return Some(finish_return(ctx));
            }
            None
        }
    }
}

/// Utility dropped before the switch moved back.
fn abort_return(ctx: &mut FsmContext) -> StateId {
    warn!("RETURNING: utility lost again, resuming outage cycle");
    match ctx.resume {
        Some(r) => {
            ctx.record(EventKind::UtilFail, None);
            r.state
        }
        None if ctx.inputs.generator_present => {
            ctx.record(EventKind::UtilFail, None);
            StateId::Running
        }
        None => StateId::AwaitingStart,
    }
}

fn finish_return(ctx: &mut FsmContext) -> StateId {
    if ctx.inputs.generator_present || ctx.inputs.run_relay {
        ctx.push(Command::StopGenerator);
    }
    ctx.push(Command::Notify(NotifyKind::Restored));
    ctx.resume = None;
    info!("RETURNING: outage cycle complete");
    StateId::Monitoring
}

// ═══════════════════════════════════════════════════════════════════════════
//  HALTED: read-only failure mode
// ═══════════════════════════════════════════════════════════════════════════

fn halted_enter(ctx: &mut FsmContext) {
    ctx.commands.clear();
    ctx.resume = None;
    error!("HALTED: relay control frozen until restart");
}

fn halted_update(_ctx: &mut FsmContext) -> Option<StateId> {
    None
}
