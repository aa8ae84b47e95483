//! Persistence-window debouncing of the four position/power inputs.
//!
//! A raw reading that differs from the committed value starts a pending
//! record.  The record commits once the difference has held for
//! [`DEBOUNCE_MS`]; if the raw value falls back to the committed one first,
//! the record is dropped.  Contact bounce and brief opto glitches never
//! reach the state machine.

use log::debug;

use crate::app::ports::RawInputs;

/// Minimum time a changed reading must persist before it commits.
pub const DEBOUNCE_MS: u64 = 500;

/// The four debounced inputs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Signal {
    UtilityPresent,
    GeneratorPresent,
    OnUtility,
    OnGenerator,
}

impl Signal {
    pub const ALL: [Signal; 4] = [
        Self::UtilityPresent,
        Self::GeneratorPresent,
        Self::OnUtility,
        Self::OnGenerator,
    ];

    fn raw(self, raw: &RawInputs) -> bool {
        match self {
            Self::UtilityPresent => raw.utility_present,
            Self::GeneratorPresent => raw.generator_present,
            Self::OnUtility => raw.on_utility,
            Self::OnGenerator => raw.on_generator,
        }
    }
}

/// A committed `false → true` transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RisingEdge(pub Signal);

/// One debounced boolean.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DebouncedSignal {
    committed: bool,
    /// When the raw value first differed from `committed`.  The candidate
    /// is always `!committed`, so only the start time is kept.
    pending_since: Option<u64>,
}

/// Result of feeding one reading to a [`DebouncedSignal`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Commit {
    None,
    Rose,
    Fell,
}

impl DebouncedSignal {
    /// Start already committed to `value` (boot-time seed).
    pub fn seeded(value: bool) -> Self {
        Self {
            committed: value,
            pending_since: None,
        }
    }

    pub fn value(&self) -> bool {
        self.committed
    }

    pub fn is_pending(&self) -> bool {
        self.pending_since.is_some()
    }

    /// Feed one raw reading taken at `now_ms`.
    pub fn update(&mut self, raw: bool, now_ms: u64) -> Commit {
        if raw == self.committed {
            // Noise rejected.
            self.pending_since = None;
            return Commit::None;
        }
        match self.pending_since {
            None => {
                self.pending_since = Some(now_ms);
                Commit::None
            }
            Some(since) if now_ms.saturating_sub(since) >= DEBOUNCE_MS => {
                self.committed = raw;
                self.pending_since = None;
                if raw { Commit::Rose } else { Commit::Fell }
            }
            Some(_) => Commit::None,
        }
    }
}

/// What one refresh of the whole set produced.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Refresh {
    pub rising: heapless::Vec<RisingEdge, 4>,
}

impl Refresh {
    /// A rising edge left the load powered from a source that is present.
    pub fn power_switched(&self, signals: &SignalSet) -> bool {
        self.rising.iter().any(|&RisingEdge(signal)| match signal {
            Signal::UtilityPresent => signals.on_utility(),
            Signal::OnUtility => signals.utility_present(),
            Signal::GeneratorPresent => signals.on_generator(),
            Signal::OnGenerator => signals.generator_present(),
        })
    }
}

/// The four debounced inputs, refreshed together once per cooperative step.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SignalSet {
    utility_present: DebouncedSignal,
    generator_present: DebouncedSignal,
    on_utility: DebouncedSignal,
    on_generator: DebouncedSignal,
}

impl SignalSet {
    /// Commit every signal straight from a live read.  Used at boot, when
    /// there is no history to debounce against.
    pub fn seed(raw: RawInputs) -> Self {
        Self {
            utility_present: DebouncedSignal::seeded(raw.utility_present),
            generator_present: DebouncedSignal::seeded(raw.generator_present),
            on_utility: DebouncedSignal::seeded(raw.on_utility),
            on_generator: DebouncedSignal::seeded(raw.on_generator),
        }
    }

    /// Feed one raw read of all four inputs.
    pub fn refresh(&mut self, raw: RawInputs, now_ms: u64) -> Refresh {
        let mut out = Refresh::default();
        for signal in Signal::ALL {
            let commit = self.slot_mut(signal).update(signal.raw(&raw), now_ms);
            if commit == Commit::None {
                continue;
            }
            debug!("signal {:?} committed {:?}", signal, commit);
            if commit == Commit::Rose {
                // Four signals, four slots.
                let _ = out.rising.push(RisingEdge(signal));
            }
        }
        out
    }

    pub fn utility_present(&self) -> bool {
        self.utility_present.value()
    }

    pub fn generator_present(&self) -> bool {
        self.generator_present.value()
    }

    pub fn on_utility(&self) -> bool {
        self.on_utility.value()
    }

    pub fn on_generator(&self) -> bool {
        self.on_generator.value()
    }

    /// The load has power from whichever source the switch selects.
    pub fn power_present(&self) -> bool {
        (self.utility_present() && self.on_utility())
            || (self.generator_present() && self.on_generator())
    }

    fn slot_mut(&mut self, signal: Signal) -> &mut DebouncedSignal {
        match signal {
            Signal::UtilityPresent => &mut self.utility_present,
            Signal::GeneratorPresent => &mut self.generator_present,
            Signal::OnUtility => &mut self.on_utility,
            Signal::OnGenerator => &mut self.on_generator,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn commits_after_window() {
        let mut s = DebouncedSignal::default();
        assert_eq!(s.update(true, 0), Commit::None);
        assert_eq!(s.update(true, 499), Commit::None);
        assert_eq!(s.update(true, 500), Commit::Rose);
        assert!(s.value());
        assert!(!s.is_pending());
    }

    #[test]
    fn glitch_cancels_pending() {
        let mut s = DebouncedSignal::default();
        s.update(true, 0);
        s.update(false, 300);
        assert!(!s.is_pending());
        // The window restarts at 400.
        s.update(true, 400);
        assert_eq!(s.update(true, 800), Commit::None);
        assert_eq!(s.update(true, 900), Commit::Rose);
    }

    #[test]
    fn falling_commit_is_not_a_rising_edge() {
        let mut s = DebouncedSignal::seeded(true);
        s.update(false, 0);
        assert_eq!(s.update(false, 600), Commit::Fell);
        assert!(!s.value());
    }

    #[test]
    fn utility_return_while_on_utility_reports_power_switched() {
        let mut set = SignalSet::seed(RawInputs {
            on_utility: true,
            ..Default::default()
        });
        let raw = RawInputs {
            utility_present: true,
            on_utility: true,
            ..Default::default()
        };
        let r = set.refresh(raw, 0);
        assert!(!r.power_switched(&set));
        let r = set.refresh(raw, 500);
        assert!(r.power_switched(&set));
        assert_eq!(r.rising.as_slice(), &[RisingEdge(Signal::UtilityPresent)]);
        assert!(set.power_present());
    }

    #[test]
    fn generator_coming_up_off_switch_is_not_power_switched() {
        let mut set = SignalSet::seed(RawInputs {
            on_utility: true,
            ..Default::default()
        });
        let raw = RawInputs {
            generator_present: true,
            on_utility: true,
            ..Default::default()
        };
        set.refresh(raw, 0);
        let r = set.refresh(raw, 600);
        assert_eq!(r.rising.as_slice(), &[RisingEdge(Signal::GeneratorPresent)]);
        assert!(!r.power_switched(&set));
        assert!(set.generator_present());
        assert!(!set.power_present());
    }
}

#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        /// A level held for less than the window never commits, and a
        /// level held longer commits exactly once.
        #[test]
        fn commits_once_per_stable_transition(
            holds in proptest::collection::vec(1u64..1500, 1..60),
        ) {
            let mut s = DebouncedSignal::default();
            let mut now = 0u64;
            let mut level = true;
            for hold in holds {
                let before = s.value();
                let mut commits = 0;
                // Sample every 100 ms across the hold period.
                let mut t = 0;
                while t < hold {
                    if s.update(level, now + t) != Commit::None {
                        commits += 1;
                    }
                    t += 100;
                }
                now += hold;
                prop_assert!(commits <= 1);
                if level == before {
                    prop_assert_eq!(commits, 0);
                } else {
                    prop_assert_eq!(commits == 1, hold > DEBOUNCE_MS);
                }
                level = !level;
            }
        }
    }
}
