//! Starter battery check with a sticky weak flag.
//!
//! The battery is sampled once per outage, after the settle delay, while
//! the generator is still off and the starter is unloaded.  The weak flag
//! rises below [`WEAK_BELOW_VOLTS`] and only clears above
//! [`OK_ABOVE_VOLTS`], so a battery hovering at the boundary does not
//! chatter between outages.

/// Time after outage entry before the battery is sampled.
pub const BATTERY_SETTLE_MS: u64 = 2_000;
pub const WEAK_BELOW_VOLTS: f32 = 12.1;
pub const OK_ABOVE_VOLTS: f32 = 12.3;

/// What one sample did to the weak flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatteryChange {
    Unchanged,
    BecameWeak,
    Recovered,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct BatteryMonitor {
    last_volts: Option<f32>,
    weak: bool,
}

impl BatteryMonitor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sample(&mut self, volts: f32) -> BatteryChange {
        self.last_volts = Some(volts);
        if !self.weak && volts < WEAK_BELOW_VOLTS {
            self.weak = true;
            BatteryChange::BecameWeak
        } else if self.weak && volts > OK_ABOVE_VOLTS {
            self.weak = false;
            BatteryChange::Recovered
        } else {
            BatteryChange::Unchanged
        }
    }

    pub fn volts(&self) -> Option<f32> {
        self.last_volts
    }

    pub fn is_weak(&self) -> bool {
        self.weak
    }
}

/// Volts to the centivolt payload stored in the event log.
pub fn centivolts(volts: f32) -> i16 {
    (volts * 100.0).round().clamp(i16::MIN as f32, i16::MAX as f32) as i16
}
