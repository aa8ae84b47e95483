//! Scaled analog inputs: starter battery voltage and load current.
//!
//! Both arrive through resistive dividers / a current transformer into
//! ADC1.  A channel maps the ADC's input range linearly to engineering
//! units, then adds a fixed offset.
//!
//! ## Dual-target design
//!
//! On ESP-IDF: reads ADC1 via the oneshot API (initialised by hw_init).
//! On host/test: reads from a static `AtomicU16` for injection.

use core::sync::atomic::{AtomicU16, Ordering};

#[cfg(target_os = "espidf")]
use crate::drivers::hw_init;

/// One injectable count per ADC1 channel.
static SIM_ADC: [AtomicU16; 10] = [const { AtomicU16::new(0) }; 10];

/// Inject a raw ADC count for an ADC1 channel (host builds only).
#[cfg(not(target_os = "espidf"))]
pub fn sim_set_adc(channel: u32, raw: u16) {
    if let Some(slot) = SIM_ADC.get(channel as usize) {
        slot.store(raw, Ordering::Relaxed);
    }
}

const ADC_MAX: f32 = 4095.0;
/// ADC1 input range at 12 dB attenuation.
const ADC_FULL_SCALE_VOLTS: f32 = 3.3;

#[derive(Debug, Clone, Copy)]
pub struct AnalogChannel {
    channel: u32,
    /// Pin voltage that corresponds to `full_scale` units.
    pin_volts_at_full_scale: f32,
    full_scale: f32,
    offset: f32,
}

impl AnalogChannel {
    /// Starter battery: 3.02 V at the pin is 14 V at the battery, and the
    /// divider reads 0.17 V low.
    pub const fn battery(channel: u32) -> Self {
        Self {
            channel,
            pin_volts_at_full_scale: 3.02,
            full_scale: 14.0,
            offset: 0.17,
        }
    }

    /// Load current: 3.15 V at the pin is 100 A.
    pub const fn load_current(channel: u32) -> Self {
        Self {
            channel,
            pin_volts_at_full_scale: 3.15,
            full_scale: 100.0,
            offset: 0.0,
        }
    }

    pub fn read(&self) -> f32 {
        self.scale(self.read_adc())
    }

    fn scale(&self, raw: u16) -> f32 {
        let pin_volts = raw as f32 / ADC_MAX * ADC_FULL_SCALE_VOLTS;
        pin_volts / self.pin_volts_at_full_scale * self.full_scale + self.offset
    }

    #[cfg(target_os = "espidf")]
    fn read_adc(&self) -> u16 {
        hw_init::adc1_read(self.channel)
    }

    #[cfg(not(target_os = "espidf"))]
    fn read_adc(&self) -> u16 {
        SIM_ADC
            .get(self.channel as usize)
            .map_or(0, |slot| slot.load(Ordering::Relaxed))
    }
}
