//! Sensor subsystem: input debouncing, battery check, analog channels and
//! the aggregating [`SensorHub`].
//!
//! The hub owns the four opto-isolated inputs and both analog channels and
//! produces [`RawInputs`] each cooperative step.  Debouncing happens in
//! [`debounce`], on the domain side of the port.

pub mod analog;
pub mod battery;
pub mod debounce;

use embedded_hal::digital::InputPin;
use log::warn;

use crate::app::ports::RawInputs;
use analog::AnalogChannel;

/// The four opto inputs.  Each opto pulls its pin low when its source or
/// switch contact is live.
pub struct OptoInputs<P> {
    pub utility_present: P,
    pub generator_present: P,
    pub on_utility: P,
    pub on_generator: P,
}

/// Aggregates every input and produces a raw snapshot.
pub struct SensorHub<P> {
    optos: OptoInputs<P>,
    battery: AnalogChannel,
    current: AnalogChannel,
}

impl<P: InputPin> SensorHub<P> {
    pub fn new(optos: OptoInputs<P>, battery: AnalogChannel, current: AnalogChannel) -> Self {
        Self {
            optos,
            battery,
            current,
        }
    }

    /// Read all four inputs.
    ///
    /// A pin read error is logged and reported as "not live" so a flaky
    /// input can never make the controller believe a source is present.
    pub fn read_inputs(&mut self) -> RawInputs {
        RawInputs {
            utility_present: Self::live(&mut self.optos.utility_present, "utility"),
            generator_present: Self::live(&mut self.optos.generator_present, "generator"),
            on_utility: Self::live(&mut self.optos.on_utility, "on-utility"),
            on_generator: Self::live(&mut self.optos.on_generator, "on-generator"),
        }
    }

    pub fn battery_volts(&mut self) -> f32 {
        self.battery.read()
    }

    pub fn load_amps(&mut self) -> f32 {
        self.current.read().max(0.0)
    }

    fn live(pin: &mut P, name: &str) -> bool {
        match pin.is_low() {
            Ok(low) => low,
            Err(e) => {
                warn!("SensorHub: {} input read failed: {:?}", name, e);
                false
            }
        }
    }
}
