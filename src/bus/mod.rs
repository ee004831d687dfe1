//! Defines the narrow interface to the physical PWM device(s) driving the servos.
//!
//! The real hardware (typically a PCA9685-style I2C PWM expander) is deliberately
//! out of scope here: [`PwmBus`] is a port, and [`SimulationPwmBus`] is the only
//! implementation this crate ships. A real implementation plugs in behind the
//! same trait without [`crate::servo::ServoController`] knowing the difference.

use std::collections::HashMap;
use std::fmt::Debug;

use dyn_clone::DynClone;
use log::trace;
use parking_lot::RwLock;
use std::sync::Arc;

use crate::errors::Error;

/// A PWM bus session addressing one or more boards by their I2C address.
///
/// Implementors own whatever hardware handle is needed to reach the board(s);
/// `write` is the only method called on the hot (control-loop) path.
pub trait PwmBus: Debug + DynClone + Send + Sync {
    /// Sets the PWM frequency (in Hz) for every board this bus addresses.
    fn set_frequency(&mut self, hz: u16) -> Result<(), Error>;

    /// Writes a 16-bit duty cycle to a single (board address, channel) pair.
    fn write(&mut self, address: u8, channel: u8, duty16: u16) -> Result<(), Error>;

    /// Gracefully releases the underlying hardware handle(s).
    fn close(&mut self) -> Result<(), Error>;
}
dyn_clone::clone_trait_object!(PwmBus);

/// A [`PwmBus`] that performs no I/O: it logs every write and records the last
/// duty value written to each `(address, channel)` pair so tests can assert on
/// what would have reached the hardware.
///
/// Selected whenever a real device is unavailable or explicitly requested —
/// this is the crate's default (and only shipped) backend.
#[derive(Debug, Clone, Default)]
pub struct SimulationPwmBus {
    addresses: Vec<u8>,
    frequency: u16,
    last_duty: Arc<RwLock<HashMap<(u8, u8), u16>>>,
}

impl SimulationPwmBus {
    /// Opens a simulated session for the given set of board addresses.
    pub fn open(addresses: impl IntoIterator<Item = u8>) -> Self {
        Self {
            addresses: addresses.into_iter().collect(),
            frequency: 50,
            last_duty: Default::default(),
        }
    }

    /// Returns the last duty value written to `(address, channel)`, if any.
    pub fn last_duty(&self, address: u8, channel: u8) -> Option<u16> {
        self.last_duty.read().get(&(address, channel)).copied()
    }

    /// Returns the board addresses this session was opened for.
    pub fn addresses(&self) -> &[u8] {
        &self.addresses
    }
}

impl PwmBus for SimulationPwmBus {
    fn set_frequency(&mut self, hz: u16) -> Result<(), Error> {
        trace!("[SIM] set frequency {hz}Hz on {:?}", self.addresses);
        self.frequency = hz;
        Ok(())
    }

    fn write(&mut self, address: u8, channel: u8, duty16: u16) -> Result<(), Error> {
        trace!("[SIM] write {address:#04x} ch{channel} duty={duty16}");
        self.last_duty.write().insert((address, channel), duty16);
        Ok(())
    }

    fn close(&mut self) -> Result<(), Error> {
        trace!("[SIM] close {:?}", self.addresses);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_simulation_bus_records_last_duty() {
        let mut bus = SimulationPwmBus::open([0x40]);
        assert_eq!(bus.last_duty(0x40, 0), None);
        bus.write(0x40, 0, 1234).unwrap();
        assert_eq!(bus.last_duty(0x40, 0), Some(1234));
        bus.write(0x40, 0, 4096).unwrap();
        assert_eq!(bus.last_duty(0x40, 0), Some(4096));
    }

    #[test]
    fn test_simulation_bus_set_frequency() {
        let mut bus = SimulationPwmBus::open([0x40, 0x41]);
        assert!(bus.set_frequency(60).is_ok());
        assert_eq!(bus.frequency, 60);
    }

    #[test]
    fn test_simulation_bus_close() {
        let mut bus = SimulationPwmBus::open([0x40]);
        assert!(bus.close().is_ok());
    }
}
