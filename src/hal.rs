//! Thin composition of [`ServoController`] and an [`OrientationSensor`],
//! exposed to higher layers (behaviors, operators) as one facade.

use std::collections::HashMap;
use std::path::Path;

use crate::errors::Error;
use crate::sensor::{Orientation, OrientationSensor, SimulatedOrientationSensor};
use crate::servo::{load_servo_map, ServoController};

/// Purely compositional: owns a servo controller and a sensor, re-exporting
/// the operations higher layers need without adding behavior of its own.
pub struct Hal {
    servos: ServoController,
    sensor: Box<dyn OrientationSensor>,
}

impl Hal {
    /// Loads a servo map from `path` over a simulated bus, paired with a
    /// simulated orientation sensor.
    pub fn load_simulated(servo_map_path: impl AsRef<Path>, freq_hz: u16) -> Result<Self, Error> {
        let servos = load_servo_map(servo_map_path)?;
        Ok(Self {
            servos: ServoController::new_simulated(servos, freq_hz)?,
            sensor: Box::new(SimulatedOrientationSensor),
        })
    }

    /// Composes an already-constructed controller and sensor.
    pub fn new(servos: ServoController, sensor: Box<dyn OrientationSensor>) -> Self {
        Self { servos, sensor }
    }

    pub fn set_pose(&self, pose: &HashMap<String, f64>) -> Result<(), Error> {
        self.servos.set_pose(pose)
    }

    pub fn set_servo_angle(&self, name: &str, angle: f64) -> Result<(), Error> {
        self.servos.set_servo_angle(name, angle)
    }

    pub fn get_pose(&self) -> HashMap<String, f64> {
        self.servos.get_current_pose()
    }

    pub fn get_orientation(&self) -> Orientation {
        self.sensor.read()
    }

    pub fn emergency_stop(&self, set_neutral: bool) -> Result<(), Error> {
        self.servos.emergency_stop(set_neutral)
    }

    pub fn enable_outputs(&self) {
        self.servos.enable_outputs()
    }

    /// The underlying servo controller, for callers that need the full surface
    /// (e.g. constructing a [`crate::motion::MotionEngine`] over it).
    pub fn servos(&self) -> &ServoController {
        &self.servos
    }
}
