//! Read-only IMU/orientation snapshot port. Never coupled into the
//! interpolator — the engine has no closed-loop use for it.

/// A 3-axis reading, in whatever units the concrete sensor reports
/// (typically g for acceleration, deg/s for gyro).
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Vector3 {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

/// A single IMU snapshot.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Orientation {
    pub accel: Vector3,
    pub gyro: Vector3,
    pub temp_c: f64,
}

/// A read-only orientation source.
pub trait OrientationSensor: Send + Sync {
    fn read(&self) -> Orientation;
}

/// Always reports a fixed at-rest reading: gravity on the Z axis, room
/// temperature, everything else zero. Used whenever no real IMU is attached.
#[derive(Debug, Clone, Copy, Default)]
pub struct SimulatedOrientationSensor;

impl OrientationSensor for SimulatedOrientationSensor {
    fn read(&self) -> Orientation {
        Orientation {
            accel: Vector3 { x: 0.0, y: 0.0, z: 9.8 },
            gyro: Vector3::default(),
            temp_c: 25.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_simulated_sensor_reports_gravity_on_z() {
        let sensor = SimulatedOrientationSensor;
        let reading = sensor.read();
        assert_eq!(reading.accel.z, 9.8);
        assert_eq!(reading.accel.x, 0.0);
        assert_eq!(reading.gyro, Vector3::default());
    }
}
