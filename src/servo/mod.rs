//! Servo calibration, angle→PWM math, and the controller that ties them to a [`crate::bus::PwmBus`].

pub mod config;
pub mod controller;
pub mod math;

pub use config::{load_servo_map, parse_servo_map, ServoConfig};
pub use controller::ServoController;
