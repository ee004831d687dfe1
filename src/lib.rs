//! Priority-scheduled motion execution engine for quadruped robot actuators:
//! a prioritized goal queue feeds a fixed-rate control loop that interpolates
//! joint trajectories and streams commands to a PWM servo bus.

pub mod behavior;
pub mod bus;
pub mod errors;
pub mod hal;
pub mod motion;
pub mod sensor;
pub mod servo;

pub use behavior::BehaviorLibrary;
pub use errors::Error;
pub use hal::Hal;
pub use motion::{FeedbackEvent, GoalAction, GoalState, Keyframe, MotionEngine, MotionGoal};
pub use servo::ServoController;
