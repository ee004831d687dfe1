//! Priority-scheduled goal queue feeding a fixed-rate interpolating control loop.

pub mod engine;
pub mod feedback;
pub mod goal;
pub mod queue;

pub use engine::MotionEngine;
pub use feedback::{FeedbackEvent, FeedbackSink};
pub use goal::{GoalAction, GoalState, Keyframe, MotionGoal};
pub use queue::GoalQueue;
