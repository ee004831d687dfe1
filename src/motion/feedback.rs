//! Progress telemetry emitted by the engine's worker thread.

use std::collections::HashMap;

use crate::motion::goal::GoalState;

/// One progress report for a goal. `progress` is in `[0, 1]`.
#[derive(Debug, Clone)]
pub struct FeedbackEvent {
    pub goal_id: String,
    pub status: GoalState,
    pub progress: f64,
    pub current_pose: HashMap<String, f64>,
    pub message: String,
    /// Seconds since `UNIX_EPOCH`, recorded by the worker at emission time.
    pub timestamp: f64,
}

/// Caller-supplied sink. Invoked on the worker thread; a panicking sink must
/// not take down the control loop (see [`crate::motion::engine::emit`]).
pub type FeedbackSink = Box<dyn Fn(FeedbackEvent) + Send + Sync>;
