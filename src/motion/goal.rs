//! Goal data model: what a caller submits to the [`crate::motion::MotionEngine`].

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// A single (duration, partial-pose) pair the engine interpolates toward.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Keyframe {
    /// Seconds to spend interpolating into `pose`. Floored to 1ms at runtime.
    pub duration_s: f64,
    /// Partial pose: joints not mentioned hold their last commanded value.
    pub pose: HashMap<String, f64>,
}

/// What a goal asks the engine to do. A `Pose` is a degenerate single-keyframe
/// sequence; collapsing the spec's `{action, poses}` pair into one sum type
/// keeps "a Pose goal with zero or >1 keyframes" unrepresentable.
#[derive(Debug, Clone, PartialEq)]
pub enum GoalAction {
    Pose(Keyframe),
    Sequence(Vec<Keyframe>),
}

impl GoalAction {
    /// The keyframes to execute, in order, regardless of which variant this is.
    pub fn keyframes(&self) -> Vec<&Keyframe> {
        match self {
            GoalAction::Pose(k) => vec![k],
            GoalAction::Sequence(ks) => ks.iter().collect(),
        }
    }
}

/// Engine-internal lifecycle. PENDING is implicit (a goal not yet popped);
/// this enum names only the states the engine reports via feedback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GoalState {
    Active,
    Succeeded,
    Preempted,
    Aborted,
    Failed,
}

/// Submitted by callers, mutated only by the engine.
#[derive(Debug, Clone)]
pub struct MotionGoal {
    pub goal_id: String,
    pub action: GoalAction,
    /// Higher wins. Default 5.
    pub priority: i64,
    /// Reserved: see DESIGN.md's Open Question resolution on preemption.
    pub preemptable: bool,
    pub timeout_s: Option<f64>,
    pub metadata: HashMap<String, serde_json::Value>,
}

impl MotionGoal {
    /// A goal with priority 5, not preemptable, no timeout, empty metadata.
    pub fn new(goal_id: impl Into<String>, action: GoalAction) -> Self {
        Self {
            goal_id: goal_id.into(),
            action,
            priority: 5,
            preemptable: false,
            timeout_s: None,
            metadata: HashMap::new(),
        }
    }

    pub fn with_priority(mut self, priority: i64) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_timeout(mut self, timeout_s: f64) -> Self {
        self.timeout_s = Some(timeout_s);
        self
    }
}
