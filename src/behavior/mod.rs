//! Loads declarative behavior definitions and expands a behavior name into a
//! [`MotionGoal`] pushed to a [`MotionEngine`].

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use log::{error, warn};
use serde::Deserialize;

use crate::motion::{GoalAction, Keyframe, MotionEngine, MotionGoal};

/// One step of a JSON-authored behavior: a partial pose held for `duration` seconds.
#[derive(Debug, Deserialize)]
struct BehaviorStep {
    #[serde(default)]
    target_positions: HashMap<String, f64>,
    #[serde(default = "default_duration")]
    duration: f64,
}

fn default_duration() -> f64 {
    1.0
}

#[derive(Debug, Deserialize)]
struct BehaviorDef {
    #[serde(default)]
    sequence: Vec<BehaviorStep>,
}

/// Loads a behaviors JSON file, expands named behaviors/quick tasks into
/// [`MotionGoal`]s and pushes them to a [`MotionEngine`].
///
/// File-not-found and malformed JSON degrade to an empty library with a
/// logged diagnostic rather than aborting the process.
pub struct BehaviorLibrary {
    behaviors: HashMap<String, BehaviorDef>,
    /// behavior-file joint name -> servo-map joint name.
    servo_name_mapping: HashMap<String, String>,
    /// Built-in, zero-configuration single-pose stances.
    tasks: HashMap<String, HashMap<String, f64>>,
}

impl BehaviorLibrary {
    /// Loads `path`; degrades to an empty `behaviors` table (built-in tasks
    /// are still available) on any IO or parse error.
    pub fn load(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        let behaviors = match fs::read_to_string(path) {
            Ok(raw) => match serde_json::from_str(&raw) {
                Ok(parsed) => parsed,
                Err(e) => {
                    error!("error parsing {}: {e}", path.display());
                    HashMap::new()
                }
            },
            Err(e) => {
                warn!("{} not found, using default behaviors ({e})", path.display());
                HashMap::new()
            }
        };
        Self {
            behaviors,
            servo_name_mapping: HashMap::new(),
            tasks: default_tasks(),
        }
    }

    /// An empty library with only the built-in quick tasks, bypassing file IO.
    pub fn empty() -> Self {
        Self {
            behaviors: HashMap::new(),
            servo_name_mapping: HashMap::new(),
            tasks: default_tasks(),
        }
    }

    /// Registers a static joint-name alias applied before goal construction.
    pub fn with_servo_alias(mut self, from: impl Into<String>, to: impl Into<String>) -> Self {
        self.servo_name_mapping.insert(from.into(), to.into());
        self
    }

    /// All known behavior names plus built-in quick-pose names.
    pub fn list_names(&self) -> Vec<String> {
        self.behaviors.keys().chain(self.tasks.keys()).cloned().collect()
    }

    fn map_pose(&self, pose: HashMap<String, f64>) -> HashMap<String, f64> {
        pose.into_iter()
            .map(|(joint, angle)| {
                let mapped = self.servo_name_mapping.get(&joint).cloned().unwrap_or(joint);
                (mapped, angle)
            })
            .collect()
    }

    /// Expands a JSON-authored behavior into a `Sequence` goal and pushes it.
    /// Returns `None` (with a logged diagnostic) if the behavior is unknown or empty.
    pub fn execute(&self, name: &str, priority: i64, engine: &MotionEngine) -> Option<String> {
        let behavior = self.behaviors.get(name)?;
        if behavior.sequence.is_empty() {
            warn!("empty sequence for behavior: {name}");
            return None;
        }
        let keyframes = behavior
            .sequence
            .iter()
            .map(|step| Keyframe {
                duration_s: step.duration,
                pose: self.map_pose(step.target_positions.clone()),
            })
            .collect();
        let goal = MotionGoal::new(uuid_like(), GoalAction::Sequence(keyframes)).with_priority(priority);
        Some(engine.push_goal(goal))
    }

    /// Expands a built-in single-pose stance into a `Pose` goal and pushes it.
    /// Falls back to a JSON-authored behavior of the same name if one exists.
    pub fn execute_quick_task(
        &self,
        name: &str,
        duration_s: f64,
        priority: i64,
        engine: &MotionEngine,
    ) -> Option<String> {
        if self.behaviors.contains_key(name) {
            return self.execute(name, priority, engine);
        }
        let pose = self.tasks.get(name)?;
        let goal = MotionGoal::new(
            uuid_like(),
            GoalAction::Pose(Keyframe {
                duration_s,
                pose: self.map_pose(pose.clone()),
            }),
        )
        .with_priority(priority);
        Some(engine.push_goal(goal))
    }
}

fn default_tasks() -> HashMap<String, HashMap<String, f64>> {
    HashMap::from([
        (
            "sit".to_string(),
            HashMap::from([
                ("fl_hip".to_string(), 30.0),
                ("fl_knee".to_string(), 90.0),
                ("fr_hip".to_string(), 30.0),
                ("fr_knee".to_string(), 90.0),
                ("bl_hip".to_string(), 30.0),
                ("bl_knee".to_string(), 90.0),
                ("br_hip".to_string(), 30.0),
                ("br_knee".to_string(), 90.0),
            ]),
        ),
        (
            "stand".to_string(),
            HashMap::from([
                ("fl_hip".to_string(), 0.0),
                ("fl_knee".to_string(), 0.0),
                ("fr_hip".to_string(), 0.0),
                ("fr_knee".to_string(), 0.0),
                ("bl_hip".to_string(), 0.0),
                ("bl_knee".to_string(), 0.0),
                ("br_hip".to_string(), 0.0),
                ("br_knee".to_string(), 0.0),
            ]),
        ),
        (
            "wave_paw".to_string(),
            HashMap::from([("fl_hip".to_string(), 30.0), ("fl_knee".to_string(), 45.0)]),
        ),
    ])
}

/// A lightweight unique id, avoiding a `uuid` crate dependency for something
/// only ever compared, never parsed back.
fn uuid_like() -> String {
    use std::sync::atomic::{AtomicU64, Ordering};
    static COUNTER: AtomicU64 = AtomicU64::new(0);
    format!("goal-{}", COUNTER.fetch_add(1, Ordering::Relaxed))
}
