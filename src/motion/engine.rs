//! The control-loop worker: pops goals, interpolates keyframes, writes poses,
//! emits feedback.

use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use log::{error, info, warn};
use parking_lot::Mutex;

use crate::motion::feedback::{FeedbackEvent, FeedbackSink};
use crate::motion::goal::{GoalState, MotionGoal};
use crate::motion::queue::GoalQueue;
use crate::servo::ServoController;

struct ActiveGoal {
    goal_id: String,
    cancel_flag: Arc<AtomicBool>,
}

/// Priority-scheduled worker driving a [`ServoController`] at a fixed control rate.
pub struct MotionEngine {
    servo: Arc<ServoController>,
    queue: Arc<Mutex<GoalQueue>>,
    active: Arc<Mutex<Option<ActiveGoal>>>,
    stop_flag: Arc<AtomicBool>,
    worker: Option<JoinHandle<()>>,
}

impl MotionEngine {
    /// Spawns the worker thread immediately; it idles (polling every ~50ms)
    /// until the first goal is pushed.
    pub fn new(servo: Arc<ServoController>, control_rate_hz: f64, feedback_sink: FeedbackSink) -> Self {
        let queue = Arc::new(Mutex::new(GoalQueue::new()));
        let active = Arc::new(Mutex::new(None));
        let stop_flag = Arc::new(AtomicBool::new(false));
        let sink: Arc<FeedbackSink> = Arc::new(feedback_sink);

        let worker = {
            let servo = servo.clone();
            let queue = queue.clone();
            let active = active.clone();
            let stop_flag = stop_flag.clone();
            thread::spawn(move || worker_loop(servo, queue, active, stop_flag, control_rate_hz, sink))
        };

        Self {
            servo,
            queue,
            active,
            stop_flag,
            worker: Some(worker),
        }
    }

    /// Enqueues a goal. It becomes eligible the moment the worker is free.
    pub fn push_goal(&self, goal: MotionGoal) -> String {
        let goal_id = goal.goal_id.clone();
        self.queue.lock().push(goal);
        goal_id
    }

    /// If `goal_id` is active, sets its cancel flag (honored at the next
    /// control tick). Otherwise removes it from the pending queue. Returns
    /// `false` if the goal is in neither place (already terminal, or unknown).
    pub fn cancel_goal(&self, goal_id: &str) -> bool {
        {
            let active = self.active.lock();
            if let Some(a) = active.as_ref() {
                if a.goal_id == goal_id {
                    a.cancel_flag.store(true, Ordering::SeqCst);
                    return true;
                }
            }
        }
        self.queue.lock().remove(goal_id)
    }

    /// Signals the worker to stop and joins it. The pending queue is simply
    /// dropped along with the engine, not drained into feedback events.
    pub fn stop(&mut self) {
        self.stop_flag.store(true, Ordering::SeqCst);
        if let Some(handle) = self.worker.take() {
            if handle.join().is_err() {
                error!("motion engine worker thread panicked");
            }
        }
    }

    /// The servo controller this engine drives.
    pub fn servo(&self) -> &ServoController {
        &self.servo
    }
}

impl Drop for MotionEngine {
    fn drop(&mut self) {
        self.stop();
    }
}

fn worker_loop(
    servo: Arc<ServoController>,
    queue: Arc<Mutex<GoalQueue>>,
    active: Arc<Mutex<Option<ActiveGoal>>>,
    stop_flag: Arc<AtomicBool>,
    control_rate_hz: f64,
    sink: Arc<FeedbackSink>,
) {
    info!("motion engine worker started at {control_rate_hz}Hz");
    while !stop_flag.load(Ordering::SeqCst) {
        let goal = queue.lock().pop();
        let Some(goal) = goal else {
            thread::sleep(Duration::from_millis(50));
            continue;
        };

        let cancel_flag = Arc::new(AtomicBool::new(false));
        *active.lock() = Some(ActiveGoal {
            goal_id: goal.goal_id.clone(),
            cancel_flag: cancel_flag.clone(),
        });

        run_goal(&servo, &goal, &cancel_flag, control_rate_hz, &sink);

        *active.lock() = None;
    }
    info!("motion engine worker stopped");
}

fn run_goal(
    servo: &ServoController,
    goal: &MotionGoal,
    cancel_flag: &AtomicBool,
    f: f64,
    sink: &FeedbackSink,
) {
    let keyframes = goal.action.keyframes();
    let k_total = keyframes.len();
    if k_total == 0 {
        emit(sink, goal, GoalState::Failed, 0.0, servo, "unsupported action");
        return;
    }

    let emit_every = (f / 5.0).round().max(1.0) as u64;
    let start = Instant::now();
    let mut current = servo.get_current_pose();

    for (idx, keyframe) in keyframes.iter().enumerate() {
        let k = idx + 1;
        let steps = ((f * keyframe.duration_s.max(0.001)).round() as i64).max(1) as u64;

        for step in 1..=steps {
            if cancel_flag.load(Ordering::SeqCst) {
                emit(sink, goal, GoalState::Preempted, 0.0, servo, "cancelled");
                return;
            }

            let progress = ((k - 1) as f64 + step as f64 / steps as f64) / k_total as f64;
            if let Some(timeout_s) = goal.timeout_s {
                if start.elapsed().as_secs_f64() > timeout_s {
                    emit(sink, goal, GoalState::Aborted, progress, servo, "timeout");
                    return;
                }
            }

            let t = step as f64 / steps as f64;
            let mut step_pose = HashMap::new();
            for (joint, target_angle) in &keyframe.pose {
                let from = current
                    .get(joint)
                    .copied()
                    .or_else(|| servo.get_current_value(joint))
                    .unwrap_or(0.0);
                step_pose.insert(joint.clone(), from + (target_angle - from) * t);
            }

            if let Err(e) = servo.set_pose(&step_pose) {
                warn!("goal {}: bus error mid-sequence: {e}", goal.goal_id);
                emit(sink, goal, GoalState::Failed, progress, servo, &format!("bus error: {e}"));
                return;
            }

            if step % emit_every == 0 {
                emit(sink, goal, GoalState::Active, progress, servo, "in progress");
            }

            thread::sleep(Duration::from_secs_f64(1.0 / f));
        }

        for (joint, angle) in &keyframe.pose {
            current.insert(joint.clone(), *angle);
        }
    }

    emit(sink, goal, GoalState::Succeeded, 1.0, servo, "done");
}

fn emit(
    sink: &FeedbackSink,
    goal: &MotionGoal,
    status: GoalState,
    progress: f64,
    servo: &ServoController,
    message: &str,
) {
    let event = FeedbackEvent {
        goal_id: goal.goal_id.clone(),
        status,
        progress,
        current_pose: servo.get_current_pose(),
        message: message.to_string(),
        timestamp: SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs_f64(),
    };
    if catch_unwind(AssertUnwindSafe(|| sink(event))).is_err() {
        error!("feedback sink panicked for goal {}", goal.goal_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::motion::goal::{GoalAction, Keyframe};
    use crate::servo::config::parse_servo_map;
    use parking_lot::Mutex as PlMutex;
    use std::sync::mpsc;

    fn test_servo() -> Arc<ServoController> {
        let json = r#"{
            "servos": [
                {"name": "j0", "board_addr": "0x40", "channel": 0, "angle_min": 0, "angle_max": 180, "neutral": 90}
            ]
        }"#;
        let servos = parse_servo_map(json).unwrap();
        Arc::new(ServoController::new_simulated(servos, 50).unwrap())
    }

    fn collecting_sink() -> (FeedbackSink, mpsc::Receiver<FeedbackEvent>) {
        let (tx, rx) = mpsc::channel();
        let tx = PlMutex::new(tx);
        let sink: FeedbackSink = Box::new(move |event| {
            let _ = tx.lock().send(event);
        });
        (sink, rx)
    }

    #[test]
    fn test_single_pose_scenario() {
        let servo = test_servo();
        let (sink, rx) = collecting_sink();
        let mut engine = MotionEngine::new(servo.clone(), 50.0, sink);

        let goal = MotionGoal::new(
            "g1",
            GoalAction::Pose(Keyframe {
                duration_s: 0.02,
                pose: HashMap::from([("j0".to_string(), 180.0)]),
            }),
        )
        .with_priority(5);
        engine.push_goal(goal);

        let mut last = None;
        while let Ok(event) = rx.recv_timeout(Duration::from_secs(2)) {
            let done = event.status == GoalState::Succeeded;
            last = Some(event);
            if done {
                break;
            }
        }
        let last = last.expect("expected at least one feedback event");
        assert_eq!(last.status, GoalState::Succeeded);
        assert_eq!(last.progress, 1.0);
        assert_eq!(servo.get_current_value("j0"), Some(180.0));
        engine.stop();
    }

    #[test]
    fn test_priority_preemption_via_queue() {
        let servo = test_servo();
        let (sink, rx) = collecting_sink();
        let mut engine = MotionEngine::new(servo, 50.0, sink);

        // Hold the worker busy on a slow dummy goal so both A and B queue up
        // before either is popped.
        let blocker = MotionGoal::new(
            "blocker",
            GoalAction::Pose(Keyframe {
                duration_s: 0.05,
                pose: HashMap::from([("j0".to_string(), 90.0)]),
            }),
        )
        .with_priority(100);
        engine.push_goal(blocker);

        let goal_a = MotionGoal::new(
            "a",
            GoalAction::Pose(Keyframe {
                duration_s: 0.01,
                pose: HashMap::from([("j0".to_string(), 10.0)]),
            }),
        )
        .with_priority(1);
        let goal_b = MotionGoal::new(
            "b",
            GoalAction::Pose(Keyframe {
                duration_s: 0.01,
                pose: HashMap::from([("j0".to_string(), 170.0)]),
            }),
        )
        .with_priority(10);
        engine.push_goal(goal_a);
        engine.push_goal(goal_b);

        let mut finished_order = Vec::new();
        while finished_order.len() < 3 {
            let event = rx.recv_timeout(Duration::from_secs(2)).expect("feedback");
            if event.status == GoalState::Succeeded {
                finished_order.push(event.goal_id);
            }
        }
        let pos_a = finished_order.iter().position(|id| id == "a").unwrap();
        let pos_b = finished_order.iter().position(|id| id == "b").unwrap();
        assert!(pos_b < pos_a, "expected B (higher priority) to finish before A");
        engine.stop();
    }

    #[test]
    fn test_cancel_active_goal() {
        let servo = test_servo();
        let (sink, rx) = collecting_sink();
        let mut engine = MotionEngine::new(servo, 30.0, sink);

        let goal = MotionGoal::new(
            "long",
            GoalAction::Pose(Keyframe {
                duration_s: 10.0,
                pose: HashMap::from([("j0".to_string(), 0.0)]),
            }),
        );
        engine.push_goal(goal);
        thread::sleep(Duration::from_millis(100));
        assert!(engine.cancel_goal("long"));

        let mut saw_preempted = false;
        let mut saw_succeeded = false;
        while let Ok(event) = rx.recv_timeout(Duration::from_secs(1)) {
            match event.status {
                GoalState::Preempted => {
                    saw_preempted = true;
                    break;
                }
                GoalState::Succeeded => saw_succeeded = true,
                _ => {}
            }
        }
        assert!(saw_preempted);
        assert!(!saw_succeeded);
        engine.stop();
    }

    #[test]
    fn test_cancel_pending_goal_not_active() {
        let servo = test_servo();
        let (sink, _rx) = collecting_sink();
        let mut engine = MotionEngine::new(servo, 30.0, sink);

        let blocker = MotionGoal::new(
            "blocker",
            GoalAction::Pose(Keyframe {
                duration_s: 0.5,
                pose: HashMap::new(),
            }),
        );
        let pending = MotionGoal::new(
            "pending",
            GoalAction::Pose(Keyframe {
                duration_s: 0.1,
                pose: HashMap::new(),
            }),
        );
        engine.push_goal(blocker);
        engine.push_goal(pending);
        thread::sleep(Duration::from_millis(20));
        assert!(engine.cancel_goal("pending"));
        engine.stop();
    }

    #[test]
    fn test_cancel_unknown_goal_returns_false() {
        let servo = test_servo();
        let (sink, _rx) = collecting_sink();
        let mut engine = MotionEngine::new(servo, 30.0, sink);
        assert!(!engine.cancel_goal("nonexistent"));
        engine.stop();
    }
}
