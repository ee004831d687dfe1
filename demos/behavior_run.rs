//! This example demonstrates expanding a built-in quick task into a motion
//! goal and watching it run to completion via the feedback sink.

use std::sync::Arc;
use std::time::Duration;

use quad_motion::behavior::BehaviorLibrary;
use quad_motion::servo::config::parse_servo_map;
use quad_motion::servo::ServoController;
use quad_motion::MotionEngine;

fn main() {
    env_logger::init();

    let servo_map = r#"{
        "servos": [
            {"name": "fl_hip", "board_addr": "0x40", "channel": 0, "angle_min": 0, "angle_max": 180},
            {"name": "fl_knee", "board_addr": "0x40", "channel": 1, "angle_min": 0, "angle_max": 180},
            {"name": "fr_hip", "board_addr": "0x40", "channel": 2, "angle_min": 0, "angle_max": 180},
            {"name": "fr_knee", "board_addr": "0x40", "channel": 3, "angle_min": 0, "angle_max": 180},
            {"name": "bl_hip", "board_addr": "0x40", "channel": 4, "angle_min": 0, "angle_max": 180},
            {"name": "bl_knee", "board_addr": "0x40", "channel": 5, "angle_min": 0, "angle_max": 180},
            {"name": "br_hip", "board_addr": "0x40", "channel": 6, "angle_min": 0, "angle_max": 180},
            {"name": "br_knee", "board_addr": "0x40", "channel": 7, "angle_min": 0, "angle_max": 180}
        ]
    }"#;
    let servos = parse_servo_map(servo_map).expect("valid servo map");
    let controller = Arc::new(ServoController::new_simulated(servos, 30).expect("controller"));

    let mut engine = MotionEngine::new(
        controller,
        30.0,
        Box::new(|event| {
            println!("[{}] {:?} progress={:.2} ({})", event.goal_id, event.status, event.progress, event.message);
        }),
    );

    let library = BehaviorLibrary::empty();
    library
        .execute_quick_task("sit", 1.0, 5, &engine)
        .expect("sit is a built-in quick task");

    std::thread::sleep(Duration::from_millis(1200));
    engine.stop();
}
