//! This example demonstrates loading a servo map and sweeping a single joint
//! across its full range on a simulated bus.

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use quad_motion::servo::config::parse_servo_map;
use quad_motion::servo::ServoController;

fn main() {
    env_logger::init();

    let servo_map = r#"{
        "servos": [
            {"name": "fl_hip", "board_addr": "0x40", "channel": 0, "angle_min": 0, "angle_max": 180, "neutral": 90}
        ]
    }"#;
    let servos = parse_servo_map(servo_map).expect("valid servo map");
    let controller = Arc::new(ServoController::new_simulated(servos, 50).expect("controller"));

    for angle in [0.0, 45.0, 90.0, 135.0, 180.0, 90.0] {
        controller.set_servo_angle("fl_hip", angle).expect("write");
        println!("fl_hip -> {angle} deg (cache: {:?})", controller.get_current_value("fl_hip"));
        thread::sleep(Duration::from_millis(200));
    }

    controller.emergency_stop(true).expect("e-stop");
    println!("after emergency stop: {:?}", controller.get_current_pose());
}
