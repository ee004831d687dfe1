//! Pure angle→PWM conversion. Kept free of any bus/controller state so it is
//! reproducible bit-exact and trivially unit-testable.

use crate::servo::config::ServoConfig;

/// Converts a requested joint angle (degrees) into a 12-bit PCA9685-style duty
/// value, following the pipeline spec'd for this servo's calibration:
///
/// 1. apply `offset`
/// 2. mirror about 90° if `reversed`
/// 3. clamp into the reachable band (expressed in the post-reversal frame)
/// 4. map linearly across the *full* 0-180° range into `[min_pulse_us, max_pulse_us]`
/// 5. convert the pulse width into a 12-bit duty fraction of the PWM period at `freq_hz`
pub fn angle_to_duty12(requested_angle: f64, cfg: &ServoConfig, freq_hz: u16) -> u16 {
    let mut angle = requested_angle + cfg.offset;

    if cfg.reversed {
        angle = 180.0 - angle;
    }

    let (band_min, band_max) = if cfg.reversed {
        (180.0 - cfg.angle_max, 180.0 - cfg.angle_min)
    } else {
        (cfg.angle_min, cfg.angle_max)
    };
    angle = angle.clamp(band_min, band_max);

    let pulse_range = (cfg.max_pulse_us - cfg.min_pulse_us) as f64;
    let us = cfg.min_pulse_us as f64 + (angle / 180.0) * pulse_range;

    let period_us = 1_000_000.0 / freq_hz as f64;
    let duty_fraction = (us / period_us).clamp(0.0, 1.0);
    (duty_fraction * 4096.0).round().clamp(0.0, 4095.0) as u16
}

/// Expands a 12-bit duty value to the 16-bit range the [`crate::bus::PwmBus`]
/// interface expects.
pub fn duty12_to_duty16(duty12: u16) -> u16 {
    ((duty12 as f64 / 4095.0) * 65535.0).round() as u16
}

/// Convenience: angle straight to a 16-bit duty value for a given servo and
/// frequency.
pub fn angle_to_duty16(requested_angle: f64, cfg: &ServoConfig, freq_hz: u16) -> u16 {
    duty12_to_duty16(angle_to_duty12(requested_angle, cfg, freq_hz))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cfg(angle_min: f64, angle_max: f64, offset: f64, reversed: bool) -> ServoConfig {
        ServoConfig {
            name: "test".to_string(),
            board_addr: 0x40,
            channel: 0,
            angle_min,
            angle_max,
            neutral: None,
            offset,
            reversed,
            min_pulse_us: 500,
            max_pulse_us: 2500,
        }
    }

    #[test]
    fn test_neutral_symmetric_under_reversal() {
        // Reversal is mirror-symmetric about 90 degrees (given offset = 0):
        // the neutral of a symmetric range maps to the same duty either way.
        let c = cfg(0.0, 180.0, 0.0, false);
        let r = cfg(0.0, 180.0, 0.0, true);
        assert_eq!(
            angle_to_duty12(c.resolved_neutral(), &c, 50),
            angle_to_duty12(r.resolved_neutral(), &r, 50)
        );
    }

    #[test]
    fn test_monotonic_with_pulse_order() {
        let c = cfg(0.0, 180.0, 0.0, false);
        assert!(angle_to_duty12(c.angle_min, &c, 50) < angle_to_duty12(c.angle_max, &c, 50));
    }

    #[test]
    fn test_single_pose_scenario() {
        // From spec.md §8 scenario 1: j0 range [0,180], pulses 500/2500, freq 50.
        let c = cfg(0.0, 180.0, 0.0, false);
        let duty12 = angle_to_duty12(180.0, &c, 50);
        assert_eq!(duty12, 512);
    }

    #[test]
    fn test_reversed_joint_scenario() {
        // From spec.md §8 scenario 4: reversed joint, command angle 0 -> post-reverse 180 -> max pulse.
        let c = cfg(0.0, 180.0, 0.0, true);
        let duty12 = angle_to_duty12(0.0, &c, 50);
        let max_duty12 = angle_to_duty12(180.0, &cfg(0.0, 180.0, 0.0, false), 50);
        assert_eq!(duty12, max_duty12);
    }

    #[test]
    fn test_offset_applied_before_clamp() {
        let c = cfg(0.0, 90.0, 10.0, false);
        // Requesting 85 + offset 10 = 95, clamps to band max 90.
        let clamped = angle_to_duty12(85.0, &c, 50);
        let at_max = angle_to_duty12(80.0, &c, 50); // 80 + 10 = 90, exactly at the band edge.
        assert_eq!(clamped, at_max);
    }

    #[test]
    fn test_duty16_expansion_bounds() {
        assert_eq!(duty12_to_duty16(0), 0);
        assert_eq!(duty12_to_duty16(4095), 65535);
    }
}
