//! Second-order PI controller converting time-offset samples into a parts-per-billion frequency
//! adjustment for the hardware clock.

use crate::{
    config::PiConfig,
    error::Error,
    error_log::ErrorLog,
    time::{f64_to_i32_saturating, log_interval_to_ns},
};

/// Error band in nanoseconds below which the loop gain is halved to damp steady-state dither.
const NARROW_BAND_THRESHOLD_NS: u32 = 100;

/// π, enough digits for loop tuning.
const PI: f64 = 3.141592;

/// The controller. One instance serves the authoritative slave domain.
#[derive(Debug, Clone)]
pub(crate) struct PiController {
    config: PiConfig,
    proportional: i32,
    integral: i32,
    output: i32,
    last_error_ns: i32,
}

impl PiController {
    pub(crate) const fn new(config: PiConfig) -> Self {
        Self {
            config,
            proportional: 0,
            integral: 0,
            output: 0,
            last_error_ns: 0,
        }
    }

    /// Drop all accumulated state. Called on absolute clock steps and on loss of sync; the caller
    /// resets the sync lock alongside.
    pub(crate) fn clear(&mut self) {
        self.proportional = 0;
        self.integral = 0;
        self.output = 0;
        self.last_error_ns = 0;
    }

    /// Feed one offset sample and return the new frequency adjustment in PPB.
    ///
    /// `error_ns` is positive when the local clock is ahead of the Grand Master.
    pub(crate) fn update(&mut self, sync_interval_log: i8, error_ns: i32, errs: &mut ErrorLog) -> i32 {
        // Sampling period from the current synchronization interval
        let dt = log_interval_to_ns(sync_interval_log) as f64 / 1_000_000_000.0;

        let mut w = 1.0;

        if dt != 0.0 && self.config.nat_freq_ratio != 0.0 {
            // Natural frequency: sampling frequency as angular frequency, divided by the
            // configured ratio
            w = ((2.0 * PI) / dt) / self.config.nat_freq_ratio;

            // Narrow band: once the loop has pulled the error under the threshold, halving the
            // natural frequency also halves both gains
            if error_ns.unsigned_abs() < NARROW_BAND_THRESHOLD_NS && w > 6.0 {
                w /= 2.0;
            }
        } else {
            errs.register(Error::DivisionByZero, None, None, None);
        }

        let kp = 2.0 * self.config.damping_ratio * w;
        let ki = w * w;

        self.proportional = f64_to_i32_saturating(error_ns as f64 * kp);
        self.integral = self
            .integral
            .saturating_add(f64_to_i32_saturating(error_ns as f64 * (ki * dt)));

        if self.config.integral_windup_limit != 0 {
            let limit = self.config.integral_windup_limit as i32;

            self.integral = self.integral.clamp(-limit, limit);
        }

        self.output = self.proportional.saturating_add(self.integral);
        self.last_error_ns = error_ns;

        self.output
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn controller(windup: u32) -> PiController {
        PiController::new(PiConfig {
            damping_ratio: 1.0,
            nat_freq_ratio: 30.0,
            integral_windup_limit: windup,
        })
    }

    #[test]
    fn zero_error_zero_output_from_reset() {
        let mut errs = ErrorLog::new();
        let mut pi = controller(0);

        assert_eq!(pi.update(-3, 0, &mut errs), 0);
    }

    #[test]
    fn output_opposes_error() {
        let mut errs = ErrorLog::new();
        let mut pi = controller(0);

        // Positive error (local clock ahead of GM) must yield a positive correction
        assert!(pi.update(-3, 10_000, &mut errs) > 0);

        pi.clear();

        assert!(pi.update(-3, -10_000, &mut errs) < 0);
    }

    #[test]
    fn integral_windup_clamped() {
        let mut errs = ErrorLog::new();

        let limit = 5_000u32;
        let mut pi = controller(limit);

        // Hold a large constant error; the integral term must never leave ±limit
        for _ in 0..1_000 {
            pi.update(0, 1_000_000, &mut errs);

            assert!(pi.integral <= limit as i32);
            assert!(pi.integral >= -(limit as i32));
        }

        pi.clear();

        for _ in 0..1_000 {
            pi.update(0, -1_000_000, &mut errs);

            assert!(pi.integral.abs() <= limit as i32);
        }
    }

    #[test]
    fn narrow_band_reduces_gain() {
        let mut errs = ErrorLog::new();

        let mut wide = controller(0);
        let mut narrow = controller(0);

        // At log -5 (31.25 ms) the natural frequency clears the ω > 6 gate
        let out_wide = wide.update(-5, 200, &mut errs);
        let out_narrow = narrow.update(-5, 50, &mut errs);

        // Per-nanosecond gain must be smaller inside the narrow band
        assert!((out_narrow as f64 / 50.0) < (out_wide as f64 / 200.0));
    }

    #[test]
    fn bad_config_logs_division_guard() {
        let mut errs = ErrorLog::new();
        let mut pi = PiController::new(PiConfig {
            damping_ratio: 1.0,
            nat_freq_ratio: 0.0,
            integral_windup_limit: 0,
        });

        pi.update(-3, 100, &mut errs);

        assert_eq!(errs.read(0).unwrap().kind, Some(Error::DivisionByZero));
    }
}
