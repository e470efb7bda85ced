//! # PID controller
//!
//! A time aware PID controller with:
//!
//! - trapezoidal integration, with the integral sum limited in magnitude,
//! - integral reset whenever the error changes sign,
//! - integration skipped while the error is changing faster than the stability threshold,
//! - a low pass filter on the derivative term.
//!
//! Time is the timestamp of the measurement, not the time the controller is run at, so a
//! measurement which has not been updated since the last call gives a zero time step. Such calls,
//! and calls with a backwards time step, leave the integral and derivative untouched.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use comms_if::bus::records::PidGains;
use log::trace;

use super::{validate_gains, CtrlError, FeedbackController, LowPassFilter};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// A PID controller
#[derive(Debug, Clone)]
pub struct Pid {
    gains: PidGains,

    /// Derivative filter
    filter: LowPassFilter,

    /// Error and time of the last accepted measurement, `None` until the first call
    previous: Option<(f64, f64)>,

    /// The integral accumulation
    integral: f64,

    /// Unfiltered derivative of the last accepted measurement
    raw_derivative: f64,

    filtered_derivative: f64
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Pid {
    /// Create a new controller with the given gains.
    pub fn new(gains: PidGains) -> Result<Self, CtrlError> {
        validate_gains(&gains)?;

        Ok(Self {
            filter: LowPassFilter::new(gains.low_pass_gain),
            gains,
            previous: None,
            integral: 0.0,
            raw_derivative: 0.0,
            filtered_derivative: 0.0
        })
    }

    pub fn gains(&self) -> &PidGains {
        &self.gains
    }

    pub fn integral(&self) -> f64 {
        self.integral
    }

    /// The last unfiltered derivative of the error.
    pub fn raw_derivative(&self) -> f64 {
        self.raw_derivative
    }

    pub fn filtered_derivative(&self) -> f64 {
        self.filtered_derivative
    }

    /// The error of the last accepted measurement.
    pub fn previous_error(&self) -> Option<f64> {
        self.previous.map(|(e, _)| e)
    }

    /// Accept a new error measured at `time_s`.
    fn update_state(&mut self, error: f64, time_s: f64) {
        let (prev_error, prev_time_s) = match self.previous {
            Some(p) => p,
            None => {
                // Nothing to differentiate against yet
                self.previous = Some((error, time_s));
                return
            }
        };

        let dt = time_s - prev_time_s;
        if dt <= 0.0 {
            trace!("PID skipping update, dt = {} s", dt);
            return
        }

        if crossed_zero(error, prev_error) {
            self.integral = 0.0;
        }

        self.raw_derivative = (error - prev_error) / dt;
        self.filtered_derivative = self.filter.estimate(self.raw_derivative);

        let stable = match self.gains.stability_threshold {
            Some(t) => self.raw_derivative.abs() <= t,
            None => true
        };

        if stable {
            self.integral += (error + prev_error) / 2.0 * dt;

            if let Some(max) = self.gains.max_integral_sum {
                self.integral = util::maths::clamp(&self.integral, &-max, &max);
            }
        }

        self.previous = Some((error, time_s));
    }
}

impl FeedbackController for Pid {
    fn calculate(&mut self, reference: f64, state: f64, time_s: f64) -> f64 {
        if !(reference.is_finite() && state.is_finite() && time_s.is_finite()) {
            return std::f64::NAN
        }

        let error = reference - state;
        self.update_state(error, time_s);

        self.gains.k_p * error
            + self.gains.k_i * self.integral
            + self.gains.k_d * self.filtered_derivative
    }

    fn set_gains(&mut self, gains: &PidGains) -> Result<(), CtrlError> {
        validate_gains(gains)?;

        self.filter.set_gain(gains.low_pass_gain);
        self.gains = gains.clone();

        // A tighter limit applies straight away
        if let Some(max) = self.gains.max_integral_sum {
            self.integral = util::maths::clamp(&self.integral, &-max, &max);
        }

        Ok(())
    }

    fn reset(&mut self) {
        self.filter.reset();
        self.previous = None;
        self.integral = 0.0;
        self.raw_derivative = 0.0;
        self.filtered_derivative = 0.0;
    }
}

/// True if the error changed sign strictly, a zero on either side is not a crossing.
fn crossed_zero(error: f64, previous: f64) -> bool {
    (error > 0.0 && previous < 0.0) || (error < 0.0 && previous > 0.0)
}
