//! # Trajectory profiles
//!
//! Point to point motion uses a quintic blend, which starts and finishes with zero velocity and
//! acceleration:
//!
//! ```text
//! s = t / T
//! x(t) = x0 + (xd - x0) (10 s^3 - 15 s^4 + 6 s^5)
//! ```
//!
//! The profile is sampled at a fixed interval from `t = 0`, with a final sample at exactly
//! `t = T`. Velocity and acceleration are backward differences of the sampled position and
//! velocity, so the profile is exactly what the controller will be asked to follow.

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// Largest number of samples a single profile may hold.
pub const MAX_PROFILE_SAMPLES: usize = 100_000;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// One point of a profile.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct ProfileSample {
    /// Time since the start of the profile
    ///
    /// Units: seconds
    pub time_s: f64,

    pub position: f64,
    pub velocity: f64,
    pub acceleration: f64
}

/// An immutable, time indexed set of setpoints.
#[derive(Debug, Clone, PartialEq)]
pub struct TrajProfile {
    samples: Vec<ProfileSample>,

    sample_interval_s: f64
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum ProfileError {
    #[error("Profile duration must be positive and finite, found {0} s")]
    InvalidDuration(f64),

    #[error("Profile sample interval must be positive and finite, found {0} s")]
    InvalidSampleInterval(f64),

    #[error("Profile end points must be finite, found {0} to {1}")]
    InvalidEndPoints(f64, f64),

    #[error(
        "A {0} s profile sampled every {1} s would exceed {} samples",
        MAX_PROFILE_SAMPLES
    )]
    TooManySamples(f64, f64)
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl TrajProfile {
    /// Generate a quintic profile from `x0` to `xd` lasting `duration_s`.
    pub fn quintic(
        x0: f64,
        xd: f64,
        duration_s: f64,
        sample_interval_s: f64
    ) -> Result<Self, ProfileError> {
        if !duration_s.is_finite() || duration_s <= 0.0 {
            return Err(ProfileError::InvalidDuration(duration_s))
        }
        if !sample_interval_s.is_finite() || sample_interval_s <= 0.0 {
            return Err(ProfileError::InvalidSampleInterval(sample_interval_s))
        }
        if !x0.is_finite() || !xd.is_finite() {
            return Err(ProfileError::InvalidEndPoints(x0, xd))
        }

        let num_steps = (duration_s / sample_interval_s).ceil();
        if num_steps >= MAX_PROFILE_SAMPLES as f64 {
            return Err(ProfileError::TooManySamples(duration_s, sample_interval_s))
        }

        // Sample times, dropping any regular sample which would land on or just before the end
        let min_last_step_s = sample_interval_s * 1e-6;
        let mut times: Vec<f64> = (0..num_steps as usize)
            .map(|i| i as f64 * sample_interval_s)
            .filter(|t| *t < duration_s - min_last_step_s)
            .collect();
        times.push(duration_s);

        let mut samples: Vec<ProfileSample> = Vec::with_capacity(times.len());

        for (i, &t) in times.iter().enumerate() {
            let s = t / duration_s;
            let blend = 10.0 * s.powi(3) - 15.0 * s.powi(4) + 6.0 * s.powi(5);
            let position = x0 + (xd - x0) * blend;

            let (velocity, acceleration) = match i {
                0 => (0.0, 0.0),
                _ => {
                    let prev = &samples[i - 1];
                    let dt = t - prev.time_s;
                    let velocity = (position - prev.position) / dt;
                    (velocity, (velocity - prev.velocity) / dt)
                }
            };

            samples.push(ProfileSample {
                time_s: t,
                position,
                velocity,
                acceleration
            });
        }

        // The blend polynomial lands on xd up to rounding, make it exact
        if let Some(last) = samples.last_mut() {
            last.position = xd;
        }

        Ok(Self {
            samples,
            sample_interval_s
        })
    }

    /// Index of the sample which applies `elapsed_s` seconds after the start.
    ///
    /// Times before the start give the first sample, times after the end give the last.
    pub fn index_at(&self, elapsed_s: f64) -> usize {
        let last = self.samples.len() - 1;

        if elapsed_s >= self.duration_s() {
            last
        }
        else if elapsed_s > 0.0 {
            ((elapsed_s / self.sample_interval_s).floor() as usize).min(last)
        }
        else {
            0
        }
    }

    /// The sample which applies `elapsed_s` seconds after the start.
    pub fn sample_at(&self, elapsed_s: f64) -> &ProfileSample {
        &self.samples[self.index_at(elapsed_s)]
    }

    /// Returns true once `elapsed_s` has reached the end of the profile.
    pub fn is_finished(&self, elapsed_s: f64) -> bool {
        elapsed_s >= self.duration_s()
    }

    pub fn duration_s(&self) -> f64 {
        self.last().time_s
    }

    pub fn samples(&self) -> &[ProfileSample] {
        &self.samples
    }

    /// The final sample.
    pub fn last(&self) -> &ProfileSample {
        // Construction always pushes the end sample
        &self.samples[self.samples.len() - 1]
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_boundaries() {
        // Forwards, backwards and a duration off the sample grid
        for &(x0, xd, duration_s) in [
            (0.25, 1.25, 2.0),
            (1.0, -0.5, 3.0),
            (0.0, 0.8, 1.234),
            (-2.0, -2.5, 0.5)
        ].iter() {
            let p = TrajProfile::quintic(x0, xd, duration_s, 0.01).unwrap();
            let first = p.samples()[0];
            let last = *p.last();
            let max_speed = 1.875 * (xd - x0).abs() / duration_s;

            assert_eq!(first.time_s, 0.0);
            assert_eq!(first.position, x0);
            assert_eq!(first.velocity, 0.0);
            assert_eq!(first.acceleration, 0.0);

            assert_eq!(last.time_s, duration_s);
            assert_eq!(last.position, xd);
            assert!(last.velocity.abs() < 0.05 * max_speed + 1e-9);
        }

        let p = TrajProfile::quintic(0.25, 1.25, 2.0, 0.01).unwrap();
        assert_eq!(p.samples().len(), 201);
    }

    #[test]
    fn test_shape() {
        let p = TrajProfile::quintic(0.0, 1.0, 1.0, 0.01).unwrap();

        // Monotonic position, peak velocity near 1.875 at the middle
        for w in p.samples().windows(2) {
            assert!(w[1].position >= w[0].position);
            assert!(w[1].time_s > w[0].time_s);
        }
        let mid = p.sample_at(0.505);
        assert!((mid.position - 0.5).abs() < 1e-9);
        assert!((mid.velocity - 1.875).abs() < 0.02);

        // Moving backwards gives negative velocities
        let back = TrajProfile::quintic(1.0, 0.0, 1.0, 0.01).unwrap();
        assert!(back.sample_at(0.5).velocity < 0.0);
    }

    #[test]
    fn test_uneven_last_step() {
        let p = TrajProfile::quintic(0.0, 1.0, 0.25, 0.1).unwrap();
        let times: Vec<f64> = p.samples().iter().map(|s| s.time_s).collect();

        assert_eq!(times.len(), 4);
        assert!((times[2] - 0.2).abs() < 1e-12);
        assert_eq!(times[3], 0.25);
        assert!(p.samples().iter().all(|s| s.velocity.is_finite()));
    }

    #[test]
    fn test_indexing() {
        let p = TrajProfile::quintic(0.0, 1.0, 1.0, 0.1).unwrap();

        assert_eq!(p.index_at(-1.0), 0);
        assert_eq!(p.index_at(0.0), 0);
        assert_eq!(p.index_at(0.15), 1);
        assert_eq!(p.index_at(0.99), 9);
        assert_eq!(p.index_at(1.0), 10);
        assert_eq!(p.index_at(50.0), 10);
        assert_eq!(p.sample_at(50.0).position, 1.0);
        assert!(p.is_finished(1.0));
        assert!(!p.is_finished(0.99));
    }

    #[test]
    fn test_invalid() {
        assert_eq!(
            TrajProfile::quintic(0.0, 1.0, 0.0, 0.1),
            Err(ProfileError::InvalidDuration(0.0))
        );
        assert!(matches!(
            TrajProfile::quintic(0.0, 1.0, std::f64::NAN, 0.1),
            Err(ProfileError::InvalidDuration(_))
        ));
        assert_eq!(
            TrajProfile::quintic(0.0, 1.0, 1.0, -0.1),
            Err(ProfileError::InvalidSampleInterval(-0.1))
        );
        assert!(TrajProfile::quintic(std::f64::INFINITY, 1.0, 1.0, 0.1).is_err());
    }

    #[test]
    fn test_sample_limit() {
        assert_eq!(
            TrajProfile::quintic(0.0, 1.0, 1.0e6, 0.1),
            Err(ProfileError::TooManySamples(1.0e6, 0.1))
        );
        assert!(matches!(
            TrajProfile::quintic(0.0, 1.0, 1.0e9, 0.1),
            Err(ProfileError::TooManySamples(_, _))
        ));

        // Just under the limit is fine
        let p = TrajProfile::quintic(0.0, 1.0, 9_999.0, 0.1).unwrap();
        assert_eq!(p.samples().len(), 99_991);
    }
}
