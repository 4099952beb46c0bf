use std::fmt;
use std::ops::{Add, Mul, Sub};

/// A confidence score clamped to `[0, 1]`.
///
/// Clamping happens on every construction and every arithmetic op, so a
/// `Confidence` in hand is always in range; callers never re-check it.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, serde::Serialize, serde::Deserialize)]
pub struct Confidence(f64);

impl Confidence {
    pub fn new(value: f64) -> Self {
        Confidence(value.clamp(0.0, 1.0))
    }

    pub fn value(&self) -> f64 {
        self.0
    }
}

impl Default for Confidence {
    fn default() -> Self {
        Confidence(1.0)
    }
}

impl From<f64> for Confidence {
    fn from(value: f64) -> Self {
        Confidence::new(value)
    }
}

impl From<Confidence> for f64 {
    fn from(c: Confidence) -> Self {
        c.0
    }
}

impl fmt::Display for Confidence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.3}", self.0)
    }
}

impl Add for Confidence {
    type Output = Confidence;
    fn add(self, rhs: Self) -> Self::Output {
        Confidence::new(self.0 + rhs.0)
    }
}

impl Sub for Confidence {
    type Output = Confidence;
    fn sub(self, rhs: Self) -> Self::Output {
        Confidence::new(self.0 - rhs.0)
    }
}

impl Mul<f64> for Confidence {
    type Output = Confidence;
    fn mul(self, rhs: f64) -> Self::Output {
        Confidence::new(self.0 * rhs)
    }
}

/// Blends a prior confidence toward 1.0 by a step of `alpha * (1 - prior)`,
/// the reinforcement-on-repeat-observation rule used by entity/relationship
/// upserts (§4.5).
pub fn reinforce(prior: Confidence, alpha: f64) -> Confidence {
    Confidence::new(prior.value() + alpha * (1.0 - prior.value()))
}
