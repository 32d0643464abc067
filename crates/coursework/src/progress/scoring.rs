/// Pass/fail decision for a finished attempt.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoringPolicy {
    pass_threshold: f64,
}

impl ScoringPolicy {
    /// The threshold must lie in `(0, 1]`.
    pub fn new(pass_threshold: f64) -> Result<Self, ScoringError> {
        if !pass_threshold.is_finite() || pass_threshold <= 0.0 || pass_threshold > 1.0 {
            return Err(ScoringError::InvalidThreshold(pass_threshold));
        }
        Ok(Self { pass_threshold })
    }

    pub fn pass_threshold(&self) -> f64 {
        self.pass_threshold
    }

    /// Passed iff the earned ratio is strictly above the threshold.
    ///
    /// A course without obtainable points can never be passed.
    pub fn evaluate(&self, points_earned: u32, max_points: u32) -> bool {
        if max_points == 0 {
            return false;
        }
        let ratio = f64::from(points_earned) / f64::from(max_points);
        ratio > self.pass_threshold
    }
}

#[derive(Debug, Clone, Copy, PartialEq, thiserror::Error)]
pub enum ScoringError {
    #[error("pass threshold must be within (0, 1], got {0}")]
    InvalidThreshold(f64),
}
