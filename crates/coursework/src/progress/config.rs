use serde::{Deserialize, Serialize};

/// Knobs injected into the progress engine at construction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressConfig {
    /// Fraction of a course's max points that must be exceeded to pass.
    pub pass_threshold: f64,
    /// Points each task contributes to a course's max points.
    pub points_per_task: u32,
}

impl Default for ProgressConfig {
    fn default() -> Self {
        Self {
            pass_threshold: 0.7,
            points_per_task: 10,
        }
    }
}
