use serde::{Deserialize, Serialize};

const BASE_INCREMENT: u64 = 100;
const INCREMENT_STEP: u64 = 10;
const INCREMENT_MULTIPLIER: f64 = 1.2;

/// Level reached for a points total, plus the XP step to the following level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LevelStanding {
    pub level: u32,
    pub next_level_threshold: u64,
}

/// Staircase mapping cumulative points to levels.
///
/// Level `i` (starting at 1) costs `floor((100 + 10 * i) * 1.2)` points. The
/// returned level is the first `i` whose running total exceeds the points,
/// and the threshold is that level's own increment.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LevelProgression;

impl LevelProgression {
    pub fn new() -> Self {
        Self
    }

    /// XP increment required by level `index`; the float product is truncated.
    pub fn increment_for(&self, index: u32) -> u64 {
        let raw = (BASE_INCREMENT + INCREMENT_STEP * u64::from(index)) as f64;
        (raw * INCREMENT_MULTIPLIER) as u64
    }

    pub fn level_for(&self, cumulative_points: u64) -> LevelStanding {
        let mut cumulative: u64 = 0;
        let mut index: u32 = 1;
        loop {
            let increment = self.increment_for(index);
            cumulative = cumulative.saturating_add(increment);
            // A saturated total stops the climb for inputs near u64::MAX.
            if cumulative > cumulative_points || cumulative == u64::MAX {
                return LevelStanding {
                    level: index,
                    next_level_threshold: increment,
                };
            }
            index += 1;
        }
    }

    /// Standing of a learner who has not earned anything yet.
    pub fn initial(&self) -> LevelStanding {
        self.level_for(0)
    }
}
