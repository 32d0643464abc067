use std::collections::BTreeMap;

use super::domain::{CourseAttempt, CourseId, CourseStanding, UserProgress};

/// Leaderboards derived from finished attempts and user totals.
///
/// Orderings are ascending by points, matching the ranking endpoints this
/// service has always exposed.
#[derive(Debug, Clone, Copy, Default)]
pub struct RankingAggregator;

impl RankingAggregator {
    pub fn new() -> Self {
        Self
    }

    /// Best finished attempt per course; the first seen wins a tie.
    pub fn best_per_course(&self, attempts: &[CourseAttempt]) -> BTreeMap<CourseId, CourseAttempt> {
        let mut best: BTreeMap<CourseId, CourseAttempt> = BTreeMap::new();
        for attempt in attempts.iter().filter(|attempt| attempt.is_finished()) {
            let improves = best
                .get(&attempt.course_id)
                .map_or(true, |current| attempt.points > current.points);
            if improves {
                best.insert(attempt.course_id, attempt.clone());
            }
        }
        best
    }

    pub fn course_ranking(&self, attempts: &[CourseAttempt]) -> Vec<CourseStanding> {
        let mut standings: Vec<CourseStanding> = self
            .best_per_course(attempts)
            .into_values()
            .map(|attempt| CourseStanding {
                course_id: attempt.course_id,
                points: attempt.points,
            })
            .collect();
        standings.sort_by_key(|standing| standing.points);
        standings
    }

    /// Finished results for a single course, lowest first; equal points keep input order.
    pub fn course_results_order(&self, attempts: Vec<CourseAttempt>) -> Vec<CourseAttempt> {
        let mut results: Vec<CourseAttempt> = attempts
            .into_iter()
            .filter(|attempt| attempt.is_finished())
            .collect();
        results.sort_by_key(|attempt| attempt.points);
        results
    }

    /// Users ordered by cumulative points, lowest first; equal totals keep input order.
    pub fn leaderboard_order(&self, mut users: Vec<UserProgress>) -> Vec<UserProgress> {
        users.sort_by_key(|user| user.points);
        users
    }
}
