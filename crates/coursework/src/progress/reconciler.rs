use serde::{Deserialize, Serialize};

use super::domain::{AttemptPhase, CourseAttempt};

/// How the submitted attempt relates to what was already on record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReconcileOutcome {
    /// Nothing comparable existed; the submission becomes a new record.
    Created,
    /// The submission takes over the identity of the existing record.
    Replaced,
    /// The existing record scored higher and stays as it was.
    RetainedExisting,
}

/// Result of reconciling one submission for a (user, course) pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reconciliation {
    pub kept: CourseAttempt,
    pub kept_points: u32,
    pub outcome: ReconcileOutcome,
    /// Best finished record that was on file before this submission.
    pub previous: Option<CourseAttempt>,
}

/// Decides which attempt is the current state for a (user, course) pair.
#[derive(Debug, Clone, Copy, Default)]
pub struct AttemptReconciler;

impl AttemptReconciler {
    pub fn new() -> Self {
        Self
    }

    /// `existing` may contain records of any phase; only those for the same
    /// pair and phase as `submitted` are considered.
    pub fn reconcile(
        &self,
        submitted: CourseAttempt,
        existing: &[CourseAttempt],
    ) -> Reconciliation {
        match submitted.phase {
            AttemptPhase::Started => self.reconcile_started(submitted, existing),
            AttemptPhase::Finished => self.reconcile_finished(submitted, existing),
        }
    }

    /// Highest-scoring finished record for the submission's pair, first seen on ties.
    pub fn best_finished<'a>(
        &self,
        submitted: &CourseAttempt,
        existing: &'a [CourseAttempt],
    ) -> Option<&'a CourseAttempt> {
        let mut best: Option<&'a CourseAttempt> = None;
        for attempt in existing
            .iter()
            .filter(|attempt| attempt.is_finished() && attempt.same_pair(submitted))
        {
            if best.map_or(true, |current| attempt.points > current.points) {
                best = Some(attempt);
            }
        }
        best
    }

    fn reconcile_started(
        &self,
        mut submitted: CourseAttempt,
        existing: &[CourseAttempt],
    ) -> Reconciliation {
        submitted.passed = false;
        let in_progress = existing.iter().find(|attempt| {
            attempt.phase == AttemptPhase::Started
                && attempt.same_pair(&submitted)
                && attempt.meta.is_some()
        });

        let outcome = match in_progress {
            Some(current) => {
                submitted.meta = current.meta.clone();
                ReconcileOutcome::Replaced
            }
            None => {
                submitted.meta = None;
                ReconcileOutcome::Created
            }
        };

        Reconciliation {
            kept_points: submitted.points,
            kept: submitted,
            outcome,
            previous: None,
        }
    }

    fn reconcile_finished(
        &self,
        mut submitted: CourseAttempt,
        existing: &[CourseAttempt],
    ) -> Reconciliation {
        submitted.passed = false;
        let previous = self.best_finished(&submitted, existing).cloned();

        match previous {
            None => {
                submitted.meta = None;
                Reconciliation {
                    kept_points: submitted.points,
                    kept: submitted,
                    outcome: ReconcileOutcome::Created,
                    previous: None,
                }
            }
            Some(best) if best.points > submitted.points => Reconciliation {
                kept_points: best.points,
                kept: best.clone(),
                outcome: ReconcileOutcome::RetainedExisting,
                previous: Some(best),
            },
            // Ties favour the most recent submission.
            Some(best) => {
                submitted.meta = best.meta.clone();
                Reconciliation {
                    kept_points: submitted.points,
                    kept: submitted,
                    outcome: ReconcileOutcome::Replaced,
                    previous: Some(best),
                }
            }
        }
    }
}
