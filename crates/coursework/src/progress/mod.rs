//! Course attempt progress and scoring.
//!
//! Submitted attempts are reconciled against what is on record for the same
//! (user, course) pair, finished attempts are scored against the course's max
//! points, and passing results feed the learner's points and level.

pub mod config;
pub mod domain;
pub mod level;
pub mod ranking;
pub mod reconciler;
pub mod repository;
pub mod router;
pub mod scoring;
pub mod service;

#[cfg(test)]
mod tests;

pub use config::ProgressConfig;
pub use domain::{
    AttemptId, AttemptPhase, AttemptSubmission, AttemptView, Course, CourseAttempt, CourseId,
    CourseRegistration, CourseStanding, CourseView, RecordMeta, SubmissionError, UserId,
    UserProgress, UserProgressView, UserRegistration, UserStanding,
};
pub use level::{LevelProgression, LevelStanding};
pub use ranking::RankingAggregator;
pub use reconciler::{AttemptReconciler, ReconcileOutcome, Reconciliation};
pub use repository::{ProgressRepository, RepositoryError, Settled, Settlement};
pub use router::progress_router;
pub use scoring::{ScoringError, ScoringPolicy};
pub use service::{ProgressCoordinator, ProgressServiceError, SubmitResult, SubmitResultView};
