use super::domain::{AttemptPhase, Course, CourseAttempt, CourseId, UserId, UserProgress};

/// What to persist for a (user, course) pair once a submission is decided.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Settlement {
    /// The stored record already reflects the outcome; nothing is written.
    Retain(CourseAttempt),
    /// Insert or update the attempt, leaving the user as stored.
    Save(CourseAttempt),
    /// Write the attempt and the user's updated totals together.
    Award {
        attempt: CourseAttempt,
        user: UserProgress,
    },
}

/// Records as they stand after a settlement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settled {
    pub attempt: CourseAttempt,
    /// Present only when the settlement granted points.
    pub user: Option<UserProgress>,
}

/// Storage abstraction so the coordinator can be exercised in isolation.
///
/// Concurrency contract: `settle_attempt` reads the pair's attempts and the
/// user, runs `decide`, and writes the returned settlement as one unit.
/// Implementations must hold a lock (or transaction) covering the user and
/// the pair across all three steps, so two submissions for the same pair
/// never decide against the same snapshot. An `Award` writes the attempt and
/// the user atomically; a failure leaves neither behind.
pub trait ProgressRepository: Send + Sync {
    fn course(&self, id: CourseId) -> Result<Option<Course>, RepositoryError>;
    fn insert_course(&self, name: String, task_count: u32, max_points: u32)
        -> Result<Course, RepositoryError>;

    fn user(&self, id: UserId) -> Result<Option<UserProgress>, RepositoryError>;
    fn users(&self) -> Result<Vec<UserProgress>, RepositoryError>;
    fn insert_user(
        &self,
        username: String,
        level: u32,
        next_level_threshold: u64,
    ) -> Result<UserProgress, RepositoryError>;

    fn attempts_for_user(
        &self,
        user_id: UserId,
        phase: AttemptPhase,
    ) -> Result<Vec<CourseAttempt>, RepositoryError>;
    /// Every learner's attempts for one course in the given phase.
    fn attempts_for_course(
        &self,
        course_id: CourseId,
        phase: AttemptPhase,
    ) -> Result<Vec<CourseAttempt>, RepositoryError>;

    /// Decide and persist a submission for the pair under one write lock.
    ///
    /// `decide` receives the user as stored and the pair's attempts in
    /// `phase`. A missing user yields `RepositoryError::NotFound`.
    fn settle_attempt(
        &self,
        user_id: UserId,
        course_id: CourseId,
        phase: AttemptPhase,
        decide: &mut dyn FnMut(&UserProgress, &[CourseAttempt]) -> Settlement,
    ) -> Result<Settled, RepositoryError>;
}

/// Error enumeration for repository failures.
#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("record already exists")]
    Conflict,
    #[error("record not found")]
    NotFound,
    #[error("repository unavailable: {0}")]
    Unavailable(String),
}
