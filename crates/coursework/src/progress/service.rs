use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info, warn};

use super::config::ProgressConfig;
use super::domain::{
    AttemptPhase, AttemptSubmission, Course, CourseAttempt, CourseId, CourseRegistration,
    CourseStanding, SubmissionError, UserId, UserProgress, UserRegistration, UserStanding,
};
use super::level::LevelProgression;
use super::ranking::RankingAggregator;
use super::reconciler::{AttemptReconciler, ReconcileOutcome, Reconciliation};
use super::repository::{ProgressRepository, RepositoryError, Settlement};
use super::scoring::{ScoringError, ScoringPolicy};

/// Outcome of a submission, as reported back to the client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmitResult {
    /// The record of truth for the pair after this submission.
    pub accepted: CourseAttempt,
    pub passed: bool,
    /// Points carried by the submission itself.
    pub points: u32,
    /// Best points on record for the pair.
    pub best_points: u32,
}

impl SubmitResult {
    pub fn phase(&self) -> AttemptPhase {
        self.accepted.phase
    }

    pub fn view(&self) -> SubmitResultView {
        SubmitResultView {
            passed: self.passed,
            course_id: self.accepted.course_id,
            points: self.points,
            best_points: self.best_points,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitResultView {
    pub passed: bool,
    pub course_id: CourseId,
    pub points: u32,
    pub best_points: u32,
}

/// Service composing the reconciler, scoring policy, and level curve over a repository.
pub struct ProgressCoordinator<R> {
    repository: Arc<R>,
    scoring: ScoringPolicy,
    levels: LevelProgression,
    reconciler: AttemptReconciler,
    ranking: RankingAggregator,
    points_per_task: u32,
}

impl<R> ProgressCoordinator<R>
where
    R: ProgressRepository + 'static,
{
    pub fn new(repository: Arc<R>, config: ProgressConfig) -> Result<Self, ProgressServiceError> {
        let scoring = ScoringPolicy::new(config.pass_threshold)?;
        Ok(Self {
            repository,
            scoring,
            levels: LevelProgression::new(),
            reconciler: AttemptReconciler::new(),
            ranking: RankingAggregator::new(),
            points_per_task: config.points_per_task,
        })
    }

    pub fn scoring(&self) -> &ScoringPolicy {
        &self.scoring
    }

    /// Validate and submit a raw result payload.
    pub fn submit_payload(
        &self,
        submission: AttemptSubmission,
    ) -> Result<SubmitResult, ProgressServiceError> {
        let attempt = submission.into_attempt().map_err(|err| {
            warn!(error = %err, "rejected course result payload");
            err
        })?;
        self.submit(attempt)
    }

    /// Record a started or finished attempt and apply any point award.
    pub fn submit(&self, attempt: CourseAttempt) -> Result<SubmitResult, ProgressServiceError> {
        let course = self
            .repository
            .course(attempt.course_id)?
            .ok_or(ProgressServiceError::CourseNotFound(attempt.course_id))?;
        if self.repository.user(attempt.user_id)?.is_none() {
            return Err(ProgressServiceError::UserNotFound(attempt.user_id));
        }

        match attempt.phase {
            AttemptPhase::Started => self.submit_started(attempt),
            AttemptPhase::Finished => self.submit_finished(attempt, &course),
        }
    }

    fn submit_started(&self, attempt: CourseAttempt) -> Result<SubmitResult, ProgressServiceError> {
        let points = attempt.points;
        let (user_id, course_id) = (attempt.user_id, attempt.course_id);
        let mut outcome = None;
        let settled = self.repository.settle_attempt(
            user_id,
            course_id,
            AttemptPhase::Started,
            &mut |_user: &UserProgress, existing: &[CourseAttempt]| {
                let reconciliation = self.reconciler.reconcile(attempt.clone(), existing);
                outcome = Some(reconciliation.outcome);
                Settlement::Save(reconciliation.kept)
            },
        )?;
        debug!(%user_id, %course_id, ?outcome, "reconciled started attempt");

        Ok(SubmitResult {
            best_points: settled.attempt.points,
            accepted: settled.attempt,
            passed: false,
            points,
        })
    }

    fn submit_finished(
        &self,
        attempt: CourseAttempt,
        course: &Course,
    ) -> Result<SubmitResult, ProgressServiceError> {
        let points = attempt.points;
        let (user_id, course_id) = (attempt.user_id, attempt.course_id);
        let mut verdict = None;
        let settled = self.repository.settle_attempt(
            user_id,
            course_id,
            AttemptPhase::Finished,
            &mut |user: &UserProgress, existing: &[CourseAttempt]| {
                let reconciliation = self.reconciler.reconcile(attempt.clone(), existing);
                let (settlement, decided) = self.settle_finished(reconciliation, user, course);
                verdict = Some(decided);
                settlement
            },
        )?;
        let verdict = verdict.ok_or_else(|| {
            RepositoryError::Unavailable("settlement completed without a decision".to_string())
        })?;
        debug!(
            %user_id,
            %course_id,
            outcome = ?verdict.outcome,
            kept_points = verdict.kept_points,
            passed = verdict.passed,
            "reconciled finished attempt"
        );

        if let Some(user) = &settled.user {
            info!(
                user_id = %user.id(),
                %course_id,
                award = verdict.award,
                total_points = user.points,
                level = user.level,
                "awarded points for passed course"
            );
        }

        Ok(SubmitResult {
            accepted: settled.attempt,
            passed: verdict.passed,
            points,
            best_points: verdict.kept_points,
        })
    }

    /// Score the kept record and work out what, if anything, the user earns.
    ///
    /// The award is the kept points minus whatever an earlier passing record
    /// for the pair already granted, so resubmissions never count twice.
    fn settle_finished(
        &self,
        reconciliation: Reconciliation,
        user: &UserProgress,
        course: &Course,
    ) -> (Settlement, FinishedVerdict) {
        let Reconciliation {
            mut kept,
            kept_points,
            outcome,
            previous,
        } = reconciliation;
        let passed = self.scoring.evaluate(kept_points, course.max_points);
        let verdict = |award| FinishedVerdict {
            outcome,
            kept_points,
            passed,
            award,
        };

        if !passed {
            let settlement = if outcome == ReconcileOutcome::RetainedExisting {
                Settlement::Retain(kept)
            } else {
                Settlement::Save(kept)
            };
            return (settlement, verdict(0));
        }

        kept.passed = true;
        let already_awarded = previous
            .filter(|best| best.passed)
            .map(|best| best.points)
            .unwrap_or(0);
        let award = kept_points.saturating_sub(already_awarded);
        if award == 0 {
            return (Settlement::Save(kept), verdict(0));
        }

        let mut user = user.clone();
        user.points = user.points.saturating_add(u64::from(award));
        let standing = self.levels.level_for(user.points);
        user.level = standing.level;
        user.next_level_threshold = standing.next_level_threshold;
        (Settlement::Award { attempt: kept, user }, verdict(award))
    }

    /// Create a learner at level 1 with the XP step towards level 2.
    pub fn register_user(
        &self,
        registration: UserRegistration,
    ) -> Result<UserProgress, ProgressServiceError> {
        let username = registration.username.trim().to_string();
        if username.is_empty() {
            return Err(SubmissionError::EmptyUsername.into());
        }
        let standing = self.levels.initial();
        let user =
            self.repository
                .insert_user(username, standing.level, standing.next_level_threshold)?;
        info!(user_id = %user.id(), "registered user");
        Ok(user)
    }

    /// Add a course whose max points follow from its task count.
    pub fn register_course(
        &self,
        registration: CourseRegistration,
    ) -> Result<Course, ProgressServiceError> {
        let name = registration.name.trim().to_string();
        if name.is_empty() {
            return Err(SubmissionError::EmptyCourseName.into());
        }
        let max_points = Course::max_points_for(registration.task_count, self.points_per_task);
        let course = self
            .repository
            .insert_course(name, registration.task_count, max_points)?;
        info!(course_id = %course.id(), max_points, "registered course");
        Ok(course)
    }

    pub fn user(&self, user_id: UserId) -> Result<UserProgress, ProgressServiceError> {
        self.repository
            .user(user_id)?
            .ok_or(ProgressServiceError::UserNotFound(user_id))
    }

    /// Courses the learner has started but not finished yet.
    pub fn started_courses(
        &self,
        user_id: UserId,
    ) -> Result<Vec<CourseAttempt>, ProgressServiceError> {
        self.user(user_id)?;
        Ok(self
            .repository
            .attempts_for_user(user_id, AttemptPhase::Started)?)
    }

    /// Best finished attempt per course for the learner.
    pub fn finished_courses(
        &self,
        user_id: UserId,
    ) -> Result<Vec<CourseAttempt>, ProgressServiceError> {
        self.user(user_id)?;
        let finished = self
            .repository
            .attempts_for_user(user_id, AttemptPhase::Finished)?;
        Ok(self.ranking.best_per_course(&finished).into_values().collect())
    }

    pub fn course_ranking(
        &self,
        user_id: UserId,
    ) -> Result<Vec<CourseStanding>, ProgressServiceError> {
        self.user(user_id)?;
        let finished = self
            .repository
            .attempts_for_user(user_id, AttemptPhase::Finished)?;
        Ok(self.ranking.course_ranking(&finished))
    }

    /// Every learner's finished result for one course, lowest points first.
    pub fn course_leaderboard(
        &self,
        course_id: CourseId,
    ) -> Result<Vec<CourseAttempt>, ProgressServiceError> {
        self.repository
            .course(course_id)?
            .ok_or(ProgressServiceError::CourseNotFound(course_id))?;
        let finished = self
            .repository
            .attempts_for_course(course_id, AttemptPhase::Finished)?;
        Ok(self.ranking.course_results_order(finished))
    }

    pub fn leaderboard(&self) -> Result<Vec<UserStanding>, ProgressServiceError> {
        let users = self.repository.users()?;
        Ok(self
            .ranking
            .leaderboard_order(users)
            .iter()
            .map(UserProgress::standing)
            .collect())
    }
}

#[derive(Debug, Clone, Copy)]
struct FinishedVerdict {
    outcome: ReconcileOutcome,
    kept_points: u32,
    passed: bool,
    award: u32,
}

/// Error raised by the progress coordinator.
#[derive(Debug, thiserror::Error)]
pub enum ProgressServiceError {
    #[error(transparent)]
    Invalid(#[from] SubmissionError),
    #[error(transparent)]
    Scoring(#[from] ScoringError),
    #[error("course {0} not found")]
    CourseNotFound(CourseId),
    #[error("user {0} not found")]
    UserNotFound(UserId),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}
