use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Identifier of a registered learner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub u64);

/// Identifier of a course in the catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CourseId(pub u64);

/// Storage identity of a persisted attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AttemptId(pub u64);

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for CourseId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for AttemptId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identity and bookkeeping timestamps assigned by the repository.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordMeta<Id> {
    pub id: Id,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl<Id> RecordMeta<Id> {
    pub fn new(id: Id, now: DateTime<Utc>) -> Self {
        Self {
            id,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn touched(mut self, now: DateTime<Utc>) -> Self {
        self.updated_at = now;
        self
    }
}

/// Where a learner is within a course.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttemptPhase {
    Started,
    Finished,
}

impl AttemptPhase {
    pub fn label(&self) -> &'static str {
        match self {
            AttemptPhase::Started => "started",
            AttemptPhase::Finished => "finished",
        }
    }
}

impl FromStr for AttemptPhase {
    type Err = SubmissionError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim() {
            "started" => Ok(AttemptPhase::Started),
            "finished" => Ok(AttemptPhase::Finished),
            other => Err(SubmissionError::UnknownPhase(other.to_string())),
        }
    }
}

/// One learner's engagement with one course.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CourseAttempt {
    /// `None` until the repository has stored the attempt.
    pub meta: Option<RecordMeta<AttemptId>>,
    pub user_id: UserId,
    pub course_id: CourseId,
    pub phase: AttemptPhase,
    pub points: u32,
    pub passed: bool,
}

impl CourseAttempt {
    pub fn new(user_id: UserId, course_id: CourseId, phase: AttemptPhase, points: u32) -> Self {
        Self {
            meta: None,
            user_id,
            course_id,
            phase,
            points,
            passed: false,
        }
    }

    pub fn id(&self) -> Option<AttemptId> {
        self.meta.as_ref().map(|meta| meta.id)
    }

    pub fn is_finished(&self) -> bool {
        self.phase == AttemptPhase::Finished
    }

    pub fn same_pair(&self, other: &CourseAttempt) -> bool {
        self.user_id == other.user_id && self.course_id == other.course_id
    }

    pub fn view(&self) -> AttemptView {
        AttemptView {
            attempt_id: self.id(),
            user_id: self.user_id,
            course_id: self.course_id,
            phase: self.phase,
            points: self.points,
            passed: self.passed,
        }
    }
}

/// Raw result payload as decoded from the HTTP layer, before validation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttemptSubmission {
    pub user_id: UserId,
    pub course_id: CourseId,
    pub phase: String,
    pub points: i64,
    /// Clients may send it, but the server decides.
    #[serde(default)]
    pub passed: bool,
}

impl AttemptSubmission {
    /// Validate the payload into an unsaved attempt.
    pub fn into_attempt(self) -> Result<CourseAttempt, SubmissionError> {
        let phase = self.phase.parse::<AttemptPhase>()?;
        if self.points < 0 {
            return Err(SubmissionError::NegativePoints(self.points));
        }
        let points =
            u32::try_from(self.points).map_err(|_| SubmissionError::PointsOutOfRange(self.points))?;

        Ok(CourseAttempt::new(self.user_id, self.course_id, phase, points))
    }
}

/// Invalid submit payloads, rejected before any reconciliation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SubmissionError {
    #[error("unknown attempt phase '{0}', expected 'started' or 'finished'")]
    UnknownPhase(String),
    #[error("points must not be negative, got {0}")]
    NegativePoints(i64),
    #[error("points value {0} is out of range")]
    PointsOutOfRange(i64),
    #[error("username must not be empty")]
    EmptyUsername,
    #[error("course name must not be empty")]
    EmptyCourseName,
}

/// Scoring-relevant projection of a learner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProgress {
    pub meta: RecordMeta<UserId>,
    pub username: String,
    pub points: u64,
    pub level: u32,
    pub next_level_threshold: u64,
}

impl UserProgress {
    pub fn id(&self) -> UserId {
        self.meta.id
    }

    pub fn view(&self) -> UserProgressView {
        UserProgressView {
            user_id: self.meta.id,
            username: self.username.clone(),
            points: self.points,
            level: self.level,
            next_level: self.next_level_threshold,
        }
    }

    pub fn standing(&self) -> UserStanding {
        UserStanding {
            user_id: self.meta.id,
            username: self.username.clone(),
            points: self.points,
            level: self.level,
        }
    }
}

/// Course catalog entry; only `max_points` matters to scoring.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Course {
    pub meta: RecordMeta<CourseId>,
    pub name: String,
    pub task_count: u32,
    pub max_points: u32,
}

impl Course {
    pub fn id(&self) -> CourseId {
        self.meta.id
    }

    /// Points obtainable for a course made of `task_count` tasks.
    pub fn max_points_for(task_count: u32, points_per_task: u32) -> u32 {
        task_count.saturating_mul(points_per_task)
    }

    pub fn view(&self) -> CourseView {
        CourseView {
            course_id: self.meta.id,
            name: self.name.clone(),
            task_count: self.task_count,
            max_points: self.max_points,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProgressView {
    pub user_id: UserId,
    pub username: String,
    pub points: u64,
    pub level: u32,
    pub next_level: u64,
}

/// Leaderboard row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserStanding {
    pub user_id: UserId,
    pub username: String,
    pub points: u64,
    pub level: u32,
}

/// Per-course best result row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CourseStanding {
    pub course_id: CourseId,
    pub points: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CourseView {
    pub course_id: CourseId,
    pub name: String,
    pub task_count: u32,
    pub max_points: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttemptView {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attempt_id: Option<AttemptId>,
    pub user_id: UserId,
    pub course_id: CourseId,
    pub phase: AttemptPhase,
    pub points: u32,
    pub passed: bool,
}

/// Registration payload for a new learner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserRegistration {
    pub username: String,
}

/// Registration payload for a new course.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CourseRegistration {
    pub name: String,
    pub task_count: u32,
}
