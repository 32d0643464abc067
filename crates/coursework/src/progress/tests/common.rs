use std::collections::BTreeMap;
use std::sync::{Arc, Barrier, Mutex};

use axum::response::Response;
use chrono::{TimeZone, Utc};
use serde_json::Value;

use crate::progress::domain::{
    AttemptId, AttemptPhase, AttemptSubmission, Course, CourseAttempt, CourseId, RecordMeta,
    UserId, UserProgress,
};
use crate::progress::repository::{ProgressRepository, RepositoryError, Settled, Settlement};
use crate::progress::{progress_router, ProgressConfig, ProgressCoordinator};

pub(super) fn progress_config() -> ProgressConfig {
    ProgressConfig {
        pass_threshold: 0.7,
        points_per_task: 10,
    }
}

pub(super) fn meta<Id>(id: Id) -> RecordMeta<Id> {
    let at = Utc
        .with_ymd_and_hms(2025, 3, 1, 9, 30, 0)
        .single()
        .expect("valid timestamp");
    RecordMeta::new(id, at)
}

pub(super) fn stored_attempt(
    id: u64,
    user: u64,
    course: u64,
    phase: AttemptPhase,
    points: u32,
) -> CourseAttempt {
    CourseAttempt {
        meta: Some(meta(AttemptId(id))),
        ..CourseAttempt::new(UserId(user), CourseId(course), phase, points)
    }
}

pub(super) fn finished(user: u64, course: u64, points: u32) -> CourseAttempt {
    CourseAttempt::new(UserId(user), CourseId(course), AttemptPhase::Finished, points)
}

pub(super) fn started(user: u64, course: u64, points: u32) -> CourseAttempt {
    CourseAttempt::new(UserId(user), CourseId(course), AttemptPhase::Started, points)
}

pub(super) fn submission(user: u64, course: u64, phase: &str, points: i64) -> AttemptSubmission {
    AttemptSubmission {
        user_id: UserId(user),
        course_id: CourseId(course),
        phase: phase.to_string(),
        points,
        passed: false,
    }
}

pub(super) fn user(id: u64, username: &str, points: u64) -> UserProgress {
    UserProgress {
        meta: meta(UserId(id)),
        username: username.to_string(),
        points,
        level: 1,
        next_level_threshold: 132,
    }
}

#[derive(Default)]
pub(super) struct Tables {
    pub(super) courses: BTreeMap<CourseId, Course>,
    pub(super) users: BTreeMap<UserId, UserProgress>,
    pub(super) attempts: BTreeMap<AttemptId, CourseAttempt>,
    next_id: u64,
}

impl Tables {
    fn next_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }

    fn upsert_attempt(&mut self, mut attempt: CourseAttempt) -> CourseAttempt {
        let now = Utc::now();
        attempt.meta = match attempt.meta.take() {
            Some(meta) => Some(meta.touched(now)),
            None => Some(RecordMeta::new(AttemptId(self.next_id()), now)),
        };
        if let Some(meta) = &attempt.meta {
            self.attempts.insert(meta.id, attempt.clone());
        }
        attempt
    }

    fn pair_attempts(
        &self,
        user_id: UserId,
        course_id: CourseId,
        phase: AttemptPhase,
    ) -> Vec<CourseAttempt> {
        self.attempts
            .values()
            .filter(|attempt| attempt.user_id == user_id && attempt.course_id == course_id)
            .filter(|attempt| attempt.phase == phase)
            .cloned()
            .collect()
    }

    fn apply(&mut self, settlement: Settlement) -> Settled {
        match settlement {
            Settlement::Retain(attempt) => Settled {
                attempt,
                user: None,
            },
            Settlement::Save(attempt) => Settled {
                attempt: self.upsert_attempt(attempt),
                user: None,
            },
            Settlement::Award { attempt, mut user } => {
                user.meta = user.meta.touched(Utc::now());
                let attempt = self.upsert_attempt(attempt);
                self.users.insert(user.id(), user.clone());
                Settled {
                    attempt,
                    user: Some(user),
                }
            }
        }
    }
}

#[derive(Default, Clone)]
pub(super) struct MemoryRepository {
    pub(super) tables: Arc<Mutex<Tables>>,
}

impl MemoryRepository {
    pub(super) fn with_course(&self, max_points: u32) -> CourseId {
        self.insert_course("Spanish basics".to_string(), max_points / 10, max_points)
            .expect("course inserted")
            .id()
    }

    pub(super) fn with_user(&self, username: &str) -> UserId {
        self.insert_user(username.to_string(), 1, 132)
            .expect("user inserted")
            .id()
    }

    pub(super) fn all_attempts(&self) -> Vec<CourseAttempt> {
        let guard = self.tables.lock().expect("repository mutex poisoned");
        guard.attempts.values().cloned().collect()
    }

    pub(super) fn stored_user(&self, id: UserId) -> UserProgress {
        let guard = self.tables.lock().expect("repository mutex poisoned");
        guard.users.get(&id).cloned().expect("user present")
    }
}

impl ProgressRepository for MemoryRepository {
    fn course(&self, id: CourseId) -> Result<Option<Course>, RepositoryError> {
        let guard = self.tables.lock().expect("repository mutex poisoned");
        Ok(guard.courses.get(&id).cloned())
    }

    fn insert_course(
        &self,
        name: String,
        task_count: u32,
        max_points: u32,
    ) -> Result<Course, RepositoryError> {
        let mut guard = self.tables.lock().expect("repository mutex poisoned");
        let id = CourseId(guard.next_id());
        let course = Course {
            meta: RecordMeta::new(id, Utc::now()),
            name,
            task_count,
            max_points,
        };
        guard.courses.insert(id, course.clone());
        Ok(course)
    }

    fn user(&self, id: UserId) -> Result<Option<UserProgress>, RepositoryError> {
        let guard = self.tables.lock().expect("repository mutex poisoned");
        Ok(guard.users.get(&id).cloned())
    }

    fn users(&self) -> Result<Vec<UserProgress>, RepositoryError> {
        let guard = self.tables.lock().expect("repository mutex poisoned");
        Ok(guard.users.values().cloned().collect())
    }

    fn insert_user(
        &self,
        username: String,
        level: u32,
        next_level_threshold: u64,
    ) -> Result<UserProgress, RepositoryError> {
        let mut guard = self.tables.lock().expect("repository mutex poisoned");
        if guard.users.values().any(|user| user.username == username) {
            return Err(RepositoryError::Conflict);
        }
        let id = UserId(guard.next_id());
        let user = UserProgress {
            meta: RecordMeta::new(id, Utc::now()),
            username,
            points: 0,
            level,
            next_level_threshold,
        };
        guard.users.insert(id, user.clone());
        Ok(user)
    }

    fn attempts_for_user(
        &self,
        user_id: UserId,
        phase: AttemptPhase,
    ) -> Result<Vec<CourseAttempt>, RepositoryError> {
        let guard = self.tables.lock().expect("repository mutex poisoned");
        Ok(guard
            .attempts
            .values()
            .filter(|attempt| attempt.user_id == user_id && attempt.phase == phase)
            .cloned()
            .collect())
    }

    fn attempts_for_course(
        &self,
        course_id: CourseId,
        phase: AttemptPhase,
    ) -> Result<Vec<CourseAttempt>, RepositoryError> {
        let guard = self.tables.lock().expect("repository mutex poisoned");
        Ok(guard
            .attempts
            .values()
            .filter(|attempt| attempt.course_id == course_id && attempt.phase == phase)
            .cloned()
            .collect())
    }

    fn settle_attempt(
        &self,
        user_id: UserId,
        course_id: CourseId,
        phase: AttemptPhase,
        decide: &mut dyn FnMut(&UserProgress, &[CourseAttempt]) -> Settlement,
    ) -> Result<Settled, RepositoryError> {
        let mut guard = self.tables.lock().expect("repository mutex poisoned");
        let user = guard
            .users
            .get(&user_id)
            .cloned()
            .ok_or(RepositoryError::NotFound)?;
        let existing = guard.pair_attempts(user_id, course_id, phase);
        let settlement = decide(&user, &existing);
        Ok(guard.apply(settlement))
    }
}

/// Reads and plain saves succeed, but any settlement granting points aborts.
#[derive(Default, Clone)]
pub(super) struct AwardFailingRepository {
    pub(super) inner: MemoryRepository,
}

impl ProgressRepository for AwardFailingRepository {
    fn course(&self, id: CourseId) -> Result<Option<Course>, RepositoryError> {
        self.inner.course(id)
    }

    fn insert_course(
        &self,
        name: String,
        task_count: u32,
        max_points: u32,
    ) -> Result<Course, RepositoryError> {
        self.inner.insert_course(name, task_count, max_points)
    }

    fn user(&self, id: UserId) -> Result<Option<UserProgress>, RepositoryError> {
        self.inner.user(id)
    }

    fn users(&self) -> Result<Vec<UserProgress>, RepositoryError> {
        self.inner.users()
    }

    fn insert_user(
        &self,
        username: String,
        level: u32,
        next_level_threshold: u64,
    ) -> Result<UserProgress, RepositoryError> {
        self.inner.insert_user(username, level, next_level_threshold)
    }

    fn attempts_for_user(
        &self,
        user_id: UserId,
        phase: AttemptPhase,
    ) -> Result<Vec<CourseAttempt>, RepositoryError> {
        self.inner.attempts_for_user(user_id, phase)
    }

    fn attempts_for_course(
        &self,
        course_id: CourseId,
        phase: AttemptPhase,
    ) -> Result<Vec<CourseAttempt>, RepositoryError> {
        self.inner.attempts_for_course(course_id, phase)
    }

    fn settle_attempt(
        &self,
        user_id: UserId,
        course_id: CourseId,
        phase: AttemptPhase,
        decide: &mut dyn FnMut(&UserProgress, &[CourseAttempt]) -> Settlement,
    ) -> Result<Settled, RepositoryError> {
        let mut guard = self.inner.tables.lock().expect("repository mutex poisoned");
        let user = guard
            .users
            .get(&user_id)
            .cloned()
            .ok_or(RepositoryError::NotFound)?;
        let existing = guard.pair_attempts(user_id, course_id, phase);
        match decide(&user, &existing) {
            Settlement::Award { .. } => {
                Err(RepositoryError::Unavailable("transaction aborted".to_string()))
            }
            settlement => Ok(guard.apply(settlement)),
        }
    }
}

/// Holds every course lookup at a barrier so concurrent submissions reach
/// the settlement step together.
pub(super) struct GatedRepository {
    pub(super) inner: MemoryRepository,
    gate: Barrier,
}

impl GatedRepository {
    pub(super) fn new(parties: usize) -> Self {
        Self {
            inner: MemoryRepository::default(),
            gate: Barrier::new(parties),
        }
    }
}

impl ProgressRepository for GatedRepository {
    fn course(&self, id: CourseId) -> Result<Option<Course>, RepositoryError> {
        self.gate.wait();
        self.inner.course(id)
    }

    fn insert_course(
        &self,
        name: String,
        task_count: u32,
        max_points: u32,
    ) -> Result<Course, RepositoryError> {
        self.inner.insert_course(name, task_count, max_points)
    }

    fn user(&self, id: UserId) -> Result<Option<UserProgress>, RepositoryError> {
        self.inner.user(id)
    }

    fn users(&self) -> Result<Vec<UserProgress>, RepositoryError> {
        self.inner.users()
    }

    fn insert_user(
        &self,
        username: String,
        level: u32,
        next_level_threshold: u64,
    ) -> Result<UserProgress, RepositoryError> {
        self.inner.insert_user(username, level, next_level_threshold)
    }

    fn attempts_for_user(
        &self,
        user_id: UserId,
        phase: AttemptPhase,
    ) -> Result<Vec<CourseAttempt>, RepositoryError> {
        self.inner.attempts_for_user(user_id, phase)
    }

    fn attempts_for_course(
        &self,
        course_id: CourseId,
        phase: AttemptPhase,
    ) -> Result<Vec<CourseAttempt>, RepositoryError> {
        self.inner.attempts_for_course(course_id, phase)
    }

    fn settle_attempt(
        &self,
        user_id: UserId,
        course_id: CourseId,
        phase: AttemptPhase,
        decide: &mut dyn FnMut(&UserProgress, &[CourseAttempt]) -> Settlement,
    ) -> Result<Settled, RepositoryError> {
        self.inner.settle_attempt(user_id, course_id, phase, decide)
    }
}

pub(super) struct UnavailableRepository;

impl ProgressRepository for UnavailableRepository {
    fn course(&self, _id: CourseId) -> Result<Option<Course>, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn insert_course(
        &self,
        _name: String,
        _task_count: u32,
        _max_points: u32,
    ) -> Result<Course, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn user(&self, _id: UserId) -> Result<Option<UserProgress>, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn users(&self) -> Result<Vec<UserProgress>, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn insert_user(
        &self,
        _username: String,
        _level: u32,
        _next_level_threshold: u64,
    ) -> Result<UserProgress, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn attempts_for_user(
        &self,
        _user_id: UserId,
        _phase: AttemptPhase,
    ) -> Result<Vec<CourseAttempt>, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn attempts_for_course(
        &self,
        _course_id: CourseId,
        _phase: AttemptPhase,
    ) -> Result<Vec<CourseAttempt>, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn settle_attempt(
        &self,
        _user_id: UserId,
        _course_id: CourseId,
        _phase: AttemptPhase,
        _decide: &mut dyn FnMut(&UserProgress, &[CourseAttempt]) -> Settlement,
    ) -> Result<Settled, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }
}

pub(super) fn build_service() -> (ProgressCoordinator<MemoryRepository>, Arc<MemoryRepository>) {
    let repository = Arc::new(MemoryRepository::default());
    let service = ProgressCoordinator::new(repository.clone(), progress_config())
        .expect("valid progress config");
    (service, repository)
}

pub(super) async fn read_json_body(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), 4096)
        .await
        .expect("read body");
    serde_json::from_slice(&body).expect("json payload")
}

pub(super) fn router_with_service(service: ProgressCoordinator<MemoryRepository>) -> axum::Router {
    progress_router(Arc::new(service))
}
