use chrono::Utc;
use coursework::progress::{
    AttemptId, AttemptPhase, Course, CourseAttempt, CourseId, ProgressRepository, RecordMeta,
    RepositoryError, Settled, Settlement, UserId, UserProgress,
};
use metrics_exporter_prometheus::PrometheusHandle;
use std::collections::HashMap;
use std::sync::atomic::AtomicBool;
use std::sync::{Arc, Mutex, MutexGuard};

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

#[derive(Default)]
struct Tables {
    courses: HashMap<CourseId, Course>,
    users: HashMap<UserId, UserProgress>,
    attempts: HashMap<AttemptId, CourseAttempt>,
    sequence: u64,
}

impl Tables {
    fn next_id(&mut self) -> u64 {
        self.sequence += 1;
        self.sequence
    }

    fn upsert_attempt(&mut self, mut attempt: CourseAttempt) -> CourseAttempt {
        let now = Utc::now();
        let meta = match attempt.meta.take() {
            Some(meta) => meta.touched(now),
            None => RecordMeta::new(AttemptId(self.next_id()), now),
        };
        attempt.meta = Some(meta.clone());
        self.attempts.insert(meta.id, attempt.clone());
        attempt
    }

    fn sorted_attempts<F>(&self, keep: F) -> Vec<CourseAttempt>
    where
        F: Fn(&CourseAttempt) -> bool,
    {
        let mut attempts: Vec<CourseAttempt> = self
            .attempts
            .values()
            .filter(|attempt| keep(attempt))
            .cloned()
            .collect();
        attempts.sort_by_key(|attempt| attempt.id());
        attempts
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

/// Process-local repository; one mutex covers every read-decide-write cycle.
#[derive(Default, Clone)]
pub(crate) struct InMemoryProgressRepository {
    tables: Arc<Mutex<Tables>>,
}

impl InMemoryProgressRepository {
    fn lock(&self) -> Result<MutexGuard<'_, Tables>, RepositoryError> {
        self.tables
            .lock()
            .map_err(|_| RepositoryError::Unavailable("repository mutex poisoned".to_string()))
    }
}

impl ProgressRepository for InMemoryProgressRepository {
    fn course(&self, id: CourseId) -> Result<Option<Course>, RepositoryError> {
        Ok(self.lock()?.courses.get(&id).cloned())
    }

    fn insert_course(
        &self,
        name: String,
        task_count: u32,
        max_points: u32,
    ) -> Result<Course, RepositoryError> {
        let mut guard = self.lock()?;
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
        Ok(self.lock()?.users.get(&id).cloned())
    }

    fn users(&self) -> Result<Vec<UserProgress>, RepositoryError> {
        let guard = self.lock()?;
        let mut users: Vec<UserProgress> = guard.users.values().cloned().collect();
        users.sort_by_key(|user| user.id());
        Ok(users)
    }

    fn insert_user(
        &self,
        username: String,
        level: u32,
        next_level_threshold: u64,
    ) -> Result<UserProgress, RepositoryError> {
        let mut guard = self.lock()?;
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
        Ok(self
            .lock()?
            .sorted_attempts(|attempt| attempt.user_id == user_id && attempt.phase == phase))
    }

    fn attempts_for_course(
        &self,
        course_id: CourseId,
        phase: AttemptPhase,
    ) -> Result<Vec<CourseAttempt>, RepositoryError> {
        Ok(self
            .lock()?
            .sorted_attempts(|attempt| attempt.course_id == course_id && attempt.phase == phase))
    }

    fn settle_attempt(
        &self,
        user_id: UserId,
        course_id: CourseId,
        phase: AttemptPhase,
        decide: &mut dyn FnMut(&UserProgress, &[CourseAttempt]) -> Settlement,
    ) -> Result<Settled, RepositoryError> {
        let mut guard = self.lock()?;
        let user = guard
            .users
            .get(&user_id)
            .cloned()
            .ok_or(RepositoryError::NotFound)?;
        let existing = guard.sorted_attempts(|attempt| {
            attempt.user_id == user_id && attempt.course_id == course_id && attempt.phase == phase
        });
        let settlement = decide(&user, &existing);
        Ok(guard.apply(settlement))
    }
}
