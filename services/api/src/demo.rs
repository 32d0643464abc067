use crate::infra::InMemoryProgressRepository;
use clap::Args;
use coursework::error::AppError;
use coursework::progress::{
    AttemptSubmission, CourseId, CourseRegistration, ProgressConfig, ProgressCoordinator,
    SubmitResult, UserId, UserRegistration,
};
use std::sync::Arc;

#[derive(Args, Debug)]
pub(crate) struct DemoArgs {
    /// Fraction of max points that must be exceeded to pass
    #[arg(long, default_value_t = 0.7)]
    pub(crate) pass_threshold: f64,
    /// Number of tasks in the demo course
    #[arg(long, default_value_t = 10)]
    pub(crate) tasks: u32,
    /// Points earned on the first finished attempt
    #[arg(long, default_value_t = 80)]
    pub(crate) first_score: i64,
    /// Points earned on the retry
    #[arg(long, default_value_t = 40)]
    pub(crate) retry_score: i64,
}

pub(crate) fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    let DemoArgs {
        pass_threshold,
        tasks,
        first_score,
        retry_score,
    } = args;

    let config = ProgressConfig {
        pass_threshold,
        ..ProgressConfig::default()
    };
    let repository = Arc::new(InMemoryProgressRepository::default());
    let service = ProgressCoordinator::new(repository, config.clone())?;

    println!("Course progress demo");
    let learner = service.register_user(UserRegistration {
        username: "demo-learner".to_string(),
    })?;
    println!(
        "- Registered {} at level {} ({} XP to level {})",
        learner.username,
        learner.level,
        learner.next_level_threshold,
        learner.level + 1
    );

    let course = service.register_course(CourseRegistration {
        name: "Everyday phrases".to_string(),
        task_count: tasks,
    })?;
    println!(
        "- Course '{}' has {} tasks worth {} points each ({} max, pass above {:.0}%)",
        course.name,
        course.task_count,
        config.points_per_task,
        course.max_points,
        pass_threshold * 100.0
    );

    service.submit_payload(payload(learner.id(), course.id(), "started", 0))?;
    println!("\nStarted the course");

    let first = service.submit_payload(payload(learner.id(), course.id(), "finished", first_score))?;
    render_result("First attempt", &first);

    let retry = service.submit_payload(payload(learner.id(), course.id(), "finished", retry_score))?;
    render_result("Retry", &retry);

    let progress = service.user(learner.id())?;
    println!(
        "\nLearner now has {} points, level {} ({} XP step to the next level)",
        progress.points, progress.level, progress.next_level_threshold
    );

    println!("\nBest results per course (ascending)");
    for standing in service.course_ranking(learner.id())? {
        println!("- course {}: {} points", standing.course_id, standing.points);
    }

    Ok(())
}

fn payload(user_id: UserId, course_id: CourseId, phase: &str, points: i64) -> AttemptSubmission {
    AttemptSubmission {
        user_id,
        course_id,
        phase: phase.to_string(),
        points,
        passed: false,
    }
}

fn render_result(label: &str, result: &SubmitResult) {
    let verdict = if result.passed { "passed" } else { "not passed" };
    println!(
        "{}: submitted {} points -> {} (best on record {})",
        label, result.points, verdict, result.best_points
    );
}
