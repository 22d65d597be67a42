//! Course progress aggregation.
//!
//! Completing a lesson recomputes `completed / total` over the lessons of the
//! owning course and pushes the result into the enrollment. The completion
//! row is an upsert, so repeating the call never double counts.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::model::{
    ModelManager,
    entity::{Enrollment, Lesson, LessonProgress},
    error::DatabaseResult,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, utoipa::ToSchema)]
pub struct CourseProgress {
    pub completed_lessons: i64,
    pub total_lessons: i64,
    pub percentage: i32,
}

impl CourseProgress {
    /// Rounded percentage of completed lessons. A course counts as complete
    /// once the rounded value reaches 100.
    pub fn new(completed_lessons: i64, total_lessons: i64) -> Self {
        let total_lessons = total_lessons.max(0);
        let completed_lessons = completed_lessons.clamp(0, total_lessons);

        let percentage = if total_lessons == 0 {
            0
        } else {
            // round half up, in integers
            ((completed_lessons * 200 + total_lessons) / (2 * total_lessons)) as i32
        };

        Self {
            completed_lessons,
            total_lessons,
            percentage,
        }
    }

    pub fn is_complete(&self) -> bool {
        self.total_lessons > 0 && self.percentage == 100
    }
}

#[derive(Debug, Clone)]
pub struct CompletionOutcome {
    pub lesson: LessonProgress,
    pub progress: CourseProgress,
    /// `None` when the user has no enrollment in the course.
    pub enrollment: Option<Enrollment>,
    /// Set only by the call that moved the enrollment into `completed`.
    pub course_completed: bool,
}

pub async fn course_progress(
    mm: &ModelManager,
    user_id: Uuid,
    course_id: Uuid,
) -> DatabaseResult<CourseProgress> {
    let (completed, total) = LessonProgress::counts_for_course(mm, user_id, course_id).await?;
    Ok(CourseProgress::new(completed, total))
}

/// Marks `lesson` completed for `user_id` and cascades the new progress into the enrollment.
#[tracing::instrument(skip(mm, lesson), fields(lesson_id = %lesson.id()))]
pub async fn complete_lesson(
    mm: &ModelManager,
    user_id: Uuid,
    lesson: &Lesson,
) -> DatabaseResult<CompletionOutcome> {
    let lesson_progress = LessonProgress::mark_completed(mm, user_id, lesson.id()).await?;

    let progress = course_progress(mm, user_id, lesson.course_id()).await?;
    let applied = Enrollment::apply_progress(mm, user_id, lesson.course_id(), &progress).await?;

    let (enrollment, course_completed) = match applied {
        Some((enrollment, completed)) => (Some(enrollment), completed),
        None => (None, false),
    };

    tracing::debug!(
        percentage = progress.percentage,
        course_completed,
        "lesson completion applied"
    );

    Ok(CompletionOutcome {
        lesson: lesson_progress,
        progress,
        enrollment,
        course_completed,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_course_is_zero() {
        let p = CourseProgress::new(0, 0);
        assert_eq!(p.percentage, 0);
        assert!(!p.is_complete());
    }

    #[test]
    fn rounds_to_nearest() {
        assert_eq!(CourseProgress::new(1, 3).percentage, 33);
        assert_eq!(CourseProgress::new(2, 3).percentage, 67);
        assert_eq!(CourseProgress::new(1, 8).percentage, 13);
    }

    #[test]
    fn last_lesson_gives_exactly_hundred() {
        let p = CourseProgress::new(4, 4);
        assert_eq!(p.percentage, 100);
        assert!(p.is_complete());
    }

    #[test]
    fn rounding_up_to_hundred_completes() {
        let p = CourseProgress::new(199, 200);
        assert_eq!(p.percentage, 100);
        assert!(p.is_complete());
        assert_eq!(CourseProgress::new(198, 200).percentage, 99);
    }

    #[test]
    fn completed_is_clamped_to_total() {
        let p = CourseProgress::new(5, 3);
        assert_eq!(p.completed_lessons, 3);
        assert_eq!(p.percentage, 100);
    }
}
