//! Quiz auto-grading.
//!
//! Grading is all-or-nothing per question: a multiple choice answer must
//! select exactly the correct option set, a true/false answer exactly one
//! correct option. Questions without an answer still count towards the total.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum QuestionType {
    MultipleChoice,
    TrueFalse,
}

impl QuestionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::MultipleChoice => "multiple_choice",
            Self::TrueFalse => "true_false",
        }
    }
}

impl TryFrom<&str> for QuestionType {
    type Error = String;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "multiple_choice" => Ok(Self::MultipleChoice),
            "true_false" => Ok(Self::TrueFalse),
            other => Err(format!("unknown question type `{other}`")),
        }
    }
}

/// A question reduced to what grading needs.
#[derive(Debug, Clone)]
pub struct GradableQuestion {
    pub id: Uuid,
    pub question_type: QuestionType,
    pub points: i32,
    pub correct_options: HashSet<Uuid>,
}

#[derive(Debug, Clone, Serialize, Deserialize, utoipa::ToSchema)]
pub struct SubmittedAnswer {
    pub question_id: Uuid,
    #[serde(default)]
    pub selected_options: Vec<Uuid>,
}

#[derive(Debug, Clone, Serialize, Deserialize, utoipa::ToSchema)]
pub struct QuestionResult {
    pub question_id: Uuid,
    pub answered: bool,
    pub is_correct: bool,
    pub points_awarded: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize, utoipa::ToSchema)]
pub struct GradeReport {
    pub total_points: i32,
    pub earned_points: i32,
    pub percentage: f64,
    pub passed: bool,
    pub total_questions: usize,
    pub correct_answers: usize,
    pub results: Vec<QuestionResult>,
}

fn is_answer_correct(question: &GradableQuestion, selected: &[Uuid]) -> bool {
    match question.question_type {
        QuestionType::MultipleChoice => {
            let selected: HashSet<Uuid> = selected.iter().copied().collect();
            selected == question.correct_options
        }
        QuestionType::TrueFalse => {
            selected.len() == 1 && question.correct_options.contains(&selected[0])
        }
    }
}

/// `earned / total * 100`, or 0 when the quiz carries no points.
pub fn percentage(earned: i32, total: i32) -> f64 {
    if total <= 0 {
        return 0.0;
    }
    f64::from(earned) / f64::from(total) * 100.0
}

/// Grades `answers` against every question of a quiz.
///
/// Answers referring to unknown questions are ignored; when a question is
/// answered more than once, the last answer wins.
pub fn grade(
    questions: &[GradableQuestion],
    answers: &[SubmittedAnswer],
    passing_score: i32,
) -> GradeReport {
    let by_question: HashMap<Uuid, &[Uuid]> = answers
        .iter()
        .map(|a| (a.question_id, a.selected_options.as_slice()))
        .collect();

    let mut total_points = 0;
    let mut earned_points = 0;
    let mut correct_answers = 0;
    let mut results = Vec::with_capacity(questions.len());

    for question in questions {
        total_points += question.points;

        let selected = by_question.get(&question.id);
        let is_correct = selected
            .map(|selected| is_answer_correct(question, selected))
            .unwrap_or(false);

        let points_awarded = if is_correct { question.points } else { 0 };
        if is_correct {
            correct_answers += 1;
            earned_points += points_awarded;
        }

        results.push(QuestionResult {
            question_id: question.id,
            answered: selected.is_some(),
            is_correct,
            points_awarded,
        });
    }

    let percentage = percentage(earned_points, total_points);

    GradeReport {
        total_points,
        earned_points,
        percentage,
        passed: percentage >= f64::from(passing_score),
        total_questions: questions.len(),
        correct_answers,
        results,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Fixture {
        question: GradableQuestion,
        correct: Vec<Uuid>,
        wrong: Vec<Uuid>,
    }

    fn question(question_type: QuestionType, points: i32, correct: usize, wrong: usize) -> Fixture {
        let correct: Vec<Uuid> = (0..correct).map(|_| Uuid::new_v4()).collect();
        let wrong: Vec<Uuid> = (0..wrong).map(|_| Uuid::new_v4()).collect();
        Fixture {
            question: GradableQuestion {
                id: Uuid::new_v4(),
                question_type,
                points,
                correct_options: correct.iter().copied().collect(),
            },
            correct,
            wrong,
        }
    }

    fn answer(q: &Fixture, selected: Vec<Uuid>) -> SubmittedAnswer {
        SubmittedAnswer {
            question_id: q.question.id,
            selected_options: selected,
        }
    }

    #[test]
    fn one_of_two_correct_fails_at_sixty() {
        let q1 = question(QuestionType::MultipleChoice, 5, 1, 2);
        let q2 = question(QuestionType::MultipleChoice, 5, 1, 2);
        let answers = vec![
            answer(&q1, q1.correct.clone()),
            answer(&q2, vec![q2.wrong[0]]),
        ];

        let report = grade(&[q1.question, q2.question], &answers, 60);
        assert_eq!(report.earned_points, 5);
        assert_eq!(report.total_points, 10);
        assert_eq!(report.percentage, 50.0);
        assert!(!report.passed);
        assert_eq!(report.correct_answers, 1);
    }

    #[test]
    fn unanswered_question_counts_towards_total() {
        let q1 = question(QuestionType::MultipleChoice, 4, 1, 1);
        let q2 = question(QuestionType::TrueFalse, 6, 1, 1);
        let answers = vec![answer(&q1, q1.correct.clone())];

        let report = grade(&[q1.question, q2.question], &answers, 50);
        assert_eq!(report.total_points, 10);
        assert_eq!(report.earned_points, 4);
        assert_eq!(report.percentage, 40.0);
        assert!(!report.passed);
        assert!(!report.results[1].answered);
    }

    #[test]
    fn multiple_choice_subset_and_superset_earn_nothing() {
        let q = question(QuestionType::MultipleChoice, 3, 2, 2);

        let subset = vec![answer(&q, vec![q.correct[0]])];
        let report = grade(std::slice::from_ref(&q.question), &subset, 0);
        assert_eq!(report.earned_points, 0);

        let mut superset_selection = q.correct.clone();
        superset_selection.push(q.wrong[0]);
        let superset = vec![answer(&q, superset_selection)];
        let report = grade(std::slice::from_ref(&q.question), &superset, 0);
        assert_eq!(report.earned_points, 0);

        let exact = vec![answer(&q, vec![q.correct[1], q.correct[0]])];
        let report = grade(std::slice::from_ref(&q.question), &exact, 0);
        assert_eq!(report.earned_points, 3);
    }

    #[test]
    fn multiple_choice_ignores_repeated_selection() {
        let q = question(QuestionType::MultipleChoice, 2, 1, 1);
        let answers = vec![answer(&q, vec![q.correct[0], q.correct[0]])];
        let report = grade(std::slice::from_ref(&q.question), &answers, 100);
        assert_eq!(report.earned_points, 2);
        assert!(report.passed);
    }

    #[test]
    fn true_false_requires_exactly_one_correct_pick() {
        let q = question(QuestionType::TrueFalse, 1, 1, 1);

        let both = vec![answer(&q, vec![q.correct[0], q.wrong[0]])];
        assert_eq!(grade(std::slice::from_ref(&q.question), &both, 0).earned_points, 0);

        let none = vec![answer(&q, vec![])];
        assert_eq!(grade(std::slice::from_ref(&q.question), &none, 0).earned_points, 0);

        let right = vec![answer(&q, vec![q.correct[0]])];
        assert_eq!(grade(std::slice::from_ref(&q.question), &right, 0).earned_points, 1);
    }

    #[test]
    fn empty_quiz_scores_zero() {
        let report = grade(&[], &[], 70);
        assert_eq!(report.total_points, 0);
        assert_eq!(report.percentage, 0.0);
        assert!(!report.percentage.is_nan());
        assert!(!report.passed);
    }

    #[test]
    fn empty_quiz_with_zero_passing_score_passes() {
        assert!(grade(&[], &[], 0).passed);
    }

    #[test]
    fn last_duplicate_answer_wins() {
        let q = question(QuestionType::TrueFalse, 5, 1, 1);
        let answers = vec![answer(&q, vec![q.wrong[0]]), answer(&q, vec![q.correct[0]])];
        let report = grade(std::slice::from_ref(&q.question), &answers, 100);
        assert_eq!(report.earned_points, 5);
        assert!(report.passed);
    }

    #[test]
    fn answers_to_foreign_questions_are_ignored() {
        let q = question(QuestionType::TrueFalse, 5, 1, 1);
        let stray = SubmittedAnswer {
            question_id: Uuid::new_v4(),
            selected_options: vec![q.correct[0]],
        };
        let report = grade(std::slice::from_ref(&q.question), &[stray], 0);
        assert_eq!(report.total_points, 5);
        assert_eq!(report.earned_points, 0);
    }

    #[test]
    fn pass_threshold_is_inclusive() {
        let q1 = question(QuestionType::TrueFalse, 7, 1, 1);
        let q2 = question(QuestionType::TrueFalse, 3, 1, 1);
        let answers = vec![answer(&q1, q1.correct.clone())];
        let report = grade(&[q1.question, q2.question], &answers, 70);
        assert_eq!(report.percentage, 70.0);
        assert!(report.passed);
    }
}
