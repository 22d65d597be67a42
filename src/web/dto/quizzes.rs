use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::model::{
    entity::{OptionCreate, QuestionCreate, QuestionUpdate, QuizAttempt, QuizCreate, QuizUpdate},
    grading::{GradeReport, QuestionType, SubmittedAnswer},
};

#[derive(Debug, Deserialize, Validate, utoipa::ToSchema)]
pub struct QuizCreateBody {
    pub lesson_id: Uuid,
    #[validate(length(min = 1, max = 255), custom(function = "super::not_blank"))]
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[validate(range(min = 0, max = 100, message = "Passing score must be between 0 and 100."))]
    pub passing_score: Option<i32>,
    #[validate(range(min = 1))]
    pub time_limit_minutes: Option<i32>,
}

impl From<QuizCreateBody> for QuizCreate {
    fn from(body: QuizCreateBody) -> Self {
        Self {
            lesson_id: body.lesson_id,
            title: body.title.trim().to_string(),
            description: body.description,
            passing_score: body.passing_score,
            time_limit_minutes: body.time_limit_minutes,
        }
    }
}

#[derive(Debug, Deserialize, Validate, utoipa::ToSchema)]
pub struct QuizUpdateBody {
    #[validate(length(min = 1, max = 255), custom(function = "super::not_blank"))]
    pub title: Option<String>,
    pub description: Option<String>,
    #[validate(range(min = 0, max = 100, message = "Passing score must be between 0 and 100."))]
    pub passing_score: Option<i32>,
    #[validate(range(min = 1))]
    pub time_limit_minutes: Option<i32>,
}

impl From<QuizUpdateBody> for QuizUpdate {
    fn from(body: QuizUpdateBody) -> Self {
        Self {
            title: body.title.map(|t| t.trim().to_string()),
            description: body.description,
            passing_score: body.passing_score,
            time_limit_minutes: body.time_limit_minutes,
            is_published: None,
        }
    }
}

#[derive(Debug, Deserialize, Validate, utoipa::ToSchema)]
pub struct QuestionCreateBody {
    #[validate(length(min = 1, max = 2000), custom(function = "super::not_blank"))]
    pub question_text: String,
    pub question_type: QuestionType,
    #[serde(default = "default_points")]
    #[validate(range(min = 1, message = "Points must be positive."))]
    pub points: i32,
    #[validate(range(min = 0))]
    pub order_index: Option<i32>,
    pub options: Vec<OptionCreate>,
}

fn default_points() -> i32 {
    1
}

impl From<QuestionCreateBody> for QuestionCreate {
    fn from(body: QuestionCreateBody) -> Self {
        Self {
            question_text: body.question_text.trim().to_string(),
            question_type: body.question_type,
            points: body.points,
            order_index: body.order_index,
            options: body.options,
        }
    }
}

#[derive(Debug, Deserialize, Validate, utoipa::ToSchema)]
pub struct QuestionUpdateBody {
    #[validate(length(min = 1, max = 2000), custom(function = "super::not_blank"))]
    pub question_text: Option<String>,
    pub question_type: Option<QuestionType>,
    #[validate(range(min = 1, message = "Points must be positive."))]
    pub points: Option<i32>,
    #[validate(range(min = 0))]
    pub order_index: Option<i32>,
    pub options: Option<Vec<OptionCreate>>,
}

impl From<QuestionUpdateBody> for QuestionUpdate {
    fn from(body: QuestionUpdateBody) -> Self {
        Self {
            question_text: body.question_text.map(|t| t.trim().to_string()),
            question_type: body.question_type,
            points: body.points,
            order_index: body.order_index,
            options: body.options,
        }
    }
}

#[derive(Debug, Deserialize, Validate, utoipa::ToSchema)]
pub struct AttemptBody {
    /// Questions left out are graded as incorrect.
    pub answers: Vec<SubmittedAnswer>,
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct AttemptResponse {
    pub attempt: QuizAttempt,
    pub report: GradeReport,
    pub passing_score: i32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn question_points_default_to_one() {
        let body: QuestionCreateBody = serde_json::from_value(serde_json::json!({
            "question_text": "Is Rust memory safe?",
            "question_type": "true_false",
            "options": [
                { "option_text": "Yes", "is_correct": true },
                { "option_text": "No" }
            ]
        }))
        .unwrap();

        assert_eq!(body.points, 1);
        assert!(body.validate().is_ok());
        let create = QuestionCreate::from(body);
        assert!(!create.options[1].is_correct);
    }

    #[test]
    fn passing_score_is_bounded() {
        let body: QuizCreateBody = serde_json::from_value(serde_json::json!({
            "lesson_id": Uuid::new_v4(),
            "title": "Checkpoint",
            "passing_score": 120
        }))
        .unwrap();
        assert!(body.validate().is_err());
    }

    #[test]
    fn empty_attempt_is_accepted() {
        let body: AttemptBody =
            serde_json::from_value(serde_json::json!({ "answers": [] })).unwrap();
        assert!(body.validate().is_ok());
    }
}
