use chrono::{DateTime, Utc};
use serde::Deserialize;
use uuid::Uuid;
use validator::Validate;

use crate::model::entity::{AssignmentCreate, AssignmentUpdate, SubmissionType};

#[derive(Debug, Deserialize, Validate, utoipa::ToSchema)]
pub struct AssignmentCreateBody {
    pub lesson_id: Uuid,
    #[validate(length(min = 1, max = 255), custom(function = "super::not_blank"))]
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub instructions: String,
    pub due_date: Option<DateTime<Utc>>,
    #[validate(range(min = 1, message = "Max score must be positive."))]
    pub max_score: Option<i32>,
    #[serde(default = "default_submission_type")]
    pub submission_type: SubmissionType,
}

fn default_submission_type() -> SubmissionType {
    SubmissionType::Text
}

impl From<AssignmentCreateBody> for AssignmentCreate {
    fn from(body: AssignmentCreateBody) -> Self {
        Self {
            lesson_id: body.lesson_id,
            title: body.title.trim().to_string(),
            description: body.description,
            instructions: body.instructions,
            due_date: body.due_date,
            max_score: body.max_score,
            submission_type: body.submission_type,
        }
    }
}

#[derive(Debug, Deserialize, Validate, utoipa::ToSchema)]
pub struct AssignmentUpdateBody {
    #[validate(length(min = 1, max = 255), custom(function = "super::not_blank"))]
    pub title: Option<String>,
    pub description: Option<String>,
    pub instructions: Option<String>,
    pub due_date: Option<DateTime<Utc>>,
    #[validate(range(min = 1, message = "Max score must be positive."))]
    pub max_score: Option<i32>,
    pub submission_type: Option<SubmissionType>,
}

impl From<AssignmentUpdateBody> for AssignmentUpdate {
    fn from(body: AssignmentUpdateBody) -> Self {
        Self {
            title: body.title.map(|t| t.trim().to_string()),
            description: body.description,
            instructions: body.instructions,
            due_date: body.due_date,
            max_score: body.max_score,
            submission_type: body.submission_type,
            is_published: None,
        }
    }
}

#[derive(Debug, Deserialize, Validate, utoipa::ToSchema)]
pub struct SubmitBody {
    #[validate(length(max = 50000))]
    pub content: Option<String>,
    #[validate(url(message = "File URL must be a valid URL."))]
    pub file_url: Option<String>,
}

impl SubmitBody {
    /// The field the assignment's submission type requires, if it is missing.
    pub fn missing_field(&self, kind: SubmissionType) -> Option<&'static str> {
        let present = |v: &Option<String>| v.as_deref().is_some_and(|s| !s.trim().is_empty());
        match kind {
            SubmissionType::Text if !present(&self.content) => Some("content"),
            SubmissionType::File if !present(&self.file_url) => Some("file_url"),
            _ => None,
        }
    }
}

#[derive(Debug, Deserialize, Validate, utoipa::ToSchema)]
pub struct GradeBody {
    pub score: i32,
    #[validate(length(max = 5000))]
    pub feedback: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn submission_requires_matching_field() {
        let text = SubmitBody {
            content: Some(String::from("my essay")),
            file_url: None,
        };
        assert_eq!(text.missing_field(SubmissionType::Text), None);
        assert_eq!(text.missing_field(SubmissionType::File), Some("file_url"));

        let blank = SubmitBody {
            content: Some(String::from("   ")),
            file_url: None,
        };
        assert_eq!(blank.missing_field(SubmissionType::Text), Some("content"));
    }

    #[test]
    fn submission_type_defaults_to_text() {
        let body: AssignmentCreateBody = serde_json::from_value(serde_json::json!({
            "lesson_id": Uuid::new_v4(),
            "title": "Write a parser",
            "due_date": "2030-01-01T00:00:00Z"
        }))
        .unwrap();
        assert_eq!(body.submission_type, SubmissionType::Text);
        assert!(body.validate().is_ok());
    }
}
