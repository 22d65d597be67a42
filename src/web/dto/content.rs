//! Bodies for modules and lessons.

use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::model::{
    entity::{
        ContentType, Lesson, LessonCreate, LessonProgress, LessonUpdate, ModuleCreate, ModuleUpdate,
    },
    progress::CourseProgress,
};

#[derive(Debug, Deserialize, Validate, utoipa::ToSchema)]
pub struct ModuleCreateBody {
    pub course_id: Uuid,
    #[validate(length(min = 1, max = 255), custom(function = "super::not_blank"))]
    pub title: String,
    #[serde(default)]
    #[validate(length(max = 5000))]
    pub description: String,
    #[validate(range(min = 0))]
    pub order_index: Option<i32>,
}

impl From<ModuleCreateBody> for ModuleCreate {
    fn from(body: ModuleCreateBody) -> Self {
        Self {
            course_id: body.course_id,
            title: body.title.trim().to_string(),
            description: body.description,
            order_index: body.order_index,
        }
    }
}

#[derive(Debug, Deserialize, Validate, utoipa::ToSchema)]
pub struct ModuleUpdateBody {
    #[validate(length(min = 1, max = 255), custom(function = "super::not_blank"))]
    pub title: Option<String>,
    #[validate(length(max = 5000))]
    pub description: Option<String>,
}

impl From<ModuleUpdateBody> for ModuleUpdate {
    fn from(body: ModuleUpdateBody) -> Self {
        Self {
            title: body.title.map(|t| t.trim().to_string()),
            description: body.description,
        }
    }
}

#[derive(Debug, Deserialize, Validate, utoipa::ToSchema)]
pub struct ReorderBody {
    #[validate(range(min = 0, message = "Order index must not be negative."))]
    pub new_order_index: i32,
}

#[derive(Debug, Deserialize, Validate, utoipa::ToSchema)]
pub struct LessonCreateBody {
    pub module_id: Uuid,
    #[validate(length(min = 1, max = 255), custom(function = "super::not_blank"))]
    pub title: String,
    #[serde(default)]
    pub content: String,
    #[serde(default = "default_content_type")]
    pub content_type: ContentType,
    #[validate(url)]
    pub video_url: Option<String>,
    #[validate(range(min = 0))]
    pub duration_minutes: Option<i32>,
    #[validate(range(min = 0))]
    pub order_index: Option<i32>,
}

fn default_content_type() -> ContentType {
    ContentType::Text
}

impl LessonCreateBody {
    /// A video lesson is pointless without its video.
    pub fn missing_video(&self) -> bool {
        self.content_type == ContentType::Video && self.video_url.is_none()
    }
}

impl From<LessonCreateBody> for LessonCreate {
    fn from(body: LessonCreateBody) -> Self {
        Self {
            module_id: body.module_id,
            title: body.title.trim().to_string(),
            content: body.content,
            content_type: body.content_type,
            video_url: body.video_url,
            duration_minutes: body.duration_minutes,
            order_index: body.order_index,
        }
    }
}

#[derive(Debug, Deserialize, Validate, utoipa::ToSchema)]
pub struct LessonUpdateBody {
    #[validate(length(min = 1, max = 255), custom(function = "super::not_blank"))]
    pub title: Option<String>,
    pub content: Option<String>,
    pub content_type: Option<ContentType>,
    #[validate(url)]
    pub video_url: Option<String>,
    #[validate(range(min = 0))]
    pub duration_minutes: Option<i32>,
}

impl LessonUpdateBody {
    /// Checks the lesson as it would look after the update.
    pub fn missing_video(&self, current: &Lesson) -> bool {
        let is_video = match self.content_type {
            Some(content_type) => content_type == ContentType::Video,
            None => current.is_video(),
        };
        is_video && self.video_url.is_none() && current.video_url().is_none()
    }
}

impl From<LessonUpdateBody> for LessonUpdate {
    fn from(body: LessonUpdateBody) -> Self {
        Self {
            title: body.title.map(|t| t.trim().to_string()),
            content: body.content,
            content_type: body.content_type,
            video_url: body.video_url,
            duration_minutes: body.duration_minutes,
        }
    }
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct LessonCompletionResponse {
    pub lesson: LessonProgress,
    pub course_progress: CourseProgress,
    pub course_completed: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lesson_defaults_to_text() {
        let body: LessonCreateBody = serde_json::from_value(serde_json::json!({
            "module_id": Uuid::new_v4(),
            "title": "Ownership"
        }))
        .unwrap();
        assert_eq!(body.content_type, ContentType::Text);
        assert!(!body.missing_video());
        assert!(body.validate().is_ok());
    }

    #[test]
    fn video_lesson_needs_url() {
        let body: LessonCreateBody = serde_json::from_value(serde_json::json!({
            "module_id": Uuid::new_v4(),
            "title": "Borrowing in pictures",
            "content_type": "video"
        }))
        .unwrap();
        assert!(body.missing_video());
    }

    #[test]
    fn negative_reorder_is_invalid() {
        let body = ReorderBody { new_order_index: -1 };
        assert!(body.validate().is_err());
    }
}
