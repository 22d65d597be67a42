use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::model::{
    entity::{CourseCategory, CourseCreate, CourseLevel, CourseUpdate, Enrollment},
    progress::CourseProgress,
};

#[derive(Debug, Deserialize, Validate, utoipa::ToSchema)]
pub struct CourseCreateBody {
    #[validate(length(min = 3, max = 255), custom(function = "super::not_blank"))]
    pub title: String,
    #[validate(length(min = 10, max = 5000))]
    pub description: String,
    pub category: CourseCategory,
    pub level: CourseLevel,
    #[validate(range(min = 0.0, message = "Price must not be negative."))]
    #[serde(default)]
    pub price: f64,
    #[validate(url)]
    pub thumbnail_url: Option<String>,
}

impl CourseCreateBody {
    pub fn into_create(self, instructor_id: Uuid) -> CourseCreate {
        CourseCreate {
            instructor_id,
            title: self.title.trim().to_string(),
            description: self.description,
            category: self.category,
            level: self.level,
            price: self.price,
            thumbnail_url: self.thumbnail_url,
        }
    }
}

#[derive(Debug, Deserialize, Validate, utoipa::ToSchema)]
pub struct CourseUpdateBody {
    #[validate(length(min = 3, max = 255), custom(function = "super::not_blank"))]
    pub title: Option<String>,
    #[validate(length(min = 10, max = 5000))]
    pub description: Option<String>,
    pub category: Option<CourseCategory>,
    pub level: Option<CourseLevel>,
    #[validate(range(min = 0.0, message = "Price must not be negative."))]
    pub price: Option<f64>,
    #[validate(url)]
    pub thumbnail_url: Option<String>,
}

impl From<CourseUpdateBody> for CourseUpdate {
    fn from(body: CourseUpdateBody) -> Self {
        Self {
            title: body.title.map(|t| t.trim().to_string()),
            description: body.description,
            category: body.category,
            level: body.level,
            price: body.price,
            thumbnail_url: body.thumbnail_url,
        }
    }
}

#[derive(Debug, Default, Deserialize, Validate, utoipa::ToSchema)]
pub struct RejectBody {
    #[validate(length(max = 1000))]
    pub reason: Option<String>,
}

#[derive(Debug, Deserialize, Validate, utoipa::ToSchema)]
pub struct AnnouncementBody {
    #[validate(length(min = 5, max = 100, message = "Title must be between 5 and 100 characters."))]
    pub title: String,
    #[validate(length(min = 10, max = 1000, message = "Message must be between 10 and 1000 characters."))]
    pub message: String,
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct AnnouncementResponse {
    pub recipients: usize,
}

#[derive(Debug, Deserialize, Validate, utoipa::ToSchema)]
pub struct EnrollBody {
    pub course_id: Uuid,
}

/// An enrolled course together with the live progress numbers.
#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct EnrolledCourse {
    #[serde(flatten)]
    pub enrollment: Enrollment,
    pub completed_lessons: i64,
    pub total_lessons: i64,
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct CourseProgressResponse {
    pub course_id: Uuid,
    #[serde(flatten)]
    pub progress: CourseProgress,
    pub completed_lesson_ids: Vec<Uuid>,
    pub enrollment: Option<Enrollment>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn negative_price_is_rejected() {
        let body: CourseCreateBody = serde_json::from_value(serde_json::json!({
            "title": "Rust for everyone",
            "description": "From ownership to async in ten weeks.",
            "category": "programming",
            "level": "beginner",
            "price": -1.0
        }))
        .unwrap();

        let errors = body.validate().unwrap_err();
        assert!(errors.field_errors().contains_key("price"));
    }

    #[test]
    fn price_defaults_to_free() {
        let body: CourseCreateBody = serde_json::from_value(serde_json::json!({
            "title": "Design basics",
            "description": "Colour, type and layout.",
            "category": "design",
            "level": "all"
        }))
        .unwrap();

        assert!(body.validate().is_ok());
        let create = body.into_create(Uuid::new_v4());
        assert_eq!(create.price, 0.0);
    }

    #[test]
    fn announcement_bounds() {
        let short = AnnouncementBody {
            title: String::from("Hey"),
            message: String::from("too short"),
        };
        let errors = short.validate().unwrap_err();
        assert!(errors.field_errors().contains_key("title"));
        assert!(errors.field_errors().contains_key("message"));
    }
}
