use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::prelude::FromRow;
use uuid::Uuid;

use crate::model::access::HasOwner;
use crate::model::{
    ModelManager, Page,
    error::{DatabaseError, DatabaseResult},
    repo::CrudRepository,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum CourseStatus {
    Draft,
    Pending,
    Approved,
    Rejected,
}

impl CourseStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Pending => "pending",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
        }
    }

    /// Review workflow: draft/rejected → pending → approved | rejected.
    pub fn can_become(&self, next: CourseStatus) -> bool {
        matches!(
            (self, next),
            (Self::Draft | Self::Rejected, Self::Pending)
                | (Self::Pending, Self::Approved | Self::Rejected)
        )
    }
}

impl From<&str> for CourseStatus {
    fn from(value: &str) -> Self {
        match value {
            "pending" => Self::Pending,
            "approved" => Self::Approved,
            "rejected" => Self::Rejected,
            _ => Self::Draft,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "kebab-case")]
pub enum CourseCategory {
    Programming,
    Design,
    Business,
    Marketing,
    DataScience,
    Other,
}

impl CourseCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Programming => "programming",
            Self::Design => "design",
            Self::Business => "business",
            Self::Marketing => "marketing",
            Self::DataScience => "data-science",
            Self::Other => "other",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum CourseLevel {
    Beginner,
    Intermediate,
    Advanced,
    All,
}

impl CourseLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Beginner => "beginner",
            Self::Intermediate => "intermediate",
            Self::Advanced => "advanced",
            Self::All => "all",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, utoipa::ToSchema)]
pub struct Course {
    id: Uuid,
    instructor_id: Uuid,
    title: String,
    description: String,
    category: String,
    level: String,
    price: f64,
    thumbnail_url: Option<String>,
    status: String,
    is_published: bool,
    is_approved: bool,
    rejection_reason: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

#[derive(Debug)]
pub struct CourseCreate {
    pub instructor_id: Uuid,
    pub title: String,
    pub description: String,
    pub category: CourseCategory,
    pub level: CourseLevel,
    pub price: f64,
    pub thumbnail_url: Option<String>,
}

#[derive(Debug, Default)]
pub struct CourseUpdate {
    pub title: Option<String>,
    pub description: Option<String>,
    pub category: Option<CourseCategory>,
    pub level: Option<CourseLevel>,
    pub price: Option<f64>,
    pub thumbnail_url: Option<String>,
}

/// A course with the denormalized fields shown in listings.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, utoipa::ToSchema)]
pub struct CourseDetails {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub course: Course,
    pub instructor_name: String,
    pub module_count: i64,
    pub enrollment_count: i64,
    pub average_rating: Option<f64>,
}

#[derive(Debug, Default, Clone, Deserialize, utoipa::IntoParams)]
pub struct CatalogueFilter {
    pub category: Option<CourseCategory>,
    pub level: Option<CourseLevel>,
    pub search: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, utoipa::ToSchema)]
pub struct CourseAnalytics {
    pub course_id: Uuid,
    pub total_enrollments: i64,
    pub completed_enrollments: i64,
    pub average_progress: f64,
    pub review_count: i64,
    pub average_rating: Option<f64>,
    pub quiz_attempts: i64,
    pub quiz_pass_rate: f64,
    pub assignment_submissions: i64,
}

impl Course {
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn instructor_id(&self) -> Uuid {
        self.instructor_id
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn status(&self) -> CourseStatus {
        CourseStatus::from(self.status.as_str())
    }

    pub fn is_published(&self) -> bool {
        self.is_published
    }

    pub fn is_approved(&self) -> bool {
        self.is_approved
    }

    pub fn rejection_reason(&self) -> Option<&str> {
        self.rejection_reason.as_deref()
    }

    /// Students may only enroll into reviewed, published courses.
    pub fn is_enrollable(&self) -> bool {
        self.status() == CourseStatus::Approved && self.is_published
    }
}

impl HasOwner for Course {
    fn owner_id(&self) -> Uuid {
        self.instructor_id
    }
}

impl HasOwner for CourseDetails {
    fn owner_id(&self) -> Uuid {
        self.course.instructor_id
    }
}

static SELECT_DETAILS: &str = r#"
    SELECT c.*,
        u.name AS instructor_name,
        (SELECT COUNT(*) FROM modules m WHERE m.course_id = c.id) AS module_count,
        (SELECT COUNT(*) FROM enrollments e WHERE e.course_id = c.id) AS enrollment_count,
        (SELECT AVG(r.rating)::float8 FROM reviews r WHERE r.course_id = c.id AND r.deleted_at IS NULL) AS average_rating
    FROM courses c
    JOIN users u ON u.id = c.instructor_id
"#;

#[async_trait]
impl CrudRepository for Course {
    type Id = Uuid;
    type Create = CourseCreate;
    type Update = CourseUpdate;

    async fn create(mm: &ModelManager, data: CourseCreate) -> DatabaseResult<Self> {
        let course = sqlx::query_as(
            r#"
            INSERT INTO courses (id, instructor_id, title, description, category, level, price, thumbnail_url)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(data.instructor_id)
        .bind(&data.title)
        .bind(&data.description)
        .bind(data.category.as_str())
        .bind(data.level.as_str())
        .bind(data.price)
        .bind(&data.thumbnail_url)
        .fetch_one(mm.executor())
        .await?;
        Ok(course)
    }

    async fn find_by_id(mm: &ModelManager, id: Uuid) -> DatabaseResult<Option<Self>> {
        let course = sqlx::query_as("SELECT * FROM courses WHERE id = $1")
            .bind(id)
            .fetch_optional(mm.executor())
            .await?;
        Ok(course)
    }

    async fn update(mm: &ModelManager, id: Uuid, data: CourseUpdate) -> DatabaseResult<Option<Self>> {
        let course = sqlx::query_as(
            r#"
            UPDATE courses SET
                title = COALESCE($2, title),
                description = COALESCE($3, description),
                category = COALESCE($4, category),
                level = COALESCE($5, level),
                price = COALESCE($6, price),
                thumbnail_url = COALESCE($7, thumbnail_url),
                updated_at = now()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(&data.title)
        .bind(&data.description)
        .bind(data.category.map(|c| c.as_str()))
        .bind(data.level.map(|l| l.as_str()))
        .bind(data.price)
        .bind(&data.thumbnail_url)
        .fetch_optional(mm.executor())
        .await?;
        Ok(course)
    }

    async fn delete(mm: &ModelManager, id: Uuid) -> DatabaseResult<Option<Self>> {
        let course = sqlx::query_as("DELETE FROM courses WHERE id = $1 RETURNING *")
            .bind(id)
            .fetch_optional(mm.executor())
            .await?;
        Ok(course)
    }
}

impl Course {
    pub async fn find_details(mm: &ModelManager, id: Uuid) -> DatabaseResult<Option<CourseDetails>> {
        let details = sqlx::query_as(&format!("{SELECT_DETAILS} WHERE c.id = $1"))
            .bind(id)
            .fetch_optional(mm.executor())
            .await?;
        Ok(details)
    }

    /// Public catalogue: approved and published courses only.
    pub async fn catalogue(
        mm: &ModelManager,
        filter: &CatalogueFilter,
        limit: i64,
        offset: i64,
    ) -> DatabaseResult<Page<CourseDetails>> {
        let search = filter.search.as_ref().map(|s| format!("%{}%", s.trim()));
        let predicate = r#"
            WHERE c.status = 'approved' AND c.is_published
              AND ($1::text IS NULL OR c.category = $1)
              AND ($2::text IS NULL OR c.level = $2)
              AND ($3::text IS NULL OR c.title ILIKE $3 OR c.description ILIKE $3)
        "#;

        let items = sqlx::query_as(&format!(
            "{SELECT_DETAILS} {predicate} ORDER BY c.created_at DESC LIMIT $4 OFFSET $5"
        ))
        .bind(filter.category.map(|c| c.as_str()))
        .bind(filter.level.map(|l| l.as_str()))
        .bind(&search)
        .bind(limit)
        .bind(offset)
        .fetch_all(mm.executor())
        .await?;

        let total: i64 = sqlx::query_scalar(&format!("SELECT COUNT(*) FROM courses c {predicate}"))
            .bind(filter.category.map(|c| c.as_str()))
            .bind(filter.level.map(|l| l.as_str()))
            .bind(&search)
            .fetch_one(mm.executor())
            .await?;

        Ok(Page::new(items, total, limit, offset))
    }

    pub async fn by_instructor(
        mm: &ModelManager,
        instructor_id: Uuid,
    ) -> DatabaseResult<Vec<CourseDetails>> {
        let courses = sqlx::query_as(&format!(
            "{SELECT_DETAILS} WHERE c.instructor_id = $1 ORDER BY c.created_at DESC"
        ))
        .bind(instructor_id)
        .fetch_all(mm.executor())
        .await?;
        Ok(courses)
    }

    pub async fn pending(mm: &ModelManager) -> DatabaseResult<Vec<CourseDetails>> {
        let courses = sqlx::query_as(&format!(
            "{SELECT_DETAILS} WHERE c.status = 'pending' ORDER BY c.updated_at ASC"
        ))
        .fetch_all(mm.executor())
        .await?;
        Ok(courses)
    }

    /// Moves the course along the review workflow.
    ///
    /// The status check and the write happen in a single statement, so two
    /// concurrent reviewers cannot both act on the same pending course.
    async fn transition(
        mm: &ModelManager,
        id: Uuid,
        next: CourseStatus,
        assignments: &str,
        reason: Option<&str>,
    ) -> DatabaseResult<Self> {
        let allowed_from: Vec<&'static str> = [
            CourseStatus::Draft,
            CourseStatus::Pending,
            CourseStatus::Approved,
            CourseStatus::Rejected,
        ]
        .into_iter()
        .filter(|s| s.can_become(next))
        .map(|s| s.as_str())
        .collect();

        let updated: Option<Self> = sqlx::query_as(&format!(
            "UPDATE courses SET status = $2, {assignments}, updated_at = now() \
             WHERE id = $1 AND status = ANY($3) RETURNING *"
        ))
        .bind(id)
        .bind(next.as_str())
        .bind(&allowed_from)
        .bind(reason)
        .fetch_optional(mm.executor())
        .await?;

        match updated {
            Some(course) => Ok(course),
            None => match Self::find_by_id(mm, id).await? {
                Some(current) => Err(DatabaseError::invalid(format!(
                    "course cannot move from {} to {}",
                    current.status().as_str(),
                    next.as_str()
                ))),
                None => Err(DatabaseError::NotFound),
            },
        }
    }

    pub async fn submit_for_review(mm: &ModelManager, id: Uuid) -> DatabaseResult<Self> {
        Self::transition(
            mm,
            id,
            CourseStatus::Pending,
            "rejection_reason = $4, is_approved = FALSE",
            None,
        )
        .await
    }

    pub async fn approve(mm: &ModelManager, id: Uuid) -> DatabaseResult<Self> {
        Self::transition(
            mm,
            id,
            CourseStatus::Approved,
            "rejection_reason = $4, is_approved = TRUE, is_published = TRUE",
            None,
        )
        .await
    }

    pub async fn reject(mm: &ModelManager, id: Uuid, reason: Option<&str>) -> DatabaseResult<Self> {
        Self::transition(
            mm,
            id,
            CourseStatus::Rejected,
            "rejection_reason = $4, is_approved = FALSE, is_published = FALSE",
            reason,
        )
        .await
    }

    /// Publishing is only possible once the course has been approved.
    pub async fn set_published(mm: &ModelManager, id: Uuid, publish: bool) -> DatabaseResult<Self> {
        let course = Self::find_by_id(mm, id).await?.ok_or(DatabaseError::NotFound)?;
        if publish && course.status() != CourseStatus::Approved {
            return Err(DatabaseError::invalid("only approved courses can be published"));
        }

        let course = sqlx::query_as(
            "UPDATE courses SET is_published = $2, updated_at = now() WHERE id = $1 RETURNING *",
        )
        .bind(id)
        .bind(publish)
        .fetch_one(mm.executor())
        .await?;
        Ok(course)
    }

    pub async fn analytics(mm: &ModelManager, id: Uuid) -> DatabaseResult<CourseAnalytics> {
        let analytics = sqlx::query_as(
            r#"
            SELECT
                $1::uuid AS course_id,
                (SELECT COUNT(*) FROM enrollments WHERE course_id = $1) AS total_enrollments,
                (SELECT COUNT(*) FROM enrollments WHERE course_id = $1 AND status = 'completed') AS completed_enrollments,
                (SELECT COALESCE(AVG(progress), 0)::float8 FROM enrollments WHERE course_id = $1) AS average_progress,
                (SELECT COUNT(*) FROM reviews WHERE course_id = $1 AND deleted_at IS NULL) AS review_count,
                (SELECT AVG(rating)::float8 FROM reviews WHERE course_id = $1 AND deleted_at IS NULL) AS average_rating,
                (SELECT COUNT(*) FROM quiz_attempts qa
                    JOIN quizzes q ON q.id = qa.quiz_id
                    JOIN lessons l ON l.id = q.lesson_id
                    JOIN modules m ON m.id = l.module_id
                    WHERE m.course_id = $1) AS quiz_attempts,
                (SELECT COALESCE(AVG(CASE WHEN qa.passed THEN 100.0 ELSE 0.0 END), 0)::float8 FROM quiz_attempts qa
                    JOIN quizzes q ON q.id = qa.quiz_id
                    JOIN lessons l ON l.id = q.lesson_id
                    JOIN modules m ON m.id = l.module_id
                    WHERE m.course_id = $1) AS quiz_pass_rate,
                (SELECT COUNT(*) FROM assignment_submissions s
                    JOIN assignments a ON a.id = s.assignment_id
                    JOIN lessons l ON l.id = a.lesson_id
                    JOIN modules m ON m.id = l.module_id
                    WHERE m.course_id = $1) AS assignment_submissions
            "#,
        )
        .bind(id)
        .fetch_one(mm.executor())
        .await?;
        Ok(analytics)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn review_workflow_transitions() {
        use CourseStatus::*;
        assert!(Draft.can_become(Pending));
        assert!(Rejected.can_become(Pending));
        assert!(Pending.can_become(Approved));
        assert!(Pending.can_become(Rejected));

        assert!(!Draft.can_become(Approved));
        assert!(!Approved.can_become(Rejected));
        assert!(!Approved.can_become(Pending));
        assert!(!Rejected.can_become(Approved));
    }

    #[test]
    fn category_uses_kebab_case() {
        let parsed: CourseCategory = serde_json::from_str("\"data-science\"").unwrap();
        assert_eq!(parsed, CourseCategory::DataScience);
        assert_eq!(parsed.as_str(), "data-science");
    }
}
