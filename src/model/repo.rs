use serde::{Deserialize, Serialize};

use crate::model::{ModelManager, error::DatabaseResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceType {
    User,
    Course,
    Module,
    Lesson,
    Quiz,
    QuizQuestion,
    QuizAttempt,
    Assignment,
    Submission,
    Enrollment,
    LessonProgress,
    Notification,
    Review,
    File,
}

impl ResourceType {
    /// Human readable name used in client-facing messages.
    pub fn label(self) -> &'static str {
        match self {
            Self::User => "User",
            Self::Course => "Course",
            Self::Module => "Module",
            Self::Lesson => "Lesson",
            Self::Quiz => "Quiz",
            Self::QuizQuestion => "Question",
            Self::QuizAttempt => "Quiz attempt",
            Self::Assignment => "Assignment",
            Self::Submission => "Submission",
            Self::Enrollment => "Enrollment",
            Self::LessonProgress => "Lesson progress",
            Self::Notification => "Notification",
            Self::Review => "Review",
            Self::File => "File",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, utoipa::ToSchema)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: i64,
    pub limit: i64,
    pub offset: i64,
}

impl<T> Page<T> {
    pub fn new(items: Vec<T>, total: i64, limit: i64, offset: i64) -> Self {
        Self {
            items,
            total,
            limit,
            offset,
        }
    }
}

pub trait ResourceTyped {
    fn get_resource_type() -> ResourceType;
}

/// Row-level persistence shared by every entity.
///
/// `update` applies a partial change set (absent fields are kept) and both
/// `update` and `delete` return `None` when the row does not exist.
#[async_trait::async_trait]
pub trait CrudRepository: ResourceTyped + Sized {
    type Id: Clone + Copy + Send + Sync;
    type Create: Send;
    type Update: Send;

    async fn create(mm: &ModelManager, data: Self::Create) -> DatabaseResult<Self>;

    async fn find_by_id(mm: &ModelManager, id: Self::Id) -> DatabaseResult<Option<Self>>;

    async fn update(
        mm: &ModelManager,
        id: Self::Id,
        data: Self::Update,
    ) -> DatabaseResult<Option<Self>>;

    async fn delete(mm: &ModelManager, id: Self::Id) -> DatabaseResult<Option<Self>>;
}

/// Implements `ResourceTyped` for a list of `entity => variant` pairs.
#[macro_export]
macro_rules! impl_resource_typed {
    ($($ent:ty => $variant:ident),+ $(,)?) => {
        $(
            impl $crate::model::ResourceTyped for $ent {
                fn get_resource_type() -> $crate::model::ResourceType {
                    $crate::model::ResourceType::$variant
                }
            }
        )+
    };
}
