use axum::{
    Router,
    extract::{Path, Query, State},
    response::IntoResponse,
    routing::{get, post},
};
use uuid::Uuid;

use crate::{
    events::DomainEvent,
    model::{
        CrudRepository, Page, Relation, ResourceTyped,
        entity::{
            CatalogueFilter, Course, CourseAnalytics, CourseDetails, Enrollment, LessonProgress,
        },
        progress,
    },
    web::{
        ApiResponse, AppState, RequestContext, WebError, WebResult,
        dto::{
            PaginationQuery, ValidatedJson,
            courses::{
                AnnouncementBody, AnnouncementResponse, CourseCreateBody, CourseProgressResponse,
                CourseUpdateBody, EnrolledCourse, RejectBody,
            },
        },
        error::ErrorResponse,
    },
};

pub fn routes<S>(state: AppState) -> Router<S> {
    Router::new()
        .route(
            "/api/courses",
            get(courses_catalogue_handler).post(courses_create_handler),
        )
        .route("/api/courses/pending", get(courses_pending_handler))
        .route("/api/courses/mine", get(courses_mine_handler))
        .route("/api/courses/enrolled", get(courses_enrolled_handler))
        .route(
            "/api/courses/{id}",
            get(courses_get_handler)
                .put(courses_update_handler)
                .delete(courses_delete_handler),
        )
        .route("/api/courses/{id}/submit", post(courses_submit_handler))
        .route("/api/courses/{id}/approve", post(courses_approve_handler))
        .route("/api/courses/{id}/reject", post(courses_reject_handler))
        .route("/api/courses/{id}/publish", post(courses_publish_handler))
        .route("/api/courses/{id}/unpublish", post(courses_unpublish_handler))
        .route("/api/courses/{id}/analytics", get(courses_analytics_handler))
        .route(
            "/api/courses/{id}/announcements",
            post(courses_announcement_handler),
        )
        .route("/api/courses/{id}/progress", get(courses_progress_handler))
        .with_state(state)
}

fn course_error(e: crate::model::DatabaseError) -> WebError {
    WebError::resource_fetch_error(Course::get_resource_type(), e)
}

#[utoipa::path(
    get,
    path = "/api/courses",
    params(CatalogueFilter, PaginationQuery),
    description = "Public catalogue of approved, published courses",
    responses(
        (status = 200, description = "Requested page", body = Page<CourseDetails>),
    ),
    tag = "courses"
)]
async fn courses_catalogue_handler(
    State(state): State<AppState>,
    Query(filter): Query<CatalogueFilter>,
    Query(page): Query<PaginationQuery>,
) -> WebResult<impl IntoResponse> {
    let courses = Course::catalogue(state.pool(), &filter, page.limit(), page.offset())
        .await
        .map_err(course_error)?;
    Ok(ApiResponse::ok(courses))
}

#[utoipa::path(
    get,
    path = "/api/courses/{id}",
    params(("id" = Uuid, Path, description = "Course id")),
    description = "Course with instructor name, module and enrollment counts. \
                   Unpublished courses are only visible to their instructor and admins.",
    responses(
        (status = 200, description = "Course found", body = CourseDetails),
        (status = 404, description = "Course not found", body = ErrorResponse),
    ),
    tag = "courses"
)]
async fn courses_get_handler(
    ctx: RequestContext,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> WebResult<impl IntoResponse> {
    let details = Course::find_details(state.pool(), id)
        .await
        .map_err(course_error)?
        .ok_or_else(|| WebError::resource_not_found(Course::get_resource_type()))?;

    super::ensure_visible(&ctx, &details.course)?;

    Ok(ApiResponse::ok(details))
}

#[utoipa::path(
    post,
    path = "/api/courses",
    request_body = CourseCreateBody,
    description = "Creates a draft course owned by the requester",
    responses(
        (status = 201, description = "Course created", body = Course),
        (status = 401, description = "Not signed in", body = ErrorResponse),
        (status = 403, description = "Instructors and admins only", body = ErrorResponse),
        (status = 422, description = "Validation failed", body = ErrorResponse),
    ),
    security(("bearer" = [])),
    tag = "courses"
)]
async fn courses_create_handler(
    ctx: RequestContext,
    State(state): State<AppState>,
    ValidatedJson(payload): ValidatedJson<CourseCreateBody>,
) -> WebResult<impl IntoResponse> {
    let user = ctx.author()?;
    let created = Course::create(state.pool(), payload.into_create(user.user_id()))
        .await
        .map_err(course_error)?;

    tracing::info!(course_id = %created.id(), "course created");
    Ok(ApiResponse::created(created).with_message("Course created successfully."))
}

#[utoipa::path(
    put,
    path = "/api/courses/{id}",
    params(("id" = Uuid, Path, description = "Course id")),
    request_body = CourseUpdateBody,
    responses(
        (status = 200, description = "Course updated", body = Course),
        (status = 403, description = "Not the owner", body = ErrorResponse),
        (status = 404, description = "Course not found", body = ErrorResponse),
        (status = 422, description = "Validation failed", body = ErrorResponse),
    ),
    security(("bearer" = [])),
    tag = "courses"
)]
async fn courses_update_handler(
    ctx: RequestContext,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    ValidatedJson(payload): ValidatedJson<CourseUpdateBody>,
) -> WebResult<impl IntoResponse> {
    let user = ctx.user()?;
    let course = super::fetch::<Course>(&state, id).await?;
    super::guard(user, &course, Relation::Owner)?;

    let updated = Course::update(state.pool(), id, payload.into())
        .await
        .map_err(course_error)?
        .ok_or_else(|| WebError::resource_not_found(Course::get_resource_type()))?;

    Ok(ApiResponse::ok(updated).with_message("Course updated successfully."))
}

#[utoipa::path(
    delete,
    path = "/api/courses/{id}",
    params(("id" = Uuid, Path, description = "Course id")),
    description = "Deletes a course with all of its content",
    responses(
        (status = 200, description = "Course deleted"),
        (status = 403, description = "Not the owner", body = ErrorResponse),
        (status = 404, description = "Course not found", body = ErrorResponse),
    ),
    security(("bearer" = [])),
    tag = "courses"
)]
async fn courses_delete_handler(
    ctx: RequestContext,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> WebResult<impl IntoResponse> {
    let user = ctx.user()?;
    let course = super::fetch::<Course>(&state, id).await?;
    super::guard(user, &course, Relation::Owner)?;

    Course::delete(state.pool(), id).await.map_err(course_error)?;

    tracing::info!(course_id = %id, "course deleted");
    Ok(ApiResponse::message("Course deleted successfully."))
}

#[utoipa::path(
    post,
    path = "/api/courses/{id}/submit",
    params(("id" = Uuid, Path, description = "Course id")),
    description = "Sends a draft or rejected course to the admins for review",
    responses(
        (status = 200, description = "Course pending review", body = Course),
        (status = 400, description = "Course is not a draft or rejected", body = ErrorResponse),
        (status = 403, description = "Not the owner", body = ErrorResponse),
    ),
    security(("bearer" = [])),
    tag = "courses"
)]
async fn courses_submit_handler(
    ctx: RequestContext,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> WebResult<impl IntoResponse> {
    let user = ctx.user()?;
    let course = super::fetch::<Course>(&state, id).await?;
    super::guard(user, &course, Relation::Owner)?;

    let submitted = Course::submit_for_review(state.pool(), id)
        .await
        .map_err(course_error)?;

    state.events().publish(DomainEvent::CoursePendingReview {
        course_id: submitted.id(),
        course_title: submitted.title().to_string(),
    });
    Ok(ApiResponse::ok(submitted).with_message("Course submitted for review."))
}

#[utoipa::path(
    post,
    path = "/api/courses/{id}/approve",
    params(("id" = Uuid, Path, description = "Course id")),
    description = "Approves and publishes a pending course",
    responses(
        (status = 200, description = "Course approved", body = Course),
        (status = 400, description = "Course is not pending", body = ErrorResponse),
        (status = 403, description = "Admins only", body = ErrorResponse),
    ),
    security(("bearer" = [])),
    tag = "courses"
)]
async fn courses_approve_handler(
    ctx: RequestContext,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> WebResult<impl IntoResponse> {
    ctx.admin()?;
    let approved = Course::approve(state.pool(), id).await.map_err(course_error)?;

    tracing::info!(course_id = %id, "course approved");
    state.events().publish(DomainEvent::CourseReviewed {
        instructor_id: approved.instructor_id(),
        course_id: approved.id(),
        course_title: approved.title().to_string(),
        approved: true,
        reason: None,
    });
    Ok(ApiResponse::ok(approved).with_message("Course approved successfully."))
}

#[utoipa::path(
    post,
    path = "/api/courses/{id}/reject",
    params(("id" = Uuid, Path, description = "Course id")),
    request_body = RejectBody,
    description = "Rejects a pending course with an optional reason",
    responses(
        (status = 200, description = "Course rejected", body = Course),
        (status = 400, description = "Course is not pending", body = ErrorResponse),
        (status = 403, description = "Admins only", body = ErrorResponse),
    ),
    security(("bearer" = [])),
    tag = "courses"
)]
async fn courses_reject_handler(
    ctx: RequestContext,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    ValidatedJson(payload): ValidatedJson<RejectBody>,
) -> WebResult<impl IntoResponse> {
    ctx.admin()?;
    let reason = payload.reason.filter(|r| !r.trim().is_empty());
    let rejected = Course::reject(state.pool(), id, reason.as_deref())
        .await
        .map_err(course_error)?;

    tracing::info!(course_id = %id, "course rejected");
    state.events().publish(DomainEvent::CourseReviewed {
        instructor_id: rejected.instructor_id(),
        course_id: rejected.id(),
        course_title: rejected.title().to_string(),
        approved: false,
        reason,
    });
    Ok(ApiResponse::ok(rejected).with_message("Course rejected."))
}

async fn set_published(
    ctx: RequestContext,
    state: AppState,
    id: Uuid,
    publish: bool,
) -> WebResult<Course> {
    let user = ctx.user()?;
    let course = super::fetch::<Course>(&state, id).await?;
    super::guard(user, &course, Relation::Owner)?;

    Course::set_published(state.pool(), id, publish)
        .await
        .map_err(course_error)
}

#[utoipa::path(
    post,
    path = "/api/courses/{id}/publish",
    params(("id" = Uuid, Path, description = "Course id")),
    description = "Publishes an approved course",
    responses(
        (status = 200, description = "Course published", body = Course),
        (status = 400, description = "Course is not approved", body = ErrorResponse),
        (status = 403, description = "Not the owner", body = ErrorResponse),
    ),
    security(("bearer" = [])),
    tag = "courses"
)]
async fn courses_publish_handler(
    ctx: RequestContext,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> WebResult<impl IntoResponse> {
    let course = set_published(ctx, state, id, true).await?;
    Ok(ApiResponse::ok(course).with_message("Course published successfully."))
}

#[utoipa::path(
    post,
    path = "/api/courses/{id}/unpublish",
    params(("id" = Uuid, Path, description = "Course id")),
    responses(
        (status = 200, description = "Course unpublished", body = Course),
        (status = 403, description = "Not the owner", body = ErrorResponse),
    ),
    security(("bearer" = [])),
    tag = "courses"
)]
async fn courses_unpublish_handler(
    ctx: RequestContext,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> WebResult<impl IntoResponse> {
    let course = set_published(ctx, state, id, false).await?;
    Ok(ApiResponse::ok(course).with_message("Course unpublished successfully."))
}

#[utoipa::path(
    get,
    path = "/api/courses/pending",
    description = "Courses waiting for review, oldest first",
    responses(
        (status = 200, description = "Pending courses", body = Vec<CourseDetails>),
        (status = 403, description = "Admins only", body = ErrorResponse),
    ),
    security(("bearer" = [])),
    tag = "courses"
)]
async fn courses_pending_handler(
    ctx: RequestContext,
    State(state): State<AppState>,
) -> WebResult<impl IntoResponse> {
    ctx.admin()?;
    let courses = Course::pending(state.pool()).await.map_err(course_error)?;
    Ok(ApiResponse::ok(courses))
}

#[utoipa::path(
    get,
    path = "/api/courses/mine",
    description = "Courses authored by the requester in any status",
    responses(
        (status = 200, description = "Own courses", body = Vec<CourseDetails>),
        (status = 403, description = "Instructors and admins only", body = ErrorResponse),
    ),
    security(("bearer" = [])),
    tag = "courses"
)]
async fn courses_mine_handler(
    ctx: RequestContext,
    State(state): State<AppState>,
) -> WebResult<impl IntoResponse> {
    let user = ctx.author()?;
    let courses = Course::by_instructor(state.pool(), user.user_id())
        .await
        .map_err(course_error)?;
    Ok(ApiResponse::ok(courses))
}

#[utoipa::path(
    get,
    path = "/api/courses/enrolled",
    description = "Courses the requester is enrolled in, with lesson counts",
    responses(
        (status = 200, description = "Enrolled courses", body = Vec<EnrolledCourse>),
        (status = 401, description = "Not signed in", body = ErrorResponse),
    ),
    security(("bearer" = [])),
    tag = "courses"
)]
async fn courses_enrolled_handler(
    ctx: RequestContext,
    State(state): State<AppState>,
) -> WebResult<impl IntoResponse> {
    let user = ctx.user()?;
    let enrollment_error =
        |e| WebError::resource_fetch_error(Enrollment::get_resource_type(), e);

    let enrollments = Enrollment::by_user(state.pool(), user.user_id())
        .await
        .map_err(enrollment_error)?;

    let mut courses = Vec::with_capacity(enrollments.len());
    for enrollment in enrollments {
        let (completed_lessons, total_lessons) =
            LessonProgress::counts_for_course(state.pool(), user.user_id(), enrollment.course_id())
                .await
                .map_err(enrollment_error)?;
        courses.push(EnrolledCourse {
            enrollment,
            completed_lessons,
            total_lessons,
        });
    }

    Ok(ApiResponse::ok(courses))
}

#[utoipa::path(
    get,
    path = "/api/courses/{id}/analytics",
    params(("id" = Uuid, Path, description = "Course id")),
    responses(
        (status = 200, description = "Course analytics", body = CourseAnalytics),
        (status = 403, description = "Not the owner", body = ErrorResponse),
        (status = 404, description = "Course not found", body = ErrorResponse),
    ),
    security(("bearer" = [])),
    tag = "courses"
)]
async fn courses_analytics_handler(
    ctx: RequestContext,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> WebResult<impl IntoResponse> {
    let user = ctx.user()?;
    let course = super::fetch::<Course>(&state, id).await?;
    super::guard(user, &course, Relation::Owner)?;

    let analytics = Course::analytics(state.pool(), id)
        .await
        .map_err(course_error)?;
    Ok(ApiResponse::ok(analytics))
}

#[utoipa::path(
    post,
    path = "/api/courses/{id}/announcements",
    params(("id" = Uuid, Path, description = "Course id")),
    request_body = AnnouncementBody,
    description = "Notifies every enrolled student",
    responses(
        (status = 200, description = "Announcement queued", body = AnnouncementResponse),
        (status = 403, description = "Not the owner", body = ErrorResponse),
        (status = 422, description = "Validation failed", body = ErrorResponse),
    ),
    security(("bearer" = [])),
    tag = "courses"
)]
async fn courses_announcement_handler(
    ctx: RequestContext,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    ValidatedJson(payload): ValidatedJson<AnnouncementBody>,
) -> WebResult<impl IntoResponse> {
    let user = ctx.user()?;
    let course = super::fetch::<Course>(&state, id).await?;
    super::guard(user, &course, Relation::Owner)?;

    let recipients = Enrollment::student_ids(state.pool(), id)
        .await
        .map_err(|e| WebError::resource_fetch_error(Enrollment::get_resource_type(), e))?
        .len();

    state.events().publish(DomainEvent::CourseAnnouncement {
        course_id: course.id(),
        course_title: course.title().to_string(),
        title: payload.title,
        message: payload.message,
    });

    Ok(ApiResponse::ok(AnnouncementResponse { recipients })
        .with_message(format!("Announcement sent to {recipients} students.")))
}

#[utoipa::path(
    get,
    path = "/api/courses/{id}/progress",
    params(("id" = Uuid, Path, description = "Course id")),
    description = "Lesson completion of the requester in this course",
    responses(
        (status = 200, description = "Progress summary", body = CourseProgressResponse),
        (status = 404, description = "Course not found", body = ErrorResponse),
    ),
    security(("bearer" = [])),
    tag = "courses"
)]
async fn courses_progress_handler(
    ctx: RequestContext,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> WebResult<impl IntoResponse> {
    let user = ctx.user()?;
    let course = super::fetch::<Course>(&state, id).await?;
    let progress_error =
        |e| WebError::resource_fetch_error(crate::model::ResourceType::LessonProgress, e);

    let progress = progress::course_progress(state.pool(), user.user_id(), course.id())
        .await
        .map_err(progress_error)?;
    let completed_lesson_ids =
        LessonProgress::completed_in_course(state.pool(), user.user_id(), course.id())
            .await
            .map_err(progress_error)?;
    let enrollment = Enrollment::find_for(state.pool(), user.user_id(), course.id())
        .await
        .map_err(progress_error)?;

    Ok(ApiResponse::ok(CourseProgressResponse {
        course_id: course.id(),
        progress,
        completed_lesson_ids,
        enrollment,
    }))
}
